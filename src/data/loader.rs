use std::path::Path;

use crate::error::{PreviewError, Result};

use super::model::FilterFile;

// ---------------------------------------------------------------------------
// Filter file loader
// ---------------------------------------------------------------------------

/// Load a BIDS filter file.
///
/// Expected schema (bucket → entity → constraint):
///
/// ```json
/// {
///   "t1w": { "session": "01", "reconstruction": null },
///   "dwi": { "direction": "AP", "run": [1, 2], "acquisition": "*" }
/// }
/// ```
///
/// `null` means the entity must be absent, `"*"` that it must be present with
/// any value, and `"<Query.NAME: N>"` strings are decoded back into the named
/// marker. See [`super::model::EntityValue`].
pub fn load_filter_file(path: &Path) -> Result<FilterFile> {
    if !path.is_file() {
        return Err(PreviewError::FilterFileNotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|e| PreviewError::io(path, e))?;
    let filters = parse_filters(&text).map_err(|source| PreviewError::MalformedFilterFile {
        path: path.to_path_buf(),
        source,
    })?;

    log::debug!(
        "Loaded {} filter bucket(s) from {}",
        filters.len(),
        path.display()
    );
    Ok(filters)
}

/// Decode filter-file text. The top level must be an object of objects.
pub fn parse_filters(text: &str) -> serde_json::Result<FilterFile> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::data::model::EntityValue;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn decodes_buckets_and_markers() {
        let file = write_temp(r#"{"t1w": {"session": "01", "reconstruction": null, "run": "*"}}"#);
        let filters = load_filter_file(file.path()).unwrap();
        let t1w = &filters["t1w"];
        assert_eq!(t1w["session"], EntityValue::from("01"));
        assert_eq!(t1w["reconstruction"], EntityValue::Absent);
        assert_eq!(t1w["run"], EntityValue::Any);
    }

    #[test]
    fn duplicate_keys_last_write_wins() {
        let filters = parse_filters(r#"{"dwi": {"direction": "AP", "direction": "PA"}}"#).unwrap();
        assert_eq!(filters["dwi"]["direction"], EntityValue::from("PA"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_filter_file(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, PreviewError::FilterFileNotFound(_)));
    }

    #[test]
    fn trailing_comma_is_malformed() {
        let file = write_temp(r#"{"dwi": {"direction": "AP",}}"#);
        let err = load_filter_file(file.path()).unwrap_err();
        assert!(matches!(err, PreviewError::MalformedFilterFile { .. }));
    }

    #[test]
    fn non_object_buckets_are_malformed() {
        assert!(parse_filters(r#"{"dwi": "AP"}"#).is_err());
        assert!(parse_filters(r#"["dwi"]"#).is_err());
        assert!(parse_filters(r#"{"dwi": {"direction": {"nested": 1}}}"#).is_err());
    }
}
