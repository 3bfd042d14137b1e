use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;
use walkdir::{DirEntry, WalkDir};

use crate::error::{PreviewError, Result};

use super::model::{EntityFilters, Observed};

// ---------------------------------------------------------------------------
// BIDS vocabulary
// ---------------------------------------------------------------------------

/// File-name key → entity name used in queries.
const ENTITY_KEYS: &[(&str, &str)] = &[
    ("sub", "subject"),
    ("ses", "session"),
    ("sample", "sample"),
    ("task", "task"),
    ("tracksys", "tracksys"),
    ("acq", "acquisition"),
    ("ce", "ceagent"),
    ("trc", "tracer"),
    ("stain", "staining"),
    ("rec", "reconstruction"),
    ("dir", "direction"),
    ("run", "run"),
    ("mod", "modality"),
    ("echo", "echo"),
    ("flip", "flip"),
    ("inv", "inv"),
    ("mt", "mt"),
    ("part", "part"),
    ("proc", "proc"),
    ("hemi", "hemi"),
    ("space", "space"),
    ("split", "split"),
    ("recording", "recording"),
    ("chunk", "chunk"),
    ("res", "res"),
    ("den", "den"),
    ("label", "label"),
    ("desc", "desc"),
];

/// Entities that do not come from a `key-value` pair.
const STRUCTURAL_ENTITIES: &[&str] = &["datatype", "suffix", "extension"];

/// Entities whose labels are integers.
const INTEGER_ENTITIES: &[&str] = &["run", "echo", "flip", "inv", "chunk", "split"];

const DATATYPES: &[&str] = &[
    "anat", "beh", "dwi", "eeg", "fmap", "func", "ieeg", "meg", "micr", "motion", "nirs", "perf",
    "pet",
];

/// Top-level directories that never hold raw data.
const IGNORED_DIRS: &[&str] = &["code", "derivatives", "models", "sourcedata", "stimuli"];

const DESCRIPTION_FILE: &str = "dataset_description.json";
const PARTICIPANTS_FILE: &str = "participants.tsv";

fn entity_name(key: &str) -> Option<&'static str> {
    ENTITY_KEYS
        .iter()
        .find(|(short, _)| *short == key)
        .map(|(_, long)| *long)
}

fn is_entity(name: &str) -> bool {
    STRUCTURAL_ENTITIES.contains(&name) || ENTITY_KEYS.iter().any(|(_, long)| *long == name)
}

/// Render an extension the way the layout stores it.
pub fn normalize_extension(ext: &str, initial_dot: bool) -> String {
    let bare = ext.trim_start_matches('.');
    if initial_dot && !bare.is_empty() {
        format!(".{bare}")
    } else {
        bare.to_string()
    }
}

// ---------------------------------------------------------------------------
// File name parsing
// ---------------------------------------------------------------------------

/// `sub-01_dir-AP_dwi.nii.gz` split into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedName {
    /// `(key, value)` pairs in file-name order, keys still in short form.
    pub pairs: Vec<(String, String)>,
    pub suffix: String,
    /// Everything from the first `.`, including it; empty if there is none.
    pub extension: String,
}

fn is_label(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Parse a BIDS file name. Returns `None` for names that do not follow the
/// `key-value_..._suffix.ext` pattern.
pub fn parse_filename(name: &str) -> Option<ParsedName> {
    let (stem, extension) = match name.find('.') {
        Some(i) => (&name[..i], &name[i..]),
        None => (name, ""),
    };
    let parts: Vec<&str> = stem.split('_').collect();
    let (suffix, pairs) = parts.split_last()?;
    if !is_label(suffix) {
        return None;
    }
    let pairs = pairs
        .iter()
        .map(|part| {
            let (key, value) = part.split_once('-')?;
            (is_label(key) && is_label(value)).then(|| (key.to_string(), value.to_string()))
        })
        .collect::<Option<Vec<_>>>()?;
    Some(ParsedName {
        pairs,
        suffix: suffix.to_string(),
        extension: extension.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Layout configuration and indexed files
// ---------------------------------------------------------------------------

/// How a [`BidsLayout`] is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Require `dataset_description.json` and reject files whose names or
    /// locations break BIDS naming rules.
    pub validate: bool,
    /// Store and compare extensions with a leading dot (`.nii.gz`).
    pub extension_initial_dot: bool,
    /// Attach JSON sidecar fields to data files so they can be queried.
    pub index_metadata: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            validate: true,
            extension_initial_dot: true,
            index_metadata: true,
        }
    }
}

/// One indexed file.
#[derive(Debug, Clone)]
pub struct BidsFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Entity name → raw label. Includes `suffix`, `extension` and, when the
    /// parent directory names one, `datatype`.
    pub entities: BTreeMap<String, String>,
    /// Sidecar fields inherited by this file.
    pub metadata: BTreeMap<String, JsonValue>,
}

impl BidsFile {
    pub fn entity(&self, name: &str) -> Option<&str> {
        self.entities.get(name).map(String::as_str)
    }

    /// What this file carries for `key`, looking at entities before metadata.
    pub fn observe(&self, key: &str) -> Option<Observed<'_>> {
        if let Some(raw) = self.entities.get(key) {
            return Some(Observed::Entity {
                raw,
                integer: INTEGER_ENTITIES.contains(&key),
            });
        }
        self.metadata
            .get(key)
            .filter(|v| !v.is_null())
            .map(Observed::Metadata)
    }

    fn is_sidecar(&self) -> bool {
        self.entity("extension")
            .is_some_and(|ext| ext.trim_start_matches('.') == "json")
    }
}

/// A JSON sidecar ready to be inherited.
struct Sidecar {
    dir: PathBuf,
    suffix: String,
    entities: BTreeMap<String, String>,
    fields: serde_json::Map<String, JsonValue>,
}

/// Query against a [`BidsLayout`]: one bucket for one participant.
#[derive(Debug, Clone, Copy)]
pub struct Query<'a> {
    /// Bucket name, used in error messages.
    pub bucket: &'a str,
    pub subject: &'a str,
    /// Accepted extensions, with or without a leading dot.
    pub extensions: &'a [&'a str],
    pub entities: &'a EntityFilters,
}

// ---------------------------------------------------------------------------
// BidsLayout – the dataset index
// ---------------------------------------------------------------------------

/// Index of every file in a BIDS dataset with its parsed entities.
#[derive(Debug, Clone)]
pub struct BidsLayout {
    root: PathBuf,
    config: LayoutConfig,
    files: Vec<BidsFile>,
    listed_participants: Option<BTreeSet<String>>,
    metadata_keys: BTreeSet<String>,
}

impl BidsLayout {
    /// Walk `root` and index it.
    pub fn new(root: impl AsRef<Path>, config: LayoutConfig) -> Result<Self> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(PreviewError::DatasetNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(PreviewError::NotADirectory(root.to_path_buf()));
        }
        let root = std::fs::canonicalize(root).map_err(|e| PreviewError::io(root, e))?;

        if config.validate {
            check_description(&root)?;
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(keep_entry);
        for entry in walker {
            let entry = entry?;
            let is_file = entry.file_type().is_file()
                || (entry.path_is_symlink() && !entry.path().is_dir());
            if !is_file {
                continue;
            }
            if let Some(file) = index_file(&root, entry.path(), &config) {
                files.push(file);
            }
        }

        let mut metadata_keys = BTreeSet::new();
        if config.index_metadata {
            let sidecars = load_sidecars(&root, &files)?;
            for file in files.iter_mut().filter(|f| !f.is_sidecar()) {
                attach_metadata(&root, file, &sidecars);
                metadata_keys.extend(file.metadata.keys().cloned());
            }
        }

        let listed_participants = read_participants(&root)?;
        let layout = Self {
            root,
            config,
            files,
            listed_participants,
            metadata_keys,
        };

        if let Some(listed) = &layout.listed_participants {
            for subject in layout.subjects() {
                if !listed.contains(&subject) {
                    log::warn!("sub-{subject} has files but is not listed in {PARTICIPANTS_FILE}");
                }
            }
        }
        log::info!(
            "Indexed {} files for {} subject(s) under {}",
            layout.files.len(),
            layout.subjects().len(),
            layout.root.display()
        );
        Ok(layout)
    }

    pub fn files(&self) -> &[BidsFile] {
        &self.files
    }

    /// Subject labels that have at least one indexed file.
    pub fn subjects(&self) -> BTreeSet<String> {
        self.files
            .iter()
            .filter_map(|f| f.entity("subject"))
            .map(str::to_string)
            .collect()
    }

    /// Labels listed in `participants.tsv`, without the `sub-` prefix.
    pub fn listed_participants(&self) -> Option<&BTreeSet<String>> {
        self.listed_participants.as_ref()
    }

    /// Whether `key` can be used in a query: a BIDS entity or an indexed
    /// sidecar field.
    pub fn is_known_key(&self, key: &str) -> bool {
        is_entity(key) || self.metadata_keys.contains(key)
    }

    /// Sorted paths of every file matching `query`.
    pub fn get(&self, query: &Query<'_>) -> Result<Vec<PathBuf>> {
        for key in query.entities.keys() {
            if key == "subject" || key == "extension" {
                return Err(PreviewError::ConflictingEntity {
                    bucket: query.bucket.to_string(),
                    entity: key.clone(),
                });
            }
            if !self.is_known_key(key) {
                return Err(PreviewError::UnknownEntity {
                    bucket: query.bucket.to_string(),
                    entity: key.clone(),
                });
            }
        }

        let extensions: Vec<String> = query
            .extensions
            .iter()
            .map(|ext| normalize_extension(ext, self.config.extension_initial_dot))
            .collect();

        let mut paths: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|f| f.entity("subject") == Some(query.subject))
            .filter(|f| f.entity("extension").is_some_and(|e| extensions.iter().any(|x| x == e)))
            .filter(|f| {
                query
                    .entities
                    .iter()
                    .all(|(key, value)| value.accepts(f.observe(key)))
            })
            .map(|f| f.path.clone())
            .collect();
        paths.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
        Ok(paths)
    }
}

// -- Indexing helpers --

fn keep_entry(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return false;
    }
    !(entry.depth() == 1 && entry.file_type().is_dir() && IGNORED_DIRS.contains(&&*name))
}

fn check_description(root: &Path) -> Result<()> {
    let path = root.join(DESCRIPTION_FILE);
    if !path.is_file() {
        return Err(PreviewError::MissingDatasetDescription(root.to_path_buf()));
    }
    let text = std::fs::read_to_string(&path).map_err(|e| PreviewError::io(&path, e))?;
    let invalid = |reason: String| PreviewError::InvalidDatasetDescription {
        root: root.to_path_buf(),
        reason,
    };
    let description: JsonValue = serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?;
    let fields = description
        .as_object()
        .ok_or_else(|| invalid("expected a JSON object".to_string()))?;
    for field in ["Name", "BIDSVersion"] {
        if !fields.contains_key(field) {
            return Err(invalid(format!(
                "Mandatory 'dataset_description' field '{field}' missing"
            )));
        }
    }
    Ok(())
}

/// Parse one file into a [`BidsFile`], or `None` when it cannot be indexed.
fn index_file(root: &Path, path: &Path, config: &LayoutConfig) -> Option<BidsFile> {
    let rel = path.strip_prefix(root).ok()?;
    let name = rel.file_name()?.to_str()?;
    let Some(parsed) = parse_filename(name) else {
        log::debug!("Skipping {}: not a BIDS file name", rel.display());
        return None;
    };

    let mut entities = BTreeMap::new();
    for (key, value) in parsed.pairs {
        match entity_name(&key) {
            Some(long) => {
                entities.insert(long.to_string(), value);
            }
            None if config.validate => {
                log::debug!("Skipping {}: unknown entity key '{key}'", rel.display());
                return None;
            }
            None => {
                entities.insert(key, value);
            }
        }
    }
    entities.insert("suffix".to_string(), parsed.suffix);
    entities.insert(
        "extension".to_string(),
        normalize_extension(&parsed.extension, config.extension_initial_dot),
    );

    let dirs: Vec<&str> = rel
        .parent()
        .map(|p| p.iter().filter_map(|c| c.to_str()).collect())
        .unwrap_or_default();
    if let Some(datatype) = dirs.last().filter(|d| DATATYPES.contains(*d)) {
        entities.insert("datatype".to_string(), datatype.to_string());
    }

    if config.validate && !location_agrees(&dirs, &entities) {
        log::debug!(
            "Skipping {}: entities disagree with its directory",
            rel.display()
        );
        return None;
    }

    Some(BidsFile {
        path: path.to_path_buf(),
        entities,
        metadata: BTreeMap::new(),
    })
}

/// A file under `sub-X[/ses-Y]` must carry the same subject and session.
fn location_agrees(dirs: &[&str], entities: &BTreeMap<String, String>) -> bool {
    let dir_label = |depth: usize, prefix: &str| {
        dirs.get(depth)
            .and_then(|d| d.strip_prefix(prefix))
            .map(str::to_string)
    };
    let Some(subject) = dir_label(0, "sub-") else {
        return true;
    };
    if entities.get("subject") != Some(&subject) {
        return false;
    }
    match dir_label(1, "ses-") {
        Some(session) => entities.get("session") == Some(&session),
        None => true,
    }
}

fn load_sidecars(root: &Path, files: &[BidsFile]) -> Result<Vec<Sidecar>> {
    let mut sidecars = Vec::new();
    for file in files.iter().filter(|f| f.is_sidecar()) {
        let text = std::fs::read_to_string(&file.path).map_err(|e| PreviewError::io(&file.path, e))?;
        let fields = match serde_json::from_str::<JsonValue>(&text) {
            Ok(JsonValue::Object(fields)) => fields,
            Ok(_) => {
                log::warn!("Ignoring sidecar {}: not a JSON object", file.path.display());
                continue;
            }
            Err(e) => {
                log::warn!("Ignoring sidecar {}: {e}", file.path.display());
                continue;
            }
        };
        let dir = file
            .path
            .parent()
            .and_then(|p| p.strip_prefix(root).ok())
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let entities = file
            .entities
            .iter()
            .filter(|(k, _)| !STRUCTURAL_ENTITIES.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        sidecars.push(Sidecar {
            dir,
            suffix: file.entity("suffix").unwrap_or_default().to_string(),
            entities,
            fields,
        });
    }
    Ok(sidecars)
}

/// Apply the inheritance principle: every sidecar in the file's directory or
/// above with the same suffix and a subset of its entities contributes, the
/// least specific first.
fn attach_metadata(root: &Path, file: &mut BidsFile, sidecars: &[Sidecar]) {
    let dir = file
        .path
        .parent()
        .and_then(|p| p.strip_prefix(root).ok())
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let suffix = file.entity("suffix").unwrap_or_default();

    let mut applicable: Vec<&Sidecar> = sidecars
        .iter()
        .filter(|s| s.suffix == suffix && dir.starts_with(&s.dir))
        .filter(|s| {
            s.entities
                .iter()
                .all(|(k, v)| file.entities.get(k) == Some(v))
        })
        .collect();
    applicable.sort_by_key(|s| (s.dir.components().count(), s.entities.len()));

    for sidecar in applicable {
        for (key, value) in &sidecar.fields {
            file.metadata.insert(key.clone(), value.clone());
        }
    }
}

/// Read `participant_id` from `participants.tsv`, if the table exists.
fn read_participants(root: &Path) -> Result<Option<BTreeSet<String>>> {
    let path = root.join(PARTICIPANTS_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let table_error = |source| PreviewError::ParticipantsTable {
        path: path.clone(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(&path)
        .map_err(table_error)?;
    let Some(id_idx) = reader
        .headers()
        .map_err(table_error)?
        .iter()
        .position(|h| h == "participant_id")
    else {
        log::warn!("{} has no participant_id column", path.display());
        return Ok(None);
    };

    let mut listed = BTreeSet::new();
    for record in reader.records() {
        let record = record.map_err(table_error)?;
        if let Some(id) = record.get(id_idx) {
            let id = id.trim();
            listed.insert(id.strip_prefix("sub-").unwrap_or(id).to_string());
        }
    }
    Ok(Some(listed))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::data::model::EntityValue;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn dataset() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            DESCRIPTION_FILE,
            r#"{"Name": "test", "BIDSVersion": "1.8.0"}"#,
        );
        touch(root, "sub-01/anat/sub-01_T1w.nii.gz");
        touch(root, "sub-01/anat/sub-01_run-02_T1w.nii.gz");
        touch(root, "sub-01/dwi/sub-01_dir-AP_dwi.nii.gz");
        touch(root, "sub-01/dwi/sub-01_dir-PA_dwi.nii.gz");
        touch(root, "sub-01/dwi/sub-01_dir-AP_dwi.bval");
        touch(root, "sub-02/anat/sub-02_T1w.nii");
        touch(root, "derivatives/sub-01/anat/sub-01_T1w.nii.gz");
        touch(root, "sub-01/anat/.hidden_T1w.nii.gz");
        dir
    }

    fn query<'a>(filters: &'a EntityFilters, extensions: &'a [&'a str]) -> Query<'a> {
        Query {
            bucket: "test",
            subject: "01",
            extensions,
            entities: filters,
        }
    }

    #[test]
    fn parses_bids_names() {
        let parsed = parse_filename("sub-01_ses-pre_dir-AP_dwi.nii.gz").unwrap();
        assert_eq!(parsed.suffix, "dwi");
        assert_eq!(parsed.extension, ".nii.gz");
        assert_eq!(
            parsed.pairs,
            vec![
                ("sub".to_string(), "01".to_string()),
                ("ses".to_string(), "pre".to_string()),
                ("dir".to_string(), "AP".to_string())
            ]
        );
    }

    #[test]
    fn rejects_malformed_names() {
        assert!(parse_filename("dataset_description.json").is_none());
        assert!(parse_filename("sub-01_dir-_dwi.nii").is_none());
        assert!(parse_filename("sub-01_dir-AP.nii").is_none());
        assert!(parse_filename("sub-01__dwi.nii").is_none());
    }

    #[test]
    fn extension_normalization() {
        assert_eq!(normalize_extension("nii.gz", true), ".nii.gz");
        assert_eq!(normalize_extension(".nii.gz", true), ".nii.gz");
        assert_eq!(normalize_extension(".nii.gz", false), "nii.gz");
        assert_eq!(normalize_extension("", true), "");
    }

    #[test]
    fn skips_derivatives_and_hidden_files() {
        let dir = dataset();
        let layout = BidsLayout::new(dir.path(), LayoutConfig::default()).unwrap();
        assert!(layout
            .files()
            .iter()
            .all(|f| !f.path.to_string_lossy().contains("derivatives")
                && !f.path.to_string_lossy().contains(".hidden")));
        assert_eq!(
            layout.subjects(),
            BTreeSet::from(["01".to_string(), "02".to_string()])
        );
    }

    #[test]
    fn missing_description_fails_validation_only() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "sub-01/anat/sub-01_T1w.nii.gz");
        let err = BidsLayout::new(dir.path(), LayoutConfig::default()).unwrap_err();
        assert!(matches!(err, PreviewError::MissingDatasetDescription(_)));

        let config = LayoutConfig {
            validate: false,
            ..LayoutConfig::default()
        };
        let layout = BidsLayout::new(dir.path(), config).unwrap();
        assert_eq!(layout.files().len(), 1);
    }

    #[test]
    fn description_requires_mandatory_fields() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), DESCRIPTION_FILE, r#"{"Name": "x"}"#);
        let err = BidsLayout::new(dir.path(), LayoutConfig::default()).unwrap_err();
        assert!(matches!(err, PreviewError::InvalidDatasetDescription { .. }));
    }

    #[test]
    fn missing_root_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = BidsLayout::new(dir.path().join("absent"), LayoutConfig::default()).unwrap_err();
        assert!(matches!(err, PreviewError::DatasetNotFound(_)));
    }

    #[test]
    fn validation_rejects_misplaced_subjects() {
        let dir = dataset();
        touch(dir.path(), "sub-01/anat/sub-03_T1w.nii.gz");
        let layout = BidsLayout::new(dir.path(), LayoutConfig::default()).unwrap();
        assert!(!layout.subjects().contains("03"));
    }

    #[test]
    fn query_matches_entities_and_extensions() {
        let dir = dataset();
        let layout = BidsLayout::new(dir.path(), LayoutConfig::default()).unwrap();
        let filters = EntityFilters::from([
            ("datatype".to_string(), EntityValue::from("dwi")),
            ("direction".to_string(), EntityValue::from("AP")),
        ]);
        let found = layout.get(&query(&filters, &["nii", "nii.gz"])).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("sub-01/dwi/sub-01_dir-AP_dwi.nii.gz"));
    }

    #[test]
    fn query_without_dot_config_accepts_dotted_extensions() {
        let dir = dataset();
        let config = LayoutConfig {
            extension_initial_dot: false,
            ..LayoutConfig::default()
        };
        let layout = BidsLayout::new(dir.path(), config).unwrap();
        let filters = EntityFilters::from([("suffix".to_string(), EntityValue::from("dwi"))]);
        let found = layout.get(&query(&filters, &[".nii.gz"])).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn results_sort_by_full_path_string() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "sub-01/anat/sub-01_T1w.nii.gz");
        touch(dir.path(), "sub-01.old/anat/sub-01_T1w.nii.gz");
        let config = LayoutConfig {
            validate: false,
            ..LayoutConfig::default()
        };
        let layout = BidsLayout::new(dir.path(), config).unwrap();
        let filters = EntityFilters::from([("suffix".to_string(), EntityValue::from("T1w"))]);
        let found = layout.get(&query(&filters, &["nii.gz"])).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].to_string_lossy().contains("sub-01.old/"));
        assert!(found[1].ends_with("sub-01/anat/sub-01_T1w.nii.gz"));
    }

    #[test]
    fn absent_and_integer_constraints() {
        let dir = dataset();
        let layout = BidsLayout::new(dir.path(), LayoutConfig::default()).unwrap();

        let no_run = EntityFilters::from([
            ("suffix".to_string(), EntityValue::from("T1w")),
            ("run".to_string(), EntityValue::Absent),
        ]);
        let found = layout.get(&query(&no_run, &["nii.gz"])).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("sub-01_T1w.nii.gz"));

        let run_two = EntityFilters::from([("run".to_string(), EntityValue::from(2))]);
        let found = layout.get(&query(&run_two, &["nii.gz"])).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("sub-01_run-02_T1w.nii.gz"));
    }

    #[test]
    fn unknown_and_conflicting_keys_fail() {
        let dir = dataset();
        let layout = BidsLayout::new(dir.path(), LayoutConfig::default()).unwrap();

        let bogus = EntityFilters::from([("colour".to_string(), EntityValue::from("red"))]);
        let err = layout.get(&query(&bogus, &["nii.gz"])).unwrap_err();
        assert!(matches!(err, PreviewError::UnknownEntity { .. }));

        let subject = EntityFilters::from([("subject".to_string(), EntityValue::from("02"))]);
        let err = layout.get(&query(&subject, &["nii.gz"])).unwrap_err();
        assert!(matches!(err, PreviewError::ConflictingEntity { .. }));
    }

    #[test]
    fn sidecar_metadata_is_inherited() {
        let dir = dataset();
        write(
            dir.path(),
            "dwi.json",
            r#"{"PhaseEncodingDirection": "j", "TotalReadoutTime": 0.05}"#,
        );
        write(
            dir.path(),
            "sub-01/dwi/sub-01_dir-PA_dwi.json",
            r#"{"PhaseEncodingDirection": "j-"}"#,
        );
        let layout = BidsLayout::new(dir.path(), LayoutConfig::default()).unwrap();
        assert!(layout.is_known_key("PhaseEncodingDirection"));

        let filters = EntityFilters::from([(
            "PhaseEncodingDirection".to_string(),
            EntityValue::from("j-"),
        )]);
        let found = layout.get(&query(&filters, &["nii.gz"])).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("sub-01_dir-PA_dwi.nii.gz"));

        let filters = EntityFilters::from([("TotalReadoutTime".to_string(), EntityValue::Any)]);
        assert_eq!(layout.get(&query(&filters, &["nii.gz"])).unwrap().len(), 2);
    }

    #[test]
    fn participants_table_is_read() {
        let dir = dataset();
        write(dir.path(), PARTICIPANTS_FILE, "participant_id\tage\nsub-01\t30\n");
        let layout = BidsLayout::new(dir.path(), LayoutConfig::default()).unwrap();
        assert_eq!(
            layout.listed_participants(),
            Some(&BTreeSet::from(["01".to_string()]))
        );
    }
}
