use std::fmt::Write;
use std::path::PathBuf;

use crate::data::model::SubjectData;

/// Render the bucket → file listing, one line per bucket in template order.
pub fn render_report(data: &SubjectData) -> String {
    let mut out = format!(
        "\n\n Filtered data for participant {}:\n\n",
        data.participant
    );
    for bucket in &data.buckets {
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{} \t:\t {}", bucket.bucket, format_list(&bucket.files));
    }
    out
}

fn format_list(files: &[PathBuf]) -> String {
    let items: Vec<String> = files
        .iter()
        .map(|p| format!("'{}'", p.display()))
        .collect();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::BucketFiles;

    #[test]
    fn renders_buckets_in_order() {
        let data = SubjectData {
            participant: "01".to_string(),
            buckets: vec![
                BucketFiles {
                    bucket: "t1w".to_string(),
                    files: vec![PathBuf::from("/d/a.nii.gz"), PathBuf::from("/d/b.nii.gz")],
                },
                BucketFiles {
                    bucket: "dwi".to_string(),
                    files: vec![],
                },
            ],
        };
        let text = render_report(&data);
        assert!(text.starts_with("\n\n Filtered data for participant 01:\n"));
        let lines: Vec<&str> = text.trim().lines().skip(1).filter(|l| !l.is_empty()).collect();
        assert_eq!(
            lines,
            [
                "t1w \t:\t ['/d/a.nii.gz', '/d/b.nii.gz']",
                "dwi \t:\t []"
            ]
        );
    }
}
