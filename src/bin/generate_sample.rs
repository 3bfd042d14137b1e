use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;

/// Write a small BIDS dataset and a filter file to try the preview on.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory to create the dataset in.
    #[arg(default_value = "sample_bids")]
    out_dir: PathBuf,
}

/// Empty placeholder files; only names matter to the preview.
const DATA_FILES: &[&str] = &[
    "sub-01/anat/sub-01_T1w.nii.gz",
    "sub-01/anat/sub-01_rec-norm_T1w.nii.gz",
    "sub-01/anat/sub-01_T2w.nii.gz",
    "sub-01/dwi/sub-01_dir-AP_dwi.nii.gz",
    "sub-01/dwi/sub-01_dir-AP_dwi.bval",
    "sub-01/dwi/sub-01_dir-AP_dwi.bvec",
    "sub-01/dwi/sub-01_dir-PA_dwi.nii.gz",
    "sub-01/dwi/sub-01_dir-PA_dwi.bval",
    "sub-01/dwi/sub-01_dir-PA_dwi.bvec",
    "sub-01/fmap/sub-01_dir-AP_epi.nii.gz",
    "sub-01/fmap/sub-01_dir-PA_epi.nii.gz",
    "sub-01/func/sub-01_task-rest_bold.nii.gz",
    "sub-01/func/sub-01_task-rest_sbref.nii.gz",
    "sub-02/anat/sub-02_T1w.nii.gz",
    "sub-02/dwi/sub-02_dir-AP_dwi.nii.gz",
];

fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let root = args.out_dir.as_path();

    for rel in DATA_FILES {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&path, b"").with_context(|| format!("writing {}", path.display()))?;
    }

    write_json(
        &root.join("dataset_description.json"),
        &json!({ "Name": "Filter preview sample", "BIDSVersion": "1.8.0" }),
    )?;
    write_json(
        &root.join("dwi.json"),
        &json!({ "PhaseEncodingDirection": "j", "TotalReadoutTime": 0.05 }),
    )?;
    write_json(
        &root.join("sub-01/dwi/sub-01_dir-PA_dwi.json"),
        &json!({ "PhaseEncodingDirection": "j-" }),
    )?;
    fs::write(
        root.join("participants.tsv"),
        "participant_id\tage\nsub-01\t34\nsub-02\t29\n",
    )
    .context("writing participants.tsv")?;

    let filter_path = root.join("filter.json");
    write_json(
        &filter_path,
        &json!({
            "t1w": { "reconstruction": null },
            "dwi": { "direction": "AP" },
            "fmap": { "direction": "*" }
        }),
    )?;

    println!(
        "Wrote {} data files to {} and a sample filter to {}",
        DATA_FILES.len(),
        root.display(),
        filter_path.display()
    );
    println!(
        "Try: bids-filter-preview --bids-dir {} --filter-file {} --participant-label 01 --prep-modality qsi",
        root.display(),
        filter_path.display()
    );
    Ok(())
}
