use std::path::PathBuf;

use crate::error::Result;

use super::layout::{BidsLayout, LayoutConfig, Query};
use super::model::{Bucket, BucketFiles, FilterFile, MergedQuery, QueryTemplate, SubjectData};

/// Extensions every bucket is restricted to.
pub const NIFTI_EXTENSIONS: &[&str] = &["nii", "nii.gz"];

// ---------------------------------------------------------------------------
// Merge: template + filter file → per-bucket query
// ---------------------------------------------------------------------------

/// Lay the filter file over the template.
///
/// For each template bucket the filter's entities override or extend the base
/// entities; template keys the filter does not mention are kept. Filter
/// buckets that the template does not know are only recorded in
/// [`MergedQuery::unqueried`].
pub fn merge_filters(template: &QueryTemplate, filters: &FilterFile) -> MergedQuery {
    let buckets = template
        .buckets
        .iter()
        .map(|base| {
            let mut entities = base.entities.clone();
            if let Some(overrides) = filters.get(&base.name) {
                entities.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Bucket {
                name: base.name.clone(),
                entities,
            }
        })
        .collect();

    let unqueried: Vec<String> = filters
        .keys()
        .filter(|name| template.get(name).is_none())
        .cloned()
        .collect();
    for name in &unqueried {
        log::warn!(
            "Filter bucket '{name}' is not one of [{}] and will not be queried",
            template.bucket_names().collect::<Vec<_>>().join(", ")
        );
    }

    MergedQuery { buckets, unqueried }
}

// ---------------------------------------------------------------------------
// Execute: one query per bucket
// ---------------------------------------------------------------------------

/// Where [`collect_data`] gets its index from.
#[derive(Debug)]
pub enum LayoutSource {
    /// Index this dataset root first.
    Root(PathBuf, LayoutConfig),
    /// Reuse an index that was already built.
    Layout(BidsLayout),
}

impl From<BidsLayout> for LayoutSource {
    fn from(layout: BidsLayout) -> Self {
        LayoutSource::Layout(layout)
    }
}

impl LayoutSource {
    fn into_layout(self) -> Result<BidsLayout> {
        match self {
            LayoutSource::Root(root, config) => BidsLayout::new(root, config),
            LayoutSource::Layout(layout) => Ok(layout),
        }
    }
}

/// Query the dataset for every merged bucket and return the sorted matches,
/// together with the index that was used.
///
/// Errors from the index (invalid dataset, unknown entities) are passed
/// through unchanged; there is no partial result.
pub fn collect_data(
    source: impl Into<LayoutSource>,
    participant_label: &str,
    merged: &MergedQuery,
) -> Result<(SubjectData, BidsLayout)> {
    let layout = source.into().into_layout()?;

    if !layout.subjects().contains(participant_label) {
        log::warn!("No files indexed for participant sub-{participant_label}");
    }

    let mut buckets = Vec::with_capacity(merged.buckets.len());
    for bucket in &merged.buckets {
        let query = Query {
            bucket: &bucket.name,
            subject: participant_label,
            extensions: NIFTI_EXTENSIONS,
            entities: &bucket.entities,
        };
        let files = layout.get(&query)?;
        log::debug!("Bucket '{}': {} file(s)", bucket.name, files.len());
        buckets.push(BucketFiles {
            bucket: bucket.name.clone(),
            files,
        });
    }

    Ok((
        SubjectData {
            participant: participant_label.to_string(),
            buckets,
        },
        layout,
    ))
}
