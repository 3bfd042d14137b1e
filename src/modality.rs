use std::fmt;
use std::str::FromStr;

use crate::data::model::{Bucket, QueryTemplate};
use crate::error::PreviewError;

// ---------------------------------------------------------------------------
// Preprocessing modality → query template
// ---------------------------------------------------------------------------

/// Which preprocessing pipeline's inputs to preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepModality {
    /// fMRIPrep.
    Fmri,
    /// QSIPrep.
    Qsi,
}

impl PrepModality {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrepModality::Fmri => "fmri",
            PrepModality::Qsi => "qsi",
        }
    }

    /// The pipeline's base query per bucket. A fresh template every call.
    pub fn template(&self) -> QueryTemplate {
        let fmap = Bucket::new("fmap", [("datatype", "fmap")]);
        let sbref = Bucket::new("sbref", [("datatype", "func"), ("suffix", "sbref")]);
        let flair = Bucket::new("flair", [("datatype", "anat"), ("suffix", "FLAIR")]);
        let t2w = Bucket::new("t2w", [("datatype", "anat"), ("suffix", "T2w")]);
        let t1w = Bucket::new("t1w", [("datatype", "anat"), ("suffix", "T1w")]);
        let roi = Bucket::new("roi", [("datatype", "anat"), ("suffix", "roi")]);

        let buckets = match self {
            PrepModality::Qsi => {
                let dwi = Bucket::new("dwi", [("datatype", "dwi"), ("suffix", "dwi")]);
                vec![fmap, sbref, flair, t2w, t1w, roi, dwi]
            }
            PrepModality::Fmri => {
                let bold = Bucket::new("bold", [("datatype", "func"), ("suffix", "bold")]);
                vec![fmap, bold, sbref, flair, t2w, t1w, roi]
            }
        };
        QueryTemplate { buckets }
    }
}

impl FromStr for PrepModality {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fmri" => Ok(PrepModality::Fmri),
            "qsi" => Ok(PrepModality::Qsi),
            other => Err(PreviewError::UnsupportedModality(other.to_string())),
        }
    }
}

impl fmt::Display for PrepModality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
