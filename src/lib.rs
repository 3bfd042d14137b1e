//! Preview how a JSON BIDS filter file selects the inputs of a qsiprep or
//! fmriprep style pipeline for one participant.

pub mod app;
pub mod data;
pub mod error;
pub mod modality;
pub mod report;

pub use error::{PreviewError, Result};
