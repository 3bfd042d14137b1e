use std::path::PathBuf;

use clap::Parser;

use crate::data::filter::{collect_data, merge_filters, LayoutSource};
use crate::data::layout::LayoutConfig;
use crate::data::loader::load_filter_file;
use crate::data::model::SubjectData;
use crate::error::Result;
use crate::modality::PrepModality;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// BIDS validation and filter preview.
///
/// Filters are processed the way qsiprep and fmriprep process
/// `--bids-filter-file`. Running this can highlight obvious problems with
/// filters or let you experiment with advanced matching before launching a
/// full pipeline.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Cli {
    /// The directory with the input dataset formatted according to the BIDS standard.
    #[arg(long)]
    pub bids_dir: PathBuf,

    /// File containing BIDS filters.
    #[arg(long)]
    pub filter_file: PathBuf,

    /// The label of the participant that should be analyzed. The label
    /// corresponds to sub-<participant> from the BIDS spec (so it does not
    /// include "sub-").
    #[arg(long)]
    pub participant_label: String,

    /// The kind of modality prep to test the filter on. Options are fmri, qsi.
    #[arg(long)]
    pub prep_modality: String,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run one preview. Stages run in order and the first error aborts:
/// modality, filter file, dataset index, queries.
pub fn run(cli: &Cli) -> Result<SubjectData> {
    let modality: PrepModality = cli.prep_modality.parse()?;
    let template = modality.template();
    log::info!(
        "Using {modality} template with buckets [{}]",
        template.bucket_names().collect::<Vec<_>>().join(", ")
    );

    let filters = load_filter_file(&cli.filter_file)?;
    let merged = merge_filters(&template, &filters);

    let source = LayoutSource::Root(cli.bids_dir.clone(), LayoutConfig::default());
    let (data, _layout) = collect_data(source, &cli.participant_label, &merged)?;
    Ok(data)
}
