use anyhow::Context;
use clap::Parser;

use bids_filter_preview::app::{self, Cli};
use bids_filter_preview::report::render_report;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let data = app::run(&cli).with_context(|| {
        format!(
            "previewing {} with filter file {}",
            cli.bids_dir.display(),
            cli.filter_file.display()
        )
    })?;

    print!("{}", render_report(&data));
    Ok(())
}
