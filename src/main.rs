use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueHint};
use log::info;

use lidar_quicklook::pipeline;

#[derive(Parser, Debug)]
#[command(author, version, about = "Time/altitude quick-look plots from lidar JSON files", long_about = None)]
struct Cli {
    /// Directory that receives one subdirectory per altitude range
    #[arg(value_hint = ValueHint::DirPath)]
    outdir: PathBuf,

    /// Input JSON files, in chronological order
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let summary = pipeline::run(&cli.outdir, &cli.inputs)?;
    info!(
        "merged {} files, wrote {} images ({} metadata discrepancies)",
        summary.files,
        summary.images.len(),
        summary.discrepancies.len()
    );
    Ok(())
}
