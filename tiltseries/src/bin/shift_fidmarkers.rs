//! Shift every marker in an IMOD fiducial model.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use tiltseries::{FiducialReader, FiducialWriter};

#[derive(Parser, Debug)]
#[command(version, about = "Shift the markers in an IMOD fiducial model")]
struct Args {
    /// Input fiducial model
    input_fid: PathBuf,

    /// Output fiducial model
    output_fid: PathBuf,

    /// X shift in pixels
    #[arg(long, default_value_t = 360.0)]
    xshift: f64,

    /// Y shift in pixels
    #[arg(long, default_value_t = 360.0)]
    yshift: f64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut markers = FiducialReader::new(Some(args.input_fid))
        .read_markers()
        .context("reading fiducial model")?;
    info!("Shifting {} markers", markers.len());
    markers.shift_all(args.xshift, args.yshift, 0.0);

    FiducialWriter::new(Some(args.output_fid))
        .write_markers(Some(&markers))
        .context("writing shifted fiducial model")
}
