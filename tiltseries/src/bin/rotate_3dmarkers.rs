//! Rotate a 3D marker text file about the volume center.
//!
//! Without `--outfile` the input is rewritten in place and the original
//! is kept beside it with an `.orig` suffix.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use tiltseries::creator::rotate_markers_file;

#[derive(Parser, Debug)]
#[command(version, about = "Rotate a 3D marker text file")]
struct Args {
    /// Marker text file to rotate
    marker_file: PathBuf,

    /// Rotation angle in degrees
    #[arg(long, default_value_t = 90.0)]
    angle: f64,

    /// Volume width in pixels, rotation is about width/2
    #[arg(long, default_value_t = 1080.0)]
    width: f64,

    /// Volume height in pixels, rotation is about height/2
    #[arg(long, default_value_t = 1080.0)]
    height: f64,

    /// Write here instead of rewriting the input in place
    #[arg(long)]
    outfile: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    rotate_markers_file(
        &args.marker_file,
        args.angle,
        args.width,
        args.height,
        args.outfile.as_deref(),
    )
}
