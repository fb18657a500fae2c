//! Generate simulated electron-tomography tilt series.
//!
//! Runs the full pipeline: prepare the input volume, build one tilt
//! series per rotation angle, reconcile the fiducial markers across
//! rotations, and collect the aligned results under `result/`.

use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::thread;

use tiltseries::{TiltSeriesConfig, TiltSeriesCreator};

#[derive(Parser, Debug)]
#[command(version, about = "Simulated tilt-series generator")]
struct Args {
    /// Input MRC volume
    input_mrc_file: PathBuf,

    /// Directory to build the tilt series under
    output_directory: PathBuf,

    /// Starting tilt angle in degrees
    #[arg(long, default_value_t = -60.0, allow_hyphen_values = true)]
    begin_tilt: f64,

    /// Ending tilt angle in degrees
    #[arg(long, default_value_t = 60.0)]
    end_tilt: f64,

    /// Degrees between consecutive tilts
    #[arg(long, default_value_t = 2.0)]
    tilt_shift: f64,

    /// Cores handed to mpiexec, defaults to every available core
    #[arg(long)]
    cores: Option<usize>,

    /// mpiexec binary used to launch the ETSpec tools
    #[arg(long, default_value = "mpiexec")]
    mpiexec: String,

    /// Number of fiducial markers to embed
    #[arg(long, default_value_t = 20)]
    num_markers: usize,

    /// Bottom marker size in pixels
    #[arg(long, default_value_t = 7)]
    bottom_marker_size: u32,

    /// Top marker size in pixels
    #[arg(long, default_value_t = 9)]
    top_marker_size: u32,

    /// Marker noise level
    #[arg(long, default_value_t = 0.0)]
    marker_noise: f64,

    /// ETSpec marker b parameter
    #[arg(long, default_value_t = 0.2)]
    a_param: f64,

    /// ETSpec marker A parameter
    #[arg(long, default_value_t = 0.98)]
    marker_a: f64,

    /// Shrinkage parameter of the projection stage
    #[arg(long, default_value_t = 0.0005)]
    shrinkage: f64,

    /// Max-angle parameter of the projection stage
    #[arg(long, default_value_t = 0.0004)]
    proj_max_angle: f64,

    /// Distribute this many rotations evenly instead of using
    /// --rotation-angles
    #[arg(long)]
    num_rotations: Option<usize>,

    /// Comma-delimited rotation angles in (0, 180]; 0 is always run
    #[arg(long, default_value = "")]
    rotation_angles: String,

    /// Directory holding the ETSpec binaries, empty means $PATH
    #[arg(long, default_value = "")]
    etspec_bin: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let cores = args
        .cores
        .or_else(|| thread::available_parallelism().ok().map(|n| n.get()));

    let config = TiltSeriesConfig {
        output_directory: args.output_directory,
        input_mrc_file: args.input_mrc_file,
        begin_tilt: args.begin_tilt,
        end_tilt: args.end_tilt,
        tilt_shift: args.tilt_shift,
        cores,
        mpiexec: args.mpiexec,
        num_markers: args.num_markers,
        bottom_marker_size: args.bottom_marker_size,
        top_marker_size: args.top_marker_size,
        marker_noise: args.marker_noise,
        a_param: args.a_param,
        marker_a: args.marker_a,
        shrinkage: args.shrinkage,
        proj_max_angle: args.proj_max_angle,
        num_rotations: args.num_rotations,
        rotation_angles: args.rotation_angles,
        etspec_bin: args.etspec_bin,
    };

    let mut creator = TiltSeriesCreator::new(config)?;
    creator.initialize()?;
    creator.prepare()?;
    creator.create_tiltseries()?;
    info!("Tilt series written to {}", creator.result_dir().display());
    Ok(())
}
