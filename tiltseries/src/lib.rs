//! Phantom tilt-series generation pipeline.
//!
//! Drives the external ETSpec and IMOD tool chains to build simulated
//! electron-tomography tilt series from an input MRC volume: prepare the
//! volume, generate one tilt series per rotation angle, reconcile the
//! fiducial marker tracks across rotations, and collect the aligned
//! results for downstream model building.

pub mod command;
pub mod creator;
pub mod fiducial;
pub mod planning;

pub use command::{run_external_command, run_mpiexec_command, CommandOutput};
pub use creator::{TiltSeriesConfig, TiltSeriesCreator};
pub use fiducial::{FiducialError, FiducialReader, FiducialWriter};
