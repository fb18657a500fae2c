//! Fiducial marker bookkeeping for simulated tilt series
//!
//! This crate provides the marker model used by the phantom tilt-series
//! pipeline: labeled 3D points with rotate/shift transforms, the
//! fixed-width text format they are persisted in, and the filter that
//! reconciles marker tracks across independently generated rotations.

pub mod codec;
pub mod common;
pub mod error;
pub mod marker;

// Re-exports for easier access
pub use common::CommonMarkerFilter;
pub use error::MarkerError;
pub use marker::{Marker, MarkerSet};
