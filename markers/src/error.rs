use thiserror::Error;

/// Errors produced by marker transforms.
#[derive(Error, Debug)]
pub enum MarkerError {
    /// Rotation requested without an angle.
    #[error("rotation angle must be supplied")]
    InvalidAngle,
}
