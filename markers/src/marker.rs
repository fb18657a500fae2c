//! Labeled 3D point markers and ordered marker collections.
//!
//! A `Marker` is a fiducial position inside a phantom volume, tagged with
//! the integer track index downstream alignment tools join on. Indices
//! are not unique within a set; two markers sharing an index are distinct
//! observations of the same track.

use log::{debug, warn};
use std::f64::consts::PI;

use crate::error::MarkerError;

/// A single fiducial marker: track index plus 3D position.
///
/// Any field may be absent, in which case the marker is invalid and
/// formats to nothing. Fields are fixed at construction; transforms
/// update coordinates in place but never clear them.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    index: Option<i64>,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
}

impl Marker {
    /// Create a valid marker with all four fields present.
    pub fn new(index: i64, x: f64, y: f64, z: f64) -> Self {
        Self {
            index: Some(index),
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }

    /// Create a marker from possibly-absent fields.
    pub fn from_parts(index: Option<i64>, x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Self {
        Self { index, x, y, z }
    }

    pub fn index(&self) -> Option<i64> {
        self.index
    }

    pub fn x(&self) -> Option<f64> {
        self.x
    }

    pub fn y(&self) -> Option<f64> {
        self.y
    }

    pub fn z(&self) -> Option<f64> {
        self.z
    }

    /// True when all four fields are present.
    pub fn is_valid(&self) -> bool {
        self.index.is_some() && self.x.is_some() && self.y.is_some() && self.z.is_some()
    }

    /// Rotate the (x, y) position by `theta` radians about the offset point.
    ///
    /// Translates by the negative offset, applies
    /// `x' = x·cosθ − y·sinθ`, `y' = x·sinθ + y·cosθ`, and translates
    /// back. `z` is untouched. No bounds check on `theta`.
    pub fn rotate(&mut self, theta: f64, x_offset: f64, y_offset: f64) {
        if let (Some(x), Some(y)) = (self.x, self.y) {
            let cx = x - x_offset;
            let cy = y - y_offset;
            self.x = Some(cx * theta.cos() - cy * theta.sin() + x_offset);
            self.y = Some(cx * theta.sin() + cy * theta.cos() + y_offset);
        }
    }

    /// Add the given deltas to each coordinate.
    pub fn shift(&mut self, dx: f64, dy: f64, dz: f64) {
        self.x = self.x.map(|x| x + dx);
        self.y = self.y.map(|y| y + dy);
        self.z = self.z.map(|z| z + dz);
    }

    /// Fixed-width text record, `None` when any field is absent.
    ///
    /// Index right-aligned in a 6-character field; each coordinate
    /// right-aligned in an 11-character field with 6 decimal places
    /// (fields grow for sign/magnitude). This is the join format for the
    /// downstream fiducial-model tools.
    pub fn format_record(&self) -> Option<String> {
        match (self.index, self.x, self.y, self.z) {
            (Some(index), Some(x), Some(y), Some(z)) => Some(format!(
                "{index:>6} {x:>11.6} {y:>11.6} {z:>11.6}"
            )),
            _ => None,
        }
    }
}

/// An ordered collection of markers.
///
/// Insertion order is significant and survives transforms and
/// serialization round-trips. Duplicate indices are legal and tracked
/// independently; the set never deduplicates.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MarkerSet {
    markers: Vec<Marker>,
}

impl MarkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a valid marker.
    pub fn add(&mut self, index: i64, x: f64, y: f64, z: f64) {
        self.markers.push(Marker::new(index, x, y, z));
    }

    /// Append a marker as-is, valid or not.
    pub fn push(&mut self, marker: Marker) {
        self.markers.push(marker);
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }

    /// Rotate every marker by `angle` degrees about the offset point.
    ///
    /// `None` angle is an error. An angle of 0 is the baseline rotation
    /// of the pipeline and a documented no-op: it logs and returns
    /// without touching state. Offsets default to 0 when unset. The
    /// angle is converted to radians and the same theta/offsets are
    /// applied to every member in order.
    pub fn rotate_all(
        &mut self,
        angle: Option<f64>,
        x_offset: Option<f64>,
        y_offset: Option<f64>,
    ) -> Result<(), MarkerError> {
        let angle = angle.ok_or(MarkerError::InvalidAngle)?;

        if angle == 0.0 {
            warn!("rotation angle is 0, nothing to do");
            return Ok(());
        }

        let x_off = x_offset.unwrap_or(0.0);
        let y_off = y_offset.unwrap_or(0.0);
        let theta = 2.0 * PI * angle / 360.0;
        debug!("angle = {angle} theta = {theta} xoffset = {x_off} yoffset = {y_off}");

        for m in &mut self.markers {
            m.rotate(theta, x_off, y_off);
        }
        Ok(())
    }

    /// Shift every marker by the given deltas, in order.
    pub fn shift_all(&mut self, dx: f64, dy: f64, dz: f64) {
        for m in &mut self.markers {
            m.shift(dx, dy, dz);
        }
    }
}

impl<'a> IntoIterator for &'a MarkerSet {
    type Item = &'a Marker;
    type IntoIter = std::slice::Iter<'a, Marker>;

    fn into_iter(self) -> Self::IntoIter {
        self.markers.iter()
    }
}
