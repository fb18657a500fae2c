//! Bridging between marker text files and IMOD fiducial models.
//!
//! IMOD's `model2point` and `point2model` convert between its binary
//! fiducial model format and the text records the rest of the pipeline
//! works with. Both directions stage the text file in a temporary
//! directory so callers only ever see the fiducial file and a
//! `MarkerSet`.

use log::warn;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;

use markers::{codec, MarkerSet};

use crate::command::run_external_command;

const MODEL2POINT: &str = "model2point";
const POINT2MODEL: &str = "point2model";

/// Errors produced by fiducial-file reads and writes.
#[derive(Error, Debug)]
pub enum FiducialError {
    /// A write was requested but no fiducial file is set.
    #[error("fiducial file is not set")]
    UnsetDestination,

    /// A marker set was required but not supplied.
    #[error("marker set must be supplied")]
    UnsetMarkerSet,

    /// An IMOD conversion binary exited nonzero.
    #[error("{binary} exited with code {exit_code}: {stderr}")]
    CommandFailed {
        binary: String,
        exit_code: i32,
        stderr: String,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Reads markers out of an IMOD fiducial file via `model2point`.
#[derive(Debug, Clone)]
pub struct FiducialReader {
    fiducial_file: Option<PathBuf>,
    binary: String,
}

impl FiducialReader {
    pub fn new(fiducial_file: Option<PathBuf>) -> Self {
        Self {
            fiducial_file,
            binary: MODEL2POINT.to_string(),
        }
    }

    pub fn fiducial_file(&self) -> Option<&Path> {
        self.fiducial_file.as_deref()
    }

    pub fn set_fiducial_file(&mut self, fiducial_file: Option<PathBuf>) {
        self.fiducial_file = fiducial_file;
    }

    /// Use an alternate `model2point` binary.
    pub fn set_model2point_binary(&mut self, binary: impl Into<String>) {
        self.binary = binary.into();
    }

    /// Extract the markers from the fiducial file.
    ///
    /// An unset or nonexistent fiducial file yields an empty set with a
    /// warning; a failing conversion binary is an error.
    pub fn read_markers(&self) -> Result<MarkerSet, FiducialError> {
        let Some(fid_file) = self.fiducial_file.as_deref() else {
            warn!("Fiducial file is not set");
            return Ok(MarkerSet::new());
        };
        if !fid_file.is_file() {
            warn!("Fiducial file path does not point to a file");
            return Ok(MarkerSet::new());
        }

        let temp_dir = TempDir::new()?;
        let out_file = temp_dir.path().join("temp.txt");

        let args = [
            "-float".to_string(),
            "-contour".to_string(),
            fid_file.display().to_string(),
            out_file.display().to_string(),
        ];
        let output = run_external_command(&self.binary, &args);
        if !output.success() {
            return Err(FiducialError::CommandFailed {
                binary: self.binary.clone(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        Ok(codec::read_markers_file(&out_file)?)
    }
}

/// Writes markers into an IMOD fiducial file via `point2model`.
#[derive(Debug, Clone)]
pub struct FiducialWriter {
    fiducial_file: Option<PathBuf>,
    binary: String,
}

impl FiducialWriter {
    pub fn new(fiducial_file: Option<PathBuf>) -> Self {
        Self {
            fiducial_file,
            binary: POINT2MODEL.to_string(),
        }
    }

    pub fn fiducial_file(&self) -> Option<&Path> {
        self.fiducial_file.as_deref()
    }

    pub fn set_fiducial_file(&mut self, fiducial_file: Option<PathBuf>) {
        self.fiducial_file = fiducial_file;
    }

    /// Use an alternate `point2model` binary.
    pub fn set_point2model_binary(&mut self, binary: impl Into<String>) {
        self.binary = binary.into();
    }

    /// Build the fiducial file from the given markers.
    ///
    /// An unset destination or absent marker set is a contract
    /// violation surfaced as a typed error, never silently defaulted.
    pub fn write_markers(&self, markers: Option<&MarkerSet>) -> Result<(), FiducialError> {
        let Some(fid_file) = self.fiducial_file.as_deref() else {
            return Err(FiducialError::UnsetDestination);
        };
        let markers = markers.ok_or(FiducialError::UnsetMarkerSet)?;

        let temp_dir = TempDir::new()?;
        let tmp_file = temp_dir.path().join("out.txt");
        codec::write_markers_file(markers, &tmp_file)?;

        let args = [
            "-circle".to_string(),
            "6".to_string(),
            tmp_file.display().to_string(),
            fid_file.display().to_string(),
        ];
        let output = run_external_command(&self.binary, &args);
        if !output.success() {
            return Err(FiducialError::CommandFailed {
                binary: self.binary.clone(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    /// Drop a fake conversion script into `dir` that copies its third
    /// argument to its fourth, standing in for model2point/point2model.
    fn write_fake_converter(dir: &Path) -> PathBuf {
        let script = dir.join("fake_convert.sh");
        fs::write(&script, "#!/bin/sh\ncp \"$3\" \"$4\"\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[test]
    fn test_reader_unset_file_is_empty() {
        let reader = FiducialReader::new(None);
        assert!(reader.read_markers().unwrap().is_empty());
    }

    #[test]
    fn test_reader_nonexistent_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let reader = FiducialReader::new(Some(temp_dir.path().join("noexist.fid")));
        assert!(reader.read_markers().unwrap().is_empty());
    }

    #[test]
    fn test_reader_get_set() {
        let mut reader = FiducialReader::new(None);
        assert_eq!(reader.fiducial_file(), None);
        reader.set_fiducial_file(Some(PathBuf::from("/foo")));
        assert_eq!(reader.fiducial_file(), Some(Path::new("/foo")));
        reader.set_fiducial_file(None);
        assert_eq!(reader.fiducial_file(), None);
    }

    #[test]
    fn test_reader_model2point_failure() {
        let temp_dir = TempDir::new().unwrap();
        let fid_file = temp_dir.path().join("somefile.fid");
        fs::write(&fid_file, "").unwrap();

        let mut reader = FiducialReader::new(Some(fid_file));
        reader.set_model2point_binary("false");
        match reader.read_markers() {
            Err(FiducialError::CommandFailed { binary, .. }) => assert_eq!(binary, "false"),
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_reader_with_fake_binary() {
        let temp_dir = TempDir::new().unwrap();
        let script = write_fake_converter(temp_dir.path());

        // "fiducial" file already holding text records; the fake
        // converter just copies it to the requested output
        let fid_file = temp_dir.path().join("tracks.fid");
        fs::write(
            &fid_file,
            concat!(
                "     1  442.000000  633.000000   12.000000\n",
                "     2  452.000000  485.000000   12.000000\n"
            ),
        )
        .unwrap();

        let mut reader = FiducialReader::new(Some(fid_file));
        reader.set_model2point_binary(script.display().to_string());
        let markers = reader.read_markers().unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers.markers()[0].index(), Some(1));
        assert_eq!(markers.markers()[1].x(), Some(452.0));
    }

    #[test]
    fn test_writer_unset_destination() {
        let writer = FiducialWriter::new(None);
        let markers = MarkerSet::new();
        assert!(matches!(
            writer.write_markers(Some(&markers)),
            Err(FiducialError::UnsetDestination)
        ));
    }

    #[test]
    fn test_writer_missing_markers() {
        let writer = FiducialWriter::new(Some(PathBuf::from("/tmp/out.fid")));
        assert!(matches!(
            writer.write_markers(None),
            Err(FiducialError::UnsetMarkerSet)
        ));
    }

    #[test]
    fn test_writer_point2model_failure() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = FiducialWriter::new(Some(temp_dir.path().join("out.fid")));
        writer.set_point2model_binary("false");
        let mut markers = MarkerSet::new();
        markers.add(1, 2.0, 3.0, 4.0);
        assert!(matches!(
            writer.write_markers(Some(&markers)),
            Err(FiducialError::CommandFailed { .. })
        ));
    }

    #[test]
    fn test_writer_with_fake_binary() {
        let temp_dir = TempDir::new().unwrap();
        let script = write_fake_converter(temp_dir.path());
        let fid_file = temp_dir.path().join("out.fid");

        let mut markers = MarkerSet::new();
        markers.add(1, 2.0, 3.0, 4.0);
        markers.add(2, 3.0, 4.0, 5.0);

        let mut writer = FiducialWriter::new(Some(fid_file.clone()));
        writer.set_point2model_binary(script.display().to_string());
        writer.write_markers(Some(&markers)).unwrap();

        // fake converter copied the staged text file to the destination
        let round_trip = codec::read_markers_file(&fid_file).unwrap();
        assert_eq!(round_trip, markers);
    }
}
