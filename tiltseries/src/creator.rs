//! Multi-stage tilt-series creation.
//!
//! One `TiltSeriesCreator` run prepares the input volume, generates a
//! tilt series per rotation angle (each stage an external ETSpec or
//! IMOD binary working on files), reconciles marker tracks across the
//! rotations, and collects the per-rotation outputs into a result
//! directory for downstream model building.
//!
//! Rotations are independent until the reconciliation barrier: the
//! per-rotation generation fans out in parallel, the common-index
//! filter is built once over every rotation's tracking output, and the
//! partition/write pass fans out again.

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use markers::{codec, CommonMarkerFilter, MarkerSet};

use crate::command::{run_external_command, run_mpiexec_command};
use crate::fiducial::{FiducialReader, FiducialWriter};
use crate::planning::{assemble_rotation_angles, tilt_series_label};

const MRC_EXT: &str = ".mrc";
const UNI_MRC_EXT: &str = "_uni.mrc";
const EXT_MEAN_EXT: &str = "_ext_mean.mrc";
const RAW_TLT_EXT: &str = ".rawtlt";
const WARPZ_EXT: &str = "_warpz_0.mrc";
const MARKER_MRC_EXT: &str = "_marker_0.mrc";
const PAR_EXT: &str = ".par";
const PRO_EXT: &str = ".pro";
const LOG_EXT: &str = ".log";
const FID_EXT: &str = ".fid";
const PREALI_EXT: &str = ".preali";
const PROJECTION: &str = "_projection";
const PROJECTION_CLIP: &str = "_projection_clip";

pub const PREPARED_DIR_NAME: &str = "prepared";
pub const WARPZ_DIR_NAME: &str = "warpz";
pub const MARKER_DIR_NAME: &str = "marker";
pub const PROJECTION_DIR_NAME: &str = "projection";
pub const TRACKING_DIR_NAME: &str = "tracking";
pub const TILTSERIES_DIR_NAME: &str = "tiltseries";
pub const RESULT_DIR_NAME: &str = "result";

pub const THREE_D_MARKERS_TXT: &str = "3Dmarkers.txt";
pub const OFFSET_ALL_TXT: &str = "offset_all.txt";
pub const TWO_D_MARKERS_ALL_TXT: &str = "2Dmarkers_all.txt";
pub const TWO_D_MARKERS_ALL_FID: &str = "2Dmarkers_all.fid";
pub const TWO_D_MARKERS_COMMON_TXT: &str = "2Dmarkers_common.txt";

/// Rotations this close to zero reuse the unrotated prepared volume.
const ROTATION_EPSILON: f64 = 0.001;

/// Everything one pipeline run needs to know up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TiltSeriesConfig {
    /// Directory the run builds its stage tree under.
    pub output_directory: PathBuf,
    /// Input MRC volume.
    pub input_mrc_file: PathBuf,
    /// Starting tilt angle in degrees.
    pub begin_tilt: f64,
    /// Ending tilt angle in degrees.
    pub end_tilt: f64,
    /// Degrees between consecutive tilts.
    pub tilt_shift: f64,
    /// Worker count handed to mpiexec; 1 when unset.
    pub cores: Option<usize>,
    /// mpiexec binary to launch the ETSpec tools with.
    pub mpiexec: String,
    /// Number of fiducial markers to embed.
    pub num_markers: usize,
    /// Bottom marker size in pixels.
    pub bottom_marker_size: u32,
    /// Top marker size in pixels.
    pub top_marker_size: u32,
    /// Marker noise level.
    pub marker_noise: f64,
    /// ETSpec marker `b` parameter.
    pub a_param: f64,
    /// ETSpec marker `A` parameter.
    pub marker_a: f64,
    /// Shrinkage parameter of the projection stage.
    pub shrinkage: f64,
    /// Max-angle parameter of the projection stage.
    pub proj_max_angle: f64,
    /// When set, rotation angles are distributed evenly and
    /// `rotation_angles` is ignored.
    pub num_rotations: Option<usize>,
    /// Comma-delimited explicit rotation angles; 0 is always included.
    pub rotation_angles: String,
    /// Directory holding the ETSpec binaries; empty means `$PATH`.
    pub etspec_bin: PathBuf,
}

/// Stage directories inside one working copy of the prepared tree.
#[derive(Debug, Clone)]
pub struct StageLayout {
    workdir: PathBuf,
}

impl StageLayout {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn warpz_dir(&self) -> PathBuf {
        self.workdir.join(WARPZ_DIR_NAME)
    }

    pub fn marker_dir(&self) -> PathBuf {
        self.workdir.join(MARKER_DIR_NAME)
    }

    pub fn projection_dir(&self) -> PathBuf {
        self.workdir.join(PROJECTION_DIR_NAME)
    }

    pub fn tracking_dir(&self) -> PathBuf {
        self.workdir.join(TRACKING_DIR_NAME)
    }
}

/// Orchestrates one tilt-series pipeline run.
pub struct TiltSeriesCreator {
    config: TiltSeriesConfig,
    out_dir: PathBuf,
    input_mrc: PathBuf,
    etspec_bin: Option<PathBuf>,
    mrc_name: String,
    rotation_angles: Vec<f64>,
}

impl TiltSeriesCreator {
    pub fn new(config: TiltSeriesConfig) -> Result<Self> {
        let input_mrc = std::path::absolute(&config.input_mrc_file)
            .with_context(|| format!("bad input path {}", config.input_mrc_file.display()))?;

        let etspec_bin = if config.etspec_bin.as_os_str().is_empty() {
            None
        } else {
            Some(std::path::absolute(&config.etspec_bin)?)
        };

        let input_name = input_mrc
            .file_name()
            .and_then(|n| n.to_str())
            .context("input MRC file has no usable name")?;
        let mrc_name = input_name
            .strip_suffix(MRC_EXT)
            .unwrap_or(input_name)
            .to_string();

        let out_dir = std::path::absolute(&config.output_directory)?;

        Ok(Self {
            config,
            out_dir,
            input_mrc,
            etspec_bin,
            mrc_name,
            rotation_angles: Vec::new(),
        })
    }

    /// Create the output tree and plan the rotation angles.
    pub fn initialize(&mut self) -> Result<()> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("creating {}", self.out_dir.display()))?;
        fs::create_dir_all(self.prepared_dir())?;

        self.rotation_angles =
            assemble_rotation_angles(&self.config.rotation_angles, self.config.num_rotations);
        info!("Processing {} rotations", self.rotation_angles.len());
        for r in &self.rotation_angles {
            info!("Rotation: {r}");
        }
        Ok(())
    }

    pub fn rotation_angles(&self) -> &[f64] {
        &self.rotation_angles
    }

    pub fn mrc_name(&self) -> &str {
        &self.mrc_name
    }

    pub fn prepared_dir(&self) -> PathBuf {
        self.out_dir.join(PREPARED_DIR_NAME)
    }

    pub fn result_dir(&self) -> PathBuf {
        self.out_dir.join(RESULT_DIR_NAME)
    }

    fn rotation_dir(&self, rotation: f64) -> PathBuf {
        self.out_dir
            .join(format!("{rotation}_{TILTSERIES_DIR_NAME}"))
    }

    // Derived file names, all keyed off the input volume's base name.

    fn uni_mrc_name(&self) -> String {
        format!("{}{UNI_MRC_EXT}", self.mrc_name)
    }

    fn ext_mean_mrc_name(&self) -> String {
        format!("{}{EXT_MEAN_EXT}", self.mrc_name)
    }

    fn rawtlt_name(&self) -> String {
        format!("{}{RAW_TLT_EXT}", self.mrc_name)
    }

    fn warpz_mrc_name(&self) -> String {
        format!("{}{WARPZ_EXT}", self.mrc_name)
    }

    fn marker_mrc_name(&self) -> String {
        format!("{}{MARKER_MRC_EXT}", self.mrc_name)
    }

    fn projection_mrc_name(&self) -> String {
        format!("{}{PROJECTION}{MRC_EXT}", self.mrc_name)
    }

    fn projection_clip_mrc_name(&self) -> String {
        format!("{}{PROJECTION_CLIP}{MRC_EXT}", self.mrc_name)
    }

    fn projection_clip_fid_name(&self) -> String {
        format!("{}{PROJECTION_CLIP}{FID_EXT}", self.mrc_name)
    }

    fn projection_fid_name(&self) -> String {
        format!("{}{PROJECTION}{FID_EXT}", self.mrc_name)
    }

    fn etspec_tool(&self, tool: &str) -> String {
        match &self.etspec_bin {
            Some(dir) => dir.join(tool).display().to_string(),
            None => tool.to_string(),
        }
    }

    fn number_of_tilts(&self) -> i64 {
        let (largest, smallest) = if self.config.begin_tilt > self.config.end_tilt {
            (self.config.begin_tilt, self.config.end_tilt)
        } else {
            (self.config.end_tilt, self.config.begin_tilt)
        };
        ((largest - smallest) / self.config.tilt_shift).ceil() as i64
    }

    fn run_mpi_tool(&self, tool: &str, args: Vec<String>, cores: Option<usize>) -> Result<()> {
        let output = run_mpiexec_command(&self.etspec_tool(tool), &args, &self.config.mpiexec, cores);
        if !output.success() {
            bail!("Unable to run {tool}: {}", output.stderr);
        }
        Ok(())
    }

    fn run_tool(tool: &str, args: Vec<String>) -> Result<()> {
        let output = run_external_command(tool, &args);
        if !output.success() {
            bail!("Unable to run {tool}: {}", output.stderr);
        }
        Ok(())
    }

    /// Run the preparation stages in `prepared/`.
    ///
    /// Normalizes the volume, extends it, writes the raw tilt file,
    /// warps, embeds markers, and records the ETSpec parameter and
    /// project files.
    pub fn prepare(&self) -> Result<()> {
        let layout = StageLayout::new(self.prepared_dir());
        self.run_all_255(&layout)?;
        self.run_extend_mean(&layout)?;
        self.run_raw_tilt(&layout)?;
        self.run_warpz(&layout)?;
        self.run_volume_marker(&layout)?;
        self.write_parameter_file(layout.workdir())?;
        self.write_prepared_project_file(layout.workdir())?;
        Ok(())
    }

    fn run_all_255(&self, layout: &StageLayout) -> Result<()> {
        self.run_mpi_tool(
            "all_255",
            vec![
                self.input_mrc.display().to_string(),
                layout.workdir().join(self.uni_mrc_name()).display().to_string(),
            ],
            self.config.cores,
        )
    }

    fn run_extend_mean(&self, layout: &StageLayout) -> Result<()> {
        self.run_mpi_tool(
            "extend_mean",
            vec![
                layout.workdir().join(self.uni_mrc_name()).display().to_string(),
                layout
                    .workdir()
                    .join(self.ext_mean_mrc_name())
                    .display()
                    .to_string(),
            ],
            self.config.cores,
        )
    }

    fn run_raw_tilt(&self, layout: &StageLayout) -> Result<()> {
        self.run_mpi_tool(
            "rawtlt",
            vec![
                self.config.begin_tilt.to_string(),
                self.config.tilt_shift.to_string(),
                self.config.end_tilt.to_string(),
                layout.workdir().join(self.rawtlt_name()).display().to_string(),
            ],
            Some(1),
        )
    }

    fn run_warpz(&self, layout: &StageLayout) -> Result<()> {
        let warpz_dir = layout.warpz_dir();
        fs::create_dir_all(&warpz_dir)?;

        let ext_mean = layout
            .workdir()
            .join(self.ext_mean_mrc_name())
            .display()
            .to_string();
        let mut args = vec![
            ext_mean.clone(),
            ext_mean,
            warpz_dir.join(self.warpz_mrc_name()).display().to_string(),
            self.number_of_tilts().to_string(),
        ];
        args.extend(["0", "0", "0", "0"].map(String::from));
        self.run_mpi_tool("warpZ_inter_del", args, self.config.cores)
    }

    fn run_volume_marker(&self, layout: &StageLayout) -> Result<()> {
        let marker_dir = layout.marker_dir();
        fs::create_dir_all(&marker_dir)?;

        let mut args = vec![
            layout
                .workdir()
                .join(self.ext_mean_mrc_name())
                .display()
                .to_string(),
            layout
                .warpz_dir()
                .join(self.warpz_mrc_name())
                .display()
                .to_string(),
            marker_dir.join(self.marker_mrc_name()).display().to_string(),
            self.config.num_markers.to_string(),
            self.config.bottom_marker_size.to_string(),
            self.config.top_marker_size.to_string(),
            self.config.marker_noise.to_string(),
            self.number_of_tilts().to_string(),
        ];
        args.extend(["0", "0", "0", "0", "0"].map(String::from));
        args.push(self.config.marker_a.to_string());
        args.push(self.config.a_param.to_string());
        self.run_mpi_tool("volume_marker", args, self.config.cores)
    }

    fn write_parameter_file(&self, workdir: &Path) -> Result<()> {
        let path = workdir.join(format!("{}{PAR_EXT}", self.mrc_name));
        let c = &self.config;
        // float keys keep a trailing .0 for whole values, the rendering
        // the downstream ETSpec parameter parser has always been fed
        let contents = format!(
            "ANGLE_BEGIN = {:?}\n\
             ANGLE_INTER = {:?}\n\
             ANGLE_END = {:?}\n\
             EXTEND_TYPE = mean\n\
             WARP_MODE = nowarp\n\
             WARPZ_SIGMA = 0\n\
             WARPZ_TAO = 0\n\
             WARPZ_ALPHA = 0\n\
             MARKER_TYPE = Gaussian\n\
             MARKER_NUMBER = {}\n\
             MARKER_BSIZE = {}\n\
             MARKER_TSIZE = {}\n\
             MARKER_NOISE = {:?}\n\
             MARKER_A = {:?}\n\
             MARKER_B = {:?}\n\
             TWIST_SHRINKAGE = {:?}\n\
             TWIST_MAXANGLE = {:?}\n\
             SHIFT_OFFSET = 0\n\
             SHIFT_ROTATEANGEL = 0\n\
             DRIFT_XSIZE = 0\n\
             DRIFT_YSIZE = 0\n",
            c.begin_tilt,
            c.tilt_shift,
            c.end_tilt,
            c.num_markers,
            c.bottom_marker_size,
            c.top_marker_size,
            c.marker_noise,
            c.marker_a,
            c.a_param,
            c.shrinkage,
            c.proj_max_angle,
        );
        fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))
    }

    fn write_prepared_project_file(&self, workdir: &Path) -> Result<()> {
        let path = workdir.join(format!("{}{PRO_EXT}", self.mrc_name));
        let name = &self.mrc_name;
        let contents = format!(
            "PROJECT_NAME = {name}\n\
             PRO_NAME = {name}{PRO_EXT}\n\
             MRC_DIR = {}\n\
             SYSLOG_FILE = {name}{LOG_EXT}\n\
             PAR_FILE = {name}{PAR_EXT}\n\
             UNI_MRC_DIR = {}\n\
             EXTEND_MRC_DIR = {}\n\
             WARPZ_MRC_DIR = {}\n\
             WARPMODE = nowarp\n\
             MARKER_MRC_DIR = {}\n\
             PREPROCESS_STATE = FINISH\n\
             NORMALIZE_STATE = FINISH\n\
             UNIFORM_STATE = FINISH\n\
             WARP_STATE = FINISH\n\
             EXTEND_STATE = FINISH\n\
             WARPZ_STATE = FINISH\n\
             MARKER_STATE = FINISH\n\
             MARKERSTART_STATE = FINISH\n",
            self.input_mrc.display(),
            self.uni_mrc_name(),
            self.ext_mean_mrc_name(),
            Path::new(WARPZ_DIR_NAME).join(self.warpz_mrc_name()).display(),
            Path::new(MARKER_DIR_NAME).join(self.marker_mrc_name()).display(),
        );
        fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))
    }

    /// Generate every rotation's tilt series and reconcile the markers.
    ///
    /// Rotations whose directory already exists are skipped entirely,
    /// including the reconciliation and result passes.
    pub fn create_tiltseries(&self) -> Result<()> {
        let generated: Vec<Option<PathBuf>> = self
            .rotation_angles
            .par_iter()
            .map(|&rotation| self.generate_rotation(rotation))
            .collect::<Result<_>>()?;
        let dirs: Vec<PathBuf> = generated.into_iter().flatten().collect();

        self.generate_common_marker_files(&dirs)
    }

    fn generate_rotation(&self, rotation: f64) -> Result<Option<PathBuf>> {
        info!("Creating tilt series for rotation: {rotation}");
        let rotation_dir = self.rotation_dir(rotation);
        if rotation_dir.is_dir() {
            info!("Skipping rotation {rotation} since directory exists");
            return Ok(None);
        }

        info!("Copying prepared dir to {}", rotation_dir.display());
        copy_dir_recursive(&self.prepared_dir(), &rotation_dir)?;

        let layout = StageLayout::new(&rotation_dir);
        if rotation.abs() > ROTATION_EPSILON {
            self.run_rotatevol(&layout, rotation)?;
            self.rotate_marker_positions(&layout, rotation)?;
        }

        self.run_project_all(&layout)?;
        self.run_clip_projection(&layout)?;
        self.run_volume_marker_position_all(&layout)?;
        self.run_point2model_all(&layout)?;
        Ok(Some(rotation_dir))
    }

    fn run_rotatevol(&self, layout: &StageLayout, rotation: f64) -> Result<()> {
        let marker_mrc = layout.marker_dir().join(self.marker_mrc_name());
        let tmp_mrc = layout.marker_dir().join("tmp.mrc");
        Self::run_tool(
            "rotatevol",
            vec![
                "-angles".to_string(),
                format!("{rotation},0,0"),
                marker_mrc.display().to_string(),
                tmp_mrc.display().to_string(),
            ],
        )?;
        fs::rename(&tmp_mrc, &marker_mrc)?;
        Ok(())
    }

    /// Rotate `3Dmarkers.txt` about the volume center to match the
    /// rotated marker volume.
    fn rotate_marker_positions(&self, layout: &StageLayout, rotation: f64) -> Result<()> {
        let (x, y, _z) = self.marker_image_dimensions(layout)?;
        let markers_file = layout.marker_dir().join(THREE_D_MARKERS_TXT);
        rotate_markers_file(&markers_file, rotation, x as f64, y as f64, None)
    }

    fn run_project_all(&self, layout: &StageLayout) -> Result<()> {
        fs::create_dir_all(layout.projection_dir())?;

        let mut args = vec![
            layout
                .marker_dir()
                .join(self.marker_mrc_name())
                .display()
                .to_string(),
            layout
                .workdir()
                .join(self.projection_mrc_name())
                .display()
                .to_string(),
            self.config.begin_tilt.to_string(),
            self.config.tilt_shift.to_string(),
            self.config.end_tilt.to_string(),
            self.config.shrinkage.to_string(),
            self.config.proj_max_angle.to_string(),
        ];
        args.extend(["0", "0", "0", "0"].map(String::from));
        self.run_mpi_tool("project_all", args, self.config.cores)
    }

    fn run_clip_projection(&self, layout: &StageLayout) -> Result<()> {
        let (x, y, _z) = self.marker_image_dimensions(layout)?;
        Self::run_tool(
            "clip",
            vec![
                "resize".to_string(),
                "-ox".to_string(),
                (x / 3).to_string(),
                "-oy".to_string(),
                (y / 3).to_string(),
                layout
                    .workdir()
                    .join(self.projection_mrc_name())
                    .display()
                    .to_string(),
                layout
                    .workdir()
                    .join(self.projection_clip_mrc_name())
                    .display()
                    .to_string(),
            ],
        )
    }

    fn run_volume_marker_position_all(&self, layout: &StageLayout) -> Result<()> {
        fs::create_dir_all(layout.tracking_dir())?;

        let mut args = vec![
            layout
                .marker_dir()
                .join(self.marker_mrc_name())
                .display()
                .to_string(),
            layout
                .marker_dir()
                .join(THREE_D_MARKERS_TXT)
                .display()
                .to_string(),
            layout
                .projection_dir()
                .join(OFFSET_ALL_TXT)
                .display()
                .to_string(),
            self.config.num_markers.to_string(),
            self.config.begin_tilt.to_string(),
            self.config.tilt_shift.to_string(),
            self.config.end_tilt.to_string(),
            self.config.shrinkage.to_string(),
            self.config.proj_max_angle.to_string(),
        ];
        args.extend(["0", "0", "0", "0"].map(String::from));
        self.run_mpi_tool("volume_marker_position_all", args, Some(1))
    }

    fn run_point2model_all(&self, layout: &StageLayout) -> Result<()> {
        let markers =
            codec::read_markers_file(layout.tracking_dir().join(TWO_D_MARKERS_ALL_TXT))?;
        FiducialWriter::new(Some(layout.workdir().join(TWO_D_MARKERS_ALL_FID)))
            .write_markers(Some(&markers))
            .context("building 2Dmarkers_all.fid")
    }

    fn marker_image_dimensions(&self, layout: &StageLayout) -> Result<(i64, i64, i64)> {
        let marker_mrc = layout.marker_dir().join(self.marker_mrc_name());
        let output = run_external_command(
            "header",
            &["-s".to_string(), marker_mrc.display().to_string()],
        );
        if !output.success() {
            bail!("Unable to run header -s: {}", output.stderr);
        }

        let fields: Vec<&str> = output.stdout.split_whitespace().collect();
        if fields.len() != 3 {
            bail!("Invalid output from header: {}", output.stdout);
        }
        Ok((
            fields[0].parse()?,
            fields[1].parse()?,
            fields[2].parse()?,
        ))
    }

    /// Reconciliation barrier plus the per-rotation finalize pass.
    fn generate_common_marker_files(&self, dirs: &[PathBuf]) -> Result<()> {
        let filter = self.common_marker_filter(dirs)?;
        self.write_common_marker_texts(dirs, &filter)?;
        dirs.par_iter()
            .try_for_each(|dir| self.build_common_fid_files(dir))?;
        self.collect_results(dirs)
    }

    /// Load every rotation's tracked markers and intersect the indices.
    fn common_marker_filter(&self, dirs: &[PathBuf]) -> Result<CommonMarkerFilter> {
        let mut sets: Vec<MarkerSet> = Vec::with_capacity(dirs.len());
        for dir in dirs {
            debug!("Loading markers from {}", dir.display());
            let tracking = StageLayout::new(dir).tracking_dir().join(TWO_D_MARKERS_ALL_TXT);
            let markers = codec::read_markers_file(&tracking)
                .with_context(|| format!("reading {}", tracking.display()))?;
            sets.push(markers);
        }
        Ok(CommonMarkerFilter::new(&sets))
    }

    /// Write each rotation's `2Dmarkers_common.txt`, dropping tracks
    /// not shared by every rotation.
    fn write_common_marker_texts(
        &self,
        dirs: &[PathBuf],
        filter: &CommonMarkerFilter,
    ) -> Result<()> {
        dirs.par_iter().try_for_each(|dir| {
            debug!("Saving common markers for {}", dir.display());
            let tracking_dir = StageLayout::new(dir).tracking_dir();
            let markers = codec::read_markers_file(tracking_dir.join(TWO_D_MARKERS_ALL_TXT))?;

            let (common, unique) = filter.partition(&markers);
            for m in &unique {
                if let Some(record) = m.format_record() {
                    debug!("Unique marker omitted: {record}");
                }
            }

            codec::write_markers_file(&common, tracking_dir.join(TWO_D_MARKERS_COMMON_TXT))?;
            Ok(())
        })
    }

    /// Build the common fiducial model for one rotation and re-center
    /// it for the unclipped projection.
    fn build_common_fid_files(&self, dir: &Path) -> Result<()> {
        let layout = StageLayout::new(dir);
        let clip_fid = dir.join(self.projection_clip_fid_name());

        let common =
            codec::read_markers_file(layout.tracking_dir().join(TWO_D_MARKERS_COMMON_TXT))?;
        FiducialWriter::new(Some(clip_fid.clone()))
            .write_markers(Some(&common))
            .context("building common fiducial model")?;

        // the clipped fid is offset by the clip origin; shift it back
        // for the full projection
        let (x, y, _z) = self.marker_image_dimensions(&layout)?;
        let mut shifted = FiducialReader::new(Some(clip_fid)).read_markers()?;
        shifted.shift_all((x / 3) as f64, (y / 3) as f64, 0.0);
        FiducialWriter::new(Some(dir.join(self.projection_fid_name())))
            .write_markers(Some(&shifted))
            .context("building projection fiducial model")?;
        Ok(())
    }

    /// Copy each rotation's aligned outputs into `result/` under its
    /// base-26 tilt label.
    fn collect_results(&self, dirs: &[PathBuf]) -> Result<()> {
        let result_dir = self.result_dir();
        fs::create_dir_all(&result_dir)?;

        let mut last_rawtlt: Option<PathBuf> = None;
        for (counter, dir) in dirs.iter().enumerate() {
            let label = tilt_series_label(counter);

            fs::copy(
                dir.join(self.projection_clip_mrc_name()),
                result_dir.join(format!("{}{label}{PREALI_EXT}", self.mrc_name)),
            )?;
            fs::copy(
                dir.join(self.projection_clip_fid_name()),
                result_dir.join(format!("{}{label}{FID_EXT}", self.mrc_name)),
            )?;

            let rawtlt = dir.join(self.rawtlt_name());
            let dest = result_dir.join(format!("{}{label}{RAW_TLT_EXT}", self.mrc_name));
            if rawtlt.is_file() {
                fs::copy(&rawtlt, &dest)?;
                last_rawtlt = Some(dest);
            } else if let Some(prev) = &last_rawtlt {
                fs::copy(prev, &dest)?;
            } else {
                warn!("No rawtlt available for {}", dir.display());
            }
        }
        Ok(())
    }
}

/// Rotate a marker text file about the volume center.
///
/// Rotation happens about (width/2, height/2). With no `outfile` the
/// file is rewritten in place and the original is kept beside it with
/// an `.orig` suffix.
pub fn rotate_markers_file(
    markers_file: &Path,
    angle: f64,
    width: f64,
    height: f64,
    outfile: Option<&Path>,
) -> Result<()> {
    let mut markers = codec::read_markers_file(markers_file)
        .with_context(|| format!("reading {}", markers_file.display()))?;
    markers.rotate_all(Some(angle), Some(width / 2.0), Some(height / 2.0))?;

    match outfile {
        Some(out) => codec::write_markers_file(&markers, out)?,
        None => {
            let mut backup = markers_file.as_os_str().to_owned();
            backup.push(".orig");
            fs::rename(markers_file, PathBuf::from(&backup))?;
            codec::write_markers_file(&markers, markers_file)?;
        }
    }
    Ok(())
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("creating {}", dst.display()))?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let dest = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}
