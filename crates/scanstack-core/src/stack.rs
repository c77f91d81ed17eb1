//! The stack orchestrator: a virtual, randomly-indexable view over a time
//! series of frames physically spread across many files on disk.

use std::path::{Path, PathBuf};

use ndarray::{s, Array3, Axis};
use tracing::{info, warn};

use crate::calibration::Calibration;
use crate::error::{Result, ScanStackError};
use crate::geometry::StackGeometry;
use crate::header::{parse_header, AcquisitionHeader};
use crate::io::tiff::TiffOpener;
use crate::io::SourceOpener;
use crate::register::Registration;
use crate::resolver::FrameSelection;

/// Construction options beyond the file-selection pattern.
pub struct StackOptions {
    /// Calibration tables; `None` leaves every lookup uncalibrated.
    pub calibration: Option<PathBuf>,
    /// Registration to apply to assembled reads once enabled.
    pub registration: Option<Box<dyn Registration>>,
    /// File-format capability used to open each acquisition file.
    pub opener: Box<dyn SourceOpener>,
}

impl Default for StackOptions {
    fn default() -> Self {
        Self {
            calibration: None,
            registration: None,
            opener: Box::new(TiffOpener),
        }
    }
}

/// A multi-file acquisition, indexable by logical frame number.
///
/// Construction parses the first file's header and fixes the stack geometry;
/// afterward only the selected channel/plane and the registration flag are
/// mutable. Reads are stateless with respect to prior reads.
pub struct ImageStack {
    files: Vec<PathBuf>,
    opener: Box<dyn SourceOpener>,
    header: AcquisitionHeader,
    geometry: StackGeometry,
    calibration: Calibration,
    registration: Option<Box<dyn Registration>>,
    register: bool,
    channel: usize,
    plane: usize,
}

impl ImageStack {
    /// Open every `<stem>*.<extension>` file under `dir` as one stack.
    pub fn open(dir: &Path, stem: &str, extension: &str) -> Result<Self> {
        Self::open_with(dir, stem, extension, StackOptions::default())
    }

    pub fn open_with(
        dir: &Path,
        stem: &str,
        extension: &str,
        options: StackOptions,
    ) -> Result<Self> {
        let files = enumerate_files(dir, stem, extension)?;
        if files.is_empty() {
            return Err(ScanStackError::NoFilesFound {
                stem: stem.to_string(),
                extension: extension.to_string(),
                dir: dir.to_path_buf(),
            });
        }

        let first = options.opener.open(&files[0])?;
        let header = parse_header(first.header_text());
        let geometry = StackGeometry::derive(
            &header,
            files.len(),
            first.dimensions(),
            first.frame_count(),
        );
        drop(first);

        let calibration = match &options.calibration {
            Some(path) => Calibration::load(path)?,
            None => Calibration::default(),
        };

        info!(
            files = files.len(),
            frames = geometry.total_frames,
            planes = geometry.num_planes,
            channels = geometry.num_channels,
            "opened image stack"
        );
        Ok(Self {
            files,
            opener: options.opener,
            header,
            geometry,
            calibration,
            registration: options.registration,
            register: false,
            channel: 0,
            plane: 0,
        })
    }

    /// Read the selected frames for the current plane and channel.
    ///
    /// The output has shape `(height, width, n_requested)` with frame `i` of
    /// the request in slot `i`, whatever order the files were visited in.
    /// A selection containing any out-of-range index yields a zero-filled
    /// buffer of the requested shape rather than an error, so sweeps past
    /// the end of a recording need no pre-clamping.
    pub fn read(&self, selection: &FrameSelection) -> Result<Array3<i16>> {
        let resolved = selection.resolve(self.geometry.total_frames);
        let (height, width) = (self.geometry.height, self.geometry.width);
        let mut out = Array3::<i16>::zeros((height, width, resolved.len()));

        let total = self.geometry.total_frames as i64;
        if resolved.iter().any(|&frame| frame < 0 || frame >= total) {
            warn!(
                total = self.geometry.total_frames,
                "selection reaches past the stack, returning zero-filled frames"
            );
            return Ok(out);
        }
        let frames: Vec<usize> = resolved.into_iter().map(|frame| frame as usize).collect();

        let layout = self.geometry.layout();
        for group in layout.plan(self.plane, self.channel, &frames) {
            // One handle per file, held exactly for this group's reads.
            let source = self.opener.open(&self.files[group.file_index])?;
            for &(offset, slot) in &group.frames {
                let frame = source.read_frames(offset, offset + 1)?;
                out.slice_mut(s![.., .., slot])
                    .assign(&frame.index_axis(Axis(2), 0));
            }
        }

        if self.register {
            if let Some(registration) = &self.registration {
                out = registration.apply(out, self.plane, &frames);
            }
        }
        Ok(out)
    }

    /// Read a single frame; negative indices count from the end.
    pub fn read_at(&self, index: i64) -> Result<Array3<i16>> {
        self.read(&FrameSelection::Single(index))
    }

    pub fn header(&self) -> &AcquisitionHeader {
        &self.header
    }

    pub fn geometry(&self) -> &StackGeometry {
        &self.geometry
    }

    /// The files backing this stack, in read order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// (height, width) in pixels.
    pub fn resolution(&self) -> (usize, usize) {
        (self.geometry.height, self.geometry.width)
    }

    /// Logical frames per (plane, channel), reconciled against the files on
    /// disk.
    pub fn num_frames(&self) -> usize {
        self.geometry.total_frames
    }

    /// Frame count the header recorded, before reconciliation.
    pub fn declared_frames(&self) -> usize {
        self.geometry.declared_frames
    }

    pub fn num_planes(&self) -> usize {
        self.geometry.num_planes
    }

    pub fn num_channels(&self) -> usize {
        self.geometry.num_channels
    }

    pub fn zoom(&self) -> Option<f64> {
        self.header.scan_zoom_factor
    }

    pub fn frame_rate(&self) -> Option<f64> {
        self.header.scan_frame_rate
    }

    /// Field-of-view edge length in micrometers; NaN when the zoom is
    /// unrecorded or uncalibrated.
    pub fn fov_size_um(&self) -> f64 {
        match self.header.scan_zoom_factor {
            Some(zoom) => self.calibration.fov_size_um(zoom),
            None => {
                warn!("header does not record a zoom factor");
                f64::NAN
            }
        }
    }

    /// Micrometers per pixel along the scan line.
    pub fn pixel_size_um(&self) -> f64 {
        self.fov_size_um() / self.geometry.width as f64
    }

    pub fn z_step_um(&self) -> Option<f64> {
        self.header.stack_z_step_size
    }

    /// Motor position vector (x, y, z base) in micrometers.
    pub fn position_um(&self) -> Option<&[f64]> {
        self.header.motor_position.as_deref()
    }

    /// Z position of the selected plane: the piezo steps down from the base
    /// motor Z by one Z step per plane.
    pub fn z_position_um(&self) -> Option<f64> {
        let base = self.header.motor_position.as_ref()?.get(2).copied()?;
        let step = self.header.stack_z_step_size.unwrap_or(0.0);
        Some(base - self.plane as f64 * step)
    }

    /// Beam power as the percentage recorded in the header.
    pub fn laser_power_percent(&self) -> Option<f64> {
        self.header.beam_powers
    }

    /// Laser power in watts at the recorded beam-power percentage; NaN when
    /// the percentage is unrecorded or the wavelength uncalibrated.
    pub fn laser_power_watts(&self, wavelength_nm: u32) -> f64 {
        match self.header.beam_powers {
            Some(percent) => self.calibration.laser_power_watts(wavelength_nm, percent),
            None => {
                warn!("header does not record beam power");
                f64::NAN
            }
        }
    }

    pub fn channel_gains(&self) -> Option<&[f64]> {
        self.header.channel_gains.as_deref()
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.header.trigger_clock_time_first.as_deref()
    }

    pub fn file_stem(&self) -> Option<&str> {
        self.header.file_stem.as_deref()
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Select the channel to read. Unchecked.
    pub fn set_channel(&mut self, channel: usize) {
        self.channel = channel;
    }

    pub fn plane(&self) -> usize {
        self.plane
    }

    /// Select the plane to read. An out-of-range plane is rejected and the
    /// previous selection kept.
    pub fn set_plane(&mut self, plane: usize) {
        if plane >= self.geometry.num_planes {
            warn!(
                plane,
                num_planes = self.geometry.num_planes,
                "plane selection out of range, keeping plane {}",
                self.plane
            );
            return;
        }
        self.plane = plane;
    }

    pub fn register(&self) -> bool {
        self.register
    }

    /// Enable or disable registration. Enabling without a bound
    /// registration stays disabled.
    pub fn set_register(&mut self, on: bool) {
        if on && self.registration.is_none() {
            warn!("no registration bound to this stack, leaving registration disabled");
            self.register = false;
            return;
        }
        self.register = on;
    }

    pub fn set_registration(&mut self, registration: Box<dyn Registration>) {
        self.registration = Some(registration);
    }
}

/// Enumerate `<stem>*.<extension>` files under `dir`, sorted
/// lexicographically. Acquisition naming is monotonic, so the sort order is
/// also chronological.
fn enumerate_files(dir: &Path, stem: &str, extension: &str) -> Result<Vec<PathBuf>> {
    let suffix = format!(".{extension}");
    let mut names: Vec<String> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(stem) && name.ends_with(&suffix) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names.into_iter().map(|name| dir.join(name)).collect())
}
