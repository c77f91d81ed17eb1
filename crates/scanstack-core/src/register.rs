//! Frame registration: applying previously computed alignment shifts to an
//! assembled read.
//!
//! Alignment parameters come from a declarative TOML settings file with one
//! record per imaged plane, each carrying per-frame whole-pixel shifts and,
//! when non-rigid correction was enabled, per-block refinements. Computing
//! the shifts is someone else's job; this module only applies them.

use std::path::Path;

use ndarray::{s, Array2, Array3, ArrayView2};
use serde::Deserialize;
use tracing::warn;

use crate::error::{Result, ScanStackError};

/// Batch shift-correction applied to an assembled read.
///
/// `data` has shape `(height, width, frames.len())`; `frames` holds the
/// logical frame number backing each output slot. Implementations return a
/// buffer of identical shape. The whole batch is passed at once so an
/// implementation may use inter-frame references.
pub trait Registration {
    fn apply(&self, data: Array3<i16>, plane: usize, frames: &[usize]) -> Array3<i16>;
}

/// Alignment record for one imaged plane.
#[derive(Clone, Debug, Deserialize)]
pub struct PlaneShifts {
    /// Per-frame horizontal pixel shift.
    pub xoff: Vec<i32>,
    /// Per-frame vertical pixel shift.
    pub yoff: Vec<i32>,
    /// Per-block refinement, present when non-rigid correction was enabled.
    #[serde(default)]
    pub nonrigid: Option<BlockShifts>,
}

/// Block-wise shift fields for non-rigid correction.
#[derive(Clone, Debug, Deserialize)]
pub struct BlockShifts {
    pub block_height: usize,
    pub block_width: usize,
    /// Per-frame, per-block horizontal shifts, blocks in row-major order.
    pub xoff1: Vec<Vec<i32>>,
    /// Per-frame, per-block vertical shifts.
    pub yoff1: Vec<Vec<i32>>,
}

/// Alignment settings: one record per imaged plane.
#[derive(Clone, Debug, Deserialize)]
pub struct AlignmentSettings {
    #[serde(rename = "plane")]
    pub planes: Vec<PlaneShifts>,
}

impl AlignmentSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: AlignmentSettings =
            toml::from_str(&text).map_err(|e| ScanStackError::InvalidAlignment(e.to_string()))?;
        for (index, plane) in settings.planes.iter().enumerate() {
            if plane.xoff.len() != plane.yoff.len() {
                return Err(ScanStackError::InvalidAlignment(format!(
                    "plane {index}: xoff and yoff record different frame counts"
                )));
            }
            if let Some(blocks) = &plane.nonrigid {
                if blocks.block_height == 0 || blocks.block_width == 0 {
                    return Err(ScanStackError::InvalidAlignment(format!(
                        "plane {index}: non-rigid block geometry must be nonzero"
                    )));
                }
            }
        }
        Ok(settings)
    }
}

/// Whole-pixel shift registration, with optional block-wise refinement.
pub struct ShiftRegistration {
    settings: AlignmentSettings,
}

impl ShiftRegistration {
    pub fn new(settings: AlignmentSettings) -> Self {
        Self { settings }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(AlignmentSettings::load(path)?))
    }
}

impl Registration for ShiftRegistration {
    fn apply(&self, mut data: Array3<i16>, plane: usize, frames: &[usize]) -> Array3<i16> {
        let Some(shifts) = self.settings.planes.get(plane) else {
            warn!(plane, "no alignment record for this plane, frames left unshifted");
            return data;
        };
        for (slot, &frame) in frames.iter().enumerate() {
            let (Some(&dx), Some(&dy)) = (shifts.xoff.get(frame), shifts.yoff.get(frame)) else {
                warn!(frame, "no shift recorded for this frame, leaving it unshifted");
                continue;
            };
            let shifted = match &shifts.nonrigid {
                Some(blocks) => shift_blocks(data.slice(s![.., .., slot]), dy, dx, blocks, frame),
                None => shift_plane(data.slice(s![.., .., slot]), dy, dx),
            };
            data.slice_mut(s![.., .., slot]).assign(&shifted);
        }
        data
    }
}

/// Translate an image by whole pixels, zero-filling vacated rows and columns.
fn shift_plane(src: ArrayView2<i16>, dy: i32, dx: i32) -> Array2<i16> {
    let (h, w) = src.dim();
    let mut out = Array2::<i16>::zeros((h, w));
    fill_shifted(&mut out, &src, 0..h, 0..w, dy, dx);
    out
}

/// Translate each block by the rigid shift plus its own refinement.
fn shift_blocks(
    src: ArrayView2<i16>,
    dy: i32,
    dx: i32,
    blocks: &BlockShifts,
    frame: usize,
) -> Array2<i16> {
    let (Some(xoff1), Some(yoff1)) = (blocks.xoff1.get(frame), blocks.yoff1.get(frame)) else {
        warn!(frame, "no block shifts for this frame, falling back to the rigid shift");
        return shift_plane(src, dy, dx);
    };
    let (h, w) = src.dim();
    let mut out = Array2::<i16>::zeros((h, w));
    let block_cols = w.div_ceil(blocks.block_width);
    for block_row in 0..h.div_ceil(blocks.block_height) {
        for block_col in 0..block_cols {
            let block = block_row * block_cols + block_col;
            let bdy = dy + yoff1.get(block).copied().unwrap_or(0);
            let bdx = dx + xoff1.get(block).copied().unwrap_or(0);
            let row0 = block_row * blocks.block_height;
            let col0 = block_col * blocks.block_width;
            let rows = row0..(row0 + blocks.block_height).min(h);
            let cols = col0..(col0 + blocks.block_width).min(w);
            fill_shifted(&mut out, &src, rows, cols, bdy, bdx);
        }
    }
    out
}

/// Write `src` translated by (dy, dx) into the given destination region.
/// Destination pixels whose source falls outside the image stay zero.
fn fill_shifted(
    out: &mut Array2<i16>,
    src: &ArrayView2<i16>,
    rows: std::ops::Range<usize>,
    cols: std::ops::Range<usize>,
    dy: i32,
    dx: i32,
) {
    let (h, w) = src.dim();
    for row in rows {
        let src_row = row as i64 - dy as i64;
        if src_row < 0 || src_row >= h as i64 {
            continue;
        }
        for col in cols.clone() {
            let src_col = col as i64 - dx as i64;
            if src_col < 0 || src_col >= w as i64 {
                continue;
            }
            out[[row, col]] = src[[src_row as usize, src_col as usize]];
        }
    }
}
