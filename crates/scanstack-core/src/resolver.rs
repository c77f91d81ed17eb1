//! Logical-to-physical frame addressing.
//!
//! An acquisition interleaves one physical frame per (plane, channel)
//! combination before advancing to the next time point, and rolls to a new
//! file every `frames_per_file` physical frames. Resolving a batch of
//! logical frame numbers therefore means mapping each to its physical index,
//! then grouping the physical indices by file so every file is opened once.

use std::collections::BTreeMap;

use tracing::warn;

/// Interleave layout of physical frames across an acquisition's files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameLayout {
    pub num_channels: usize,
    pub num_planes: usize,
    pub frames_per_file: usize,
}

/// One file's share of a read plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileReads {
    /// Position of the file in the sorted block sequence.
    pub file_index: usize,
    /// `(in_file_offset, output_slot)` pairs. The slot is the position the
    /// frame takes in the caller's requested order.
    pub frames: Vec<(usize, usize)>,
}

impl FrameLayout {
    /// Physical frames per time point: one per (plane, channel) pair.
    pub fn cycle_len(&self) -> usize {
        self.num_channels * self.num_planes
    }

    /// Physical index of logical frame `frame` for the given plane/channel.
    /// The channel varies fastest within a cycle.
    pub fn physical_index(&self, frame: usize, plane: usize, channel: usize) -> usize {
        plane * self.num_channels + channel + frame * self.cycle_len()
    }

    /// Split a physical index into (file number, in-file offset).
    pub fn locate(&self, physical: usize) -> (usize, usize) {
        (
            physical / self.frames_per_file,
            physical % self.frames_per_file,
        )
    }

    /// Group the requested logical frames into per-file reads.
    ///
    /// Files come out in ascending numeric order to avoid reopen thrashing.
    /// Output slots preserve the request order: reassembling every group's
    /// frames by slot reproduces the caller's sequence exactly.
    pub fn plan(&self, plane: usize, channel: usize, frames: &[usize]) -> Vec<FileReads> {
        let mut by_file: BTreeMap<usize, Vec<(usize, usize)>> = BTreeMap::new();
        for (slot, &frame) in frames.iter().enumerate() {
            let (file_index, offset) = self.locate(self.physical_index(frame, plane, channel));
            by_file.entry(file_index).or_default().push((offset, slot));
        }
        by_file
            .into_iter()
            .map(|(file_index, frames)| FileReads { file_index, frames })
            .collect()
    }
}

/// Caller-facing frame selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameSelection {
    /// A single frame.
    Single(i64),
    /// An explicit sequence of frames, in the order they should land in the
    /// output buffer.
    Indices(Vec<i64>),
    /// A start/stop/step range. Open bounds resolve against the stack's
    /// total frame count; negative values count from the end.
    Range {
        start: Option<i64>,
        stop: Option<i64>,
        step: i64,
    },
}

impl FrameSelection {
    /// Every frame of the stack, in order.
    pub fn all() -> Self {
        FrameSelection::Range {
            start: None,
            stop: None,
            step: 1,
        }
    }

    pub fn range(start: impl Into<Option<i64>>, stop: impl Into<Option<i64>>, step: i64) -> Self {
        FrameSelection::Range {
            start: start.into(),
            stop: stop.into(),
            step,
        }
    }

    /// Expand to concrete frame numbers against a stack of `total` frames.
    ///
    /// The result may contain out-of-bounds values; the bounds policy
    /// belongs to the reader, not the resolver.
    pub fn resolve(&self, total: usize) -> Vec<i64> {
        let total = total as i64;
        let bias = |v: i64| if v < 0 { v + total } else { v };
        match self {
            FrameSelection::Single(index) => vec![bias(*index)],
            FrameSelection::Indices(indices) => indices.iter().map(|&v| bias(v)).collect(),
            FrameSelection::Range { start, stop, step } => {
                let step = *step;
                if step == 0 {
                    warn!("zero-step range resolves to an empty selection");
                    return Vec::new();
                }
                let start = match start {
                    Some(v) => bias(*v),
                    None if step > 0 => 0,
                    None => total - 1,
                };
                let stop = match stop {
                    Some(v) => bias(*v),
                    None if step > 0 => total,
                    None => -1,
                };
                let mut frames = Vec::new();
                let mut v = start;
                while (step > 0 && v < stop) || (step < 0 && v > stop) {
                    frames.push(v);
                    v += step;
                }
                frames
            }
        }
    }
}
