use tracing::{info, warn};

use crate::header::AcquisitionHeader;
use crate::resolver::FrameLayout;

/// Stack geometry, derived once at construction from the parsed header, the
/// enumerated file set, and the physical shape of the first file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackGeometry {
    /// Frame height in pixels (scan lines).
    pub height: usize,
    /// Frame width in pixels.
    pub width: usize,
    /// Optical planes per volume; a stack without fast-Z has one.
    pub num_planes: usize,
    /// Saved channels per frame.
    pub num_channels: usize,
    /// Physical frames stored per file before the acquisition rolls over.
    pub frames_per_file: usize,
    /// Frame count the header recorded. Kept for diagnostics only.
    pub declared_frames: usize,
    /// Frame count reconciled against the files actually on disk.
    /// Authoritative for all bounds checks.
    pub total_frames: usize,
}

impl StackGeometry {
    /// Derive the geometry for `file_count` files whose first member has
    /// `file_dimensions` (height, width) and holds `file_frame_count`
    /// physical frames.
    ///
    /// Acquisitions stopped early or extended past what the header recorded
    /// are common; the count inferred from the files on disk overrides the
    /// declared one.
    pub fn derive(
        header: &AcquisitionHeader,
        file_count: usize,
        file_dimensions: (usize, usize),
        file_frame_count: usize,
    ) -> Self {
        let (height, width) = match (header.lines_per_frame, header.pixels_per_line) {
            (Some(h), Some(w)) => (h as usize, w as usize),
            _ => file_dimensions,
        };

        let num_planes = match header.stack_num_slices {
            Some(n) if n > 0 => n as usize,
            _ => 1,
        };

        let num_channels = match &header.channels_save {
            Some(channels) if !channels.is_empty() => channels.len(),
            _ => {
                warn!("header does not list saved channels, assuming one channel");
                1
            }
        };

        // The header counts frames per channel; files interleave channels.
        let frames_per_file = match header.frames_per_file {
            Some(n) if n > 0 => n as usize * num_channels,
            _ => {
                warn!(
                    file_frame_count,
                    "header does not record frames per file, taking the first file's frame count"
                );
                file_frame_count.max(1)
            }
        };

        let declared_frames = if num_planes > 1 {
            header.fast_z_num_volumes.unwrap_or(0) as usize
        } else {
            header.frames_acquired.unwrap_or(0) as usize
        };

        let total_frames = file_count * frames_per_file / (num_planes * num_channels);
        if total_frames != declared_frames {
            info!(
                declared = declared_frames,
                inferred = total_frames,
                "header frame count disagrees with the files on disk, using the inferred count"
            );
        }

        StackGeometry {
            height,
            width,
            num_planes,
            num_channels,
            frames_per_file,
            declared_frames,
            total_frames,
        }
    }

    /// The interleave layout used to address physical frames.
    pub fn layout(&self) -> FrameLayout {
        FrameLayout {
            num_channels: self.num_channels,
            num_planes: self.num_planes,
            frames_per_file: self.frames_per_file,
        }
    }
}
