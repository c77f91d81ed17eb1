//! Memory-mapped reader for the TIFF subset ScanImage writes: little-endian
//! classic TIFF or BigTIFF, one strip per frame, 16-bit signed samples, the
//! acquisition header as the first frame's `ImageDescription`.

use std::fs::File;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use ndarray::Array3;

use crate::error::{Result, ScanStackError};
use crate::io::{FrameSource, SourceOpener};

const TIFF_MAGIC_CLASSIC: u16 = 42;
const TIFF_MAGIC_BIG: u16 = 43;

const TAG_IMAGE_WIDTH: u16 = 256;
const TAG_IMAGE_LENGTH: u16 = 257;
const TAG_BITS_PER_SAMPLE: u16 = 258;
const TAG_IMAGE_DESCRIPTION: u16 = 270;
const TAG_STRIP_OFFSETS: u16 = 273;
const TAG_STRIP_BYTE_COUNTS: u16 = 279;

#[derive(Clone, Copy, PartialEq, Eq)]
enum TiffKind {
    Classic,
    Big,
}

impl TiffKind {
    /// Tag values at most this many bytes are stored inline in the entry.
    fn inline_limit(&self) -> u64 {
        match self {
            TiffKind::Classic => 4,
            TiffKind::Big => 8,
        }
    }
}

/// One acquisition file, mapped read-only.
pub struct ScanImageTiff {
    mmap: Mmap,
    header_text: String,
    height: usize,
    width: usize,
    /// Strip offset of each frame, in file order.
    frame_offsets: Vec<u64>,
}

impl ScanImageTiff {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < 8 {
            return Err(ScanStackError::InvalidTiff(
                "file too small for a TIFF header".into(),
            ));
        }
        if &mmap[0..2] != b"II" {
            return Err(ScanStackError::InvalidTiff(
                "only little-endian TIFF files are supported".into(),
            ));
        }
        let (kind, mut next) = match read_u16_at(&mmap, 2)? {
            TIFF_MAGIC_CLASSIC => (TiffKind::Classic, read_u32_at(&mmap, 4)? as u64),
            TIFF_MAGIC_BIG => {
                let offset_size = read_u16_at(&mmap, 4)?;
                if offset_size != 8 {
                    return Err(ScanStackError::InvalidTiff(format!(
                        "unsupported BigTIFF offset size {offset_size}"
                    )));
                }
                (TiffKind::Big, read_u64_at(&mmap, 8)?)
            }
            other => {
                return Err(ScanStackError::InvalidTiff(format!(
                    "unrecognized TIFF magic {other}"
                )))
            }
        };

        let mut header_text = String::new();
        let mut dimensions: Option<(usize, usize)> = None;
        let mut frame_offsets = Vec::new();
        while next != 0 {
            let index = frame_offsets.len();
            let ifd = parse_ifd(&mmap, next, kind, index == 0)?;

            let (Some(width), Some(height)) = (ifd.width, ifd.height) else {
                return Err(ScanStackError::InvalidTiff(format!(
                    "frame {index} carries no dimensions"
                )));
            };
            let (height, width) = (height as usize, width as usize);
            match dimensions {
                None => dimensions = Some((height, width)),
                Some(first) if first != (height, width) => {
                    return Err(ScanStackError::InvalidTiff(format!(
                        "frame {index} is {width}x{height}, differing from the first frame"
                    )));
                }
                _ => {}
            }

            if ifd.bits.unwrap_or(16) != 16 {
                return Err(ScanStackError::InvalidTiff(format!(
                    "unsupported bit depth {}",
                    ifd.bits.unwrap_or(0)
                )));
            }
            if ifd.strip_entries != 1 {
                return Err(ScanStackError::InvalidTiff(format!(
                    "frame {index}: expected one strip, found {}",
                    ifd.strip_entries
                )));
            }
            let (Some(offset), Some(byte_count)) = (ifd.strip_offset, ifd.strip_bytes) else {
                return Err(ScanStackError::InvalidTiff(format!(
                    "frame {index} has no strip location"
                )));
            };
            if byte_count as usize != height * width * 2 {
                return Err(ScanStackError::InvalidTiff(format!(
                    "frame {index}: strip holds {byte_count} bytes, expected {} for {width}x{height} 16-bit samples",
                    height * width * 2
                )));
            }

            if index == 0 {
                if let Some(text) = ifd.description {
                    header_text = text;
                }
            }
            frame_offsets.push(offset);
            next = ifd.next;
        }

        if frame_offsets.is_empty() {
            return Err(ScanStackError::InvalidTiff("file contains no frames".into()));
        }
        let (height, width) = dimensions.expect("at least one frame");
        Ok(Self {
            mmap,
            header_text,
            height,
            width,
            frame_offsets,
        })
    }
}

impl FrameSource for ScanImageTiff {
    fn header_text(&self) -> &str {
        &self.header_text
    }

    fn frame_count(&self) -> usize {
        self.frame_offsets.len()
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    fn read_frames(&self, begin: usize, end: usize) -> Result<Array3<i16>> {
        if begin > end || end > self.frame_offsets.len() {
            return Err(ScanStackError::FrameRangeOutOfBounds {
                begin,
                end,
                total: self.frame_offsets.len(),
            });
        }
        let (h, w) = (self.height, self.width);
        let mut out = Array3::<i16>::zeros((h, w, end - begin));
        for (slot, &offset) in self.frame_offsets[begin..end].iter().enumerate() {
            let raw = slice_at(&self.mmap, offset, h * w * 2)?;
            for row in 0..h {
                for col in 0..w {
                    let at = (row * w + col) * 2;
                    out[[row, col, slot]] = i16::from_le_bytes([raw[at], raw[at + 1]]);
                }
            }
        }
        Ok(out)
    }
}

/// Default file-format capability: every file is a ScanImage-shaped TIFF.
pub struct TiffOpener;

impl SourceOpener for TiffOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(ScanImageTiff::open(path)?))
    }
}

#[derive(Default)]
struct Ifd {
    width: Option<u64>,
    height: Option<u64>,
    bits: Option<u64>,
    description: Option<String>,
    strip_offset: Option<u64>,
    strip_bytes: Option<u64>,
    strip_entries: u64,
    next: u64,
}

fn parse_ifd(buf: &[u8], offset: u64, kind: TiffKind, want_description: bool) -> Result<Ifd> {
    let (entry_count, entries_start, entry_size) = match kind {
        TiffKind::Classic => (read_u16_at(buf, offset)? as u64, offset + 2, 12),
        TiffKind::Big => (read_u64_at(buf, offset)?, offset + 8, 20),
    };

    let mut ifd = Ifd::default();
    for i in 0..entry_count {
        let at = entries_start + i * entry_size;
        let tag = read_u16_at(buf, at)?;
        let (count, value) = match kind {
            TiffKind::Classic => (
                read_u32_at(buf, at + 4)? as u64,
                read_u32_at(buf, at + 8)? as u64,
            ),
            TiffKind::Big => (read_u64_at(buf, at + 4)?, read_u64_at(buf, at + 12)?),
        };
        match tag {
            TAG_IMAGE_WIDTH => ifd.width = Some(value),
            TAG_IMAGE_LENGTH => ifd.height = Some(value),
            TAG_BITS_PER_SAMPLE if count == 1 => ifd.bits = Some(value),
            TAG_IMAGE_DESCRIPTION if want_description => {
                ifd.description = Some(read_ascii(buf, value, count, kind.inline_limit())?);
            }
            TAG_STRIP_OFFSETS => {
                ifd.strip_entries = count;
                ifd.strip_offset = Some(value);
            }
            TAG_STRIP_BYTE_COUNTS => ifd.strip_bytes = Some(value),
            _ => {}
        }
    }

    let next_at = entries_start + entry_count * entry_size;
    ifd.next = match kind {
        TiffKind::Classic => read_u32_at(buf, next_at)? as u64,
        TiffKind::Big => read_u64_at(buf, next_at)?,
    };
    Ok(ifd)
}

fn read_ascii(buf: &[u8], value: u64, count: u64, inline_limit: u64) -> Result<String> {
    let bytes: Vec<u8> = if count <= inline_limit {
        value.to_le_bytes()[..count as usize].to_vec()
    } else {
        slice_at(buf, value, count as usize)?.to_vec()
    };
    Ok(String::from_utf8_lossy(&bytes)
        .trim_end_matches('\0')
        .to_string())
}

fn slice_at(buf: &[u8], at: u64, len: usize) -> Result<&[u8]> {
    usize::try_from(at)
        .ok()
        .and_then(|at| at.checked_add(len).map(|end| (at, end)))
        .and_then(|(at, end)| buf.get(at..end))
        .ok_or_else(|| {
            ScanStackError::InvalidTiff(format!("truncated file: {len} bytes at offset {at}"))
        })
}

fn read_u16_at(buf: &[u8], at: u64) -> Result<u16> {
    let mut raw = slice_at(buf, at, 2)?;
    Ok(raw.read_u16::<LittleEndian>()?)
}

fn read_u32_at(buf: &[u8], at: u64) -> Result<u32> {
    let mut raw = slice_at(buf, at, 4)?;
    Ok(raw.read_u32::<LittleEndian>()?)
}

fn read_u64_at(buf: &[u8], at: u64) -> Result<u64> {
    let mut raw = slice_at(buf, at, 8)?;
    Ok(raw.read_u64::<LittleEndian>()?)
}
