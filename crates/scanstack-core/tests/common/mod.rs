//! Synthetic acquisition-file fixtures shared by the integration tests.

use std::path::Path;

const FIRST_IFD_ENTRIES: usize = 7;
const REST_IFD_ENTRIES: usize = 6;

/// Build a classic little-endian TIFF the way the acquisition software
/// writes them: one IFD and one strip per frame, 16-bit signed samples, the
/// header text as the first frame's ImageDescription.
pub fn build_tiff(height: usize, width: usize, description: &str, frames: &[Vec<i16>]) -> Vec<u8> {
    for frame in frames {
        assert_eq!(frame.len(), height * width);
    }
    let frame_bytes = height * width * 2;
    let desc_count = description.len() + 1; // text + NUL, as the tag counts it
    let desc_padded = desc_count + desc_count % 2; // word-aligned on disk
    let data_start = 8;
    let desc_offset = data_start + frames.len() * frame_bytes;
    let ifd_start = desc_offset + desc_padded;
    let first_ifd_len = 2 + FIRST_IFD_ENTRIES * 12 + 4;
    let rest_ifd_len = 2 + REST_IFD_ENTRIES * 12 + 4;
    let ifd_offset = |index: usize| {
        if index == 0 {
            ifd_start
        } else {
            ifd_start + first_ifd_len + (index - 1) * rest_ifd_len
        }
    };

    let mut buf = Vec::new();
    buf.extend_from_slice(b"II");
    buf.extend_from_slice(&42u16.to_le_bytes());
    buf.extend_from_slice(&(ifd_offset(0) as u32).to_le_bytes());

    for frame in frames {
        for &v in frame {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }
    buf.extend_from_slice(description.as_bytes());
    buf.resize(ifd_start, 0); // NUL terminator plus alignment padding

    for index in 0..frames.len() {
        let entries = if index == 0 {
            FIRST_IFD_ENTRIES
        } else {
            REST_IFD_ENTRIES
        };
        buf.extend_from_slice(&(entries as u16).to_le_bytes());
        entry(&mut buf, 256, 3, 1, width as u32); // ImageWidth
        entry(&mut buf, 257, 3, 1, height as u32); // ImageLength
        entry(&mut buf, 258, 3, 1, 16); // BitsPerSample
        if index == 0 {
            entry(&mut buf, 270, 2, desc_count as u32, desc_offset as u32); // ImageDescription
        }
        entry(&mut buf, 273, 4, 1, (data_start + index * frame_bytes) as u32); // StripOffsets
        entry(&mut buf, 279, 4, 1, frame_bytes as u32); // StripByteCounts
        entry(&mut buf, 339, 3, 1, 2); // SampleFormat = signed
        let next = if index + 1 < frames.len() {
            ifd_offset(index + 1) as u32
        } else {
            0
        };
        buf.extend_from_slice(&next.to_le_bytes());
    }
    buf
}

fn entry(buf: &mut Vec<u8>, tag: u16, typ: u16, count: u32, value: u32) {
    buf.extend_from_slice(&tag.to_le_bytes());
    buf.extend_from_slice(&typ.to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Build the BigTIFF variant of the same layout.
pub fn build_bigtiff(
    height: usize,
    width: usize,
    description: &str,
    frames: &[Vec<i16>],
) -> Vec<u8> {
    for frame in frames {
        assert_eq!(frame.len(), height * width);
    }
    let frame_bytes = height * width * 2;
    let desc_count = description.len() + 1;
    let desc_padded = desc_count + desc_count % 2;
    let data_start = 16;
    let desc_offset = data_start + frames.len() * frame_bytes;
    let ifd_start = desc_offset + desc_padded;
    let first_ifd_len = 8 + FIRST_IFD_ENTRIES * 20 + 8;
    let rest_ifd_len = 8 + REST_IFD_ENTRIES * 20 + 8;
    let ifd_offset = |index: usize| {
        if index == 0 {
            ifd_start
        } else {
            ifd_start + first_ifd_len + (index - 1) * rest_ifd_len
        }
    };

    let mut buf = Vec::new();
    buf.extend_from_slice(b"II");
    buf.extend_from_slice(&43u16.to_le_bytes());
    buf.extend_from_slice(&8u16.to_le_bytes()); // offset size
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&(ifd_offset(0) as u64).to_le_bytes());

    for frame in frames {
        for &v in frame {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }
    buf.extend_from_slice(description.as_bytes());
    buf.resize(ifd_start, 0);

    for index in 0..frames.len() {
        let entries = if index == 0 {
            FIRST_IFD_ENTRIES
        } else {
            REST_IFD_ENTRIES
        };
        buf.extend_from_slice(&(entries as u64).to_le_bytes());
        big_entry(&mut buf, 256, 3, 1, width as u64);
        big_entry(&mut buf, 257, 3, 1, height as u64);
        big_entry(&mut buf, 258, 3, 1, 16);
        if index == 0 {
            big_entry(&mut buf, 270, 2, desc_count as u64, desc_offset as u64);
        }
        big_entry(&mut buf, 273, 16, 1, (data_start + index * frame_bytes) as u64);
        big_entry(&mut buf, 279, 16, 1, frame_bytes as u64);
        big_entry(&mut buf, 339, 3, 1, 2);
        let next = if index + 1 < frames.len() {
            ifd_offset(index + 1) as u64
        } else {
            0
        };
        buf.extend_from_slice(&next.to_le_bytes());
    }
    buf
}

fn big_entry(buf: &mut Vec<u8>, tag: u16, typ: u16, count: u64, value: u64) {
    buf.extend_from_slice(&tag.to_le_bytes());
    buf.extend_from_slice(&typ.to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Write a multi-file acquisition into `dir`: `file_count` files of
/// `frames_per_file` physical frames each, where physical frame `n` (global,
/// across files) is filled with the constant sample value `n`.
pub fn write_acquisition(
    dir: &Path,
    stem: &str,
    description: &str,
    height: usize,
    width: usize,
    file_count: usize,
    frames_per_file: usize,
) {
    for file_index in 0..file_count {
        let frames: Vec<Vec<i16>> = (0..frames_per_file)
            .map(|i| vec![(file_index * frames_per_file + i) as i16; height * width])
            .collect();
        let tiff = build_tiff(height, width, description, &frames);
        std::fs::write(dir.join(format!("{stem}_{file_index:03}.tif")), tiff)
            .expect("write acquisition file");
    }
}

/// Write a TIFF buffer to a temporary file and return the handle.
///
/// The file stays alive as long as the returned `NamedTempFile` is not
/// dropped.
pub fn write_test_tiff(data: &[u8]) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut f = tempfile::NamedTempFile::new().expect("create temp file");
    f.write_all(data).expect("write TIFF data");
    f.flush().expect("flush");
    f
}
