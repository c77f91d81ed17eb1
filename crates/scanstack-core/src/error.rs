use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanStackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no files matching {stem}*.{extension} under {}", .dir.display())]
    NoFilesFound {
        stem: String,
        extension: String,
        dir: PathBuf,
    },

    #[error("invalid TIFF file: {0}")]
    InvalidTiff(String),

    #[error("frame range {begin}..{end} out of bounds (file holds {total} frames)")]
    FrameRangeOutOfBounds {
        begin: usize,
        end: usize,
        total: usize,
    },

    #[error("invalid calibration table: {0}")]
    InvalidCalibration(String),

    #[error("invalid alignment settings: {0}")]
    InvalidAlignment(String),
}

pub type Result<T> = std::result::Result<T, ScanStackError>;
