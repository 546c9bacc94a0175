use std::io;
use thiserror::Error;

/// All fatal error kinds for loading, flattening, and writing GDSII streams
/// (spec.md §7).
#[derive(Error, Debug)]
pub enum GdsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid GDSII record at offset {offset}: {message}")]
    Format { offset: u64, message: String },

    #[error("unexpected record tag 0x{tag:04X}, expected 0x{expected:04X}")]
    UnexpectedRecord { tag: u16, expected: u16 },

    #[error("unsupported GDSII version: {0}")]
    UnsupportedVersion(u16),

    #[error("cell '{0}' referenced but not defined")]
    UndefinedCell(String),

    #[error("invalid argument: {0}")]
    Argument(String),
}
