//! Error taxonomy.
//!
//! A single top-level enum, one variant per taxonomy leaf, following the
//! teacher's `CDRomError` shape (a flat `thiserror`-derived enum with
//! `#[from]` conversions for the OS-level error types).

use thiserror::Error;

#[derive(Error, Debug, Clone)]
/// # `mbdiscid` error.
pub enum MbDiscIdError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error("device is not usable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Error, Debug, Clone)]
/// # Malformed-input errors (TOC text parser, §4.6).
pub enum DataError {
    #[error("could not parse integer token {0:?}")]
    BadToken(String),

    #[error("wrong number of tokens for any known TOC dialect ({0})")]
    ArityMismatch(usize),

    #[error("track offsets are not strictly ascending")]
    NonAscendingOffsets,

    #[error("leadout does not exceed the last track offset")]
    LeadoutTooSmall,

    #[error("track number {0} is out of range 1..=99")]
    TrackRange(u32),

    #[error("TOC dialect could not be determined (ambiguous input)")]
    Indeterminate,

    #[error("malformed TOC input: {0}")]
    Invalid(String),
}

#[derive(Error, Debug, Clone)]
/// # Transport/IO errors (SCSI transport, §4.1).
pub enum IoError {
    #[error("failed to open device {path}: {reason}")]
    DeviceOpen { path: String, reason: String },

    #[error("SCSI command failed: status={status} sense_key={sense_key:#x} asc={asc:#x} ascq={ascq:#x}")]
    Scsi {
        status: i32,
        sense_key: u8,
        asc: u8,
        ascq: u8,
    },

    #[error("SCSI command timed out after {0}s")]
    Timeout(u64),

    #[error("failed to read table of contents: {0}")]
    TocRead(String),

    #[error("system error: {0}")]
    Errno(String),
}

#[cfg(target_os = "linux")]
impl From<nix::errno::Errno> for IoError {
    fn from(e: nix::errno::Errno) -> Self {
        Self::Errno(e.to_string())
    }
}

#[cfg(target_os = "linux")]
impl From<nix::errno::Errno> for MbDiscIdError {
    fn from(e: nix::errno::Errno) -> Self {
        Self::Io(IoError::from(e))
    }
}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        Self::Errno(e.to_string())
    }
}

impl From<std::io::Error> for MbDiscIdError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(IoError::from(e))
    }
}
