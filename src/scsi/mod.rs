//! SCSI/MMC transport (C1, §4.1).
//!
//! Generalizes the teacher's `CDRomTrait` + `#[cfg(target_os = ...)]`
//! platform-alias pattern (`lib.rs`) from a legacy CDROM-ioctl API to raw
//! MMC CDB transport over SG_IO (Linux) / IOKit `SCSITaskDeviceInterface`
//! (macOS), as called for by the platform-split re-architecture note (§9).

use crate::error::MbDiscIdError;
use crate::qsubchannel::QSubchannel;

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "linux")]
pub type Transport = linux::LinuxTransport;
#[cfg(target_os = "macos")]
pub type Transport = macos::MacosTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// # One 11-byte Full-TOC descriptor (READ TOC/PMA/ATIP format 2).
pub struct FullTocDescriptor {
    pub session: u8,
    pub adr: u8,
    pub control: u8,
    pub point: u8,
    pub p_min: u8,
    pub p_sec: u8,
    pub p_frame: u8,
}

impl FullTocDescriptor {
    /// # Raw LBA for this descriptor's P-MSF field.
    ///
    /// For POINT 1..=99 this is the track's start address; for POINT
    /// 0xA2 it is the session leadout address (§4.1/§8 property 8).
    #[must_use]
    pub fn p_lba(&self) -> u32 {
        let msf_frames =
            (u32::from(self.p_min) * 60 + u32::from(self.p_sec)) * crate::config::CD_FRAMES_PER_SEC
                + u32::from(self.p_frame);
        msf_frames.saturating_sub(crate::config::CD_PREGAP_FRAMES)
    }
}

/// POINT value marking a session's first track number.
pub const POINT_SESSION_FIRST_TRACK: u8 = 0xA0;
/// POINT value marking a session's last track number.
pub const POINT_SESSION_LAST_TRACK: u8 = 0xA1;
/// POINT value marking a session's leadout address.
pub const POINT_SESSION_LEADOUT: u8 = 0xA2;

/// Parse the descriptor region of a format-2 READ TOC/PMA/ATIP response
/// (the 4-byte header -- data length + first/last session -- already
/// stripped by the caller).
#[must_use]
pub fn parse_full_toc_descriptors(data: &[u8]) -> Vec<FullTocDescriptor> {
    data.chunks_exact(11)
        .map(|d| FullTocDescriptor {
            session: d[0],
            adr: d[1] >> 4,
            control: d[1] & 0x0F,
            point: d[3],
            p_min: d[8],
            p_sec: d[9],
            p_frame: d[10],
        })
        .collect()
}

/// # SCSI/MMC transport for one open optical device.
///
/// Implementors own exactly one scoped device handle, released on all exit
/// paths (including `Drop`) per the §5 resource model.
pub trait ScsiTransport: Sized {
    /// # Open the device at `path`.
    ///
    /// ## Errors
    ///
    /// Returns [`MbDiscIdError::Io`] on failure to open/claim the device.
    fn open(path: &str) -> Result<Self, MbDiscIdError>;

    /// # Read the Full TOC (format 2) and return its raw descriptors.
    ///
    /// ## Errors
    ///
    /// Returns [`MbDiscIdError::Io`] if the command fails.
    fn read_full_toc(&mut self) -> Result<Vec<FullTocDescriptor>, MbDiscIdError>;

    /// # Read the simple TOC (format 0): `(first_track, last_track, leadout_lba)`.
    ///
    /// ## Errors
    ///
    /// Returns [`MbDiscIdError::Io`] if the command fails.
    fn read_toc_simple(&mut self) -> Result<(u8, u8, u32), MbDiscIdError>;

    /// # Read raw CD-Text pack data (format 5), header already stripped.
    ///
    /// ## Errors
    ///
    /// Returns [`MbDiscIdError::Io`] if the command fails.
    fn read_cdtext_raw(&mut self) -> Result<Vec<u8>, MbDiscIdError>;

    /// # Read `count` sectors of formatted-Q subchannel data starting at
    /// `start_lba`, chunked internally at
    /// [`crate::config::READ_CD_CHUNK_SECTORS`].
    ///
    /// ## Errors
    ///
    /// Returns [`MbDiscIdError::Io`] only if every chunk fails; partial
    /// chunk failures degrade to fewer returned frames (§4.5 failure
    /// semantics: per-tranche errors are non-fatal to the scan).
    fn read_q_batch(&mut self, start_lba: u32, count: u32) -> Result<Vec<QSubchannel>, MbDiscIdError>;

    /// # Fallback ISRC read via READ SUB-CHANNEL. Best-effort; absence is
    /// not an error.
    fn read_isrc_via_drive(&mut self, track: u8) -> Option<String>;

    /// # Fallback MCN read via READ SUB-CHANNEL. Best-effort; absence is
    /// not an error.
    fn read_mcn_via_drive(&mut self) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_parse_full_toc_descriptors() {
        // One descriptor: session 1, POINT 0xA2 (leadout) at 60:00:00.
        let mut raw = vec![1u8, 0x10, 0, POINT_SESSION_LEADOUT, 0, 0, 0, 0, 60, 0, 0];
        raw.extend_from_slice(&[2, 0x14, 0, 1, 0, 0, 0, 0, 0, 2, 0]);
        let descs = parse_full_toc_descriptors(&raw);
        assert_eq!(descs.len(), 2);
        assert_eq!(descs[0].point, POINT_SESSION_LEADOUT);
        assert_eq!(descs[0].p_lba(), 60 * 60 * 75 - 150);
    }
}
