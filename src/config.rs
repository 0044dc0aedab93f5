//! Compile-time tuning constants.
//!
//! Nothing in this crate varies per deployment, so there is no runtime
//! configuration layer -- just the constants the ISRC engine and the SCSI
//! transport are tuned against. Mirrors the teacher's flat `constants.rs`
//! convention rather than a `config`-crate-backed settings file.

/// CD frames per second (75 Hz subchannel / sector clock).
pub const CD_FRAMES_PER_SEC: u32 = 75;

/// Pregap between the on-wire MSF/LBA addressing and raw LBA 0.
pub const CD_PREGAP_FRAMES: u32 = 150;

/// Bytes of formatted-Q subchannel data per sector when requested via
/// READ CD byte 10 = 0x02.
pub const Q_SUBCHANNEL_BYTES: usize = 16;

/// Bytes of a single CD-Text pack.
pub const CDTEXT_PACK_BYTES: usize = 18;

/// Run-out gap between the last audio track's true end and a trailing data
/// track's own offset, for Enhanced (CD-Extra) discs read without an exact
/// session-1 leadout (e.g. the AccurateRip text dialect). Grounded in
/// `Blobfolio-cdtoc`'s `Toc::audio_leadout`, which applies the same fixed
/// offset.
pub const ENHANCED_RUNOUT_GAP_FRAMES: u32 = 11_400;

/// Max total CD-Text data length (header + packs) accepted from the drive.
pub const CDTEXT_MAX_BYTES: usize = 8192;

/// Number of sectors chunked per READ CD command when a caller asks for a
/// run longer than this (bounds single-allocation reads; see the short-track
/// full-scan design note).
pub const READ_CD_CHUNK_SECTORS: usize = 75;

/// SCSI command timeout, per §5.
pub const SCSI_TIMEOUT_SECS: u64 = 30;

/// macOS exclusive-access open retry backoff.
pub const MACOS_OPEN_RETRY_BACKOFF_MS: u64 = 500;
/// macOS exclusive-access open retry budget before falling back to DA.
pub const MACOS_OPEN_RETRY_BUDGET_SECS: u64 = 5;
/// macOS DiskArbitration unmount timeout.
pub const MACOS_DA_UNMOUNT_TIMEOUT_SECS: u64 = 10;
/// macOS post-claim exclusive-access retry budget.
pub const MACOS_CLAIM_RETRY_BUDGET_SECS: u64 = 10;
/// macOS close-time reopen poll interval.
pub const MACOS_CLOSE_POLL_INTERVAL_MS: u64 = 100;
/// macOS close-time reopen poll cap.
pub const MACOS_CLOSE_POLL_CAP_SECS: u64 = 10;

// --- ISRC engine (§4.5) ---

/// Number of tracks probed before committing to a full scan.
pub const PROBE_COUNT: usize = 3;
/// Below this many audio tracks, probing is skipped and every track is scanned.
pub const MIN_TRACKS_FOR_PROBE: usize = 5;
/// Maximum distinct ISRC candidates retained per track.
pub const MAX_CANDIDATES: usize = 8;
/// Tranches read before the first consensus check (excluding early-stop checks).
pub const INITIAL_TRANCHES: u32 = 3;
/// Extra tranches read if the initial pass produced candidates but no winner.
pub const RESCUE_TRANCHES: u32 = 1;
/// Frames read per tranche.
pub const FRAMES_PER_TRANCHE: u32 = 192;
/// Frames excluded from sampling at each end of a track (2s at 75fps).
pub const BOOKEND_FRAMES: u32 = 150;
/// Valid ISRC frame count at which a mid-tranche consensus check is attempted.
pub const EARLY_STOP_VALID_FRAMES: u32 = 64;

/// Tracks shorter than this are scanned in a single batch rather than tranched.
pub const fn short_track_threshold() -> u32 {
    2 * BOOKEND_FRAMES + (INITIAL_TRANCHES + RESCUE_TRANCHES + 1) * FRAMES_PER_TRANCHE
}
