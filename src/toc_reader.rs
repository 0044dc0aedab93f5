//! Device-path TOC construction (C4, §4.4).
//!
//! Turns the raw descriptors from [`crate::scsi::ScsiTransport::read_full_toc`]
//! into a canonical [`Toc`], falling back to the simple TOC (format 0) when
//! the drive doesn't support format 2.

use crate::error::MbDiscIdError;
use crate::scsi::{FullTocDescriptor, POINT_SESSION_FIRST_TRACK, POINT_SESSION_LAST_TRACK, POINT_SESSION_LEADOUT};
use crate::toc::{Toc, Track, TrackKind};

/// # Build a [`Toc`] from Full-TOC descriptors (§4.4).
///
/// ## Errors
///
/// Returns [`MbDiscIdError::Data`] if the descriptors don't contain a usable
/// track range or leadout.
pub fn build_from_full_toc(descriptors: &[FullTocDescriptor]) -> Result<Toc, MbDiscIdError> {
    let last_session = descriptors.iter().map(|d| d.session).max().unwrap_or(1);

    let mut tracks = Vec::new();
    for d in descriptors {
        if (1..=99).contains(&d.point) {
            tracks.push(Track {
                number: d.point,
                session: d.session,
                kind: if d.control & 0x04 != 0 { TrackKind::Data } else { TrackKind::Audio },
                offset: d.p_lba(),
                length: 0,
                control: d.control,
                adr: d.adr,
                isrc: String::new(),
            });
        }
    }
    tracks.sort_by_key(|t| t.number);

    let leadout = descriptors
        .iter()
        .filter(|d| d.point == POINT_SESSION_LEADOUT && d.session == last_session)
        .map(FullTocDescriptor::p_lba)
        .max()
        .ok_or_else(|| MbDiscIdError::Internal("no leadout descriptor in full TOC".to_owned()))?;

    let first_track = descriptors
        .iter()
        .find(|d| d.point == POINT_SESSION_FIRST_TRACK && d.session == 1)
        .map_or_else(|| tracks.first().map_or(1, |t| t.number), |d| d.p_min);
    let last_track = descriptors
        .iter()
        .filter(|d| d.point == POINT_SESSION_LAST_TRACK)
        .map(|d| d.p_min)
        .max()
        .unwrap_or_else(|| tracks.last().map_or(first_track, |t| t.number));

    let audio_leadout = if last_session > 1 {
        // Multi-session: audio ends where session 1 ends.
        descriptors
            .iter()
            .filter(|d| d.point == POINT_SESSION_LEADOUT && d.session == 1)
            .map(FullTocDescriptor::p_lba)
            .max()
            .unwrap_or(leadout)
    } else if let Some(first_data) = tracks.iter().find(|t| !t.is_audio()) {
        // Single session, Enhanced shape: audio runs up to the first data track.
        let audio_before_data = tracks
            .iter()
            .take_while(|t| t.number < first_data.number)
            .all(Track::is_audio);
        if audio_before_data && first_data.number != tracks.first().map_or(0, |t| t.number) {
            first_data.offset
        } else {
            leadout
        }
    } else {
        leadout
    };

    let tracks = Toc::recompute_lengths(tracks, leadout);
    Toc::new(first_track, last_track, last_session, leadout, audio_leadout, tracks).map_err(MbDiscIdError::from)
}

/// # Build a [`Toc`] from a simple TOC read (format 0) — no session/control
/// info, every track treated as audio, single session.
///
/// ## Errors
///
/// Returns [`MbDiscIdError::Data`] if the resulting TOC violates §3's
/// invariants.
pub fn build_from_simple_toc(first: u8, last: u8, leadout: u32) -> Result<Toc, MbDiscIdError> {
    let step = if last > first {
        (leadout.saturating_sub(crate::config::CD_PREGAP_FRAMES)) / u32::from(last - first + 1)
    } else {
        0
    };
    let mut tracks = Vec::new();
    for (i, number) in (first..=last).enumerate() {
        tracks.push(Track {
            number,
            session: 1,
            kind: TrackKind::Audio,
            offset: crate::config::CD_PREGAP_FRAMES + step * i as u32,
            length: 0,
            control: 0,
            adr: 1,
            isrc: String::new(),
        });
    }
    let tracks = Toc::recompute_lengths(tracks, leadout);
    Toc::new(first, last, 1, leadout, leadout, tracks).map_err(MbDiscIdError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(session: u8, control: u8, point: u8, min: u8, sec: u8, frame: u8) -> FullTocDescriptor {
        FullTocDescriptor {
            session,
            adr: 1,
            control,
            point,
            p_min: min,
            p_sec: sec,
            p_frame: frame,
        }
    }

    #[test]
    fn t_single_session_audio_only() {
        let descs = vec![
            desc(1, 0, POINT_SESSION_FIRST_TRACK, 1, 0, 0),
            desc(1, 0, POINT_SESSION_LAST_TRACK, 2, 0, 0),
            desc(1, 0, 1, 0, 2, 0),
            desc(1, 0, 2, 4, 0, 0),
            desc(1, 0, POINT_SESSION_LEADOUT, 6, 0, 0),
        ];
        let toc = build_from_full_toc(&descs).unwrap();
        assert_eq!(toc.track_count(), 2);
        assert_eq!(toc.audio_leadout, toc.leadout);
    }

    #[test]
    fn t_enhanced_multisession_audio_leadout() {
        let descs = vec![
            desc(1, 0, POINT_SESSION_FIRST_TRACK, 1, 0, 0),
            desc(1, 0, POINT_SESSION_LAST_TRACK, 1, 0, 0),
            desc(1, 0, 1, 0, 2, 0),
            desc(1, 0, POINT_SESSION_LEADOUT, 5, 0, 0),
            desc(2, 0x04, POINT_SESSION_FIRST_TRACK, 2, 0, 0),
            desc(2, 0x04, POINT_SESSION_LAST_TRACK, 2, 0, 0),
            desc(2, 0x04, 2, 6, 0, 0),
            desc(2, 0x04, POINT_SESSION_LEADOUT, 10, 0, 0),
        ];
        let toc = build_from_full_toc(&descs).unwrap();
        assert_eq!(toc.last_session, 2);
        assert_eq!(toc.audio_leadout, 5 * 60 * 75 - 150);
        assert_eq!(toc.leadout, 10 * 60 * 75 - 150);
    }

    #[test]
    fn t_simple_toc_fallback_single_session_audio() {
        let toc = build_from_simple_toc(1, 3, 60_000).unwrap();
        assert_eq!(toc.track_count(), 3);
        assert!(toc.tracks.iter().all(Track::is_audio));
        assert_eq!(toc.last_session, 1);
    }
}
