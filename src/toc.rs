//! Canonical table-of-contents data model (§3), shared by the device-read
//! path (C4) and the text-dialect parser (C6), and consumed by the
//! identifier calculator (C7).
//!
//! Shaped after the teacher's plain, validated-on-construction data structs
//! (`Toc`/`TocEntry` in `structures.rs`), generalized from the legacy
//! CDROM-ioctl TOC entry to the richer multi-session/control/ISRC model §3
//! requires.

use crate::error::DataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// # Track type, derived from the control nibble's data bit (bit 2).
pub enum TrackKind {
    Audio,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// # Disc classification (§4.8), also consulted by the identifier
/// calculator for the Enhanced/Mixed leadout rule (§4.7).
pub enum TocKind {
    /// No data tracks at all.
    Audio,
    /// Multi-session disc, audio in session 1, data in session 2+.
    Enhanced,
    /// Single-session disc, track 1 is data, audio tracks follow.
    Mixed,
    /// Data tracks present but neither Enhanced nor Mixed shape applies.
    Unknown,
}

#[derive(Debug, Clone)]
/// # One track entry in a [`Toc`].
pub struct Track {
    pub number: u8,
    pub session: u8,
    pub kind: TrackKind,
    /// Raw (pregap-subtracted) LBA.
    pub offset: u32,
    /// Length in frames.
    pub length: u32,
    pub control: u8,
    pub adr: u8,
    /// 12-character ISRC, or empty if unknown/unset.
    pub isrc: String,
}

impl Track {
    #[must_use]
    pub const fn is_audio(&self) -> bool {
        matches!(self.kind, TrackKind::Audio)
    }
}

#[derive(Debug, Clone)]
/// # Canonical disc table of contents.
pub struct Toc {
    pub first_track: u8,
    pub last_track: u8,
    pub last_session: u8,
    /// Raw LBA of the lead-out.
    pub leadout: u32,
    /// LBA ending the audio session (§3).
    pub audio_leadout: u32,
    /// Ordered by track number.
    pub tracks: Vec<Track>,
}

impl Toc {
    /// # Build and validate a [`Toc`] from already-decoded tracks.
    ///
    /// ## Errors
    ///
    /// Returns [`DataError`] if any of the §3 invariants are violated.
    pub fn new(
        first_track: u8,
        last_track: u8,
        last_session: u8,
        leadout: u32,
        audio_leadout: u32,
        tracks: Vec<Track>,
    ) -> Result<Self, DataError> {
        if tracks.is_empty() || !(1..=99).contains(&first_track) || last_track > 99 {
            return Err(DataError::TrackRange(u32::from(first_track)));
        }

        let mut prev: Option<u32> = None;
        for t in &tracks {
            if let Some(p) = prev {
                if t.offset <= p {
                    return Err(DataError::NonAscendingOffsets);
                }
            }
            prev = Some(t.offset);
        }

        if let Some(last) = tracks.last() {
            if leadout <= last.offset {
                return Err(DataError::LeadoutTooSmall);
            }
        }

        if audio_leadout > leadout {
            return Err(DataError::Invalid(
                "audio_leadout exceeds leadout".to_owned(),
            ));
        }

        Ok(Self {
            first_track,
            last_track,
            last_session: last_session.max(1),
            leadout,
            audio_leadout,
            tracks,
        })
    }

    #[must_use]
    pub fn track_count(&self) -> u32 {
        self.tracks.len() as u32
    }

    #[must_use]
    pub fn audio_count(&self) -> u32 {
        self.tracks.iter().filter(|t| t.is_audio()).count() as u32
    }

    #[must_use]
    pub fn data_count(&self) -> u32 {
        self.track_count() - self.audio_count()
    }

    #[must_use]
    pub fn track(&self, number: u8) -> Option<&Track> {
        self.tracks.iter().find(|t| t.number == number)
    }

    /// # Raw LBA offsets of every audio track, in track-number order.
    pub fn audio_sectors(&self) -> impl Iterator<Item = u32> + '_ {
        self.tracks.iter().filter(|t| t.is_audio()).map(|t| t.offset)
    }

    /// # Raw LBA offset of the first data track, if any.
    #[must_use]
    pub fn data_sector(&self) -> Option<u32> {
        self.tracks.iter().find(|t| !t.is_audio()).map(|t| t.offset)
    }

    /// # Disc-shape classification (§4.8 / §4.7).
    #[must_use]
    pub fn kind(&self) -> TocKind {
        if self.data_count() == 0 {
            return TocKind::Audio;
        }
        let first_is_data = self.tracks.first().is_some_and(|t| !t.is_audio());
        let last_is_data = self.tracks.last().is_some_and(|t| !t.is_audio());
        if first_is_data {
            TocKind::Mixed
        } else if last_is_data {
            TocKind::Enhanced
        } else {
            TocKind::Unknown
        }
    }

    /// # Length in frames for `track`, computed as the gap to the next
    /// track's offset, or to `leadout` for the last track.
    #[must_use]
    pub fn recompute_lengths(mut tracks: Vec<Track>, leadout: u32) -> Vec<Track> {
        let n = tracks.len();
        for i in 0..n {
            let next_offset = if i + 1 < n {
                tracks[i + 1].offset
            } else {
                leadout
            };
            tracks[i].length = next_offset.saturating_sub(tracks[i].offset);
        }
        tracks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(number: u8, offset: u32, kind: TrackKind) -> Track {
        Track {
            number,
            session: 1,
            kind,
            offset,
            length: 0,
            control: if matches!(kind, TrackKind::Data) { 0x04 } else { 0x00 },
            adr: 1,
            isrc: String::new(),
        }
    }

    #[test]
    fn t_rejects_non_ascending_offsets() {
        let tracks = vec![track(1, 100, TrackKind::Audio), track(2, 50, TrackKind::Audio)];
        assert!(Toc::new(1, 2, 1, 500, 500, tracks).is_err());
    }

    #[test]
    fn t_rejects_leadout_too_small() {
        let tracks = vec![track(1, 100, TrackKind::Audio)];
        assert!(Toc::new(1, 1, 1, 100, 100, tracks).is_err());
    }

    #[test]
    fn t_kind_classification() {
        let audio_only = Toc::new(
            1,
            2,
            1,
            500,
            500,
            vec![track(1, 0, TrackKind::Audio), track(2, 200, TrackKind::Audio)],
        )
        .unwrap();
        assert_eq!(audio_only.kind(), TocKind::Audio);

        let enhanced = Toc::new(
            1,
            2,
            2,
            500,
            200,
            vec![track(1, 0, TrackKind::Audio), track(2, 200, TrackKind::Data)],
        )
        .unwrap();
        assert_eq!(enhanced.kind(), TocKind::Enhanced);

        let mixed = Toc::new(
            1,
            2,
            1,
            500,
            500,
            vec![track(1, 0, TrackKind::Data), track(2, 200, TrackKind::Audio)],
        )
        .unwrap();
        assert_eq!(mixed.kind(), TocKind::Mixed);
    }
}
