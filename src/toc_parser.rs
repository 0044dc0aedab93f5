//! Text-dialect TOC parser (C6, §4.6).
//!
//! Accepts whitespace-separated integers in one of four dialects (Raw,
//! MusicBrainz, AccurateRip, FreeDB) and produces a canonical [`Toc`].
//! Mirrors the teacher's hand-rolled tokenizer style (no external parser
//! combinator crate) since the grammar is a flat integer list.

use crate::config::CD_PREGAP_FRAMES;
use crate::error::DataError;
use crate::toc::{Toc, Track, TrackKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// # Detected TOC text dialect (§4.6).
pub enum TocFormat {
    Raw,
    MusicBrainz,
    AccurateRip,
    Freedb,
}

fn tokenize(input: &str) -> Result<Vec<u64>, DataError> {
    input
        .split_whitespace()
        .map(|tok| tok.parse::<u64>().map_err(|_| DataError::BadToken(tok.to_owned())))
        .collect()
}

/// # Detect the dialect of a whitespace-integer TOC string (§4.6).
///
/// ## Errors
///
/// Returns [`DataError::BadToken`] on a non-integer token, or
/// [`DataError::Indeterminate`] when the dialect can't be disambiguated.
pub fn toc_detect_format(input: &str) -> Result<TocFormat, DataError> {
    let tokens = tokenize(input)?;
    detect_from_tokens(&tokens)
}

fn detect_from_tokens(tokens: &[u64]) -> Result<TocFormat, DataError> {
    if tokens.len() < 3 {
        return Err(DataError::ArityMismatch(tokens.len()));
    }

    // AccurateRip: `count audio_count first_audio offset1..count leadout`.
    let ar_len = tokens[0] as usize;
    if tokens.len() == ar_len + 4 && ar_len >= 1 && ar_len <= 99 {
        let audio_count = tokens[1];
        let first_audio = tokens[2];
        if audio_count <= ar_len as u64 && first_audio >= 1 && first_audio <= ar_len as u64 {
            return Ok(TocFormat::AccurateRip);
        }
    }

    // FreeDB: `count offset1..count total_seconds`.
    let fdb_len = tokens[0] as usize;
    if tokens.len() == fdb_len + 2 && fdb_len >= 1 && fdb_len <= 99 {
        let last = tokens[tokens.len() - 1];
        let second_last = tokens[tokens.len() - 2];
        if last < 6000 {
            let approx = second_last / 75;
            // Loose: `last` is total disc duration in seconds, `second_last`
            // is the final track's start offset -- they differ by that
            // track's own length, which can run several minutes.
            let tolerance = 300;
            if last.abs_diff(approx) <= tolerance {
                return Ok(TocFormat::Freedb);
            }
        }
    }

    // Raw/MusicBrainz share arity: `first last <leadout-or-offsets...>`,
    // count = last - first + 1 + 3.
    if tokens.len() >= 4 {
        let first = tokens[0];
        let last = tokens[1];
        if last >= first && tokens.len() as u64 == last - first + 1 + 3 {
            let third = tokens[2];
            let final_tok = tokens[tokens.len() - 1];
            if third >= final_tok {
                return Ok(TocFormat::MusicBrainz);
            }
            if final_tok >= third {
                return Ok(TocFormat::Raw);
            }
        }
    }

    Err(DataError::Indeterminate)
}

fn audio_track(number: u8, offset: u32) -> Track {
    Track {
        number,
        session: 1,
        kind: TrackKind::Audio,
        offset,
        length: 0,
        control: 0,
        adr: 1,
        isrc: String::new(),
    }
}

/// # Parse TOC text, auto-detecting the dialect (§4.6).
///
/// ## Errors
///
/// Returns [`DataError`] on malformed input or an undetectable dialect, or
/// if the resulting `Toc` violates §3's invariants.
pub fn parse(input: &str) -> Result<Toc, DataError> {
    let tokens = tokenize(input)?;
    let format = detect_from_tokens(&tokens)?;
    parse_as(&tokens, format)
}

/// # Parse TOC text in a caller-specified dialect, skipping auto-detection.
///
/// ## Errors
///
/// Returns [`DataError`] on malformed input or a `Toc`-invariant violation.
pub fn parse_as(tokens: &[u64], format: TocFormat) -> Result<Toc, DataError> {
    match format {
        TocFormat::Raw => parse_raw(tokens),
        TocFormat::MusicBrainz => parse_musicbrainz(tokens),
        TocFormat::AccurateRip => parse_accuraterip(tokens),
        TocFormat::Freedb => parse_freedb(tokens),
    }
}

fn build_audio_toc(first: u8, offsets: &[u32], leadout: u32) -> Result<Toc, DataError> {
    let tracks: Vec<Track> = offsets
        .iter()
        .enumerate()
        .map(|(i, &o)| audio_track(first + i as u8, o))
        .collect();
    let last = first + offsets.len() as u8 - 1;
    let tracks = Toc::recompute_lengths(tracks, leadout);
    Toc::new(first, last, 1, leadout, leadout, tracks)
}

fn parse_raw(tokens: &[u64]) -> Result<Toc, DataError> {
    // `first last offset1..N leadout`, offsets include pregap.
    let first = u8::try_from(tokens[0]).map_err(|_| DataError::TrackRange(tokens[0] as u32))?;
    let last = u8::try_from(tokens[1]).map_err(|_| DataError::TrackRange(tokens[1] as u32))?;
    let n = (last - first + 1) as usize;
    let offsets_with_pregap = &tokens[2..2 + n];
    let leadout_with_pregap = tokens[2 + n];

    let offsets: Vec<u32> = offsets_with_pregap.iter().map(|&o| (o as u32).saturating_sub(CD_PREGAP_FRAMES)).collect();
    let leadout = (leadout_with_pregap as u32).saturating_sub(CD_PREGAP_FRAMES);
    build_audio_toc(first, &offsets, leadout)
}

fn parse_musicbrainz(tokens: &[u64]) -> Result<Toc, DataError> {
    // `first last leadout offset1..N`, offsets include pregap.
    let first = u8::try_from(tokens[0]).map_err(|_| DataError::TrackRange(tokens[0] as u32))?;
    let last = u8::try_from(tokens[1]).map_err(|_| DataError::TrackRange(tokens[1] as u32))?;
    let leadout_with_pregap = tokens[2];
    let n = (last - first + 1) as usize;
    let offsets_with_pregap = &tokens[3..3 + n];

    let offsets: Vec<u32> = offsets_with_pregap.iter().map(|&o| (o as u32).saturating_sub(CD_PREGAP_FRAMES)).collect();
    let leadout = (leadout_with_pregap as u32).saturating_sub(CD_PREGAP_FRAMES);
    build_audio_toc(first, &offsets, leadout)
}

fn parse_freedb(tokens: &[u64]) -> Result<Toc, DataError> {
    // `count offset1..count total_seconds`, offsets include pregap.
    let count = tokens[0] as usize;
    let offsets_with_pregap = &tokens[1..1 + count];
    let total_seconds = tokens[1 + count];

    let offsets: Vec<u32> = offsets_with_pregap.iter().map(|&o| (o as u32).saturating_sub(CD_PREGAP_FRAMES)).collect();
    let leadout = (total_seconds as u32) * 75 - CD_PREGAP_FRAMES;
    build_audio_toc(1, &offsets, leadout)
}

fn parse_accuraterip(tokens: &[u64]) -> Result<Toc, DataError> {
    // `count audio_count first_audio offset1..count leadout`, raw LBA.
    let count = tokens[0] as usize;
    let audio_count = tokens[1] as usize;
    let first_audio = tokens[2] as usize;
    let offsets = &tokens[3..3 + count];
    let leadout = tokens[3 + count] as u32;

    if first_audio < 1 || first_audio + audio_count - 1 > count {
        return Err(DataError::Invalid(
            "first_audio/audio_count out of range for AccurateRip TOC".to_owned(),
        ));
    }

    let mut tracks = Vec::with_capacity(count);
    for (i, &offset) in offsets.iter().enumerate() {
        let number = (i + 1) as u8;
        let is_audio = i + 1 >= first_audio && i + 1 < first_audio + audio_count;
        tracks.push(Track {
            number,
            session: 1,
            kind: if is_audio { TrackKind::Audio } else { TrackKind::Data },
            offset: offset as u32,
            length: 0,
            control: if is_audio { 0 } else { 0x04 },
            adr: 1,
            isrc: String::new(),
        });
    }

    // The AccurateRip dialect carries a single leadout value, used as-is for
    // both the FreeDB and AccurateRip sums (the dialect's own convention).
    // MusicBrainz ID needs a different, narrower endpoint for Enhanced discs
    // (the audio session's actual end, not the disc's); `ids::musicbrainz_id`
    // derives that itself from the data track's offset rather than reusing
    // this field, so it is intentionally left equal to `leadout` here.
    let tracks = Toc::recompute_lengths(tracks, leadout);
    Toc::new(1, count as u8, 1, leadout, leadout, tracks)
}

#[cfg(test)]
mod tests {
    use super::*;

    // All three derived from the Sublime -- Sublime golden disc (§8), with
    // +150 pregap folded into each offset as Raw/MusicBrainz/FreeDB expect.
    const SUBLIME_RAW: &str = "1 17 150 19745 32575 42805 54545 72047 85787 95555 117545 145010 150657 160517 178172 193610 215417 231297 244930 263855";
    const SUBLIME_MB: &str = "1 17 263855 150 19745 32575 42805 54545 72047 85787 95555 117545 145010 150657 160517 178172 193610 215417 231297 244930";
    const SUBLIME_FREEDB: &str = "17 150 19745 32575 42805 54545 72047 85787 95555 117545 145010 150657 160517 178172 193610 215417 231297 244930 3518";

    #[test]
    fn t_detect_musicbrainz() {
        assert_eq!(toc_detect_format(SUBLIME_MB).unwrap(), TocFormat::MusicBrainz);
    }

    #[test]
    fn t_detect_raw() {
        assert_eq!(toc_detect_format(SUBLIME_RAW).unwrap(), TocFormat::Raw);
    }

    #[test]
    fn t_detect_freedb() {
        assert_eq!(toc_detect_format(SUBLIME_FREEDB).unwrap(), TocFormat::Freedb);
    }

    #[test]
    fn t_parse_raw_and_musicbrainz_agree_with_accuraterip_golden() {
        let toc_raw = parse(SUBLIME_RAW).unwrap();
        let toc_mb = parse(SUBLIME_MB).unwrap();
        assert_eq!(crate::ids::musicbrainz_id(&toc_raw), "m.wjLfLe7XrMz1c_iAL6qo06Q4w-");
        assert_eq!(crate::ids::musicbrainz_id(&toc_mb), "m.wjLfLe7XrMz1c_iAL6qo06Q4w-");
    }

    #[test]
    fn t_detect_accuraterip() {
        let input = "12 12 1 0 17327 32612 48337 63717 78912 94132 109702 124482 141697 157987 177712 198442";
        assert_eq!(toc_detect_format(input).unwrap(), TocFormat::AccurateRip);
    }

    #[test]
    fn t_parse_accuraterip_sublime_golden() {
        let input = "17 17 1 0 19595 32425 42655 54395 71897 85637 95405 117395 144860 150507 160367 178022 193460 215267 231147 244780 263705";
        let toc = parse(input).unwrap();
        assert_eq!(toc.track_count(), 17);
        assert_eq!(toc.audio_count(), 17);
        assert_eq!(toc.leadout, 263705);
        assert_eq!(crate::ids::accuraterip_id(&toc), "017-00231e4f-01bf54d7-e00dbc11");
        assert_eq!(crate::ids::musicbrainz_id(&toc), "m.wjLfLe7XrMz1c_iAL6qo06Q4w-");
    }

    #[test]
    fn t_parse_accuraterip_goo_goo_dolls_golden() {
        let input = "13 13 1 32 12112 28067 45957 58302 77017 97830 112502 130332 143212 151955 173670 183470 203270";
        let toc = parse(input).unwrap();
        assert_eq!(toc.track_count(), 13);
        assert_eq!(toc.audio_count(), 13);
        assert_eq!(toc.leadout, 203270);
        assert_eq!(crate::ids::accuraterip_id(&toc), "013-0015a200-00d903ba-a60a960d");
        assert_eq!(crate::ids::musicbrainz_id(&toc), "eafSQC0kDG0EPmE15c7vmMp6PNs-");
    }

    #[test]
    fn t_parse_accuraterip_metallica_enhanced_golden() {
        let input = "12 11 1 0 26277 59362 97277 121645 159902 185817 218075 242610 274815 298360 349352 357656";
        let toc = parse(input).unwrap();
        assert_eq!(toc.kind(), crate::toc::TocKind::Enhanced);
        assert_eq!(toc.track_count(), 12);
        assert_eq!(toc.audio_count(), 11);
        assert_eq!(toc.leadout, 357656);
        assert_eq!(crate::ids::accuraterip_id(&toc), "011-001f27c4-010ea9c1-bb12a00c");
        assert_eq!(crate::ids::musicbrainz_id(&toc), "eoknU.IyXXaywKSXdaNZgbqkGZw-");
    }

    #[test]
    fn t_parse_accuraterip_blue_october_enhanced_golden() {
        let input = "15 14 1 0 7384 33484 51546 71168 95759 116691 136543 158598 180954 200153 222750 247221 280826 321555 332528";
        let toc = parse(input).unwrap();
        assert_eq!(toc.kind(), crate::toc::TocKind::Enhanced);
        assert_eq!(toc.track_count(), 15);
        assert_eq!(toc.audio_count(), 14);
        assert_eq!(toc.leadout, 332528);
        assert_eq!(crate::ids::accuraterip_id(&toc), "014-00209635-01652576-e211510f");
        assert_eq!(crate::ids::musicbrainz_id(&toc), "hO3GT18x_9qBZL3vZhhpDexHnv8-");
    }

    #[test]
    fn t_parse_accuraterip_sarah_mclachlan_mixed_golden() {
        let input = "9 8 2 0 148584 169332 184647 202455 217583 248108 259838 277928 320378";
        let toc = parse(input).unwrap();
        assert_eq!(toc.kind(), crate::toc::TocKind::Mixed);
        assert_eq!(toc.track_count(), 9);
        assert_eq!(toc.audio_count(), 8);
        assert_eq!(toc.leadout, 320378);
        assert_eq!(crate::ids::accuraterip_id(&toc), "008-001ef535-00ad3cb0-7b10af09");
        assert_eq!(crate::ids::musicbrainz_id(&toc), "xYH60C0oTAOYn7y3CWYvrD7RMH4-");
    }

    #[test]
    fn t_parse_raw_rejects_non_ascending() {
        let input = "1 2 150 200 150 500"; // offsets not ascending
        assert!(parse(input).is_err());
    }
}
