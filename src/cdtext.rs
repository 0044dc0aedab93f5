//! CD-Text decoder (C3, §4.3).
//!
//! Decodes the raw pack stream returned by
//! [`crate::scsi::ScsiTransport::read_cdtext_raw`] (format 5) into a
//! [`CdText`]. Reuses [`crate::crc::crc16_ccitt`] with the CD-Text init value
//! (0x0000) -- the same shared routine the Q-subchannel decoder uses with
//! 0xFFFF, per the §9 note about a historical stale-CRC-init bug.

use std::collections::BTreeMap;

use crate::crc::crc16_ccitt;

const PACK_BYTES: usize = 18;
const CDTEXT_CRC_INIT: u16 = 0x0000;

const PACK_TITLE: u8 = 0x80;
const PACK_PERFORMER: u8 = 0x81;
const PACK_SONGWRITER: u8 = 0x82;
const PACK_COMPOSER: u8 = 0x83;
const PACK_ARRANGER: u8 = 0x84;
const PACK_MESSAGE: u8 = 0x85;
const PACK_GENRE: u8 = 0x87;
const PACK_SIZE_INFO: u8 = 0x8F;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// # Decoded CD-Text, keyed by track number (0 = album/disc-level fields).
pub struct CdTextTrack {
    pub title: Option<String>,
    pub performer: Option<String>,
    pub lyricist: Option<String>,
    pub composer: Option<String>,
    pub arranger: Option<String>,
    pub comment: Option<String>,
    pub genre: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// # Full decoded CD-Text block. Never an error; absence is an empty map.
pub struct CdText {
    pub tracks: BTreeMap<u8, CdTextTrack>,
}

struct Pack {
    pack_type: u8,
    seq_num: u8,
    /// Block number, bits 4-6 of `char_pos`.
    block: u8,
    /// DBCS flag, bit 7 of `char_pos`.
    dbcs: bool,
    text: [u8; 12],
}

fn valid_packs(raw: &[u8]) -> Vec<Pack> {
    raw.chunks_exact(PACK_BYTES)
        .filter_map(|p| {
            let computed = crc16_ccitt(&p[..16], CDTEXT_CRC_INIT);
            let stored = u16::from_be_bytes([p[16], p[17]]);
            (!computed == stored).then(|| {
                let mut text = [0u8; 12];
                text.copy_from_slice(&p[4..16]);
                Pack {
                    pack_type: p[0],
                    seq_num: p[2],
                    block: (p[3] >> 4) & 0x07,
                    dbcs: p[3] & 0x80 != 0,
                    text,
                }
            })
        })
        .collect()
}

/// # Decode a raw CD-Text pack stream (§4.3).
#[must_use]
pub fn decode(raw: &[u8]) -> CdText {
    let mut out = CdText::default();
    if raw.len() % PACK_BYTES != 0 {
        return out;
    }
    let packs = valid_packs(raw);
    let block0: Vec<&Pack> = packs.iter().filter(|p| p.block == 0).collect();

    let Some(size_info) = block0
        .iter()
        .find(|p| p.pack_type == PACK_SIZE_INFO && p.seq_num == 0)
    else {
        return out;
    };
    let charset = size_info.text[0];
    if charset != 0x00 && charset != 0x01 {
        return out;
    }

    // Per-pack-type byte accumulator; null bytes advance the track index.
    let mut streams: BTreeMap<u8, Vec<u8>> = BTreeMap::new();
    for p in &block0 {
        if p.dbcs {
            continue; // DBCS block, not supported (§9)
        }
        if !matches!(
            p.pack_type,
            PACK_TITLE | PACK_PERFORMER | PACK_SONGWRITER | PACK_COMPOSER | PACK_ARRANGER | PACK_MESSAGE | PACK_GENRE
        ) {
            continue;
        }
        streams.entry(p.pack_type).or_default().extend_from_slice(&p.text);
    }

    for (pack_type, bytes) in streams {
        let strings = split_null_separated(&bytes);
        for (track, raw_str) in strings.into_iter().enumerate() {
            let Some(normalized) = normalize(&raw_str) else { continue };
            let entry = out.tracks.entry(track as u8).or_default();
            assign(entry, track as u8, pack_type, normalized);
        }
    }
    out
}

fn assign(entry: &mut CdTextTrack, track: u8, pack_type: u8, text: String) {
    match pack_type {
        PACK_TITLE => entry.title = Some(text),
        PACK_PERFORMER => entry.performer = Some(text),
        PACK_SONGWRITER => entry.lyricist = Some(text),
        PACK_COMPOSER => entry.composer = Some(text),
        PACK_ARRANGER => entry.arranger = Some(text),
        PACK_MESSAGE => entry.comment = Some(text),
        // GENRE is an album-scope field only; the data model has no
        // per-track genre, so a stray extra null in the GENRE stream must
        // not leak into a track entry.
        PACK_GENRE if track == 0 => entry.genre = Some(text),
        _ => {}
    }
}

fn split_null_separated(bytes: &[u8]) -> Vec<Vec<u8>> {
    bytes.split(|&b| b == 0).map(<[u8]>::to_vec).collect()
}

/// ISO-8859-1 -> UTF-8, drop trailing NULs/`\r`, blank out low controls
/// except `\n`, trim, empty -> `None`.
fn normalize(raw: &[u8]) -> Option<String> {
    let s: String = raw
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect();
    let s: String = s
        .chars()
        .map(|c| if c != '\n' && (c as u32) < 0x20 { ' ' } else { c })
        .collect();
    let s = s.trim_end_matches('\r').trim().to_owned();
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(pack_type: u8, char_pos: u8, text: &[u8]) -> [u8; PACK_BYTES] {
        let mut buf = [0u8; PACK_BYTES];
        buf[0] = pack_type;
        buf[3] = char_pos; // bits 4-6 = block, bit 7 = DBCS; 0 = block 0, non-DBCS
        let n = text.len().min(12);
        buf[4..4 + n].copy_from_slice(&text[..n]);
        let crc = crc16_ccitt(&buf[..16], CDTEXT_CRC_INIT);
        buf[16..18].copy_from_slice(&(!crc).to_be_bytes());
        buf
    }

    #[test]
    fn t_decode_title_album_and_track() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&pack(PACK_SIZE_INFO, 0, &[0x00, 1, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0]));
        raw.extend_from_slice(&pack(PACK_TITLE, 0, b"Album\0Song 1"));
        let cdtext = decode(&raw);
        assert_eq!(cdtext.tracks.get(&0).unwrap().title.as_deref(), Some("Album"));
        assert_eq!(cdtext.tracks.get(&1).unwrap().title.as_deref(), Some("Song 1"));
    }

    #[test]
    fn t_invalid_crc_pack_ignored() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&pack(PACK_SIZE_INFO, 0, &[0x00, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0]));
        let mut bad = pack(PACK_TITLE, 0, b"Garbled");
        bad[4] ^= 0xFF;
        raw.extend_from_slice(&bad);
        let cdtext = decode(&raw);
        assert!(cdtext.tracks.get(&0).is_none_or(|t| t.title.is_none()));
    }

    #[test]
    fn t_unsupported_charset_yields_empty() {
        let raw = pack(PACK_SIZE_INFO, 0, &[0x80, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(decode(&raw).tracks.is_empty());
    }

    #[test]
    fn t_genre_never_assigned_to_a_track_entry() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&pack(PACK_SIZE_INFO, 0, &[0x00, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0]));
        // Stray extra null gives the stream a second (track-1) slot.
        raw.extend_from_slice(&pack(PACK_GENRE, 0, b"Rock\0Ska"));
        let cdtext = decode(&raw);
        assert_eq!(cdtext.tracks.get(&0).unwrap().genre.as_deref(), Some("Rock"));
        assert!(cdtext.tracks.get(&1).is_none_or(|t| t.genre.is_none()));
    }
}
