//! Top-level orchestrator (C8, §4.8).
//!
//! Wires the transport, TOC reader, CD-Text decoder, ISRC engine and
//! identifier calculator into the two entry points this crate exposes:
//! read a physical device, or parse TOC text.

use std::collections::BTreeMap;

use crate::cdtext::{self, CdText};
use crate::error::MbDiscIdError;
use crate::ids;
use crate::scsi::{self, ScsiTransport};
use crate::toc::{Toc, TocKind};
use crate::toc_parser;
use crate::toc_reader;

#[derive(Debug, Clone)]
/// # How to run the orchestrator (§4.8).
pub enum RunMode {
    /// Read a physical optical device.
    Device {
        path: String,
        want_isrc: bool,
        want_cdtext: bool,
        want_mcn: bool,
    },
    /// Parse a TOC text string (auto-detected dialect); no MCN/ISRC/CD-Text.
    Text { toc_text: String },
}

#[derive(Debug, Clone)]
/// # Aggregate disc information produced by [`run`].
pub struct DiscInfo {
    pub toc: Toc,
    pub kind: TocKind,
    pub musicbrainz_id: String,
    pub accuraterip_id: String,
    pub freedb_id: u32,
    pub mcn: Option<String>,
    /// ISRC per audio track number; empty string means indeterminate.
    pub isrcs: BTreeMap<u8, String>,
    pub cdtext: Option<CdText>,
}

fn compute_ids(toc: &Toc) -> (String, String, u32) {
    (ids::musicbrainz_id(toc), ids::accuraterip_id(toc), ids::freedb_id(toc))
}

/// # Run the orchestrator (§4.8).
///
/// ## Errors
///
/// Returns [`MbDiscIdError`] if the device can't be opened, the TOC can't be
/// read/parsed, or the resulting TOC violates §3's invariants.
pub fn run(mode: RunMode) -> Result<DiscInfo, MbDiscIdError> {
    match mode {
        RunMode::Text { toc_text } => {
            let toc = toc_parser::parse(&toc_text)?;
            let (musicbrainz_id, accuraterip_id, freedb_id) = compute_ids(&toc);
            Ok(DiscInfo {
                kind: toc.kind(),
                musicbrainz_id,
                accuraterip_id,
                freedb_id,
                mcn: None,
                isrcs: BTreeMap::new(),
                cdtext: None,
                toc,
            })
        }
        RunMode::Device {
            path,
            want_isrc,
            want_cdtext,
            want_mcn,
        } => run_device::<scsi::Transport>(&path, want_isrc, want_cdtext, want_mcn),
    }
}

fn run_device<T: ScsiTransport>(
    path: &str,
    want_isrc: bool,
    want_cdtext: bool,
    want_mcn: bool,
) -> Result<DiscInfo, MbDiscIdError> {
    let mut transport = T::open(path)?;

    let toc = match transport.read_full_toc() {
        Ok(descriptors) if !descriptors.is_empty() => toc_reader::build_from_full_toc(&descriptors)?,
        _ => {
            let (first, last, leadout) = transport.read_toc_simple()?;
            toc_reader::build_from_simple_toc(first, last, leadout)?
        }
    };

    let mcn = want_mcn.then(|| transport.read_mcn_via_drive()).flatten();

    let isrcs = if want_isrc {
        let results = crate::isrc::run(&mut transport, &toc);
        toc.tracks
            .iter()
            .filter(|t| t.is_audio())
            .map(|t| t.number)
            .zip(results)
            .filter(|(_, isrc)| !isrc.is_empty())
            .collect()
    } else {
        BTreeMap::new()
    };

    let cdtext = if want_cdtext {
        transport.read_cdtext_raw().ok().map(|raw| cdtext::decode(&raw))
    } else {
        None
    };

    let (musicbrainz_id, accuraterip_id, freedb_id) = compute_ids(&toc);
    let kind = toc.kind();

    Ok(DiscInfo {
        toc,
        kind,
        musicbrainz_id,
        accuraterip_id,
        freedb_id,
        mcn,
        isrcs,
        cdtext,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_text_mode_populates_ids_and_leaves_device_fields_empty() {
        let toc_text = "17 17 1 0 19595 32425 42655 54395 71897 85637 95405 117395 144860 150507 160367 178022 193460 215267 231147 244780 263705";
        let info = run(RunMode::Text {
            toc_text: toc_text.to_owned(),
        })
        .unwrap();
        assert_eq!(info.accuraterip_id, "017-00231e4f-01bf54d7-e00dbc11");
        assert_eq!(info.musicbrainz_id, "m.wjLfLe7XrMz1c_iAL6qo06Q4w-");
        assert!(info.mcn.is_none());
        assert!(info.isrcs.is_empty());
        assert!(info.cdtext.is_none());
        assert_eq!(info.kind, TocKind::Audio);
    }

    #[test]
    fn t_text_mode_rejects_malformed_input() {
        assert!(run(RunMode::Text {
            toc_text: "not a toc".to_owned(),
        })
        .is_err());
    }
}
