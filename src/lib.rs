//! MusicBrainz/AccurateRip/FreeDB disc identification and CD-Text/ISRC
//! extraction.
//!
//! Two entry points: read a physical optical device's table of contents
//! (and, optionally, its ISRCs/CD-Text/MCN), or parse a TOC already
//! expressed as one of four whitespace-integer text dialects. Both paths
//! converge on a single canonical [`toc::Toc`], from which
//! [`orchestrator::run`] computes the three disc identifiers.

pub mod cdb;
pub mod cdtext;
pub mod config;
pub mod crc;
pub mod error;
pub mod ids;
pub mod isrc;
pub mod orchestrator;
pub mod qsubchannel;
pub mod scsi;
pub mod toc;
pub mod toc_parser;
pub mod toc_reader;

pub use error::MbDiscIdError;
pub use orchestrator::{run, DiscInfo, RunMode};
pub use toc::{Toc, TocKind, Track, TrackKind};
