//! Minimal demo binary (§6): reads a device path or parses a `--calc`
//! TOC-text argument, prints the computed identifiers. No flag parsing
//! beyond that one switch -- a full CLI is out of scope for this crate.

use std::env;
use std::process::exit;

use mbdiscid::{run, DiscInfo, MbDiscIdError, RunMode};

fn main() {
    env_logger::init();

    let mut args = env::args().skip(1);
    let mode = match args.next().as_deref() {
        Some("--calc") => {
            let Some(toc_text) = args.next() else {
                eprintln!("mbdiscid: --calc requires a TOC-text argument");
                exit(64);
            };
            RunMode::Text { toc_text }
        }
        Some(path) => RunMode::Device {
            path: path.to_owned(),
            want_isrc: true,
            want_cdtext: true,
            want_mcn: true,
        },
        None => {
            eprintln!("mbdiscid: usage: mbdiscid <device> | mbdiscid --calc <toc-text>");
            exit(64);
        }
    };

    match run(mode) {
        Ok(info) => print_info(&info),
        Err(e) => {
            eprintln!("mbdiscid: {e}");
            exit(exit_code(&e));
        }
    }
}

fn print_info(info: &DiscInfo) {
    println!("MusicBrainz ID:  {}", info.musicbrainz_id);
    println!("AccurateRip ID:  {}", info.accuraterip_id);
    println!("FreeDB ID:       {:08x}", info.freedb_id);
    println!("Disc kind:       {:?}", info.kind);
    println!("Tracks:          {}", info.toc.track_count());
    if let Some(mcn) = &info.mcn {
        println!("MCN:             {mcn}");
    }
    for (track, isrc) in &info.isrcs {
        println!("Track {track:>3} ISRC: {isrc}");
    }
}

fn exit_code(e: &MbDiscIdError) -> i32 {
    match e {
        MbDiscIdError::Usage(_) => 64,
        MbDiscIdError::Data(_) => 65,
        MbDiscIdError::Unavailable(_) => 69,
        MbDiscIdError::Internal(_) => 70,
        MbDiscIdError::Io(_) => 74,
    }
}
