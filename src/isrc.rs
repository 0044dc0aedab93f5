//! ISRC consensus engine (C5, §4.5) -- the hardest subsystem.
//!
//! Returns, per audio track, the ISRC read with enough redundancy to trust,
//! or nothing. Distinguishes "this disc has no ISRCs" (probe fails, stop
//! fast) from "this track's ISRC is too noisy" (scan completes, no winner)
//! from "consensus reached". Tuned by the constants in [`crate::config`].

use crate::config;
use crate::qsubchannel::{QPayload, QSubchannel};
use crate::scsi::ScsiTransport;
use crate::toc::Toc;

/// A bounded multiset of (isrc, count) pairs, capped at
/// [`config::MAX_CANDIDATES`] distinct values.
#[derive(Debug, Default)]
struct Collector {
    candidates: Vec<(String, u32)>,
}

impl Collector {
    fn record(&mut self, isrc: &str) {
        if let Some(entry) = self.candidates.iter_mut().find(|(s, _)| s == isrc) {
            entry.1 += 1;
        } else if self.candidates.len() < config::MAX_CANDIDATES {
            self.candidates.push((isrc.to_owned(), 1));
        }
    }

    /// Apply the §4.5 consensus rule exactly: `winner ≥ 2 AND (second == 0
    /// OR winner ≥ 2·second)`.
    fn consensus(&self) -> Option<&str> {
        let mut sorted: Vec<&(String, u32)> = self.candidates.iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        let (winner_isrc, winner_count) = sorted.first()?;
        let second = sorted.get(1).map_or(0, |(_, c)| *c);
        (*winner_count >= 2 && (second == 0 || *winner_count >= 2 * second)).then_some(winner_isrc.as_str())
    }
}

fn feed_frames(collector: &mut Collector, frames: &[QSubchannel]) -> u32 {
    let mut valid = 0;
    for f in frames {
        if let QPayload::Isrc(isrc) = &f.payload {
            if f.crc_valid {
                collector.record(isrc);
                valid += 1;
            }
        }
    }
    valid
}

fn scan_short_track(transport: &mut impl ScsiTransport, offset: u32, length: u32) -> String {
    let mut collector = Collector::default();
    if let Ok(frames) = transport.read_q_batch(offset, length) {
        feed_frames(&mut collector, &frames);
    }
    collector.consensus().map(str::to_owned).unwrap_or_default()
}

fn tranche_positions(offset: u32, length: u32, tranches: u32) -> Vec<u32> {
    let usable_start = offset + config::BOOKEND_FRAMES;
    let usable_end = (offset + length).saturating_sub(config::BOOKEND_FRAMES);
    let usable_length = usable_end.saturating_sub(usable_start);
    let step = usable_length / (tranches + 1);
    (1..=tranches).map(|i| usable_start + step * i).collect()
}

fn scan_long_track(transport: &mut impl ScsiTransport, offset: u32, length: u32) -> String {
    let mut collector = Collector::default();
    let mut total_valid = 0u32;

    let initial = tranche_positions(offset, length, config::INITIAL_TRANCHES);
    for pos in &initial {
        if let Ok(frames) = transport.read_q_batch(*pos, config::FRAMES_PER_TRANCHE) {
            total_valid += feed_frames(&mut collector, &frames);
        }
        if total_valid >= config::EARLY_STOP_VALID_FRAMES {
            if let Some(winner) = collector.consensus() {
                return winner.to_owned();
            }
        }
    }

    if let Some(winner) = collector.consensus() {
        return winner.to_owned();
    }
    if collector.candidates.is_empty() {
        return String::new();
    }

    let all_positions = tranche_positions(offset, length, config::INITIAL_TRANCHES + config::RESCUE_TRANCHES);
    for pos in all_positions.iter().skip(initial.len()) {
        if let Ok(frames) = transport.read_q_batch(*pos, config::FRAMES_PER_TRANCHE) {
            feed_frames(&mut collector, &frames);
        }
        if let Some(winner) = collector.consensus() {
            return winner.to_owned();
        }
    }

    String::new()
}

fn scan_track(transport: &mut impl ScsiTransport, offset: u32, length: u32) -> String {
    if length < config::short_track_threshold() {
        scan_short_track(transport, offset, length)
    } else {
        scan_long_track(transport, offset, length)
    }
}

/// Pick probe-track indices (0-based into `eligible`) near 33/50/67%,
/// biased away from the first and last entries when a nearby alternative
/// exists (§4.5 step 4).
fn probe_indices(eligible_len: usize) -> Vec<usize> {
    let fractions = [1.0 / 3.0, 0.5, 2.0 / 3.0];
    let mut picks: Vec<usize> = fractions
        .iter()
        .map(|&f| {
            let raw = (f * eligible_len as f64) as usize;
            raw.clamp(0, eligible_len - 1)
        })
        .collect();

    for p in &mut picks {
        if *p == 0 && eligible_len > 1 {
            *p = 1;
        }
        if *p == eligible_len - 1 && eligible_len > 1 {
            *p = eligible_len - 2;
        }
    }
    picks.sort_unstable();
    picks.dedup();
    picks
}

/// # Run the ISRC consensus engine over every audio track in `toc` (§4.5).
///
/// Returns a vector parallel to `toc`'s audio tracks (in track-number
/// order), each entry the accepted ISRC or an empty string.
///
/// ## Errors
///
/// Returns [`crate::error::MbDiscIdError::Io`] only if the disc-level batch
/// viability probe itself fails to open frames at all (propagated from the
/// transport); per-track scan failures degrade to an empty result for that
/// track, not a fatal error.
pub fn run(transport: &mut impl ScsiTransport, toc: &Toc) -> Vec<String> {
    let audio_tracks: Vec<(u8, u32, u32)> = toc
        .tracks
        .iter()
        .filter(|t| t.is_audio())
        .map(|t| (t.number, t.offset, t.length))
        .collect();

    let mut results = vec![String::new(); audio_tracks.len()];
    let Some(&(_, first_offset, _)) = audio_tracks.first() else {
        return results;
    };

    // Step 2: batch-read viability probe.
    let batch_usable = transport
        .read_q_batch(first_offset + 100, 10)
        .map(|frames| frames.iter().any(|f| f.crc_valid))
        .unwrap_or(false);

    if !batch_usable {
        for (i, (number, _, _)) in audio_tracks.iter().enumerate() {
            if let Some(isrc) = transport.read_isrc_via_drive(*number) {
                results[i] = isrc;
            }
        }
        return results;
    }

    let n = audio_tracks.len();
    if n < config::MIN_TRACKS_FOR_PROBE {
        for (i, &(_, offset, length)) in audio_tracks.iter().enumerate() {
            results[i] = scan_track(transport, offset, length);
        }
        return results;
    }

    // Step 4: probe a subset, biased away from the short-track pool.
    let eligible: Vec<usize> = (0..n).filter(|&i| audio_tracks[i].2 >= config::short_track_threshold()).collect();
    if eligible.len() < 3 {
        for (i, &(_, offset, length)) in audio_tracks.iter().enumerate() {
            results[i] = scan_track(transport, offset, length);
        }
        return results;
    }

    let probe_eligible_indices = probe_indices(eligible.len());
    let probe_track_indices: Vec<usize> = probe_eligible_indices.iter().map(|&i| eligible[i]).collect();

    let mut any_probe_hit = false;
    for &i in &probe_track_indices {
        let (_, offset, length) = audio_tracks[i];
        let isrc = scan_track(transport, offset, length);
        if !isrc.is_empty() {
            any_probe_hit = true;
        }
        results[i] = isrc;
    }

    if !any_probe_hit {
        return results; // disc has no ISRCs; stop fast (§4.5 step 5)
    }

    for (i, &(_, offset, length)) in audio_tracks.iter().enumerate() {
        if probe_track_indices.contains(&i) {
            continue;
        }
        results[i] = scan_track(transport, offset, length);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector_of(counts: &[(&str, u32)]) -> Collector {
        let mut c = Collector::default();
        for &(isrc, n) in counts {
            for _ in 0..n {
                c.record(isrc);
            }
        }
        c
    }

    #[test]
    fn t_consensus_5_vs_2_accepts() {
        let c = collector_of(&[("A", 5), ("B", 2)]);
        assert_eq!(c.consensus(), Some("A"));
    }

    #[test]
    fn t_consensus_3_vs_2_rejects() {
        let c = collector_of(&[("A", 3), ("B", 2)]);
        assert_eq!(c.consensus(), None);
    }

    #[test]
    fn t_consensus_2_vs_1_accepts() {
        let c = collector_of(&[("A", 2), ("B", 1)]);
        assert_eq!(c.consensus(), Some("A"));
    }

    #[test]
    fn t_consensus_single_hit_rejects() {
        let c = collector_of(&[("A", 1)]);
        assert_eq!(c.consensus(), None);
    }

    #[test]
    fn t_consensus_empty_rejects() {
        let c = Collector::default();
        assert_eq!(c.consensus(), None);
    }

    #[test]
    fn t_collector_caps_at_max_candidates() {
        let mut c = Collector::default();
        for i in 0..(config::MAX_CANDIDATES + 5) {
            c.record(&format!("CAND{i:08}"));
        }
        assert_eq!(c.candidates.len(), config::MAX_CANDIDATES);
    }

    #[test]
    fn t_probe_indices_avoid_endpoints() {
        let picks = probe_indices(10);
        assert!(!picks.contains(&0));
        assert!(!picks.contains(&9));
    }
}
