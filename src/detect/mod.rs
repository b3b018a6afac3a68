//! Multi-signal section-boundary detection over the cumulative-timed event
//! stream, combined with explicit markers.

use std::collections::HashSet;

use crate::config::PipelineConfig;

/// The event categories the detector distinguishes. Carries only what
/// heuristics need — never the full output payload (kept to `payload_len`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetectorEventKind {
    Output,
    Input,
    Marker(String),
    Resize,
    Exit,
}

/// A lightweight per-event record fed to the detector by the orchestrator,
/// which has already scanned each `Output` payload once for screen-clear
/// and alt-screen-exit sequences while feeding the VT.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorEvent {
    pub kind: DetectorEventKind,
    pub cumulative_time: f64,
    pub payload_len: usize,
    /// True for an `Output` event that contained a primary-buffer clear
    /// sequence (already excludes alt-screen, per the orchestrator's scan).
    pub screen_clear: bool,
    /// True for an `Output` event that contained the alt-screen-exit
    /// sequence (`ESC[?1049l`).
    pub alt_screen_exit: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    TimingGap,
    ScreenClear,
    AltScreenExit,
    VolumeBurst,
    Marker,
}

impl Signal {
    /// Lower sorts first. Label preference order from the component design:
    /// marker > alt_screen_exit > screen_clear > timing_gap > volume_burst.
    fn label_priority(self) -> u8 {
        match self {
            Signal::Marker => 0,
            Signal::AltScreenExit => 1,
            Signal::ScreenClear => 2,
            Signal::TimingGap => 3,
            Signal::VolumeBurst => 4,
        }
    }
}

/// One detected (or marker) boundary. `score` is `f64::INFINITY` for any
/// boundary carrying the `Marker` signal, making it dominant over every
/// detected score.
#[derive(Clone, Debug, PartialEq)]
pub struct SectionBoundary {
    pub event_index: usize,
    pub signals: HashSet<Signal>,
    pub label: String,
    pub score: f64,
}

/// Runs the full detector: candidate generation, merge-window collapsing,
/// and the 50-boundary cap. `events` must be in file order with cumulative
/// (not relative) times already computed.
pub fn detect(events: &[DetectorEvent], config: &PipelineConfig) -> Vec<SectionBoundary> {
    let candidates = generate_candidates(events, config);
    let merged = merge_candidates(candidates, config.merge_window_events);
    cap_boundaries(merged, config.max_sections)
}

fn generate_candidates(events: &[DetectorEvent], config: &PipelineConfig) -> Vec<SectionBoundary> {
    let mut candidates = Vec::new();
    let below_min_size = events.len() < config.min_session_size;
    let mut last_output_time: Option<f64> = None;

    for (idx, event) in events.iter().enumerate() {
        // Timing gap is measured against the time of the last Output event
        // but applies to whatever event lands after the gap, Marker
        // included — a checkpoint marker dropped after a long quiet period
        // is still a timing-gap boundary, not just a marker one.
        if !below_min_size {
            if let Some(last) = last_output_time {
                let dt = event.cumulative_time - last;
                if dt >= config.timing_gap_seconds {
                    candidates.push(boundary(
                        idx,
                        Signal::TimingGap,
                        format!("After {}s pause", dt.round() as i64),
                        dt,
                    ));
                }
            }
        }

        match &event.kind {
            DetectorEventKind::Output => {
                if !below_min_size {
                    if let Some(last) = last_output_time {
                        let dt = event.cumulative_time - last;
                        if dt >= config.volume_burst_quiet_seconds
                            && event.payload_len >= config.volume_burst_min_bytes
                        {
                            candidates.push(boundary(
                                idx,
                                Signal::VolumeBurst,
                                "Output burst".to_string(),
                                event.payload_len as f64 / 1024.0,
                            ));
                        }
                    }
                    if event.screen_clear {
                        candidates.push(boundary(
                            idx,
                            Signal::ScreenClear,
                            "Screen refresh".to_string(),
                            config.screen_clear_score,
                        ));
                    }
                    if event.alt_screen_exit {
                        candidates.push(boundary(
                            idx,
                            Signal::AltScreenExit,
                            "TUI exit".to_string(),
                            config.alt_screen_exit_score,
                        ));
                    }
                }
                last_output_time = Some(event.cumulative_time);
            }
            DetectorEventKind::Marker(label) => {
                candidates.push(boundary(idx, Signal::Marker, label.clone(), f64::INFINITY));
            }
            DetectorEventKind::Input | DetectorEventKind::Resize | DetectorEventKind::Exit => {}
        }
    }

    candidates
}

fn boundary(event_index: usize, signal: Signal, label: String, score: f64) -> SectionBoundary {
    let mut signals = HashSet::new();
    signals.insert(signal);
    SectionBoundary {
        event_index,
        signals,
        label,
        score,
    }
}

fn merge_candidates(mut candidates: Vec<SectionBoundary>, merge_window: usize) -> Vec<SectionBoundary> {
    candidates.sort_by_key(|c| c.event_index);

    let mut merged: Vec<SectionBoundary> = Vec::new();
    let mut best_rank: Vec<u8> = Vec::new();

    for candidate in candidates {
        if let (Some(last), Some(rank)) = (merged.last_mut(), best_rank.last_mut()) {
            let last: &mut SectionBoundary = last;
            if candidate.event_index.saturating_sub(last.event_index) <= merge_window {
                last.signals.extend(candidate.signals.iter().copied());
                if candidate.score > last.score {
                    last.score = candidate.score;
                }
                let candidate_rank = candidate
                    .signals
                    .iter()
                    .map(|s| s.label_priority())
                    .min()
                    .unwrap_or(u8::MAX);
                if candidate_rank < *rank {
                    last.label = candidate.label;
                    *rank = candidate_rank;
                }
                continue;
            }
        }
        let rank = candidate
            .signals
            .iter()
            .map(|s| s.label_priority())
            .min()
            .unwrap_or(u8::MAX);
        merged.push(candidate);
        best_rank.push(rank);
    }

    merged
}

fn cap_boundaries(mut boundaries: Vec<SectionBoundary>, max_sections: usize) -> Vec<SectionBoundary> {
    if boundaries.len() <= max_sections {
        return boundaries;
    }
    boundaries.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    boundaries.truncate(max_sections);
    boundaries.sort_by_key(|b| b.event_index);
    boundaries
}
