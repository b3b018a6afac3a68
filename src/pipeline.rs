//! The pipeline orchestrator: the single-pass procedure that drives NDJSON
//! parsing into VT replay, records epoch boundaries and detector events as
//! it goes, then runs dedup and detection once and publishes the result.

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::dedup::{dedup, EpochBoundary};
use crate::detect::{detect, DetectorEvent, DetectorEventKind, Signal};
use crate::error::{CoreError, Result};
use crate::ndjson::{EventKind, NdjsonReader};
use crate::repository::Repository;
use crate::session::{Section, SectionKind, Session, SessionStatus};
use crate::vt::{Snapshot, VtEngine};

/// Cooperative cancellation token, checked only at the two suspension
/// points this pipeline has: before reading the next NDJSON line, and
/// before the final repository batch.
pub type Cancel = Arc<AtomicBool>;

/// A fresh, never-cancelled token, for callers that do not need cancellation.
pub fn no_cancel() -> Cancel {
    Arc::new(AtomicBool::new(false))
}

const ALT_SCREEN_ENTER: &[u8] = b"\x1b[?1049h";
const ALT_SCREEN_EXIT: &[u8] = b"\x1b[?1049l";
const CLEAR_2J: &[u8] = b"\x1b[2J";
const CLEAR_3J: &[u8] = b"\x1b[3J";
const CLEAR_HOME_ERASE: &[u8] = b"\x1b[H\x1b[J";

struct PayloadScan {
    screen_clear: bool,
    alt_screen_exit: bool,
    stripped: Vec<u8>,
}

/// Scans one `Output` payload left to right, flipping `in_alt_screen` on
/// private-mode-1049 toggles and flagging a primary-buffer clear. Only the
/// literal sequences `ESC[2J`, `ESC[3J`, and the adjacent pair `ESC[H
/// ESC[J` count as a clear — no other erase-display variant does.
/// `ESC[3J` is stripped from the bytes that reach the VT regardless of
/// alt-screen state: forwarding it would erase scrollback and break dedup.
fn scan_payload(payload: &[u8], in_alt_screen: &mut bool) -> PayloadScan {
    let mut screen_clear = false;
    let mut alt_screen_exit = false;
    let mut stripped = Vec::with_capacity(payload.len());
    let mut i = 0;
    while i < payload.len() {
        let rest = &payload[i..];
        if rest.starts_with(ALT_SCREEN_ENTER) {
            *in_alt_screen = true;
            stripped.extend_from_slice(ALT_SCREEN_ENTER);
            i += ALT_SCREEN_ENTER.len();
        } else if rest.starts_with(ALT_SCREEN_EXIT) {
            if *in_alt_screen {
                alt_screen_exit = true;
            }
            *in_alt_screen = false;
            stripped.extend_from_slice(ALT_SCREEN_EXIT);
            i += ALT_SCREEN_EXIT.len();
        } else if rest.starts_with(CLEAR_3J) {
            if !*in_alt_screen {
                screen_clear = true;
            }
            i += CLEAR_3J.len(); // stripped, never copied to `stripped`
        } else if rest.starts_with(CLEAR_HOME_ERASE) {
            if !*in_alt_screen {
                screen_clear = true;
            }
            stripped.extend_from_slice(CLEAR_HOME_ERASE);
            i += CLEAR_HOME_ERASE.len();
        } else if rest.starts_with(CLEAR_2J) {
            if !*in_alt_screen {
                screen_clear = true;
            }
            stripped.extend_from_slice(CLEAR_2J);
            i += CLEAR_2J.len();
        } else {
            stripped.push(payload[i]);
            i += 1;
        }
    }
    PayloadScan {
        screen_clear,
        alt_screen_exit,
        stripped,
    }
}

/// Runs the full pipeline over `source` and publishes the result through
/// `repo`. On any error the session's status is left (or set) to `Failed`
/// before the error is returned; nothing partial is published otherwise.
pub fn run<R: BufRead>(
    source: R,
    session_id: &str,
    repo: &dyn Repository,
    config: &PipelineConfig,
    cancel: Cancel,
) -> Result<Session> {
    match run_inner(source, session_id, repo, config, cancel) {
        Ok(session) => Ok(session),
        Err(err) => {
            let _ = repo.update_detection_status(session_id, SessionStatus::Failed, None, None);
            Err(err)
        }
    }
}

fn run_inner<R: BufRead>(
    source: R,
    session_id: &str,
    repo: &dyn Repository,
    config: &PipelineConfig,
    cancel: Cancel,
) -> Result<Session> {
    let (mut reader, header) = NdjsonReader::new(source)?;

    repo.update_detection_status(session_id, SessionStatus::Processing, None, None)?;
    log::info!(
        "session {session_id}: processing started ({}x{})",
        header.cols(),
        header.rows()
    );

    let mut vt = VtEngine::create(header.cols(), header.rows(), config.scrollback_limit);

    let mut cumulative_time = 0.0f64;
    let mut in_alt_screen = false;
    let mut epoch_boundaries: Vec<EpochBoundary> = Vec::new();
    let mut last_epoch_raw_count: Option<usize> = None;
    let mut events_for_detector: Vec<DetectorEvent> = Vec::new();
    // Per-event bookkeeping, indexed by event_index: the primary buffer's
    // uncapped total line count and the alt-screen flag at that moment.
    let mut event_line_count_at: Vec<usize> = Vec::new();
    let mut event_alt_screen_at: Vec<bool> = Vec::new();
    let mut tui_snapshots: HashMap<usize, Snapshot> = HashMap::new();

    let mut event_index = 0usize;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(CoreError::Cancelled);
        }
        let Some(event) = reader.next() else { break };

        cumulative_time += event.relative_time;
        let raw_line_count_before = vt.primary_total_line_count();
        event_line_count_at.push(raw_line_count_before);

        let detector_event = match &event.kind {
            EventKind::Output(bytes) => {
                let scan = scan_payload(bytes, &mut in_alt_screen);
                if scan.screen_clear
                    && last_epoch_raw_count != Some(raw_line_count_before)
                {
                    epoch_boundaries.push(EpochBoundary {
                        event_index,
                        raw_line_count: raw_line_count_before,
                    });
                    last_epoch_raw_count = Some(raw_line_count_before);
                }
                vt.feed(&scan.stripped);
                DetectorEvent {
                    kind: DetectorEventKind::Output,
                    cumulative_time,
                    payload_len: bytes.len(),
                    screen_clear: scan.screen_clear,
                    alt_screen_exit: scan.alt_screen_exit,
                }
            }
            EventKind::Resize(cols, rows) => {
                vt.resize(*cols, *rows);
                DetectorEvent {
                    kind: DetectorEventKind::Resize,
                    cumulative_time,
                    payload_len: 0,
                    screen_clear: false,
                    alt_screen_exit: false,
                }
            }
            EventKind::Marker(label) => DetectorEvent {
                kind: DetectorEventKind::Marker(label.clone()),
                cumulative_time,
                payload_len: label.len(),
                screen_clear: false,
                alt_screen_exit: false,
            },
            EventKind::Input(_) => DetectorEvent {
                kind: DetectorEventKind::Input,
                cumulative_time,
                payload_len: 0,
                screen_clear: false,
                alt_screen_exit: false,
            },
            EventKind::Exit(_) => DetectorEvent {
                kind: DetectorEventKind::Exit,
                cumulative_time,
                payload_len: 0,
                screen_clear: false,
                alt_screen_exit: false,
            },
        };
        events_for_detector.push(detector_event);

        event_alt_screen_at.push(in_alt_screen);
        if in_alt_screen {
            // Only alt-screen moments need an inline snapshot cached: a
            // section boundary that lands here degrades to TUI mode, and
            // this is the only point the live viewport still reflects it.
            tui_snapshots.insert(event_index, vt.get_view());
        }

        event_index += 1;
    }

    let event_count = event_index;
    log::debug!(
        "session {session_id}: {event_count} events, {} epoch boundaries, {} malformed lines",
        epoch_boundaries.len(),
        reader.malformed_lines().len(),
    );
    for malformed in reader.malformed_lines() {
        log::warn!(
            "session {session_id}: skipped malformed line {}",
            malformed.line_number
        );
    }
    let malformed_lines = reader.malformed_lines().to_vec();

    let raw_all_lines = vt.get_all_lines();
    // `event_line_count_at`/epoch boundaries are recorded against the
    // uncapped total-lines-produced counter; `raw_all_lines` is the capped
    // live buffer. Once eviction starts, the two diverge by a constant
    // offset — everything at or after the offset maps directly; anything
    // before it no longer has a corresponding raw index at all.
    let total_produced_final = vt.primary_total_line_count();
    let evicted_cutoff = total_produced_final.saturating_sub(raw_all_lines.lines.len());

    let bounded_boundaries: Vec<EpochBoundary> = epoch_boundaries
        .iter()
        .filter_map(|b| {
            b.raw_line_count.checked_sub(evicted_cutoff).map(|raw_line_count| EpochBoundary {
                event_index: b.event_index,
                raw_line_count,
            })
        })
        .collect();

    let dedup_result = dedup(&raw_all_lines, &bounded_boundaries, config.min_match);
    let boundaries = detect(&events_for_detector, config);

    let mut sections: Vec<Section> = Vec::with_capacity(boundaries.len());
    for (i, boundary) in boundaries.iter().enumerate() {
        let kind = if boundary.signals.contains(&Signal::Marker) {
            SectionKind::Marker
        } else {
            SectionKind::Detected
        };
        let start_event = boundary.event_index;
        let end_event = boundaries.get(i + 1).map(|b| b.event_index);

        let start_total = event_line_count_at.get(start_event).copied().unwrap_or(0);
        let end_total = end_event
            .and_then(|e| event_line_count_at.get(e).copied())
            .unwrap_or(total_produced_final);
        let alt_at_start = event_alt_screen_at.get(start_event).copied().unwrap_or(false);
        let evicted = start_total < evicted_cutoff;

        if alt_at_start || evicted {
            let snapshot = tui_snapshots
                .get(&start_event)
                .cloned()
                .unwrap_or_else(|| vt.get_view());
            sections.push(Section::tui(kind, boundary.label.clone(), start_event, end_event, snapshot));
        } else {
            let raw_start = start_total.saturating_sub(evicted_cutoff);
            let raw_end = end_total.saturating_sub(evicted_cutoff);
            let start_line = dedup_result.raw_line_count_to_clean(raw_start);
            // `raw_to_clean` is non-monotonic across redraw blocks, so a
            // section straddling a redraw can map to an inverted range.
            let end_line = dedup_result.raw_line_count_to_clean(raw_end).max(start_line);
            sections.push(Section::cli(
                kind,
                boundary.label.clone(),
                start_event,
                end_event,
                start_line,
                end_line,
            ));
        }
    }

    if cancel.load(Ordering::Relaxed) {
        return Err(CoreError::Cancelled);
    }

    let snapshot_json = dedup_result.clean_snapshot.to_json()?;
    repo.update_snapshot(session_id, &snapshot_json)
        .map_err(|e| CoreError::RepositoryFailure(e.to_string()))?;
    for section in &sections {
        repo.create_section(session_id, section)
            .map_err(|e| CoreError::RepositoryFailure(e.to_string()))?;
    }
    repo.update_detection_status(session_id, SessionStatus::Completed, Some(event_count), Some(sections.len()))
        .map_err(|e| CoreError::RepositoryFailure(e.to_string()))?;

    log::info!("session {session_id}: completed, {} sections", sections.len());

    Ok(Session {
        id: session_id.to_string(),
        header,
        clean_snapshot: dedup_result.clean_snapshot,
        sections,
        event_count,
        section_count: boundaries.len(),
        status: SessionStatus::Completed,
        malformed_lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;

    fn ndjson(lines: &[&str]) -> std::io::Cursor<Vec<u8>> {
        std::io::Cursor::new(lines.join("\n").into_bytes())
    }

    #[test]
    fn pure_cli_session_has_no_epoch_boundaries_and_completes() {
        let mut lines = vec!["{\"version\":3,\"term\":{\"cols\":80,\"rows\":24}}".to_string()];
        for i in 1..=10 {
            lines.push(format!("[0.1,\"o\",\"line {i}\\r\\n\"]"));
        }
        let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
        let repo = InMemoryRepository::new();
        let session = run(
            ndjson(&refs),
            "s1",
            &repo,
            &PipelineConfig::default(),
            no_cancel(),
        )
        .unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.event_count, 10);
        assert_eq!(repo.status_of("s1"), Some(SessionStatus::Completed));
        assert_eq!(repo.event_count_of("s1"), Some(10));
    }

    #[test]
    fn resize_mid_session_updates_vt_size_and_keeps_all_lines() {
        let mut lines = vec!["{\"version\":3,\"term\":{\"cols\":80,\"rows\":24}}".to_string()];
        for i in 1..=5 {
            lines.push(format!("[0.1,\"o\",\"line {i}\\r\\n\"]"));
        }
        lines.push("[0.1,\"r\",\"120x40\"]".to_string());
        for i in 6..=10 {
            lines.push(format!("[0.1,\"o\",\"line {i}\\r\\n\"]"));
        }
        let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
        let repo = InMemoryRepository::new();
        let session = run(
            ndjson(&refs),
            "s1",
            &repo,
            &PipelineConfig::default(),
            no_cancel(),
        )
        .unwrap();
        assert_eq!(session.clean_snapshot.cols, 120);
        assert!(session.clean_snapshot.lines.len() >= 10);
    }

    #[test]
    fn marker_section_is_published_with_a_cli_line_range() {
        let mut lines = vec!["{\"version\":3,\"term\":{\"cols\":80,\"rows\":24}}".to_string()];
        for i in 1..=150 {
            lines.push(format!("[0.01,\"o\",\"line {i}\\r\\n\"]"));
            if i == 75 {
                lines.push("[0.0,\"m\",\"Checkpoint\"]".to_string());
            }
        }
        let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
        let repo = InMemoryRepository::new();
        run(ndjson(&refs), "s1", &repo, &PipelineConfig::default(), no_cancel()).unwrap();
        let sections = repo.sections_for("s1");
        let marker = sections.iter().find(|s| s.label == "Checkpoint").unwrap();
        assert_eq!(marker.kind, SectionKind::Marker);
        assert!(marker.is_cli_mode());
    }

    #[test]
    fn cli_section_line_ranges_are_never_inverted_across_a_redraw() {
        let mut lines = vec!["{\"version\":3,\"term\":{\"cols\":80,\"rows\":24}}".to_string()];
        for i in 1..=40 {
            lines.push(format!("[0.01,\"o\",\"line {i}\\r\\n\"]"));
            if i == 20 {
                lines.push("[0.0,\"m\",\"Before redraw\"]".to_string());
                lines.push("[0.1,\"o\",\"\\u001b[2J\\u001b[H\"]".to_string());
                for j in 1..=20 {
                    lines.push(format!("[0.01,\"o\",\"line {j}\\r\\n\"]"));
                }
                lines.push("[0.0,\"m\",\"After redraw\"]".to_string());
            }
        }
        let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
        let repo = InMemoryRepository::new();
        run(ndjson(&refs), "s1", &repo, &PipelineConfig::default(), no_cancel()).unwrap();
        for section in repo.sections_for("s1") {
            if section.is_cli_mode() {
                assert!(section.start_line.unwrap() <= section.end_line.unwrap());
            }
        }
    }

    #[test]
    fn empty_session_header_only_completes_with_no_sections() {
        let repo = InMemoryRepository::new();
        let session = run(
            ndjson(&["{\"version\":3,\"term\":{\"cols\":80,\"rows\":24}}"]),
            "s1",
            &repo,
            &PipelineConfig::default(),
            no_cancel(),
        )
        .unwrap();
        assert_eq!(session.event_count, 0);
        assert_eq!(session.section_count, 0);
        assert_eq!(session.status, SessionStatus::Completed);
    }

    #[test]
    fn invalid_header_marks_session_failed() {
        let repo = InMemoryRepository::new();
        let err = run(
            ndjson(&["{\"version\":3}"]),
            "s1",
            &repo,
            &PipelineConfig::default(),
            no_cancel(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidHeader(_)));
        assert_eq!(repo.status_of("s1"), Some(SessionStatus::Failed));
    }

    #[test]
    fn cancellation_aborts_without_publishing_sections() {
        let mut lines = vec!["{\"version\":3,\"term\":{\"cols\":80,\"rows\":24}}".to_string()];
        for i in 1..=10 {
            lines.push(format!("[0.1,\"o\",\"line {i}\\r\\n\"]"));
        }
        let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
        let repo = InMemoryRepository::new();
        let cancel = Arc::new(AtomicBool::new(true));
        let err = run(ndjson(&refs), "s1", &repo, &PipelineConfig::default(), cancel).unwrap_err();
        assert!(matches!(err, CoreError::Cancelled));
        assert_eq!(repo.status_of("s1"), Some(SessionStatus::Failed));
        assert!(repo.sections_for("s1").is_empty());
    }

    #[test]
    fn alt_screen_section_degrades_to_tui_mode_with_inline_snapshot() {
        let mut lines = vec!["{\"version\":3,\"term\":{\"cols\":20,\"rows\":5}}".to_string()];
        lines.push("[0.1,\"o\",\"\\u001b[?1049h\"]".to_string());
        for i in 1..=120 {
            lines.push(format!("[0.01,\"o\",\"frame {i}\\r\\n\"]"));
            if i == 60 {
                lines.push("[0.0,\"m\",\"Mid TUI\"]".to_string());
            }
        }
        lines.push("[0.1,\"o\",\"\\u001b[?1049l\"]".to_string());
        let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
        let repo = InMemoryRepository::new();
        run(ndjson(&refs), "s1", &repo, &PipelineConfig::default(), no_cancel()).unwrap();
        let sections = repo.sections_for("s1");
        let marker = sections.iter().find(|s| s.label == "Mid TUI").unwrap();
        assert!(!marker.is_cli_mode());
        assert!(marker.snapshot.is_some());
    }
}
