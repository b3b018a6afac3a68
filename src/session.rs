//! The session and section value types the pipeline produces and hands to
//! the repository. Polymorphism between marker and detected sections is a
//! tagged enum (`SectionKind`), not an inheritance hierarchy.

use serde::{Deserialize, Serialize};

use crate::ndjson::{Header, MalformedLine};
use crate::vt::Snapshot;

/// A session's lifecycle, transitioned `Pending -> Processing -> {Completed
/// | Failed}` exactly once by the pipeline.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Marker sections carry their label verbatim; detected sections carry a
/// synthesized display label. The distinction is a tag, not a type split.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Marker,
    Detected,
}

/// A named, foldable range within a session's clean document, or a pinned
/// viewport snapshot for a region observed while the alt-screen was active
/// (or whose epoch was evicted from scrollback).
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    pub kind: SectionKind,
    pub label: String,
    pub start_event: usize,
    pub end_event: Option<usize>,
    /// Set together with `end_line` for CLI-mode sections; `None` for
    /// TUI-mode sections (`snapshot` is set instead).
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    /// Set only for TUI-mode sections: an inline viewport captured at
    /// section-boundary time.
    pub snapshot: Option<Snapshot>,
}

impl Section {
    /// A CLI-mode section: `start_line <= end_line`, both index into the
    /// clean session document, `snapshot` is absent.
    pub fn cli(
        kind: SectionKind,
        label: String,
        start_event: usize,
        end_event: Option<usize>,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        Self {
            kind,
            label,
            start_event,
            end_event,
            start_line: Some(start_line),
            end_line: Some(end_line),
            snapshot: None,
        }
    }

    /// A TUI-mode section: line ranges are absent, an inline viewport
    /// snapshot stands in for them.
    pub fn tui(
        kind: SectionKind,
        label: String,
        start_event: usize,
        end_event: Option<usize>,
        snapshot: Snapshot,
    ) -> Self {
        Self {
            kind,
            label,
            start_event,
            end_event,
            start_line: None,
            end_line: None,
            snapshot: Some(snapshot),
        }
    }

    pub fn is_cli_mode(&self) -> bool {
        self.start_line.is_some() && self.end_line.is_some()
    }
}

/// Everything the core produces for one recording — id, header, clean
/// document, sections, counts, and final status — handed to the repository
/// once per session.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub id: String,
    /// The recording's parsed header: resolved cols/rows plus the raw
    /// `title`/`command`/`env` passthrough, independent of the (possibly
    /// resized) `clean_snapshot` dimensions.
    pub header: Header,
    pub clean_snapshot: Snapshot,
    pub sections: Vec<Section>,
    pub event_count: usize,
    pub section_count: usize,
    pub status: SessionStatus,
    /// Event lines the NDJSON reader skipped rather than failed on, so a
    /// caller can program against which lines were dropped instead of
    /// relying on log output.
    pub malformed_lines: Vec<MalformedLine>,
}
