//! Session processing core: ingests asciicast v3 terminal recordings,
//! replays them through a VT100/ANSI engine, deduplicates TUI redraw noise
//! out of the resulting scrollback, and detects section boundaries for
//! fold-point navigation.

pub mod config;
pub mod dedup;
pub mod detect;
pub mod error;
pub mod ndjson;
pub mod pipeline;
pub mod repository;
pub mod session;
pub mod vt;

pub use config::PipelineConfig;
pub use dedup::{dedup, DedupResult, EpochBoundary};
pub use detect::{detect, DetectorEvent, DetectorEventKind, SectionBoundary, Signal};
pub use error::{CoreError, Result};
pub use ndjson::{Event, EventKind, ExitCode, Header, MalformedLine, NdjsonReader, TermInfo};
pub use pipeline::{no_cancel, Cancel};
pub use repository::{InMemoryRepository, Repository};
pub use session::{Section, SectionKind, Session, SessionStatus};
pub use vt::{Color, PenFlags, Snapshot, SnapshotLine, SnapshotSpan, VtEngine};
