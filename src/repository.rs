//! The persistence boundary the pipeline depends on: the core never talks
//! to a database directly. `Repository` is the abstraction;
//! `InMemoryRepository` is the one reference implementation this crate
//! ships, used by the CLI and by tests — no database driver is added here.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;
use crate::session::{Section, SessionStatus};

/// Operations the pipeline invokes against session storage. Synchronous:
/// callers that need this awaited wrap it themselves — the core assumes
/// neither calling convention and does not itself require async.
///
/// Implementations MUST serialize their own writes: multiple sessions may
/// run their pipelines concurrently and all write through the same
/// `Repository` instance.
pub trait Repository {
    /// Updates lifecycle status, and (when known) the final event/section
    /// counts.
    fn update_detection_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        event_count: Option<usize>,
        section_count: Option<usize>,
    ) -> Result<()>;

    /// Stores the canonical-JSON-serialized clean snapshot for a session.
    fn update_snapshot(&self, session_id: &str, serialized_snapshot: &str) -> Result<()>;

    /// Records one section. Called once per section, in `start_event`
    /// order, matching the `sections_for(session_id)` ordering contract.
    fn create_section(&self, session_id: &str, section: &Section) -> Result<()>;
}

#[derive(Clone, Debug, Default)]
struct StoredSession {
    status: SessionStatus,
    event_count: Option<usize>,
    section_count: Option<usize>,
    snapshot_json: Option<String>,
    sections: Vec<Section>,
}

/// An in-process, mutex-serialized `Repository` suitable for the CLI and
/// for tests. Sections accumulate in insertion order; since the
/// orchestrator calls `create_section` in `start_event` order,
/// `sections_for` reflects that ordering without a re-sort.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    sessions: Mutex<HashMap<String, StoredSession>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_of(&self, session_id: &str) -> Option<SessionStatus> {
        self.sessions
            .lock()
            .expect("repository mutex poisoned")
            .get(session_id)
            .map(|s| s.status)
    }

    pub fn snapshot_json_of(&self, session_id: &str) -> Option<String> {
        self.sessions
            .lock()
            .expect("repository mutex poisoned")
            .get(session_id)
            .and_then(|s| s.snapshot_json.clone())
    }

    /// Sections recorded for a session, in `start_event` order.
    pub fn sections_for(&self, session_id: &str) -> Vec<Section> {
        self.sessions
            .lock()
            .expect("repository mutex poisoned")
            .get(session_id)
            .map(|s| s.sections.clone())
            .unwrap_or_default()
    }

    pub fn event_count_of(&self, session_id: &str) -> Option<usize> {
        self.sessions
            .lock()
            .expect("repository mutex poisoned")
            .get(session_id)
            .and_then(|s| s.event_count)
    }

    pub fn section_count_of(&self, session_id: &str) -> Option<usize> {
        self.sessions
            .lock()
            .expect("repository mutex poisoned")
            .get(session_id)
            .and_then(|s| s.section_count)
    }
}

impl Repository for InMemoryRepository {
    fn update_detection_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        event_count: Option<usize>,
        section_count: Option<usize>,
    ) -> Result<()> {
        let mut sessions = self.sessions.lock().expect("repository mutex poisoned");
        let entry = sessions.entry(session_id.to_string()).or_default();
        entry.status = status;
        if event_count.is_some() {
            entry.event_count = event_count;
        }
        if section_count.is_some() {
            entry.section_count = section_count;
        }
        Ok(())
    }

    fn update_snapshot(&self, session_id: &str, serialized_snapshot: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().expect("repository mutex poisoned");
        let entry = sessions.entry(session_id.to_string()).or_default();
        entry.snapshot_json = Some(serialized_snapshot.to_string());
        Ok(())
    }

    fn create_section(&self, session_id: &str, section: &Section) -> Result<()> {
        let mut sessions = self.sessions.lock().expect("repository mutex poisoned");
        let entry = sessions.entry(session_id.to_string()).or_default();
        entry.sections.push(section.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SectionKind;

    #[test]
    fn status_transitions_are_visible_immediately() {
        let repo = InMemoryRepository::new();
        repo.update_detection_status("s1", SessionStatus::Processing, None, None)
            .unwrap();
        assert_eq!(repo.status_of("s1"), Some(SessionStatus::Processing));
        repo.update_detection_status("s1", SessionStatus::Completed, Some(10), Some(2))
            .unwrap();
        assert_eq!(repo.status_of("s1"), Some(SessionStatus::Completed));
        assert_eq!(repo.event_count_of("s1"), Some(10));
        assert_eq!(repo.section_count_of("s1"), Some(2));
    }

    #[test]
    fn sections_accumulate_in_insertion_order() {
        let repo = InMemoryRepository::new();
        for (i, label) in ["a", "b", "c"].iter().enumerate() {
            repo.create_section(
                "s1",
                &Section::cli(SectionKind::Detected, label.to_string(), i, None, i, i),
            )
            .unwrap();
        }
        let labels: Vec<String> = repo.sections_for("s1").iter().map(|s| s.label.clone()).collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
    }
}
