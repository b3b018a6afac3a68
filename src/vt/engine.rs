//! Public VT engine surface: `create`/`feed`/`resize`/snapshot accessors.
//!
//! Bundles a `vte::Parser` byte-level state machine with the owned
//! `Handler` grid model behind a single owned value with a simple
//! `feed`/`resize`/accessor API.

use vte::Parser;

use super::handler::{Cursor, Handler};
use super::snapshot::Snapshot;

pub struct VtEngine {
    parser: Parser,
    handler: Handler,
}

impl VtEngine {
    /// `scrollback_limit = 0` means unlimited (still bounded internally by
    /// the pipeline's configured ceiling).
    pub fn create(cols: u32, rows: u32, scrollback_limit: usize) -> Self {
        Self {
            parser: Parser::new(),
            handler: Handler::new(cols as usize, rows as usize, scrollback_limit),
        }
    }

    /// Feeds output bytes to the engine. Deterministic, and never suspends
    /// except synchronously inside the call. Returns the number of
    /// viewport rows touched while processing this chunk.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        for &b in bytes {
            self.parser.advance(&mut self.handler, b);
        }
        self.handler.take_dirty_rows()
    }

    /// Resizes the engine. May invalidate the cursor position (clamped
    /// into the new bounds) and wraps lines per VT semantics on
    /// subsequent writes.
    pub fn resize(&mut self, cols: u32, rows: u32) {
        self.handler.resize(cols as usize, rows as usize);
    }

    /// The viewport: exactly `rows` lines.
    pub fn get_view(&self) -> Snapshot {
        Snapshot::view(self.handler.active())
    }

    /// Scrollback followed by viewport; length may exceed `rows`. Always
    /// read from the primary buffer, matching the epoch-boundary
    /// bookkeeping in the pipeline orchestrator (alt-screen content never
    /// contributes raw line count).
    pub fn get_all_lines(&self) -> Snapshot {
        Snapshot::all_lines(self.handler.primary())
    }

    /// Raw line count of the primary buffer's scrollback+viewport, bounded
    /// by the scrollback cap.
    pub fn primary_line_count(&self) -> usize {
        self.handler.primary().all_lines_count()
    }

    /// Uncapped count of lines ever produced by the primary buffer. Used by
    /// the orchestrator to record epoch boundaries and per-event line
    /// positions in a space that keeps growing past the scrollback cap,
    /// so a boundary recorded before eviction started can still be
    /// recognized as evicted once the final snapshot plateaus below it.
    pub fn primary_total_line_count(&self) -> usize {
        self.handler.primary().total_lines_produced()
    }

    pub fn get_cursor(&self) -> Cursor {
        self.handler.cursor()
    }

    pub fn get_size(&self) -> (u32, u32) {
        let (cols, rows) = self.handler.size();
        (cols as u32, rows as u32)
    }

    pub fn in_alt_screen(&self) -> bool {
        self.handler.in_alt_screen()
    }
}

impl std::fmt::Debug for VtEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (cols, rows) = self.get_size();
        f.debug_struct("VtEngine")
            .field("cols", &cols)
            .field("rows", &rows)
            .field("in_alt_screen", &self.in_alt_screen())
            .field("primary_line_count", &self.primary_line_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_produces_blank_view() {
        let engine = VtEngine::create(10, 3, 0);
        let snap = engine.get_view();
        assert_eq!(snap.cols, 10);
        assert_eq!(snap.lines.len(), 3);
    }

    #[test]
    fn feed_reports_changed_rows() {
        let mut engine = VtEngine::create(10, 3, 0);
        let changed = engine.feed(b"hello");
        assert_eq!(changed, 1);
    }

    #[test]
    fn resize_updates_size() {
        let mut engine = VtEngine::create(80, 24, 0);
        engine.resize(120, 40);
        assert_eq!(engine.get_size(), (120, 40));
    }

    #[test]
    fn all_lines_include_scrollback_after_wrap() {
        let mut engine = VtEngine::create(5, 1, 0);
        engine.feed(b"line1\r\nline2\r\n");
        assert!(engine.get_all_lines().lines.len() >= 1);
    }

    #[test]
    fn alt_screen_resize_does_not_panic_and_clamps_cursor() {
        let mut engine = VtEngine::create(10, 10, 0);
        engine.feed(b"\x1b[?1049h");
        engine.feed(b"\x1b[9;9H");
        engine.resize(5, 5);
        let cursor = engine.get_cursor();
        assert!(cursor.row < 5);
        assert!(cursor.col < 5);
    }

    #[test]
    fn zero_dimensions_are_clamped_to_a_floor_of_one_on_create() {
        let engine = VtEngine::create(0, 0, 0);
        assert_eq!(engine.get_size(), (1, 1));
    }

    #[test]
    fn zero_dimensions_are_clamped_to_a_floor_of_one_on_resize_and_do_not_panic() {
        let mut engine = VtEngine::create(80, 24, 0);
        engine.resize(0, 40);
        assert_eq!(engine.get_size(), (1, 40));
        engine.feed(b"still writable\r\n");

        engine.resize(80, 0);
        assert_eq!(engine.get_size(), (80, 1));
        engine.feed(b"still writable\r\n");
    }
}
