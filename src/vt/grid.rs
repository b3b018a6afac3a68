//! Viewport + (optional) scrollback storage, independent of SGR/cursor
//! interpretation — the `Handler` drives this; the grid just stores cells.

use std::collections::VecDeque;

use super::cell::Cell;

/// Minimum columns/rows clamped on construction and resize. A structurally
/// valid resize event can carry `0x40` or `80x0`; without a floor of 1 the
/// grid would have an empty `cells` vec and every subsequent write would
/// index-panic.
pub const MIN_COLS: usize = 1;
pub const MIN_ROWS: usize = 1;

/// One row of cells plus whether the line was wrapped (a glyph was written
/// past the right margin and the next row continues it).
#[derive(Clone, Debug, PartialEq)]
pub struct Line {
    pub cells: Vec<Cell>,
    pub wrapped: bool,
}

impl Line {
    pub fn blank(cols: usize) -> Self {
        Self {
            cells: vec![Cell::blank(); cols],
            wrapped: false,
        }
    }

    fn resize(&mut self, cols: usize) {
        self.cells.resize_with(cols, Cell::blank);
    }
}

/// One screen buffer: a fixed-size viewport and, for the primary buffer
/// only, a capped scrollback of lines pushed off the top.
#[derive(Clone, Debug)]
pub struct Grid {
    cols: usize,
    rows: usize,
    viewport: Vec<Line>,
    scrollback: VecDeque<Line>,
    scrollback_limit: usize,
    keeps_scrollback: bool,
    /// Count of lines ever produced by this buffer, uncapped by
    /// `scrollback_limit`. Diverges from `all_lines_count()` once eviction
    /// starts (the latter plateaus at the cap); used by the orchestrator
    /// to detect when an epoch boundary's recorded line count has fallen
    /// out of the live scrollback.
    total_lines: usize,
}

impl Grid {
    pub fn new(cols: usize, rows: usize, scrollback_limit: usize, keeps_scrollback: bool) -> Self {
        let cols = cols.max(MIN_COLS);
        let rows = rows.max(MIN_ROWS);
        Self {
            cols,
            rows,
            viewport: (0..rows).map(|_| Line::blank(cols)).collect(),
            scrollback: VecDeque::new(),
            scrollback_limit,
            keeps_scrollback,
            total_lines: rows,
        }
    }

    /// Uncapped count of lines ever produced (see field doc on `total_lines`).
    pub fn total_lines_produced(&self) -> usize {
        self.total_lines
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn line(&self, row: usize) -> &Line {
        &self.viewport[row]
    }

    pub fn line_mut(&mut self, row: usize) -> &mut Line {
        &mut self.viewport[row]
    }

    /// Viewport lines only, exactly `rows` of them.
    pub fn view_lines(&self) -> &[Line] {
        &self.viewport
    }

    /// Scrollback followed by viewport; length may exceed `rows`.
    pub fn all_lines(&self) -> Vec<&Line> {
        self.scrollback.iter().chain(self.viewport.iter()).collect()
    }

    pub fn all_lines_count(&self) -> usize {
        self.scrollback.len() + self.viewport.len()
    }

    /// Scrolls the viewport up by one line. The line scrolled off the top
    /// is pushed to scrollback if this buffer keeps one, else discarded
    /// (alt-screen semantics: alt-screen contents are isolated from
    /// scrollback).
    pub fn scroll_up(&mut self) {
        let top = self.viewport.remove(0);
        self.viewport.push(Line::blank(self.cols));
        self.total_lines += 1;
        if self.keeps_scrollback {
            self.scrollback.push_back(top);
            while self.scrollback_limit > 0 && self.scrollback.len() > self.scrollback_limit {
                self.scrollback.pop_front();
            }
        }
    }

    /// Inserts a blank line at `row`, shifting rows `row..` down; the
    /// bottom-most line is dropped (no scrollback push — this is an IL,
    /// not a natural scroll).
    pub fn insert_line(&mut self, row: usize) {
        if row >= self.viewport.len() {
            return;
        }
        self.viewport.insert(row, Line::blank(self.cols));
        self.viewport.truncate(self.rows);
    }

    /// Deletes the line at `row`, shifting rows below it up; a blank line
    /// is appended at the bottom.
    pub fn delete_line(&mut self, row: usize) {
        if row >= self.viewport.len() {
            return;
        }
        self.viewport.remove(row);
        self.viewport.push(Line::blank(self.cols));
    }

    /// Erases `count` cells starting at `col` on `row`, shifting the
    /// remainder of the row left (DCH).
    pub fn delete_chars(&mut self, row: usize, col: usize, count: usize) {
        let line = &mut self.viewport[row];
        let end = (col + count).min(line.cells.len());
        if col >= line.cells.len() {
            return;
        }
        line.cells.drain(col..end);
        line.cells.resize_with(self.cols, Cell::blank);
    }

    /// Inserts `count` blank cells at `col` on `row`, shifting the
    /// remainder of the row right and dropping overflow (ICH).
    pub fn insert_chars(&mut self, row: usize, col: usize, count: usize) {
        let line = &mut self.viewport[row];
        if col > line.cells.len() {
            return;
        }
        for _ in 0..count {
            line.cells.insert(col, Cell::blank());
        }
        line.cells.truncate(self.cols);
    }

    /// Resizes the grid. Existing viewport lines are padded/truncated in
    /// place; no reflow of wrapped content is attempted.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        let cols = cols.max(MIN_COLS);
        let rows = rows.max(MIN_ROWS);
        self.cols = cols;
        for line in &mut self.viewport {
            line.resize(cols);
        }
        match rows.cmp(&self.viewport.len()) {
            std::cmp::Ordering::Greater => {
                self.viewport
                    .extend((self.viewport.len()..rows).map(|_| Line::blank(cols)));
            }
            std::cmp::Ordering::Less => {
                let overflow: Vec<Line> = self.viewport.drain(0..self.viewport.len() - rows).collect();
                self.total_lines += overflow.len();
                if self.keeps_scrollback {
                    for line in overflow {
                        self.scrollback.push_back(line);
                    }
                    while self.scrollback_limit > 0 && self.scrollback.len() > self.scrollback_limit {
                        self.scrollback.pop_front();
                    }
                }
            }
            std::cmp::Ordering::Equal => {}
        }
        self.rows = rows;
    }

    pub fn clear_scrollback(&mut self) {
        self.scrollback.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_up_pushes_to_scrollback_when_kept() {
        let mut grid = Grid::new(4, 2, 0, true);
        grid.line_mut(0).cells[0].ch = 'A';
        grid.scroll_up();
        assert_eq!(grid.all_lines_count(), 3);
        assert_eq!(grid.all_lines()[0].cells[0].ch, 'A');
    }

    #[test]
    fn scroll_up_discards_when_not_kept() {
        let mut grid = Grid::new(4, 2, 0, false);
        grid.line_mut(0).cells[0].ch = 'A';
        grid.scroll_up();
        assert_eq!(grid.all_lines_count(), 2);
    }

    #[test]
    fn scrollback_limit_evicts_oldest() {
        let mut grid = Grid::new(1, 1, 2, true);
        for i in 0..5 {
            grid.line_mut(0).cells[0].ch = (b'a' + i) as char;
            grid.scroll_up();
        }
        assert!(grid.all_lines_count() <= 3);
    }

    #[test]
    fn total_lines_produced_keeps_growing_past_the_cap() {
        let mut grid = Grid::new(1, 1, 2, true);
        for _ in 0..5 {
            grid.scroll_up();
        }
        assert!(grid.all_lines_count() <= 3);
        assert_eq!(grid.total_lines_produced(), 1 + 5); // initial viewport + 5 scrolls
    }

    #[test]
    fn new_clamps_zero_dimensions_to_a_floor_of_one() {
        let grid = Grid::new(0, 0, 0, true);
        assert_eq!(grid.cols(), 1);
        assert_eq!(grid.rows(), 1);
    }

    #[test]
    fn resize_clamps_zero_dimensions_to_a_floor_of_one() {
        let mut grid = Grid::new(4, 2, 0, true);
        grid.resize(0, 0);
        assert_eq!(grid.cols(), 1);
        assert_eq!(grid.rows(), 1);
    }

    #[test]
    fn resize_pads_and_truncates_columns() {
        let mut grid = Grid::new(4, 2, 0, true);
        grid.resize(8, 2);
        assert_eq!(grid.line(0).cells.len(), 8);
        grid.resize(2, 2);
        assert_eq!(grid.line(0).cells.len(), 2);
    }

    #[test]
    fn delete_chars_shifts_left() {
        let mut grid = Grid::new(4, 1, 0, false);
        for (i, c) in "abcd".chars().enumerate() {
            grid.line_mut(0).cells[i].ch = c;
        }
        grid.delete_chars(0, 1, 1);
        let text: String = grid.line(0).cells.iter().map(|c| c.ch).collect();
        assert_eq!(text, "acd ");
    }

    #[test]
    fn insert_chars_shifts_right_and_truncates() {
        let mut grid = Grid::new(4, 1, 0, false);
        for (i, c) in "abcd".chars().enumerate() {
            grid.line_mut(0).cells[i].ch = c;
        }
        grid.insert_chars(0, 1, 1);
        let text: String = grid.line(0).cells.iter().map(|c| c.ch).collect();
        assert_eq!(text, "a bc");
    }
}
