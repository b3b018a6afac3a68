//! Drives the grid from parsed VT actions. Implements `vte::Perform`
//! directly on the handler state rather than through an intermediate
//! trait object: a thin struct bundling a byte-level state machine with an
//! owned terminal model.

use vte::{Params, Perform};

use super::cell::Cell;
use super::color::Color;
use super::grid::Grid;
use super::pen::{Pen, PenFlags};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    pub col: usize,
    pub row: usize,
    pub hidden: bool,
}

#[derive(Clone, Debug)]
struct SavedCursor {
    col: usize,
    row: usize,
    pen: Pen,
}

/// Owns both screen buffers and all VT-interpreter state: cursor position,
/// current pen, alt-screen flag, and the DECSC/DECRC save slot.
pub struct Handler {
    primary: Grid,
    alt: Grid,
    in_alt_screen: bool,
    cursor_col: usize,
    cursor_row: usize,
    cursor_hidden: bool,
    wrap_pending: bool,
    pen: Pen,
    saved: Option<SavedCursor>,
    scrollback_limit: usize,
    dirty_rows: std::collections::HashSet<usize>,
}

impl Handler {
    pub fn new(cols: usize, rows: usize, scrollback_limit: usize) -> Self {
        Self {
            primary: Grid::new(cols, rows, scrollback_limit, true),
            alt: Grid::new(cols, rows, scrollback_limit, false),
            in_alt_screen: false,
            cursor_col: 0,
            cursor_row: 0,
            cursor_hidden: false,
            wrap_pending: false,
            pen: Pen::default(),
            saved: None,
            scrollback_limit,
            dirty_rows: std::collections::HashSet::new(),
        }
    }

    /// Clears and returns the set of viewport rows touched since the last
    /// call, for `VtEngine::feed`'s `changed_rows` return value.
    pub fn take_dirty_rows(&mut self) -> usize {
        let count = self.dirty_rows.len();
        self.dirty_rows.clear();
        count
    }

    fn mark_dirty(&mut self, row: usize) {
        self.dirty_rows.insert(row);
    }

    pub fn in_alt_screen(&self) -> bool {
        self.in_alt_screen
    }

    pub fn primary(&self) -> &Grid {
        &self.primary
    }

    pub fn active(&self) -> &Grid {
        if self.in_alt_screen {
            &self.alt
        } else {
            &self.primary
        }
    }

    fn active_mut(&mut self) -> &mut Grid {
        if self.in_alt_screen {
            &mut self.alt
        } else {
            &mut self.primary
        }
    }

    pub fn cursor(&self) -> Cursor {
        Cursor {
            col: self.cursor_col,
            row: self.cursor_row,
            hidden: self.cursor_hidden,
        }
    }

    pub fn size(&self) -> (usize, usize) {
        (self.active().cols(), self.active().rows())
    }

    pub fn resize(&mut self, cols: usize, rows: usize) {
        let cols = cols.max(super::grid::MIN_COLS);
        let rows = rows.max(super::grid::MIN_ROWS);
        self.primary.resize(cols, rows);
        self.alt.resize(cols, rows);
        self.cursor_col = self.cursor_col.min(cols.saturating_sub(1));
        self.cursor_row = self.cursor_row.min(rows.saturating_sub(1));
        self.wrap_pending = false;
    }

    fn clamp_cursor(&mut self) {
        let (cols, rows) = self.size();
        self.cursor_col = self.cursor_col.min(cols.saturating_sub(1));
        self.cursor_row = self.cursor_row.min(rows.saturating_sub(1));
    }

    fn newline(&mut self) {
        let rows = self.active().rows();
        if self.cursor_row + 1 >= rows {
            self.active_mut().scroll_up();
        } else {
            self.cursor_row += 1;
        }
    }

    fn carriage_return(&mut self) {
        self.cursor_col = 0;
        self.wrap_pending = false;
    }

    fn write_char(&mut self, c: char) {
        let cols = self.active().cols();
        if self.wrap_pending {
            self.active_mut().line_mut(self.cursor_row).wrapped = true;
            self.carriage_return();
            self.newline();
        }
        let pen = self.pen;
        let row = self.cursor_row;
        let col = self.cursor_col;
        self.active_mut().line_mut(row).cells[col] = Cell { ch: c, pen };
        self.mark_dirty(row);

        if col + 1 >= cols {
            self.wrap_pending = true;
        } else {
            self.cursor_col += 1;
        }
    }

    fn erase_in_line(&mut self, mode: u16) {
        let cols = self.active().cols();
        let (row, col) = (self.cursor_row, self.cursor_col);
        self.mark_dirty(row);
        let line = self.active_mut().line_mut(row);
        match mode {
            0 => {
                for cell in &mut line.cells[col..] {
                    *cell = Cell::blank();
                }
            }
            1 => {
                for cell in &mut line.cells[..=col.min(cols - 1)] {
                    *cell = Cell::blank();
                }
            }
            2 => {
                for cell in &mut line.cells {
                    *cell = Cell::blank();
                }
            }
            _ => {}
        }
    }

    fn erase_in_display(&mut self, mode: u16) {
        let rows = self.active().rows();
        match mode {
            0 => {
                self.erase_in_line(0);
                for row in self.cursor_row + 1..rows {
                    self.clear_row(row);
                }
            }
            1 => {
                self.erase_in_line(1);
                for row in 0..self.cursor_row {
                    self.clear_row(row);
                }
            }
            2 => {
                for row in 0..rows {
                    self.clear_row(row);
                }
            }
            3 => {
                self.active_mut().clear_scrollback();
            }
            _ => {}
        }
    }

    fn clear_row(&mut self, row: usize) {
        self.mark_dirty(row);
        let line = self.active_mut().line_mut(row);
        for cell in &mut line.cells {
            *cell = Cell::blank();
        }
        line.wrapped = false;
    }

    fn enter_alt_screen(&mut self) {
        if !self.in_alt_screen {
            self.in_alt_screen = true;
            self.clamp_cursor();
        }
    }

    fn exit_alt_screen(&mut self) {
        if self.in_alt_screen {
            self.in_alt_screen = false;
            self.clamp_cursor();
        }
    }

    fn save_cursor(&mut self) {
        self.saved = Some(SavedCursor {
            col: self.cursor_col,
            row: self.cursor_row,
            pen: self.pen,
        });
    }

    fn restore_cursor(&mut self) {
        if let Some(saved) = self.saved.clone() {
            self.cursor_col = saved.col;
            self.cursor_row = saved.row;
            self.pen = saved.pen;
            self.wrap_pending = false;
            self.clamp_cursor();
        }
    }

    fn apply_sgr(&mut self, params: &Params) {
        let values: Vec<u16> = params.iter().map(|p| p.first().copied().unwrap_or(0)).collect();
        if values.is_empty() {
            self.pen.reset();
            return;
        }
        let mut i = 0;
        while i < values.len() {
            let code = values[i];
            match code {
                0 => self.pen.reset(),
                1 => self.pen.flags.insert(PenFlags::BOLD),
                2 => self.pen.flags.insert(PenFlags::FAINT),
                3 => self.pen.flags.insert(PenFlags::ITALIC),
                4 => self.pen.flags.insert(PenFlags::UNDERLINE),
                5 | 6 => self.pen.flags.insert(PenFlags::BLINK),
                7 => self.pen.flags.insert(PenFlags::INVERSE),
                9 => self.pen.flags.insert(PenFlags::STRIKETHROUGH),
                21 => self.pen.flags.remove(PenFlags::BOLD),
                22 => {
                    self.pen.flags.remove(PenFlags::BOLD);
                    self.pen.flags.remove(PenFlags::FAINT);
                }
                23 => self.pen.flags.remove(PenFlags::ITALIC),
                24 => self.pen.flags.remove(PenFlags::UNDERLINE),
                25 => self.pen.flags.remove(PenFlags::BLINK),
                27 => self.pen.flags.remove(PenFlags::INVERSE),
                29 => self.pen.flags.remove(PenFlags::STRIKETHROUGH),
                30..=37 | 90..=97 => {
                    self.pen.fg = Color::from_standard_code(code).unwrap_or(Color::Default);
                }
                40..=47 | 100..=107 => {
                    self.pen.bg = Color::from_standard_code(code).unwrap_or(Color::Default);
                }
                38 | 48 => {
                    let (color, consumed) = Self::parse_extended_color(&values[i..]);
                    if let Some(color) = color {
                        if code == 38 {
                            self.pen.fg = color;
                        } else {
                            self.pen.bg = color;
                        }
                    }
                    i += consumed.saturating_sub(1);
                }
                39 => self.pen.fg = Color::Default,
                49 => self.pen.bg = Color::Default,
                _ => {}
            }
            i += 1;
        }
    }

    /// Parses `38;5;n` / `38;2;r;g;b` (and the `48;...` background forms)
    /// starting at `values[0] == 38 | 48`. Returns the color and how many
    /// entries of `values` were consumed (including the leading 38/48).
    fn parse_extended_color(values: &[u16]) -> (Option<Color>, usize) {
        match values.get(1) {
            Some(5) => match values.get(2) {
                Some(&n) => (Some(Color::Palette(n as u8)), 3),
                None => (None, 1),
            },
            Some(2) => match (values.get(2), values.get(3), values.get(4)) {
                (Some(&r), Some(&g), Some(&b)) => {
                    (Some(Color::Rgb(r as u8, g as u8, b as u8)), 5)
                }
                _ => (None, 1),
            },
            _ => (None, 1),
        }
    }

    fn csi_param(params: &Params, idx: usize, default: u16) -> u16 {
        params
            .iter()
            .nth(idx)
            .and_then(|p| p.first().copied())
            .filter(|&v| v != 0)
            .unwrap_or(default)
    }
}

impl Perform for Handler {
    fn print(&mut self, c: char) {
        self.write_char(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => self.newline(),
            b'\r' => self.carriage_return(),
            0x08 => {
                self.cursor_col = self.cursor_col.saturating_sub(1);
                self.wrap_pending = false;
            }
            0x09 => {
                let cols = self.active().cols();
                let next_tab = ((self.cursor_col / 8) + 1) * 8;
                self.cursor_col = next_tab.min(cols.saturating_sub(1));
            }
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, _intermediates: &[u8], _ignore: bool, action: char) {
        match action {
            'A' => {
                let n = Self::csi_param(params, 0, 1) as usize;
                self.cursor_row = self.cursor_row.saturating_sub(n);
            }
            'B' => {
                let n = Self::csi_param(params, 0, 1) as usize;
                let rows = self.active().rows();
                self.cursor_row = (self.cursor_row + n).min(rows - 1);
            }
            'C' => {
                let n = Self::csi_param(params, 0, 1) as usize;
                let cols = self.active().cols();
                self.cursor_col = (self.cursor_col + n).min(cols - 1);
                self.wrap_pending = false;
            }
            'D' => {
                let n = Self::csi_param(params, 0, 1) as usize;
                self.cursor_col = self.cursor_col.saturating_sub(n);
                self.wrap_pending = false;
            }
            'G' => {
                let n = Self::csi_param(params, 0, 1) as usize;
                let cols = self.active().cols();
                self.cursor_col = (n.saturating_sub(1)).min(cols - 1);
                self.wrap_pending = false;
            }
            'H' | 'f' => {
                let row = Self::csi_param(params, 0, 1) as usize;
                let col = Self::csi_param(params, 1, 1) as usize;
                let (cols, rows) = self.size();
                self.cursor_row = row.saturating_sub(1).min(rows - 1);
                self.cursor_col = col.saturating_sub(1).min(cols - 1);
                self.wrap_pending = false;
            }
            'J' => self.erase_in_display(Self::csi_param(params, 0, 0)),
            'K' => self.erase_in_line(Self::csi_param(params, 0, 0)),
            '@' => {
                let n = Self::csi_param(params, 0, 1) as usize;
                self.mark_dirty(self.cursor_row);
                self.active_mut().insert_chars(self.cursor_row, self.cursor_col, n);
            }
            'P' => {
                let n = Self::csi_param(params, 0, 1) as usize;
                self.mark_dirty(self.cursor_row);
                self.active_mut().delete_chars(self.cursor_row, self.cursor_col, n);
            }
            'L' => {
                let n = Self::csi_param(params, 0, 1) as usize;
                let row = self.cursor_row;
                let rows = self.active().rows();
                for r in row..rows {
                    self.mark_dirty(r);
                }
                for _ in 0..n {
                    self.active_mut().insert_line(row);
                }
            }
            'M' => {
                let n = Self::csi_param(params, 0, 1) as usize;
                let row = self.cursor_row;
                let rows = self.active().rows();
                for r in row..rows {
                    self.mark_dirty(r);
                }
                for _ in 0..n {
                    self.active_mut().delete_line(row);
                }
            }
            'm' => self.apply_sgr(params),
            'h' | 'l' => {
                let set = action == 'h';
                for param in params.iter() {
                    match param.first().copied() {
                        Some(25) => self.cursor_hidden = !set,
                        Some(1049) => {
                            if set {
                                self.enter_alt_screen();
                            } else {
                                self.exit_alt_screen();
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, byte: u8) {
        match byte {
            b'7' => self.save_cursor(),
            b'8' => self.restore_cursor(),
            b'D' => self.newline(),
            b'M' => {
                if self.cursor_row == 0 {
                    // reverse-index at the top margin: no scrollback-safe
                    // equivalent, so this is a no-op rather than scrolling
                    // the whole buffer down.
                } else {
                    self.cursor_row -= 1;
                }
            }
            b'E' => {
                self.carriage_return();
                self.newline();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vte::Parser;

    fn feed(handler: &mut Handler, bytes: &[u8]) {
        let mut parser = Parser::new();
        for &b in bytes {
            parser.advance(handler, b);
        }
    }

    #[test]
    fn prints_plain_text() {
        let mut h = Handler::new(10, 3, 0);
        feed(&mut h, b"hi");
        assert_eq!(h.active().line(0).cells[0].ch, 'h');
        assert_eq!(h.active().line(0).cells[1].ch, 'i');
    }

    #[test]
    fn wraps_at_right_margin() {
        let mut h = Handler::new(3, 2, 0);
        feed(&mut h, b"abcd");
        assert!(h.active().line(0).wrapped);
        assert_eq!(h.active().line(1).cells[0].ch, 'd');
    }

    #[test]
    fn sgr_bold_and_color() {
        let mut h = Handler::new(10, 2, 0);
        feed(&mut h, b"\x1b[1;31mX\x1b[0m");
        let cell = &h.active().line(0).cells[0];
        assert!(cell.pen.flags.contains(PenFlags::BOLD));
        assert_eq!(cell.pen.fg, Color::Palette(1));
    }

    #[test]
    fn sgr_truecolor() {
        let mut h = Handler::new(10, 2, 0);
        feed(&mut h, b"\x1b[38;2;10;20;30mX");
        assert_eq!(h.active().line(0).cells[0].pen.fg, Color::Rgb(10, 20, 30));
    }

    #[test]
    fn alt_screen_toggle_isolates_scrollback() {
        let mut h = Handler::new(4, 1, 0);
        feed(&mut h, b"a");
        h.newline(); // force a scroll so primary scrollback gains a line
        feed(&mut h, b"\x1b[?1049h");
        assert!(h.in_alt_screen());
        feed(&mut h, b"b");
        h.newline();
        feed(&mut h, b"\x1b[?1049l");
        assert!(!h.in_alt_screen());
        // alt-screen scroll did not leak into primary's scrollback
        assert_eq!(h.primary().all_lines_count(), 2);
    }

    #[test]
    fn cursor_hidden_tracks_decTCEM() {
        let mut h = Handler::new(10, 2, 0);
        feed(&mut h, b"\x1b[?25l");
        assert!(h.cursor().hidden);
        feed(&mut h, b"\x1b[?25h");
        assert!(!h.cursor().hidden);
    }

    #[test]
    fn save_restore_cursor() {
        let mut h = Handler::new(10, 10, 0);
        feed(&mut h, b"\x1b[5;5H\x1b7");
        feed(&mut h, b"\x1b[1;1H\x1b8");
        assert_eq!(h.cursor().row, 4);
        assert_eq!(h.cursor().col, 4);
    }

    #[test]
    fn cup_moves_cursor() {
        let mut h = Handler::new(10, 10, 0);
        feed(&mut h, b"\x1b[3;4H");
        assert_eq!(h.cursor().row, 2);
        assert_eq!(h.cursor().col, 3);
    }

    #[test]
    fn ich_dch_modify_row() {
        let mut h = Handler::new(5, 1, 0);
        feed(&mut h, b"abcde");
        feed(&mut h, b"\x1b[1;1H\x1b[1P"); // delete 1 char at col 0
        let text: String = h.active().line(0).cells.iter().map(|c| c.ch).collect();
        assert_eq!(text, "bcde ");
    }
}
