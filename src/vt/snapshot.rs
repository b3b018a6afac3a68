//! The value types handed to callers and persisted via the repository, plus
//! the canonical JSON encoding: `{cols, rows, lines}`, colors as
//! `null`/integer/`"#RRGGBB"`, boolean flags omitted when false.

use serde::{Deserialize, Serialize};

use super::color::Color;
use super::grid::{Grid, Line};
use super::pen::{Pen, PenFlags};

/// A terminal document: `cols`/`rows` plus an ordered sequence of lines.
/// Produced by `VtEngine::get_view`/`get_all_lines` and by the
/// deduplicator's `clean_snapshot`.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub cols: usize,
    pub rows: usize,
    pub lines: Vec<SnapshotLine>,
}

/// One line as merged runs of cells sharing an identical pen.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct SnapshotLine {
    pub spans: Vec<SnapshotSpan>,
}

impl SnapshotLine {
    /// The displayed text of the line, recovered by concatenating span
    /// text (the round-trip invariant the core guarantees).
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotSpan {
    pub text: String,
    pub fg: Color,
    pub bg: Color,
    pub bold: bool,
    pub faint: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub blink: bool,
    pub inverse: bool,
}

impl Snapshot {
    fn from_grid_lines<'a>(cols: usize, lines: impl Iterator<Item = &'a Line>) -> Self {
        let snapshot_lines = lines.map(line_to_snapshot_line).collect();
        Self {
            cols,
            rows: 0,
            lines: snapshot_lines,
        }
    }

    pub(super) fn view(grid: &Grid) -> Self {
        let mut snap = Self::from_grid_lines(grid.cols(), grid.view_lines().iter());
        snap.rows = grid.rows();
        snap
    }

    pub(super) fn all_lines(grid: &Grid) -> Self {
        let mut snap = Self::from_grid_lines(grid.cols(), grid.all_lines().into_iter());
        snap.rows = grid.rows();
        snap
    }
}

fn line_to_snapshot_line(line: &Line) -> SnapshotLine {
    let mut spans: Vec<SnapshotSpan> = Vec::new();
    let mut run_pen: Option<Pen> = None;
    let mut run_text = String::new();

    for cell in &line.cells {
        match run_pen {
            Some(pen) if pen == cell.pen => run_text.push(cell.ch),
            Some(pen) => {
                spans.push(span_from_run(&run_text, pen));
                run_text = String::from(cell.ch);
                run_pen = Some(cell.pen);
            }
            None => {
                run_text.push(cell.ch);
                run_pen = Some(cell.pen);
            }
        }
    }
    if let Some(pen) = run_pen {
        spans.push(span_from_run(&run_text, pen));
    }

    // Trailing padding is optional; drop a final span if it is pure blank
    // default-pen text, keeping the encoding compact.
    if let Some(last) = spans.last() {
        if last.fg == Color::Default
            && last.bg == Color::Default
            && !last.bold
            && !last.faint
            && !last.italic
            && !last.underline
            && !last.strikethrough
            && !last.blink
            && !last.inverse
            && last.text.chars().all(|c| c == ' ')
        {
            spans.pop();
        }
    }

    SnapshotLine { spans }
}

fn span_from_run(text: &str, pen: Pen) -> SnapshotSpan {
    SnapshotSpan {
        text: text.to_string(),
        fg: pen.fg,
        bg: pen.bg,
        bold: pen.flags.contains(PenFlags::BOLD),
        faint: pen.flags.contains(PenFlags::FAINT),
        italic: pen.flags.contains(PenFlags::ITALIC),
        underline: pen.flags.contains(PenFlags::UNDERLINE),
        strikethrough: pen.flags.contains(PenFlags::STRIKETHROUGH),
        blink: pen.flags.contains(PenFlags::BLINK),
        inverse: pen.flags.contains(PenFlags::INVERSE),
    }
}

// --- Canonical JSON wire format -------------------------------------------------

#[derive(Serialize, Deserialize)]
struct SnapshotWire {
    cols: usize,
    rows: usize,
    lines: Vec<LineWire>,
}

#[derive(Serialize, Deserialize)]
struct LineWire {
    spans: Vec<SpanWire>,
}

#[derive(Serialize, Deserialize)]
struct SpanWire {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    fg: Option<ColorWire>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    bg: Option<ColorWire>,
    #[serde(skip_serializing_if = "is_false", default)]
    bold: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    faint: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    italic: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    underline: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    strikethrough: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    blink: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    inverse: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ColorWire {
    Palette(u8),
    Hex(String),
}

impl From<Color> for Option<ColorWire> {
    fn from(color: Color) -> Self {
        match color {
            Color::Default => None,
            Color::Palette(n) => Some(ColorWire::Palette(n)),
            Color::Rgb(r, g, b) => Some(ColorWire::Hex(format!("#{r:02X}{g:02X}{b:02X}"))),
        }
    }
}

impl From<Option<ColorWire>> for Color {
    fn from(wire: Option<ColorWire>) -> Self {
        match wire {
            None => Color::Default,
            Some(ColorWire::Palette(n)) => Color::Palette(n),
            Some(ColorWire::Hex(hex)) => parse_hex_color(&hex).unwrap_or(Color::Default),
        }
    }
}

fn parse_hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb(r, g, b))
}

impl From<&SnapshotSpan> for SpanWire {
    fn from(span: &SnapshotSpan) -> Self {
        Self {
            text: span.text.clone(),
            fg: span.fg.into(),
            bg: span.bg.into(),
            bold: span.bold,
            faint: span.faint,
            italic: span.italic,
            underline: span.underline,
            strikethrough: span.strikethrough,
            blink: span.blink,
            inverse: span.inverse,
        }
    }
}

impl From<SpanWire> for SnapshotSpan {
    fn from(wire: SpanWire) -> Self {
        Self {
            text: wire.text,
            fg: wire.fg.into(),
            bg: wire.bg.into(),
            bold: wire.bold,
            faint: wire.faint,
            italic: wire.italic,
            underline: wire.underline,
            strikethrough: wire.strikethrough,
            blink: wire.blink,
            inverse: wire.inverse,
        }
    }
}

impl Snapshot {
    /// Serializes to the canonical JSON encoding.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let wire = SnapshotWire {
            cols: self.cols,
            rows: self.rows,
            lines: self
                .lines
                .iter()
                .map(|l| LineWire {
                    spans: l.spans.iter().map(SpanWire::from).collect(),
                })
                .collect(),
        };
        serde_json::to_string(&wire)
    }

    /// Parses the canonical JSON encoding. Round-trips with `to_json`.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let wire: SnapshotWire = serde_json::from_str(text)?;
        Ok(Self {
            cols: wire.cols,
            rows: wire.rows,
            lines: wire
                .lines
                .into_iter()
                .map(|l| SnapshotLine {
                    spans: l.spans.into_iter().map(SnapshotSpan::from).collect(),
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_span(text: &str) -> SnapshotSpan {
        SnapshotSpan {
            text: text.to_string(),
            fg: Color::Default,
            bg: Color::Default,
            bold: false,
            faint: false,
            italic: false,
            underline: false,
            strikethrough: false,
            blink: false,
            inverse: false,
        }
    }

    #[test]
    fn round_trips_plain_text() {
        let snap = Snapshot {
            cols: 10,
            rows: 1,
            lines: vec![SnapshotLine {
                spans: vec![plain_span("hello")],
            }],
        };
        let json = snap.to_json().unwrap();
        let back = Snapshot::from_json(&json).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn round_trips_colors_and_flags() {
        let mut span = plain_span("x");
        span.fg = Color::Palette(3);
        span.bg = Color::Rgb(1, 2, 3);
        span.bold = true;
        span.strikethrough = true;
        let snap = Snapshot {
            cols: 1,
            rows: 1,
            lines: vec![SnapshotLine { spans: vec![span] }],
        };
        let json = snap.to_json().unwrap();
        assert!(json.contains("\"fg\":3"));
        assert!(json.contains("#010203"));
        let back = Snapshot::from_json(&json).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn default_flags_are_omitted_from_json() {
        let snap = Snapshot {
            cols: 1,
            rows: 1,
            lines: vec![SnapshotLine {
                spans: vec![plain_span("x")],
            }],
        };
        let json = snap.to_json().unwrap();
        assert!(!json.contains("bold"));
        assert!(!json.contains("\"fg\""));
    }

    #[test]
    fn concatenated_spans_recover_row_text() {
        use super::super::grid::Line;
        let mut line = Line::blank(5);
        line.cells[0].ch = 'h';
        line.cells[1].ch = 'i';
        let snap_line = line_to_snapshot_line(&line);
        assert_eq!(snap_line.text().trim_end(), "hi");
    }

    #[test]
    fn trailing_blank_span_after_an_attribute_change_is_trimmed() {
        use super::super::cell::Cell;
        use super::super::grid::Line;
        let mut line = Line::blank(5);
        line.cells[0] = Cell {
            ch: 'h',
            pen: Pen {
                flags: PenFlags::BOLD,
                ..Pen::default()
            },
        };
        let snap_line = line_to_snapshot_line(&line);
        // bold "h" span, then the remaining default-pen blanks are dropped.
        assert_eq!(snap_line.spans.len(), 1);
        assert_eq!(snap_line.spans[0].text, "h");
    }
}
