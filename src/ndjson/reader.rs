//! Line-oriented asciicast v3 reader: header, then a pull-style stream of events.

use std::io::BufRead;

use serde_json::Value;

use crate::error::{CoreError, Result};

use super::{event::Event, header::Header};

/// A single skipped line, retained so a caller can report which lines were
/// dropped and why.
#[derive(Clone, Debug, PartialEq)]
pub struct MalformedLine {
    pub line_number: usize,
    pub raw: String,
}

/// Reads the header eagerly, then yields events one at a time via
/// `Iterator`. Blank lines and trailing newlines are tolerated; malformed
/// event lines are skipped (counted, not fatal) while a malformed or
/// missing header is fatal.
///
/// Does not itself seek; whether a caller can restart the stream depends
/// entirely on whether the backing `R` supports seeking.
pub struct NdjsonReader<R: BufRead> {
    lines: std::io::Lines<R>,
    line_number: usize,
    malformed: Vec<MalformedLine>,
}

impl<R: BufRead> NdjsonReader<R> {
    /// Reads and normalizes the header from the first non-empty line.
    /// Fails fast on an empty stream or an invalid header.
    pub fn new(source: R) -> Result<(Self, Header)> {
        let mut lines = source.lines();
        let mut line_number = 0usize;

        let header_line = loop {
            line_number += 1;
            match lines.next() {
                Some(Ok(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    break line;
                }
                Some(Err(e)) => return Err(CoreError::Io(e)),
                None => return Err(CoreError::InvalidFormat("empty".into())),
            }
        };

        let value: Value = serde_json::from_str(&header_line)
            .map_err(|_| CoreError::InvalidFormat("first line is not valid JSON".into()))?;
        let header = Header::parse(value)?;

        Ok((
            Self {
                lines,
                line_number,
                malformed: Vec::new(),
            },
            header,
        ))
    }

    /// Lines skipped so far because they failed to parse as a structurally
    /// valid event tuple (or an unrecognized-but-well-formed event, which
    /// is not an error and is not recorded here).
    pub fn malformed_lines(&self) -> &[MalformedLine] {
        &self.malformed
    }
}

impl<R: BufRead> Iterator for NdjsonReader<R> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            self.line_number += 1;
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(_) => return None,
            };
            if line.trim().is_empty() {
                continue;
            }

            let value: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(_) => {
                    self.malformed.push(MalformedLine {
                        line_number: self.line_number,
                        raw: line,
                    });
                    continue;
                }
            };

            match Event::parse(&value) {
                Ok(Some(event)) => return Some(event),
                Ok(None) => continue, // recognized-but-unknown kind: silently skipped
                Err(_) => {
                    self.malformed.push(MalformedLine {
                        line_number: self.line_number,
                        raw: line,
                    });
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndjson::event::EventKind;
    use std::io::Cursor;

    fn reader(text: &str) -> (NdjsonReader<Cursor<&[u8]>>, Header) {
        NdjsonReader::new(Cursor::new(text.as_bytes())).unwrap()
    }

    #[test]
    fn empty_input_fails() {
        let err = NdjsonReader::new(Cursor::new(b"".as_slice())).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFormat(_)));
    }

    #[test]
    fn blank_lines_tolerated_before_header() {
        let (_, header) = reader("\n\n{\"version\":3,\"width\":80,\"height\":24}\n");
        assert_eq!(header.cols(), 80);
    }

    #[test]
    fn skips_malformed_event_lines_and_continues() {
        let (mut r, _) = reader(concat!(
            "{\"version\":3,\"width\":80,\"height\":24}\n",
            "[0.0,\"o\",\"a\"]\n",
            "not json at all\n",
            "[0.1,\"o\",\"b\"]\n",
        ));
        let events: Vec<_> = r.by_ref().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(r.malformed_lines().len(), 1);
        assert_eq!(r.malformed_lines()[0].line_number, 3);
    }

    #[test]
    fn unknown_event_kind_silently_skipped() {
        let (mut r, _) = reader(concat!(
            "{\"version\":3,\"width\":80,\"height\":24}\n",
            "[0.0,\"z\",\"whatever\"]\n",
            "[0.1,\"o\",\"b\"]\n",
        ));
        let events: Vec<_> = r.by_ref().collect();
        assert_eq!(events.len(), 1);
        assert!(r.malformed_lines().is_empty());
    }

    #[test]
    fn blank_lines_between_events_tolerated() {
        let (mut r, _) = reader(concat!(
            "{\"version\":3,\"width\":80,\"height\":24}\n",
            "\n",
            "[0.0,\"o\",\"a\"]\n",
            "\n",
        ));
        let events: Vec<_> = r.by_ref().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].kind, EventKind::Output(_)));
    }
}
