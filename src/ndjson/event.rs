//! Event tuples: `[time, kind, payload]` as written by asciicast v3.

use serde_json::Value;

/// One event as it appears on the wire, before cumulative-time conversion.
///
/// `time` is the raw relative delta from the previous event; the reader
/// does not accumulate it (see `NdjsonReader` docs) so callers that only
/// need the event stream, not timing, avoid the extra bookkeeping.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub relative_time: f64,
    pub kind: EventKind,
}

/// Event kinds recognized by the core. Unknown single-character kinds are
/// skipped by the reader before an `Event` is ever constructed.
#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    /// Bytes to feed the VT engine.
    Output(Vec<u8>),
    /// Informational only; not replayed.
    Input(String),
    /// An explicit section-boundary annotation.
    Marker(String),
    /// Resize to `(cols, rows)`, parsed from the wire's `"COLSxROWS"` string.
    Resize(u32, u32),
    /// Informational only.
    Exit(ExitCode),
}

/// The `x` event's payload: an exit code, which the wire may encode either
/// as a JSON integer or as a numeric string.
#[derive(Clone, Debug, PartialEq)]
pub enum ExitCode {
    Int(i64),
    Text(String),
}

impl Event {
    /// Parses one `[time, kind, payload]` array. Returns `None` for an
    /// unrecognized `kind` (the caller should silently skip it, per the
    /// wire format's tolerance for unknown event kinds) and `Err` for a
    /// structurally malformed tuple.
    pub fn parse(value: &Value) -> Result<Option<Self>, String> {
        let arr = value
            .as_array()
            .ok_or_else(|| "event is not an array".to_string())?;
        if arr.len() < 3 {
            return Err("event array has fewer than 3 elements".to_string());
        }

        let relative_time = arr[0]
            .as_f64()
            .filter(|t| t.is_finite() && *t >= 0.0)
            .ok_or_else(|| "event time is not a finite, non-negative number".to_string())?;

        let kind = arr[1]
            .as_str()
            .ok_or_else(|| "event kind is not a string".to_string())?;

        let kind = match kind {
            "o" => EventKind::Output(
                arr[2]
                    .as_str()
                    .ok_or_else(|| "output payload is not a string".to_string())?
                    .as_bytes()
                    .to_vec(),
            ),
            "i" => EventKind::Input(
                arr[2]
                    .as_str()
                    .ok_or_else(|| "input payload is not a string".to_string())?
                    .to_string(),
            ),
            "m" => EventKind::Marker(
                arr[2]
                    .as_str()
                    .ok_or_else(|| "marker payload is not a string".to_string())?
                    .to_string(),
            ),
            "r" => {
                let spec = arr[2]
                    .as_str()
                    .ok_or_else(|| "resize payload is not a string".to_string())?;
                let (cols, rows) = spec
                    .split_once('x')
                    .ok_or_else(|| format!("resize payload not COLSxROWS: {spec}"))?;
                let cols: u32 = cols
                    .parse()
                    .map_err(|_| format!("resize cols not a number: {cols}"))?;
                let rows: u32 = rows
                    .parse()
                    .map_err(|_| format!("resize rows not a number: {rows}"))?;
                EventKind::Resize(cols, rows)
            }
            "x" => {
                let code = if let Some(n) = arr[2].as_i64() {
                    ExitCode::Int(n)
                } else if let Some(s) = arr[2].as_str() {
                    ExitCode::Text(s.to_string())
                } else {
                    return Err("exit payload is neither int nor string".to_string());
                };
                EventKind::Exit(code)
            }
            _ => return Ok(None),
        };

        Ok(Some(Self {
            relative_time,
            kind,
        }))
    }
}
