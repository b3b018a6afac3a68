//! The asciicast v3 header: version + terminal dimensions + opaque metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};

/// Terminal dimensions as carried by the preferred v3 `term` object.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TermInfo {
    pub cols: Option<u32>,
    pub rows: Option<u32>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub term_type: Option<String>,
}

/// The normalized header: `cols`/`rows` are always resolved and positive,
/// with the rest of the JSON object kept opaque for passthrough.
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    cols: u32,
    rows: u32,
    /// The header's raw JSON object, for passthrough of `title`/`command`/
    /// `env` and anything else a caller wants but the core does not
    /// interpret itself.
    pub raw: Value,
}

impl Header {
    /// Parses and normalizes a single header JSON value.
    ///
    /// Accepts either the v3-preferred `term: {cols, rows}` form or the
    /// legacy top-level `width`/`height` fields, and requires `version == 3`.
    pub fn parse(value: Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| CoreError::InvalidFormat("header is not a JSON object".into()))?;

        let version = obj
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| CoreError::InvalidFormat("header missing version".into()))?;
        if version != 3 {
            return Err(CoreError::InvalidVersion(version));
        }

        let term: Option<TermInfo> = obj
            .get("term")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok());

        let cols = term
            .as_ref()
            .and_then(|t| t.cols)
            .or_else(|| obj.get("width").and_then(Value::as_u64).map(|n| n as u32));
        let rows = term
            .as_ref()
            .and_then(|t| t.rows)
            .or_else(|| obj.get("height").and_then(Value::as_u64).map(|n| n as u32));

        let (cols, rows) = match (cols, rows) {
            (Some(c), Some(r)) if c > 0 && r > 0 => (c, r),
            _ => {
                return Err(CoreError::InvalidHeader(
                    "missing or non-positive term.cols/term.rows and width/height".into(),
                ))
            }
        };

        Ok(Self {
            cols,
            rows,
            raw: value,
        })
    }

    /// Resolved column count. Always positive.
    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Resolved row count. Always positive.
    pub fn rows(&self) -> u32 {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_v3_term_form() {
        let header = Header::parse(json!({"version": 3, "term": {"cols": 80, "rows": 24}})).unwrap();
        assert_eq!(header.cols(), 80);
        assert_eq!(header.rows(), 24);
    }

    #[test]
    fn parses_legacy_width_height_form() {
        let header = Header::parse(json!({"version": 3, "width": 100, "height": 30})).unwrap();
        assert_eq!(header.cols(), 100);
        assert_eq!(header.rows(), 30);
    }

    #[test]
    fn rejects_wrong_version() {
        let err = Header::parse(json!({"version": 2, "width": 80, "height": 24})).unwrap_err();
        assert!(matches!(err, CoreError::InvalidVersion(2)));
    }

    #[test]
    fn rejects_missing_dimensions() {
        let err = Header::parse(json!({"version": 3})).unwrap_err();
        assert!(matches!(err, CoreError::InvalidHeader(_)));
    }

    #[test]
    fn rejects_zero_dimensions() {
        let err = Header::parse(json!({"version": 3, "width": 0, "height": 24})).unwrap_err();
        assert!(matches!(err, CoreError::InvalidHeader(_)));
    }

    #[test]
    fn rejects_non_object() {
        let err = Header::parse(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFormat(_)));
    }
}
