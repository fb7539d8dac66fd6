//! Inbound frame decoding.
//!
//! Every wire field is mandatory. A frame that is missing a field, carries a
//! `null`, or has a value of the wrong shape is rejected as a whole so that no
//! partially-filled tick ever reaches the buffer or the formatting code.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::tick::Tick;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

const NAIVE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Decode one text frame into a [`Tick`], stamping it with `received_at`.
pub fn decode(payload: &str, received_at: DateTime<Utc>) -> Result<Tick, DecodeError> {
    let value: Value = serde_json::from_str(payload)?;
    let obj = match value {
        Value::Object(obj) => obj,
        other => return Err(DecodeError::NotAnObject(json_kind(&other))),
    };

    let symbol = required_str(&obj, "symbol")?.trim().to_string();
    if symbol.is_empty() {
        return Err(DecodeError::InvalidField {
            field: "symbol",
            reason: "empty".to_string(),
        });
    }

    Ok(Tick {
        symbol,
        time: parse_time(required_str(&obj, "time")?)?,
        price: required_f64(&obj, "price")?,
        day_open: required_f64(&obj, "day_open")?,
        pct_vs_day_open: required_f64(&obj, "pct_vs_day_open")?,
        pct_vs_last_close: required_f64(&obj, "pct_vs_last_close")?,
        direction: required_str(&obj, "direction")?.to_string(),
        received_at,
    })
}

fn required<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, DecodeError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(field)),
        Some(v) => Ok(v),
    }
}

fn required_str<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, DecodeError> {
    let v = required(obj, field)?;
    v.as_str().ok_or_else(|| DecodeError::InvalidField {
        field,
        reason: format!("expected string, got {}", json_kind(v)),
    })
}

fn required_f64(obj: &Map<String, Value>, field: &'static str) -> Result<f64, DecodeError> {
    let v = required(obj, field)?;
    let n = v.as_f64().ok_or_else(|| DecodeError::InvalidField {
        field,
        reason: format!("expected number, got {}", json_kind(v)),
    })?;
    if !n.is_finite() {
        return Err(DecodeError::InvalidField {
            field,
            reason: "not a finite number".to_string(),
        });
    }
    Ok(n)
}

/// RFC 3339 with an offset, or a naive ISO timestamp which is taken as UTC.
fn parse_time(raw: &str) -> Result<DateTime<FixedOffset>, DecodeError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt);
    }
    NAIVE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
        .ok_or_else(|| DecodeError::InvalidField {
            field: "time",
            reason: format!("not an ISO-8601 timestamp: '{}'", raw),
        })
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: &str = r#"{
        "symbol": "AAPL",
        "time": "2025-03-03T14:31:00+00:00",
        "price": 241.57,
        "day_open": 238.2,
        "pct_vs_day_open": 1.41478,
        "pct_vs_last_close": -0.0124,
        "direction": "🔴"
    }"#;

    #[test]
    fn decodes_complete_frame_and_stamps_received_at() {
        let now = Utc::now();
        let tick = decode(FRAME, now).unwrap();
        assert_eq!(tick.symbol, "AAPL");
        assert_eq!(tick.direction, "🔴");
        assert!((tick.price - 241.57).abs() < 1e-9);
        assert!((tick.pct_vs_last_close + 0.0124).abs() < 1e-9);
        assert_eq!(tick.received_at, now);
    }

    #[test]
    fn naive_time_is_read_as_utc() {
        let frame = FRAME.replace("2025-03-03T14:31:00+00:00", "2025-03-03T14:31:00.250");
        let tick = decode(&frame, Utc::now()).unwrap();
        assert_eq!(tick.time.offset().local_minus_utc(), 0);
        assert_eq!(tick.time.timestamp_millis() % 1_000, 250);
    }

    #[test]
    fn ignores_unknown_fields() {
        let frame = FRAME.replace("\"symbol\"", "\"volume\": 10, \"symbol\"");
        assert!(decode(&frame, Utc::now()).is_ok());
    }

    #[test]
    fn rejects_missing_and_null_fields() {
        let missing = FRAME.replace("\"price\": 241.57,", "");
        assert!(matches!(
            decode(&missing, Utc::now()),
            Err(DecodeError::MissingField("price"))
        ));

        let null = FRAME.replace("238.2", "null");
        assert!(matches!(
            decode(&null, Utc::now()),
            Err(DecodeError::MissingField("day_open"))
        ));
    }

    #[test]
    fn rejects_wrong_types_and_bad_time() {
        let stringly = FRAME.replace("241.57", "\"241.57\"");
        assert!(matches!(
            decode(&stringly, Utc::now()),
            Err(DecodeError::InvalidField { field: "price", .. })
        ));

        let bad_time = FRAME.replace("2025-03-03T14:31:00+00:00", "yesterday");
        assert!(matches!(
            decode(&bad_time, Utc::now()),
            Err(DecodeError::InvalidField { field: "time", .. })
        ));

        let blank_symbol = FRAME.replace("\"AAPL\"", "\"  \"");
        assert!(matches!(
            decode(&blank_symbol, Utc::now()),
            Err(DecodeError::InvalidField { field: "symbol", .. })
        ));
    }

    #[test]
    fn rejects_non_objects_and_garbage() {
        assert!(matches!(
            decode("[1,2,3]", Utc::now()),
            Err(DecodeError::NotAnObject("array"))
        ));
        assert!(matches!(decode("{not json", Utc::now()), Err(DecodeError::Json(_))));
    }
}
