//! InfluxDB line protocol encoding.
//!
//! `measurement,tag=v field=1i,other=2.5 <unix nanos>`

use std::fmt::Write as FmtWrite;

use super::Point;
use crate::point::Value;

fn escape(out: &mut String, text: &str, special: &[char]) {
    for c in text.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Like [`escape`], for unquoted names. A trailing backslash is doubled so it
/// cannot escape the delimiter that follows.
fn escape_unquoted(out: &mut String, text: &str, special: &[char]) {
    escape(out, text, special);
    if text.ends_with('\\') {
        out.push('\\');
    }
}

fn escape_measurement(out: &mut String, name: &str) {
    escape_unquoted(out, name, &[',', ' ']);
}

fn escape_key(out: &mut String, key: &str) {
    escape_unquoted(out, key, &[',', '=', ' ']);
}

/// Appends a field value; `false` for values the protocol cannot carry.
fn write_value(out: &mut String, value: &Value) -> bool {
    match value {
        Value::Integer(v) => {
            let _ = write!(out, "{v}i");
        }
        Value::Float(v) if v.is_finite() => {
            let _ = write!(out, "{v}");
        }
        Value::Float(_) => return false,
        Value::Text(s) => {
            out.push('"');
            escape(out, s, &['"', '\\']);
            out.push('"');
        }
    }
    true
}

/// Encodes one point, or `None` when no field survives encoding.
///
/// Tags with empty values and non-finite floats are dropped.
pub fn encode_point(point: &Point) -> Option<String> {
    let mut line = String::new();
    escape_measurement(&mut line, &point.measurement);

    for (key, value) in &point.tags {
        if key.is_empty() || value.is_empty() {
            continue;
        }
        line.push(',');
        escape_key(&mut line, key);
        line.push('=');
        escape_key(&mut line, value);
    }

    let mut fields = String::new();
    for (key, value) in &point.fields {
        let mut encoded = String::new();
        escape_key(&mut encoded, key);
        encoded.push('=');
        if !write_value(&mut encoded, value) {
            continue;
        }
        if !fields.is_empty() {
            fields.push(',');
        }
        fields.push_str(&encoded);
    }
    if fields.is_empty() {
        return None;
    }

    line.push(' ');
    line.push_str(&fields);

    if let Some(nanos) = point.time.timestamp_nanos_opt() {
        let _ = write!(line, " {nanos}");
    }
    Some(line)
}

/// Encodes a batch, one line per point, skipping points without fields.
pub fn encode_batch(points: &[Point]) -> String {
    points
        .iter()
        .filter_map(encode_point)
        .collect::<Vec<_>>()
        .join("\n")
}
