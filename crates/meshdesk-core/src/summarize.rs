//! Payload summarizer: reduces oversized store values to a bounded preview.
//!
//! Pure and total. A value whose serialized size is within the threshold is
//! passed through untouched; anything larger is replaced by a
//! [`PayloadSummary`] whose size does not depend on the input size.

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

// ─── Constants ───────────────────────────────────────────────────────

/// Threshold used by projections unless configured otherwise.
pub const DEFAULT_THRESHOLD_BYTES: usize = 1_000;

/// Array elements kept in an array preview.
pub const ARRAY_PREVIEW_ELEMENTS: usize = 3;

/// Field names kept when describing a composite array element.
pub const ELEMENT_FIELD_NAMES: usize = 5;

/// Key names listed in an object summary.
pub const OBJECT_KEY_NAMES: usize = 10;

/// `(key, value)` pairs kept in an object preview.
pub const OBJECT_PREVIEW_PAIRS: usize = 5;

/// Maximum characters of any string (value or key) inside a summary.
pub const PREVIEW_TEXT_CHARS: usize = 64;

/// Upper bound on the serialized size of any summary.
pub const MAX_SUMMARY_BYTES: usize = 16_384;

const UNSERIALIZABLE_NOTE: &str = "unserializable";

/// Longest note a recognized summary may carry.
const NOTE_CHARS: usize = 128;

// ─── Types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryKind {
    ArraySummary,
    ObjectSummary,
}

/// Bounded stand-in for an oversized value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PayloadSummary {
    pub kind: SummaryKind,
    /// Serialized size of the original value in bytes (0 when unknown).
    pub original_size_estimate: usize,
    /// Element count, for arrays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    /// Key count, for objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_count: Option<usize>,
    /// Leading key names, for objects.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    #[serde(default)]
    pub preview: Value,
    pub note: String,
}

impl PayloadSummary {
    /// The fixed summary used when a value cannot be serialized.
    pub fn unserializable() -> Self {
        Self {
            kind: SummaryKind::ObjectSummary,
            original_size_estimate: 0,
            length: None,
            key_count: None,
            keys: Vec::new(),
            preview: Value::Null,
            note: UNSERIALIZABLE_NOTE.to_owned(),
        }
    }

    pub fn is_unserializable(&self) -> bool {
        self.note == UNSERIALIZABLE_NOTE
    }

    /// Recognize a value that is already the serialized form of a summary
    /// and stays within every summary limit. `size` is its serialized length.
    fn recognize(value: &Value, size: usize) -> Option<Self> {
        let map = value.as_object()?;
        let kind = map.get("kind")?.as_str()?;
        if !matches!(kind, "array-summary" | "object-summary") || !map.contains_key("note") {
            return None;
        }
        if size > MAX_SUMMARY_BYTES {
            return None;
        }
        let summary: Self = serde_json::from_value(value.clone()).ok()?;
        summary.is_bounded().then_some(summary)
    }

    fn is_bounded(&self) -> bool {
        self.note.chars().count() <= NOTE_CHARS
            && self.keys.len() <= OBJECT_KEY_NAMES
            && self.keys.iter().all(|k| is_preview_text(k))
            && is_bounded_preview(&self.preview, 0)
    }
}

/// A string no longer than what [`truncate`] produces.
fn is_preview_text(s: &str) -> bool {
    s.chars().count() <= PREVIEW_TEXT_CHARS + 1
}

/// Preview shapes the reductions below emit: at most three levels, short
/// strings, few entries.
fn is_bounded_preview(value: &Value, depth: usize) -> bool {
    const MAX_ENTRIES: usize = if ARRAY_PREVIEW_ELEMENTS > ELEMENT_FIELD_NAMES {
        ARRAY_PREVIEW_ELEMENTS
    } else {
        ELEMENT_FIELD_NAMES
    };
    match value {
        Value::String(s) => is_preview_text(s),
        Value::Array(items) => {
            depth < 3
                && items.len() <= MAX_ENTRIES
                && items.iter().all(|v| is_bounded_preview(v, depth + 1))
        }
        Value::Object(map) => {
            depth < 3
                && map.len() <= OBJECT_PREVIEW_PAIRS
                && map
                    .iter()
                    .all(|(k, v)| is_preview_text(k) && is_bounded_preview(v, depth + 1))
        }
        _ => true,
    }
}

/// Summarizer output: either the untouched value or its summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum Summarized {
    Raw(Value),
    Summary(PayloadSummary),
}

impl Summarized {
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    /// Flatten back into a plain value (summaries become their object form).
    pub fn into_value(self) -> Value {
        match self {
            Self::Raw(v) => v,
            Self::Summary(s) => serde_json::to_value(s).unwrap_or(Value::Null),
        }
    }
}

// ─── Entry Points ────────────────────────────────────────────────────

/// Summarize a JSON value against `max_bytes` of serialized size.
///
/// An oversized value that is already a well-formed summary passes through
/// as that summary, so `summarize(summarize(v).into_value())` flattens to
/// the same value as `summarize(v)`. Summary-shaped values that break the
/// summary limits are reduced like any other object.
pub fn summarize(value: &Value, max_bytes: usize) -> Summarized {
    let Some(size) = serialized_len(value) else {
        return Summarized::Summary(PayloadSummary::unserializable());
    };
    if size <= max_bytes {
        return Summarized::Raw(value.clone());
    }
    if let Some(existing) = PayloadSummary::recognize(value, size) {
        return Summarized::Summary(existing);
    }

    Summarized::Summary(match value {
        Value::Array(items) => summarize_array(items, size),
        Value::Object(map) => summarize_object(map, size),
        scalar => summarize_scalar(scalar, size),
    })
}

/// Summarize any serializable value. Serialization failures degrade to
/// [`PayloadSummary::unserializable`] instead of surfacing.
pub fn summarize_serializable<T: Serialize + ?Sized>(value: &T, max_bytes: usize) -> Summarized {
    match serde_json::to_value(value) {
        Ok(v) => summarize(&v, max_bytes),
        Err(_) => Summarized::Summary(PayloadSummary::unserializable()),
    }
}

/// Serialized JSON size of `value`, without buffering the output.
pub fn serialized_len(value: &Value) -> Option<usize> {
    let mut counter = ByteCounter(0);
    serde_json::to_writer(&mut counter, value).ok()?;
    Some(counter.0)
}

struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ─── Reductions ──────────────────────────────────────────────────────

fn summarize_array(items: &[Value], size: usize) -> PayloadSummary {
    let preview = items
        .iter()
        .take(ARRAY_PREVIEW_ELEMENTS)
        .map(describe_element)
        .collect();
    PayloadSummary {
        kind: SummaryKind::ArraySummary,
        original_size_estimate: size,
        length: Some(items.len()),
        key_count: None,
        keys: Vec::new(),
        preview: Value::Array(preview),
        note: format!("array of {} items ({size} bytes) summarized", items.len()),
    }
}

fn summarize_object(map: &Map<String, Value>, size: usize) -> PayloadSummary {
    let keys = map
        .keys()
        .take(OBJECT_KEY_NAMES)
        .map(|k| truncate(k))
        .collect();
    // Keys sharing a truncated prefix keep the first occurrence.
    let mut preview = Map::new();
    for (k, v) in map {
        if preview.len() == OBJECT_PREVIEW_PAIRS {
            break;
        }
        preview.entry(truncate(k)).or_insert_with(|| shallow(v));
    }
    PayloadSummary {
        kind: SummaryKind::ObjectSummary,
        original_size_estimate: size,
        length: None,
        key_count: Some(map.len()),
        keys,
        preview: Value::Object(preview),
        note: format!("object with {} keys ({size} bytes) summarized", map.len()),
    }
}

fn summarize_scalar(value: &Value, size: usize) -> PayloadSummary {
    PayloadSummary {
        kind: SummaryKind::ObjectSummary,
        original_size_estimate: size,
        length: None,
        key_count: None,
        keys: Vec::new(),
        preview: json!({ "type": type_name(value), "prefix": shallow(value) }),
        note: format!("{} value ({size} bytes) summarized", type_name(value)),
    }
}

/// Array element preview: scalars shallowly, composites as type plus shape.
fn describe_element(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let fields: Vec<String> = map.keys().take(ELEMENT_FIELD_NAMES).map(|k| truncate(k)).collect();
            json!({ "type": "object", "fields": fields })
        }
        Value::Array(items) => json!({ "type": "array", "length": items.len() }),
        scalar => shallow(scalar),
    }
}

/// Scalars as-is (strings truncated); composites replaced by their type name.
fn shallow(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(truncate(s)),
        Value::Array(_) | Value::Object(_) => Value::String(type_name(value).to_owned()),
        scalar => scalar.clone(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn truncate(s: &str) -> String {
    match s.char_indices().nth(PREVIEW_TEXT_CHARS) {
        Some((cut, _)) => format!("{}…", &s[..cut]),
        None => s.to_owned(),
    }
}
