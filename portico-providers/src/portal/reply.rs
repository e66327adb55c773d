//! Reply text extraction.
//!
//! Each completion endpoint wraps its answer differently. The extractor
//! probes a fixed list of field names in order and takes the first
//! non-blank string; a `data` object is searched one level deep.

use std::sync::LazyLock;

use serde_json::Value;

/// Field names probed at each level, in priority order.
pub const REPLY_FIELDS: &[&str] = &[
    "completion",
    "response",
    "reply",
    "answer",
    "message",
    "output",
    "text",
    "content",
    "result",
    "data",
];

/// What an accessor found under its field.
enum Probe<'v> {
    Text(String),
    Nested(&'v Value),
}

type Accessor = Box<dyn for<'v> Fn(&'v Value) -> Option<Probe<'v>> + Send + Sync>;

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn accessor<F>(f: F) -> Accessor
where
    F: for<'v> Fn(&'v Value) -> Option<Probe<'v>> + Send + Sync + 'static,
{
    Box::new(f)
}

fn text_field(name: &'static str) -> Accessor {
    accessor(move |value| value.get(name)?.as_str().and_then(non_blank).map(Probe::Text))
}

fn data_field(name: &'static str) -> Accessor {
    accessor(move |value| match value.get(name)? {
        Value::String(s) => non_blank(s).map(Probe::Text),
        nested @ Value::Object(_) => Some(Probe::Nested(nested)),
        _ => None,
    })
}

static ACCESSORS: LazyLock<Vec<Accessor>> = LazyLock::new(|| {
    REPLY_FIELDS
        .iter()
        .map(|&name| if name == "data" { data_field(name) } else { text_field(name) })
        .collect()
});

fn probe_object(value: &Value, depth: u8) -> Option<String> {
    ACCESSORS.iter().find_map(|read| match read(value)? {
        Probe::Text(text) => Some(text),
        Probe::Nested(inner) if depth == 0 => probe_object(inner, depth + 1),
        Probe::Nested(_) => None,
    })
}

/// Pulls the answer text out of a completion response.
///
/// A bare JSON string is returned trimmed. Objects are probed with
/// [`REPLY_FIELDS`]. Blank strings count as missing.
pub fn extract_reply(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(s),
        Value::Object(_) => probe_object(value, 0),
        _ => None,
    }
}
