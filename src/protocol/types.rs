use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag of the JSON form a byte buffer travels in: `{"type":"Buffer","data":[..]}`.
pub const BUFFER_TAG: &str = "Buffer";

/// A value held by the cache.
///
/// A string travels as a JSON string and a number as a JSON number. A byte buffer
/// travels in the tagged `Buffer` form, so it never collides with a JSON array.
/// `Object` carries every other JSON value (objects, arrays, booleans and `null`).
///
/// The wire form of a value decodes to its [`canonical`](Self::canonical) form.
/// Values are canonicalised before they are stored, so in-process and socket
/// callers read back the same thing.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Text(String),
    Number(f64),
    Bytes(Vec<u8>),
    Object(Value),
}

#[derive(Serialize)]
struct BufferForm<'a> {
    #[serde(rename = "type")]
    tag: &'static str,
    data: &'a [u8],
}

impl CacheValue {
    /// Interprets command-line input: valid JSON keeps its shape, anything else is text.
    pub fn parse_lenient(input: &str) -> Self {
        serde_json::from_str(input).unwrap_or_else(|_| CacheValue::Text(input.to_string()))
    }

    /// Maps a decoded JSON value onto the variant that owns its shape.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(text) => CacheValue::Text(text),
            Value::Number(number) => match number.as_f64() {
                Some(n) => CacheValue::Number(n),
                None => CacheValue::Object(Value::Number(number)),
            },
            Value::Object(map) => match buffer_bytes(&map) {
                Some(bytes) => CacheValue::Bytes(bytes),
                None => CacheValue::Object(Value::Object(map)),
            },
            other => CacheValue::Object(other),
        }
    }

    /// The form this value takes after a trip over the wire.
    ///
    /// An `Object` holding a string, a number or a `Buffer` form moves to the
    /// matching variant. A non-finite number becomes `null`, as JSON has no
    /// spelling for it.
    pub fn canonical(self) -> Self {
        match self {
            CacheValue::Number(n) if !n.is_finite() => CacheValue::Object(Value::Null),
            CacheValue::Object(value) => Self::from_json(value),
            other => other,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CacheValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

fn buffer_bytes(map: &serde_json::Map<String, Value>) -> Option<Vec<u8>> {
    if map.len() != 2 || map.get("type").and_then(Value::as_str) != Some(BUFFER_TAG) {
        return None;
    }
    map.get("data")?
        .as_array()?
        .iter()
        .map(|octet| octet.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect()
}

impl Serialize for CacheValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CacheValue::Text(text) => serializer.serialize_str(text),
            CacheValue::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            CacheValue::Number(_) => serializer.serialize_unit(),
            CacheValue::Bytes(bytes) => BufferForm {
                tag: BUFFER_TAG,
                data: bytes,
            }
            .serialize(serializer),
            CacheValue::Object(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for CacheValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(CacheValue::from_json)
    }
}

/// Field decoder for `Option<CacheValue>` payloads.
///
/// Paired with `#[serde(default)]`: an absent field stays `None` while a present
/// `null` becomes `Some(Object(Null))`.
pub(crate) fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<CacheValue>, D::Error>
where
    D: Deserializer<'de>,
{
    CacheValue::deserialize(deserializer).map(Some)
}

impl std::fmt::Display for CacheValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheValue::Text(text) => f.write_str(text),
            CacheValue::Number(n) => write!(f, "{}", n),
            CacheValue::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            CacheValue::Object(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        CacheValue::Text(value.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        CacheValue::Text(value)
    }
}

impl From<f64> for CacheValue {
    fn from(value: f64) -> Self {
        CacheValue::Number(value)
    }
}

impl From<i32> for CacheValue {
    fn from(value: i32) -> Self {
        CacheValue::Number(f64::from(value))
    }
}

impl From<u32> for CacheValue {
    fn from(value: u32) -> Self {
        CacheValue::Number(f64::from(value))
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(value: Vec<u8>) -> Self {
        CacheValue::Bytes(value)
    }
}

impl From<Value> for CacheValue {
    fn from(value: Value) -> Self {
        CacheValue::from_json(value)
    }
}

/// Operation code of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Set,
    Get,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Set => f.write_str("set"),
            Operation::Get => f.write_str("get"),
        }
    }
}

/// Transfer mode of a request.
///
/// Only `Equate` (direct value set/get) is served. `Stream` is reserved and
/// rejected; any unrecognised tag is kept in `Other` so the coordinator can reject
/// it with `InvalidMode` instead of failing to decode the request. A tag that is
/// not a JSON string is kept in its JSON spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum Mode {
    Equate,
    Stream,
    Other(String),
}

impl From<String> for Mode {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            // "equ" is the short tag older peers send.
            "equate" | "equ" => Mode::Equate,
            "stream" => Mode::Stream,
            _ => Mode::Other(tag),
        }
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(tag) => Mode::from(tag),
            other => Mode::Other(other.to_string()),
        })
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Equate => "equate".to_string(),
            Mode::Stream => "stream".to_string(),
            Mode::Other(tag) => tag,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Equate => f.write_str("equate"),
            Mode::Stream => f.write_str("stream"),
            Mode::Other(tag) => f.write_str(tag),
        }
    }
}
