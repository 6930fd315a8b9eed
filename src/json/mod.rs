//! JSON adapter format built on `serde_json`.
//!
//! JSON has no date or binary type, so those kinds (and user kinds) fail
//! with [`ObjectError::UnsupportedKind`]. Shared children are written once
//! per occurrence; identity does not survive a JSON round trip.

use bytes::{BufMut, BytesMut};
use serde_json::Map;

use crate::error::ObjectError;
use crate::format::{Context, FormatId, Reader, Writer};
use crate::types::{Entries, Kind, Number, Value};

/// Bytes of the prefix the probe inspects.
const PROBE_WINDOW: usize = 5;

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReader;

impl Reader for JsonReader {
    fn probe(&self, prefix: &[u8]) -> u32 {
        let mut graphic = false;
        for &b in prefix.iter().take(PROBE_WINDOW) {
            match b {
                b'{' | b'[' => return 50,
                b' ' | b'\t' | b'\r' | b'\n' => {}
                _ if b.is_ascii_graphic() => graphic = true,
                _ => return 0,
            }
        }
        if graphic { 10 } else { 0 }
    }

    fn read(&self, data: &[u8], cx: Context<'_>) -> Result<Value, ObjectError> {
        let json: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| ObjectError::Malformed(format!("invalid json: {e}")))?;
        from_json(&json, 0, cx.config.depth_limit())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonWriter;

impl Writer for JsonWriter {
    fn write(&self, buf: &mut BytesMut, value: &Value, cx: Context<'_>) -> Result<usize, ObjectError> {
        let json = to_json(value, 0, cx.config.depth_limit())?;
        let start = buf.len();
        serde_json::to_writer(buf.writer(), &json)
            .map_err(|e| ObjectError::Invariant(format!("json serialization failed: {e}")))?;
        Ok(buf.len() - start)
    }
}

fn check_depth(depth: usize, limit: usize) -> Result<(), ObjectError> {
    if depth > limit {
        return Err(ObjectError::ResourceExhausted(format!(
            "nesting deeper than {limit}"
        )));
    }
    Ok(())
}

fn from_json(json: &serde_json::Value, depth: usize, limit: usize) -> Result<Value, ObjectError> {
    Ok(match json {
        serde_json::Value::Null => Value::null(),
        serde_json::Value::Bool(b) => Value::boolean(*b),
        serde_json::Value::Number(n) => {
            let number = if let Some(v) = n.as_u64() {
                Number::U64(v)
            } else if let Some(v) = n.as_i64() {
                Number::I64(v)
            } else {
                Number::F64(n.as_f64().unwrap_or_default())
            };
            Value::number(number)
        }
        serde_json::Value::String(s) => Value::string(s.clone()),
        serde_json::Value::Array(items) => {
            check_depth(depth + 1, limit)?;
            let items = items
                .iter()
                .map(|item| from_json(item, depth + 1, limit))
                .collect::<Result<Vec<_>, _>>()?;
            Value::array_from(items)
        }
        serde_json::Value::Object(map) => {
            check_depth(depth + 1, limit)?;
            let mut entries = Entries::with_capacity(map.len());
            for (k, v) in map {
                entries.insert(k.clone(), from_json(v, depth + 1, limit)?);
            }
            Value::dictionary_from(entries)
        }
    })
}

fn to_json(value: &Value, depth: usize, limit: usize) -> Result<serde_json::Value, ObjectError> {
    let unsupported = |kind| ObjectError::UnsupportedKind {
        format: FormatId::Json,
        kind,
    };
    Ok(match value.kind() {
        Kind::Null => serde_json::Value::Null,
        Kind::Boolean => serde_json::Value::Bool(value.as_bool().unwrap_or_default()),
        Kind::Number => match value.as_number() {
            Some(Number::F32(v)) => serde_json::Value::from(f64::from(v)),
            Some(Number::F64(v)) => serde_json::Value::from(v),
            Some(n) => match n.as_u64() {
                Some(u) => serde_json::Value::from(u),
                None => serde_json::Value::from(n.as_i64().unwrap_or_default()),
            },
            None => serde_json::Value::Null,
        },
        Kind::String => serde_json::Value::String(value.as_string().unwrap_or_default()),
        Kind::Array => {
            check_depth(depth + 1, limit)?;
            let items = value
                .items()
                .unwrap_or_default()
                .iter()
                .map(|item| to_json(item, depth + 1, limit))
                .collect::<Result<Vec<_>, _>>()?;
            serde_json::Value::Array(items)
        }
        Kind::Dictionary => {
            check_depth(depth + 1, limit)?;
            let mut map = Map::new();
            for (k, v) in value.entries().unwrap_or_default() {
                map.insert(k, to_json(&v, depth + 1, limit)?);
            }
            serde_json::Value::Object(map)
        }
        kind @ (Kind::Data | Kind::Date | Kind::User(_)) => return Err(unsupported(kind)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodecConfig;
    use crate::format::Hooks;

    fn read(data: &[u8]) -> Result<Value, ObjectError> {
        let config = CodecConfig::default();
        let hooks = Hooks::default();
        JsonReader.read(data, Context { config: &config, hooks: &hooks })
    }

    fn write(value: &Value) -> Result<String, ObjectError> {
        let config = CodecConfig::default();
        let hooks = Hooks::default();
        let mut buf = BytesMut::new();
        JsonWriter.write(&mut buf, value, Context { config: &config, hooks: &hooks })?;
        Ok(String::from_utf8(buf.to_vec()).unwrap())
    }

    #[test]
    fn probe_scores() {
        assert_eq!(JsonReader.probe(b"{\"a\":1}"), 50);
        assert_eq!(JsonReader.probe(b"  [1]"), 50);
        assert_eq!(JsonReader.probe(b"true"), 10);
        assert_eq!(JsonReader.probe(b"bplist00"), 10);
        assert_eq!(JsonReader.probe(b"\x00\x01{"), 0);
        assert_eq!(JsonReader.probe(b""), 0);
    }

    #[test]
    fn read_document() {
        let value = read(br#"{"n": -3, "f": 0.5, "s": "x", "a": [null, true, 18446744073709551615]}"#)
            .unwrap();
        assert_eq!(value.get("n").and_then(|v| v.as_number()), Some(Number::I64(-3)));
        assert_eq!(value.get("f").and_then(|v| v.as_number()), Some(Number::F64(0.5)));
        assert_eq!(value.get("s"), Some(Value::from("x")));
        let a = value.get("a").unwrap();
        assert_eq!(a.at(1), Some(Value::from(true)));
        assert_eq!(a.at(2).and_then(|v| v.as_number()), Some(Number::U64(u64::MAX)));
    }

    #[test]
    fn keys_keep_document_order() {
        let value = read(br#"{"z": 1, "a": 2}"#).unwrap();
        let keys: Vec<String> = value.entries().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["z", "a"]);
    }

    #[test]
    fn write_document() {
        let value: Value = [
            ("a", Value::array_from(vec![Value::from(1u8), Value::from(-2i16)])),
            ("b", Value::null()),
        ]
        .into_iter()
        .collect();
        assert_eq!(write(&value).unwrap(), r#"{"a":[1,-2],"b":null}"#);
    }

    #[test]
    fn unsupported_kinds() {
        for value in [Value::date(0), Value::data(vec![1])] {
            let err = write(&Value::array_from(vec![value])).unwrap_err();
            assert!(matches!(err, ObjectError::UnsupportedKind { format: FormatId::Json, .. }));
        }
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(read(b"{\"a\":").unwrap_err().is_malformed());
    }
}
