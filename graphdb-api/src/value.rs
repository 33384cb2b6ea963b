use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::cmp::Ordering;

/// A self-describing, tagged property value.
///
/// Equality and ordering are only meaningful within a single variant;
/// comparing across variants is a `TypeError`, never a panic.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Nanoseconds since the Unix epoch.
    Timestamp(i64),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    /// Keeps insertion order (an `IndexMap`, not a `BTreeMap`) so §4.1's
    /// "(STRING key + value)* in insertion order" MAP encoding round-trips
    /// the order callers built it in, not sorted-key order.
    Map(IndexMap<String, Value>),
}

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STRING: u8 = 4;
const TAG_TIMESTAMP: u8 = 5;
const TAG_BYTES: u8 = 6;
const TAG_LIST: u8 = 7;
const TAG_MAP: u8 = 8;

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(Error::TypeError {
                expected: "bool",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(Error::TypeError {
                expected: "int",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            other => Err(Error::TypeError {
                expected: "float",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s.as_str()),
            other => Err(Error::TypeError {
                expected: "string",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_timestamp(&self) -> Result<i64> {
        match self {
            Value::Timestamp(ts) => Ok(*ts),
            other => Err(Error::TypeError {
                expected: "timestamp",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Value::Bytes(b) => Ok(b.as_slice()),
            other => Err(Error::TypeError {
                expected: "bytes",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_list(&self) -> Result<&[Value]> {
        match self {
            Value::List(items) => Ok(items.as_slice()),
            other => Err(Error::TypeError {
                expected: "list",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_map(&self) -> Result<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Ok(m),
            other => Err(Error::TypeError {
                expected: "map",
                found: other.type_name(),
            }),
        }
    }

    /// Orders two values of the same variant. Cross-type comparisons fail
    /// with `TypeError` rather than defining an arbitrary tag ordering.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Ok(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => {
                Ok(a.partial_cmp(b).unwrap_or(Ordering::Equal))
            }
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Ok(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Ok(a.cmp(b)),
            _ => Err(Error::TypeError {
                expected: self.type_name(),
                found: other.type_name(),
            }),
        }
    }

    /// Encodes this value using its binary layout: a tag byte
    /// followed by a type-specific payload. The codec is a bijection on
    /// valid inputs.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    /// Appends this value's encoding to `out`, for callers building up a
    /// larger framed record (e.g. the WAL) that embed values inline.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Value::Null => out.push(TAG_NULL),
            Value::Bool(b) => {
                out.push(TAG_BOOL);
                out.push(u8::from(*b));
            }
            Value::Int(i) => {
                out.push(TAG_INT);
                out.extend_from_slice(&i.to_be_bytes());
            }
            Value::Float(f) => {
                out.push(TAG_FLOAT);
                out.extend_from_slice(&f.to_be_bytes());
            }
            Value::String(s) => {
                out.push(TAG_STRING);
                encode_bytes(out, s.as_bytes());
            }
            Value::Timestamp(ts) => {
                out.push(TAG_TIMESTAMP);
                out.extend_from_slice(&ts.to_be_bytes());
            }
            Value::Bytes(b) => {
                out.push(TAG_BYTES);
                encode_bytes(out, b);
            }
            Value::List(items) => {
                out.push(TAG_LIST);
                out.extend_from_slice(&(items.len() as u32).to_be_bytes());
                for item in items {
                    item.encode_into(out);
                }
            }
            Value::Map(map) => {
                out.push(TAG_MAP);
                out.extend_from_slice(&(map.len() as u32).to_be_bytes());
                for (k, v) in map {
                    encode_bytes(out, k.as_bytes());
                    v.encode_into(out);
                }
            }
        }
    }

    /// Decodes a value previously produced by [`Value::encode`]. Unknown
    /// tags are rejected with `CorruptFormat` rather than panicking.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (value, consumed) = Self::decode_at(bytes)?;
        if consumed != bytes.len() {
            return Err(Error::corrupt_format("trailing bytes after value"));
        }
        Ok(value)
    }

    /// Decodes a value from the start of `bytes`, returning it along with
    /// how many bytes it consumed. Unlike [`Value::decode`], trailing bytes
    /// are allowed — used by callers embedding a value inline in a larger
    /// framed record (e.g. the WAL).
    pub fn decode_prefix(bytes: &[u8]) -> Result<(Self, usize)> {
        Self::decode_at(bytes)
    }

    fn decode_at(bytes: &[u8]) -> Result<(Self, usize)> {
        let tag = *bytes
            .first()
            .ok_or_else(|| Error::corrupt_format("empty value buffer"))?;
        let payload = &bytes[1..];
        match tag {
            TAG_NULL => Ok((Value::Null, 1)),
            TAG_BOOL => {
                let b = *payload
                    .first()
                    .ok_or_else(|| Error::corrupt_format("truncated bool"))?;
                Ok((Value::Bool(b != 0), 2))
            }
            TAG_INT => {
                let bytes8 = read_exact::<8>(payload, "int")?;
                Ok((Value::Int(i64::from_be_bytes(bytes8)), 9))
            }
            TAG_FLOAT => {
                let bytes8 = read_exact::<8>(payload, "float")?;
                Ok((Value::Float(f64::from_be_bytes(bytes8)), 9))
            }
            TAG_STRING => {
                let (raw, consumed) = decode_bytes(payload)?;
                let s = String::from_utf8(raw)
                    .map_err(|_| Error::corrupt_format("invalid utf-8 in string"))?;
                Ok((Value::String(s), 1 + consumed))
            }
            TAG_TIMESTAMP => {
                let bytes8 = read_exact::<8>(payload, "timestamp")?;
                Ok((Value::Timestamp(i64::from_be_bytes(bytes8)), 9))
            }
            TAG_BYTES => {
                let (raw, consumed) = decode_bytes(payload)?;
                Ok((Value::Bytes(raw), 1 + consumed))
            }
            TAG_LIST => {
                let count = read_u32(payload, "list count")? as usize;
                let mut pos = 4;
                let mut items = Vec::with_capacity(count.min(1 << 16));
                for _ in 0..count {
                    let (item, consumed) = Self::decode_at(&payload[pos..])?;
                    items.push(item);
                    pos += consumed;
                }
                Ok((Value::List(items), 1 + pos))
            }
            TAG_MAP => {
                let count = read_u32(payload, "map count")? as usize;
                let mut pos = 4;
                let mut map = IndexMap::new();
                for _ in 0..count {
                    let (key_bytes, key_consumed) = decode_bytes(&payload[pos..])?;
                    pos += key_consumed;
                    let key = String::from_utf8(key_bytes)
                        .map_err(|_| Error::corrupt_format("invalid utf-8 in map key"))?;
                    let (value, value_consumed) = Self::decode_at(&payload[pos..])?;
                    pos += value_consumed;
                    map.insert(key, value);
                }
                Ok((Value::Map(map), 1 + pos))
            }
            other => Err(Error::corrupt_format(format!("unknown value tag {other}"))),
        }
    }
}

fn encode_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn decode_bytes(payload: &[u8]) -> Result<(Vec<u8>, usize)> {
    let len = read_u32(payload, "length prefix")? as usize;
    if payload.len() < 4 + len {
        return Err(Error::corrupt_format("truncated length-prefixed bytes"));
    }
    Ok((payload[4..4 + len].to_vec(), 4 + len))
}

fn read_u32(payload: &[u8], what: &str) -> Result<u32> {
    let bytes4 = read_exact::<4>(payload, what)?;
    Ok(u32::from_be_bytes(bytes4))
}

fn read_exact<const N: usize>(payload: &[u8], what: &str) -> Result<[u8; N]> {
    if payload.len() < N {
        return Err(Error::corrupt_format(format!("truncated {what}")));
    }
    let mut buf = [0u8; N];
    buf.copy_from_slice(&payload[..N]);
    Ok(buf)
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: Value) {
        let encoded = v.encode();
        let decoded = Value::decode(&encoded).unwrap();
        assert_eq!(v, decoded);
    }

    #[test]
    fn roundtrips_every_variant() {
        roundtrip(Value::Null);
        roundtrip(Value::Bool(true));
        roundtrip(Value::Int(-42));
        roundtrip(Value::Float(3.5));
        roundtrip(Value::String("hello graph".into()));
        roundtrip(Value::Timestamp(1_700_000_000_000_000_000));
        roundtrip(Value::Bytes(vec![1, 2, 3, 255]));
        roundtrip(Value::List(vec![Value::Int(1), Value::Bool(false)]));
        let mut map = IndexMap::new();
        map.insert("a".to_string(), Value::Int(1));
        map.insert("b".to_string(), Value::List(vec![Value::Null]));
        roundtrip(Value::Map(map));
    }

    #[test]
    fn map_encoding_preserves_insertion_order_not_sorted_order() {
        let mut map = IndexMap::new();
        map.insert("zebra".to_string(), Value::Int(1));
        map.insert("apple".to_string(), Value::Int(2));
        map.insert("mango".to_string(), Value::Int(3));
        let encoded = Value::Map(map.clone()).encode();
        let decoded = Value::decode(&encoded).unwrap();
        let decoded_map = decoded.as_map().unwrap();
        let keys: Vec<&str> = decoded_map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zebra", "apple", "mango"]);
        assert_eq!(*decoded_map, map);
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        let err = Value::decode(&[255]).unwrap_err();
        assert!(matches!(err, Error::CorruptFormat { .. }));
    }

    #[test]
    fn cross_type_compare_is_type_error() {
        let err = Value::Int(1).compare(&Value::String("1".into())).unwrap_err();
        assert!(matches!(err, Error::TypeError { .. }));
    }

    #[test]
    fn typed_accessor_mismatch_is_type_error() {
        let err = Value::Bool(true).as_int().unwrap_err();
        assert!(matches!(err, Error::TypeError { .. }));
    }
}
