//! Small binary encoding primitives shared by the WAL and the snapshot
//! writer: length-prefixed strings and lists, and a `Value`-aware property
//! map encoding. Kept separate from `wal.rs` so `snapshot.rs` can reuse the
//! exact same record shapes without duplicating them.

use graphdb_api::{Error, Result, Value};
use std::collections::BTreeMap;

pub(crate) fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn write_string(out: &mut Vec<u8>, s: &str) {
    write_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

pub(crate) fn write_strings(out: &mut Vec<u8>, items: &[String]) {
    write_u32(out, items.len() as u32);
    for s in items {
        write_string(out, s);
    }
}

pub(crate) fn write_properties(out: &mut Vec<u8>, properties: &BTreeMap<String, Value>) {
    write_u32(out, properties.len() as u32);
    for (key, value) in properties {
        write_string(out, key);
        value.encode_into(out);
    }
}

pub(crate) struct Cursor<'a> {
    buf: &'a [u8],
    pub(crate) pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(Error::corrupt_format("record body truncated"));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub(crate) fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub(crate) fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::corrupt_format("invalid utf-8 in string"))
    }

    pub(crate) fn read_strings(&mut self) -> Result<Vec<String>> {
        let count = self.read_u32()?;
        let mut out = Vec::with_capacity(count as usize);
        for _ in 0..count {
            out.push(self.read_string()?);
        }
        Ok(out)
    }

    pub(crate) fn read_value(&mut self) -> Result<Value> {
        let (value, used) = Value::decode_prefix(&self.buf[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    pub(crate) fn read_properties(&mut self) -> Result<BTreeMap<String, Value>> {
        let count = self.read_u32()?;
        let mut out = BTreeMap::new();
        for _ in 0..count {
            let key = self.read_string()?;
            let value = self.read_value()?;
            out.insert(key, value);
        }
        Ok(out)
    }

    pub(crate) fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}
