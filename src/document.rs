//! The typed, length-prefixed binary document codec (C1).
//!
//! Mirrors the wire shape the original crawler/inspector exchanged via its
//! own `bson.h`: a 4-byte little-endian total length (including itself),
//! a sequence of `tag | key\0 | value` records, and a `0x00` terminator.

use byteorder::{ByteOrder, LittleEndian};
use std::io::Read;

use crate::error::EngineError;

const TAG_DOUBLE: u8 = 0x01;
const TAG_STRING: u8 = 0x02;
const TAG_DOCUMENT: u8 = 0x03;
const TAG_ARRAY: u8 = 0x04;
const TAG_BINARY: u8 = 0x05;
const TAG_BOOL: u8 = 0x08;
const TAG_INT32: u8 = 0x10;
const TAG_INT64: u8 = 0x12;
const TERMINATOR: u8 = 0x00;

/// Binary subtype byte; the engine only ever produces/consumes generic (`0x00`).
pub const BINARY_SUBTYPE_GENERIC: u8 = 0x00;

/// A decoded value. Order of variants follows the tag values in §4.1.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Double(f64),
    Str(String),
    Document(Document),
    Array(Vec<Value>),
    Binary(Vec<u8>),
    Bool(bool),
    Int32(i32),
    Int64(i64),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }
}

/// An ordered sequence of key/value pairs. Keys are not required to be
/// unique and lookups take the first match, matching the source's
/// linear `strcmp` scans.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: Vec<(String, Value)>,
}

impl Document {
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Interprets this document as an array: values keyed by ascending
    /// ASCII decimal indices ("0", "1", ...), order preserved.
    pub fn into_array_values(self) -> Vec<Value> {
        self.fields.into_iter().map(|(_, v)| v).collect()
    }

    /// Encodes this document to its on-wire byte representation.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for (key, value) in &self.fields {
            encode_record(&mut body, key, value);
        }
        body.push(TERMINATOR);

        let total_len = (body.len() + 4) as u32;
        let mut out = Vec::with_capacity(body.len() + 4);
        out.extend_from_slice(&total_len.to_le_bytes());
        out.extend_from_slice(&body);
        out
    }
}

fn encode_record(out: &mut Vec<u8>, key: &str, value: &Value) {
    match value {
        Value::Double(v) => {
            out.push(TAG_DOUBLE);
            push_cstr(out, key);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Value::Str(s) => {
            out.push(TAG_STRING);
            push_cstr(out, key);
            let len = (s.len() + 1) as u32;
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(s.as_bytes());
            out.push(TERMINATOR);
        }
        Value::Document(doc) => {
            out.push(TAG_DOCUMENT);
            push_cstr(out, key);
            out.extend_from_slice(&doc.encode());
        }
        Value::Array(values) => {
            out.push(TAG_ARRAY);
            push_cstr(out, key);
            let fields = values
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect();
            out.extend_from_slice(&Document::new(fields).encode());
        }
        Value::Binary(bytes) => {
            out.push(TAG_BINARY);
            push_cstr(out, key);
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.push(BINARY_SUBTYPE_GENERIC);
            out.extend_from_slice(bytes);
        }
        Value::Bool(b) => {
            out.push(TAG_BOOL);
            push_cstr(out, key);
            out.push(if *b { 1 } else { 0 });
        }
        Value::Int32(v) => {
            out.push(TAG_INT32);
            push_cstr(out, key);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Value::Int64(v) => {
            out.push(TAG_INT64);
            push_cstr(out, key);
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
}

fn push_cstr(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(TERMINATOR);
}

/// Reads one document from `r`. Returns `Ok(None)` on a clean EOF before any
/// bytes of the next document are read (no more documents in the stream).
pub fn read_document<R: Read>(r: &mut R) -> Result<Option<Document>, EngineError> {
    let mut len_bytes = [0u8; 4];
    let mut filled = 0;
    while filled < 4 {
        let n = r.read(&mut len_bytes[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(EngineError::corrupt(
                "eof inside document length prefix",
                0,
            ));
        }
        filled += n;
    }
    let total_len = LittleEndian::read_u32(&len_bytes) as usize;
    if total_len < 5 {
        return Err(EngineError::corrupt(
            format!("document length {} too small", total_len),
            0,
        ));
    }
    let mut body = vec![0u8; total_len - 4];
    r.read_exact(&mut body)
        .map_err(|_| EngineError::corrupt("eof inside document body", 4))?;

    let mut full = Vec::with_capacity(total_len);
    full.extend_from_slice(&len_bytes);
    full.extend_from_slice(&body);

    decode_document(&full, 0).map(Some)
}

/// Decodes one complete document (length prefix through terminator) from
/// `buf`, which must contain exactly the document's bytes. `base_offset` is
/// used only to make [`EngineError::IndexCorrupt`] offsets meaningful.
pub fn decode_document(buf: &[u8], base_offset: u64) -> Result<Document, EngineError> {
    if buf.len() < 5 {
        return Err(EngineError::corrupt("document too short", base_offset));
    }
    let total_len = LittleEndian::read_u32(&buf[0..4]) as usize;
    if total_len != buf.len() {
        return Err(EngineError::corrupt(
            format!(
                "document length field {} does not match buffer of {} bytes",
                total_len,
                buf.len()
            ),
            base_offset,
        ));
    }

    let mut cursor = Cursor {
        buf: &buf[4..buf.len() - 1],
        pos: 0,
        base_offset: base_offset + 4,
    };
    let mut fields = Vec::new();
    loop {
        if cursor.pos >= cursor.buf.len() {
            break;
        }
        let tag = cursor.read_u8()?;
        let key = cursor.read_cstr()?;
        let value = decode_value(&mut cursor, tag)?;
        fields.push((key, value));
    }

    if buf[buf.len() - 1] != TERMINATOR {
        return Err(EngineError::corrupt(
            "document missing terminator byte",
            base_offset + buf.len() as u64 - 1,
        ));
    }

    Ok(Document::new(fields))
}

fn decode_value(cursor: &mut Cursor, tag: u8) -> Result<Value, EngineError> {
    match tag {
        TAG_DOUBLE => Ok(Value::Double(f64::from_le_bytes(
            cursor.read_bytes(8)?.try_into().unwrap(),
        ))),
        TAG_STRING => {
            let len = cursor.read_u32()? as usize;
            if len == 0 {
                return Err(cursor.error("string length may not be zero"));
            }
            let bytes = cursor.read_bytes(len - 1)?;
            let terminator = cursor.read_u8()?;
            if terminator != TERMINATOR {
                return Err(cursor.error("string missing terminator byte"));
            }
            let s = std::str::from_utf8(bytes)
                .map_err(|_| cursor.error("string is not valid utf-8"))?
                .to_string();
            Ok(Value::Str(s))
        }
        TAG_DOCUMENT => {
            let sub = cursor.read_sub_document()?;
            Ok(Value::Document(sub))
        }
        TAG_ARRAY => {
            let sub = cursor.read_sub_document()?;
            Ok(Value::Array(sub.into_array_values()))
        }
        TAG_BINARY => {
            let len = cursor.read_u32()? as usize;
            let _subtype = cursor.read_u8()?;
            let bytes = cursor.read_bytes(len)?.to_vec();
            Ok(Value::Binary(bytes))
        }
        TAG_BOOL => {
            let b = cursor.read_u8()?;
            Ok(Value::Bool(b != 0))
        }
        TAG_INT32 => Ok(Value::Int32(LittleEndian::read_i32(
            cursor.read_bytes(4)?,
        ))),
        TAG_INT64 => Ok(Value::Int64(LittleEndian::read_i64(
            cursor.read_bytes(8)?,
        ))),
        other => Err(cursor.error(format!("unknown type tag {:#04x}", other))),
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    base_offset: u64,
}

impl<'a> Cursor<'a> {
    fn error(&self, reason: impl Into<String>) -> EngineError {
        EngineError::corrupt(reason, self.base_offset + self.pos as u64)
    }

    fn read_u8(&mut self) -> Result<u8, EngineError> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| self.error("unexpected end of document"))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_u32(&mut self) -> Result<u32, EngineError> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], EngineError> {
        if self.pos + n > self.buf.len() {
            return Err(self.error("unexpected end of document"));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_cstr(&mut self) -> Result<String, EngineError> {
        let start = self.pos;
        while self
            .buf
            .get(self.pos)
            .ok_or_else(|| self.error("unterminated key"))?
            != &TERMINATOR
        {
            self.pos += 1;
        }
        let key = std::str::from_utf8(&self.buf[start..self.pos])
            .map_err(|_| self.error("key is not valid utf-8"))?
            .to_string();
        self.pos += 1; // consume terminator
        Ok(key)
    }

    /// Reads an embedded document: a 4-byte self-describing length followed
    /// by that many bytes total (length field included).
    fn read_sub_document(&mut self) -> Result<Document, EngineError> {
        if self.pos + 4 > self.buf.len() {
            return Err(self.error("truncated embedded document length"));
        }
        let total_len = LittleEndian::read_u32(&self.buf[self.pos..self.pos + 4]) as usize;
        if total_len < 5 || self.pos + total_len > self.buf.len() {
            return Err(self.error("embedded document length out of range"));
        }
        let sub_buf = &self.buf[self.pos..self.pos + total_len];
        let sub_offset = self.base_offset + self.pos as u64;
        self.pos += total_len;
        decode_document(sub_buf, sub_offset)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor as IoCursor;

    #[test]
    fn scalar_roundtrip() {
        let doc = Document::new(vec![
            ("a".to_string(), Value::Int32(7)),
            ("b".to_string(), Value::Int64(-9)),
            ("c".to_string(), Value::Str("hi".to_string())),
            ("d".to_string(), Value::Bool(true)),
        ]);
        let bytes = doc.encode();
        let decoded = decode_document(&bytes, 0).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn binary_roundtrip() {
        let doc = Document::new(vec![(
            "blob".to_string(),
            Value::Binary(vec![1, 2, 3, 4]),
        )]);
        let bytes = doc.encode();
        let decoded = decode_document(&bytes, 0).unwrap();
        assert_eq!(decoded.get("blob").unwrap().as_binary().unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn nested_document_roundtrip() {
        let inner = Document::new(vec![("x".to_string(), Value::Int32(1))]);
        let doc = Document::new(vec![("inner".to_string(), Value::Document(inner))]);
        let bytes = doc.encode();
        let decoded = decode_document(&bytes, 0).unwrap();
        let inner_decoded = decoded.get("inner").unwrap().as_document().unwrap();
        assert_eq!(inner_decoded.get("x").unwrap().as_i32().unwrap(), 1);
    }

    #[test]
    fn array_roundtrip() {
        let doc = Document::new(vec![(
            "sectors".to_string(),
            Value::Array(vec![Value::Int32(10), Value::Int32(20), Value::Int32(30)]),
        )]);
        let bytes = doc.encode();
        let decoded = decode_document(&bytes, 0).unwrap();
        match decoded.get("sectors").unwrap() {
            Value::Array(vals) => {
                assert_eq!(vals.len(), 3);
                assert_eq!(vals[1].as_i32().unwrap(), 20);
            }
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn read_document_from_stream() {
        let doc = Document::new(vec![("k".to_string(), Value::Int32(5))]);
        let bytes = doc.encode();
        let mut r = IoCursor::new(bytes);
        let decoded = read_document(&mut r).unwrap().unwrap();
        assert_eq!(decoded.get("k").unwrap().as_i32().unwrap(), 5);
        assert!(read_document(&mut r).unwrap().is_none());
    }

    #[test]
    fn truncated_body_is_corrupt() {
        let doc = Document::new(vec![("k".to_string(), Value::Int32(5))]);
        let mut bytes = doc.encode();
        bytes.truncate(bytes.len() - 2);
        let mut r = IoCursor::new(bytes);
        assert!(read_document(&mut r).is_err());
    }
}
