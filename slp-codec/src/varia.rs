//! Length-prefixed variable strings and metadata bags
//!
//! The tail of a smartbridge is a run of `<u8 length><utf-8 bytes>` items.
//! Named operations read a known key sequence; metadata travels as a flat
//! `[k1, v1, k2, v2, ...]` run packed shortest-pair first so chunking fills
//! bridges densely.

use std::collections::BTreeMap;

use crate::CodecError;

/// Packs strings as `<u8 len><bytes>` runs.
pub fn pack_varia<S: AsRef<str>>(values: &[S]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    for value in values {
        let bytes = value.as_ref().as_bytes();
        let len = u8::try_from(bytes.len()).map_err(|_| CodecError::VariaTooLong)?;
        out.push(len);
        out.extend_from_slice(bytes);
    }
    Ok(out)
}

/// Reads exactly `count` length-prefixed strings.
pub fn unpack_varia(data: &[u8], count: usize) -> Result<Vec<String>, CodecError> {
    let mut out = Vec::with_capacity(count);
    let mut cursor = data;
    for _ in 0..count {
        let (value, rest) = take_one(cursor)?;
        out.push(value);
        cursor = rest;
    }
    Ok(out)
}

/// Packs a metadata bag, shortest `key+value` pairs first.
pub fn pack_meta(bag: &BTreeMap<String, String>) -> Result<Vec<u8>, CodecError> {
    let mut pairs: Vec<(&String, &String)> = bag.iter().collect();
    pairs.sort_by_key(|(k, v)| k.len() + v.len());
    let mut out = Vec::new();
    for (key, value) in pairs {
        out.extend_from_slice(&pack_varia(&[key.as_str(), value.as_str()])?);
    }
    Ok(out)
}

/// Unpacks a flat metadata run back into a sorted bag. A dangling key with
/// no value is dropped, matching the forgiving wire readers of the protocol.
pub fn unpack_meta(data: &[u8]) -> Result<BTreeMap<String, String>, CodecError> {
    let mut items = Vec::new();
    let mut cursor = data;
    while !cursor.is_empty() {
        let (value, rest) = take_one(cursor)?;
        items.push(value);
        cursor = rest;
    }
    let mut bag = BTreeMap::new();
    let mut iter = items.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        bag.insert(key, value);
    }
    Ok(bag)
}

fn take_one(data: &[u8]) -> Result<(String, &[u8]), CodecError> {
    let (&len, rest) = data.split_first().ok_or(CodecError::VariaOverrun)?;
    let len = len as usize;
    if rest.len() < len {
        return Err(CodecError::VariaOverrun);
    }
    let (bytes, rest) = rest.split_at(len);
    let value = String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::VariaOverrun)?;
    Ok((value, rest))
}
