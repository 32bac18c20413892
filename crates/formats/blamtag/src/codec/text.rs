//! Fixed strings plus the two-part kinds: string ids, tag references and data
//! blobs keep a small header inline and their payload in the parent stream.

use tracing::warn;

use crate::cursor::{Cursor, Writer};
use crate::engine::Endian;
use crate::error::Result;
use crate::fourcc::FourCC;
use crate::value::{TagData, TagRef, Value};

/// Decode bytes up to the first NUL, one char per byte.
pub(crate) fn latin1_decode(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    bytes[..end].iter().map(|&b| b as char).collect()
}

/// Inverse of [`latin1_decode`]; chars outside Latin-1 become `?`.
pub(crate) fn latin1_encode(s: &str) -> Vec<u8> {
    s.chars()
        .map(|ch| u8::try_from(ch as u32).unwrap_or(b'?'))
        .collect()
}

fn read_payload<'a>(stream: &mut Cursor<'a>, len: usize, what: &str) -> &'a [u8] {
    let bytes = stream.read_available(len);
    if bytes.len() < len {
        warn!(
            offset = stream.position(),
            need = len,
            have = bytes.len(),
            "{what} payload truncated"
        );
    }
    bytes
}

pub(super) fn decode_fixed(width: usize, c: &mut Cursor<'_>) -> Result<Value> {
    Ok(Value::String(latin1_decode(c.read_bytes(width)?)))
}

pub(super) fn encode_fixed(width: usize, value: Option<&Value>, w: &mut Writer) {
    let mut bytes = value.and_then(Value::as_str).map(latin1_encode).unwrap_or_default();
    bytes.resize(width, 0);
    w.write_bytes(&bytes);
}

pub(super) fn decode_string_id(e: Endian, inline: &mut Cursor<'_>, stream: &mut Cursor<'_>) -> Result<Value> {
    let len = inline.read_i32(e)?.max(0) as usize;
    let bytes = read_payload(stream, len, "string id");
    Ok(Value::String(bytes.iter().map(|&b| b as char).collect()))
}

pub(super) fn encode_string_id(e: Endian, value: Option<&Value>, inline: &mut Writer, stream: &mut Writer) {
    let bytes = value.and_then(Value::as_str).map(latin1_encode).unwrap_or_default();
    inline.write_i32(bytes.len() as i32, e);
    stream.write_bytes(&bytes);
}

pub(super) fn decode_tag_ref(e: Endian, inline: &mut Cursor<'_>, stream: &mut Cursor<'_>) -> Result<Value> {
    let group = FourCC(inline.read_fourcc(e)?);
    let pointer = inline.read_u32(e)?;
    let len = inline.read_i32(e)?.max(0) as usize;
    let index = inline.read_i32(e)?;
    let path = if len > 0 {
        let bytes = read_payload(stream, len + 1, "tag reference");
        latin1_decode(&bytes[..bytes.len().min(len)])
    } else {
        String::new()
    };
    Ok(Value::TagRef(TagRef {
        group,
        path,
        pointer,
        index,
    }))
}

pub(super) fn encode_tag_ref(e: Endian, value: Option<&Value>, inline: &mut Writer, stream: &mut Writer) {
    let null = TagRef::null();
    let r = value.and_then(Value::as_tag_ref).unwrap_or(&null);
    let path = latin1_encode(&r.path);
    inline.write_fourcc(r.group.0, e);
    inline.write_u32(r.pointer, e);
    inline.write_i32(path.len() as i32, e);
    inline.write_i32(r.index, e);
    if !path.is_empty() {
        stream.write_bytes(&path);
        stream.write_u8(0);
    }
}

pub(super) fn decode_data(e: Endian, inline: &mut Cursor<'_>, stream: &mut Cursor<'_>) -> Result<Value> {
    let size = inline.read_i32(e)?.max(0) as usize;
    let flags = inline.read_i32(e)?;
    let file_offset = inline.read_i32(e)?;
    let pointer = inline.read_u32(e)?;
    let unknown = inline.read_u32(e)?;
    let bytes = read_payload(stream, size, "data").to_vec();
    Ok(Value::Data(TagData {
        flags,
        file_offset,
        pointer,
        unknown,
        bytes,
    }))
}

pub(super) fn encode_data(e: Endian, value: Option<&Value>, inline: &mut Writer, stream: &mut Writer) {
    let empty = TagData::default();
    let data = match value {
        Some(Value::Data(d)) => d,
        _ => &empty,
    };
    inline.write_i32(data.bytes.len() as i32, e);
    inline.write_i32(data.flags, e);
    inline.write_i32(data.file_offset, e);
    inline.write_u32(data.pointer, e);
    inline.write_u32(data.unknown, e);
    stream.write_bytes(&data.bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_roundtrips_every_byte() {
        let bytes: Vec<u8> = (1..=255u8).collect();
        assert_eq!(latin1_encode(&latin1_decode(&bytes)), bytes);
    }

    #[test]
    fn fixed_string_is_nul_padded() {
        let mut w = Writer::new();
        encode_fixed(8, Some(&Value::String("abc".into())), &mut w);
        assert_eq!(w.as_slice(), b"abc\0\0\0\0\0");
    }

    #[test]
    fn fixed_string_fills_whole_width() {
        let mut w = Writer::new();
        encode_fixed(4, Some(&Value::String("abcdef".into())), &mut w);
        assert_eq!(w.as_slice(), b"abcd");
        let mut c = Cursor::new(w.as_slice());
        assert_eq!(decode_fixed(4, &mut c).unwrap(), Value::String("abcd".into()));
    }
}
