use serde::{Deserialize, Serialize};

use crate::codec::text::{latin1_decode, latin1_encode};
use crate::cursor::{Cursor, Writer};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::fourcc::FourCC;

/// Size of the fixed tag header.
pub const TAG_HEADER_SIZE: usize = 64;

/// Byte offset of the checksum field inside the tag header.
pub const CHECKSUM_OFFSET: usize = 40;

const NAME_LEN: usize = 32;

/// The fixed 64-byte record at the start of every tag file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagHeader {
    pub unk1: i16,
    pub flags: i8,
    pub tag_type: i8,
    pub name: String,
    pub group: FourCC,
    pub checksum: u32,
    pub data_offset: i32,
    pub data_length: i32,
    pub unk2: i32,
    pub version: i16,
    pub destination: i8,
    pub plugin_handle: i8,
    pub engine: Engine,
}

impl TagHeader {
    /// A fresh header for a new tag of `group`.
    pub fn new(group: FourCC, version: i16, engine: Engine) -> Self {
        Self {
            unk1: 0,
            flags: 0,
            tag_type: 0,
            name: String::new(),
            group,
            checksum: 0,
            data_offset: TAG_HEADER_SIZE as i32,
            data_length: 0,
            unk2: 0,
            version,
            destination: 0,
            plugin_handle: -1,
            engine,
        }
    }

    /// Parse the header from the start of a tag file.
    ///
    /// The engine marker is read first since it decides the byte order of
    /// every other field.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < TAG_HEADER_SIZE {
            return Err(Error::TruncatedHeader {
                need: TAG_HEADER_SIZE,
                have: data.len(),
            });
        }
        let mut marker = [0u8; 4];
        marker.copy_from_slice(&data[60..64]);
        let engine = Engine::detect(marker)?;
        let e = engine.endian();

        let mut c = Cursor::new(&data[..TAG_HEADER_SIZE]);
        let unk1 = c.read_i16(e)?;
        let flags = c.read_i8()?;
        let tag_type = c.read_i8()?;
        let name = latin1_decode(c.read_bytes(NAME_LEN)?);
        let group = FourCC(c.read_fourcc(e)?);
        let checksum = c.read_u32(engine.checksum_endian())?;
        let data_offset = c.read_i32(e)?;
        let data_length = c.read_i32(e)?;
        let unk2 = c.read_i32(e)?;
        let version = c.read_i16(e)?;
        let destination = c.read_i8()?;
        let plugin_handle = c.read_i8()?;

        Ok(Self {
            unk1,
            flags,
            tag_type,
            name,
            group,
            checksum,
            data_offset,
            data_length,
            unk2,
            version,
            destination,
            plugin_handle,
            engine,
        })
    }

    /// Emit the header for `engine`, overriding the stored engine marker.
    pub fn write(&self, w: &mut Writer, engine: Engine) {
        let e = engine.endian();
        w.write_i16(self.unk1, e);
        w.write_i8(self.flags);
        w.write_i8(self.tag_type);
        let mut name = latin1_encode(&self.name);
        name.resize(NAME_LEN, 0);
        w.write_bytes(&name);
        w.write_fourcc(self.group.0, e);
        w.write_u32(self.checksum, engine.checksum_endian());
        w.write_i32(self.data_offset, e);
        w.write_i32(self.data_length, e);
        w.write_i32(self.unk2, e);
        w.write_i16(self.version, e);
        w.write_i8(self.destination);
        w.write_i8(self.plugin_handle);
        w.write_fourcc(engine.marker(), e);
    }
}

/// Header preceding every block region (and, in some generations, structs).
///
/// A negative `size` means the element size is unknown; writers recompute it
/// from the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub name: FourCC,
    pub version: i32,
    pub count: i32,
    pub size: i32,
}

impl BlockHeader {
    /// Read a block header in `engine`'s shape.
    ///
    /// The 12-byte shape has no count; `count` is then the caller's inline count.
    pub fn read(c: &mut Cursor<'_>, engine: Engine, count: i32) -> Result<Self> {
        let e = engine.endian();
        let name = FourCC(c.read_fourcc(e)?);
        if engine.block_header_has_count() {
            let version = c.read_i32(e)?;
            let count = c.read_i32(e)?;
            let size = c.read_i32(e)?;
            Ok(Self {
                name,
                version,
                count,
                size,
            })
        } else {
            let version = c.read_i16(e)? as i32;
            let _unused = c.read_i16(e)?;
            let size = c.read_i32(e)?;
            Ok(Self {
                name,
                version,
                count,
                size,
            })
        }
    }

    /// Write in `engine`'s shape. Engines without block headers write nothing.
    pub fn write(&self, w: &mut Writer, engine: Engine) {
        let e = engine.endian();
        match engine.block_header_size() {
            None => {}
            Some(16) => {
                w.write_fourcc(self.name.0, e);
                w.write_i32(self.version, e);
                w.write_i32(self.count, e);
                w.write_i32(self.size, e);
            }
            Some(_) => {
                w.write_fourcc(self.name.0, e);
                w.write_i16(self.version as i16, e);
                w.write_i16(0, e);
                w.write_i32(self.size, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Endian;

    fn sample(engine: Engine) -> TagHeader {
        let mut h = TagHeader::new(FourCC(*b"bitm"), 7, engine);
        h.name = "sample".into();
        h.checksum = 0x1234_5678;
        h.data_length = 99;
        h
    }

    #[test]
    fn header_is_64_bytes_and_roundtrips() {
        for engine in Engine::ALL {
            let h = sample(engine);
            let mut w = Writer::new();
            h.write(&mut w, engine);
            assert_eq!(w.position(), TAG_HEADER_SIZE);
            assert_eq!(TagHeader::parse(w.as_slice()).unwrap(), h);
        }
    }

    #[test]
    fn little_endian_header_reverses_codes() {
        let mut w = Writer::new();
        sample(Engine::Latest).write(&mut w, Engine::Latest);
        let bytes = w.as_slice();
        assert_eq!(&bytes[36..40], b"mtib");
        assert_eq!(&bytes[60..64], b"!MLB");
        assert_eq!(&bytes[40..44], &0x1234_5678u32.to_le_bytes());
    }

    #[test]
    fn legacy_header_layout() {
        let mut w = Writer::new();
        sample(Engine::Legacy).write(&mut w, Engine::Legacy);
        let bytes = w.as_slice();
        assert_eq!(&bytes[36..40], b"bitm");
        assert_eq!(&bytes[44..48], &64i32.to_be_bytes());
        assert_eq!(&bytes[56..58], &7i16.to_be_bytes());
        assert_eq!(&bytes[60..64], b"blam");
    }

    #[test]
    fn short_header_is_an_error() {
        assert!(matches!(
            TagHeader::parse(&[0u8; 10]),
            Err(Error::TruncatedHeader { need: 64, have: 10 })
        ));
    }

    #[test]
    fn block_header_shapes() {
        let h = BlockHeader {
            name: FourCC(*b"tbfd"),
            version: 2,
            count: 3,
            size: 40,
        };
        let mut w = Writer::new();
        h.write(&mut w, Engine::Latest);
        assert_eq!(w.position(), 16);
        let back = BlockHeader::read(&mut Cursor::new(w.as_slice()), Engine::Latest, 0).unwrap();
        assert_eq!(back, h);

        let mut w = Writer::new();
        h.write(&mut w, Engine::Lamb);
        assert_eq!(w.position(), 12);
        let back = BlockHeader::read(&mut Cursor::new(w.as_slice()), Engine::Lamb, 3).unwrap();
        assert_eq!(back, h);
        assert_eq!(Endian::Little, Engine::Lamb.endian());

        let mut w = Writer::new();
        h.write(&mut w, Engine::Legacy);
        assert_eq!(w.position(), 0);
    }
}
