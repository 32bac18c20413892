//! Whole-file reader/writer: tag header, checksum and root body.

use std::path::Path;

use tracing::{debug, warn};

use crate::checksum::checksum;
use crate::codec::block::{read_root, write_root};
use crate::codec::{CodecContext, FieldCodec};
use crate::cursor::{Cursor, Writer};
use crate::engine::Engine;
use crate::error::Result;
use crate::fourcc::FourCC;
use crate::header::{TagHeader, TAG_HEADER_SIZE};
use crate::schema::{SchemaSet, TagGroup};
use crate::value::{Struct, TagRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Present angles in degrees rather than raw radians.
    pub angles_in_degrees: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            angles_in_degrees: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Target generation; `None` writes back to the generation the tag was read from.
    pub engine: Option<Engine>,
    /// Must match the [`ReadOptions`] the tree was produced with.
    pub angles_in_degrees: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            engine: None,
            angles_in_degrees: true,
        }
    }
}

impl WriteOptions {
    pub fn for_engine(engine: Engine) -> Self {
        Self {
            engine: Some(engine),
            ..Self::default()
        }
    }
}

/// One parsed tag file.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tag {
    pub header: TagHeader,
    pub root: Struct,
    /// Bytes after the root's out-of-line data.
    #[serde(default, with = "hex", skip_serializing_if = "Vec::is_empty")]
    pub trailing: Vec<u8>,
}

impl Tag {
    /// A new tag of `group` whose root holds every canonical field's default.
    pub fn new(group: &TagGroup, engine: Engine) -> Result<Self> {
        let layout = group.root.canonical()?;
        let mut root = Struct::new();
        for field in &layout.fields {
            root.fields.push((field.name.clone(), field.default_value()));
        }
        Ok(Self {
            header: TagHeader::new(group.group, group.header_version, engine),
            root,
            trailing: Vec::new(),
        })
    }

    pub fn group(&self) -> FourCC {
        self.header.group
    }

    pub fn engine(&self) -> Engine {
        self.header.engine
    }

    /// Parse a complete tag file.
    pub fn read(data: &[u8], schemas: &SchemaSet, opts: &ReadOptions) -> Result<Self> {
        let header = TagHeader::parse(data)?;
        let group = schemas.get(header.group)?;
        let ctx = CodecContext {
            engine: header.engine,
            angles_in_degrees: opts.angles_in_degrees,
            preserve_sizes: true,
        };

        let body = &data[TAG_HEADER_SIZE..];
        let computed = checksum(body);
        if computed != header.checksum {
            warn!(
                group = %header.group,
                stored = header.checksum,
                computed,
                "tag checksum mismatch"
            );
        }
        if header.data_length > 0 && header.data_length as usize != body.len() {
            warn!(
                group = %header.group,
                stored = header.data_length,
                actual = body.len(),
                "tag data length mismatch"
            );
        }

        let mut stream = Cursor::new(body);
        let root = read_root(&group.root, &ctx, &mut stream)?;
        let trailing = stream.rest().to_vec();
        if !trailing.is_empty() {
            debug!(group = %header.group, len = trailing.len(), "keeping trailing bytes");
        }
        Ok(Self {
            header,
            root,
            trailing,
        })
    }

    pub fn read_file(path: &Path, schemas: &SchemaSet, opts: &ReadOptions) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::read(&data, schemas, opts)
    }

    /// Emit the complete file, recomputing the checksum.
    ///
    /// Writing an unmodified tree back to its own generation reproduces the
    /// source bytes. Converting to another generation recomputes every
    /// element size and drops leftover and trailing bytes.
    pub fn write(&self, schemas: &SchemaSet, opts: &WriteOptions) -> Result<Vec<u8>> {
        let engine = opts.engine.unwrap_or(self.header.engine);
        let group = schemas.get(self.header.group)?;
        let same_engine = engine == self.header.engine;
        let ctx = CodecContext {
            engine,
            angles_in_degrees: opts.angles_in_degrees,
            preserve_sizes: same_engine,
        };

        let mut body = Writer::new();
        write_root(&group.root, &ctx, &self.root, &mut body)?;
        if same_engine {
            body.write_bytes(&self.trailing);
        }

        let mut header = self.header.clone();
        header.checksum = checksum(body.as_slice());
        header.engine = engine;
        // An unchanged body keeps whatever length was stored, zero included.
        let unchanged = same_engine && header.checksum == self.header.checksum;
        if !unchanged {
            if same_engine {
                debug!(
                    group = %header.group,
                    stored = self.header.checksum,
                    computed = header.checksum,
                    "checksum changed on write"
                );
            }
            header.data_length = body.position() as i32;
        }

        let mut out = Writer::with_capacity(TAG_HEADER_SIZE + body.position());
        header.write(&mut out, engine);
        out.write_bytes(body.as_slice());
        Ok(out.into_bytes())
    }

    pub fn write_file(&self, path: &Path, schemas: &SchemaSet, opts: &WriteOptions) -> Result<()> {
        let bytes = self.write(schemas, opts)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Every tag reference in the tree, depth first.
    pub fn tag_refs(&self) -> Vec<&TagRef> {
        let mut out = Vec::new();
        self.root.visit_tag_refs(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::descriptor::compile_json;
    use crate::value::{Block, Value};

    fn schemas() -> SchemaSet {
        let mut set = SchemaSet::new();
        set.insert(
            compile_json(
                r#"{ "group": "test", "name": "test", "extension": "test",
                     "layouts": [{ "version": 2, "latest": true, "fields": [
                        { "kind": "string", "name": "label" },
                        { "kind": "real", "name": "weight" },
                        { "kind": "tag_reference", "name": "next" },
                        { "kind": "block", "name": "items", "layouts": [
                            { "version": 0, "latest": true, "fields": [
                                { "kind": "short_integer", "name": "id" },
                                { "kind": "string_id", "name": "key" }
                            ]}
                        ]}
                     ]}] }"#,
            )
            .unwrap(),
        );
        set
    }

    fn sample(engine: Engine) -> Tag {
        let set = schemas();
        let mut tag = Tag::new(set.get(FourCC(*b"test")).unwrap(), engine).unwrap();
        tag.header.name = "sample".into();
        tag.root.set("label", Value::String("hello".into()));
        tag.root.set("weight", Value::Real(-0.0));
        tag.root.set(
            "next",
            Value::TagRef(TagRef::new(FourCC(*b"test"), "other\\tag")),
        );
        tag.root.set(
            "items",
            Value::Block(Block::new(vec![
                Struct::new()
                    .with("id", Value::Integer(3))
                    .with("key", Value::String("alpha".into())),
                Struct::new()
                    .with("id", Value::Integer(-4))
                    .with("key", Value::String(String::new())),
            ])),
        );
        tag
    }

    #[test]
    fn every_engine_round_trips_byte_exact() {
        let set = schemas();
        for engine in Engine::ALL {
            let bytes = sample(engine).write(&set, &WriteOptions::default()).unwrap();
            let tag = Tag::read(&bytes, &set, &ReadOptions::default()).unwrap();
            assert_eq!(tag.engine(), engine);
            assert_eq!(tag.root.get("label"), Some(&Value::String("hello".into())));
            let again = tag.write(&set, &WriteOptions::default()).unwrap();
            assert_eq!(again, bytes, "{engine}");
        }
    }

    #[test]
    fn checksum_covers_the_body() {
        let set = schemas();
        let bytes = sample(Engine::Latest).write(&set, &WriteOptions::default()).unwrap();
        let header = TagHeader::parse(&bytes).unwrap();
        assert_eq!(header.checksum, checksum(&bytes[TAG_HEADER_SIZE..]));
    }

    #[test]
    fn conversion_between_generations_keeps_values() {
        let set = schemas();
        let legacy = sample(Engine::Legacy).write(&set, &WriteOptions::default()).unwrap();
        let tag = Tag::read(&legacy, &set, &ReadOptions::default()).unwrap();
        let latest = tag.write(&set, &WriteOptions::for_engine(Engine::Latest)).unwrap();
        let converted = Tag::read(&latest, &set, &ReadOptions::default()).unwrap();
        assert_eq!(converted.engine(), Engine::Latest);
        let items = converted.root.block("items").unwrap();
        assert_eq!(items.elements[1].get("id"), Some(&Value::Integer(-4)));
        assert_eq!(converted.tag_refs()[0].path, "other\\tag");
    }

    #[test]
    fn trailing_bytes_are_kept() {
        let set = schemas();
        let mut bytes = sample(Engine::Mlab).write(&set, &WriteOptions::default()).unwrap();
        bytes.extend_from_slice(&[1, 2, 3]);
        let tag = Tag::read(&bytes, &set, &ReadOptions::default()).unwrap();
        assert_eq!(tag.trailing, vec![1, 2, 3]);
        let out = tag.write(&set, &WriteOptions::default()).unwrap();
        assert_eq!(out[TAG_HEADER_SIZE..], bytes[TAG_HEADER_SIZE..]);
    }

    #[test]
    fn data_length_follows_the_body() {
        let set = schemas();
        let bytes = sample(Engine::Mlab).write(&set, &WriteOptions::default()).unwrap();
        let header = TagHeader::parse(&bytes).unwrap();
        assert_eq!(header.data_length as usize, bytes.len() - TAG_HEADER_SIZE);

        let mut tag = Tag::read(&bytes, &set, &ReadOptions::default()).unwrap();
        tag.root.set("label", Value::String("a longer label".into()));
        tag.root.set(
            "next",
            Value::TagRef(TagRef::new(FourCC(*b"test"), r"somewhere\much\further\away")),
        );
        let edited = tag.write(&set, &WriteOptions::default()).unwrap();
        assert_ne!(edited.len(), bytes.len());
        let header = TagHeader::parse(&edited).unwrap();
        assert_eq!(header.data_length as usize, edited.len() - TAG_HEADER_SIZE);

        let latest = tag.write(&set, &WriteOptions::for_engine(Engine::Latest)).unwrap();
        let header = TagHeader::parse(&latest).unwrap();
        assert_eq!(header.data_length as usize, latest.len() - TAG_HEADER_SIZE);
    }

    #[test]
    fn unset_data_length_survives_an_unmodified_rewrite() {
        let set = schemas();
        let mut bytes = sample(Engine::Mlab).write(&set, &WriteOptions::default()).unwrap();
        bytes[48..52].copy_from_slice(&[0; 4]);

        let tag = Tag::read(&bytes, &set, &ReadOptions::default()).unwrap();
        assert_eq!(tag.header.data_length, 0);
        assert_eq!(tag.write(&set, &WriteOptions::default()).unwrap(), bytes);
    }

    #[test]
    fn unknown_group_is_an_error() {
        let set = SchemaSet::new();
        let bytes = sample(Engine::Latest).write(&schemas(), &WriteOptions::default()).unwrap();
        assert!(matches!(
            Tag::read(&bytes, &set, &ReadOptions::default()),
            Err(crate::error::Error::UnknownGroup { .. })
        ));
    }
}
