//! Strongly-typed schema graph.
//!
//! Descriptors (JSON, see [`descriptor`]) are compiled once into this graph:
//! a [`SchemaSet`] maps tag groups to [`TagGroup`]s, each of which owns a root
//! [`BlockDef`]. Every block or struct holds a version → [`Layout`] map with at
//! most one layout flagged latest.

pub mod descriptor;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::engine::Endian;
use crate::error::{Error, Result};
use crate::fourcc::FourCC;
use crate::header::BlockHeader;

pub use descriptor::{FieldDescriptor, GroupDescriptor, LayoutDescriptor};

/// Every field kind the codec understands.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    CharInteger,
    ShortInteger,
    LongInteger,
    Int64Integer,
    Tag,
    Real,
    RealFraction,
    Angle,
    CharBlockIndex,
    ShortBlockIndex,
    LongBlockIndex,
    CharEnum(Vec<String>),
    ShortEnum(Vec<String>),
    LongEnum(Vec<String>),
    ByteFlags(Vec<String>),
    WordFlags(Vec<String>),
    LongFlags(Vec<String>),
    ShortBounds,
    RealBounds,
    RealFractionBounds,
    AngleBounds,
    Point2d,
    Rectangle2d,
    RealPoint2d,
    RealPoint3d,
    RealVector2d,
    RealVector3d,
    RealQuaternion,
    RealEulerAngles2d,
    RealEulerAngles3d,
    RealPlane2d,
    RealPlane3d,
    RealMatrix3x3,
    RgbColor,
    ArgbColor,
    RealRgbColor,
    RealArgbColor,
    RealHsvColor,
    RealAhsvColor,
    String,
    LongString,
    StringId,
    TagReference,
    Data,
    Block(Box<BlockDef>),
    Struct(Box<BlockDef>),
    Pad(usize),
    Skip(usize),
    Explanation,
    Custom,
}

/// One field of a layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub unsigned: bool,
    /// Overrides the file's byte order for this field.
    pub endian: Option<Endian>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            unsigned: false,
            endian: None,
        }
    }

    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = Some(endian);
        self
    }
}

/// An ordered field list for one version of a block or struct.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub version: i32,
    pub fields: Vec<FieldDef>,
}

/// A block or struct definition: its header name and versioned layouts.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDef {
    pub name: String,
    pub header_name: FourCC,
    pub layouts: BTreeMap<i32, Layout>,
    pub latest: Option<i32>,
}

impl BlockDef {
    /// Build a single-layout definition flagged latest.
    pub fn single(name: impl Into<String>, version: i32, fields: Vec<FieldDef>) -> Self {
        let mut layouts = BTreeMap::new();
        layouts.insert(version, Layout { version, fields });
        Self {
            name: name.into(),
            header_name: FourCC(*b"tbfd"),
            layouts,
            latest: Some(version),
        }
    }

    /// Add another layout, optionally making it the canonical one.
    pub fn with_layout(mut self, version: i32, fields: Vec<FieldDef>, latest: bool) -> Self {
        self.layouts.insert(version, Layout { version, fields });
        if latest {
            self.latest = Some(version);
        }
        self
    }

    pub fn layout(&self, version: i32) -> Result<&Layout> {
        self.layouts.get(&version).ok_or_else(|| Error::UnknownLayoutVersion {
            block: self.name.clone(),
            version,
        })
    }

    /// The layout flagged latest. Its absence is a schema-authoring defect.
    pub fn canonical(&self) -> Result<&Layout> {
        self.latest
            .and_then(|v| self.layouts.get(&v))
            .ok_or_else(|| Error::MissingCanonicalLayout {
                block: self.name.clone(),
            })
    }

    /// Layout used when reading a region stored with `header`.
    pub fn layout_for_read(&self, header: Option<&BlockHeader>) -> Result<&Layout> {
        match header {
            Some(h) => self.layout(h.version),
            None => self.canonical(),
        }
    }

    /// Layout used when writing: a preserved header version that matches a
    /// known layout wins, otherwise the canonical layout.
    pub fn layout_for_write(&self, header: Option<&BlockHeader>) -> Result<(&Layout, bool)> {
        if let Some(layout) = header.and_then(|h| self.layouts.get(&h.version)) {
            return Ok((layout, true));
        }
        Ok((self.canonical()?, false))
    }

    /// Width-query fallback when no canonical layout exists.
    pub(crate) fn width_layout(&self) -> Option<&Layout> {
        self.latest
            .and_then(|v| self.layouts.get(&v))
            .or_else(|| self.layouts.values().next_back())
    }

    pub fn latest_version(&self) -> Option<i32> {
        self.latest
    }
}

/// Schema for one tag group (category).
#[derive(Debug, Clone, PartialEq)]
pub struct TagGroup {
    pub group: FourCC,
    pub name: String,
    pub extension: String,
    /// Value written to the tag header's version field for new tags.
    pub header_version: i16,
    pub root: BlockDef,
}

/// All known tag groups.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    groups: HashMap<FourCC, TagGroup>,
}

const BUILTIN: &[(&str, &str)] = &[
    ("bitm", include_str!("../../schemas/bitm.json")),
    ("cont", include_str!("../../schemas/cont.json")),
    ("ligh", include_str!("../../schemas/ligh.json")),
    ("shad", include_str!("../../schemas/shad.json")),
];

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The schemas bundled with the crate.
    pub fn builtin() -> Result<Self> {
        let mut set = Self::new();
        for (name, json) in BUILTIN {
            let group = descriptor::compile_json(json)
                .map_err(|e| Error::schema(format!("builtin {name}"), e.to_string()))?;
            set.insert(group);
        }
        Ok(set)
    }

    /// Load every `*.json` descriptor in `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut set = Self::new();
        let mut entries: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|x| x.to_str()) == Some("json"))
            .collect();
        entries.sort();
        for path in entries {
            let text = std::fs::read_to_string(&path)?;
            let group = descriptor::compile_json(&text)
                .map_err(|e| Error::schema(path.display().to_string(), e.to_string()))?;
            set.insert(group);
        }
        Ok(set)
    }

    pub fn insert(&mut self, group: TagGroup) {
        self.groups.insert(group.group, group);
    }

    pub fn get(&self, group: FourCC) -> Result<&TagGroup> {
        self.groups.get(&group).ok_or_else(|| Error::UnknownGroup {
            group: group.to_latin1(),
        })
    }

    pub fn contains(&self, group: FourCC) -> bool {
        self.groups.contains_key(&group)
    }

    pub fn by_extension(&self, extension: &str) -> Option<&TagGroup> {
        self.groups
            .values()
            .find(|g| g.extension.eq_ignore_ascii_case(extension))
    }

    pub fn groups(&self) -> impl Iterator<Item = &TagGroup> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_versions() -> BlockDef {
        BlockDef::single("stops", 0, vec![FieldDef::new("a", FieldKind::Real)]).with_layout(
            1,
            vec![FieldDef::new("a", FieldKind::RgbColor)],
            true,
        )
    }

    fn header(version: i32) -> BlockHeader {
        BlockHeader {
            name: FourCC(*b"tbfd"),
            version,
            count: 1,
            size: 4,
        }
    }

    #[test]
    fn read_selects_stored_version() {
        let def = two_versions();
        assert_eq!(def.layout_for_read(Some(&header(0))).unwrap().version, 0);
        assert_eq!(def.layout_for_read(None).unwrap().version, 1);
        assert!(matches!(
            def.layout_for_read(Some(&header(9))),
            Err(Error::UnknownLayoutVersion { version: 9, .. })
        ));
    }

    #[test]
    fn write_prefers_known_preserved_version() {
        let def = two_versions();
        let (layout, preserved) = def.layout_for_write(Some(&header(0))).unwrap();
        assert_eq!((layout.version, preserved), (0, true));
        let (layout, preserved) = def.layout_for_write(Some(&header(7))).unwrap();
        assert_eq!((layout.version, preserved), (1, false));
    }

    #[test]
    fn missing_canonical_is_fatal_only_when_needed() {
        let mut def = two_versions();
        def.latest = None;
        assert!(def.layout_for_write(Some(&header(0))).is_ok());
        assert!(matches!(
            def.layout_for_write(None),
            Err(Error::MissingCanonicalLayout { .. })
        ));
        assert_eq!(def.width_layout().unwrap().version, 1);
    }

    #[test]
    fn builtin_set_loads() {
        let set = SchemaSet::builtin().unwrap();
        for code in [b"bitm", b"cont", b"ligh", b"shad"] {
            assert!(set.contains(FourCC(*code)), "missing {code:?}");
        }
        assert_eq!(set.by_extension("shader").unwrap().group, FourCC(*b"shad"));
        assert!(set.get(FourCC(*b"zzzz")).is_err());
    }
}
