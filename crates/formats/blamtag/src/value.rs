use serde::{Deserialize, Serialize};

use crate::fourcc::FourCC;
use crate::header::BlockHeader;

/// A decoded field value.
///
/// Floating-point payloads keep their on-disk `f32` so the sign of zero (and
/// every other bit) survives a read/write cycle; angle kinds use `f64` so the
/// degrees view converts back to the exact stored radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Integer(i64),
    Unsigned(u64),
    Real(#[serde(with = "exact")] f32),
    /// Degrees or radians depending on the read options.
    Angle(#[serde(with = "exact")] f64),
    Tag(FourCC),
    Enum { raw: i64, symbol: Option<String> },
    Flags { raw: u64, set: Vec<String> },
    Bounds(Bounds),
    Color(Color),
    Vector(#[serde(with = "exact::vec")] Vec<f32>),
    Angles(#[serde(with = "exact::vec")] Vec<f64>),
    Points(Vec<i16>),
    String(String),
    TagRef(TagRef),
    Data(TagData),
    Pad(#[serde(with = "hex")] Vec<u8>),
    Struct(Struct),
    Block(Block),
    /// Zero-width markers (explanations, editor customizations).
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Bounds {
    Short { min: i16, max: i16 },
    Real {
        #[serde(with = "exact")]
        min: f32,
        #[serde(with = "exact")]
        max: f32,
    },
    Angle {
        #[serde(with = "exact")]
        min: f64,
        #[serde(with = "exact")]
        max: f64,
    },
}

/// Channels in logical order. For `rgb_color` the alpha slot carries the pad byte.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Color {
    Byte { a: u8, r: u8, g: u8, b: u8 },
    Real {
        #[serde(default, with = "exact::option")]
        a: Option<f32>,
        #[serde(with = "exact")]
        r: f32,
        #[serde(with = "exact")]
        g: f32,
        #[serde(with = "exact")]
        b: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRef {
    pub group: FourCC,
    pub path: String,
    #[serde(default)]
    pub pointer: u32,
    #[serde(default = "TagRef::default_index")]
    pub index: i32,
}

impl TagRef {
    fn default_index() -> i32 {
        -1
    }

    pub fn new(group: FourCC, path: impl Into<String>) -> Self {
        Self {
            group,
            path: path.into(),
            pointer: 0,
            index: -1,
        }
    }

    pub fn null() -> Self {
        Self::new(FourCC::NONE, "")
    }

    pub fn is_null(&self) -> bool {
        self.path.is_empty()
    }
}

impl Default for TagRef {
    fn default() -> Self {
        Self::null()
    }
}

/// Opaque data blob plus the metadata stored beside its length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagData {
    #[serde(default)]
    pub flags: i32,
    #[serde(default)]
    pub file_offset: i32,
    #[serde(default)]
    pub pointer: u32,
    #[serde(default)]
    pub unknown: u32,
    #[serde(with = "hex")]
    pub bytes: Vec<u8>,
}

impl TagData {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            ..Self::default()
        }
    }
}

/// One block element, a nested struct, or the tag root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Struct {
    /// Header as read (or synthesized); decides the layout used on write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<BlockHeader>,
    pub fields: Vec<(String, Value)>,
    /// Unconsumed bytes at the end of the element.
    #[serde(default, with = "hex", skip_serializing_if = "Vec::is_empty")]
    pub leftover: Vec<u8>,
}

impl Struct {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.iter_mut().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Replace the named field, or append it.
    pub fn set(&mut self, name: &str, value: Value) {
        match self.get_mut(name) {
            Some(slot) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(idx).1)
    }

    /// Rename a field in place, keeping its position. Returns false when absent.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        match self.fields.iter_mut().find(|(n, _)| n == from) {
            Some((name, _)) => {
                *name = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Value for the field at `index` if it carries `name`, else by name lookup.
    pub fn field_at(&self, index: usize, name: &str) -> Option<&Value> {
        match self.fields.get(index) {
            Some((n, v)) if n == name => Some(v),
            _ => self.get(name),
        }
    }

    pub fn version(&self) -> Option<i32> {
        self.header.map(|h| h.version)
    }

    pub fn block(&self, name: &str) -> Option<&Block> {
        match self.get(name)? {
            Value::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn block_mut(&mut self, name: &str) -> Option<&mut Block> {
        match self.get_mut(name)? {
            Value::Block(b) => Some(b),
            _ => None,
        }
    }
}

/// A repeated region: the header it was stored with plus its elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<BlockHeader>,
    #[serde(default)]
    pub address: u32,
    #[serde(default)]
    pub definition: u32,
    pub elements: Vec<Struct>,
}

impl Block {
    pub fn new(elements: Vec<Struct>) -> Self {
        Self {
            elements,
            ..Self::default()
        }
    }

    pub fn version(&self) -> Option<i32> {
        self.header.map(|h| h.version)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Integer(v) => Some(v),
            Value::Unsigned(v) => Some(v as i64),
            Value::Enum { raw, .. } => Some(raw),
            Value::Flags { raw, .. } => Some(raw as i64),
            Value::Real(v) => Some(v as i64),
            Value::Angle(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Value::Real(v) => Some(v),
            Value::Angle(v) => Some(v as f32),
            Value::Integer(v) => Some(v as f32),
            Value::Unsigned(v) => Some(v as f32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Value::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_tag_ref(&self) -> Option<&TagRef> {
        match self {
            Value::TagRef(r) => Some(r),
            _ => None,
        }
    }

    /// Visit every tag reference in this value, depth first.
    pub fn visit_tag_refs<'a>(&'a self, out: &mut Vec<&'a TagRef>) {
        match self {
            Value::TagRef(r) => out.push(r),
            Value::Struct(s) => s.visit_tag_refs(out),
            Value::Block(b) => {
                for el in &b.elements {
                    el.visit_tag_refs(out);
                }
            }
            _ => {}
        }
    }
}

impl Struct {
    pub fn visit_tag_refs<'a>(&'a self, out: &mut Vec<&'a TagRef>) {
        for (_, v) in &self.fields {
            v.visit_tag_refs(out);
        }
    }
}

/// Serde helpers for floats JSON can't represent.
///
/// Finite values stay plain numbers. NaN and the infinities are written as
/// `{"bits": n}` so their exact payload survives a trip through the cache.
mod exact {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub trait Float: Copy + Serialize + DeserializeOwned {
        type Bits: Copy + Serialize + DeserializeOwned;
        fn finite(self) -> bool;
        fn to_raw(self) -> Self::Bits;
        fn from_raw(bits: Self::Bits) -> Self;
    }

    impl Float for f32 {
        type Bits = u32;
        fn finite(self) -> bool {
            self.is_finite()
        }
        fn to_raw(self) -> u32 {
            self.to_bits()
        }
        fn from_raw(bits: u32) -> Self {
            f32::from_bits(bits)
        }
    }

    impl Float for f64 {
        type Bits = u64;
        fn finite(self) -> bool {
            self.is_finite()
        }
        fn to_raw(self) -> u64 {
            self.to_bits()
        }
        fn from_raw(bits: u64) -> Self {
            f64::from_bits(bits)
        }
    }

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr<F, B> {
        Number(F),
        Bits { bits: B },
    }

    pub fn serialize<F: Float, S: Serializer>(v: &F, s: S) -> Result<S::Ok, S::Error> {
        if v.finite() {
            Repr::<F, F::Bits>::Number(*v).serialize(s)
        } else {
            Repr::<F, F::Bits>::Bits { bits: v.to_raw() }.serialize(s)
        }
    }

    pub fn deserialize<'de, F: Float, D: Deserializer<'de>>(d: D) -> Result<F, D::Error> {
        Ok(match Repr::<F, F::Bits>::deserialize(d)? {
            Repr::Number(v) => v,
            Repr::Bits { bits } => F::from_raw(bits),
        })
    }

    struct Exact<F>(F);

    impl<F: Float> Serialize for Exact<F> {
        fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            serialize(&self.0, s)
        }
    }

    impl<'de, F: Float> Deserialize<'de> for Exact<F> {
        fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
            deserialize(d).map(Exact)
        }
    }

    pub mod vec {
        use super::*;

        #[allow(clippy::ptr_arg)]
        pub fn serialize<F: Float, S: Serializer>(v: &Vec<F>, s: S) -> Result<S::Ok, S::Error> {
            s.collect_seq(v.iter().map(|x| Exact(*x)))
        }

        pub fn deserialize<'de, F: Float, D: Deserializer<'de>>(d: D) -> Result<Vec<F>, D::Error> {
            let items = Vec::<Exact<F>>::deserialize(d)?;
            Ok(items.into_iter().map(|e| e.0).collect())
        }
    }

    pub mod option {
        use super::*;

        pub fn serialize<F: Float, S: Serializer>(v: &Option<F>, s: S) -> Result<S::Ok, S::Error> {
            match v {
                Some(x) => s.serialize_some(&Exact(*x)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, F: Float, D: Deserializer<'de>>(d: D) -> Result<Option<F>, D::Error> {
            Ok(Option::<Exact<F>>::deserialize(d)?.map(|e| e.0))
        }
    }
}
