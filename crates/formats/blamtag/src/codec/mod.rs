//! Field codec dispatcher.
//!
//! Every [`FieldDef`] decodes from and encodes to two byte streams:
//! - `inline`: the fixed-size element the field sits in
//! - `stream`: the parent stream, where out-of-line payloads (strings, tag
//!   reference paths, data blobs, nested blocks) live
//!
//! `decode`, `encode` and `width` must agree on the inline width of every kind.
//! Leaf kinds never fail on short input: they return their default value.

pub mod block;
pub(crate) mod color;
mod scalar;
pub mod text;

use crate::cursor::{Cursor, Writer};
use crate::engine::{Endian, Engine, StructHeaderPlacement};
use crate::error::Result;
use crate::schema::{FieldDef, FieldKind};
use crate::value::{Bounds, Color, TagData, TagRef, Value};

/// Width of a block field's inline count/address/definition header.
pub const BLOCK_FIELD_SIZE: usize = 12;
pub const TAG_REFERENCE_SIZE: usize = 16;
pub const DATA_FIELD_SIZE: usize = 20;
pub const STRING_ID_SIZE: usize = 4;
pub const STRING_SIZE: usize = 32;
pub const LONG_STRING_SIZE: usize = 256;

/// Immutable settings threaded through every decode/encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecContext {
    pub engine: Engine,
    /// Present angles in degrees (radians are always what's on disk).
    pub angles_in_degrees: bool,
    /// Honor stored element sizes on write. Only valid when writing back to
    /// the generation the tree was read from.
    pub preserve_sizes: bool,
}

impl CodecContext {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            angles_in_degrees: true,
            preserve_sizes: true,
        }
    }

    pub fn endian(&self) -> Endian {
        self.engine.endian()
    }

    /// Byte order for `field`, honoring its override.
    pub fn field_endian(&self, field: &FieldDef) -> Endian {
        field.endian.unwrap_or_else(|| self.endian())
    }
}

/// The per-kind codec interface.
pub trait FieldCodec {
    /// Inline width in bytes, computed without I/O.
    fn width(&self, ctx: &CodecContext) -> usize;

    /// Decode one value. Short inline input yields [`FieldCodec::default_value`].
    fn decode(&self, ctx: &CodecContext, inline: &mut Cursor<'_>, stream: &mut Cursor<'_>) -> Result<Value>;

    /// Encode `value` (or the default when `None`). Always writes exactly
    /// [`FieldCodec::width`] bytes to `inline`.
    fn encode(
        &self,
        ctx: &CodecContext,
        value: Option<&Value>,
        inline: &mut Writer,
        stream: &mut Writer,
    ) -> Result<()>;

    /// Value used when the field is missing or truncated.
    fn default_value(&self) -> Value;
}

impl FieldCodec for FieldDef {
    fn width(&self, ctx: &CodecContext) -> usize {
        use FieldKind::*;
        match &self.kind {
            CharInteger | CharBlockIndex | CharEnum(_) | ByteFlags(_) => 1,
            ShortInteger | ShortBlockIndex | ShortEnum(_) | WordFlags(_) => 2,
            LongInteger | LongBlockIndex | LongEnum(_) | LongFlags(_) | Tag | Real | RealFraction
            | Angle | RgbColor | ArgbColor | ShortBounds | Point2d => 4,
            Int64Integer | RealBounds | RealFractionBounds | AngleBounds | Rectangle2d | RealPoint2d
            | RealVector2d | RealEulerAngles2d => 8,
            RealPoint3d | RealVector3d | RealEulerAngles3d | RealPlane2d | RealRgbColor
            | RealHsvColor => 12,
            RealQuaternion | RealPlane3d | RealArgbColor | RealAhsvColor => 16,
            RealMatrix3x3 => 36,
            String => STRING_SIZE,
            LongString => LONG_STRING_SIZE,
            StringId => STRING_ID_SIZE,
            TagReference => TAG_REFERENCE_SIZE,
            Data => DATA_FIELD_SIZE,
            Block(_) => BLOCK_FIELD_SIZE,
            Struct(def) => {
                let fields = def
                    .width_layout()
                    .map(|layout| block::layout_width(layout, ctx))
                    .unwrap_or(0);
                let header = match ctx.engine.struct_header() {
                    StructHeaderPlacement::Inline => ctx.engine.block_header_size().unwrap_or(0),
                    _ => 0,
                };
                fields + header
            }
            Pad(n) | Skip(n) => *n,
            Explanation | Custom => 0,
        }
    }

    fn decode(&self, ctx: &CodecContext, inline: &mut Cursor<'_>, stream: &mut Cursor<'_>) -> Result<Value> {
        use FieldKind::*;
        match &self.kind {
            Block(def) => return block::decode_block(def, ctx, inline, stream),
            Struct(def) => return block::decode_struct(def, ctx, inline, stream),
            _ => {}
        }
        if inline.remaining() < self.width(ctx) {
            return Ok(self.default_value());
        }
        let e = ctx.field_endian(self);
        let value = match &self.kind {
            RgbColor | ArgbColor | RealRgbColor | RealArgbColor => color::decode(self, e, inline)?,
            String | LongString => text::decode_fixed(self.width(ctx), inline)?,
            StringId => text::decode_string_id(e, inline, stream)?,
            TagReference => text::decode_tag_ref(e, inline, stream)?,
            Data => text::decode_data(e, inline, stream)?,
            Pad(n) | Skip(n) => Value::Pad(inline.read_bytes(*n)?.to_vec()),
            Explanation | Custom => Value::Empty,
            _ => scalar::decode(self, ctx, e, inline)?,
        };
        Ok(value)
    }

    fn encode(
        &self,
        ctx: &CodecContext,
        value: Option<&Value>,
        inline: &mut Writer,
        stream: &mut Writer,
    ) -> Result<()> {
        use FieldKind::*;
        let e = ctx.field_endian(self);
        match &self.kind {
            Block(def) => block::encode_block(def, ctx, value, inline, stream)?,
            Struct(def) => block::encode_struct(def, ctx, value, inline, stream)?,
            RgbColor | ArgbColor | RealRgbColor | RealArgbColor => color::encode(self, e, value, inline),
            String | LongString => text::encode_fixed(self.width(ctx), value, inline),
            StringId => text::encode_string_id(e, value, inline, stream),
            TagReference => text::encode_tag_ref(e, value, inline, stream),
            Data => text::encode_data(e, value, inline, stream),
            Pad(n) | Skip(n) => {
                let mut bytes = match value {
                    Some(Value::Pad(b)) => b.clone(),
                    _ => Vec::new(),
                };
                bytes.resize(*n, 0);
                inline.write_bytes(&bytes);
            }
            Explanation | Custom => {}
            _ => scalar::encode(self, ctx, e, value, inline),
        }
        Ok(())
    }

    fn default_value(&self) -> Value {
        use FieldKind::*;
        match &self.kind {
            CharInteger | ShortInteger | LongInteger | Int64Integer | CharBlockIndex
            | ShortBlockIndex | LongBlockIndex => {
                if self.unsigned {
                    Value::Unsigned(0)
                } else {
                    Value::Integer(0)
                }
            }
            Tag => Value::Tag(crate::fourcc::FourCC::NONE),
            Real | RealFraction => Value::Real(0.0),
            Angle => Value::Angle(0.0),
            CharEnum(opts) | ShortEnum(opts) | LongEnum(opts) => Value::Enum {
                raw: 0,
                symbol: opts.first().cloned(),
            },
            ByteFlags(_) | WordFlags(_) | LongFlags(_) => Value::Flags {
                raw: 0,
                set: Vec::new(),
            },
            ShortBounds => Value::Bounds(Bounds::Short { min: 0, max: 0 }),
            RealBounds | RealFractionBounds => Value::Bounds(Bounds::Real { min: 0.0, max: 0.0 }),
            AngleBounds => Value::Bounds(Bounds::Angle { min: 0.0, max: 0.0 }),
            Point2d => Value::Points(vec![0; 2]),
            Rectangle2d => Value::Points(vec![0; 4]),
            RealPoint2d | RealVector2d => Value::Vector(vec![0.0; 2]),
            RealPoint3d | RealVector3d | RealPlane2d | RealHsvColor => Value::Vector(vec![0.0; 3]),
            RealQuaternion | RealPlane3d | RealAhsvColor => Value::Vector(vec![0.0; 4]),
            RealMatrix3x3 => Value::Vector(vec![0.0; 9]),
            RealEulerAngles2d => Value::Angles(vec![0.0; 2]),
            RealEulerAngles3d => Value::Angles(vec![0.0; 3]),
            RgbColor | ArgbColor => Value::Color(Color::Byte { a: 0, r: 0, g: 0, b: 0 }),
            RealRgbColor => Value::Color(Color::Real { a: None, r: 0.0, g: 0.0, b: 0.0 }),
            RealArgbColor => Value::Color(Color::Real {
                a: Some(0.0),
                r: 0.0,
                g: 0.0,
                b: 0.0,
            }),
            String | LongString | StringId => Value::String(std::string::String::new()),
            TagReference => Value::TagRef(TagRef::null()),
            Data => Value::Data(TagData::default()),
            Block(_) => Value::Block(crate::value::Block::default()),
            Struct(_) => Value::Struct(crate::value::Struct::default()),
            Pad(n) | Skip(n) => Value::Pad(vec![0; *n]),
            Explanation | Custom => Value::Empty,
        }
    }
}
