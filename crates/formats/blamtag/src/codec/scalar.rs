//! Integers, reals, angles, enums, flags, bounds and fixed-length vectors.

use super::{CodecContext, FieldCodec};
use crate::cursor::{Cursor, Writer};
use crate::engine::Endian;
use crate::error::Result;
use crate::fourcc::FourCC;
use crate::schema::{FieldDef, FieldKind};
use crate::value::{Bounds, Value};

fn to_api_angle(ctx: &CodecContext, radians: f32) -> f64 {
    if ctx.angles_in_degrees {
        (radians as f64).to_degrees()
    } else {
        radians as f64
    }
}

fn from_api_angle(ctx: &CodecContext, v: f64) -> f32 {
    if ctx.angles_in_degrees {
        v.to_radians() as f32
    } else {
        v as f32
    }
}

fn integer(field: &FieldDef, signed: i64, unsigned: u64) -> Value {
    if field.unsigned {
        Value::Unsigned(unsigned)
    } else {
        Value::Integer(signed)
    }
}

fn read_reals(c: &mut Cursor<'_>, e: Endian, n: usize) -> Result<Vec<f32>> {
    (0..n).map(|_| c.read_f32(e)).collect()
}

fn symbol_of(options: &[String], raw: i64) -> Option<String> {
    usize::try_from(raw).ok().and_then(|i| options.get(i)).cloned()
}

fn flag_names(options: &[String], raw: u64) -> Vec<String> {
    options
        .iter()
        .enumerate()
        .filter(|(bit, name)| *bit < 64 && raw & (1u64 << bit) != 0 && !name.is_empty())
        .map(|(_, name)| name.clone())
        .collect()
}

pub(super) fn decode(field: &FieldDef, ctx: &CodecContext, e: Endian, c: &mut Cursor<'_>) -> Result<Value> {
    use FieldKind::*;
    let value = match &field.kind {
        CharInteger | CharBlockIndex => {
            let b = c.read_u8()?;
            integer(field, b as i8 as i64, b as u64)
        }
        ShortInteger | ShortBlockIndex => {
            let v = c.read_u16(e)?;
            integer(field, v as i16 as i64, v as u64)
        }
        LongInteger | LongBlockIndex => {
            let v = c.read_u32(e)?;
            integer(field, v as i32 as i64, v as u64)
        }
        Int64Integer => {
            let v = c.read_i64(e)?;
            integer(field, v, v as u64)
        }
        Tag => Value::Tag(FourCC(c.read_fourcc(e)?)),
        Real | RealFraction => Value::Real(c.read_f32(e)?),
        Angle => Value::Angle(to_api_angle(ctx, c.read_f32(e)?)),
        CharEnum(opts) => {
            let raw = c.read_u8()? as i64;
            Value::Enum {
                raw,
                symbol: symbol_of(opts, raw),
            }
        }
        ShortEnum(opts) => {
            let raw = c.read_i16(e)? as i64;
            Value::Enum {
                raw,
                symbol: symbol_of(opts, raw),
            }
        }
        LongEnum(opts) => {
            let raw = c.read_i32(e)? as i64;
            Value::Enum {
                raw,
                symbol: symbol_of(opts, raw),
            }
        }
        ByteFlags(opts) => {
            let raw = c.read_u8()? as u64;
            Value::Flags {
                raw,
                set: flag_names(opts, raw),
            }
        }
        WordFlags(opts) => {
            let raw = c.read_u16(e)? as u64;
            Value::Flags {
                raw,
                set: flag_names(opts, raw),
            }
        }
        LongFlags(opts) => {
            let raw = c.read_u32(e)? as u64;
            Value::Flags {
                raw,
                set: flag_names(opts, raw),
            }
        }
        ShortBounds => Value::Bounds(Bounds::Short {
            min: c.read_i16(e)?,
            max: c.read_i16(e)?,
        }),
        RealBounds | RealFractionBounds => Value::Bounds(Bounds::Real {
            min: c.read_f32(e)?,
            max: c.read_f32(e)?,
        }),
        AngleBounds => {
            let min = c.read_f32(e)?;
            let max = c.read_f32(e)?;
            Value::Bounds(Bounds::Angle {
                min: to_api_angle(ctx, min),
                max: to_api_angle(ctx, max),
            })
        }
        Point2d | Rectangle2d => {
            let n = field.width(ctx) / 2;
            Value::Points((0..n).map(|_| c.read_i16(e)).collect::<Result<_>>()?)
        }
        RealPoint2d | RealPoint3d | RealVector2d | RealVector3d | RealQuaternion | RealPlane2d
        | RealPlane3d | RealMatrix3x3 | RealHsvColor | RealAhsvColor => {
            Value::Vector(read_reals(c, e, field.width(ctx) / 4)?)
        }
        RealEulerAngles2d | RealEulerAngles3d => {
            let raw = read_reals(c, e, field.width(ctx) / 4)?;
            Value::Angles(raw.into_iter().map(|r| to_api_angle(ctx, r)).collect())
        }
        _ => field.default_value(),
    };
    Ok(value)
}

fn enum_raw(options: &[String], value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Enum { raw, symbol }) => {
            // An edited symbol wins over a stale raw value.
            match symbol {
                Some(sym) if symbol_of(options, *raw).as_deref() != Some(sym.as_str()) => options
                    .iter()
                    .position(|o| o == sym)
                    .map(|i| i as i64)
                    .unwrap_or(*raw),
                _ => *raw,
            }
        }
        Some(v) => v.as_i64().unwrap_or(0),
        None => 0,
    }
}

/// Raw bits for a flags value. Named bits come from `set` alone; `raw` only
/// supplies the bits that have no option name.
fn flags_raw(options: &[String], value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Flags { raw, set }) => {
            let named_mask = options
                .iter()
                .enumerate()
                .filter(|(bit, name)| *bit < 64 && !name.is_empty())
                .fold(0u64, |acc, (bit, _)| acc | (1u64 << bit));
            let named = set
                .iter()
                .filter_map(|name| options.iter().position(|o| o == name))
                .filter(|bit| *bit < 64)
                .fold(0u64, |acc, bit| acc | (1u64 << bit));
            (raw & !named_mask) | named
        }
        Some(v) => v.as_i64().unwrap_or(0) as u64,
        None => 0,
    }
}

fn int_of(value: Option<&Value>) -> i64 {
    value.and_then(Value::as_i64).unwrap_or(0)
}

fn reals_of(value: Option<&Value>, n: usize) -> Vec<f32> {
    let mut out = match value {
        Some(Value::Vector(v)) => v.clone(),
        Some(Value::Angles(v)) => v.iter().map(|&x| x as f32).collect(),
        _ => Vec::new(),
    };
    out.resize(n, 0.0);
    out
}

pub(super) fn encode(field: &FieldDef, ctx: &CodecContext, e: Endian, value: Option<&Value>, w: &mut Writer) {
    use FieldKind::*;
    match &field.kind {
        CharInteger | CharBlockIndex => w.write_u8(int_of(value) as u8),
        ShortInteger | ShortBlockIndex => w.write_u16(int_of(value) as u16, e),
        LongInteger | LongBlockIndex => w.write_u32(int_of(value) as u32, e),
        Int64Integer => {
            let v = match value {
                Some(Value::Unsigned(u)) => *u as i64,
                other => int_of(other),
            };
            w.write_i64(v, e)
        }
        Tag => {
            let code = match value {
                Some(Value::Tag(code)) => *code,
                _ => FourCC::NONE,
            };
            w.write_fourcc(code.0, e)
        }
        Real | RealFraction => w.write_f32(value.and_then(Value::as_f32).unwrap_or(0.0), e),
        Angle => {
            let radians = match value {
                Some(Value::Angle(v)) => from_api_angle(ctx, *v),
                Some(other) => other.as_f32().unwrap_or(0.0),
                None => 0.0,
            };
            w.write_f32(radians, e)
        }
        CharEnum(opts) => w.write_u8(enum_raw(opts, value) as u8),
        ShortEnum(opts) => w.write_i16(enum_raw(opts, value) as i16, e),
        LongEnum(opts) => w.write_i32(enum_raw(opts, value) as i32, e),
        ByteFlags(opts) => w.write_u8(flags_raw(opts, value) as u8),
        WordFlags(opts) => w.write_u16(flags_raw(opts, value) as u16, e),
        LongFlags(opts) => w.write_u32(flags_raw(opts, value) as u32, e),
        ShortBounds => {
            let (min, max) = match value {
                Some(Value::Bounds(Bounds::Short { min, max })) => (*min, *max),
                _ => (0, 0),
            };
            w.write_i16(min, e);
            w.write_i16(max, e);
        }
        RealBounds | RealFractionBounds => {
            let (min, max) = match value {
                Some(Value::Bounds(Bounds::Real { min, max })) => (*min, *max),
                _ => (0.0, 0.0),
            };
            w.write_f32(min, e);
            w.write_f32(max, e);
        }
        AngleBounds => {
            let (min, max) = match value {
                Some(Value::Bounds(Bounds::Angle { min, max })) => {
                    (from_api_angle(ctx, *min), from_api_angle(ctx, *max))
                }
                _ => (0.0, 0.0),
            };
            w.write_f32(min, e);
            w.write_f32(max, e);
        }
        Point2d | Rectangle2d => {
            let n = field.width(ctx) / 2;
            let mut points = match value {
                Some(Value::Points(p)) => p.clone(),
                _ => Vec::new(),
            };
            points.resize(n, 0);
            for p in points {
                w.write_i16(p, e);
            }
        }
        RealPoint2d | RealPoint3d | RealVector2d | RealVector3d | RealQuaternion | RealPlane2d
        | RealPlane3d | RealMatrix3x3 | RealHsvColor | RealAhsvColor => {
            for r in reals_of(value, field.width(ctx) / 4) {
                w.write_f32(r, e);
            }
        }
        RealEulerAngles2d | RealEulerAngles3d => {
            let n = field.width(ctx) / 4;
            let mut angles = match value {
                Some(Value::Angles(a)) => a.clone(),
                _ => Vec::new(),
            };
            angles.resize(n, 0.0);
            for a in angles {
                w.write_f32(from_api_angle(ctx, a), e);
            }
        }
        _ => w.write_zeros(field.width(ctx)),
    }
}
