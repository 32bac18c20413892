use crate::cursor::{Cursor, Writer};
use crate::engine::Endian;
use crate::error::Result;
use crate::schema::{FieldDef, FieldKind};
use crate::value::{Color, Value};

/// Byte colors are one packed u32 in the field's byte order, so under
/// little-endian the wire order is B, G, R, A (or pad).
pub(super) fn decode(field: &FieldDef, e: Endian, c: &mut Cursor<'_>) -> Result<Value> {
    let color = match field.kind {
        FieldKind::RgbColor | FieldKind::ArgbColor => {
            let packed = c.read_u32(e)?;
            Color::Byte {
                a: (packed >> 24) as u8,
                r: (packed >> 16) as u8,
                g: (packed >> 8) as u8,
                b: packed as u8,
            }
        }
        FieldKind::RealArgbColor => Color::Real {
            a: Some(c.read_f32(e)?),
            r: c.read_f32(e)?,
            g: c.read_f32(e)?,
            b: c.read_f32(e)?,
        },
        _ => Color::Real {
            a: None,
            r: c.read_f32(e)?,
            g: c.read_f32(e)?,
            b: c.read_f32(e)?,
        },
    };
    Ok(Value::Color(color))
}

/// `round(v·255)` after clamping to `0..=1`.
pub(crate) fn channel_to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn channel_to_real(v: u8) -> f32 {
    v as f32 / 255.0
}

pub(super) fn encode(field: &FieldDef, e: Endian, value: Option<&Value>, w: &mut Writer) {
    let color = match value {
        Some(Value::Color(c)) => *c,
        _ => Color::Byte {
            a: 0,
            r: 0,
            g: 0,
            b: 0,
        },
    };
    match field.kind {
        FieldKind::RgbColor | FieldKind::ArgbColor => {
            let (a, r, g, b) = match color {
                Color::Byte { a, r, g, b } => (a, r, g, b),
                Color::Real { a, r, g, b } => (
                    a.map(channel_to_byte).unwrap_or(0xFF),
                    channel_to_byte(r),
                    channel_to_byte(g),
                    channel_to_byte(b),
                ),
            };
            let packed = (a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32;
            w.write_u32(packed, e);
        }
        _ => {
            let (a, r, g, b) = match color {
                Color::Real { a, r, g, b } => (a.unwrap_or(1.0), r, g, b),
                Color::Byte { a, r, g, b } => (
                    channel_to_real(a),
                    channel_to_real(r),
                    channel_to_real(g),
                    channel_to_real(b),
                ),
            };
            if field.kind == FieldKind::RealArgbColor {
                w.write_f32(a, e);
            }
            w.write_f32(r, e);
            w.write_f32(g, e);
            w.write_f32(b, e);
        }
    }
}
