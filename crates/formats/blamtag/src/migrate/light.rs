use super::util::{is_outdated, latest, nested, stamp};
use super::{function, Migration};
use crate::codec::color::channel_to_byte;
use crate::error::Result;
use crate::file::Tag;
use crate::fourcc::FourCC;
use crate::schema::TagGroup;
use crate::value::{Color, Struct, Value};

/// `ligh`: byte color stops and a structured intensity function.
///
/// - `color_stops` v0 `{position, color: real_rgb_color}` becomes v1
///   `{position, color: rgb_color}`
/// - the root's `intensity` blob becomes a structured function
pub struct LightMigration;

fn byte_color(value: Option<&Value>) -> Value {
    let color = match value {
        Some(Value::Color(Color::Real { r, g, b, .. })) => Color::Byte {
            a: 0xFF,
            r: channel_to_byte(*r),
            g: channel_to_byte(*g),
            b: channel_to_byte(*b),
        },
        Some(Value::Color(c @ Color::Byte { .. })) => *c,
        _ => Color::Byte {
            a: 0xFF,
            r: 0,
            g: 0,
            b: 0,
        },
    };
    Value::Color(color)
}

fn upgrade_stop(stop: &mut Struct) {
    let color = byte_color(stop.get("color"));
    stop.set("color", color);
    stop.leftover.clear();
}

impl Migration for LightMigration {
    fn group(&self) -> FourCC {
        FourCC(*b"ligh")
    }

    fn name(&self) -> &str {
        "light"
    }

    fn apply(&self, tag: &mut Tag, schema: &TagGroup) -> Result<bool> {
        let root_latest = latest(&schema.root)?;
        let stops_latest = latest(nested(&schema.root, "color_stops")?)?;
        let mut changed = false;

        if let Some(stops) = tag.root.block_mut("color_stops") {
            if is_outdated(stops.header.as_ref(), stops_latest) {
                stops.elements.iter_mut().for_each(upgrade_stop);
                stamp(&mut stops.header, stops_latest);
                changed = true;
            }
        }

        if is_outdated(tag.root.header.as_ref(), root_latest) {
            function::upgrade_field(&mut tag.root, "intensity");
            tag.root.leftover.clear();
            stamp(&mut tag.root.header, root_latest);
            changed = true;
        }
        Ok(changed)
    }
}
