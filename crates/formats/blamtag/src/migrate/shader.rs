use super::util::{is_outdated, latest, stamp};
use super::Migration;
use crate::error::Result;
use crate::file::Tag;
use crate::fourcc::FourCC;
use crate::schema::TagGroup;
use crate::value::{Block, Struct, Value};

/// `shad` root v0 → v1.
///
/// - `specular_power` short integer → real
/// - inline `diffuse_map` + `map_scale` → one element of the new `maps` block
///   (no element when the map reference is null)
/// - `flags` renamed to `shader_flags`
pub struct ShaderMigration;

impl Migration for ShaderMigration {
    fn group(&self) -> FourCC {
        FourCC(*b"shad")
    }

    fn name(&self) -> &str {
        "shader"
    }

    fn apply(&self, tag: &mut Tag, schema: &TagGroup) -> Result<bool> {
        let root_latest = latest(&schema.root)?;
        let root = &mut tag.root;
        if !is_outdated(root.header.as_ref(), root_latest) {
            return Ok(false);
        }

        let power = root.get("specular_power").and_then(Value::as_f32).unwrap_or(0.0);
        root.set("specular_power", Value::Real(power));

        let map = root.remove("diffuse_map");
        let scale = root.remove("map_scale").and_then(|v| v.as_f32()).unwrap_or(0.0);
        let elements = match map {
            Some(Value::TagRef(r)) if !r.is_null() => vec![Struct::new()
                .with("bitmap", Value::TagRef(r))
                .with("scale", Value::Real(scale))],
            _ => Vec::new(),
        };
        root.set("maps", Value::Block(Block::new(elements)));

        if !root.rename("flags", "shader_flags") && root.get("shader_flags").is_none() {
            root.set(
                "shader_flags",
                Value::Flags {
                    raw: 0,
                    set: Vec::new(),
                },
            );
        }

        root.leftover.clear();
        stamp(&mut root.header, root_latest);
        Ok(true)
    }
}
