//! JSON field-layout descriptors and their compilation into the typed graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{BlockDef, FieldDef, FieldKind, Layout, TagGroup};
use crate::engine::Endian;
use crate::error::{Error, Result};
use crate::fourcc::FourCC;

fn default_header_name() -> String {
    "tbfd".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDescriptor {
    pub group: String,
    pub name: String,
    pub extension: String,
    #[serde(default)]
    pub version: i16,
    #[serde(default = "default_header_name")]
    pub header_name: String,
    pub layouts: Vec<LayoutDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutDescriptor {
    pub version: i32,
    #[serde(default)]
    pub latest: bool,
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub unsigned: bool,
    #[serde(default)]
    pub endian: Option<Endian>,
    /// Byte length for `pad` and `skip`.
    #[serde(default)]
    pub length: Option<usize>,
    /// Enum symbols, or flag names by bit position.
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub header_name: Option<String>,
    #[serde(default)]
    pub layouts: Vec<LayoutDescriptor>,
}

/// Parse and compile one group descriptor.
pub fn compile_json(json: &str) -> Result<TagGroup> {
    let desc: GroupDescriptor = serde_json::from_str(json)?;
    compile_group(&desc)
}

pub fn compile_group(desc: &GroupDescriptor) -> Result<TagGroup> {
    let group = fourcc(&desc.group, &desc.name)?;
    let header_name = fourcc(&desc.header_name, &desc.name)?;
    let root = compile_block(&desc.name, header_name, &desc.layouts)?;
    Ok(TagGroup {
        group,
        name: desc.name.clone(),
        extension: desc.extension.clone(),
        header_version: desc.version,
        root,
    })
}

fn fourcc(code: &str, context: &str) -> Result<FourCC> {
    FourCC::from_str_padded(code)
        .ok_or_else(|| Error::schema(context, format!("invalid four-character code {code:?}")))
}

fn compile_block(name: &str, header_name: FourCC, layouts: &[LayoutDescriptor]) -> Result<BlockDef> {
    if layouts.is_empty() {
        return Err(Error::schema(name, "no layouts"));
    }
    let mut compiled = BTreeMap::new();
    let mut latest = None;
    for layout in layouts {
        if layout.latest {
            if let Some(prev) = latest {
                return Err(Error::schema(
                    name,
                    format!("versions {prev} and {} both flagged latest", layout.version),
                ));
            }
            latest = Some(layout.version);
        }
        let fields = layout
            .fields
            .iter()
            .map(|f| compile_field(name, f))
            .collect::<Result<Vec<_>>>()?;
        let previous = compiled.insert(
            layout.version,
            Layout {
                version: layout.version,
                fields,
            },
        );
        if previous.is_some() {
            return Err(Error::schema(
                name,
                format!("duplicate layout version {}", layout.version),
            ));
        }
    }
    Ok(BlockDef {
        name: name.to_string(),
        header_name,
        layouts: compiled,
        latest,
    })
}

fn compile_field(parent: &str, f: &FieldDescriptor) -> Result<FieldDef> {
    let context = || format!("{parent}.{}", f.name);
    let options = || f.options.clone();
    let length = || {
        f.length
            .ok_or_else(|| Error::schema(context(), format!("{} requires a length", f.kind)))
    };
    let nested = |default: &str| -> Result<Box<BlockDef>> {
        let header = f.header_name.as_deref().unwrap_or(default);
        let header_name = fourcc(header, &context())?;
        Ok(Box::new(compile_block(&f.name, header_name, &f.layouts)?))
    };

    let kind = match f.kind.as_str() {
        "char_integer" => FieldKind::CharInteger,
        "short_integer" => FieldKind::ShortInteger,
        "long_integer" => FieldKind::LongInteger,
        "int64_integer" => FieldKind::Int64Integer,
        "tag" => FieldKind::Tag,
        "real" => FieldKind::Real,
        "real_fraction" => FieldKind::RealFraction,
        "angle" => FieldKind::Angle,
        "char_block_index" => FieldKind::CharBlockIndex,
        "short_block_index" => FieldKind::ShortBlockIndex,
        "long_block_index" => FieldKind::LongBlockIndex,
        "char_enum" => FieldKind::CharEnum(options()),
        "short_enum" => FieldKind::ShortEnum(options()),
        "long_enum" => FieldKind::LongEnum(options()),
        "byte_flags" => FieldKind::ByteFlags(options()),
        "word_flags" => FieldKind::WordFlags(options()),
        "long_flags" => FieldKind::LongFlags(options()),
        "short_bounds" => FieldKind::ShortBounds,
        "real_bounds" => FieldKind::RealBounds,
        "real_fraction_bounds" => FieldKind::RealFractionBounds,
        "angle_bounds" => FieldKind::AngleBounds,
        "point_2d" => FieldKind::Point2d,
        "rectangle_2d" => FieldKind::Rectangle2d,
        "real_point_2d" => FieldKind::RealPoint2d,
        "real_point_3d" => FieldKind::RealPoint3d,
        "real_vector_2d" => FieldKind::RealVector2d,
        "real_vector_3d" => FieldKind::RealVector3d,
        "real_quaternion" => FieldKind::RealQuaternion,
        "real_euler_angles_2d" => FieldKind::RealEulerAngles2d,
        "real_euler_angles_3d" => FieldKind::RealEulerAngles3d,
        "real_plane_2d" => FieldKind::RealPlane2d,
        "real_plane_3d" => FieldKind::RealPlane3d,
        "real_matrix_3x3" => FieldKind::RealMatrix3x3,
        "rgb_color" => FieldKind::RgbColor,
        "argb_color" => FieldKind::ArgbColor,
        "real_rgb_color" => FieldKind::RealRgbColor,
        "real_argb_color" => FieldKind::RealArgbColor,
        "real_hsv_color" => FieldKind::RealHsvColor,
        "real_ahsv_color" => FieldKind::RealAhsvColor,
        "string" => FieldKind::String,
        "long_string" => FieldKind::LongString,
        "string_id" => FieldKind::StringId,
        "tag_reference" => FieldKind::TagReference,
        "data" => FieldKind::Data,
        "block" => FieldKind::Block(nested("tbfd")?),
        "struct" => FieldKind::Struct(nested("tbfd")?),
        "pad" => FieldKind::Pad(length()?),
        "skip" => FieldKind::Skip(length()?),
        "explanation" => FieldKind::Explanation,
        "custom" => FieldKind::Custom,
        other => {
            return Err(Error::schema(context(), format!("unknown field kind {other:?}")));
        }
    };

    Ok(FieldDef {
        name: f.name.clone(),
        kind,
        unsigned: f.unsigned,
        endian: f.endian,
    })
}
