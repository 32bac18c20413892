use blamtag::migrate::{Function, FunctionKind};
use blamtag::value::Color;
use blamtag::{
    Block, BlockHeader, Engine, FourCC, MigrationConfig, MigrationTable, ReadOptions, SchemaSet, Struct, Tag,
    TagData, TagRef, Value, WriteOptions,
};

/// Header as an older tool would have stored it; the writer fills in the size.
fn stored(name: &[u8; 4], version: i32) -> Option<BlockHeader> {
    Some(BlockHeader {
        name: FourCC(*name),
        version,
        count: 1,
        size: -1,
    })
}

fn old_tag(schemas: &SchemaSet, group: &[u8; 4], engine: Engine, root: Struct) -> Tag {
    let mut tag = Tag::new(schemas.get(FourCC(*group)).unwrap(), engine).unwrap();
    tag.header.version = 1;
    tag.root = Struct {
        header: stored(b"tbfd", 0),
        ..root
    };
    tag
}

/// Write with the stored (old) layouts, then read the file back.
fn reread(tag: &Tag, schemas: &SchemaSet) -> Tag {
    let bytes = tag.write(schemas, &WriteOptions::default()).unwrap();
    Tag::read(&bytes, schemas, &ReadOptions::default()).unwrap()
}

fn real_color(r: f32, g: f32, b: f32) -> Value {
    Value::Color(Color::Real { a: None, r, g, b })
}

fn legacy_function(kind: FunctionKind, flags: u8, values: Vec<f32>) -> (Function, Value) {
    let f = Function { kind, flags, values };
    let blob = Value::Data(TagData::new(f.to_legacy_bytes()));
    (f, blob)
}

#[test]
fn light_color_stops_become_byte_colors() {
    let schemas = SchemaSet::builtin().unwrap();
    let table = MigrationTable::builtin();
    let (intensity, blob) = legacy_function(FunctionKind::Transition, 0, vec![0.0, 1.0, 0.5]);

    let stops = Block {
        header: stored(b"clst", 0),
        elements: vec![
            Struct::new()
                .with("position", Value::Real(0.0))
                .with("color", real_color(1.0, 0.5, 0.0)),
            Struct::new()
                .with("position", Value::Real(1.0))
                .with("color", real_color(0.2, 2.0, -1.0)),
        ],
        ..Block::default()
    };
    let root = Struct::new()
        .with("radius", Value::Real(4.0))
        .with("intensity", blob)
        .with("color_stops", Value::Block(stops));
    let mut tag = reread(&old_tag(&schemas, b"ligh", Engine::Latest, root), &schemas);
    assert_eq!(tag.root.version(), Some(0));
    assert_eq!(tag.root.block("color_stops").unwrap().version(), Some(0));

    let group = schemas.get(FourCC(*b"ligh")).unwrap();
    assert!(table.run(&mut tag, group, &MigrationConfig::default()).unwrap());
    assert_eq!(tag.header.version, group.header_version);

    let migrated = reread(&tag, &schemas);
    assert_eq!(migrated.root.version(), Some(1));
    let stops = migrated.root.block("color_stops").unwrap();
    assert_eq!(stops.version(), Some(1));
    assert_eq!(stops.len(), 2);
    assert_eq!(
        stops.elements[0].get("color"),
        Some(&Value::Color(Color::Byte {
            a: 0xFF,
            r: 255,
            g: 128,
            b: 0
        }))
    );
    assert_eq!(
        stops.elements[1].get("color"),
        Some(&Value::Color(Color::Byte {
            a: 0xFF,
            r: 51,
            g: 255,
            b: 0
        }))
    );
    assert_eq!(stops.elements[1].get("position"), Some(&Value::Real(1.0)));
    assert_eq!(migrated.root.get("radius"), Some(&Value::Real(4.0)));
    assert_eq!(
        Function::from_value(migrated.root.get("intensity").unwrap()),
        Some(intensity)
    );
}

#[test]
fn migrations_are_idempotent() {
    let schemas = SchemaSet::builtin().unwrap();
    let table = MigrationTable::builtin();
    let config = MigrationConfig::default();
    let (_, blob) = legacy_function(FunctionKind::Constant, 1, vec![2.0, 3.0]);
    let root = Struct::new()
        .with("intensity", blob)
        .with("color_stops", Value::Block(Block::default()));
    let mut tag = reread(&old_tag(&schemas, b"ligh", Engine::Mlab, root), &schemas);
    let group = schemas.get(FourCC(*b"ligh")).unwrap();

    assert!(table.run(&mut tag, group, &config).unwrap());
    let once = tag.clone();
    assert!(!table.run(&mut tag, group, &config).unwrap());
    assert_eq!(tag, once);

    let written = tag.write(&schemas, &WriteOptions::default()).unwrap();
    let mut back = Tag::read(&written, &schemas, &ReadOptions::default()).unwrap();
    assert!(!table.run(&mut back, group, &config).unwrap());
    assert_eq!(back.write(&schemas, &WriteOptions::default()).unwrap(), written);
}

#[test]
fn preserve_version_leaves_old_layouts_alone() {
    let schemas = SchemaSet::builtin().unwrap();
    let table = MigrationTable::builtin();
    let root = Struct::new().with("specular_power", Value::Integer(8));
    let mut tag = reread(&old_tag(&schemas, b"shad", Engine::Lamb, root), &schemas);
    let before = tag.clone();
    let group = schemas.get(FourCC(*b"shad")).unwrap();
    assert!(!table
        .run(&mut tag, group, &MigrationConfig::preserve_version())
        .unwrap());
    assert!(!table
        .run(&mut tag, group, &MigrationConfig::from_skip_list(&["shad"]))
        .unwrap());
    assert_eq!(tag, before);
}

#[test]
fn shader_maps_are_synthesized_from_inline_fields() {
    let schemas = SchemaSet::builtin().unwrap();
    let table = MigrationTable::builtin();
    let group = schemas.get(FourCC(*b"shad")).unwrap();
    let map = TagRef::new(FourCC(*b"bitm"), "textures\\rock");

    let root = Struct::new()
        .with(
            "flags",
            Value::Flags {
                raw: 2,
                set: vec!["two_sided".into()],
            },
        )
        .with("specular_power", Value::Integer(16))
        .with("diffuse_map", Value::TagRef(map.clone()))
        .with("map_scale", Value::Real(2.5))
        .with("material_name", Value::String("rock".into()));
    let mut tag = reread(&old_tag(&schemas, b"shad", Engine::Lamb, root), &schemas);
    assert!(table.run(&mut tag, group, &MigrationConfig::default()).unwrap());

    let tag = reread(&tag, &schemas);
    assert_eq!(tag.root.version(), Some(1));
    assert_eq!(tag.root.get("specular_power"), Some(&Value::Real(16.0)));
    assert_eq!(tag.root.get("shader_flags").and_then(Value::as_i64), Some(2));
    assert!(tag.root.get("flags").is_none());
    assert_eq!(tag.root.get("material_name"), Some(&Value::String("rock".into())));
    let maps = tag.root.block("maps").unwrap();
    assert_eq!(maps.len(), 1);
    assert_eq!(maps.elements[0].get("bitmap"), Some(&Value::TagRef(map)));
    assert_eq!(maps.elements[0].get("scale"), Some(&Value::Real(2.5)));
}

#[test]
fn shader_without_map_gets_an_empty_block() {
    let schemas = SchemaSet::builtin().unwrap();
    let table = MigrationTable::builtin();
    let group = schemas.get(FourCC(*b"shad")).unwrap();
    let mut tag = reread(&old_tag(&schemas, b"shad", Engine::Mlab, Struct::new()), &schemas);
    assert!(table.run(&mut tag, group, &MigrationConfig::default()).unwrap());
    let tag = reread(&tag, &schemas);
    assert!(tag.root.block("maps").unwrap().is_empty());
    assert_eq!(tag.root.get("specular_power"), Some(&Value::Real(0.0)));
}

#[test]
fn contrail_functions_upgrade_through_nested_blocks() {
    let schemas = SchemaSet::builtin().unwrap();
    let table = MigrationTable::builtin();
    let group = schemas.get(FourCC(*b"cont")).unwrap();

    let (width, width_blob) = legacy_function(FunctionKind::Linear, 0, vec![1.0, 0.0]);
    let (alpha, alpha_blob) = legacy_function(FunctionKind::Periodic, 1, (0..8).map(|i| i as f32).collect());
    let points = Block {
        header: stored(b"cpnt", 0),
        elements: vec![
            Struct::new()
                .with("position", Value::Vector(vec![1.0, 2.0, 3.0]))
                .with("alpha_function", alpha_blob),
            Struct::new().with("position", Value::Vector(vec![4.0, 5.0, 6.0])),
        ],
        ..Block::default()
    };
    let root = Struct::new()
        .with("width_function", width_blob)
        .with("points", Value::Block(points));

    for engine in [Engine::Mlab, Engine::Latest] {
        let mut tag = reread(&old_tag(&schemas, b"cont", engine, root.clone()), &schemas);
        assert!(table.run(&mut tag, group, &MigrationConfig::default()).unwrap());
        let tag = reread(&tag, &schemas);

        assert_eq!(
            Function::from_value(tag.root.get("width_function").unwrap()),
            Some(width.clone())
        );
        // An empty old blob becomes an identity function.
        let color = Function::from_value(tag.root.get("color_function").unwrap()).unwrap();
        assert_eq!(color.kind, FunctionKind::Identity);

        let points = tag.root.block("points").unwrap();
        assert_eq!(points.version(), Some(1));
        assert_eq!(
            Function::from_value(points.elements[0].get("alpha_function").unwrap()),
            Some(alpha.clone())
        );
        assert_eq!(
            points.elements[1].get("position"),
            Some(&Value::Vector(vec![4.0, 5.0, 6.0]))
        );
    }
}

#[test]
fn bitmaps_have_nothing_to_upgrade() {
    let schemas = SchemaSet::builtin().unwrap();
    let table = MigrationTable::builtin();
    let group = schemas.get(FourCC(*b"bitm")).unwrap();
    let mut tag = Tag::new(group, Engine::Latest).unwrap();
    assert!(!table.run(&mut tag, group, &MigrationConfig::default()).unwrap());
}
