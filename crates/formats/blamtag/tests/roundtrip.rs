use std::path::Path;

use blamtag::batch::Outcome;
use blamtag::header::CHECKSUM_OFFSET;
use blamtag::value::Color;
use blamtag::{
    convert_dir, verify_round_trip, Block, ConvertOptions, Engine, FourCC, MigrationConfig, MigrationTable,
    ReadOptions, SchemaSet, Struct, Tag, TagData, TagRef, Value, WriteOptions,
};

fn light(schemas: &SchemaSet, engine: Engine) -> Tag {
    let mut tag = Tag::new(schemas.get(FourCC(*b"ligh")).unwrap(), engine).unwrap();
    tag.root.set("radius", Value::Real(-0.0));
    tag.root.set("cutoff_angle", Value::Angle(45.0));
    tag.root.set(
        "lens_flare",
        Value::TagRef(TagRef::new(FourCC(*b"lens"), "fx\\flares\\sun")),
    );
    let stop = |position: f32, r: u8| {
        Struct::new().with("position", Value::Real(position)).with(
            "color",
            Value::Color(Color::Byte {
                a: 0xFF,
                r,
                g: 10,
                b: 20,
            }),
        )
    };
    tag.root.set(
        "color_stops",
        Value::Block(Block::new(vec![stop(0.0, 1), stop(0.5, 2), stop(1.0, 3)])),
    );
    tag
}

fn bitmap(schemas: &SchemaSet, engine: Engine) -> Tag {
    let mut tag = Tag::new(schemas.get(FourCC(*b"bitm")).unwrap(), engine).unwrap();
    tag.root.set("bump_height", Value::Real(0.25));
    tag.root.set(
        "compressed_color_plate",
        Value::Data(TagData::new((0u8..=200).collect())),
    );
    tag.root.set(
        "sequences",
        Value::Block(Block::new(vec![Struct::new()
            .with("name", Value::String("idle".into()))
            .with("bitmap_count", Value::Integer(4))])),
    );
    tag
}

fn write(tag: &Tag, schemas: &SchemaSet, dir: &Path, name: &str) {
    tag.write_file(&dir.join(name), schemas, &WriteOptions::default())
        .unwrap();
}

#[test]
fn every_generation_rewrites_identically() {
    let schemas = SchemaSet::builtin().unwrap();
    let dir = tempfile::tempdir().unwrap();
    for engine in Engine::ALL {
        let sub = dir.path().join(engine.to_string());
        write(&light(&schemas, engine), &schemas, &sub, "sun.light");
        write(&bitmap(&schemas, engine), &schemas, &sub, "rock.bitmap");
    }
    std::fs::write(dir.path().join("notes.txt"), b"not a tag").unwrap();

    let report = verify_round_trip(dir.path(), &schemas);
    assert_eq!(report.identical(), 10, "{report}");
    assert_eq!(report.skipped(), 1);
    assert!(report.is_clean());
}

#[test]
fn stale_checksum_is_reported_as_mismatch() {
    let schemas = SchemaSet::builtin().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("sun.light");
    write(&light(&schemas, Engine::Mlab), &schemas, dir.path(), "sun.light");

    let mut bytes = std::fs::read(&file).unwrap();
    bytes[CHECKSUM_OFFSET] ^= 0xFF;
    std::fs::write(&file, &bytes).unwrap();

    let report = verify_round_trip(dir.path(), &schemas);
    assert_eq!(report.mismatched(), 1);
    assert!(!report.is_clean());
    match &report.files[0].outcome {
        Outcome::Mismatch {
            source_sha256,
            output_sha256,
        } => assert_ne!(source_sha256, output_sha256),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn unsupported_groups_are_skipped() {
    let schemas = SchemaSet::builtin().unwrap();
    let mut only_lights = SchemaSet::new();
    only_lights.insert(schemas.get(FourCC(*b"ligh")).unwrap().clone());

    let dir = tempfile::tempdir().unwrap();
    write(&light(&schemas, Engine::Latest), &schemas, dir.path(), "sun.light");
    write(&bitmap(&schemas, Engine::Latest), &schemas, dir.path(), "rock.bitmap");

    let report = verify_round_trip(dir.path(), &only_lights);
    assert_eq!(report.identical(), 1);
    assert_eq!(report.skipped(), 1);
}

#[test]
fn legacy_tree_converts_to_latest() {
    let schemas = SchemaSet::builtin().unwrap();
    let table = MigrationTable::builtin();
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    write(&light(&schemas, Engine::Legacy), &schemas, src.path(), "fx/sun.light");
    write(&bitmap(&schemas, Engine::Legacy), &schemas, src.path(), "rock.bitmap");

    let opts = ConvertOptions {
        engine: Engine::Latest,
        migrations: &table,
        config: MigrationConfig::default(),
    };
    let report = convert_dir(src.path(), dst.path(), &schemas, &opts);
    assert_eq!(report.converted(), 2, "{report}");

    let converted = Tag::read_file(
        &dst.path().join("fx").join("sun.light"),
        &schemas,
        &ReadOptions::default(),
    )
    .unwrap();
    assert_eq!(converted.engine(), Engine::Latest);
    let angle = converted.root.get("cutoff_angle").and_then(Value::as_f32).unwrap();
    assert!((angle - 45.0).abs() < 1e-4);
    assert_eq!(converted.tag_refs()[0].path, "fx\\flares\\sun");
    let stops = converted.root.block("color_stops").unwrap();
    assert_eq!(stops.len(), 3);
    assert_eq!(stops.version(), Some(1));

    // Converted output is itself stable.
    assert!(verify_round_trip(dst.path(), &schemas).is_clean());
}
