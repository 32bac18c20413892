use std::path::Path;

use blamtag::deps::{tag_file, SkipReason};
use blamtag::schema::{BlockDef, FieldDef, FieldKind};
use blamtag::{
    Block, DependencyWalker, Engine, FourCC, MigrationConfig, MigrationTable, SchemaSet, Struct, Tag, TagCache,
    TagGroup, TagRef, Value, WriteOptions,
};

const NODE: FourCC = FourCC(*b"node");

/// A group whose tags point at other tags: one direct reference plus a block of them.
fn node_schemas() -> SchemaSet {
    let links = BlockDef::single("links", 0, vec![FieldDef::new("target", FieldKind::TagReference)]);
    let root = BlockDef::single(
        "node",
        0,
        vec![
            FieldDef::new("weight", FieldKind::Real),
            FieldDef::new("next", FieldKind::TagReference),
            FieldDef::new("links", FieldKind::Block(Box::new(links))),
        ],
    );
    let mut set = SchemaSet::new();
    set.insert(TagGroup {
        group: NODE,
        name: "node".into(),
        extension: "node".into(),
        header_version: 1,
        root,
    });
    set
}

fn write_node(schemas: &SchemaSet, dir: &Path, path: &str, weight: f32, next: TagRef, links: Vec<TagRef>) {
    let mut tag = Tag::new(schemas.get(NODE).unwrap(), Engine::Latest).unwrap();
    tag.root.set("weight", Value::Real(weight));
    tag.root.set("next", Value::TagRef(next));
    let elements = links
        .into_iter()
        .map(|r| Struct::new().with("target", Value::TagRef(r)))
        .collect();
    tag.root.set("links", Value::Block(Block::new(elements)));
    tag.write_file(&tag_file(dir, path, "node"), schemas, &WriteOptions::default())
        .unwrap();
}

fn node(path: &str) -> TagRef {
    TagRef::new(NODE, path)
}

/// `a -> b -> A` plus a missing node and a reference to a group without a schema.
fn cyclic_tree(schemas: &SchemaSet, dir: &Path) {
    write_node(
        schemas,
        dir,
        "a",
        1.0,
        node("sub\\b"),
        vec![node("gone"), TagRef::new(FourCC(*b"ligh"), "fx\\glow"), TagRef::null()],
    );
    write_node(schemas, dir, "sub\\b", 2.0, node("A"), Vec::new());
}

#[test]
fn reference_cycles_terminate() {
    let schemas = node_schemas();
    let tags = tempfile::tempdir().unwrap();
    cyclic_tree(&schemas, tags.path());

    let report = DependencyWalker::new(&schemas, tags.path()).walk(&node("a")).unwrap();
    let loaded: Vec<&str> = report.tags.iter().map(|t| t.path.as_str()).collect();
    assert_eq!(loaded, ["a", "sub\\b"]);
    assert_eq!(
        report.get("SUB\\B", NODE).unwrap().tag.root.get("weight"),
        Some(&Value::Real(2.0))
    );
    assert!(report.errors.is_empty());

    let reasons: Vec<(&str, SkipReason)> = report.skipped.iter().map(|s| (s.path.as_str(), s.reason)).collect();
    assert_eq!(
        reasons,
        [("gone", SkipReason::Missing), ("fx\\glow", SkipReason::Unsupported)]
    );
}

#[test]
fn group_filter_stops_at_disallowed_references() {
    let schemas = node_schemas();
    let tags = tempfile::tempdir().unwrap();
    cyclic_tree(&schemas, tags.path());

    let report = DependencyWalker::new(&schemas, tags.path())
        .with_groups([FourCC(*b"bitm")])
        .walk(&node("a"))
        .unwrap();
    assert_eq!(report.tags.len(), 1);
    assert!(report
        .skipped
        .iter()
        .all(|s| s.reason == SkipReason::NotAllowed));
    assert_eq!(report.skipped.len(), 3);
}

#[test]
fn second_walk_is_served_from_the_cache() {
    let schemas = node_schemas();
    let tags = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    cyclic_tree(&schemas, tags.path());

    let walk = || {
        DependencyWalker::new(&schemas, tags.path())
            .with_cache(TagCache::open(cache_dir.path()).unwrap())
            .walk(&node("a"))
            .unwrap()
    };

    let first = walk();
    assert_eq!(first.cache_hits(), 0);
    let second = walk();
    assert_eq!(second.cache_hits(), 2);
    for (a, b) in first.tags.iter().zip(&second.tags) {
        assert_eq!(a.tag, b.tag);
    }

    // Editing one file invalidates only its artifact.
    write_node(&schemas, tags.path(), "sub\\b", 3.0, node("a"), Vec::new());
    let third = walk();
    assert_eq!(third.cache_hits(), 1);
    assert!(!third.get("sub\\b", NODE).unwrap().from_cache);
    assert_eq!(
        third.get("sub\\b", NODE).unwrap().tag.root.get("weight"),
        Some(&Value::Real(3.0))
    );
}

#[test]
fn walked_tags_are_migrated_after_loading() {
    let schemas = SchemaSet::builtin().unwrap();
    let table = MigrationTable::builtin();
    let tags = tempfile::tempdir().unwrap();

    let bitmap = TagRef::new(FourCC(*b"bitm"), "textures\\rock");
    let bitm = Tag::new(schemas.get(FourCC(*b"bitm")).unwrap(), Engine::Lamb).unwrap();
    bitm.write_file(
        &tag_file(tags.path(), &bitmap.path, "bitmap"),
        &schemas,
        &WriteOptions::default(),
    )
    .unwrap();

    // An old shader that still carries its map inline.
    let mut shader = Tag::new(schemas.get(FourCC(*b"shad")).unwrap(), Engine::Lamb).unwrap();
    shader.root = Struct::new()
        .with("diffuse_map", Value::TagRef(bitmap.clone()))
        .with("map_scale", Value::Real(1.0));
    shader.root.header = Some(blamtag::BlockHeader {
        name: FourCC(*b"tbfd"),
        version: 0,
        count: 1,
        size: -1,
    });
    shader
        .write_file(
            &tag_file(tags.path(), "rock", "shader"),
            &schemas,
            &WriteOptions::default(),
        )
        .unwrap();

    let report = DependencyWalker::new(&schemas, tags.path())
        .with_migrations(&table, MigrationConfig::default())
        .walk(&TagRef::new(FourCC(*b"shad"), "rock"))
        .unwrap();
    assert_eq!(report.tags.len(), 2);
    assert!(report.get("textures\\rock", FourCC(*b"bitm")).is_some());
    let shader = &report.get("rock", FourCC(*b"shad")).unwrap().tag;
    assert_eq!(shader.root.version(), Some(1));
    assert_eq!(shader.root.block("maps").unwrap().len(), 1);
}
