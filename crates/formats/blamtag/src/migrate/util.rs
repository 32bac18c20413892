use crate::error::{Error, Result};
use crate::header::BlockHeader;
use crate::schema::{BlockDef, FieldKind};

pub(super) fn migration_error(group: &str, message: impl Into<String>) -> Error {
    Error::Migration {
        group: group.to_string(),
        message: message.into(),
    }
}

pub(super) fn latest(def: &BlockDef) -> Result<i32> {
    Ok(def.canonical()?.version)
}

/// Whether a region stored with `header` predates `latest`.
///
/// A region without a header was read with the canonical layout.
pub(super) fn is_outdated(header: Option<&BlockHeader>, latest: i32) -> bool {
    header.is_some_and(|h| h.version < latest)
}

/// Record that a region now matches the canonical layout `version`.
///
/// The stored size no longer describes the elements, so it is cleared for
/// the writer to recompute.
pub(super) fn stamp(header: &mut Option<BlockHeader>, version: i32) {
    if let Some(h) = header {
        h.version = version;
        h.size = -1;
    }
}

/// Definition of the block or struct field `name` in `def`'s canonical layout.
pub(super) fn nested<'a>(def: &'a BlockDef, name: &str) -> Result<&'a BlockDef> {
    let layout = def.canonical()?;
    layout
        .fields
        .iter()
        .find(|f| f.name == name)
        .and_then(|f| match &f.kind {
            FieldKind::Block(d) | FieldKind::Struct(d) => Some(d.as_ref()),
            _ => None,
        })
        .ok_or_else(|| migration_error(&def.name, format!("canonical layout has no nested field {name:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourcc::FourCC;

    fn header(version: i32) -> BlockHeader {
        BlockHeader {
            name: FourCC(*b"tbfd"),
            version,
            count: 1,
            size: 12,
        }
    }

    #[test]
    fn only_older_headers_are_outdated() {
        assert!(is_outdated(Some(&header(0)), 1));
        assert!(!is_outdated(Some(&header(1)), 1));
        assert!(!is_outdated(None, 1));
    }

    #[test]
    fn stamp_clears_size() {
        let mut h = Some(header(0));
        stamp(&mut h, 2);
        assert_eq!(h.map(|h| (h.version, h.size)), Some((2, -1)));
        let mut none = None;
        stamp(&mut none, 2);
        assert_eq!(none, None);
    }
}
