use super::util::{is_outdated, latest, stamp};
use super::{function, Migration};
use crate::error::Result;
use crate::file::Tag;
use crate::fourcc::FourCC;
use crate::schema::{BlockDef, FieldKind, TagGroup};
use crate::value::Struct;

/// `cont`: every `*_function` blob, at the root and in nested blocks, becomes
/// a structured function.
pub struct ContrailMigration;

/// Upgrade one element laid out by `def`. Functions are rewritten only when
/// the element's own region is outdated; nested blocks are checked on their own.
fn upgrade_element(element: &mut Struct, def: &BlockDef, outdated: bool) -> Result<bool> {
    let mut changed = false;
    for field in &def.canonical()?.fields {
        match &field.kind {
            FieldKind::Struct(_) if outdated && field.name.ends_with("_function") => {
                changed |= function::upgrade_field(element, &field.name);
            }
            FieldKind::Block(child) => {
                let Some(block) = element.block_mut(&field.name) else {
                    continue;
                };
                let child_latest = latest(child)?;
                let child_outdated = is_outdated(block.header.as_ref(), child_latest);
                for el in &mut block.elements {
                    changed |= upgrade_element(el, child, child_outdated)?;
                }
                if child_outdated {
                    stamp(&mut block.header, child_latest);
                    changed = true;
                }
            }
            _ => {}
        }
    }
    if outdated {
        element.leftover.clear();
    }
    Ok(changed)
}

impl Migration for ContrailMigration {
    fn group(&self) -> FourCC {
        FourCC(*b"cont")
    }

    fn name(&self) -> &str {
        "contrail"
    }

    fn apply(&self, tag: &mut Tag, schema: &TagGroup) -> Result<bool> {
        let root_latest = latest(&schema.root)?;
        let outdated = is_outdated(tag.root.header.as_ref(), root_latest);
        let mut changed = upgrade_element(&mut tag.root, &schema.root, outdated)?;
        if outdated {
            stamp(&mut tag.root.header, root_latest);
            changed = true;
        }
        Ok(changed)
    }
}
