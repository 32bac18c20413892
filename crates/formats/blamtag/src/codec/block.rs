//! Block/Struct engine.
//!
//! A block field is a 12-byte inline `count/address/definition` record. When
//! the count is non-zero the parent stream holds the block header (or nothing,
//! for generations without one), then `count × size` element bytes, then each
//! element's own out-of-line data in element order. The tag root is the same
//! region shape with an implicit count of one.

use tracing::{debug, warn};

use super::{CodecContext, FieldCodec, BLOCK_FIELD_SIZE};
use crate::cursor::{Cursor, Writer};
use crate::engine::StructHeaderPlacement;
use crate::error::Result;
use crate::header::BlockHeader;
use crate::schema::{BlockDef, FieldKind, Layout};
use crate::value::{Block, Struct, Value};

/// Upper bound on elements materialized from one region.
const MAX_ELEMENTS: usize = 1 << 24;

/// Sum of the inline widths of a layout's fields.
pub fn layout_width(layout: &Layout, ctx: &CodecContext) -> usize {
    layout.fields.iter().map(|f| f.width(ctx)).sum()
}

/// Decode one element's fields from `inline`.
///
/// Once a field finds too few bytes left, it and every later field take
/// their defaults; whatever bytes remain unread become the leftover.
pub fn decode_element(
    layout: &Layout,
    ctx: &CodecContext,
    inline: &mut Cursor<'_>,
    stream: &mut Cursor<'_>,
) -> Result<Struct> {
    let mut element = Struct {
        header: None,
        fields: Vec::with_capacity(layout.fields.len()),
        leftover: Vec::new(),
    };
    let mut truncated = false;
    for field in &layout.fields {
        // Structs size themselves from their own header.
        let sized = !matches!(field.kind, FieldKind::Struct(_));
        let value = if truncated {
            field.default_value()
        } else if sized && inline.remaining() < field.width(ctx) {
            truncated = true;
            field.default_value()
        } else {
            field.decode(ctx, inline, stream)?
        };
        element.fields.push((field.name.clone(), value));
    }
    element.leftover = inline.rest().to_vec();
    Ok(element)
}

/// Encode one element into exactly `size` inline bytes.
///
/// Fields that no longer fit in `size` are dropped (their region was
/// truncated when read); `keep_leftover` re-appends the preserved tail.
pub fn encode_element(
    layout: &Layout,
    ctx: &CodecContext,
    element: &Struct,
    size: usize,
    keep_leftover: bool,
    inline: &mut Writer,
    stream: &mut Writer,
) -> Result<()> {
    let mut buf = Writer::with_capacity(size);
    let mut tail = Writer::new();
    // Inline structs live inside this element's size; once it is recomputed
    // from the layout, theirs must be too.
    let resized = CodecContext {
        preserve_sizes: false,
        ..*ctx
    };
    for (i, field) in layout.fields.iter().enumerate() {
        let value = element.field_at(i, &field.name);
        let field_ctx = match field.kind {
            FieldKind::Struct(_) if !keep_leftover => &resized,
            _ => ctx,
        };
        let mut field_inline = Writer::new();
        let mut field_stream = Writer::new();
        field.encode(field_ctx, value, &mut field_inline, &mut field_stream)?;
        if buf.position() + field_inline.position() > size {
            break;
        }
        buf.write_bytes(field_inline.as_slice());
        tail.write_bytes(field_stream.as_slice());
    }
    if keep_leftover {
        buf.write_bytes(&element.leftover);
    }
    buf.resize(size);
    inline.write_bytes(buf.as_slice());
    stream.write_bytes(tail.as_slice());
    Ok(())
}

/// Element size and leftover policy for a write.
///
/// A preserved header keeps its stored size only when writing back to the
/// generation it came from; otherwise the size is recomputed from the layout.
fn region_size(
    layout: &Layout,
    stored: Option<&BlockHeader>,
    preserved: bool,
    ctx: &CodecContext,
) -> (usize, bool) {
    match stored {
        Some(h) if preserved && ctx.preserve_sizes && h.size >= 0 => (h.size as usize, true),
        _ => (layout_width(layout, ctx), false),
    }
}

/// Read the header for a region of `count` elements, synthesizing one for
/// generations that store none. `None` means the stream ran out.
fn read_region_header(
    def: &BlockDef,
    ctx: &CodecContext,
    stream: &mut Cursor<'_>,
    count: i32,
) -> Result<Option<BlockHeader>> {
    let Some(header_size) = ctx.engine.block_header_size() else {
        let layout = def.canonical()?;
        return Ok(Some(BlockHeader {
            name: def.header_name,
            version: layout.version,
            count,
            size: layout_width(layout, ctx) as i32,
        }));
    };
    if stream.remaining() < header_size {
        warn!(
            block = %def.name,
            offset = stream.position(),
            "block header truncated; treating block as empty"
        );
        return Ok(None);
    }
    let header = BlockHeader::read(stream, ctx.engine, count)?;
    if header.count != count {
        warn!(
            block = %def.name,
            inline = count,
            stored = header.count,
            "block header count disagrees with field count; using field count"
        );
    }
    if header.name != def.header_name {
        debug!(block = %def.name, name = %header.name, "unexpected block header name");
    }
    Ok(Some(BlockHeader { count, ..header }))
}

/// Read `count` elements laid out per `header` from the stream.
fn read_elements(
    def: &BlockDef,
    layout: &Layout,
    header: &BlockHeader,
    count: usize,
    ctx: &CodecContext,
    stream: &mut Cursor<'_>,
) -> Result<Vec<Struct>> {
    let size = header.size.max(0) as usize;
    let width = layout_width(layout, ctx);
    if size != width {
        warn!(
            block = %def.name,
            version = layout.version,
            stored = size,
            computed = width,
            "element size differs from layout width"
        );
    }

    if size == 0 && count > 0 {
        if width > 0 {
            warn!(
                block = %def.name,
                count,
                "zero element size for a non-empty layout; dropping elements"
            );
            return Ok(Vec::new());
        }
        let cap = count.min(stream.remaining());
        if cap < count {
            warn!(block = %def.name, count, cap, "zero-width elements capped by remaining data");
        }
        return (0..cap)
            .map(|_| decode_element(layout, ctx, &mut Cursor::new(&[]), stream))
            .collect();
    }

    let total = size.saturating_mul(count);
    let region = stream.read_available(total);
    let mut count = count;
    if region.len() < total {
        warn!(
            block = %def.name,
            need = total,
            have = region.len(),
            "block elements truncated"
        );
        count = region.len().div_ceil(size.max(1));
    }
    if count > MAX_ELEMENTS {
        warn!(block = %def.name, count, "element count exceeds limit; truncating");
        count = MAX_ELEMENTS;
    }

    let mut elements = Vec::with_capacity(count);
    for i in 0..count {
        let start = (i * size).min(region.len());
        let end = ((i + 1) * size).min(region.len());
        let mut inline = Cursor::new(&region[start..end]);
        elements.push(decode_element(layout, ctx, &mut inline, stream)?);
    }
    Ok(elements)
}

/// Write header, element array and out-of-line data for a region.
fn write_region(
    def: &BlockDef,
    ctx: &CodecContext,
    stored: Option<&BlockHeader>,
    elements: &[Struct],
    stream: &mut Writer,
) -> Result<()> {
    let stored = stored.filter(|_| ctx.engine.block_header_size().is_some());
    let (layout, preserved) = def.layout_for_write(stored)?;
    let (size, keep_leftover) = region_size(layout, stored, preserved, ctx);
    debug!(
        block = %def.name,
        version = layout.version,
        preserved,
        size,
        count = elements.len(),
        "writing region"
    );
    let header = BlockHeader {
        name: stored.map(|h| h.name).unwrap_or(def.header_name),
        version: layout.version,
        count: elements.len() as i32,
        size: size as i32,
    };
    header.write(stream, ctx.engine);

    let mut array = Writer::with_capacity(size * elements.len());
    let mut children = Writer::new();
    for element in elements {
        encode_element(layout, ctx, element, size, keep_leftover, &mut array, &mut children)?;
    }
    stream.write_bytes(array.as_slice());
    stream.write_bytes(children.as_slice());
    Ok(())
}

pub(crate) fn decode_block(
    def: &BlockDef,
    ctx: &CodecContext,
    inline: &mut Cursor<'_>,
    stream: &mut Cursor<'_>,
) -> Result<Value> {
    if inline.remaining() < BLOCK_FIELD_SIZE {
        return Ok(Value::Block(Block::default()));
    }
    let e = ctx.endian();
    let count = inline.read_i32(e)?;
    let address = inline.read_u32(e)?;
    let definition = inline.read_u32(e)?;
    let mut block = Block {
        header: None,
        address,
        definition,
        elements: Vec::new(),
    };
    if count <= 0 {
        return Ok(Value::Block(block));
    }
    let Some(header) = read_region_header(def, ctx, stream, count)? else {
        return Ok(Value::Block(block));
    };
    let layout = def.layout_for_read(Some(&header))?;
    block.elements = read_elements(def, layout, &header, count as usize, ctx, stream)?;
    block.header = Some(header);
    Ok(Value::Block(block))
}

pub(crate) fn encode_block(
    def: &BlockDef,
    ctx: &CodecContext,
    value: Option<&Value>,
    inline: &mut Writer,
    stream: &mut Writer,
) -> Result<()> {
    let empty = Block::default();
    let block = match value {
        Some(Value::Block(b)) => b,
        _ => &empty,
    };
    let e = ctx.endian();
    inline.write_i32(block.elements.len() as i32, e);
    inline.write_u32(block.address, e);
    inline.write_u32(block.definition, e);
    if block.elements.is_empty() {
        return Ok(());
    }
    write_region(def, ctx, block.header.as_ref(), &block.elements, stream)
}

/// Look for an optional struct header at the head of the stream.
///
/// The header is only taken when the next four bytes spell the struct's
/// header name; otherwise the stream is left untouched. A payload that
/// happens to start with the same bytes is misread as a header.
fn peek_struct_header(def: &BlockDef, ctx: &CodecContext, stream: &mut Cursor<'_>) -> Result<Option<BlockHeader>> {
    let Some(header_size) = ctx.engine.block_header_size() else {
        return Ok(None);
    };
    if stream.remaining() < header_size {
        return Ok(None);
    }
    let mut expected = def.header_name.0;
    if ctx.endian() == crate::engine::Endian::Little {
        expected.reverse();
    }
    if stream.peek_array::<4>() != Some(expected) {
        return Ok(None);
    }
    Ok(Some(BlockHeader::read(stream, ctx.engine, 1)?))
}

pub(crate) fn decode_struct(
    def: &BlockDef,
    ctx: &CodecContext,
    inline: &mut Cursor<'_>,
    stream: &mut Cursor<'_>,
) -> Result<Value> {
    let header = match ctx.engine.struct_header() {
        StructHeaderPlacement::None => None,
        StructHeaderPlacement::OutOfLine => peek_struct_header(def, ctx, stream)?,
        StructHeaderPlacement::Inline => {
            let header_size = ctx.engine.block_header_size().unwrap_or(0);
            if inline.remaining() >= header_size {
                Some(BlockHeader::read(inline, ctx.engine, 1)?)
            } else {
                None
            }
        }
    };
    let layout = def.layout_for_read(header.as_ref())?;
    let size = match header {
        Some(h) => h.size.max(0) as usize,
        None => layout_width(layout, ctx),
    };
    let bytes = inline.read_available(size);
    let mut element = decode_element(layout, ctx, &mut Cursor::new(bytes), stream)?;
    element.header = header;
    Ok(Value::Struct(element))
}

pub(crate) fn encode_struct(
    def: &BlockDef,
    ctx: &CodecContext,
    value: Option<&Value>,
    inline: &mut Writer,
    stream: &mut Writer,
) -> Result<()> {
    let empty = Struct::default();
    let element = match value {
        Some(Value::Struct(s)) => s,
        _ => &empty,
    };
    let placement = ctx.engine.struct_header();
    // Without preserved sizes the struct is as wide as `width` says: the
    // canonical layout, whatever version it was read with.
    let stored = element
        .header
        .as_ref()
        .filter(|_| placement != StructHeaderPlacement::None && ctx.preserve_sizes);
    let (layout, preserved) = def.layout_for_write(stored)?;
    let (size, keep_leftover) = region_size(layout, stored, preserved, ctx);
    let header = BlockHeader {
        name: element.header.as_ref().map(|h| h.name).unwrap_or(def.header_name),
        version: layout.version,
        count: 1,
        size: size as i32,
    };
    match placement {
        StructHeaderPlacement::None => {}
        StructHeaderPlacement::OutOfLine => {
            if element.header.is_some() {
                header.write(stream, ctx.engine);
            }
        }
        StructHeaderPlacement::Inline => header.write(inline, ctx.engine),
    }
    encode_element(layout, ctx, element, size, keep_leftover, inline, stream)
}

/// Read the tag root: an optional root header, then one element.
pub(crate) fn read_root(def: &BlockDef, ctx: &CodecContext, stream: &mut Cursor<'_>) -> Result<Struct> {
    let header = match ctx.engine.block_header_size() {
        None => None,
        Some(_) => {
            let h = BlockHeader::read(stream, ctx.engine, 1)?;
            if h.count != 1 {
                warn!(count = h.count, "root header count is not 1");
            }
            Some(h)
        }
    };
    let layout = def.layout_for_read(header.as_ref())?;
    let width = layout_width(layout, ctx);
    let size = match header {
        Some(h) => h.size.max(0) as usize,
        None => width,
    };
    if size != width {
        warn!(
            group = %def.name,
            version = layout.version,
            stored = size,
            computed = width,
            "root size differs from layout width"
        );
    }
    let bytes = stream.read_available(size);
    let mut root = decode_element(layout, ctx, &mut Cursor::new(bytes), stream)?;
    root.header = header;
    Ok(root)
}

/// Write the tag root region.
pub(crate) fn write_root(def: &BlockDef, ctx: &CodecContext, root: &Struct, stream: &mut Writer) -> Result<()> {
    write_region(def, ctx, root.header.as_ref(), std::slice::from_ref(root), stream)
}
