//! Document encoding/decoding for the binary plist format.
//!
//! A document is an 8-byte header (`bplist00`), the object table, an offset table
//! with one entry per object, and a 32-byte trailer:
//!
//! ```text
//! [0..5]   unused
//! [5]      sort version
//! [6]      offset table entry width
//! [7]      object reference width
//! [8..16]  object count (u64 BE)
//! [16..24] top object index (u64 BE)
//! [24..32] offset table start (u64 BE)
//! ```

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::codec::primitives::{min_width, Reader, Writer};
use crate::codec::value::{decode_object, encode_container, encode_leaf, encode_string, Marker, RawObject};
use crate::error::{DecodeError, EncodeError, GraphError};
use crate::limits::{FORMAT_VERSION, HEADER_LEN, MAGIC, MAX_DOCUMENT_SIZE, TRAILER_LEN};
use crate::model::{ObjectRef, Plist, Value};

// =============================================================================
// DECODING
// =============================================================================

/// Parsed and validated trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub offset_size: usize,
    pub ref_size: usize,
    pub object_count: u64,
    pub top_object: u64,
    pub offset_table_start: u64,
}

/// Decodes a binary plist into a graph.
///
/// Only objects reachable from the top object are materialised. Every object-table
/// index is resolved at most once, so shared references decode to one shared arena
/// slot and cyclic references to a cycle in the arena.
pub fn decode(input: &[u8]) -> Result<Plist, DecodeError> {
    if input.len() > MAX_DOCUMENT_SIZE {
        return Err(DecodeError::LengthExceedsLimit {
            field: "document",
            len: input.len(),
            max: MAX_DOCUMENT_SIZE,
        });
    }
    check_header(input)?;
    let trailer = read_trailer(input)?;

    let objects_area = &input[..trailer.offset_table_start as usize];
    let mut resolver = Resolver {
        input,
        objects_area,
        trailer,
        memo: FxHashMap::default(),
        keys: FxHashMap::default(),
        arena: Vec::new(),
        pending: Vec::new(),
    };
    let root = resolver.intern(trailer.top_object);
    resolver.run()?;

    Ok(Plist::from_parts(resolver.arena, root))
}

fn check_header(input: &[u8]) -> Result<(), DecodeError> {
    if input.len() < MAGIC.len() {
        return Err(DecodeError::UnexpectedEof { context: "magic" });
    }
    if &input[..MAGIC.len()] != MAGIC {
        let mut found = [0u8; 6];
        found.copy_from_slice(&input[..MAGIC.len()]);
        return Err(DecodeError::InvalidMagic { found });
    }
    if input.len() < HEADER_LEN {
        return Err(DecodeError::UnexpectedEof { context: "version" });
    }
    if &input[MAGIC.len()..HEADER_LEN] != FORMAT_VERSION {
        let mut version = [0u8; 2];
        version.copy_from_slice(&input[MAGIC.len()..HEADER_LEN]);
        return Err(DecodeError::UnsupportedVersion { version });
    }
    Ok(())
}

/// Reads the trailer and checks it against the buffer.
pub fn read_trailer(input: &[u8]) -> Result<Trailer, DecodeError> {
    if input.len() < HEADER_LEN + TRAILER_LEN {
        return Err(DecodeError::UnexpectedEof { context: "trailer" });
    }
    let trailer_start = input.len() - TRAILER_LEN;
    let mut reader = Reader::new(&input[trailer_start..]);
    reader.read_bytes(6, "trailer padding")?;
    let offset_size = reader.read_byte("offset size")? as usize;
    let ref_size = reader.read_byte("reference size")? as usize;
    let object_count = reader.read_uint(8, "object count")?;
    let top_object = reader.read_uint(8, "top object")?;
    let offset_table_start = reader.read_uint(8, "offset table start")?;

    if !(1..=8).contains(&offset_size) {
        return Err(DecodeError::InvalidWidth { kind: "offset", width: offset_size });
    }
    if !(1..=8).contains(&ref_size) {
        return Err(DecodeError::InvalidWidth { kind: "reference", width: ref_size });
    }
    if object_count == 0 {
        return Err(DecodeError::InvalidTrailer { context: "object count is zero" });
    }
    if ref_size < 8 && (object_count - 1) >> (ref_size * 8) != 0 {
        return Err(DecodeError::InvalidTrailer {
            context: "reference width too narrow for object count",
        });
    }
    if top_object >= object_count {
        return Err(DecodeError::ReferenceOutOfBounds {
            index: top_object,
            count: object_count,
        });
    }
    if offset_table_start < HEADER_LEN as u64 {
        return Err(DecodeError::InvalidTrailer { context: "offset table overlaps header" });
    }
    let table_end = object_count
        .checked_mul(offset_size as u64)
        .and_then(|len| len.checked_add(offset_table_start));
    match table_end {
        Some(end) if end <= trailer_start as u64 => {}
        _ => {
            return Err(DecodeError::InvalidTrailer {
                context: "offset table exceeds buffer",
            });
        }
    }

    Ok(Trailer {
        offset_size,
        ref_size,
        object_count,
        top_object,
        offset_table_start,
    })
}

/// Work-list driven object resolution with a memo keyed by object-table index.
struct Resolver<'a> {
    input: &'a [u8],
    objects_area: &'a [u8],
    trailer: Trailer,
    /// table index -> arena slot
    memo: FxHashMap<u64, ObjectRef>,
    /// table index -> decoded dict key
    keys: FxHashMap<u64, String>,
    arena: Vec<Value>,
    pending: Vec<(u64, ObjectRef)>,
}

impl Resolver<'_> {
    /// Returns the arena slot for a table index, scheduling it on first sight.
    fn intern(&mut self, index: u64) -> ObjectRef {
        if let Some(&r) = self.memo.get(&index) {
            return r;
        }
        let r = ObjectRef::from_index(self.arena.len());
        self.arena.push(Value::Null);
        self.memo.insert(index, r);
        self.pending.push((index, r));
        r
    }

    fn run(&mut self) -> Result<(), DecodeError> {
        while let Some((index, slot)) = self.pending.pop() {
            let value = match self.read_object(index)? {
                RawObject::Leaf(value) => value,
                RawObject::Array(refs) => {
                    Value::Array(refs.into_iter().map(|i| self.intern(i)).collect())
                }
                RawObject::Set(refs) => Value::Set(refs.into_iter().map(|i| self.intern(i)).collect()),
                RawObject::Dict { keys, values } => {
                    let mut map = IndexMap::with_capacity(keys.len());
                    for (k, v) in keys.into_iter().zip(values) {
                        let key = self.key(k)?;
                        let value = self.intern(v);
                        map.insert(key, value);
                    }
                    Value::Dict(map)
                }
            };
            self.arena[slot.index()] = value;
        }
        Ok(())
    }

    fn key(&mut self, index: u64) -> Result<String, DecodeError> {
        if let Some(key) = self.keys.get(&index) {
            return Ok(key.clone());
        }
        let key = match self.read_object(index)? {
            RawObject::Leaf(Value::String(s)) => s,
            _ => return Err(DecodeError::NonStringKey { index }),
        };
        self.keys.insert(index, key.clone());
        Ok(key)
    }

    fn read_object(&self, index: u64) -> Result<RawObject, DecodeError> {
        let offset = self.offset_of(index)?;
        let mut reader = Reader::new(self.objects_area);
        reader.seek(offset, "object")?;
        decode_object(&mut reader, self.trailer.ref_size, self.trailer.object_count)
    }

    fn offset_of(&self, index: u64) -> Result<usize, DecodeError> {
        // bounds of the whole table were checked against the buffer in read_trailer
        let entry = self.trailer.offset_table_start as usize + index as usize * self.trailer.offset_size;
        let mut reader = Reader::new(self.input);
        reader.seek(entry, "offset table")?;
        let offset = reader.read_uint(self.trailer.offset_size, "offset table")?;

        if offset < HEADER_LEN as u64 || offset >= self.trailer.offset_table_start {
            return Err(DecodeError::OffsetOutOfBounds {
                offset,
                limit: self.trailer.offset_table_start,
            });
        }
        Ok(offset as usize)
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes the graph reachable from the root as a binary plist.
///
/// Layout runs first: every reachable object gets one table index (shared objects
/// and cycles included), and each distinct dict key is written once. The reference
/// width then follows from the object count and the offset width from the final
/// object offsets.
pub fn encode(plist: &Plist) -> Result<Vec<u8>, EncodeError> {
    let order = plist.reachable().map_err(|e| match e {
        GraphError::DanglingReference { index, len } => EncodeError::DanglingReference { index, len },
        _ => EncodeError::LayoutInvariant { context: "reachability walk failed" },
    })?;

    // Layout pass
    let mut index_of: FxHashMap<ObjectRef, u64> =
        FxHashMap::with_capacity_and_hasher(order.len(), Default::default());
    for (i, &r) in order.iter().enumerate() {
        index_of.insert(r, i as u64);
    }
    let mut keys: IndexMap<&str, u64> = IndexMap::new();
    for &r in &order {
        if let Some(Value::Dict(map)) = plist.get(r) {
            for key in map.keys() {
                let next = (order.len() + keys.len()) as u64;
                keys.entry(key.as_str()).or_insert(next);
            }
        }
    }

    let object_count = u64::try_from(order.len() + keys.len())
        .map_err(|_| EncodeError::LayoutInvariant { context: "object count exceeds u64" })?;
    let ref_size = min_width(object_count.saturating_sub(1));

    // Emit objects
    let mut writer = Writer::with_capacity(64 + order.len() * 8);
    writer.write_bytes(MAGIC);
    writer.write_bytes(FORMAT_VERSION);

    let mut offsets: Vec<u64> = Vec::with_capacity(object_count as usize);
    let resolve = |r: &ObjectRef| index_of[r];
    for &r in &order {
        offsets.push(writer.len() as u64);
        let value = plist.get(r).ok_or(EncodeError::DanglingReference {
            index: r.index(),
            len: plist.len(),
        })?;
        match value {
            Value::Array(items) => {
                let refs: Vec<u64> = items.iter().map(resolve).collect();
                encode_container(&mut writer, Marker::Array, items.len(), &refs, ref_size);
            }
            Value::Set(items) => {
                let refs: Vec<u64> = items.iter().map(resolve).collect();
                encode_container(&mut writer, Marker::Set, items.len(), &refs, ref_size);
            }
            Value::Dict(map) => {
                let refs: Vec<u64> = map
                    .keys()
                    .map(|k| keys[k.as_str()])
                    .chain(map.values().map(resolve))
                    .collect();
                encode_container(&mut writer, Marker::Dict, map.len(), &refs, ref_size);
            }
            leaf => encode_leaf(&mut writer, leaf),
        }
    }
    for key in keys.keys() {
        offsets.push(writer.len() as u64);
        encode_string(&mut writer, key);
    }

    // Offset table + trailer
    let offset_table_start = writer.len() as u64;
    let offset_size = min_width(offsets.last().copied().unwrap_or(0));
    for &offset in &offsets {
        writer.write_uint(offset, offset_size);
    }

    writer.write_bytes(&[0u8; 6]);
    writer.write_byte(offset_size as u8);
    writer.write_byte(ref_size as u8);
    writer.write_uint(object_count, 8);
    writer.write_uint(0, 8);
    writer.write_uint(offset_table_start, 8);

    Ok(writer.into_bytes())
}
