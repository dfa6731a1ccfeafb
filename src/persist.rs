//! Save and load of the index.
//!
//! Stream layout, little-endian throughout:
//!
//! ```text
//! "FTS0"                        4 ASCII bytes
//! compression level             i32: 0 = none, 1..=9 = gzip at that level
//! [ gzip envelope around everything below when compressed ]
//! intern table length U         i32
//! U strings                     7-bit varint byte length + UTF-8 bytes
//! root frame                    i32 edge length (0), i32 key count (0),
//!                               i32 child count
//! child subtrees, depth-first:  i32 edge length, edge bytes,
//!                               i32 key count, i32 child count,
//!                               key count × i32 intern indices,
//!                               child subtrees
//! ```
//!
//! Keys are interned in first-sight order during a pre-pass that renders
//! the tree body into a scratch buffer, so the table can be emitted at the
//! front with a known count. The string length prefix is the 7-bit
//! variable-length integer convention (7 data bits per byte, high bit set
//! on all but the last).

use std::collections::HashMap;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::{BufMut, BytesMut};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::debug;

use crate::error::{Error, Result};
use crate::key::{IndexKey, KeyCodecError};
use crate::node::Node;
use crate::storage::{EdgeMap, KeyBag, StoragePolicy};

pub(crate) const MAGIC: [u8; 4] = *b"FTS0";

const GZIP_LEVEL: i32 = 6;

/// Whether a save stream wraps its payload in a gzip envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

struct Interner<K> {
    index_of: HashMap<K, i32>,
    ordered: Vec<K>,
}

impl<K> Default for Interner<K> {
    fn default() -> Self {
        Self {
            index_of: HashMap::new(),
            ordered: Vec::new(),
        }
    }
}

impl<K: IndexKey> Interner<K> {
    fn intern(&mut self, key: &K) -> i32 {
        if let Some(&index) = self.index_of.get(key) {
            return index;
        }
        let index = self.ordered.len() as i32;
        self.index_of.insert(key.clone(), index);
        self.ordered.push(key.clone());
        index
    }
}

pub(crate) fn save_index<K, P, W>(
    root: &P::EdgeMap,
    writer: &mut W,
    compression: Compression,
) -> Result<()>
where
    K: IndexKey,
    P: StoragePolicy<K>,
    W: Write,
{
    let mut interner = Interner::default();
    let mut body = BytesMut::with_capacity(1024);
    body.put_i32_le(0); // root edge length
    body.put_i32_le(0); // root key count
    body.put_i32_le(root.len() as i32);
    root.for_each(|edge, node| write_node(edge, node, &mut interner, &mut body));

    writer.write_all(&MAGIC)?;
    match compression {
        Compression::None => {
            writer.write_i32::<LittleEndian>(0)?;
            write_payload(writer, &interner, &body)?;
        }
        Compression::Gzip => {
            writer.write_i32::<LittleEndian>(GZIP_LEVEL)?;
            let mut encoder =
                GzEncoder::new(&mut *writer, flate2::Compression::new(GZIP_LEVEL as u32));
            write_payload(&mut encoder, &interner, &body)?;
            encoder.try_finish()?;
        }
    }
    debug!(
        keys = interner.ordered.len(),
        body_bytes = body.len(),
        "index saved"
    );
    Ok(())
}

fn write_node<K: IndexKey, P: StoragePolicy<K>>(
    edge: &[u8],
    node: &Node<K, P>,
    interner: &mut Interner<K>,
    body: &mut BytesMut,
) {
    body.put_i32_le(edge.len() as i32);
    body.put_slice(edge);
    body.put_i32_le(node.keys().map_or(0, |bag| bag.len()) as i32);
    body.put_i32_le(node.children().map_or(0, |table| table.len()) as i32);
    if let Some(bag) = node.keys() {
        bag.for_each(|key| body.put_i32_le(interner.intern(key)));
    }
    if let Some(children) = node.children() {
        children.for_each(|child_edge, child| write_node(child_edge, child, interner, body));
    }
}

fn write_payload<K: IndexKey, W: Write>(
    writer: &mut W,
    interner: &Interner<K>,
    body: &[u8],
) -> Result<()> {
    writer.write_i32::<LittleEndian>(interner.ordered.len() as i32)?;
    for key in &interner.ordered {
        let text = key.to_text();
        write_varint_string(writer, text.as_bytes())?;
    }
    writer.write_all(body)?;
    Ok(())
}

fn write_varint_string<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    let mut len = bytes.len() as u32;
    loop {
        let low = (len & 0x7F) as u8;
        len >>= 7;
        if len == 0 {
            writer.write_u8(low)?;
            break;
        }
        writer.write_u8(low | 0x80)?;
    }
    writer.write_all(bytes)?;
    Ok(())
}

/// Reads a stream produced by [`save_index`], returning the root child
/// table and the number of interned keys. Built into fresh containers, so
/// a failure leaves nothing behind.
pub(crate) fn load_index<K, P, R>(reader: &mut R) -> Result<(P::EdgeMap, usize)>
where
    K: IndexKey,
    P: StoragePolicy<K>,
    R: Read,
{
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(read_err)?;
    if magic != MAGIC {
        return Err(Error::BadMagic { found: magic });
    }
    match reader.read_i32::<LittleEndian>().map_err(read_err)? {
        0 => read_payload::<K, P, _>(reader),
        1..=9 => read_payload::<K, P, _>(&mut GzDecoder::new(&mut *reader)),
        other => Err(Error::UnknownCompression(other)),
    }
}

fn read_payload<K, P, R>(reader: &mut R) -> Result<(P::EdgeMap, usize)>
where
    K: IndexKey,
    P: StoragePolicy<K>,
    R: Read,
{
    let table_len = read_count(reader)?;
    let mut table = Vec::new();
    for _ in 0..table_len {
        let text = read_varint_string(reader)?;
        table.push(K::parse_text(&text)?);
    }

    // Root frame; its edge is empty and it never carries keys, but the
    // frame is read like any other node's.
    let _root_edge = read_edge(reader)?;
    let root_keys = read_count(reader)?;
    let root_children = read_count(reader)?;
    for _ in 0..root_keys {
        read_key_index(reader, table.len())?;
    }
    let root = P::EdgeMap::default();
    for _ in 0..root_children {
        let (edge, node) = read_node::<K, P, _>(reader, &table)?;
        root.insert(edge, node);
    }
    debug!(keys = table.len(), "index loaded");
    Ok((root, table.len()))
}

fn read_node<K, P, R>(reader: &mut R, table: &[K]) -> Result<(Box<[u8]>, Node<K, P>)>
where
    K: IndexKey,
    P: StoragePolicy<K>,
    R: Read,
{
    let edge = read_edge(reader)?;
    let key_count = read_count(reader)?;
    let child_count = read_count(reader)?;

    // The variant falls out of the counts: no children makes a leaf, no
    // keys makes a bare branch.
    let node = if child_count == 0 {
        Node::Leaf {
            keys: read_keys::<K, P, _>(reader, table, key_count)?,
        }
    } else if key_count == 0 {
        Node::NoKeysBranch {
            children: read_children::<K, P, _>(reader, table, child_count)?,
        }
    } else {
        Node::KeysBranch {
            keys: read_keys::<K, P, _>(reader, table, key_count)?,
            children: read_children::<K, P, _>(reader, table, child_count)?,
        }
    };
    Ok((edge, node))
}

fn read_keys<K, P, R>(reader: &mut R, table: &[K], count: usize) -> Result<P::KeyBag>
where
    K: IndexKey,
    P: StoragePolicy<K>,
    R: Read,
{
    let keys = P::KeyBag::default();
    for _ in 0..count {
        let index = read_key_index(reader, table.len())?;
        keys.add(table[index].clone());
    }
    Ok(keys)
}

fn read_children<K, P, R>(reader: &mut R, table: &[K], count: usize) -> Result<P::EdgeMap>
where
    K: IndexKey,
    P: StoragePolicy<K>,
    R: Read,
{
    let children = P::EdgeMap::default();
    for _ in 0..count {
        let (edge, node) = read_node::<K, P, _>(reader, table)?;
        children.insert(edge, node);
    }
    Ok(children)
}

fn read_key_index<R: Read>(reader: &mut R, table_len: usize) -> Result<usize> {
    let index = reader.read_i32::<LittleEndian>().map_err(read_err)?;
    if index < 0 || index as usize >= table_len {
        return Err(Error::InternIndexOutOfRange {
            index,
            len: table_len,
        });
    }
    Ok(index as usize)
}

// A negative count or length field cannot describe anything readable, so
// it reports the same way as a stream that ended early.
fn read_count<R: Read>(reader: &mut R) -> Result<usize> {
    let value = reader.read_i32::<LittleEndian>().map_err(read_err)?;
    if value < 0 {
        return Err(Error::Truncated);
    }
    Ok(value as usize)
}

fn read_edge<R: Read>(reader: &mut R) -> Result<Box<[u8]>> {
    let len = read_count(reader)?;
    let mut edge = vec![0u8; len];
    reader.read_exact(&mut edge).map_err(read_err)?;
    Ok(edge.into_boxed_slice())
}

fn read_varint_string<R: Read>(reader: &mut R) -> Result<String> {
    let mut len: u32 = 0;
    let mut shift = 0;
    loop {
        let byte = reader.read_u8().map_err(read_err)?;
        len |= u32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        // the 7-bit prefix never takes more than five bytes
        if shift > 28 {
            return Err(Error::Truncated);
        }
    }
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes).map_err(read_err)?;
    String::from_utf8(bytes)
        .map_err(|_| KeyCodecError::new("intern table entry is not valid UTF-8").into())
}

fn read_err(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::Truncated
    } else {
        Error::Io(err)
    }
}
