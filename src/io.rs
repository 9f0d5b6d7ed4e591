//! Binary tree serialization.
//!
//! The raw format is headerless and positional:
//!
//! ```text
//! u64   node count (little-endian)
//! node  repeated, in pool order:
//!       density  f32
//!       value    value-type bytes (f32 for ScalarValue)
//!       weight   f32
//!       children arity x i32
//! ```
//!
//! Raw payloads carry no version or type information; readers and writers
//! must agree on the value type and dimension out of band. [`TreeCodec`]
//! optionally wraps the payload in a fixed-size framing header with magic
//! bytes, format version, dimension/arity and a CRC32 checksum, turning
//! silent corruption into hard errors.

use std::io::{Read, Write};

use thiserror::Error;

use crate::tree::{DensityTree, TreeNode, TreeParams};
use crate::value::TreeValue;

/// Magic bytes identifying a framed tree.
pub const MAGIC: &[u8; 4] = b"GTRE";

/// Current framing version (major).
pub const FORMAT_VERSION_MAJOR: u8 = 1;

/// Current framing version (minor).
pub const FORMAT_VERSION_MINOR: u8 = 0;

/// Size of the framing header in bytes.
pub const HEADER_SIZE: usize = 24;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while writing a tree.
#[derive(Debug, Error)]
pub enum WriteError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while reading a tree.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The stream does not start with the framing magic.
    #[error("not a guidetree file")]
    NotATree,

    /// The file was written by a newer format version.
    #[error("tree requires format {major}.{minor} or later")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// The framed dimension/arity does not match the destination tree type.
    #[error("dimension mismatch: expected {expected}D, found {found}D")]
    DimensionMismatch { expected: usize, found: usize },

    /// The payload checksum does not match.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// The stream ended before the payload was complete.
    #[error("file truncated")]
    Truncated,

    /// The node pool violates its structural invariants.
    #[error("corrupt node pool: {0}")]
    CorruptPool(String),

    /// I/O error during reading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn map_eof(err: std::io::Error) -> ReadError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        ReadError::Truncated
    } else {
        ReadError::Io(err)
    }
}

// =============================================================================
// Raw Format
// =============================================================================

impl<V: TreeValue, const D: usize, const A: usize> DensityTree<V, D, A> {
    /// Write the tree in the raw headerless format.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), WriteError> {
        let nodes = self.nodes();
        writer.write_all(&(nodes.len() as u64).to_le_bytes())?;
        for node in nodes {
            node.write_to(writer)?;
        }
        Ok(())
    }

    /// Replace this tree's pool with one read from the raw headerless
    /// format. Parameters are kept; they are not part of the payload.
    pub fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<(), ReadError> {
        let mut count_buf = [0u8; 8];
        reader.read_exact(&mut count_buf).map_err(map_eof)?;
        let count = u64::from_le_bytes(count_buf) as usize;

        if count == 0 {
            return Err(ReadError::CorruptPool("empty node pool".into()));
        }

        let mut nodes: Vec<TreeNode<V, A>> = Vec::with_capacity(count);
        for _ in 0..count {
            nodes.push(TreeNode::read_from(reader).map_err(map_eof)?);
        }

        validate_pool(&nodes)?;
        self.replace_nodes(nodes);
        Ok(())
    }

    /// Read a tree from the raw headerless format.
    pub fn read<R: Read>(reader: &mut R, params: TreeParams) -> Result<Self, ReadError> {
        let mut tree = Self::with_params(params);
        tree.read_from(reader)?;
        Ok(tree)
    }
}

/// Check the pool invariants: in-bounds child indices that strictly grow
/// from parent to child.
fn validate_pool<V: TreeValue, const A: usize>(nodes: &[TreeNode<V, A>]) -> Result<(), ReadError> {
    for (index, node) in nodes.iter().enumerate() {
        if node.is_leaf() {
            continue;
        }
        for slot in 0..A {
            let child = node.child(slot) as usize;
            if child <= index {
                return Err(ReadError::CorruptPool(format!(
                    "node {index} has non-monotone child {child}"
                )));
            }
            if child >= nodes.len() {
                return Err(ReadError::CorruptPool(format!(
                    "node {index} has out-of-bounds child {child}"
                )));
            }
        }
    }
    Ok(())
}

// =============================================================================
// Framed Codec
// =============================================================================

/// Codec for serializing trees, optionally framed with an integrity header.
///
/// The default codec writes the raw headerless format. The checked codec
/// prefixes the payload with magic bytes, version, dimension/arity and a
/// CRC32 checksum, and fails hard on any mismatch when reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeCodec {
    /// Whether to frame payloads with the integrity header.
    pub checked: bool,
}

impl TreeCodec {
    /// Codec writing the raw headerless format.
    pub fn new() -> Self {
        Self { checked: false }
    }

    /// Codec framing payloads with the integrity header.
    pub fn checked() -> Self {
        Self { checked: true }
    }

    /// Serialize a tree.
    pub fn write<V, W, const D: usize, const A: usize>(
        &self,
        tree: &DensityTree<V, D, A>,
        writer: &mut W,
    ) -> Result<(), WriteError>
    where
        V: TreeValue,
        W: Write,
    {
        if !self.checked {
            return tree.write_to(writer);
        }

        let mut payload = Vec::new();
        tree.write_to(&mut payload)?;

        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(MAGIC);
        header[4] = FORMAT_VERSION_MAJOR;
        header[5] = FORMAT_VERSION_MINOR;
        header[6] = D as u8;
        header[7] = A as u8;
        header[8..16].copy_from_slice(&(payload.len() as u64).to_le_bytes());
        header[16..20].copy_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        // Bytes 20..24 are reserved.

        writer.write_all(&header)?;
        writer.write_all(&payload)?;
        Ok(())
    }

    /// Deserialize into an existing tree, keeping its parameters.
    pub fn read_into<V, R, const D: usize, const A: usize>(
        &self,
        tree: &mut DensityTree<V, D, A>,
        reader: &mut R,
    ) -> Result<(), ReadError>
    where
        V: TreeValue,
        R: Read,
    {
        if !self.checked {
            return tree.read_from(reader);
        }

        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header).map_err(map_eof)?;

        if &header[0..4] != MAGIC {
            return Err(ReadError::NotATree);
        }

        let major = header[4];
        let minor = header[5];
        if major > FORMAT_VERSION_MAJOR {
            return Err(ReadError::UnsupportedVersion { major, minor });
        }

        let dim = header[6] as usize;
        if dim != D || header[7] as usize != A {
            return Err(ReadError::DimensionMismatch {
                expected: D,
                found: dim,
            });
        }

        let payload_len = u64::from_le_bytes([
            header[8], header[9], header[10], header[11], header[12], header[13], header[14],
            header[15],
        ]) as usize;
        let expected = u32::from_le_bytes([header[16], header[17], header[18], header[19]]);

        let mut payload = vec![0u8; payload_len];
        reader.read_exact(&mut payload).map_err(map_eof)?;

        let actual = crc32fast::hash(&payload);
        if actual != expected {
            return Err(ReadError::ChecksumMismatch { expected, actual });
        }

        tree.read_from(&mut payload.as_slice())
    }
}
