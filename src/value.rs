//! Leaf value types.

use std::io::{self, Read, Write};

/// Trait for values accumulated in tree leaves.
///
/// The tree stores a weighted running sum of deposited values and, after a
/// rebuild, their mean. The `target` projection maps a value into its
/// non-negative density contribution; the learned distribution is
/// proportional to the accumulated target.
pub trait TreeValue: Clone + Default + Send + Sync + 'static {
    /// Project the value into a non-negative density contribution.
    fn target(&self) -> f32;

    /// Accumulate `factor * other` into `self`.
    fn accumulate_scaled(&mut self, other: &Self, factor: f32);

    /// Return `factor * self`.
    fn scaled(&self, factor: f32) -> Self;

    /// Write the raw little-endian byte representation.
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()>;

    /// Read the raw little-endian byte representation.
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self>;
}

/// Scalar leaf value (single f32) with identity target.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScalarValue(pub f32);

impl TreeValue for ScalarValue {
    #[inline]
    fn target(&self) -> f32 {
        self.0
    }

    #[inline]
    fn accumulate_scaled(&mut self, other: &Self, factor: f32) {
        self.0 += factor * other.0;
    }

    #[inline]
    fn scaled(&self, factor: f32) -> Self {
        Self(factor * self.0)
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.0.to_le_bytes())
    }

    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        Ok(Self(f32::from_le_bytes(buf)))
    }
}

impl From<f32> for ScalarValue {
    fn from(value: f32) -> Self {
        Self(value)
    }
}

impl From<ScalarValue> for f32 {
    fn from(value: ScalarValue) -> Self {
        value.0
    }
}
