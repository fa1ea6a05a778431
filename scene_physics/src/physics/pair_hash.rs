//! Order-independent keys for pairs of collision shapes

use crate::error::PhysicsError;
use serde::{Deserialize, Serialize};

/// Identifier the solver assigns to a collision shape
///
/// Ids are limited to 16 bits so two of them pack into one [`ContactPairKey`].
/// Conversions from wider integers fail instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeId(pub u16);

impl ShapeId {
    /// Largest id a shape can carry
    pub const MAX: u32 = u16::MAX as u32;

    /// The raw id
    pub fn raw(self) -> u16 {
        self.0
    }
}

impl From<u16> for ShapeId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

impl TryFrom<u32> for ShapeId {
    type Error = PhysicsError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        u16::try_from(id)
            .map(Self)
            .map_err(|_| PhysicsError::ShapeIdOverflow(id))
    }
}

/// Key for an unordered pair of shapes
///
/// The smaller id lives in the high 16 bits and the larger id in the low 16 bits,
/// so `ContactPairKey::new(a, b) == ContactPairKey::new(b, a)` and distinct
/// unordered pairs never share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactPairKey(u32);

impl ContactPairKey {
    /// Build the key for a pair of shapes, in either order
    #[inline]
    pub fn new(a: ShapeId, b: ShapeId) -> Self {
        let (low, high) = if a.0 > b.0 { (b.0, a.0) } else { (a.0, b.0) };
        Self(((low as u32) << 16) | high as u32)
    }

    /// The smaller of the two shape ids
    #[inline]
    pub fn low_id(self) -> ShapeId {
        ShapeId(((self.0 & 0xFFFF_0000) >> 16) as u16)
    }

    /// The larger of the two shape ids
    #[inline]
    pub fn high_id(self) -> ShapeId {
        ShapeId((self.0 & 0x0000_FFFF) as u16)
    }

    /// The packed integer
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}
