//! Engine object identity.

use std::fmt;

/// Stable 64-bit handle of an engine-backed object.
///
/// `ObjectId::NONE` (0) means "no engine object": folders carry it, and the
/// engine reports it for an empty selection or a pick that hit nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// The null handle.
    pub const NONE: Self = Self(0);

    /// Returns true for the null handle.
    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Returns true for a real engine object.
    #[inline]
    #[must_use]
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }

    /// Converts the null handle to `None`.
    #[inline]
    #[must_use]
    pub const fn non_zero(self) -> Option<Self> {
        if self.0 == 0 {
            None
        } else {
            Some(self)
        }
    }
}

impl From<u64> for ObjectId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
