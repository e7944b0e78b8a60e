//! Canonical ratings and native rating scales
//!
//! Every store keeps ratings on its own scale (0-10 for the semantic index and
//! the collection database, 0-255 for ID3 POPM frames, 0-N for XMP). Inside the
//! engine a rating is always a canonical `Rating` in 0..=10; `RatingScale` is
//! the only way across that boundary.

use std::fmt;

/// Canonical rating, 0..=10 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rating(u8);

impl Rating {
    pub const MAX: u8 = 10;
    pub const ZERO: Rating = Rating(0);

    /// Returns `None` for values above 10.
    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Rating(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A store's native rating range, `0..=native_max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingScale {
    native_max: u32,
}

impl RatingScale {
    /// Scale identical to the canonical one (semantic index, collection database)
    pub const CANONICAL: RatingScale = RatingScale { native_max: 10 };

    /// ID3v2 Popularimeter scale
    pub const POPM: RatingScale = RatingScale { native_max: 255 };

    /// Returns `None` for a zero maximum.
    pub fn new(native_max: u32) -> Option<Self> {
        (native_max > 0).then_some(RatingScale { native_max })
    }

    pub fn native_max(self) -> u32 {
        self.native_max
    }

    /// Native value to canonical. Values above `native_max` clamp to it.
    pub fn to_canonical(self, native: u32) -> Rating {
        let native = native.min(self.native_max);
        let scaled = round_half_away(native as f64 * f64::from(Rating::MAX) / self.native_max as f64);
        Rating(scaled.min(u32::from(Rating::MAX)) as u8)
    }

    /// Canonical value to native.
    pub fn from_canonical(self, rating: Rating) -> u32 {
        let scaled = round_half_away(f64::from(rating.0) * self.native_max as f64 / f64::from(Rating::MAX));
        scaled.min(self.native_max)
    }

    /// The canonical value this store reads back after storing `rating`.
    ///
    /// Identity for scales at least as fine as the canonical one; lossy for
    /// coarser scales such as a 0..5 XMP rating.
    pub fn quantize(self, rating: Rating) -> Rating {
        self.to_canonical(self.from_canonical(rating))
    }
}

// f64::round already rounds half away from zero; inputs here are never negative.
fn round_half_away(value: f64) -> u32 {
    value.round() as u32
}
