use derive_more::{Add, AddAssign, Display, FromStr, Sub, SubAssign, Sum};
use rust_decimal::{Decimal as WrappedDecimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

///
/// Decimal
///
/// Fixed-point wrapper over `rust_decimal`; the wrapped type never leaks
/// through the public surface.
///

#[derive(
    Add,
    AddAssign,
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    FromStr,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    Sub,
    SubAssign,
    Sum,
)]
pub struct Decimal(WrappedDecimal);

impl Decimal {
    pub const ZERO: Self = Self(WrappedDecimal::ZERO);

    #[must_use]
    /// Construct a decimal from mantissa and scale.
    pub fn new(num: i64, scale: u32) -> Self {
        Self(WrappedDecimal::new(num, scale))
    }

    /// Strip trailing fractional zeros to the canonical representation.
    #[must_use]
    pub fn normalize(&self) -> Self {
        Self(self.0.normalize())
    }

    #[must_use]
    pub const fn scale(&self) -> u32 {
        self.0.scale()
    }

    /// Lossy conversion for cross-type numeric comparison.
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }
}

impl From<i64> for Decimal {
    fn from(n: i64) -> Self {
        Self(WrappedDecimal::from(n))
    }
}

impl From<u64> for Decimal {
    fn from(n: u64) -> Self {
        Self(WrappedDecimal::from(n))
    }
}

///
/// TESTS
///
