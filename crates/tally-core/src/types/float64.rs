use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    hash::{Hash, Hasher},
};
use thiserror::Error as ThisError;

///
/// Float64
///
/// Finite f64 only; -0.0 canonically stored as 0.0
///

#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Serialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Float64(f64);

impl Float64 {
    #[must_use]
    /// Fallible constructor that rejects non-finite values and normalizes -0.0.
    pub fn try_new(v: f64) -> Option<Self> {
        if !v.is_finite() {
            return None;
        }

        // canonicalize -0.0 to 0.0 so Eq/Hash/Ord are consistent
        Some(Self(if v == 0.0 { 0.0 } else { v }))
    }

    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }
}

#[derive(Debug, ThisError)]
pub enum Float64Error {
    #[error("non-finite float64 value")]
    NonFinite,
}

impl TryFrom<f64> for Float64 {
    type Error = Float64Error;

    fn try_from(v: f64) -> Result<Self, Self::Error> {
        Self::try_new(v).ok_or(Float64Error::NonFinite)
    }
}

impl From<Float64> for f64 {
    fn from(v: Float64) -> Self {
        v.get()
    }
}

impl Eq for Float64 {}

impl PartialEq for Float64 {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Hash for Float64 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl Ord for Float64 {
    fn cmp(&self, other: &Self) -> Ordering {
        // finite by construction, so total_cmp is a plain numeric order
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for Float64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

///
/// TESTS
///
