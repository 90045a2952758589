mod compare;
mod rank;


use crate::types::{Decimal, Float64, Timestamp};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

///
/// Value
///
/// Closed scalar set carried by report rows, filter clauses, and sort
/// indexes.
///
/// Null → the field holds no value (SQL NULL). Ranks lowest in the total
/// order, so descending sorts place it last.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float64(Float64),
    Decimal(Decimal),
    Text(String),
    Timestamp(Timestamp),
}

///
/// Row
///
/// One complete logical report row: output column name → value.
///

pub type Row = BTreeMap<String, Value>;

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Fallible float constructor; non-finite input maps to `Null`.
    #[must_use]
    pub fn float(v: f64) -> Self {
        Float64::try_new(v).map_or(Self::Null, Self::Float64)
    }

    #[must_use]
    pub fn text(v: impl Into<String>) -> Self {
        Self::Text(v.into())
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Self::Timestamp(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
