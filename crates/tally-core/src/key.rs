use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// Key
///
/// Ordered tuple of scalar values uniquely identifying one logical report
/// row. Every provider stream sorts ascending by this tuple; equal keys
/// across streams denote the same logical row.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Key(Vec<Value>);

impl Key {
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Single-column key.
    #[must_use]
    pub fn single(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

impl From<Vec<Value>> for Key {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

///
/// TESTS
///
