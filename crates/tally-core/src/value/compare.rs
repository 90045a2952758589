use super::Value;
use crate::types::Decimal;
use std::cmp::Ordering;

///
/// NumericRepr
///
/// Common magnitude representation for cross-variant numeric comparison.
/// Exact (`Decimal`) whenever both sides admit it; `F64` when a float is
/// involved.
///

enum NumericRepr {
    Decimal(Decimal),
    F64(f64),
    None,
}

impl Value {
    fn numeric_repr(&self) -> NumericRepr {
        match self {
            Self::Int(v) => NumericRepr::Decimal(Decimal::from(*v)),
            Self::Uint(v) => NumericRepr::Decimal(Decimal::from(*v)),
            Self::Decimal(v) => NumericRepr::Decimal(*v),
            Self::Float64(v) => NumericRepr::F64(v.get()),
            _ => NumericRepr::None,
        }
    }

    fn numeric_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.numeric_repr(), other.numeric_repr()) {
            (NumericRepr::Decimal(a), NumericRepr::Decimal(b)) => Some(a.cmp(&b)),
            (NumericRepr::F64(a), NumericRepr::F64(b)) => Some(a.total_cmp(&b)),
            (NumericRepr::Decimal(a), NumericRepr::F64(b)) => Some(a.to_f64().total_cmp(&b)),
            (NumericRepr::F64(a), NumericRepr::Decimal(b)) => Some(a.total_cmp(&b.to_f64())),
            _ => None,
        }
    }

    /// Numeric addition for footer accumulation.
    ///
    /// `Null` is the additive identity on either side. Mixed numeric
    /// variants widen (exact where possible, float when a float is
    /// involved). Non-numeric operands return `None`.
    #[must_use]
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        if self.is_null() {
            return other.is_addable().then(|| other.clone());
        }
        if other.is_null() {
            return self.is_addable().then(|| self.clone());
        }

        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.checked_add(*b).map(Self::Int),
            (Self::Uint(a), Self::Uint(b)) => a.checked_add(*b).map(Self::Uint),
            _ => match (self.numeric_repr(), other.numeric_repr()) {
                (NumericRepr::Decimal(a), NumericRepr::Decimal(b)) => {
                    Some(Self::Decimal(a + b))
                }
                (NumericRepr::F64(a), NumericRepr::F64(b)) => Some(Self::float(a + b)),
                (NumericRepr::Decimal(a), NumericRepr::F64(b)) => Some(Self::float(a.to_f64() + b)),
                (NumericRepr::F64(a), NumericRepr::Decimal(b)) => Some(Self::float(a + b.to_f64())),
                _ => None,
            },
        }
    }

    fn is_addable(&self) -> bool {
        self.is_null() || !matches!(self.numeric_repr(), NumericRepr::None)
    }

    // Variant tag for the equal-magnitude tiebreak; keeps the total order
    // consistent with the structural Eq derive.
    const fn variant_tag(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) => 2,
            Self::Uint(_) => 3,
            Self::Float64(_) => 4,
            Self::Decimal(_) => 5,
            Self::Text(_) => 6,
            Self::Timestamp(_) => 7,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        if let Some(ordering) = self.numeric_cmp(other) {
            return ordering.then_with(|| self.variant_tag().cmp(&other.variant_tag()));
        }

        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => match (self, other) {
                (Self::Null, Self::Null) => Ordering::Equal,
                (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
                (Self::Text(a), Self::Text(b)) => a.cmp(b),
                (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
                // numeric pairs are handled by numeric_cmp above
                _ => Ordering::Equal,
            },
            ordering => ordering,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
