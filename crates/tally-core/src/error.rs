use crate::{
    cache::instance::InstanceIncompleteError, report::partition::ConflictError,
    source::merge::OrderingError,
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// EngineError
///
/// Structured runtime error with a stable internal classification.
/// Module-level errors convert in via `From`; the original payload is kept
/// in `detail` where a caller needs to branch on it.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct EngineError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl EngineError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct a merge-origin invariant violation.
    pub(crate) fn merge_invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Merge, message.into())
    }

    /// Construct a cache-origin invariant violation.
    pub(crate) fn cache_invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Cache, message.into())
    }

    /// Construct a store-origin invariant violation.
    pub(crate) fn store_invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Store, message.into())
    }

    /// Construct a cache-origin not-found error.
    pub(crate) fn cache_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotFound, ErrorOrigin::Cache, message.into())
    }

    /// Construct a provider-side failure surfaced through the paging layer.
    pub fn page_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Page, message.into())
    }

    /// True when the error is a recoverable incomplete-instance read; the
    /// caller can recompute the instance and retry.
    #[must_use]
    pub const fn is_incomplete(&self) -> bool {
        matches!(self.detail, Some(ErrorDetail::Incomplete(_)))
    }

    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.detail, Some(ErrorDetail::Conflict(_)))
    }

    #[must_use]
    pub const fn is_ordering(&self) -> bool {
        matches!(self.detail, Some(ErrorDetail::Ordering(_)))
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`EngineError`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Conflict(ConflictError),
    #[error("{0}")]
    Ordering(OrderingError),
    #[error("{0}")]
    Incomplete(InstanceIncompleteError),
}

impl From<ConflictError> for EngineError {
    fn from(err: ConflictError) -> Self {
        Self {
            class: ErrorClass::Conflict,
            origin: ErrorOrigin::Partition,
            message: err.to_string(),
            detail: Some(ErrorDetail::Conflict(err)),
        }
    }
}

impl From<OrderingError> for EngineError {
    fn from(err: OrderingError) -> Self {
        Self {
            class: ErrorClass::Ordering,
            origin: ErrorOrigin::Merge,
            message: err.to_string(),
            detail: Some(ErrorDetail::Ordering(err)),
        }
    }
}

impl From<InstanceIncompleteError> for EngineError {
    fn from(err: InstanceIncompleteError) -> Self {
        Self {
            class: ErrorClass::Incomplete,
            origin: ErrorOrigin::Cache,
            message: err.to_string(),
            detail: Some(ErrorDetail::Incomplete(err)),
        }
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Conflict,
    Ordering,
    Incomplete,
    NotFound,
    Internal,
    Unsupported,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Conflict => "conflict",
            Self::Ordering => "ordering",
            Self::Incomplete => "incomplete",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Partition,
    Merge,
    Page,
    Cache,
    Store,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Partition => "partition",
            Self::Merge => "merge",
            Self::Page => "page",
            Self::Cache => "cache",
            Self::Store => "store",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_detail_maps_to_partition_origin() {
        let err: EngineError = ConflictError::ColumnAlreadyFiltered {
            column: "price".to_string(),
        }
        .into();

        assert_eq!(err.class, ErrorClass::Conflict);
        assert_eq!(err.origin, ErrorOrigin::Partition);
        assert!(err.is_conflict());
        assert!(!err.is_incomplete());
    }

    #[test]
    fn incomplete_detail_is_recoverable() {
        let err: EngineError = InstanceIncompleteError {
            report: "report_name".to_string(),
            instance_id: "123abc".to_string(),
        }
        .into();

        assert_eq!(err.class, ErrorClass::Incomplete);
        assert!(err.is_incomplete());
        assert_eq!(
            err.display_with_class(),
            format!("cache:incomplete: {}", err.message)
        );
    }
}
