use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

///
/// CleanInputs
///
/// Validated external input values, keyed by widget name. Produced by the
/// input-validation layer (an external collaborator).
///

pub type CleanInputs = BTreeMap<String, Value>;

///
/// FilterClause
///
/// One resolved filter argument handed to the provider: the provider-side
/// target (field or field__op expression) and the value to filter on.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FilterClause {
    pub target: String,
    pub value: Value,
}

impl FilterClause {
    #[must_use]
    pub fn new(target: &str, value: impl Into<Value>) -> Self {
        Self {
            target: target.to_string(),
            value: value.into(),
        }
    }
}

///
/// FilterFn
///
/// The filter body. Receives the bound widget's input value when a widget
/// is declared, `None` otherwise; returns `None` to skip filtering for the
/// given input.
///

pub type FilterFn = Box<dyn Fn(Option<&Value>) -> Option<FilterClause> + Send + Sync>;

///
/// QueryFilter
///
/// A predicate scoped to a set of columns, or report-wide when unscoped.
/// Scoped filters split the report's columns into query groups; report-wide
/// filters apply to every group.
///

pub struct QueryFilter {
    columns: Option<BTreeSet<String>>,
    widget: Option<String>,
    func: FilterFn,
}

impl QueryFilter {
    /// Report-wide filter.
    #[must_use]
    pub fn new(func: FilterFn) -> Self {
        Self {
            columns: None,
            widget: None,
            func,
        }
    }

    /// Scope the filter to the named report columns.
    #[must_use]
    pub fn scoped_to<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Bind the filter to one external input by widget name.
    #[must_use]
    pub fn with_widget(mut self, widget: &str) -> Self {
        self.widget = Some(widget.to_string());
        self
    }

    /// Column scope; `None` means report-wide.
    #[must_use]
    pub const fn columns(&self) -> Option<&BTreeSet<String>> {
        self.columns.as_ref()
    }

    /// Resolve the filter against the clean inputs. The input value is only
    /// passed through when a widget binding is declared.
    #[must_use]
    pub fn get_filter(&self, inputs: &CleanInputs) -> Option<FilterClause> {
        match &self.widget {
            Some(widget) => (self.func)(Some(inputs.get(widget).unwrap_or(&Value::Null))),
            None => (self.func)(None),
        }
    }
}

impl std::fmt::Debug for QueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryFilter")
            .field("columns", &self.columns)
            .field("widget", &self.widget)
            .finish_non_exhaustive()
    }
}

///
/// TESTS
///
