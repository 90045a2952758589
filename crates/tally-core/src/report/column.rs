use crate::value::{Row, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// AggregateOp
///
/// Provider-side aggregation name. `First` requires provider support (an
/// ordered-first aggregate is not universally built in); the core only
/// names the operation.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum AggregateOp {
    Sum,
    Count,
    CountDistinct,
    Min,
    Max,
    Avg,
    First,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Sum => "sum",
            Self::Count | Self::CountDistinct => "count",
            Self::Min => "min",
            Self::Max => "max",
            Self::Avg => "avg",
            Self::First => "first",
        };
        write!(f, "{label}")
    }
}

///
/// QueryColumn
///
/// One projected column of a provider query: the source field, the
/// aggregation applied to it, and the result name the provider labels the
/// output with (`{field}__{op}`).
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct QueryColumn {
    pub field: String,
    pub op: AggregateOp,
    pub result_name: String,
}

impl QueryColumn {
    #[must_use]
    pub fn new(field: &str, op: AggregateOp) -> Self {
        Self {
            field: field.to_string(),
            op,
            result_name: format!("{field}__{op}"),
        }
    }
}

///
/// QueryModifier
///
/// Declarative query transform a column contributes to its group's query.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum QueryModifier {
    /// Filter the null group out of a grouped query.
    ExcludeNull { field: String },
}

///
/// ColumnKind
///
/// Closed set of column behaviors, one variant per aggregation/grouping
/// behavior, sharing the capability surface below.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ColumnKind {
    /// Group rows by a provider field. Group-by columns are normally listed
    /// in the report's keys. Produces no footer.
    GroupBy { field: String, include_null: bool },
    Sum { field: String },
    Count { field: String, distinct: bool },
    Min { field: String },
    Max { field: String },
    Avg { field: String },
    First { field: String },
    /// Late-bound reference column resolved by the bulk-lookup phase from
    /// the named report column's value; never queried directly.
    Lookup { pk_column: String },
}

///
/// ReportColumn
///
/// Declares how one output field is produced: its contribution to a query's
/// projections, group-by keys, and modifiers, plus its footer behavior.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ReportColumn {
    name: String,
    kind: ColumnKind,
}

impl ReportColumn {
    #[must_use]
    pub fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    /// True when the column contributes to provider queries. Lookup columns
    /// are resolved after the merge and never appear in a query group.
    #[must_use]
    pub const fn is_queryable(&self) -> bool {
        !matches!(self.kind, ColumnKind::Lookup { .. })
    }

    /// Projected columns this descriptor adds to its group's query, plus the
    /// result name the provider reports them under.
    #[must_use]
    pub fn query_columns(&self) -> (Vec<QueryColumn>, Option<String>) {
        let column = match &self.kind {
            ColumnKind::Sum { field } => QueryColumn::new(field, AggregateOp::Sum),
            ColumnKind::Count { field, distinct } => {
                let op = if *distinct {
                    AggregateOp::CountDistinct
                } else {
                    AggregateOp::Count
                };
                QueryColumn::new(field, op)
            }
            ColumnKind::Min { field } => QueryColumn::new(field, AggregateOp::Min),
            ColumnKind::Max { field } => QueryColumn::new(field, AggregateOp::Max),
            ColumnKind::Avg { field } => QueryColumn::new(field, AggregateOp::Avg),
            ColumnKind::First { field } => QueryColumn::new(field, AggregateOp::First),
            ColumnKind::GroupBy { .. } | ColumnKind::Lookup { .. } => return (Vec::new(), None),
        };

        let result_name = column.result_name.clone();
        (vec![column], Some(result_name))
    }

    /// Group-by keys this descriptor adds, plus the result name.
    #[must_use]
    pub fn query_group_bys(&self) -> (Vec<String>, Option<String>) {
        match &self.kind {
            ColumnKind::GroupBy { field, .. } => (vec![field.clone()], Some(field.clone())),
            _ => (Vec::new(), None),
        }
    }

    /// Query transforms this descriptor adds to its group's query.
    #[must_use]
    pub fn query_modifiers(&self) -> Vec<QueryModifier> {
        match &self.kind {
            ColumnKind::GroupBy {
                field,
                include_null: false,
            } => vec![QueryModifier::ExcludeNull {
                field: field.clone(),
            }],
            _ => Vec::new(),
        }
    }

    /// Fold one row's cell into the running footer total; `None` opts the
    /// column out of the footer entirely.
    ///
    /// Shipped aggregations that participate (Sum, Count, Min, Max) are
    /// associative and commutative, so batching boundaries never change the
    /// finalized value.
    #[must_use]
    pub fn increment_footer(&self, total: Option<Value>, cell: &Value) -> Option<Value> {
        match &self.kind {
            ColumnKind::Sum { .. } | ColumnKind::Count { .. } => {
                let total = total.unwrap_or(Value::Null);
                Some(total.checked_add(cell).unwrap_or(total))
            }
            ColumnKind::Min { .. } => Some(fold_extreme(total, cell, Extreme::Min)),
            ColumnKind::Max { .. } => Some(fold_extreme(total, cell, Extreme::Max)),
            ColumnKind::GroupBy { .. }
            | ColumnKind::Avg { .. }
            | ColumnKind::First { .. }
            | ColumnKind::Lookup { .. } => None,
        }
    }

    /// Convert the running total into the displayed footer value; `None`
    /// opts the column out. The full footer row of totals is available for
    /// aggregations that derive from other columns.
    #[must_use]
    pub fn finalize_footer(&self, total: Option<Value>, _footer: &Row) -> Option<Value> {
        match &self.kind {
            ColumnKind::Sum { .. }
            | ColumnKind::Count { .. }
            | ColumnKind::Min { .. }
            | ColumnKind::Max { .. } => total,
            ColumnKind::GroupBy { .. }
            | ColumnKind::Avg { .. }
            | ColumnKind::First { .. }
            | ColumnKind::Lookup { .. } => None,
        }
    }
}

enum Extreme {
    Min,
    Max,
}

fn fold_extreme(total: Option<Value>, cell: &Value, extreme: Extreme) -> Value {
    let Some(total) = total else {
        return cell.clone();
    };

    // nulls never win an extreme
    if cell.is_null() {
        return total;
    }
    if total.is_null() {
        return cell.clone();
    }

    let take_cell = match extreme {
        Extreme::Min => cell < &total,
        Extreme::Max => cell > &total,
    };
    if take_cell { cell.clone() } else { total }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Decimal;
    use std::collections::BTreeMap;

    fn sum_column() -> ReportColumn {
        ReportColumn::new(
            "price",
            ColumnKind::Sum {
                field: "price".to_string(),
            },
        )
    }

    #[test]
    fn sum_column_projects_result_name() {
        let (columns, result_name) = sum_column().query_columns();

        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].result_name, "price__sum");
        assert_eq!(result_name.as_deref(), Some("price__sum"));
    }

    #[test]
    fn distinct_count_keeps_count_result_name() {
        let column = ReportColumn::new(
            "buyers",
            ColumnKind::Count {
                field: "buyer_id".to_string(),
                distinct: true,
            },
        );
        let (columns, _) = column.query_columns();

        assert_eq!(columns[0].op, AggregateOp::CountDistinct);
        assert_eq!(columns[0].result_name, "buyer_id__count");
    }

    #[test]
    fn group_by_contributes_group_keys_and_null_filter() {
        let column = ReportColumn::new(
            "shop",
            ColumnKind::GroupBy {
                field: "shop_id".to_string(),
                include_null: false,
            },
        );

        assert_eq!(
            column.query_group_bys(),
            (vec!["shop_id".to_string()], Some("shop_id".to_string()))
        );
        assert_eq!(
            column.query_modifiers(),
            vec![QueryModifier::ExcludeNull {
                field: "shop_id".to_string(),
            }]
        );
        assert!(column.query_columns().0.is_empty());
    }

    #[test]
    fn group_by_with_null_group_adds_no_modifier() {
        let column = ReportColumn::new(
            "shop",
            ColumnKind::GroupBy {
                field: "shop_id".to_string(),
                include_null: true,
            },
        );
        assert!(column.query_modifiers().is_empty());
    }

    #[test]
    fn sum_footer_accumulates_and_finalizes() {
        let column = sum_column();
        let rows = [
            Value::Decimal(Decimal::new(150, 2)),
            Value::Null,
            Value::Decimal(Decimal::new(300, 2)),
        ];

        let mut total = None;
        for cell in &rows {
            total = column.increment_footer(total, cell);
        }

        let footer = BTreeMap::new();
        assert_eq!(
            column.finalize_footer(total, &footer),
            Some(Value::Decimal(Decimal::new(450, 2)))
        );
    }

    #[test]
    fn min_footer_ignores_nulls() {
        let column = ReportColumn::new(
            "low",
            ColumnKind::Min {
                field: "low".to_string(),
            },
        );

        let mut total = None;
        for cell in [Value::Int(4), Value::Null, Value::Int(-2), Value::Int(9)] {
            total = column.increment_footer(total, &cell);
        }

        assert_eq!(total, Some(Value::Int(-2)));
    }

    #[test]
    fn group_by_and_lookup_opt_out_of_footer() {
        let group = ReportColumn::new(
            "shop",
            ColumnKind::GroupBy {
                field: "shop_id".to_string(),
                include_null: true,
            },
        );
        let lookup = ReportColumn::new(
            "shop_name",
            ColumnKind::Lookup {
                pk_column: "shop".to_string(),
            },
        );

        assert_eq!(group.increment_footer(None, &Value::Int(1)), None);
        assert_eq!(lookup.increment_footer(None, &Value::Int(1)), None);
        assert!(!lookup.is_queryable());
    }
}
