use crate::{
    obs::sink::{self, MetricsEvent},
    report::{
        column::{QueryColumn, QueryModifier, ReportColumn},
        filter::{CleanInputs, FilterClause, QueryFilter},
    },
};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error as ThisError;

///
/// ConflictError
///
/// Invalid filter/column configuration detected at partition time. Surfaced
/// at report-definition time and never recovered automatically.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ConflictError {
    #[error("column '{column}' is included in more than one column-scoped filter")]
    ColumnAlreadyFiltered { column: String },

    #[error(
        "column '{column}' is a key column and participates in every query; \
         use a report-wide filter instead"
    )]
    KeyColumnFiltered { column: String },
}

///
/// QueryGroup
///
/// One disjoint column group satisfied by exactly one provider query.
/// `filters` indexes into the filter slice handed to `partition_filters`.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QueryGroup {
    pub columns: BTreeSet<String>,
    pub filters: Vec<usize>,
}

///
/// QueryPartition
///
/// The partitioner's output: disjoint query groups plus the report-wide
/// filters that apply to all of them. Groups are independent and may be
/// executed concurrently; their relative order carries no meaning.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QueryPartition {
    pub groups: Vec<QueryGroup>,
    pub table_wide: Vec<usize>,
}

/// Partition the report's queryable columns into disjoint groups, each
/// coverable by one filtered query.
///
/// Column-scoped filters claim their column set; remaining queryable
/// non-key columns fall into one implicit unfiltered group. A report with
/// no queryable non-key columns still yields exactly one (empty) group so
/// the key range is queried.
pub fn partition_filters(
    key_columns: &[String],
    columns: &[ReportColumn],
    filters: &[QueryFilter],
) -> Result<QueryPartition, ConflictError> {
    let key_set: BTreeSet<&str> = key_columns.iter().map(String::as_str).collect();

    let mut filtered_columns: BTreeSet<String> = BTreeSet::new();
    let mut groups: Vec<QueryGroup> = Vec::new();
    let mut table_wide: Vec<usize> = Vec::new();

    for (idx, filter) in filters.iter().enumerate() {
        let Some(scope) = filter.columns() else {
            table_wide.push(idx);
            continue;
        };

        for column in scope {
            if filtered_columns.contains(column) {
                return Err(ConflictError::ColumnAlreadyFiltered {
                    column: column.clone(),
                });
            }
            if key_set.contains(column.as_str()) {
                return Err(ConflictError::KeyColumnFiltered {
                    column: column.clone(),
                });
            }
        }
        filtered_columns.extend(scope.iter().cloned());

        groups.push(QueryGroup {
            columns: scope.clone(),
            filters: vec![idx],
        });
    }

    let unfiltered: BTreeSet<String> = columns
        .iter()
        .filter(|column| column.is_queryable())
        .map(|column| column.name().to_string())
        .filter(|name| !filtered_columns.contains(name) && !key_set.contains(name.as_str()))
        .collect();

    if !unfiltered.is_empty() || groups.is_empty() {
        groups.push(QueryGroup {
            columns: unfiltered,
            filters: Vec::new(),
        });
    }

    sink::record(MetricsEvent::PartitionBuilt {
        groups: groups.len() as u64,
    });

    Ok(QueryPartition { groups, table_wide })
}

///
/// QuerySpec
///
/// One fully assembled provider query: key-column group-bys plus the
/// group's projections, modifiers, and resolved filter clauses, with the
/// result-name → output-column mapping the provider labels rows by.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QuerySpec {
    pub group_bys: Vec<String>,
    pub columns: Vec<QueryColumn>,
    pub modifiers: Vec<QueryModifier>,
    pub filters: Vec<FilterClause>,
    pub result_names: BTreeMap<String, String>,
}

impl QueryPartition {
    /// Assemble one `QuerySpec` per group, resolving filters against the
    /// clean inputs. Filters that decline for the given inputs contribute
    /// no clause.
    #[must_use]
    pub fn queries(
        &self,
        key_columns: &[String],
        columns: &[ReportColumn],
        filters: &[QueryFilter],
        inputs: &CleanInputs,
    ) -> Vec<QuerySpec> {
        let by_name: BTreeMap<&str, &ReportColumn> = columns
            .iter()
            .map(|column| (column.name(), column))
            .collect();

        self.groups
            .iter()
            .map(|group| {
                let mut spec = QuerySpec::default();

                // key columns participate in every query
                let names = key_columns
                    .iter()
                    .map(String::as_str)
                    .chain(group.columns.iter().map(String::as_str));

                for name in names {
                    let Some(column) = by_name.get(name) else {
                        continue;
                    };

                    let (group_bys, result_name) = column.query_group_bys();
                    spec.group_bys.extend(group_bys);
                    if let Some(result_name) = result_name {
                        spec.result_names.insert(result_name, name.to_string());
                    }

                    let (query_columns, result_name) = column.query_columns();
                    spec.columns.extend(query_columns);
                    if let Some(result_name) = result_name {
                        spec.result_names.insert(result_name, name.to_string());
                    }

                    spec.modifiers.extend(column.query_modifiers());
                }

                for idx in self.table_wide.iter().chain(group.filters.iter()) {
                    if let Some(clause) = filters[*idx].get_filter(inputs) {
                        spec.filters.push(clause);
                    }
                }

                spec
            })
            .collect()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        report::column::ColumnKind,
        value::Value,
    };

    fn keys() -> Vec<String> {
        vec!["id".to_string()]
    }

    fn columns() -> Vec<ReportColumn> {
        vec![
            ReportColumn::new(
                "id",
                ColumnKind::GroupBy {
                    field: "id".to_string(),
                    include_null: false,
                },
            ),
            ReportColumn::new(
                "price",
                ColumnKind::Sum {
                    field: "price".to_string(),
                },
            ),
            ReportColumn::new(
                "count",
                ColumnKind::Count {
                    field: "id".to_string(),
                    distinct: false,
                },
            ),
            ReportColumn::new(
                "shop_name",
                ColumnKind::Lookup {
                    pk_column: "id".to_string(),
                },
            ),
        ]
    }

    fn scoped(columns: &[&str]) -> QueryFilter {
        QueryFilter::new(Box::new(|_| Some(FilterClause::new("is_active", true))))
            .scoped_to(columns.iter().copied())
    }

    #[test]
    fn overlapping_scoped_filters_conflict() {
        let filters = vec![scoped(&["price"]), scoped(&["price", "count"])];
        let err = partition_filters(&keys(), &columns(), &filters).unwrap_err();

        assert_eq!(
            err,
            ConflictError::ColumnAlreadyFiltered {
                column: "price".to_string(),
            }
        );
    }

    #[test]
    fn key_column_scope_conflicts() {
        let filters = vec![scoped(&["id"])];
        let err = partition_filters(&keys(), &columns(), &filters).unwrap_err();

        assert_eq!(
            err,
            ConflictError::KeyColumnFiltered {
                column: "id".to_string(),
            }
        );
    }

    #[test]
    fn unscoped_filters_apply_to_every_group() {
        let filters = vec![
            QueryFilter::new(Box::new(|_| Some(FilterClause::new("is_active", true)))),
            scoped(&["price"]),
        ];
        let partition = partition_filters(&keys(), &columns(), &filters).expect("partition");

        assert_eq!(partition.table_wide, vec![0]);
        assert_eq!(partition.groups.len(), 2);

        let specs = partition.queries(&keys(), &columns(), &filters, &CleanInputs::new());
        for spec in &specs {
            assert!(
                spec.filters
                    .iter()
                    .any(|clause| clause.target == "is_active"),
                "every group carries the report-wide clause"
            );
        }
    }

    #[test]
    fn uncovered_columns_form_one_unfiltered_group() {
        let filters = vec![scoped(&["price"])];
        let partition = partition_filters(&keys(), &columns(), &filters).expect("partition");

        let unfiltered: Vec<_> = partition
            .groups
            .iter()
            .filter(|group| group.filters.is_empty())
            .collect();
        assert_eq!(unfiltered.len(), 1);
        assert_eq!(
            unfiltered[0].columns,
            BTreeSet::from(["count".to_string()]),
            "lookup and key columns stay out of the unfiltered group"
        );
    }

    #[test]
    fn identical_scopes_still_conflict() {
        let filters = vec![scoped(&["price", "count"]), scoped(&["price", "count"])];
        let err = partition_filters(&keys(), &columns(), &filters).unwrap_err();

        assert!(matches!(err, ConflictError::ColumnAlreadyFiltered { .. }));
    }

    #[test]
    fn report_without_non_key_columns_still_queries_keys() {
        let columns = vec![ReportColumn::new(
            "id",
            ColumnKind::GroupBy {
                field: "id".to_string(),
                include_null: false,
            },
        )];
        let partition = partition_filters(&keys(), &columns, &[]).expect("partition");

        assert_eq!(partition.groups.len(), 1);
        assert!(partition.groups[0].columns.is_empty());

        let specs = partition.queries(&keys(), &columns, &[], &CleanInputs::new());
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].group_bys, vec!["id".to_string()]);
    }

    #[test]
    fn query_specs_map_result_names_to_output_columns() {
        let partition = partition_filters(&keys(), &columns(), &[]).expect("partition");
        let specs = partition.queries(&keys(), &columns(), &[], &CleanInputs::new());

        assert_eq!(specs.len(), 1);
        let spec = &specs[0];

        assert_eq!(spec.group_bys, vec!["id".to_string()]);
        assert_eq!(spec.result_names.get("id"), Some(&"id".to_string()));
        assert_eq!(spec.result_names.get("price__sum"), Some(&"price".to_string()));
        assert_eq!(spec.result_names.get("id__count"), Some(&"count".to_string()));
        assert!(
            spec.columns.iter().all(|c| c.result_name != "shop_name"),
            "lookup columns never reach a query"
        );
    }

    #[test]
    fn declined_filters_contribute_no_clause() {
        let filters = vec![QueryFilter::new(Box::new(|_| None))];
        let partition = partition_filters(&keys(), &columns(), &filters).expect("partition");
        let specs = partition.queries(&keys(), &columns(), &filters, &CleanInputs::new());

        assert!(specs.iter().all(|spec| spec.filters.is_empty()));
    }

    #[test]
    fn widget_inputs_parameterize_clauses() {
        let filters = vec![
            QueryFilter::new(Box::new(|input| {
                Some(FilterClause::new(
                    "shop_id__in",
                    input.expect("widget input").clone(),
                ))
            }))
            .scoped_to(["price"])
            .with_widget("shop_select"),
        ];
        let partition = partition_filters(&keys(), &columns(), &filters).expect("partition");

        let mut inputs = CleanInputs::new();
        inputs.insert("shop_select".to_string(), Value::Uint(9));

        let specs = partition.queries(&keys(), &columns(), &filters, &inputs);
        let filtered_spec = specs
            .iter()
            .find(|spec| !spec.filters.is_empty())
            .expect("one filtered group");
        assert_eq!(filtered_spec.filters[0].value, Value::Uint(9));
    }
}
