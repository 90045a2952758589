//! End-to-end pipeline: filter partitioning → per-group provider queries →
//! paged, sorted row streams → ordered merge with bulk lookups → cached,
//! sortable instance.
//!
//! The in-test provider adapter stands in for a real source binding; it
//! interprets `QuerySpec` the way an ORM adapter would.

use std::{collections::BTreeMap, time::Duration};
use tally_core::{
    cache::{Direction, FooterSpec, InstanceCache, MemoryStore, ROW_ID_FIELD, SortOrder},
    error::EngineError,
    key::Key,
    report::{
        CleanInputs, ColumnKind, FilterClause, QueryFilter, QuerySpec, ReportColumn,
        partition_filters,
    },
    source::{
        BulkLookup, Cell, MergeConfig, PageConfig, PagedRecords, PartialRow, RowMerger, RowStream,
        key_rows,
    },
    types::Decimal,
    value::{Row, Value},
};

#[derive(Clone, Copy)]
struct Sale {
    id: i64,
    shop_id: i64,
    price_cents: i64,
}

const SALES: &[Sale] = &[
    Sale { id: 1, shop_id: 1, price_cents: 150 },
    Sale { id: 2, shop_id: 1, price_cents: 300 },
    Sale { id: 3, shop_id: 2, price_cents: 100 },
    Sale { id: 4, shop_id: 3, price_cents: 500 },
    Sale { id: 5, shop_id: 1, price_cents: 250 },
    Sale { id: 6, shop_id: 2, price_cents: 120 },
];

fn report_columns() -> Vec<ReportColumn> {
    vec![
        ReportColumn::new(
            "shop",
            ColumnKind::GroupBy {
                field: "shop_id".to_string(),
                include_null: false,
            },
        ),
        ReportColumn::new(
            "revenue",
            ColumnKind::Sum {
                field: "price".to_string(),
            },
        ),
        ReportColumn::new(
            "sales",
            ColumnKind::Count {
                field: "id".to_string(),
                distinct: false,
            },
        ),
        ReportColumn::new(
            "shop_name",
            ColumnKind::Lookup {
                pk_column: "shop".to_string(),
            },
        ),
    ]
}

fn report_filters() -> Vec<QueryFilter> {
    // revenue only counts sales at or above the widget's price floor; the
    // sales count stays unfiltered
    vec![
        QueryFilter::new(Box::new(|input| {
            let floor = input.expect("widget input");
            if floor.is_null() {
                return None;
            }
            Some(FilterClause::new("price__gte", floor.clone()))
        }))
        .scoped_to(["revenue"])
        .with_widget("min_price"),
    ]
}

// Interpret one QuerySpec over the sales table: apply filter clauses,
// group by shop, aggregate the projected columns, and emit rows sorted
// ascending by key, plus a deferred cell per lookup column carrying the
// pk column's value.
fn execute_spec(
    spec: &QuerySpec,
    lookups: &[(String, String)],
    page_size: usize,
) -> RowStream {
    assert_eq!(spec.group_bys, vec!["shop_id".to_string()]);

    let keep = |sale: &Sale| {
        spec.filters.iter().all(|clause| match clause.target.as_str() {
            "price__gte" => Value::Decimal(Decimal::new(sale.price_cents, 2)) >= clause.value,
            _ => true,
        })
    };

    let mut groups: BTreeMap<i64, Vec<Sale>> = BTreeMap::new();
    for sale in SALES.iter().filter(|sale| keep(sale)) {
        groups.entry(sale.shop_id).or_default().push(*sale);
    }

    let mut rows: Vec<(Key, PartialRow)> = Vec::new();
    for (shop_id, sales) in groups {
        let mut partial = PartialRow::new();

        for (result_name, output) in &spec.result_names {
            let value = match result_name.as_str() {
                "shop_id" => Value::Int(shop_id),
                "price__sum" => Value::Decimal(Decimal::new(
                    sales.iter().map(|sale| sale.price_cents).sum::<i64>(),
                    2,
                )),
                "id__count" => Value::Uint(sales.len() as u64),
                other => panic!("unexpected result name {other}"),
            };
            partial.insert(output.clone(), Cell::Ready(value));
        }

        for (output, pk_column) in lookups {
            if let Some(Cell::Ready(pk)) = partial.get(pk_column) {
                let pk = pk.clone();
                partial.insert(output.clone(), Cell::Deferred(pk));
            }
        }

        rows.push((Key::single(Value::Int(shop_id)), partial));
    }

    // serve the grouped rows through the pager to bound per-fetch memory
    let pager = PagedRecords::new(PageConfig { page_size }, move |offset, limit| {
        Ok(rows
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect::<Vec<_>>())
    });

    Box::new(pager)
}

struct ShopNames;

impl BulkLookup for ShopNames {
    fn resolve_batch(&mut self, rows: &mut [(Key, PartialRow)]) -> Result<(), EngineError> {
        let names: BTreeMap<i64, &str> =
            BTreeMap::from([(1, "North"), (2, "Center"), (3, "South")]);

        for (_, row) in rows.iter_mut() {
            for cell in row.values_mut() {
                if let Cell::Deferred(Value::Int(pk)) = cell {
                    let name = names.get(pk).copied().unwrap_or("unknown");
                    *cell = Cell::Ready(Value::text(name));
                }
            }
        }
        Ok(())
    }
}

fn build_instance() -> InstanceCache<MemoryStore> {
    let key_columns = vec!["shop".to_string()];
    let columns = report_columns();
    let filters = report_filters();

    let partition = partition_filters(&key_columns, &columns, &filters).expect("partition");
    assert_eq!(
        partition.groups.len(),
        2,
        "scoped revenue group plus the unfiltered sales group"
    );

    let mut inputs = CleanInputs::new();
    inputs.insert(
        "min_price".to_string(),
        Value::Decimal(Decimal::new(200, 2)),
    );

    let lookups: Vec<(String, String)> = columns
        .iter()
        .filter_map(|column| match column.kind() {
            ColumnKind::Lookup { pk_column } => {
                Some((column.name().to_string(), pk_column.clone()))
            }
            _ => None,
        })
        .collect();

    let specs = partition.queries(&key_columns, &columns, &filters, &inputs);
    let streams: Vec<RowStream> = specs
        .iter()
        .map(|spec| execute_spec(spec, &lookups, 2))
        .collect();

    // authoritative key coverage: every shop appears even if a filtered
    // group returns nothing for it
    let shops = key_rows(vec![
        Key::single(Value::Int(1)),
        Key::single(Value::Int(2)),
        Key::single(Value::Int(3)),
    ]);

    let mut lookup = ShopNames;
    let merger = RowMerger::new(MergeConfig { batch_size: 2 });
    let merged: Vec<(Key, Row)> = merger
        .merge(shops, streams, &mut lookup)
        .collect::<Result<_, _>>()
        .expect("merge");

    let rows: Vec<Row> = merged.into_iter().map(|(_, row)| row).collect();

    let mut cache = InstanceCache::new(MemoryStore::new());
    cache
        .create_instance(
            "shop_summary",
            "min200",
            &rows,
            FooterSpec::Columns(&columns),
            Duration::from_secs(3600),
        )
        .expect("create instance");
    cache
}

#[test]
fn pipeline_produces_one_row_per_shop() {
    let cache = build_instance();

    assert_eq!(
        cache.instance_row_count("shop_summary", "min200").expect("count"),
        3
    );

    let rows = cache
        .instance_rows(
            "shop_summary",
            "min200",
            &SortOrder::new("shop", Direction::Asc),
            None,
            0,
        )
        .expect("rows");

    assert_eq!(rows[0].get("shop"), Some(&Value::Int(1)));
    assert_eq!(
        rows[0].get("revenue"),
        Some(&Value::Decimal(Decimal::new(550, 2))),
        "shop 1 revenue counts only sales at or above the floor"
    );
    assert_eq!(rows[0].get("sales"), Some(&Value::Uint(3)));
    assert_eq!(rows[0].get("shop_name"), Some(&Value::text("North")));

    // no shop-2 sale clears the floor, so its revenue field is absent
    assert_eq!(rows[1].get("shop"), Some(&Value::Int(2)));
    assert_eq!(rows[1].get("revenue"), None);
    assert_eq!(rows[1].get("sales"), Some(&Value::Uint(2)));
}

#[test]
fn pipeline_rows_sort_by_any_column() {
    let cache = build_instance();

    let by_revenue = cache
        .instance_rows(
            "shop_summary",
            "min200",
            &SortOrder::new("revenue", Direction::Desc),
            None,
            0,
        )
        .expect("rows");

    let shops: Vec<&Value> = by_revenue.iter().map(|row| &row["shop"]).collect();
    // shop 2 has no qualifying revenue and indexes as null, sorting last
    assert_eq!(
        shops,
        vec![&Value::Int(1), &Value::Int(3), &Value::Int(2)]
    );

    assert_eq!(by_revenue[0].get(ROW_ID_FIELD), Some(&Value::text("0")));
}

#[test]
fn pipeline_footer_folds_the_declared_columns() {
    let cache = build_instance();

    let footer = cache
        .instance_footer("shop_summary", "min200")
        .expect("footer");

    assert_eq!(
        footer.get("revenue"),
        Some(&Value::Decimal(Decimal::new(1050, 2)))
    );
    assert_eq!(footer.get("sales"), Some(&Value::Uint(6)));
    assert!(
        !footer.contains_key("shop"),
        "group-by columns opt out of the footer"
    );
    assert!(!footer.contains_key("shop_name"));
}
