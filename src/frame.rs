//! Record sets projected into polars frames for grouped aggregation.
//!
//! Each grouping dimension becomes a string key column (`key_0`, `key_1`, ..)
//! next to the value columns an aggregation needs. Grouping, summing and
//! folding then run as `group_by().agg()`, and the result is read back into
//! [`GroupKey`]s sorted in key order.

use polars::prelude::{
    col, Column, DataFrame, Expr, IntoLazy, NamedFrom, PolarsResult, Series,
};

use crate::record::{Dimension, GroupKey, Record};

fn key_name(i: usize) -> String {
    format!("key_{i}")
}

/// One string column per dimension, then the given `f64` columns.
pub(crate) fn keyed_frame(
    records: &[Record],
    dims: &[Dimension],
    values: Vec<(&str, Vec<Option<f64>>)>,
) -> PolarsResult<DataFrame> {
    let mut columns: Vec<Column> = dims
        .iter()
        .enumerate()
        .map(|(i, dim)| {
            let keys: Vec<Option<String>> = records.iter().map(|r| dim.value(r)).collect();
            Series::new(key_name(i).into(), keys).into()
        })
        .collect();
    for (name, vals) in values {
        columns.push(Series::new(name.into(), vals).into());
    }
    DataFrame::new(columns)
}

/// Run `aggs` per distinct key over the first `n_keys` key columns, or over
/// the whole frame when there are none.
///
/// Returns one row per group, sorted by key, holding the `f64` value of each
/// column in `names`. Null aggregates (no values in the group) read as 0.
pub(crate) fn grouped(
    df: DataFrame,
    n_keys: usize,
    aggs: Vec<Expr>,
    names: &[&str],
) -> PolarsResult<Vec<(GroupKey, Vec<f64>)>> {
    if df.height() == 0 {
        return Ok(Vec::new());
    }
    let out = if n_keys == 0 {
        df.lazy().select(aggs).collect()?
    } else {
        let by: Vec<Expr> = (0..n_keys).map(|i| col(key_name(i))).collect();
        df.lazy().group_by(by).agg(aggs).collect()?
    };

    let mut keys = vec![GroupKey(Vec::with_capacity(n_keys)); out.height()];
    for i in 0..n_keys {
        let column = out.column(&key_name(i))?;
        let parts = column.as_materialized_series().str()?;
        for (key, part) in keys.iter_mut().zip(parts.into_iter()) {
            key.0.push(part.map(str::to_string));
        }
    }

    let mut values: Vec<Vec<f64>> = vec![Vec::with_capacity(names.len()); out.height()];
    for &name in names {
        let column = out.column(name)?;
        let floats = column.as_materialized_series().f64()?;
        for (row, v) in values.iter_mut().zip(floats.into_iter()) {
            row.push(v.unwrap_or(0.0));
        }
    }

    let mut rows: Vec<(GroupKey, Vec<f64>)> = keys.into_iter().zip(values).collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use polars::prelude::DataType;

    fn sale(id: i64, product: Option<&str>, cost: Option<f64>) -> Record {
        let mut r = Record::new(id, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        r.product_name = product.map(str::to_string);
        r.total_cost = cost;
        r
    }

    fn costs(records: &[Record]) -> Vec<Option<f64>> {
        records.iter().map(|r| r.total_cost).collect()
    }

    #[test]
    fn keyed_frame_has_key_and_value_columns() {
        let records = vec![sale(1, Some("Milk"), Some(2.0)), sale(2, None, None)];
        let df = keyed_frame(
            &records,
            &[Dimension::ProductName, Dimension::Date],
            vec![("value", costs(&records))],
        )
        .unwrap();
        assert_eq!(df.get_column_names_str(), vec!["key_0", "key_1", "value"]);
        assert_eq!(df.column("key_0").unwrap().null_count(), 1);
        assert_eq!(df.column("value").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn groups_come_back_sorted_with_null_keys_first() {
        let records = vec![
            sale(1, Some("Milk"), Some(2.0)),
            sale(2, None, Some(1.0)),
            sale(3, Some("Curd"), Some(4.0)),
            sale(4, Some("Milk"), None),
            sale(5, Some("Milk"), Some(3.0)),
        ];
        let df = keyed_frame(
            &records,
            &[Dimension::ProductName],
            vec![("value", costs(&records))],
        )
        .unwrap();
        let rows = grouped(df, 1, vec![col("value").sum()], &["value"]).unwrap();
        assert_eq!(
            rows,
            vec![
                (GroupKey(vec![None]), vec![1.0]),
                (GroupKey::from_parts(["Curd"]), vec![4.0]),
                (GroupKey::from_parts(["Milk"]), vec![5.0]),
            ]
        );
    }

    #[test]
    fn no_keys_aggregates_the_whole_frame() {
        let records = vec![sale(1, Some("Milk"), Some(2.0)), sale(2, None, Some(5.0))];
        let df = keyed_frame(&records, &[], vec![("value", costs(&records))]).unwrap();
        let rows = grouped(df, 0, vec![col("value").max()], &["value"]).unwrap();
        assert_eq!(rows, vec![(GroupKey(vec![]), vec![5.0])]);
    }

    #[test]
    fn all_null_group_reads_as_zero() {
        let records = vec![sale(1, Some("Milk"), None)];
        let df = keyed_frame(
            &records,
            &[Dimension::ProductName],
            vec![("value", costs(&records))],
        )
        .unwrap();
        let rows = grouped(df, 1, vec![col("value").mean()], &["value"]).unwrap();
        assert_eq!(rows[0].1, vec![0.0]);
    }

    #[test]
    fn empty_frame_has_no_groups() {
        let df = keyed_frame(&[], &[Dimension::ProductName], vec![("value", vec![])]).unwrap();
        assert!(grouped(df, 1, vec![col("value").sum()], &["value"]).unwrap().is_empty());
    }
}
