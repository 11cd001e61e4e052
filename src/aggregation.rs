use std::cmp::Ordering;
use std::collections::VecDeque;

use polars::prelude::{col, DataType, Expr};
use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::frame::{grouped, keyed_frame};
use crate::record::{Dimension, Flag, GroupKey, Measure, Record};
use crate::schema::view;
use crate::views::{View, ViewRows};

/// Sort order for top/bottom views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Descending,
    Ascending,
}

/// How rows sharing a partition and order key are folded before windowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyAgg {
    #[default]
    Sum,
    Mean,
    Count,
    Min,
    Max,
}

// ── Result rows ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct GroupTotal {
    pub key: GroupKey,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedGroup {
    /// Dense, 1 is highest.
    pub rank: u32,
    pub key: GroupKey,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlagRate {
    pub key: GroupKey,
    pub total: u64,
    pub flagged: u64,
    /// Percent, 2 dp.
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupShare {
    pub key: GroupKey,
    pub value: f64,
    /// Percent of the grand total, 2 dp.
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductMetrics {
    pub product_name: Option<String>,
    pub total_quantity: f64,
    pub total_revenue: f64,
    pub order_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovingAveragePoint {
    pub partition: GroupKey,
    pub order: GroupKey,
    /// The folded value for this `(partition, order)`.
    pub value: f64,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodGrowth {
    pub partition: GroupKey,
    pub period: GroupKey,
    pub value: f64,
    pub previous: Option<f64>,
    /// Absent for the first period and when the previous value is 0.
    pub growth_pct: Option<f64>,
}

// ── Primitives ──────────────────────────────────────────────────────────────

const VALUE: &str = view::VALUE;

/// Round half away from zero to 2 dp.
///
/// The scaled value is nudged by a relative 1e-12 before rounding, so that
/// 1.005 (stored as 1.00499..) still rounds up while 2.004999999 rounds down.
pub fn round2(x: f64) -> f64 {
    let scaled = x * 100.0;
    let nudge = (scaled.abs() * 1e-12).copysign(scaled);
    (scaled + nudge).round() / 100.0
}

/// Per-group sum of `measure`, in key order. Nulls contribute nothing, so a
/// group with only nulls sums to 0.
fn sums(records: &[Record], group: &[Dimension], measure: Measure) -> Result<Vec<GroupTotal>> {
    let values: Vec<Option<f64>> = records.iter().map(|r| measure.value(r)).collect();
    let df = keyed_frame(records, group, vec![(VALUE, values)])?;
    let rows = grouped(df, group.len(), vec![col(VALUE).sum()], &[VALUE])?;
    Ok(rows
        .into_iter()
        .map(|(key, v)| GroupTotal { key, value: v[0] })
        .collect())
}

fn by_value_desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

/// Sum of `measure` per group, highest first; equal sums keep key order.
pub fn group_sum(
    records: &[Record],
    group: &[Dimension],
    measure: Measure,
) -> Result<Vec<GroupTotal>> {
    let mut totals = sums(records, group, measure)?;
    totals.sort_by(|a, b| by_value_desc(a.value, b.value));
    Ok(totals)
}

/// The `n` highest (or lowest) groups by summed `measure`.
pub fn top_n(
    records: &[Record],
    group: &[Dimension],
    measure: Measure,
    n: usize,
    direction: Direction,
) -> Result<Vec<GroupTotal>> {
    let mut totals = group_sum(records, group, measure)?;
    if direction == Direction::Ascending {
        totals.sort_by(|a, b| a.value.total_cmp(&b.value));
    }
    totals.truncate(n);
    Ok(totals)
}

/// Dense rank of groups by summed `measure`, descending.
pub fn rank(records: &[Record], group: &[Dimension], measure: Measure) -> Result<Vec<RankedGroup>> {
    let mut ranked = Vec::new();
    let mut current = 0u32;
    let mut last: Option<f64> = None;
    for GroupTotal { key, value } in group_sum(records, group, measure)? {
        if last != Some(value) {
            current += 1;
            last = Some(value);
        }
        ranked.push(RankedGroup {
            rank: current,
            key,
            value,
        });
    }
    Ok(ranked)
}

/// Share of records per group whose `flag` is true, highest rate first.
pub fn flag_rate(records: &[Record], group: &[Dimension], flag: Flag) -> Result<Vec<FlagRate>> {
    let flagged: Vec<Option<f64>> = records
        .iter()
        .map(|r| Some(if r.flag(flag).is_true() { 1.0 } else { 0.0 }))
        .collect();
    let df = keyed_frame(records, group, vec![(view::FLAGGED, flagged)])?;
    let aggs = vec![
        col(view::FLAGGED)
            .count()
            .cast(DataType::Float64)
            .alias(view::TOTAL),
        col(view::FLAGGED).sum(),
    ];
    let rows = grouped(df, group.len(), aggs, &[view::TOTAL, view::FLAGGED])?;

    let mut rates: Vec<FlagRate> = rows
        .into_iter()
        .map(|(key, v)| FlagRate {
            key,
            total: v[0] as u64,
            flagged: v[1] as u64,
            rate: percent(v[1], v[0]),
        })
        .collect();
    rates.sort_by(|a, b| by_value_desc(a.rate, b.rate));
    Ok(rates)
}

/// [`flag_rate`] over `return_flag`.
pub fn return_rate(records: &[Record], group: &[Dimension]) -> Result<Vec<FlagRate>> {
    flag_rate(records, group, Flag::ReturnFlag)
}

/// `100 * part / whole`, 2 dp, 0 when `whole` is 0.
fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        round2(100.0 * part / whole)
    }
}

/// Each group's percentage of the grand total of `measure`.
pub fn share_of_total(
    records: &[Record],
    group: &[Dimension],
    measure: Measure,
) -> Result<Vec<GroupShare>> {
    let totals = group_sum(records, group, measure)?;
    let grand: f64 = totals.iter().map(|t| t.value).sum();
    Ok(totals
        .into_iter()
        .map(|GroupTotal { key, value }| GroupShare {
            key,
            value,
            share_pct: percent(value, grand),
        })
        .collect())
}

/// Total quantity, revenue and order count per product name, highest
/// revenue first.
pub fn product_metrics(records: &[Record]) -> Result<Vec<ProductMetrics>> {
    let quantity: Vec<Option<f64>> = records.iter().map(Record::quantity_value).collect();
    let revenue: Vec<Option<f64>> = records.iter().map(|r| r.total_cost).collect();
    let orders: Vec<Option<f64>> = records.iter().map(|_| Some(1.0)).collect();
    let df = keyed_frame(
        records,
        &[Dimension::ProductName],
        vec![
            (view::TOTAL_QUANTITY, quantity),
            (view::TOTAL_REVENUE, revenue),
            (view::ORDER_COUNT, orders),
        ],
    )?;
    let aggs = vec![
        col(view::TOTAL_QUANTITY).sum(),
        col(view::TOTAL_REVENUE).sum(),
        col(view::ORDER_COUNT).sum(),
    ];
    let names = [view::TOTAL_QUANTITY, view::TOTAL_REVENUE, view::ORDER_COUNT];

    let mut metrics: Vec<ProductMetrics> = grouped(df, 1, aggs, &names)?
        .into_iter()
        .map(|(mut key, v)| ProductMetrics {
            product_name: key.0.pop().flatten(),
            total_quantity: v[0],
            total_revenue: v[1],
            order_count: v[2] as u64,
        })
        .collect();
    metrics.sort_by(|a, b| by_value_desc(a.total_revenue, b.total_revenue));
    Ok(metrics)
}

impl DailyAgg {
    fn expr(self, name: &str) -> Expr {
        let c = col(name);
        match self {
            DailyAgg::Sum => c.sum(),
            DailyAgg::Mean => c.mean(),
            DailyAgg::Count => c.count().cast(DataType::Float64),
            DailyAgg::Min => c.min(),
            DailyAgg::Max => c.max(),
        }
    }
}

/// Fold `measure` per `(partition, order)` with `agg`, sorted by partition
/// then order key. Days with no values fold to 0.
fn fold_by(
    records: &[Record],
    partition: &[Dimension],
    order: &[Dimension],
    measure: Measure,
    agg: DailyAgg,
) -> Result<Vec<(GroupKey, GroupKey, f64)>> {
    let dims: Vec<Dimension> = partition.iter().chain(order).copied().collect();
    let values: Vec<Option<f64>> = records.iter().map(|r| measure.value(r)).collect();
    let df = keyed_frame(records, &dims, vec![(VALUE, values)])?;
    let rows = grouped(df, dims.len(), vec![agg.expr(VALUE)], &[VALUE])?;
    Ok(rows
        .into_iter()
        .map(|(GroupKey(mut parts), v)| {
            let order_parts = parts.split_off(partition.len());
            (GroupKey(parts), GroupKey(order_parts), v[0])
        })
        .collect())
}

/// Trailing mean over at most `window` rows (current row included) within
/// each partition. The first rows of a partition average what is
/// available. A `window` of 0 behaves as 1.
pub fn moving_average(
    records: &[Record],
    partition: &[Dimension],
    order: &[Dimension],
    measure: Measure,
    daily: DailyAgg,
    window: usize,
) -> Result<Vec<MovingAveragePoint>> {
    let window = window.max(1);
    let rows = fold_by(records, partition, order, measure, daily)?;
    debug!(rows = rows.len(), window, "moving average");

    let mut out = Vec::with_capacity(rows.len());
    let mut trailing: VecDeque<f64> = VecDeque::with_capacity(window);
    let mut current: Option<GroupKey> = None;
    for (p, o, value) in rows {
        if current.as_ref() != Some(&p) {
            trailing.clear();
            current = Some(p.clone());
        }
        if trailing.len() == window {
            trailing.pop_front();
        }
        trailing.push_back(value);
        let average = trailing.iter().sum::<f64>() / trailing.len() as f64;
        out.push(MovingAveragePoint {
            partition: p,
            order: o,
            value,
            average: round2(average),
        });
    }
    Ok(out)
}

/// Period-over-period change of summed `measure` within each partition.
pub fn period_growth(
    records: &[Record],
    partition: &[Dimension],
    period: Dimension,
    measure: Measure,
) -> Result<Vec<PeriodGrowth>> {
    let rows = fold_by(records, partition, &[period], measure, DailyAgg::Sum)?;

    let mut out: Vec<PeriodGrowth> = Vec::with_capacity(rows.len());
    for (p, o, value) in rows {
        let previous = out
            .last()
            .filter(|prev| prev.partition == p)
            .map(|prev| prev.value);
        let growth_pct = previous
            .filter(|prev| *prev != 0.0)
            .map(|prev| round2((value - prev) / prev * 100.0));
        out.push(PeriodGrowth {
            partition: p,
            period: o,
            value,
            previous,
            growth_pct,
        });
    }
    Ok(out)
}

// ── Declarative aggregations ────────────────────────────────────────────────

/// Declarative aggregation specification.
///
/// Built in code, from Python or from a `[[views]]` table in the config;
/// [`Aggregation::apply`] executes it against a record set.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct Aggregation {
    pub kind: AggKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggKind {
    ProductMetrics,
    GroupSum {
        group: Vec<Dimension>,
        measure: Measure,
    },
    TopN {
        group: Vec<Dimension>,
        measure: Measure,
        n: usize,
        #[serde(default)]
        direction: Direction,
    },
    Rank {
        group: Vec<Dimension>,
        measure: Measure,
    },
    FlagRate {
        group: Vec<Dimension>,
        flag: Flag,
    },
    ShareOfTotal {
        group: Vec<Dimension>,
        measure: Measure,
    },
    MovingAverage {
        partition: Vec<Dimension>,
        order: Vec<Dimension>,
        measure: Measure,
        #[serde(default)]
        daily: DailyAgg,
        window: usize,
    },
    PeriodGrowth {
        partition: Vec<Dimension>,
        period: Dimension,
        measure: Measure,
    },
}

impl Aggregation {
    pub fn product_metrics() -> Self {
        Self {
            kind: AggKind::ProductMetrics,
        }
    }

    pub fn group_sum(group: Vec<Dimension>, measure: Measure) -> Self {
        Self {
            kind: AggKind::GroupSum { group, measure },
        }
    }

    pub fn top_n(group: Vec<Dimension>, measure: Measure, n: usize, direction: Direction) -> Self {
        Self {
            kind: AggKind::TopN {
                group,
                measure,
                n,
                direction,
            },
        }
    }

    pub fn rank(group: Vec<Dimension>, measure: Measure) -> Self {
        Self {
            kind: AggKind::Rank { group, measure },
        }
    }

    pub fn flag_rate(group: Vec<Dimension>, flag: Flag) -> Self {
        Self {
            kind: AggKind::FlagRate { group, flag },
        }
    }

    pub fn share_of_total(group: Vec<Dimension>, measure: Measure) -> Self {
        Self {
            kind: AggKind::ShareOfTotal { group, measure },
        }
    }

    pub fn moving_average(
        partition: Vec<Dimension>,
        order: Vec<Dimension>,
        measure: Measure,
        daily: DailyAgg,
        window: usize,
    ) -> Self {
        Self {
            kind: AggKind::MovingAverage {
                partition,
                order,
                measure,
                daily,
                window,
            },
        }
    }

    pub fn period_growth(partition: Vec<Dimension>, period: Dimension, measure: Measure) -> Self {
        Self {
            kind: AggKind::PeriodGrowth {
                partition,
                period,
                measure,
            },
        }
    }

    /// Run the aggregation. Pure; the same records always give the same view.
    pub fn apply(&self, records: &[Record]) -> Result<View> {
        let view = match &self.kind {
            AggKind::ProductMetrics => View::grouped(
                vec![Dimension::ProductName],
                ViewRows::Products(product_metrics(records)?),
            ),
            AggKind::GroupSum { group, measure } => View::grouped(
                group.clone(),
                ViewRows::Totals(group_sum(records, group, *measure)?),
            ),
            AggKind::TopN {
                group,
                measure,
                n,
                direction,
            } => View::grouped(
                group.clone(),
                ViewRows::Totals(top_n(records, group, *measure, *n, *direction)?),
            ),
            AggKind::Rank { group, measure } => View::grouped(
                group.clone(),
                ViewRows::Ranked(rank(records, group, *measure)?),
            ),
            AggKind::FlagRate { group, flag } => View::grouped(
                group.clone(),
                ViewRows::Rates(flag_rate(records, group, *flag)?),
            ),
            AggKind::ShareOfTotal { group, measure } => View::grouped(
                group.clone(),
                ViewRows::Shares(share_of_total(records, group, *measure)?),
            ),
            AggKind::MovingAverage {
                partition,
                order,
                measure,
                daily,
                window,
            } => View::series(
                partition.clone(),
                order.clone(),
                ViewRows::MovingAverages(moving_average(
                    records, partition, order, *measure, *daily, *window,
                )?),
            ),
            AggKind::PeriodGrowth {
                partition,
                period,
                measure,
            } => View::series(
                partition.clone(),
                vec![*period],
                ViewRows::Growth(period_growth(records, partition, *period, *measure)?),
            ),
        };
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FlagValue;
    use chrono::NaiveDate;

    fn sale(id: i64, product: &str, date: &str, cost: f64) -> Record {
        let mut r = Record::new(id, NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap());
        r.product_id = Some(product.into());
        r.product_name = Some(product.into());
        r.total_cost = Some(cost);
        r
    }

    fn key(s: &str) -> GroupKey {
        GroupKey::from_parts([s])
    }

    const BY_PRODUCT: &[Dimension] = &[Dimension::ProductName];

    #[test]
    fn round2_is_half_up() {
        assert_eq!(round2(1.005), 1.01);
        assert_eq!(round2(-1.005), -1.01);
        assert_eq!(round2(2.675), 2.68);
        assert_eq!(round2(33.333333), 33.33);
        assert_eq!(round2(66.666666), 66.67);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn round2_keeps_values_just_below_half_down() {
        assert_eq!(round2(2.004999999), 2.0);
        assert_eq!(round2(33.334999996), 33.33);
        assert_eq!(round2(-2.004999999), -2.0);
        assert_eq!(round2(100.0 / 3.0), 33.33);
    }

    #[test]
    fn group_sum_orders_by_value_then_key() {
        let records = vec![
            sale(1, "Milk", "2024-01-01", 10.0),
            sale(2, "Curd", "2024-01-01", 30.0),
            sale(3, "Milk", "2024-01-02", 20.0),
            sale(4, "Butter", "2024-01-01", 5.0),
            sale(5, "Ghee", "2024-01-01", 30.0),
        ];
        let totals = group_sum(&records, BY_PRODUCT, Measure::Revenue).unwrap();
        let got: Vec<(String, f64)> = totals
            .iter()
            .map(|t| (t.key.to_string(), t.value))
            .collect();
        assert_eq!(
            got,
            vec![
                ("Curd".to_string(), 30.0),
                ("Ghee".to_string(), 30.0),
                ("Milk".to_string(), 30.0),
                ("Butter".to_string(), 5.0),
            ]
        );
    }

    #[test]
    fn group_sum_conserves_the_total() {
        let records = vec![
            sale(1, "Milk", "2024-01-01", 10.5),
            sale(2, "Curd", "2024-01-01", 30.25),
            sale(3, "Milk", "2024-01-02", 20.0),
        ];
        let grouped: f64 = group_sum(&records, BY_PRODUCT, Measure::Revenue)
            .unwrap()
            .iter()
            .map(|t| t.value)
            .sum();
        let direct: f64 = records.iter().filter_map(|r| r.total_cost).sum();
        assert!((grouped - direct).abs() < 1e-9);

        let whole = group_sum(&records, &[], Measure::Revenue).unwrap();
        assert_eq!(whole.len(), 1);
        assert!((whole[0].value - direct).abs() < 1e-9);
    }

    #[test]
    fn composite_keys_group_pairs() {
        let mut a = sale(1, "Milk", "2024-01-01", 10.0);
        a.season = Some("Winter".into());
        let mut b = sale(2, "Milk", "2024-06-01", 15.0);
        b.season = Some("Summer".into());
        let mut c = sale(3, "Milk", "2024-01-05", 5.0);
        c.season = Some("Winter".into());

        let totals = group_sum(
            &[a, b, c],
            &[Dimension::ProductName, Dimension::Season],
            Measure::Revenue,
        ).unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].key, GroupKey::from_parts(["Milk", "Summer"]));
        assert_eq!(totals[1].key, GroupKey::from_parts(["Milk", "Winter"]));
        assert_eq!(totals[1].value, 15.0);
    }

    #[test]
    fn top_n_both_directions() {
        let records = vec![
            sale(1, "A", "2024-01-01", 10.0),
            sale(2, "B", "2024-01-01", 40.0),
            sale(3, "C", "2024-01-01", 20.0),
            sale(4, "D", "2024-01-01", 10.0),
        ];
        let top = top_n(&records, BY_PRODUCT, Measure::Revenue, 2, Direction::Descending)
            .unwrap();
        assert_eq!(top.iter().map(|t| t.key.clone()).collect::<Vec<_>>(), vec![key("B"), key("C")]);

        let bottom = top_n(&records, BY_PRODUCT, Measure::Revenue, 3, Direction::Ascending)
            .unwrap();
        assert_eq!(
            bottom.iter().map(|t| t.key.clone()).collect::<Vec<_>>(),
            vec![key("A"), key("D"), key("C")]
        );

        let all = top_n(&records, BY_PRODUCT, Measure::Revenue, 10, Direction::Descending)
            .unwrap();
        assert_eq!(all.len(), 4);
        let none = top_n(&records, BY_PRODUCT, Measure::Revenue, 0, Direction::Descending)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn dense_rank_shares_ties_without_gaps() {
        let records = vec![
            sale(1, "A", "2024-01-01", 50.0),
            sale(2, "B", "2024-01-01", 80.0),
            sale(3, "C", "2024-01-01", 50.0),
            sale(4, "D", "2024-01-01", 20.0),
        ];
        let ranked = rank(&records, BY_PRODUCT, Measure::Revenue).unwrap();
        let got: Vec<(u32, String)> = ranked.iter().map(|r| (r.rank, r.key.to_string())).collect();
        assert_eq!(
            got,
            vec![
                (1, "B".to_string()),
                (2, "A".to_string()),
                (2, "C".to_string()),
                (3, "D".to_string()),
            ]
        );
    }

    #[test]
    fn return_rate_is_bounded_and_rounded() {
        let mut records: Vec<Record> = (1..=3)
            .map(|i| sale(i, "Milk", "2024-01-01", 1.0))
            .collect();
        records[0].return_flag = FlagValue::Canonical(true);
        records.push(sale(4, "Curd", "2024-01-01", 1.0));
        // Raw text is not a returned order until the cleaner has run.
        records[3].return_flag = FlagValue::Raw("Yes".into());

        let rates = return_rate(&records, BY_PRODUCT).unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].key, key("Milk"));
        assert_eq!((rates[0].total, rates[0].flagged), (3, 1));
        assert_eq!(rates[0].rate, 33.33);
        assert_eq!(rates[1].rate, 0.0);
        assert!(rates.iter().all(|r| (0.0..=100.0).contains(&r.rate)));
    }

    #[test]
    fn percent_of_nothing_is_zero() {
        assert_eq!(percent(0.0, 0.0), 0.0);
        assert_eq!(percent(3.0, 3.0), 100.0);
    }

    #[test]
    fn share_of_total_sums_to_one_hundred() {
        let records = vec![
            sale(1, "A", "2024-01-01", 25.0),
            sale(2, "B", "2024-01-01", 75.0),
        ];
        let shares = share_of_total(&records, BY_PRODUCT, Measure::Revenue).unwrap();
        assert_eq!(shares[0].share_pct, 75.0);
        assert_eq!(shares[1].share_pct, 25.0);

        let zero = vec![sale(1, "A", "2024-01-01", 0.0)];
        let zero = share_of_total(&zero, BY_PRODUCT, Measure::Revenue).unwrap();
        assert_eq!(zero[0].share_pct, 0.0);
    }

    #[test]
    fn product_metrics_per_name() {
        let mut a = sale(1, "Milk", "2024-01-01", 100.0);
        a.quantity = Some("10".into());
        let mut b = sale(2, "Milk", "2024-01-02", 50.0);
        b.quantity = Some("bad".into());
        let mut c = sale(3, "Paneer", "2024-01-02", 300.0);
        c.quantity = Some("2.5".into());

        let metrics = product_metrics(&[a, b, c]).unwrap();
        assert_eq!(
            metrics,
            vec![
                ProductMetrics {
                    product_name: Some("Paneer".into()),
                    total_quantity: 2.5,
                    total_revenue: 300.0,
                    order_count: 1,
                },
                ProductMetrics {
                    product_name: Some("Milk".into()),
                    total_quantity: 10.0,
                    total_revenue: 150.0,
                    order_count: 2,
                },
            ]
        );
    }

    #[test]
    fn moving_average_uses_a_ragged_trailing_window() {
        let records = vec![
            sale(1, "Milk", "2024-01-01", 10.0),
            sale(2, "Milk", "2024-01-02", 20.0),
            sale(3, "Milk", "2024-01-03", 30.0),
            sale(4, "Milk", "2024-01-04", 40.0),
        ];
        let points = moving_average(
            &records,
            BY_PRODUCT,
            &[Dimension::Date],
            Measure::Revenue,
            DailyAgg::Sum,
            2,
        ).unwrap();
        let averages: Vec<f64> = points.iter().map(|p| p.average).collect();
        assert_eq!(averages, vec![10.0, 15.0, 25.0, 35.0]);
    }

    #[test]
    fn moving_average_folds_days_and_restarts_per_partition() {
        let records = vec![
            sale(1, "Milk", "2024-01-02", 30.0),
            sale(2, "Curd", "2024-01-01", 7.0),
            sale(3, "Milk", "2024-01-01", 4.0),
            sale(4, "Milk", "2024-01-01", 6.0),
            sale(5, "Curd", "2024-01-02", 8.0),
        ];
        let points = moving_average(
            &records,
            BY_PRODUCT,
            &[Dimension::Date],
            Measure::Revenue,
            DailyAgg::Sum,
            3,
        ).unwrap();
        let got: Vec<(String, String, f64, f64)> = points
            .iter()
            .map(|p| (p.partition.to_string(), p.order.to_string(), p.value, p.average))
            .collect();
        assert_eq!(
            got,
            vec![
                ("Curd".into(), "2024-01-01".into(), 7.0, 7.0),
                ("Curd".into(), "2024-01-02".into(), 8.0, 7.5),
                ("Milk".into(), "2024-01-01".into(), 10.0, 10.0),
                ("Milk".into(), "2024-01-02".into(), 30.0, 20.0),
            ]
        );
    }

    #[test]
    fn moving_average_daily_mean_and_zero_window() {
        let records = vec![
            sale(1, "Milk", "2024-01-01", 4.0),
            sale(2, "Milk", "2024-01-01", 6.0),
            sale(3, "Milk", "2024-01-02", 9.0),
        ];
        let points = moving_average(
            &records,
            BY_PRODUCT,
            &[Dimension::Date],
            Measure::Revenue,
            DailyAgg::Mean,
            0,
        ).unwrap();
        let got: Vec<(f64, f64)> = points.iter().map(|p| (p.value, p.average)).collect();
        assert_eq!(got, vec![(5.0, 5.0), (9.0, 9.0)]);
    }

    #[test]
    fn daily_fold_count_min_max() {
        let mut empty_day = sale(3, "Milk", "2024-01-02", 0.0);
        empty_day.total_cost = None;
        let records = vec![
            sale(1, "Milk", "2024-01-01", 4.0),
            sale(2, "Milk", "2024-01-01", 6.0),
            empty_day,
        ];
        let folded = |daily| -> Vec<f64> {
            moving_average(&records, BY_PRODUCT, &[Dimension::Date], Measure::Revenue, daily, 1)
                .unwrap()
                .iter()
                .map(|p| p.value)
                .collect()
        };
        assert_eq!(folded(DailyAgg::Count), vec![2.0, 0.0]);
        assert_eq!(folded(DailyAgg::Min), vec![4.0, 0.0]);
        assert_eq!(folded(DailyAgg::Max), vec![6.0, 0.0]);
        assert_eq!(folded(DailyAgg::Sum), vec![10.0, 0.0]);
    }

    #[test]
    fn period_growth_tracks_previous_period() {
        let records = vec![
            sale(1, "Milk", "2024-01-10", 100.0),
            sale(2, "Milk", "2024-02-03", 150.0),
            sale(3, "Milk", "2024-03-03", 0.0),
            sale(4, "Milk", "2024-04-03", 50.0),
            sale(5, "Curd", "2024-02-01", 20.0),
        ];
        let growth =
            period_growth(&records, BY_PRODUCT, Dimension::Month, Measure::Revenue).unwrap();
        let got: Vec<(String, String, Option<f64>, Option<f64>)> = growth
            .iter()
            .map(|g| (g.partition.to_string(), g.period.to_string(), g.previous, g.growth_pct))
            .collect();
        assert_eq!(
            got,
            vec![
                ("Curd".into(), "2024-02".into(), None, None),
                ("Milk".into(), "2024-01".into(), None, None),
                ("Milk".into(), "2024-02".into(), Some(100.0), Some(50.0)),
                ("Milk".into(), "2024-03".into(), Some(150.0), Some(-100.0)),
                ("Milk".into(), "2024-04".into(), Some(0.0), None),
            ]
        );
    }

    #[test]
    fn empty_input_gives_empty_views() {
        let desc = Direction::Descending;
        assert!(group_sum(&[], BY_PRODUCT, Measure::Revenue).unwrap().is_empty());
        assert!(top_n(&[], BY_PRODUCT, Measure::Revenue, 5, desc).unwrap().is_empty());
        assert!(rank(&[], BY_PRODUCT, Measure::Revenue).unwrap().is_empty());
        assert!(return_rate(&[], BY_PRODUCT).unwrap().is_empty());
        assert!(share_of_total(&[], BY_PRODUCT, Measure::Revenue).unwrap().is_empty());
        assert!(product_metrics(&[]).unwrap().is_empty());
        let by_day = &[Dimension::Date];
        let points =
            moving_average(&[], BY_PRODUCT, by_day, Measure::Revenue, DailyAgg::Sum, 7).unwrap();
        assert!(points.is_empty());
        let growth = period_growth(&[], BY_PRODUCT, Dimension::Month, Measure::Revenue).unwrap();
        assert!(growth.is_empty());
    }

    #[test]
    fn declarative_aggregation_matches_primitive() {
        let records = vec![
            sale(1, "A", "2024-01-01", 10.0),
            sale(2, "B", "2024-01-01", 20.0),
        ];
        let view = Aggregation::rank(BY_PRODUCT.to_vec(), Measure::Revenue)
            .apply(&records)
            .unwrap();
        match view.rows {
            ViewRows::Ranked(rows) => {
                assert_eq!(rows, rank(&records, BY_PRODUCT, Measure::Revenue).unwrap())
            }
            _ => panic!("expected ranked rows"),
        }
    }
}
