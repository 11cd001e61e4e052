//! Named, recomputable output views.

use std::collections::BTreeMap;

use polars::prelude::*;
use tracing::{debug, info};

use crate::aggregation::{
    Aggregation, DailyAgg, Direction, FlagRate, GroupShare, GroupTotal, MovingAveragePoint,
    PeriodGrowth, ProductMetrics, RankedGroup,
};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::record::{Dimension, Flag, GroupKey, Measure, Record};
use crate::schema::{record, view};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewRows {
    Totals(Vec<GroupTotal>),
    Ranked(Vec<RankedGroup>),
    Rates(Vec<FlagRate>),
    Shares(Vec<GroupShare>),
    Products(Vec<ProductMetrics>),
    MovingAverages(Vec<MovingAveragePoint>),
    Growth(Vec<PeriodGrowth>),
}

/// Result of one aggregation plus the dimensions its keys are made of.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    /// Grouping or partition dimensions.
    pub group: Vec<Dimension>,
    /// Ordering dimensions for series views; empty otherwise.
    pub order: Vec<Dimension>,
    pub rows: ViewRows,
}

impl View {
    pub(crate) fn grouped(group: Vec<Dimension>, rows: ViewRows) -> Self {
        Self {
            group,
            order: Vec::new(),
            rows,
        }
    }

    pub(crate) fn series(partition: Vec<Dimension>, order: Vec<Dimension>, rows: ViewRows) -> Self {
        Self {
            group: partition,
            order,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        match &self.rows {
            ViewRows::Totals(r) => r.len(),
            ViewRows::Ranked(r) => r.len(),
            ViewRows::Rates(r) => r.len(),
            ViewRows::Shares(r) => r.len(),
            ViewRows::Products(r) => r.len(),
            ViewRows::MovingAverages(r) => r.len(),
            ViewRows::Growth(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render as a DataFrame: one column per key dimension, then the values.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::new();
        match &self.rows {
            ViewRows::Totals(rows) => {
                columns.extend(key_columns(&self.group, rows.iter().map(|r| &r.key)));
                columns.push(float_column(view::VALUE, rows.iter().map(|r| r.value)));
            }
            ViewRows::Ranked(rows) => {
                let ranks: Vec<u32> = rows.iter().map(|r| r.rank).collect();
                columns.push(Series::new(view::RANK.into(), ranks).into());
                columns.extend(key_columns(&self.group, rows.iter().map(|r| &r.key)));
                columns.push(float_column(view::VALUE, rows.iter().map(|r| r.value)));
            }
            ViewRows::Rates(rows) => {
                columns.extend(key_columns(&self.group, rows.iter().map(|r| &r.key)));
                let totals: Vec<u64> = rows.iter().map(|r| r.total).collect();
                let flagged: Vec<u64> = rows.iter().map(|r| r.flagged).collect();
                columns.push(Series::new(view::TOTAL.into(), totals).into());
                columns.push(Series::new(view::FLAGGED.into(), flagged).into());
                columns.push(float_column(view::RATE, rows.iter().map(|r| r.rate)));
            }
            ViewRows::Shares(rows) => {
                columns.extend(key_columns(&self.group, rows.iter().map(|r| &r.key)));
                columns.push(float_column(view::VALUE, rows.iter().map(|r| r.value)));
                columns.push(float_column(view::SHARE_PCT, rows.iter().map(|r| r.share_pct)));
            }
            ViewRows::Products(rows) => {
                let names: Vec<Option<String>> =
                    rows.iter().map(|r| r.product_name.clone()).collect();
                let counts: Vec<u64> = rows.iter().map(|r| r.order_count).collect();
                columns.push(Series::new(record::PRODUCT_NAME.into(), names).into());
                columns.push(float_column(
                    view::TOTAL_QUANTITY,
                    rows.iter().map(|r| r.total_quantity),
                ));
                columns.push(float_column(
                    view::TOTAL_REVENUE,
                    rows.iter().map(|r| r.total_revenue),
                ));
                columns.push(Series::new(view::ORDER_COUNT.into(), counts).into());
            }
            ViewRows::MovingAverages(rows) => {
                columns.extend(key_columns(&self.group, rows.iter().map(|r| &r.partition)));
                columns.extend(key_columns(&self.order, rows.iter().map(|r| &r.order)));
                columns.push(float_column(view::VALUE, rows.iter().map(|r| r.value)));
                columns.push(float_column(
                    view::MOVING_AVERAGE,
                    rows.iter().map(|r| r.average),
                ));
            }
            ViewRows::Growth(rows) => {
                columns.extend(key_columns(&self.group, rows.iter().map(|r| &r.partition)));
                columns.extend(key_columns(&self.order, rows.iter().map(|r| &r.period)));
                columns.push(float_column(view::VALUE, rows.iter().map(|r| r.value)));
                let previous: Vec<Option<f64>> = rows.iter().map(|r| r.previous).collect();
                let growth: Vec<Option<f64>> = rows.iter().map(|r| r.growth_pct).collect();
                columns.push(Series::new(view::PREVIOUS.into(), previous).into());
                columns.push(Series::new(view::GROWTH_PCT.into(), growth).into());
            }
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// One string column per dimension; none for whole-table views.
fn key_columns<'a>(dims: &[Dimension], keys: impl Iterator<Item = &'a GroupKey>) -> Vec<Column> {
    let keys: Vec<&GroupKey> = keys.collect();
    dims.iter()
        .enumerate()
        .map(|(i, dim)| {
            let values: Vec<Option<String>> =
                keys.iter().map(|k| k.0.get(i).cloned().flatten()).collect();
            Series::new(dim.name().into(), values).into()
        })
        .collect()
}

fn float_column(name: &str, values: impl Iterator<Item = f64>) -> Column {
    Series::new(name.into(), values.collect::<Vec<f64>>()).into()
}

// ── Catalog ─────────────────────────────────────────────────────────────────

/// Named aggregations the reporting layer reads from.
#[derive(Debug, Clone, Default)]
pub struct ViewCatalog {
    views: BTreeMap<String, Aggregation>,
}

impl ViewCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard KPI views, plus any `[[views]]` from the config (a config
    /// view replaces a standard one of the same name).
    pub fn standard(config: &PipelineConfig) -> Self {
        let n = config.top_n;
        let window = config.moving_average_window;
        let mut catalog = Self::new();
        catalog
            .register("product_metrics", Aggregation::product_metrics())
            .register(
                "revenue_by_product",
                Aggregation::group_sum(vec![Dimension::ProductName], Measure::Revenue),
            )
            .register(
                "revenue_by_vendor",
                Aggregation::group_sum(vec![Dimension::VendorName], Measure::Revenue),
            )
            .register(
                "revenue_by_season",
                Aggregation::group_sum(vec![Dimension::Season], Measure::Revenue),
            )
            .register(
                "revenue_by_product_season",
                Aggregation::group_sum(
                    vec![Dimension::ProductName, Dimension::Season],
                    Measure::Revenue,
                ),
            )
            .register(
                "quantity_by_location",
                Aggregation::group_sum(vec![Dimension::Location], Measure::Quantity),
            )
            .register(
                "top_products",
                Aggregation::top_n(
                    vec![Dimension::ProductName],
                    Measure::Revenue,
                    n,
                    Direction::Descending,
                ),
            )
            .register(
                "bottom_products",
                Aggregation::top_n(
                    vec![Dimension::ProductName],
                    Measure::Revenue,
                    n,
                    Direction::Ascending,
                ),
            )
            .register(
                "product_rank",
                Aggregation::rank(vec![Dimension::ProductName], Measure::Revenue),
            )
            .register(
                "vendor_rank",
                Aggregation::rank(vec![Dimension::VendorName], Measure::Revenue),
            )
            .register(
                "return_rate_by_product",
                Aggregation::flag_rate(vec![Dimension::ProductName], Flag::ReturnFlag),
            )
            .register(
                "return_rate_by_vendor",
                Aggregation::flag_rate(vec![Dimension::VendorName], Flag::ReturnFlag),
            )
            .register(
                "organic_share_by_brand",
                Aggregation::flag_rate(vec![Dimension::Brand], Flag::IsOrganic),
            )
            .register(
                "revenue_share_by_vendor",
                Aggregation::share_of_total(vec![Dimension::VendorName], Measure::Revenue),
            )
            .register(
                "product_revenue_moving_avg",
                Aggregation::moving_average(
                    vec![Dimension::ProductName],
                    vec![Dimension::Date],
                    Measure::Revenue,
                    DailyAgg::Sum,
                    window,
                ),
            )
            .register(
                "monthly_revenue_growth",
                Aggregation::period_growth(vec![], Dimension::Month, Measure::Revenue),
            );

        for def in &config.views {
            catalog.register(def.name.clone(), def.aggregation.clone());
        }
        catalog
    }

    pub fn register(&mut self, name: impl Into<String>, aggregation: Aggregation) -> &mut Self {
        self.views.insert(name.into(), aggregation);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(|s| s.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Aggregation> {
        self.views.get(name)
    }

    /// Recompute a single view from `records`.
    pub fn compute(&self, name: &str, records: &[Record]) -> Result<View> {
        let agg = self
            .views
            .get(name)
            .ok_or_else(|| PipelineError::UnknownView(name.to_string()))?;
        let view = agg.apply(records)?;
        debug!(view = name, rows = view.len(), "computed view");
        Ok(view)
    }

    /// Recompute every view.
    pub fn compute_all(&self, records: &[Record]) -> Result<BTreeMap<String, View>> {
        let views = self
            .views
            .iter()
            .map(|(name, agg)| Ok((name.clone(), agg.apply(records)?)))
            .collect::<Result<BTreeMap<String, View>>>()?;
        info!(views = views.len(), records = records.len(), "views recomputed");
        Ok(views)
    }
}
