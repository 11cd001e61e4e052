//! Read-only data-quality report over loaded records.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use polars::prelude::*;
use tracing::info;

use crate::cleaner::{natural_key, NaturalKey};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::record::{is_decimal, Flag, FlagValue, Record};
use crate::schema::{self, record};

#[derive(Debug, Clone, PartialEq)]
pub struct QuantityViolation {
    pub record_id: i64,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostMismatch {
    pub record_id: i64,
    pub total_cost: f64,
    pub expected: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub key: NaturalKey,
    /// In input order.
    pub record_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditReport {
    pub records: usize,
    /// Every record column, in schema order, with its null count.
    pub null_counts: Vec<(&'static str, usize)>,
    pub quantity_violations: Vec<QuantityViolation>,
    pub flag_values: BTreeMap<Flag, BTreeSet<FlagValue>>,
    pub cost_mismatches: Vec<CostMismatch>,
    pub duplicate_groups: Vec<DuplicateGroup>,
    truthy_token: String,
    falsy_token: String,
}

impl AuditReport {
    pub fn null_count(&self, field: &str) -> Option<usize> {
        self.null_counts
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, n)| *n)
    }

    /// Observed flag values other than the two expected tokens.
    pub fn non_canonical_values(&self, flag: Flag) -> Vec<&FlagValue> {
        self.flag_values
            .get(&flag)
            .into_iter()
            .flatten()
            .filter(|v| match v {
                FlagValue::Canonical(_) => false,
                FlagValue::Raw(s) => *s != self.truthy_token && *s != self.falsy_token,
                FlagValue::Missing => true,
            })
            .collect()
    }

    /// Records sharing a natural key with at least one other record.
    pub fn duplicate_records(&self) -> usize {
        self.duplicate_groups
            .iter()
            .map(|g| g.record_ids.len() - 1)
            .sum()
    }

    /// The null-count table, one row per column.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let fields: Vec<&str> = self.null_counts.iter().map(|(f, _)| *f).collect();
        let counts: Vec<u64> = self.null_counts.iter().map(|(_, n)| *n as u64).collect();
        let df = DataFrame::new(vec![
            Series::new(schema::audit::FIELD.into(), fields).into(),
            Series::new(schema::audit::NULL_COUNT.into(), counts).into(),
        ])?;
        Ok(df)
    }
}

/// Build the report. Never mutates or rejects records.
pub fn audit(records: &[Record], config: &PipelineConfig) -> AuditReport {
    let null_counts = record::ALL
        .iter()
        .map(|&field| {
            let n = records
                .iter()
                .filter(|r| r.is_null(field).unwrap_or(false))
                .count();
            (field, n)
        })
        .collect();

    let quantity_violations = records
        .iter()
        .filter_map(|r| {
            let q = r.quantity.as_deref()?;
            (!is_decimal(q)).then(|| QuantityViolation {
                record_id: r.record_id,
                raw: q.to_string(),
            })
        })
        .collect::<Vec<_>>();

    let mut flag_values: BTreeMap<Flag, BTreeSet<FlagValue>> = BTreeMap::new();
    for flag in Flag::ALL {
        let seen = records.iter().map(|r| r.flag(flag).clone()).collect();
        flag_values.insert(flag, seen);
    }

    let cost_mismatches = records
        .iter()
        .filter_map(|r| {
            let expected = r.quantity_value()? * r.price_per_unit?;
            let total_cost = r.total_cost?;
            ((total_cost - expected).abs() > config.cost_tolerance).then_some(CostMismatch {
                record_id: r.record_id,
                total_cost,
                expected,
            })
        })
        .collect::<Vec<_>>();

    let duplicate_groups = duplicate_groups(records);

    let report = AuditReport {
        records: records.len(),
        null_counts,
        quantity_violations,
        flag_values,
        cost_mismatches,
        duplicate_groups,
        truthy_token: config.truthy_token.clone(),
        falsy_token: config.falsy_token.clone(),
    };

    info!(
        records = report.records,
        quantity_violations = report.quantity_violations.len(),
        cost_mismatches = report.cost_mismatches.len(),
        duplicates = report.duplicate_records(),
        "audit finished"
    );
    report
}

fn duplicate_groups(records: &[Record]) -> Vec<DuplicateGroup> {
    let mut order: Vec<NaturalKey> = Vec::new();
    let mut ids: HashMap<NaturalKey, Vec<i64>> = HashMap::new();
    for r in records {
        let key = natural_key(r);
        let entry = ids.entry(key.clone()).or_default();
        if entry.is_empty() {
            order.push(key);
        }
        entry.push(r.record_id);
    }

    order
        .into_iter()
        .filter_map(|key| {
            let record_ids = ids.remove(&key)?;
            (record_ids.len() > 1).then_some(DuplicateGroup { key, record_ids })
        })
        .collect()
}
