//! Deduplication and flag normalization.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::config::{FlagPolicy, PipelineConfig};
use crate::record::{Flag, FlagValue, Record};

/// `(product_id, date, vendor_id)`, the key duplicates are detected on.
pub type NaturalKey = (Option<String>, NaiveDate, Option<String>);

pub fn natural_key(r: &Record) -> NaturalKey {
    (r.product_id.clone(), r.date, r.vendor_id.clone())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub input: usize,
    pub duplicates_removed: usize,
    /// Flag cells whose stored value changed.
    pub flags_rewritten: usize,
}

pub struct Cleaner {
    truthy_token: String,
    policy: FlagPolicy,
}

impl Cleaner {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            truthy_token: config.truthy_token.clone(),
            policy: config.flag_policy,
        }
    }

    /// Deduplicate on the natural key, then normalize flags.
    pub fn clean(&self, records: Vec<Record>) -> (Vec<Record>, CleanReport) {
        let input = records.len();
        let mut records = deduplicate(records, natural_key);
        let duplicates_removed = input - records.len();
        let flags_rewritten = normalize_flags(&mut records, &self.truthy_token, self.policy);

        let report = CleanReport {
            input,
            duplicates_removed,
            flags_rewritten,
        };
        info!(
            input,
            kept = records.len(),
            duplicates_removed,
            flags_rewritten,
            "clean finished"
        );
        (records, report)
    }
}

/// Keep the lowest `record_id` per key; survivors stay in input order.
pub fn deduplicate<K, F>(records: Vec<Record>, key_fn: F) -> Vec<Record>
where
    K: Eq + Hash,
    F: Fn(&Record) -> K,
{
    let mut keeper: HashMap<K, (i64, usize)> = HashMap::with_capacity(records.len());
    for (idx, r) in records.iter().enumerate() {
        keeper
            .entry(key_fn(r))
            .and_modify(|best| {
                if r.record_id < best.0 {
                    *best = (r.record_id, idx);
                }
            })
            .or_insert((r.record_id, idx));
    }

    let mut keep = vec![false; records.len()];
    for (_, idx) in keeper.into_values() {
        keep[idx] = true;
    }

    let before = records.len();
    let kept: Vec<Record> = records
        .into_iter()
        .zip(keep)
        .filter_map(|(r, k)| k.then_some(r))
        .collect();
    debug!(before, after = kept.len(), "deduplicated");
    kept
}

/// Normalized value of a single flag.
///
/// Text maps to true only when it equals `token` exactly. Under
/// [`FlagPolicy::Literal`] a typed boolean is not the token either, so it
/// becomes false.
pub fn normalize_flag(raw: &FlagValue, token: &str, policy: FlagPolicy) -> bool {
    match (raw, policy) {
        (FlagValue::Raw(s), _) => s == token,
        (FlagValue::Canonical(b), FlagPolicy::PreserveCanonical) => *b,
        (FlagValue::Canonical(_), FlagPolicy::Literal) => false,
        (FlagValue::Missing, _) => false,
    }
}

/// Rewrite all three flags of every not-yet-normalized record to canonical
/// booleans. Returns how many flag cells changed.
pub fn normalize_flags(records: &mut [Record], token: &str, policy: FlagPolicy) -> usize {
    let mut rewritten = 0;
    for r in records.iter_mut().filter(|r| !r.flags_normalized) {
        for flag in Flag::ALL {
            let slot = r.flag_mut(flag);
            let normalized = FlagValue::Canonical(normalize_flag(slot, token, policy));
            if *slot != normalized {
                *slot = normalized;
                rewritten += 1;
            }
        }
        r.flags_normalized = true;
    }
    rewritten
}
