//! Turns tabular sources into [`Record`]s.
//!
//! Any DataFrame is accepted: boolean columns feed the flags as typed
//! values, every other column is read as text and parsed per field. CSV
//! files are read with all columns as strings; Parquet keeps its dtypes.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{MalformedPolicy, PipelineConfig};
use crate::error::{MalformedReason, MalformedRecordError, PipelineError, Result};
use crate::record::{FlagValue, Record};
use crate::schema::{flags, record};

/// Records parsed from a source plus the rows that were skipped.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub records: Vec<Record>,
    pub errors: Vec<MalformedRecordError>,
}

pub struct Loader {
    date_format: String,
    policy: MalformedPolicy,
}

impl Loader {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            date_format: config.date_format.clone(),
            policy: config.on_malformed,
        }
    }

    /// Load a CSV file, every column read as text.
    pub fn load_csv(
        &self,
        path: impl AsRef<Path>,
        rename: Option<&HashMap<String, String>>,
    ) -> Result<LoadOutcome> {
        let df = read_csv_as_strings(path.as_ref(), rename)?;
        self.load_frame(&df)
    }

    pub fn load_parquet(&self, path: impl AsRef<Path>) -> Result<LoadOutcome> {
        let file = File::open(path.as_ref())?;
        let df = ParquetReader::new(file).finish()?;
        self.load_frame(&df)
    }

    /// Parse every row of `df`.
    ///
    /// Fails outright when a required column is absent, or on the first bad
    /// row under [`MalformedPolicy::Abort`].
    pub fn load_frame(&self, df: &DataFrame) -> Result<LoadOutcome> {
        require_columns(df, &record::REQUIRED)?;
        let cells = FrameCells::new(df)?;
        debug!(rows = df.height(), columns = df.width(), "loading records");

        let mut outcome = LoadOutcome::default();
        for row in 0..df.height() {
            match self.parse_row(&cells, row) {
                Ok(r) => outcome.records.push(r),
                Err(e) => {
                    if self.policy == MalformedPolicy::Abort {
                        return Err(e.into());
                    }
                    warn!(row = e.row, field = e.field, "skipping malformed record: {e}");
                    outcome.errors.push(e);
                }
            }
        }

        info!(
            loaded = outcome.records.len(),
            skipped = outcome.errors.len(),
            "load finished"
        );
        Ok(outcome)
    }

    fn parse_row(&self, cells: &FrameCells, row: usize) -> Result<Record, MalformedRecordError> {
        let raw_id = cells.text(record::RECORD_ID, row);
        let malformed = |field: &'static str, reason: MalformedReason| MalformedRecordError {
            row,
            record_id: raw_id.map(str::to_string),
            field,
            reason,
        };
        let untypeable = |field: &'static str, expected: &'static str, value: &str| {
            malformed(
                field,
                MalformedReason::Untypeable {
                    expected,
                    value: value.to_string(),
                },
            )
        };

        let id_text = raw_id.ok_or_else(|| malformed(record::RECORD_ID, MalformedReason::Missing))?;
        let record_id = parse_record_id(id_text)
            .ok_or_else(|| untypeable(record::RECORD_ID, "integer", id_text))?;

        let date_text = cells
            .text(record::DATE, row)
            .ok_or_else(|| malformed(record::DATE, MalformedReason::Missing))?;
        let date = self
            .parse_date(date_text)
            .ok_or_else(|| untypeable(record::DATE, "date", date_text))?;

        let expiry_date = match cells.text(record::EXPIRY_DATE, row) {
            Some(t) => Some(
                self.parse_date(t)
                    .ok_or_else(|| untypeable(record::EXPIRY_DATE, "date", t))?,
            ),
            None => None,
        };

        let decimal = |field: &'static str| -> Result<Option<f64>, MalformedRecordError> {
            match cells.text(field, row) {
                Some(t) => t
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| untypeable(field, "decimal", t)),
                None => Ok(None),
            }
        };
        let text = |field: &'static str| cells.text(field, row).map(str::to_string);

        Ok(Record {
            record_id,
            date,
            expiry_date,
            product_id: text(record::PRODUCT_ID),
            product_name: text(record::PRODUCT_NAME),
            brand: text(record::BRAND),
            quantity: text(record::QUANTITY),
            unit: text(record::UNIT),
            price_per_unit: decimal(record::PRICE_PER_UNIT)?,
            total_cost: decimal(record::TOTAL_COST)?,
            vendor_id: text(record::VENDOR_ID),
            vendor_name: text(record::VENDOR_NAME),
            procurement_type: text(record::PROCUREMENT_TYPE),
            payment_mode: text(record::PAYMENT_MODE),
            location: text(record::LOCATION),
            latitude: decimal(record::LATITUDE)?,
            longitude: decimal(record::LONGITUDE)?,
            season: text(record::SEASON),
            shift: text(record::SHIFT),
            fat_content: decimal(record::FAT_CONTENT)?,
            snf_content: decimal(record::SNF_CONTENT)?,
            protein_content: decimal(record::PROTEIN_CONTENT)?,
            added_sugar: cells.flag(flags::ADDED_SUGAR, row),
            is_organic: cells.flag(flags::IS_ORGANIC, row),
            return_flag: cells.flag(flags::RETURN_FLAG, row),
            flags_normalized: false,
        })
    }

    /// Configured format first, then ISO (what Date columns render as).
    fn parse_date(&self, s: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(s, &self.date_format)
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .ok()
    }
}

/// Integer text, or an integral float such as `"3.0"` (what an ID column
/// with nulls becomes after a round trip through a float dtype).
fn parse_record_id(text: &str) -> Option<i64> {
    text.parse::<i64>().ok().or_else(|| {
        let f: f64 = text.parse().ok()?;
        (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
    })
}

// ── Column access ───────────────────────────────────────────────────────────

enum Cells {
    Text(StringChunked),
    Bool(BooleanChunked),
    Absent,
}

/// The record columns of a frame, pre-cast so rows can be read by index.
struct FrameCells {
    columns: HashMap<&'static str, Cells>,
}

impl FrameCells {
    fn new(df: &DataFrame) -> Result<Self> {
        let mut columns = HashMap::new();
        for name in record::ALL {
            let cells = match df.column(name) {
                Err(_) => Cells::Absent,
                Ok(c) if c.dtype() == &DataType::Boolean => {
                    Cells::Bool(c.as_materialized_series().bool()?.clone())
                }
                Ok(c) => {
                    let text = c.cast(&DataType::String)?;
                    Cells::Text(text.as_materialized_series().str()?.clone())
                }
            };
            columns.insert(name, cells);
        }
        Ok(Self { columns })
    }

    /// Trimmed, non-empty text of a cell.
    fn text(&self, name: &'static str, row: usize) -> Option<&str> {
        match self.columns.get(name)? {
            Cells::Text(ca) => ca.get(row).map(str::trim).filter(|s| !s.is_empty()),
            Cells::Bool(ca) => ca.get(row).map(|b| if b { "true" } else { "false" }),
            Cells::Absent => None,
        }
    }

    fn flag(&self, name: &'static str, row: usize) -> FlagValue {
        match self.columns.get(name) {
            Some(Cells::Bool(ca)) => ca.get(row).map_or(FlagValue::Missing, FlagValue::Canonical),
            _ => self
                .text(name, row)
                .map_or(FlagValue::Missing, |s| FlagValue::Raw(s.to_string())),
        }
    }
}

// ── CSV helpers ─────────────────────────────────────────────────────────────

/// Read a CSV file with all columns as String dtype.
/// Trims whitespace from column names and cells, and applies optional rename.
pub fn read_csv_as_strings(
    path: &Path,
    rename: Option<&HashMap<String, String>>,
) -> Result<DataFrame> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    if let Some(map) = rename {
        let old: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
        let new: Vec<&str> = map.values().map(|s| s.as_str()).collect();
        df = df.lazy().rename(old, new, true).collect()?;
    }

    let names: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.to_string())
        .collect();
    let strip: Vec<Expr> = names
        .iter()
        .map(|c| col(c.as_str()).str().strip_chars(lit(" \t\r\n")))
        .collect();
    let df = df.lazy().with_columns(strip).collect()?;

    debug!(path = %path.display(), rows = df.height(), "read csv");
    Ok(df)
}

fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(PipelineError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}
