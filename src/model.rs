use std::collections::HashMap;
use std::path::PathBuf;

use pyo3::prelude::*;
use pyo3_polars::PyDataFrame;

use crate::audit::{audit, AuditReport};
use crate::cleaner::Cleaner;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::loader::{LoadOutcome, Loader};
use crate::pipeline::Pipeline;
use crate::record::Record;

/// Python handle over one dataset: load, audit, clean, then read views.
#[pyclass]
pub struct DairyModel {
    base_path: PathBuf,
    pipeline: Pipeline,
    loaded: Option<Vec<Record>>,
    cleaned: Option<Vec<Record>>,
    load_errors: Vec<String>,
    report: Option<AuditReport>,
}

#[pymethods]
impl DairyModel {
    #[new]
    #[pyo3(signature = (base_path, config_file=None))]
    fn new(base_path: String, config_file: Option<&str>) -> PyResult<Self> {
        let base_path = PathBuf::from(base_path);
        let config = match config_file {
            Some(f) => PipelineConfig::from_file(base_path.join(f))?,
            None => PipelineConfig::default(),
        };
        Ok(Self {
            base_path,
            pipeline: Pipeline::new(config),
            loaded: None,
            cleaned: None,
            load_errors: Vec::new(),
            report: None,
        })
    }

    // ── Data loading ────────────────────────────────────────────────────────

    /// Load the transactions CSV. Returns the number of records kept;
    /// skipped rows are listed by `load_errors`.
    #[pyo3(signature = (filename="dairy_dataset.csv", rename=None))]
    fn load_csv(
        &mut self,
        filename: &str,
        rename: Option<HashMap<String, String>>,
    ) -> PyResult<usize> {
        let path = self.base_path.join(filename);
        let outcome = Loader::new(self.pipeline.config()).load_csv(path, rename.as_ref())?;
        Ok(self.accept(outcome))
    }

    /// Load transactions from a Polars DataFrame.
    fn load_frame(&mut self, df: PyDataFrame) -> PyResult<usize> {
        let outcome = Loader::new(self.pipeline.config()).load_frame(&df.0)?;
        Ok(self.accept(outcome))
    }

    #[getter]
    fn load_errors(&self) -> Vec<String> {
        self.load_errors.clone()
    }

    // ── Audit ───────────────────────────────────────────────────────────────

    /// Null count per column of the loaded records.
    fn audit_nulls(&mut self) -> PyResult<PyDataFrame> {
        let df = self.audit_report()?.to_frame()?;
        Ok(PyDataFrame(df))
    }

    /// `(record_id, raw)` for every quantity that is not a plain decimal.
    fn quantity_violations(&mut self) -> PyResult<Vec<(i64, String)>> {
        Ok(self
            .audit_report()?
            .quantity_violations
            .iter()
            .map(|v| (v.record_id, v.raw.clone()))
            .collect())
    }

    /// Distinct raw values per flag column.
    fn flag_values(&mut self) -> PyResult<HashMap<String, Vec<String>>> {
        Ok(self
            .audit_report()?
            .flag_values
            .iter()
            .map(|(flag, values)| {
                (
                    flag.column().to_string(),
                    values.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect())
    }

    // ── Cleaning ────────────────────────────────────────────────────────────

    /// Deduplicate and normalize flags. Returns
    /// `(input, duplicates_removed, flags_rewritten)`.
    fn clean(&mut self) -> PyResult<(usize, usize, usize)> {
        let records = self.loaded_records()?.to_vec();
        let (cleaned, report) = Cleaner::new(self.pipeline.config()).clean(records);
        self.cleaned = Some(cleaned);
        Ok((report.input, report.duplicates_removed, report.flags_rewritten))
    }

    // ── Views ───────────────────────────────────────────────────────────────

    fn view_names(&self) -> Vec<String> {
        self.pipeline.catalog().names().map(str::to_string).collect()
    }

    /// Compute a named view over the cleaned records.
    fn view(&self, name: &str) -> PyResult<PyDataFrame> {
        let records = self
            .cleaned
            .as_ref()
            .ok_or_else(|| PipelineError::NotLoaded("cleaned records".into()))?;
        let df = self.pipeline.catalog().compute(name, records)?.to_frame()?;
        Ok(PyDataFrame(df))
    }
}

// ── Private helpers ─────────────────────────────────────────────────────────

impl DairyModel {
    fn accept(&mut self, outcome: LoadOutcome) -> usize {
        let n = outcome.records.len();
        self.load_errors = outcome.errors.iter().map(|e| e.to_string()).collect();
        self.loaded = Some(outcome.records);
        self.cleaned = None;
        self.report = None;
        n
    }

    fn loaded_records(&self) -> Result<&[Record], PipelineError> {
        self.loaded
            .as_deref()
            .ok_or_else(|| PipelineError::NotLoaded("records".into()))
    }

    fn audit_report(&mut self) -> Result<&AuditReport, PipelineError> {
        if self.report.is_none() {
            let report = audit(self.loaded_records()?, self.pipeline.config());
            self.report = Some(report);
        }
        self.report
            .as_ref()
            .ok_or_else(|| PipelineError::NotLoaded("audit".into()))
    }
}
