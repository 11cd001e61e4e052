//! `load → audit → clean → views`, in that order, over one record set.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use polars::prelude::DataFrame;
use tracing::{info, info_span};

use crate::audit::{audit, AuditReport};
use crate::cleaner::{CleanReport, Cleaner};
use crate::config::PipelineConfig;
use crate::error::{MalformedRecordError, Result};
use crate::loader::{LoadOutcome, Loader};
use crate::record::Record;
use crate::views::{View, ViewCatalog};

/// Everything one pipeline pass produced.
#[derive(Debug)]
pub struct PipelineRun {
    pub load_errors: Vec<MalformedRecordError>,
    /// Audit of the records as loaded, before cleaning.
    pub audit: AuditReport,
    pub clean: CleanReport,
    pub records: Vec<Record>,
    pub views: BTreeMap<String, View>,
}

pub struct Pipeline {
    config: PipelineConfig,
    catalog: ViewCatalog,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let catalog = ViewCatalog::standard(&config);
        Self { config, catalog }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ViewCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut ViewCatalog {
        &mut self.catalog
    }

    pub fn run_csv(
        &self,
        path: impl AsRef<Path>,
        rename: Option<&HashMap<String, String>>,
    ) -> Result<PipelineRun> {
        let outcome = Loader::new(&self.config).load_csv(path, rename)?;
        self.run_loaded(outcome)
    }

    pub fn run_frame(&self, df: &DataFrame) -> Result<PipelineRun> {
        let outcome = Loader::new(&self.config).load_frame(df)?;
        self.run_loaded(outcome)
    }

    /// Run the post-load stages over records that are already in memory.
    pub fn run_records(&self, records: Vec<Record>) -> Result<PipelineRun> {
        self.run_loaded(LoadOutcome {
            records,
            errors: Vec::new(),
        })
    }

    fn run_loaded(&self, outcome: LoadOutcome) -> Result<PipelineRun> {
        let _span = info_span!("pipeline", records = outcome.records.len()).entered();

        let report = audit(&outcome.records, &self.config);
        let (records, clean) = Cleaner::new(&self.config).clean(outcome.records);
        let views = self.catalog.compute_all(&records)?;

        info!(
            load_errors = outcome.errors.len(),
            records = records.len(),
            views = views.len(),
            "pipeline finished"
        );
        Ok(PipelineRun {
            load_errors: outcome.errors,
            audit: report,
            clean,
            records,
            views,
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}
