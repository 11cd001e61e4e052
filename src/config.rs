//! Pipeline settings, loadable from TOML.

use std::path::Path;

use serde::Deserialize;

use crate::aggregation::Aggregation;
use crate::error::{PipelineError, Result};

/// What the loader does with a row it cannot type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Collect the error and keep loading.
    #[default]
    Skip,
    /// Fail the whole load on the first bad row.
    Abort,
}

/// How the cleaner treats flags that already hold a typed boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagPolicy {
    /// Only the truthy token maps to true; a typed `true` becomes false.
    #[default]
    Literal,
    /// Typed booleans keep their value; text still needs the truthy token.
    PreserveCanonical,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw flag text that normalizes to true.
    pub truthy_token: String,
    /// Raw flag text expected for false. Only used for auditing.
    pub falsy_token: String,
    /// chrono format for `date` and `expiry_date`.
    pub date_format: String,
    pub on_malformed: MalformedPolicy,
    pub flag_policy: FlagPolicy,
    /// Rows per trailing moving-average window, current row included.
    pub moving_average_window: usize,
    /// Size of the default top/bottom views.
    pub top_n: usize,
    /// Allowed gap between `total_cost` and `quantity * price_per_unit`.
    pub cost_tolerance: f64,
    /// Extra named views on top of the default catalog.
    pub views: Vec<ViewDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewDefinition {
    pub name: String,
    #[serde(flatten)]
    pub aggregation: Aggregation,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            truthy_token: "Yes".to_string(),
            falsy_token: "No".to_string(),
            date_format: "%Y-%m-%d".to_string(),
            on_malformed: MalformedPolicy::Skip,
            flag_policy: FlagPolicy::Literal,
            moving_average_window: 7,
            top_n: 5,
            cost_tolerance: 0.01,
            views: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.truthy_token.is_empty() {
            return Err(PipelineError::Config("truthy_token must not be empty".into()));
        }
        if self.date_format.is_empty() {
            return Err(PipelineError::Config("date_format must not be empty".into()));
        }
        if !(self.cost_tolerance >= 0.0) {
            return Err(PipelineError::Config(format!(
                "cost_tolerance must be non-negative, got {}",
                self.cost_tolerance
            )));
        }
        Ok(())
    }
}
