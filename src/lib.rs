//! Cleaning and KPI aggregation for dairy supply-chain transactions.
//!
//! Records are loaded from a tabular source, audited, deduplicated and
//! flag-normalized, then summarized into named views:
//!
//! ```no_run
//! use dairy_kpi::{Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::new(PipelineConfig::default());
//! let run = pipeline.run_csv("dairy_dataset.csv", None)?;
//! let top = run.views["top_products"].to_frame()?;
//! println!("{} products", top.height());
//! # Ok::<(), dairy_kpi::PipelineError>(())
//! ```

pub mod aggregation;
pub mod audit;
pub mod cleaner;
pub mod config;
pub mod error;
mod frame;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod schema;
pub mod views;

#[cfg(feature = "python")]
mod model;

pub use aggregation::{Aggregation, AggKind, DailyAgg, Direction};
pub use audit::{audit, AuditReport};
pub use cleaner::{deduplicate, natural_key, normalize_flags, CleanReport, Cleaner};
pub use config::{FlagPolicy, MalformedPolicy, PipelineConfig};
pub use error::{MalformedRecordError, PipelineError};
pub use loader::{LoadOutcome, Loader};
pub use pipeline::{Pipeline, PipelineRun};
pub use record::{Dimension, Flag, FlagValue, GroupKey, Measure, Record};
pub use views::{View, ViewCatalog, ViewRows};

#[cfg(feature = "python")]
use pyo3::prelude::*;
#[cfg(feature = "python")]
use pyo3::types::PyModule;

/// Export schema constants as Python submodules
#[cfg(feature = "python")]
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Record columns
    let rec = PyModule::new(m.py(), "record")?;
    for name in schema::record::ALL {
        rec.add(name.to_uppercase(), name)?;
    }
    m.add_submodule(&rec)?;

    // Flags
    let flags = PyModule::new(m.py(), "flags")?;
    flags.add("ADDED_SUGAR", schema::flags::ADDED_SUGAR)?;
    flags.add("IS_ORGANIC", schema::flags::IS_ORGANIC)?;
    flags.add("RETURN_FLAG", schema::flags::RETURN_FLAG)?;
    m.add_submodule(&flags)?;

    // View columns
    let view = PyModule::new(m.py(), "view")?;
    view.add("VALUE", schema::view::VALUE)?;
    view.add("RANK", schema::view::RANK)?;
    view.add("RATE", schema::view::RATE)?;
    view.add("TOTAL_QUANTITY", schema::view::TOTAL_QUANTITY)?;
    view.add("TOTAL_REVENUE", schema::view::TOTAL_REVENUE)?;
    view.add("ORDER_COUNT", schema::view::ORDER_COUNT)?;
    view.add("MOVING_AVERAGE", schema::view::MOVING_AVERAGE)?;
    view.add("GROWTH_PCT", schema::view::GROWTH_PCT)?;
    view.add("SHARE_PCT", schema::view::SHARE_PCT)?;
    m.add_submodule(&view)?;

    Ok(())
}

#[cfg(feature = "python")]
#[pymodule]
fn dairy_kpi(m: &Bound<'_, PyModule>) -> PyResult<()> {
    logging::init_logging();
    m.add_class::<model::DairyModel>()?;
    add_schema_exports(m)?;
    Ok(())
}
