use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Data not loaded: {0}")]
    NotLoaded(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error(transparent)]
    Malformed(#[from] MalformedRecordError),

    #[error("Config: {0}")]
    Config(String),

    #[error("Unknown view: {0}")]
    UnknownView(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

/// A source row that could not be turned into a [`Record`](crate::record::Record).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Malformed record at row {row} (record_id={record_id:?}): field '{field}' {reason}")]
pub struct MalformedRecordError {
    /// Zero-based row index within the source.
    pub row: usize,
    /// Raw record id, when the row carried one.
    pub record_id: Option<String>,
    pub field: &'static str,
    pub reason: MalformedReason,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedReason {
    #[error("is missing")]
    Missing,

    #[error("is not a valid {expected}: '{value}'")]
    Untypeable {
        expected: &'static str,
        value: String,
    },
}

#[cfg(feature = "python")]
mod python {
    use super::PipelineError;
    use pyo3::exceptions::PyRuntimeError;
    use pyo3::PyErr;

    impl From<PipelineError> for PyErr {
        fn from(err: PipelineError) -> PyErr {
            PyRuntimeError::new_err(err.to_string())
        }
    }

    impl From<PyErr> for PipelineError {
        fn from(err: PyErr) -> Self {
            PipelineError::InvalidData(err.to_string())
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
