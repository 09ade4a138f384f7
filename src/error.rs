use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl DashboardError {
    /// Errors that abort loading the dataset at startup.
    pub fn is_data_load(&self) -> bool {
        matches!(self, Self::MissingColumn(_) | Self::Polars(_) | Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;

#[cfg(feature = "python")]
impl From<DashboardError> for pyo3::PyErr {
    fn from(err: DashboardError) -> pyo3::PyErr {
        pyo3::exceptions::PyRuntimeError::new_err(err.to_string())
    }
}

/// A cell that could not be parsed at load time. The field is nulled and
/// the row is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub row: usize,
    pub column: &'static str,
    pub value: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {}: could not parse {} value '{}'",
            self.row, self.column, self.value
        )
    }
}

/// The active filters matched no rows. Informational only: every view
/// still renders, just empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmptyResultWarning;

impl fmt::Display for EmptyResultWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("No data to show with the current filters.")
    }
}
