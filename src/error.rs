use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// The uploaded content could not be turned into a table.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("uploaded file is empty")]
    Empty,

    #[error("uploaded file has no columns")]
    NoColumns,

    #[error("malformed CSV: {0}")]
    Csv(#[from] PolarsError),
}

#[derive(Debug, Error)]
pub enum ImputationError {
    #[error("column `{column}` has missing values but no observed value to compute a median from")]
    NoObservedValues { column: String },

    #[error("column `{column}` has unsupported type {dtype}")]
    UnsupportedType { column: String, dtype: String },

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// Failure to draw a single chart. Never aborts the rest of the battery.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("column `{column}` has no values to plot")]
    EmptyColumn { column: String },

    #[error("column `{column}` contains infinite values")]
    NonFinite { column: String },

    #[error("font setup failed: {0}")]
    Font(String),

    #[error("drawing {chart} failed: {message}")]
    Backend { chart: String, message: String },

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error(transparent)]
    Data(#[from] PolarsError),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("OPENAI_API_KEY is not set")]
    MissingCredential,

    #[error("dataset could not be prepared: {0}")]
    Dataset(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {0}: {1}")]
    Http(u16, String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("agent stopped after {0} iterations without an answer")]
    IterationLimit(usize),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write summary CSV: {0}")]
    Csv(#[from] PolarsError),
}

/// Errors surfaced by a session interaction.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Imputation(#[from] ImputationError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Data(#[from] PolarsError),

    #[error("no table loaded")]
    NoTable,
}
