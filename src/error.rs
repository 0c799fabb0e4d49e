use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{source_name} returned HTTP {status}: {body}")]
    Transport {
        source_name: &'static str,
        status: u16,
        body: String,
    },

    #[error("request to {source_name} failed: {message}")]
    Request {
        source_name: &'static str,
        message: String,
    },

    #[error("could not parse {source_name} response: {message}")]
    Parse {
        source_name: &'static str,
        message: String,
    },

    #[error("not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access application log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed application log {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("application log {path} has columns [{found}], expected [{expected}]")]
    HeaderMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("row {row} does not exist (log has {len} rows)")]
    RowOutOfRange { row: usize, len: usize },
}
