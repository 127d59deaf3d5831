use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DedupError>;

#[derive(Debug, Error)]
pub enum DedupError {
    /// Malformed dataset, gold standard or record.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("failed to read {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{provider} provider does not handle attribute '{attribute}'")]
    UnknownAttribute {
        provider: &'static str,
        attribute: String,
    },

    #[error("record '{record}' has no attribute '{attribute}'")]
    MissingAttribute { record: String, attribute: String },

    #[error("element must not be null")]
    NullElement,

    #[error("comparing '{left}' with '{right}' failed: {source}")]
    Provider {
        left: String,
        right: String,
        #[source]
        source: Box<DedupError>,
    },

    #[error("{provider} provider does not support {operation}")]
    Unsupported {
        provider: &'static str,
        operation: &'static str,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("run was cancelled")]
    Cancelled,
}

impl DedupError {
    pub fn parse<T: fmt::Display>(msg: T) -> DedupError {
        DedupError::Parse(msg.to_string())
    }

    pub fn config<T: fmt::Display>(msg: T) -> DedupError {
        DedupError::Config(msg.to_string())
    }

    pub fn csv<P: fmt::Display>(path: P, source: csv::Error) -> DedupError {
        DedupError::Csv {
            path: path.to_string(),
            source,
        }
    }

    pub fn io<P: fmt::Display>(path: P, source: std::io::Error) -> DedupError {
        DedupError::Io {
            path: path.to_string(),
            source,
        }
    }

    pub fn provider(left: &str, right: &str, source: DedupError) -> DedupError {
        DedupError::Provider {
            left: left.to_string(),
            right: right.to_string(),
            source: Box::new(source),
        }
    }

    pub fn unknown_attribute(provider: &'static str, attribute: &str) -> DedupError {
        DedupError::UnknownAttribute {
            provider,
            attribute: attribute.to_string(),
        }
    }

    pub fn missing_attribute(record: &str, attribute: &str) -> DedupError {
        DedupError::MissingAttribute {
            record: record.to_string(),
            attribute: attribute.to_string(),
        }
    }
}
