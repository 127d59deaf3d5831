use serde::{de, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::DedupError;
use crate::evaluation::Evaluation;

/// Outcome of a run; the code doubles as the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    InternalError,
    ParseError,
    ConfigError,
    ProviderError,
}

impl Status {
    pub fn code(&self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::InternalError => 1,
            Status::ParseError => 2,
            Status::ConfigError => 3,
            Status::ProviderError => 4,
        }
    }

    pub fn from_error(err: &DedupError) -> Self {
        match err {
            DedupError::Parse(_)
            | DedupError::Csv { .. }
            | DedupError::Io { .. }
            | DedupError::Json(_)
            | DedupError::MissingAttribute { .. }
            | DedupError::NullElement => Status::ParseError,
            DedupError::Config(_) => Status::ConfigError,
            DedupError::Provider { .. }
            | DedupError::UnknownAttribute { .. }
            | DedupError::Unsupported { .. } => Status::ProviderError,
            DedupError::Cancelled => Status::InternalError,
        }
    }
}

impl Serialize for Status {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

struct StatusCodeVisitor;

impl<'de> de::Visitor<'de> for StatusCodeVisitor {
    type Value = Status;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("Status")
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match v {
            0 => Ok(Status::Ok),
            1 => Ok(Status::InternalError),
            2 => Ok(Status::ParseError),
            3 => Ok(Status::ConfigError),
            4 => Ok(Status::ProviderError),
            value => Err(de::Error::custom(value.to_string())),
        }
    }
}

impl<'de> de::Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_u8(StatusCodeVisitor)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReportPayload {
    pub status: Status,
    pub body: Value,
}

/// Wraps an evaluation, or the error that prevented it, as `{status, body}`.
pub fn make_report_payload(result: Result<Evaluation, DedupError>) -> Result<Value, DedupError> {
    let payload = match result {
        Err(err) => ReportPayload {
            status: Status::from_error(&err),
            body: Value::String(err.to_string()),
        },
        Ok(evaluation) => ReportPayload {
            status: Status::Ok,
            body: serde_json::to_value(evaluation)?,
        },
    };
    serde_json::to_value(payload).map_err(DedupError::from)
}
