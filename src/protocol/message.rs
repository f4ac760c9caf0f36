//! Correlated Request / Reply Messages
//!
//! A `Request` is built by a participant for every `set`/`get` call and carries a
//! correlation id that is unique within the issuing process. The coordinator answers
//! each request with exactly one `Reply` bearing the same id.

use super::types::{CacheValue, Mode, Operation, deserialize_present};
use crate::error::{CacheError, CacheResult, ErrorKind};
use serde::{Deserialize, Serialize};

/// A participant's call, as sent to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, unique per issuing process only.
    pub id: u64,
    /// Name of the issuing process.
    pub name: String,
    pub op: Operation,
    /// Absent on the wire means `equate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    pub key: String,
    /// A present `null` is a value; only an absent field is `None`.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<CacheValue>,
}

impl Request {
    pub fn set(id: u64, name: &str, key: &str, value: CacheValue) -> Self {
        Self {
            id,
            name: name.to_string(),
            op: Operation::Set,
            mode: Some(Mode::Equate),
            key: key.to_string(),
            data: Some(value),
        }
    }

    pub fn get(id: u64, name: &str, key: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            op: Operation::Get,
            mode: Some(Mode::Equate),
            key: key.to_string(),
            data: None,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn effective_mode(&self) -> Mode {
        self.mode.clone().unwrap_or(Mode::Equate)
    }
}

/// Failure details carried by an unsuccessful reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub error_kind: ErrorKind,
    pub err_no: u32,
    /// The request that caused the failure, echoed back for diagnosis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originating_message: Option<Request>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            error_kind: kind,
            err_no: kind.err_no(),
            originating_message: None,
            detail: None,
        }
    }

    pub fn with_request(mut self, request: &Request) -> Self {
        self.originating_message = Some(request.clone());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// The coordinator's answer to exactly one `Request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: u64,
    pub name: String,
    pub op: Operation,
    pub status: bool,
    /// A present `null` is a value; only an absent field is `None`.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<CacheValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

impl Reply {
    /// Successful `set`.
    pub fn ack(request: &Request) -> Self {
        Self {
            id: request.id,
            name: request.name.clone(),
            op: request.op,
            status: true,
            data: None,
            error: None,
        }
    }

    /// Successful `get`.
    pub fn value(request: &Request, value: CacheValue) -> Self {
        Self {
            data: Some(value),
            ..Self::ack(request)
        }
    }

    pub fn failure(request: &Request, error: ErrorRecord) -> Self {
        Self {
            id: request.id,
            name: request.name.clone(),
            op: request.op,
            status: false,
            data: None,
            error: Some(error),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|record| record.error_kind)
    }

    /// Converts the reply into the caller-facing outcome.
    ///
    /// A successful reply yields its payload (`None` for a `set` acknowledgement);
    /// a failed one yields `CacheError::Remote` with the carried record.
    pub fn into_result(self) -> CacheResult<Option<CacheValue>> {
        if self.status {
            return Ok(self.data);
        }
        let record = self.error.unwrap_or_else(|| {
            ErrorRecord::new(ErrorKind::UnknownError)
                .with_detail("failure reply carried no error record")
        });
        Err(CacheError::Remote(record))
    }
}
