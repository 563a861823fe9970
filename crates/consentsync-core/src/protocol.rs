//! Wire protocol for the consent endpoint
//!
//! One resource, three verbs:
//!
//! | Operation | Method | Body              | Success              |
//! |-----------|--------|-------------------|----------------------|
//! | Fetch     | GET    | none              | 200 + `ConsentRecord` |
//! | Submit    | PUT    | `ConsentDraft`    | 204                  |
//! | Revoke    | DELETE | none              | 204                  |
//!
//! Any other status is a failure for that operation.

use crate::error::{Result, SyncError};
use crate::types::{ConsentDraft, ConsentRecord};
use bytes::Bytes;

/// Endpoint of the GDPR consent site.
pub const GDPR_ENDPOINT: &str = "/gdpr/accept";

/// Endpoint of the terms-and-conditions site. Same protocol, longer validity.
pub const TERMS_CONDITIONS_ENDPOINT: &str = "/terms_conditions/accept";

pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three operations the client performs against the consent endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Fetch,
    Submit,
    Revoke,
}

impl Operation {
    pub fn method(self) -> Method {
        match self {
            Operation::Fetch => Method::Get,
            Operation::Submit => Method::Put,
            Operation::Revoke => Method::Delete,
        }
    }

    /// The only status this operation treats as success.
    pub fn success_status(self) -> u16 {
        match self {
            Operation::Fetch => 200,
            Operation::Submit | Operation::Revoke => 204,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::Fetch => "fetch",
            Operation::Submit => "submit",
            Operation::Revoke => "revoke",
        }
    }

    /// Fail with `UnexpectedStatus` unless the response carries the success status.
    pub fn check(self, response: &Response) -> Result<()> {
        if response.status == self.success_status() {
            Ok(())
        } else {
            Err(SyncError::unexpected_status(self, response.status, &response.body))
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Transport-agnostic request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub operation: Operation,
    pub path: String,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn fetch(endpoint: &str) -> Self {
        Self {
            operation: Operation::Fetch,
            path: endpoint.to_string(),
            body: None,
        }
    }

    pub fn submit(endpoint: &str, draft: &ConsentDraft) -> Self {
        Self {
            operation: Operation::Submit,
            path: endpoint.to_string(),
            body: Some(serde_json::to_vec(draft).unwrap_or_default()),
        }
    }

    pub fn revoke(endpoint: &str) -> Self {
        Self {
            operation: Operation::Revoke,
            path: endpoint.to_string(),
            body: None,
        }
    }

    pub fn method(&self) -> Method {
        self.operation.method()
    }

    pub fn content_type(&self) -> Option<&'static str> {
        self.body.as_ref().map(|_| JSON_CONTENT_TYPE)
    }
}

/// Transport-agnostic response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self::new(status, Bytes::new())
    }

    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }
}

/// Interpret a fetch response: status 200 and a valid record body.
pub fn decode_record(response: &Response) -> Result<ConsentRecord> {
    Operation::Fetch.check(response)?;
    ConsentRecord::from_slice(&response.body)
        .map_err(|e| SyncError::malformed(Operation::Fetch, e.to_string()))
}
