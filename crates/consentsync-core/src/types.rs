//! Core types for consent synchronization

use crate::error::SyncError;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Server-authoritative consent record.
///
/// `testbed_access` is computed by the server from the two flags and is
/// never set by the client.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsentRecord {
    #[serde(default, alias = "user")]
    pub user_urn: String,
    #[serde(default)]
    pub accept_main: bool,
    #[serde(default)]
    pub accept_userdata: bool,
    pub testbed_access: bool,
    /// ISO-8601 date or date-time; empty when no consent is active.
    #[serde(rename = "until", default, skip_serializing_if = "String::is_empty")]
    pub valid_until: String,
}

/// Why a record body was rejected.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unparseable expiry {0:?}")]
    InvalidExpiry(String),

    #[error("testbed access granted without an expiry")]
    MissingExpiry,
}

impl ConsentRecord {
    /// Parse and validate a record body. The server answers `null` when no
    /// consent is stored; that decodes to the empty record.
    pub fn from_slice(body: &[u8]) -> Result<Self, RecordError> {
        let record = serde_json::from_slice::<Option<ConsentRecord>>(body)?.unwrap_or_default();
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<(), RecordError> {
        if self.valid_until.is_empty() {
            if self.testbed_access {
                return Err(RecordError::MissingExpiry);
            }
            return Ok(());
        }
        if Expiry::parse(&self.valid_until).is_none() {
            return Err(RecordError::InvalidExpiry(self.valid_until.clone()));
        }
        Ok(())
    }

    pub fn expiry(&self) -> Option<Expiry> {
        Expiry::parse(&self.valid_until)
    }

    /// Whether the record grants testbed access at `now`.
    pub fn grants_access_at(&self, now: DateTime<Utc>) -> bool {
        self.testbed_access && self.expiry().is_some_and(|e| e.instant() > now)
    }

    /// A draft that re-submits the current flags unchanged.
    pub fn draft(&self) -> ConsentDraft {
        ConsentDraft::new()
            .accept_main(self.accept_main)
            .accept_userdata(self.accept_userdata)
    }
}

/// Parsed form of `ConsentRecord::valid_until`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expiry {
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
}

impl Expiry {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(Expiry::DateTime(dt));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Expiry::Date)
    }

    /// The expiry as a UTC instant. A bare date expires at its UTC midnight.
    pub fn instant(&self) -> DateTime<Utc> {
        match self {
            Expiry::DateTime(dt) => dt.with_timezone(&Utc),
            Expiry::Date(d) => Utc.from_utc_datetime(&NaiveDateTime::new(*d, NaiveTime::default())),
        }
    }
}

/// Client-proposed flags. The server stores it as a full replacement:
/// an omitted flag becomes `false`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsentDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_main: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_userdata: Option<bool>,
}

impl ConsentDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept_all() -> Self {
        Self::new().accept_main(true).accept_userdata(true)
    }

    pub fn decline_all() -> Self {
        Self::new().accept_main(false).accept_userdata(false)
    }

    pub fn accept_main(mut self, accepted: bool) -> Self {
        self.accept_main = Some(accepted);
        self
    }

    pub fn accept_userdata(mut self, accepted: bool) -> Self {
        self.accept_userdata = Some(accepted);
        self
    }
}

/// The client's single source of truth for what the surface renders.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready(ConsentRecord),
    Failed(SyncError),
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn record(&self) -> Option<&ConsentRecord> {
        match self {
            LoadState::Ready(record) => Some(record),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            LoadState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LoadState::Idle => "idle",
            LoadState::Loading => "loading",
            LoadState::Ready(_) => "ready",
            LoadState::Failed(_) => "failed",
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadState::Ready(record) => write!(
                f,
                "ready (testbed_access={}, until={})",
                record.testbed_access,
                if record.valid_until.is_empty() { "-" } else { record.valid_until.as_str() }
            ),
            LoadState::Failed(err) => write!(f, "failed: {}", err),
            other => f.write_str(other.label()),
        }
    }
}
