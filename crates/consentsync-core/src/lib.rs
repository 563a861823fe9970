//! Consentsync Core - Consent record types, wire protocol, errors, and configuration

pub mod config;
pub mod error;
pub mod protocol;
pub mod types;

pub use config::{ClientConfig, ConfigError, ObserverConfig, ServerConfig};
pub use error::{Result, SyncError, TransportFailure};
pub use protocol::*;
pub use types::*;
