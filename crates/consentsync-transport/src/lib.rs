//! Consentsync Transport - Request/response primitive and its HTTP adapter

pub mod http;
pub mod transport;

pub use http::{HttpTransport, HttpTransportError};
pub use transport::{SharedTransport, Transport};
