//! Transport trait

use consentsync_core::{Request, Response, Result};
use std::sync::Arc;

/// A generic request/response primitive.
///
/// Implementations report network-level failures (timeouts, refused
/// connections, broken bodies) as `SyncError::Transport` and return every
/// received response as-is, whatever its status. Status interpretation
/// belongs to the caller.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, request: Request) -> Result<Response>;
}

pub type SharedTransport = Arc<dyn Transport>;
