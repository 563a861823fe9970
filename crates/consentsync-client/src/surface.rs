//! Presentation surface

use consentsync_core::LoadState;

/// Whatever shows the consent state to the user.
///
/// Called on every state transition, in transition order, while the client
/// holds its state lock. Implementations must not call back into the client.
pub trait Surface: Send + Sync {
    fn render(&self, state: &LoadState);
}

/// Renders nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl Surface for NullSurface {
    fn render(&self, _state: &LoadState) {}
}

impl<F> Surface for F
where
    F: Fn(&LoadState) + Send + Sync,
{
    fn render(&self, state: &LoadState) {
        self(state)
    }
}
