//! Consent client state machine
//!
//! `Idle -> Loading -> Ready | Failed`, with `Ready` and `Failed` re-enterable
//! and `Loading` never terminal. Each operation moves to `Loading` the moment
//! it is called, before its future is first polled, and takes a new
//! generation. A completion only settles state if its generation is still
//! the latest; stale completions are dropped.
//!
//! Submit and revoke never produce `Ready` themselves. On success they issue
//! one `load()`, so the record (and the derived `testbed_access` and expiry)
//! always comes from the server.

use crate::bridge::{ObserverBridge, Ticket};
use crate::surface::{NullSurface, Surface};
use consentsync_core::{
    decode_record, ConsentDraft, ConsentRecord, LoadState, Operation, Request, GDPR_ENDPOINT,
};
use consentsync_transport::SharedTransport;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

struct ClientState {
    current: LoadState,
    generation: u64,
    last_ready: Option<ConsentRecord>,
}

struct ClientInner {
    transport: SharedTransport,
    endpoint: String,
    surface: Arc<dyn Surface>,
    bridge: ObserverBridge,
    state: Mutex<ClientState>,
}

#[derive(Clone)]
pub struct ConsentClient {
    inner: Arc<ClientInner>,
}

pub struct ConsentClientBuilder {
    transport: SharedTransport,
    endpoint: String,
    surface: Arc<dyn Surface>,
    bridge: ObserverBridge,
}

impl ConsentClientBuilder {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn surface(mut self, surface: Arc<dyn Surface>) -> Self {
        self.surface = surface;
        self
    }

    pub fn bridge(mut self, bridge: ObserverBridge) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn build(self) -> ConsentClient {
        debug!(
            "Consent client on {} ({} transport)",
            self.endpoint,
            self.transport.name()
        );
        ConsentClient {
            inner: Arc::new(ClientInner {
                transport: self.transport,
                endpoint: self.endpoint,
                surface: self.surface,
                bridge: self.bridge,
                state: Mutex::new(ClientState {
                    current: LoadState::Idle,
                    generation: 0,
                    last_ready: None,
                }),
            }),
        }
    }
}

impl ConsentClient {
    pub fn builder(transport: SharedTransport) -> ConsentClientBuilder {
        ConsentClientBuilder {
            transport,
            endpoint: GDPR_ENDPOINT.to_string(),
            surface: Arc::new(NullSurface),
            bridge: ObserverBridge::detached(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> LoadState {
        self.lock().current.clone()
    }

    /// The record of the most recent `Ready` state, kept across failures so
    /// the surface can show it next to the error.
    pub fn last_known(&self) -> Option<ConsentRecord> {
        self.lock().last_ready.clone()
    }

    pub fn bridge(&self) -> &ObserverBridge {
        &self.inner.bridge
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Arm the observer bridge and issue the first `load()`.
    pub fn start(&self) -> impl Future<Output = LoadState> + Send + 'static {
        self.inner.bridge.arm();
        self.load()
    }

    /// Fetch the current record. Resolves to the client's state once this
    /// fetch has completed; if a newer operation superseded it, that is the
    /// newer operation's state.
    pub fn load(&self) -> impl Future<Output = LoadState> + Send + 'static {
        let generation = self.begin(Operation::Fetch);
        let this = self.clone();
        async move { this.run_load(generation).await }
    }

    /// Replace the mutable flags with `draft`, then reload.
    pub fn submit(&self, draft: ConsentDraft) -> impl Future<Output = ()> + Send + 'static {
        let generation = self.begin(Operation::Submit);
        let request = Request::submit(&self.inner.endpoint, &draft);
        let this = self.clone();
        async move { this.run_mutation(generation, request).await }
    }

    /// Delete every acceptance, then reload.
    pub fn revoke_all(&self) -> impl Future<Output = ()> + Send + 'static {
        let generation = self.begin(Operation::Revoke);
        let request = Request::revoke(&self.inner.endpoint);
        let this = self.clone();
        async move { this.run_mutation(generation, request).await }
    }

    fn begin(&self, operation: Operation) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        debug!("{} started (generation {})", operation, state.generation);
        self.transition(&mut state, LoadState::Loading);
        state.generation
    }

    fn transition(&self, state: &mut ClientState, next: LoadState) {
        if let LoadState::Ready(record) = &next {
            state.last_ready = Some(record.clone());
        }
        state.current = next;
        self.inner.surface.render(&state.current);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Apply `next` if `generation` is still the latest. An applied `Ready`
    /// returns the bridge ticket taken under the state lock, so observer
    /// deliveries follow transition order.
    fn settle(&self, generation: u64, next: LoadState) -> Option<Ticket> {
        let mut state = self.lock();
        if state.generation != generation {
            debug!(
                "Dropping stale {} (generation {}, current {})",
                next.label(),
                generation,
                state.generation
            );
            return None;
        }
        let ticket = next.record().map(|_| self.inner.bridge.ticket());
        self.transition(&mut state, next);
        ticket
    }

    async fn run_load(&self, generation: u64) -> LoadState {
        let request = Request::fetch(&self.inner.endpoint);
        let outcome = match self.inner.transport.send(request).await {
            Ok(response) => decode_record(&response),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(record) => {
                if let Some(ticket) = self.settle(generation, LoadState::Ready(record.clone())) {
                    info!(
                        "Consent loaded: testbed_access={} until={:?}",
                        record.testbed_access, record.valid_until
                    );
                    self.inner.bridge.notify_at(ticket, &record);
                }
            }
            Err(e) => {
                warn!("Consent load failed: {}", e);
                self.settle(generation, LoadState::Failed(e));
            }
        }
        self.state()
    }

    async fn run_mutation(&self, generation: u64, request: Request) {
        let operation = request.operation;
        let outcome = match self.inner.transport.send(request).await {
            Ok(response) => operation.check(&response),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) if self.is_current(generation) => {
                debug!("{} accepted, reloading", operation);
                self.load().await;
            }
            Ok(()) => debug!("{} accepted but superseded, not reloading", operation),
            Err(e) => {
                warn!("Consent {} failed: {}", operation, e);
                self.settle(generation, LoadState::Failed(e));
            }
        }
    }
}
