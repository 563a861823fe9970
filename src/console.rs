//! Terminal surface and observer for the CLI

use consentsync_client::{Observer, Surface};
use consentsync_core::{ConsentRecord, LoadState};
use std::io::Write;
use std::sync::Mutex;

fn yes_no(accepted: bool) -> &'static str {
    if accepted {
        "accepted"
    } else {
        "not accepted"
    }
}

pub fn format_record(record: &ConsentRecord) -> String {
    let mut out = String::new();
    let user = if record.user_urn.is_empty() { "-" } else { record.user_urn.as_str() };
    out.push_str(&format!("  user:           {}\n", user));
    out.push_str(&format!("  main terms:     {}\n", yes_no(record.accept_main)));
    out.push_str(&format!("  user data:      {}\n", yes_no(record.accept_userdata)));
    if record.testbed_access {
        out.push_str(&format!("  testbed access: allowed until {}\n", record.valid_until));
    } else {
        out.push_str("  testbed access: denied\n");
    }
    out
}

/// Render a state. On failure the last known record, if any, is shown under the error.
pub fn format_state(state: &LoadState, last_known: Option<&ConsentRecord>) -> String {
    match state {
        LoadState::Idle => "status: idle\n".to_string(),
        LoadState::Loading => "status: loading...\n".to_string(),
        LoadState::Ready(record) => format!("status: loaded\n{}", format_record(record)),
        LoadState::Failed(err) => {
            let mut out = format!("status: ERROR - {}\n", err);
            if let Some(record) = last_known {
                out.push_str("last known:\n");
                out.push_str(&format_record(record));
            }
            out
        }
    }
}

struct ConsoleState<W> {
    out: W,
    last_ready: Option<ConsentRecord>,
}

/// Writes every state transition to `W`.
pub struct ConsoleSurface<W: Write + Send> {
    inner: Mutex<ConsoleState<W>>,
}

impl ConsoleSurface<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            inner: Mutex::new(ConsoleState { out, last_ready: None }),
        }
    }
}

impl<W: Write + Send> Surface for ConsoleSurface<W> {
    fn render(&self, state: &LoadState) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let LoadState::Ready(record) = state {
            inner.last_ready = Some(record.clone());
        }
        let text = format_state(state, inner.last_ready.as_ref());
        if let Err(e) = inner.out.write_all(text.as_bytes()).and_then(|_| inner.out.flush()) {
            tracing::debug!("Console render failed: {}", e);
        }
    }
}

/// Stands in for the host application: prints the outcome it is told.
pub struct ConsoleObserver<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleObserver<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    fn line(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(out, "{}", text) {
            tracing::debug!("Console observer write failed: {}", e);
        }
    }
}

impl<W: Write + Send> Observer for ConsoleObserver<W> {
    fn approve(&self, expiry: &str) {
        tracing::info!("Host observer: approve until {}", expiry);
        self.line(&format!("observer: approve({})", expiry));
    }

    fn decline(&self) {
        tracing::info!("Host observer: decline");
        self.line("observer: decline()");
    }
}
