//! Opt-in usage reporting. Never carries message content and never fails
//! the caller.

use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
        mpsc::{self, Receiver, Sender},
    },
    thread,
    time::{Duration, Instant},
};

use serde::Serialize;
use tracing::debug;

use crate::Receipt;

const SIGNATURE_PREFIX_LEN: usize = 10;

/// What gets reported about a signed receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TelemetryEvent {
    pub signer: String,
    pub timestamp: String,
    pub signature_prefix: String,
}

impl From<&Receipt> for TelemetryEvent {
    fn from(receipt: &Receipt) -> Self {
        Self {
            signer: receipt.signer.clone(),
            timestamp: receipt.timestamp.clone(),
            signature_prefix: receipt.signature.chars().take(SIGNATURE_PREFIX_LEN).collect(),
        }
    }
}

/// Receives receipt metadata after signing.
///
/// `record` must return promptly; implementations swallow their own
/// failures.
pub trait TelemetryCollaborator: Send + Sync {
    fn record(&self, event: &TelemetryEvent);

    /// Waits at most `grace` for reports still in flight.
    fn flush(&self, _grace: Duration) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoTelemetry;

impl TelemetryCollaborator for NoTelemetry {
    fn record(&self, _: &TelemetryEvent) {}
}

/// POSTs events as JSON to a collector endpoint from a background thread.
pub struct HttpTelemetry {
    endpoint: String,
    agent: ureq::Agent,
    done: Sender<()>,
    acks: Mutex<Receiver<()>>,
    in_flight: AtomicUsize,
}

impl HttpTelemetry {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let (done, acks) = mpsc::channel();

        Self {
            endpoint: endpoint.into(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            done,
            acks: Mutex::new(acks),
            in_flight: AtomicUsize::new(0),
        }
    }
}

impl TelemetryCollaborator for HttpTelemetry {
    fn record(&self, event: &TelemetryEvent) {
        let agent = self.agent.clone();
        let endpoint = self.endpoint.clone();
        let event = event.clone();
        let done = self.done.clone();

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name("telemetry".to_string())
            .spawn(move || {
                match agent.post(&endpoint).send_json(&event) {
                    Ok(_) => debug!(%endpoint, "telemetry sent"),
                    Err(e) => debug!(%endpoint, error = %e, "telemetry dropped"),
                }
                let _ = done.send(());
            });

        if let Err(e) = spawned {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            debug!(error = %e, "telemetry dropped");
        }
    }

    fn flush(&self, grace: Duration) {
        let deadline = Instant::now() + grace;
        let Ok(acks) = self.acks.lock() else {
            return;
        };

        while self.in_flight.load(Ordering::SeqCst) > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if acks.recv_timeout(remaining).is_err() {
                debug!(
                    pending = self.in_flight.load(Ordering::SeqCst),
                    "telemetry still in flight, not waiting"
                );
                return;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
