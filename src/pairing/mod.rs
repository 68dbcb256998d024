//! Pairing Coordinator — owns the connection state machine.
//!
//! Drives one logical bot connection per process lifetime: pairing requests
//! from the browser, transport lifecycle events, and the fixed-delay
//! reconnect loop. All state mutation funnels through this module; everything
//! else reads snapshots or observes broadcast events.

mod broadcaster;

pub use broadcaster::Broadcaster;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;
use waylink_core::error::{PairingError, WaylinkError};
use waylink_core::event::{snapshot_event, CloseReason, TransportEvent, WireEvent};
use waylink_core::state::{normalize_phone, ConnectionState, PairingArtifact, Snapshot};
use waylink_core::traits::{SessionStore, Transport};

const CONNECTED_MESSAGE: &str = "Bot is connected to WhatsApp!";
const RECONNECTING_MESSAGE: &str = "Bot disconnected. Reconnecting...";
const LOGGED_OUT_MESSAGE: &str = "Bot logged out. Please refresh and relink.";

struct Inner {
    state: ConnectionState,
    artifact: Option<PairingArtifact>,
    last_error: Option<String>,
    /// Digits-only number of the current pairing attempt.
    phone: Option<String>,
    /// Reconnect attempts since the session last opened. Log-only.
    attempt: u64,
    /// Bumped on every fresh pairing request and terminal transition so
    /// stale pump/retry tasks can tell they have been superseded.
    generation: u64,
}

pub struct Coordinator {
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    broadcaster: Arc<Broadcaster>,
    reconnect_delay: Duration,
    inner: Mutex<Inner>,
}

impl Coordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
        broadcaster: Arc<Broadcaster>,
        reconnect_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            store,
            broadcaster,
            reconnect_delay,
            inner: Mutex::new(Inner {
                state: ConnectionState::Idle,
                artifact: None,
                last_error: None,
                phone: None,
                attempt: 0,
                generation: 0,
            }),
        })
    }

    /// Current state, artifact, and last failure — returned by value.
    pub async fn snapshot(&self) -> Snapshot {
        let inner = self.inner.lock().await;
        Snapshot {
            state: inner.state,
            artifact: inner.artifact.clone(),
            last_error: inner.last_error.clone(),
        }
    }

    /// Register a browser observer, replaying the current snapshot as its
    /// first event. The first browser to show up while nothing is in flight
    /// moves the process to "asking for a phone number".
    pub async fn attach_browser(&self) -> (Uuid, mpsc::Receiver<WireEvent>) {
        let mut inner = self.inner.lock().await;
        if inner.state == ConnectionState::Idle {
            inner.state = ConnectionState::AwaitingPhoneNumber;
        }
        self.register_locked(&inner)
    }

    /// Register a passive observer (announcer, internal listeners): snapshot
    /// replay only, no state transition.
    pub async fn attach_observer(&self) -> (Uuid, mpsc::Receiver<WireEvent>) {
        let inner = self.inner.lock().await;
        self.register_locked(&inner)
    }

    /// Snapshot and registration happen under the state lock so the observer
    /// can never miss a transition in between.
    fn register_locked(&self, inner: &Inner) -> (Uuid, mpsc::Receiver<WireEvent>) {
        let snap = Snapshot {
            state: inner.state,
            artifact: inner.artifact.clone(),
            last_error: inner.last_error.clone(),
        };
        self.broadcaster.register(snapshot_event(&snap))
    }

    pub fn detach_observer(&self, id: Uuid) {
        self.broadcaster.unregister(id);
    }

    /// Start (or restart) a pairing attempt for `raw` phone number input.
    ///
    /// Wipes any prior session credentials, transitions to `Connecting`, and
    /// asks the transport for a session. Rejects with `Busy` while an attempt
    /// is in flight or the session is live; transport failures are returned
    /// to the caller and broadcast to observers.
    pub async fn request_connection(self: Arc<Self>, raw: &str) -> Result<(), PairingError> {
        let this = self;
        let phone = normalize_phone(raw)?;

        let generation = {
            let mut inner = this.inner.lock().await;
            if !inner.state.accepts_pairing_request() {
                return Err(PairingError::Busy);
            }
            inner.state = ConnectionState::Connecting;
            inner.artifact = None;
            inner.last_error = None;
            inner.phone = Some(phone.clone());
            inner.attempt = 0;
            inner.generation += 1;
            inner.generation
        };

        // Fresh pairing discards whatever session came before it.
        if let Err(e) = this.store.wipe().await {
            warn!("session wipe failed (continuing): {e}");
        }

        this.broadcaster
            .publish(&WireEvent::status(format!("Starting bot with number {phone}...")));
        info!("pairing requested for {phone}");

        match this.transport.establish(Some(phone)).await {
            Ok(events) => {
                Self::spawn_pump(&this, events, generation);
                Ok(())
            }
            Err(e) => {
                let mut inner = this.inner.lock().await;
                if inner.generation == generation {
                    inner.state = ConnectionState::AwaitingPhoneNumber;
                    inner.phone = None;
                    inner.last_error = Some(e.to_string());
                }
                drop(inner);
                this.broadcaster
                    .publish(&WireEvent::error(format!("Pairing failed: {e}")));
                Err(PairingError::Transport(e.to_string()))
            }
        }
    }

    /// Consume one transport event stream. Each pairing attempt (and each
    /// reconnect) gets its own pump; stale pumps recognize themselves by
    /// generation and stop silently.
    fn spawn_pump(this: &Arc<Self>, mut events: mpsc::Receiver<TransportEvent>, generation: u64) {
        let this = Arc::clone(this);
        tokio::spawn(async move {
            let mut saw_close = false;
            while let Some(event) = events.recv().await {
                if matches!(event, TransportEvent::Closed(_)) {
                    saw_close = true;
                }
                if !Self::handle_event(&this, event, generation).await {
                    return;
                }
            }
            // Stream ended without a close event: the transport went away
            // mid-flight. Treat it as a retryable disconnect.
            if !saw_close {
                Self::handle_event(
                    &this,
                    TransportEvent::Closed(CloseReason::Retryable("event stream ended".into())),
                    generation,
                )
                .await;
            }
        });
    }

    /// Apply one transport event to the state machine. Returns `false` when
    /// the pump consuming this stream should stop (stale generation or a
    /// terminal transition).
    async fn handle_event(this: &Arc<Self>, event: TransportEvent, generation: u64) -> bool {
        // Silent persistence path — no state transition, no broadcast.
        if let TransportEvent::CredentialsUpdated(credentials) = &event {
            {
                let inner = this.inner.lock().await;
                if inner.generation != generation {
                    return false;
                }
            }
            if let Err(e) = this.store.save(credentials).await {
                warn!("credential persistence failed (state unaffected): {e}");
            }
            return true;
        }

        let mut inner = this.inner.lock().await;
        if inner.generation != generation {
            debug!("dropping event from superseded session: {event:?}");
            return false;
        }

        match event {
            TransportEvent::QrAvailable(qr) => match inner.state {
                ConnectionState::Connecting | ConnectionState::AwaitingPairingArtifact => {
                    inner.state = ConnectionState::AwaitingPairingArtifact;
                    inner.artifact = Some(PairingArtifact::Qr(qr.clone()));
                    drop(inner);
                    this.broadcaster.publish(&WireEvent::Qr { qr });
                }
                state => debug!("ignoring QR event in state {state:?}"),
            },
            TransportEvent::PairingCodeAvailable(code) => match inner.state {
                ConnectionState::Connecting | ConnectionState::AwaitingPairingArtifact => {
                    inner.state = ConnectionState::AwaitingPairingArtifact;
                    inner.artifact = Some(PairingArtifact::Code(code.clone()));
                    drop(inner);
                    info!("pairing code generated");
                    this.broadcaster.publish(&WireEvent::PairingCode { code });
                }
                state => debug!("ignoring pairing code in state {state:?}"),
            },
            TransportEvent::Opened => {
                inner.state = ConnectionState::Live;
                inner.artifact = None;
                inner.attempt = 0;
                drop(inner);
                info!("session open");
                this.broadcaster.publish(&WireEvent::Connected {
                    message: Some(CONNECTED_MESSAGE.to_string()),
                });
            }
            TransportEvent::Closed(CloseReason::LoggedOut) => {
                inner.state = ConnectionState::LoggedOut;
                inner.artifact = None;
                inner.phone = None;
                inner.generation += 1;
                drop(inner);
                warn!("logged out — session invalidated");
                if let Err(e) = this.store.wipe().await {
                    warn!("session wipe after logout failed: {e}");
                }
                this.broadcaster.publish(&WireEvent::LoggedOut {
                    message: LOGGED_OUT_MESSAGE.to_string(),
                });
                return false;
            }
            TransportEvent::Closed(CloseReason::Fatal(reason)) => {
                inner.state = ConnectionState::Failed;
                inner.artifact = None;
                inner.last_error = Some(reason.clone());
                inner.generation += 1;
                drop(inner);
                warn!("fatal close: {reason}");
                this.broadcaster.publish(&WireEvent::error(reason));
                return false;
            }
            TransportEvent::Closed(CloseReason::Retryable(reason)) => {
                inner.state = ConnectionState::Connecting;
                inner.artifact = None;
                inner.attempt += 1;
                let attempt = inner.attempt;
                drop(inner);
                info!("connection closed ({reason}), reconnect attempt {attempt} scheduled");
                this.broadcaster.publish(&WireEvent::status(RECONNECTING_MESSAGE));
                Self::schedule_reconnect(this, generation);
            }
            TransportEvent::CredentialsUpdated(_) => unreachable!("handled above"),
        }
        true
    }

    /// Re-establish after the fixed delay. Re-armed on every failed attempt;
    /// a terminal transition or an in-stream recovery (state no longer
    /// `Connecting`) stops the loop.
    fn schedule_reconnect(this: &Arc<Self>, generation: u64) {
        let this = Arc::clone(this);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(this.reconnect_delay).await;

                let phone = {
                    let inner = this.inner.lock().await;
                    if inner.generation != generation
                        || inner.state != ConnectionState::Connecting
                    {
                        return;
                    }
                    inner.phone.clone()
                };

                match this.transport.establish(phone).await {
                    Ok(events) => {
                        Self::spawn_pump(&this, events, generation);
                        return;
                    }
                    Err(e) => {
                        // No caller to report to: broadcast and re-arm.
                        warn!("reconnect failed: {e}");
                        this.broadcaster
                            .publish(&WireEvent::status(RECONNECTING_MESSAGE));
                    }
                }
            }
        });
    }
}

/// Surface a process-fatal failure to every observer before exiting.
pub fn broadcast_fatal(broadcaster: &Broadcaster, error: &WaylinkError) {
    broadcaster.publish(&WireEvent::error(format!("Critical server error: {error}")));
}
