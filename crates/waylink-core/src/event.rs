//! Event types crossing component boundaries.
//!
//! `WireEvent`/`ClientFrame` are the JSON frames exchanged with the browser
//! pairing page — field names and `type` tags are a fixed wire contract.
//! `TransportEvent` is what the messaging transport reports to the pairing
//! coordinator.

use serde::{Deserialize, Serialize};

use crate::state::{ConnectionState, PairingArtifact, Snapshot};

/// Outbound JSON frame pushed to browser observers, one object per frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireEvent {
    #[serde(rename = "qr")]
    Qr { qr: String },
    #[serde(rename = "pairingCode")]
    PairingCode { code: String },
    #[serde(rename = "status")]
    Status { message: String },
    #[serde(rename = "askPhone")]
    AskPhone,
    #[serde(rename = "connected")]
    Connected {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    #[serde(rename = "loggedOut")]
    LoggedOut { message: String },
    #[serde(rename = "error")]
    Error { message: String },
}

impl WireEvent {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Inbound JSON frame from the browser.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "phoneNumberInput")]
    PhoneNumberInput { number: String },
}

/// Why the transport connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The linked device was logged out — terminal for these credentials.
    LoggedOut,
    /// A transient close; the coordinator schedules a reconnect.
    Retryable(String),
    /// A non-retryable failure; no automatic reconnect.
    Fatal(String),
}

/// Event emitted by the messaging transport, delivered in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    QrAvailable(String),
    PairingCodeAvailable(String),
    Opened,
    Closed(CloseReason),
    /// Credential material changed; persisted silently, never broadcast.
    CredentialsUpdated(Vec<u8>),
}

/// Translate a coordinator snapshot into the single event a late-joining
/// observer receives on connect.
pub fn snapshot_event(snapshot: &Snapshot) -> WireEvent {
    match snapshot.state {
        ConnectionState::Live => WireEvent::Connected { message: None },
        ConnectionState::AwaitingPairingArtifact => match &snapshot.artifact {
            Some(PairingArtifact::Qr(qr)) => WireEvent::Qr { qr: qr.clone() },
            Some(PairingArtifact::Code(code)) => WireEvent::PairingCode { code: code.clone() },
            // Artifact not yet delivered; treat like a connect in flight.
            None => WireEvent::status("Bot is connecting..."),
        },
        ConnectionState::Connecting => WireEvent::status("Bot is connecting..."),
        ConnectionState::Failed => WireEvent::error(
            snapshot
                .last_error
                .clone()
                .unwrap_or_else(|| "Bot connection failed.".to_string()),
        ),
        ConnectionState::Idle | ConnectionState::AwaitingPhoneNumber | ConnectionState::LoggedOut => {
            WireEvent::AskPhone
        }
    }
}
