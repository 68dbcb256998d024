//! Connection lifecycle state — one instance per running bot process.

use serde::{Deserialize, Serialize};

use crate::error::PairingError;

/// Where the bot session currently stands.
///
/// Transitions are totally ordered per process; the pairing coordinator is
/// the only writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Process started, nothing requested yet.
    Idle,
    /// A browser is being asked for a phone number.
    AwaitingPhoneNumber,
    /// Transport session establishment (or reconnect) in flight.
    Connecting,
    /// A QR payload or pairing code is on display, waiting for the phone.
    AwaitingPairingArtifact,
    /// Session is open and messages flow.
    Live,
    /// The linked device was logged out; credentials are gone.
    LoggedOut,
    /// Non-retryable failure; no further automatic reconnects.
    Failed,
}

impl ConnectionState {
    /// Whether a fresh `request_connection` is accepted in this state.
    ///
    /// `Failed` is included so a fatal close never bricks the process.
    pub fn accepts_pairing_request(self) -> bool {
        matches!(
            self,
            Self::Idle | Self::AwaitingPhoneNumber | Self::LoggedOut | Self::Failed
        )
    }

    /// Terminal states stop the reconnect loop.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::LoggedOut | Self::Failed)
    }
}

/// The QR payload or short alphanumeric code used to link a phone.
///
/// At most one artifact is current at a time; it is superseded by newer
/// transport events and cleared once the session opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingArtifact {
    Qr(String),
    Code(String),
}

/// Point-in-time view of the coordinator, returned by value so observers
/// can never touch live state.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub state: ConnectionState,
    pub artifact: Option<PairingArtifact>,
    pub last_error: Option<String>,
}

/// Strip separators and validate a user-submitted phone number.
///
/// Keeps ASCII digits only; `"+1 (555) 123-4567"` becomes `"15551234567"`.
/// Fails when nothing is left after stripping.
pub fn normalize_phone(raw: &str) -> Result<String, PairingError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(PairingError::InvalidPhoneNumber);
    }
    Ok(digits)
}
