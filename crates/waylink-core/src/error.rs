use thiserror::Error;

/// Top-level error type for waylink.
#[derive(Debug, Error)]
pub enum WaylinkError {
    /// Error from the messaging transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// Error from the session store.
    #[error("session error: {0}")]
    Session(String),

    /// Error from a command handler.
    #[error("command error: {0}")]
    Command(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Caller-facing failures of a pairing request.
///
/// `InvalidPhoneNumber` and `Busy` are rejected at the boundary and never
/// reach the state machine; `Transport` is broadcast to observers in
/// addition to being returned to the caller.
#[derive(Debug, Error)]
pub enum PairingError {
    /// The submitted number contains no digits.
    #[error("invalid phone number")]
    InvalidPhoneNumber,

    /// A connection attempt is already in progress (or live).
    #[error("a connection attempt is already in progress")]
    Busy,

    /// Session establishment or pairing-artifact request failed.
    #[error("transport error: {0}")]
    Transport(String),
}
