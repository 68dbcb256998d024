use crate::error::WaylinkError;
use crate::event::TransportEvent;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Messaging transport — the external protocol layer.
///
/// One `establish` call is one connection attempt: it opens a session with
/// whatever credentials are on disk and returns the stream of lifecycle
/// events for that attempt. The receiver ends after a `Closed` event.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish a session. `pairing_phone` asks the transport to produce a
    /// pairing artifact for that (digits-only) number when the device is not
    /// yet registered.
    async fn establish(
        &self,
        pairing_phone: Option<String>,
    ) -> Result<mpsc::Receiver<TransportEvent>, WaylinkError>;
}

/// Durable credential material for the linked device session.
///
/// Persistence is best-effort relative to the in-memory state machine:
/// callers log store failures and carry on.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the stored credential marker, if any.
    async fn load(&self) -> Result<Option<Vec<u8>>, WaylinkError>;

    /// Persist updated credential material.
    async fn save(&self, credentials: &[u8]) -> Result<(), WaylinkError>;

    /// Destroy all session material (fresh pairing or logout).
    async fn wipe(&self) -> Result<(), WaylinkError>;
}

/// Outbound message surface used by command handlers.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send plain text to a chat JID.
    async fn send_text(&self, chat: &str, text: &str) -> Result<(), WaylinkError>;

    /// Send audio bytes as a voice note.
    async fn send_voice(&self, chat: &str, audio: Vec<u8>) -> Result<(), WaylinkError>;

    /// Send an image with a caption.
    async fn send_image(&self, chat: &str, image: Vec<u8>, caption: &str)
        -> Result<(), WaylinkError>;

    /// React to a message with an emoji.
    async fn react(&self, chat: &str, message_id: &str, emoji: &str) -> Result<(), WaylinkError>;

    /// Show a typing indicator in a chat. Best-effort.
    async fn send_typing(&self, _chat: &str) -> Result<(), WaylinkError> {
        Ok(())
    }
}
