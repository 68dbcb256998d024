use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inbound chat message handed to the command dispatcher.
///
/// The pairing coordinator never inspects these; they only flow once the
/// session is live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Platform message ID (used for reactions).
    pub id: String,
    /// Chat JID the reply should go to (e.g. `15551234567@s.whatsapp.net`).
    pub chat: String,
    /// Sender's phone-number part of the JID.
    pub sender: String,
    /// Push name, or the sender's phone number when the platform gave none.
    pub sender_name: String,
    /// Text content — for an image message, its caption.
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Downloaded image bytes when the message carried a photo.
    #[serde(default)]
    pub image: Option<ImageAttachment>,
}

/// Decrypted image payload attached to a chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub data: Vec<u8>,
    pub mimetype: String,
}

impl ChatMessage {
    /// Lowercased text, used for command matching.
    pub fn text_lower(&self) -> String {
        self.text.to_lowercase()
    }
}
