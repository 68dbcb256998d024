//! Inbound WhatsApp message handling — filtering, unwrapping, forwarding.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use waylink_core::message::{ChatMessage, ImageAttachment};
use whatsapp_rust::client::Client;

/// Process one incoming WhatsApp message event.
///
/// Drops our own messages, status broadcasts, and send echoes, unwraps the
/// nested wrappers (device_sent, ephemeral, view_once), downloads image
/// attachments, and forwards the result to the gateway.
pub(crate) async fn handle_inbound_message(
    msg: waproto::whatsapp::Message,
    info: wacore::types::message::MessageInfo,
    tx: &mpsc::Sender<ChatMessage>,
    client_store: &Arc<Mutex<Option<Arc<Client>>>>,
    sent_ids: &Arc<Mutex<HashSet<String>>>,
) {
    if info.source.is_from_me {
        return;
    }

    let chat_jid = info.source.chat.to_string();
    if chat_jid == "status@broadcast" {
        debug!("ignoring status broadcast");
        return;
    }

    let msg_id = info.id.clone();
    if sent_ids.lock().await.remove(&msg_id) {
        debug!("skipping own echo: {msg_id}");
        return;
    }

    // Unwrap nested wrappers (device_sent, ephemeral, view_once).
    let inner = msg
        .device_sent_message
        .as_ref()
        .and_then(|d| d.message.as_deref())
        .or_else(|| {
            msg.ephemeral_message
                .as_ref()
                .and_then(|e| e.message.as_deref())
        })
        .or_else(|| {
            msg.view_once_message
                .as_ref()
                .and_then(|v| v.message.as_deref())
        })
        .unwrap_or(&msg);

    let text = inner
        .conversation
        .as_deref()
        .or_else(|| {
            inner
                .extended_text_message
                .as_ref()
                .and_then(|e| e.text.as_deref())
        })
        .unwrap_or("")
        .to_string();

    let (text, image) = if let Some(ref img) = inner.image_message {
        // Image caption carries the command text (e.g. `!enhance`).
        let caption = img.caption.as_deref().unwrap_or("").to_string();
        let client = { client_store.lock().await.clone() };
        let Some(client) = client else {
            warn!("whatsapp client not available for image download");
            return;
        };
        match client.download(img.as_ref()).await {
            Ok(bytes) => {
                info!("downloaded whatsapp image ({} bytes)", bytes.len());
                let mimetype = img.mimetype.as_deref().unwrap_or("image/jpeg").to_string();
                (caption, Some(ImageAttachment { data: bytes, mimetype }))
            }
            Err(e) => {
                warn!("whatsapp image download failed: {e}");
                return;
            }
        }
    } else if text.is_empty() {
        return;
    } else {
        (text, None)
    };

    let phone = info.source.sender.user.clone();
    let sender_name = if info.push_name.is_empty() {
        phone.clone()
    } else {
        info.push_name.clone()
    };

    let inbound = ChatMessage {
        id: msg_id,
        chat: chat_jid,
        sender: info.source.sender.to_string(),
        sender_name,
        text,
        timestamp: chrono::Utc::now(),
        image,
    };

    if tx.send(inbound).await.is_err() {
        info!("gateway receiver dropped");
    }
}
