//! The WhatsApp transport — session lifecycle and the outbound surface.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use wacore::types::events::Event;
use wacore_binary::jid::Jid;
use waylink_core::error::WaylinkError;
use waylink_core::event::{CloseReason, TransportEvent};
use waylink_core::message::ChatMessage;
use waylink_core::traits::{Messenger, Transport};
use whatsapp_rust::bot::Bot;
use whatsapp_rust::client::Client;
use whatsapp_rust::download::MediaType;
use whatsapp_rust::pair_code::PairCodeOptions;
use whatsapp_rust::store::SqliteStore;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

use crate::events::handle_inbound_message;
use crate::qr::render_qr_terminal;
use crate::send::{retry_send, split_message, MAX_TEXT_LEN};

pub struct WhatsAppTransport {
    session_dir: String,
    device_name: String,
    /// Client handle for sending — set once the session connects.
    client: Arc<Mutex<Option<Arc<Client>>>>,
    /// Message IDs we sent, used to ignore our own echo.
    sent_ids: Arc<Mutex<HashSet<String>>>,
    /// Inbound chat messages for the gateway.
    msg_tx: mpsc::Sender<ChatMessage>,
}

impl WhatsAppTransport {
    /// Create the transport. The returned receiver carries inbound chat
    /// messages across every session this transport establishes.
    pub fn new(
        session_dir: impl Into<String>,
        device_name: impl Into<String>,
    ) -> (Self, mpsc::Receiver<ChatMessage>) {
        let (msg_tx, msg_rx) = mpsc::channel(64);
        (
            Self {
                session_dir: session_dir.into(),
                device_name: device_name.into(),
                client: Arc::new(Mutex::new(None)),
                sent_ids: Arc::new(Mutex::new(HashSet::new())),
                msg_tx,
            },
            msg_rx,
        )
    }

    async fn connected_client(&self) -> Result<Arc<Client>, WaylinkError> {
        self.client
            .lock()
            .await
            .clone()
            .ok_or_else(|| WaylinkError::Transport("whatsapp client not connected".into()))
    }

    fn parse_jid(target: &str) -> Result<Jid, WaylinkError> {
        target
            .parse()
            .map_err(|e| WaylinkError::Transport(format!("invalid whatsapp JID '{target}': {e}")))
    }

    fn db_path(&self) -> String {
        let _ = std::fs::create_dir_all(&self.session_dir);
        format!("{}/whatsapp.db", self.session_dir)
    }
}

#[async_trait]
impl Transport for WhatsAppTransport {
    async fn establish(
        &self,
        pairing_phone: Option<String>,
    ) -> Result<mpsc::Receiver<TransportEvent>, WaylinkError> {
        let db_path = self.db_path();
        info!("whatsapp bot building (session: {db_path})...");

        let backend = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .map_err(|e| WaylinkError::Transport(format!("session store init failed: {e}")))?,
        );

        let (events_tx, events_rx) = mpsc::channel::<TransportEvent>(64);
        let client_handle = self.client.clone();
        let sent_ids = self.sent_ids.clone();
        let msg_tx = self.msg_tx.clone();

        let mut builder = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .with_device_props(
                Some(self.device_name.clone()),
                None,
                Some(waproto::whatsapp::device_props::PlatformType::Desktop),
            );

        if let Some(phone) = pairing_phone {
            builder = builder.with_pair_code(PairCodeOptions {
                phone_number: phone,
                custom_code: None,
                ..Default::default()
            });
        }

        let mut bot = builder
            .on_event(move |event, client| {
                let events = events_tx.clone();
                let client_store = client_handle.clone();
                let sent_ids = sent_ids.clone();
                let msg_tx = msg_tx.clone();
                async move {
                    match event {
                        Event::PairingQrCode { code, .. } => {
                            info!("whatsapp QR code generated");
                            // Headless fallback: pair from the terminal when
                            // no browser is attached.
                            match render_qr_terminal(&code) {
                                Ok(rendered) => eprintln!("{rendered}"),
                                Err(e) => debug!("terminal QR render failed: {e}"),
                            }
                            let _ = events.send(TransportEvent::QrAvailable(code)).await;
                        }
                        Event::PairingCode { code, .. } => {
                            info!("whatsapp pairing code generated");
                            let _ = events.send(TransportEvent::PairingCodeAvailable(code)).await;
                        }
                        Event::PairSuccess(_) => {
                            info!("whatsapp pairing successful");
                            let marker = serde_json::json!({
                                "linked": true,
                                "linked_at": chrono::Utc::now().to_rfc3339(),
                            });
                            let _ = events
                                .send(TransportEvent::CredentialsUpdated(
                                    serde_json::to_vec(&marker).unwrap_or_default(),
                                ))
                                .await;
                        }
                        Event::Connected(_) => {
                            info!("whatsapp connected");
                            *client_store.lock().await = Some(client);
                            let _ = events.send(TransportEvent::Opened).await;
                        }
                        Event::Disconnected(_) => {
                            warn!("whatsapp disconnected");
                            *client_store.lock().await = None;
                            let _ = events
                                .send(TransportEvent::Closed(CloseReason::Retryable(
                                    "connection closed".into(),
                                )))
                                .await;
                        }
                        Event::LoggedOut(_) => {
                            warn!("whatsapp logged out, session invalidated");
                            *client_store.lock().await = None;
                            let _ = events
                                .send(TransportEvent::Closed(CloseReason::LoggedOut))
                                .await;
                        }
                        Event::StreamError(stream_error) => {
                            warn!("whatsapp stream error: {stream_error:?}");
                            let _ = events
                                .send(TransportEvent::Closed(CloseReason::Retryable(format!(
                                    "stream error: {stream_error:?}"
                                ))))
                                .await;
                        }
                        Event::Message(msg, info) => {
                            handle_inbound_message(*msg, info, &msg_tx, &client_store, &sent_ids)
                                .await;
                        }
                        _ => {}
                    }
                }
            })
            .build()
            .await
            .map_err(|e| WaylinkError::Transport(format!("whatsapp bot build failed: {e}")))?;

        // Client handle is usable right away when a session already exists.
        *self.client.lock().await = Some(bot.client());

        let handle = bot
            .run()
            .await
            .map_err(|e| WaylinkError::Transport(format!("whatsapp bot run failed: {e}")))?;

        // The event sender lives in the on_event closure; when the bot task
        // dies the channel closes and the consumer sees the stream end.
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                warn!("whatsapp bot task ended: {e}");
            }
        });

        info!("whatsapp bot started");
        Ok(events_rx)
    }
}

#[async_trait]
impl Messenger for WhatsAppTransport {
    async fn send_text(&self, chat: &str, text: &str) -> Result<(), WaylinkError> {
        let client = self.connected_client().await?;
        let jid = Self::parse_jid(chat)?;

        for chunk in split_message(text, MAX_TEXT_LEN) {
            let msg = waproto::whatsapp::Message {
                conversation: Some(chunk.to_string()),
                ..Default::default()
            };
            let msg_id = retry_send(&client, &jid, msg).await?;
            self.sent_ids.lock().await.insert(msg_id);
        }
        Ok(())
    }

    async fn send_voice(&self, chat: &str, audio: Vec<u8>) -> Result<(), WaylinkError> {
        let client = self.connected_client().await?;
        let jid = Self::parse_jid(chat)?;

        let upload = client
            .upload(audio, MediaType::Audio)
            .await
            .map_err(|e| WaylinkError::Transport(format!("whatsapp audio upload failed: {e}")))?;

        let msg = waproto::whatsapp::Message {
            audio_message: Some(Box::new(waproto::whatsapp::message::AudioMessage {
                url: Some(upload.url),
                direct_path: Some(upload.direct_path),
                media_key: Some(upload.media_key),
                file_enc_sha256: Some(upload.file_enc_sha256),
                file_sha256: Some(upload.file_sha256),
                file_length: Some(upload.file_length),
                mimetype: Some("audio/mp4".to_string()),
                ptt: Some(true),
                ..Default::default()
            })),
            ..Default::default()
        };

        let msg_id = retry_send(&client, &jid, msg).await?;
        self.sent_ids.lock().await.insert(msg_id);
        Ok(())
    }

    async fn send_image(
        &self,
        chat: &str,
        image: Vec<u8>,
        caption: &str,
    ) -> Result<(), WaylinkError> {
        let client = self.connected_client().await?;
        let jid = Self::parse_jid(chat)?;

        let upload = client
            .upload(image, MediaType::Image)
            .await
            .map_err(|e| WaylinkError::Transport(format!("whatsapp image upload failed: {e}")))?;

        let msg = waproto::whatsapp::Message {
            image_message: Some(Box::new(waproto::whatsapp::message::ImageMessage {
                mimetype: Some("image/jpeg".to_string()),
                caption: Some(caption.to_string()),
                url: Some(upload.url),
                direct_path: Some(upload.direct_path),
                media_key: Some(upload.media_key),
                file_enc_sha256: Some(upload.file_enc_sha256),
                file_sha256: Some(upload.file_sha256),
                file_length: Some(upload.file_length),
                ..Default::default()
            })),
            ..Default::default()
        };

        let msg_id = retry_send(&client, &jid, msg).await?;
        self.sent_ids.lock().await.insert(msg_id);
        Ok(())
    }

    async fn react(&self, chat: &str, message_id: &str, emoji: &str) -> Result<(), WaylinkError> {
        let client = self.connected_client().await?;
        let jid = Self::parse_jid(chat)?;

        let msg = waproto::whatsapp::Message {
            reaction_message: Some(waproto::whatsapp::message::ReactionMessage {
                key: Some(waproto::whatsapp::MessageKey {
                    remote_jid: Some(chat.to_string()),
                    from_me: Some(false),
                    id: Some(message_id.to_string()),
                    ..Default::default()
                }),
                text: Some(emoji.to_string()),
                sender_timestamp_ms: Some(chrono::Utc::now().timestamp_millis()),
                ..Default::default()
            }),
            ..Default::default()
        };

        // Reactions are cosmetic, no retry.
        client
            .send_message(jid, msg)
            .await
            .map_err(|e| WaylinkError::Transport(format!("whatsapp reaction failed: {e}")))?;
        Ok(())
    }

    async fn send_typing(&self, chat: &str) -> Result<(), WaylinkError> {
        let jid = Self::parse_jid(chat)?;
        if let Some(client) = self.client.lock().await.clone() {
            let _ = client.chatstate().send_composing(&jid).await;
        }
        Ok(())
    }
}
