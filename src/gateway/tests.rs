use super::*;
use crate::pairing::{Broadcaster, Coordinator};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use waylink_core::config::{BotConfig, CommandsConfig};
use waylink_core::error::WaylinkError;
use waylink_core::event::{TransportEvent, WireEvent};
use waylink_core::traits::{SessionStore, Transport};

#[derive(Default)]
struct RecordingMessenger {
    texts: Mutex<Vec<(String, String)>>,
    reactions: Mutex<Vec<(String, String, String)>>,
    typing: Mutex<Vec<String>>,
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat: &str, text: &str) -> Result<(), WaylinkError> {
        self.texts
            .lock()
            .unwrap()
            .push((chat.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_voice(&self, _chat: &str, _audio: Vec<u8>) -> Result<(), WaylinkError> {
        Ok(())
    }

    async fn send_image(
        &self,
        _chat: &str,
        _image: Vec<u8>,
        _caption: &str,
    ) -> Result<(), WaylinkError> {
        Ok(())
    }

    async fn react(&self, chat: &str, message_id: &str, emoji: &str) -> Result<(), WaylinkError> {
        self.reactions.lock().unwrap().push((
            chat.to_string(),
            message_id.to_string(),
            emoji.to_string(),
        ));
        Ok(())
    }

    async fn send_typing(&self, chat: &str) -> Result<(), WaylinkError> {
        self.typing.lock().unwrap().push(chat.to_string());
        Ok(())
    }
}

fn test_gateway(behavior: BehaviorConfig) -> (Arc<RecordingMessenger>, Arc<Gateway>) {
    let messenger = Arc::new(RecordingMessenger::default());
    let context = CommandContext::new(
        messenger.clone(),
        CommandsConfig::default(),
        "Waylink".to_string(),
    );
    let gateway = Gateway::new(
        messenger.clone(),
        CommandRegistry::with_defaults(),
        context,
        behavior,
    );
    (messenger, gateway)
}

fn inbound(text: &str) -> ChatMessage {
    ChatMessage {
        id: "MSG1".to_string(),
        chat: "15551234567@s.whatsapp.net".to_string(),
        sender: "15551234567@s.whatsapp.net".to_string(),
        sender_name: "Tester".to_string(),
        text: text.to_string(),
        timestamp: chrono::Utc::now(),
        image: None,
    }
}

async fn run_one(gateway: Arc<Gateway>, msg: ChatMessage) {
    let (tx, rx) = mpsc::channel(8);
    tx.send(msg).await.unwrap();
    drop(tx);
    gateway.run(rx).await;
    // dispatch is spawned per message; give it a beat to finish.
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_dispatch_replies_to_command() {
    let (messenger, gateway) = test_gateway(BehaviorConfig::default());
    run_one(gateway, inbound("!ping")).await;

    let texts = messenger.texts.lock().unwrap();
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].1, "pong!");
}

#[tokio::test]
async fn test_auto_behaviors_fire_before_dispatch() {
    let behavior = BehaviorConfig {
        auto_typing: true,
        auto_react: true,
    };
    let (messenger, gateway) = test_gateway(behavior);
    run_one(gateway, inbound("hello")).await;

    assert_eq!(
        messenger.typing.lock().unwrap().as_slice(),
        ["15551234567@s.whatsapp.net"]
    );
    let reactions = messenger.reactions.lock().unwrap();
    assert_eq!(reactions.len(), 1);
    assert_eq!(reactions[0].1, "MSG1");
    assert_eq!(reactions[0].2, "👍");
}

#[tokio::test]
async fn test_unmatched_text_stays_silent() {
    let (messenger, gateway) = test_gateway(BehaviorConfig::default());
    run_one(gateway, inbound("good morning everyone")).await;

    assert!(messenger.texts.lock().unwrap().is_empty());
    assert!(messenger.reactions.lock().unwrap().is_empty());
}

/// Transport that accepts every establish call and never emits events.
struct IdleTransport;

#[async_trait]
impl Transport for IdleTransport {
    async fn establish(
        &self,
        _pairing_phone: Option<String>,
    ) -> Result<mpsc::Receiver<TransportEvent>, WaylinkError> {
        let (tx, rx) = mpsc::channel(1);
        std::mem::forget(tx);
        Ok(rx)
    }
}

struct NullStore;

#[async_trait]
impl SessionStore for NullStore {
    async fn load(&self) -> Result<Option<Vec<u8>>, WaylinkError> {
        Ok(None)
    }
    async fn save(&self, _credentials: &[u8]) -> Result<(), WaylinkError> {
        Ok(())
    }
    async fn wipe(&self) -> Result<(), WaylinkError> {
        Ok(())
    }
}

fn announce_fixture() -> (Arc<RecordingMessenger>, Arc<Broadcaster>, Arc<Coordinator>) {
    let messenger = Arc::new(RecordingMessenger::default());
    let broadcaster = Arc::new(Broadcaster::new());
    let coordinator = Coordinator::new(
        Arc::new(IdleTransport),
        Arc::new(NullStore),
        broadcaster.clone(),
        Duration::from_secs(60),
    );
    (messenger, broadcaster, coordinator)
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_owner_is_announced_after_connect() {
    let (messenger, broadcaster, coordinator) = announce_fixture();
    let config = BotConfig {
        owner_number: "15551230000".to_string(),
        ..BotConfig::default()
    };

    tokio::spawn(announce_session(
        coordinator,
        messenger.clone(),
        config,
        Duration::from_millis(10),
    ));
    wait_until(|| broadcaster.observer_count() == 1).await;

    broadcaster.publish(&WireEvent::Connected {
        message: Some("Bot is connected to WhatsApp!".to_string()),
    });
    wait_until(|| !messenger.texts.lock().unwrap().is_empty()).await;

    let texts = messenger.texts.lock().unwrap();
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].0, "15551230000@s.whatsapp.net");
    assert!(texts[0].1.contains("Bot Session Active"));
    assert!(texts[0].1.starts_with("WAYLINK~"));
}

#[tokio::test]
async fn test_announcement_disabled_without_owner_number() {
    let (messenger, broadcaster, coordinator) = announce_fixture();

    announce_session(
        coordinator,
        messenger.clone(),
        BotConfig::default(),
        Duration::from_millis(10),
    )
    .await;

    // Returned without ever attaching an observer or sending anything.
    assert_eq!(broadcaster.observer_count(), 0);
    assert!(messenger.texts.lock().unwrap().is_empty());
}
