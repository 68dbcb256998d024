//! Gateway — the chat event loop connecting the transport to commands.
//!
//! Consumes inbound chat messages, applies the behavior flags (typing
//! indicator, auto-react), and hands each message to the command registry.
//! Also hosts the owner announcement and heartbeat tasks.

mod heartbeat;
#[cfg(test)]
mod tests;

pub use heartbeat::{announce_session, heartbeat_loop, ANNOUNCE_DELAY};

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use waylink_core::config::BehaviorConfig;
use waylink_core::message::ChatMessage;
use waylink_core::traits::Messenger;
use waylink_commands::{CommandContext, CommandRegistry};

pub struct Gateway {
    messenger: Arc<dyn Messenger>,
    registry: CommandRegistry,
    context: CommandContext,
    behavior: BehaviorConfig,
}

impl Gateway {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        registry: CommandRegistry,
        context: CommandContext,
        behavior: BehaviorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            messenger,
            registry,
            context,
            behavior,
        })
    }

    /// Run the dispatch loop until the message channel closes.
    pub async fn run(self: Arc<Self>, mut messages: mpsc::Receiver<ChatMessage>) {
        info!(
            "gateway running | commands: {} | auto_typing: {} | auto_react: {}",
            self.registry.commands().len(),
            self.behavior.auto_typing,
            self.behavior.auto_react,
        );

        while let Some(msg) = messages.recv().await {
            let this = Arc::clone(&self);
            // Slow handlers (downloads, uploads) must not block the loop.
            tokio::spawn(async move {
                this.dispatch(msg).await;
            });
        }

        info!("message channel closed, gateway stopping");
    }

    async fn dispatch(&self, msg: ChatMessage) {
        info!("[{}] received: {}", msg.chat, msg.text);

        if self.behavior.auto_typing {
            if let Err(e) = self.messenger.send_typing(&msg.chat).await {
                debug!("typing indicator failed: {e}");
            }
        }

        if self.behavior.auto_react {
            if let Err(e) = self.messenger.react(&msg.chat, &msg.id, "👍").await {
                debug!("auto-react failed: {e}");
            }
        }

        match self.registry.dispatch(&self.context, &msg).await {
            Ok(true) => {}
            Ok(false) => debug!("no command matched: {}", msg.text),
            Err(e) => {
                warn!("command failed for {}: {e}", msg.chat);
                let _ = self
                    .messenger
                    .send_text(&msg.chat, "Sorry, something went wrong handling that command.")
                    .await;
            }
        }
    }
}
