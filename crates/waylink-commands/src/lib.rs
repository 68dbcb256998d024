//! Chat command handlers and the dispatch registry.
//!
//! Each command is a `Command` trait object; the registry runs a linear scan
//! over the lowercased message text and executes the first match. Prefixed
//! commands (`!menu`, `.play`, `!apk`, `!enhance`) are checked before the
//! plain-keyword `basic` handler.

pub mod apk;
pub mod basic;
pub mod enhance;
pub mod help;
pub mod play;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use waylink_core::config::CommandsConfig;
use waylink_core::error::WaylinkError;
use waylink_core::message::ChatMessage;
use waylink_core::traits::Messenger;

/// Everything a command handler needs beyond the message itself.
pub struct CommandContext {
    pub messenger: Arc<dyn Messenger>,
    pub http: reqwest::Client,
    pub config: CommandsConfig,
    pub bot_name: String,
}

impl CommandContext {
    pub fn new(messenger: Arc<dyn Messenger>, config: CommandsConfig, bot_name: String) -> Self {
        Self {
            messenger,
            http: reqwest::Client::new(),
            config,
            bot_name,
        }
    }
}

/// A single chat command.
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    /// One line for the `!menu` listing.
    fn description(&self) -> &str;

    /// Chat prefix (`!apk `), or `None` for plain-keyword commands.
    fn prefix(&self) -> Option<&str> {
        None
    }

    /// Whether this command handles `text` (already lowercased).
    fn matches(&self, text: &str) -> bool;

    async fn execute(&self, ctx: &CommandContext, msg: &ChatMessage) -> Result<(), WaylinkError>;
}

/// Ordered command list; first match wins.
pub struct CommandRegistry {
    commands: Vec<Arc<dyn Command>>,
}

impl CommandRegistry {
    /// The standard command set in dispatch order.
    pub fn with_defaults() -> Self {
        let mut commands: Vec<Arc<dyn Command>> = vec![
            Arc::new(play::Play),
            Arc::new(apk::Apk),
            Arc::new(enhance::Enhance),
            Arc::new(basic::Basic),
        ];
        // The menu lists every other command, so it is built last and
        // dispatched first.
        let listing = commands
            .iter()
            .map(|c| help::MenuEntry {
                prefix: c.prefix().map(str::to_string),
                name: c.name().to_string(),
                description: c.description().to_string(),
            })
            .collect();
        commands.insert(0, Arc::new(help::Menu::new(listing)));
        Self { commands }
    }

    pub fn commands(&self) -> &[Arc<dyn Command>] {
        &self.commands
    }

    /// Run the first matching command. Returns `Ok(false)` when nothing
    /// matched, mirroring a chat bot that stays silent on unknown text.
    pub async fn dispatch(
        &self,
        ctx: &CommandContext,
        msg: &ChatMessage,
    ) -> Result<bool, WaylinkError> {
        let text = msg.text_lower();
        for command in &self.commands {
            if command.matches(&text) {
                debug!("dispatching {} for {}", command.name(), msg.chat);
                command.execute(ctx, msg).await?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;

    #[test]
    fn test_registry_has_menu_first() {
        let registry = CommandRegistry::with_defaults();
        assert_eq!(registry.commands()[0].name(), "help");
        assert!(registry.commands().len() >= 5);
    }

    #[tokio::test]
    async fn test_dispatch_prefers_prefixed_commands() {
        let registry = CommandRegistry::with_defaults();
        let (messenger, ctx) = test_context();

        let handled = registry
            .dispatch(&ctx, &text_message("!menu"))
            .await
            .unwrap();
        assert!(handled);
        let texts = messenger.texts.lock().unwrap();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].1.contains("Waylink Bot Commands"));
    }

    #[tokio::test]
    async fn test_dispatch_falls_through_to_keywords() {
        let registry = CommandRegistry::with_defaults();
        let (messenger, ctx) = test_context();

        let handled = registry
            .dispatch(&ctx, &text_message("!ping"))
            .await
            .unwrap();
        assert!(handled);
        assert_eq!(messenger.texts.lock().unwrap()[0].1, "pong!");
    }

    #[tokio::test]
    async fn test_dispatch_ignores_unknown_text() {
        let registry = CommandRegistry::with_defaults();
        let (messenger, ctx) = test_context();

        let handled = registry
            .dispatch(&ctx, &text_message("what is the weather"))
            .await
            .unwrap();
        assert!(!handled);
        assert!(messenger.texts.lock().unwrap().is_empty());
    }
}
