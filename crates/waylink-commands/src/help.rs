//! `!menu` — list every registered command.

use async_trait::async_trait;
use waylink_core::error::WaylinkError;
use waylink_core::message::ChatMessage;

use crate::{Command, CommandContext};

/// One row of the menu, captured from the registry at build time.
pub struct MenuEntry {
    pub prefix: Option<String>,
    pub name: String,
    pub description: String,
}

pub struct Menu {
    entries: Vec<MenuEntry>,
}

impl Menu {
    pub fn new(entries: Vec<MenuEntry>) -> Self {
        Self { entries }
    }

    fn render(&self, bot_name: &str) -> String {
        let mut out = format!("✨ {bot_name} Bot Commands ✨\n\n");
        for entry in &self.entries {
            match &entry.prefix {
                Some(prefix) => {
                    let arg_hint = if entry.name == "play" { "[YouTube URL] " } else { "" };
                    out.push_str(&format!(
                        "➡️ {} {}: {}\n",
                        prefix.trim(),
                        arg_hint,
                        entry.description
                    ));
                }
                None => out.push_str(&format!("➡️ {}\n", entry.description)),
            }
        }
        out.push_str(&format!("\nEnjoy your chat with {bot_name}!"));
        out
    }
}

#[async_trait]
impl Command for Menu {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "Displays a list of available commands (!menu)"
    }

    fn prefix(&self) -> Option<&str> {
        Some("!menu")
    }

    fn matches(&self, text: &str) -> bool {
        text == "!menu"
    }

    async fn execute(&self, ctx: &CommandContext, msg: &ChatMessage) -> Result<(), WaylinkError> {
        ctx.messenger
            .send_text(&msg.chat, &self.render(&ctx.bot_name))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_menu() -> Menu {
        Menu::new(vec![
            MenuEntry {
                prefix: Some(".play".to_string()),
                name: "play".to_string(),
                description: "Downloads audio from a YouTube link".to_string(),
            },
            MenuEntry {
                prefix: None,
                name: "basic".to_string(),
                description: "Basic chat commands".to_string(),
            },
        ])
    }

    #[test]
    fn test_render_lists_prefixed_and_keyword_commands() {
        let rendered = sample_menu().render("Waylink");
        assert!(rendered.starts_with("✨ Waylink Bot Commands ✨"));
        assert!(rendered.contains("➡️ .play [YouTube URL] : Downloads audio"));
        assert!(rendered.contains("➡️ Basic chat commands"));
        assert!(rendered.ends_with("Enjoy your chat with Waylink!"));
    }

    #[test]
    fn test_matches_menu_keyword() {
        let menu = sample_menu();
        assert!(menu.matches("!menu"));
        assert!(!menu.matches("!menus"));
    }
}
