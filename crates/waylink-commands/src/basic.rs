//! Plain-keyword chat replies (hello / how are you? / !ping).

use async_trait::async_trait;
use waylink_core::error::WaylinkError;
use waylink_core::message::ChatMessage;

use crate::{Command, CommandContext};

pub struct Basic;

#[async_trait]
impl Command for Basic {
    fn name(&self) -> &str {
        "basic"
    }

    fn description(&self) -> &str {
        "Basic chat commands (hello, how are you?, !ping)"
    }

    fn matches(&self, text: &str) -> bool {
        matches!(text, "hello" | "how are you?" | "!ping")
    }

    async fn execute(&self, ctx: &CommandContext, msg: &ChatMessage) -> Result<(), WaylinkError> {
        let reply = match msg.text_lower().as_str() {
            "hello" => format!("Hi there from your {} bot!", ctx.bot_name),
            "how are you?" => "I am a bot, feeling digital and at your service!".to_string(),
            "!ping" => "pong!".to_string(),
            _ => return Ok(()),
        };
        ctx.messenger.send_text(&msg.chat, &reply).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn test_matches_exact_keywords_only() {
        let cmd = Basic;
        assert!(cmd.matches("hello"));
        assert!(cmd.matches("how are you?"));
        assert!(cmd.matches("!ping"));
        assert!(!cmd.matches("hello there"));
        assert!(!cmd.matches("ping"));
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let (messenger, ctx) = test_context();
        Basic.execute(&ctx, &text_message("!PING")).await.unwrap();
        assert_eq!(messenger.texts.lock().unwrap()[0].1, "pong!");
    }

    #[tokio::test]
    async fn test_hello_uses_bot_name() {
        let (messenger, ctx) = test_context();
        Basic.execute(&ctx, &text_message("hello")).await.unwrap();
        assert!(messenger.texts.lock().unwrap()[0].1.contains("Waylink"));
    }
}
