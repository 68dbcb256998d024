//! `!apk <name>` — APKMirror search, reply with the first result's page link.

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{info, warn};
use waylink_core::error::WaylinkError;
use waylink_core::message::ChatMessage;

use crate::{Command, CommandContext};

const PREFIX: &str = "!apk";
const SEARCH_BASE: &str = "https://www.apkmirror.com/";
// APKMirror blocks default client UAs.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub struct Apk;

/// Pull the first app row out of a search results page.
///
/// Tied to APKMirror's current markup (`div.appRow a.fontBlack`); when the
/// site changes, this returns `None` and the user gets the not-found reply.
fn first_result(html: &str) -> Option<(String, String)> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("div.appRow a.fontBlack").ok()?;
    let link = document.select(&selector).next()?;
    let title = link.text().collect::<String>().trim().to_string();
    let href = link.value().attr("href")?.to_string();
    if title.is_empty() || href.is_empty() {
        return None;
    }
    Some((title, format!("https://www.apkmirror.com{href}")))
}

#[async_trait]
impl Command for Apk {
    fn name(&self) -> &str {
        "apk_search"
    }

    fn description(&self) -> &str {
        "Searches for an app on APKMirror and returns the link to its page (!apk [app name])"
    }

    fn prefix(&self) -> Option<&str> {
        Some("!apk ")
    }

    fn matches(&self, text: &str) -> bool {
        text == PREFIX || text.starts_with("!apk ")
    }

    async fn execute(&self, ctx: &CommandContext, msg: &ChatMessage) -> Result<(), WaylinkError> {
        let app_name = msg.text[PREFIX.len().min(msg.text.len())..].trim().to_string();

        if app_name.is_empty() {
            return ctx
                .messenger
                .send_text(
                    &msg.chat,
                    "Please provide an app name to search for (e.g., `!apk WhatsApp`).",
                )
                .await;
        }

        ctx.messenger
            .send_text(
                &msg.chat,
                &format!("Searching for \"{app_name}\" on APKMirror. Please wait..."),
            )
            .await?;
        info!("searching APKMirror for {app_name}");

        let body = match fetch_search_page(ctx, &app_name).await {
            Ok(body) => body,
            Err(e) => {
                warn!("APKMirror search failed: {e}");
                return ctx
                    .messenger
                    .send_text(
                        &msg.chat,
                        &format!(
                            "Sorry, I encountered an error while searching for \"{app_name}\". \
                             The website might be down or its structure changed."
                        ),
                    )
                    .await;
            }
        };

        match first_result(&body) {
            Some((title, link)) => {
                info!("found {title} at {link}");
                ctx.messenger
                    .send_text(
                        &msg.chat,
                        &format!(
                            "Found \"{title}\" on APKMirror:\n🔗 {link}\n\n*Note: This is a \
                             link to the app's page on APKMirror. Download APKs at your own \
                             risk.*"
                        ),
                    )
                    .await
            }
            None => {
                ctx.messenger
                    .send_text(
                        &msg.chat,
                        &format!(
                            "Sorry, I couldn't find any relevant app results for \
                             \"{app_name}\" on APKMirror."
                        ),
                    )
                    .await
            }
        }
    }
}

async fn fetch_search_page(ctx: &CommandContext, app_name: &str) -> Result<String, reqwest::Error> {
    ctx.http
        .get(SEARCH_BASE)
        .query(&[
            ("post_type", "app_release"),
            ("searchtype", "apk"),
            ("s", app_name),
        ])
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}
