//! Owner announcement and liveness heartbeat.
//!
//! Both are observers of the pairing coordinator: the announcer waits for
//! `connected` frames and messages the owner chat a few seconds later, the
//! heartbeat logs a periodic liveness line while the session is up.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use waylink_core::config::BotConfig;
use waylink_core::event::WireEvent;
use waylink_core::state::ConnectionState;
use waylink_core::traits::Messenger;

use crate::pairing::Coordinator;

/// Settling time between the session opening and the first owner send.
pub const ANNOUNCE_DELAY: Duration = Duration::from_secs(3);

/// Message the owner chat once the session opens (and again after every
/// reconnect). Runs until the process exits.
pub async fn announce_session(
    coordinator: Arc<Coordinator>,
    messenger: Arc<dyn Messenger>,
    config: BotConfig,
    announce_delay: Duration,
) {
    let owner = config.owner_number.trim();
    if owner.is_empty() {
        debug!("no owner number configured, session announcements disabled");
        return;
    }
    let owner_jid = format!("{owner}@s.whatsapp.net");

    let (_observer, mut events) = coordinator.attach_observer().await;
    while let Some(event) = events.recv().await {
        if !matches!(event, WireEvent::Connected { .. }) {
            continue;
        }
        // Give the freshly opened session a moment before the first send.
        tokio::time::sleep(announce_delay).await;
        let text = format!(
            "{} Bot Session Active! 🎉\n\nBot: {}\nStatus: Online",
            config.session_id_prefix, config.name
        );
        match messenger.send_text(&owner_jid, &text).await {
            Ok(()) => info!("session announcement sent to owner chat"),
            Err(e) => warn!("failed to send session announcement: {e}"),
        }
    }
}

/// Log a liveness line every `interval` while the session is `Live`.
pub async fn heartbeat_loop(coordinator: Arc<Coordinator>, interval: Duration) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let snapshot = coordinator.snapshot().await;
        if snapshot.state == ConnectionState::Live {
            info!(
                "heartbeat: session live, uptime {}s",
                started.elapsed().as_secs()
            );
        } else {
            debug!("heartbeat: session {:?}", snapshot.state);
        }
    }
}
