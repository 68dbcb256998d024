//! `.play <youtube-url>` — download audio and send it as a voice note.
//!
//! The download runs as a `yt-dlp | ffmpeg` subprocess pipeline: yt-dlp
//! streams the best audio to stdout, ffmpeg transcodes it to mono 96k mp3
//! (voice-note friendly) in a temp file. User-facing failures reply in chat
//! and resolve `Ok`; only the reply itself can error out of the handler.

use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command as Process;
use tracing::{info, warn};
use uuid::Uuid;

use async_trait::async_trait;
use waylink_core::error::WaylinkError;
use waylink_core::message::ChatMessage;

use crate::{Command, CommandContext};

const PREFIX: &str = ".play";

pub struct Play;

/// Accept the URL shapes youtube itself hands out.
fn is_youtube_url(url: &str) -> bool {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    let Some(rest) = stripped else { return false };
    rest.starts_with("www.youtube.com/watch?v=")
        || rest.starts_with("youtube.com/watch?v=")
        || rest.starts_with("m.youtube.com/watch?v=")
        || (rest.starts_with("youtu.be/") && rest.len() > "youtu.be/".len())
}

async fn download_audio(
    ctx: &CommandContext,
    url: &str,
    out_path: &PathBuf,
) -> Result<(), String> {
    let mut ytdlp = Process::new(&ctx.config.ytdlp_bin)
        .args(["-f", "bestaudio", "-o", "-"])
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| format!("failed to spawn {}: {e}", ctx.config.ytdlp_bin))?;

    let mut ffmpeg = Process::new(&ctx.config.ffmpeg_bin)
        .args(["-i", "pipe:0", "-vn", "-codec:a", "libmp3lame"])
        .args(["-b:a", "96k", "-ac", "1", "-f", "mp3", "-y"])
        .arg(out_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| format!("failed to spawn {}: {e}", ctx.config.ffmpeg_bin))?;

    let mut audio = ytdlp
        .stdout
        .take()
        .ok_or_else(|| "yt-dlp stdout unavailable".to_string())?;
    let mut encoder_in = ffmpeg
        .stdin
        .take()
        .ok_or_else(|| "ffmpeg stdin unavailable".to_string())?;

    tokio::io::copy(&mut audio, &mut encoder_in)
        .await
        .map_err(|e| format!("audio pipe failed: {e}"))?;
    drop(encoder_in);

    let ytdlp_status = ytdlp.wait().await.map_err(|e| e.to_string())?;
    let ffmpeg_status = ffmpeg.wait().await.map_err(|e| e.to_string())?;
    if !ytdlp_status.success() {
        return Err(format!("yt-dlp exited with {ytdlp_status}"));
    }
    if !ffmpeg_status.success() {
        return Err(format!("ffmpeg exited with {ffmpeg_status}"));
    }
    Ok(())
}

#[async_trait]
impl Command for Play {
    fn name(&self) -> &str {
        "play"
    }

    fn description(&self) -> &str {
        "Downloads audio from a YouTube link and sends as a voice message (.play [YouTube URL])"
    }

    fn prefix(&self) -> Option<&str> {
        Some(PREFIX)
    }

    fn matches(&self, text: &str) -> bool {
        text.starts_with(PREFIX)
    }

    async fn execute(&self, ctx: &CommandContext, msg: &ChatMessage) -> Result<(), WaylinkError> {
        let url = msg.text[PREFIX.len().min(msg.text.len())..].trim().to_string();

        if !is_youtube_url(&url) {
            return ctx
                .messenger
                .send_text(
                    &msg.chat,
                    "Please send a valid YouTube video link after `.play ` \
                     (e.g., `.play https://www.youtube.com/watch?v=dQw4w9WgXcQ`).",
                )
                .await;
        }

        ctx.messenger
            .send_text(
                &msg.chat,
                "Got your request! Attempting to download and convert the song \
                 (quality reduced for voice message format), please wait...",
            )
            .await?;

        let out_path = std::env::temp_dir().join(format!("waylink-play-{}.mp3", Uuid::new_v4()));
        info!("downloading audio from {url} to {}", out_path.display());

        if let Err(e) = download_audio(ctx, &url, &out_path).await {
            warn!("audio download failed: {e}");
            let _ = tokio::fs::remove_file(&out_path).await;
            return ctx
                .messenger
                .send_text(
                    &msg.chat,
                    "Sorry, I encountered an error downloading or converting that song.",
                )
                .await;
        }

        let result = async {
            let metadata = tokio::fs::metadata(&out_path).await?;
            let size_mb = metadata.len() as f64 / (1024.0 * 1024.0);

            if metadata.len() > ctx.config.voice_note_max_mb * 1024 * 1024 {
                ctx.messenger
                    .send_text(
                        &msg.chat,
                        &format!(
                            "Sorry, that song is still too large ({size_mb:.2} MB) to be sent \
                             as a voice message, even with quality reduction. WhatsApp's limit \
                             for voice messages is about {} MB.",
                            ctx.config.voice_note_max_mb
                        ),
                    )
                    .await?;
                return Ok::<(), WaylinkError>(());
            }

            let audio = tokio::fs::read(&out_path).await?;
            ctx.messenger.send_voice(&msg.chat, audio).await?;
            ctx.messenger
                .send_text(
                    &msg.chat,
                    &format!("Downloaded the song ({size_mb:.2} MB) and sent as voice message."),
                )
                .await?;
            info!("voice note sent to {} ({size_mb:.2} MB)", msg.chat);
            Ok(())
        }
        .await;

        if let Err(e) = tokio::fs::remove_file(&out_path).await {
            warn!("failed to remove temp audio file: {e}");
        }

        if result.is_err() {
            return ctx
                .messenger
                .send_text(
                    &msg.chat,
                    "Sorry, I failed to send the song as a voice message. It might be too \
                     large or an incompatible format after conversion.",
                )
                .await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn test_youtube_url_validation() {
        assert!(is_youtube_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_youtube_url("http://m.youtube.com/watch?v=abc"));
        assert!(!is_youtube_url("https://youtu.be/"));
        assert!(!is_youtube_url("https://example.com/watch?v=abc"));
        assert!(!is_youtube_url("not a url"));
        assert!(!is_youtube_url(""));
    }

    #[test]
    fn test_matches_play_prefix() {
        assert!(Play.matches(".play https://youtu.be/x"));
        assert!(!Play.matches("play something"));
    }

    #[tokio::test]
    async fn test_rejects_invalid_link_with_usage_hint() {
        let (messenger, ctx) = test_context();
        Play.execute(&ctx, &text_message(".play not-a-link"))
            .await
            .unwrap();
        let texts = messenger.texts.lock().unwrap();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].1.contains("valid YouTube video link"));
        assert!(messenger.voices.lock().unwrap().is_empty());
    }
}
