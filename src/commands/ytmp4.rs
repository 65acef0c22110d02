// ytmp4.rs - YouTube MP4 Downloader Command
// This module implements the ^ytmp4 command, which converts a YouTube video
// to MP4 through ytconvert.org and posts the download link.
//
// Key Features:
// - Optional quality selector (144p..1080p, default 720p), checked before any request
// - Title/channel lookup through oEmbed
// - Download link posted with a filename derived from the title
//
// Used by: main.rs (command registration)

use crate::commands::{prefix_from, services_from};
use crate::error::HostError;
use crate::host::{ChatHost, DiscordHost, MediaKind, OutgoingMedia};
use crate::services::ytconvert::{ConvertedVideo, Quality, YtConvertClient};
use log::{error, info};
use serenity::{
    client::Context,
    framework::standard::{macros::command, Args, CommandResult},
    model::channel::Message,
};

pub const PROCESSING: &str = "⏳ Processing video, please wait...";

pub fn usage(prefix: &str) -> String {
    format!(
        "🎬 **YouTube MP4 Downloader**

Usage:
`{prefix}ytmp4 <youtube url> [quality]`

Available quality:
{choices}

Example:
`{prefix}ytmp4 https://youtu.be/xxxxx 720p`",
        prefix = prefix,
        choices = Quality::choices()
    )
}

pub fn caption(video: &ConvertedVideo) -> String {
    format!(
        "🎬 **YouTube MP4 Download**

📌 Title: {}
📺 Channel: {}
🎞 Quality: {}

Enjoy your video!",
        video.title, video.author, video.quality
    )
}

#[command]
#[aliases("ytv", "ytvideo")]
/// Main ^ytmp4 command handler
/// Supports:
///   - ^ytmp4 <url>
///   - ^ytmp4 <url> <quality>
pub async fn ytmp4(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    info!("🎬 Ytmp4 command initiated by user {} ({}) in channel {}",
          msg.author.name, msg.author.id, msg.channel_id);

    let services = match services_from(ctx).await {
        Some(services) => services,
        None => {
            msg.reply(ctx, "❌ Video converter is not available right now.").await?;
            return Ok(());
        }
    };
    let prefix = prefix_from(ctx).await;
    let positional: Vec<&str> = args.raw().collect();

    let host = DiscordHost::new(ctx, msg);
    handle_ytmp4(&host, &services.converter, &prefix, &positional).await?;
    Ok(())
}

/// Host-agnostic ^ytmp4 flow.
pub async fn handle_ytmp4(
    host: &dyn ChatHost,
    converter: &YtConvertClient,
    prefix: &str,
    args: &[&str],
) -> Result<(), HostError> {
    let url = match args.first() {
        Some(url) => *url,
        None => {
            host.reply(&usage(prefix)).await?;
            return Ok(());
        }
    };

    let quality = match Quality::from_arg(args.get(1).copied()) {
        Ok(quality) => quality,
        Err(e) => {
            host.reply(&format!("❌ Error: {}", e)).await?;
            return Ok(());
        }
    };

    host.reply(PROCESSING).await?;

    match converter.convert(url, quality).await {
        Ok(video) => {
            info!("[YTMP4] Ready: {} -> {}", video.filename, video.download_url);
            host.send_media(OutgoingMedia {
                kind: MediaKind::Video,
                url: video.download_url.clone(),
                caption: caption(&video),
                filename: Some(video.filename.clone()),
            })
            .await?;
        }
        Err(e) => {
            error!("[YTMP4] Conversion of {} failed: {}", url, e);
            host.reply(&format!("❌ Error: {}", e)).await?;
        }
    }

    Ok(())
}
