// editimg.rs - AI Image Editor Command
// This module implements the ^editimg command: reply to (or attach) an image,
// give a prompt, and get the AI-edited image back.
//
// Key Features:
// - Guide message when no image is supplied
// - Stages the downloaded image in a temporary file that is always removed
// - Delegates auth/upload/job/poll to services::nanana
//
// Used by: main.rs (command registration)

use crate::commands::{prefix_from, services_from};
use crate::error::{FlowError, HostError};
use crate::host::{Attachment, ChatHost, DiscordHost, MediaKind, OutgoingMedia};
use crate::services::nanana::{EditedImage, NananaClient};
use log::{error, info, warn};
use serenity::{
    client::Context,
    framework::standard::{macros::command, Args, CommandResult},
    model::channel::Message,
};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

pub fn guide(prefix: &str) -> String {
    format!(
        "✨ **AI Image Editor Guide**

This feature allows you to edit an image using AI.

📌 How to use:
1. Send or reply to an image
2. Use command:
   `{prefix}editimg <your prompt>`

Example:
`{prefix}editimg turn this into anime style`

⚠️ You must reply to an image and provide a prompt.",
        prefix = prefix
    )
}

pub const MISSING_PROMPT: &str = "❌ Please provide a prompt.";
pub const DOWNLOAD_FAILED: &str = "❌ Failed to download image.";
pub const SUCCESS_CAPTION: &str = "✨ Editing completed successfully!";

#[command]
#[aliases("imgedit")]
/// Main ^editimg command handler
/// Supports:
///   - ^editimg <prompt> (replying to an image)
///   - ^editimg <prompt> with an attached image
pub async fn editimg(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    info!("🖼️ Editimg command initiated by user {} ({}) in channel {}",
          msg.author.name, msg.author.id, msg.channel_id);

    let services = match services_from(ctx).await {
        Some(services) => services,
        None => {
            msg.reply(ctx, "❌ Image editor is not available right now.").await?;
            return Ok(());
        }
    };

    let prefix = prefix_from(ctx).await;

    let host = DiscordHost::new(ctx, msg);
    handle_editimg(&host, &services.editor, &std::env::temp_dir(), &prefix, args.message()).await?;
    Ok(())
}

/// Check that there is an image to edit and a prompt to edit it with.
pub fn select_input<'p>(
    attachment: Option<Attachment>,
    prompt: &'p str,
    prefix: &str,
) -> Result<(Attachment, &'p str), FlowError> {
    let attachment = match attachment.filter(|a| a.is_image()) {
        Some(a) => a,
        None => return Err(FlowError::MissingInput(guide(prefix))),
    };

    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(FlowError::MissingInput(MISSING_PROMPT.to_string()));
    }

    Ok((attachment, prompt))
}

fn staging_extension(content_type: &str) -> &'static str {
    let exts = mime_guess::get_mime_extensions_str(content_type).unwrap_or(&[]);
    ["jpg", "png", "webp", "gif"]
        .into_iter()
        .find(|preferred| exts.contains(preferred))
        .or_else(|| exts.first().copied())
        .unwrap_or("jpg")
}

/// Write the image to a temp file in `dir`. The file is deleted when the handle drops.
pub fn stage_upload(dir: &Path, bytes: &[u8], content_type: &str) -> Result<NamedTempFile, FlowError> {
    let mut staged = tempfile::Builder::new()
        .prefix("editimg-")
        .suffix(&format!(".{}", staging_extension(content_type)))
        .tempfile_in(dir)?;
    staged.write_all(bytes)?;
    staged.flush()?;
    Ok(staged)
}

async fn edit_staged(
    editor: &NananaClient,
    staging_dir: &Path,
    attachment: &Attachment,
    bytes: &[u8],
    prompt: &str,
) -> Result<EditedImage, FlowError> {
    let content_type = attachment.content_type.as_deref().unwrap_or("image/jpeg");
    let staged = stage_upload(staging_dir, bytes, content_type)?;
    editor.edit_image(staged.path(), content_type, prompt).await
}

/// Host-agnostic ^editimg flow.
pub async fn handle_editimg(
    host: &dyn ChatHost,
    editor: &NananaClient,
    staging_dir: &Path,
    prefix: &str,
    prompt: &str,
) -> Result<(), HostError> {
    let (attachment, prompt) = match select_input(host.source_attachment(), prompt, prefix) {
        Ok(input) => input,
        Err(e) => {
            host.reply(&e.to_string()).await?;
            return Ok(());
        }
    };

    if let Err(e) = host.react('⏳').await {
        warn!("[EDITIMG] Could not add progress reaction: {}", e);
    }

    let bytes = match host.download(&attachment).await {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => {
            host.reply(DOWNLOAD_FAILED).await?;
            return Ok(());
        }
        Err(e) => {
            warn!("[EDITIMG] Attachment download failed: {}", e);
            host.reply(DOWNLOAD_FAILED).await?;
            return Ok(());
        }
    };

    match edit_staged(editor, staging_dir, &attachment, &bytes, prompt).await {
        Ok(edited) => {
            info!("[EDITIMG] Job {} finished: {}", edited.job_id, edited.image_url);
            host.send_media(OutgoingMedia {
                kind: MediaKind::Image,
                url: edited.image_url,
                caption: SUCCESS_CAPTION.to_string(),
                filename: None,
            })
            .await?;
        }
        Err(e) => {
            error!("[EDITIMG] Edit failed: {}", e);
            host.reply(&format!("❌ Failed to edit image: {}", e)).await?;
        }
    }

    Ok(())
}
