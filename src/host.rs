// host.rs - Chat Host Collaborator
// The command flows only talk to the chat platform through `ChatHost`:
// find the source attachment, download it, reply, react and send media.
// `DiscordHost` is the serenity implementation; tests use an in-memory fake.

use crate::error::HostError;
use async_trait::async_trait;
use log::debug;
use serenity::{client::Context, model::channel::Message};

/// An attachment on the replied-to or current message.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: Option<String>,
    pub url: String,
}

impl Attachment {
    /// Judged only by the declared content type, never the file name.
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// A remote file to deliver to the chat, with a caption.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMedia {
    pub kind: MediaKind,
    pub url: String,
    pub caption: String,
    pub filename: Option<String>,
}

#[async_trait]
pub trait ChatHost: Send + Sync {
    /// Attachment of the quoted message if there is one, else of the current message.
    fn source_attachment(&self) -> Option<Attachment>;

    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>, HostError>;

    async fn reply(&self, text: &str) -> Result<(), HostError>;

    async fn react(&self, emoji: char) -> Result<(), HostError>;

    async fn send_media(&self, media: OutgoingMedia) -> Result<(), HostError>;
}

// ============================================================================
// SERENITY ADAPTER
// ============================================================================

pub struct DiscordHost<'a> {
    ctx: &'a Context,
    msg: &'a Message,
}

impl<'a> DiscordHost<'a> {
    pub fn new(ctx: &'a Context, msg: &'a Message) -> Self {
        Self { ctx, msg }
    }

    fn candidate_attachments(&self) -> impl Iterator<Item = &serenity::model::channel::Attachment> {
        self.msg
            .referenced_message
            .iter()
            .flat_map(|referenced| referenced.attachments.iter())
            .chain(self.msg.attachments.iter())
    }
}

fn to_attachment(a: &serenity::model::channel::Attachment) -> Attachment {
    Attachment {
        filename: a.filename.clone(),
        content_type: a.content_type.clone(),
        url: a.url.clone(),
    }
}

#[async_trait]
impl<'a> ChatHost for DiscordHost<'a> {
    fn source_attachment(&self) -> Option<Attachment> {
        match &self.msg.referenced_message {
            Some(referenced) => referenced.attachments.first().map(to_attachment),
            None => self.msg.attachments.first().map(to_attachment),
        }
    }

    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>, HostError> {
        let source = self
            .candidate_attachments()
            .find(|a| a.url == attachment.url)
            .ok_or_else(|| HostError::Other(format!("attachment {} is not part of this message", attachment.filename)))?;

        debug!("[HOST] Downloading {} ({} bytes)", source.filename, source.size);
        Ok(source.download().await?)
    }

    async fn reply(&self, text: &str) -> Result<(), HostError> {
        self.msg.reply(self.ctx, text).await?;
        Ok(())
    }

    async fn react(&self, emoji: char) -> Result<(), HostError> {
        self.msg.react(self.ctx, emoji).await?;
        Ok(())
    }

    async fn send_media(&self, media: OutgoingMedia) -> Result<(), HostError> {
        let msg = self.msg;
        msg.channel_id
            .send_message(&self.ctx.http, |m| {
                m.reference_message(msg);
                m.embed(|e| {
                    e.description(&media.caption);
                    e.color(0x7289DA);
                    match media.kind {
                        MediaKind::Image => {
                            e.image(&media.url);
                        }
                        // Videos go out as a link; the derived filename is shown as the title
                        MediaKind::Video => {
                            e.title(link_title(&media));
                            e.url(&media.url);
                        }
                    }
                    e.footer(|f| f.text(format!("Requested by {}", msg.author.name)));
                    e
                });
                m
            })
            .await?;
        Ok(())
    }
}

/// Title of the embed that links to a video download.
pub fn link_title(media: &OutgoingMedia) -> &str {
    media.filename.as_deref().unwrap_or("Download")
}
