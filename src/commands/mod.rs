// commands/mod.rs - Command Module Registry
// Declares the command modules and the shared TypeMap lookups they use.

pub mod editimg;        // AI image editing (nanana.app)
pub mod help;           // Help system and command documentation
pub mod ytmp4;          // YouTube to MP4 downloader (ytconvert.org)

use crate::services::{MediaServices, MediaServicesKey};
use serenity::client::Context;
use serenity::prelude::TypeMapKey;
use std::sync::Arc;

/// TypeMap key for the configured command prefix (used in usage guides)
pub struct CommandPrefix;
impl TypeMapKey for CommandPrefix {
    type Value = String;
}

pub async fn services_from(ctx: &Context) -> Option<Arc<MediaServices>> {
    let data = ctx.data.read().await;
    data.get::<MediaServicesKey>().cloned()
}

pub async fn prefix_from(ctx: &Context) -> String {
    let data = ctx.data.read().await;
    data.get::<CommandPrefix>().cloned().unwrap_or_else(|| "^".to_string())
}
