// help.rs - Help Command Module
// Lists the media commands and how to call them

use crate::commands::{editimg::guide, prefix_from, ytmp4::usage};
use serenity::{
    client::Context,
    framework::standard::{macros::command, Args, CommandResult},
    model::channel::Message,
};

pub fn help_text(prefix: &str) -> String {
    format!(
        r#"**🤖 Meri Media Bot - Command Help**

**🖼️ Image Commands:**
• `{p}editimg <prompt>` - Edit the replied-to (or attached) image with AI

**🎬 Video Commands:**
• `{p}ytmp4 <url> [quality]` - Get an MP4 download link for a YouTube video

**📝 Other:**
• `{p}help` - Show this help message

Use `{p}help editimg` or `{p}help ytmp4` for details."#,
        p = prefix
    )
}

#[command]
#[aliases("h", "commands")]
/// Display help for all commands, or the guide for one
pub async fn help(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    let prefix = prefix_from(ctx).await;

    let text = match args.current().map(|s| s.trim_start_matches(&prefix).to_lowercase()) {
        Some(topic) if topic == "editimg" => guide(&prefix),
        Some(topic) if topic == "ytmp4" => usage(&prefix),
        _ => help_text(&prefix),
    };

    msg.reply(ctx, text).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_text_uses_prefix() {
        let text = help_text("!");
        assert!(text.contains("`!editimg <prompt>`"));
        assert!(text.contains("`!ytmp4 <url> [quality]`"));
        assert!(!text.contains('^'));
    }
}
