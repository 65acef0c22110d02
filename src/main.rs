mod commands;
mod config;
mod error;
mod host;
mod mailbox;
mod poller;
mod services;
mod session;

use serenity::{
    async_trait,
    client::{Client, Context, EventHandler},
    framework::standard::{macros::group, StandardFramework},
    model::gateway::Ready,
    prelude::GatewayIntents,
};
use std::sync::Arc;
use tokio::signal;

use crate::commands::CommandPrefix;
use crate::services::{MediaServices, MediaServicesKey};

// Import all command constants generated by the #[command] macro
use crate::commands::editimg::EDITIMG_COMMAND;
use crate::commands::help::HELP_COMMAND;
use crate::commands::ytmp4::YTMP4_COMMAND;

// Command group declaration - includes all available commands
#[group]
#[commands(editimg, ytmp4, help)]
struct General;

// Event handler implementation
struct Handler;

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _: Context, ready: Ready) {
        log::info!("✅ Bot connected as {}! ({} guilds)", ready.user.name, ready.guilds.len());
    }
}

#[tokio::main]
async fn main() {
    // Initialize logger - must be done before any logging calls
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    log::info!("🚀 Meri Media Bot starting up...");

    let config = match config::load_bot_config() {
        Ok(config) => config,
        Err(error) => {
            log::error!("❌ Failed to load botconfig.txt: {}", error);
            eprintln!("Create a botconfig.txt file in the project root with: DISCORD_TOKEN=your_token_here and PREFIX=^");
            return;
        }
    };

    // Service clients share one HTTP client; nothing in them is mutated after this point
    let services = match MediaServices::from_config(&config.services) {
        Ok(services) => Arc::new(services),
        Err(e) => {
            log::error!("❌ Failed to build service clients: {}", e);
            return;
        }
    };

    log::info!("🤖 Starting bot with prefix: '{}'", config.prefix);

    let framework = StandardFramework::new()
        .configure(|c| {
            c.prefix(&config.prefix)
            .case_insensitivity(true)
            .no_dm_prefix(true)
            .with_whitespace(true)
        })
        .after(|_ctx, msg, command_name, result| Box::pin(async move {
            match result {
                Ok(()) => {
                    log::debug!("✅ Command '{}' executed successfully by user {} ({})",
                                command_name, msg.author.name, msg.author.id);
                },
                Err(e) => {
                    log::error!("❌ Command '{}' failed for user {} ({}): {:?}",
                               command_name, msg.author.name, msg.author.id, e);
                }
            }
        }))
        .unrecognised_command(|_ctx, msg, unrecognized_command_name| Box::pin(async move {
            log::debug!("❓ Unrecognized command '{}' attempted by user {} ({})",
                        unrecognized_command_name, msg.author.name, msg.author.id);
        }))
        .group(&GENERAL_GROUP);

    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = match Client::builder(&config.token, intents)
        .event_handler(Handler)
        .framework(framework)
        .await
    {
        Ok(client) => client,
        Err(e) => {
            log::error!("❌ Error creating Discord client: {:?}", e);
            eprintln!("Check your token in botconfig.txt file");
            return;
        }
    };

    {
        let mut data = client.data.write().await;
        data.insert::<MediaServicesKey>(services);
        data.insert::<CommandPrefix>(config.prefix.clone());
    }

    log::info!("🚀 Bot is running... press Ctrl+C to stop");
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("⏹️ Stopping bot gracefully...");
        }
        result = client.start() => {
            if let Err(why) = result {
                log::error!("❌ Client error: {:?}", why);
            }
        }
    }

    log::info!("👋 Bot shutdown complete");
}
