// config.rs - Bot and Service Configuration
// Reads botconfig.txt (KEY=VALUE lines) from the usual locations and turns it
// into a BotConfig. Everything except DISCORD_TOKEN has a default, so a
// minimal config file only needs the token.

use crate::poller::PollPolicy;
use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::time::Duration;

const CONFIG_PATHS: [&str; 4] = [
    "botconfig.txt",
    "../botconfig.txt",
    "../../botconfig.txt",
    "src/botconfig.txt",
];

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    pub prefix: String,
    pub services: ServiceConfig,
}

/// Endpoints, timeouts and poll policies shared read-only by every request.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub http_timeout: Duration,
    pub nanana_base_url: String,
    pub akunlama_base_url: String,
    pub mail_domain: String,
    pub ytconvert_primary_url: String,
    pub ytconvert_fallback_url: String,
    pub oembed_url: String,
    pub editimg_poll: PollPolicy,
    pub ytmp4_poll: PollPolicy,
    pub otp_poll: PollPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(60),
            nanana_base_url: "https://nanana.app".to_string(),
            akunlama_base_url: "https://akunlama.com".to_string(),
            mail_domain: "akunlama.com".to_string(),
            ytconvert_primary_url: "https://hub.ytconvert.org/api/download".to_string(),
            ytconvert_fallback_url: "https://api.ytconvert.org/api/download".to_string(),
            oembed_url: "https://www.youtube.com/oembed".to_string(),
            editimg_poll: PollPolicy::fixed(Duration::from_secs(5), 30).delay_first(),
            ytmp4_poll: PollPolicy::fixed(Duration::from_secs(2), 150)
                .with_deadline(Duration::from_secs(600)),
            otp_poll: PollPolicy::fixed(Duration::from_secs(3), 20),
        }
    }
}

/// Parse KEY=VALUE lines, skipping blanks and `#` comments. A leading BOM is ignored.
pub fn parse_config(content: &str) -> HashMap<String, String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut config = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(equals_pos) = line.find('=') {
            let key = line[..equals_pos].trim().to_string();
            let value = line[equals_pos + 1..].trim().to_string();
            config.insert(key, value);
        }
    }

    config
}

fn parse_secs(map: &HashMap<String, String>, key: &str) -> Result<Option<Duration>, String> {
    match map.get(key) {
        Some(v) => v
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| format!("{} must be a valid number of seconds", key)),
        None => Ok(None),
    }
}

fn parse_u32(map: &HashMap<String, String>, key: &str) -> Result<Option<u32>, String> {
    match map.get(key) {
        Some(v) => v
            .parse::<u32>()
            .map(Some)
            .map_err(|_| format!("{} must be a valid number", key)),
        None => Ok(None),
    }
}

fn apply_poll_overrides(
    policy: &mut PollPolicy,
    map: &HashMap<String, String>,
    interval_key: &str,
    attempts_key: &str,
) -> Result<(), String> {
    if let Some(interval) = parse_secs(map, interval_key)? {
        policy.interval = interval;
        policy.max_interval = policy.max_interval.max(interval);
    }
    if let Some(attempts) = parse_u32(map, attempts_key)? {
        policy.max_attempts = attempts;
    }
    Ok(())
}

impl ServiceConfig {
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, String> {
        let mut config = ServiceConfig::default();

        if let Some(timeout) = parse_secs(map, "HTTP_TIMEOUT_SECS")? {
            config.http_timeout = timeout;
        }

        let urls = [
            ("NANANA_BASE_URL", &mut config.nanana_base_url),
            ("AKUNLAMA_BASE_URL", &mut config.akunlama_base_url),
            ("MAIL_DOMAIN", &mut config.mail_domain),
            ("YTCONVERT_PRIMARY_URL", &mut config.ytconvert_primary_url),
            ("YTCONVERT_FALLBACK_URL", &mut config.ytconvert_fallback_url),
            ("OEMBED_URL", &mut config.oembed_url),
        ];
        for (key, slot) in urls {
            if let Some(value) = map.get(key).filter(|v| !v.is_empty()) {
                *slot = value.clone();
            }
        }

        apply_poll_overrides(&mut config.editimg_poll, map, "EDITIMG_POLL_INTERVAL_SECS", "EDITIMG_MAX_ATTEMPTS")?;
        apply_poll_overrides(&mut config.ytmp4_poll, map, "YTMP4_POLL_INTERVAL_SECS", "YTMP4_MAX_ATTEMPTS")?;
        apply_poll_overrides(&mut config.otp_poll, map, "OTP_POLL_INTERVAL_SECS", "OTP_MAX_ATTEMPTS")?;

        if let Some(deadline) = parse_secs(map, "YTMP4_DEADLINE_SECS")? {
            config.ytmp4_poll.deadline = Some(deadline);
        }
        if let Some(factor) = map.get("YTMP4_BACKOFF_FACTOR") {
            let factor = factor
                .parse::<f64>()
                .map_err(|_| "YTMP4_BACKOFF_FACTOR must be a valid number".to_string())?;
            if !factor.is_finite() {
                return Err("YTMP4_BACKOFF_FACTOR must be a finite number".to_string());
            }
            let cap = config.ytmp4_poll.interval * 5;
            config.ytmp4_poll = config.ytmp4_poll.clone().with_backoff(factor, cap);
        }

        Ok(config)
    }
}

impl BotConfig {
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, String> {
        let token = map
            .get("DISCORD_TOKEN")
            .cloned()
            .ok_or("DISCORD_TOKEN not found in botconfig.txt file")?;

        if token.is_empty() || token == "YOUR_BOT_TOKEN_HERE" {
            return Err("DISCORD_TOKEN in botconfig.txt is set to a placeholder value".to_string());
        }

        let prefix = map
            .get("PREFIX")
            .filter(|p| !p.is_empty())
            .cloned()
            .unwrap_or_else(|| "^".to_string());

        Ok(BotConfig {
            token,
            prefix,
            services: ServiceConfig::from_map(map)?,
        })
    }
}

/// Load botconfig.txt from the first location that exists.
pub fn load_bot_config() -> Result<BotConfig, String> {
    for config_path in &CONFIG_PATHS {
        match fs::read_to_string(config_path) {
            Ok(content) => {
                info!("✅ Configuration loaded from {}", config_path);
                let map = parse_config(&content);
                debug!("🔧 {} configuration keys found", map.len());
                return BotConfig::from_map(&map);
            }
            Err(_) => continue,
        }
    }

    Err("No botconfig.txt file found in any expected location (., .., ../.., src/)".to_string())
}
