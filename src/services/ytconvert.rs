// ytconvert.rs - YouTube to MP4 Conversion Client (ytconvert.org)
// Validates the requested quality, looks up public video metadata through
// oEmbed, submits the conversion (primary host, then one fallback host) and
// polls the returned status URL until the download link is ready.
//
// Used by: commands/ytmp4.rs

use crate::error::FlowError;
use crate::poller::{poll_until_done, JobStatus, PollPolicy};
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// QUALITY SELECTOR
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    P144,
    P240,
    P360,
    P480,
    #[default]
    P720,
    P1080,
}

impl Quality {
    pub const ALL: [Quality; 6] = [
        Quality::P144,
        Quality::P240,
        Quality::P360,
        Quality::P480,
        Quality::P720,
        Quality::P1080,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::P144 => "144p",
            Quality::P240 => "240p",
            Quality::P360 => "360p",
            Quality::P480 => "480p",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
        }
    }

    /// Comma separated list of every accepted value.
    pub fn choices() -> String {
        Quality::ALL.iter().map(|q| q.as_str()).collect::<Vec<_>>().join(", ")
    }

    /// Parse an optional selector, falling back to 720p when absent.
    pub fn from_arg(arg: Option<&str>) -> Result<Self, FlowError> {
        match arg {
            Some(value) => value.parse(),
            None => Ok(Quality::default()),
        }
    }
}

impl FromStr for Quality {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quality::ALL
            .iter()
            .copied()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| FlowError::InvalidOption(format!("Invalid quality. Choose: {}", Quality::choices())))
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RESPONSE TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub title: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedVideo {
    pub title: String,
    pub author: String,
    pub quality: Quality,
    pub download_url: String,
    pub filename: String,
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: Option<String>,
    author_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadInit {
    status_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    status: Option<String>,
    message: Option<String>,
    download_url: Option<String>,
}

impl StatusResponse {
    fn into_status(self) -> Result<JobStatus<String>, FlowError> {
        match self.status.as_deref() {
            Some("completed") => match self.download_url.filter(|u| !u.is_empty()) {
                Some(url) => Ok(JobStatus::Completed(url)),
                None => Err(FlowError::upstream("Conversion completed without a download URL")),
            },
            Some("failed") => Ok(JobStatus::Failed(
                self.message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "Conversion failed".to_string()),
            )),
            _ => Ok(JobStatus::Pending),
        }
    }
}

// ============================================================================
// CLIENT
// ============================================================================

fn converter_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0 (Android)"));
    headers.insert(REFERER, HeaderValue::from_static("https://ytmp3.gg/"));
    headers
}

pub struct YtConvertClient {
    http: Client,
    primary_url: String,
    fallback_url: String,
    oembed_url: String,
    policy: PollPolicy,
}

impl YtConvertClient {
    pub fn new(http: Client, primary_url: &str, fallback_url: &str, oembed_url: &str, policy: PollPolicy) -> Self {
        Self {
            http,
            primary_url: primary_url.to_string(),
            fallback_url: fallback_url.to_string(),
            oembed_url: oembed_url.to_string(),
            policy,
        }
    }

    pub async fn fetch_metadata(&self, video_url: &str) -> Result<VideoMetadata, FlowError> {
        let meta: OEmbedResponse = self
            .http
            .get(&self.oembed_url)
            .query(&[("url", video_url), ("format", "json")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(VideoMetadata {
            title: meta.title.unwrap_or_else(|| "video".to_string()),
            author: meta.author_name.unwrap_or_else(|| "Unknown".to_string()),
        })
    }

    async fn post_download(&self, endpoint: &str, payload: &serde_json::Value) -> Result<DownloadInit, FlowError> {
        let init = self
            .http
            .post(endpoint)
            .headers(converter_headers())
            .json(payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(init)
    }

    /// Submit the conversion and return the status URL to poll.
    /// The fallback host is tried once, and only if the primary call fails.
    pub async fn submit(&self, video_url: &str, quality: Quality) -> Result<String, FlowError> {
        let payload = json!({
            "url": video_url,
            "os": "android",
            "output": {
                "type": "video",
                "format": "mp4",
                "quality": quality.as_str(),
            }
        });

        let init = match self.post_download(&self.primary_url, &payload).await {
            Ok(init) => init,
            Err(e) => {
                warn!("[YTMP4] Primary converter failed ({}), trying fallback host", e);
                self.post_download(&self.fallback_url, &payload).await?
            }
        };

        init.status_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| FlowError::upstream("Converter failed to respond"))
    }

    pub async fn check_status(&self, status_url: &str) -> Result<JobStatus<String>, FlowError> {
        let response: StatusResponse = self
            .http
            .get(status_url)
            .headers(converter_headers())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("[YTMP4] Status {:?}", response.status);
        response.into_status()
    }

    pub async fn convert(&self, video_url: &str, quality: Quality) -> Result<ConvertedVideo, FlowError> {
        let meta = self.fetch_metadata(video_url).await?;
        info!("[YTMP4] Converting '{}' by {} at {}", meta.title, meta.author, quality);

        let status_url = self.submit(video_url, quality).await?;
        debug!("[YTMP4] Polling {}", status_url);

        let status_url = status_url.as_str();
        let download_url = poll_until_done("Conversion", &self.policy, |_| self.check_status(status_url)).await?;

        Ok(ConvertedVideo {
            filename: video_filename(&meta.title),
            title: meta.title,
            author: meta.author,
            quality,
            download_url,
        })
    }
}

/// Keep word characters, whitespace and hyphens, then append `.mp4`.
pub fn video_filename(title: &str) -> String {
    let stem: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    format!("{}.mp4", stem)
}
