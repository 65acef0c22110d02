// mailbox.rs - One-time code retrieval via a disposable mailbox
// The image editor signs users in with an emailed OTP. This module hides the
// mailbox behind `OneTimeCodeSource` so the auth flow can be exercised with a
// fake in tests, and provides the akunlama.com implementation used in
// production.
//
// Key Features:
// - Random disposable addresses at a fixed domain
// - Bounded inbox polling (shared poller)
// - Markup stripping and 6-digit code extraction

use crate::error::FlowError;
use crate::poller::{poll_until_done, JobStatus, PollPolicy};
use crate::session::random_local_part;
use async_trait::async_trait;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

static SCRIPT_STYLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<head\b.*?</head\s*>")
        .expect("Invalid script/style regex pattern")
});
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("Invalid tag regex pattern"));
static OTP_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{6}\b").expect("Invalid OTP regex pattern"));

/// Something that can hand out an address and later the code mailed to it.
#[async_trait]
pub trait OneTimeCodeSource: Send + Sync {
    fn new_address(&self) -> String;

    /// Wait until a code addressed to `address` arrives and return it.
    async fn request_code(&self, address: &str) -> Result<String, FlowError>;
}

#[derive(Debug, Clone, Deserialize)]
struct MailSummary {
    storage: Option<MailStorage>,
}

#[derive(Debug, Clone, Deserialize)]
struct MailStorage {
    key: String,
    region: String,
}

/// akunlama.com disposable inbox.
pub struct AkunlamaMailbox {
    http: Client,
    base_url: String,
    domain: String,
    policy: PollPolicy,
}

impl AkunlamaMailbox {
    pub fn new(http: Client, base_url: &str, domain: &str, policy: PollPolicy) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            domain: domain.to_string(),
            policy,
        }
    }

    async fn inbox(&self, recipient: &str) -> Result<Vec<MailSummary>, FlowError> {
        let url = format!("{}/api/v1/mail/list", self.base_url);
        let body: serde_json::Value = self
            .http
            .get(&url)
            .query(&[("recipient", recipient)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // anything other than a list means "nothing yet"
        match body {
            serde_json::Value::Array(items) => Ok(items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    async fn message_text(&self, region: &str, key: &str) -> Result<String, FlowError> {
        let url = format!("{}/api/v1/mail/getHtml", self.base_url);
        let html = self
            .http
            .get(&url)
            .query(&[("region", region), ("key", key)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(strip_markup(&html))
    }
}

#[async_trait]
impl OneTimeCodeSource for AkunlamaMailbox {
    fn new_address(&self) -> String {
        format!("{}@{}", random_local_part(), self.domain)
    }

    async fn request_code(&self, address: &str) -> Result<String, FlowError> {
        let recipient = address.split('@').next().unwrap_or(address);
        info!("[MAILBOX] Waiting for OTP mail to {}", recipient);

        let storage = poll_until_done("OTP", &self.policy, |attempt| async move {
            let mails = self.inbox(recipient).await?;
            debug!("[MAILBOX] Inbox check {}: {} message(s)", attempt, mails.len());
            match mails.into_iter().find_map(|m| m.storage) {
                Some(storage) => Ok(JobStatus::Completed(storage)),
                None => Ok(JobStatus::Pending),
            }
        })
        .await?;

        let text = self.message_text(&storage.region, &storage.key).await?;
        extract_code(&text).ok_or_else(|| FlowError::upstream("OTP not found"))
    }
}

/// Drop scripts, styles and tags, then collapse whitespace.
pub fn strip_markup(html: &str) -> String {
    let without_blocks = SCRIPT_STYLE_REGEX.replace_all(html, " ");
    let without_tags = TAG_REGEX.replace_all(&without_blocks, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First standalone 6-digit number in the text.
pub fn extract_code(text: &str) -> Option<String> {
    OTP_REGEX.find(text).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy(attempts: u32) -> PollPolicy {
        PollPolicy::fixed(Duration::from_millis(10), attempts)
    }

    #[test]
    fn test_strip_markup() {
        let html = r#"<html><head><title>Mail 999999</title><style>p{color:red}</style></head>
            <body><script>var x = "111111";</script><p>Your code is&nbsp;<b>482913</b></p></body></html>"#;
        assert_eq!(strip_markup(html), "Your code is 482913");
    }

    #[test]
    fn test_extract_code() {
        assert_eq!(extract_code("Your code is 482913. It expires soon."), Some("482913".to_string()));
        assert_eq!(extract_code("ref 1234567 and 12345"), None);
        assert_eq!(extract_code("no digits here"), None);
    }

    #[test]
    fn test_new_address_uses_domain() {
        let mailbox = AkunlamaMailbox::new(Client::new(), "http://localhost", "akunlama.com", fast_policy(1));
        let address = mailbox.new_address();
        let (local, domain) = address.split_once('@').unwrap();
        assert_eq!(local.len(), 12);
        assert_eq!(domain, "akunlama.com");
    }

    #[tokio::test]
    async fn test_request_code_waits_for_mail() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/mail/list"))
            .and(query_param("recipient", "abcdef012345"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/mail/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "storage": { "key": "k-1", "region": "us-east" } }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/mail/getHtml"))
            .and(query_param("region", "us-east"))
            .and(query_param("key", "k-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<body><p>Code: 604215</p></body>"))
            .expect(1)
            .mount(&server)
            .await;

        let mailbox = AkunlamaMailbox::new(Client::new(), &server.uri(), "akunlama.com", fast_policy(5));
        let code = mailbox.request_code("abcdef012345@akunlama.com").await.unwrap();
        assert_eq!(code, "604215");
    }

    #[tokio::test]
    async fn test_request_code_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/mail/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "error": "none" })))
            .expect(3)
            .mount(&server)
            .await;

        let mailbox = AkunlamaMailbox::new(Client::new(), &server.uri(), "akunlama.com", fast_policy(3));
        let err = mailbox.request_code("nobody@akunlama.com").await.unwrap_err();
        assert!(matches!(err, FlowError::UpstreamTimeout(_)));
        assert_eq!(err.to_string(), "OTP timeout");
    }

    #[tokio::test]
    async fn test_missing_code_in_mail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/mail/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "storage": { "key": "k", "region": "r" } }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/mail/getHtml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>Welcome aboard!</p>"))
            .mount(&server)
            .await;

        let mailbox = AkunlamaMailbox::new(Client::new(), &server.uri(), "akunlama.com", fast_policy(3));
        let err = mailbox.request_code("someone@akunlama.com").await.unwrap_err();
        assert_eq!(err.to_string(), "OTP not found");
    }
}
