// session.rs - Per-invocation authenticated header set
// A Session is built once by the auth bootstrapper and then handed by
// reference to every authenticated call of the same flow. It is never stored
// anywhere process-wide.

use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};

pub const USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 10)";
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
pub const FINGERPRINT_HEADER: &str = "x-fp-id";

#[derive(Debug, Clone)]
pub struct Session {
    headers: HeaderMap,
}

impl Session {
    /// Base headers + captured cookie + a freshly generated fingerprint.
    pub fn new(base: HeaderMap, cookie: &str) -> Self {
        let mut headers = base;
        if let Ok(value) = HeaderValue::from_str(cookie) {
            headers.insert(COOKIE, value);
        }
        if let Ok(value) = HeaderValue::from_str(&generate_fingerprint()) {
            headers.insert(HeaderName::from_static(FINGERPRINT_HEADER), value);
        }
        Self { headers }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn cookie(&self) -> Option<&str> {
        self.headers.get(COOKIE).and_then(|v| v.to_str().ok())
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.headers.get(FINGERPRINT_HEADER).and_then(|v| v.to_str().ok())
    }
}

/// Browser-like headers the image editor expects on every call.
pub fn base_headers(origin: &str) -> HeaderMap {
    let origin = origin.trim_end_matches('/');
    let mut headers = HeaderMap::new();
    headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
    headers.insert(reqwest::header::ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE));
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(reqwest::header::ORIGIN, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{}/en", origin)) {
        headers.insert(reqwest::header::REFERER, value);
    }
    headers
}

/// Keep only the `name=value` part of each Set-Cookie line.
pub fn join_set_cookies<'a, I>(set_cookies: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    set_cookies
        .into_iter()
        .filter_map(|c| c.split(';').next())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Opaque fingerprint token: base64 of `<32 hex>.<64 hex>`.
pub fn generate_fingerprint() -> String {
    let mut rng = rand::thread_rng();
    let mut p1 = [0u8; 16];
    let mut p2 = [0u8; 32];
    rng.fill_bytes(&mut p1);
    rng.fill_bytes(&mut p2);
    general_purpose::STANDARD.encode(format!("{}.{}", hex::encode(p1), hex::encode(p2)))
}

/// Random local part for a disposable mailbox (12 hex chars).
pub fn random_local_part() -> String {
    let mut bytes = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_shape() {
        let fp = generate_fingerprint();
        let decoded = general_purpose::STANDARD.decode(&fp).unwrap();
        let decoded = String::from_utf8(decoded).unwrap();
        let (p1, p2) = decoded.split_once('.').unwrap();
        assert_eq!(p1.len(), 32);
        assert_eq!(p2.len(), 64);
        assert!(p1.chars().chain(p2.chars()).all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprints_differ() {
        assert_ne!(generate_fingerprint(), generate_fingerprint());
    }

    #[test]
    fn test_join_set_cookies_strips_attributes() {
        let joined = join_set_cookies(vec![
            "session_token=abc123; Path=/; HttpOnly",
            "session_data=xyz; Max-Age=3600",
        ]);
        assert_eq!(joined, "session_token=abc123; session_data=xyz");
        assert_eq!(join_set_cookies(Vec::<&str>::new()), "");
    }

    #[test]
    fn test_session_headers() {
        let session = Session::new(base_headers("https://nanana.app/"), "a=1; b=2");
        assert_eq!(session.cookie(), Some("a=1; b=2"));
        assert!(session.fingerprint().is_some());
        let headers = session.headers();
        assert_eq!(headers.get("origin").unwrap(), "https://nanana.app");
        assert_eq!(headers.get("referer").unwrap(), "https://nanana.app/en");
        assert_eq!(headers.get("user-agent").unwrap(), USER_AGENT);
    }

    #[test]
    fn test_random_local_part() {
        let local = random_local_part();
        assert_eq!(local.len(), 12);
        assert!(local.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
