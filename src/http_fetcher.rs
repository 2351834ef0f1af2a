//! Blocking HTTP access used by every network-facing stage.

use std::io::Read;
use std::sync::OnceLock;
use std::time::Duration;

use log::debug;
use regex::Regex;
use serde_json::Value;

use crate::config::NetworkConfig;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const MAX_REDIRECTS: u32 = 5;

/// Network operations the resolution pipeline depends on.
///
/// Implementations never retry; one failed call is reported once and the
/// caller substitutes its fallback.
pub trait ListingFetcher: Send + Sync {
    fn fetch_text(&self, url: &str) -> Result<String, String>;
    fn fetch_json(&self, url: &str) -> Result<Value, String>;
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, String>;
    /// Server-declared download filename, read from response headers only.
    fn probe_filename(&self, url: &str) -> Result<Option<String>, String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HttpFailureKind {
    Timeout,
    Status(u16),
    Transport,
}

fn classify_ureq_failure(error: &ureq::Error) -> HttpFailureKind {
    match error {
        ureq::Error::Status(code, _) => HttpFailureKind::Status(*code),
        ureq::Error::Transport(transport) => {
            let lowered = transport.to_string().to_ascii_lowercase();
            if lowered.contains("timed out") || lowered.contains("timeout") {
                HttpFailureKind::Timeout
            } else {
                HttpFailureKind::Transport
            }
        }
    }
}

fn describe_failure(label: &str, url: &str, error: &ureq::Error) -> String {
    match classify_ureq_failure(error) {
        HttpFailureKind::Timeout => format!("{label} timed out ({url}): {error}"),
        HttpFailureKind::Status(code) => format!("{label} returned HTTP {code} ({url})"),
        HttpFailureKind::Transport => format!("{label} failed ({url}): {error}"),
    }
}

fn content_disposition_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)filename\*?=(?:UTF-8'')?"?([^";]+)"?"#)
            .expect("valid content-disposition pattern")
    })
}

/// Extracts the filename from a `Content-Disposition` header value.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let raw = content_disposition_pattern()
        .captures(header)?
        .get(1)?
        .as_str()
        .trim();
    if raw.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    Some(decoded)
}

/// Reads a whole page body with no size cap. Invalid UTF-8 is replaced
/// rather than failing the page.
fn read_text_body(mut reader: impl Read, url: &str) -> Result<String, String> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|error| format!("Failed to read page body ({url}): {error}"))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// `ListingFetcher` backed by one shared `ureq` agent.
pub struct UreqFetcher {
    http_client: ureq::Agent,
    user_agent: String,
}

impl UreqFetcher {
    /// Builds the agent from network settings.
    ///
    /// `proxy_url` is the externally supplied routing table; when absent the
    /// agent falls back to whatever the process environment declares.
    pub fn new(network: &NetworkConfig, proxy_url: Option<&str>) -> Result<Self, String> {
        let mut builder = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(network.timeout_secs))
            .redirects(MAX_REDIRECTS);
        builder = match proxy_url {
            Some(proxy_url) => {
                let proxy = ureq::Proxy::new(proxy_url)
                    .map_err(|error| format!("Invalid proxy '{proxy_url}': {error}"))?;
                builder.proxy(proxy)
            }
            None => builder.try_proxy_from_env(true),
        };
        Ok(Self {
            http_client: builder.build(),
            user_agent: network.user_agent.clone(),
        })
    }

    fn get(&self, url: &str, accept: &str, label: &str) -> Result<ureq::Response, String> {
        self.http_client
            .get(url)
            .set("User-Agent", &self.user_agent)
            .set("Accept", accept)
            .call()
            .map_err(|error| describe_failure(label, url, &error))
    }
}

impl ListingFetcher for UreqFetcher {
    fn fetch_text(&self, url: &str) -> Result<String, String> {
        let response = self.get(url, ACCEPT_HTML, "Page request")?;
        read_text_body(response.into_reader(), url)
    }

    fn fetch_json(&self, url: &str) -> Result<Value, String> {
        let response = self.get(url, "application/json", "API request")?;
        response
            .into_json::<Value>()
            .map_err(|error| format!("Invalid JSON response ({url}): {error}"))
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self.get(url, "image/*,*/*;q=0.8", "Image request")?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|error| format!("Image read failed ({url}): {error}"))?;
        if bytes.is_empty() {
            return Err(format!("Image response was empty ({url})"));
        }
        Ok(bytes)
    }

    fn probe_filename(&self, url: &str) -> Result<Option<String>, String> {
        let response = self
            .http_client
            .head(url)
            .set("User-Agent", &self.user_agent)
            .set("Accept", ACCEPT_HTML)
            .call()
            .map_err(|error| describe_failure("Filename probe", url, &error))?;
        let Some(header) = response.header("Content-Disposition") else {
            debug!("Filename probe: no Content-Disposition header for {url}");
            return Ok(None);
        };
        Ok(filename_from_content_disposition(header))
    }
}
