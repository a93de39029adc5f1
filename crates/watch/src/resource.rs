// ABOUTME: Blocking HTTP fetcher used by the static driver and the HTTP scan strategy.
// ABOUTME: Enforces a body size limit, decodes charsets and can retry once through a proxy.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::FetchError;
use crate::options::Config;

/// Maximum allowed content length (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

/// Per-request fetch behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Return the body of non-2xx responses instead of a `Status` error.
    pub parse_non_2xx: bool,
}

/// Result of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchResult {
    /// Decode the body using the charset from content-type, or detection.
    pub fn text(&self) -> String {
        decode_body(&self.body, self.content_type.as_deref())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP GET client with an optional proxy fallback.
#[derive(Debug, Clone)]
pub struct Fetcher {
    direct: Client,
    proxied: Option<Client>,
}

impl Fetcher {
    /// Build a fetcher from the run configuration. An unusable proxy URL is
    /// logged and ignored.
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let direct = build_client(&config.user_agent, config.timeouts.navigation, None)?;
        let proxied = match config.proxy.as_deref() {
            Some(proxy_url) => match build_client(
                &config.user_agent,
                config.timeouts.navigation,
                Some(proxy_url),
            ) {
                Ok(c) => Some(c),
                Err(e) => {
                    tracing::warn!(proxy = proxy_url, error = %e, "ignoring unusable proxy");
                    None
                }
            },
            None => None,
        };
        Ok(Self { direct, proxied })
    }

    /// GET `url`. Non-2xx statuses are errors.
    pub fn get(&self, url: &str) -> Result<FetchResult, FetchError> {
        self.get_with(url, FetchOptions::default())
    }

    /// GET `url` for rendering: non-2xx responses still return their markup,
    /// since some shops serve a working app shell with a 404 status.
    pub fn get_page(&self, url: &str) -> Result<FetchResult, FetchError> {
        self.get_with(
            url,
            FetchOptions {
                parse_non_2xx: true,
            },
        )
    }

    fn get_with(&self, url: &str, opts: FetchOptions) -> Result<FetchResult, FetchError> {
        let direct = fetch(&self.direct, url, opts);
        let Some(proxied) = &self.proxied else {
            return direct;
        };
        let retry = match &direct {
            Ok(res) => !res.is_success(),
            Err(FetchError::Request { .. } | FetchError::Status { .. }) => true,
            Err(_) => false,
        };
        if !retry {
            return direct;
        }
        tracing::info!(url, "direct fetch failed, retrying through proxy");
        match (fetch(proxied, url, opts), direct) {
            (Ok(res), _) if res.is_success() => Ok(res),
            // Neither path produced a 2xx; keep the direct answer if there is one.
            (proxy_res, Ok(res)) => {
                if let Err(e) = proxy_res {
                    tracing::debug!(url, error = %e, "proxy fetch failed");
                }
                Ok(res)
            }
            (proxy_res, Err(_)) => proxy_res,
        }
    }

    /// GET `url` and decode the body to text.
    pub fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.get(url).map(|r| r.text())
    }
}

fn build_client(
    user_agent: &str,
    timeout: Duration,
    proxy: Option<&str>,
) -> Result<Client, FetchError> {
    let mut builder = Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .gzip(true)
        .brotli(true)
        .deflate(true);
    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| FetchError::Request {
            url: proxy_url.to_string(),
            source: e,
        })?;
        builder = builder.proxy(proxy);
    }
    builder.build().map_err(|e| FetchError::Request {
        url: String::new(),
        source: e,
    })
}

/// Fetch a resource with a blocking client.
pub fn fetch(client: &Client, url: &str, opts: FetchOptions) -> Result<FetchResult, FetchError> {
    let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(FetchError::InvalidUrl {
            url: url.to_string(),
            reason: "scheme must be http or https".to_string(),
        });
    }

    let response = client.get(url).send().map_err(|e| FetchError::Request {
        url: url.to_string(),
        source: e,
    })?;

    if let Some(len) = response.content_length() {
        if len as usize > MAX_CONTENT_LENGTH {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
            });
        }
    }

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase());

    if !response.status().is_success() && !opts.parse_non_2xx {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = response.bytes().map_err(|e| FetchError::Request {
        url: url.to_string(),
        source: e,
    })?;
    if body.len() > MAX_CONTENT_LENGTH {
        return Err(FetchError::TooLarge {
            url: url.to_string(),
        });
    }

    Ok(FetchResult {
        status,
        url: url.to_string(),
        final_url,
        content_type,
        body: body.to_vec(),
    })
}

/// Decode body bytes using the content-type charset, falling back to detection.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(ct) = content_type {
        if let Some(charset) = extract_charset(ct) {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(body);
                return decoded.into_owned();
            }
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract the charset value from a Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    let lower = content_type.to_lowercase();
    for part in lower.split(';') {
        let trimmed = part.trim();
        if let Some(charset) = trimmed.strip_prefix("charset=") {
            let charset = charset.trim_matches('"').trim_matches('\'');
            return Some(charset.to_string());
        }
    }
    None
}
