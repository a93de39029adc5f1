// ABOUTME: Error types for promo-watch including FailureKind, ExtractionFailure and the driver errors.
// ABOUTME: ExtractionFailure carries the site id so the run loop can name debug artifacts after it.

use std::fmt;
use std::time::Duration;

/// Categories of per-site extraction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Navigation,
    Timeout,
    Selector,
    Fetch,
    Browser,
}

impl FailureKind {
    /// Filename-safe slug used in debug artifact prefixes.
    pub fn slug(&self) -> &'static str {
        match self {
            FailureKind::Navigation => "navigation",
            FailureKind::Timeout => "timeout",
            FailureKind::Selector => "selector",
            FailureKind::Fetch => "fetch",
            FailureKind::Browser => "browser",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Navigation => "navigation error",
            FailureKind::Timeout => "timeout",
            FailureKind::Selector => "selector error",
            FailureKind::Fetch => "fetch error",
            FailureKind::Browser => "browser error",
        };
        write!(f, "{}", s)
    }
}

/// The error a site extractor hands back to the run loop.
#[derive(Debug, thiserror::Error)]
pub struct ExtractionFailure {
    pub kind: FailureKind,
    pub site: String,
    pub op: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "promo-watch: {} {}: {}", self.op, self.site, self.kind)?;
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl ExtractionFailure {
    fn with_kind(
        kind: FailureKind,
        site: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            kind,
            site: site.into(),
            op: op.into(),
            source,
        }
    }

    /// Create a Fetch failure.
    pub fn fetch(
        site: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_kind(FailureKind::Fetch, site, op, source)
    }

    /// Wrap a driver error, keeping its category.
    pub fn from_browser(site: impl Into<String>, op: impl Into<String>, err: BrowserError) -> Self {
        let kind = match &err {
            BrowserError::Timeout { .. } => FailureKind::Timeout,
            BrowserError::Navigation { .. } => FailureKind::Navigation,
            BrowserError::NoSuchElement { .. } => FailureKind::Selector,
            BrowserError::Fetch(_) => FailureKind::Fetch,
            BrowserError::Unsupported(_) | BrowserError::Driver(_) => FailureKind::Browser,
        };
        Self::with_kind(kind, site, op, Some(anyhow::Error::new(err)))
    }

    /// Prefix for debug artifacts written because of this failure.
    pub fn debug_prefix(&self) -> String {
        format!("{}_{}", self.site, self.kind.slug())
    }
}

/// Errors raised by a [`crate::browser::Page`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    #[error("no element #{index} for selector {selector:?}")]
    NoSuchElement { selector: String, index: usize },

    #[error("operation not supported by this driver: {0}")]
    Unsupported(&'static str),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Driver(#[from] anyhow::Error),
}

/// Errors from the blocking HTTP fetcher.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("response from {url} exceeds the size limit")]
    TooLarge { url: String },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Request { source, .. } if source.is_timeout())
    }
}

/// Errors from persisting seen-state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state file I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("state serialisation: {0}")]
    Json(#[from] serde_json::Error),

    #[error("state file replace: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Errors from webhook delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("webhook returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Errors from loading a site catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("site {site}: invalid pattern {pattern:?}: {source}")]
    Pattern {
        site: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("site {site}: invalid URL {url:?}")]
    Url { site: String, url: String },

    #[error("duplicate site id {0}")]
    Duplicate(String),
}
