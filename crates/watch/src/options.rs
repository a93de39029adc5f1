// ABOUTME: Run configuration for promo-watch: Timeouts, Config and the fluent ConfigBuilder.
// ABOUTME: Config::from_env reads webhook URLs, run URL and the silent-init flag once at start-up.

use std::path::PathBuf;
use std::time::Duration;

/// Default browser-like user agent; several monitored shops serve a stripped page to unknown agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Wait budgets for page interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Full navigation (`goto`, `go_back`).
    pub navigation: Duration,
    /// Discrete actions such as hover or selector waits.
    pub action: Duration,
    /// Waiting for a click to route to a detail URL.
    pub click: Duration,
    /// Fixed pause after navigation so client-side rendering can finish.
    pub settle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(35),
            action: Duration::from_secs(25),
            click: Duration::from_secs(12),
            settle: Duration::from_millis(1200),
        }
    }
}

/// Configuration for a single run.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_file: PathBuf,
    pub debug_dir: PathBuf,
    /// Production channel: one message per newly discovered item.
    pub prod_webhook: Option<String>,
    /// Test channel: aggregated warnings when new debug artifacts appear.
    pub test_webhook: Option<String>,
    /// Appended to warning messages for traceability (e.g. the CI run page).
    pub run_url: Option<String>,
    pub silent_init: bool,
    pub max_notify_per_site: usize,
    pub timeouts: Timeouts,
    pub user_agent: String,
    pub proxy: Option<String>,
    /// Log messages instead of posting them.
    pub dry_run: bool,
    /// Site that owns a seen-state file in the oldest flat-list format.
    pub legacy_site: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("state/seen.json"),
            debug_dir: PathBuf::from("debug"),
            prod_webhook: None,
            test_webhook: None,
            run_url: None,
            silent_init: false,
            max_notify_per_site: 20,
            timeouts: Timeouts::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            dry_run: false,
            legacy_site: "olens".to_string(),
        }
    }
}

impl Config {
    /// Start a builder from the defaults.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Build a config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut builder = ConfigBuilder::new()
            .prod_webhook(get("SLACK_WEBHOOK_URL"))
            .test_webhook(get("SLACK_WEBHOOK_URL_TEST"))
            .run_url(get("GITHUB_RUN_URL"))
            .silent_init(get("SILENT_INIT").map(|v| parse_bool_flag(&v)).unwrap_or(false))
            .proxy(get("PROMO_PROXY_URL"));

        if let Some(path) = get("STATE_FILE") {
            builder = builder.state_file(path);
        }
        if let Some(dir) = get("DEBUG_DIR") {
            builder = builder.debug_dir(dir);
        }
        if let Some(raw) = get("MAX_NOTIFY_PER_SITE") {
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => builder = builder.max_notify_per_site(n),
                _ => tracing::warn!(
                    value = %raw,
                    "ignoring MAX_NOTIFY_PER_SITE, expected a positive integer"
                ),
            }
        }
        builder.build()
    }
}

/// Interpret a boolean-like environment value.
pub fn parse_bool_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.state_file = path.into();
        self
    }

    pub fn debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.debug_dir = dir.into();
        self
    }

    pub fn prod_webhook(mut self, url: Option<String>) -> Self {
        self.config.prod_webhook = url;
        self
    }

    pub fn test_webhook(mut self, url: Option<String>) -> Self {
        self.config.test_webhook = url;
        self
    }

    pub fn run_url(mut self, url: Option<String>) -> Self {
        self.config.run_url = url;
        self
    }

    pub fn silent_init(mut self, enabled: bool) -> Self {
        self.config.silent_init = enabled;
        self
    }

    pub fn max_notify_per_site(mut self, n: usize) -> Self {
        self.config.max_notify_per_site = n;
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn proxy(mut self, proxy: Option<String>) -> Self {
        self.config.proxy = proxy;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn legacy_site(mut self, site: impl Into<String>) -> Self {
        self.config.legacy_site = site.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
