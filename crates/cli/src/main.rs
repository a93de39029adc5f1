// ABOUTME: CLI for promo-watch: one sequential pass over the site catalog per invocation.
// ABOUTME: Reads configuration from the environment (and .env), prints a per-site summary or JSON report.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use promo_watch::{
    load_builtin_registry, Browser, Config, Fetcher, Notifier, RunReport, Runner, SeenState,
    SiteRegistry, StaticBrowser,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Driver {
    /// Plain HTTP fetch and HTML parsing; no JavaScript.
    Static,
    /// Headless Chromium (requires the `headless` feature).
    Chrome,
}

fn default_driver() -> Driver {
    if cfg!(feature = "headless") {
        Driver::Chrome
    } else {
        Driver::Static
    }
}

/// Watch shop event pages and post newly discovered promotions to a webhook.
#[derive(Parser, Debug)]
#[command(name = "promo-watch", version)]
#[command(about = "Watch shop event pages and notify on new promotions", long_about = None)]
struct Cli {
    /// Seen-state file (overrides STATE_FILE).
    #[arg(long)]
    state: Option<PathBuf>,

    /// Directory for debug artifacts (overrides DEBUG_DIR).
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    /// Seed empty sites without notifying (also SILENT_INIT=1).
    #[arg(long)]
    silent_init: bool,

    /// Log messages instead of posting them.
    #[arg(long)]
    dry_run: bool,

    /// Only run these site ids (repeatable).
    #[arg(long = "site", value_name = "ID")]
    sites: Vec<String>,

    /// Print the site catalog and exit.
    #[arg(long)]
    list_sites: bool,

    /// Page driver.
    #[arg(long, value_enum, default_value_t = default_driver())]
    driver: Driver,

    /// Print the run report as JSON.
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        Level::WARN
    } else {
        match cli.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut registry = load_builtin_registry();
    if !cli.sites.is_empty() {
        let unknown = registry.retain_ids(&cli.sites);
        if !unknown.is_empty() {
            bail!("unknown site id(s): {}", unknown.join(", "));
        }
    }

    if cli.list_sites {
        for site in registry.iter() {
            println!("{}\t{}\t{}", site.id(), site.name(), site.spec.strategy.name());
        }
        return Ok(());
    }

    let config = build_config(&cli);
    let report = match cli.driver {
        Driver::Static => {
            let browser = StaticBrowser::new(Fetcher::new(&config)?);
            run(config, registry, browser)?
        }
        Driver::Chrome => run_chrome(config, registry)?,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
    }
    // Site failures are reported, not turned into an exit code.
    Ok(())
}

fn build_config(cli: &Cli) -> Config {
    let mut config = Config::from_env();
    if let Some(state) = &cli.state {
        config.state_file = state.clone();
    }
    if let Some(dir) = &cli.debug_dir {
        config.debug_dir = dir.clone();
    }
    config.silent_init |= cli.silent_init;
    config.dry_run |= cli.dry_run;
    config
}

fn run<B: Browser>(config: Config, registry: SiteRegistry, browser: B) -> Result<RunReport> {
    let fetcher = Fetcher::new(&config)?;
    let notifier = Notifier::new(&config)?;
    let mut state = SeenState::load(&config.state_file, &config.legacy_site);
    tracing::info!(
        state = %config.state_file.display(),
        known_keys = state.total_keys(),
        silent_init = config.silent_init,
        dry_run = config.dry_run,
        "starting run"
    );
    let runner = Runner::new(config, registry, browser, fetcher, notifier);
    Ok(runner.run(&mut state))
}

#[cfg(feature = "headless")]
fn run_chrome(config: Config, registry: SiteRegistry) -> Result<RunReport> {
    let browser = promo_watch::ChromeBrowser::launch(&config)?;
    run(config, registry, browser)
}

#[cfg(not(feature = "headless"))]
fn run_chrome(_config: Config, _registry: SiteRegistry) -> Result<RunReport> {
    bail!("the chrome driver needs a build with `--features headless`")
}
