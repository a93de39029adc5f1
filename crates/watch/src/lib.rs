// ABOUTME: Core library for promo-watch: monitors shop event pages and reports newly posted promotions.
// ABOUTME: Provides site catalog, extractors, seen-state, debug capture, webhook notifier and the run loop.

pub mod browser;
pub mod debug;
pub mod error;
pub mod extract;
pub mod item;
pub mod notify;
pub mod options;
pub mod resource;
pub mod runner;
pub mod sites;
pub mod state;

pub use browser::{Anchor, Browser, Navigation, Page, StaticBrowser, StaticPage};
pub use debug::DebugCapture;
pub use error::{
    BrowserError, CatalogError, ExtractionFailure, FailureKind, FetchError, NotifyError,
    StateError,
};
pub use extract::{extract, ExtractContext, Extraction};
pub use item::{dedupe, Item, ItemList, KeyRule};
pub use notify::{Channel, Delivery, Notifier};
pub use options::{Config, ConfigBuilder, Timeouts};
pub use resource::Fetcher;
pub use runner::{RunReport, Runner, SiteOutcome};
pub use sites::loader::{load_builtin_registry, parse_registry};
pub use sites::SiteRegistry;
pub use state::SeenState;

#[cfg(feature = "headless")]
pub use browser::ChromeBrowser;
