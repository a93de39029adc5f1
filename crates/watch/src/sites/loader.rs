// ABOUTME: Loads the built-in site catalog from embedded JSON into a SiteRegistry.
// ABOUTME: Also parses caller-supplied catalogs with the same validation.

use crate::error::CatalogError;
use crate::sites::catalog::SiteSpec;
use crate::sites::SiteRegistry;

/// Embedded JSON describing every monitored site, in run order.
const BUILTIN_SITES_JSON: &str = include_str!("../../data/sites.json");

/// Parses a JSON array of [`SiteSpec`]s into a registry.
pub fn parse_registry(json: &str) -> Result<SiteRegistry, CatalogError> {
    let specs: Vec<SiteSpec> = serde_json::from_str(json)?;
    SiteRegistry::from_specs(specs)
}

/// Loads the builtin site registry.
///
/// # Panics
///
/// Panics if the embedded catalog is malformed; it is covered by tests.
pub fn load_builtin_registry() -> SiteRegistry {
    parse_registry(BUILTIN_SITES_JSON).expect("failed to parse builtin site catalog")
}
