// ABOUTME: Monitored-site catalog: data model, compiled form, builtin loader and the ordered registry.
// ABOUTME: SiteRegistry preserves catalog order, which is also the run order.

pub mod catalog;
pub mod compiled;
pub mod loader;

use std::collections::HashSet;

use crate::error::CatalogError;
use crate::sites::catalog::SiteSpec;
use crate::sites::compiled::CompiledSite;

/// Ordered collection of compiled sites.
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    sites: Vec<CompiledSite>,
}

impl SiteRegistry {
    /// Compiles `specs`, rejecting duplicate ids.
    pub fn from_specs(specs: Vec<SiteSpec>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        let mut sites = Vec::with_capacity(specs.len());
        for spec in specs {
            if !seen.insert(spec.id.clone()) {
                return Err(CatalogError::Duplicate(spec.id));
            }
            sites.push(CompiledSite::compile(spec)?);
        }
        Ok(Self { sites })
    }

    pub fn get(&self, id: &str) -> Option<&CompiledSite> {
        self.sites.iter().find(|s| s.id() == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CompiledSite> {
        self.sites.iter()
    }

    /// Keeps only the listed ids, in catalog order. Unknown ids are returned.
    pub fn retain_ids(&mut self, ids: &[String]) -> Vec<String> {
        let unknown = ids
            .iter()
            .filter(|id| self.get(id).is_none())
            .cloned()
            .collect();
        self.sites.retain(|s| ids.iter().any(|id| id == s.id()));
        unknown
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
