// ABOUTME: Compiled form of a SiteSpec: regexes and base URLs are parsed once at catalog load.
// ABOUTME: LinkFilter applies a site's allow and deny patterns to resolved URLs.

use regex::Regex;
use url::Url;

use crate::error::CatalogError;
use crate::item::KeyRule;
use crate::sites::catalog::{
    BannerSpec, ClickThroughSpec, HoverMenuSpec, HttpScanSpec, KeySpec, ListAnchorSpec, SiteSpec,
    Strategy,
};

/// Allow-list and deny-list patterns applied to absolute URLs.
#[derive(Debug, Clone)]
pub struct LinkFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl LinkFilter {
    /// A link passes if it matches any include pattern (or there are none)
    /// and no exclude pattern.
    pub fn accepts(&self, url: &str) -> bool {
        let allowed = self.include.is_empty() || self.include.iter().any(|re| re.is_match(url));
        allowed && !self.exclude.iter().any(|re| re.is_match(url))
    }
}

#[derive(Debug, Clone)]
pub struct CompiledList {
    pub spec: ListAnchorSpec,
    pub base: Url,
    pub filter: LinkFilter,
}

#[derive(Debug, Clone)]
pub struct CompiledBanner {
    pub spec: BannerSpec,
    pub base: Url,
    pub filter: LinkFilter,
}

#[derive(Debug, Clone)]
pub struct CompiledClick {
    pub spec: ClickThroughSpec,
    pub detail: Regex,
}

#[derive(Debug, Clone)]
pub struct CompiledScan {
    pub spec: HttpScanSpec,
    pub id: Regex,
    pub fallback: Option<CompiledList>,
}

#[derive(Debug, Clone)]
pub struct CompiledHover {
    pub spec: HoverMenuSpec,
    pub base: Url,
    pub detail: Regex,
}

#[derive(Debug, Clone)]
pub enum CompiledStrategy {
    ListAnchor(CompiledList),
    Banner(CompiledBanner),
    ClickThrough(CompiledClick),
    HttpScan(CompiledScan),
    HoverMenu(CompiledHover),
}

/// A site ready to extract.
#[derive(Debug, Clone)]
pub struct CompiledSite {
    pub spec: SiteSpec,
    pub key: KeyRule,
    pub strategy: CompiledStrategy,
}

impl CompiledSite {
    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn compile(spec: SiteSpec) -> Result<Self, CatalogError> {
        let site = spec.id.as_str();
        let key = match &spec.key {
            KeySpec::Url => KeyRule::Url,
            KeySpec::UrlWithoutQuery => KeyRule::UrlWithoutQuery,
            KeySpec::Capture { pattern } => KeyRule::Capture(compile_pattern(site, pattern)?),
        };
        let strategy = match &spec.strategy {
            Strategy::ListAnchor(list) => CompiledStrategy::ListAnchor(compile_list(site, list)?),
            Strategy::Banner(banner) => CompiledStrategy::Banner(CompiledBanner {
                spec: banner.clone(),
                base: parse_url(site, &banner.home_url)?,
                filter: compile_filter(site, &banner.include, &banner.exclude)?,
            }),
            Strategy::ClickThrough(click) => CompiledStrategy::ClickThrough(CompiledClick {
                spec: click.clone(),
                detail: compile_pattern(site, &click.detail_pattern)?,
            }),
            Strategy::HttpScan(scan) => CompiledStrategy::HttpScan(CompiledScan {
                spec: scan.clone(),
                id: compile_pattern(site, &scan.id_pattern)?,
                fallback: scan
                    .fallback
                    .as_ref()
                    .map(|list| compile_list(site, list))
                    .transpose()?,
            }),
            Strategy::HoverMenu(hover) => CompiledStrategy::HoverMenu(CompiledHover {
                spec: hover.clone(),
                base: parse_url(site, &hover.home_url)?,
                detail: compile_pattern(site, &hover.detail_pattern)?,
            }),
        };
        Ok(Self {
            spec,
            key,
            strategy,
        })
    }
}

fn compile_pattern(site: &str, pattern: &str) -> Result<Regex, CatalogError> {
    Regex::new(pattern).map_err(|source| CatalogError::Pattern {
        site: site.to_string(),
        pattern: pattern.to_string(),
        source,
    })
}

fn compile_filter(site: &str, include: &[String], exclude: &[String]) -> Result<LinkFilter, CatalogError> {
    Ok(LinkFilter {
        include: include
            .iter()
            .map(|p| compile_pattern(site, p))
            .collect::<Result<_, _>>()?,
        exclude: exclude
            .iter()
            .map(|p| compile_pattern(site, p))
            .collect::<Result<_, _>>()?,
    })
}

fn parse_url(site: &str, url: &str) -> Result<Url, CatalogError> {
    Url::parse(url).map_err(|_| CatalogError::Url {
        site: site.to_string(),
        url: url.to_string(),
    })
}

fn compile_list(site: &str, list: &ListAnchorSpec) -> Result<CompiledList, CatalogError> {
    let base = parse_url(site, list.base.as_deref().unwrap_or(&list.list_url))?;
    Ok(CompiledList {
        spec: list.clone(),
        base,
        filter: compile_filter(site, &list.include, &list.exclude)?,
    })
}
