//! Title resolver (§4.1): `resolve(query) -> (site, slug) | None`. Holds one
//! read-mostly `SiteIndex` per configured site behind an `RwLock`, refreshed
//! wholesale and swapped atomically so a reader never observes a half-built
//! index.

pub mod index;
pub mod scoring;

use anyhow::Result;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::debug;

use crate::catalog::{self, adapter_for};
use crate::constants::{cache::INDEX_REFRESH_HOURS, scoring::CONFIDENCE_FLOOR};
use crate::domain::Site;
use index::SiteIndex;

pub struct Resolver {
    client: reqwest::Client,
    sites_in_priority_order: Vec<Site>,
    indices: RwLock<HashMap<Site, SiteIndex>>,
    debug_scores: bool,
}

/// How many per-site candidates `debug_scores` logs per query; enough to
/// see why a near-miss lost without flooding the log on a large index.
const DEBUG_SCORES_TOP_N: usize = 5;

fn url_site_regexes() -> &'static [(Site, Regex)] {
    static REGEXES: OnceLock<Vec<(Site, Regex)>> = OnceLock::new();
    REGEXES.get_or_init(|| {
        vec![
            (
                Site::Aniworld,
                Regex::new(r"aniworld\.to/anime/stream/([^/?#]+)").expect("static regex compiles"),
            ),
            (
                Site::STo,
                Regex::new(r"s\.to/serie/([^/?#]+)").expect("static regex compiles"),
            ),
            (
                Site::Megakino,
                Regex::new(r"megakino\.[a-z]+/([^/?#]+)").expect("static regex compiles"),
            ),
        ]
    })
}

impl Resolver {
    #[must_use]
    pub fn new(client: reqwest::Client, sites_in_priority_order: Vec<Site>) -> Self {
        Self {
            client,
            sites_in_priority_order,
            indices: RwLock::new(HashMap::new()),
            debug_scores: false,
        }
    }

    /// Enables per-candidate score logging (§9 Open Questions: "expose a
    /// debug mode that logs per-candidate scores"), gated behind
    /// `EngineConfig::debug_scores` since it is noisy on a large index.
    #[must_use]
    pub const fn with_debug_scores(mut self, enabled: bool) -> Self {
        self.debug_scores = enabled;
        self
    }

    fn recognise_url(query: &str) -> Option<(Site, String)> {
        for (site, re) in url_site_regexes() {
            if let Some(caps) = re.captures(query) {
                return Some((*site, caps[1].to_string()));
            }
        }
        None
    }

    async fn ensure_index(&self, site: Site) -> Result<()> {
        let stale = {
            let indices = self.indices.read().await;
            indices
                .get(&site)
                .is_none_or(|idx| idx.is_stale(chrono::Duration::hours(INDEX_REFRESH_HOURS)))
        };
        if !stale {
            return Ok(());
        }

        let adapter = adapter_for(site);
        if !adapter.site().has_alphabet_index() {
            return Ok(());
        }
        let built = SiteIndex::build(&self.client, adapter.as_ref()).await?;
        self.indices.write().await.insert(site, built);
        Ok(())
    }

    /// Resolves free text or a catalogue URL to `(site, slug)`. Never fails;
    /// a lookup that cannot be satisfied returns `None`.
    pub async fn resolve(&self, query: &str) -> Option<(Site, String)> {
        if let Some(hit) = Self::recognise_url(query) {
            debug!(query, site = %hit.0, slug = %hit.1, "resolved via URL recognition");
            return Some(hit);
        }

        let mut best: Option<(Site, String, f64)> = None;

        for &site in &self.sites_in_priority_order {
            if !site.has_alphabet_index() {
                continue;
            }
            if self.ensure_index(site).await.is_err() {
                continue;
            }
            let indices = self.indices.read().await;
            let Some(index) = indices.get(&site) else {
                continue;
            };

            if self.debug_scores {
                for (entry, score) in index.top_matches(query, DEBUG_SCORES_TOP_N) {
                    debug!(query, site = %site, slug = %entry.slug, title = %entry.title, score, "candidate score");
                }
            }

            if let Some((entry, score)) = index.best_match(query)
                && best.as_ref().is_none_or(|b| score > b.2)
            {
                best = Some((site, entry.slug.clone(), score));
            }
        }

        if let Some((site, slug, score)) = &best
            && *score >= CONFIDENCE_FLOOR
        {
            debug!(query, site = %site, slug, score, "resolved via fuzzy match");
            return Some((*site, slug.clone()));
        }

        if self.sites_in_priority_order.contains(&Site::STo)
            && let Some(slug) = self.suggest_sto(query).await
        {
            debug!(query, slug, "resolved via s.to suggest API");
            return Some((Site::STo, slug));
        }

        if self.sites_in_priority_order.contains(&Site::Megakino) {
            let slug = megakino_slug_candidate(query);
            debug!(query, slug, "falling back to megakino search-only path");
            return Some((Site::Megakino, slug));
        }

        None
    }

    /// Calls s.to's suggest/autocomplete endpoint and accepts its first hit.
    /// Used only when nothing in the alphabet index clears the confidence
    /// floor.
    async fn suggest_sto(&self, query: &str) -> Option<String> {
        #[derive(serde::Deserialize)]
        struct Suggestion {
            link: String,
        }

        let resp = self
            .client
            .get(format!("{}/ajax/seriesSearch", Site::STo.base_url()))
            .query(&[("keyword", query)])
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let suggestions: Vec<Suggestion> = resp.json().await.ok()?;
        let first = suggestions.first()?;
        first
            .link
            .rsplit("/serie/")
            .next()
            .map(|s| s.trim_matches('/').split('/').next().unwrap_or(s).to_string())
    }
}

/// Megakino has no index and performs no fuzzy matching: the query itself
/// (slugified) is the candidate, or an already-present slug is passed
/// through unchanged.
fn megakino_slug_candidate(query: &str) -> String {
    if let Some((_, slug)) = Resolver::recognise_url(query) {
        return slug;
    }
    query
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
