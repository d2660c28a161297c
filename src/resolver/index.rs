//! Per-site title index (§4.1). Built by scraping a site's alphabet/catalogue
//! page(s); refreshed wholesale and swapped atomically so readers never see
//! a half-built index (§5, "shared resources").

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::catalog::{self, CatalogueAdapter};
use crate::resolver::scoring::score_title;

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub slug: String,
    pub title: String,
    pub alt_titles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SiteIndex {
    pub entries: Vec<IndexEntry>,
    pub built_at: DateTime<Utc>,
}

impl SiteIndex {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            built_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[must_use]
    pub fn is_stale(&self, refresh_after: chrono::Duration) -> bool {
        Utc::now() - self.built_at > refresh_after
    }

    /// Scrapes every index page the adapter exposes and merges duplicate
    /// slugs (a title appearing under more than one alphabet bucket) into one
    /// entry with combined alt titles.
    pub async fn build(client: &reqwest::Client, adapter: &dyn CatalogueAdapter) -> Result<Self> {
        let mut by_slug: std::collections::HashMap<String, IndexEntry> =
            std::collections::HashMap::new();

        for url in adapter.index_urls() {
            let pairs = catalog::fetch_index_page(client, adapter, &url).await?;
            for (slug, title) in pairs {
                by_slug
                    .entry(slug.clone())
                    .and_modify(|e| {
                        if !e.alt_titles.contains(&title) && e.title != title {
                            e.alt_titles.push(title.clone());
                        }
                    })
                    .or_insert(IndexEntry {
                        slug,
                        title,
                        alt_titles: Vec::new(),
                    });
            }
        }

        Ok(Self {
            entries: by_slug.into_values().collect(),
            built_at: Utc::now(),
        })
    }

    /// Best-scoring entry for `query`, with its score, or `None` if the
    /// index is empty.
    #[must_use]
    pub fn best_match(&self, query: &str) -> Option<(&IndexEntry, f64)> {
        self.entries
            .iter()
            .map(|entry| {
                let mut titles = vec![entry.title.clone()];
                titles.extend(entry.alt_titles.iter().cloned());
                (entry, score_title(query, &titles))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Every entry's score against `query`, highest first, truncated to
    /// `limit`. Used only by the resolver's `debug_scores` mode (§9 Open
    /// Questions: "expose a debug mode that logs per-candidate scores") —
    /// `best_match` alone only ever surfaces the single winner.
    #[must_use]
    pub fn top_matches(&self, query: &str, limit: usize) -> Vec<(&IndexEntry, f64)> {
        let mut scored: Vec<(&IndexEntry, f64)> = self
            .entries
            .iter()
            .map(|entry| {
                let mut titles = vec![entry.title.clone()];
                titles.extend(entry.alt_titles.iter().cloned());
                (entry, score_title(query, &titles))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);
        scored
    }
}
