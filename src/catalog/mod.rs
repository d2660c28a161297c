//! Per-site catalogue adapters (§4.2, §4.6 step 2). A `CatalogueAdapter` is a
//! capability record realised as one small struct per `Site`, not a class
//! hierarchy — the adapter only knows how to build an episode-page URL and
//! parse that page's provider listing; everything else (scoring, indexing)
//! lives in `resolver`.

pub mod extractors;

use anyhow::{Context, Result, bail};
use scraper::{Html, Selector};
use std::time::Duration;

use crate::domain::Site;

/// A provider entry as listed on a catalogue site's episode page: the
/// provider's id (matched against `ProviderOrder`), the embed/redirect URL
/// the catalogue links to, and the languages it is offered in on that page.
#[derive(Debug, Clone)]
pub struct ProviderListing {
    pub provider_id: String,
    pub embed_url: String,
    pub languages: Vec<String>,
}

/// A special/film entry scraped from AniWorld's `/filme` page (§4.4).
#[derive(Debug, Clone)]
pub struct SpecialEntry {
    pub film_index: i32,
    pub episode_id: String,
    pub de_title: String,
    pub alt_title: Option<String>,
    pub tags: Vec<String>,
}

pub trait CatalogueAdapter: Send + Sync {
    fn site(&self) -> Site;

    /// Absolute URL of a regular episode page.
    fn episode_url(&self, slug: &str, season: i32, episode: i32) -> String;

    /// Absolute URL of the alphabet/catalogue index page(s), if the site has one.
    fn index_urls(&self) -> Vec<String>;

    /// Absolute URL of the specials/"filme" page, if the site has one.
    fn specials_url(&self, slug: &str) -> Option<String> {
        let _ = slug;
        None
    }

    /// Parses an episode page's provider listing out of its raw HTML.
    fn parse_providers(&self, html: &str) -> Vec<ProviderListing>;

    /// Parses the index/catalogue page into `(slug, display_title)` pairs.
    fn parse_index(&self, html: &str) -> Vec<(String, String)>;

    /// Parses the specials page, if supported.
    fn parse_specials(&self, html: &str) -> Vec<SpecialEntry> {
        let _ = html;
        Vec::new()
    }
}

pub struct AniworldAdapter;
pub struct SToAdapter;
pub struct MegakinoAdapter;

impl CatalogueAdapter for AniworldAdapter {
    fn site(&self) -> Site {
        Site::Aniworld
    }

    fn episode_url(&self, slug: &str, season: i32, episode: i32) -> String {
        format!(
            "{}/anime/stream/{slug}/staffel-{season}/episode-{episode}",
            Site::Aniworld.base_url()
        )
    }

    fn index_urls(&self) -> Vec<String> {
        ('a'..='z')
            .map(|c| format!("{}/animes-alphabet/{c}", Site::Aniworld.base_url()))
            .collect()
    }

    fn specials_url(&self, slug: &str) -> Option<String> {
        Some(format!("{}/anime/stream/{slug}/filme", Site::Aniworld.base_url()))
    }

    fn parse_providers(&self, html: &str) -> Vec<ProviderListing> {
        parse_episode_providers(html)
    }

    fn parse_index(&self, html: &str) -> Vec<(String, String)> {
        parse_slug_anchor_index(html, "a[href*='/anime/stream/']", "/anime/stream/")
    }

    fn parse_specials(&self, html: &str) -> Vec<SpecialEntry> {
        let document = Html::parse_document(html);
        let Ok(row_sel) = Selector::parse("table.seasonEpisodesList tbody tr") else {
            return Vec::new();
        };
        let Ok(link_sel) = Selector::parse("a") else {
            return Vec::new();
        };

        let mut entries = Vec::new();
        for (idx, row) in document.select(&row_sel).enumerate() {
            let Some(link) = row.select(&link_sel).next() else {
                continue;
            };
            let href = link.value().attr("href").unwrap_or_default();
            let episode_id = href
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .trim_start_matches("film-")
                .to_string();
            let de_title = link.text().collect::<String>().trim().to_string();
            if de_title.is_empty() {
                continue;
            }
            entries.push(SpecialEntry {
                film_index: i32::try_from(idx + 1).unwrap_or(0),
                episode_id,
                de_title,
                alt_title: None,
                tags: Vec::new(),
            });
        }
        entries
    }
}

impl CatalogueAdapter for SToAdapter {
    fn site(&self) -> Site {
        Site::STo
    }

    fn episode_url(&self, slug: &str, season: i32, episode: i32) -> String {
        format!(
            "{}/serie/{slug}/season-{season}/episode-{episode}",
            Site::STo.base_url()
        )
    }

    fn index_urls(&self) -> Vec<String> {
        vec![format!("{}/serien?by=alpha", Site::STo.base_url())]
    }

    fn parse_providers(&self, html: &str) -> Vec<ProviderListing> {
        parse_episode_providers(html)
    }

    fn parse_index(&self, html: &str) -> Vec<(String, String)> {
        parse_slug_anchor_index(html, "a[href*='/serie/']", "/serie/")
    }
}

impl CatalogueAdapter for MegakinoAdapter {
    fn site(&self) -> Site {
        Site::Megakino
    }

    fn episode_url(&self, slug: &str, _season: i32, _episode: i32) -> String {
        format!("{}/{slug}", Site::Megakino.base_url())
    }

    fn index_urls(&self) -> Vec<String> {
        Vec::new()
    }

    fn parse_providers(&self, html: &str) -> Vec<ProviderListing> {
        parse_episode_providers(html)
    }

    fn parse_index(&self, _html: &str) -> Vec<(String, String)> {
        Vec::new()
    }
}

#[must_use]
pub fn adapter_for(site: Site) -> Box<dyn CatalogueAdapter> {
    match site {
        Site::Aniworld => Box::new(AniworldAdapter),
        Site::STo => Box::new(SToAdapter),
        Site::Megakino => Box::new(MegakinoAdapter),
    }
}

/// Generic episode-page provider table parser, shared by the
/// scraper-compatible catalogue layouts (AniWorld and s.to both render a
/// `data-lang-key`-annotated provider list; megakino's episode page reuses
/// the same table shape via its embed aggregator).
fn parse_episode_providers(html: &str) -> Vec<ProviderListing> {
    let document = Html::parse_document(html);
    let Ok(row_sel) = Selector::parse("li[data-link-target]") else {
        return Vec::new();
    };

    let mut listings = Vec::new();
    for row in document.select(&row_sel) {
        let embed_url = row.value().attr("data-link-target").unwrap_or_default();
        if embed_url.is_empty() {
            continue;
        }
        let provider_id = row
            .value()
            .attr("data-provider")
            .map(str::to_string)
            .unwrap_or_else(|| row.text().collect::<String>().trim().to_lowercase());
        let languages = row
            .value()
            .attr("data-lang-key")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        listings.push(ProviderListing {
            provider_id,
            embed_url: embed_url.to_string(),
            languages,
        });
    }
    listings
}

fn parse_slug_anchor_index(html: &str, anchor_selector: &str, path_prefix: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let Ok(sel) = Selector::parse(anchor_selector) else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    for anchor in document.select(&sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(pos) = href.find(path_prefix) else {
            continue;
        };
        let slug = href[pos + path_prefix.len()..]
            .trim_matches('/')
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();
        if slug.is_empty() {
            continue;
        }
        let title = anchor.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }
        entries.push((slug, title));
    }
    entries
}

/// Fetches an adapter's episode page and returns the providers it lists.
pub async fn fetch_providers(
    client: &reqwest::Client,
    adapter: &dyn CatalogueAdapter,
    slug: &str,
    season: i32,
    episode: i32,
) -> Result<Vec<ProviderListing>> {
    let url = adapter.episode_url(slug, season, episode);
    let html = fetch_text(client, &url).await?;
    Ok(adapter.parse_providers(&html))
}

/// Fetches and parses one catalogue index page.
pub async fn fetch_index_page(
    client: &reqwest::Client,
    adapter: &dyn CatalogueAdapter,
    url: &str,
) -> Result<Vec<(String, String)>> {
    let html = fetch_text(client, url).await?;
    Ok(adapter.parse_index(&html))
}

/// Fetches and parses the specials ("filme") page, if the site has one.
pub async fn fetch_specials(
    client: &reqwest::Client,
    adapter: &dyn CatalogueAdapter,
    slug: &str,
) -> Result<Vec<SpecialEntry>> {
    let Some(url) = adapter.specials_url(slug) else {
        return Ok(Vec::new());
    };
    let html = fetch_text(client, &url).await?;
    Ok(adapter.parse_specials(&html))
}

async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .timeout(Duration::from_secs(20))
        .send()
        .await
        .with_context(|| format!("request failed: {url}"))?;

    if !resp.status().is_success() {
        bail!("unexpected status {} fetching {url}", resp.status());
    }

    resp.text()
        .await
        .with_context(|| format!("failed to read response body: {url}"))
}
