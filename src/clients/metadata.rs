//! Client for a Sonarr-compatible external metadata service (§4.4). Used by
//! the specials/alias mapper to resolve the canonical `(season, episode)` a
//! source site's loose "film N" / special numbering actually corresponds to,
//! by matching titles against an authoritative episode list.
//!
//! A thin `reqwest::Client` wrapper in the style of `clients::jikan`/
//! `clients::anilist`: `serde`-derived DTOs matching only the fields we
//! read, and `anyhow::Context` on every fallible call.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// A series-lookup hit, as returned by `/api/v3/series/lookup`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesLookup {
    #[serde(rename = "tvdbId")]
    pub tvdb_id: Option<i64>,
    pub title: String,
    #[serde(rename = "titleSlug")]
    pub title_slug: Option<String>,
    pub year: Option<i32>,
}

/// A single episode row from `/api/v3/episode`.
#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeInfo {
    #[serde(rename = "seasonNumber")]
    pub season_number: i32,
    #[serde(rename = "episodeNumber")]
    pub episode_number: i32,
    #[serde(rename = "absoluteEpisodeNumber")]
    pub absolute_episode_number: Option<i32>,
    pub title: Option<String>,
}

pub struct MetadataClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl MetadataClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client builds with static config");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let builder = self.client.get(url);
        match &self.api_key {
            Some(key) => builder.header("X-Api-Key", key),
            None => builder,
        }
    }

    /// Looks up candidate series by free-text term, as Sonarr's add-series
    /// search does.
    pub async fn lookup_series(&self, term: &str) -> Result<Vec<SeriesLookup>> {
        let resp = self
            .request("/api/v3/series/lookup")
            .query(&[("term", term)])
            .send()
            .await
            .context("series lookup request failed")?
            .error_for_status()
            .context("series lookup returned an error status")?;

        resp.json::<Vec<SeriesLookup>>()
            .await
            .context("failed to parse series lookup response")
    }

    /// Full episode list for a known series, used to match special/alias
    /// titles against the canonical numbering.
    pub async fn get_episodes(&self, series_id: i64) -> Result<Vec<EpisodeInfo>> {
        let resp = self
            .request("/api/v3/episode")
            .query(&[("seriesId", series_id.to_string())])
            .send()
            .await
            .context("episode list request failed")?
            .error_for_status()
            .context("episode list returned an error status")?;

        resp.json::<Vec<EpisodeInfo>>()
            .await
            .context("failed to parse episode list response")
    }
}
