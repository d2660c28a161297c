//! Specials/alias mapper (§4.4). Reconciles AniWorld's `/filme` "film-N"
//! numbering (stored as `season = 0, episode = film_index`) with the
//! canonical `(season, episode)` a Sonarr-compatible metadata service
//! reports, so the source site's own numbering can drive probing/downloads
//! while release naming and downstream import use the alias pair.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::catalog::{self, SpecialEntry, adapter_for};
use crate::clients::metadata::{EpisodeInfo, MetadataClient};
use crate::constants::scoring::SPECIAL_CONFIDENCE_FLOOR;
use crate::resolver::scoring::score_special_title;

#[derive(Debug, thiserror::Error)]
pub enum SpecialsError {
    #[error("site has no specials page")]
    Unsupported,
    #[error("no canonical series match found for {0}")]
    NoSeriesMatch(String),
    #[error("query did not clear the specials confidence floor")]
    NoConfidentMatch,
    #[error("mapping is ambiguous: {0} candidates matched")]
    AmbiguousMapping(usize),
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

/// The resolved mapping between a source site's special numbering and the
/// canonical numbering a downstream import expects ("SpecialAlias" in the
/// domain glossary).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialEpisodeMapping {
    pub source_season: i32,
    pub source_episode: i32,
    pub alias_season: i32,
    pub alias_episode: i32,
    pub title: String,
}

/// In-process, TTL-memoised record of one site's `/filme` page parse plus
/// its canonical-episode match, keyed by `(site, slug)`. Explicitly not
/// persisted to the database: derived data, safe to memoise only in memory.
struct CacheEntry {
    entries: Vec<SpecialEntry>,
    fetched_at: Instant,
}

pub struct SpecialsMapper {
    client: reqwest::Client,
    metadata: Arc<MetadataClient>,
    cache: DashMap<(String, String), CacheEntry>,
    cache_ttl: Duration,
}

impl SpecialsMapper {
    #[must_use]
    pub fn new(client: reqwest::Client, metadata: Arc<MetadataClient>) -> Self {
        Self {
            client,
            metadata,
            cache: DashMap::new(),
            cache_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }

    async fn specials_for(
        &self,
        site: crate::domain::Site,
        slug: &str,
    ) -> Result<Vec<SpecialEntry>, SpecialsError> {
        let key = (site.as_str().to_string(), slug.to_string());
        if let Some(cached) = self.cache.get(&key)
            && cached.fetched_at.elapsed() < self.cache_ttl
        {
            return Ok(cached.entries.clone());
        }

        let adapter = adapter_for(site);
        let entries = catalog::fetch_specials(&self.client, adapter.as_ref(), slug).await?;
        if entries.is_empty() && adapter.specials_url(slug).is_none() {
            return Err(SpecialsError::Unsupported);
        }

        self.cache.insert(
            key,
            CacheEntry {
                entries: entries.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(entries)
    }

    /// Free-text path (§4.4 point 3a): matches `query` against the
    /// catalogue's own special titles, used when a Torznab search's text
    /// looks like it names a special/movie rather than a numbered episode.
    pub async fn match_by_catalogue_title(
        &self,
        site: crate::domain::Site,
        slug: &str,
        query: &str,
    ) -> Result<SpecialEpisodeMapping, SpecialsError> {
        let entries = self.specials_for(site, slug).await?;

        let mut best: Option<(&SpecialEntry, f64)> = None;
        for entry in &entries {
            let mut titles = vec![entry.de_title.clone()];
            titles.extend(entry.alt_title.clone());
            let score = score_special_title(query, &titles);
            if best.as_ref().is_none_or(|b| score > b.1) {
                best = Some((entry, score));
            }
        }

        let (entry, score) = best.ok_or(SpecialsError::NoConfidentMatch)?;
        if score < SPECIAL_CONFIDENCE_FLOOR {
            return Err(SpecialsError::NoConfidentMatch);
        }

        let canonical = self
            .resolve_canonical(slug, &entry.de_title)
            .await?;

        Ok(SpecialEpisodeMapping {
            source_season: 0,
            source_episode: entry.film_index,
            alias_season: canonical.season_number,
            alias_episode: canonical.episode_number,
            title: entry.de_title.clone(),
        })
    }

    /// ID-driven path (§4.4 point 3b): given a known `film_index`, matches
    /// the special's own title against the canonical episode list to find
    /// its alias numbering. Used when a canonical-numbered request from an
    /// arr client cannot be satisfied directly and the mapper is asked to
    /// locate the matching special by source numbering instead.
    pub async fn match_by_film_index(
        &self,
        site: crate::domain::Site,
        slug: &str,
        film_index: i32,
    ) -> Result<SpecialEpisodeMapping, SpecialsError> {
        let entries = self.specials_for(site, slug).await?;
        let entry = entries
            .iter()
            .find(|e| e.film_index == film_index)
            .ok_or(SpecialsError::NoConfidentMatch)?;

        let canonical = self.resolve_canonical(slug, &entry.de_title).await?;

        Ok(SpecialEpisodeMapping {
            source_season: 0,
            source_episode: entry.film_index,
            alias_season: canonical.season_number,
            alias_episode: canonical.episode_number,
            title: entry.de_title.clone(),
        })
    }

    /// Looks the series up via the metadata service and matches `title`
    /// against its canonical episode titles (§4.4 point 2-3a). An ambiguous
    /// result (more than one equally-scored canonical episode) is a typed
    /// error rather than a guess, per invariant-adjacent Open Question
    /// "Absolute-number mapping may produce ambiguous mappings".
    async fn resolve_canonical(
        &self,
        series_slug: &str,
        title: &str,
    ) -> Result<EpisodeInfo, SpecialsError> {
        let candidates = self
            .metadata
            .lookup_series(series_slug)
            .await
            .map_err(SpecialsError::Upstream)?;
        let series = candidates
            .first()
            .ok_or_else(|| SpecialsError::NoSeriesMatch(series_slug.to_string()))?;
        let Some(tvdb_id) = series.tvdb_id else {
            return Err(SpecialsError::NoSeriesMatch(series_slug.to_string()));
        };

        let episodes = self
            .metadata
            .get_episodes(tvdb_id)
            .await
            .map_err(SpecialsError::Upstream)?;

        let mut scored: Vec<(&EpisodeInfo, f64)> = episodes
            .iter()
            .filter_map(|ep| {
                let ep_title = ep.title.as_ref()?;
                let score = score_special_title(title, std::slice::from_ref(ep_title));
                (score >= SPECIAL_CONFIDENCE_FLOOR).then_some((ep, score))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        match scored.as_slice() {
            [] => Err(SpecialsError::NoConfidentMatch),
            [(only, _)] => Ok((*only).clone()),
            [(best, best_score), (_, second_score), ..] if (best_score - second_score).abs() > f64::EPSILON => {
                Ok((*best).clone())
            }
            multiple => Err(SpecialsError::AmbiguousMapping(multiple.len())),
        }
    }
}
