//! Availability cache and quality prober (§4.2). `Prober::probe` is the only
//! writer of `EpisodeAvailability` rows; cache reads/writes are funnelled
//! through here so the TTL policy and the per-key single-flight guarantee
//! (invariant 3: at most one concurrent probe per key) live in one place.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use anyhow::{Result, bail};

use crate::catalog::{self, adapter_for};
use crate::catalog::extractors::{ExtractedStream, ExtractorRegistry};
use crate::constants::cache::AVAILABILITY_TTL_HOURS;
use crate::db::{EpisodeAvailability, ProbeResult, Store};
use crate::domain::EpisodeIdentity;
use crate::media::MediaAnalyzer;

/// Outcome of a probe attempt, whether served from cache or freshly probed.
#[derive(Debug, Clone)]
pub struct AvailabilityOutcome {
    pub available: bool,
    pub height: Option<i32>,
    pub vcodec: Option<String>,
    pub provider: Option<String>,
}

impl From<EpisodeAvailability> for AvailabilityOutcome {
    fn from(row: EpisodeAvailability) -> Self {
        Self {
            available: row.available,
            height: row.height,
            vcodec: row.vcodec,
            provider: row.provider,
        }
    }
}

pub struct Prober {
    client: reqwest::Client,
    store: Store,
    extractors: ExtractorRegistry,
    media: MediaAnalyzer,
    provider_order: Vec<String>,
    availability_ttl: chrono::Duration,
    /// Per-key single-flight guard (§4.2 "Concurrency"; invariant 3).
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

fn cache_key(identity: &EpisodeIdentity) -> String {
    format!(
        "{}/{}/{}/{}/{}",
        identity.site, identity.slug, identity.season, identity.episode, identity.language
    )
}

impl Prober {
    #[must_use]
    pub fn new(client: reqwest::Client, store: Store, provider_order: Vec<String>) -> Self {
        Self {
            client,
            store,
            extractors: ExtractorRegistry::new(),
            media: MediaAnalyzer::new(),
            provider_order,
            availability_ttl: chrono::Duration::hours(AVAILABILITY_TTL_HOURS),
            inflight: DashMap::new(),
        }
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.availability_ttl = ttl;
        self
    }

    fn is_fresh(&self, row: &EpisodeAvailability) -> bool {
        Utc::now() - row.checked_at < self.availability_ttl
    }

    /// Reads the cache; probes (serialised per key) on miss or staleness.
    /// Never returns an error: a total probe failure is represented as
    /// `available = false`, per §7 "Not available".
    pub async fn probe(&self, identity: &EpisodeIdentity) -> AvailabilityOutcome {
        if let Ok(Some(row)) = self.store.get_availability(identity).await
            && self.is_fresh(&row)
        {
            return row.into();
        }

        let key = cache_key(identity);
        let lock = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Re-check after acquiring the lock: a concurrent probe for the same
        // key may have just completed.
        if let Ok(Some(row)) = self.store.get_availability(identity).await
            && self.is_fresh(&row)
        {
            self.inflight.remove(&key);
            return row.into();
        }

        let outcome = self.probe_uncached(identity).await;

        let result = ProbeResult {
            available: outcome.available,
            height: outcome.height,
            vcodec: outcome.vcodec.clone(),
            provider: outcome.provider.clone(),
            extra: None,
        };
        if let Err(e) = self.store.upsert_availability(identity, &result).await {
            warn!(%e, %identity, "failed to persist availability probe result");
        }

        self.inflight.remove(&key);
        outcome
    }

    /// Resolves one direct upstream URL via the same provider-fallback
    /// algorithm the probe uses, for runners (§4.6 step 1-2, §4.6 "strm"
    /// step 1) rather than the availability cache. Returns the winning
    /// provider id alongside the extracted stream.
    pub async fn resolve_direct_url(
        &self,
        identity: &EpisodeIdentity,
        requested_provider: Option<&str>,
    ) -> Result<(String, ExtractedStream)> {
        let adapter = adapter_for(identity.site);
        let providers = catalog::fetch_providers(
            &self.client,
            adapter.as_ref(),
            &identity.slug,
            identity.season,
            identity.episode,
        )
        .await?;

        let candidates =
            ordered_candidates(&providers, &identity.language, &self.provider_order, requested_provider);

        for listing in candidates {
            let extractor = self.extractors.get(&listing.provider_id);
            match tokio::time::timeout(
                Duration::from_secs(20),
                extractor.extract(&self.client, &listing.embed_url),
            )
            .await
            {
                Ok(Ok(stream)) => return Ok((listing.provider_id.clone(), stream)),
                Ok(Err(e)) => debug!(%identity, provider = %listing.provider_id, %e, "extraction failed"),
                Err(_) => debug!(%identity, provider = %listing.provider_id, "extraction timed out"),
            }
        }

        bail!("no provider yielded a direct URL for {identity}");
    }

    /// Tries each candidate provider in order; the first to yield both a
    /// direct URL and readable media metadata wins.
    async fn probe_uncached(&self, identity: &EpisodeIdentity) -> AvailabilityOutcome {
        let adapter = adapter_for(identity.site);

        let providers =
            match catalog::fetch_providers(&self.client, adapter.as_ref(), &identity.slug, identity.season, identity.episode)
                .await
            {
                Ok(p) => p,
                Err(e) => {
                    debug!(%identity, %e, "provider listing fetch failed");
                    return AvailabilityOutcome {
                        available: false,
                        height: None,
                        vcodec: None,
                        provider: None,
                    };
                }
            };

        let candidates = ordered_candidates(&providers, &identity.language, &self.provider_order, None);

        for listing in candidates {
            let extractor = self.extractors.get(&listing.provider_id);
            let extracted = match tokio::time::timeout(
                Duration::from_secs(20),
                extractor.extract(&self.client, &listing.embed_url),
            )
            .await
            {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    debug!(%identity, provider = %listing.provider_id, %e, "extraction failed");
                    continue;
                }
                Err(_) => {
                    debug!(%identity, provider = %listing.provider_id, "extraction timed out");
                    continue;
                }
            };

            let info = match self.media.analyze_url(&extracted.direct_url) {
                Ok(info) => info,
                Err(e) => {
                    debug!(%identity, provider = %listing.provider_id, %e, "media analysis failed");
                    continue;
                }
            };

            return AvailabilityOutcome {
                available: true,
                height: Some(i32::try_from(info.resolution_height).unwrap_or(0)),
                vcodec: Some(info.video_codec),
                provider: Some(listing.provider_id),
            };
        }

        AvailabilityOutcome {
            available: false,
            height: None,
            vcodec: None,
            provider: None,
        }
    }
}

/// Orders providers listed on the episode page: the language filter is
/// applied first, then providers are ranked by `provider_order`, with
/// unlisted providers kept (in page order) after every named one. If
/// `requested` names a provider, it is promoted ahead of everything else
/// (§4.6 step 2: "the requested one first (if any), then `ProviderOrder`").
pub(crate) fn ordered_candidates<'a>(
    providers: &'a [catalog::ProviderListing],
    language: &str,
    provider_order: &[String],
    requested: Option<&str>,
) -> Vec<&'a catalog::ProviderListing> {
    let mut matching: Vec<&catalog::ProviderListing> = providers
        .iter()
        .filter(|p| p.languages.iter().any(|l| l.eq_ignore_ascii_case(language)))
        .collect();

    matching.sort_by_key(|listing| {
        if requested.is_some_and(|r| r.eq_ignore_ascii_case(&listing.provider_id)) {
            return 0;
        }
        1 + provider_order
            .iter()
            .position(|p| p.eq_ignore_ascii_case(&listing.provider_id))
            .unwrap_or(provider_order.len())
    });

    matching
}
