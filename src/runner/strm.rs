//! STRM runner (§4.6, `mode=strm`): resolves one upstream URL and writes a
//! `.strm` pointer file, either the raw upstream URL (`direct` mode) or a
//! signed URL back through this bridge's reverse proxy (`proxy` mode).

use std::path::PathBuf;

use async_trait::async_trait;

use super::{CancelSignal, JobSpec, ProgressReporter, Runner, RunnerDeps, RunnerError, sanitize_filename};
use crate::config::StrmProxyMode;
use crate::db::MappingKey;
use crate::release;
use crate::strmproxy::auth::sign_stream_url;

pub struct StrmRunner;

#[async_trait]
impl Runner for StrmRunner {
    async fn run(
        &self,
        spec: &JobSpec,
        deps: &RunnerDeps,
        progress: &ProgressReporter,
        cancel: &CancelSignal,
    ) -> Result<String, RunnerError> {
        if cancel.is_cancelled() {
            return Err(RunnerError::Cancelled);
        }

        progress.report(10.0, 0, 0, 0, None).await;

        let (provider, stream) = deps
            .prober
            .resolve_direct_url(&spec.identity, spec.requested_provider.as_deref())
            .await
            .map_err(|_| RunnerError::NoProviderAvailable)?;

        if cancel.is_cancelled() {
            return Err(RunnerError::Cancelled);
        }

        let contents = match deps.strm_proxy_mode {
            StrmProxyMode::Direct => stream.direct_url.clone(),
            StrmProxyMode::Proxy | StrmProxyMode::Redirect => {
                let key = MappingKey {
                    site: spec.identity.site.as_str(),
                    slug: &spec.identity.slug,
                    season: spec.identity.season,
                    episode: spec.identity.episode,
                    language: &spec.identity.language,
                    provider: &provider,
                };
                deps.store
                    .upsert_strm_mapping(&key, &stream.direct_url)
                    .await
                    .map_err(RunnerError::Upstream)?;

                sign_stream_url(
                    &deps.public_base_url,
                    &deps.strm_proxy_secret,
                    deps.token_ttl_seconds,
                    &spec.identity,
                    Some(&provider),
                )
            }
        };

        // `title_hint` (when set) comes from a magnet's `dn`, which is
        // already a fully-formatted release name - use it as the filename
        // base directly rather than re-wrapping it through `build_name`.
        let name = match &spec.title_hint {
            Some(hint) => hint.clone(),
            None => {
                let (season, episode) = spec
                    .alias_season_episode
                    .unwrap_or((spec.identity.season, spec.identity.episode));
                let outcome = deps.prober.probe(&spec.identity).await;
                release::build_name(
                    &spec.identity.slug,
                    spec.identity.site,
                    season,
                    episode,
                    outcome.height,
                    outcome.vcodec.as_deref(),
                    &spec.identity.language,
                )
            }
        };
        let filename = format!("{}.strm", sanitize_filename(&name));
        let final_path: PathBuf = deps.download_dir.join(&filename);

        tokio::fs::create_dir_all(&deps.download_dir).await?;
        tokio::fs::write(&final_path, format!("{contents}\n")).await?;

        progress.report(100.0, 0, 0, 0, None).await;

        Ok(final_path.to_string_lossy().into_owned())
    }
}
