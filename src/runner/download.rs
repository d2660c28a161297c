//! Download runner (§4.6, `mode=download`): provider-fallback extraction,
//! chunked fetch with progress/cancellation, quality probe, and an atomic
//! rename into the final release-named file.

use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use super::{CancelSignal, JobSpec, ProgressReporter, Runner, RunnerDeps, RunnerError, sanitize_filename};
use crate::release;

pub struct DownloadRunner;

#[async_trait]
impl Runner for DownloadRunner {
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

        let (provider, stream) = deps
            .prober
            .resolve_direct_url(&spec.identity, spec.requested_provider.as_deref())
            .await
            .map_err(|_| RunnerError::NoProviderAvailable)?;

        tokio::fs::create_dir_all(&deps.download_dir).await?;
        let tmp_path = deps.download_dir.join(format!("{}.part", spec.job_id));

        let (downloaded, total) = fetch_to_file(
            &deps.client,
            &stream.direct_url,
            &tmp_path,
            deps.chunk_size_bytes,
            progress,
            cancel,
        )
        .await?;

        if cancel.is_cancelled() {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(RunnerError::Cancelled);
        }

        let info = tokio::task::block_in_place(|| {
            crate::media::MediaAnalyzer::new().analyze(&tmp_path)
        })
        .ok();

        // `title_hint` (when set) comes from a magnet's `dn`, which is
        // already a fully-formatted release name - use it as the filename
        // base directly rather than re-wrapping it through `build_name`.
        let name = match &spec.title_hint {
            Some(hint) => hint.clone(),
            None => {
                let (season, episode) = spec
                    .alias_season_episode
                    .unwrap_or((spec.identity.season, spec.identity.episode));
                release::build_name(
                    &spec.identity.slug,
                    spec.identity.site,
                    season,
                    episode,
                    info.as_ref().map(|i| i32::try_from(i.resolution_height).unwrap_or(0)),
                    info.as_ref().map(|i| i.video_codec.as_str()),
                    &spec.identity.language,
                )
            }
        };
        let filename = format!("{}.mkv", sanitize_filename(&name));
        let final_path: PathBuf = deps.download_dir.join(&filename);

        tokio::fs::rename(&tmp_path, &final_path).await?;

        let _ = downloaded;
        let _ = total;

        Ok(final_path.to_string_lossy().into_owned())
    }
}

/// Streams `url` into `path` in `chunk_size` writes, reporting progress
/// (downloaded bytes, instantaneous speed, ETA) and checking `cancel` at
/// every chunk boundary (§5 "Cancellation semantics": "the worker observes
/// it at the next I/O boundary").
async fn fetch_to_file(
    client: &reqwest::Client,
    url: &str,
    path: &std::path::Path,
    chunk_size: usize,
    progress: &ProgressReporter,
    cancel: &CancelSignal,
) -> Result<(u64, u64), RunnerError> {
    let resp = client
        .get(url)
        .timeout(std::time::Duration::from_secs(30))
        .send()
        .await
        .map_err(|e| RunnerError::Upstream(e.into()))?;

    let total_bytes = resp.content_length().unwrap_or(0);
    let mut file = tokio::fs::File::create(path).await?;
    let mut downloaded: u64 = 0;
    let mut stream = resp.bytes_stream();

    let started = Instant::now();
    let mut pending = Vec::with_capacity(chunk_size);

    while let Some(chunk) = stream.next().await {
        if cancel.is_cancelled() {
            return Err(RunnerError::Cancelled);
        }
        let chunk = chunk.map_err(|e| RunnerError::Upstream(e.into()))?;
        pending.extend_from_slice(&chunk);
        downloaded += chunk.len() as u64;

        if pending.len() >= chunk_size {
            file.write_all(&pending).await?;
            pending.clear();
        }

        let elapsed = started.elapsed().as_secs_f64().max(0.001);
        let speed = (downloaded as f64 / elapsed) as i64;
        let percent = if total_bytes > 0 {
            (downloaded as f64 / total_bytes as f64 * 100.0) as f32
        } else {
            0.0
        };
        let eta = if speed > 0 && total_bytes > downloaded {
            Some(((total_bytes - downloaded) as i64) / speed)
        } else {
            None
        };

        progress
            .report(percent, downloaded as i64, total_bytes as i64, speed, eta)
            .await;
    }

    if !pending.is_empty() {
        file.write_all(&pending).await?;
    }
    file.flush().await?;

    Ok((downloaded, total_bytes))
}
