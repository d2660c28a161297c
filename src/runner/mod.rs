//! Download and STRM runners (§4.6), the two things a scheduled `Job`
//! actually does. Both implement `Runner` over a shared `JobContext`; the
//! only difference is the last step (write bytes to a media file vs. write
//! a `.strm` pointer), so the provider-resolution and progress-reporting
//! plumbing lives once in this module.

pub mod download;
pub mod strm;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::availability::Prober;
use crate::config::{StrmProxyMode, StrmProxySecret};
use crate::db::Store;
use crate::domain::EpisodeIdentity;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("job was cancelled")]
    Cancelled,
    #[error("no provider could deliver this episode")]
    NoProviderAvailable,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

/// One job's immutable parameters, as submitted to the scheduler (§4.5
/// "Submit").
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub job_id: String,
    /// Drives probing/extraction: the *source* numbering (§4.4 "Downstream:
    /// probing/downloading uses the source pair").
    pub identity: EpisodeIdentity,
    pub requested_provider: Option<String>,
    /// Display title to use in the synthesized release name, when it
    /// differs from the catalogue slug (e.g. the canonical series title).
    pub title_hint: Option<String>,
    /// Alias `(season, episode)` from the specials mapper, overriding the
    /// source numbering in the final release name only (§4.4 point 4,
    /// §4.6 step 5).
    pub alias_season_episode: Option<(i32, i32)>,
    pub absolute_number: Option<i32>,
}

/// Shared, read-mostly dependencies every runner needs. Cheap to clone
/// (everything inside is an `Arc` or a plain value).
#[derive(Clone)]
pub struct RunnerDeps {
    pub client: reqwest::Client,
    pub store: Store,
    pub prober: Arc<Prober>,
    pub download_dir: PathBuf,
    pub strm_proxy_mode: StrmProxyMode,
    pub strm_proxy_secret: StrmProxySecret,
    pub token_ttl_seconds: i64,
    pub public_base_url: String,
    pub chunk_size_bytes: usize,
}

/// Cooperative cancellation signal for one running job (§5 "Cancellation
/// semantics"). Checked at I/O boundaries; never forcibly aborts a task.
#[derive(Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Persists progress through the job store with a debounce so a tight
/// chunk loop never writes more than a few times a second (§4.5 "Progress
/// reporting").
pub struct ProgressReporter {
    store: Store,
    job_id: String,
    last_write: Mutex<Instant>,
    debounce: std::time::Duration,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(store: Store, job_id: String) -> Self {
        Self {
            store,
            job_id,
            last_write: Mutex::new(Instant::now() - crate::constants::intervals::PROGRESS_DEBOUNCE),
            debounce: crate::constants::intervals::PROGRESS_DEBOUNCE,
        }
    }

    pub async fn report(
        &self,
        percent: f32,
        downloaded_bytes: i64,
        total_bytes: i64,
        speed_bytes_per_sec: i64,
        eta_seconds: Option<i64>,
    ) {
        let mut last = self.last_write.lock().await;
        if last.elapsed() < self.debounce && percent < 100.0 {
            return;
        }
        *last = Instant::now();
        drop(last);

        let _ = self
            .store
            .update_job_progress(
                &self.job_id,
                percent,
                downloaded_bytes,
                total_bytes,
                speed_bytes_per_sec,
                eta_seconds,
            )
            .await;
    }
}

#[async_trait]
pub trait Runner: Send + Sync {
    /// Runs the job to completion (or a typed failure/cancellation). Callers
    /// (the scheduler) are responsible for the terminal `Job` transition;
    /// this only drives the work and reports progress.
    async fn run(
        &self,
        spec: &JobSpec,
        deps: &RunnerDeps,
        progress: &ProgressReporter,
        cancel: &CancelSignal,
    ) -> Result<String, RunnerError>;
}

/// Sanitises a filename component so a release/title never introduces a
/// path traversal or reserved character into `DownloadDir` (§4.6 step 4:
/// "Filenames are sanitised; no path traversal").
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        "episode".to_string()
    } else {
        trimmed.to_string()
    }
}
