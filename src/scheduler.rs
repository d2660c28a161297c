//! Job scheduler (§4.5): a `Semaphore`-gated worker pool over the
//! download/STRM runners. `submit` enqueues and immediately returns the
//! queued `Job` row; the actual work runs on a spawned task once a permit
//! is free. A background loop reaps completed jobs past `DownloadsTtl` and
//! the worker pool itself reaps dangling (non-terminal) jobs once at
//! startup, since a non-terminal job found on boot can only mean the
//! process died mid-run (invariant 2).

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::db::{NewJob, Store};
use crate::domain::{JobMode, JobStatus};
use crate::magnet;
use crate::runner::download::DownloadRunner;
use crate::runner::strm::StrmRunner;
use crate::runner::{CancelSignal, JobSpec, ProgressReporter, Runner, RunnerDeps, RunnerError};

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Everything the scheduler needs to run a job besides the spec itself.
#[derive(Clone)]
pub struct Scheduler {
    store: Store,
    deps: RunnerDeps,
    semaphore: Arc<Semaphore>,
    active: Arc<DashMap<String, CancelSignal>>,
    downloads_ttl: chrono::Duration,
    cleanup_scan_interval: std::time::Duration,
}

impl Scheduler {
    #[must_use]
    pub fn new(store: Store, deps: RunnerDeps, max_concurrency: usize, downloads_ttl_hours: i64) -> Self {
        Self {
            store,
            deps,
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            active: Arc::new(DashMap::new()),
            downloads_ttl: chrono::Duration::hours(downloads_ttl_hours),
            cleanup_scan_interval: crate::constants::intervals::CLEANUP_SCAN,
        }
    }

    /// Reaps dangling non-terminal jobs left over from a previous run and
    /// spawns the TTL cleanup loop. Call once at process startup.
    pub async fn start(&self) -> anyhow::Result<()> {
        let reaped = self.store.reap_dangling_jobs().await?;
        if reaped > 0 {
            warn!(count = reaped, "reaped dangling jobs from a previous run");
        }

        let cleanup_store = self.store.clone();
        let interval = self.cleanup_scan_interval;
        let ttl = self.downloads_ttl;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let cutoff = chrono::Utc::now() - ttl;
                match cleanup_store.list_jobs_completed_before(cutoff).await {
                    Ok(jobs) => {
                        for job in jobs {
                            let Some(path) = job.result_path else { continue };
                            match tokio::fs::remove_file(&path).await {
                                Ok(()) => info!(job_id = %job.id, %path, "deleted expired download"),
                                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                                Err(e) => warn!(job_id = %job.id, %path, %e, "failed to delete expired download"),
                            }
                        }
                    }
                    Err(e) => error!(%e, "TTL cleanup scan failed"),
                }
            }
        });

        Ok(())
    }

    /// Enqueues a new job, derives its infohash-based id, and spawns the
    /// worker task. Returns the persisted `Queued` row immediately (§4.5
    /// "Submit"). Re-submitting the same `(identity, provider, mode)` is a
    /// no-op that returns the existing job untouched, since its infohash-
    /// derived id is already in the store ("Creating a ClientTask for the
    /// same magnet twice results in one ClientTask row... and one Job").
    pub async fn submit(&self, spec: JobSpec, mode: JobMode) -> anyhow::Result<crate::db::Job> {
        let id = magnet::derive_infohash(&spec.identity, spec.requested_provider.as_deref(), mode);

        if let Some(existing) = self.store.get_job(&id).await? {
            return Ok(existing);
        }

        let spec = JobSpec { job_id: id.clone(), ..spec };

        let new_job = NewJob {
            id: id.clone(),
            mode,
            site: spec.identity.site,
            slug: spec.identity.slug.clone(),
            season: spec.identity.season,
            episode: spec.identity.episode,
            language: spec.identity.language.clone(),
            provider: spec.requested_provider.clone(),
            title_hint: spec.title_hint.clone(),
            absolute_number: spec.absolute_number,
        };
        let job = self.store.insert_job(&new_job).await?;

        let cancel = CancelSignal::new();
        self.active.insert(id.clone(), cancel.clone());

        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_job(id, mode, spec, cancel).await;
        });

        Ok(job)
    }

    /// Signals cooperative cancellation for a running job; a no-op if the
    /// job is not currently active (already terminal, or unknown).
    pub fn cancel(&self, job_id: &str) {
        if let Some(cancel) = self.active.get(job_id) {
            cancel.cancel();
        }
    }

    async fn run_job(&self, id: String, mode: JobMode, spec: JobSpec, cancel: CancelSignal) {
        let Ok(_permit) = self.semaphore.clone().acquire_owned().await else {
            error!(job_id = %id, "semaphore closed; cannot run job");
            return;
        };

        if let Err(e) = self
            .store
            .transition_job(&id, JobStatus::Downloading, None, None)
            .await
        {
            error!(job_id = %id, %e, "failed to transition job to downloading");
        }

        let progress = ProgressReporter::new(self.store.clone(), id.clone());
        let runner: Box<dyn Runner> = match mode {
            JobMode::Download => Box::new(DownloadRunner),
            JobMode::Strm => Box::new(StrmRunner),
        };

        let outcome = runner.run(&spec, &self.deps, &progress, &cancel).await;
        self.active.remove(&id);

        match outcome {
            Ok(result_path) => {
                if let Err(e) = self
                    .store
                    .transition_job(&id, JobStatus::Completed, None, Some(result_path))
                    .await
                {
                    error!(job_id = %id, %e, "failed to transition job to completed");
                }
            }
            Err(RunnerError::Cancelled) => {
                if let Err(e) = self
                    .store
                    .transition_job(&id, JobStatus::Cancelled, Some("cancelled".to_string()), None)
                    .await
                {
                    error!(job_id = %id, %e, "failed to transition job to cancelled");
                }
            }
            Err(e) => {
                warn!(job_id = %id, %e, "job failed");
                if let Err(store_err) = self
                    .store
                    .transition_job(&id, JobStatus::Failed, Some(e.to_string()), None)
                    .await
                {
                    error!(job_id = %id, %store_err, "failed to transition job to failed");
                }
            }
        }
    }
}
