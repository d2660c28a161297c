use anyhow::{Result, bail};
use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::domain::{JobMode, JobStatus, Site};
use crate::entities::job::{ActiveModel, Column, Entity as Job, Model};

pub struct JobRepository {
    conn: DatabaseConnection,
}

/// Fields required to submit a new job. See `scheduler::Scheduler::submit`.
pub struct NewJob {
    pub id: String,
    pub mode: JobMode,
    pub site: Site,
    pub slug: String,
    pub season: i32,
    pub episode: i32,
    pub language: String,
    pub provider: Option<String>,
    pub title_hint: Option<String>,
    pub absolute_number: Option<i32>,
}

impl JobRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert_queued(&self, job: &NewJob) -> Result<Model> {
        let now = Utc::now();
        let active = ActiveModel {
            id: Set(job.id.clone()),
            status: Set(JobStatus::Queued.as_str().to_string()),
            mode: Set(job.mode.as_str().to_string()),
            site: Set(job.site.as_str().to_string()),
            slug: Set(job.slug.clone()),
            season: Set(job.season),
            episode: Set(job.episode),
            language: Set(job.language.clone()),
            provider: Set(job.provider.clone()),
            progress_percent: Set(0.0),
            downloaded_bytes: Set(0),
            total_bytes: Set(0),
            speed_bytes_per_sec: Set(0),
            eta_seconds: Set(None),
            message: Set(None),
            result_path: Set(None),
            title_hint: Set(job.title_hint.clone()),
            absolute_number: Set(job.absolute_number),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(Job::insert(active).exec_with_returning(&self.conn).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Model>> {
        Ok(Job::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn list_non_terminal(&self) -> Result<Vec<Model>> {
        Ok(Job::find()
            .filter(
                Column::Status
                    .is_in([JobStatus::Queued.as_str(), JobStatus::Downloading.as_str()]),
            )
            .all(&self.conn)
            .await?)
    }

    /// Reap every non-terminal job to `failed` on startup (§4.5).
    pub async fn reap_dangling(&self) -> Result<u64> {
        let dangling = self.list_non_terminal().await?;
        let count = dangling.len() as u64;
        for job in dangling {
            let mut active: ActiveModel = job.into();
            active.status = Set(JobStatus::Failed.as_str().to_string());
            active.message = Set(Some("dangling job reaped at startup".to_string()));
            active.updated_at = Set(Utc::now());
            Job::update(active).exec(&self.conn).await?;
        }
        Ok(count)
    }

    /// Transition status, enforcing monotonicity (invariant 1).
    pub async fn transition_status(
        &self,
        id: &str,
        next: JobStatus,
        message: Option<String>,
        result_path: Option<String>,
    ) -> Result<()> {
        let Some(current) = self.get(id).await? else {
            bail!("job {id} not found");
        };
        let Ok(current_status) = current.status.parse::<JobStatus>() else {
            bail!("job {id} has unparsable status {}", current.status);
        };
        if !current_status.can_transition_to(next) {
            bail!("illegal transition for job {id}: {current_status} -> {next}");
        }

        let mut active: ActiveModel = current.into();
        active.status = Set(next.as_str().to_string());
        active.updated_at = Set(Utc::now());
        if let Some(msg) = message {
            active.message = Set(Some(msg));
        }
        if let Some(path) = result_path {
            active.result_path = Set(Some(path));
        }
        if next == JobStatus::Completed {
            active.progress_percent = Set(100.0);
        }
        Job::update(active).exec(&self.conn).await?;
        Ok(())
    }

    /// Debounced progress write; callers are responsible for rate-limiting.
    pub async fn update_progress(
        &self,
        id: &str,
        percent: f32,
        downloaded_bytes: i64,
        total_bytes: i64,
        speed_bytes_per_sec: i64,
        eta_seconds: Option<i64>,
    ) -> Result<()> {
        let Some(current) = self.get(id).await? else {
            return Ok(());
        };
        let mut active: ActiveModel = current.into();
        active.progress_percent = Set(percent);
        active.downloaded_bytes = Set(downloaded_bytes);
        active.total_bytes = Set(total_bytes);
        active.speed_bytes_per_sec = Set(speed_bytes_per_sec);
        active.eta_seconds = Set(eta_seconds);
        active.updated_at = Set(Utc::now());
        Job::update(active).exec(&self.conn).await?;
        Ok(())
    }

    pub async fn list_completed_older_than(&self, cutoff: chrono::DateTime<Utc>) -> Result<Vec<Model>> {
        Ok(Job::find()
            .filter(Column::Status.eq(JobStatus::Completed.as_str()))
            .filter(Column::UpdatedAt.lt(cutoff))
            .order_by_asc(Column::UpdatedAt)
            .all(&self.conn)
            .await?)
    }
}
