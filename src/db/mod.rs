use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use crate::entities::client_task::Model as ClientTask;
pub use crate::entities::episode_availability::Model as EpisodeAvailability;
pub use crate::entities::episode_number_mapping::Model as EpisodeNumberMapping;
pub use crate::entities::job::Model as Job;
pub use crate::entities::strm_url_mapping::Model as StrmUrlMapping;
pub use repositories::availability::ProbeResult;
pub use repositories::client_task::NewClientTask;
pub use repositories::job::NewJob;
pub use repositories::strm_mapping::MappingKey;

use crate::domain::{EpisodeIdentity, JobStatus};

/// Facade over the per-entity repositories: one cheap `DatabaseConnection`
/// clone per call, delegated to a private
/// `*_repo()` constructor. Keeps callers from reaching into sea-orm
/// directly.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.starts_with("sqlite::memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    fn job_repo(&self) -> repositories::job::JobRepository {
        repositories::job::JobRepository::new(self.conn.clone())
    }

    fn client_task_repo(&self) -> repositories::client_task::ClientTaskRepository {
        repositories::client_task::ClientTaskRepository::new(self.conn.clone())
    }

    fn availability_repo(&self) -> repositories::availability::AvailabilityRepository {
        repositories::availability::AvailabilityRepository::new(self.conn.clone())
    }

    fn strm_mapping_repo(&self) -> repositories::strm_mapping::StrmMappingRepository {
        repositories::strm_mapping::StrmMappingRepository::new(self.conn.clone())
    }

    fn episode_number_mapping_repo(
        &self,
    ) -> repositories::episode_number_mapping::EpisodeNumberMappingRepository {
        repositories::episode_number_mapping::EpisodeNumberMappingRepository::new(
            self.conn.clone(),
        )
    }

    // -- Job -----------------------------------------------------------

    pub async fn insert_job(&self, job: &NewJob) -> Result<Job> {
        self.job_repo().insert_queued(job).await
    }

    pub async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        self.job_repo().get(id).await
    }

    pub async fn reap_dangling_jobs(&self) -> Result<u64> {
        self.job_repo().reap_dangling().await
    }

    pub async fn transition_job(
        &self,
        id: &str,
        next: JobStatus,
        message: Option<String>,
        result_path: Option<String>,
    ) -> Result<()> {
        self.job_repo()
            .transition_status(id, next, message, result_path)
            .await
    }

    pub async fn update_job_progress(
        &self,
        id: &str,
        percent: f32,
        downloaded_bytes: i64,
        total_bytes: i64,
        speed_bytes_per_sec: i64,
        eta_seconds: Option<i64>,
    ) -> Result<()> {
        self.job_repo()
            .update_progress(
                id,
                percent,
                downloaded_bytes,
                total_bytes,
                speed_bytes_per_sec,
                eta_seconds,
            )
            .await
    }

    pub async fn list_jobs_completed_before(
        &self,
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Job>> {
        self.job_repo().list_completed_older_than(cutoff).await
    }

    // -- ClientTask ------------------------------------------------------

    pub async fn get_or_insert_client_task(&self, new: &NewClientTask) -> Result<ClientTask> {
        self.client_task_repo().get_or_insert(new).await
    }

    pub async fn get_client_task(&self, info_hash: &str) -> Result<Option<ClientTask>> {
        self.client_task_repo().get(info_hash).await
    }

    pub async fn list_client_tasks(&self) -> Result<Vec<ClientTask>> {
        self.client_task_repo().list().await
    }

    pub async fn list_client_tasks_by_hashes(&self, hashes: &[String]) -> Result<Vec<ClientTask>> {
        self.client_task_repo().list_by_hashes(hashes).await
    }

    pub async fn set_client_task_paused(&self, info_hash: &str, paused: bool) -> Result<()> {
        self.client_task_repo().set_paused(info_hash, paused).await
    }

    pub async fn mark_client_task_completed(&self, info_hash: &str) -> Result<()> {
        self.client_task_repo().mark_completed(info_hash).await
    }

    pub async fn delete_client_task(&self, info_hash: &str) -> Result<()> {
        self.client_task_repo().delete(info_hash).await
    }

    // -- Availability ------------------------------------------------------

    pub async fn get_availability(
        &self,
        identity: &EpisodeIdentity,
    ) -> Result<Option<EpisodeAvailability>> {
        self.availability_repo().get(identity).await
    }

    pub async fn upsert_availability(
        &self,
        identity: &EpisodeIdentity,
        result: &ProbeResult,
    ) -> Result<()> {
        self.availability_repo().upsert(identity, result).await
    }

    pub async fn list_availability_for_series(
        &self,
        site: &str,
        slug: &str,
        season: i32,
    ) -> Result<Vec<EpisodeAvailability>> {
        self.availability_repo()
            .list_for_series(site, slug, season)
            .await
    }

    // -- StrmUrlMapping ------------------------------------------------------

    pub async fn get_strm_mapping(&self, key: &MappingKey<'_>) -> Result<Option<StrmUrlMapping>> {
        self.strm_mapping_repo().get(key).await
    }

    pub async fn upsert_strm_mapping(&self, key: &MappingKey<'_>, resolved_url: &str) -> Result<()> {
        self.strm_mapping_repo().upsert(key, resolved_url).await
    }

    pub async fn invalidate_strm_mapping(&self, key: &MappingKey<'_>) -> Result<()> {
        self.strm_mapping_repo().invalidate(key).await
    }

    // -- EpisodeNumberMapping ------------------------------------------------------

    pub async fn get_episode_mapping_by_absolute(
        &self,
        series_slug: &str,
        absolute: i32,
    ) -> Result<Option<EpisodeNumberMapping>> {
        self.episode_number_mapping_repo()
            .get_by_absolute(series_slug, absolute)
            .await
    }

    pub async fn get_episode_mapping_by_season_episode(
        &self,
        series_slug: &str,
        season: i32,
        episode: i32,
    ) -> Result<Option<EpisodeNumberMapping>> {
        self.episode_number_mapping_repo()
            .get_by_season_episode(series_slug, season, episode)
            .await
    }

    pub async fn list_episode_mappings_for_series(
        &self,
        series_slug: &str,
    ) -> Result<Vec<EpisodeNumberMapping>> {
        self.episode_number_mapping_repo()
            .list_for_series(series_slug)
            .await
    }

    pub async fn upsert_episode_mapping(
        &self,
        series_slug: &str,
        absolute: i32,
        season: i32,
        episode: i32,
        title: Option<String>,
    ) -> Result<()> {
        self.episode_number_mapping_repo()
            .upsert(series_slug, absolute, season, episode, title)
            .await
    }
}
