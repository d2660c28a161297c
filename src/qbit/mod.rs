//! qBittorrent v2 web API projection (§4.9): a path-compatible subset that
//! lets arr clients drive the scheduler as if it were a real torrent
//! client. `add` decodes a magnet into a `Job`+`ClientTask` pair; `info`,
//! `files`, `properties` project `ClientTask`+`Job` rows into the fields
//! those clients poll; `delete` cancels and tears down. Auth is permissive
//! by contract (§4.9: "login/logout are permissive"); the session cookie
//! itself is set/cleared by the HTTP glue in `api::qbit`.

use dashmap::DashMap;
use serde::Serialize;

use crate::db::{ClientTask, NewClientTask};
use crate::domain::{ClientTaskState, JobStatus};
use crate::magnet::{self, MagnetError};
use crate::runner::JobSpec;
use crate::state::SharedState;

pub const APP_VERSION: &str = "v4.6.0";
pub const API_VERSION: &str = "2.9.3";
pub const DEFAULT_CATEGORY: &str = "anibridge";

#[derive(Debug, thiserror::Error)]
pub enum QbitError {
    #[error("no urls provided")]
    NoUrls,
    #[error(transparent)]
    Magnet(#[from] MagnetError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// One entry in the façade's in-memory category map (§4.9: "an in-memory
/// map with default category"). Not persisted: qBittorrent itself treats
/// categories as ephemeral client-side configuration.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryInfo {
    pub name: String,
    #[serde(rename = "savePath")]
    pub save_path: String,
}

/// Façade-only state that has no `Job`/`ClientTask` counterpart: the
/// category map. Held alongside `SharedState`, not inside it, since nothing
/// in the core engine reads it.
pub struct QbitState {
    categories: DashMap<String, CategoryInfo>,
}

impl QbitState {
    #[must_use]
    pub fn new(default_save_path: &str) -> Self {
        let categories = DashMap::new();
        categories.insert(
            DEFAULT_CATEGORY.to_string(),
            CategoryInfo {
                name: DEFAULT_CATEGORY.to_string(),
                save_path: default_save_path.to_string(),
            },
        );
        Self { categories }
    }

    #[must_use]
    pub fn categories(&self) -> std::collections::HashMap<String, CategoryInfo> {
        self.categories
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn create_category(&self, name: &str, save_path: &str) {
        self.categories.insert(
            name.to_string(),
            CategoryInfo {
                name: name.to_string(),
                save_path: save_path.to_string(),
            },
        );
    }

    pub fn remove_category(&self, name: &str) {
        self.categories.remove(name);
    }

    fn save_path_for(&self, category: &str, fallback: &str) -> String {
        self.categories
            .get(category)
            .map(|c| c.save_path.clone())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// A qBittorrent `torrents/info` row, as returned in `sync/maindata` too.
#[derive(Debug, Clone, Serialize)]
pub struct TorrentInfo {
    pub hash: String,
    pub name: String,
    pub state: String,
    pub progress: f64,
    pub size: i64,
    pub category: String,
    pub save_path: String,
    pub content_path: String,
    pub added_on: i64,
    pub completion_on: i64,
    pub eta: i64,
    pub dlspeed: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "anibridgeAbsolute")]
    pub anibridge_absolute: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub size: i64,
    pub progress: f64,
    pub priority: i32,
    pub is_seed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TorrentProperties {
    pub save_path: String,
    pub creation_date: i64,
    pub total_size: i64,
    pub nb_connections: i32,
    pub share_ratio: f64,
}

/// Display name prefixed with `[ABS NNN]` when the originating magnet
/// carried `aw_abs=<N>` (§4.9: "the display name is prefixed").
fn display_name(base: &str, absolute_number: Option<i32>) -> String {
    match absolute_number {
        Some(n) => format!("[ABS {n:03}] {base}"),
        None => base.to_string(),
    }
}

/// `POST /torrents/add` (§4.9, Scenario C): decodes the magnet(s), submits
/// a `Job` to the scheduler, and mirrors it into a `ClientTask` row, deduped
/// by infohash (invariant: re-adding the same magnet is a no-op).
pub async fn add_torrent(
    state: &SharedState,
    qbit: &QbitState,
    urls: &str,
    category: Option<&str>,
    save_path: Option<&str>,
    paused: bool,
) -> Result<(), QbitError> {
    let magnets: Vec<&str> = urls
        .split_whitespace()
        .map(str::trim)
        .filter(|s| s.starts_with("magnet:?"))
        .collect();
    if magnets.is_empty() {
        return Err(QbitError::NoUrls);
    }

    for magnet_str in magnets {
        let payload = magnet::decode(magnet_str)?;
        let category = category.unwrap_or(DEFAULT_CATEGORY);
        let resolved_save_path = save_path
            .map(str::to_string)
            .unwrap_or_else(|| qbit.save_path_for(category, &state.config.general.download_dir));

        let spec = JobSpec {
            job_id: String::new(),
            identity: payload.identity.clone(),
            requested_provider: payload.provider.clone(),
            title_hint: Some(payload.display_name.clone()),
            alias_season_episode: None,
            absolute_number: payload.absolute_number,
        };

        let job = state.scheduler.submit(spec, payload.mode).await?;

        let new_task = NewClientTask {
            info_hash: job.id.clone(),
            job_id: job.id.clone(),
            display_name: display_name(&payload.display_name, payload.absolute_number),
            site: payload.identity.site.as_str().to_string(),
            slug: payload.identity.slug.clone(),
            season: payload.identity.season,
            episode: payload.identity.episode,
            language: payload.identity.language.clone(),
            provider: payload.provider.clone(),
            mode: payload.mode.as_str().to_string(),
            absolute_number: payload.absolute_number,
            save_path: resolved_save_path,
            category: category.to_string(),
        };
        let task = state.store.get_or_insert_client_task(&new_task).await?;
        if paused {
            state.store.set_client_task_paused(&task.info_hash, true).await?;
        }
    }

    Ok(())
}

/// `GET /torrents/info` and the `torrents` section of `sync/maindata`
/// (§4.9): projects each `ClientTask` plus its owning `Job` into the wire
/// shape qBittorrent-polling clients expect.
pub async fn list_torrents(
    state: &SharedState,
    hashes: Option<&[String]>,
) -> Result<Vec<TorrentInfo>, QbitError> {
    let tasks = match hashes {
        Some(hashes) if !hashes.is_empty() => state.store.list_client_tasks_by_hashes(hashes).await?,
        _ => state.store.list_client_tasks().await?,
    };

    let mut out = Vec::with_capacity(tasks.len());
    for task in tasks {
        out.push(project_torrent(state, &task).await?);
    }
    Ok(out)
}

async fn project_torrent(state: &SharedState, task: &ClientTask) -> Result<TorrentInfo, QbitError> {
    let job = state.store.get_job(&task.job_id).await?;

    let (status, progress, size, speed, eta, result_path) = match &job {
        Some(job) => (
            job.status.parse::<JobStatus>().unwrap_or(JobStatus::Queued),
            f64::from(job.progress_percent) / 100.0,
            job.total_bytes,
            job.speed_bytes_per_sec,
            job.eta_seconds.unwrap_or(-1),
            job.result_path.clone(),
        ),
        None => (JobStatus::Queued, 0.0, 0, 0, -1, None),
    };

    let qbit_state = ClientTaskState::derive(status, task.paused);
    let content_path = result_path.unwrap_or_else(|| task.save_path.clone());

    Ok(TorrentInfo {
        hash: task.info_hash.clone(),
        name: display_name(&task.display_name, task.absolute_number),
        state: qbit_state.as_qbit_state().to_string(),
        progress,
        size,
        category: task.category.clone(),
        save_path: task.save_path.clone(),
        content_path,
        added_on: task.added_at.timestamp(),
        completion_on: task.completed_at.map_or(-1, |t| t.timestamp()),
        eta,
        dlspeed: speed,
        anibridge_absolute: task.absolute_number,
    })
}

/// `GET /torrents/files` (§4.9): one synthetic file entry per task, since
/// the engine never produces multi-file torrents.
pub async fn torrent_files(state: &SharedState, info_hash: &str) -> Result<Option<Vec<FileInfo>>, QbitError> {
    let Some(task) = state.store.get_client_task(info_hash).await? else {
        return Ok(None);
    };
    let job = state.store.get_job(&task.job_id).await?;

    let (size, progress, is_seed, name) = match &job {
        Some(job) => (
            job.total_bytes,
            f64::from(job.progress_percent) / 100.0,
            job.status == "completed",
            job.result_path
                .clone()
                .unwrap_or_else(|| display_name(&task.display_name, task.absolute_number)),
        ),
        None => (0, 0.0, false, display_name(&task.display_name, task.absolute_number)),
    };

    Ok(Some(vec![FileInfo {
        name,
        size,
        progress,
        priority: 1,
        is_seed,
    }]))
}

/// `GET /torrents/properties` (§4.9).
pub async fn torrent_properties(
    state: &SharedState,
    info_hash: &str,
) -> Result<Option<TorrentProperties>, QbitError> {
    let Some(task) = state.store.get_client_task(info_hash).await? else {
        return Ok(None);
    };
    let job = state.store.get_job(&task.job_id).await?;
    let total_size = job.as_ref().map_or(0, |j| j.total_bytes);

    Ok(Some(TorrentProperties {
        save_path: task.save_path.clone(),
        creation_date: task.added_at.timestamp(),
        total_size,
        nb_connections: 1,
        share_ratio: 0.0,
    }))
}

/// `POST /torrents/delete` (§4.9): cancels the owning `Job` if it is not
/// already terminal, removes the `ClientTask` row, and (when `delete_files`)
/// removes any file the job produced.
pub async fn delete_torrents(state: &SharedState, hashes: &[String], delete_files: bool) -> Result<(), QbitError> {
    for hash in hashes {
        if let Some(job) = state.store.get_job(hash).await? {
            let status: JobStatus = job.status.parse().unwrap_or(JobStatus::Queued);
            if !status.is_terminal() {
                state.scheduler.cancel(hash);
            }
            if delete_files
                && let Some(path) = &job.result_path
            {
                let _ = tokio::fs::remove_file(path).await;
            }
        }
        state.store.delete_client_task(hash).await?;
    }
    Ok(())
}

/// `POST /torrents/pause` / `resume` (qBittorrent's separate endpoints,
/// both mirrored onto the same `ClientTask.paused` façade field).
pub async fn set_paused(state: &SharedState, hashes: &[String], paused: bool) -> Result<(), QbitError> {
    for hash in hashes {
        state.store.set_client_task_paused(hash, paused).await?;
    }
    Ok(())
}

/// `GET /sync/maindata` (§4.9): the composite snapshot arr clients poll.
#[derive(Debug, Serialize)]
pub struct MainData {
    pub rid: i64,
    pub full_update: bool,
    pub torrents: std::collections::HashMap<String, TorrentInfo>,
    pub categories: std::collections::HashMap<String, CategoryInfo>,
    pub server_state: ServerState,
}

#[derive(Debug, Serialize)]
pub struct ServerState {
    pub connection_status: &'static str,
    pub dl_info_speed: i64,
    pub up_info_speed: i64,
    pub free_space_on_disk: i64,
}

pub async fn maindata(state: &SharedState, qbit: &QbitState, rid: i64) -> Result<MainData, QbitError> {
    let torrents = list_torrents(state, None).await?;
    let dl_speed = torrents.iter().map(|t| t.dlspeed).sum();

    Ok(MainData {
        rid: rid + 1,
        full_update: true,
        torrents: torrents.into_iter().map(|t| (t.hash.clone(), t)).collect(),
        categories: qbit.categories(),
        server_state: ServerState {
            connection_status: "connected",
            dl_info_speed: dl_speed,
            up_info_speed: 0,
            free_space_on_disk: free_space(&state.config.general.download_dir),
        },
    })
}

/// qBittorrent reports free disk space as a byte count, `-1` when unknown.
/// No cross-platform stdlib call exists for this without a crate the rest
/// of the stack doesn't otherwise need, so an existing-path check is the
/// honest signal available here.
fn free_space(path: &str) -> i64 {
    if std::fs::metadata(path).is_ok() { -1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefixes_absolute_number() {
        assert_eq!(display_name("Naruto.S01E01", Some(13)), "[ABS 013] Naruto.S01E01");
        assert_eq!(display_name("Naruto.S01E01", None), "Naruto.S01E01");
    }

    #[test]
    fn qbit_state_defaults_to_download_category_save_path() {
        let qbit = QbitState::new("/data/downloads");
        let categories = qbit.categories();
        assert_eq!(categories[DEFAULT_CATEGORY].save_path, "/data/downloads");
    }

    #[test]
    fn qbit_state_tracks_created_categories() {
        let qbit = QbitState::new("/data/downloads");
        qbit.create_category("anime-movies", "/data/movies");
        assert_eq!(qbit.save_path_for("anime-movies", "/fallback"), "/data/movies");
        qbit.remove_category("anime-movies");
        assert_eq!(qbit.save_path_for("anime-movies", "/fallback"), "/fallback");
    }
}
