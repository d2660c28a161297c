use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anibridge::api::{self, AppState};
use anibridge::config::{Config, StrmProxyAuthMode, StrmProxySecret};
use anibridge::state::SharedState;
use axum::Router;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// One scratch directory per test, under the OS temp dir, so every test gets
/// its own sqlite file and download dir without a `tempfile` dependency.
fn scratch_dir() -> std::path::PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("anibridge-test-{}-{id}", std::process::id()))
}

pub fn test_config() -> Config {
    let dir = scratch_dir();
    let mut config = Config::default();
    config.general.data_dir = dir.join("data").to_string_lossy().into_owned();
    config.general.download_dir = dir.join("downloads").to_string_lossy().into_owned();
    config.strm.auth_mode = StrmProxyAuthMode::None;
    config.strm.secret = StrmProxySecret("test-secret-not-for-production".to_string());
    config.observability.metrics_enabled = false;
    config.engine.torznab_connectivity_test_item = true;
    config
}

pub async fn spawn_app() -> Router {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: Config) -> Router {
    let shared = Arc::new(SharedState::new(config).await.expect("build shared state"));
    let state = AppState::new(shared);
    api::router(state)
}
