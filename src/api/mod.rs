//! HTTP surface: the Torznab indexer, the qBittorrent-compatible façade,
//! the STRM reverse proxy, and a health probe, all mounted on one
//! `AppState`.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::qbit::QbitState;
use crate::state::SharedState;
use crate::strmproxy::StrmProxyState;

pub mod error;
pub mod health;
pub mod qbit;
pub mod torznab;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,
    pub qbit: Arc<QbitState>,
    pub start_time: std::time::Instant,
}

impl AppState {
    #[must_use]
    pub fn new(shared: Arc<SharedState>) -> Self {
        let qbit = Arc::new(QbitState::new(&shared.config.general.download_dir));
        Self {
            shared,
            qbit,
            start_time: std::time::Instant::now(),
        }
    }
}

fn strm_proxy_state(state: &AppState) -> StrmProxyState {
    let config = &state.shared.config;
    StrmProxyState {
        client: state.shared.client.clone(),
        store: state.shared.store.clone(),
        prober: Arc::clone(&state.shared.prober),
        mode: config.strm.proxy_mode,
        auth_mode: config.strm.auth_mode,
        secret: config.strm.secret.0.clone(),
        public_base_url: config.strm.public_base_url.clone(),
        token_ttl_seconds: config.strm.token_ttl_seconds,
        hls_remux: config.strm.hls_remux,
    }
}

pub fn router(state: AppState) -> Router {
    let cors_origins = state.shared.config.server.cors_allowed_origins.clone();

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(1)));

    let qbit_router = Router::new()
        .route("/auth/login", post(qbit::login))
        .route("/auth/logout", post(qbit::logout))
        .route("/app/version", get(qbit::version))
        .route("/app/webapiVersion", get(qbit::webapi_version))
        .route("/app/preferences", get(qbit::preferences))
        .route("/torrents/add", post(qbit::add))
        .route("/torrents/info", get(qbit::info))
        .route("/torrents/files", get(qbit::files))
        .route("/torrents/properties", get(qbit::properties))
        .route("/torrents/delete", post(qbit::delete))
        .route("/torrents/pause", post(qbit::pause))
        .route("/torrents/resume", post(qbit::resume))
        .route("/torrents/categories", get(qbit::categories))
        .route("/torrents/createCategory", post(qbit::create_category))
        .route("/torrents/removeCategories", post(qbit::remove_categories))
        .route("/sync/maindata", get(qbit::maindata))
        .route("/transfer/info", get(qbit::transfer_info))
        .layer(session_layer);

    let torznab_router = Router::new().route("/torznab/api", get(torznab::api));

    let strm_router = Router::new()
        .route("/strm/stream", get(crate::strmproxy::stream_handler))
        .route("/strm/proxy", get(crate::strmproxy::proxy_handler))
        .with_state(strm_proxy_state(&state));

    let health_router = Router::new().route("/health", get(health::health));

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api/v2", qbit_router)
        .merge(torznab_router)
        .merge(health_router)
        .with_state(state)
        .merge(strm_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}
