//! qBittorrent v2 Web API HTTP glue (§4.9). Routes mirror qBittorrent's own
//! path layout so arr clients configured against a "qBittorrent" download
//! client talk to this without any client-side changes. Auth is permissive:
//! `POST /auth/login` always succeeds and sets a session cookie; nothing
//! downstream re-checks it, matching real qBittorrent's behavior behind a
//! trusted reverse proxy.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::Deserialize;
use tower_sessions::Session;

use crate::qbit::{self, APP_VERSION, API_VERSION};

use super::AppState;

const OK: &str = "Ok.";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    #[allow(dead_code)]
    pub password: String,
}

/// `POST /auth/login` — any credentials are accepted (§4.9).
pub async fn login(session: Session, Form(form): Form<LoginForm>) -> Response {
    let _ = session.insert("user", form.username).await;
    ([("content-type", "text/plain")], OK).into_response()
}

/// `POST /auth/logout` — clears the session cookie.
pub async fn logout(session: Session) -> Response {
    let _ = session.flush().await;
    ([("content-type", "text/plain")], OK).into_response()
}

/// `GET /app/version`.
pub async fn version() -> Response {
    ([("content-type", "text/plain")], APP_VERSION).into_response()
}

/// `GET /app/webapiVersion`.
pub async fn webapi_version() -> Response {
    ([("content-type", "text/plain")], API_VERSION).into_response()
}

/// `GET /app/preferences` — just enough for clients that sanity-check the
/// default save path before queuing a download.
pub async fn preferences(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({
        "save_path": state.shared.config.general.download_dir,
        "max_active_downloads": state.shared.config.engine.max_concurrency,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct AddTorrentForm {
    pub urls: String,
    pub category: Option<String>,
    pub savepath: Option<String>,
    #[serde(default)]
    pub paused: String,
}

/// `POST /torrents/add` (§4.9, Scenario C).
pub async fn add(State(state): State<AppState>, Form(form): Form<AddTorrentForm>) -> Response {
    let paused = form.paused.eq_ignore_ascii_case("true");
    match qbit::add_torrent(
        &state.shared,
        &state.qbit,
        &form.urls,
        form.category.as_deref(),
        form.savepath.as_deref(),
        paused,
    )
    .await
    {
        Ok(()) => ([("content-type", "text/plain")], OK).into_response(),
        Err(e) => super::error::ApiError::validation(e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct HashesQuery {
    pub hashes: Option<String>,
}

fn split_hashes(hashes: &Option<String>) -> Option<Vec<String>> {
    hashes
        .as_deref()
        .map(|h| h.split('|').map(str::to_string).collect())
}

/// `GET /torrents/info` (§4.9).
pub async fn info(State(state): State<AppState>, Query(query): Query<HashesQuery>) -> Response {
    let hashes = split_hashes(&query.hashes);
    match qbit::list_torrents(&state.shared, hashes.as_deref()).await {
        Ok(torrents) => Json(torrents).into_response(),
        Err(e) => super::error::ApiError::internal(e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct HashQuery {
    pub hash: String,
}

/// `GET /torrents/files` (§4.9).
pub async fn files(State(state): State<AppState>, Query(query): Query<HashQuery>) -> Response {
    match qbit::torrent_files(&state.shared, &query.hash).await {
        Ok(Some(files)) => Json(files).into_response(),
        Ok(None) => super::error::ApiError::not_found("torrent", &query.hash).into_response(),
        Err(e) => super::error::ApiError::internal(e.to_string()).into_response(),
    }
}

/// `GET /torrents/properties` (§4.9).
pub async fn properties(State(state): State<AppState>, Query(query): Query<HashQuery>) -> Response {
    match qbit::torrent_properties(&state.shared, &query.hash).await {
        Ok(Some(props)) => Json(props).into_response(),
        Ok(None) => super::error::ApiError::not_found("torrent", &query.hash).into_response(),
        Err(e) => super::error::ApiError::internal(e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct HashesForm {
    pub hashes: String,
    #[serde(rename = "deleteFiles", default)]
    pub delete_files: String,
}

fn hashes_from_form(raw: &str) -> Vec<String> {
    raw.split('|').map(str::to_string).collect()
}

/// `POST /torrents/delete` (§4.9).
pub async fn delete(State(state): State<AppState>, Form(form): Form<HashesForm>) -> Response {
    let delete_files = form.delete_files.eq_ignore_ascii_case("true");
    let hashes = hashes_from_form(&form.hashes);
    match qbit::delete_torrents(&state.shared, &hashes, delete_files).await {
        Ok(()) => ([("content-type", "text/plain")], OK).into_response(),
        Err(e) => super::error::ApiError::internal(e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct HashesOnlyForm {
    pub hashes: String,
}

/// `POST /torrents/pause`.
pub async fn pause(State(state): State<AppState>, Form(form): Form<HashesOnlyForm>) -> Response {
    set_paused(state, &form.hashes, true).await
}

/// `POST /torrents/resume`.
pub async fn resume(State(state): State<AppState>, Form(form): Form<HashesOnlyForm>) -> Response {
    set_paused(state, &form.hashes, false).await
}

async fn set_paused(state: AppState, hashes: &str, paused: bool) -> Response {
    let hashes = hashes_from_form(hashes);
    match qbit::set_paused(&state.shared, &hashes, paused).await {
        Ok(()) => ([("content-type", "text/plain")], OK).into_response(),
        Err(e) => super::error::ApiError::internal(e.to_string()).into_response(),
    }
}

/// `GET /torrents/categories`.
pub async fn categories(State(state): State<AppState>) -> Response {
    Json(state.qbit.categories()).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryForm {
    pub category: String,
    #[serde(rename = "savePath")]
    pub save_path: String,
}

/// `POST /torrents/createCategory`.
pub async fn create_category(State(state): State<AppState>, Form(form): Form<CreateCategoryForm>) -> Response {
    state.qbit.create_category(&form.category, &form.save_path);
    ([("content-type", "text/plain")], OK).into_response()
}

#[derive(Debug, Deserialize)]
pub struct RemoveCategoriesForm {
    pub categories: String,
}

/// `POST /torrents/removeCategories`.
pub async fn remove_categories(State(state): State<AppState>, Form(form): Form<RemoveCategoriesForm>) -> Response {
    for name in form.categories.split('\n') {
        state.qbit.remove_category(name.trim());
    }
    ([("content-type", "text/plain")], OK).into_response()
}

#[derive(Debug, Deserialize)]
pub struct MaindataQuery {
    #[serde(default)]
    pub rid: i64,
}

/// `GET /sync/maindata` (§4.9).
pub async fn maindata(State(state): State<AppState>, Query(query): Query<MaindataQuery>) -> Response {
    match qbit::maindata(&state.shared, &state.qbit, query.rid).await {
        Ok(data) => Json(data).into_response(),
        Err(e) => super::error::ApiError::internal(e.to_string()).into_response(),
    }
}

/// Placeholder for transfer-info clients that probe global speed before
/// the first `sync/maindata` round trip.
pub async fn transfer_info(State(state): State<AppState>) -> Response {
    let map: HashMap<&str, i64> = HashMap::from([("dl_info_speed", 0), ("up_info_speed", 0)]);
    let _ = &state;
    Json(map).into_response()
}
