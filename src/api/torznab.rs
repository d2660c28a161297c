//! Torznab HTTP glue (§4.8): translates the single `GET /torznab/api`
//! endpoint's `t=` dispatch into calls against [`crate::torznab`], then
//! renders the result with [`crate::torznab::xml`]. Every response is XML,
//! including errors, per the Torznab convention.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::torznab::{self, xml, SearchParams, TorznabError};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct TorznabQuery {
    pub t: Option<String>,
    pub q: Option<String>,
    pub season: Option<i32>,
    pub ep: Option<i32>,
    pub tvdbid: Option<i64>,
    pub tmdbid: Option<i64>,
    pub imdbid: Option<String>,
    pub rid: Option<i64>,
    pub tvmazeid: Option<i64>,
    pub apikey: Option<String>,
}

impl From<&TorznabQuery> for SearchParams {
    fn from(q: &TorznabQuery) -> Self {
        SearchParams {
            q: q.q.clone(),
            season: q.season,
            ep: q.ep,
            tvdbid: q.tvdbid,
            tmdbid: q.tmdbid,
            imdbid: q.imdbid.clone(),
            rid: q.rid,
            tvmazeid: q.tvmazeid,
            apikey: q.apikey.clone(),
        }
    }
}

fn error_response(status: StatusCode, code: u16, description: &str) -> Response {
    (status, [("content-type", "application/xml")], xml::render_error(code, description)).into_response()
}

fn xml_response(body: String) -> Response {
    ([("content-type", "application/xml")], body).into_response()
}

impl IntoResponse for TorznabError {
    fn into_response(self) -> Response {
        match self {
            TorznabError::Unauthorized => error_response(StatusCode::UNAUTHORIZED, 100, &self.to_string()),
            TorznabError::MissingParam(_) | TorznabError::UnsupportedOp(_) => {
                error_response(StatusCode::BAD_REQUEST, 200, &self.to_string())
            }
            TorznabError::UnresolvedQuery => xml_response(xml::render_rss(&[])),
        }
    }
}

/// `GET /torznab/api` — the entire Torznab surface lives behind this one
/// route, dispatched on `t`.
pub async fn api(State(state): State<AppState>, Query(query): Query<TorznabQuery>) -> Response {
    if let Err(e) = torznab::check_apikey(&state.shared, query.apikey.as_deref()) {
        return e.into_response();
    }

    let params: SearchParams = (&query).into();
    match query.t.as_deref() {
        Some("caps") => xml_response(xml::render_caps()),
        Some("search") => match torznab::handle_search(&state.shared, &params).await {
            Ok(items) => xml_response(xml::render_rss(&items)),
            Err(e) => e.into_response(),
        },
        Some("tvsearch") => match torznab::handle_tvsearch(&state.shared, &params).await {
            Ok(items) => xml_response(xml::render_rss(&items)),
            Err(e) => e.into_response(),
        },
        Some(other) => TorznabError::UnsupportedOp(other.to_string()).into_response(),
        None => TorznabError::MissingParam("t").into_response(),
    }
}
