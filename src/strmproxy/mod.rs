//! STRM reverse proxy (§4.7): the handlers a player's `.strm` file ultimately
//! points at. `/strm/stream` resolves (and caches) an episode identity's
//! upstream URL; `/strm/proxy` re-proxies an already-resolved, opaque URL
//! (used for HLS child playlists and segments after rewriting). Both byte-
//! proxy with Range passthrough and retry once on a refreshable upstream
//! failure (invariant 7).

pub mod auth;
pub mod hls;

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use futures::StreamExt;
use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::availability::Prober;
use crate::config::{StrmProxyAuthMode, StrmProxyMode};
use crate::constants::strm::REFRESHABLE_STATUSES;
use crate::db::{MappingKey, Store};
use crate::domain::{EpisodeIdentity, Site};

#[derive(Clone)]
pub struct StrmProxyState {
    pub client: reqwest::Client,
    pub store: Store,
    pub prober: Arc<Prober>,
    pub mode: StrmProxyMode,
    pub auth_mode: StrmProxyAuthMode,
    pub secret: String,
    pub public_base_url: String,
    pub token_ttl_seconds: i64,
    pub hls_remux: bool,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub site: String,
    pub slug: String,
    pub s: i32,
    pub e: i32,
    pub lang: String,
    pub provider: Option<String>,
    pub exp: Option<i64>,
    pub sig: Option<String>,
    pub apikey: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub u: String,
    pub exp: Option<i64>,
    pub sig: Option<String>,
    pub apikey: Option<String>,
}

fn auth_error_response(message: &str) -> Response {
    (StatusCode::FORBIDDEN, message.to_string()).into_response()
}

fn check_stream_auth(state: &StrmProxyState, q: &StreamQuery) -> Result<(), Response> {
    match state.auth_mode {
        StrmProxyAuthMode::None => Ok(()),
        StrmProxyAuthMode::ApiKey => {
            let provided = q.apikey.as_deref().unwrap_or_default();
            if auth::verify_apikey(&state.secret, provided) {
                Ok(())
            } else {
                Err(auth_error_response("invalid api key"))
            }
        }
        StrmProxyAuthMode::Token => {
            let exp = q.exp.ok_or_else(|| auth_error_response("missing exp"))?;
            let sig = q.sig.as_deref().ok_or_else(|| auth_error_response("missing sig"))?;
            let params = auth::SignableParams {
                site: &q.site,
                slug: &q.slug,
                season: q.s,
                episode: q.e,
                language: &q.lang,
                provider: q.provider.as_deref(),
                target_url: None,
                exp,
            };
            auth::verify_token(&state.secret, &params, sig)
                .map_err(|e| auth_error_response(&e.to_string()))
        }
    }
}

fn check_proxy_auth(state: &StrmProxyState, q: &ProxyQuery) -> Result<(), Response> {
    match state.auth_mode {
        StrmProxyAuthMode::None => Ok(()),
        StrmProxyAuthMode::ApiKey => {
            let provided = q.apikey.as_deref().unwrap_or_default();
            if auth::verify_apikey(&state.secret, provided) {
                Ok(())
            } else {
                Err(auth_error_response("invalid api key"))
            }
        }
        StrmProxyAuthMode::Token => {
            let exp = q.exp.ok_or_else(|| auth_error_response("missing exp"))?;
            let sig = q.sig.as_deref().ok_or_else(|| auth_error_response("missing sig"))?;
            let params = auth::SignableParams {
                site: "",
                slug: "",
                season: 0,
                episode: 0,
                language: "",
                provider: None,
                target_url: Some(&q.u),
                exp,
            };
            auth::verify_token(&state.secret, &params, sig)
                .map_err(|e| auth_error_response(&e.to_string()))
        }
    }
}

/// `GET /strm/stream` — entry point a `.strm` file's URL resolves to.
pub async fn stream_handler(
    State(state): State<StrmProxyState>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = check_stream_auth(&state, &query) {
        return resp;
    }

    let site: Site = match query.site.parse() {
        Ok(s) => s,
        Err(_) => return (StatusCode::BAD_REQUEST, "unknown site").into_response(),
    };
    let identity = EpisodeIdentity {
        site,
        slug: query.slug.clone(),
        season: query.s,
        episode: query.e,
        language: query.lang.clone(),
    };
    let key = MappingKey {
        site: identity.site.as_str(),
        slug: &identity.slug,
        season: identity.season,
        episode: identity.episode,
        language: &identity.language,
        provider: query.provider.as_deref().unwrap_or(""),
    };

    let cached = state.store.get_strm_mapping(&key).await.ok().flatten();
    let upstream_url = match cached {
        Some(row) => row.resolved_url,
        None => match state
            .prober
            .resolve_direct_url(&identity, query.provider.as_deref())
            .await
        {
            Ok((provider, stream)) => {
                let resolved_key = MappingKey { provider: &provider, ..key };
                let _ = state
                    .store
                    .upsert_strm_mapping(&resolved_key, &stream.direct_url)
                    .await;
                stream.direct_url
            }
            Err(e) => {
                warn!(%identity, %e, "strm proxy failed to resolve upstream URL");
                return (StatusCode::BAD_GATEWAY, "no provider available").into_response();
            }
        },
    };

    if matches!(state.mode, StrmProxyMode::Redirect) {
        return Redirect::temporary(&upstream_url).into_response();
    }

    proxy_upstream(&state, &upstream_url, &headers, Some(&key)).await
}

/// `GET /strm/proxy` — re-proxies an already-resolved URL, used for HLS
/// child playlists/segments rewritten by [`hls::rewrite_playlist`].
pub async fn proxy_handler(
    State(state): State<StrmProxyState>,
    Query(query): Query<ProxyQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = check_proxy_auth(&state, &query) {
        return resp;
    }
    proxy_upstream(&state, &query.u, &headers, None).await
}

/// Fetches `url`, forwarding the client's `Range` header, and streams the
/// response back byte-for-byte (or rewrites it if it is an HLS playlist).
/// `mapping_key`, when present, is invalidated and retried once on a
/// refreshable upstream failure (invariant 7).
async fn proxy_upstream(
    state: &StrmProxyState,
    url: &str,
    client_headers: &HeaderMap,
    mapping_key: Option<&MappingKey<'_>>,
) -> Response {
    let mut attempt_url = url.to_string();

    for attempt in 0..2 {
        let mut req = state.client.get(&attempt_url);
        if let Some(range) = client_headers.get(header::RANGE) {
            req = req.header(header::RANGE, range.clone());
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(%attempt_url, %e, "strm proxy upstream request failed");
                if attempt == 0
                    && let Some(key) = mapping_key
                    && let Some(refreshed) = refresh_mapping(state, key).await
                {
                    attempt_url = refreshed;
                    continue;
                }
                return (StatusCode::BAD_GATEWAY, "upstream request failed").into_response();
            }
        };

        let status = resp.status();
        if REFRESHABLE_STATUSES.contains(&status.as_u16()) && attempt == 0 {
            if let Some(key) = mapping_key
                && let Some(refreshed) = refresh_mapping(state, key).await
            {
                attempt_url = refreshed;
                continue;
            }
        }

        return stream_or_rewrite_response(state, &attempt_url, resp).await;
    }

    (StatusCode::BAD_GATEWAY, "upstream refresh exhausted").into_response()
}

/// Re-probes the given mapping key, invalidating the stale cache entry
/// first so the next resolution cannot return the same dead URL.
async fn refresh_mapping(state: &StrmProxyState, key: &MappingKey<'_>) -> Option<String> {
    let _ = state.store.invalidate_strm_mapping(key).await;

    let site: Site = key.site.parse().ok()?;
    let identity = EpisodeIdentity {
        site,
        slug: key.slug.to_string(),
        season: key.season,
        episode: key.episode,
        language: key.language.to_string(),
    };
    let requested = if key.provider.is_empty() { None } else { Some(key.provider) };
    let (provider, extracted) = state.prober.resolve_direct_url(&identity, requested).await.ok()?;
    let resolved_key = MappingKey { provider: &provider, ..*key };
    let _ = state.store.upsert_strm_mapping(&resolved_key, &extracted.direct_url).await;
    Some(extracted.direct_url)
}

async fn stream_or_rewrite_response(state: &StrmProxyState, source_url: &str, resp: reqwest::Response) -> Response {
    let status = resp.status();
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let content_range = resp.headers().get(header::CONTENT_RANGE).cloned();
    let accept_ranges = resp.headers().get(header::ACCEPT_RANGES).cloned();
    let content_length = resp.headers().get(header::CONTENT_LENGTH).cloned();
    let etag = resp.headers().get(header::ETAG).cloned();
    let last_modified = resp.headers().get(header::LAST_MODIFIED).cloned();

    // HLS playlists are small text; buffer, rewrite, and serve whole.
    let is_probably_hls = content_type
        .as_deref()
        .map(|ct| ct.contains("mpegurl"))
        .unwrap_or(false)
        || source_url.ends_with(".m3u8");

    if is_probably_hls {
        if let Some(remuxed) = try_hls_remux(state, source_url).await {
            return remuxed;
        }

        let body = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(%e, "failed reading HLS playlist body");
                return (StatusCode::BAD_GATEWAY, "upstream read failed").into_response();
            }
        };
        if !hls::is_hls_playlist(content_type.as_deref(), &body) {
            return passthrough_bytes(status, content_type, body.to_vec());
        }
        let Ok(text) = std::str::from_utf8(&body) else {
            return passthrough_bytes(status, content_type, body.to_vec());
        };
        let Ok(playlist_url) = Url::parse(source_url) else {
            return passthrough_bytes(status, content_type, body.to_vec());
        };

        let base = state.public_base_url.clone();
        let secret = state.secret.clone();
        let ttl = state.token_ttl_seconds;
        let base_for_loop_check = base.clone();
        let rewritten = hls::rewrite_playlist(&playlist_url, text, |target| {
            if target.starts_with(&base_for_loop_check) {
                return target.to_string();
            }
            auth::sign_proxy_url(&base, &secret, ttl, target)
        });

        let mut builder = Response::builder().status(status);
        builder = builder.header(header::CONTENT_TYPE, "application/vnd.apple.mpegurl");
        return builder.body(Body::from(rewritten)).unwrap_or_else(|_| {
            (StatusCode::INTERNAL_SERVER_ERROR, "failed building response").into_response()
        });
    }

    let mut builder = Response::builder().status(status);
    if let Some(ct) = content_type.as_ref()
        && let Ok(value) = HeaderValue::from_str(ct)
    {
        builder = builder.header(HeaderName::from_static("content-type"), value);
    }
    if let Some(cr) = content_range {
        builder = builder.header(header::CONTENT_RANGE, cr);
    }
    if let Some(ar) = accept_ranges {
        builder = builder.header(header::ACCEPT_RANGES, ar);
    }
    if let Some(cl) = content_length {
        builder = builder.header(header::CONTENT_LENGTH, cl);
    }
    if let Some(et) = etag {
        builder = builder.header(header::ETAG, et);
    }
    if let Some(lm) = last_modified {
        builder = builder.header(header::LAST_MODIFIED, lm);
    }

    let byte_stream = resp.bytes_stream().map(|chunk| chunk.map_err(std::io::Error::other));
    builder
        .body(Body::from_stream(byte_stream))
        .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, "failed building response").into_response())
}

/// Optional HLS remux (§4.7, design-note trade-off): pipes the upstream
/// playlist through `ffmpeg` into fragmented MP4 with `-c:v copy` and a
/// normalised audio track, so players that read bitrate from container-level
/// metadata (rather than the playlist) see a non-zero value. Gated by
/// `StrmProxyHlsRemux`; any failure to spawn falls back to the plain rewrite
/// path in the caller, per the design note's "always falls back on error".
async fn try_hls_remux(state: &StrmProxyState, source_url: &str) -> Option<Response> {
    if !state.hls_remux {
        return None;
    }

    let mut child = tokio::process::Command::new("ffmpeg")
        .args([
            "-loglevel",
            "error",
            "-i",
            source_url,
            "-c:v",
            "copy",
            "-c:a",
            "aac",
            "-af",
            "loudnorm",
            "-f",
            "mp4",
            "-movflags",
            "frag_keyframe+empty_moov+default_base_moof",
            "pipe:1",
        ])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| warn!(%e, "failed to spawn ffmpeg for hls remux, falling back to playlist rewrite"))
        .ok()?;

    let stdout = child.stdout.take()?;
    tokio::spawn(async move {
        let _ = child.wait().await;
    });

    let stream = futures::stream::try_unfold(stdout, |mut reader| async move {
        use tokio::io::AsyncReadExt;
        let mut buf = vec![0u8; crate::constants::strm::DEFAULT_CHUNK_SIZE_BYTES];
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            Ok(None)
        } else {
            buf.truncate(n);
            Ok(Some((axum::body::Bytes::from(buf), reader)))
        }
    });

    Some(
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "video/mp4")
            .body(Body::from_stream(stream))
            .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, "failed building response").into_response()),
    )
}

fn passthrough_bytes(status: StatusCode, content_type: Option<String>, body: Vec<u8>) -> Response {
    let mut builder = Response::builder().status(status);
    if let Some(ct) = content_type {
        builder = builder.header(header::CONTENT_TYPE, ct);
    }
    builder
        .body(Body::from(body))
        .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, "failed building response").into_response())
}
