mod common;

use anibridge::domain::{EpisodeIdentity, JobMode, Site};
use anibridge::magnet::{self, MagnetPayload};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

fn naruto_magnet() -> (String, String) {
    let payload = MagnetPayload {
        identity: EpisodeIdentity::new(Site::Aniworld, "naruto".to_string(), 1, 1, "German Dub".to_string()),
        provider: Some("VOE".to_string()),
        mode: JobMode::Download,
        display_name: "Naruto.S01E01.1080p.WEB.H264.GER-ANIWORLD".to_string(),
        size_bytes: 900_000_000,
        absolute_number: None,
    };
    let infohash = magnet::derive_infohash(&payload.identity, payload.provider.as_deref(), payload.mode);
    (magnet::encode(&payload), infohash)
}

fn form_body(pairs: &[(&str, &str)]) -> Body {
    let encoded = pairs
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    Body::from(encoded)
}

#[tokio::test]
async fn adding_a_magnet_queues_a_job_and_a_matching_client_task() {
    let app = common::spawn_app().await;
    let (magnet_str, infohash) = naruto_magnet();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v2/torrents/add")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(form_body(&[("urls", &magnet_str)]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"Ok.");

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v2/torrents/info?hashes={infohash}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let torrents: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let torrents = torrents.as_array().unwrap();
    assert_eq!(torrents.len(), 1);
    assert_eq!(torrents[0]["hash"], infohash);
    assert_eq!(torrents[0]["category"], "anibridge");
    assert!(torrents[0]["name"].as_str().unwrap().contains("Naruto"));
}

#[tokio::test]
async fn re_adding_the_same_magnet_does_not_create_a_second_task() {
    let app = common::spawn_app().await;
    let (magnet_str, infohash) = naruto_magnet();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v2/torrents/add")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(form_body(&[("urls", &magnet_str)]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(Request::builder().uri("/api/v2/torrents/info").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let torrents: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let matching = torrents.as_array().unwrap().iter().filter(|t| t["hash"] == infohash).count();
    assert_eq!(matching, 1);
}

#[tokio::test]
async fn adding_with_no_magnet_urls_is_a_validation_error_not_a_crash() {
    let app = common::spawn_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v2/torrents/add")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(form_body(&[("urls", "not a magnet")]))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn app_version_and_webapi_version_are_reachable_without_auth() {
    let app = common::spawn_app().await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/v2/app/version").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/api/v2/app/webapiVersion").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn default_category_exists_with_the_configured_download_dir_as_its_save_path() {
    let app = common::spawn_app().await;

    let response = app
        .oneshot(Request::builder().uri("/api/v2/torrents/categories").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let categories: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(categories["anibridge"]["savePath"].is_string());
}
