mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

#[tokio::test]
async fn caps_lists_the_supported_search_modes_without_touching_the_network() {
    let app = common::spawn_app().await;

    let response = app
        .oneshot(Request::builder().uri("/torznab/api?t=caps").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let xml = String::from_utf8(body.to_vec()).unwrap();
    assert!(xml.contains("<caps>"));
    assert!(xml.contains("tvmazeid"));
}

#[tokio::test]
async fn an_empty_search_query_returns_the_connectivity_test_item() {
    let app = common::spawn_app().await;

    let response = app
        .oneshot(Request::builder().uri("/torznab/api?t=search").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let xml = String::from_utf8(body.to_vec()).unwrap();
    assert!(xml.contains("<item>"));
    assert!(xml.contains("AniBridge Connectivity Test"));
    assert!(xml.contains("magnet:?xt=urn:btih:"));
}

#[tokio::test]
async fn an_unsupported_operation_is_a_well_formed_torznab_error_not_a_bare_500() {
    let app = common::spawn_app().await;

    let response = app
        .oneshot(Request::builder().uri("/torznab/api?t=bogus").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let xml = String::from_utf8(body.to_vec()).unwrap();
    assert!(xml.contains("<error"));
    assert!(xml.contains("code=\"200\""));
}

#[tokio::test]
async fn a_missing_apikey_is_rejected_once_one_is_configured() {
    let mut config = common::test_config();
    config.engine.indexer_api_key = Some("sekrit".to_string());
    let app = common::spawn_app_with(config).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/torznab/api?t=caps").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/torznab/api?t=caps&apikey=sekrit")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn tvsearch_without_a_query_is_a_missing_param_error() {
    let app = common::spawn_app().await;

    let response = app
        .oneshot(Request::builder().uri("/torznab/api?t=tvsearch").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
