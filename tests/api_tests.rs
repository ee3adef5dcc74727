//! End-to-end tests of the HTTP API over artifacts written to a temp directory
//!
//! Tests:
//! 1. /predict returns a probability in [0, 100] with aligned names and values
//! 2. /info returns the personal-attribute row verbatim
//! 3. /distribution returns the stored cell and the full column
//! 4. Unknown ids and features are answered with 400 + {"error": ...}
//! 5. Malformed payloads are answered with 400
//! 6. Attribution values add up to the model margin when a scaler is applied
//! 7. One-hot boolean feature columns score as 1/0 and distribute as booleans
//! 8. Every response carries an x-request-id

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use credit_scoring_api::api::REQUEST_ID_HEADER;
use credit_scoring_api::{artifacts, router, ApiMetrics, AppConfig, AppState};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

const FEATURES: &str = "\
SK_ID_CURR,TARGET,EXT_SOURCE_2,INCOME_PER_PERSON,CNT_CHILDREN,DAYS_EMPLOYED
100002,1,0.262949,202500.0,0,-637
100003,0,0.622246,135000.0,0,-1188
100004,0,0.555912,67500.0,0,-225
100006,0,0.650442,,1,-3039
100007,0,0.322738,121500.0,2,-3038
";

const PERSONAL_INFO: &str = "\
SK_ID_CURR,CODE_GENDER,AGE,NAME_FAMILY_STATUS,INCOME_PER_PERSON,FLAG_OWN_CAR
100002,M,25,Single / not married,202500.0,False
100003,F,45,Married,67500.0,False
100004,M,52,Single / not married,67500.0,True
100006,F,52,Civil marriage,,False
";

const MODEL: &str = r#"{
    "name": "credit-gbm",
    "base_score": -2.0,
    "feature_names": ["EXT_SOURCE_2", "INCOME_PER_PERSON", "CNT_CHILDREN", "DAYS_EMPLOYED"],
    "trees": [
        { "nodes": [
            { "split_feature": 0, "threshold": 0.0, "left": 1, "right": 2, "cover": 500 },
            { "split_feature": 3, "threshold": 0.0, "left": 3, "right": 4, "cover": 250 },
            { "leaf_value": -0.7, "cover": 250 },
            { "leaf_value": 0.6, "cover": 150 },
            { "leaf_value": 1.1, "cover": 100 }
        ] },
        { "nodes": [
            { "split_feature": 1, "threshold": 0.5, "left": 1, "right": 2, "missing_left": false, "cover": 500 },
            { "split_feature": 2, "threshold": 0.5, "left": 3, "right": 4, "cover": 300 },
            { "leaf_value": -0.2, "cover": 200 },
            { "leaf_value": 0.3, "cover": 220 },
            { "leaf_value": 0.05, "cover": 80 }
        ] }
    ]
}"#;

const SCALER: &str = r#"{
    "mean": [0.49, 131625.0, 0.6, -1625.4],
    "scale": [0.16, 48000.0, 0.8, 1150.0]
}"#;

/// One-hot encoded feature table, booleans written the way a dataframe exports them
const ONE_HOT_FEATURES: &str = "\
SK_ID_CURR,TARGET,EXT_SOURCE_2,NAME_CONTRACT_TYPE_Cash loans
100002,1,0.262949,True
100004,0,0.555912,False
100007,0,0.322738,True
";

const ONE_HOT_MODEL: &str = r#"{
    "feature_names": ["EXT_SOURCE_2", "NAME_CONTRACT_TYPE_Cash loans"],
    "trees": [
        { "nodes": [
            { "split_feature": 1, "threshold": 0.5, "left": 1, "right": 2, "cover": 3 },
            { "leaf_value": -1.0, "cover": 1 },
            { "leaf_value": 1.0, "cover": 2 }
        ] }
    ]
}"#;

fn write_artifacts(dir: &Path) {
    std::fs::write(dir.join("df300.csv"), FEATURES).unwrap();
    std::fs::write(dir.join("personal_info.csv"), PERSONAL_INFO).unwrap();
    std::fs::write(dir.join("model.json"), MODEL).unwrap();
    std::fs::write(dir.join("scaler.json"), SCALER).unwrap();
    std::fs::write(dir.join("one_hot.csv"), ONE_HOT_FEATURES).unwrap();
    std::fs::write(dir.join("one_hot_model.json"), ONE_HOT_MODEL).unwrap();
}

fn app_with(configure: impl FnOnce(&mut AppConfig)) -> Router {
    let dir = tempfile::tempdir().unwrap();
    write_artifacts(dir.path());

    let mut config = AppConfig::default();
    config.data.model_file = "model.json".to_string();
    configure(&mut config);

    let service = artifacts::load_service_from(dir.path(), &config).unwrap();
    let state = Arc::new(AppState::new(service, Arc::new(ApiMetrics::new())));
    router(state)
}

fn app() -> Router {
    app_with(|_| {})
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_predict_known_client() {
    let app = app();
    let (status, json) = post_json(&app, "/predict", json!({"SK_ID_CURR": 100004})).await;

    assert_eq!(status, StatusCode::OK);
    let probability = json["probability"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&probability));

    let names = json["feature_names"].as_array().unwrap();
    let values = json["feature_values"].as_array().unwrap();
    assert_eq!(names.len(), 4);
    assert_eq!(values.len(), names.len());
    assert_eq!(names[0], "EXT_SOURCE_2");
    assert_eq!(values[1], json!(67500.0));

    // tree-ensemble model explains itself
    let shap = json["shap_values"].as_array().unwrap();
    assert_eq!(shap.len(), names.len());
}

#[tokio::test]
async fn test_predict_matches_model() {
    let app = app();
    let (_, json) = post_json(&app, "/predict", json!({"SK_ID_CURR": 100002})).await;

    // tree 1: 0.26 > 0 -> -0.7; tree 2: 202500 > 0.5 -> -0.2
    let expected = 100.0 / (1.0 + (2.9f64).exp());
    let probability = json["probability"].as_f64().unwrap();
    assert!((probability - expected).abs() < 1e-9);
}

#[tokio::test]
async fn test_predict_missing_feature_value_is_null() {
    let app = app();
    let (status, json) = post_json(&app, "/predict", json!({"SK_ID_CURR": 100006})).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["feature_values"][1].is_null());
}

#[tokio::test]
async fn test_info_known_client() {
    let app = app();
    let (status, json) = post_json(&app, "/info", json!({"SK_ID_CURR": 100004})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["SK_ID_CURR"], json!(100004));
    assert_eq!(json["INCOME_PER_PERSON"], json!(67500.0));
    assert_eq!(json["NAME_FAMILY_STATUS"], json!("Single / not married"));
    assert_eq!(json["FLAG_OWN_CAR"], json!(true));
    assert_eq!(json.as_object().unwrap().len(), 6);
}

#[tokio::test]
async fn test_info_missing_value_is_null() {
    let app = app();
    let (_, json) = post_json(&app, "/info", json!({"SK_ID_CURR": 100006})).await;
    assert!(json["INCOME_PER_PERSON"].is_null());
}

#[tokio::test]
async fn test_distribution_known_client() {
    let app = app();
    let (status, json) = post_json(
        &app,
        "/distribution",
        json!({"SK_ID_CURR": 100004, "feature": "INCOME_PER_PERSON"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["feature"], "INCOME_PER_PERSON");
    assert_eq!(json["client_value"], json!(67500.0));

    let distribution = json["distribution"].as_array().unwrap();
    assert_eq!(distribution.len(), 5);
    assert_eq!(distribution[0], json!(202500.0));
    assert!(distribution[3].is_null());
}

#[tokio::test]
async fn test_distribution_integer_column() {
    let app = app();
    let (status, json) = post_json(
        &app,
        "/distribution",
        json!({"SK_ID_CURR": 100007, "feature": "CNT_CHILDREN"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["client_value"], json!(2));
    assert_eq!(json["distribution"], json!([0, 0, 0, 1, 2]));
}

#[tokio::test]
async fn test_unknown_client_is_rejected_everywhere() {
    let app = app();

    for (uri, body) in [
        ("/predict", json!({"SK_ID_CURR": 999999})),
        ("/info", json!({"SK_ID_CURR": 999999})),
        (
            "/distribution",
            json!({"SK_ID_CURR": 999999, "feature": "INCOME_PER_PERSON"}),
        ),
    ] {
        let (status, json) = post_json(&app, uri, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(
            json["error"], "SK_ID_CURR 999999 not found in the dataset",
            "{uri}"
        );
    }
}

#[tokio::test]
async fn test_client_without_personal_info() {
    let app = app();
    let (status, _) = post_json(&app, "/predict", json!({"SK_ID_CURR": 100007})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = post_json(&app, "/info", json!({"SK_ID_CURR": 100007})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("100007"));
}

#[tokio::test]
async fn test_unknown_feature_is_rejected() {
    let app = app();
    let (status, json) = post_json(
        &app,
        "/distribution",
        json!({"SK_ID_CURR": 100004, "feature": "NOT_A_COLUMN"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Feature NOT_A_COLUMN not found in the dataset");
}

#[tokio::test]
async fn test_malformed_payloads_are_rejected() {
    let app = app();

    let (status, json) = post_json(&app, "/predict", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (status, _) = post_json(&app, "/info", json!({"SK_ID_CURR": "100004"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(&app, "/distribution", json!({"SK_ID_CURR": 100004})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_scaled_attribution_adds_up() {
    let app = app_with(|config| config.data.scaler_file = Some("scaler.json".to_string()));
    let (status, json) = post_json(&app, "/predict", json!({"SK_ID_CURR": 100003})).await;
    assert_eq!(status, StatusCode::OK);

    // values fed to the model are the scaled ones
    let scaled_income = json["feature_values"][1].as_f64().unwrap();
    assert!((scaled_income - (135000.0 - 131625.0) / 48000.0).abs() < 1e-12);

    let shap: f64 = json["shap_values"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .sum();
    let expected_value = json["expected_value"].as_f64().unwrap();
    let p = json["probability"].as_f64().unwrap() / 100.0;
    assert!((shap + expected_value - (p / (1.0 - p)).ln()).abs() < 1e-9);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = app();
    post_json(&app, "/predict", json!({"SK_ID_CURR": 100004})).await;
    post_json(&app, "/predict", json!({"SK_ID_CURR": 1})).await;

    let (status, health) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["model"], "credit-gbm");
    assert_eq!(health["model_format"], "tree_json");
    assert_eq!(health["feature_rows"], 5);
    assert_eq!(health["personal_info_rows"], 4);
    assert_eq!(health["attribution"], true);

    let (status, metrics) = get_json(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["endpoints"]["predict"]["requests"], 2);
    assert_eq!(metrics["endpoints"]["predict"]["rejected"], 1);
    let scored: u64 = metrics["score_distribution"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_u64().unwrap())
        .sum();
    assert_eq!(scored, 1);
}

#[tokio::test]
async fn test_boolean_feature_columns() {
    let app = app_with(|config| {
        config.data.features_file = "one_hot.csv".to_string();
        config.data.model_file = "one_hot_model.json".to_string();
    });

    // True is fed as 1.0: 1.0 > 0.5 -> leaf 1.0
    let (status, json) = post_json(&app, "/predict", json!({"SK_ID_CURR": 100002})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["feature_values"][1], json!(1.0));
    let expected = 100.0 / (1.0 + (-1.0f64).exp());
    assert!((json["probability"].as_f64().unwrap() - expected).abs() < 1e-9);

    let (status, json) = post_json(
        &app,
        "/distribution",
        json!({"SK_ID_CURR": 100004, "feature": "NAME_CONTRACT_TYPE_Cash loans"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["client_value"], json!(false));
    assert_eq!(json["distribution"], json!([true, false, true]));
}

#[tokio::test]
async fn test_every_response_carries_a_request_id() {
    let app = app();
    let request = || {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"SK_ID_CURR": 1}).to_string()))
            .unwrap()
    };

    let first = app.clone().oneshot(request()).await.unwrap();
    let second = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::BAD_REQUEST);

    let id = |response: &axum::response::Response| {
        let raw = response.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_string();
        uuid::Uuid::parse_str(&raw).unwrap()
    };
    assert_ne!(id(&first), id(&second));
}

#[tokio::test]
async fn test_caller_request_id_is_kept() {
    let app = app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(REQUEST_ID_HEADER, "scoring-client-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()[REQUEST_ID_HEADER], "scoring-client-42");
}
