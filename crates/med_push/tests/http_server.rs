use std::time::Duration;

use med_push::{HttpServerClient, PushError, RegistrationPayload, ServerApi};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload() -> RegistrationPayload {
    RegistrationPayload {
        endpoint: "https://push.example.net/send/abc".into(),
        p256dh: "BAQEBA==".into(),
        auth: "BwcHBwcHBwcHBwcHBwcHBw==".into(),
    }
}

fn client(server: &MockServer) -> HttpServerClient {
    HttpServerClient::new(Url::parse(&server.uri()).unwrap()).unwrap()
}

#[tokio::test]
async fn fetches_vapid_public_key() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/get-vapid-public-key/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "vapid_public_key": "BEl62iUYgUivxIkv69yViEuiBIa"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let key = client(&mock_server).vapid_public_key().await.unwrap();
    assert_eq!(key, "BEl62iUYgUivxIkv69yViEuiBIa");
}

#[tokio::test]
async fn registration_posts_keys_with_csrf_header() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/save-subscription/"))
        .and(header("X-CSRFToken", "token-123"))
        .and(body_json(json!({
            "endpoint": "https://push.example.net/send/abc",
            "p256dh": "BAQEBA==",
            "auth": "BwcHBwcHBwcHBwcHBwcHBw=="
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    client(&mock_server)
        .with_csrf_token(Some("token-123".into()))
        .register(&payload())
        .await
        .expect("registration accepted");
}

#[tokio::test]
async fn non_success_status_is_registration_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/save-subscription/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let result = client(&mock_server).register(&payload()).await;
    assert!(matches!(result, Err(PushError::RegistrationFailed(message)) if message.contains("403")));
}

#[tokio::test]
async fn error_status_in_body_is_registration_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/save-subscription/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "message": "'auth'"
        })))
        .mount(&mock_server)
        .await;

    let result = client(&mock_server).register(&payload()).await;
    assert!(matches!(result, Err(PushError::RegistrationFailed(message)) if message == "'auth'"));
}

#[tokio::test]
async fn base_path_is_preserved() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/medicines/get-vapid-public-key/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"vapid_public_key": "AQID"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let base = Url::parse(&format!("{}/medicines", mock_server.uri())).unwrap();
    let key = HttpServerClient::new(base).unwrap().vapid_public_key().await.unwrap();
    assert_eq!(key, "AQID");
}

#[tokio::test]
async fn unreachable_server_fails_key_retrieval() {
    let client = HttpServerClient::new(Url::parse("http://127.0.0.1:9/").unwrap()).unwrap();
    assert!(matches!(
        client.vapid_public_key().await,
        Err(PushError::KeyRetrieval(_))
    ));
}

#[tokio::test]
async fn slow_server_is_cut_off_by_request_timeout() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/get-vapid-public-key/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"vapid_public_key": "AQID"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let client = HttpServerClient::with_timeout(
        Url::parse(&mock_server.uri()).unwrap(),
        Duration::from_millis(200),
    )
    .unwrap();
    assert!(matches!(
        client.vapid_public_key().await,
        Err(PushError::KeyRetrieval(_))
    ));
}
