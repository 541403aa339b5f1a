// tests/client_retry_test.rs

use mega_dl::client::RobustClient;
use mega_dl::config::AppConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread")]
async fn test_get_retries_transient_503_then_succeeds() {
    let mut server = mockito::Server::new_async().await;

    // 第一次 GET -> 503，第二次 -> 200
    let mock_503 = server
        .mock("GET", "/flaky")
        .with_status(503)
        .with_body("busy")
        .expect(1)
        .create_async()
        .await;
    let mock_200 = server
        .mock("GET", "/flaky")
        .with_status(200)
        .with_body("Success!")
        .expect(1)
        .create_async()
        .await;

    let client = RobustClient::new(Arc::new(AppConfig::default())).expect("Failed to create client");
    let response = client
        .get(format!("{}/flaky", server.url()))
        .await
        .expect("Request should eventually succeed");

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "Success!");
    mock_503.assert_async().await;
    mock_200.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_gives_up_after_max_retries() {
    let mut server = mockito::Server::new_async().await;
    let config = AppConfig::default();
    let attempts = config.max_retries as usize + 1;

    let mock = server
        .mock("GET", "/down")
        .with_status(502)
        .expect(attempts)
        .create_async()
        .await;

    let client = RobustClient::new(Arc::new(config)).unwrap();
    let result = client.get(format!("{}/down", server.url())).await;

    assert!(result.is_err());
    mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_post_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;

    let client = RobustClient::new(Arc::new(AppConfig::default())).unwrap();
    let result: Result<serde_json::Value, _> = client
        .post_json(&format!("{}/api", server.url()), &serde_json::json!({"id": "1"}))
        .await;

    assert!(result.is_err());
    mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_404_is_not_retried_and_optional_get_returns_none() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/missing")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let client = RobustClient::new(Arc::new(AppConfig::default())).unwrap();
    let res = client
        .get_optional(format!("{}/missing", server.url()))
        .await
        .unwrap();

    assert!(res.is_none());
    mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_head_content_length_reads_header() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("HEAD", "/file.bin")
        .match_header("referer", "https://origin.test/")
        .with_status(200)
        .with_header("content-length", "4096")
        .create_async()
        .await;

    let client = RobustClient::new(Arc::new(AppConfig::default())).unwrap();
    let headers: HashMap<String, String> = [("Referer".to_string(), "https://origin.test/".to_string())].into();
    let size = client
        .head_content_length(&format!("{}/file.bin", server.url()), &headers, Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(size, Some(4096));
    mock.assert_async().await;
}
