// tests/bunkr_extractor_test.rs

use mega_dl::{
    collect_items, config::AppConfig, constants::endpoints, extractor::bunkr::BunkrExtractor,
    models::ExtractOptions,
};
use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;

// 时间戳 1700000000 所在小时的密钥加密的两个直链
const TS: i64 = 1_700_000_000;
const VIDEO_CT: &str = "OzE3IjZucGQmPTEaUkpTX0I/IG0xKjlwLSw1OkcYRFtWVzxrLiJx";
const PHOTO_CT: &str = "OzE3IjZucGQmPTEaUkpTX0I/IG0xKjlwLSw1OkcYQlpdRjxrKSIi";

fn file_page(title: &str, file_id: &str) -> String {
    format!(
        r#"<html><head><meta property="og:title" content="{title}"></head>
        <body><a class="btn btn-main" href="https://get.bunkrr.su/file/{file_id}">Download</a></body></html>"#
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn test_album_resolves_each_file_through_api() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/a/album1")
        .with_status(200)
        .with_body(r#"<a href="/f/one">1</a><a href="/f/{{file.slug}}">t</a><a href="/f/one">1</a><a href="/f/two">2</a>"#)
        .create_async()
        .await;
    let page_one = server
        .mock("GET", "/f/one")
        .with_status(200)
        .with_body(file_page("my video (1).mp4", "111"))
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/f/two")
        .with_status(200)
        .with_body(file_page("photo 2.jpg", "222"))
        .create_async()
        .await;
    let api_one = server
        .mock("POST", "/api")
        .match_body(Matcher::PartialJson(json!({"id": "111"})))
        .with_status(200)
        .with_body(json!({"timestamp": TS, "url": VIDEO_CT}).to_string())
        .expect(1)
        .create_async()
        .await;
    server
        .mock("POST", "/api")
        .match_body(Matcher::PartialJson(json!({"id": "222"})))
        .with_status(200)
        .with_body(json!({"timestamp": TS, "url": PHOTO_CT}).to_string())
        .create_async()
        .await;

    let mut config = AppConfig::default();
    config
        .endpoints
        .insert(endpoints::BUNKR_API.to_string(), format!("{}/api", server.url()));
    let url = format!("{}/a/album1", server.url());
    let extractor = BunkrExtractor::new(&url, &ExtractOptions::new(), Arc::new(config)).unwrap();

    let items = collect_items(&extractor, None).await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].filename(), "my video (1).mp4");
    assert_eq!(
        items[0].download_url(),
        "https://cdn.example.com/files/video.mp4?n=my%20video%20%281%29.mp4"
    );
    assert_eq!(items[0].source_id(), Some("111"));
    assert_eq!(items[1].download_url(), "https://cdn.example.com/files/photo.jpg?n=photo%202.jpg");

    page_one.assert_async().await;
    api_one.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_undecryptable_url_is_skipped() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/f/broken")
        .with_status(200)
        .with_body(file_page("x.bin", "999"))
        .create_async()
        .await;
    server
        .mock("POST", "/api")
        .with_status(200)
        .with_body(json!({"timestamp": TS, "url": "/w=="}).to_string())
        .create_async()
        .await;

    let mut config = AppConfig::default();
    config
        .endpoints
        .insert(endpoints::BUNKR_API.to_string(), format!("{}/api", server.url()));
    let url = format!("{}/f/broken", server.url());
    let extractor = BunkrExtractor::new(&url, &ExtractOptions::new(), Arc::new(config)).unwrap();

    let err = collect_items(&extractor, None).await.unwrap_err();
    assert!(matches!(err, mega_dl::error::AppError::NoItemsFound(_)));
}
