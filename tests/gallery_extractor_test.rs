// tests/gallery_extractor_test.rs

use futures::StreamExt;
use mega_dl::{
    collect_items, collect_items_with_progress,
    config::AppConfig,
    constants::endpoints,
    error::AppError,
    extractor::{
        Extractor, fapello::FapelloExtractor, pixeldrain::PixelDrainExtractor,
        thothub_to::ThothubToExtractor,
    },
    models::ExtractOptions,
};
use std::sync::Arc;

fn fapello_config(server: &mockito::Server) -> Arc<AppConfig> {
    let mut config = AppConfig::default();
    config.endpoints.insert(
        endpoints::FAPELLO_PAGE.to_string(),
        format!("{}/ajax/model/{{model}}/page-{{page}}/", server.url()),
    );
    Arc::new(config)
}

fn thumbs(ids: &[u32]) -> String {
    ids.iter()
        .map(|id| {
            format!(
                r#"<a href="/jane/{id}/"><div><img src="https://fapello.com/content/j/a/jane/1000/jane_{id:04}_300px.jpg"></div></a>"#
            )
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fapello_paginates_until_404() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/ajax/model/jane/page-1/")
        .with_status(200)
        .with_body(thumbs(&[1, 2]))
        .create_async()
        .await;
    server
        .mock("GET", "/ajax/model/jane/page-2/")
        .with_status(200)
        .with_body(thumbs(&[3]))
        .create_async()
        .await;
    let last = server
        .mock("GET", "/ajax/model/jane/page-3/")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let extractor =
        FapelloExtractor::new("https://fapello.com/jane/", &ExtractOptions::new(), fapello_config(&server)).unwrap();
    let items = collect_items(&extractor, None).await.unwrap();

    let names: Vec<_> = items.iter().map(|i| i.filename()).collect();
    assert_eq!(names, vec!["jane_0001.jpg", "jane_0002.jpg", "jane_0003.jpg"]);
    assert_eq!(
        items[0].download_url(),
        "https://fapello.com/content/j/a/jane/1000/jane_0001.jpg"
    );
    assert!(items.iter().all(|i| i.collection_name() == Some("jane")));
    last.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_collect_reports_running_count_across_pages() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/ajax/model/jane/page-1/")
        .with_status(200)
        .with_body(thumbs(&[1, 2]))
        .create_async()
        .await;
    server
        .mock("GET", "/ajax/model/jane/page-2/")
        .with_status(200)
        .with_body(thumbs(&[3]))
        .create_async()
        .await;
    server
        .mock("GET", "/ajax/model/jane/page-3/")
        .with_status(404)
        .create_async()
        .await;

    let extractor =
        FapelloExtractor::new("https://fapello.com/jane/", &ExtractOptions::new(), fapello_config(&server)).unwrap();
    let mut counts = Vec::new();
    let items = collect_items_with_progress(&extractor, None, |found| counts.push(found))
        .await
        .unwrap();

    assert_eq!(items.len(), 3);
    assert_eq!(counts, vec![1, 2, 3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fapello_stops_on_page_with_only_seen_links() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/ajax/model/jane/page-1/")
        .with_status(200)
        .with_body(thumbs(&[1, 2]))
        .create_async()
        .await;
    // 站点在越界时重复返回最后一页
    server
        .mock("GET", "/ajax/model/jane/page-2/")
        .with_status(200)
        .with_body(thumbs(&[1, 2]))
        .create_async()
        .await;
    let never = server
        .mock("GET", "/ajax/model/jane/page-3/")
        .expect(0)
        .create_async()
        .await;

    let extractor =
        FapelloExtractor::new("https://fapello.com/jane/", &ExtractOptions::new(), fapello_config(&server)).unwrap();
    let items = collect_items(&extractor, None).await.unwrap();

    assert_eq!(items.len(), 2);
    never.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dropping_stream_leaves_later_pages_unrequested() {
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("GET", "/ajax/model/jane/page-1/")
        .with_status(200)
        .with_body(thumbs(&[1, 2]))
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/ajax/model/jane/page-2/")
        .with_status(200)
        .with_body(thumbs(&[3]))
        .expect(0)
        .create_async()
        .await;

    let extractor =
        FapelloExtractor::new("https://fapello.com/jane/", &ExtractOptions::new(), fapello_config(&server)).unwrap();
    {
        let mut stream = extractor.extract();
        let item = stream.next().await.unwrap().unwrap();
        assert_eq!(item.filename(), "jane_0001.jpg");
    }

    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_collect_items_stops_at_cap() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/ajax/model/jane/page-1/")
        .with_status(200)
        .with_body(thumbs(&[1, 2, 3]))
        .create_async()
        .await;
    let second = server
        .mock("GET", "/ajax/model/jane/page-2/")
        .with_status(200)
        .with_body(thumbs(&[4]))
        .expect(0)
        .create_async()
        .await;

    let extractor =
        FapelloExtractor::new("https://fapello.com/jane/", &ExtractOptions::new(), fapello_config(&server)).unwrap();
    let err = collect_items(&extractor, Some(2)).await.unwrap_err();

    assert!(matches!(err, AppError::TooManyItems { limit: 2 }));
    second.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_thothub_model_pages_resolve_videos() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();
    let mut config = AppConfig::default();
    config.endpoints.insert(
        endpoints::THOTHUB_MODEL_PAGE.to_string(),
        format!("{}/models/{{model}}/?mode=async&from={{page}}", base),
    );

    server
        .mock("GET", mockito::Matcher::Regex(r"^/models/jane/".to_string()))
        .match_query(mockito::Matcher::UrlEncoded("from".into(), "1".into()))
        .with_status(200)
        .with_body(r#"<div class="item"><a href="/videos/1/first/">1</a></div>
                      <div class="item"><a href="/videos/1/first/">dup</a></div>"#)
        .create_async()
        .await;
    server
        .mock("GET", mockito::Matcher::Regex(r"^/models/jane/".to_string()))
        .match_query(mockito::Matcher::UrlEncoded("from".into(), "2".into()))
        .with_status(404)
        .create_async()
        .await;
    let video = server
        .mock("GET", "/videos/1/first/")
        .with_status(200)
        .with_body(
            r#"<h1>First Clip</h1><script>var flashvars = {
                video_id: '12345',
                license_code: '$603117912741026',
                video_url: 'function/0/https://thothub.to/get_file/3/0123456789abcdefghijklmnopqrstuv/12000/12345/12345.mp4/',
            };</script>"#,
        )
        .expect(1)
        .create_async()
        .await;

    let url = format!("{}/models/jane/", base);
    let extractor = ThothubToExtractor::new(&url, &ExtractOptions::new(), Arc::new(config)).unwrap();
    let items = collect_items(&extractor, None).await.unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].filename(), "First Clip.mp4");
    assert_eq!(items[0].collection_name(), Some("jane"));
    assert!(items[0].download_url().starts_with(
        "https://thothub.to/get_file/3/6feui7ho2q3cs5trk0dlbmj4a8ng9p1v/12000/12345/12345.mp4/?rnd="
    ));
    assert_eq!(
        items[0].headers().get("Referer").map(String::as_str),
        Some(format!("{}/videos/1/first/", base).as_str())
    );
    video.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pixeldrain_list_page() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/l/abc")
        .with_status(200)
        .with_body(
            r#"<html><script>window.viewer_data = {"type":"list","api_response":{"id":"abc","title":"Trip",
            "files":[{"id":"f1","name":"a.jpg","size":10},{"id":"f2","name":"b.jpg","size":20}]}};</script></html>"#,
        )
        .create_async()
        .await;

    let url = format!("{}/l/abc", server.url());
    let extractor =
        PixelDrainExtractor::new(&url, &ExtractOptions::new(), Arc::new(AppConfig::default())).unwrap();
    let items = collect_items(&extractor, None).await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].download_url(), "https://pixeldrain.com/api/file/f1");
    assert_eq!(items[1].filename(), "b.jpg");
    assert_eq!(items[1].collection_name(), Some("Trip"));
}
