// src/extractor/pixeldrain.rs

use super::{
    Extractor, ItemStream,
    crawl::{Lead, PagedSource, crawl},
    parse_source_url,
};
use crate::{
    client::RobustClient,
    config::AppConfig,
    constants::endpoints,
    error::*,
    models::{DownloadItem, ExtractOptions},
};
use async_trait::async_trait;
use indicatif::HumanBytes;
use log::info;
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};

static VIEWER_DATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)window\.viewer_data\s*=\s*(\{.*?\});").unwrap());

#[derive(Debug, Deserialize)]
struct ViewerData {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    api_response: ApiResponse,
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    id: Option<String>,
    name: Option<String>,
    title: Option<String>,
    #[serde(default)]
    size: u64,
    files: Option<Vec<FileEntry>>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    id: String,
    name: String,
    #[serde(default)]
    size: u64,
}

/// 列表页与单文件页都把数据嵌在 `window.viewer_data` 中，不需要额外请求
pub struct PixelDrainExtractor {
    url: String,
    client: RobustClient,
    config: Arc<AppConfig>,
}

impl PixelDrainExtractor {
    pub fn new(url: &str, _options: &ExtractOptions, config: Arc<AppConfig>) -> AppResult<Self> {
        let parsed = parse_source_url(url)?;
        let client = RobustClient::new(config.clone())?;
        Ok(Self {
            url: parsed.to_string(),
            client,
            config,
        })
    }

    fn file_item(&self, id: &str, name: String, collection: Option<&str>) -> AppResult<DownloadItem> {
        let url = self.config.endpoint(endpoints::PIXELDRAIN_FILE, &[("file_id", id)])?;
        let mut item = DownloadItem::new(url, name)?.with_source_id(id);
        if let Some(collection) = collection {
            item = item.with_collection(collection);
        }
        Ok(item)
    }

    fn items_from_viewer_data(&self, data: ViewerData) -> AppResult<Vec<DownloadItem>> {
        let api = data.api_response;
        if data.kind == "list"
            && let Some(files) = api.files
        {
            let total: u64 = files.iter().map(|f| f.size).sum();
            info!("PixelDrain 列表包含 {} 个文件 ({})", files.len(), HumanBytes(total));
            let collection = api.title.filter(|t| !t.trim().is_empty());
            return files
                .into_iter()
                .map(|f| self.file_item(&f.id, f.name, collection.as_deref()))
                .collect();
        }
        match (api.id, api.name) {
            (Some(id), Some(name)) => {
                info!("PixelDrain 单文件: {} ({})", name, HumanBytes(api.size));
                Ok(vec![self.file_item(&id, name, None)?])
            }
            _ => Ok(vec![]),
        }
    }
}

fn parse_viewer_data(html: &str) -> AppResult<ViewerData> {
    let raw = VIEWER_DATA_RE
        .captures(html)
        .map(|c| c[1].to_string())
        .ok_or_else(|| AppError::InvalidInput("页面中没有找到 viewer_data".into()))?;
    Ok(serde_json::from_str(&raw)?)
}

#[async_trait]
impl PagedSource for PixelDrainExtractor {
    async fn discover(&self, _page: u32) -> AppResult<Option<Vec<Lead>>> {
        let html = self.client.get_text(self.url.as_str()).await?;
        let data = parse_viewer_data(&html)?;
        let items = self.items_from_viewer_data(data)?;
        Ok(Some(items.into_iter().map(Lead::Ready).collect()))
    }

    async fn resolve(&self, _target: &str, _collection: Option<&str>) -> AppResult<Vec<DownloadItem>> {
        Ok(vec![])
    }
}

#[async_trait]
impl Extractor for PixelDrainExtractor {
    fn name(&self) -> &'static str {
        "PixelDrain"
    }

    fn source_url(&self) -> &str {
        &self.url
    }

    fn client(&self) -> &RobustClient {
        &self.client
    }

    fn extract(&self) -> ItemStream<'_> {
        crawl(self, &self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> PixelDrainExtractor {
        PixelDrainExtractor::new("https://pixeldrain.com/l/abc", &ExtractOptions::new(), Arc::new(AppConfig::default()))
            .unwrap()
    }

    #[test]
    fn test_list_viewer_data() {
        let html = r#"<script>window.viewer_data = {"type":"list","api_response":{"title":"Trip","files":[
            {"id":"f1","name":"a.jpg","size":10},{"id":"f2","name":"b.jpg"}]}};</script>"#;
        let items = extractor().items_from_viewer_data(parse_viewer_data(html).unwrap()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].download_url(), "https://pixeldrain.com/api/file/f1");
        assert_eq!(items[1].filename(), "b.jpg");
        assert_eq!(items[1].collection_name(), Some("Trip"));
    }

    #[test]
    fn test_single_file_viewer_data() {
        let html = r#"window.viewer_data = {"type":"file","api_response":{"id":"x9","name":"movie.mkv","size":2048}};"#;
        let items = extractor().items_from_viewer_data(parse_viewer_data(html).unwrap()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source_id(), Some("x9"));
        assert_eq!(items[0].collection_name(), None);
    }

    #[test]
    fn test_missing_viewer_data_is_error() {
        assert!(parse_viewer_data("<html></html>").is_err());
    }
}
