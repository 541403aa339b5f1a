// src/extractor/cyberdrop.rs

use super::{
    Extractor, ItemStream, Throttle,
    crawl::{Lead, PagedSource, crawl},
    parse_source_url, text_of,
};
use crate::{
    client::RobustClient,
    config::AppConfig,
    constants::{endpoints, options as option_keys},
    error::*,
    models::{DownloadItem, ExtractOptions},
};
use async_trait::async_trait;
use log::{debug, info};
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};
use url::Url;

static FILE_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/f/(\w+)").unwrap());
static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1#title").unwrap());
static FILE_LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.file[href], a#file[href]").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Album,
    File(String),
}

#[derive(Debug, Deserialize)]
struct FileInfoResponse {
    name: Option<String>,
    auth_url: Option<String>,
}

/// 相册页列出文件链接，每个文件再调用一次信息 API 取得直链。
/// API 调用之间保持最小间隔 (默认一秒，可用 `rate_limit_ms` 覆盖)。
pub struct CyberdropExtractor {
    url: Url,
    target: Target,
    client: RobustClient,
    config: Arc<AppConfig>,
    throttle: Throttle,
}

impl CyberdropExtractor {
    pub fn new(url: &str, options: &ExtractOptions, config: Arc<AppConfig>) -> AppResult<Self> {
        let url = parse_source_url(url)?;
        let target = if url.path().starts_with("/a/") {
            Target::Album
        } else if let Some(caps) = FILE_ID_RE.captures(url.path()) {
            Target::File(caps[1].to_string())
        } else {
            return Err(AppError::InvalidInput(format!(
                "无法识别的 Cyberdrop 链接 (应为 /a/ 或 /f/): {}",
                url
            )));
        };

        let interval = match options.get_u64(option_keys::RATE_LIMIT_MS)? {
            Some(ms) => Duration::from_millis(ms),
            None => config.api_throttle,
        };
        let referer = format!("{}/", url.origin().ascii_serialization());
        let client = RobustClient::with_headers(config.clone(), &[("Referer", referer.as_str())])?;

        Ok(Self {
            url,
            target,
            client,
            config,
            throttle: Throttle::new(interval),
        })
    }

    fn parse_album(&self, html: &str) -> (Option<String>, Vec<String>) {
        let document = Html::parse_document(html);
        let title = document.select(&TITLE_SELECTOR).next().and_then(text_of);
        let file_ids = document
            .select(&FILE_LINK_SELECTOR)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| self.url.join(href).ok())
            .filter_map(|link| FILE_ID_RE.captures(link.path()).map(|c| c[1].to_string()))
            .collect();
        (title, file_ids)
    }
}

#[async_trait]
impl PagedSource for CyberdropExtractor {
    async fn discover(&self, _page: u32) -> AppResult<Option<Vec<Lead>>> {
        match &self.target {
            Target::File(id) => Ok(Some(vec![Lead::follow(id.clone(), None)])),
            Target::Album => {
                let html = self.client.get_text(self.url.as_str()).await?;
                let (title, file_ids) = self.parse_album(&html);
                info!(
                    "Cyberdrop 相册 '{}' 中找到 {} 个文件链接",
                    title.as_deref().unwrap_or("-"),
                    file_ids.len()
                );
                Ok(Some(
                    file_ids
                        .into_iter()
                        .map(|id| Lead::follow(id, title.clone()))
                        .collect(),
                ))
            }
        }
    }

    async fn resolve(&self, file_id: &str, collection: Option<&str>) -> AppResult<Vec<DownloadItem>> {
        self.throttle.wait().await;
        let api_url = self
            .config
            .endpoint(endpoints::CYBERDROP_FILE_INFO, &[("file_id", file_id)])?;
        let info: FileInfoResponse = self.client.get_json(&api_url).await?;

        match (info.name, info.auth_url) {
            (Some(name), Some(auth_url)) if !name.is_empty() && !auth_url.is_empty() => {
                let mut item = DownloadItem::new(auth_url, name)?.with_source_id(file_id);
                if let Some(collection) = collection {
                    item = item.with_collection(collection);
                }
                Ok(vec![item])
            }
            _ => {
                debug!("文件 {} 的信息不完整，跳过", file_id);
                Ok(vec![])
            }
        }
    }
}

#[async_trait]
impl Extractor for CyberdropExtractor {
    fn name(&self) -> &'static str {
        "Cyberdrop"
    }

    fn source_url(&self) -> &str {
        self.url.as_str()
    }

    fn client(&self) -> &RobustClient {
        &self.client
    }

    fn extract(&self) -> ItemStream<'_> {
        crawl(self, self.url.as_str())
    }
}
