// src/extractor/bunkr.rs

use super::{
    Extractor, ItemStream,
    crawl::{Lead, PagedSource, crawl},
    parse_source_url,
};
use crate::{
    cipher::time_xor,
    client::RobustClient,
    config::AppConfig,
    constants::endpoints,
    error::*,
    models::{DownloadItem, ExtractOptions},
};
use async_trait::async_trait;
use log::{debug, info};
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, LazyLock};
use url::Url;

static ALBUM_LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"href="(/f/[^"]+)""#).unwrap());
static FILE_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/file/(\w+)").unwrap());
static OGNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"var ogname\s*=\s*"([^"]+)""#).unwrap());
static OG_TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static DOWNLOAD_BUTTON_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.btn-main[href]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Album,
    File,
}

#[derive(Debug, Deserialize)]
struct DirectUrlResponse {
    timestamp: i64,
    url: String,
}

/// 文件页上的下载按钮给出文件 ID，API 返回按小时轮换密钥加密的直链
#[derive(Debug, PartialEq, Eq)]
struct FilePage {
    file_id: String,
    filename: String,
}

pub struct BunkrExtractor {
    url: Url,
    target: Target,
    client: RobustClient,
    config: Arc<AppConfig>,
}

impl BunkrExtractor {
    pub fn new(url: &str, _options: &ExtractOptions, config: Arc<AppConfig>) -> AppResult<Self> {
        let url = parse_source_url(url)?;
        let target = match url.path() {
            p if p.starts_with("/a/") => Target::Album,
            p if p.starts_with("/f/") => Target::File,
            _ => {
                return Err(AppError::InvalidInput(format!(
                    "无法识别的 Bunkr 链接 (应为 /a/ 或 /f/): {}",
                    url
                )));
            }
        };
        let client = RobustClient::new(config.clone())?;
        Ok(Self { url, target, client, config })
    }

    async fn fetch_direct_url(&self, file_id: &str, filename: &str) -> AppResult<Option<String>> {
        let api_url = self.config.endpoint(endpoints::BUNKR_API, &[])?;
        let data: DirectUrlResponse = self.client.post_json(&api_url, &json!({ "id": file_id })).await?;
        Ok(time_xor::decrypt_url(data.timestamp, &data.url, filename))
    }
}

/// 相册页中的文件链接，跳过前端模板占位符
fn album_file_links(html: &str, base: &Url) -> Vec<String> {
    ALBUM_LINK_RE
        .captures_iter(html)
        .map(|c| c[1].to_string())
        .filter(|link| !link.contains("file.slug") && !link.contains('+'))
        .filter_map(|link| base.join(&link).ok())
        .map(String::from)
        .collect()
}

fn parse_file_page(html: &str, page_url: &Url) -> Option<FilePage> {
    let document = Html::parse_document(html);
    let button_href = document
        .select(&DOWNLOAD_BUTTON_SELECTOR)
        .find(|a| a.text().any(|t| t.trim() == "Download"))
        .and_then(|a| a.value().attr("href"))?;
    let download_page = page_url.join(button_href).ok()?;
    let file_id = FILE_ID_RE.captures(download_page.as_str())?[1].to_string();

    let filename = document
        .select(&OG_TITLE_SELECTOR)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| OGNAME_RE.captures(html).map(|c| c[1].trim().to_string()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("bunkr_file_{}", file_id));

    Some(FilePage { file_id, filename })
}

#[async_trait]
impl PagedSource for BunkrExtractor {
    async fn discover(&self, _page: u32) -> AppResult<Option<Vec<Lead>>> {
        match self.target {
            Target::File => Ok(Some(vec![Lead::follow(self.url.as_str(), None)])),
            Target::Album => {
                let res = self.client.get(self.url.as_str()).await?;
                // 相册可能被重定向到镜像域名，以最终地址拼接相对链接
                let base = res.url().clone();
                let html = res.text().await?;
                let links = album_file_links(&html, &base);
                info!("Bunkr 相册中找到 {} 个文件链接", links.len());
                Ok(Some(links.into_iter().map(|l| Lead::follow(l, None)).collect()))
            }
        }
    }

    async fn resolve(&self, file_url: &str, collection: Option<&str>) -> AppResult<Vec<DownloadItem>> {
        let page_url = Url::parse(file_url)?;
        let html = self.client.get_text(page_url.as_str()).await?;
        let Some(page) = parse_file_page(&html, &page_url) else {
            debug!("文件页 {} 没有下载按钮", file_url);
            return Ok(vec![]);
        };

        let Some(direct_url) = self.fetch_direct_url(&page.file_id, &page.filename).await? else {
            debug!("文件 {} 的直链无法解密，跳过", page.file_id);
            return Ok(vec![]);
        };
        let mut item = DownloadItem::new(direct_url, page.filename)?.with_source_id(page.file_id);
        if let Some(collection) = collection {
            item = item.with_collection(collection);
        }
        Ok(vec![item])
    }
}

#[async_trait]
impl Extractor for BunkrExtractor {
    fn name(&self) -> &'static str {
        "Bunkr"
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
