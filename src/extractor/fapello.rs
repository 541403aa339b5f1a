// src/extractor/fapello.rs

use super::{
    Extractor, ItemStream,
    crawl::{Lead, PagedSource, crawl},
    last_path_segment, parse_source_url,
};
use crate::{
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
use std::sync::{Arc, LazyLock};
use url::Url;

const SITE_ROOT: &str = "https://fapello.com/";

static MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"fapello\.com/([a-zA-Z0-9_\-~\.]+)").unwrap());
static THUMB_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)_\d+px(\.(?:jpg|jpeg|png|mp4))$").unwrap());
static THUMB_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a > div > img[src*="/content/"]"#).unwrap());

/// 模特图库按 AJAX 分页加载，缩略图去掉 `_300px` 之类的后缀即为原图
pub struct FapelloExtractor {
    url: String,
    model: String,
    client: RobustClient,
    config: Arc<AppConfig>,
}

impl FapelloExtractor {
    pub fn new(url: &str, _options: &ExtractOptions, config: Arc<AppConfig>) -> AppResult<Self> {
        let parsed = parse_source_url(url)?;
        let model = MODEL_RE
            .captures(parsed.as_str())
            .and_then(|c| c[1].split('/').next().map(String::from))
            .filter(|m| !m.is_empty())
            .ok_or_else(|| AppError::InvalidInput(format!("无法从链接中识别 Fapello 模特: {}", url)))?;
        let client = RobustClient::with_headers(config.clone(), &[("Referer", SITE_ROOT)])?;
        Ok(Self {
            url: parsed.to_string(),
            model,
            client,
            config,
        })
    }

    fn parse_page(&self, html: &str) -> AppResult<Vec<Lead>> {
        let root = Url::parse(SITE_ROOT)?;
        let document = Html::parse_fragment(html);
        let mut leads = Vec::new();
        for img in document.select(&THUMB_SELECTOR) {
            let Some(src) = img.value().attr("src") else { continue };
            let Ok(thumb) = root.join(src) else { continue };
            let full = THUMB_SUFFIX_RE.replace(thumb.as_str(), "$1").into_owned();
            let Some(filename) = Url::parse(&full).ok().as_ref().and_then(last_path_segment) else {
                continue;
            };
            let item = DownloadItem::new(full, filename)?.with_collection(self.model.clone());
            leads.push(Lead::Ready(item));
        }
        Ok(leads)
    }
}

#[async_trait]
impl PagedSource for FapelloExtractor {
    async fn discover(&self, page: u32) -> AppResult<Option<Vec<Lead>>> {
        // 站点页码从 1 开始
        let page_no = (page + 1).to_string();
        let page_url = self.config.endpoint(
            endpoints::FAPELLO_PAGE,
            &[("model", self.model.as_str()), ("page", page_no.as_str())],
        )?;
        let Some(res) = self.client.get_optional(&page_url).await? else {
            return Ok(None);
        };
        let html = res.text().await?;
        if html.trim().is_empty() {
            debug!("Fapello 第 {} 页为空", page_no);
            return Ok(Some(vec![]));
        }
        let leads = self.parse_page(&html)?;
        info!("Fapello '{}' 第 {} 页: {} 张图片", self.model, page_no, leads.len());
        Ok(Some(leads))
    }

    async fn resolve(&self, _target: &str, _collection: Option<&str>) -> AppResult<Vec<DownloadItem>> {
        // 所有线索在发现阶段即已完整
        Ok(vec![])
    }

    fn paginated(&self) -> bool {
        true
    }
}

#[async_trait]
impl Extractor for FapelloExtractor {
    fn name(&self) -> &'static str {
        "Fapello"
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
