// src/extractor/thothub_to.rs

use super::{
    Extractor, ItemStream,
    crawl::{Lead, PagedSource, crawl},
    last_path_segment, parse_source_url, text_of,
};
use crate::{
    cipher::license_shuffle,
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

static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"video_id:\s*'(\d+)'").unwrap());
static VIDEO_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"video_url:\s*'([^']+)'").unwrap());
static LICENSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"license_code:\s*'(\$.+?)'").unwrap());
static H1_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static MODEL_VIDEO_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div.item > a[href*="/videos/"]"#).unwrap());
static ALBUM_IMAGE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div.block-album a.item[href*="/get_image/"]"#).unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Video,
    Model(String),
    Album,
}

/// 视频页的播放器参数
#[derive(Debug, PartialEq, Eq)]
struct PlayerVars {
    video_id: String,
    video_url: String,
    license_code: String,
    title: Option<String>,
}

pub struct ThothubToExtractor {
    url: Url,
    target: Target,
    client: RobustClient,
    config: Arc<AppConfig>,
}

impl ThothubToExtractor {
    pub fn new(url: &str, _options: &ExtractOptions, config: Arc<AppConfig>) -> AppResult<Self> {
        let url = parse_source_url(url)?;
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        let target = match segments.as_slice() {
            ["videos", ..] => Target::Video,
            ["models", model, ..] => Target::Model(model.to_string()),
            ["albums", ..] => Target::Album,
            _ => {
                return Err(AppError::InvalidInput(format!(
                    "无法识别的 Thothub 链接 (应为 /videos/、/models/ 或 /albums/): {}",
                    url
                )));
            }
        };
        let client = RobustClient::new(config.clone())?;
        Ok(Self { url, target, client, config })
    }

    fn site_root(&self) -> AppResult<Url> {
        Ok(self.url.join("/")?)
    }

    async fn discover_model_page(&self, model: &str, page: u32) -> AppResult<Option<Vec<Lead>>> {
        let page_no = (page + 1).to_string();
        let page_url = self.config.endpoint(
            endpoints::THOTHUB_MODEL_PAGE,
            &[("model", model), ("page", page_no.as_str())],
        )?;
        let Some(res) = self.client.get_optional(&page_url).await? else {
            return Ok(None);
        };
        let html = res.text().await?;
        let root = self.site_root()?;
        let links = model_video_links(&html, &root);
        info!("Thothub 模特 '{}' 第 {} 页: {} 个视频", model, page_no, links.len());
        Ok(Some(
            links
                .into_iter()
                .map(|link| Lead::follow(link, Some(model.to_string())))
                .collect(),
        ))
    }

    async fn discover_album(&self) -> AppResult<Vec<Lead>> {
        let html = self.client.get_text(self.url.as_str()).await?;
        let (title, images) = album_images(&html, &self.url);
        let collection = title.unwrap_or_else(|| "album".to_string());
        images
            .into_iter()
            .map(|(url, filename)| {
                Ok(Lead::Ready(
                    DownloadItem::new(url, filename)?.with_collection(collection.clone()),
                ))
            })
            .collect()
    }
}

fn parse_player_vars(html: &str) -> Option<PlayerVars> {
    let video_id = VIDEO_ID_RE.captures(html)?[1].to_string();
    let video_url = VIDEO_URL_RE.captures(html)?[1].to_string();
    let license_code = LICENSE_RE.captures(html)?[1].to_string();
    let document = Html::parse_document(html);
    let title = document.select(&H1_SELECTOR).next().and_then(text_of);
    Some(PlayerVars {
        video_id,
        video_url,
        license_code,
        title,
    })
}

fn model_video_links(html: &str, root: &Url) -> Vec<String> {
    let document = Html::parse_fragment(html);
    document
        .select(&MODEL_VIDEO_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| root.join(href).ok())
        .map(String::from)
        .collect()
}

fn album_images(html: &str, page_url: &Url) -> (Option<String>, Vec<(String, String)>) {
    let document = Html::parse_document(html);
    let title = document.select(&H1_SELECTOR).next().and_then(text_of);
    let images = document
        .select(&ALBUM_IMAGE_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| page_url.join(href).ok())
        .filter_map(|url| last_path_segment(&url).map(|name| (url.to_string(), name)))
        .collect();
    (title, images)
}

#[async_trait]
impl PagedSource for ThothubToExtractor {
    async fn discover(&self, page: u32) -> AppResult<Option<Vec<Lead>>> {
        match &self.target {
            Target::Video => Ok(Some(vec![Lead::follow(self.url.as_str(), None)])),
            Target::Model(model) => self.discover_model_page(model, page).await,
            Target::Album => Ok(Some(self.discover_album().await?)),
        }
    }

    async fn resolve(&self, video_page: &str, collection: Option<&str>) -> AppResult<Vec<DownloadItem>> {
        let html = self.client.get_text(video_page).await?;
        let Some(vars) = parse_player_vars(&html) else {
            debug!("视频页 {} 缺少播放器参数", video_page);
            return Ok(vec![]);
        };
        let now_ms = chrono::Utc::now().timestamp_millis();
        let Some(real_url) = license_shuffle::deobfuscate_url(&vars.video_url, &vars.license_code, now_ms) else {
            debug!("视频 {} 的地址无法还原，跳过", vars.video_id);
            return Ok(vec![]);
        };

        let title = vars
            .title
            .unwrap_or_else(|| format!("video_{}", vars.video_id));
        let mut item = DownloadItem::new(real_url, format!("{}.mp4", title))?
            .with_source_id(vars.video_id)
            .with_header("Referer", video_page);
        if let Some(collection) = collection {
            item = item.with_collection(collection);
        }
        Ok(vec![item])
    }

    fn paginated(&self) -> bool {
        matches!(self.target, Target::Model(_))
    }
}

#[async_trait]
impl Extractor for ThothubToExtractor {
    fn name(&self) -> &'static str {
        "ThothubTo"
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
