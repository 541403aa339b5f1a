// src/extractor/pixiv.rs

use super::{
    Extractor, ItemStream,
    crawl::{Lead, PagedSource, crawl},
    extension_of, parse_source_url,
};
use crate::{
    client::RobustClient,
    config::{AppConfig, credentials::resolve_credential},
    constants::{endpoints, env, options as option_keys},
    error::*,
    models::{DownloadItem, ExtractOptions},
};
use async_trait::async_trait;
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::{Arc, LazyLock};

const SITE_BASE: &str = "https://www.pixiv.net";

static ARTWORK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"artworks/(\d+)").unwrap());
static USER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"users/(\d+)|member\.php\?id=(\d+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Artwork(String),
    User(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    message: String,
    body: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Urls {
    original: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    #[serde(default)]
    urls: Urls,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IllustInfo {
    user_name: Option<String>,
    #[serde(default)]
    urls: Urls,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserProfile {
    name: Option<String>,
    image_big: Option<String>,
    background: Option<Background>,
}

#[derive(Debug, Deserialize)]
struct Background {
    url: Option<String>,
}

/// 单个作品或画师的全部作品。画师模式先产出头像和背景图，作品逐个展开为各页原图。
pub struct PixivExtractor {
    url: String,
    target: Target,
    client: RobustClient,
    config: Arc<AppConfig>,
}

impl PixivExtractor {
    pub fn new(url: &str, options: &ExtractOptions, config: Arc<AppConfig>) -> AppResult<Self> {
        let parsed = parse_source_url(url)?;
        let target = parse_target(parsed.as_str())
            .ok_or_else(|| AppError::InvalidInput(format!("无效的 Pixiv 链接: {}", url)))?;

        let referer = format!("{}/", SITE_BASE);
        let mut headers = vec![("Referer", referer.as_str())];
        let cookie = resolve_credential(options, option_keys::SESSION_ID, env::PIXIV_PHPSESSID, &config)
            .map(|(session_id, source)| {
                info!("使用来自{}的 Pixiv 会话", source);
                format!("PHPSESSID={}", session_id)
            });
        if let Some(cookie) = &cookie {
            headers.push(("Cookie", cookie.as_str()));
        }
        let client = RobustClient::with_headers(config.clone(), &headers)?;

        Ok(Self {
            url: parsed.to_string(),
            target,
            client,
            config,
        })
    }

    /// `error: true` 的响应视为没有数据，此时 `body` 通常是 `[]`，不按 `T` 解析
    async fn ajax<T: DeserializeOwned>(&self, path: &str) -> AppResult<Option<T>> {
        let url = self.config.endpoint(endpoints::PIXIV_AJAX, &[("path", path)])?;
        let envelope: Envelope = self.client.get_json(&url).await?;
        if envelope.error {
            debug!("Pixiv API 返回错误 ({}): {}", path, envelope.message);
            return Ok(None);
        }
        match envelope.body {
            None | Some(Value::Null) => Ok(None),
            Some(body) => serde_json::from_value(body)
                .map(Some)
                .map_err(|source| AppError::ApiParseFailed { url, source }),
        }
    }

    async fn user_leads(&self, user_id: &str) -> AppResult<Vec<Lead>> {
        let Some(profile) = self.ajax::<UserProfile>(&format!("user/{}?full=1", user_id)).await? else {
            return Ok(vec![]);
        };
        let name = profile.name.unwrap_or_else(|| user_id.to_string());
        let collection = format!("{}_{}", user_id, name);

        let mut leads = Vec::new();
        if let Some(avatar) = profile.image_big {
            let item = DownloadItem::new(&avatar, format!("avatar{}", extension_of(&avatar)))?
                .with_collection(collection.clone());
            leads.push(Lead::Ready(item));
        }
        if let Some(bg) = profile.background.and_then(|b| b.url) {
            let item = DownloadItem::new(&bg, format!("cover{}", extension_of(&bg)))?
                .with_collection(collection.clone());
            leads.push(Lead::Ready(item));
        }

        let all = self
            .ajax::<Value>(&format!("user/{}/profile/all", user_id))
            .await?
            .unwrap_or(Value::Null);
        let work_ids = work_ids(&all);
        info!("Pixiv 用户 {} ({}) 共 {} 件作品", name, user_id, work_ids.len());
        leads.extend(
            work_ids
                .into_iter()
                .map(|id| Lead::follow(id, Some(collection.clone()))),
        );
        Ok(leads)
    }
}

fn parse_target(url: &str) -> Option<Target> {
    if let Some(caps) = ARTWORK_RE.captures(url) {
        return Some(Target::Artwork(caps[1].to_string()));
    }
    let caps = USER_RE.captures(url)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| Target::User(m.as_str().to_string()))
}

/// `illusts` 与 `manga` 两个表的键即作品 ID；没有作品时接口返回 `[]` 而不是 `{}`
fn work_ids(all: &Value) -> Vec<String> {
    let mut ids: Vec<String> = ["illusts", "manga"]
        .iter()
        .filter_map(|key| all.get(key).and_then(Value::as_object))
        .flat_map(|map| map.keys().cloned())
        .collect();
    // 新作品在前
    ids.sort_by_key(|id| std::cmp::Reverse(id.parse::<u64>().unwrap_or(0)));
    ids.dedup();
    ids
}

fn page_items(artwork_id: &str, originals: &[String], collection: &str) -> AppResult<Vec<DownloadItem>> {
    let referer = format!("{}/artworks/{}", SITE_BASE, artwork_id);
    originals
        .iter()
        .enumerate()
        .map(|(n, url)| {
            Ok(DownloadItem::new(url, format!("{}_p{}{}", artwork_id, n, extension_of(url)))?
                .with_collection(collection)
                .with_source_id(artwork_id)
                .with_header("Referer", referer.clone()))
        })
        .collect()
}

#[async_trait]
impl PagedSource for PixivExtractor {
    async fn discover(&self, _page: u32) -> AppResult<Option<Vec<Lead>>> {
        match &self.target {
            Target::Artwork(id) => Ok(Some(vec![Lead::follow(id.clone(), None)])),
            Target::User(id) => Ok(Some(self.user_leads(id).await?)),
        }
    }

    async fn resolve(&self, artwork_id: &str, collection: Option<&str>) -> AppResult<Vec<DownloadItem>> {
        let pages = self
            .ajax::<Vec<PageEntry>>(&format!("illust/{}/pages", artwork_id))
            .await?
            .unwrap_or_default();
        let mut originals: Vec<String> = pages.into_iter().filter_map(|p| p.urls.original).collect();

        let mut info = None;
        if originals.is_empty() {
            // 单页作品退回到作品详情
            info = self.ajax::<IllustInfo>(&format!("illust/{}", artwork_id)).await?;
            match info.as_mut().and_then(|i| i.urls.original.take()) {
                Some(url) => originals.push(url),
                None => {
                    debug!("作品 {} 没有可用的原图", artwork_id);
                    return Ok(vec![]);
                }
            }
        }

        let collection = match collection {
            Some(c) => c.to_string(),
            None => {
                if info.is_none() {
                    info = self.ajax::<IllustInfo>(&format!("illust/{}", artwork_id)).await?;
                }
                let user = info
                    .and_then(|i| i.user_name)
                    .unwrap_or_else(|| "unknown".to_string());
                format!("{}_{}", user, artwork_id)
            }
        };
        page_items(artwork_id, &originals, &collection)
    }
}

#[async_trait]
impl Extractor for PixivExtractor {
    fn name(&self) -> &'static str {
        "Pixiv"
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
