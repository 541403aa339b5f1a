// src/extractor/fanbox.rs

use super::{
    Extractor, ItemStream,
    crawl::{Lead, PagedSource, crawl},
    extension_of, last_path_segment, parse_source_url,
};
use crate::{
    client::RobustClient,
    config::{AppConfig, credentials::resolve_credential},
    constants::{endpoints, env, options as option_keys},
    error::*,
    models::{DownloadItem, ExtractOptions},
};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::StatusCode;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::OnceCell;
use url::Url;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    body: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatorBody {
    user: Option<CreatorUser>,
    cover_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatorUser {
    icon_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostSummary {
    id: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostInfo {
    title: Option<String>,
    cover_image_url: Option<String>,
    body: Option<PostBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostBody {
    #[serde(default)]
    image_map: BTreeMap<String, ImageEntry>,
    #[serde(default)]
    file_map: BTreeMap<String, FileEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageEntry {
    original_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    url: Option<String>,
    name: Option<String>,
    extension: Option<String>,
}

/// 创作者主页 (头像、横幅) 加上按分页列出的全部帖子。
/// 分页列表只在第一次翻页时请求一次；未登录时只能拿到公开内容。
pub struct FanboxExtractor {
    url: String,
    creator_id: String,
    client: RobustClient,
    config: Arc<AppConfig>,
    page_urls: OnceCell<Vec<String>>,
}

impl FanboxExtractor {
    pub fn new(url: &str, options: &ExtractOptions, config: Arc<AppConfig>) -> AppResult<Self> {
        let parsed = parse_source_url(url)?;
        let creator_id = creator_from_url(&parsed)
            .ok_or_else(|| AppError::InvalidInput(format!("无法从链接中识别 Fanbox 创作者: {}", url)))?;

        let origin = format!("https://{}.fanbox.cc", creator_id);
        let referer = format!("{}/", origin);
        let mut headers = vec![("Origin", origin.as_str()), ("Referer", referer.as_str())];
        let cookie = resolve_credential(options, option_keys::SESSION_ID, env::FANBOX_SESSION_ID, &config)
            .map(|(session_id, source)| {
                info!("使用来自{}的 Fanbox 会话", source);
                format!("FANBOXSESSID={}", session_id)
            });
        if let Some(cookie) = &cookie {
            headers.push(("Cookie", cookie.as_str()));
        }
        let client = RobustClient::with_headers(config.clone(), &headers)?;

        Ok(Self {
            url: parsed.to_string(),
            creator_id,
            client,
            config,
            page_urls: OnceCell::new(),
        })
    }

    fn api_url(&self, method: &str) -> AppResult<String> {
        self.config.endpoint(endpoints::FANBOX_API, &[("method", method)])
    }

    /// 403 视为无权访问，返回 `None`
    async fn api_body<T: DeserializeOwned>(&self, url: &str) -> AppResult<Option<T>> {
        let res = self.client.client.get(url).send().await?;
        if res.status() == StatusCode::FORBIDDEN {
            warn!("无权访问: {}", url);
            return Ok(None);
        }
        let res = res.error_for_status()?;
        let envelope: Envelope<T> = RobustClient::parse_json(url, res).await?;
        Ok(envelope.body)
    }

    fn item(&self, url: &str, filename: String) -> AppResult<DownloadItem> {
        Ok(DownloadItem::new(url, filename)?.with_collection(self.creator_id.clone()))
    }

    async fn profile_leads(&self) -> AppResult<Vec<Lead>> {
        let url = self.api_url(&format!("creator.get?creatorId={}", self.creator_id))?;
        let Some(creator) = self.api_body::<CreatorBody>(&url).await? else {
            return Ok(vec![]);
        };
        let mut leads = Vec::new();
        if let Some(icon) = creator.user.and_then(|u| u.icon_url) {
            leads.push(Lead::Ready(self.item(&icon, format!("profile_avatar{}", extension_of(&icon)))?));
        }
        if let Some(cover) = creator.cover_image_url {
            leads.push(Lead::Ready(self.item(&cover, format!("profile_banner{}", extension_of(&cover)))?));
        }
        Ok(leads)
    }

    async fn page_urls(&self) -> AppResult<&Vec<String>> {
        self.page_urls
            .get_or_try_init(|| async {
                let url = self.api_url(&format!("post.paginateCreator?creatorId={}", self.creator_id))?;
                let pages = self.api_body::<Vec<String>>(&url).await?.unwrap_or_default();
                info!("Fanbox 创作者 {} 共 {} 页帖子", self.creator_id, pages.len());
                Ok(pages)
            })
            .await
    }

    async fn post_leads(&self, page_url: &str) -> AppResult<Vec<Lead>> {
        let posts = self.api_body::<Vec<PostSummary>>(page_url).await?.unwrap_or_default();
        Ok(posts
            .into_iter()
            .filter_map(|p| match p.id {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .map(|id| Lead::follow(id, None))
            .collect())
    }

    fn post_items(&self, post_id: &str, info: PostInfo) -> AppResult<Vec<DownloadItem>> {
        let title = info
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("post_{}", post_id));
        let prefix = format!("{}_{}", post_id, title);

        let Some(body) = info.body else {
            // 无权查看的帖子只有封面
            return match info.cover_image_url {
                Some(cover) => Ok(vec![self.item(&cover, format!("{}_cover{}", prefix, extension_of(&cover)))?]),
                None => Ok(vec![]),
            };
        };

        let mut items = Vec::new();
        for image in body.image_map.into_values() {
            let Some(url) = image.original_url else { continue };
            let name = Url::parse(&url)
                .ok()
                .as_ref()
                .and_then(last_path_segment)
                .unwrap_or_else(|| "image.jpg".to_string());
            items.push(self.item(&url, format!("{}_{}", prefix, name))?);
        }
        for file in body.file_map.into_values() {
            let Some(url) = file.url else { continue };
            let name = format!(
                "{}.{}",
                file.name.unwrap_or_else(|| "file".into()),
                file.extension.unwrap_or_else(|| "bin".into())
            );
            items.push(self.item(&url, format!("{}_{}", prefix, name))?);
        }
        Ok(items)
    }
}

/// `<creator>.fanbox.cc` 或 `www.fanbox.cc/@<creator>`
fn creator_from_url(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    if let Some(sub) = host.strip_suffix(".fanbox.cc")
        && sub != "www"
        && !sub.is_empty()
        && !sub.contains('.')
    {
        return Some(sub.to_string());
    }
    let first = url.path_segments()?.find(|s| !s.is_empty())?;
    let creator = first.trim_start_matches('@');
    let valid = !creator.is_empty() && creator.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-');
    valid.then(|| creator.to_string())
}

#[async_trait]
impl PagedSource for FanboxExtractor {
    async fn discover(&self, page: u32) -> AppResult<Option<Vec<Lead>>> {
        let mut leads = Vec::new();
        if page == 0 {
            // 主页信息拿不到时仍继续抓取帖子
            match self.profile_leads().await {
                Ok(profile) => leads.extend(profile),
                Err(e) => warn!("获取 Fanbox 主页信息失败: {}", e),
            }
        }
        let Some(page_url) = self.page_urls().await?.get(page as usize).cloned() else {
            return Ok(if leads.is_empty() { None } else { Some(leads) });
        };
        leads.extend(self.post_leads(&page_url).await?);
        Ok(Some(leads))
    }

    async fn resolve(&self, post_id: &str, _collection: Option<&str>) -> AppResult<Vec<DownloadItem>> {
        let url = self.api_url(&format!("post.info?postId={}", post_id))?;
        let Some(info) = self.api_body::<PostInfo>(&url).await? else {
            debug!("帖子 {} 无法访问", post_id);
            return Ok(vec![]);
        };
        self.post_items(post_id, info)
    }

    fn paginated(&self) -> bool {
        true
    }
}

#[async_trait]
impl Extractor for FanboxExtractor {
    fn name(&self) -> &'static str {
        "Fanbox"
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
