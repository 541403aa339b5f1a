// src/extractor/gofile.rs

use super::{
    Extractor, ItemStream,
    crawl::{Lead, PagedSource, crawl},
    parse_source_url,
};
use crate::{
    client::RobustClient,
    config::{AppConfig, credentials::resolve_credential},
    constants::{endpoints, env, options as option_keys},
    error::*,
    models::{DownloadItem, ExtractOptions},
};
use anyhow::anyhow;
use async_trait::async_trait;
use log::{debug, info, warn};
use regex::Regex;
use reqwest::header;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::{
    collections::BTreeMap,
    sync::{Arc, LazyLock},
};

static CONTENT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"gofile\.io/(?:d|f)/([\w-]+)").unwrap());
static WEBSITE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\.wt\s*=\s*"([^"]+)""#).unwrap());

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ContentData {
    name: Option<String>,
    #[serde(default)]
    children: BTreeMap<String, Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    #[serde(rename = "type")]
    kind: String,
    id: Option<String>,
    name: Option<String>,
    link: Option<String>,
}

/// 访客账户令牌与站点脚本中的 website token 一起才能读取目录内容。
/// 有密码时以其 SHA-256 十六进制摘要作为查询参数。
pub struct GofileExtractor {
    url: String,
    content_id: String,
    password_hash: Option<String>,
    client: RobustClient,
    config: Arc<AppConfig>,
}

impl GofileExtractor {
    pub fn new(url: &str, options: &ExtractOptions, config: Arc<AppConfig>) -> AppResult<Self> {
        let parsed = parse_source_url(url)?;
        let content_id = CONTENT_ID_RE
            .captures(parsed.as_str())
            .map(|c| c[1].to_string())
            .ok_or_else(|| AppError::InvalidInput(format!("无效的 Gofile 链接: {}", url)))?;
        let password_hash =
            resolve_credential(options, option_keys::PASSWORD, env::GOFILE_PASSWORD, &config).map(
                |(password, source)| {
                    debug!("使用来自{}的 Gofile 密码", source);
                    hash_password(&password)
                },
            );
        let client = RobustClient::new(config.clone())?;
        Ok(Self {
            url: parsed.to_string(),
            content_id,
            password_hash,
            client,
            config,
        })
    }

    async fn website_token(&self) -> AppResult<String> {
        let js_url = self.config.endpoint(endpoints::GOFILE_GLOBAL_JS, &[])?;
        let script = self.client.get_text(&js_url).await?;
        WEBSITE_TOKEN_RE
            .captures(&script)
            .map(|c| c[1].to_string())
            .ok_or_else(|| AppError::Other(anyhow!("站点脚本中没有找到 website token")))
    }

    async fn account_token(&self) -> AppResult<String> {
        let api_url = self.config.endpoint(endpoints::GOFILE_API, &[("path", "accounts")])?;
        let envelope: Envelope<AccountData> = self.client.post_empty(&api_url).await?;
        match envelope {
            Envelope { status, data: Some(data) } if status == "ok" => Ok(data.token),
            Envelope { status, .. } => Err(AppError::Other(anyhow!("创建 Gofile 访客账户失败: {}", status))),
        }
    }

    async fn fetch_contents(&self, website_token: &str, account_token: &str) -> AppResult<ContentData> {
        let path = format!("contents/{}", self.content_id);
        let api_url = self.config.endpoint(endpoints::GOFILE_API, &[("path", path.as_str())])?;
        let mut query = vec![("wt", website_token)];
        if let Some(hash) = &self.password_hash {
            query.push(("password", hash.as_str()));
        }
        let res = self
            .client
            .client
            .get(&api_url)
            .query(&query)
            .header(header::AUTHORIZATION, format!("Bearer {}", account_token))
            .send()
            .await?
            .error_for_status()?;
        let envelope: Envelope<Value> = RobustClient::parse_json(&api_url, res).await?;
        if envelope.status != "ok" {
            let message = envelope
                .data
                .as_ref()
                .and_then(|d| d.get("message"))
                .and_then(Value::as_str)
                .unwrap_or(envelope.status.as_str())
                .to_string();
            return Err(AppError::Other(anyhow!("Gofile API 返回错误: {}", message)));
        }
        let data = envelope.data.unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(|source| AppError::ApiParseFailed { url: api_url, source })
    }

    fn items_from_contents(&self, content: ContentData, account_token: &str) -> AppResult<Vec<DownloadItem>> {
        let album = content.name.unwrap_or_else(|| self.content_id.clone());
        let cookie = format!("accountToken={}", account_token);
        let mut items = Vec::new();
        for child in content.children.into_values() {
            if child.kind != "file" {
                debug!("跳过非文件条目: {:?}", child.name);
                continue;
            }
            let (Some(link), Some(name)) = (child.link, child.name) else {
                continue;
            };
            let mut item = DownloadItem::new(link, name)?
                .with_collection(album.clone())
                .with_header("Cookie", cookie.clone());
            if let Some(id) = child.id {
                item = item.with_source_id(id);
            }
            items.push(item);
        }
        Ok(items)
    }
}

fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

#[async_trait]
impl PagedSource for GofileExtractor {
    async fn discover(&self, _page: u32) -> AppResult<Option<Vec<Lead>>> {
        let website_token = self.website_token().await?;
        let account_token = self.account_token().await?;
        let content = self.fetch_contents(&website_token, &account_token).await?;
        let items = self.items_from_contents(content, &account_token)?;
        if items.is_empty() {
            warn!("Gofile 目录 {} 中没有文件 (可能需要密码)", self.content_id);
        } else {
            info!("Gofile 目录 {} 中找到 {} 个文件", self.content_id, items.len());
        }
        Ok(Some(items.into_iter().map(Lead::Ready).collect()))
    }

    async fn resolve(&self, _target: &str, _collection: Option<&str>) -> AppResult<Vec<DownloadItem>> {
        Ok(vec![])
    }
}

#[async_trait]
impl Extractor for GofileExtractor {
    fn name(&self) -> &'static str {
        "Gofile"
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
