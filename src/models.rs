// src/models.rs

use crate::error::{AppError, AppResult};
use serde::Serialize;
use std::collections::HashMap;
use url::Url;

/// 一个已发现、可下载的文件。创建后不可变，只能通过 `with_*` 派生新值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadItem {
    download_url: String,
    filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    collection_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_id: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
}

impl DownloadItem {
    /// 文件名保持来源给出的原样，净化在落盘时才进行
    pub fn new(download_url: impl Into<String>, filename: impl Into<String>) -> AppResult<Self> {
        let download_url = download_url.into();
        let filename = filename.into();
        if download_url.trim().is_empty() {
            return Err(AppError::InvalidInput("下载链接不能为空".into()));
        }
        if filename.trim().is_empty() {
            return Err(AppError::InvalidInput(format!(
                "文件名不能为空: {}",
                download_url
            )));
        }
        let parsed = Url::parse(&download_url)
            .map_err(|e| AppError::InvalidInput(format!("无效的下载链接 '{}': {}", download_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::InvalidInput(format!(
                "不支持的链接协议 '{}': {}",
                parsed.scheme(),
                download_url
            )));
        }
        Ok(Self {
            download_url,
            filename,
            collection_name: None,
            source_id: None,
            headers: HashMap::new(),
            size_bytes: None,
        })
    }

    pub fn with_collection(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.collection_name = (!name.trim().is_empty()).then_some(name);
        self
    }

    pub fn with_source_id(mut self, id: impl Into<String>) -> Self {
        self.source_id = Some(id.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_size_bytes(mut self, size: u64) -> Self {
        self.size_bytes = Some(size);
        self
    }

    pub fn download_url(&self) -> &str {
        &self.download_url
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn collection_name(&self) -> Option<&str> {
        self.collection_name.as_deref()
    }

    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.size_bytes
    }
}

/// 提取器使用的键值选项 (凭据、开关等)。空值视为未提供。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractOptions(HashMap<String, String>);

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// 解析 `KEY=VALUE` 形式的命令行参数
    pub fn parse_pair(raw: &str) -> AppResult<(String, String)> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| AppError::InvalidInput(format!("选项格式应为 KEY=VALUE: '{}'", raw)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(AppError::InvalidInput(format!("选项名不能为空: '{}'", raw)));
        }
        Ok((key.to_string(), value.trim().to_string()))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// `1`/`true`/`yes`/`on` 视为开启
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }

    pub fn get_u64(&self, key: &str) -> AppResult<Option<u64>> {
        self.get(key)
            .map(|v| {
                v.trim().parse::<u64>().map_err(|_| {
                    AppError::InvalidInput(format!("选项 '{}' 需要一个非负整数，实际为 '{}'", key, v))
                })
            })
            .transpose()
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum DownloadStatus {
    Success,
    Skipped,
    Failed,
}

#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub filename: String,
    pub status: DownloadStatus,
    pub message: Option<String>,
}

/// 一批下载的汇总结果，与完成顺序无关
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failed_files: Vec<String>,
}

impl BatchReport {
    /// 新下载的和已存在的都算成功
    pub fn completed(&self) -> usize {
        self.succeeded + self.skipped
    }

    pub fn partial_failure(&self) -> Option<AppError> {
        (self.failed > 0 && self.completed() > 0).then(|| AppError::PartialFailure {
            succeeded: self.completed(),
            failed: self.failed_files.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_rejects_empty_fields() {
        assert!(DownloadItem::new("", "a.jpg").unwrap_err().is_input_error());
        assert!(DownloadItem::new("https://x.test/a.jpg", "  ").unwrap_err().is_input_error());
    }

    #[test]
    fn test_item_rejects_non_http_urls() {
        assert!(DownloadItem::new("ftp://x.test/a.jpg", "a.jpg").is_err());
        assert!(DownloadItem::new("not a url", "a.jpg").is_err());
    }

    #[test]
    fn test_item_keeps_raw_filename_and_builders() {
        let item = DownloadItem::new("https://x.test/a", "a:b?.jpg")
            .unwrap()
            .with_collection("album")
            .with_source_id("42")
            .with_header("Referer", "https://x.test/");
        assert_eq!(item.filename(), "a:b?.jpg");
        assert_eq!(item.collection_name(), Some("album"));
        assert_eq!(item.source_id(), Some("42"));
        assert_eq!(item.headers().get("Referer").map(String::as_str), Some("https://x.test/"));
        assert_eq!(item.size_bytes(), None);
        assert_eq!(item.clone().with_size_bytes(7).size_bytes(), Some(7));
    }

    #[test]
    fn test_blank_collection_is_dropped() {
        let item = DownloadItem::new("https://x.test/a", "a").unwrap().with_collection(" ");
        assert_eq!(item.collection_name(), None);
    }

    #[test]
    fn test_options_treat_empty_as_absent() {
        let options = ExtractOptions::from_pairs([("password", ""), ("session_id", "abc"), ("fast", "Yes")]);
        assert_eq!(options.get("password"), None);
        assert_eq!(options.get("session_id"), Some("abc"));
        assert!(options.flag("fast"));
        assert!(!options.flag("missing"));
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            ExtractOptions::parse_pair("password = hunter2").unwrap(),
            ("password".to_string(), "hunter2".to_string())
        );
        assert!(ExtractOptions::parse_pair("novalue").is_err());
        assert!(ExtractOptions::parse_pair("=x").is_err());
    }

    #[test]
    fn test_get_u64() {
        let options = ExtractOptions::from_pairs([("rate_limit_ms", "250"), ("bad", "x")]);
        assert_eq!(options.get_u64("rate_limit_ms").unwrap(), Some(250));
        assert_eq!(options.get_u64("missing").unwrap(), None);
        assert!(options.get_u64("bad").is_err());
    }

    #[test]
    fn test_partial_failure_requires_some_success() {
        let report = BatchReport {
            attempted: 3,
            succeeded: 1,
            skipped: 1,
            failed: 1,
            failed_files: vec!["c.jpg".into()],
        };
        match report.partial_failure() {
            Some(AppError::PartialFailure { succeeded, failed }) => {
                assert_eq!(succeeded, 2);
                assert_eq!(failed, vec!["c.jpg".to_string()]);
            }
            other => panic!("unexpected: {:?}", other),
        }

        let clean = BatchReport { attempted: 1, succeeded: 1, ..Default::default() };
        assert!(clean.partial_failure().is_none());
    }
}
