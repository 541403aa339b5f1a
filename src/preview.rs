// src/preview.rs

//! 下载前的体积探测与预览闸门。
//!
//! 每个下载项发一次有时限的 HEAD 请求读取 `Content-Length`；探测失败一律按 0 计，
//! 不会让整批失败。总量超过阈值时只返回预览，不做任何传输。

use crate::{client::RobustClient, models::DownloadItem};
use futures::{StreamExt, stream};
use indicatif::HumanBytes;
use log::{debug, info};
use serde::Serialize;

/// 并发探测所有下载项的大小，结果保持输入顺序
pub async fn probe_sizes(client: &RobustClient, items: Vec<DownloadItem>) -> Vec<DownloadItem> {
    let timeout = client.config().size_probe_timeout;
    let concurrency = client.config().size_probe_concurrency.max(1);
    stream::iter(items)
        .map(|item| async move {
            let size = match client
                .head_content_length(item.download_url(), item.headers(), timeout)
                .await
            {
                Ok(size) => size.unwrap_or(0),
                Err(e) => {
                    debug!("探测 '{}' 的大小失败，按 0 计: {}", item.download_url(), e);
                    0
                }
            };
            item.with_size_bytes(size)
        })
        .buffered(concurrency)
        .collect()
        .await
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewFile {
    pub filename: String,
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizePreview {
    pub files: Vec<PreviewFile>,
    pub total_bytes: u64,
    pub threshold_bytes: u64,
}

#[derive(Debug)]
pub enum GateDecision {
    Proceed(Vec<DownloadItem>),
    Preview(SizePreview),
}

#[derive(Debug, Clone, Copy)]
pub struct SizeGate {
    pub threshold_bytes: u64,
}

impl SizeGate {
    pub fn new(threshold_bytes: u64) -> Self {
        Self { threshold_bytes }
    }

    /// 总量恰好等于阈值时放行，超过才返回预览
    pub fn evaluate(&self, items: Vec<DownloadItem>) -> GateDecision {
        let total_bytes: u64 = items.iter().map(|i| i.size_bytes().unwrap_or(0)).sum();
        if total_bytes <= self.threshold_bytes {
            debug!("总大小 {} 未超过阈值 {}", HumanBytes(total_bytes), HumanBytes(self.threshold_bytes));
            return GateDecision::Proceed(items);
        }
        info!(
            "总大小 {} 超过阈值 {}，仅返回预览",
            HumanBytes(total_bytes),
            HumanBytes(self.threshold_bytes)
        );
        let files = items
            .iter()
            .map(|i| PreviewFile {
                filename: i.filename().to_string(),
                size: i.size_bytes().unwrap_or(0),
                url: i.download_url().to_string(),
            })
            .collect();
        GateDecision::Preview(SizePreview {
            files,
            total_bytes,
            threshold_bytes: self.threshold_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(name: &str, size: u64) -> DownloadItem {
        DownloadItem::new(format!("https://cdn.test/{}", name), name)
            .unwrap()
            .with_size_bytes(size)
    }

    #[test]
    fn test_exactly_at_threshold_proceeds() {
        let gate = SizeGate::new(100);
        match gate.evaluate(vec![sized("a", 60), sized("b", 40)]) {
            GateDecision::Proceed(items) => assert_eq!(items.len(), 2),
            GateDecision::Preview(_) => panic!("should proceed at the threshold"),
        }
    }

    #[test]
    fn test_one_byte_over_threshold_previews() {
        let gate = SizeGate::new(100);
        match gate.evaluate(vec![sized("a", 60), sized("b", 41)]) {
            GateDecision::Preview(preview) => {
                assert_eq!(preview.total_bytes, 101);
                assert_eq!(preview.threshold_bytes, 100);
                assert_eq!(preview.files[1].filename, "b");
                assert_eq!(preview.files[1].url, "https://cdn.test/b");
            }
            GateDecision::Proceed(_) => panic!("should preview above the threshold"),
        }
    }

    #[test]
    fn test_unknown_sizes_count_as_zero() {
        let gate = SizeGate::new(0);
        let no_size = DownloadItem::new("https://cdn.test/x", "x").unwrap();
        assert!(matches!(gate.evaluate(vec![no_size]), GateDecision::Proceed(_)));
    }

    #[test]
    fn test_preview_serializes_to_json() {
        let preview = match SizeGate::new(1).evaluate(vec![sized("a", 2)]) {
            GateDecision::Preview(p) => p,
            GateDecision::Proceed(_) => unreachable!(),
        };
        let json = serde_json::to_value(&preview).unwrap();
        assert_eq!(json["total_bytes"], 2);
        assert_eq!(json["files"][0]["filename"], "a");
    }
}
