// src/extractor/mod.rs

pub mod bunkr;
pub mod cyberdrop;
pub mod fanbox;
pub mod fapello;
pub mod gofile;
pub mod pixeldrain;
pub mod pixiv;
pub mod thothub_to;
mod crawl;
mod throttle;

pub use throttle::Throttle;

use crate::{
    client::RobustClient,
    config::AppConfig,
    downloader::TaskProcessor,
    error::*,
    models::{DownloadItem, DownloadStatus, ExtractOptions},
    resolver::ExtractorKind,
    utils,
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::{path::Path, sync::Arc};
use url::Url;

pub type ItemStream<'a> = BoxStream<'a, AppResult<DownloadItem>>;

/// 所有站点适配器的统一接口。
///
/// 每个实例独占一个 [`RobustClient`]，凭据在构造时解析完毕。
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn source_url(&self) -> &str;

    fn client(&self) -> &RobustClient;

    /// 惰性地产出下载项。构造流本身不发出请求，只有轮询时才会访问网络；
    /// 中途丢弃流即可放弃剩余页面。
    fn extract(&self) -> ItemStream<'_>;

    /// 下载到 `dest_dir/<净化后的文件名>`。目标已存在时直接跳过；失败时清理残留文件。
    async fn download(&self, item: &DownloadItem, dest_dir: &Path) -> DownloadStatus {
        let dest = dest_dir.join(utils::sanitize_filename(item.filename()));
        TaskProcessor::new(self.client()).process(item, &dest).await.status
    }
}

/// 按提取器类型构造实例
pub fn create(
    kind: ExtractorKind,
    url: &str,
    options: &ExtractOptions,
    config: Arc<AppConfig>,
) -> AppResult<Box<dyn Extractor>> {
    let extractor: Box<dyn Extractor> = match kind {
        ExtractorKind::Bunkr => Box::new(bunkr::BunkrExtractor::new(url, options, config)?),
        ExtractorKind::Cyberdrop => {
            Box::new(cyberdrop::CyberdropExtractor::new(url, options, config)?)
        }
        ExtractorKind::Fanbox => Box::new(fanbox::FanboxExtractor::new(url, options, config)?),
        ExtractorKind::Fapello => Box::new(fapello::FapelloExtractor::new(url, options, config)?),
        ExtractorKind::Gofile => Box::new(gofile::GofileExtractor::new(url, options, config)?),
        ExtractorKind::PixelDrain => {
            Box::new(pixeldrain::PixelDrainExtractor::new(url, options, config)?)
        }
        ExtractorKind::Pixiv => Box::new(pixiv::PixivExtractor::new(url, options, config)?),
        ExtractorKind::ThothubTo => {
            Box::new(thothub_to::ThothubToExtractor::new(url, options, config)?)
        }
    };
    Ok(extractor)
}

/// 解析来源链接，空串或无法解析时返回 `InvalidInput`
pub(crate) fn parse_source_url(url: &str) -> AppResult<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("链接不能为空".into()));
    }
    Url::parse(trimmed).map_err(|e| AppError::InvalidInput(format!("无效的链接 '{}': {}", trimmed, e)))
}

/// 取链接路径的最后一段并做百分号解码
pub(crate) fn last_path_segment(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    let decoded = percent_encoding::percent_decode_str(segment)
        .decode_utf8_lossy()
        .to_string();
    (!decoded.is_empty()).then_some(decoded)
}

/// 元素的文本内容，合并空白后为空则返回 `None`
pub(crate) fn text_of(element: scraper::ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// 取路径里的扩展名 (含点)，没有则为空串
pub(crate) fn extension_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| last_path_segment(&u))
        .and_then(|name| {
            Path::new(&name)
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
        })
        .unwrap_or_default()
}
