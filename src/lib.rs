// src/lib.rs

pub mod cipher;
pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod downloader;
pub mod error;
pub mod extractor;
pub mod models;
pub mod preview;
pub mod resolver;
pub mod symbols;
pub mod ui;
pub mod utils;
mod workflows;

pub use crate::{
    downloader::download_batch,
    extractor::Extractor,
    preview::{GateDecision, SizeGate, probe_sizes},
};

use crate::{
    cli::Cli,
    config::AppConfig,
    constants::options as option_keys,
    error::{AppError, AppResult},
    models::{DownloadItem, ExtractOptions},
    resolver::{DomainResolver, ExtractorKind},
};
use futures::StreamExt;
use log::{debug, info};
use std::sync::Arc;

/// 按内置域名表判断链接属于哪个站点
pub fn resolve(url: &str) -> Option<ExtractorKind> {
    DomainResolver::default().resolve(url)
}

/// 为链接构造对应站点的提取器
pub fn build_extractor(
    url: &str,
    options: &ExtractOptions,
    config: Arc<AppConfig>,
) -> AppResult<Box<dyn Extractor>> {
    build_extractor_with(&DomainResolver::default(), url, options, config)
}

pub fn build_extractor_with(
    resolver: &DomainResolver,
    url: &str,
    options: &ExtractOptions,
    config: Arc<AppConfig>,
) -> AppResult<Box<dyn Extractor>> {
    let url = url.trim();
    if url.is_empty() {
        return Err(AppError::InvalidInput("链接不能为空".into()));
    }
    url::Url::parse(url).map_err(|e| AppError::InvalidInput(format!("无效的链接 '{}': {}", url, e)))?;
    let kind = resolver
        .resolve(url)
        .ok_or_else(|| AppError::UnsupportedDomain(url.to_string()))?;
    debug!("链接 '{}' 交给 {} 处理", url, kind);
    extractor::create(kind, url, options, config)
}

/// 取尽提取器产出的所有下载项。
///
/// 数量一旦超过 `max_items` 立即返回 `TooManyItems`，不再请求后续页面；
/// 结果为空时返回 `NoItemsFound`。
pub async fn collect_items(
    extractor: &dyn Extractor,
    max_items: Option<usize>,
) -> AppResult<Vec<DownloadItem>> {
    collect_items_with_progress(extractor, max_items, |_| {}).await
}

/// 同 [`collect_items`]，每取到一个文件就以当前总数回调一次
pub async fn collect_items_with_progress(
    extractor: &dyn Extractor,
    max_items: Option<usize>,
    mut on_item: impl FnMut(usize),
) -> AppResult<Vec<DownloadItem>> {
    let mut stream = extractor.extract();
    let mut items = Vec::new();
    while let Some(next) = stream.next().await {
        let item = next.map_err(|e| AppError::extraction(extractor.source_url(), e))?;
        items.push(item);
        on_item(items.len());
        if let Some(limit) = max_items
            && items.len() > limit
        {
            return Err(AppError::TooManyItems { limit });
        }
    }
    if items.is_empty() {
        return Err(AppError::NoItemsFound(extractor.source_url().to_string()));
    }
    info!("从 '{}' 提取到 {} 个文件", extractor.source_url(), items.len());
    Ok(items)
}

/// 命令行中的 `-O KEY=VALUE` 与专用凭据参数合并为选项表，专用参数优先
pub fn options_from_cli(args: &Cli) -> AppResult<ExtractOptions> {
    let mut options = ExtractOptions::new();
    for raw in &args.options {
        let (key, value) = ExtractOptions::parse_pair(raw)?;
        options.insert(key, value);
    }
    if let Some(password) = &args.password {
        options.insert(option_keys::PASSWORD, password.clone());
    }
    if let Some(session_id) = &args.session_id {
        options.insert(option_keys::SESSION_ID, session_id.clone());
    }
    Ok(options)
}

/// 库的公共入口点，由 `main.rs` 调用
pub async fn run_from_cli(args: Arc<Cli>) -> AppResult<()> {
    debug!("CLI 参数: {:?}", args);
    let resolver = DomainResolver::default();
    if args.list_plugins {
        workflows::list_plugins(&resolver);
        return Ok(());
    }

    let config = Arc::new(AppConfig::new(&args)?);
    debug!("加载的应用配置: {:?}", config);
    let options = options_from_cli(&args)?;
    let filter = args.pattern.as_deref().map(utils::FilenameFilter::new).transpose()?;

    let context = workflows::RunContext {
        args: args.clone(),
        config,
        options,
        filter,
        resolver,
    };

    if let Some(batch_file) = &args.batch_file {
        workflows::run_batch(&context, batch_file).await
    } else if let Some(url) = &args.url {
        workflows::run_single(&context, url).await
    } else {
        Ok(())
    }
}
