// src/workflows.rs

use crate::{
    build_extractor_with,
    cli::Cli,
    collect_items_with_progress,
    config::AppConfig,
    constants,
    downloader::{self, DownloadManager},
    error::{AppError, AppResult},
    models::{BatchReport, DownloadItem, ExtractOptions},
    preview::{self, GateDecision, SizeGate, SizePreview},
    resolver::{DomainResolver, ExtractorKind},
    symbols, ui,
    utils::{self, FilenameFilter},
};
use anyhow::{Context, anyhow};
use colored::*;
use indicatif::HumanBytes;
use itertools::Itertools;
use log::{info, warn};
use std::{fs, path::Path, sync::Arc};

/// 一次命令行运行中各任务共享的上下文
pub(crate) struct RunContext {
    pub args: Arc<Cli>,
    pub config: Arc<AppConfig>,
    pub options: ExtractOptions,
    pub filter: Option<FilenameFilter>,
    pub resolver: DomainResolver,
}

pub(crate) fn list_plugins(resolver: &DomainResolver) {
    ui::print_header("支持的站点");
    for kind in ExtractorKind::ALL {
        ui::plain(&format!(
            "  {:<12} {}\n  {:<12} {}",
            kind.name().cyan().bold(),
            kind.description(),
            "",
            resolver.domains_for(kind).iter().join(", ").bright_black()
        ));
    }
}

/// 运行单任务模式 (处理 --url)。部分文件失败时以 `PartialFailure` 结束。
pub(crate) async fn run_single(context: &RunContext, url: &str) -> AppResult<()> {
    if let Some(report) = process_url(context, url).await?
        && let Some(partial) = report.partial_failure()
    {
        return Err(partial);
    }
    Ok(())
}

/// 运行批量模式，逐行处理；单个任务失败不影响后续任务
pub(crate) async fn run_batch(context: &RunContext, batch_file: &Path) -> AppResult<()> {
    let content = fs::read_to_string(batch_file)
        .with_context(|| format!("读取批量文件 '{}' 失败", batch_file.display()))?;
    let tasks = utils::parse_batch_lines(&content);
    if tasks.is_empty() {
        warn!("批量文件 '{}' 为空或不含有效行。", batch_file.display());
        ui::warn(&format!("批量文件 '{}' 为空。", batch_file.display()));
        return Ok(());
    }

    ui::print_header(&format!(
        "开始批量处理任务 (共 {} 个，按 {} 可随时退出)",
        tasks.len(),
        *symbols::CTRL_C
    ));
    let mut success = 0;
    let mut failed = 0;
    for (i, task) in tasks.iter().enumerate() {
        ui::print_sub_header(&format!(
            "批量任务 {}/{} - {}",
            i + 1,
            tasks.len(),
            utils::truncate_text(task, 60)
        ));
        let result = match process_url(context, task).await {
            Ok(Some(report)) => report.partial_failure().map_or(Ok(()), Err),
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => success += 1,
            Err(e) => {
                failed += 1;
                log::error!("批量任务 '{}' 失败: {}", task, e);
                ui::error(&format!("处理任务时发生错误: {}", e));
            }
        }
    }

    ui::print_header("批量任务报告");
    ui::plain(&format!(
        "{} | {} | 总计: {}",
        format!("成功任务: {}", success).green(),
        format!("失败任务: {}", failed).red(),
        tasks.len()
    ));
    if failed > 0 {
        Err(AppError::Other(anyhow!("{} 个批量任务执行失败。", failed)))
    } else {
        Ok(())
    }
}

/// 提取 → 过滤 → (列出 | 预览闸门) → 下载。
/// 只列出或被闸门拦下时返回 `None`。
async fn process_url(context: &RunContext, url: &str) -> AppResult<Option<BatchReport>> {
    let extractor = build_extractor_with(&context.resolver, url, &context.options, context.config.clone())?;
    ui::info(&format!("[{}] {}", extractor.name(), url));

    let spinner = ui::new_spinner("正在提取文件列表...");
    let collected = collect_items_with_progress(extractor.as_ref(), context.config.max_items, |found| {
        spinner.set_message(format!("正在提取文件列表... 已找到 {found} 个"))
    })
    .await;
    spinner.finish_and_clear();
    let mut items = collected?;

    if let Some(filter) = &context.filter {
        let before = items.len();
        items.retain(|item| filter.is_match(item.filename()));
        info!("过滤模式 '{}': {} -> {}", filter.pattern(), before, items.len());
        if items.is_empty() {
            return Err(AppError::NoItemsFound(format!("{} (过滤模式: {})", url, filter.pattern())));
        }
        ui::info(&format!("过滤模式 '{}' 保留 {}/{} 个文件", filter.pattern(), items.len(), before));
    }

    if context.args.extract_only {
        print_listing(&items, context.args.json)?;
        return Ok(None);
    }

    if let Some(threshold) = context.config.max_total_bytes {
        let probed = preview::probe_sizes(extractor.client(), items).await;
        match SizeGate::new(threshold).evaluate(probed) {
            GateDecision::Proceed(proceed) => items = proceed,
            GateDecision::Preview(preview) => {
                print_preview(&preview);
                return Ok(None);
            }
        }
    }

    fs::create_dir_all(&context.args.output)?;
    let root = dunce::canonicalize(&context.args.output)?;
    ui::info(&format!(
        "开始下载 {} 个文件到 '{}' (并发数: {})...",
        items.len(),
        root.display(),
        context.config.max_workers
    ));

    let manager = DownloadManager::new();
    let pbar = ui::new_tasks_progress_bar(items.len() as u64, "下载");
    downloader::execute_tasks(extractor.client(), &items, &root, !context.args.flat, &manager, Some(&pbar)).await;
    pbar.finish_and_clear();
    manager.print_report();
    downloader::conclude(manager.report()).map(Some)
}

fn print_listing(items: &[DownloadItem], as_json: bool) -> AppResult<()> {
    if as_json {
        ui::plain(&serde_json::to_string_pretty(items)?);
        return Ok(());
    }
    ui::print_sub_header(&format!("找到 {} 个文件", items.len()));
    let pad = items.len().to_string().len();
    for (i, item) in items.iter().enumerate() {
        let collection = item
            .collection_name()
            .map(|c| format!("[{}] ", c).bright_black().to_string())
            .unwrap_or_default();
        ui::plain(&format!(
            "  {:>pad$}. {}{}",
            i + 1,
            collection,
            utils::truncate_text(item.filename(), constants::FILENAME_TRUNCATE_LENGTH),
            pad = pad
        ));
    }
    Ok(())
}

fn print_preview(preview: &SizePreview) {
    let mut lines: Vec<String> = preview
        .files
        .iter()
        .map(|f| {
            format!(
                "{:>10}  {}",
                HumanBytes(f.size).to_string(),
                utils::truncate_text(&f.filename, constants::FILENAME_TRUNCATE_LENGTH)
            )
        })
        .collect();
    lines.push(String::new());
    lines.push(format!(
        "总大小 {} 超过上限 {}，未下载任何文件。",
        HumanBytes(preview.total_bytes),
        HumanBytes(preview.threshold_bytes)
    ));
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    ui::box_message(&format!("预览 ({} 个文件)", preview.files.len()), &refs, |s| s.yellow());
}
