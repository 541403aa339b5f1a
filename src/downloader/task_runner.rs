// src/downloader/task_runner.rs

use super::{DownloadManager, task_processor::TaskProcessor};
use crate::{client::RobustClient, error::*, models::*, symbols, utils};
use colored::*;
use futures::{StreamExt, stream};
use indicatif::ProgressBar;
use log::debug;
use std::{
    cmp::{max, min},
    collections::HashSet,
    path::{Path, PathBuf},
};

/// 下载一批文件并返回汇总报告。
///
/// 至少一个文件下载成功或已存在即视为成功 (部分失败通过
/// [`BatchReport::partial_failure`] 取得)；全部失败或列表为空时返回 `DownloadFailure`。
pub async fn download_batch(
    client: &RobustClient,
    items: &[DownloadItem],
    root: &Path,
    group_by_collection: bool,
) -> AppResult<BatchReport> {
    let manager = DownloadManager::new();
    execute_tasks(client, items, root, group_by_collection, &manager, None).await;
    conclude(manager.report())
}

/// 在有界并发池中执行下载，结果记入 `manager`。单个任务的失败不会中断整批。
/// 目标路径在开始前按输入顺序一次性分配，并发度不影响最终结果。
pub async fn execute_tasks(
    client: &RobustClient,
    items: &[DownloadItem],
    root: &Path,
    group_by_collection: bool,
    manager: &DownloadManager,
    pbar: Option<&ProgressBar>,
) {
    manager.start_batch(items.len());
    if items.is_empty() {
        return;
    }
    let max_workers = max(1, min(client.config().max_workers, items.len()));
    let processor = TaskProcessor::new(client);
    let destinations = plan_destinations(root, items, group_by_collection);

    stream::iter(items.iter().zip(destinations.iter()))
        .for_each_concurrent(max_workers, |(item, dest)| {
            let processor = &processor;
            async move {
                let result = processor.process(item, dest).await;
                match result.status {
                    DownloadStatus::Success => manager.record_success(),
                    DownloadStatus::Skipped => manager.record_skip(
                        &result.filename,
                        result.message.as_deref().unwrap_or("文件已存在"),
                    ),
                    DownloadStatus::Failed => manager.record_failure(
                        &result.filename,
                        result.message.as_deref().unwrap_or("未知错误"),
                    ),
                }
                if let Some(pbar) = pbar {
                    if result.status == DownloadStatus::Failed {
                        pbar.println(format!(
                            "{} {} {}",
                            *symbols::ERROR,
                            result.filename,
                            result.message.unwrap_or_default().red()
                        ));
                    } else if result.status == DownloadStatus::Success {
                        pbar.println(format!("{} {}", *symbols::OK, result.filename));
                    } else {
                        pbar.println(format!("{} {}", *symbols::SKIP, result.filename.bright_black()));
                    }
                    pbar.inc(1);
                }
            }
        })
        .await;
}

/// 把报告折算为批次结果
pub fn conclude(report: BatchReport) -> AppResult<BatchReport> {
    if report.completed() == 0 {
        return Err(AppError::DownloadFailure {
            attempted: report.attempted,
            failed: report.failed_files,
        });
    }
    Ok(report)
}

/// `root/<集合名>/<文件名>`，不分组或没有集合名时直接放在 `root` 下
pub fn destination_for(root: &Path, item: &DownloadItem, group_by_collection: bool) -> PathBuf {
    let dir = match item.collection_name() {
        Some(collection) if group_by_collection => root.join(utils::sanitize_filename(collection)),
        _ => root.to_path_buf(),
    };
    dir.join(utils::sanitize_filename(item.filename()))
}

/// 按输入顺序为每个下载项分配互不相同的目标路径。
///
/// 与前面的项重名 (忽略大小写) 时依次追加 ` (1)`、` (2)` … 后缀。
pub fn plan_destinations(root: &Path, items: &[DownloadItem], group_by_collection: bool) -> Vec<PathBuf> {
    let mut claimed = HashSet::new();
    items
        .iter()
        .map(|item| {
            let base = destination_for(root, item, group_by_collection);
            let mut dest = base.clone();
            let mut n = 1;
            while !claimed.insert(dest.to_string_lossy().to_lowercase()) {
                dest = with_suffix(&base, n);
                n += 1;
            }
            if n > 1 {
                debug!("'{}' 重名，改存为 {}", item.filename(), dest.display());
            }
            dest
        })
        .collect()
}

fn with_suffix(path: &Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{} ({}).{}", stem, n, ext.to_string_lossy()),
        None => format!("{} ({})", stem, n),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_for_groups_by_collection() {
        let item = DownloadItem::new("https://x.test/a", "a:b.jpg")
            .unwrap()
            .with_collection("My/Album");
        let root = Path::new("out");
        assert_eq!(destination_for(root, &item, true), root.join("My_Album").join("a_b.jpg"));
        assert_eq!(destination_for(root, &item, false), root.join("a_b.jpg"));

        let loose = DownloadItem::new("https://x.test/b", "b.jpg").unwrap();
        assert_eq!(destination_for(root, &loose, true), root.join("b.jpg"));
    }

    #[test]
    fn test_plan_destinations_suffixes_collisions_in_order() {
        let items = vec![
            DownloadItem::new("https://x.test/1", "clip.mp4").unwrap(),
            DownloadItem::new("https://x.test/2", "other.mp4").unwrap(),
            DownloadItem::new("https://x.test/3", "Clip.mp4").unwrap(),
            DownloadItem::new("https://x.test/4", "clip?.mp4").unwrap(),
            DownloadItem::new("https://x.test/5", "clip.mp4").unwrap(),
            DownloadItem::new("https://x.test/6", "README").unwrap(),
            DownloadItem::new("https://x.test/7", "README").unwrap(),
        ];
        let root = Path::new("out");
        let names: Vec<String> = plan_destinations(root, &items, false)
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["clip.mp4", "other.mp4", "Clip (1).mp4", "clip_.mp4", "clip (2).mp4", "README", "README (1)"]
        );
    }

    #[test]
    fn test_plan_destinations_only_collides_within_same_dir() {
        let items = vec![
            DownloadItem::new("https://x.test/1", "a.jpg").unwrap().with_collection("one"),
            DownloadItem::new("https://x.test/2", "a.jpg").unwrap().with_collection("two"),
        ];
        let root = Path::new("out");
        assert_eq!(
            plan_destinations(root, &items, true),
            vec![root.join("one").join("a.jpg"), root.join("two").join("a.jpg")]
        );
        assert_eq!(
            plan_destinations(root, &items, false),
            vec![root.join("a.jpg"), root.join("a (1).jpg")]
        );
    }

    #[test]
    fn test_conclude_distinguishes_total_failure() {
        let all_failed = BatchReport {
            attempted: 2,
            failed: 2,
            failed_files: vec!["a".into(), "b".into()],
            ..Default::default()
        };
        assert!(matches!(
            conclude(all_failed),
            Err(AppError::DownloadFailure { attempted: 2, .. })
        ));

        let empty = BatchReport::default();
        assert!(matches!(conclude(empty), Err(AppError::DownloadFailure { attempted: 0, .. })));

        let skipped_only = BatchReport {
            attempted: 1,
            skipped: 1,
            ..Default::default()
        };
        assert!(conclude(skipped_only).is_ok());
    }
}
