// src/downloader/mod.rs

mod task_processor;
mod task_runner;

pub use task_processor::TaskProcessor;
pub use task_runner::{conclude, destination_for, download_batch, execute_tasks, plan_destinations};

// DownloadManager 是批次内各并发任务共享的统计状态
use crate::{models::BatchReport, symbols, ui};
use colored::*;
use log::info;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

#[derive(Clone, Default)]
pub struct DownloadStats {
    pub total: usize,
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct DownloadManager {
    stats: Arc<Mutex<DownloadStats>>,
    failed_downloads: Arc<Mutex<Vec<(String, String)>>>,
    skipped_downloads: Arc<Mutex<Vec<(String, String)>>>,
}

impl Default for DownloadManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadManager {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(Mutex::new(DownloadStats::default())),
            failed_downloads: Arc::new(Mutex::new(Vec::new())),
            skipped_downloads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn start_batch(&self, total_tasks: usize) {
        info!("开始新一批下载任务，总数: {}", total_tasks);
        let mut stats = self.stats.lock().unwrap();
        *stats = DownloadStats {
            total: total_tasks,
            ..Default::default()
        };
        self.failed_downloads.lock().unwrap().clear();
        self.skipped_downloads.lock().unwrap().clear();
    }

    pub fn record_success(&self) {
        self.stats.lock().unwrap().success += 1;
    }

    pub fn record_skip(&self, filename: &str, reason: &str) {
        info!("跳过文件 '{}'，原因: {}", filename, reason);
        self.stats.lock().unwrap().skipped += 1;
        self.skipped_downloads
            .lock()
            .unwrap()
            .push((filename.to_string(), reason.to_string()));
    }

    pub fn record_failure(&self, filename: &str, reason: &str) {
        log::error!("文件 '{}' 下载失败: {}", filename, reason);
        self.stats.lock().unwrap().failed += 1;
        self.failed_downloads
            .lock()
            .unwrap()
            .push((filename.to_string(), reason.to_string()));
    }

    pub fn get_stats(&self) -> DownloadStats {
        self.stats.lock().unwrap().clone()
    }

    /// 汇总为与完成顺序无关的报告，失败文件名已排序
    pub fn report(&self) -> BatchReport {
        let stats = self.get_stats();
        let mut failed_files: Vec<String> = self
            .failed_downloads
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        failed_files.sort();
        BatchReport {
            attempted: stats.total,
            succeeded: stats.success,
            skipped: stats.skipped,
            failed: stats.failed,
            failed_files,
        }
    }

    pub fn print_report(&self) {
        let stats = self.get_stats();
        let skipped = self.skipped_downloads.lock().unwrap();
        let failed = self.failed_downloads.lock().unwrap();
        info!(
            "下载报告: Total={}, Success={}, Skipped={}, Failed={}",
            stats.total, stats.success, stats.skipped, stats.failed
        );

        if !skipped.is_empty() || !failed.is_empty() {
            ui::print_sub_header("下载详情报告");
            if !skipped.is_empty() {
                println!("\n{} 跳过的文件 ({}个):", *symbols::INFO, stats.skipped);
                print_grouped_report(&skipped, |s| s.cyan());
            }
            if !failed.is_empty() {
                println!("\n{} 失败的文件 ({}个):", *symbols::ERROR, stats.failed);
                print_grouped_report(&failed, |s| s.red());
            }
        }
        ui::print_sub_header("任务总结");
        if stats.total > 0 && stats.failed == 0 {
            println!(
                "{} 所有 {} 个任务均已完成 ({} 个已跳过)。",
                *symbols::OK,
                stats.total,
                stats.skipped
            );
        } else {
            let summary = format!(
                "{} | {} | {}",
                format!("成功: {}", stats.success).green(),
                format!("失败: {}", stats.failed).red(),
                format!("跳过: {}", stats.skipped).yellow()
            );
            println!("{}", summary);
        }
    }
}

// 按原因分组打印，组内文件名排序
fn print_grouped_report(
    items: &[(String, String)],
    color_fn: fn(ColoredString) -> ColoredString,
) {
    let mut grouped: HashMap<&String, Vec<&String>> = HashMap::new();
    for (filename, reason) in items {
        grouped.entry(reason).or_default().push(filename);
    }
    let mut sorted: Vec<_> = grouped.into_iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    for (reason, mut filenames) in sorted {
        println!("  - {}", color_fn(format!("原因: {}", reason).into()));
        filenames.sort();
        for filename in filenames {
            println!("    - {}", filename);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_sorts_failed_files() {
        let manager = DownloadManager::new();
        manager.start_batch(4);
        manager.record_failure("z.jpg", "HTTP 500");
        manager.record_success();
        manager.record_skip("b.jpg", "文件已存在");
        manager.record_failure("a.jpg", "HTTP 404");

        let report = manager.report();
        assert_eq!(report.attempted, 4);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.failed_files, vec!["a.jpg", "z.jpg"]);
        assert!(report.partial_failure().is_some());
    }

    #[test]
    fn test_start_batch_resets_state() {
        let manager = DownloadManager::new();
        manager.start_batch(1);
        manager.record_failure("x", "err");
        manager.start_batch(2);
        let report = manager.report();
        assert_eq!(report.attempted, 2);
        assert_eq!(report.failed, 0);
        assert!(report.failed_files.is_empty());
    }
}
