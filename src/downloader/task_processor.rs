// src/downloader/task_processor.rs

use crate::{
    client::{RobustClient, parse_header},
    error::*,
    models::*,
};
use futures::StreamExt;
use indicatif::HumanBytes;
use log::{debug, error};
use std::{
    fs,
    io::Write as IoWrite,
    path::Path,
};
use tempfile::NamedTempFile;

/// `TaskProcessor` 封装了处理单个下载任务的所有逻辑。
pub struct TaskProcessor<'a> {
    client: &'a RobustClient,
}

impl<'a> TaskProcessor<'a> {
    pub fn new(client: &'a RobustClient) -> Self {
        Self { client }
    }

    /// 把 `item` 下载到 `dest`。目标文件已存在时直接跳过，不发出任何请求；
    /// 任何错误都折算为 `Failed`，不会向上传播。
    pub async fn process(&self, item: &DownloadItem, dest: &Path) -> DownloadResult {
        let filename = dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| item.filename().to_string());

        if dest.exists() {
            debug!("目标文件已存在，跳过: {}", dest.display());
            return DownloadResult {
                filename,
                status: DownloadStatus::Skipped,
                message: Some("文件已存在".to_string()),
            };
        }

        match self.transfer(item, dest).await {
            Ok(bytes) => {
                debug!("下载完成: {} ({})", dest.display(), HumanBytes(bytes));
                DownloadResult {
                    filename,
                    status: DownloadStatus::Success,
                    message: None,
                }
            }
            Err(e) => {
                error!("下载 '{}' 失败: {}", item.download_url(), e);
                DownloadResult {
                    filename,
                    status: DownloadStatus::Failed,
                    message: Some(e.to_string()),
                }
            }
        }
    }

    /// 响应体先写入同目录下的临时文件，完整收到后才改名为最终文件名。
    /// 出错时临时文件随 `NamedTempFile` 一起被删除。
    async fn transfer(&self, item: &DownloadItem, dest: &Path) -> AppResult<u64> {
        let parent = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let mut request = self.client.client.get(item.download_url());
        for (name, value) in item.headers() {
            let (name, value) = parse_header(name, value)?;
            request = request.header(name, value);
        }
        let res = request.send().await?.error_for_status()?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        let mut written = 0u64;
        let mut stream = res.bytes_stream();
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            tmp.as_file_mut().write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        tmp.as_file_mut().flush()?;
        tmp.persist(dest)?;
        Ok(written)
    }
}
