// src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("无效输入: {0}")]
    InvalidInput(String),
    #[error("不支持的域名: {0}")]
    UnsupportedDomain(String),
    #[error("从 '{url}' 提取文件信息失败: {source}")]
    ExtractionFailure {
        url: String,
        #[source]
        source: Box<AppError>,
    },
    #[error("未在 '{0}' 中找到任何可下载的文件")]
    NoItemsFound(String),
    #[error("文件数量超过上限 ({limit} 个)")]
    TooManyItems { limit: usize },
    #[error("没有任何文件下载成功 (共尝试 {attempted} 个)")]
    DownloadFailure {
        attempted: usize,
        failed: Vec<String>,
    },
    #[error("{} 个文件下载失败 (成功 {succeeded} 个): {}", failed.len(), failed.join(", "))]
    PartialFailure {
        succeeded: usize,
        failed: Vec<String>,
    },
    #[error("网络请求失败: {0}")]
    Network(#[from] reqwest::Error),
    #[error("网络中间件错误: {0}")]
    NetworkMiddleware(#[from] reqwest_middleware::Error),
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("临时文件持久化失败: {0}")]
    TempFilePersist(#[from] tempfile::PersistError),
    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("无法解析来自 '{url}' 的API响应: {source}")]
    ApiParseFailed {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("URL 解析错误: {0}")]
    Url(#[from] url::ParseError),
    #[error("未知错误: {0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// 输入类错误，重试没有意义
    pub fn is_input_error(&self) -> bool {
        matches!(self, AppError::InvalidInput(_) | AppError::UnsupportedDomain(_))
    }

    pub(crate) fn extraction(url: &str, source: AppError) -> Self {
        match source {
            e @ AppError::ExtractionFailure { .. } => e,
            e => AppError::ExtractionFailure {
                url: url.to_string(),
                source: Box::new(e),
            },
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
