// src/config.rs

pub mod credentials;

use self::credentials::load_or_create_external_config;
use crate::{
    cli::Cli,
    constants::{self, endpoints},
    error::{AppError, AppResult},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkConfig {
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_min_backoff_ms: Option<u64>,
    pub retry_max_backoff_ms: Option<u64>,
    pub size_probe_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    /// 覆盖内置的 API 端点模板，未列出的键使用默认值
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
    /// 凭据表，键名与对应的环境变量相同 (如 `PIXIV_PHPSESSID`)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub credentials: HashMap<String, String>,
}

impl ExternalConfig {
    pub fn default_app_config() -> Self {
        // 为 NetworkConfig 提供一组稳健的默认值
        let network_config = NetworkConfig {
            connect_timeout_secs: Some(10),
            timeout_secs: Some(60),
            max_retries: Some(3),
            retry_min_backoff_ms: Some(500),
            retry_max_backoff_ms: Some(10_000),
            size_probe_timeout_secs: Some(constants::SIZE_PROBE_TIMEOUT_SECS),
        };

        Self {
            network: network_config,
            endpoints: default_endpoints(),
            credentials: HashMap::new(),
        }
    }
}

pub fn default_endpoints() -> HashMap<String, String> {
    HashMap::from([
        (endpoints::BUNKR_API.into(), "https://apidl.bunkr.ru/api/_001_v2".into()),
        (endpoints::CYBERDROP_FILE_INFO.into(), "https://api.cyberdrop.me/api/file/info/{file_id}".into()),
        (endpoints::FANBOX_API.into(), "https://api.fanbox.cc/{method}".into()),
        (endpoints::FAPELLO_PAGE.into(), "https://fapello.com/ajax/model/{model}/page-{page}/".into()),
        (endpoints::GOFILE_API.into(), "https://api.gofile.io/{path}".into()),
        (endpoints::GOFILE_GLOBAL_JS.into(), "https://gofile.io/dist/js/global.js".into()),
        (endpoints::PIXELDRAIN_FILE.into(), "https://pixeldrain.com/api/file/{file_id}".into()),
        (endpoints::PIXIV_AJAX.into(), "https://www.pixiv.net/ajax/{path}".into()),
        (
            endpoints::THOTHUB_MODEL_PAGE.into(),
            "https://thothub.to/models/{model}/?mode=async&function=get_block&block_id=list_videos_common_videos_list&sort_by=post_date&from={page}".into(),
        ),
    ])
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub max_workers: usize,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_min_backoff: Duration,
    pub retry_max_backoff: Duration,
    pub size_probe_timeout: Duration,
    pub size_probe_concurrency: usize,
    /// 预览闸门阈值，`None` 表示不启用
    pub max_total_bytes: Option<u64>,
    pub max_items: Option<usize>,
    pub api_throttle: Duration,
    pub endpoints: HashMap<String, String>,
    pub credentials: HashMap<String, String>,
}

impl AppConfig {
    pub fn new(args: &Cli) -> AppResult<Self> {
        let external_config = load_or_create_external_config()?;
        let mut config = Self::from_external(external_config);

        if let Some(workers) = args.workers {
            config.max_workers = workers.max(1);
        }
        if let Some(mb) = args.max_size_mb {
            if !mb.is_finite() || mb < 0.0 {
                return Err(AppError::InvalidInput(format!("无效的大小上限: {}", mb)));
            }
            config.max_total_bytes = Some((mb * 1024.0 * 1024.0) as u64);
        }
        config.max_items = Some(args.max_files.unwrap_or(constants::DEFAULT_MAX_FILES));
        Ok(config)
    }

    pub fn from_external(external_config: ExternalConfig) -> Self {
        let network = external_config.network;
        let mut endpoints = default_endpoints();
        endpoints.extend(external_config.endpoints);

        Self {
            max_workers: constants::DEFAULT_WORKERS,
            user_agent: constants::USER_AGENT.into(),
            connect_timeout: Duration::from_secs(network.connect_timeout_secs.unwrap_or(10)),
            timeout: Duration::from_secs(network.timeout_secs.unwrap_or(60)),
            max_retries: network.max_retries.unwrap_or(3),
            retry_min_backoff: Duration::from_millis(network.retry_min_backoff_ms.unwrap_or(500)),
            retry_max_backoff: Duration::from_millis(network.retry_max_backoff_ms.unwrap_or(10_000)),
            size_probe_timeout: Duration::from_secs(
                network
                    .size_probe_timeout_secs
                    .unwrap_or(constants::SIZE_PROBE_TIMEOUT_SECS),
            ),
            size_probe_concurrency: constants::SIZE_PROBE_CONCURRENCY,
            max_total_bytes: None,
            max_items: None,
            api_throttle: Duration::from_millis(constants::CYBERDROP_THROTTLE_MS),
            endpoints,
            credentials: external_config.credentials,
        }
    }

    /// 取出端点模板并替换其中的 `{name}` 占位符
    pub fn endpoint(&self, key: &str, params: &[(&str, &str)]) -> AppResult<String> {
        let template = self
            .endpoints
            .get(key)
            .ok_or_else(|| AppError::InvalidInput(format!("未配置端点 '{}'", key)))?;
        let mut url = template.clone();
        for (name, value) in params {
            url = url.replace(&format!("{{{}}}", name), value);
        }
        Ok(url)
    }
}

#[cfg(any(test, feature = "testing"))]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            user_agent: "test-agent/1.0".to_string(),
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
            max_retries: 2,
            retry_min_backoff: Duration::from_millis(10),
            retry_max_backoff: Duration::from_millis(50),
            size_probe_timeout: Duration::from_secs(2),
            size_probe_concurrency: 4,
            max_total_bytes: None,
            max_items: None,
            api_throttle: Duration::from_millis(0),
            endpoints: default_endpoints(),
            credentials: HashMap::new(),
        }
    }
}
