// src/config/credentials.rs

use crate::{
    config::{AppConfig, ExternalConfig},
    constants,
    error::{AppError, AppResult},
    models::ExtractOptions,
};
use anyhow::{Context, anyhow};
use log::{debug, info};
use std::{fmt, fs, path::PathBuf};

pub(super) fn get_config_path() -> AppResult<PathBuf> {
    let path = dirs::home_dir()
        .ok_or_else(|| AppError::Other(anyhow!("无法获取用户主目录")))?
        .join(constants::CONFIG_DIR_NAME)
        .join(constants::CONFIG_FILE_NAME);
    Ok(path)
}

pub(crate) fn load_or_create_external_config() -> AppResult<ExternalConfig> {
    let config_path = get_config_path()?;
    if config_path.is_file() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("读取配置文件 '{}' 失败", config_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件 '{}' 失败", config_path.display()))
            .map_err(AppError::from)
    } else {
        info!("配置文件 {:?} 不存在，将创建默认配置。", config_path);
        let config = ExternalConfig::default_app_config();

        if let Some(dir) = config_path.parent() {
            fs::create_dir_all(dir)?;
        }

        let json_content = serde_json::to_string_pretty(&config)?;
        fs::write(&config_path, json_content)?;

        Ok(config)
    }
}

/// 凭据的来源，按优先级从高到低排列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Option,
    Environment,
    ConfigFile,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CredentialSource::Option => "命令行选项",
            CredentialSource::Environment => "环境变量",
            CredentialSource::ConfigFile => "本地配置文件",
        };
        f.write_str(label)
    }
}

/// 按 选项 > 环境变量 > 配置文件 的顺序解析凭据。
/// 找不到时返回 `None`，调用方应退回到仅访问公开内容的模式。
pub fn resolve_credential(
    options: &ExtractOptions,
    option_key: &str,
    env_key: &str,
    config: &AppConfig,
) -> Option<(String, CredentialSource)> {
    pick_credential(
        options.get(option_key),
        std::env::var(env_key).ok().as_deref(),
        config.credentials.get(env_key).map(String::as_str),
    )
}

pub(crate) fn pick_credential(
    option_value: Option<&str>,
    env_value: Option<&str>,
    file_value: Option<&str>,
) -> Option<(String, CredentialSource)> {
    if let Some(value) = option_value && !value.is_empty() {
        debug!("使用来自选项的凭据");
        return Some((value.to_string(), CredentialSource::Option));
    }
    if let Some(value) = env_value && !value.is_empty() {
        debug!("使用来自环境变量的凭据");
        return Some((value.to_string(), CredentialSource::Environment));
    }
    if let Some(value) = file_value && !value.is_empty() {
        debug!("使用来自本地配置文件的凭据");
        return Some((value.to_string(), CredentialSource::ConfigFile));
    }
    debug!("未在任何位置找到可用的凭据");
    None
}
