// src/constants.rs

pub const UI_WIDTH: usize = 88;
pub const FILENAME_TRUNCATE_LENGTH: usize = 65;
pub const MAX_FILENAME_BYTES: usize = 200;
pub const CONFIG_DIR_NAME: &str = concat!(".", clap::crate_name!());
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = "mega-dl.log";
pub const LOG_FALLBACK_FILE_NAME: &str = "fallback.log";
pub const DEFAULT_SAVE_DIR: &str = "downloads";
pub const UNNAMED_FILE: &str = "unnamed";
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_MAX_FILES: usize = 500;
pub const SIZE_PROBE_TIMEOUT_SECS: u64 = 5;
pub const SIZE_PROBE_CONCURRENCY: usize = 8;
pub const CYBERDROP_THROTTLE_MS: u64 = 1000;

/// 已知 API 端点模板的键名
pub mod endpoints {
    pub const BUNKR_API: &str = "BUNKR_API";
    pub const CYBERDROP_FILE_INFO: &str = "CYBERDROP_FILE_INFO";
    pub const FANBOX_API: &str = "FANBOX_API";
    pub const FAPELLO_PAGE: &str = "FAPELLO_PAGE";
    pub const GOFILE_API: &str = "GOFILE_API";
    pub const GOFILE_GLOBAL_JS: &str = "GOFILE_GLOBAL_JS";
    pub const PIXELDRAIN_FILE: &str = "PIXELDRAIN_FILE";
    pub const PIXIV_AJAX: &str = "PIXIV_AJAX";
    pub const THOTHUB_MODEL_PAGE: &str = "THOTHUB_MODEL_PAGE";
}

/// 选项映射中约定的键名
pub mod options {
    pub const PASSWORD: &str = "password";
    pub const SESSION_ID: &str = "session_id";
    pub const RATE_LIMIT_MS: &str = "rate_limit_ms";
}

/// 外部提供的凭据所用的环境变量
pub mod env {
    pub const FANBOX_SESSION_ID: &str = "FANBOX_SESSION_ID";
    pub const PIXIV_PHPSESSID: &str = "PIXIV_PHPSESSID";
    pub const GOFILE_PASSWORD: &str = "GOFILE_PASSWORD";
}
