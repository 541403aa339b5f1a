// src/cli.rs

use crate::constants;
use clap::{Parser, ValueEnum, command, crate_version};
use std::path::PathBuf;

/// 定义日志输出级别
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// command 属性
#[derive(Parser, Debug, Clone)]
#[command(
    version = crate_version!(),
    about,
    long_about = None,
    arg_required_else_help = true,
    disable_help_flag = true,
    disable_version_flag = true,
)]
#[command(group(
    clap::ArgGroup::new("mode")
        .required(true)
        .args(&["url", "batch_file", "list_plugins"]),
))]
pub struct Cli {
    // --- 运行模式 (Mode) ---
    /// 指定要处理的单个页面链接
    #[arg(long, help_heading = "Mode")]
    pub url: Option<String>,
    /// 从文本文件批量处理多个链接 (每行一个，# 开头为注释)
    #[arg(short, long, value_name = "FILE", help_heading = "Mode")]
    pub batch_file: Option<PathBuf>,
    /// 列出所有支持的站点并退出
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Mode")]
    pub list_plugins: bool,

    // --- 下载选项 (Options) ---
    /// 设置文件保存目录
    #[arg(short, long, value_name = "DIR", default_value_os_t = PathBuf::from(constants::DEFAULT_SAVE_DIR), help_heading = "Options")]
    pub output: PathBuf,
    /// 将所有文件下载到输出目录的根路径，不按相册/作者创建子目录
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub flat: bool,
    /// 只列出找到的文件，不下载
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub extract_only: bool,
    /// [列出模式] 以 JSON 格式输出
    #[arg(long, action = clap::ArgAction::SetTrue, requires = "extract_only", help_heading = "Options")]
    pub json: bool,
    /// 只保留文件名匹配该通配符的文件 (支持 * 和 ?)
    #[arg(long, value_name = "GLOB", help_heading = "Options")]
    pub pattern: Option<String>,
    /// 传给站点适配器的额外选项，可重复使用
    #[arg(short = 'O', long = "option", value_name = "KEY=VALUE", help_heading = "Options")]
    pub options: Vec<String>,
    /// 访问受密码保护的内容 (Gofile)
    #[arg(long, help_heading = "Options")]
    pub password: Option<String>,
    /// 登录会话 ID (Pixiv 的 PHPSESSID / Fanbox 的 FANBOXSESSID)
    #[arg(long, help_heading = "Options")]
    pub session_id: Option<String>,
    /// 总大小超过该值 (MB) 时只显示预览，不下载
    #[arg(long, value_name = "MB", help_heading = "Options")]
    pub max_size_mb: Option<f64>,
    /// 找到的文件数超过该值时立即中止
    #[arg(long, value_name = "N", help_heading = "Options")]
    pub max_files: Option<usize>,
    /// 设置最大并发下载数
    #[arg(short, long, value_parser = clap::value_parser!(usize), help_heading = "Options")]
    pub workers: Option<usize>,

    // --- 通用选项 (General) ---
    /// 显示此帮助信息并退出
    #[arg(short = 'h', long, action = clap::ArgAction::Help, global = true, help_heading = "General")]
    _help: Option<bool>,
    /// 显示版本信息并退出
    #[arg(short = 'V', long, action = clap::ArgAction::Version, global = true, help_heading = "General")]
    _version: Option<bool>,
    /// (隐藏参数) 设置日志文件的输出级别，用于调试
    #[arg(long, value_enum, default_value_t = LogLevel::Off, global = true, hide = true)]
    pub log_level: LogLevel,
}
