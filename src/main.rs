// src/main.rs

use clap::{CommandFactory, FromArgMatches};
use colored::*;
use log::warn;
use mega_dl::{
    cli::{Cli, LogLevel},
    constants, run_from_cli,
};
use std::{env, path::PathBuf, sync::Arc, time::Duration};

#[tokio::main]
async fn main() {
    // 为 Windows 终端启用 ANSI 颜色支持
    #[cfg(windows)]
    {
        colored::control::set_virtual_terminal(true).ok();
    }
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n{} 用户强制中断程序。", "[!]".yellow());
            tokio::time::sleep(Duration::from_millis(100)).await;
            std::process::exit(130);
        }
    });

    let bin_name = env::var("CARGO_BIN_NAME").unwrap_or_else(|_| clap::crate_name!().to_string());

    let after_help = format!(
        "示例:\n  # 下载一个相册\n  {bin} --url \"https://bunkr.si/a/xxxx\"\n\n  # 只列出文件 (JSON)\n  {bin} --url \"https://gofile.io/d/xxxx\" --extract-only --json\n\n  # 超过 500MB 时只预览\n  {bin} --url \"https://pixeldrain.com/l/xxxx\" --max-size-mb 500\n\n  # 批量下载\n  {bin} -b my_links.txt -o ./downloads\n\n  # 查看支持的站点\n  {bin} --list-plugins",
        bin = bin_name
    );

    let cmd = Cli::command().after_help(after_help);
    let args = match Cli::from_arg_matches(&cmd.get_matches()) {
        Ok(args) => Arc::new(args),
        Err(e) => e.exit(),
    };

    init_logger(args.log_level);

    if let Err(e) = run_from_cli(args).await {
        eprintln!("\n{} {}", "[X]".red(), format!("程序执行出错: {}", e).red());
        std::process::exit(1);
    }
}

fn init_logger(level: LogLevel) {
    let filter = match level {
        LogLevel::Off => return,
        LogLevel::Error => log::LevelFilter::Error,
        LogLevel::Warn => log::LevelFilter::Warn,
        LogLevel::Info => log::LevelFilter::Info,
        LogLevel::Debug => log::LevelFilter::Debug,
        LogLevel::Trace => log::LevelFilter::Trace,
    };

    let app_name = clap::crate_name!();
    let log_file_path: PathBuf = match dirs::home_dir() {
        Some(home) => home.join(constants::CONFIG_DIR_NAME).join(constants::LOG_FILE_NAME),
        None => {
            eprintln!("警告: 无法获取用户主目录，日志将写入临时目录。");
            env::temp_dir().join(app_name).join(constants::LOG_FILE_NAME)
        }
    };
    if let Some(dir) = log_file_path.parent()
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("警告: 无法创建日志目录 {:?}: {}", dir, e);
    }

    let mut fallback_used = None;
    let file_appender = match fern::log_file(&log_file_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("警告: 无法打开日志文件 {:?}: {}，改用备用文件。", log_file_path, e);
            let fallback_path = env::temp_dir().join(format!("{}-{}", app_name, constants::LOG_FALLBACK_FILE_NAME));
            match fern::log_file(&fallback_path) {
                Ok(file) => {
                    fallback_used = Some(fallback_path);
                    file
                }
                Err(e_fb) => {
                    eprintln!("错误: 备用日志文件 {:?} 也无法创建: {}。不记录日志。", fallback_path, e_fb);
                    return;
                }
            }
        }
    };

    let result = fern::Dispatch::new()
        .level(filter)
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] [{:<5}] [{}:{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.line().unwrap_or(0),
                message
            ))
        })
        .chain(file_appender)
        .apply();

    match result {
        Ok(()) => {
            if let Some(path) = fallback_used {
                warn!("日志写入备用文件: {:?}", path);
            }
        }
        Err(e) => eprintln!("警告: 日志系统初始化失败: {}", e),
    }
}
