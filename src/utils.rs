// src/utils.rs

use crate::{constants, error::*};
use regex::Regex;
use std::{ffi::OsStr, path::Path, sync::LazyLock};

static ILLEGAL_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).unwrap());
static UNDERSCORE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_{2,}").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const WINDOWS_RESERVED: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// 把来源给出的名字变成可以安全落盘的文件名 (或目录名)，结果永不为空。
pub fn sanitize_filename(name: &str) -> String {
    let mut name = ILLEGAL_CHARS_RE.replace_all(name, "_").into_owned();
    name = UNDERSCORE_RUN_RE.replace_all(&name, "_").into_owned();
    name = WHITESPACE_RE.replace_all(&name, " ").into_owned();
    name = name
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string();
    if name.is_empty() {
        return constants::UNNAMED_FILE.to_string();
    }

    let stem = Path::new(&name)
        .file_stem()
        .unwrap_or_else(|| OsStr::new(&name))
        .to_string_lossy()
        .to_uppercase();
    if WINDOWS_RESERVED.contains(&stem.as_str()) {
        name = format!("_{}", name);
    }

    if name.len() > constants::MAX_FILENAME_BYTES {
        name = truncate_keeping_extension(&name, constants::MAX_FILENAME_BYTES);
    }
    name
}

fn truncate_keeping_extension(name: &str, max_bytes: usize) -> String {
    let path = Path::new(name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) if ext.len() + 1 < max_bytes => {
            let stem = stem.to_string_lossy();
            let ext = format!(".{}", ext.to_string_lossy());
            let max_stem_bytes = max_bytes - ext.len();
            format!("{}{}", safe_truncate_utf8(&stem, max_stem_bytes), ext)
        }
        _ => safe_truncate_utf8(name, max_bytes).to_string(),
    }
}

fn safe_truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut i = max_bytes;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    &s[..i]
}

pub fn truncate_text(text: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut end_pos = 0;
    for (i, c) in text.char_indices() {
        width += if c.is_ascii() { 1 } else { 2 };
        if width > max_width.saturating_sub(3) {
            end_pos = i;
            break;
        }
    }
    if end_pos == 0 { text.to_string() } else { format!("{}...", &text[..end_pos]) }
}

/// 基于 `*` / `?` 通配符的文件名过滤器，匹配不区分大小写
#[derive(Debug, Clone)]
pub struct FilenameFilter {
    pattern: String,
    regex: Regex,
}

impl FilenameFilter {
    pub fn new(pattern: &str) -> AppResult<Self> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(AppError::InvalidInput("过滤模式不能为空".into()));
        }
        let mut expr = String::from("(?i)^");
        for c in pattern.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(&other.to_string())),
            }
        }
        expr.push('$');
        let regex = Regex::new(&expr)
            .map_err(|e| AppError::InvalidInput(format!("无效的过滤模式 '{}': {}", pattern, e)))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, filename: &str) -> bool {
        self.regex.is_match(filename)
    }
}

/// 批量文件：每行一个链接，忽略空行与 `#` 注释
pub fn parse_batch_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}
