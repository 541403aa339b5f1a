// src/cipher/time_xor.rs

use base64::{Engine as _, engine::general_purpose::STANDARD};
use log::debug;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// 与常见 `quote()` 相同：保留字母数字、`-._~` 和 `/`
const FILENAME_QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

const KEY_PREFIX: &str = "SECRET_KEY_";
const BUCKET_SECS: i64 = 3600;

/// 密钥每小时轮换一次
pub fn key_for(timestamp: i64) -> String {
    format!("{}{}", KEY_PREFIX, timestamp.div_euclid(BUCKET_SECS))
}

/// 解出基础链接并附上 `?n=<文件名>`
pub fn decrypt_url(timestamp: i64, ciphertext_b64: &str, filename: &str) -> Option<String> {
    let ciphertext = match STANDARD.decode(ciphertext_b64.trim()) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => return None,
        Err(e) => {
            debug!("密文不是合法的 base64: {}", e);
            return None;
        }
    };
    let key = key_for(timestamp);
    let key = key.as_bytes();
    let plain: Vec<u8> = ciphertext
        .iter()
        .enumerate()
        .map(|(i, b)| b ^ key[i % key.len()])
        .collect();
    let base_url = match String::from_utf8(plain) {
        Ok(s) => s,
        Err(_) => {
            debug!("解密结果不是合法的 UTF-8，时间戳 {} 可能不匹配", timestamp);
            return None;
        }
    };
    Some(format!(
        "{}?n={}",
        base_url,
        utf8_percent_encode(filename, FILENAME_QUERY)
    ))
}
