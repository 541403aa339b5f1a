// src/cipher/license_shuffle.rs

use log::debug;

/// 播放器脚本里固定的除数。它由样式字符串换算而来，但那个输入本身也是写死的，
/// 这里直接固定下来，由黄金用例锁定。
pub const SHUFFLE_DIVISOR: u32 = 10;

const HASH_PREFIX_LEN: usize = 32;
const FUNCTION_MARKER: &str = "function/0/";
const HASH_SEGMENT: usize = 5;

fn digit_at(chars: &[char], index: usize) -> u32 {
    chars
        .get(index)
        .and_then(|c| c.to_digit(10))
        .unwrap_or(0)
}

/// 由 `license_code` (首字符为 `$` 之类的标记) 推导置换密钥。
/// 密钥长度为 `(j + 1) * 4`，其中 `j` 为替换串长度的一半。
pub fn derive_key(license_code: &str) -> Option<String> {
    let code: Vec<char> = license_code.trim().chars().collect();
    let f: String = code
        .iter()
        .skip(1)
        .map(|c| match c.to_digit(10) {
            Some(d) if d != 0 => char::from_digit(d, 10).unwrap_or('1'),
            _ => '1',
        })
        .collect();
    if f.is_empty() {
        debug!("license_code 过短: {:?}", license_code);
        return None;
    }

    let j = f.len() / 2;
    // 前半段包含下标 j 本身。两半按 u128 解析，任一半超过约 38 位或差值乘 4 溢出时返回 None，
    // 站点实际下发的 license_code 只有 15 位
    let k: u128 = f[..=j].parse().ok()?;
    let l: u128 = f[j..].parse().ok()?;
    let magnitude = k.abs_diff(l).checked_mul(4)?;
    let f2: Vec<char> = magnitude.to_string().chars().collect();

    let mut key = String::with_capacity((j + 1) * 4);
    for g in 0..=j {
        for h in 1..=4 {
            let mut digit = digit_at(&code, g + h) + digit_at(&f2, g % f2.len());
            if digit >= SHUFFLE_DIVISOR {
                digit -= SHUFFLE_DIVISOR;
            }
            key.push(char::from_digit(digit, 10)?);
        }
    }
    Some(key)
}

/// 从第 31 位倒序到第 0 位依次交换，每一步都基于当前已部分置换的缓冲区。
/// 前 32 个字符之后的部分原样保留。
pub fn permute_hash(hash: &str, key: &str) -> Option<String> {
    let chars: Vec<char> = hash.chars().collect();
    if chars.len() < HASH_PREFIX_LEN {
        debug!("哈希长度不足 {} 位: {:?}", HASH_PREFIX_LEN, hash);
        return None;
    }
    let key_digits: Vec<usize> = key
        .chars()
        .map(|c| c.to_digit(10).map(|d| d as usize))
        .collect::<Option<_>>()?;

    // suffix_sums[i] = key[i..] 的数字和
    let mut suffix_sums = vec![0usize; key_digits.len() + 1];
    for i in (0..key_digits.len()).rev() {
        suffix_sums[i] = suffix_sums[i + 1] + key_digits[i];
    }

    let mut buffer: Vec<char> = chars[..HASH_PREFIX_LEN].to_vec();
    for k in (0..HASH_PREFIX_LEN).rev() {
        let sum = suffix_sums.get(k).copied().unwrap_or(0);
        let l = (k + sum) % HASH_PREFIX_LEN;
        buffer.swap(k, l);
    }
    buffer.extend_from_slice(&chars[HASH_PREFIX_LEN..]);
    Some(buffer.into_iter().collect())
}

/// 还原形如 `function/0/https://host/get_file/<n>/<hash>/...` 的视频地址，
/// 并附上以毫秒为单位的防缓存参数。
pub fn deobfuscate_url(video_url: &str, license_code: &str, now_ms: i64) -> Option<String> {
    let stripped = video_url.trim().replace(FUNCTION_MARKER, "");
    let mut parts: Vec<String> = stripped.split('/').map(String::from).collect();
    let segment = parts.get(HASH_SEGMENT)?;
    let key = derive_key(license_code)?;
    let permuted = permute_hash(segment, &key)?;
    parts[HASH_SEGMENT] = permuted;
    Some(format!("{}?rnd={}", parts.join("/"), now_ms))
}
