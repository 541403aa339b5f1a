// src/resolver.rs

use serde::Serialize;
use std::fmt;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExtractorKind {
    Bunkr,
    Cyberdrop,
    Fanbox,
    Fapello,
    Gofile,
    PixelDrain,
    Pixiv,
    ThothubTo,
}

impl ExtractorKind {
    pub const ALL: [ExtractorKind; 8] = [
        ExtractorKind::Bunkr,
        ExtractorKind::Cyberdrop,
        ExtractorKind::Fanbox,
        ExtractorKind::Fapello,
        ExtractorKind::Gofile,
        ExtractorKind::PixelDrain,
        ExtractorKind::Pixiv,
        ExtractorKind::ThothubTo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ExtractorKind::Bunkr => "Bunkr",
            ExtractorKind::Cyberdrop => "Cyberdrop",
            ExtractorKind::Fanbox => "Fanbox",
            ExtractorKind::Fapello => "Fapello",
            ExtractorKind::Gofile => "Gofile",
            ExtractorKind::PixelDrain => "PixelDrain",
            ExtractorKind::Pixiv => "Pixiv",
            ExtractorKind::ThothubTo => "ThothubTo",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ExtractorKind::Bunkr => "相册与单文件 (加密直链)",
            ExtractorKind::Cyberdrop => "相册与单文件 (API 限速)",
            ExtractorKind::Fanbox => "创作者主页与帖子 (可选会话 Cookie)",
            ExtractorKind::Fapello => "模特图库，自动翻页",
            ExtractorKind::Gofile => "文件夹，支持密码",
            ExtractorKind::PixelDrain => "列表与单文件",
            ExtractorKind::Pixiv => "作品与用户全部作品 (可选会话 Cookie)",
            ExtractorKind::ThothubTo => "视频、相册与模特列表",
        }
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 域名到提取器类型的查找表。构造一次后按值传递，不存在全局可变注册表。
#[derive(Debug, Clone)]
pub struct DomainResolver {
    /// 保持插入顺序，子串匹配按此顺序进行
    registry: Vec<(String, ExtractorKind)>,
    subdomain_bases: Vec<String>,
}

impl Default for DomainResolver {
    fn default() -> Self {
        use ExtractorKind::*;
        let registry = [
            ("bunkr.si", Bunkr),
            ("bunkr.la", Bunkr),
            ("bunkr.is", Bunkr),
            ("bunkr.ru", Bunkr),
            ("bunkr.su", Bunkr),
            ("bunkr.cr", Bunkr),
            ("bunkr", Bunkr),
            ("cyberdrop.me", Cyberdrop),
            ("cyberdrop.to", Cyberdrop),
            ("cyberdrop.cr", Cyberdrop),
            ("cyberdrop", Cyberdrop),
            ("fanbox.cc", Fanbox),
            ("fapello.com", Fapello),
            ("gofile.io", Gofile),
            ("pixeldrain.com", PixelDrain),
            ("pixiv.net", Pixiv),
            ("thothub.to", ThothubTo),
        ];
        Self::new(registry, ["fanbox.cc"])
    }
}

impl DomainResolver {
    pub fn new<'a>(
        registry: impl IntoIterator<Item = (&'a str, ExtractorKind)>,
        subdomain_bases: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            registry: registry
                .into_iter()
                .map(|(domain, kind)| (domain.to_lowercase(), kind))
                .collect(),
            subdomain_bases: subdomain_bases.into_iter().map(str::to_lowercase).collect(),
        }
    }

    /// 依次尝试：精确匹配、支持子域名的后缀匹配、子串匹配
    pub fn resolve(&self, url: &str) -> Option<ExtractorKind> {
        let host = extract_host(url)?;
        self.resolve_host(&host)
    }

    fn resolve_host(&self, host: &str) -> Option<ExtractorKind> {
        if let Some((_, kind)) = self.registry.iter().find(|(domain, _)| domain == host) {
            return Some(*kind);
        }

        for base in &self.subdomain_bases {
            if host.ends_with(&format!(".{}", base))
                && let Some((_, kind)) = self.registry.iter().find(|(domain, _)| domain == base)
            {
                return Some(*kind);
            }
        }

        self.registry
            .iter()
            .find(|(domain, _)| host.contains(domain.as_str()))
            .map(|(_, kind)| *kind)
    }

    pub fn domains_for(&self, kind: ExtractorKind) -> Vec<&str> {
        self.registry
            .iter()
            .filter(|(_, k)| *k == kind)
            .map(|(domain, _)| domain.as_str())
            .collect()
    }
}

/// 只取主机名部分，小写并去掉首尾空白。没有协议的输入按 http 处理。
pub fn extract_host(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = if trimmed.contains("://") {
        Url::parse(trimmed).ok()?
    } else {
        Url::parse(&format!("http://{}", trimmed)).ok()?
    };
    let host = parsed.host_str()?.trim().trim_end_matches('.').to_lowercase();
    (!host.is_empty()).then_some(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_scheme_and_path_insensitive() {
        let resolver = DomainResolver::default();
        let a = resolver.resolve("HTTPS://Bunkr.SI/a/abc?x=1");
        let b = resolver.resolve("bunkr.si");
        assert_eq!(a, Some(ExtractorKind::Bunkr));
        assert_eq!(a, b);
    }

    #[test]
    fn test_subdomain_suffix_match() {
        let resolver = DomainResolver::default();
        assert_eq!(
            resolver.resolve("https://someartist.fanbox.cc/posts/123"),
            Some(ExtractorKind::Fanbox)
        );
    }

    #[test]
    fn test_substring_fallback_for_mirrors() {
        let resolver = DomainResolver::default();
        assert_eq!(resolver.resolve("https://bunkr.black/a/x"), Some(ExtractorKind::Bunkr));
        assert_eq!(resolver.resolve("https://www.pixiv.net/en/artworks/1"), Some(ExtractorKind::Pixiv));
        assert_eq!(resolver.resolve("https://cdn.cyberdrop.xyz/f/1"), Some(ExtractorKind::Cyberdrop));
    }

    #[test]
    fn test_unsupported_and_garbage() {
        let resolver = DomainResolver::default();
        assert_eq!(resolver.resolve("https://example.com/x"), None);
        assert_eq!(resolver.resolve(""), None);
        assert_eq!(resolver.resolve("   "), None);
    }

    #[test]
    fn test_port_and_userinfo_are_ignored() {
        assert_eq!(extract_host("https://user:pw@GoFile.io:8443/d/abc").as_deref(), Some("gofile.io"));
    }

    #[test]
    fn test_exact_beats_substring() {
        let resolver = DomainResolver::new(
            [("example.com", ExtractorKind::Gofile), ("sub.example.com", ExtractorKind::Pixiv)],
            [],
        );
        assert_eq!(resolver.resolve("sub.example.com"), Some(ExtractorKind::Pixiv));
    }

    #[test]
    fn test_every_kind_has_a_domain() {
        let resolver = DomainResolver::default();
        for kind in ExtractorKind::ALL {
            assert!(!resolver.domains_for(kind).is_empty(), "{} 没有注册域名", kind);
        }
    }
}
