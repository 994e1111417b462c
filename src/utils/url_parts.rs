//! URL 拆分与重建工具
//! 查询参数按出现顺序保存，重建时只删不改不重排
//! 查询串前后的部分沿用输入原文，规则匹配使用规范化后的 href

use url::{Host, Position, Url, form_urlencoded};

use crate::error::{TidyResult, UrlTidyError};

// 不处理的协议
const SKIP_SCHEMES: &[&str] = &["file", "data", "javascript"];

/// 拆分后的URL
#[derive(Debug, Clone)]
pub struct UrlComponents {
    url: Url,
    // 输入原文中查询串之前的部分与片段
    raw_prefix: String,
    raw_fragment: Option<String>,
    pub query_params: Vec<(String, String)>,
}

impl UrlComponents {
    /// 解析URL；解析失败、协议或主机在跳过列表中时返回错误
    pub fn parse(input: &str) -> TidyResult<Self> {
        let url = Url::parse(input)?;

        if SKIP_SCHEMES.contains(&url.scheme()) {
            return Err(UrlTidyError::InvalidInput(format!("不处理的协议：{}", url.scheme())));
        }
        if Self::is_skipped_host(url.host()) {
            return Err(UrlTidyError::InvalidInput(format!("不处理的主机：{}", url.host_str().unwrap_or(""))));
        }

        let query_params = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let (raw_prefix, raw_fragment) = match Self::split_raw(input) {
            Some((prefix, fragment)) => (prefix.to_string(), fragment.map(str::to_string)),
            None => (
                url[..Position::AfterPath].to_string(),
                url.fragment().map(str::to_string),
            ),
        };

        Ok(Self { url, raw_prefix, raw_fragment, query_params })
    }

    // 按首个 '#'、'?' 切分输入原文；含制表/换行（解析器会删除）时放弃原文
    fn split_raw(input: &str) -> Option<(&str, Option<&str>)> {
        let input = input.trim_matches(|c: char| c <= ' ');
        if input.contains(['\t', '\n', '\r']) {
            return None;
        }
        let (head, fragment) = match input.split_once('#') {
            Some((head, fragment)) => (head, Some(fragment)),
            None => (input, None),
        };
        let prefix = head.split_once('?').map_or(head, |(prefix, _)| prefix);
        Some((prefix, fragment))
    }

    // 空主机与回环地址
    fn is_skipped_host(host: Option<Host<&str>>) -> bool {
        match host {
            None => true,
            Some(Host::Domain(domain)) => domain.is_empty() || domain.eq_ignore_ascii_case("localhost"),
            Some(Host::Ipv4(ip)) => ip.is_loopback(),
            Some(Host::Ipv6(ip)) => ip.is_loopback(),
        }
    }

    /// 规范化后的完整URL，域名规则基于它匹配
    pub fn href(&self) -> &str {
        self.url.as_str()
    }

    /// 查询串之前的部分（协议、主机、端口、路径），保持输入原文
    pub fn origin_and_path(&self) -> &str {
        &self.raw_prefix
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.raw_fragment.as_deref()
    }

    /// 用保留下来的参数重建URL
    pub fn rebuild<'a, I>(&self, surviving: I) -> String
    where
        I: IntoIterator<Item = &'a (String, String)>,
    {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        let mut has_params = false;
        for (k, v) in surviving {
            serializer.append_pair(k, v);
            has_params = true;
        }

        let mut rebuilt = self.origin_and_path().to_string();
        if has_params {
            rebuilt.push('?');
            rebuilt.push_str(&serializer.finish());
        }
        if let Some(fragment) = self.fragment() {
            rebuilt.push('#');
            rebuilt.push_str(fragment);
        }
        rebuilt
    }
}
