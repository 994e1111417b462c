//! 匹配引擎：决定移除哪些查询参数并重建URL
//!
//! 纯同步、无挂起点。任何失败（解析失败、跳过的协议/主机）都视为无需修改。

use std::fmt;
use tracing::debug;

use super::analyzer::ApplicableRules;
use crate::rule::{RemoteSnapshot, RuleStore};
use crate::utils::UrlComponents;

/// 清理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanResult {
    Cleaned(String),
    Unchanged,
}

impl CleanResult {
    pub fn is_changed(&self) -> bool {
        matches!(self, CleanResult::Cleaned(_))
    }

    pub fn into_option(self) -> Option<String> {
        match self {
            CleanResult::Cleaned(url) => Some(url),
            CleanResult::Unchanged => None,
        }
    }

    /// 取清理后的URL，未修改时返回原始输入
    pub fn or_original(self, original: &str) -> String {
        self.into_option().unwrap_or_else(|| original.to_string())
    }
}

impl fmt::Display for CleanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanResult::Cleaned(url) => write!(f, "{}", url),
            CleanResult::Unchanged => write!(f, "<unchanged>"),
        }
    }
}

/// 匹配引擎
pub struct MatchEngine;

impl MatchEngine {
    /// 清理URL中的追踪参数
    pub fn clean(url: &str, store: &RuleStore, remote: Option<&RemoteSnapshot>) -> CleanResult {
        match Self::strip(url, store, remote) {
            Some((cleaned, removed)) => {
                debug!("移除追踪参数{:?}：{} -> {}", removed, url, cleaned);
                CleanResult::Cleaned(cleaned)
            }
            None => CleanResult::Unchanged,
        }
    }

    /// 清理时将被移除的参数名（按出现顺序，重复参数各计一次）
    pub fn removed_params(url: &str, store: &RuleStore, remote: Option<&RemoteSnapshot>) -> Vec<String> {
        Self::strip(url, store, remote)
            .map(|(_, removed)| removed)
            .unwrap_or_default()
    }

    // 反复收集规则并删除参数，直到没有参数可删
    // 域名/例外正则可能依赖查询串，删掉参数后适用的规则集会变化，单次删除不保证幂等
    // 每轮至少删一个参数，轮数不超过参数个数
    fn strip(url: &str, store: &RuleStore, remote: Option<&RemoteSnapshot>) -> Option<(String, Vec<String>)> {
        let mut parts = Self::parse_cleanable(url)?;
        let mut removed_all = Vec::new();
        let mut cleaned = None;

        loop {
            let rebuilt = {
                let applicable = ApplicableRules::collect(parts.href(), store, remote);
                let (removed, surviving): (Vec<_>, Vec<_>) = parts
                    .query_params
                    .iter()
                    .partition(|(key, _)| applicable.matches(key));
                if removed.is_empty() {
                    break;
                }
                removed_all.extend(removed.into_iter().map(|(key, _)| key.clone()));
                parts.rebuild(surviving)
            };

            let next = UrlComponents::parse(&rebuilt)
                .ok()
                .filter(|next| !next.query_params.is_empty());
            cleaned = Some(rebuilt);
            match next {
                Some(next) => parts = next,
                None => break,
            }
        }

        cleaned.map(|cleaned| (cleaned, removed_all))
    }

    // 可清理且带查询参数的URL
    fn parse_cleanable(url: &str) -> Option<UrlComponents> {
        match UrlComponents::parse(url) {
            Ok(parts) if !parts.query_params.is_empty() => Some(parts),
            Ok(_) => None,
            Err(e) => {
                debug!("跳过URL {}：{}", url, e);
                None
            }
        }
    }
}
