//! 规则数据模型定义
//! 远程规则源的 JSON 结构、缓存记录与编译后的远程快照

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::compiler::{RuleCompiler, RuleSet, RuleSource};
use crate::error::{TidyResult, UrlTidyError};

/// 远程规则源中的单个 provider 条目
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProviderEntry {
    #[serde(rename = "urlPattern", default)]
    pub url_pattern: Option<String>,
    #[serde(default)]
    pub exceptions: Option<Vec<String>>,
    #[serde(default)]
    pub rules: Option<Vec<String>>,
}

impl ProviderEntry {
    /// 转换为编译器输入；缺少 urlPattern 的条目返回 None
    pub fn to_rule_source(&self, name: &str) -> Option<RuleSource> {
        let url_pattern = self.url_pattern.as_deref().filter(|p| !p.is_empty())?;
        Some(RuleSource {
            name: name.to_string(),
            domain_pattern: url_pattern.to_string(),
            exceptions: self.exceptions.clone().unwrap_or_default(),
            rules: self.rules.clone().unwrap_or_default(),
        })
    }
}

/// 解析远程规则文本，provider 可能嵌套在 `providers` 字段下
///
/// 顶层不是 JSON 对象时报错；单个条目结构异常时只跳过该条目。
pub fn parse_rule_feed(raw_text: &str) -> TidyResult<Vec<RuleSource>> {
    let data: Value = serde_json::from_str(raw_text)?;
    let providers = match data.get("providers") {
        Some(Value::Object(map)) => map,
        _ => data
            .as_object()
            .ok_or_else(|| UrlTidyError::RuleParseError("规则源顶层不是 JSON 对象".to_string()))?,
    };

    let mut sources = Vec::with_capacity(providers.len());
    for (name, value) in providers {
        match serde_json::from_value::<ProviderEntry>(value.clone()) {
            Ok(entry) => match entry.to_rule_source(name) {
                Some(source) => sources.push(source),
                None => debug!("provider [{}] 缺少 urlPattern，已忽略", name),
            },
            Err(e) => debug!("provider [{}] 结构异常，已忽略：{}", name, e),
        }
    }
    Ok(sources)
}

/// 持久化的远程规则缓存记录
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CachedRules {
    pub raw_text: String,
    pub fetched_at_ms: i64,
}

/// 编译后的远程规则快照，构建完成后不可变，只整体替换
#[derive(Debug, Clone, Default)]
pub struct RemoteSnapshot {
    pub compiled_rule_sets: Vec<RuleSet>,
    pub raw_text: String,
    pub fetched_at_ms: i64,
}

impl RemoteSnapshot {
    /// 从原始规则文本构建快照
    pub fn build(raw_text: String, fetched_at_ms: i64) -> TidyResult<Self> {
        let sources = parse_rule_feed(&raw_text)?;
        let compiled_rule_sets = RuleCompiler::compile_batch(&sources);
        Ok(Self {
            compiled_rule_sets,
            raw_text,
            fetched_at_ms,
        })
    }

    pub fn from_cached(cached: CachedRules) -> TidyResult<Self> {
        Self::build(cached.raw_text, cached.fetched_at_ms)
    }

    pub fn to_cached(&self) -> CachedRules {
        CachedRules {
            raw_text: self.raw_text.clone(),
            fetched_at_ms: self.fetched_at_ms,
        }
    }

    /// 快照年龄是否已达到 TTL
    pub fn is_stale_at(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms.saturating_sub(self.fetched_at_ms) >= ttl_ms
    }

    /// 按 provider 名称统计规则数量（CLI 展示用）
    pub fn summary(&self) -> BTreeMap<&str, usize> {
        self.compiled_rule_sets
            .iter()
            .map(|set| (set.name.as_str(), set.rule_count()))
            .collect()
    }
}
