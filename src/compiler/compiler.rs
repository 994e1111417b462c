//! 规则编译器核心
//! 仅负责将原始规则定义编译为分类后的规则集，无任何 I/O

use std::collections::HashSet;
use std::time::Instant;
use regex::{Regex, RegexBuilder, Error as RegexError};
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use super::pattern::{ParameterRule, RuleSet};
use crate::error::{TidyResult, UrlTidyError};

/// 含任意正则元字符的规则按正则处理，否则按字面参数名处理
static REGEX_META_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\\^$.*+?()\[\]{}|]").unwrap()
});

/// 原始规则定义（内置站点规则、远程 provider 条目共用）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSource {
    pub name: String,
    pub domain_pattern: String,
    pub exceptions: Vec<String>,
    pub rules: Vec<String>,
}

/// 规则编译器
pub struct RuleCompiler;

impl RuleCompiler {
    /// 编译单个规则定义，任何一个正则非法则整条失败
    pub fn compile(source: &RuleSource) -> TidyResult<RuleSet> {
        let entry_err = |e: RegexError| UrlTidyError::RuleCompileError {
            entry: source.name.clone(),
            source: e,
        };

        let domain_pattern = Self::build_case_insensitive(&source.domain_pattern).map_err(entry_err)?;
        let exceptions = source
            .exceptions
            .iter()
            .map(|ex| Self::build_case_insensitive(ex))
            .collect::<Result<Vec<_>, _>>()
            .map_err(entry_err)?;

        let mut literal_params = HashSet::new();
        let mut pattern_params = Vec::new();
        for raw in &source.rules {
            match Self::classify(raw).map_err(entry_err)? {
                ParameterRule::Literal(name) => {
                    literal_params.insert(name);
                }
                ParameterRule::Pattern(regex) => pattern_params.push(regex),
            }
        }

        Ok(RuleSet {
            name: source.name.clone(),
            domain_pattern,
            exceptions,
            literal_params,
            pattern_params,
        })
    }

    /// 批量编译：单个条目失败只丢弃该条目，不影响其它条目
    pub fn compile_batch<'a, I>(sources: I) -> Vec<RuleSet>
    where
        I: IntoIterator<Item = &'a RuleSource>,
    {
        let start = Instant::now();
        let mut stats = CompileStats::default();
        let mut rule_sets = Vec::new();

        for source in sources {
            match Self::compile(source) {
                Ok(rule_set) => {
                    stats.literal_count += rule_set.literal_params.len();
                    stats.pattern_count += rule_set.pattern_params.len();
                    rule_sets.push(rule_set);
                }
                Err(e) => {
                    stats.dropped += 1;
                    warn!("规则条目已丢弃：{}", e);
                }
            }
        }

        debug!("✅ 规则编译完成，总耗时{:?}", start.elapsed());
        debug!(
            "📊 编译统计：规则集{}个、丢弃{}个、字面参数{}条、正则参数{}条",
            rule_sets.len(),
            stats.dropped,
            stats.literal_count,
            stats.pattern_count
        );

        rule_sets
    }

    /// 参数规则分类（编译期一次性决定）
    pub fn classify(raw: &str) -> Result<ParameterRule, RegexError> {
        if REGEX_META_CHARS.is_match(raw) {
            let anchored = format!("^(?:{})$", raw);
            Ok(ParameterRule::Pattern(Self::build_case_insensitive(&anchored)?))
        } else {
            Ok(ParameterRule::Literal(raw.to_string()))
        }
    }

    /// 编译通用前缀规则：区分大小写，前缀按字面转义
    pub fn compile_prefix(prefix: &str) -> TidyResult<Regex> {
        Ok(Regex::new(&format!("^{}", regex::escape(prefix)))?)
    }

    fn build_case_insensitive(src: &str) -> Result<Regex, RegexError> {
        RegexBuilder::new(src).case_insensitive(true).build()
    }
}

/// 编译统计信息
#[derive(Debug, Clone, Default)]
struct CompileStats {
    dropped: usize,
    literal_count: usize,
    pattern_count: usize,
}
