//! 编译后模式模型
//! 参数规则在编译期一次性分类，匹配期不再检查原始字符串

use std::collections::HashSet;
use regex::Regex;

/// 单条参数规则
#[derive(Debug, Clone)]
pub enum ParameterRule {
    Literal(String), // 精确参数名（区分大小写）
    Pattern(Regex), // 完整锚定、忽略大小写的正则
}

impl ParameterRule {
    /// 参数名是否命中该规则
    pub fn is_match(&self, key: &str) -> bool {
        match self {
            ParameterRule::Literal(name) => name == key,
            ParameterRule::Pattern(regex) => regex.is_match(key),
        }
    }

    /// 规则描述
    pub fn describe(&self) -> &str {
        match self {
            ParameterRule::Literal(name) => name,
            ParameterRule::Pattern(r) => r.as_str(),
        }
    }
}

/// 编译后的域名规则集（内置站点规则或单个远程 provider）
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub name: String,
    pub domain_pattern: Regex,
    pub exceptions: Vec<Regex>,
    pub literal_params: HashSet<String>,
    pub pattern_params: Vec<Regex>,
}

impl RuleSet {
    /// 域名匹配且未命中任何例外时，规则集对该URL生效
    pub fn applies_to(&self, url: &str) -> bool {
        self.domain_pattern.is_match(url) && !self.exceptions.iter().any(|ex| ex.is_match(url))
    }

    pub fn rule_count(&self) -> usize {
        self.literal_params.len() + self.pattern_params.len()
    }
}

/// 与域名无关、始终生效的通用规则
#[derive(Debug, Clone, Default)]
pub struct GeneralRules {
    pub literal_params: HashSet<String>,
    pub prefix_patterns: Vec<Regex>,
}

impl GeneralRules {
    pub fn is_match(&self, key: &str) -> bool {
        self.literal_params.contains(key) || self.prefix_patterns.iter().any(|r| r.is_match(key))
    }
}
