//! 规则适用性分析：针对单个URL收集所有生效的参数规则
use std::collections::HashSet;
use regex::Regex;
use tracing::debug;

use crate::compiler::{GeneralRules, RuleSet};
use crate::rule::{RemoteSnapshot, RuleStore};

/// 对某个URL生效的参数规则并集
#[derive(Debug)]
pub struct ApplicableRules<'a> {
    general: &'a GeneralRules,
    literals: HashSet<&'a str>,
    patterns: Vec<&'a Regex>,
    matched_sets: Vec<&'a str>,
}

impl<'a> ApplicableRules<'a> {
    /// 收集通用规则 + 命中的内置站点规则 + 命中的远程规则
    pub fn collect(href: &str, store: &'a RuleStore, remote: Option<&'a RemoteSnapshot>) -> Self {
        let mut applicable = Self {
            general: store.general(),
            literals: HashSet::new(),
            patterns: Vec::new(),
            matched_sets: Vec::new(),
        };

        let remote_sets = remote.map(|s| s.compiled_rule_sets.as_slice()).unwrap_or_default();
        for rule_set in store.site_rules().iter().chain(remote_sets) {
            if rule_set.applies_to(href) {
                applicable.absorb(rule_set);
            }
        }

        if !applicable.matched_sets.is_empty() {
            debug!("URL命中规则集：{:?}", applicable.matched_sets);
        }
        applicable
    }

    fn absorb(&mut self, rule_set: &'a RuleSet) {
        self.literals.extend(rule_set.literal_params.iter().map(String::as_str));
        self.patterns.extend(rule_set.pattern_params.iter());
        self.matched_sets.push(&rule_set.name);
    }

    /// 参数名是否应被移除；任一规则命中即移除
    pub fn matches(&self, key: &str) -> bool {
        self.general.is_match(key)
            || self.literals.contains(key)
            || self.patterns.iter().any(|r| r.is_match(key))
    }

    /// 命中的规则集名称
    pub fn matched_sets(&self) -> &[&'a str] {
        &self.matched_sets
    }
}
