//! 规则模块：负责内置规则、远程规则的拉取、缓存与快照管理
pub mod model;
pub mod store;
pub mod cache;
pub mod loader;
pub mod provider;

// 导出核心接口
pub use self::model::{ProviderEntry, CachedRules, RemoteSnapshot, parse_rule_feed};
pub use self::store::RuleStore;
pub use self::cache::{RuleCacheStore, FileRuleCache, MemoryRuleCache};
pub use self::loader::{RuleFeedFetcher, HttpRuleFetcher};
pub use self::provider::RemoteRuleProvider;
