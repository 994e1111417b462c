//! urltidy - URL 追踪参数清理引擎
//!
//! 内置规则（通用参数黑名单 + 特定网域规则）与带 TTL 缓存的远程规则源共同决定要移除的查询参数。

// 导出全局错误类型
pub use self::error::{UrlTidyError, TidyResult};

// 导出配置模块
pub use self::config::{GlobalConfig, ConfigManager, CustomConfigBuilder};

// 导出编译模块核心接口
pub use self::compiler::{ParameterRule, RuleSet, GeneralRules, RuleCompiler, RuleSource};

// 导出规则模块核心接口
pub use self::rule::{
    RuleStore, RemoteRuleProvider, RemoteSnapshot, CachedRules,
    RuleCacheStore, FileRuleCache, MemoryRuleCache, RuleFeedFetcher, HttpRuleFetcher,
};

// 导出清理模块核心接口
pub use self::cleaner::{
    CleanResult, MatchEngine,
    init_cleaner,
    init_cleaner_with_config,
    clean_url,
};

// 导出编排模块核心接口
pub use self::orchestrator::{Orchestrator, NavigationEvent, NavigationKind, Navigator};

// 导出工具模块核心接口
pub use self::utils::UrlComponents;

// 声明所有子模块
pub mod config;
pub mod error;
pub mod compiler;
pub mod rule;
pub mod cleaner;
pub mod orchestrator;
pub mod utils;
