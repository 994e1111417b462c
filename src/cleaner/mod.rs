//! 清理模块：URL追踪参数清理核心逻辑
pub mod global;
pub mod analyzer;
pub mod engine;

// 导出核心接口
pub use self::global::{init_cleaner, init_cleaner_with_config, global_provider, clean_url};
pub use self::analyzer::ApplicableRules;
pub use self::engine::{CleanResult, MatchEngine};
