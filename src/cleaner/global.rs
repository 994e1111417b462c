//! 全局清理器单例管理
use once_cell::sync::Lazy;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use super::engine::{CleanResult, MatchEngine};
use crate::config::{ConfigManager, GlobalConfig};
use crate::error::{TidyResult, UrlTidyError};
use crate::rule::{RemoteRuleProvider, RuleStore};

/// 全局远程规则提供者
static GLOBAL_PROVIDER: Lazy<Arc<OnceCell<Arc<RemoteRuleProvider>>>> = Lazy::new(|| {
    Arc::new(OnceCell::new())
});

/// 初始化全局清理器（默认配置）
pub async fn init_cleaner() -> TidyResult<()> {
    init_cleaner_with_config(ConfigManager::get_default()).await
}

/// 带自定义配置初始化全局清理器：加载缓存，必要时后台刷新
pub async fn init_cleaner_with_config(config: GlobalConfig) -> TidyResult<()> {
    if GLOBAL_PROVIDER.get().is_some() {
        return Ok(());
    }

    let provider = Arc::new(RemoteRuleProvider::from_config(&config)?);
    if config.remote_rules_enabled {
        provider.load_cached().await;
        if provider.ensure_fresh().is_some() {
            debug!("已启动后台规则刷新");
        }
    }

    GLOBAL_PROVIDER.set(provider).map_err(|_| UrlTidyError::CleanerNotInitialized)?;
    Ok(())
}

/// 获取全局远程规则提供者
pub fn global_provider() -> TidyResult<&'static Arc<RemoteRuleProvider>> {
    GLOBAL_PROVIDER.get().ok_or(UrlTidyError::CleanerNotInitialized)
}

/// 使用全局规则清理URL
pub fn clean_url(url: &str) -> TidyResult<CleanResult> {
    let provider = global_provider()?;
    let snapshot = provider.snapshot();
    Ok(MatchEngine::clean(url, RuleStore::builtin(), snapshot.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_global_clean_url_offline() {
        let cache_path = std::env::temp_dir().join(format!("urltidy_global_{}.mp", std::process::id()));
        let config = ConfigManager::custom()
            .remote_rules_enabled(false)
            .rule_cache_path(cache_path)
            .build();
        init_cleaner_with_config(config).await.unwrap();
        // 重复初始化为空操作
        init_cleaner().await.unwrap();

        assert!(global_provider().unwrap().snapshot().is_none());
        assert_eq!(
            clean_url("https://example.com/?utm_source=a&id=1").unwrap(),
            CleanResult::Cleaned("https://example.com/?id=1".to_string())
        );
        assert_eq!(clean_url("https://example.com/?id=1").unwrap(), CleanResult::Unchanged);
    }
}
