//! 全局配置管理,存储所有可配置项

use std::path::PathBuf;
use std::time::Duration;

/// 默认远程规则源（ClearURLs 规则镜像）
pub const DEFAULT_RULE_FEED_URL: &str = "https://rules1.clearurls.xyz/data.minify.json";

/// 全局配置
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    // 远程规则源URL
    pub rule_feed_url: String,
    // 规则缓存路径
    pub rule_cache_path: PathBuf,
    // 缓存有效期，超过则后台刷新
    pub cache_ttl: Duration,
    // 请求超时
    pub http_timeout: Duration,
    pub user_agent: String,
    // 是否启用远程规则
    pub remote_rules_enabled: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            rule_feed_url: DEFAULT_RULE_FEED_URL.to_string(),
            rule_cache_path: PathBuf::from("urltidy_rules.mp"),
            cache_ttl: Duration::from_secs(60 * 60),
            http_timeout: Duration::from_secs(10),
            user_agent: format!("urltidy/{}", env!("CARGO_PKG_VERSION")),
            remote_rules_enabled: true,
        }
    }
}

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取默认配置
    pub fn get_default() -> GlobalConfig {
        GlobalConfig::default()
    }

    /// 自定义配置
    pub fn custom() -> CustomConfigBuilder {
        CustomConfigBuilder::new()
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone, Default)]
pub struct CustomConfigBuilder {
    config: GlobalConfig,
}

impl CustomConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule_feed_url(mut self, url: impl Into<String>) -> Self {
        self.config.rule_feed_url = url.into();
        self
    }

    pub fn rule_cache_path(mut self, path: PathBuf) -> Self {
        self.config.rule_cache_path = path;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.config.http_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn remote_rules_enabled(mut self, enabled: bool) -> Self {
        self.config.remote_rules_enabled = enabled;
        self
    }

    pub fn build(self) -> GlobalConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConfigManager::get_default();
        assert_eq!(config.rule_feed_url, DEFAULT_RULE_FEED_URL);
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert!(config.remote_rules_enabled);
    }

    #[test]
    fn test_custom_builder_overrides() {
        let config = ConfigManager::custom()
            .rule_feed_url("http://127.0.0.1:9/rules.json")
            .cache_ttl(Duration::from_secs(5))
            .remote_rules_enabled(false)
            .build();
        assert_eq!(config.rule_feed_url, "http://127.0.0.1:9/rules.json");
        assert_eq!(config.cache_ttl, Duration::from_secs(5));
        assert!(!config.remote_rules_enabled);
        // 未设置的字段保持默认值
        assert_eq!(config.http_timeout, Duration::from_secs(10));
    }
}
