//! 远程规则提供者
//! 维护带 TTL 的远程规则快照：启动时读缓存，过期后后台拉取，成功后原子替换并通知订阅方
//!
//! 拉取失败（网络、超时、状态码、JSON）一律保留旧快照，不向调用方抛错。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use arc_swap::ArcSwapOption;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::cache::{FileRuleCache, RuleCacheStore};
use super::loader::{HttpRuleFetcher, RuleFeedFetcher};
use super::model::RemoteSnapshot;
use crate::config::GlobalConfig;
use crate::error::{TidyResult, UrlTidyError};
use crate::utils::now_epoch_ms;

/// 远程规则提供者
pub struct RemoteRuleProvider {
    snapshot: ArcSwapOption<RemoteSnapshot>,
    fetcher: Arc<dyn RuleFeedFetcher>,
    cache: Arc<dyn RuleCacheStore>,
    ttl: Duration,
    fetch_timeout: Duration,
    in_flight: AtomicBool,
    // 快照代数，每次成功替换 +1
    generation: watch::Sender<u64>,
}

impl RemoteRuleProvider {
    pub fn new(
        fetcher: Arc<dyn RuleFeedFetcher>,
        cache: Arc<dyn RuleCacheStore>,
        config: &GlobalConfig,
    ) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            snapshot: ArcSwapOption::empty(),
            fetcher,
            cache,
            ttl: config.cache_ttl,
            fetch_timeout: config.http_timeout,
            in_flight: AtomicBool::new(false),
            generation,
        }
    }

    /// 使用 HTTP 拉取器与本地文件缓存创建
    pub fn from_config(config: &GlobalConfig) -> TidyResult<Self> {
        let fetcher = Arc::new(HttpRuleFetcher::new(config)?);
        let cache = Arc::new(FileRuleCache::from_config(config));
        Ok(Self::new(fetcher, cache, config))
    }

    /// 启动时加载持久化缓存（不论是否过期），返回是否得到可用快照
    pub async fn load_cached(&self) -> bool {
        let cached = match self.cache.load().await {
            Ok(Some(cached)) => cached,
            Ok(None) => {
                debug!("本地规则缓存不存在");
                return false;
            }
            Err(e) => {
                warn!("本地规则缓存读取失败：{}", e);
                return false;
            }
        };

        match RemoteSnapshot::from_cached(cached) {
            Ok(snapshot) => {
                debug!("从本地缓存加载远程规则成功，规则集{}个", snapshot.compiled_rule_sets.len());
                self.snapshot.store(Some(Arc::new(snapshot)));
                true
            }
            Err(e) => {
                warn!("本地规则缓存内容无效，将重新拉取：{}", e);
                false
            }
        }
    }

    /// 当前快照
    pub fn snapshot(&self) -> Option<Arc<RemoteSnapshot>> {
        self.snapshot.load_full()
    }

    /// 无快照或快照已达 TTL 时需要刷新
    pub fn needs_refresh_at(&self, now_ms: i64) -> bool {
        let current = self.snapshot.load();
        match &*current {
            None => true,
            Some(snapshot) => snapshot.is_stale_at(now_ms, self.ttl.as_millis() as i64),
        }
    }

    pub fn is_fetch_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// 订阅快照替换通知
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// 需要时在后台启动一次拉取；已有拉取进行中或快照仍新鲜时不做任何事
    ///
    /// 返回后台任务句柄，调用方可选择等待。必须在 tokio 运行时内调用。
    pub fn ensure_fresh(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.needs_refresh_at(now_epoch_ms()) {
            return None;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("远程规则拉取进行中，跳过");
            return None;
        }

        // 标记在 spawn 前交给守卫，任务未被轮询即被取消时也能释放
        let guard = InFlightGuard(Arc::clone(self));
        Some(tokio::spawn(async move {
            let provider = &guard.0;
            if let Err(e) = provider.refresh().await {
                warn!("远程规则更新失败，继续使用旧规则：{}", e);
            }
        }))
    }

    /// 立即拉取、编译并替换快照，成功后持久化并通知订阅方
    pub async fn refresh(&self) -> TidyResult<Arc<RemoteSnapshot>> {
        let raw_text = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch())
            .await
            .map_err(|_| UrlTidyError::FetchTimeout(self.fetch_timeout))??;

        // 先完整构建新快照，再一次性替换
        let snapshot = Arc::new(RemoteSnapshot::build(raw_text, now_epoch_ms())?);
        self.snapshot.store(Some(Arc::clone(&snapshot)));
        info!("远程规则已更新，规则集{}个", snapshot.compiled_rule_sets.len());

        if let Err(e) = self.cache.save(&snapshot.to_cached()).await {
            warn!("远程规则缓存到本地失败：{}", e);
        }

        self.generation.send_modify(|generation| *generation += 1);
        Ok(snapshot)
    }
}

/// 任务结束（含 panic 展开）时释放拉取标记
struct InFlightGuard(Arc<RemoteRuleProvider>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use async_trait::async_trait;

    use crate::config::ConfigManager;
    use crate::rule::cache::MemoryRuleCache;
    use crate::rule::model::CachedRules;

    pub(crate) const FEED_V1: &str = r#"{"providers":{
        "example": {"urlPattern": "^https?://(?:[a-z0-9-]+\\.)*?example\\.com", "rules": ["campaign"]}
    }}"#;

    pub(crate) const FEED_V2: &str = r#"{"providers":{
        "example": {"urlPattern": "^https?://(?:[a-z0-9-]+\\.)*?example\\.com", "rules": ["campaign", "affiliate"]}
    }}"#;

    pub(crate) enum Reply {
        Body(&'static str),
        Fail,
        Hang,
    }

    /// 可控的测试拉取器
    pub(crate) struct ScriptedFetcher {
        reply: Reply,
        pub(crate) calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        pub(crate) fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self { reply, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl RuleFeedFetcher for ScriptedFetcher {
        async fn fetch(&self) -> TidyResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Reply::Body(body) => Ok(body.to_string()),
                Reply::Fail => Err(UrlTidyError::RuleLoadError("状态码 503".to_string())),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(String::new())
                }
            }
        }
    }

    fn test_config() -> GlobalConfig {
        ConfigManager::custom()
            .cache_ttl(Duration::from_secs(3600))
            .http_timeout(Duration::from_millis(100))
            .build()
    }

    fn provider(fetcher: Arc<ScriptedFetcher>, cache: Arc<MemoryRuleCache>) -> Arc<RemoteRuleProvider> {
        Arc::new(RemoteRuleProvider::new(fetcher, cache, &test_config()))
    }

    #[tokio::test]
    async fn test_first_run_fetches_and_persists() {
        let fetcher = ScriptedFetcher::new(Reply::Body(FEED_V1));
        let cache = Arc::new(MemoryRuleCache::new());
        let provider = provider(fetcher.clone(), cache.clone());
        let rx = provider.subscribe();

        assert!(!provider.load_cached().await);
        assert!(provider.snapshot().is_none());

        let handle = provider.ensure_fresh().expect("无快照时应启动拉取");
        handle.await.unwrap();

        let snapshot = provider.snapshot().unwrap();
        assert_eq!(snapshot.compiled_rule_sets.len(), 1);
        assert_eq!(snapshot.raw_text, FEED_V1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.generation(), 1);
        assert!(rx.has_changed().unwrap());
        assert!(!provider.is_fetch_in_flight());

        let persisted = cache.peek().unwrap();
        assert_eq!(persisted.raw_text, FEED_V1);
        assert_eq!(persisted.fetched_at_ms, snapshot.fetched_at_ms);
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_fetch() {
        let fetcher = ScriptedFetcher::new(Reply::Body(FEED_V2));
        let cache = Arc::new(MemoryRuleCache::with_cached(CachedRules {
            raw_text: FEED_V1.to_string(),
            fetched_at_ms: now_epoch_ms(),
        }));
        let provider = provider(fetcher.clone(), cache);

        assert!(provider.load_cached().await);
        assert!(provider.ensure_fresh().is_none());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.snapshot().unwrap().raw_text, FEED_V1);
    }

    #[tokio::test]
    async fn test_stale_cache_loaded_then_replaced() {
        let fetcher = ScriptedFetcher::new(Reply::Body(FEED_V2));
        let cache = Arc::new(MemoryRuleCache::with_cached(CachedRules {
            raw_text: FEED_V1.to_string(),
            fetched_at_ms: now_epoch_ms() - 3_600_000,
        }));
        let provider = provider(fetcher, cache.clone());

        // 过期缓存依然会先被加载使用
        assert!(provider.load_cached().await);
        let before = provider.snapshot().unwrap();
        assert_eq!(before.raw_text, FEED_V1);

        provider.ensure_fresh().unwrap().await.unwrap();
        let after = provider.snapshot().unwrap();
        assert_eq!(after.raw_text, FEED_V2);
        assert!(!Arc::ptr_eq(&before, &after));
        // 旧快照持有者看到的仍是完整旧数据
        assert_eq!(before.compiled_rule_sets[0].literal_params.len(), 1);
        assert_eq!(after.compiled_rule_sets[0].literal_params.len(), 2);
        assert_eq!(cache.peek().unwrap().raw_text, FEED_V2);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_snapshot() {
        let stale_at = now_epoch_ms() - 7_200_000;
        let fetcher = ScriptedFetcher::new(Reply::Fail);
        let cache = Arc::new(MemoryRuleCache::with_cached(CachedRules {
            raw_text: FEED_V1.to_string(),
            fetched_at_ms: stale_at,
        }));
        let provider = provider(fetcher.clone(), cache.clone());
        provider.load_cached().await;
        let before = provider.snapshot().unwrap();

        provider.ensure_fresh().unwrap().await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&before, &provider.snapshot().unwrap()));
        assert_eq!(provider.generation(), 0);
        assert_eq!(cache.peek().unwrap().fetched_at_ms, stale_at);
        assert!(!provider.is_fetch_in_flight());
        // 没有重试逻辑，下次 ensure_fresh 才会再次尝试
        provider.ensure_fresh().unwrap().await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_json_keeps_previous_snapshot() {
        let fetcher = ScriptedFetcher::new(Reply::Body("<html>maintenance</html>"));
        let provider = provider(fetcher, Arc::new(MemoryRuleCache::new()));
        assert!(matches!(provider.refresh().await, Err(UrlTidyError::JsonError(_))));
        assert!(provider.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let fetcher = ScriptedFetcher::new(Reply::Hang);
        let provider = provider(fetcher, Arc::new(MemoryRuleCache::new()));
        assert!(matches!(provider.refresh().await, Err(UrlTidyError::FetchTimeout(_))));
        assert!(provider.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_ensure_fresh_is_idempotent_while_in_flight() {
        let fetcher = ScriptedFetcher::new(Reply::Body(FEED_V1));
        let provider = provider(fetcher.clone(), Arc::new(MemoryRuleCache::new()));

        // 当前线程运行时：任务在第一次 await 前不会执行
        let handle = provider.ensure_fresh().unwrap();
        assert!(provider.is_fetch_in_flight());
        assert!(provider.ensure_fresh().is_none());
        assert!(provider.ensure_fresh().is_none());
        handle.await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(!provider.is_fetch_in_flight());
    }

    #[tokio::test]
    async fn test_aborted_refresh_releases_in_flight_flag() {
        let fetcher = ScriptedFetcher::new(Reply::Body(FEED_V1));
        let provider = provider(fetcher.clone(), Arc::new(MemoryRuleCache::new()));

        // 当前线程运行时：任务尚未被轮询就被取消
        let handle = provider.ensure_fresh().unwrap();
        assert!(provider.is_fetch_in_flight());
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(!provider.is_fetch_in_flight());
        provider.ensure_fresh().expect("取消后应能重新拉取").await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(provider.snapshot().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_cached_text_triggers_refresh() {
        let cache = Arc::new(MemoryRuleCache::with_cached(CachedRules {
            raw_text: "not json".to_string(),
            fetched_at_ms: now_epoch_ms(),
        }));
        let provider = provider(ScriptedFetcher::new(Reply::Body(FEED_V1)), cache);
        assert!(!provider.load_cached().await);
        assert!(provider.needs_refresh_at(now_epoch_ms()));
    }
}
