//! 规则缓存管理
//! 只持久化两项：最近一次成功拉取的原始规则文本及其拉取时间

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;
use async_trait::async_trait;
use rmp_serde::{Serializer, from_slice};
use serde::Serialize;
use tracing::debug;

use super::model::CachedRules;
use crate::config::GlobalConfig;
use crate::error::{TidyResult, UrlTidyError};

/// 持久化存储接口
#[async_trait]
pub trait RuleCacheStore: Send + Sync {
    /// 读取缓存，不存在时返回 None
    async fn load(&self) -> TidyResult<Option<CachedRules>>;
    /// 覆盖写入缓存
    async fn save(&self, cached: &CachedRules) -> TidyResult<()>;
    /// 清除缓存
    async fn clear(&self) -> TidyResult<()>;
}

/// 本地文件缓存（MessagePack）
#[derive(Debug, Clone)]
pub struct FileRuleCache {
    path: PathBuf,
}

impl FileRuleCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &GlobalConfig) -> Self {
        Self::new(config.rule_cache_path.clone())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

#[async_trait]
impl RuleCacheStore for FileRuleCache {
    async fn load(&self) -> TidyResult<Option<CachedRules>> {
        let cache_data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let cached: CachedRules = from_slice(&cache_data)
            .map_err(|e| UrlTidyError::MsgPackError(format!("反序列化失败：{}", e)))?;

        debug!("缓存文件反序列化成功，规则文本{}字节，拉取时间{}", cached.raw_text.len(), cached.fetched_at_ms);
        Ok(Some(cached))
    }

    async fn save(&self, cached: &CachedRules) -> TidyResult<()> {
        let mut cache_data = Vec::new();
        cached
            .serialize(&mut Serializer::new(&mut cache_data))
            .map_err(|e| UrlTidyError::MsgPackError(format!("序列化失败：{}", e)))?;

        debug!("缓存序列化成功，序列化后数据大小：{} 字节", cache_data.len());

        // 先写临时文件再重命名，读方不会看到写了一半的缓存
        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, cache_data).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> TidyResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// 内存缓存（测试与嵌入方使用）
#[derive(Debug, Default)]
pub struct MemoryRuleCache {
    slot: Mutex<Option<CachedRules>>,
}

impl MemoryRuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cached(cached: CachedRules) -> Self {
        Self { slot: Mutex::new(Some(cached)) }
    }

    /// 当前缓存内容
    pub fn peek(&self) -> Option<CachedRules> {
        self.slot.lock().map(|slot| slot.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RuleCacheStore for MemoryRuleCache {
    async fn load(&self) -> TidyResult<Option<CachedRules>> {
        Ok(self.peek())
    }

    async fn save(&self, cached: &CachedRules) -> TidyResult<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| UrlTidyError::InvalidInput("内存缓存锁已中毒".to_string()))?;
        *slot = Some(cached.clone());
        Ok(())
    }

    async fn clear(&self) -> TidyResult<()> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_cache_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("urltidy_{}_{}_{}.mp", tag, std::process::id(), nanos))
    }

    #[tokio::test]
    async fn test_file_cache_roundtrip_and_clear() {
        let cache = FileRuleCache::new(temp_cache_path("roundtrip"));
        assert_eq!(cache.load().await.unwrap(), None);

        let cached = CachedRules { raw_text: r#"{"providers":{}}"#.to_string(), fetched_at_ms: 42 };
        cache.save(&cached).await.unwrap();
        assert_eq!(cache.load().await.unwrap(), Some(cached.clone()));

        // 覆盖写入
        let newer = CachedRules { raw_text: "{}".to_string(), fetched_at_ms: 43 };
        cache.save(&newer).await.unwrap();
        assert_eq!(cache.load().await.unwrap(), Some(newer));
        assert!(!cache.tmp_path().exists());

        cache.clear().await.unwrap();
        assert_eq!(cache.load().await.unwrap(), None);
        // 重复清除不报错
        cache.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_cache_corrupt_data() {
        let path = temp_cache_path("corrupt");
        tokio::fs::write(&path, b"\xc1garbage").await.unwrap();
        let cache = FileRuleCache::new(path);
        assert!(matches!(cache.load().await, Err(UrlTidyError::MsgPackError(_))));
        cache.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_cache() {
        let cache = MemoryRuleCache::new();
        assert_eq!(cache.load().await.unwrap(), None);
        let cached = CachedRules { raw_text: "{}".to_string(), fetched_at_ms: 1 };
        cache.save(&cached).await.unwrap();
        assert_eq!(cache.peek(), Some(cached));
        cache.clear().await.unwrap();
        assert_eq!(cache.peek(), None);
    }
}
