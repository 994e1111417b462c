//! 编排器：把导航事件桥接到匹配引擎，并在远程规则更新后重新清理当前页面
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::navigation::{NavigationEvent, Navigator};
use crate::cleaner::{CleanResult, MatchEngine};
use crate::rule::{RemoteRuleProvider, RuleStore};

/// 编排器
pub struct Orchestrator {
    store: &'static RuleStore,
    provider: Arc<RemoteRuleProvider>,
    navigator: Arc<dyn Navigator>,
    // 自身改写地址期间为 true，防止改写再次触发清理
    cleaning: AtomicBool,
    auto_refresh: bool,
}

impl Orchestrator {
    pub fn new(store: &'static RuleStore, provider: Arc<RemoteRuleProvider>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            store,
            provider,
            navigator,
            cleaning: AtomicBool::new(false),
            auto_refresh: true,
        }
    }

    /// 是否在事件处理时检查远程规则是否过期
    pub fn auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    /// 处理一个导航事件，返回改写后的地址（若发生改写）
    pub fn handle_event(&self, event: &NavigationEvent) -> Option<String> {
        if !event.kind.triggers_clean() {
            return None;
        }
        self.clean_and_replace(&event.url)
    }

    /// 清理宿主当前地址
    pub fn clean_current(&self) -> Option<String> {
        self.clean_and_replace(&self.navigator.current_url())
    }

    fn clean_and_replace(&self, url: &str) -> Option<String> {
        if self.cleaning.swap(true, Ordering::AcqRel) {
            debug!("改写进行中，忽略重入清理：{}", url);
            return None;
        }
        let _guard = CleaningGuard(&self.cleaning);

        let snapshot = self.provider.snapshot();
        match MatchEngine::clean(url, self.store, snapshot.as_deref()) {
            CleanResult::Cleaned(cleaned) if cleaned != url => {
                info!("已移除追踪参数：{} -> {}", url, cleaned);
                self.navigator.replace_url(&cleaned);
                Some(cleaned)
            }
            _ => None,
        }
    }

    /// 事件循环：启动时清理一次，之后处理导航事件与规则更新通知，事件源关闭时退出
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<NavigationEvent>) {
        let mut generations = self.provider.subscribe();
        if self.auto_refresh {
            self.provider.ensure_fresh();
        }
        self.clean_current();

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("导航事件源已关闭，编排器退出");
                        break;
                    };
                    self.handle_event(&event);
                    if self.auto_refresh {
                        self.provider.ensure_fresh();
                    }
                }
                Ok(()) = generations.changed() => {
                    debug!("远程规则已替换，重新清理当前地址");
                    self.clean_current();
                }
            }
        }
    }
}

struct CleaningGuard<'a>(&'a AtomicBool);

impl Drop for CleaningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
