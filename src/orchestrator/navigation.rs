//! 导航事件与宿主接口
//! 宿主（浏览器扩展、WebView 绑定、CLI 等）负责产生事件并执行地址替换

use std::fmt;

/// 导航事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// 页面初次加载
    InitialLoad,
    /// DOM 解析完成（注入较晚时的补充清理）
    DomContentLoaded,
    /// history.pushState
    HistoryPush,
    /// history.replaceState
    HistoryReplace,
    /// 前进/后退
    PopState,
    /// pageshow；persisted 为 true 表示从往返缓存恢复
    PageShow { persisted: bool },
}

impl NavigationKind {
    /// 非往返缓存恢复的 pageshow 已由 InitialLoad 覆盖
    pub fn triggers_clean(&self) -> bool {
        !matches!(self, NavigationKind::PageShow { persisted: false })
    }
}

/// “当前URL已变为X”事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
    pub kind: NavigationKind,
    pub url: String,
}

impl NavigationEvent {
    pub fn new(kind: NavigationKind, url: impl Into<String>) -> Self {
        Self { kind, url: url.into() }
    }
}

impl fmt::Display for NavigationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.kind, self.url)
    }
}

/// 宿主导航接口
pub trait Navigator: Send + Sync {
    /// 当前可见地址
    fn current_url(&self) -> String;
    /// 替换可见地址，不新增历史记录
    fn replace_url(&self, url: &str);
}
