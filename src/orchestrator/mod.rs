//! 编排模块：导航事件 -> 匹配引擎 -> 地址改写
pub mod navigation;
pub mod orchestrator;

pub use self::navigation::{NavigationEvent, NavigationKind, Navigator};
pub use self::orchestrator::Orchestrator;
