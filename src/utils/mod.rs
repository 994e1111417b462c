//! 工具模块
pub mod clock;
pub mod url_parts;

pub use self::clock::now_epoch_ms;
pub use self::url_parts::UrlComponents;
