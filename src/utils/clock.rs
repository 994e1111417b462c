//! 时间工具

use std::time::{SystemTime, UNIX_EPOCH};

/// 当前 Unix 毫秒时间戳（系统时钟早于纪元时返回 0）
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
