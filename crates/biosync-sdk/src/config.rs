//! 同步配置
//!
//! 会话级的超时与通道容量配置，不含桥接服务地址（见 `bridge::BridgeConfig`）。

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 同步会话配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// 目录解析超时（秒）
    pub directory_timeout_secs: u64,
    /// 单次下发超时（秒）
    pub push_timeout_secs: u64,
    /// 事件通道容量
    pub event_channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            directory_timeout_secs: 5,
            push_timeout_secs: 30,
            event_channel_capacity: 100,
        }
    }
}

impl SyncConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置目录解析超时（秒）
    pub fn with_directory_timeout(mut self, secs: u64) -> Self {
        self.directory_timeout_secs = secs;
        self
    }

    /// 设置单次下发超时（秒）
    pub fn with_push_timeout(mut self, secs: u64) -> Self {
        self.push_timeout_secs = secs;
        self
    }

    /// 设置事件通道容量
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    pub fn directory_timeout(&self) -> Duration {
        Duration::from_secs(self.directory_timeout_secs)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }
}
