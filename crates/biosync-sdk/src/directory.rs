//! 终端目录解析
//!
//! 同步会话开始时，通过桥接服务拉取一次当前已知终端的快照。
//! 快照是只读的：本组件不持久化终端信息，也不主动探测连通性。

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::bridge::BridgeRpc;
use crate::error::{BioSyncError, Result};

/// 终端可达状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalStatus {
    /// 在线
    Online,
    /// 离线
    Offline,
    /// 未知
    Unknown,
}

impl std::fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminalStatus::Online => write!(f, "在线"),
            TerminalStatus::Offline => write!(f, "离线"),
            TerminalStatus::Unknown => write!(f, "未知"),
        }
    }
}

/// 终端信息（桥接服务返回的只读快照项）
///
/// 注意：`latency` 为桥接服务最近一次探测的往返延迟（毫秒），离线终端无值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalInfo {
    pub id: String,
    pub address: String,
    pub status: TerminalStatus,
    #[serde(rename = "latency", default)]
    pub latency_ms: Option<u64>,
}

impl TerminalInfo {
    /// 只有 `online` 的终端才参与下发
    pub fn is_reachable(&self) -> bool {
        matches!(self.status, TerminalStatus::Online)
    }
}

/// 目录快照：会话开始时拉取一次，之后不再刷新
#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    pub terminals: Vec<TerminalInfo>,
    /// 解析时间（UNIX 时间戳，毫秒，UTC）
    pub resolved_at: i64,
}

impl DirectorySnapshot {
    /// 可达终端集合（仅 `online`）
    pub fn reachable(&self) -> Vec<TerminalInfo> {
        self.terminals
            .iter()
            .filter(|t| t.is_reachable())
            .cloned()
            .collect()
    }

    pub fn reachable_count(&self) -> usize {
        self.terminals.iter().filter(|t| t.is_reachable()).count()
    }
}

/// 目录解析器
///
/// 失败契约：远程调用出错、超时、或目录为空，都作为目录错误返回；
/// 调用方必须把"零台可达终端"视为会话级错误，不做部分同步。
#[derive(Debug)]
pub struct TerminalDirectory {
    bridge: Arc<dyn BridgeRpc>,
    timeout: Duration,
}

impl TerminalDirectory {
    pub fn new(bridge: Arc<dyn BridgeRpc>, timeout: Duration) -> Self {
        Self { bridge, timeout }
    }

    /// 解析当前终端目录（单次远程调用）
    pub async fn resolve(&self) -> Result<DirectorySnapshot> {
        let terminals = timeout(self.timeout, self.bridge.list_terminals())
            .await
            .map_err(|_| {
                BioSyncError::Directory(format!(
                    "目录查询超时（{}s）",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| BioSyncError::Directory(format!("目录查询失败: {}", e)))?;

        if terminals.is_empty() {
            warn!("目录查询返回空列表");
            return Err(BioSyncError::Directory("目录中没有任何终端".to_string()));
        }

        let snapshot = DirectorySnapshot {
            terminals,
            resolved_at: Utc::now().timestamp_millis(),
        };

        info!(
            "目录解析完成: 共 {} 台终端，{} 台可达",
            snapshot.terminals.len(),
            snapshot.reachable_count()
        );

        Ok(snapshot)
    }
}
