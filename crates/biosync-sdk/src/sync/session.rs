//! 同步会话
//!
//! 每次调用创建一个会话对象：持有完整工作集、解析到的可达终端集、
//! 单调递增的完成计数、每次操作的结果列表、以及取消令牌。
//! 会话由协调器持有并显式传入每个 worker，结束即丢弃，没有全局单例。
//!
//! 状态机：`Idle → Running → { Completed | Aborted | Failed }`
//! - `Running` 仅在至少一台终端可达时进入
//! - `Aborted` 仅能由操作员显式取消从 `Running` 进入
//! - `Failed` 仅在目录解析失败、任何终端工作开始之前进入

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::directory::TerminalInfo;
use crate::error::{BioSyncError, Result};
use crate::sync::cancel::CancelToken;

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// 空闲（已创建，未开始）
    Idle,
    /// 运行中
    Running,
    /// 正常完成
    Completed,
    /// 操作员取消
    Aborted,
    /// 目录解析失败，未开始任何下发
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "空闲"),
            SessionState::Running => write!(f, "运行中"),
            SessionState::Completed => write!(f, "已完成"),
            SessionState::Aborted => write!(f, "已取消"),
            SessionState::Failed => write!(f, "失败"),
        }
    }
}

/// 单次操作结果类别
///
/// `Aborted` 与 `Failed` 严格区分：取消产生的结果不计入失败率分母
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    Success,
    Failed,
    Aborted,
}

/// 单次 (记录, 终端) 操作的结果，恰好归属一个配对
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushOutcome {
    pub record_id: String,
    pub terminal_id: String,
    pub kind: OutcomeKind,
    pub message: Option<String>,
    /// 结果落地时间（UNIX 时间戳，毫秒，UTC）
    pub finished_at: i64,
}

impl PushOutcome {
    pub fn success(record_id: &str, terminal_id: &str, message: Option<String>) -> Self {
        Self::new(record_id, terminal_id, OutcomeKind::Success, message)
    }

    pub fn failed(record_id: &str, terminal_id: &str, message: String) -> Self {
        Self::new(record_id, terminal_id, OutcomeKind::Failed, Some(message))
    }

    pub fn aborted(record_id: &str, terminal_id: &str) -> Self {
        Self::new(record_id, terminal_id, OutcomeKind::Aborted, None)
    }

    fn new(record_id: &str, terminal_id: &str, kind: OutcomeKind, message: Option<String>) -> Self {
        Self {
            record_id: record_id.to_string(),
            terminal_id: terminal_id.to_string(),
            kind,
            message,
            finished_at: Utc::now().timestamp_millis(),
        }
    }
}

/// 会话进度快照
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionProgress {
    /// 已落地的操作数
    pub completed: u64,
    /// 预期操作总数 = |记录| × |可达终端|
    pub expected: u64,
    pub state: SessionState,
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    terminals: Vec<TerminalInfo>,
    expected_total: u64,
    completed: u64,
    outcomes: Vec<PushOutcome>,
}

/// 同步会话（内部共享，可廉价克隆）
#[derive(Debug, Clone)]
pub struct SyncSession {
    id: Uuid,
    records: Arc<Vec<String>>,
    cancel: CancelToken,
    inner: Arc<Mutex<SessionInner>>,
}

impl SyncSession {
    /// 创建新会话（`Idle` 状态）
    pub fn new(records: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            records: Arc::new(records),
            cancel: CancelToken::new(),
            inner: Arc::new(Mutex::new(SessionInner {
                state: SessionState::Idle,
                terminals: Vec::new(),
                expected_total: 0,
                completed: 0,
                outcomes: Vec::new(),
            })),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn records(&self) -> &[String] {
        &self.records
    }

    pub(crate) fn records_shared(&self) -> Arc<Vec<String>> {
        self.records.clone()
    }

    /// 取消令牌（传入每个 worker）
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// 操作员取消：随时可调用，worker 在下一个检查点停止发起新调用
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// 会话解析到的可达终端集（`Running` 之前为空）
    pub async fn terminals(&self) -> Vec<TerminalInfo> {
        self.inner.lock().await.terminals.clone()
    }

    /// 进度快照
    pub async fn progress(&self) -> SessionProgress {
        let inner = self.inner.lock().await;
        SessionProgress {
            completed: inner.completed,
            expected: inner.expected_total,
            state: inner.state,
        }
    }

    /// 全部已落地的操作结果
    pub async fn outcomes(&self) -> Vec<PushOutcome> {
        self.inner.lock().await.outcomes.clone()
    }

    /// 进入 `Running`：仅当目录解析成功且至少一台终端可达时由协调器调用
    pub(crate) async fn begin(&self, terminals: Vec<TerminalInfo>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Idle {
            return Err(BioSyncError::InvalidOperation(format!(
                "会话 {} 无法从 {} 进入运行状态",
                self.id, inner.state
            )));
        }
        if terminals.is_empty() {
            return Err(BioSyncError::InvalidOperation(
                "没有可达终端，会话不能进入运行状态".to_string(),
            ));
        }
        inner.expected_total = self.records.len() as u64 * terminals.len() as u64;
        inner.terminals = terminals;
        inner.state = SessionState::Running;
        Ok(())
    }

    /// 目录解析失败：`Idle → Failed`，不发起任何下发
    pub(crate) async fn fail(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Idle {
            inner.state = SessionState::Failed;
        }
    }

    /// 记录一次操作结果
    ///
    /// 不变量：完成计数永不超过 |记录| × |可达终端|，
    /// 每个 (记录, 终端) 配对最多落地一次结果。
    pub(crate) async fn record_outcome(&self, outcome: PushOutcome) {
        let mut inner = self.inner.lock().await;
        if inner.completed >= inner.expected_total {
            warn!(
                "会话 {} 结果被丢弃：已达预期操作总数 {} ({}/{})",
                self.id, inner.expected_total, outcome.terminal_id, outcome.record_id
            );
            return;
        }
        inner.completed += 1;
        inner.outcomes.push(outcome);
    }

    /// 收尾：所有 worker 汇合后由协调器调用，返回最终状态
    pub(crate) async fn finish(&self) -> SessionState {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Running {
            inner.state = if self.cancel.is_cancelled() {
                SessionState::Aborted
            } else {
                SessionState::Completed
            };
        }
        inner.state
    }
}
