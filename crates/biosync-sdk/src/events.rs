//! 同步进度事件
//!
//! 会话运行期间通过 broadcast 通道对外发布尽力而为的进度通知。
//! 没有订阅者、或订阅者落后时，事件被丢弃，绝不阻塞或影响会话本身；
//! 会话结束时的汇总报告才是唯一一致的结果。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sync::session::{OutcomeKind, SessionState};

/// 同步事件类型
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyncEvent {
    /// 会话开始（目录解析成功，至少一台终端可达）
    SessionStarted {
        session_id: Uuid,
        record_count: usize,
        terminal_count: usize,
        timestamp: i64,
    },
    /// 单条 (记录, 终端) 操作完成
    PushFinished {
        session_id: Uuid,
        record_id: String,
        terminal_id: String,
        kind: OutcomeKind,
        timestamp: i64,
    },
    /// 某台终端的全部记录处理完毕
    TerminalFinished {
        session_id: Uuid,
        terminal_id: String,
        success: u64,
        failure: u64,
        aborted: u64,
        timestamp: i64,
    },
    /// 会话结束（汇总数据见 `SessionSummary`）
    SessionFinished {
        session_id: Uuid,
        state: SessionState,
        success_total: u64,
        failure_total: u64,
        aborted_total: u64,
        timestamp: i64,
    },
}

impl SyncEvent {
    /// 获取事件类型字符串
    pub fn event_type(&self) -> &'static str {
        match self {
            SyncEvent::SessionStarted { .. } => "session_started",
            SyncEvent::PushFinished { .. } => "push_finished",
            SyncEvent::TerminalFinished { .. } => "terminal_finished",
            SyncEvent::SessionFinished { .. } => "session_finished",
        }
    }

    /// 获取事件所属会话 ID
    pub fn session_id(&self) -> Uuid {
        match self {
            SyncEvent::SessionStarted { session_id, .. } => *session_id,
            SyncEvent::PushFinished { session_id, .. } => *session_id,
            SyncEvent::TerminalFinished { session_id, .. } => *session_id,
            SyncEvent::SessionFinished { session_id, .. } => *session_id,
        }
    }

    /// 获取事件时间戳（UNIX 毫秒，UTC）
    pub fn timestamp(&self) -> i64 {
        match self {
            SyncEvent::SessionStarted { timestamp, .. } => *timestamp,
            SyncEvent::PushFinished { timestamp, .. } => *timestamp,
            SyncEvent::TerminalFinished { timestamp, .. } => *timestamp,
            SyncEvent::SessionFinished { timestamp, .. } => *timestamp,
        }
    }
}
