//! 扇出协调器
//!
//! 一次同步会话的执行流程：
//! 1. 解析终端目录（单次远程调用，零台可达 → 会话 `Failed`，不做部分同步）
//! 2. 每台可达终端派生一个独立 worker，并发运行互不阻塞
//! 3. 每个 worker 按输入顺序逐条下发本终端的全部记录（终端内严格 FIFO，
//!    终端间无顺序保证），循环顶部与发起调用前检查取消令牌
//! 4. 汇合所有 worker，产出按终端与总体的汇总报告
//!
//! 单次操作失败只记录结果，绝不自动中止会话；只有操作员取消能停止会话。
//! 本层不做自动重试，重试即操作员重新发起一次会话。

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bridge::BridgeRpc;
use crate::config::SyncConfig;
use crate::directory::{TerminalDirectory, TerminalInfo};
use crate::error::{BioSyncError, Result};
use crate::events::SyncEvent;
use crate::sync::cancel::CancelToken;
use crate::sync::session::{PushOutcome, SessionState, SyncSession};

/// 单台终端的下发报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalReport {
    pub terminal_id: String,
    pub success: u64,
    pub failure: u64,
    pub aborted: u64,
}

impl TerminalReport {
    fn new(terminal_id: String) -> Self {
        Self {
            terminal_id,
            success: 0,
            failure: 0,
            aborted: 0,
        }
    }

    /// 本终端落地的操作总数（含 aborted）
    pub fn attempted(&self) -> u64 {
        self.success + self.failure + self.aborted
    }
}

/// 会话汇总报告：会话结束时一次性产出
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub state: SessionState,
    /// 预期操作总数 = |记录| × |可达终端|
    pub expected_total: u64,
    pub success_total: u64,
    pub failure_total: u64,
    pub aborted_total: u64,
    pub per_terminal: Vec<TerminalReport>,
    /// 会话起止时间（UNIX 时间戳，毫秒，UTC）
    pub started_at: i64,
    pub finished_at: i64,
}

impl SessionSummary {
    /// 已落地的结果总数
    pub fn recorded_total(&self) -> u64 {
        self.success_total + self.failure_total + self.aborted_total
    }

    /// 成功率：aborted 不计入分母（取消产生的结果不算失败）
    pub fn success_rate(&self) -> f64 {
        let attempted = self.success_total + self.failure_total;
        if attempted == 0 {
            0.0
        } else {
            self.success_total as f64 / attempted as f64
        }
    }
}

/// 扇出协调器
pub struct SyncCoordinator {
    config: SyncConfig,
    bridge: Arc<dyn BridgeRpc>,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl SyncCoordinator {
    pub fn new(config: SyncConfig, bridge: Arc<dyn BridgeRpc>) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);
        Self {
            config,
            bridge,
            event_tx,
        }
    }

    /// 订阅进度事件
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    /// 执行一次完整的同步会话，返回汇总报告
    ///
    /// 目录解析失败或零台终端可达时，会话进入 `Failed` 并返回错误；
    /// 其余情况下所有失败都被收进报告，本方法返回 `Ok`。
    pub async fn run_session(&self, session: &SyncSession) -> Result<SessionSummary> {
        let started_at = Utc::now().timestamp_millis();
        info!(
            "开始同步会话 {}，{} 条记录待下发",
            session.id(),
            session.records().len()
        );

        // 1. 目录解析：失败即会话失败，不做部分同步
        let directory = TerminalDirectory::new(self.bridge.clone(), self.config.directory_timeout());
        let snapshot = match directory.resolve().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("会话 {} 目录解析失败: {}", session.id(), e);
                session.fail().await;
                return Err(e);
            }
        };

        let reachable = snapshot.reachable();
        if reachable.is_empty() {
            error!("会话 {} 没有可达终端，终止", session.id());
            session.fail().await;
            return Err(BioSyncError::Directory(
                "没有可达的终端，同步未开始".to_string(),
            ));
        }

        session.begin(reachable.clone()).await?;
        self.emit(SyncEvent::SessionStarted {
            session_id: session.id(),
            record_count: session.records().len(),
            terminal_count: reachable.len(),
            timestamp: Utc::now().timestamp_millis(),
        });

        // 2. 扇出：每台可达终端一个独立 worker
        let mut handles = Vec::with_capacity(reachable.len());
        for terminal in reachable {
            let worker = TerminalWorker {
                terminal,
                records: session.records_shared(),
                bridge: self.bridge.clone(),
                session: session.clone(),
                cancel: session.cancel_token(),
                event_tx: self.event_tx.clone(),
                push_timeout: self.config.push_timeout(),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        // 3. 汇合：慢终端不影响其他终端，这里统一等待
        let mut per_terminal = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(report) => per_terminal.push(report),
                Err(e) => error!("会话 {} worker 异常退出: {}", session.id(), e),
            }
        }

        let state = session.finish().await;
        let summary = self
            .build_summary(session, state, per_terminal, started_at)
            .await;

        self.emit(SyncEvent::SessionFinished {
            session_id: session.id(),
            state,
            success_total: summary.success_total,
            failure_total: summary.failure_total,
            aborted_total: summary.aborted_total,
            timestamp: summary.finished_at,
        });

        info!(
            "会话 {} 结束: {}，成功 {} / 失败 {} / 取消 {}，成功率 {:.1}%",
            session.id(),
            state,
            summary.success_total,
            summary.failure_total,
            summary.aborted_total,
            summary.success_rate() * 100.0
        );

        Ok(summary)
    }

    async fn build_summary(
        &self,
        session: &SyncSession,
        state: SessionState,
        per_terminal: Vec<TerminalReport>,
        started_at: i64,
    ) -> SessionSummary {
        let progress = session.progress().await;
        let success_total = per_terminal.iter().map(|r| r.success).sum();
        let failure_total = per_terminal.iter().map(|r| r.failure).sum();
        let aborted_total = per_terminal.iter().map(|r| r.aborted).sum();

        SessionSummary {
            session_id: session.id(),
            state,
            expected_total: progress.expected,
            success_total,
            failure_total,
            aborted_total,
            per_terminal,
            started_at,
            finished_at: Utc::now().timestamp_millis(),
        }
    }

    // 事件是尽力而为的：没有订阅者时 send 失败属正常场景，仅打 debug
    fn emit(&self, event: SyncEvent) {
        if let Err(e) = self.event_tx.send(event) {
            debug!("Failed to broadcast event (no active receivers): {}", e);
        }
    }
}

/// 单终端 worker：按输入顺序逐条下发，互不阻塞
struct TerminalWorker {
    terminal: TerminalInfo,
    records: Arc<Vec<String>>,
    bridge: Arc<dyn BridgeRpc>,
    session: SyncSession,
    cancel: CancelToken,
    event_tx: broadcast::Sender<SyncEvent>,
    push_timeout: std::time::Duration,
}

impl TerminalWorker {
    async fn run(self) -> TerminalReport {
        let mut report = TerminalReport::new(self.terminal.id.clone());
        info!(
            "Worker {} started, {} 条记录待下发",
            self.terminal.id,
            self.records.len()
        );

        for record_id in self.records.iter() {
            // 循环顶部检查取消：不再发起新调用，剩余配对全部记为 aborted
            if self.cancel.is_cancelled() {
                report.aborted += 1;
                self.record(PushOutcome::aborted(record_id, &self.terminal.id))
                    .await;
                continue;
            }

            let result = timeout(
                self.push_timeout,
                self.bridge.push_record(&self.terminal, record_id),
            )
            .await;

            // 响应落地前复查取消：飞行中完成的调用允许结束，结果作废
            if self.cancel.is_cancelled() {
                report.aborted += 1;
                self.record(PushOutcome::aborted(record_id, &self.terminal.id))
                    .await;
                continue;
            }

            match result {
                Ok(Ok(resp)) if resp.success => {
                    debug!(
                        "Worker {} pushed record {} -> ok",
                        self.terminal.id, record_id
                    );
                    report.success += 1;
                    let message = if resp.message.is_empty() {
                        None
                    } else {
                        Some(resp.message)
                    };
                    self.record(PushOutcome::success(record_id, &self.terminal.id, message))
                        .await;
                }
                Ok(Ok(resp)) => {
                    warn!(
                        "Worker {} push rejected for {}: {}",
                        self.terminal.id, record_id, resp.message
                    );
                    report.failure += 1;
                    self.record(PushOutcome::failed(
                        record_id,
                        &self.terminal.id,
                        resp.message,
                    ))
                    .await;
                }
                Ok(Err(e)) => {
                    warn!(
                        "Worker {} push error for {}: {}",
                        self.terminal.id, record_id, e
                    );
                    report.failure += 1;
                    self.record(PushOutcome::failed(
                        record_id,
                        &self.terminal.id,
                        e.to_string(),
                    ))
                    .await;
                }
                Err(_) => {
                    warn!(
                        "Worker {} push timeout for {} ({}s)",
                        self.terminal.id,
                        record_id,
                        self.push_timeout.as_secs()
                    );
                    report.failure += 1;
                    self.record(PushOutcome::failed(
                        record_id,
                        &self.terminal.id,
                        "push timeout".to_string(),
                    ))
                    .await;
                }
            }
        }

        let _ = self.event_tx.send(SyncEvent::TerminalFinished {
            session_id: self.session.id(),
            terminal_id: self.terminal.id.clone(),
            success: report.success,
            failure: report.failure,
            aborted: report.aborted,
            timestamp: Utc::now().timestamp_millis(),
        });

        info!(
            "Worker {} finished: success={} failure={} aborted={}",
            self.terminal.id, report.success, report.failure, report.aborted
        );
        report
    }

    async fn record(&self, outcome: PushOutcome) {
        let event = SyncEvent::PushFinished {
            session_id: self.session.id(),
            record_id: outcome.record_id.clone(),
            terminal_id: outcome.terminal_id.clone(),
            kind: outcome.kind,
            timestamp: outcome.finished_at,
        };
        self.session.record_outcome(outcome).await;
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::test_helpers::MockBridge;
    use crate::sync::session::OutcomeKind;
    use std::time::Duration;

    fn records(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn coordinator(bridge: MockBridge) -> (SyncCoordinator, Arc<MockBridge>) {
        let bridge = Arc::new(bridge);
        let coordinator = SyncCoordinator::new(
            SyncConfig::new().with_push_timeout(2).with_directory_timeout(2),
            bridge.clone(),
        );
        (coordinator, bridge)
    }

    #[tokio::test]
    async fn test_all_success_reports_full_rate() {
        let (coordinator, _bridge) = coordinator(MockBridge::new(vec![
            MockBridge::online("T1"),
            MockBridge::online("T2"),
        ]));
        let session = SyncSession::new(records(&["A", "B", "C"]));

        let summary = coordinator.run_session(&session).await.unwrap();

        // 3 条记录 × 2 台可达终端 = 恰好 6 条结果，成功率 100%
        assert_eq!(summary.state, SessionState::Completed);
        assert_eq!(summary.expected_total, 6);
        assert_eq!(summary.recorded_total(), 6);
        assert_eq!(summary.success_total, 6);
        assert_eq!(summary.success_rate(), 1.0);
        assert_eq!(summary.per_terminal.len(), 2);
        assert_eq!(session.state().await, SessionState::Completed);
    }

    #[tokio::test]
    async fn test_per_terminal_fifo_order() {
        let (coordinator, bridge) =
            coordinator(MockBridge::new(vec![MockBridge::online("T1")]));
        let session = SyncSession::new(records(&["A", "B", "C"]));

        coordinator.run_session(&session).await.unwrap();

        // 单终端下严格按输入顺序发起：A、B、C
        let calls = bridge.calls();
        assert_eq!(
            calls,
            vec![
                ("T1".to_string(), "A".to_string()),
                ("T1".to_string(), "B".to_string()),
                ("T1".to_string(), "C".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_offline_terminal_excluded() {
        let (coordinator, bridge) = coordinator(MockBridge::new(vec![
            MockBridge::online("T1"),
            MockBridge::offline("T2"),
        ]));
        let session = SyncSession::new(records(&["A", "B"]));

        let summary = coordinator.run_session(&session).await.unwrap();

        // 仅 online 终端参与：预期操作数 = 2 × 1
        assert_eq!(summary.expected_total, 2);
        assert_eq!(summary.per_terminal.len(), 1);
        assert_eq!(summary.per_terminal[0].terminal_id, "T1");
        assert!(bridge.calls().iter().all(|(t, _)| t == "T1"));
    }

    #[tokio::test]
    async fn test_zero_reachable_fails_without_pushes() {
        let (coordinator, bridge) = coordinator(MockBridge::new(vec![
            MockBridge::offline("T1"),
            MockBridge::offline("T2"),
        ]));
        let session = SyncSession::new(records(&["A"]));

        let err = coordinator.run_session(&session).await.unwrap_err();

        assert!(err.is_directory_error());
        assert_eq!(session.state().await, SessionState::Failed);
        assert!(bridge.calls().is_empty());
    }

    #[tokio::test]
    async fn test_directory_error_fails_session() {
        let (coordinator, bridge) = coordinator(
            MockBridge::new(vec![MockBridge::online("T1")]).with_directory_error("bridge down"),
        );
        let session = SyncSession::new(records(&["A"]));

        let err = coordinator.run_session(&session).await.unwrap_err();

        assert!(err.is_directory_error());
        assert_eq!(session.state().await, SessionState::Failed);
        assert!(bridge.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_contained_per_operation() {
        let (coordinator, _bridge) = coordinator(
            MockBridge::new(vec![MockBridge::online("T1")]).with_failing_record("B"),
        );
        let session = SyncSession::new(records(&["A", "B", "C"]));

        let summary = coordinator.run_session(&session).await.unwrap();

        // B 失败不影响 A、C，会话正常完成
        assert_eq!(summary.state, SessionState::Completed);
        assert_eq!(summary.success_total, 2);
        assert_eq!(summary.failure_total, 1);
        assert_eq!(summary.recorded_total(), 3);
        assert!((summary.success_rate() - 2.0 / 3.0).abs() < 1e-9);

        let outcomes = session.outcomes().await;
        let failed: Vec<_> = outcomes
            .iter()
            .filter(|o| o.kind == OutcomeKind::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].record_id, "B");
    }

    #[tokio::test]
    async fn test_cancel_mid_session_discards_inflight() {
        // 每次 push 人为延迟 200ms；在第一条记录飞行中取消
        let (coordinator, bridge) = coordinator(
            MockBridge::new(vec![MockBridge::online("T1")])
                .with_push_delay(Duration::from_millis(200)),
        );
        let session = SyncSession::new(records(&["A", "B", "C"]));
        let handle = tokio::spawn({
            let session = session.clone();
            async move { coordinator.run_session(&session).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        session.cancel();

        let summary = handle.await.unwrap().unwrap();

        // 取消后不再发起新调用：只有 A 曾被发出
        assert_eq!(bridge.calls(), vec![("T1".to_string(), "A".to_string())]);
        // 飞行中的 A 结果作废，B、C 在循环顶部被取消
        assert_eq!(summary.state, SessionState::Aborted);
        assert_eq!(summary.success_total, 0);
        assert_eq!(summary.aborted_total, 3);
        assert_eq!(summary.recorded_total(), 3);
        assert!(session
            .outcomes()
            .await
            .iter()
            .all(|o| o.kind == OutcomeKind::Aborted));
    }

    #[tokio::test]
    async fn test_completed_never_exceeds_expected() {
        let (coordinator, _bridge) = coordinator(MockBridge::new(vec![
            MockBridge::online("T1"),
            MockBridge::online("T2"),
            MockBridge::online("T3"),
        ]));
        let session = SyncSession::new(records(&["A", "B"]));

        let summary = coordinator.run_session(&session).await.unwrap();
        let progress = session.progress().await;

        assert!(progress.completed <= progress.expected);
        assert_eq!(summary.recorded_total(), summary.expected_total);
    }

    #[tokio::test]
    async fn test_progress_events_emitted() {
        let (coordinator, _bridge) =
            coordinator(MockBridge::new(vec![MockBridge::online("T1")]));
        let mut events = coordinator.subscribe();
        let session = SyncSession::new(records(&["A", "B"]));

        coordinator.run_session(&session).await.unwrap();

        let mut types = Vec::new();
        while let Ok(event) = events.try_recv() {
            types.push(event.event_type());
        }
        assert_eq!(types.first(), Some(&"session_started"));
        assert_eq!(types.last(), Some(&"session_finished"));
        assert_eq!(
            types.iter().filter(|t| **t == "push_finished").count(),
            2
        );
        assert_eq!(
            types.iter().filter(|t| **t == "terminal_finished").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_empty_record_set_completes_trivially() {
        let (coordinator, bridge) =
            coordinator(MockBridge::new(vec![MockBridge::online("T1")]));
        let session = SyncSession::new(vec![]);

        let summary = coordinator.run_session(&session).await.unwrap();

        assert_eq!(summary.state, SessionState::Completed);
        assert_eq!(summary.expected_total, 0);
        assert_eq!(summary.recorded_total(), 0);
        assert!(bridge.calls().is_empty());
    }
}
