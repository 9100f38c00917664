/// 扇出同步模块
///
/// 职责：
/// - 会话对象：工作集、可达终端集、计数器与结果列表（`session`）
/// - 协作式取消令牌（`cancel`）
/// - 扇出协调器：每台可达终端一个顺序 worker，汇总最终报告（`coordinator`）
pub mod cancel;
pub mod coordinator;
pub mod session;

pub use cancel::CancelToken;
pub use coordinator::{SessionSummary, SyncCoordinator, TerminalReport};
pub use session::{OutcomeKind, PushOutcome, SessionProgress, SessionState, SyncSession};
