//! BioSync SDK - 指纹考勤终端同步 SDK
//!
//! 面向 ERP 客户端的指纹记录分发协调器，经由本地硬件桥接服务把
//! 员工指纹记录批量下发到多台考勤终端：
//! - 🔍 终端目录解析：单次查询可达终端，零台可达直接失败
//! - 📤 扇出下发：每台终端一个独立 worker，终端内严格按输入顺序
//! - 🛑 协作式取消：操作员随时取消，飞行中调用允许完成但结果作废
//! - 📊 会话汇总：按终端与总体的成功 / 失败 / 取消统计与成功率
//! - ⚙️ 事件系统：broadcast 进度事件，尽力而为，不影响会话本身
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use biosync_sdk::{BridgeConfig, HttpBridgeClient, SyncConfig, SyncCoordinator, SyncSession};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 连接本地桥接服务
//!     let bridge = Arc::new(HttpBridgeClient::new(&BridgeConfig::default())?);
//!
//!     // 创建协调器与会话
//!     let coordinator = SyncCoordinator::new(SyncConfig::default(), bridge);
//!     let session = SyncSession::new(vec![
//!         "EMP-001".to_string(),
//!         "EMP-002".to_string(),
//!     ]);
//!
//!     // 订阅进度事件
//!     let mut events = coordinator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("事件: {}", event.event_type());
//!         }
//!     });
//!
//!     // 执行同步并读取汇总报告
//!     let summary = coordinator.run_session(&session).await?;
//!     println!("成功率: {:.1}%", summary.success_rate() * 100.0);
//!
//!     Ok(())
//! }
//! ```

// 导出核心模块
pub mod bridge;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod sync;
pub mod version;

// 重新导出核心类型，方便使用
pub use bridge::{BridgeConfig, BridgeRpc, HttpBridgeClient, PushRecordRequest, PushResponse};
pub use config::SyncConfig;
pub use directory::{DirectorySnapshot, TerminalDirectory, TerminalInfo, TerminalStatus};
pub use error::{BioSyncError, Result};
pub use events::SyncEvent;
pub use sync::{
    CancelToken, OutcomeKind, PushOutcome, SessionProgress, SessionState, SessionSummary,
    SyncCoordinator, SyncSession, TerminalReport,
};
pub use version::{BUILD_TIME, GIT_SHA, SDK_VERSION};
