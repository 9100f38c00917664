//! 扇出同步演示
//!
//! 展示如何连接本地桥接服务并把一批员工记录下发到全部可达终端。
//! 需要本机运行桥接服务（默认 http://127.0.0.1:8998）。

use biosync_sdk::{BridgeConfig, HttpBridgeClient, SyncConfig, SyncCoordinator, SyncSession};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("\n🚀 指纹记录扇出同步演示\n");
    println!("====================================\n");

    // 连接本地桥接服务
    println!("📦 正在创建桥接客户端...");
    let bridge = Arc::new(HttpBridgeClient::new(&BridgeConfig::default())?);
    println!("✅ 桥接客户端已就绪\n");

    // 创建协调器与会话
    let coordinator = SyncCoordinator::new(SyncConfig::default(), bridge);
    let session = SyncSession::new(vec![
        "EMP-001".to_string(),
        "EMP-002".to_string(),
        "EMP-003".to_string(),
    ]);

    // 订阅进度事件
    let mut events = coordinator.subscribe();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("  📡 {}", event.event_type());
        }
    });

    // 需要中途取消时：session.cancel()
    println!("🔄 开始同步会话 {}...", session.id());
    match coordinator.run_session(&session).await {
        Ok(summary) => {
            println!("\n【汇总报告】");
            println!("  状态: {}", summary.state);
            println!(
                "  成功 {} / 失败 {} / 取消 {}（预期 {}）",
                summary.success_total,
                summary.failure_total,
                summary.aborted_total,
                summary.expected_total
            );
            println!("  成功率: {:.1}%", summary.success_rate() * 100.0);
            for report in &summary.per_terminal {
                println!(
                    "  终端 {}: 成功 {} / 失败 {} / 取消 {}",
                    report.terminal_id, report.success, report.failure, report.aborted
                );
            }
        }
        Err(e) => {
            println!("❌ 同步失败: {}", e);
        }
    }

    event_task.abort();
    Ok(())
}
