//! 桥接服务客户端 - 指纹终端的唯一远程边界
//!
//! 本模块封装对本地硬件桥接服务的两个远程调用：
//! - 目录查询：列出当前已知的考勤终端及其可达状态
//! - 记录下发：把一条员工指纹记录推送到指定终端
//!
//! 实际的采集、模板比对、终端连通性都由桥接服务实现，SDK 不拥有任何协议。

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::directory::TerminalInfo;
use crate::error::{BioSyncError, Result};

/// 单条记录下发的响应：`{success, message}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// 记录下发请求体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRecordRequest {
    pub record_id: String,
}

/// 桥接服务 HTTP 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// 桥接服务地址（本地指纹服务，如 http://127.0.0.1:8998）
    pub base_url: String,
    /// 连接超时（秒）
    pub connect_timeout_secs: Option<u64>,
    /// 请求超时（秒）
    pub request_timeout_secs: Option<u64>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8998".to_string(),
            connect_timeout_secs: Some(5),
            request_timeout_secs: Some(30),
        }
    }
}

/// 桥接服务调用接口（由 HTTP 实现，测试中可替换为 mock）
#[async_trait]
pub trait BridgeRpc: Send + Sync + std::fmt::Debug {
    /// 目录查询：返回当前已知终端列表（含可达状态与延迟）
    async fn list_terminals(&self) -> Result<Vec<TerminalInfo>>;

    /// 把一条记录下发到一台终端
    async fn push_record(&self, terminal: &TerminalInfo, record_id: &str) -> Result<PushResponse>;
}

/// 桥接服务 HTTP 客户端
#[derive(Debug)]
pub struct HttpBridgeClient {
    client: Client,
    base_url: String,
}

impl HttpBridgeClient {
    /// 创建新的桥接客户端
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        let mut builder = Client::builder();

        if let Some(timeout) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(timeout));
        }

        if let Some(timeout) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|e| BioSyncError::Other(format!("创建 HTTP 客户端失败: {}", e)))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        info!("✅ 桥接客户端已创建 (base_url: {})", base_url);

        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl BridgeRpc for HttpBridgeClient {
    async fn list_terminals(&self) -> Result<Vec<TerminalInfo>> {
        let url = format!("{}/api/terminals", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BioSyncError::Transport(format!("目录查询失败: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误信息".to_string());
            error!("❌ 目录查询失败，HTTP 状态码: {}, 错误: {}", status, error_text);
            return Err(BioSyncError::Bridge {
                code: status.as_u16() as u32,
                message: error_text,
            });
        }

        let terminals: Vec<TerminalInfo> = response
            .json()
            .await
            .map_err(|e| BioSyncError::Serialization(format!("解析目录响应失败: {}", e)))?;

        info!("🔍 目录查询完成，共 {} 台终端", terminals.len());
        Ok(terminals)
    }

    async fn push_record(&self, terminal: &TerminalInfo, record_id: &str) -> Result<PushResponse> {
        let url = format!("{}/api/terminals/{}/push", self.base_url, terminal.id);
        let request = PushRecordRequest {
            record_id: record_id.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BioSyncError::Transport(format!("记录下发失败: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误信息".to_string());
            error!(
                "❌ 记录下发失败，终端: {}, HTTP 状态码: {}, 错误: {}",
                terminal.id, status, error_text
            );
            return Err(BioSyncError::Bridge {
                code: status.as_u16() as u32,
                message: error_text,
            });
        }

        let result: PushResponse = response
            .json()
            .await
            .map_err(|e| BioSyncError::Serialization(format!("解析下发响应失败: {}", e)))?;

        Ok(result)
    }
}

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::directory::TerminalStatus;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tokio::time::sleep;

    /// 测试用：可编排的桥接服务 mock
    ///
    /// 记录每次 push 的开始顺序，可配置目录错误、单条记录失败、
    /// 以及每次 push 的人为延迟（用于取消语义测试）。
    #[derive(Debug, Default)]
    pub struct MockBridge {
        terminals: Vec<TerminalInfo>,
        directory_error: Option<String>,
        failing_records: HashSet<String>,
        push_delay: Option<Duration>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl MockBridge {
        pub fn new(terminals: Vec<TerminalInfo>) -> Self {
            Self {
                terminals,
                ..Default::default()
            }
        }

        pub fn with_directory_error(mut self, message: &str) -> Self {
            self.directory_error = Some(message.to_string());
            self
        }

        pub fn with_failing_record(mut self, record_id: &str) -> Self {
            self.failing_records.insert(record_id.to_string());
            self
        }

        pub fn with_push_delay(mut self, delay: Duration) -> Self {
            self.push_delay = Some(delay);
            self
        }

        /// 已发起的 push 调用，按开始顺序排列：(terminal_id, record_id)
        pub fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }

        pub fn online(id: &str) -> TerminalInfo {
            TerminalInfo {
                id: id.to_string(),
                address: format!("192.168.1.{}:4370", id.len()),
                status: TerminalStatus::Online,
                latency_ms: Some(12),
            }
        }

        pub fn offline(id: &str) -> TerminalInfo {
            TerminalInfo {
                id: id.to_string(),
                address: format!("192.168.1.{}:4370", id.len()),
                status: TerminalStatus::Offline,
                latency_ms: None,
            }
        }
    }

    #[async_trait]
    impl BridgeRpc for MockBridge {
        async fn list_terminals(&self) -> Result<Vec<TerminalInfo>> {
            if let Some(message) = &self.directory_error {
                return Err(BioSyncError::Transport(message.clone()));
            }
            Ok(self.terminals.clone())
        }

        async fn push_record(
            &self,
            terminal: &TerminalInfo,
            record_id: &str,
        ) -> Result<PushResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((terminal.id.clone(), record_id.to_string()));

            if let Some(delay) = self.push_delay {
                sleep(delay).await;
            }

            if self.failing_records.contains(record_id) {
                return Ok(PushResponse {
                    success: false,
                    message: format!("terminal {} rejected record {}", terminal.id, record_id),
                });
            }

            Ok(PushResponse {
                success: true,
                message: "ok".to_string(),
            })
        }
    }
}
