use std::fmt;

#[derive(Debug)]
pub enum BioSyncError {
    /// 目录解析失败（远程查询出错或没有可用终端）
    Directory(String),
    /// 传输层错误（HTTP 请求失败等）
    Transport(String),
    /// 操作超时
    Timeout(String),
    /// 序列化/反序列化错误
    Serialization(String),
    /// 无效输入
    InvalidInput(String),
    /// 无效操作（如会话状态不允许）
    InvalidOperation(String),
    /// 其他错误
    Other(String),
    // 桥接服务错误 - 带 HTTP 状态码
    Bridge {
        code: u32,
        message: String,
    },
}

impl fmt::Display for BioSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BioSyncError::Directory(e) => write!(f, "Directory error: {}", e),
            BioSyncError::Transport(e) => write!(f, "Transport error: {}", e),
            BioSyncError::Timeout(e) => write!(f, "Timeout: {}", e),
            BioSyncError::Serialization(e) => write!(f, "Serialization error: {}", e),
            BioSyncError::InvalidInput(e) => write!(f, "Invalid input: {}", e),
            BioSyncError::InvalidOperation(e) => write!(f, "Invalid operation: {}", e),
            BioSyncError::Other(e) => write!(f, "Other error: {}", e),
            BioSyncError::Bridge { code, message } => {
                write!(f, "Bridge error [{}]: {}", code, message)
            }
        }
    }
}

impl std::error::Error for BioSyncError {}

impl From<reqwest::Error> for BioSyncError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            BioSyncError::Timeout(error.to_string())
        } else {
            BioSyncError::Transport(error.to_string())
        }
    }
}

impl From<serde_json::Error> for BioSyncError {
    fn from(error: serde_json::Error) -> Self {
        BioSyncError::Serialization(error.to_string())
    }
}

impl BioSyncError {
    /// 获取桥接服务返回的状态码（如果这是一个桥接错误）
    pub fn bridge_code(&self) -> Option<u32> {
        match self {
            BioSyncError::Bridge { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// 判断是否是目录解析错误
    pub fn is_directory_error(&self) -> bool {
        matches!(self, BioSyncError::Directory(_))
    }
}

pub type Result<T> = std::result::Result<T, BioSyncError>;
