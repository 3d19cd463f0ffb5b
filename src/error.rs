use std::path::{Path, PathBuf};

use thiserror::Error;

/// 文件访问模式（读取 / 读写）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "read",
            AccessMode::ReadWrite => "readwrite",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("IO 错误: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON 解析错误: {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON 序列化失败: {source}")]
    JsonSerialize {
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("请求失败: {0}")]
    Request(String),

    #[error("没有 {} 权限: {path}", .mode.as_str())]
    PermissionDenied { path: String, mode: AccessMode },

    #[error("设置文件无效: {path}: {reason}")]
    InvalidSettingsFile { path: String, reason: String },

    #[error("{0}")]
    Message(String),
}

impl AppError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn json(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn permission_denied(path: impl Into<PathBuf>, mode: AccessMode) -> Self {
        Self::PermissionDenied {
            path: path.into().display().to_string(),
            mode,
        }
    }

    /// 把 reqwest 错误归类为用户可读的请求错误
    pub fn from_request(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Request("Request timeout".to_string())
        } else if e.is_connect() {
            AppError::Request(format!("Connection failed: {e}"))
        } else {
            AppError::Request(e.to_string())
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::from_request(e)
    }
}

/// 无法得到具体错误文本时展示的兜底信息
pub const GENERIC_ERROR_MESSAGE: &str = "Unknown error";

/// 将错误转换为可直接展示给用户的文本
///
/// `Message` 直接使用原文；其余变体使用 Display；空文本回落到通用提示。
pub fn error_message(err: &AppError) -> String {
    let text = match err {
        AppError::Message(msg) => msg.trim().to_string(),
        other => other.to_string().trim().to_string(),
    };
    if text.is_empty() {
        GENERIC_ERROR_MESSAGE.to_string()
    } else {
        text
    }
}
