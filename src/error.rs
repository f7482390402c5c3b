//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义应用级的 `AppError` 枚举，命令行入口与任何 IPC 风格的调用方
//! 统一返回 `Result<T, AppError>`，不再各自 `.map_err(|e| e.to_string())`。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `SplitterError`、会话返回的 `Arc<SplitterError>`、`io::Error` 提供 `From` 转换。
//! - 实现 `Serialize` 将错误序列化为字符串，前端可直接展示。

use std::sync::Arc;

use serde::Serialize;

use crate::splitter::SplitterError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 分割流水线错误（校验 / 解码 / 分割 / 打包 / 下载）
    #[error("{0}")]
    Splitter(#[from] SplitterError),

    /// 会话中记录的错误（与会话状态共享同一份）
    #[error("{0}")]
    Session(Arc<SplitterError>),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 命令行参数无效
    #[error("参数无效: {0}")]
    InvalidArgument(String),
}

impl From<Arc<SplitterError>> for AppError {
    fn from(error: Arc<SplitterError>) -> Self {
        Self::Session(error)
    }
}

impl AppError {
    /// 完整诊断信息，分割错误附带底层原因。
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Splitter(err) => err.diagnostic(),
            Self::Session(err) => err.diagnostic(),
            other => other.to_string(),
        }
    }
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
