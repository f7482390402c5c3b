//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载“校验 → 解码 → 分割 → 打包 → 下载”链路中的所有错误，
//! 调用侧可以按分支匹配，而不是比较字符串。
//!
//! ## 实现思路
//!
//! - `Display` 只输出简短、可直接展示给用户的本地化提示。
//! - 底层原因（解码器、压缩包、文件系统报错）保存在 `detail` 中，
//!   通过 [`SplitterError::diagnostic`] 获取，供诊断界面使用。
//! - `code()` / `stage()` 给出稳定的机器可读标识。

use super::format::SUPPORTED_MIME_LIST;

/// 图片分割统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum SplitterError {
    #[error("请选择一个文件")]
    NoFileSelected,

    #[error("不支持的文件格式。支持的格式：{}", SUPPORTED_MIME_LIST.as_str())]
    UnsupportedFormat { declared: String },

    #[error("文件大小超过限制（{:.1}MB）", mebibytes(.limit))]
    FileTooLarge { size: u64, limit: u64 },

    #[error("无法加载图片")]
    Decode { detail: String },

    #[error("无法创建Canvas上下文")]
    CanvasUnavailable { detail: String },

    #[error("{message}")]
    Encode { message: &'static str, detail: String },

    #[error("生成压缩包失败")]
    ArchiveBuild { detail: String },

    #[error("{message}")]
    Download { message: String, detail: String },

    #[error("配置无效：{0}")]
    InvalidConfig(String),

    /// 被新的提交或重置取代。会话不会把它当作失败展示。
    #[error("操作已取消")]
    Cancelled,
}

fn mebibytes(bytes: &u64) -> f64 {
    *bytes as f64 / 1024.0 / 1024.0
}

impl SplitterError {
    pub(crate) fn decode(detail: impl std::fmt::Display) -> Self {
        Self::Decode {
            detail: detail.to_string(),
        }
    }

    pub(crate) fn canvas(detail: impl std::fmt::Display) -> Self {
        Self::CanvasUnavailable {
            detail: detail.to_string(),
        }
    }

    /// 分割阶段的编码失败。
    pub(crate) fn encode(detail: impl std::fmt::Display) -> Self {
        Self::Encode {
            message: "无法创建图片Blob",
            detail: detail.to_string(),
        }
    }

    /// 下载前格式转换失败。
    pub(crate) fn conversion(detail: impl std::fmt::Display) -> Self {
        Self::Encode {
            message: "图片格式转换失败",
            detail: detail.to_string(),
        }
    }

    /// 上传前压缩失败。
    pub(crate) fn compression(detail: impl std::fmt::Display) -> Self {
        Self::Encode {
            message: "无法压缩图片",
            detail: detail.to_string(),
        }
    }

    pub(crate) fn archive(detail: impl std::fmt::Display) -> Self {
        Self::ArchiveBuild {
            detail: detail.to_string(),
        }
    }

    pub(crate) fn download(message: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::Download {
            message: message.into(),
            detail: detail.to_string(),
        }
    }

    /// 稳定错误码，供前端或日志检索。
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoFileSelected => "E_NO_FILE",
            Self::UnsupportedFormat { .. } => "E_UNSUPPORTED_FORMAT",
            Self::FileTooLarge { .. } => "E_FILE_TOO_LARGE",
            Self::Decode { .. } => "E_DECODE",
            Self::CanvasUnavailable { .. } => "E_CANVAS_UNAVAILABLE",
            Self::Encode { .. } => "E_ENCODE",
            Self::ArchiveBuild { .. } => "E_ARCHIVE",
            Self::Download { .. } => "E_DOWNLOAD",
            Self::InvalidConfig(_) => "E_CONFIG",
            Self::Cancelled => "E_CANCELLED",
        }
    }

    /// 错误发生的链路阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::NoFileSelected | Self::UnsupportedFormat { .. } | Self::FileTooLarge { .. } => {
                "validate"
            }
            Self::Decode { .. } => "decode",
            Self::CanvasUnavailable { .. } => "split",
            Self::Encode { .. } | Self::ArchiveBuild { .. } => "package",
            Self::Download { .. } => "download",
            Self::InvalidConfig(_) => "config",
            Self::Cancelled => "cancel",
        }
    }

    /// 是否为校验阶段错误（发生在任何资源分配之前）。
    pub fn is_validation(&self) -> bool {
        self.stage() == "validate"
    }

    /// 完整诊断信息：用户提示 + 底层原因。
    ///
    /// # 示例
    /// ```rust
    /// use image_splitter::splitter::SplitterError;
    ///
    /// let err = SplitterError::NoFileSelected;
    /// assert_eq!(err.diagnostic(), "[E_NO_FILE] 请选择一个文件");
    /// ```
    pub fn diagnostic(&self) -> String {
        match self {
            Self::UnsupportedFormat { declared } => {
                format!("[{}] {}（收到：{}）", self.code(), self, declared)
            }
            Self::FileTooLarge { size, .. } => {
                format!("[{}] {}（实际：{} 字节）", self.code(), self, size)
            }
            Self::Decode { detail }
            | Self::CanvasUnavailable { detail }
            | Self::Encode { detail, .. }
            | Self::ArchiveBuild { detail }
            | Self::Download { detail, .. } => {
                format!("[{}] {}：{}", self.code(), self, detail)
            }
            _ => format!("[{}] {}", self.code(), self),
        }
    }
}

impl From<SplitterError> for String {
    fn from(error: SplitterError) -> Self {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_lists_every_mime() {
        let message = SplitterError::UnsupportedFormat {
            declared: "text/plain".to_string(),
        }
        .to_string();

        assert!(message.starts_with("不支持的文件格式"));
        for mime in ["image/jpeg", "image/png", "image/gif", "image/webp"] {
            assert!(message.contains(mime), "missing {mime} in {message}");
        }
    }

    #[test]
    fn file_too_large_reports_ceiling_in_mib() {
        let err = SplitterError::FileTooLarge {
            size: 10 * 1024 * 1024 + 1,
            limit: 10 * 1024 * 1024,
        };
        assert_eq!(err.to_string(), "文件大小超过限制（10.0MB）");
        assert!(err.is_validation());
    }

    #[test]
    fn display_hides_detail_but_diagnostic_keeps_it() {
        let err = SplitterError::decode("invalid PNG signature");
        assert_eq!(err.to_string(), "无法加载图片");
        assert!(err.diagnostic().contains("invalid PNG signature"));
        assert_eq!(err.code(), "E_DECODE");
        assert_eq!(err.stage(), "decode");
    }
}
