//! # 图片格式模块
//!
//! ## 设计思路
//!
//! 支持的格式是一个很小的封闭集合，用枚举表达并在解码、分割、打包中穷举匹配，
//! 避免到处比较 MIME 字符串。
//!
//! - `SupportedFormat`：允许上传、也是分割输出沿用的源格式
//! - `OutputFormat`：下载时的目标格式（保持原样 / PNG / JPEG）

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// 允许上传的图片格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportedFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

/// 支持列表（顺序即错误提示中的展示顺序）。
pub const SUPPORTED_FORMATS: [SupportedFormat; 4] = [
    SupportedFormat::Jpeg,
    SupportedFormat::Png,
    SupportedFormat::Gif,
    SupportedFormat::WebP,
];

/// `image/jpeg, image/png, image/gif, image/webp`
pub static SUPPORTED_MIME_LIST: Lazy<String> = Lazy::new(|| {
    SUPPORTED_FORMATS
        .iter()
        .map(|format| format.mime())
        .collect::<Vec<_>>()
        .join(", ")
});

impl SupportedFormat {
    /// 按声明的 MIME 类型精确匹配，不做内容嗅探。
    ///
    /// # 示例
    /// ```rust
    /// use image_splitter::splitter::SupportedFormat;
    ///
    /// assert_eq!(SupportedFormat::from_mime("image/png"), Some(SupportedFormat::Png));
    /// assert_eq!(SupportedFormat::from_mime("image/bmp"), None);
    /// ```
    pub fn from_mime(mime: &str) -> Option<Self> {
        SUPPORTED_FORMATS
            .into_iter()
            .find(|format| format.mime() == mime)
    }

    /// 按文件扩展名推断（不区分大小写，可带或不带前导点）。
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }

    /// 带前导点的标准扩展名。
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => ".jpg",
            Self::Png => ".png",
            Self::Gif => ".gif",
            Self::WebP => ".webp",
        }
    }

    /// 该格式的编码器是否接受质量参数。
    ///
    /// WebP 编码器只提供无损模式，因此和 PNG / GIF 一样忽略质量。
    pub fn supports_quality(self) -> bool {
        matches!(self, Self::Jpeg)
    }
}

impl fmt::Display for SupportedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// 下载时的目标格式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 按分割结果原样输出。
    #[default]
    Original,
    Png,
    Jpeg,
}

impl OutputFormat {
    /// 需要转换时返回目标格式；`Original` 返回 `None`。
    pub fn target(self) -> Option<SupportedFormat> {
        match self {
            Self::Original => None,
            Self::Png => Some(SupportedFormat::Png),
            Self::Jpeg => Some(SupportedFormat::Jpeg),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "original" => Ok(Self::Original),
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            other => Err(format!(
                "未知输出格式：{}（可选：original / png / jpeg）",
                other
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
