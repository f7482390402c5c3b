//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `SplitterConfig`，保证运行时行为可观测、可调整、可测试。
//!
//! ## 实现思路
//!
//! - `Default` 提供与网页版一致的默认值（10MB 上限、0.9 质量、4000px 压缩边界）。
//! - 支持从 JSON 文件加载，缺失字段回落到默认值。
//! - `validate` 在配置生效前统一做范围检查。

use std::path::Path;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use super::SplitterError;

/// 默认上传体积上限：10MB。
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
/// 分割编码与格式转换的默认质量。
pub const DEFAULT_QUALITY: f32 = 0.9;

/// 图片分割配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    /// 上传文件允许的最大体积（字节）。
    pub max_file_size: u64,
    /// 编码质量（0~1），仅对有损格式生效。
    pub quality: f32,
    /// 压缩时允许的最大宽度。
    pub max_width: u32,
    /// 压缩时允许的最大高度。
    pub max_height: u32,
    /// 可申请的最大绘制画布像素数（`width * height`）。
    ///
    /// 超出时视为画布不可用。
    pub max_surface_pixels: u64,
    /// 压缩时使用的缩放滤镜。
    pub resize_filter: ResizeFilter,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            quality: DEFAULT_QUALITY,
            max_width: 4000,
            max_height: 4000,
            max_surface_pixels: 40_000_000,
            resize_filter: ResizeFilter::Triangle,
        }
    }
}

/// 缩放滤镜（可序列化版本的 `FilterType`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl ResizeFilter {
    pub(crate) fn to_image_filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }

    pub(crate) fn to_fast_filter(self) -> fast_image_resize::FilterType {
        match self {
            Self::Nearest => fast_image_resize::FilterType::Box,
            Self::Triangle => fast_image_resize::FilterType::Bilinear,
            Self::CatmullRom => fast_image_resize::FilterType::CatmullRom,
            Self::Gaussian => fast_image_resize::FilterType::Mitchell,
            Self::Lanczos3 => fast_image_resize::FilterType::Lanczos3,
        }
    }
}

impl SplitterConfig {
    /// 从 JSON 文件加载配置并校验。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_splitter::splitter::SplitterConfig;
    ///
    /// let config = SplitterConfig::load_from_file("splitter.json")?;
    /// # Ok::<(), image_splitter::splitter::SplitterError>(())
    /// ```
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SplitterError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SplitterError::InvalidConfig(format!("无法读取配置文件 '{}'：{}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| SplitterError::InvalidConfig(format!("解析配置文件失败：{}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 检查各字段范围。
    pub fn validate(&self) -> Result<(), SplitterError> {
        if self.max_file_size == 0 {
            return Err(SplitterError::InvalidConfig("max_file_size 不能为 0".to_string()));
        }
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(SplitterError::InvalidConfig(format!(
                "quality 必须在 (0, 1] 之间，当前：{}",
                self.quality
            )));
        }
        if self.max_width == 0 || self.max_height == 0 {
            return Err(SplitterError::InvalidConfig(
                "max_width / max_height 不能为 0".to_string(),
            ));
        }
        if self.max_surface_pixels == 0 {
            return Err(SplitterError::InvalidConfig(
                "max_surface_pixels 不能为 0".to_string(),
            ));
        }
        Ok(())
    }

    /// 归一化调用方传入的质量：超出 0~1 时回落到配置值。
    pub(crate) fn effective_quality(&self, requested: Option<f32>) -> f32 {
        match requested {
            Some(quality) if (0.0..=1.0).contains(&quality) => quality,
            Some(quality) => {
                log::warn!("⚠️ 忽略超出范围的质量参数：{}，使用 {}", quality, self.quality);
                self.quality
            }
            None => self.quality,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_matches_upload_limits() {
        let config = SplitterConfig::default();
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.quality, 0.9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_quality() {
        let mut config = SplitterConfig::default();
        config.quality = 0.0;
        assert!(matches!(config.validate(), Err(SplitterError::InvalidConfig(_))));

        config.quality = 1.5;
        assert!(matches!(config.validate(), Err(SplitterError::InvalidConfig(_))));
    }

    #[test]
    fn effective_quality_falls_back_for_invalid_requests() {
        let config = SplitterConfig::default();
        assert_eq!(config.effective_quality(Some(0.5)), 0.5);
        assert_eq!(config.effective_quality(Some(2.0)), 0.9);
        assert_eq!(config.effective_quality(None), 0.9);
    }

    #[test]
    fn load_from_file_fills_missing_fields_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file failed");
        write!(file, r#"{{ "quality": 0.75, "resize_filter": "lanczos3" }}"#)
            .expect("write config failed");

        let config = SplitterConfig::load_from_file(file.path()).expect("load config failed");
        assert_eq!(config.quality, 0.75);
        assert_eq!(config.resize_filter, ResizeFilter::Lanczos3);
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
    }

    #[test]
    fn load_from_file_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file failed");
        write!(file, r#"{{ "max_file_size": 0 }}"#).expect("write config failed");

        let result = SplitterConfig::load_from_file(file.path());
        assert!(matches!(result, Err(SplitterError::InvalidConfig(_))));
    }
}
