//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ImageSplitter` 是对展示层暴露的进程内接口，不与任何界面框架绑定：
//! 1. 校验文件
//! 2. 解码原图信息
//! 3. 三等分
//! 4. 按需打包 / 下载
//!
//! 各阶段的实现分散在 `decoder` / `slicing` / `packager` / `download` / `compress`
//! 中，以 `impl ImageSplitter` 的形式挂在同一个类型上。
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<SplitterConfig>>` 支持运行时调整。
//! - 单次调用内使用同一份配置快照，避免处理中途配置漂移。
//! - 临时 URL 统一经由注入的 `UrlTracker` 签发，便于测试观察回收情况。

use std::sync::{Arc, RwLock};

use super::resources::{ObjectUrlRegistry, UrlTracker};
use super::validator::{self, ValidationResult};
use super::{SelectedFile, SplitterConfig, SplitterError};

/// 图片分割器。
pub struct ImageSplitter {
    pub(super) config: Arc<RwLock<SplitterConfig>>,
    pub(super) tracker: Arc<dyn UrlTracker>,
}

impl ImageSplitter {
    /// 使用默认的内存 URL 表创建分割器。
    ///
    /// # 示例
    /// ```rust
    /// use image_splitter::splitter::{ImageSplitter, SplitterConfig};
    ///
    /// let splitter = ImageSplitter::new(SplitterConfig::default())?;
    /// # Ok::<(), image_splitter::splitter::SplitterError>(())
    /// ```
    pub fn new(config: SplitterConfig) -> Result<Self, SplitterError> {
        Self::with_tracker(config, Arc::new(ObjectUrlRegistry::new()))
    }

    /// 注入自定义的 URL 设施。
    ///
    /// 测试中通常传入 `Arc<ObjectUrlRegistry>` 的克隆，以便读取签发/回收计数。
    pub fn with_tracker(
        config: SplitterConfig,
        tracker: Arc<dyn UrlTracker>,
    ) -> Result<Self, SplitterError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            tracker,
        })
    }

    pub fn tracker(&self) -> Arc<dyn UrlTracker> {
        Arc::clone(&self.tracker)
    }

    /// 获取配置快照。
    pub fn config_snapshot(&self) -> Result<SplitterConfig, SplitterError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| SplitterError::InvalidConfig("配置读取锁已中毒".to_string()))
    }

    /// 校验后替换配置。
    pub fn update_config(&self, config: SplitterConfig) -> Result<(), SplitterError> {
        config.validate()?;
        let mut current = self
            .config
            .write()
            .map_err(|_| SplitterError::InvalidConfig("配置写入锁已中毒".to_string()))?;

        log::info!(
            "⚙️ 已更新分割配置（max_file_size={}, quality={}, max_surface_pixels={}）",
            config.max_file_size,
            config.quality,
            config.max_surface_pixels
        );
        *current = config;
        Ok(())
    }

    /// 校验文件，返回类型化错误。
    pub fn check_image_file<'a>(
        &self,
        file: Option<&'a SelectedFile>,
    ) -> Result<&'a SelectedFile, SplitterError> {
        let config = self.config_snapshot()?;
        validator::check_image_file(file, &config)
    }

    /// 校验文件，返回 `{ valid, error? }`。
    pub fn validate_image_file(&self, file: Option<&SelectedFile>) -> ValidationResult {
        match self.config_snapshot() {
            Ok(config) => validator::validate_image_file(file, &config),
            Err(err) => ValidationResult {
                valid: false,
                error: Some(err.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_initial_config() {
        let mut config = SplitterConfig::default();
        config.max_surface_pixels = 0;
        assert!(matches!(
            ImageSplitter::new(config),
            Err(SplitterError::InvalidConfig(_))
        ));
    }

    #[test]
    fn update_config_applies_to_following_validations() {
        let splitter = ImageSplitter::new(SplitterConfig::default()).expect("splitter init failed");
        let file = SelectedFile::new("a.png", "image/png", vec![0u8; 2048]);
        assert!(splitter.validate_image_file(Some(&file)).valid);

        let mut config = SplitterConfig::default();
        config.max_file_size = 1024;
        splitter.update_config(config).expect("update should succeed");

        let result = splitter.validate_image_file(Some(&file));
        assert!(!result.valid);
        assert_eq!(result.error.as_deref(), Some("文件大小超过限制（0.0MB）"));
    }

    #[test]
    fn update_config_keeps_previous_value_on_rejection() {
        let splitter = ImageSplitter::new(SplitterConfig::default()).expect("splitter init failed");
        let mut config = SplitterConfig::default();
        config.quality = 3.0;

        assert!(splitter.update_config(config).is_err());
        assert_eq!(
            splitter.config_snapshot().expect("snapshot failed"),
            SplitterConfig::default()
        );
    }
}
