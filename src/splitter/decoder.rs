//! # 原图解码
//!
//! ## 设计思路
//!
//! 解码探测与原图预览使用两个相互独立的临时 URL：
//! 探测句柄只在解码期间存在，拿到尺寸后立即回收（无论成功失败），
//! 原图句柄在解码成功后才签发，交给 `SourceImage` 持有。
//!
//! 格式取自文件声明的 MIME 类型，不做内容嗅探。

use std::time::Instant;

use image::GenericImageView;

use super::codec;
use super::resources::ObjectUrl;
use super::{ImageSplitter, SelectedFile, SourceImage, SplitterError, SupportedFormat};

impl ImageSplitter {
    /// 解码文件并获取原图信息。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_splitter::splitter::{ImageSplitter, SelectedFile, SplitterConfig};
    ///
    /// # async fn demo() -> Result<(), image_splitter::splitter::SplitterError> {
    /// let splitter = ImageSplitter::new(SplitterConfig::default())?;
    /// let file = SelectedFile::from_path("landscape.png").expect("read failed");
    /// let original = splitter.get_original_image_info(&file).await?;
    /// println!("{}x{}", original.width(), original.height());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_original_image_info(
        &self,
        file: &SelectedFile,
    ) -> Result<SourceImage, SplitterError> {
        let format = SupportedFormat::from_mime(file.mime_type()).ok_or_else(|| {
            SplitterError::UnsupportedFormat {
                declared: file.mime_type().to_string(),
            }
        })?;

        let decode_start = Instant::now();
        let probe = ObjectUrl::allocate(&self.tracker, file.bytes().clone(), format.mime());
        let decoded = codec::decode_blocking(file.bytes().clone()).await;
        probe.revoke();

        let (width, height) = decoded?.dimensions();
        let url = ObjectUrl::allocate(&self.tracker, file.bytes().clone(), format.mime());

        log::info!(
            "✅ 原图解码成功 - {} 尺寸: {}x{} 格式: {} 耗时: {}ms",
            file.name(),
            width,
            height,
            format,
            decode_start.elapsed().as_millis()
        );

        Ok(SourceImage::new(file.clone(), url, width, height, format))
    }
}
