//! # 上传前压缩
//!
//! ## 设计思路
//!
//! 超出 `max_width x max_height` 的图片按比例缩小到边界内，再按原格式重新编码，
//! 返回同名同类型的新文件；未超出时尺寸不变，只重新编码。
//!
//! ## 实现思路
//!
//! 1. `ratio = min(max_width / width, max_height / height)`，宽高向下取整且至少为 1
//! 2. 优先使用 `fast_image_resize` 降采样，失败时回退到 `image::resize_exact`
//! 3. 解码、缩放、编码整体放到阻塞线程池中执行

use std::time::Instant;

use fast_image_resize as fr;
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgba};

use super::codec;
use super::{ImageSplitter, ResizeFilter, SelectedFile, SplitterError, SupportedFormat};

/// 计算缩放后的尺寸；未超出边界时原样返回。
pub(crate) fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let ratio = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
    let target_width = ((width as f64 * ratio).floor() as u32).max(1);
    let target_height = ((height as f64 * ratio).floor() as u32).max(1);
    (target_width, target_height)
}

fn resize_with_fast_image_resize(
    image: &DynamicImage,
    target_width: u32,
    target_height: u32,
    filter: ResizeFilter,
) -> Result<DynamicImage, SplitterError> {
    let src = image.to_rgba8();
    let (src_width, src_height) = src.dimensions();

    let src_image = fr::images::Image::from_vec_u8(
        src_width,
        src_height,
        src.into_raw(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| SplitterError::compression(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(filter.to_fast_filter()));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| SplitterError::compression(format!("fast_image_resize 执行失败：{}", e)))?;

    let rgba = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(
        target_width,
        target_height,
        dst_image.into_vec(),
    )
    .ok_or_else(|| SplitterError::compression("fast_image_resize 输出缓冲长度异常"))?;

    Ok(DynamicImage::ImageRgba8(rgba))
}

fn resize(image: DynamicImage, target_width: u32, target_height: u32, filter: ResizeFilter) -> DynamicImage {
    if image.dimensions() == (target_width, target_height) {
        return image;
    }

    match resize_with_fast_image_resize(&image, target_width, target_height, filter) {
        Ok(resized) => resized,
        Err(err) => {
            log::warn!(
                "⚠️ fast_image_resize 降采样失败，回退 image::resize_exact：{}",
                err.diagnostic()
            );
            image.resize_exact(target_width, target_height, filter.to_image_filter())
        }
    }
}

impl ImageSplitter {
    /// 把图片缩小到边界内并按原格式重新编码。
    ///
    /// 参数缺省时使用配置中的 `max_width` / `max_height` / `quality`。
    pub async fn compress_image(
        &self,
        file: &SelectedFile,
        max_width: Option<u32>,
        max_height: Option<u32>,
        quality: Option<f32>,
    ) -> Result<SelectedFile, SplitterError> {
        let config = self.config_snapshot()?;
        let format = SupportedFormat::from_mime(file.mime_type()).ok_or_else(|| {
            SplitterError::UnsupportedFormat {
                declared: file.mime_type().to_string(),
            }
        })?;

        let max_width = max_width.unwrap_or(config.max_width).max(1);
        let max_height = max_height.unwrap_or(config.max_height).max(1);
        let quality = config.effective_quality(quality);
        let filter = config.resize_filter;
        let max_surface_pixels = config.max_surface_pixels;

        let started = Instant::now();
        let bytes = file.bytes().clone();

        let (encoded, before, after) = tokio::task::spawn_blocking(move || {
            let raster = codec::decode_raster(&bytes)?;
            let (width, height) = raster.dimensions();
            if width as u64 * height as u64 > max_surface_pixels {
                return Err(SplitterError::canvas(format!(
                    "画布过大：{}x{}（限制：{} 像素）",
                    width, height, max_surface_pixels
                )));
            }

            let (target_width, target_height) = fit_within(width, height, max_width, max_height);
            let resized = resize(raster, target_width, target_height, filter);
            let encoded = codec::encode_raster(&resized, format, quality)
                .map_err(|e| SplitterError::compression(e.diagnostic()))?;
            Ok((encoded, (width, height), (target_width, target_height)))
        })
        .await
        .map_err(|e| SplitterError::compression(format!("压缩任务异常终止：{}", e)))??;

        log::info!(
            "🗜️ 压缩完成 - {} {}x{} -> {}x{} ({} -> {} 字节) 耗时: {}ms",
            file.name(),
            before.0,
            before.1,
            after.0,
            after.1,
            file.size(),
            encoded.len(),
            started.elapsed().as_millis()
        );

        Ok(SelectedFile::new(file.name(), file.mime_type(), encoded))
    }
}
