//! # 三等分流水线
//!
//! ## 设计思路
//!
//! 将原图横向切成三条等宽竖条，每条都按源格式、固定质量重新编码为独立图片。
//! 先申请画布再绘制，超出画布上限时直接失败，不做重试。
//!
//! ## 实现思路
//!
//! 1. 重新解码源文件得到可绘制的光栅图像
//! 2. `strip_width = floor(width / 3)`，不能整除的余数从右边缘丢弃
//! 3. 第 `i` 条复制源区域 `[i * strip_width, 0, strip_width, height]` 到新画布原点
//! 4. 三条编码并行提交，按从左到右的顺序收集结果
//! 5. 生成 `split-{n}` 标识、临时 URL 与 `{name}_part_{n}{ext}` 文件名
//!
//! 源宽度小于 3 时 `strip_width` 为 0，产出宽度为 0、字节为空的退化分割，
//! 这是可接受的行为，不报错。

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use image::DynamicImage;

use super::codec;
use super::resources::ObjectUrl;
use super::{
    ImageSplitter, SourceImage, SplitterConfig, SplitterError, StripImage, SupportedFormat,
};

/// 固定分割数量。
pub const STRIP_COUNT: u32 = 3;

/// 单条宽度：`floor(width / 3)`。
pub fn strip_width(source_width: u32) -> u32 {
    source_width / STRIP_COUNT
}

/// 生成分割图文件名：在原扩展名前插入 `_part_{index}`。
///
/// 没有扩展名（或只有前导点）时默认使用 `.png`。
///
/// # 示例
/// ```rust
/// use image_splitter::splitter::generate_split_filename;
///
/// assert_eq!(generate_split_filename("photo.jpg", 1), "photo_part_1.jpg");
/// assert_eq!(generate_split_filename("photo", 1), "photo_part_1.png");
/// assert_eq!(generate_split_filename("a.b.c.jpg", 2), "a.b.c_part_2.jpg");
/// ```
pub fn generate_split_filename(original_filename: &str, index: u32) -> String {
    let (name, extension) = match original_filename.rfind('.') {
        Some(pos) if pos > 0 => original_filename.split_at(pos),
        _ => (original_filename, ".png"),
    };
    format!("{}_part_{}{}", name, index, extension)
}

/// 校验能否为 `width x height` 申请绘制画布。
fn acquire_surface(width: u32, height: u32, config: &SplitterConfig) -> Result<(), SplitterError> {
    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| SplitterError::canvas("画布像素数溢出"))?;

    pixels
        .checked_mul(4)
        .and_then(|bytes| usize::try_from(bytes).ok())
        .ok_or_else(|| SplitterError::canvas("画布内存估算溢出"))?;

    if pixels > config.max_surface_pixels {
        return Err(SplitterError::canvas(format!(
            "画布过大：{} 像素（限制：{} 像素）",
            pixels, config.max_surface_pixels
        )));
    }

    Ok(())
}

/// 把源区域绘制到新画布并编码。
fn render_strip(
    raster: &DynamicImage,
    ordinal: u32,
    width: u32,
    height: u32,
    format: SupportedFormat,
    quality: f32,
) -> Result<Bytes, SplitterError> {
    if width == 0 {
        return Ok(Bytes::new());
    }

    let region = raster.crop_imm(ordinal * width, 0, width, height);
    codec::encode_raster(&region, format, quality)
}

impl ImageSplitter {
    /// 将原图横向三等分。
    ///
    /// 返回恰好三张分割图，顺序为从左到右。
    pub async fn split_image_horizontally(
        &self,
        original: &SourceImage,
    ) -> Result<Vec<StripImage>, SplitterError> {
        let config = self.config_snapshot()?;
        let split_start = Instant::now();

        let (width, height) = (original.width(), original.height());
        acquire_surface(width, height, &config)?;

        let bytes = original.file().bytes().clone();
        let probe = ObjectUrl::allocate(&self.tracker, bytes.clone(), original.format().mime());
        let decoded = codec::decode_blocking(bytes).await;
        probe.revoke();
        let raster = Arc::new(decoded?);

        let strip_width = strip_width(width);
        let format = original.format();
        let quality = config.quality;

        if strip_width == 0 {
            log::warn!(
                "⚠️ 源图宽度 {} 不足 {} 像素，将产出宽度为 0 的分割图",
                width,
                STRIP_COUNT
            );
        }

        let jobs: Vec<_> = (0..STRIP_COUNT)
            .map(|ordinal| {
                let raster = Arc::clone(&raster);
                tokio::task::spawn_blocking(move || {
                    render_strip(&raster, ordinal, strip_width, height, format, quality)
                })
            })
            .collect();

        let mut strips = Vec::with_capacity(STRIP_COUNT as usize);
        for (ordinal, job) in (0..STRIP_COUNT).zip(jobs) {
            let payload = job
                .await
                .map_err(|e| SplitterError::encode(format!("编码任务异常终止：{}", e)))??;

            let index = ordinal + 1;
            let url = ObjectUrl::allocate(&self.tracker, payload.clone(), format.mime());
            strips.push(StripImage::new(
                index as u8,
                payload,
                url,
                strip_width,
                height,
                generate_split_filename(original.file().name(), index),
                format,
            ));
        }

        log::info!(
            "✂️ 分割完成 - {} -> {} 张 {}x{} 耗时: {}ms",
            original.file().name(),
            strips.len(),
            strip_width,
            height,
            split_start.elapsed().as_millis()
        );

        Ok(strips)
    }
}
