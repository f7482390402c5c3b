//! # 编解码辅助
//!
//! ## 设计思路
//!
//! 解码与编码都是 CPU 密集操作，放到 `spawn_blocking` 中执行；
//! 每次 `await` 就是流水线的一个挂起点。
//!
//! ## 实现思路
//!
//! 1. 解码：按内容猜测格式完整解码，与浏览器加载图片的行为一致
//! 2. 编码：按目标格式选择编码器，JPEG 需要先把透明像素铺到白底上
//! 3. 编码结果为空视为失败

use bytes::Bytes;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, Frame, Rgb, RgbImage};

use super::{SplitterError, SupportedFormat};

/// 完整解码为可绘制的光栅图像。
pub(crate) fn decode_raster(bytes: &[u8]) -> Result<DynamicImage, SplitterError> {
    image::load_from_memory(bytes).map_err(|e| SplitterError::decode(format!("图片解码失败：{}", e)))
}

/// 在阻塞线程池中解码。
pub(crate) async fn decode_blocking(bytes: Bytes) -> Result<DynamicImage, SplitterError> {
    tokio::task::spawn_blocking(move || decode_raster(&bytes))
        .await
        .map_err(|e| SplitterError::decode(format!("解码任务异常终止：{}", e)))?
}

/// 0~1 的质量映射到 JPEG 编码器的 1~100。
pub(crate) fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// 把带透明通道的图像铺到白色背景上。
pub(crate) fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u32;
        let blend = |channel: u8| ((channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// 按目标格式编码。
///
/// `quality` 只对 JPEG 生效，其余格式忽略。
pub(crate) fn encode_raster(
    image: &DynamicImage,
    format: SupportedFormat,
    quality: f32,
) -> Result<Bytes, SplitterError> {
    let mut buffer = Vec::new();

    let result = match format {
        SupportedFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality(quality));
            flatten_onto_white(image).write_with_encoder(encoder)
        }
        SupportedFormat::Png => {
            let encoder = PngEncoder::new(&mut buffer);
            match image {
                DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                    image.to_rgba8().write_with_encoder(encoder)
                }
                _ => image.write_with_encoder(encoder),
            }
        }
        SupportedFormat::Gif => {
            let mut encoder = GifEncoder::new(&mut buffer);
            encoder.encode_frame(Frame::new(image.to_rgba8()))
        }
        SupportedFormat::WebP => {
            let encoder = WebPEncoder::new_lossless(&mut buffer);
            image.to_rgba8().write_with_encoder(encoder)
        }
    };

    result.map_err(|e| SplitterError::encode(format!("{} 编码失败：{}", format, e)))?;

    if buffer.is_empty() {
        return Err(SplitterError::encode(format!("{} 编码结果为空", format)));
    }

    Ok(Bytes::from(buffer))
}

/// 解码后按目标格式重新编码（下载前格式转换）。
///
/// 空字节代表退化分割，原样透传。
pub(crate) async fn convert_blocking(
    payload: Bytes,
    target: SupportedFormat,
    quality: f32,
) -> Result<Bytes, SplitterError> {
    if payload.is_empty() {
        return Ok(payload);
    }

    tokio::task::spawn_blocking(move || {
        let raster = decode_raster(&payload).map_err(|e| SplitterError::conversion(e.diagnostic()))?;
        encode_raster(&raster, target, quality).map_err(|e| SplitterError::conversion(e.diagnostic()))
    })
    .await
    .map_err(|e| SplitterError::conversion(format!("转换任务异常终止：{}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageBuffer, Rgba};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x % 255) as u8, (y % 255) as u8, ((x + y) % 255) as u8, 255])
        }))
    }

    fn expected_format(format: SupportedFormat) -> image::ImageFormat {
        match format {
            SupportedFormat::Jpeg => image::ImageFormat::Jpeg,
            SupportedFormat::Png => image::ImageFormat::Png,
            SupportedFormat::Gif => image::ImageFormat::Gif,
            SupportedFormat::WebP => image::ImageFormat::WebP,
        }
    }

    #[test]
    fn every_supported_format_encodes_and_decodes_back() {
        let image = gradient(24, 10);

        for format in crate::splitter::SUPPORTED_FORMATS {
            let encoded = encode_raster(&image, format, 0.9).expect("encode should succeed");
            assert!(!encoded.is_empty());
            assert_eq!(image::guess_format(&encoded).ok(), Some(expected_format(format)));

            let decoded = decode_raster(&encoded).expect("decode should succeed");
            assert_eq!(decoded.dimensions(), (24, 10), "format {format}");
        }
    }

    #[test]
    fn png_and_webp_are_lossless() {
        let image = gradient(12, 7);
        for format in [SupportedFormat::Png, SupportedFormat::WebP] {
            let encoded = encode_raster(&image, format, 0.1).expect("encode should succeed");
            let decoded = decode_raster(&encoded).expect("decode should succeed");
            assert_eq!(decoded.to_rgba8(), image.to_rgba8(), "format {format}");
        }
    }

    #[test]
    fn jpeg_quality_changes_output_size() {
        let image = gradient(64, 64);
        let high = encode_raster(&image, SupportedFormat::Jpeg, 1.0).expect("encode failed");
        let low = encode_raster(&image, SupportedFormat::Jpeg, 0.1).expect("encode failed");
        assert!(low.len() < high.len());
    }

    #[test]
    fn flatten_blends_transparent_pixels_to_white() {
        let image = DynamicImage::ImageRgba8(ImageBuffer::from_fn(2, 1, |x, _| {
            if x == 0 { Rgba([0, 0, 0, 0]) } else { Rgba([10, 20, 30, 255]) }
        }));

        let flat = flatten_onto_white(&image);
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(flat.get_pixel(1, 0).0, [10, 20, 30]);
    }

    #[test]
    fn jpeg_quality_mapping_is_clamped() {
        assert_eq!(jpeg_quality(0.9), 90);
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(1.0), 100);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let result = decode_raster(b"definitely not an image");
        assert!(matches!(result, Err(SplitterError::Decode { .. })));
    }

    #[tokio::test]
    async fn conversion_passes_degenerate_payload_through() {
        let converted = convert_blocking(Bytes::new(), SupportedFormat::Jpeg, 0.9)
            .await
            .expect("empty payload should pass through");
        assert!(converted.is_empty());
    }

    #[tokio::test]
    async fn conversion_failure_is_an_encode_error() {
        let result = convert_blocking(Bytes::from_static(b"junk"), SupportedFormat::Png, 0.9).await;
        assert!(matches!(result, Err(SplitterError::Encode { .. })));
    }
}
