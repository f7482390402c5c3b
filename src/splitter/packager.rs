//! # 打包
//!
//! ## 设计思路
//!
//! 把分割图整理成可保存的产物：
//! - 单张：一个 `PackagedFile`（文件名 + MIME + 字节）
//! - 批量：一个 zip 压缩包
//!
//! `format` 为 `original` 时按分割结果原样存入；指定 `png` / `jpeg` 时
//! 先解码再重新编码，同时把扩展名改成 `.png` / `.jpg`。
//! 任一条目转换失败则整批失败，不产出残缺的压缩包。
//!
//! ## 实现思路
//!
//! - 转换逐条顺序执行，保持条目顺序与分割顺序一致
//! - 同名条目后写覆盖先写，位置保留在首次出现处
//! - 压缩包序列化在阻塞线程池中完成

use std::io::{Cursor, Write};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::codec;
use super::{ImageSplitter, OutputFormat, SplitterError, StripImage, SupportedFormat};

/// 下载/打包选项。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadOptions {
    /// 覆盖默认文件名（单张下载时为图片名，批量下载时为压缩包名）。
    pub filename: Option<String>,
    pub format: OutputFormat,
    /// 0~1，仅对有损格式有意义；缺省或越界时使用配置中的质量。
    pub quality: Option<f32>,
}

impl DownloadOptions {
    pub fn with_format(format: OutputFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }
}

/// 可直接保存的产物。
#[derive(Debug, Clone, PartialEq)]
pub struct PackagedFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// 压缩包 MIME。
pub const ARCHIVE_MIME: &str = "application/zip";

/// 把文件名扩展名替换为目标格式的扩展名。
pub(crate) fn update_filename_extension(filename: &str, target: SupportedFormat) -> String {
    let name = match filename.rfind('.') {
        Some(pos) if pos > 0 => &filename[..pos],
        _ => filename,
    };
    format!("{}{}", name, target.extension())
}

/// 默认压缩包文件名：`split_images_{毫秒时间戳}.zip`。
pub fn default_archive_filename() -> String {
    format!("split_images_{}.zip", chrono::Utc::now().timestamp_millis())
}

/// 预估压缩包体积：分割图字节总和的 75%。
pub fn estimate_zip_size(strips: &[StripImage]) -> u64 {
    let total: u64 = strips.iter().map(|strip| strip.payload().len() as u64).sum();
    total * 3 / 4
}

/// 单个条目：存储名 + 字节。
struct ArchiveEntry {
    filename: String,
    mime_type: &'static str,
    bytes: Bytes,
}

/// 按选项准备一个条目，需要时先做格式转换。
async fn prepare_entry(
    strip: &StripImage,
    format: OutputFormat,
    quality: f32,
) -> Result<ArchiveEntry, SplitterError> {
    match format.target() {
        None => Ok(ArchiveEntry {
            filename: strip.filename().to_string(),
            mime_type: strip.format().mime(),
            bytes: strip.payload().clone(),
        }),
        Some(target) => {
            let bytes = codec::convert_blocking(strip.payload().clone(), target, quality).await?;
            log::debug!(
                "🔄 格式转换 - {} {} -> {} ({} -> {} 字节)",
                strip.id(),
                strip.format(),
                target,
                strip.payload().len(),
                bytes.len()
            );
            Ok(ArchiveEntry {
                filename: update_filename_extension(strip.filename(), target),
                mime_type: target.mime(),
                bytes,
            })
        }
    }
}

/// 后写覆盖先写，保留首次出现的位置。
fn upsert_entry(entries: &mut Vec<ArchiveEntry>, entry: ArchiveEntry) {
    match entries.iter_mut().find(|existing| existing.filename == entry.filename) {
        Some(existing) => {
            log::warn!("⚠️ 压缩包内出现同名条目，后者覆盖前者: {}", entry.filename);
            *existing = entry;
        }
        None => entries.push(entry),
    }
}

fn write_archive(entries: &[ArchiveEntry]) -> Result<Bytes, SplitterError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        writer
            .start_file(entry.filename.as_str(), options)
            .map_err(|e| SplitterError::archive(format!("写入条目 '{}' 失败：{}", entry.filename, e)))?;
        writer
            .write_all(&entry.bytes)
            .map_err(|e| SplitterError::archive(format!("写入条目 '{}' 失败：{}", entry.filename, e)))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| SplitterError::archive(format!("压缩包收尾失败：{}", e)))?;
    Ok(Bytes::from(cursor.into_inner()))
}

impl ImageSplitter {
    /// 打包单张分割图。
    ///
    /// `options.filename` 覆盖默认文件名；需要转换时覆盖后的文件名同样会改写扩展名。
    pub async fn package_single(
        &self,
        strip: &StripImage,
        options: &DownloadOptions,
    ) -> Result<PackagedFile, SplitterError> {
        let config = self.config_snapshot()?;
        let quality = config.effective_quality(options.quality);

        let entry = prepare_entry(strip, options.format, quality).await?;
        let filename = match (&options.filename, options.format.target()) {
            (Some(name), Some(target)) => update_filename_extension(name, target),
            (Some(name), None) => name.clone(),
            (None, _) => entry.filename,
        };

        Ok(PackagedFile {
            filename,
            mime_type: entry.mime_type.to_string(),
            bytes: entry.bytes,
        })
    }

    /// 把多张分割图打成一个 zip。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_splitter::splitter::{DownloadOptions, ImageSplitter, SplitResult};
    ///
    /// # async fn demo(splitter: &ImageSplitter, result: &SplitResult) -> Result<(), image_splitter::splitter::SplitterError> {
    /// let archive = splitter
    ///     .package_as_archive(result.splits(), &DownloadOptions::default())
    ///     .await?;
    /// assert!(archive.filename.ends_with(".zip"));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn package_as_archive(
        &self,
        strips: &[StripImage],
        options: &DownloadOptions,
    ) -> Result<PackagedFile, SplitterError> {
        let config = self.config_snapshot()?;
        let quality = config.effective_quality(options.quality);
        let filename = options
            .filename
            .clone()
            .unwrap_or_else(default_archive_filename);

        let mut entries = Vec::with_capacity(strips.len());
        for strip in strips {
            upsert_entry(&mut entries, prepare_entry(strip, options.format, quality).await?);
        }

        let entry_count = entries.len();
        let bytes = tokio::task::spawn_blocking(move || write_archive(&entries))
            .await
            .map_err(|e| SplitterError::archive(format!("打包任务异常终止：{}", e)))??;

        log::info!(
            "📦 压缩包已生成 - {} ({} 个条目，{} 字节，格式: {})",
            filename,
            entry_count,
            bytes.len(),
            options.format
        );

        Ok(PackagedFile {
            filename,
            mime_type: ARCHIVE_MIME.to_string(),
            bytes,
        })
    }
}
