//! # 下载
//!
//! ## 设计思路
//!
//! “触发浏览器保存”抽象为 `SaveSink`：打包层只负责产出字节，
//! 保存到哪里由调用方注入。
//! - `DirectorySink`：写入本地目录（命令行使用）
//! - `MemorySink`：记录在内存中（测试与嵌入式调用方使用）
//!
//! ## 实现思路
//!
//! - 打包失败（格式转换、压缩包序列化）按原错误向上传播
//! - 保存失败统一映射为 `Download`，单张为“下载图片失败”，批量为“批量下载失败”
//! - 目录不存在时自动 `create_dir_all`，避免上层判断

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bytes::Bytes;

use super::packager::{DownloadOptions, PackagedFile};
use super::{ImageSplitter, SplitterError, StripImage};

const SINGLE_DOWNLOAD_FAILED: &str = "下载图片失败";
const BATCH_DOWNLOAD_FAILED: &str = "批量下载失败";

/// 保存目标。
pub trait SaveSink: Send + Sync {
    fn save(&self, filename: &str, bytes: &[u8]) -> std::io::Result<()>;
}

/// 保存到本地目录。
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SaveSink for DirectorySink {
    fn save(&self, filename: &str, bytes: &[u8]) -> std::io::Result<()> {
        // 只取最后一段，文件名不能跳出目标目录
        let name = Path::new(filename).file_name().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("非法文件名: '{}'", filename),
            )
        })?;

        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }

        let path = self.dir.join(name);
        fs::write(&path, bytes)?;
        log::debug!("💾 已保存 {} ({} 字节)", path.display(), bytes.len());
        Ok(())
    }
}

/// 一次保存记录。
#[derive(Debug, Clone, PartialEq)]
pub struct SavedFile {
    pub filename: String,
    pub bytes: Bytes,
}

/// 保存到内存。
#[derive(Debug, Default)]
pub struct MemorySink {
    saved: Mutex<Vec<SavedFile>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按保存顺序返回全部记录。
    pub fn saved(&self) -> Vec<SavedFile> {
        self.saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl SaveSink for MemorySink {
    fn save(&self, filename: &str, bytes: &[u8]) -> std::io::Result<()> {
        self.saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(SavedFile {
                filename: filename.to_string(),
                bytes: Bytes::copy_from_slice(bytes),
            });
        Ok(())
    }
}

fn save_packaged(
    sink: &dyn SaveSink,
    packaged: &PackagedFile,
    message: &'static str,
) -> Result<(), SplitterError> {
    sink.save(&packaged.filename, &packaged.bytes)
        .map_err(|e| SplitterError::download(message, format!("保存 '{}' 失败：{}", packaged.filename, e)))
}

/// 人类可读的文件大小：`0 Bytes`、`1.5 KB`、`2 MB`。
///
/// # 示例
/// ```rust
/// use image_splitter::splitter::format_file_size;
///
/// assert_eq!(format_file_size(0), "0 Bytes");
/// assert_eq!(format_file_size(1536), "1.5 KB");
/// assert_eq!(format_file_size(10 * 1024 * 1024), "10 MB");
/// ```
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    // 保留两位小数后去掉末尾的 0
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// 生成带时间戳的下载文件名：`{name}{suffix}_{YYYYMMDDTHHMMSS}{ext}`（UTC）。
pub fn generate_download_filename(original_filename: &str, suffix: &str) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
    let (name, extension) = match original_filename.rfind('.') {
        Some(pos) if pos > 0 => original_filename.split_at(pos),
        _ => (original_filename, ""),
    };
    format!("{}{}_{}{}", name, suffix, timestamp, extension)
}

impl ImageSplitter {
    /// 下载单张分割图，需要时先转换格式。
    pub async fn download_single_image(
        &self,
        strip: &StripImage,
        options: &DownloadOptions,
        sink: &dyn SaveSink,
    ) -> Result<PackagedFile, SplitterError> {
        let packaged = self.package_single(strip, options).await?;
        save_packaged(sink, &packaged, SINGLE_DOWNLOAD_FAILED)?;

        log::info!(
            "⬇️ 已下载 {} ({})",
            packaged.filename,
            format_file_size(packaged.bytes.len() as u64)
        );
        Ok(packaged)
    }

    /// 把全部分割图打包为 zip 并下载。
    pub async fn download_images_as_zip(
        &self,
        strips: &[StripImage],
        options: &DownloadOptions,
        sink: &dyn SaveSink,
    ) -> Result<PackagedFile, SplitterError> {
        let packaged = self.package_as_archive(strips, options).await?;
        save_packaged(sink, &packaged, BATCH_DOWNLOAD_FAILED)?;

        log::info!(
            "⬇️ 已下载压缩包 {} ({}，预估 {})",
            packaged.filename,
            format_file_size(packaged.bytes.len() as u64),
            format_file_size(super::estimate_zip_size(strips))
        );
        Ok(packaged)
    }
}
