//! # 数据模型
//!
//! ## 设计思路
//!
//! 将“外部输入”和“流水线产物”解耦：
//! - `SelectedFile`：用户选择的原始文件（名称 + 声明类型 + 字节）
//! - `SourceImage`：解码成功后的原图信息
//! - `StripImage`：三等分后的单张分割图
//! - `SplitResult`：一次成功分割的聚合结果
//!
//! 产物一旦构建就不再修改；每张图持有唯一的 `ObjectUrl`。

use std::path::Path;

use bytes::Bytes;

use super::SupportedFormat;
use super::resources::{ObjectUrl, ObjectUrlOwner, cleanup_image_urls};

const UNKNOWN_MIME: &str = "application/octet-stream";

/// 用户选择的文件。
#[derive(Debug, Clone)]
pub struct SelectedFile {
    name: String,
    mime_type: String,
    bytes: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// 从本地路径读取文件。
    ///
    /// 声明类型优先按内容签名识别，识别不了时再看扩展名，
    /// 与浏览器文件选择器给出的 `File.type` 语义一致。
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        let mime_type = infer::get(&bytes)
            .map(|kind| kind.mime_type().to_string())
            .or_else(|| {
                path.extension()
                    .and_then(|ext| SupportedFormat::from_extension(&ext.to_string_lossy()))
                    .map(|format| format.mime().to_string())
            })
            .unwrap_or_else(|| UNKNOWN_MIME.to_string());

        log::debug!("📁 读取本地文件 - {} ({}，{} 字节)", name, mime_type, bytes.len());
        Ok(Self::new(name, mime_type, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 声明的 MIME 类型。
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// 解码成功后的原图。
#[derive(Debug)]
pub struct SourceImage {
    file: SelectedFile,
    url: ObjectUrl,
    width: u32,
    height: u32,
    format: SupportedFormat,
}

impl SourceImage {
    pub(crate) fn new(
        file: SelectedFile,
        url: ObjectUrl,
        width: u32,
        height: u32,
        format: SupportedFormat,
    ) -> Self {
        Self {
            file,
            url,
            width,
            height,
            format,
        }
    }

    pub fn file(&self) -> &SelectedFile {
        &self.file
    }

    pub fn url(&self) -> &ObjectUrl {
        &self.url
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 取自声明的 MIME 类型，而不是内容嗅探。
    pub fn format(&self) -> SupportedFormat {
        self.format
    }
}

impl ObjectUrlOwner for SourceImage {
    fn object_url(&self) -> &ObjectUrl {
        &self.url
    }
}

/// 三等分中的一张。
#[derive(Debug)]
pub struct StripImage {
    id: String,
    index: u8,
    payload: Bytes,
    url: ObjectUrl,
    width: u32,
    height: u32,
    filename: String,
    format: SupportedFormat,
}

impl StripImage {
    pub(crate) fn new(
        index: u8,
        payload: Bytes,
        url: ObjectUrl,
        width: u32,
        height: u32,
        filename: String,
        format: SupportedFormat,
    ) -> Self {
        Self {
            id: format!("split-{}", index),
            index,
            payload,
            url,
            width,
            height,
            filename,
            format,
        }
    }

    /// 稳定标识：`split-1` ~ `split-3`。
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 从左到右的序号（1 起）。
    pub fn index(&self) -> u8 {
        self.index
    }

    /// 编码后的图片字节。
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn url(&self) -> &ObjectUrl {
        &self.url
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn format(&self) -> SupportedFormat {
        self.format
    }

    /// 宽度为 0 的退化分割（源图宽度不足 3 像素）。
    pub fn is_degenerate(&self) -> bool {
        self.width == 0
    }
}

impl ObjectUrlOwner for StripImage {
    fn object_url(&self) -> &ObjectUrl {
        &self.url
    }
}

/// 一次成功分割的聚合结果。
#[derive(Debug)]
pub struct SplitResult {
    original: SourceImage,
    splits: Vec<StripImage>,
    timestamp: i64,
}

impl SplitResult {
    pub(crate) fn new(original: SourceImage, splits: Vec<StripImage>) -> Self {
        Self {
            original,
            splits,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn original(&self) -> &SourceImage {
        &self.original
    }

    /// 按从左到右顺序排列的分割图。
    pub fn splits(&self) -> &[StripImage] {
        &self.splits
    }

    pub fn split(&self, id: &str) -> Option<&StripImage> {
        self.splits.iter().find(|strip| strip.id() == id)
    }

    /// 创建时间（Unix 毫秒）。
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// 整批回收：原图 + 全部分割图。
    pub fn revoke_all(&self) {
        let mut owners: Vec<&dyn ObjectUrlOwner> = Vec::with_capacity(self.splits.len() + 1);
        owners.push(&self.original);
        owners.extend(self.splits.iter().map(|strip| strip as &dyn ObjectUrlOwner));
        cleanup_image_urls(&owners);
    }
}
