//! # 图片分割模块（splitter）
//!
//! ## 设计思路
//!
//! 把“校验 → 解码 → 三等分 → 打包下载”按职责拆成多个子模块，
//! 会话状态机单独放在 `session`，不依赖任何界面框架。
//!
//! - `validator`：类型白名单与体积上限校验（无副作用）
//! - `decoder`：解码原图并读取尺寸
//! - `slicing`：横向三等分并逐条编码
//! - `resources`：临时引用 URL 的签发与回收
//! - `packager` / `download`：格式转换、zip 打包、保存
//! - `compress`：上传前按边界缩小
//! - `session`：上传流程状态机、取消与结果所有权
//! - `config/error/format/source`：配置、错误、格式枚举、数据模型
//!
//! ## 实现思路
//!
//! 各阶段以 `impl ImageSplitter` 的形式挂在同一个门面类型上，
//! 对外只暴露必要类型，内部细节保持 `mod` 私有。
//!
//! ## 新同事快速上手
//!
//! ```text
//! 展示层 / CLI
//!    ↓
//! session.rs（状态机 + 取消 + 结果替换）
//!    ↓
//! handler.rs（ImageSplitter 门面 + 配置快照）
//!    ├─ validator.rs（同步校验）
//!    ├─ decoder.rs（解码 + 原图 URL）
//!    ├─ slicing.rs（三等分 + 编码）
//!    └─ packager.rs / download.rs（转换 + 打包 + 保存）
//!    ↓
//! resources.rs（URL 签发 / 回收）
//! ```

mod cancel;
mod codec;
mod compress;
mod config;
mod decoder;
mod download;
mod error;
mod format;
mod handler;
mod packager;
mod resources;
mod session;
mod slicing;
mod source;
mod validator;

pub use cancel::CancellationToken;
pub use config::{DEFAULT_MAX_FILE_SIZE, DEFAULT_QUALITY, ResizeFilter, SplitterConfig};
pub use download::{
    DirectorySink, MemorySink, SaveSink, SavedFile, format_file_size, generate_download_filename,
};
pub use error::SplitterError;
pub use format::{OutputFormat, SUPPORTED_FORMATS, SUPPORTED_MIME_LIST, SupportedFormat};
pub use handler::ImageSplitter;
pub use packager::{
    ARCHIVE_MIME, DownloadOptions, PackagedFile, default_archive_filename, estimate_zip_size,
};
pub use resources::{ObjectUrl, ObjectUrlOwner, ObjectUrlRegistry, UrlTracker, cleanup_image_urls};
pub use session::{
    ImageSplitterSession, SessionSnapshot, SubmitOutcome, UploadProgress, UploadStatus,
};
pub use slicing::{STRIP_COUNT, generate_split_filename, strip_width};
pub use source::{SelectedFile, SourceImage, SplitResult, StripImage};
pub use validator::{ValidationResult, check_image_file, validate_image_file};
