//! # 图片三等分工具：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            展示层（CLI / 任意前端，订阅会话状态）          │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ Result<T, AppError> + watch::Receiver<SessionSnapshot>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            核心库 (Rust)                          │
//! │                                                          │
//! │  ┌─ error ────── AppError (统一错误类型)                  │
//! │  │                                                       │
//! │  └─ splitter                                             │
//! │      ├─ session        上传状态机 + 取消 + 结果替换       │
//! │      ├─ handler        ImageSplitter 门面 + 配置快照      │
//! │      ├─ validator      类型 / 体积校验                    │
//! │      ├─ decoder        解码原图                           │
//! │      ├─ slicing        横向三等分 + 编码                  │
//! │      ├─ packager       格式转换 + zip 打包                │
//! │      ├─ download       保存到目录 / 内存                  │
//! │      └─ resources      临时引用 URL 签发与回收 (RAII)     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，命令行与调用方的返回类型 |
//! | [`splitter`] | 校验、解码、三等分、打包下载与会话状态机 |

pub mod error;
pub mod splitter;
