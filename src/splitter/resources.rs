//! # 临时引用 URL 管理模块
//!
//! ## 设计思路
//!
//! 预览需要一个进程内、可回收的句柄来引用内存中的图片字节（类似浏览器的
//! `blob:` URL）。手动签发/回收很容易失配，因此这里把所有权显式建模：
//!
//! - `UrlTracker`：签发与回收句柄的底层设施（可替换，便于测试计数）
//! - `ObjectUrlRegistry`：默认实现，内存表 + 计数器
//! - `ObjectUrl`：单个句柄的 RAII 所有者，保证只回收一次
//!
//! ## 实现思路
//!
//! - 每次签发都生成新句柄，即使字节内容相同。
//! - 回收是单向的；重复回收只是空操作，不报错（取消竞争时会出现）。
//! - `ObjectUrl` 在 `Drop` 时兜底回收，丢弃的中间结果不会泄漏句柄。

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;

const URL_SCHEME_PREFIX: &str = "blob:image-splitter/";

/// 签发与回收临时引用 URL 的设施。
pub trait UrlTracker: Send + Sync {
    /// 为一段字节签发新的句柄。
    fn allocate(&self, payload: Bytes, mime_type: &str) -> String;

    /// 回收句柄。句柄此前有效时返回 `true`，已回收或未知句柄返回 `false`。
    fn revoke(&self, href: &str) -> bool;

    /// 批量回收。
    fn revoke_all(&self, hrefs: &[&str]) {
        for href in hrefs {
            self.revoke(href);
        }
    }
}

struct LiveEntry {
    payload: Bytes,
    mime_type: String,
}

/// 默认的内存句柄表。
///
/// 同时记录签发与回收次数，便于验证“替换/重置时全部回收”。
#[derive(Default)]
pub struct ObjectUrlRegistry {
    next_id: AtomicU64,
    revoked: AtomicU64,
    live: Mutex<HashMap<String, LiveEntry>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_table(&self) -> std::sync::MutexGuard<'_, HashMap<String, LiveEntry>> {
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 当前仍有效的句柄数量。
    pub fn live_count(&self) -> usize {
        self.live_table().len()
    }

    /// 累计签发次数。
    pub fn allocated_count(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    /// 累计有效回收次数（重复回收不计入）。
    pub fn revoked_count(&self) -> u64 {
        self.revoked.load(Ordering::SeqCst)
    }

    pub fn is_live(&self, href: &str) -> bool {
        self.live_table().contains_key(href)
    }

    /// 解析句柄对应的字节；已回收时返回 `None`。
    pub fn resolve(&self, href: &str) -> Option<Bytes> {
        self.live_table().get(href).map(|entry| entry.payload.clone())
    }

    /// 以 Data URL 形式解析，供无法直接读取字节的渲染端使用。
    pub fn resolve_data_url(&self, href: &str) -> Option<String> {
        let table = self.live_table();
        let entry = table.get(href)?;
        Some(format!(
            "data:{};base64,{}",
            entry.mime_type,
            general_purpose::STANDARD.encode(&entry.payload)
        ))
    }
}

impl UrlTracker for ObjectUrlRegistry {
    fn allocate(&self, payload: Bytes, mime_type: &str) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let href = format!("{}{:08x}", URL_SCHEME_PREFIX, id);
        self.live_table().insert(
            href.clone(),
            LiveEntry {
                payload,
                mime_type: mime_type.to_string(),
            },
        );
        href
    }

    fn revoke(&self, href: &str) -> bool {
        let removed = self.live_table().remove(href).is_some();
        if removed {
            self.revoked.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }
}

impl fmt::Debug for ObjectUrlRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectUrlRegistry")
            .field("allocated", &self.allocated_count())
            .field("revoked", &self.revoked_count())
            .field("live", &self.live_count())
            .finish()
    }
}

/// 单个临时引用 URL 的所有者。
///
/// 只能回收一次：显式 [`ObjectUrl::revoke`] 或 `Drop` 时兜底，之后状态不可逆。
pub struct ObjectUrl {
    href: String,
    tracker: Arc<dyn UrlTracker>,
    revoked: AtomicBool,
}

impl ObjectUrl {
    /// 通过 `tracker` 为 `payload` 签发句柄。
    pub fn allocate(tracker: &Arc<dyn UrlTracker>, payload: Bytes, mime_type: &str) -> Self {
        let href = tracker.allocate(payload, mime_type);
        log::debug!("🔗 已签发临时 URL：{}", href);
        Self {
            href,
            tracker: Arc::clone(tracker),
            revoked: AtomicBool::new(false),
        }
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::SeqCst)
    }

    /// 回收句柄；重复调用为空操作。
    pub fn revoke(&self) {
        if self.revoked.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.tracker.revoke(&self.href) {
            log::debug!("🧹 已回收临时 URL：{}", self.href);
        } else {
            log::warn!("⚠️ 临时 URL 已被提前回收：{}", self.href);
        }
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.revoke();
    }
}

impl fmt::Debug for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectUrl")
            .field("href", &self.href)
            .field("revoked", &self.is_revoked())
            .finish()
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href)
    }
}

/// 持有临时引用 URL 的图片（原图或分割图）。
pub trait ObjectUrlOwner {
    fn object_url(&self) -> &ObjectUrl;
}

/// 回收一组图片的临时 URL。
pub fn cleanup_image_urls(images: &[&dyn ObjectUrlOwner]) {
    for image in images {
        image.object_url().revoke();
    }
}
