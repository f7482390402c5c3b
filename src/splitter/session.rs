//! # 会话状态机
//!
//! ## 设计思路
//!
//! 一个会话同时只处理一个文件：
//! `idle → uploading → processing → completed`，校验 / 解码 / 分割失败进入 `error`，
//! 任意状态都可以通过 `reset` 回到 `idle`。
//!
//! - 新的 `submit` 会先取消上一次尚未结束的处理。
//! - 被取消的处理在挂起点（解码后、分割后）发现取消标志后，回收本次已签发的 URL，
//!   不再做任何状态迁移。
//! - 失败的重新提交不会破坏上一次成功的结果，结果仍可预览和下载。
//! - 新结果装入前，旧结果的原图与三张分割图 URL 全部回收。
//!
//! ## 实现思路
//!
//! - 状态放在 `Mutex<SessionInner>` 中，只在同步代码段内持锁，不跨 `await`。
//! - 取消检查与状态写入在同一把锁内完成，保证被取消的处理不会覆盖新处理的进度。
//! - 每次状态变化后通过 `watch` 通道发布快照，展示层订阅即可观察完整迁移过程。

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::cancel::CancellationToken;
use super::download::SaveSink;
use super::packager::{DownloadOptions, PackagedFile};
use super::{ImageSplitter, SelectedFile, SplitResult, SplitterError};

/// 会话状态。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    #[default]
    Idle,
    Uploading,
    Processing,
    Completed,
    Error,
}

/// 上传进度。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadProgress {
    pub status: UploadStatus,
    /// 0 ~ 100
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadProgress {
    fn step(status: UploadStatus, progress: u8, message: &str) -> Self {
        Self {
            status,
            progress,
            message: Some(message.to_string()),
            error: None,
        }
    }
}

/// 一次提交的结局。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Completed,
    /// 被后续的 `submit` 或 `reset` 取代。
    Cancelled,
}

/// 会话状态快照。
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub progress: UploadProgress,
    pub result: Option<Arc<SplitResult>>,
    pub is_processing: bool,
    pub error: Option<Arc<SplitterError>>,
}

impl SessionSnapshot {
    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    pub fn can_download(&self) -> bool {
        self.result.is_some() && !self.is_processing
    }

    pub fn is_uploading(&self) -> bool {
        self.progress.status == UploadStatus::Uploading
    }

    pub fn is_processing_image(&self) -> bool {
        self.progress.status == UploadStatus::Processing
    }

    pub fn is_completed(&self) -> bool {
        self.progress.status == UploadStatus::Completed
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Default)]
struct SessionInner {
    progress: UploadProgress,
    result: Option<Arc<SplitResult>>,
    is_processing: bool,
    error: Option<Arc<SplitterError>>,
    active: Option<CancellationToken>,
}

impl SessionInner {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            progress: self.progress.clone(),
            result: self.result.clone(),
            is_processing: self.is_processing,
            error: self.error.clone(),
        }
    }

    fn cancel_active(&mut self) {
        if let Some(token) = self.active.take() {
            token.cancel();
        }
    }

    fn record_error(&mut self, error: SplitterError) -> Arc<SplitterError> {
        let error = Arc::new(error);
        self.progress.status = UploadStatus::Error;
        self.progress.error = Some(error.to_string());
        self.error = Some(Arc::clone(&error));
        error
    }
}

/// 图片分割会话。
pub struct ImageSplitterSession {
    splitter: Arc<ImageSplitter>,
    inner: Mutex<SessionInner>,
    state_tx: watch::Sender<SessionSnapshot>,
}

impl ImageSplitterSession {
    pub fn new(splitter: Arc<ImageSplitter>) -> Self {
        let (state_tx, _) = watch::channel(SessionSnapshot::default());
        Self {
            splitter,
            inner: Mutex::new(SessionInner::default()),
            state_tx,
        }
    }

    pub fn splitter(&self) -> &ImageSplitter {
        &self.splitter
    }

    /// 订阅状态变化。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use image_splitter::splitter::{ImageSplitter, ImageSplitterSession, SplitterConfig};
    ///
    /// # async fn demo() -> Result<(), image_splitter::splitter::SplitterError> {
    /// let session = ImageSplitterSession::new(Arc::new(ImageSplitter::new(SplitterConfig::default())?));
    /// let mut rx = session.subscribe();
    /// while rx.changed().await.is_ok() {
    ///     let state = rx.borrow_and_update().clone();
    ///     println!("{:?} {}%", state.progress.status, state.progress.progress);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    pub fn result(&self) -> Option<Arc<SplitResult>> {
        self.lock().result.clone()
    }

    pub fn error(&self) -> Option<Arc<SplitterError>> {
        self.lock().error.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, inner: &SessionInner) {
        self.state_tx.send_replace(inner.snapshot());
    }

    /// 开始一次新的处理：取消旧处理，清除错误，进入 `uploading`。
    fn begin_attempt(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut inner = self.lock();
        inner.cancel_active();
        inner.active = Some(token.clone());
        inner.error = None;
        inner.is_processing = true;
        inner.progress = UploadProgress::step(UploadStatus::Uploading, 10, "验证文件...");
        self.publish(&inner);
        token
    }

    /// 推进进度；处理已被取消时返回 `false` 且不做任何修改。
    fn advance(&self, token: &CancellationToken, progress: u8, message: &str) -> bool {
        let mut inner = self.lock();
        if token.is_cancelled() {
            return false;
        }
        inner.progress = UploadProgress::step(UploadStatus::Processing, progress, message);
        self.publish(&inner);
        true
    }

    async fn run_pipeline(
        &self,
        file: Option<&SelectedFile>,
        token: &CancellationToken,
    ) -> Result<SplitResult, SplitterError> {
        let file = self.splitter.check_image_file(file)?;
        let validated_at = Instant::now();

        if !self.advance(token, 30, "加载图片...") {
            return Err(SplitterError::Cancelled);
        }
        let original = self.splitter.get_original_image_info(file).await?;
        if token.is_cancelled() {
            log::warn!("⚠️ 处理在解码后被取消，回收原图 URL - {}", file.name());
            original.url().revoke();
            return Err(SplitterError::Cancelled);
        }
        let decoded_at = Instant::now();

        if !self.advance(token, 60, "分割图片...") {
            original.url().revoke();
            return Err(SplitterError::Cancelled);
        }
        let splits = match self.splitter.split_image_horizontally(&original).await {
            Ok(splits) => splits,
            Err(err) => {
                original.url().revoke();
                return Err(err);
            }
        };
        let result = SplitResult::new(original, splits);
        if token.is_cancelled() {
            log::warn!("⚠️ 处理在分割后被取消，回收本次全部 URL - {}", file.name());
            result.revoke_all();
            return Err(SplitterError::Cancelled);
        }

        log::info!(
            "⏱️ 阶段耗时 - decode: {}ms split: {}ms",
            decoded_at.duration_since(validated_at).as_millis(),
            decoded_at.elapsed().as_millis()
        );
        Ok(result)
    }

    /// 上传并分割文件。
    ///
    /// 返回 `Cancelled` 表示本次处理被后续操作取代，状态由后续操作负责。
    pub async fn submit(
        &self,
        file: Option<SelectedFile>,
    ) -> Result<SubmitOutcome, Arc<SplitterError>> {
        let token = self.begin_attempt();
        let started = Instant::now();
        let name = file.as_ref().map(|f| f.name().to_string()).unwrap_or_default();
        log::info!("🚀 开始处理 - {}", name);

        let outcome = self.run_pipeline(file.as_ref(), &token).await;

        let mut inner = self.lock();
        if token.is_cancelled() {
            drop(inner);
            if let Ok(result) = outcome {
                result.revoke_all();
            }
            log::warn!("⚠️ 处理已被取代 - {}", name);
            return Ok(SubmitOutcome::Cancelled);
        }

        inner.active = None;
        inner.is_processing = false;

        match outcome {
            Ok(result) => {
                if let Some(previous) = inner.result.take() {
                    previous.revoke_all();
                }
                inner.result = Some(Arc::new(result));
                inner.error = None;
                inner.progress = UploadProgress::step(UploadStatus::Completed, 100, "处理完成！");
                self.publish(&inner);

                log::info!(
                    "✅ 处理完成 - {} total: {}ms",
                    name,
                    started.elapsed().as_millis()
                );
                Ok(SubmitOutcome::Completed)
            }
            Err(SplitterError::Cancelled) => {
                // 只在取消标志已置位时产生，上面已经返回
                self.publish(&inner);
                Ok(SubmitOutcome::Cancelled)
            }
            Err(err) => {
                log::error!("❌ 处理失败 - {} {}", name, err.diagnostic());
                let error = inner.record_error(err);
                self.publish(&inner);
                Err(error)
            }
        }
    }

    /// 取消进行中的处理，回收当前结果，回到 `idle`。
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.cancel_active();
        if let Some(result) = inner.result.take() {
            result.revoke_all();
        }
        inner.is_processing = false;
        inner.error = None;
        inner.progress = UploadProgress::default();
        self.publish(&inner);
        log::info!("🔄 会话已重置");
    }

    /// 清除错误。保留的结果仍在时回到 `completed`，否则回到 `idle`。
    pub fn clear_error(&self) {
        let mut inner = self.lock();
        if inner.error.take().is_none() {
            return;
        }
        inner.progress = if inner.result.is_some() {
            UploadProgress::step(UploadStatus::Completed, 100, "处理完成！")
        } else {
            UploadProgress::default()
        };
        self.publish(&inner);
    }

    /// 记录下载错误。处理进行中时只返回错误，状态由进行中的处理负责。
    fn fail_download(&self, error: SplitterError) -> Arc<SplitterError> {
        log::error!("❌ 下载失败 {}", error.diagnostic());
        let mut inner = self.lock();
        if inner.is_processing {
            return Arc::new(error);
        }
        let error = inner.record_error(error);
        self.publish(&inner);
        error
    }

    /// 下载当前结果中的一张分割图。
    pub async fn download_split(
        &self,
        id: &str,
        options: &DownloadOptions,
        sink: &dyn SaveSink,
    ) -> Result<PackagedFile, Arc<SplitterError>> {
        let Some(result) = self.result() else {
            return Err(self.fail_download(SplitterError::download(
                "没有可下载的图片",
                "当前没有分割结果",
            )));
        };
        let Some(strip) = result.split(id) else {
            return Err(self.fail_download(SplitterError::download(
                "下载图片失败",
                format!("未找到分割图 '{}'", id),
            )));
        };

        match self.splitter.download_single_image(strip, options, sink).await {
            Ok(packaged) => Ok(packaged),
            Err(err) => Err(self.fail_download(err)),
        }
    }

    /// 把当前结果的全部分割图打包下载。
    pub async fn download_all_splits(
        &self,
        options: &DownloadOptions,
        sink: &dyn SaveSink,
    ) -> Result<PackagedFile, Arc<SplitterError>> {
        let Some(result) = self.result() else {
            return Err(self.fail_download(SplitterError::download(
                "没有可下载的图片",
                "当前没有分割结果",
            )));
        };

        match self
            .splitter
            .download_images_as_zip(result.splits(), options, sink)
            .await
        {
            Ok(packaged) => Ok(packaged),
            Err(err) => Err(self.fail_download(err)),
        }
    }
}

impl Drop for ImageSplitterSession {
    fn drop(&mut self) {
        let inner = self
            .inner
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.cancel_active();
        if let Some(result) = inner.result.take() {
            result.revoke_all();
        }
    }
}
