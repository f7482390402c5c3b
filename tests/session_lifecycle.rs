// 会话生命周期：取消、重置、结果替换
use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use image_splitter::splitter::{
    ImageSplitter, ImageSplitterSession, ObjectUrlRegistry, SelectedFile, SplitterConfig,
    SubmitOutcome, UploadStatus, UrlTracker,
};

fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgba([(x % 255) as u8, (y % 255) as u8, 200, 255])
    });
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("failed to encode test image");
    cursor.into_inner()
}

fn session() -> (Arc<ImageSplitterSession>, Arc<ObjectUrlRegistry>) {
    let registry = Arc::new(ObjectUrlRegistry::new());
    let tracker: Arc<dyn UrlTracker> = registry.clone();
    let splitter =
        ImageSplitter::with_tracker(SplitterConfig::default(), tracker).expect("splitter init failed");
    (Arc::new(ImageSplitterSession::new(Arc::new(splitter))), registry)
}

fn png(name: &str, width: u32, height: u32) -> SelectedFile {
    SelectedFile::new(name, "image/png", create_png_bytes(width, height))
}

/// 等到会话进度达到 `target`。
async fn wait_for_progress(
    rx: &mut tokio::sync::watch::Receiver<image_splitter::splitter::SessionSnapshot>,
    target: u8,
) {
    loop {
        if rx.borrow_and_update().progress.progress >= target {
            return;
        }
        rx.changed().await.expect("session dropped");
    }
}

#[tokio::test]
async fn resubmit_during_split_cancels_previous_attempt() {
    let (session, registry) = session();
    let mut rx = session.subscribe();

    let first = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.submit(Some(png("first.png", 300, 200))).await })
    };
    wait_for_progress(&mut rx, 60).await;

    let second = session
        .submit(Some(png("second.png", 30, 20)))
        .await
        .expect("second submit failed");
    let first = first.await.expect("first task panicked").expect("first submit errored");

    assert_eq!(first, SubmitOutcome::Cancelled);
    assert_eq!(second, SubmitOutcome::Completed);

    let state = session.snapshot();
    assert_eq!(state.progress.status, UploadStatus::Completed);
    let result = state.result.expect("result expected");
    assert_eq!(result.original().file().name(), "second.png");
    assert_eq!(result.splits()[0].filename(), "second_part_1.png");

    // 被取消的那次不留任何存活句柄
    assert_eq!(registry.live_count(), 4);
}

#[tokio::test]
async fn resubmit_during_decode_cancels_previous_attempt() {
    let (session, registry) = session();
    let mut rx = session.subscribe();

    let first = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.submit(Some(png("first.png", 300, 200))).await })
    };
    wait_for_progress(&mut rx, 30).await;

    session
        .submit(Some(png("second.png", 30, 20)))
        .await
        .expect("second submit failed");
    let first = first.await.expect("first task panicked").expect("first submit errored");

    assert_eq!(first, SubmitOutcome::Cancelled);
    assert_eq!(
        session.result().expect("result expected").original().file().name(),
        "second.png"
    );
    assert_eq!(registry.live_count(), 4);
}

#[tokio::test]
async fn reset_during_processing_returns_to_idle_without_leaks() {
    let (session, registry) = session();
    let mut rx = session.subscribe();

    let attempt = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.submit(Some(png("slow.png", 300, 200))).await })
    };
    wait_for_progress(&mut rx, 60).await;

    session.reset();
    let outcome = attempt.await.expect("task panicked").expect("submit errored");

    assert_eq!(outcome, SubmitOutcome::Cancelled);
    let state = session.snapshot();
    assert_eq!(state.progress.status, UploadStatus::Idle);
    assert_eq!(state.progress.progress, 0);
    assert!(!state.has_result() && !state.is_processing);
    assert_eq!(registry.live_count(), 0);
    assert_eq!(registry.allocated_count(), registry.revoked_count());
}

#[tokio::test]
async fn reset_after_completion_revokes_one_original_and_three_strips() {
    let (session, registry) = session();
    session
        .submit(Some(png("done.png", 30, 10)))
        .await
        .expect("submit failed");
    let before = registry.revoked_count();

    session.reset();

    assert_eq!(registry.revoked_count() - before, 4);
}

#[tokio::test]
async fn completed_iff_result_present_and_idle() {
    let (session, _registry) = session();

    let state = session.snapshot();
    assert!(!state.is_completed() && !state.has_result());

    session
        .submit(Some(png("a.png", 9, 3)))
        .await
        .expect("submit failed");
    let state = session.snapshot();
    assert_eq!(state.is_completed(), state.has_result() && !state.is_processing);

    let bad = SelectedFile::new("notes.txt", "text/plain", b"hello".to_vec());
    let err = session.submit(Some(bad)).await.expect_err("validation should fail");
    assert!(err.is_validation());

    let state = session.snapshot();
    assert!(state.has_error());
    assert!(state.has_result());
    assert!(!state.is_processing);
    assert_eq!(state.progress.status, UploadStatus::Error);
}
