//! # 图片三等分工具：命令行入口
//!
//! 本文件仅负责参数解析、日志初始化与结果保存。
//! 处理流程由 `ImageSplitterSession` 驱动，详见 `lib.rs` 架构文档。

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use image_splitter::error::AppError;
use image_splitter::splitter::{
    DirectorySink, DownloadOptions, ImageSplitter, ImageSplitterSession, OutputFormat,
    SelectedFile, SplitterConfig, SplitterError, SubmitOutcome, format_file_size,
};

/// 把图片横向三等分并保存
#[derive(Parser, Debug)]
#[command(name = "image-splitter")]
#[command(about = "Split an image into three equal vertical strips")]
struct Cli {
    /// 待分割的图片（jpeg / png / gif / webp）
    file: PathBuf,

    /// 输出目录
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// 输出格式：original / png / jpeg
    #[arg(short, long, default_value = "original")]
    format: OutputFormat,

    /// 编码质量（0~1），覆盖配置文件
    #[arg(short, long)]
    quality: Option<f32>,

    /// 打包为一个 zip 而不是逐张保存
    #[arg(long)]
    zip: bool,

    /// zip 文件名（默认 split_images_{毫秒时间戳}.zip）
    #[arg(long)]
    archive_name: Option<String>,

    /// JSON 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> Result<SplitterConfig, AppError> {
    let mut config = match &cli.config {
        Some(path) => SplitterConfig::load_from_file(path)?,
        None => SplitterConfig::default(),
    };
    if let Some(quality) = cli.quality {
        config.quality = quality;
        config.validate()?;
    }
    Ok(config)
}

/// 被取消的提交按会话错误上报。
fn ensure_completed(outcome: SubmitOutcome) -> Result<(), AppError> {
    match outcome {
        SubmitOutcome::Completed => Ok(()),
        SubmitOutcome::Cancelled => Err(AppError::Splitter(SplitterError::Cancelled)),
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = load_config(&cli)?;
    let splitter = Arc::new(ImageSplitter::new(config)?);
    let session = ImageSplitterSession::new(splitter);

    let mut rx = session.subscribe();
    let printer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let progress = rx.borrow_and_update().progress.clone();
            if let Some(message) = progress.message {
                println!("[{:>3}%] {}", progress.progress, message);
            }
        }
    });

    let file = SelectedFile::from_path(&cli.file)?;
    let outcome = session.submit(Some(file)).await;
    printer.abort();

    ensure_completed(outcome?)?;

    let sink = DirectorySink::new(&cli.out);
    let options = DownloadOptions {
        filename: None,
        format: cli.format,
        quality: cli.quality,
    };

    if cli.zip {
        let options = DownloadOptions {
            filename: cli.archive_name.clone(),
            ..options
        };
        let archive = session.download_all_splits(&options, &sink).await?;
        println!(
            "📦 {} ({})",
            sink.dir().join(&archive.filename).display(),
            format_file_size(archive.bytes.len() as u64)
        );
        return Ok(());
    }

    let Some(result) = session.result() else {
        return Err(AppError::InvalidArgument("没有可下载的图片".to_string()));
    };
    for strip in result.splits() {
        let saved = session.download_split(strip.id(), &options, &sink).await?;
        println!(
            "🖼️ {} {}x{} ({})",
            sink.dir().join(&saved.filename).display(),
            strip.width(),
            strip.height(),
            format_file_size(saved.bytes.len() as u64)
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::debug!("{}", err.diagnostic());
            eprintln!("❌ {}", err);
            ExitCode::FAILURE
        }
    }
}
