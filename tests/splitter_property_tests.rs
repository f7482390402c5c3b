//! Property-based tests for validation, filenames and strip geometry

use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use image_splitter::splitter::{
    ImageSplitter, SUPPORTED_FORMATS, SelectedFile, SplitterConfig, generate_split_filename,
    strip_width, validate_image_file,
};
use proptest::prelude::*;

fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgba([(x % 255) as u8, (y % 255) as u8, 7, 255])
    });
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("failed to encode test image");
    cursor.into_inner()
}

proptest! {
    /// 支持的类型、不超过上限的文件一律有效
    #[test]
    fn prop_supported_files_under_ceiling_are_valid(
        format_index in 0..SUPPORTED_FORMATS.len(),
        size in 0usize..4096,
    ) {
        let format = SUPPORTED_FORMATS[format_index];
        let file = SelectedFile::new(format!("a{}", format.extension()), format.mime(), vec![0u8; size]);
        let result = validate_image_file(Some(&file), &SplitterConfig::default());
        prop_assert!(result.valid);
        prop_assert!(result.error.is_none());
    }

    /// 白名单之外的类型一律无效，错误信息列出全部支持格式
    #[test]
    fn prop_unsupported_types_list_every_format(mime in "[a-z]{1,8}/[a-z0-9.+-]{1,12}") {
        prop_assume!(!SUPPORTED_FORMATS.iter().any(|f| f.mime() == mime));

        let file = SelectedFile::new("x", mime, vec![1u8; 8]);
        let result = validate_image_file(Some(&file), &SplitterConfig::default());
        prop_assert!(!result.valid);
        let message = result.error.unwrap_or_default();
        for format in SUPPORTED_FORMATS {
            prop_assert!(message.contains(format.mime()));
        }
    }

    /// 有扩展名时在扩展名前插入后缀
    #[test]
    fn prop_split_filename_keeps_extension(
        base in "[a-zA-Z0-9_-]{1,16}",
        ext in "[a-z]{1,5}",
        index in 1u32..=3,
    ) {
        let name = generate_split_filename(&format!("{}.{}", base, ext), index);
        prop_assert_eq!(name, format!("{}_part_{}.{}", base, index, ext));
    }

    /// 没有扩展名时默认 .png
    #[test]
    fn prop_split_filename_defaults_to_png(base in "[a-zA-Z0-9_-]{1,16}", index in 1u32..=3) {
        let name = generate_split_filename(&base, index);
        prop_assert_eq!(name, format!("{}_part_{}.png", base, index));
    }

    /// 3 * floor(W / 3) <= W，且丢弃的余数小于 3
    #[test]
    fn prop_strip_width_never_overflows_source(width in 0u32..100_000) {
        let strip = strip_width(width);
        prop_assert!(3 * strip <= width);
        prop_assert!(width - 3 * strip < 3);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// 任意尺寸都恰好得到 3 张等高、宽 floor(W/3) 的分割图
    #[test]
    fn prop_split_geometry(width in 1u32..40, height in 1u32..12) {
        let runtime = tokio::runtime::Runtime::new().expect("runtime init failed");
        let splitter = ImageSplitter::new(SplitterConfig::default()).expect("splitter init failed");
        let file = SelectedFile::new("g.png", "image/png", create_png_bytes(width, height));

        let strips = runtime.block_on(async {
            let original = splitter.get_original_image_info(&file).await.expect("decode failed");
            splitter.split_image_horizontally(&original).await.expect("split failed")
        });

        prop_assert_eq!(strips.len(), 3);
        for (i, strip) in strips.iter().enumerate() {
            prop_assert_eq!(strip.height(), height);
            prop_assert_eq!(strip.width(), width / 3);
            prop_assert_eq!(strip.index() as usize, i + 1);
            prop_assert_eq!(strip.is_degenerate(), width < 3);
        }
    }
}
