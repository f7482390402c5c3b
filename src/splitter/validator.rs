//! # 文件校验
//!
//! 在任何解码或资源分配之前执行：是否选择了文件、声明类型是否在白名单内、
//! 体积是否超过上限。纯同步，无副作用。

use serde::Serialize;

use super::{SelectedFile, SplitterConfig, SplitterError, SupportedFormat};

/// 面向展示层的校验结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }
}

/// 校验文件并返回类型化错误。
///
/// 成功时原样返回文件引用，方便调用方继续使用。
pub fn check_image_file<'a>(
    file: Option<&'a SelectedFile>,
    config: &SplitterConfig,
) -> Result<&'a SelectedFile, SplitterError> {
    let file = file.ok_or(SplitterError::NoFileSelected)?;

    if SupportedFormat::from_mime(file.mime_type()).is_none() {
        return Err(SplitterError::UnsupportedFormat {
            declared: file.mime_type().to_string(),
        });
    }

    if file.size() > config.max_file_size {
        return Err(SplitterError::FileTooLarge {
            size: file.size(),
            limit: config.max_file_size,
        });
    }

    Ok(file)
}

/// 校验文件，返回 `{ valid, error? }` 形式的结果。
///
/// # 示例
/// ```rust
/// use image_splitter::splitter::{validate_image_file, SelectedFile, SplitterConfig};
///
/// let config = SplitterConfig::default();
/// let file = SelectedFile::new("notes.txt", "text/plain", b"hello".to_vec());
/// let result = validate_image_file(Some(&file), &config);
/// assert!(!result.valid);
///
/// assert!(!validate_image_file(None, &config).valid);
/// ```
pub fn validate_image_file(file: Option<&SelectedFile>, config: &SplitterConfig) -> ValidationResult {
    match check_image_file(file, config) {
        Ok(_) => ValidationResult::ok(),
        Err(err) => ValidationResult {
            valid: false,
            error: Some(err.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime: &str, size: usize) -> SelectedFile {
        SelectedFile::new(name, mime, vec![0u8; size])
    }

    #[test]
    fn accepts_every_supported_format() {
        let config = SplitterConfig::default();
        for (name, mime) in [
            ("test.jpg", "image/jpeg"),
            ("test.png", "image/png"),
            ("test.gif", "image/gif"),
            ("test.webp", "image/webp"),
        ] {
            let result = validate_image_file(Some(&file(name, mime, 0)), &config);
            assert_eq!(result, ValidationResult { valid: true, error: None }, "{mime}");
        }
    }

    #[test]
    fn rejects_unsupported_types_with_format_list() {
        let config = SplitterConfig::default();
        for mime in ["text/plain", "application/pdf", "image/bmp", ""] {
            let result = validate_image_file(Some(&file("x", mime, 1)), &config);
            assert!(!result.valid);
            let message = result.error.expect("error message expected");
            assert!(message.contains("不支持的文件格式"));
            assert!(message.contains("image/jpeg, image/png, image/gif, image/webp"));
        }
    }

    #[test]
    fn size_ceiling_is_inclusive() {
        let config = SplitterConfig::default();
        let limit = config.max_file_size as usize;

        assert!(validate_image_file(Some(&file("a.png", "image/png", limit)), &config).valid);

        let over = validate_image_file(Some(&file("a.png", "image/png", limit + 1)), &config);
        assert!(!over.valid);
        assert_eq!(over.error.as_deref(), Some("文件大小超过限制（10.0MB）"));
    }

    #[test]
    fn missing_file_is_reported_first() {
        let result = check_image_file(None, &SplitterConfig::default());
        assert!(matches!(result, Err(SplitterError::NoFileSelected)));
        assert_eq!(
            validate_image_file(None, &SplitterConfig::default()).error.as_deref(),
            Some("请选择一个文件")
        );
    }

    #[test]
    fn format_is_checked_before_size() {
        let config = SplitterConfig::default();
        let huge_text = file("big.txt", "text/plain", config.max_file_size as usize + 1);
        let result = check_image_file(Some(&huge_text), &config);
        assert!(matches!(result, Err(SplitterError::UnsupportedFormat { .. })));
    }
}
