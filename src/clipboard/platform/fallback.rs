use std::path::PathBuf;

use crate::clipboard::{ClipboardBackend, ClipboardData, ClipboardFormat, RawImage};
use crate::error::AppError;

/// 非 Windows 平台的 arboard 回退实现。
///
/// arboard 不支持格式枚举，这里通过试读文本与图片推断存在的格式。
pub struct ArboardClipboard {
    inner: arboard::Clipboard,
}

impl ArboardClipboard {
    pub fn new() -> Result<Self, AppError> {
        let inner = arboard::Clipboard::new().map_err(|e| AppError::Clipboard(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl ClipboardBackend for ArboardClipboard {
    fn formats(&mut self) -> Result<Vec<ClipboardFormat>, AppError> {
        let mut formats = Vec::new();
        if self.inner.get_image().is_ok() {
            formats.push(ClipboardFormat::Bitmap);
        }
        if self.inner.get_text().is_ok() {
            formats.push(ClipboardFormat::UnicodeText);
        }
        Ok(formats)
    }

    fn dropped_files(&mut self) -> Result<Vec<PathBuf>, AppError> {
        Ok(Vec::new())
    }

    fn read(&mut self, format: &ClipboardFormat) -> Result<ClipboardData, AppError> {
        match format {
            ClipboardFormat::Bitmap => {
                let image = self
                    .inner
                    .get_image()
                    .map_err(|e| AppError::Clipboard(e.to_string()))?;
                Ok(ClipboardData::Image(RawImage {
                    width: image.width,
                    height: image.height,
                    bytes: image.bytes.into_owned(),
                }))
            }
            ClipboardFormat::UnicodeText | ClipboardFormat::Text => self
                .inner
                .get_text()
                .map(ClipboardData::Text)
                .map_err(|e| AppError::Clipboard(e.to_string())),
            other => Err(AppError::Clipboard(format!(
                "当前平台不支持读取 {} 格式",
                other
            ))),
        }
    }

    fn write_file_drop(&mut self, _paths: &[PathBuf]) -> Result<(), AppError> {
        Err(AppError::Clipboard("文件剪贴板复制仅在 Windows 上支持".to_string()))
    }
}
