//! 剪贴板模块
//!
//! # 设计思路
//!
//! 统一管理剪贴板相关的核心能力：
//! - **格式目录**（`catalog`）：剪贴板格式 → 候选扩展名 + 保存策略的静态表
//! - **快照**（`snapshot`）：一次捕获的剪贴板视图，负责格式协商
//! - **剪贴板线程**（`actor`）：唯一允许触碰系统剪贴板的专用线程
//! - **变化监听**（`watcher`）：订阅系统剪贴板变化通知
//! - **平台后端**（`platform` / `memory`）：Win32 原生实现、arboard 回退、进程内实现
//!
//! # 实现思路
//!
//! - 系统剪贴板遵循"单一所有者"规则，所有读写都通过 `ClipboardHandle`
//!   以消息形式投递到剪贴板线程，其余组件从不直接并发访问。
//! - 后端以 `ClipboardBackend` trait 抽象，在剪贴板线程内创建，因此不要求 `Send`。
//! - 监控模式的自触发抑制依靠 Watcher 的 Stop/Start 顺序，而不是内容比对。

pub mod actor;
pub mod catalog;
pub mod memory;
pub mod platform;
pub mod snapshot;
pub mod watcher;

use std::path::PathBuf;

use crate::error::AppError;

pub use actor::{ClipboardActor, ClipboardHandle};
pub use catalog::{Candidate, SaveStrategy, IMAGE_EXTENSIONS};
pub use snapshot::{SaveRequest, Snapshot};
pub use watcher::{ClipboardChanged, ClipboardWatcher};

/// 剪贴板格式标识。
///
/// 标准格式与常见注册格式有专门的变体，其余格式按名称保留在 `Other` 中。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClipboardFormat {
    FileDrop,
    Png,
    DibV5,
    Dib,
    Bitmap,
    Html,
    Rtf,
    UnicodeText,
    Text,
    Other(String),
}

impl ClipboardFormat {
    /// 格式在系统中的名称（标准格式使用 `CF_*` 常量名）。
    pub fn name(&self) -> &str {
        match self {
            Self::FileDrop => "CF_HDROP",
            Self::Png => "PNG",
            Self::DibV5 => "CF_DIBV5",
            Self::Dib => "CF_DIB",
            Self::Bitmap => "CF_BITMAP",
            Self::Html => "HTML Format",
            Self::Rtf => "Rich Text Format",
            Self::UnicodeText => "CF_UNICODETEXT",
            Self::Text => "CF_TEXT",
            Self::Other(name) => name,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "CF_HDROP" => Self::FileDrop,
            "PNG" | "image/png" => Self::Png,
            "CF_DIBV5" => Self::DibV5,
            "CF_DIB" => Self::Dib,
            "CF_BITMAP" => Self::Bitmap,
            "HTML Format" | "text/html" => Self::Html,
            "Rich Text Format" | "text/rtf" => Self::Rtf,
            "CF_UNICODETEXT" => Self::UnicodeText,
            "CF_TEXT" => Self::Text,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for ClipboardFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 已解码的 RGBA 像素（arboard 回退后端返回的图片形态）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: usize,
    pub height: usize,
    /// RGBA 字节数组（`width * height * 4`）。
    pub bytes: Vec<u8>,
}

/// 从剪贴板读取到的某一格式的原始数据。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardData {
    /// 全局内存块的原始字节（Win32 格式数据）。
    Bytes(Vec<u8>),
    /// 已解码的文本。
    Text(String),
    /// 已解码的像素。
    Image(RawImage),
    /// 文件拖放列表。
    Files(Vec<PathBuf>),
}

/// 一次捕获得到的剪贴板元数据：存在哪些格式，以及拖放文件列表。
///
/// 不包含任何负载字节，负载在保存时才按需读取。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardCapture {
    pub formats: Vec<ClipboardFormat>,
    pub dropped_files: Vec<PathBuf>,
}

/// 系统剪贴板访问接口。
///
/// 实现只会在剪贴板线程内被调用。
pub trait ClipboardBackend {
    /// 枚举当前剪贴板对象上存在的格式。
    fn formats(&mut self) -> Result<Vec<ClipboardFormat>, AppError>;

    /// 读取文件拖放列表；没有拖放数据时返回空列表。
    fn dropped_files(&mut self) -> Result<Vec<PathBuf>, AppError>;

    /// 读取指定格式的原始数据。
    fn read(&mut self, format: &ClipboardFormat) -> Result<ClipboardData, AppError>;

    /// 以文件拖放引用替换剪贴板内容，并声明所有权。
    fn write_file_drop(&mut self, paths: &[PathBuf]) -> Result<(), AppError>;

    /// 捕获格式列表与拖放文件。
    fn capture(&mut self) -> Result<ClipboardCapture, AppError> {
        let formats = self.formats()?;
        let dropped_files = if formats.contains(&ClipboardFormat::FileDrop) {
            self.dropped_files()?
        } else {
            Vec::new()
        };
        Ok(ClipboardCapture {
            formats,
            dropped_files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ClipboardFormat;

    #[test]
    fn format_names_round_trip_for_known_formats() {
        let known = [
            ClipboardFormat::FileDrop,
            ClipboardFormat::Png,
            ClipboardFormat::DibV5,
            ClipboardFormat::Dib,
            ClipboardFormat::Bitmap,
            ClipboardFormat::Html,
            ClipboardFormat::Rtf,
            ClipboardFormat::UnicodeText,
            ClipboardFormat::Text,
        ];
        for format in known {
            assert_eq!(ClipboardFormat::from_name(format.name()), format);
        }
    }

    #[test]
    fn unknown_names_are_preserved() {
        let format = ClipboardFormat::from_name("Shell IDList Array");
        assert_eq!(format, ClipboardFormat::Other("Shell IDList Array".to_string()));
        assert_eq!(format.name(), "Shell IDList Array");
    }
}
