//! 平台剪贴板后端
//!
//! - Windows：Win32 原生实现，支持任意命名格式枚举与 `CF_HDROP` 读写
//! - 其他平台：回退到 `arboard`，只提供文本与图片

#[cfg(target_os = "windows")]
mod win32;
#[cfg(target_os = "windows")]
pub use win32::Win32Clipboard as SystemClipboard;

#[cfg(not(target_os = "windows"))]
mod fallback;
#[cfg(not(target_os = "windows"))]
pub use fallback::ArboardClipboard as SystemClipboard;

use crate::error::AppError;

/// 打开当前平台的系统剪贴板后端。应在剪贴板线程内调用。
pub fn open_system_clipboard() -> Result<SystemClipboard, AppError> {
    SystemClipboard::new()
}
