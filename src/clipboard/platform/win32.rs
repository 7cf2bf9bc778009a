//! Win32 剪贴板后端
//!
//! 所有调用都假设发生在剪贴板线程上。每个操作独立打开与关闭剪贴板，
//! 打开失败时短暂退避重试（其他进程可能正持有剪贴板）。

use std::ffi::{OsStr, OsString};
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use windows::core::PCWSTR;
use windows::Win32::Foundation::{GlobalFree, HANDLE, HGLOBAL};
use windows::Win32::System::DataExchange::{
    CloseClipboard, EmptyClipboard, EnumClipboardFormats, GetClipboardData,
    GetClipboardFormatNameW, OpenClipboard, RegisterClipboardFormatW, SetClipboardData,
};
use windows::Win32::System::Memory::{
    GlobalAlloc, GlobalLock, GlobalSize, GlobalUnlock, GMEM_MOVEABLE,
};
use windows::Win32::System::Ole::{CF_BITMAP, CF_DIB, CF_DIBV5, CF_HDROP, CF_TEXT, CF_UNICODETEXT};
use windows::Win32::UI::Shell::{DragQueryFileW, DROPFILES, HDROP};

use crate::clipboard::{ClipboardBackend, ClipboardData, ClipboardFormat};
use crate::error::AppError;

const OPEN_RETRIES: u32 = 5;
const OPEN_RETRY_DELAY_MS: u64 = 20;

const ID_TEXT: u32 = CF_TEXT.0 as u32;
const ID_BITMAP: u32 = CF_BITMAP.0 as u32;
const ID_DIB: u32 = CF_DIB.0 as u32;
const ID_UNICODETEXT: u32 = CF_UNICODETEXT.0 as u32;
const ID_HDROP: u32 = CF_HDROP.0 as u32;
const ID_DIBV5: u32 = CF_DIBV5.0 as u32;

/// 打开期间持有剪贴板，drop 时关闭。
struct OpenGuard;

impl Drop for OpenGuard {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseClipboard();
        }
    }
}

fn open_clipboard() -> Result<OpenGuard, AppError> {
    let mut last_error = String::new();
    for attempt in 1..=OPEN_RETRIES {
        match unsafe { OpenClipboard(None) } {
            Ok(()) => return Ok(OpenGuard),
            Err(e) => {
                last_error = format!("{:?}", e);
                thread::sleep(Duration::from_millis(OPEN_RETRY_DELAY_MS * attempt as u64));
            }
        }
    }
    Err(AppError::Clipboard(format!("打开剪贴板失败：{}", last_error)))
}

fn format_for_id(id: u32) -> ClipboardFormat {
    match id {
        ID_TEXT => ClipboardFormat::Text,
        ID_BITMAP => ClipboardFormat::Bitmap,
        ID_DIB => ClipboardFormat::Dib,
        ID_UNICODETEXT => ClipboardFormat::UnicodeText,
        ID_HDROP => ClipboardFormat::FileDrop,
        ID_DIBV5 => ClipboardFormat::DibV5,
        _ => {
            let mut buf = [0u16; 256];
            let len = unsafe { GetClipboardFormatNameW(id, &mut buf) };
            if len > 0 {
                ClipboardFormat::from_name(&String::from_utf16_lossy(&buf[..len as usize]))
            } else {
                ClipboardFormat::Other(format!("#{}", id))
            }
        }
    }
}

fn id_for_format(format: &ClipboardFormat) -> Result<u32, AppError> {
    let id = match format {
        ClipboardFormat::Text => ID_TEXT,
        ClipboardFormat::Bitmap => ID_BITMAP,
        ClipboardFormat::Dib => ID_DIB,
        ClipboardFormat::UnicodeText => ID_UNICODETEXT,
        ClipboardFormat::FileDrop => ID_HDROP,
        ClipboardFormat::DibV5 => ID_DIBV5,
        other => {
            let name = other.name();
            if let Some(id) = name.strip_prefix('#').and_then(|raw| raw.parse::<u32>().ok()) {
                return Ok(id);
            }
            let wide: Vec<u16> = OsStr::new(name)
                .encode_wide()
                .chain(std::iter::once(0))
                .collect();
            unsafe { RegisterClipboardFormatW(PCWSTR(wide.as_ptr())) }
        }
    };
    if id == 0 {
        return Err(AppError::Clipboard(format!("无法注册剪贴板格式 {}", format)));
    }
    Ok(id)
}

/// 复制剪贴板中某格式的全局内存内容。调用方须已打开剪贴板。
unsafe fn copy_global_bytes(id: u32) -> Result<Vec<u8>, AppError> {
    let handle = unsafe { GetClipboardData(id) }
        .map_err(|e| AppError::Clipboard(format!("读取剪贴板数据失败：{:?}", e)))?;
    let hglobal = HGLOBAL(handle.0);
    let size = unsafe { GlobalSize(hglobal) };
    let ptr = unsafe { GlobalLock(hglobal) } as *const u8;
    if ptr.is_null() {
        return Err(AppError::Clipboard("锁定内存失败".to_string()));
    }
    let bytes = unsafe { std::slice::from_raw_parts(ptr, size) }.to_vec();
    let _ = unsafe { GlobalUnlock(hglobal) };
    Ok(bytes)
}

/// 调用方须已打开剪贴板。
unsafe fn query_dropped_files() -> Vec<PathBuf> {
    let handle = match unsafe { GetClipboardData(ID_HDROP) } {
        Ok(h) => h,
        Err(_) => return Vec::new(),
    };

    let hdrop = HDROP(handle.0);
    let count = unsafe { DragQueryFileW(hdrop, 0xFFFFFFFF, None) };
    let mut files = Vec::with_capacity(count as usize);
    for i in 0..count {
        let len = unsafe { DragQueryFileW(hdrop, i, None) };
        if len == 0 {
            continue;
        }

        let mut buf = vec![0u16; (len + 1) as usize];
        unsafe { DragQueryFileW(hdrop, i, Some(&mut buf)) };
        if let Some(pos) = buf.iter().position(|&c| c == 0) {
            buf.truncate(pos);
        }
        files.push(PathBuf::from(OsString::from_wide(&buf)));
    }
    files
}

/// Windows 原生剪贴板。
pub struct Win32Clipboard {
    _private: (),
}

impl Win32Clipboard {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self { _private: () })
    }
}

impl ClipboardBackend for Win32Clipboard {
    fn formats(&mut self) -> Result<Vec<ClipboardFormat>, AppError> {
        let _guard = open_clipboard()?;
        let mut formats = Vec::new();
        let mut id = 0u32;
        loop {
            id = unsafe { EnumClipboardFormats(id) };
            if id == 0 {
                break;
            }
            formats.push(format_for_id(id));
        }
        Ok(formats)
    }

    fn dropped_files(&mut self) -> Result<Vec<PathBuf>, AppError> {
        let _guard = open_clipboard()?;
        let files = unsafe { query_dropped_files() };
        if !files.is_empty() {
            log::info!("📁 从剪贴板读取到 {} 个文件", files.len());
        }
        Ok(files)
    }

    fn read(&mut self, format: &ClipboardFormat) -> Result<ClipboardData, AppError> {
        let _guard = open_clipboard()?;
        match format {
            ClipboardFormat::FileDrop => {
                Ok(ClipboardData::Files(unsafe { query_dropped_files() }))
            }
            // CF_BITMAP 是 GDI 句柄，由系统合成的 CF_DIB 读取像素
            ClipboardFormat::Bitmap => {
                Ok(ClipboardData::Bytes(unsafe { copy_global_bytes(ID_DIB) }?))
            }
            other => {
                let id = id_for_format(other)?;
                Ok(ClipboardData::Bytes(unsafe { copy_global_bytes(id) }?))
            }
        }
    }

    fn write_file_drop(&mut self, paths: &[PathBuf]) -> Result<(), AppError> {
        if paths.is_empty() {
            return Err(AppError::Clipboard("没有可复制的文件路径".to_string()));
        }

        let encoded_paths: Vec<Vec<u16>> = paths
            .iter()
            .map(|path| {
                path.as_os_str()
                    .encode_wide()
                    .chain(std::iter::once(0))
                    .collect::<Vec<u16>>()
            })
            .collect();

        let _guard = open_clipboard()?;
        unsafe {
            EmptyClipboard()
                .map_err(|e| AppError::Clipboard(format!("清空剪贴板失败：{:?}", e)))?;

            let mut size = std::mem::size_of::<DROPFILES>();
            size += encoded_paths
                .iter()
                .map(|wide| wide.len() * std::mem::size_of::<u16>())
                .sum::<usize>();
            size += std::mem::size_of::<u16>();

            let hglobal = GlobalAlloc(GMEM_MOVEABLE, size)
                .map_err(|e| AppError::Clipboard(format!("分配内存失败：{:?}", e)))?;

            let ptr = GlobalLock(hglobal) as *mut u8;
            if ptr.is_null() {
                let _ = GlobalFree(Some(hglobal));
                return Err(AppError::Clipboard("锁定内存失败".to_string()));
            }

            let drop_files = ptr as *mut DROPFILES;
            std::ptr::write_bytes(drop_files, 0, 1);
            (*drop_files).pFiles = std::mem::size_of::<DROPFILES>() as u32;
            (*drop_files).fNC = false.into();
            (*drop_files).fWide = true.into();

            let mut file_ptr = ptr.add(std::mem::size_of::<DROPFILES>()) as *mut u16;
            for wide in &encoded_paths {
                std::ptr::copy_nonoverlapping(wide.as_ptr(), file_ptr, wide.len());
                file_ptr = file_ptr.add(wide.len());
            }
            *file_ptr = 0;

            let _ = GlobalUnlock(hglobal);

            if let Err(e) = SetClipboardData(ID_HDROP, Some(HANDLE(hglobal.0))) {
                let _ = GlobalFree(Some(hglobal));
                return Err(AppError::Clipboard(format!("设置剪贴板数据失败：{:?}", e)));
            }
        }

        log::info!("📁 文件引用已写入剪贴板：{} 个", paths.len());
        Ok(())
    }
}
