//! 文件管理器查询
//!
//! 快捷键触发快速粘贴时需要知道"用户正在看哪个文件夹"：
//! 前台是桌面（`Progman` / `WorkerW`）时返回桌面目录，
//! 前台是资源管理器窗口时通过 `IShellWindows` 找到同一窗口并读取其地址。

use std::path::PathBuf;

/// 把 `file:///` URL 转换为本地路径（含百分号解码），非文件 URL 返回 `None`。
pub fn file_url_to_path(url: &str) -> Option<PathBuf> {
    let url = url.trim();
    let scheme_len = "file://".len();
    let rest = match url.get(..scheme_len) {
        Some(scheme) if scheme.eq_ignore_ascii_case("file://") => &url[scheme_len..],
        _ => return None,
    };
    let decoded = percent_encoding::percent_decode_str(rest)
        .decode_utf8_lossy()
        .into_owned();

    // file:///C:/x → C:/x；file://server/share → //server/share（UNC）
    let path = match decoded.strip_prefix('/') {
        Some(local) if local.as_bytes().get(1) == Some(&b':') => local.to_string(),
        Some(_) => decoded,
        None => format!("//{}", decoded),
    };
    if path.is_empty() {
        return None;
    }

    if cfg!(target_os = "windows") {
        Some(PathBuf::from(path.replace('/', "\\")))
    } else {
        Some(PathBuf::from(path))
    }
}

/// 当前前台文件管理器正在浏览的文件夹。
#[cfg(target_os = "windows")]
pub fn active_explorer_location() -> Option<PathBuf> {
    use windows::core::{Interface, VARIANT};
    use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
    use windows::Win32::System::Com::{
        CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_ALL, COINIT_APARTMENTTHREADED,
    };
    use windows::Win32::UI::Shell::{IShellWindows, IWebBrowser2, ShellWindows};
    use windows::Win32::UI::WindowsAndMessaging::{GetClassNameW, GetForegroundWindow};

    let hwnd = unsafe { GetForegroundWindow() };
    if hwnd.is_invalid() {
        return None;
    }

    let mut buf = [0u16; 256];
    let len = unsafe { GetClassNameW(hwnd, &mut buf) };
    let class = String::from_utf16_lossy(&buf[..len.max(0) as usize]);
    match class.as_str() {
        "Progman" | "WorkerW" => return dirs::desktop_dir(),
        "CabinetWClass" | "ExploreWClass" => {}
        _ => {
            log::debug!("🗂️ 前台窗口不是文件管理器: {}", class);
            return None;
        }
    }

    unsafe {
        let hr = CoInitializeEx(None, COINIT_APARTMENTTHREADED);
        let need_uninit = hr.is_ok();
        if !need_uninit && hr != RPC_E_CHANGED_MODE {
            log::warn!("初始化 COM 失败: {:?}", hr);
            return None;
        }

        let location = (|| -> windows::core::Result<Option<String>> {
            let shell_windows: IShellWindows = CoCreateInstance(&ShellWindows, None, CLSCTX_ALL)?;
            let count = shell_windows.Count()?;
            for i in 0..count {
                let Ok(item) = shell_windows.Item(&VARIANT::from(i)) else {
                    continue;
                };
                let Ok(browser) = item.cast::<IWebBrowser2>() else {
                    continue;
                };
                if browser.HWND()?.0 == hwnd.0 as isize {
                    return Ok(Some(browser.LocationURL()?.to_string()));
                }
            }
            Ok(None)
        })();

        if need_uninit {
            CoUninitialize();
        }

        match location {
            Ok(Some(url)) => file_url_to_path(&url),
            Ok(None) => None,
            Err(err) => {
                log::warn!("🗂️ 查询资源管理器窗口失败: {}", err);
                None
            }
        }
    }
}

#[cfg(not(target_os = "windows"))]
pub fn active_explorer_location() -> Option<PathBuf> {
    log::debug!("🗂️ 当前平台不支持查询文件管理器位置");
    None
}
