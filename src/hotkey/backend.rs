//! `global-hotkey` 后端
//!
//! 每个活动注册独占一个线程：线程内创建 `GlobalHotKeyManager` 并注册组合，
//! 之后（Windows 上）运行消息循环，直到注销时收到 `WM_QUIT`。
//! `global-hotkey` 的事件回调是进程级的，按快捷键 id 分发到各注册。

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;

use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use once_cell::sync::Lazy;

use super::{lock_or_recover, HotkeyBackend, HotkeyBinding, HotkeyRegistration, TriggerCallback};
use crate::error::AppError;

static HANDLERS: Lazy<Mutex<HashMap<u32, TriggerCallback>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

static EVENT_HANDLER: Lazy<()> = Lazy::new(|| {
    GlobalHotKeyEvent::set_event_handler(Some(|event: GlobalHotKeyEvent| {
        if event.state != HotKeyState::Pressed {
            return;
        }
        let callback = lock_or_recover(&HANDLERS).get(&event.id).cloned();
        if let Some(callback) = callback {
            callback();
        }
    }));
});

fn map_register_error(combo: &str, err: global_hotkey::Error) -> AppError {
    match err {
        global_hotkey::Error::AlreadyRegistered(_) | global_hotkey::Error::FailedToRegister(_) => {
            AppError::RegistrationConflict(combo.to_string())
        }
        other => AppError::Hotkey(other.to_string()),
    }
}

#[derive(Default)]
pub struct GlobalHotkeyBackend;

impl GlobalHotkeyBackend {
    pub fn new() -> Self {
        Self
    }
}

impl HotkeyBackend for GlobalHotkeyBackend {
    fn register(
        &self,
        binding: &HotkeyBinding,
        on_trigger: TriggerCallback,
    ) -> Result<HotkeyRegistration, AppError> {
        let hotkey = HotKey::from_str(&binding.accelerator())
            .map_err(|e| AppError::Hotkey(format!("无法解析快捷键 {}: {}", binding, e)))?;
        Lazy::force(&EVENT_HANDLER);

        let combo = binding.to_string();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, AppError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let worker = thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                let manager = match GlobalHotKeyManager::new() {
                    Ok(manager) => manager,
                    Err(err) => {
                        let _ = ready_tx.send(Err(AppError::Hotkey(err.to_string())));
                        return;
                    }
                };
                if let Err(err) = manager.register(hotkey) {
                    let _ = ready_tx.send(Err(map_register_error(&combo, err)));
                    return;
                }

                lock_or_recover(&HANDLERS).insert(hotkey.id(), on_trigger);
                let _ = ready_tx.send(Ok(platform::current_thread_id()));

                platform::pump_until_stopped(&stop_rx);

                lock_or_recover(&HANDLERS).remove(&hotkey.id());
                if let Err(err) = manager.unregister(hotkey) {
                    log::warn!("⌨️ 注销快捷键 {} 失败: {}", combo, err);
                }
            })?;

        let thread_id = ready_rx
            .recv()
            .map_err(|_| AppError::Hotkey("快捷键线程启动失败".to_string()))??;

        Ok(HotkeyRegistration::new(move || {
            let _ = stop_tx.send(());
            platform::wake(thread_id);
            if worker.join().is_err() {
                log::warn!("⌨️ 快捷键线程异常退出");
            }
        }))
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use std::sync::mpsc::Receiver;

    use windows::Win32::Foundation::{LPARAM, WPARAM};
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, GetMessageW, PostThreadMessageW, TranslateMessage, MSG, WM_QUIT,
    };

    pub fn current_thread_id() -> u32 {
        unsafe { GetCurrentThreadId() }
    }

    /// 运行消息循环直到收到 `WM_QUIT`。
    pub fn pump_until_stopped(_stop: &Receiver<()>) {
        let mut msg = MSG::default();
        unsafe {
            while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }

    pub fn wake(thread_id: u32) {
        unsafe {
            let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use std::sync::mpsc::Receiver;

    pub fn current_thread_id() -> u32 {
        0
    }

    /// 非 Windows 平台由 `global-hotkey` 内部线程接收事件，这里只需等待注销。
    pub fn pump_until_stopped(stop: &Receiver<()>) {
        let _ = stop.recv();
    }

    pub fn wake(_thread_id: u32) {}
}
