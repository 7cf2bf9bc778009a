//! 全局快捷键监听
//!
//! # 设计思路
//!
//! 每个监听器最多持有一个活动绑定：重复注册视为调用方逻辑错误
//! （`HotkeyAlreadyActive`），被其他程序占用则为 `RegistrationConflict`。
//! 触发事件通过 `broadcast` 推送给所有订阅者，不做轮询。
//!
//! # 实现思路
//!
//! - `HotkeyBackend` 抽象系统注册，生产实现为 `GlobalHotkeyBackend`，
//!   测试与无图形环境使用 `ManualHotkeys`。
//! - 注册返回 `HotkeyRegistration`，drop 即注销。

pub mod backend;
pub mod manual;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local};
use tokio::sync::broadcast;

use crate::error::AppError;

pub use backend::GlobalHotkeyBackend;
pub use manual::ManualHotkeys;

pub const DEFAULT_HOTKEY: &str = "Ctrl+Alt+X";

const EVENT_CAPACITY: usize = 16;

/// 修饰键集合 + 主键，例如 `Ctrl+Alt+X`。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HotkeyBinding {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub win: bool,
    /// 规范化为大写的主键名（`X`、`F5`、`0` …）。
    pub key: String,
}

impl HotkeyBinding {
    fn has_modifier(&self) -> bool {
        self.ctrl || self.alt || self.shift || self.win
    }

    /// `global-hotkey` 可解析的加速键字符串。
    pub fn accelerator(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("ctrl");
        }
        if self.alt {
            parts.push("alt");
        }
        if self.shift {
            parts.push("shift");
        }
        if self.win {
            parts.push("super");
        }
        parts.push(self.key.as_str());
        parts.join("+")
    }
}

impl FromStr for HotkeyBinding {
    type Err = AppError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut binding = HotkeyBinding {
            ctrl: false,
            alt: false,
            shift: false,
            win: false,
            key: String::new(),
        };

        for part in text.split('+').map(str::trim) {
            match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => binding.ctrl = true,
                "alt" | "option" => binding.alt = true,
                "shift" => binding.shift = true,
                "win" | "super" | "meta" | "cmd" => binding.win = true,
                "" => return Err(AppError::Hotkey(format!("无效的快捷键: {}", text))),
                _ if !binding.key.is_empty() => {
                    return Err(AppError::Hotkey(format!("快捷键只能包含一个主键: {}", text)));
                }
                _ => binding.key = part.to_ascii_uppercase(),
            }
        }

        if binding.key.is_empty() || !binding.has_modifier() {
            return Err(AppError::Hotkey(format!(
                "快捷键需要至少一个修饰键和一个主键: {}",
                text
            )));
        }
        Ok(binding)
    }
}

impl fmt::Display for HotkeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.alt {
            f.write_str("Alt+")?;
        }
        if self.shift {
            f.write_str("Shift+")?;
        }
        if self.win {
            f.write_str("Win+")?;
        }
        f.write_str(&self.key)
    }
}

/// 一次快捷键触发。
#[derive(Debug, Clone)]
pub struct KeyPressed {
    pub binding: HotkeyBinding,
    pub at: DateTime<Local>,
}

pub type TriggerCallback = Arc<dyn Fn() + Send + Sync>;

/// 一次系统快捷键注册，drop 或 `release` 时注销。
pub struct HotkeyRegistration {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl HotkeyRegistration {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for HotkeyRegistration {
    fn drop(&mut self) {
        self.run_release();
    }
}

/// 系统快捷键注册后端。
pub trait HotkeyBackend: Send + Sync {
    fn register(
        &self,
        binding: &HotkeyBinding,
        on_trigger: TriggerCallback,
    ) -> Result<HotkeyRegistration, AppError>;
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("快捷键状态锁中毒，继续使用恢复数据");
            poisoned.into_inner()
        }
    }
}

pub struct HotkeyListener {
    backend: Arc<dyn HotkeyBackend>,
    active: Mutex<Option<(HotkeyBinding, HotkeyRegistration)>>,
    events: broadcast::Sender<KeyPressed>,
}

impl HotkeyListener {
    pub fn new(backend: Arc<dyn HotkeyBackend>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            active: Mutex::new(None),
            events,
        }
    }

    /// 基于 `global-hotkey` 的系统监听器。
    pub fn system() -> Self {
        Self::new(Arc::new(GlobalHotkeyBackend::new()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<KeyPressed> {
        self.events.subscribe()
    }

    pub fn active_binding(&self) -> Option<HotkeyBinding> {
        lock_or_recover(&self.active)
            .as_ref()
            .map(|(binding, _)| binding.clone())
    }

    pub fn register(&self, binding: HotkeyBinding) -> Result<(), AppError> {
        let mut active = lock_or_recover(&self.active);
        if let Some((current, _)) = active.as_ref() {
            return Err(AppError::HotkeyAlreadyActive(current.to_string()));
        }

        let events = self.events.clone();
        let pressed = binding.clone();
        let on_trigger: TriggerCallback = Arc::new(move || {
            log::debug!("⌨️ 快捷键触发: {}", pressed);
            let _ = events.send(KeyPressed {
                binding: pressed.clone(),
                at: Local::now(),
            });
        });

        let registration = self.backend.register(&binding, on_trigger)?;
        log::info!("⌨️ 快捷键已注册: {}", binding);
        *active = Some((binding, registration));
        Ok(())
    }

    /// 注销当前绑定，没有绑定时什么也不做。
    pub fn unregister(&self) {
        let taken = lock_or_recover(&self.active).take();
        if let Some((binding, registration)) = taken {
            registration.release();
            log::info!("⌨️ 快捷键已注销: {}", binding);
        }
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.unregister();
    }
}
