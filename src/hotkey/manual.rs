//! 进程内快捷键后端
//!
//! 由调用方手动"按下"快捷键，可模拟被其他程序占用的组合。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::{lock_or_recover, HotkeyBackend, HotkeyBinding, HotkeyRegistration, TriggerCallback};
use crate::error::AppError;

#[derive(Default)]
struct ManualState {
    registered: HashMap<HotkeyBinding, TriggerCallback>,
    occupied: HashSet<HotkeyBinding>,
}

#[derive(Clone, Default)]
pub struct ManualHotkeys {
    state: Arc<Mutex<ManualState>>,
}

impl ManualHotkeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// 把组合标记为已被其他程序占用。
    pub fn occupy(&self, binding: HotkeyBinding) {
        lock_or_recover(&self.state).occupied.insert(binding);
    }

    /// 触发一次按键，返回该组合当前是否已注册。
    pub fn press(&self, binding: &HotkeyBinding) -> bool {
        let callback = lock_or_recover(&self.state).registered.get(binding).cloned();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self, binding: &HotkeyBinding) -> bool {
        lock_or_recover(&self.state).registered.contains_key(binding)
    }
}

impl HotkeyBackend for ManualHotkeys {
    fn register(
        &self,
        binding: &HotkeyBinding,
        on_trigger: TriggerCallback,
    ) -> Result<HotkeyRegistration, AppError> {
        let mut state = lock_or_recover(&self.state);
        if state.occupied.contains(binding) || state.registered.contains_key(binding) {
            return Err(AppError::RegistrationConflict(binding.to_string()));
        }
        state.registered.insert(binding.clone(), on_trigger);

        let shared = Arc::clone(&self.state);
        let binding = binding.clone();
        Ok(HotkeyRegistration::new(move || {
            lock_or_recover(&shared).registered.remove(&binding);
        }))
    }
}
