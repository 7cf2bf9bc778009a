//! 应用设置
//!
//! 设置保存在 `<配置目录>/paste-ex/settings.json`，键名使用 camelCase。
//! 文件缺失时使用默认值；文件损坏时记录警告并回退默认值，不阻止启动。
//! 读入后统一做范围钳制，避免异常配置导致无限等待或超大解码。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::hotkey::{HotkeyBinding, DEFAULT_HOTKEY};
use crate::persist::materialize::DEFAULT_MAX_DECODED_PIXELS;
use crate::persist::PersistConfig;

const SETTINGS_DIR_NAME: &str = "paste-ex";
const SETTINGS_FILE_NAME: &str = "settings.json";

const SAVE_TIMEOUT_RANGE: (u64, u64) = (1, 600);
const CLIPBOARD_TIMEOUT_RANGE: (u64, u64) = (100, 60_000);
const MAX_DECODED_PIXELS_RANGE: (u64, u64) = (1, 500_000_000);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// 监控模式下是否把复制的图片自动转换为文件引用。
    pub auto_image_to_file: bool,
    pub hotkey: String,
    /// 监控模式的临时保存目录，为空时使用默认位置。
    pub temp_dir: Option<PathBuf>,
    pub save_timeout_secs: u64,
    pub clipboard_timeout_ms: u64,
    pub max_decoded_pixels: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_image_to_file: true,
            hotkey: DEFAULT_HOTKEY.to_string(),
            temp_dir: None,
            save_timeout_secs: 60,
            clipboard_timeout_ms: 5_000,
            max_decoded_pixels: DEFAULT_MAX_DECODED_PIXELS,
        }
    }
}

impl AppSettings {
    /// 把数值字段钳制到允许范围。
    pub fn clamped(mut self) -> Self {
        self.save_timeout_secs = self
            .save_timeout_secs
            .clamp(SAVE_TIMEOUT_RANGE.0, SAVE_TIMEOUT_RANGE.1);
        self.clipboard_timeout_ms = self
            .clipboard_timeout_ms
            .clamp(CLIPBOARD_TIMEOUT_RANGE.0, CLIPBOARD_TIMEOUT_RANGE.1);
        self.max_decoded_pixels = self
            .max_decoded_pixels
            .clamp(MAX_DECODED_PIXELS_RANGE.0, MAX_DECODED_PIXELS_RANGE.1);
        if self.temp_dir.as_ref().is_some_and(|dir| dir.as_os_str().is_empty()) {
            self.temp_dir = None;
        }
        self
    }

    pub fn save_timeout(&self) -> Duration {
        Duration::from_secs(self.save_timeout_secs)
    }

    pub fn clipboard_timeout(&self) -> Duration {
        Duration::from_millis(self.clipboard_timeout_ms)
    }

    pub fn persist_config(&self) -> PersistConfig {
        PersistConfig {
            max_decoded_pixels: self.max_decoded_pixels,
        }
    }

    pub fn hotkey_binding(&self) -> Result<HotkeyBinding, AppError> {
        self.hotkey.parse()
    }
}

/// 默认设置文件位置。
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME))
}

/// 读取设置文件；文件不存在时返回 `None`。
pub fn read_settings(path: &Path) -> Result<Option<AppSettings>, AppError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    let parsed = serde_json::from_str::<AppSettings>(&content)
        .map_err(|e| AppError::Settings(format!("解析设置文件失败: {}", e)))?;
    Ok(Some(parsed.clamped()))
}

/// 读取设置，任何失败都回退默认值。
pub fn load_or_default(path: Option<&Path>) -> AppSettings {
    let Some(path) = path else {
        return AppSettings::default();
    };

    match read_settings(path) {
        Ok(Some(settings)) => {
            log::info!("⚙️ 已加载设置: {}", path.display());
            settings
        }
        Ok(None) => AppSettings::default(),
        Err(err) => {
            log::warn!("⚠️ {}，使用默认设置", err);
            AppSettings::default()
        }
    }
}
