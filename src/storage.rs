//! 保存目录管理
//!
//! # 设计思路
//!
//! 监控模式需要一个可写的临时目录存放自动转换的图片，交互式保存默认落在桌面。
//!
//! # 实现思路
//!
//! - 优先使用设置中的自定义临时目录。
//! - 未设置时使用程序所在目录下的 `User/Temp`，创建失败（例如安装目录只读）
//!   时回退到系统临时目录下的 `paste-ex`。
//! - 目录不存在时自动 `create_dir_all`，避免上层判断。

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::settings::AppSettings;

const APP_TEMP_SUBDIR: &str = "paste-ex";

fn ensure_dir(path: &Path) -> Result<PathBuf, AppError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| AppError::write_failed(path, e))?;
    }
    Ok(path.to_path_buf())
}

/// 程序所在目录下的 `User/Temp`。
fn exe_temp_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join("User").join("Temp"))
}

/// 获取（必要时创建）监控模式的临时目录。
pub fn temp_dir(settings: &AppSettings) -> Result<PathBuf, AppError> {
    if let Some(dir) = &settings.temp_dir {
        return ensure_dir(dir);
    }

    if let Some(dir) = exe_temp_dir() {
        match ensure_dir(&dir) {
            Ok(dir) => return Ok(dir),
            Err(err) => log::warn!("⚠️ 无法使用默认临时目录，回退系统临时目录: {}", err),
        }
    }
    ensure_dir(&std::env::temp_dir().join(APP_TEMP_SUBDIR))
}

/// 交互式保存的默认目录：桌面，取不到时依次回退主目录与当前目录。
pub fn desktop_dir() -> PathBuf {
    dirs::desktop_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_temp_dir_is_created() {
        let root = tempfile::tempdir().unwrap();
        let wanted = root.path().join("a").join("b");
        let settings = AppSettings {
            temp_dir: Some(wanted.clone()),
            ..AppSettings::default()
        };

        assert_eq!(temp_dir(&settings).unwrap(), wanted);
        assert!(wanted.is_dir());
    }

    #[test]
    fn uncreatable_temp_dir_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("occupied");
        fs::write(&file, b"").unwrap();
        let settings = AppSettings {
            temp_dir: Some(file.join("sub")),
            ..AppSettings::default()
        };

        assert!(matches!(temp_dir(&settings), Err(AppError::WriteFailed { .. })));
    }
}
