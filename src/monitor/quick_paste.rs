//! 快速粘贴
//!
//! 零交互地把剪贴板内容保存到指定文件夹：右键菜单与快捷键共用这一入口。
//! 只有目标文件已存在时才询问界面协作方。
//!
//! 同一个 `QuickPaste`（及其克隆）上的粘贴逐个执行：从分配文件名到保存完成
//! 始终持有同一把锁，连续触发的快捷键不会分到同一个文件名。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use super::presenter::{OverwriteDecision, Presenter};
use crate::clipboard::catalog::normalize_extension;
use crate::clipboard::Snapshot;
use crate::error::AppError;
use crate::naming::{allocate_file_name, shorten_for_display, DEFAULT_DISPLAY_WIDTH};
use crate::persist::{PersistenceEngine, SavedFile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuickPasteOutcome {
    Saved(SavedFile),
    /// 目标已存在且用户选择跳过。
    Skipped(PathBuf),
}

/// 去掉 shell 引号残留（`"C:\dir\"` 传参后末尾会多出 `"`）。
pub fn normalize_location(location: &str) -> PathBuf {
    let trimmed = location.trim();
    let trimmed = trimmed.strip_suffix('"').unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix('"').unwrap_or(trimmed);
    PathBuf::from(trimmed)
}

#[derive(Clone)]
pub struct QuickPaste {
    engine: PersistenceEngine,
    presenter: Arc<dyn Presenter>,
    save_timeout: Duration,
    serial: Arc<Mutex<()>>,
}

impl QuickPaste {
    pub fn new(
        engine: PersistenceEngine,
        presenter: Arc<dyn Presenter>,
        save_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            presenter,
            save_timeout,
            serial: Arc::new(Mutex::new(())),
        }
    }

    /// 把当前剪贴板保存到 `location`。
    ///
    /// 未给出文件名时按日期分配；给出的文件名扩展名不在候选中但剪贴板有文本时，
    /// 文本按该扩展名保存。
    pub async fn quick_paste_ex(
        &self,
        location: &str,
        file_name: Option<&str>,
    ) -> Result<QuickPasteOutcome, AppError> {
        let folder = normalize_location(location);
        let _turn = self.serial.lock().await;
        let snapshot = Snapshot::take(self.engine.clipboard()).await?;
        let top = snapshot
            .top_candidate()
            .ok_or(AppError::NoRecognizedFormat)?
            .extension
            .clone();

        if !folder.is_dir() {
            return Err(AppError::TargetPathNotExist(folder));
        }

        let request = match file_name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => {
                let extension = Path::new(name)
                    .extension()
                    .map(|ext| normalize_extension(&ext.to_string_lossy()))
                    .unwrap_or_default();
                if extension.is_empty() {
                    snapshot.request(folder.join(format!("{}.{}", name, top)), &top)?
                } else {
                    snapshot.request_forced(folder.join(name), &extension)?
                }
            }
            None => {
                let name = allocate_file_name(&folder, &top).await?;
                snapshot.request(folder.join(format!("{}.{}", name, top)), &top)?
            }
        };

        let target = request.path().to_path_buf();
        if target.exists() {
            let presenter = Arc::clone(&self.presenter);
            let asked = target.clone();
            let decision = tokio::task::spawn_blocking(move || presenter.confirm_overwrite(&asked))
                .await
                .map_err(|e| AppError::internal(format!("确认覆盖失败：{}", e)))?;
            if decision == OverwriteDecision::Skip {
                log::info!(
                    "⏭️ 已跳过已存在的文件: {}",
                    shorten_for_display(&target.display().to_string(), DEFAULT_DISPLAY_WIDTH)
                );
                return Ok(QuickPasteOutcome::Skipped(target));
            }
        }

        let saved = self
            .engine
            .save_async(request)
            .wait_timeout(self.save_timeout)
            .await?;
        self.presenter.notify_saved(&saved);
        Ok(QuickPasteOutcome::Saved(saved))
    }
}
