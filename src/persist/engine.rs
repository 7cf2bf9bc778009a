//! 持久化引擎
//!
//! # 设计思路
//!
//! 保存分两段：剪贴板读取必须交给剪贴板线程，解码、编码与写盘放到 tokio
//! 阻塞线程池，调用方所在的任务全程不阻塞。
//!
//! `save_async` 立即返回 `SaveTicket`，后台任务完成后通过 `oneshot` 投递结果，
//! 因此每个票据恰好完成一次；后台任务异常退出时票据得到内部错误而不是悬挂。
//!
//! 引擎从不询问是否覆盖，已存在的目标由调用方事先确认。

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use super::materialize::{self, DEFAULT_MAX_DECODED_PIXELS};
use crate::clipboard::{ClipboardHandle, SaveRequest, SaveStrategy};
use crate::error::AppError;
use crate::naming::{shorten_for_display, DEFAULT_DISPLAY_WIDTH};

#[derive(Debug, Clone)]
pub struct PersistConfig {
    /// 解码阶段允许的最大像素数。
    pub max_decoded_pixels: u64,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            max_decoded_pixels: DEFAULT_MAX_DECODED_PIXELS,
        }
    }
}

/// 一次成功保存的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub snapshot_id: u64,
    pub path: PathBuf,
    pub extension: String,
    pub bytes_written: u64,
}

#[derive(Clone)]
pub struct PersistenceEngine {
    clipboard: ClipboardHandle,
    config: PersistConfig,
}

fn join_error(err: tokio::task::JoinError) -> AppError {
    AppError::internal(format!("保存任务异常退出：{}", err))
}

impl PersistenceEngine {
    pub fn new(clipboard: ClipboardHandle, config: PersistConfig) -> Self {
        Self { clipboard, config }
    }

    pub fn clipboard(&self) -> &ClipboardHandle {
        &self.clipboard
    }

    /// 保存并等待完成。
    pub async fn save(&self, request: &SaveRequest) -> Result<SavedFile, AppError> {
        let started = Instant::now();
        let candidate = request.candidate().clone();
        let dest = request.path().to_path_buf();

        let bytes_written = match candidate.strategy {
            SaveStrategy::FileCopy => {
                let files = request.dropped_files().to_vec();
                let extension = candidate.extension.clone();
                let dest = dest.clone();
                tokio::task::spawn_blocking(move || {
                    materialize::copy_dropped_file(&files, &extension, &dest)
                })
                .await
                .map_err(join_error)??
            }
            _ => {
                let data = self.clipboard.read(candidate.format.clone()).await?;
                let max_decoded_pixels = self.config.max_decoded_pixels;
                let dest = dest.clone();
                tokio::task::spawn_blocking(move || {
                    let bytes = materialize::render(&candidate, data, max_decoded_pixels)?;
                    materialize::write_output(&dest, &bytes)
                })
                .await
                .map_err(join_error)??
            }
        };

        log::info!(
            "💾 已保存 {}（{} 字节，格式 {}，耗时 {}ms）",
            shorten_for_display(&dest.display().to_string(), DEFAULT_DISPLAY_WIDTH),
            bytes_written,
            request.candidate().format,
            started.elapsed().as_millis()
        );

        Ok(SavedFile {
            snapshot_id: request.snapshot_id(),
            path: dest,
            extension: request.extension().to_string(),
            bytes_written,
        })
    }

    /// 在后台保存，立即返回票据。须在 tokio 运行时内调用。
    pub fn save_async(&self, request: SaveRequest) -> SaveTicket {
        let (tx, rx) = oneshot::channel();
        let path = request.path().to_path_buf();
        let snapshot_id = request.snapshot_id();
        let engine = self.clone();

        tokio::spawn(async move {
            let result = engine.save(&request).await;
            if let Err(err) = &result {
                log::warn!("❌ 保存失败: {}", err);
            }
            let _ = tx.send(result);
        });

        SaveTicket {
            snapshot_id,
            path,
            rx,
        }
    }
}

/// 一次后台保存的完成通知，恰好完成一次。
#[derive(Debug)]
pub struct SaveTicket {
    snapshot_id: u64,
    path: PathBuf,
    rx: oneshot::Receiver<Result<SavedFile, AppError>>,
}

impl SaveTicket {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot_id(&self) -> u64 {
        self.snapshot_id
    }

    pub async fn wait(self) -> Result<SavedFile, AppError> {
        self.rx
            .await
            .map_err(|_| AppError::internal("保存任务未返回结果"))?
    }

    /// 等待完成，超过 `timeout` 返回 `Timeout`。
    pub async fn wait_timeout(self, timeout: Duration) -> Result<SavedFile, AppError> {
        let path = self.path.clone();
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "保存 {} 超过 {} 秒",
                    shorten_for_display(&path.display().to_string(), DEFAULT_DISPLAY_WIDTH),
                    timeout.as_secs()
                ))
            })?
    }
}
