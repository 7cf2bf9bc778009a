//! 剪贴板快照
//!
//! # 设计思路
//!
//! 快照代表"此刻剪贴板上有什么"的一次捕获：创建时即计算候选列表，此后不可变。
//! 剪贴板内容变化后需要重新捕获一个新快照，而不是修改旧快照。
//!
//! # 实现思路
//!
//! - 捕获只读取格式列表与拖放文件（元数据），负载字节留到保存时读取。
//! - `request` 严格校验扩展名必须在候选集合内；`request_forced` 供快速粘贴使用，
//!   允许把文本内容保存为任意扩展名。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};

use super::catalog::{self, normalize_extension, Candidate, SaveStrategy};
use super::{ClipboardCapture, ClipboardHandle};
use crate::error::AppError;

static NEXT_SNAPSHOT_ID: AtomicU64 = AtomicU64::new(1);

/// 一次捕获的剪贴板视图。
#[derive(Debug, Clone)]
pub struct Snapshot {
    id: u64,
    captured_at: DateTime<Local>,
    capture: ClipboardCapture,
    candidates: Vec<Candidate>,
}

impl Snapshot {
    /// 由已捕获的元数据构造快照，候选列表在此一次性计算。
    pub fn from_capture(capture: ClipboardCapture) -> Self {
        let candidates = catalog::analyze(&capture);
        Self {
            id: NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed),
            captured_at: Local::now(),
            capture,
            candidates,
        }
    }

    /// 通过剪贴板线程捕获当前剪贴板。
    pub async fn take(clipboard: &ClipboardHandle) -> Result<Self, AppError> {
        let capture = clipboard.capture().await?;
        let snapshot = Self::from_capture(capture);
        log::debug!(
            "📸 快照 #{}：格式 {:?} → 候选 {:?}",
            snapshot.id,
            snapshot.capture.formats.iter().map(|f| f.name()).collect::<Vec<_>>(),
            snapshot.analyze()
        );
        Ok(snapshot)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    /// 有序、去重的候选扩展名；为空表示剪贴板内容无法导出。
    pub fn analyze(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.extension.clone()).collect()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn top_candidate(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub fn is_exportable(&self) -> bool {
        !self.candidates.is_empty()
    }

    pub fn dropped_files(&self) -> &[PathBuf] {
        &self.capture.dropped_files
    }

    fn find(&self, extension: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.extension == extension)
    }

    /// 构造保存请求，扩展名必须属于候选集合。
    pub fn request(
        &self,
        path: impl Into<PathBuf>,
        extension: &str,
    ) -> Result<SaveRequest, AppError> {
        let extension = normalize_extension(extension);
        let candidate = self
            .find(&extension)
            .cloned()
            .ok_or(AppError::UnsupportedFormat(extension))?;
        Ok(self.build_request(path.into(), candidate))
    }

    /// 快速粘贴指定了文件名时使用：扩展名不在候选集合内但剪贴板有文本时，
    /// 以文本策略保存为该扩展名。
    pub fn request_forced(
        &self,
        path: impl Into<PathBuf>,
        extension: &str,
    ) -> Result<SaveRequest, AppError> {
        let extension = normalize_extension(extension);
        if let Some(candidate) = self.find(&extension) {
            return Ok(self.build_request(path.into(), candidate.clone()));
        }

        let text = self
            .candidates
            .iter()
            .find(|c| c.strategy == SaveStrategy::Text)
            .ok_or_else(|| AppError::UnsupportedFormat(extension.clone()))?;

        let candidate = Candidate {
            extension,
            format: text.format.clone(),
            strategy: SaveStrategy::Text,
        };
        Ok(self.build_request(path.into(), candidate))
    }

    fn build_request(&self, path: PathBuf, candidate: Candidate) -> SaveRequest {
        SaveRequest {
            snapshot_id: self.id,
            path,
            candidate,
            dropped_files: self.capture.dropped_files.clone(),
        }
    }
}

/// 已通过校验的保存请求。
#[derive(Debug, Clone)]
pub struct SaveRequest {
    snapshot_id: u64,
    path: PathBuf,
    candidate: Candidate,
    dropped_files: Vec<PathBuf>,
}

impl SaveRequest {
    pub fn snapshot_id(&self) -> u64 {
        self.snapshot_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> &str {
        &self.candidate.extension
    }

    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    pub fn dropped_files(&self) -> &[PathBuf] {
        &self.dropped_files
    }
}
