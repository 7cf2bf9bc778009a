//! 进程内剪贴板
//!
//! 行为与系统剪贴板一致：任何写入（包括本进程写入的文件拖放引用）都会通知
//! 所有变化订阅者。用于测试，也可以在没有图形会话的环境里驱动整条流水线。

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::watcher::{ChangeCallback, ChangeFeed, FeedSubscription};
use super::{ClipboardBackend, ClipboardData, ClipboardFormat, RawImage};
use crate::error::AppError;

#[derive(Default)]
struct MemoryState {
    entries: Vec<(ClipboardFormat, ClipboardData)>,
    subscribers: Vec<(u64, ChangeCallback)>,
    next_subscriber: u64,
    file_drop_writes: Vec<Vec<PathBuf>>,
    change_count: u64,
    fail_writes: bool,
    write_delay: Duration,
}

#[derive(Clone, Default)]
pub struct MemoryClipboard {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 替换全部内容并通知订阅者。
    pub fn set_entries(&self, entries: Vec<(ClipboardFormat, ClipboardData)>) {
        let subscribers: Vec<ChangeCallback> = {
            let mut state = self.lock();
            state.entries = entries;
            state.change_count += 1;
            state.subscribers.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for callback in subscribers {
            callback();
        }
    }

    pub fn set_text(&self, text: &str) {
        self.set_entries(vec![(
            ClipboardFormat::UnicodeText,
            ClipboardData::Text(text.to_string()),
        )]);
    }

    pub fn set_image(&self, image: RawImage) {
        self.set_entries(vec![(ClipboardFormat::Bitmap, ClipboardData::Image(image))]);
    }

    pub fn set_files(&self, files: Vec<PathBuf>) {
        self.set_entries(vec![(ClipboardFormat::FileDrop, ClipboardData::Files(files))]);
    }

    /// 之后的文件拖放写入全部失败。
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// 文件拖放写入先等待 `delay` 再生效，模拟被其他进程占用的剪贴板。
    pub fn delay_writes(&self, delay: Duration) {
        self.lock().write_delay = delay;
    }

    /// 历次文件拖放写入的路径列表。
    pub fn file_drop_writes(&self) -> Vec<Vec<PathBuf>> {
        self.lock().file_drop_writes.clone()
    }

    /// 内容变化总次数（外部设置与本进程写入都计入）。
    pub fn change_count(&self) -> u64 {
        self.lock().change_count
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn feed(&self) -> MemoryFeed {
        MemoryFeed {
            clipboard: self.clone(),
        }
    }
}

impl ClipboardBackend for MemoryClipboard {
    fn formats(&mut self) -> Result<Vec<ClipboardFormat>, AppError> {
        Ok(self.lock().entries.iter().map(|(f, _)| f.clone()).collect())
    }

    fn dropped_files(&mut self) -> Result<Vec<PathBuf>, AppError> {
        let state = self.lock();
        Ok(state
            .entries
            .iter()
            .find_map(|(_, data)| match data {
                ClipboardData::Files(files) => Some(files.clone()),
                _ => None,
            })
            .unwrap_or_default())
    }

    fn read(&mut self, format: &ClipboardFormat) -> Result<ClipboardData, AppError> {
        self.lock()
            .entries
            .iter()
            .find(|(f, _)| f == format)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| AppError::Clipboard(format!("剪贴板中没有 {} 格式", format)))
    }

    fn write_file_drop(&mut self, paths: &[PathBuf]) -> Result<(), AppError> {
        let delay = self.lock().write_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        {
            let mut state = self.lock();
            if state.fail_writes {
                return Err(AppError::Clipboard("设置剪贴板数据失败".to_string()));
            }
            state.file_drop_writes.push(paths.to_vec());
        }
        self.set_files(paths.to_vec());
        Ok(())
    }
}

/// `MemoryClipboard` 的变化通知来源。
pub struct MemoryFeed {
    clipboard: MemoryClipboard,
}

impl ChangeFeed for MemoryFeed {
    fn subscribe(&self, on_change: ChangeCallback) -> Result<FeedSubscription, AppError> {
        let id = {
            let mut state = self.clipboard.lock();
            let id = state.next_subscriber;
            state.next_subscriber += 1;
            state.subscribers.push((id, on_change));
            id
        };
        let clipboard = self.clipboard.clone();
        Ok(FeedSubscription::new(move || {
            clipboard.lock().subscribers.retain(|(sid, _)| *sid != id);
        }))
    }
}
