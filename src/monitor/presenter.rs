use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::persist::SavedFile;

/// 目标文件已存在时的处理方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteDecision {
    Overwrite,
    Skip,
}

/// 界面协作方：对话框、托盘、命令行输出都通过它呈现。
///
/// 方法可能阻塞（例如等待用户输入），调用方会放到阻塞线程池执行。
pub trait Presenter: Send + Sync {
    /// 监控模式开始后切换到后台（隐藏窗口、显示托盘等）。
    fn enter_background(&self);

    fn warn(&self, error: &AppError);

    fn confirm_overwrite(&self, path: &Path) -> OverwriteDecision;

    fn notify_saved(&self, _file: &SavedFile) {}
}

/// 当前前台文件管理器所在的文件夹。
pub trait FolderLocator: Send + Sync {
    fn active_folder(&self) -> Option<PathBuf>;
}

impl<F> FolderLocator for F
where
    F: Fn() -> Option<PathBuf> + Send + Sync,
{
    fn active_folder(&self) -> Option<PathBuf> {
        self()
    }
}

/// 通过 Shell 查询前台资源管理器窗口。
pub struct ExplorerLocator;

impl FolderLocator for ExplorerLocator {
    fn active_folder(&self) -> Option<PathBuf> {
        crate::shell::active_explorer_location()
    }
}
