//! 监控模式与快速粘贴
//!
//! - `coordinator`：监控模式状态机（图片自动转文件引用、快捷键快速粘贴）
//! - `quick_paste`：零交互保存到指定文件夹
//! - `presenter`：界面协作方与文件管理器定位的抽象

pub mod coordinator;
pub mod presenter;
pub mod quick_paste;

pub use coordinator::{MonitorConfig, MonitorCoordinator, MonitorHandle, MonitorState};
pub use presenter::{ExplorerLocator, FolderLocator, OverwriteDecision, Presenter};
pub use quick_paste::{normalize_location, QuickPaste, QuickPasteOutcome};
