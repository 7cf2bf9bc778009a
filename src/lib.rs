//! # PasteEx 剪贴板另存为文件 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │        协作方（命令行 / 对话框 / 托盘 / 右键菜单）          │
//! │                    Presenter · FolderLocator              │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ Result<T, AppError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕                                                  │
//! │  ┌─ monitor ──── 监控模式状态机 + 快速粘贴                 │
//! │  │    ↑ MonitorEvent 有序队列                             │
//! │  ├─ hotkey ───── 全局快捷键 (global-hotkey)               │
//! │  ├─ clipboard                                            │
//! │  │   ├─ watcher   变化监听 (clipboard-master)             │
//! │  │   ├─ snapshot  快照 + 候选格式                         │
//! │  │   ├─ catalog   格式优先级表                            │
//! │  │   ├─ actor     剪贴板专用线程                          │
//! │  │   └─ platform  Win32 / arboard 后端                    │
//! │  ├─ persist ──── 异步保存 (解码·编码·写盘)                │
//! │  ├─ naming ───── 文件名分配 / 路径缩略                    │
//! │  ├─ shell ────── 前台资源管理器位置                       │
//! │  ├─ settings / storage                                   │
//! │  └─ error ────── AppError                                │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`clipboard`] | 剪贴板线程、格式协商、快照、变化监听 |
//! | [`persist`] | 把选定格式异步保存为文件，单次完成通知 |
//! | [`naming`] | `Clipboard_yyyyMMdd (n)` 文件名分配与路径显示缩略 |
//! | [`hotkey`] | 全局快捷键注册与触发广播 |
//! | [`monitor`] | 监控模式协调器、快速粘贴、界面协作方抽象 |
//! | [`shell`] | 查询前台文件管理器正在浏览的文件夹 |
//! | [`settings`] | `settings.json` 读取与默认值 |
//! | [`storage`] | 临时目录与桌面目录 |

pub mod error;
pub mod clipboard;
pub mod hotkey;
pub mod monitor;
pub mod naming;
pub mod persist;
pub mod settings;
pub mod shell;
pub mod storage;
