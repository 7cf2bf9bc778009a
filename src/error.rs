//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，覆盖剪贴板协商、持久化、快捷键、
//! 监控模式与快速粘贴的所有失败分支。
//!
//! 所有对外操作统一返回 `Result<T, AppError>`，文件系统与剪贴板 API 的失败
//! 在操作边界处转换为下列某一种错误，不做静默吞掉。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - `WriteFailed` 保留目标路径与底层 `io::Error`，便于调用方决定是否重试。
//! - `is_fatal` / `is_warning` 给命令行与监控模式统一的呈现策略。

use std::path::PathBuf;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 剪贴板中没有任何可导出的格式
    #[error("剪贴板内容无法识别，没有可导出的格式")]
    NoRecognizedFormat,

    /// 请求的扩展名不在当前快照的候选列表中
    #[error("不支持的保存格式: {0}")]
    UnsupportedFormat(String),

    /// 写入目标文件失败
    #[error("写入文件失败 '{}': {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 全局快捷键已被其他程序占用
    #[error("快捷键 {0} 已被其他程序占用")]
    RegistrationConflict(String),

    /// 当前监听器已有活动绑定，需先注销
    #[error("快捷键 {0} 已注册，请先注销后再注册")]
    HotkeyAlreadyActive(String),

    /// 快速粘贴的目标目录不存在
    #[error("目标目录不存在: {}", .0.display())]
    TargetPathNotExist(PathBuf),

    /// 停止监控模式时找不到协调器实例
    #[error("无法获取监控模式协调器")]
    NoMainWindow,

    /// 剪贴板读写操作失败
    #[error("剪贴板操作失败: {0}")]
    Clipboard(String),

    /// 图片解码 / 编码失败
    #[error("图片处理失败: {0}")]
    Image(String),

    /// 快捷键后端的其他错误
    #[error("快捷键操作失败: {0}")]
    Hotkey(String),

    /// 设置文件读写失败
    #[error("设置错误: {0}")]
    Settings(String),

    /// 等待超时
    #[error("等待超时: {0}")]
    Timeout(String),

    /// 其他文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// 构造写入失败错误。
    pub fn write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFailed {
            path: path.into(),
            source,
        }
    }

    /// 后台任务异常（panic、通道提前关闭）等内部错误。
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Io(std::io::Error::other(message.into()))
    }

    /// 系统已处于不一致状态，调用方应终止进程。
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoMainWindow)
    }

    /// 仅需提示、不影响流程继续的错误。
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::RegistrationConflict(_) | Self::NoRecognizedFormat)
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn write_failed_message_includes_path() {
        let err = AppError::write_failed(
            "C:/out/a.png",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let message = err.to_string();
        assert!(message.contains("C:/out/a.png"));
        assert!(message.contains("denied"));
    }

    #[test]
    fn only_missing_coordinator_is_fatal() {
        assert!(AppError::NoMainWindow.is_fatal());
        assert!(!AppError::NoRecognizedFormat.is_fatal());
        assert!(AppError::RegistrationConflict("Ctrl+Alt+X".into()).is_warning());
        assert!(!AppError::UnsupportedFormat("exe".into()).is_warning());
    }
}
