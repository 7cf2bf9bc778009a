//! 文件名分配与路径显示缩略
//!
//! # 设计思路
//!
//! 默认文件名为 `Clipboard_yyyyMMdd`，同名文件已存在时依次尝试
//! `Clipboard_yyyyMMdd (1)`、`(2)` …，探测次数有上限，超过后退回固定名称，
//! 避免在异常目录上无限探测。
//!
//! 路径缩略用于日志与提示：按双字节代码页规则计宽（ASCII 为 1，其余为 2），
//! 尽量保留最后一级文件名，中间以 `...` 省略。

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

use crate::error::AppError;

/// 同名探测的最大序号。
pub const MAX_NAME_PROBES: u32 = 300;

/// 探测全部失败时使用的文件名。
pub const FALLBACK_FILE_NAME: &str = "Default";

/// 缩略显示的默认宽度。
pub const DEFAULT_DISPLAY_WIDTH: usize = 47;

const ELLIPSIS: &str = "...";

fn candidate_path(folder: &Path, name: &str, extension: &str) -> PathBuf {
    if extension.is_empty() {
        folder.join(name)
    } else {
        folder.join(format!("{}.{}", name, extension))
    }
}

/// 以今天的本地日期生成不与 `folder` 中已有文件冲突的文件名（不含扩展名）。
pub fn generate_file_name(folder: &Path, extension: &str) -> String {
    generate_file_name_on(folder, extension, Local::now().date_naive())
}

/// 指定日期的版本。
pub fn generate_file_name_on(folder: &Path, extension: &str, date: NaiveDate) -> String {
    let base = format!("Clipboard_{}", date.format("%Y%m%d"));
    if !candidate_path(folder, &base, extension).exists() {
        return base;
    }

    for n in 1..=MAX_NAME_PROBES {
        let name = format!("{} ({})", base, n);
        if !candidate_path(folder, &name, extension).exists() {
            return name;
        }
    }

    log::warn!(
        "⚠️ {} 中同名文件超过 {} 个，使用默认文件名",
        shorten_for_display(&folder.display().to_string(), DEFAULT_DISPLAY_WIDTH),
        MAX_NAME_PROBES
    );
    FALLBACK_FILE_NAME.to_string()
}

/// `generate_file_name` 的异步版本：目录探测放到阻塞线程池执行。
pub async fn allocate_file_name(folder: &Path, extension: &str) -> Result<String, AppError> {
    let folder = folder.to_path_buf();
    let extension = extension.to_string();
    tokio::task::spawn_blocking(move || generate_file_name(&folder, &extension))
        .await
        .map_err(|e| AppError::internal(format!("文件名分配任务异常：{}", e)))
}

fn char_width(c: char) -> usize {
    if c.is_ascii() { 1 } else { 2 }
}

/// 按双字节代码页规则计算显示宽度。
pub fn display_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

fn is_separator(c: char) -> bool {
    c == '\\' || c == '/'
}

/// 保留开头的字符，直到累计宽度即将达到 `n`。
fn cut(text: &str, n: usize) -> String {
    let mut width = 0;
    let mut out = String::new();
    for c in text.chars() {
        width += char_width(c);
        if width >= n {
            break;
        }
        out.push(c);
    }
    out
}

/// 把过长路径缩略为不超过 `max_width` 的显示文本。
pub fn shorten_for_display(path: &str, max_width: usize) -> String {
    if display_width(path) <= max_width {
        return path.to_string();
    }
    if max_width <= ELLIPSIS.len() {
        return cut(path, max_width + 1);
    }

    let chars: Vec<char> = path.chars().collect();
    let tail_start = (0..chars.len().saturating_sub(1))
        .rev()
        .find(|&i| is_separator(chars[i]));

    if let Some(start) = tail_start {
        let tail: String = chars[start..].iter().collect();
        let budget = max_width as isize - ELLIPSIS.len() as isize - display_width(&tail) as isize;
        if budget >= 3 {
            return format!("{}{}{}", cut(path, budget as usize), ELLIPSIS, tail);
        }
    }

    format!("{}{}", cut(path, max_width - ELLIPSIS.len()), ELLIPSIS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn jan_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn first_name_then_numbered_suffix() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            generate_file_name_on(dir.path(), "png", jan_first()),
            "Clipboard_20240101"
        );

        fs::write(dir.path().join("Clipboard_20240101.png"), b"").unwrap();
        assert_eq!(
            generate_file_name_on(dir.path(), "png", jan_first()),
            "Clipboard_20240101 (1)"
        );

        // 其他扩展名不算冲突
        assert_eq!(
            generate_file_name_on(dir.path(), "txt", jan_first()),
            "Clipboard_20240101"
        );
    }

    #[test]
    fn falls_back_after_probe_limit() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Clipboard_20240101.txt"), b"").unwrap();
        for n in 1..=MAX_NAME_PROBES {
            fs::write(dir.path().join(format!("Clipboard_20240101 ({}).txt", n)), b"").unwrap();
        }
        assert_eq!(
            generate_file_name_on(dir.path(), "txt", jan_first()),
            FALLBACK_FILE_NAME
        );
    }

    #[tokio::test]
    async fn async_allocation_sees_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = allocate_file_name(dir.path(), "png").await.unwrap();
        assert_eq!(first, generate_file_name(dir.path(), "png"));

        fs::write(dir.path().join(format!("{}.png", first)), b"").unwrap();
        let second = allocate_file_name(dir.path(), "png").await.unwrap();
        assert_eq!(second, format!("{} (1)", first));
    }

    #[test]
    fn keeps_file_name_when_shortening() {
        let shortened =
            shorten_for_display(r"C:\a\verylongfoldernamegoeshere\b\c\d\file.txt", 20);
        assert!(shortened.ends_with(r"...\file.txt"), "{}", shortened);
        assert!(display_width(&shortened) <= 20);
    }

    #[test]
    fn short_paths_are_untouched() {
        assert_eq!(shorten_for_display(r"C:\a.txt", 47), r"C:\a.txt");
    }

    #[test]
    fn wide_characters_count_double() {
        assert_eq!(display_width("剪贴板a"), 7);
        let shortened = shorten_for_display("/桌面/很长很长很长很长的目录名/图片.png", 20);
        assert!(display_width(&shortened) <= 20, "{}", shortened);
        assert!(shortened.ends_with("/图片.png"));
    }

    #[test]
    fn falls_back_to_prefix_when_tail_is_too_long() {
        let shortened = shorten_for_display("/averyveryverylongfilename.txt", 12);
        assert_eq!(shortened, "/averyve...");
    }
}
