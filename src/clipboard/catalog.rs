//! 格式目录：剪贴板格式 → 候选扩展名 + 保存策略
//!
//! 表项顺序即优先级：越"原生"、越具体的格式越靠前。

use std::path::Path;

use super::{ClipboardCapture, ClipboardFormat};

/// 可由图片格式导出的扩展名，顺序即推荐顺序。
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "bmp", "gif", "ico", "tiff"];

/// 将某种格式物化为文件的方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStrategy {
    /// 解码后按扩展名重新编码。
    Image,
    /// 原样写出字节。
    Raw,
    /// 解码文本后以 UTF-8 写出。
    Text,
    /// 去掉 CF_HTML 头部后写出。
    Html,
    /// 复制拖放的源文件。
    FileCopy,
}

/// 候选扩展名，以及产生它的格式与策略。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub extension: String,
    pub format: ClipboardFormat,
    pub strategy: SaveStrategy,
}

impl Candidate {
    pub fn is_image(&self) -> bool {
        is_image_extension(&self.extension)
    }
}

enum Extensions {
    Fixed(&'static [&'static str]),
    /// 由拖放文件自身的扩展名决定。
    FromDroppedFiles,
}

struct CatalogEntry {
    format: ClipboardFormat,
    extensions: Extensions,
    strategy: SaveStrategy,
}

fn entry(format: ClipboardFormat, extensions: Extensions, strategy: SaveStrategy) -> CatalogEntry {
    CatalogEntry { format, extensions, strategy }
}

fn catalog() -> [CatalogEntry; 9] {
    use ClipboardFormat as F;
    use Extensions::{Fixed, FromDroppedFiles};
    let images = || Fixed(IMAGE_EXTENSIONS);
    [
        entry(F::FileDrop, FromDroppedFiles, SaveStrategy::FileCopy),
        entry(F::Png, images(), SaveStrategy::Image),
        entry(F::DibV5, images(), SaveStrategy::Image),
        entry(F::Dib, images(), SaveStrategy::Image),
        entry(F::Bitmap, images(), SaveStrategy::Image),
        entry(F::Html, Fixed(&["html"]), SaveStrategy::Html),
        entry(F::Rtf, Fixed(&["rtf"]), SaveStrategy::Raw),
        entry(F::UnicodeText, Fixed(&["txt"]), SaveStrategy::Text),
        entry(F::Text, Fixed(&["txt"]), SaveStrategy::Text),
    ]
}

pub fn is_image_extension(extension: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str())
}

/// 扩展名规范化：去掉前导点、转小写。
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_extension)
        .filter(|ext| !ext.is_empty())
}

/// 根据捕获的格式列表推导有序、去重的候选列表。
///
/// 不存在的格式被跳过；跨格式重复的扩展名保留首次出现的位置。
/// 没有可识别格式时返回空列表。
pub fn analyze(capture: &ClipboardCapture) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = Vec::new();

    for entry in catalog() {
        if !capture.formats.contains(&entry.format) {
            continue;
        }

        let extensions: Vec<String> = match entry.extensions {
            Extensions::Fixed(list) => list.iter().map(|ext| ext.to_string()).collect(),
            Extensions::FromDroppedFiles => capture
                .dropped_files
                .iter()
                .filter_map(|path| file_extension(path))
                .collect(),
        };

        for extension in extensions {
            if candidates.iter().any(|c| c.extension == extension) {
                continue;
            }
            candidates.push(Candidate {
                extension,
                format: entry.format.clone(),
                strategy: entry.strategy,
            });
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn capture(formats: &[ClipboardFormat]) -> ClipboardCapture {
        ClipboardCapture {
            formats: formats.to_vec(),
            dropped_files: Vec::new(),
        }
    }

    fn extensions(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.extension.as_str()).collect()
    }

    #[test]
    fn empty_clipboard_yields_no_candidates() {
        assert!(analyze(&capture(&[])).is_empty());
        assert!(analyze(&capture(&[ClipboardFormat::Other("Locale".into())])).is_empty());
    }

    #[test]
    fn image_formats_collapse_to_one_extension_list() {
        let result = analyze(&capture(&[
            ClipboardFormat::Dib,
            ClipboardFormat::Bitmap,
            ClipboardFormat::DibV5,
        ]));
        assert_eq!(extensions(&result), IMAGE_EXTENSIONS.to_vec());
        // 先出现的格式胜出：DIBV5 排在 DIB 前
        assert_eq!(result[0].format, ClipboardFormat::DibV5);
    }

    #[test]
    fn browser_copy_ranks_image_before_html_and_text() {
        let result = analyze(&capture(&[
            ClipboardFormat::UnicodeText,
            ClipboardFormat::Html,
            ClipboardFormat::Png,
            ClipboardFormat::Text,
        ]));
        assert_eq!(
            extensions(&result),
            vec!["png", "jpg", "bmp", "gif", "ico", "tiff", "html", "txt"]
        );
        assert_eq!(result[0].format, ClipboardFormat::Png);
        assert_eq!(result.last().map(|c| c.format.clone()), Some(ClipboardFormat::UnicodeText));
    }

    #[test]
    fn dropped_files_contribute_their_own_extensions() {
        let result = analyze(&ClipboardCapture {
            formats: vec![ClipboardFormat::FileDrop, ClipboardFormat::UnicodeText],
            dropped_files: vec![
                PathBuf::from("C:/tmp/report.PDF"),
                PathBuf::from("C:/tmp/Makefile"),
                PathBuf::from("C:/tmp/notes.txt"),
                PathBuf::from("C:/tmp/other.pdf"),
            ],
        });
        assert_eq!(extensions(&result), vec!["pdf", "txt"]);
        assert_eq!(result[1].strategy, SaveStrategy::FileCopy);
    }

    #[test]
    fn normalize_extension_strips_dot_and_case() {
        assert_eq!(normalize_extension(".PNG"), "png");
        assert_eq!(normalize_extension(" txt "), "txt");
        assert!(is_image_extension("JPG"));
        assert!(!is_image_extension("html"));
    }
}
