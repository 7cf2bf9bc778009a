//! 负载物化：把剪贴板原始数据转换为目标文件字节
//!
//! # 实现思路
//!
//! - 图片：`PNG` 字节、DIB（无文件头的 BMP）或 RGBA 像素先解码，解码前按头信息
//!   校验像素上限，再按扩展名重新编码。`PNG → png` 直接透传原始字节。
//! - 文本：UTF-16LE / ANSI 解码后以 UTF-8 写出，去掉结尾的 NUL。
//! - HTML：按 `CF_HTML` 头部的 `StartHTML` / `EndHTML` 偏移截取文档。
//! - 文件拖放：复制扩展名匹配的第一个源文件。
//!
//! 本模块全部为同步函数，由持久化引擎放到阻塞线程池执行。

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::bmp::BmpDecoder;
use image::codecs::png::PngDecoder;
use image::{DynamicImage, ImageDecoder, ImageFormat, RgbaImage};

use crate::clipboard::catalog::normalize_extension;
use crate::clipboard::{Candidate, ClipboardData, ClipboardFormat, SaveStrategy};
use crate::error::AppError;

/// 默认解码像素上限（约 4000 万像素）。
pub const DEFAULT_MAX_DECODED_PIXELS: u64 = 40_000_000;

/// ICO 单帧的最大边长。
const ICO_MAX_SIDE: u32 = 256;

fn image_error(context: &str, err: image::ImageError) -> AppError {
    AppError::Image(format!("{}：{}", context, err))
}

/// 把剪贴板数据渲染为目标文件字节。`FileCopy` 策略不经过这里。
pub fn render(
    candidate: &Candidate,
    data: ClipboardData,
    max_decoded_pixels: u64,
) -> Result<Vec<u8>, AppError> {
    match candidate.strategy {
        SaveStrategy::Image => render_image(candidate, data, max_decoded_pixels),
        SaveStrategy::Raw => Ok(raw_bytes(data)),
        SaveStrategy::Text => Ok(decode_text(&candidate.format, data).into_bytes()),
        SaveStrategy::Html => Ok(html_document(&raw_bytes(data)).to_vec()),
        SaveStrategy::FileCopy => Err(AppError::internal("文件拖放内容应直接复制，不应渲染")),
    }
}

fn render_image(
    candidate: &Candidate,
    data: ClipboardData,
    max_decoded_pixels: u64,
) -> Result<Vec<u8>, AppError> {
    match data {
        ClipboardData::Bytes(bytes)
            if candidate.format == ClipboardFormat::Png && candidate.extension == "png" =>
        {
            Ok(bytes)
        }
        data => {
            let image = decode_image(&candidate.format, data, max_decoded_pixels)?;
            encode_image(image, &candidate.extension)
        }
    }
}

/// 校验像素数量是否超过上限。
fn validate_pixel_limit(width: u32, height: u32, max_decoded_pixels: u64) -> Result<(), AppError> {
    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| AppError::Image("图片像素数溢出".to_string()))?;

    if pixels > max_decoded_pixels {
        return Err(AppError::Image(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, max_decoded_pixels
        )));
    }
    Ok(())
}

fn decode_limited(
    decoder: impl ImageDecoder,
    max_decoded_pixels: u64,
) -> Result<DynamicImage, AppError> {
    let (width, height) = decoder.dimensions();
    validate_pixel_limit(width, height, max_decoded_pixels)?;
    DynamicImage::from_decoder(decoder).map_err(|e| image_error("图片解码失败", e))
}

/// 按剪贴板格式解码图片。
pub fn decode_image(
    format: &ClipboardFormat,
    data: ClipboardData,
    max_decoded_pixels: u64,
) -> Result<DynamicImage, AppError> {
    match data {
        ClipboardData::Image(raw) => {
            let width = u32::try_from(raw.width)
                .map_err(|_| AppError::Image("图片宽度超出范围".to_string()))?;
            let height = u32::try_from(raw.height)
                .map_err(|_| AppError::Image("图片高度超出范围".to_string()))?;
            validate_pixel_limit(width, height, max_decoded_pixels)?;
            RgbaImage::from_raw(width, height, raw.bytes)
                .map(DynamicImage::ImageRgba8)
                .ok_or_else(|| AppError::Image("像素数据长度与尺寸不符".to_string()))
        }
        ClipboardData::Bytes(bytes) => match format {
            ClipboardFormat::Dib | ClipboardFormat::DibV5 | ClipboardFormat::Bitmap => {
                let decoder = BmpDecoder::new_without_file_header(Cursor::new(bytes.as_slice()))
                    .map_err(|e| image_error("DIB 头解析失败", e))?;
                decode_limited(decoder, max_decoded_pixels)
            }
            ClipboardFormat::Png => {
                let decoder = PngDecoder::new(Cursor::new(bytes.as_slice()))
                    .map_err(|e| image_error("PNG 头解析失败", e))?;
                decode_limited(decoder, max_decoded_pixels)
            }
            other => Err(AppError::Image(format!("{} 不是图片格式", other))),
        },
        _ => Err(AppError::Image(format!("{} 的数据不是图片", format))),
    }
}

/// 按扩展名编码图片。JPEG 丢弃 alpha，ICO 等比缩小到 256×256 以内。
pub fn encode_image(image: DynamicImage, extension: &str) -> Result<Vec<u8>, AppError> {
    let format = ImageFormat::from_extension(extension)
        .ok_or_else(|| AppError::UnsupportedFormat(extension.to_string()))?;

    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        ImageFormat::Png | ImageFormat::Tiff => image,
        ImageFormat::Ico => {
            let image = if image.width() > ICO_MAX_SIDE || image.height() > ICO_MAX_SIDE {
                image.thumbnail(ICO_MAX_SIDE, ICO_MAX_SIDE)
            } else {
                image
            };
            DynamicImage::ImageRgba8(image.to_rgba8())
        }
        _ if image.color().has_alpha() => DynamicImage::ImageRgba8(image.to_rgba8()),
        _ => DynamicImage::ImageRgb8(image.to_rgb8()),
    };

    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, format)
        .map_err(|e| image_error("图片编码失败", e))?;
    Ok(out.into_inner())
}

fn trim_at_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(pos) => &bytes[..pos],
        None => bytes,
    }
}

fn raw_bytes(data: ClipboardData) -> Vec<u8> {
    match data {
        ClipboardData::Bytes(bytes) => trim_at_nul(&bytes).to_vec(),
        ClipboardData::Text(text) => text.trim_end_matches('\0').as_bytes().to_vec(),
        ClipboardData::Image(raw) => raw.bytes,
        ClipboardData::Files(files) => files
            .iter()
            .map(|f| f.display().to_string())
            .collect::<Vec<_>>()
            .join("\r\n")
            .into_bytes(),
    }
}

/// 解码剪贴板文本，去掉结尾的 NUL。
pub fn decode_text(format: &ClipboardFormat, data: ClipboardData) -> String {
    match data {
        ClipboardData::Text(text) => text.trim_end_matches('\0').to_string(),
        ClipboardData::Bytes(bytes) if *format == ClipboardFormat::UnicodeText => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .take_while(|&unit| unit != 0)
                .collect();
            String::from_utf16_lossy(&units)
        }
        other => String::from_utf8_lossy(&raw_bytes(other)).into_owned(),
    }
}

fn header_offset(header: &str, key: &str) -> Option<usize> {
    header.lines().find_map(|line| {
        let value = line.strip_prefix(key)?.strip_prefix(':')?;
        value.trim().parse::<usize>().ok()
    })
}

/// 截取 `CF_HTML` 封装中的 HTML 文档；没有可用头部时原样返回。
pub fn html_document(bytes: &[u8]) -> &[u8] {
    let header_end = bytes.iter().position(|&b| b == b'<').unwrap_or(bytes.len());
    let header = String::from_utf8_lossy(&bytes[..header_end]);

    match (
        header_offset(&header, "StartHTML"),
        header_offset(&header, "EndHTML"),
    ) {
        (Some(start), Some(end)) if start < end && end <= bytes.len() => &bytes[start..end],
        (Some(start), None) if start < bytes.len() => &bytes[start..],
        _ => bytes,
    }
}

/// 复制扩展名匹配的第一个拖放文件，返回写入字节数。
pub fn copy_dropped_file(files: &[PathBuf], extension: &str, dest: &Path) -> Result<u64, AppError> {
    let extension = normalize_extension(extension);
    let source = files
        .iter()
        .find(|file| {
            file.extension()
                .map(|ext| normalize_extension(&ext.to_string_lossy()) == extension)
                .unwrap_or(false)
        })
        .ok_or_else(|| AppError::UnsupportedFormat(extension.clone()))?;

    if source == dest {
        return fs::metadata(dest)
            .map(|meta| meta.len())
            .map_err(|e| AppError::write_failed(dest, e));
    }
    fs::copy(source, dest).map_err(|e| AppError::write_failed(dest, e))
}

/// 写出渲染结果。
pub fn write_output(dest: &Path, bytes: &[u8]) -> Result<u64, AppError> {
    fs::write(dest, bytes).map_err(|e| AppError::write_failed(dest, e))?;
    Ok(bytes.len() as u64)
}
