//! Framebuffer screenshots (PNG)

use anyhow::{Context, Result};
use glow::HasContext;
use log::info;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::constants::BYTES_PER_PIXEL;

/// Expand ~ to the user's home directory.
/// Uses provided home if available, falls back to dirs::home_dir().
pub fn expand_path(path: &str, home: Option<&Path>) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        // "~user" forms are left alone
        _ => return PathBuf::from(path),
    };

    let home = home
        .map(Path::to_path_buf)
        .or_else(dirs::home_dir);

    match home {
        Some(home) => home.join(rest.trim_start_matches('/')),
        None => PathBuf::from(path),
    }
}

/// Reverse row order (GL reads bottom-up, PNG stores top-down)
pub fn flip_rows(pixels: &[u8], width: u32, height: u32) -> Vec<u8> {
    let row_size = width as usize * BYTES_PER_PIXEL;
    let mut flipped = Vec::with_capacity(pixels.len());
    for y in (0..height as usize).rev() {
        let start = y * row_size;
        flipped.extend_from_slice(&pixels[start..start + row_size]);
    }
    flipped
}

/// Screenshot file name for a timestamp
pub fn screenshot_file_name(now: chrono::DateTime<chrono::Local>) -> String {
    format!("texstream_screenshot_{}.png", now.format("%Y%m%d_%H%M%S_%3f"))
}

/// Encode top-down RGBA8 rows as PNG
pub fn write_png<W: Write>(writer: W, width: u32, height: u32, rgba: &[u8]) -> Result<()> {
    let mut encoder = png::Encoder::new(writer, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(rgba)?;
    Ok(())
}

/// Save the current framebuffer into `screenshot_dir`
pub fn save_screenshot(
    gl: &glow::Context,
    width: u32,
    height: u32,
    screenshot_dir: &str,
) -> Result<PathBuf> {
    let dir = expand_path(screenshot_dir, None);

    // Read pixel data from framebuffer
    let mut pixels = vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL];
    unsafe {
        gl.read_pixels(
            0,
            0,
            width as i32,
            height as i32,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            glow::PixelPackData::Slice(&mut pixels),
        );
    }
    let flipped = flip_rows(&pixels, width, height);

    let path = dir.join(screenshot_file_name(chrono::Local::now()));
    let file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create screenshot: {}", path.display()))?;
    write_png(std::io::BufWriter::new(file), width, height, &flipped)?;

    info!("Screenshot saved: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_expand_path() {
        let home = Path::new("/home/alice");
        assert_eq!(expand_path("~", Some(home)), PathBuf::from("/home/alice"));
        assert_eq!(
            expand_path("~/Pictures", Some(home)),
            PathBuf::from("/home/alice/Pictures")
        );
        assert_eq!(expand_path("/tmp/shots", Some(home)), PathBuf::from("/tmp/shots"));
        assert_eq!(expand_path("~bob/x", Some(home)), PathBuf::from("~bob/x"));
    }

    #[test]
    fn test_flip_rows() {
        // 1x3 image, one pixel per row
        let pixels = [1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3];
        assert_eq!(
            flip_rows(&pixels, 1, 3),
            vec![3, 3, 3, 3, 2, 2, 2, 2, 1, 1, 1, 1]
        );
    }

    #[test]
    fn test_file_name() {
        let t = chrono::Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .unwrap();
        assert_eq!(
            screenshot_file_name(t),
            "texstream_screenshot_20240309_140507_000.png"
        );
    }

    #[test]
    fn test_write_png_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        let rgba: Vec<u8> = (0..2 * 2 * 4).map(|i| i as u8).collect();
        write_png(std::fs::File::create(&path).unwrap(), 2, 2, &rgba).unwrap();

        let decoder = png::Decoder::new(std::fs::File::open(&path).unwrap());
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0u8; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        assert_eq!((info.width, info.height), (2, 2));
        assert_eq!(&buf[..info.buffer_size()], &rgba[..]);
    }
}
