//! Font loading and glyph atlas management
//!
//! Handles:
//! - TTF/OTF font loading (fontdue / freetype)
//! - System font lookup (fontconfig)
//! - Glyph atlas texture generation

pub mod atlas;
pub mod fontconfig;
pub mod freetype;
pub mod raster;

use anyhow::{anyhow, Result};
use log::{debug, info};
use std::path::Path;

use crate::config::{FontConfig, RasterizerKind};

pub use atlas::GlyphAtlas;
pub use raster::{FontdueRasterizer, GlyphRasterizer};

/// Font file read when fontconfig is unavailable
const FALLBACK_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
];

/// Load the configured font, or a system monospace font when none is set
pub fn load_font(config: &FontConfig) -> Result<Vec<u8>> {
    if config.main.is_empty() {
        return load_system_font();
    }
    fontconfig::resolve_font(&config.main)
}

/// `TEXSTREAM_FONT`, then the fontconfig monospace match, then known paths
pub fn load_system_font() -> Result<Vec<u8>> {
    if let Ok(path) = std::env::var("TEXSTREAM_FONT") {
        let data = std::fs::read(&path)
            .map_err(|e| anyhow!("Failed to read TEXSTREAM_FONT {}: {}", path, e))?;
        info!("Font loaded: {} (TEXSTREAM_FONT)", path);
        return Ok(data);
    }

    match fontconfig::load_system_font_fc() {
        Ok(data) => return Ok(data),
        Err(e) => debug!("fontconfig lookup failed: {:#}", e),
    }

    read_first(FALLBACK_FONT_PATHS.iter().map(|p| Path::new(*p))).ok_or_else(|| {
        anyhow!(
            "No system font found; set TEXSTREAM_FONT or font.main (tried {})",
            FALLBACK_FONT_PATHS.join(", ")
        )
    })
}

/// Contents of the first readable file
fn read_first<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Option<Vec<u8>> {
    paths.into_iter().find_map(|path| {
        let data = std::fs::read(path).ok()?;
        info!("Font loaded: {}", path.display());
        Some(data)
    })
}

/// Create the configured rasterizer backend over font data
pub fn create_rasterizer(config: &FontConfig, data: &[u8]) -> Result<Box<dyn GlyphRasterizer>> {
    let rasterizer: Box<dyn GlyphRasterizer> = match config.rasterizer {
        RasterizerKind::Fontdue => Box::new(FontdueRasterizer::from_bytes(data, config.size)?),
        RasterizerKind::Freetype => Box::new(freetype::FreetypeRasterizer::from_bytes(
            data,
            config.size.round() as u32,
        )?),
    };
    info!("Rasterizer: {}", rasterizer.name());
    Ok(rasterizer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_first_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.ttf");
        let font = dir.path().join("mono.ttf");
        std::fs::write(&font, b"font bytes").unwrap();

        let data = read_first([missing.as_path(), font.as_path()]).unwrap();
        assert_eq!(data, b"font bytes");
    }

    #[test]
    fn test_read_first_none_readable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.ttf");
        assert!(read_first([missing.as_path(), dir.path()]).is_none());
    }
}
