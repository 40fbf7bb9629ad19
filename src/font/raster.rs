//! Glyph rasterization
//!
//! A small trait over the two rasterizer backends, so the atlas builder
//! does not care which library produced the coverage bitmaps.

use anyhow::{anyhow, Result};
use fontdue::{Font, FontSettings};
use log::info;

/// One rasterized glyph (8-bit coverage, rows top to bottom)
#[derive(Debug, Clone, Default)]
pub struct RasterGlyph {
    /// Coverage bitmap, `width * height` bytes
    pub bitmap: Vec<u8>,
    /// Bitmap width (pixels)
    pub width: u32,
    /// Bitmap height (pixels)
    pub height: u32,
    /// Offset from the pen position to the bitmap's left edge
    pub bearing_x: i32,
    /// Offset from the baseline up to the bitmap's top edge
    pub bearing_y: i32,
    /// Horizontal advance to next character (pixels)
    pub advance: f32,
}

/// Vertical font metrics (pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    pub ascent: f32,
    /// Negative below the baseline
    pub descent: f32,
    pub line_height: f32,
}

/// Produces coverage bitmaps for characters at a fixed pixel size
pub trait GlyphRasterizer {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Rasterize a character; None if the font has no glyph for it
    fn rasterize(&mut self, ch: char) -> Option<RasterGlyph>;

    fn line_metrics(&self) -> LineMetrics;
}

/// fontdue backend
pub struct FontdueRasterizer {
    font: Font,
    size: f32,
}

impl FontdueRasterizer {
    /// Load from font data
    pub fn from_bytes(data: &[u8], size: f32) -> Result<Self> {
        let settings = FontSettings {
            scale: size,
            ..FontSettings::default()
        };
        let font = Font::from_bytes(data, settings)
            .map_err(|e| anyhow!("Failed to load font: {}", e))?;
        info!(
            "fontdue font loaded ({}px, {} glyphs)",
            size,
            font.glyph_count()
        );
        Ok(Self { font, size })
    }
}

impl GlyphRasterizer for FontdueRasterizer {
    fn name(&self) -> &'static str {
        "fontdue"
    }

    fn rasterize(&mut self, ch: char) -> Option<RasterGlyph> {
        if self.font.lookup_glyph_index(ch) == 0 {
            return None;
        }

        let (m, bitmap) = self.font.rasterize(ch, self.size);

        // fontdue's ymin is the bitmap bottom relative to the baseline
        Some(RasterGlyph {
            bitmap,
            width: m.width as u32,
            height: m.height as u32,
            bearing_x: m.xmin,
            bearing_y: m.ymin + m.height as i32,
            advance: m.advance_width,
        })
    }

    fn line_metrics(&self) -> LineMetrics {
        match self.font.horizontal_line_metrics(self.size) {
            Some(m) => LineMetrics {
                ascent: m.ascent,
                descent: m.descent,
                line_height: m.new_line_size,
            },
            None => LineMetrics {
                ascent: self.size * 0.8,
                descent: -self.size * 0.2,
                line_height: self.size,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_font_data_is_error() {
        assert!(FontdueRasterizer::from_bytes(b"not a font", 48.0).is_err());
    }

    #[test]
    fn test_system_font_loads_and_rasterizes() {
        // Machines without any font have nothing to check
        let Ok(data) = crate::font::load_system_font() else {
            return;
        };
        let mut r = FontdueRasterizer::from_bytes(&data, 24.0).unwrap();
        let glyph = r.rasterize('A').unwrap();
        assert!(glyph.width > 0 && glyph.height > 0);
    }
}
