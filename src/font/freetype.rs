//! FreeType wrapper
//!
//! Grayscale glyph rasterization through the system FreeType library.
//! Pixel size is set once; advances come back in 26.6 fixed point.

use anyhow::{anyhow, Result};
use freetype::face::LoadFlag;
use freetype::render_mode::RenderMode;
use freetype::Library;
use log::{info, warn};
use std::rc::Rc;
use std::sync::Arc;

use super::raster::{GlyphRasterizer, LineMetrics, RasterGlyph};

/// Reject bitmaps larger than this (malformed fonts)
const MAX_GLYPH_DIMENSION: u32 = 4096;

/// 26.6 fixed point -> whole pixels
fn from_26_6(v: i64) -> i64 {
    v >> 6
}

/// FreeType font
pub struct FreetypeRasterizer {
    _library: Arc<Library>,
    face: freetype::Face,
    /// Current font size (pixels)
    size_px: u32,
}

impl FreetypeRasterizer {
    /// Load from font data
    pub fn from_bytes(data: &[u8], size_px: u32) -> Result<Self> {
        let library =
            Library::init().map_err(|e| anyhow!("FreeType initialization failed: {:?}", e))?;

        // freetype-rs requires Rc<Vec<u8>>
        let font_data: Rc<Vec<u8>> = Rc::new(data.to_vec());

        let face = library
            .new_memory_face(font_data, 0)
            .map_err(|e| anyhow!("FreeType font loading failed: {:?}", e))?;

        // Set pixel size (width 0 = same as height)
        face.set_pixel_sizes(0, size_px)
            .map_err(|e| anyhow!("FreeType size setting failed: {:?}", e))?;

        let family = face.family_name().unwrap_or_else(|| "unknown".to_string());
        info!("FreeType font loaded: {} ({}px)", family, size_px);

        Ok(Self {
            _library: Arc::new(library),
            face,
            size_px,
        })
    }
}

impl GlyphRasterizer for FreetypeRasterizer {
    fn name(&self) -> &'static str {
        "freetype"
    }

    fn rasterize(&mut self, ch: char) -> Option<RasterGlyph> {
        // get_char_index returns 0 if not found
        let glyph_index = self.face.get_char_index(ch as usize);
        if glyph_index.is_none() || glyph_index == Some(0) {
            return None;
        }

        if self.face.load_char(ch as usize, LoadFlag::DEFAULT).is_err() {
            return None;
        }

        let glyph = self.face.glyph();
        if glyph.render_glyph(RenderMode::Normal).is_err() {
            return None;
        }

        let bitmap = glyph.bitmap();
        let width = bitmap.width() as u32;
        let height = bitmap.rows() as u32;
        let advance = from_26_6(glyph.advance().x as i64) as f32;

        if width == 0 || height == 0 {
            // Empty glyph (e.g., space)
            return Some(RasterGlyph {
                bitmap: vec![],
                width: 0,
                height: 0,
                bearing_x: glyph.bitmap_left(),
                bearing_y: glyph.bitmap_top(),
                advance,
            });
        }

        if width > MAX_GLYPH_DIMENSION || height > MAX_GLYPH_DIMENSION {
            warn!("FreeType: glyph too large ({}x{}), skipping", width, height);
            return None;
        }

        // Copy rows, dropping pitch padding
        let buffer = bitmap.buffer();
        let pitch = bitmap.pitch().unsigned_abs() as usize;
        let mut data = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height as usize {
            let row = y * pitch;
            data.extend_from_slice(buffer.get(row..row + width as usize)?);
        }

        Some(RasterGlyph {
            bitmap: data,
            width,
            height,
            bearing_x: glyph.bitmap_left(),
            bearing_y: glyph.bitmap_top(),
            advance,
        })
    }

    fn line_metrics(&self) -> LineMetrics {
        match self.face.size_metrics() {
            Some(m) => LineMetrics {
                ascent: from_26_6(m.ascender as i64) as f32,
                descent: from_26_6(m.descender as i64) as f32,
                line_height: from_26_6(m.height as i64) as f32,
            },
            None => {
                let size = self.size_px as f32;
                LineMetrics {
                    ascent: size * 0.8,
                    descent: -size * 0.2,
                    line_height: size,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_26_6_conversion() {
        assert_eq!(from_26_6(64), 1);
        assert_eq!(from_26_6(27 * 64 + 63), 27);
        assert_eq!(from_26_6(0), 0);
    }
}
