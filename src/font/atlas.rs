//! Glyph atlas
//!
//! Rasterizes the ASCII range once at startup and shelf-packs the
//! coverage bitmaps into a single R8 texture. There is no eviction and
//! no on-demand loading: characters outside the preloaded set are
//! treated as missing.

use anyhow::{anyhow, Result};
use glow::HasContext;
use log::{debug, info, warn};
use std::collections::HashMap;

use super::raster::{GlyphRasterizer, RasterGlyph};
use crate::constants::{ATLAS_CHAR_RANGE, ATLAS_GLYPH_PADDING, ATLAS_MAX_SIZE, ATLAS_MIN_SIZE};

/// Metrics and texture coordinates for one glyph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphInfo {
    /// Top-left U coordinate on texture (0.0-1.0)
    pub uv_x: f32,
    /// Top-left V coordinate on texture (0.0-1.0)
    pub uv_y: f32,
    /// Width on texture (0.0-1.0)
    pub uv_w: f32,
    /// Height on texture (0.0-1.0)
    pub uv_h: f32,
    /// Glyph bitmap width (pixels)
    pub width: u32,
    /// Glyph bitmap height (pixels)
    pub height: u32,
    /// Horizontal offset from pen position to bitmap left
    pub bearing_x: f32,
    /// Vertical offset from baseline to bitmap top
    pub bearing_y: f32,
    /// Horizontal advance to next character
    pub advance: f32,
}

/// Read access to packed glyph metrics
pub trait GlyphLookup {
    fn glyph(&self, ch: char) -> Option<&GlyphInfo>;

    /// Advance used for characters missing from the atlas
    fn fallback_advance(&self) -> f32;
}

/// Row-based rectangle packer
///
/// Rectangles are placed left to right; when one does not fit the row,
/// a new row starts below the tallest rectangle of the current one.
#[derive(Debug, Clone)]
pub struct ShelfPacker {
    width: u32,
    height: u32,
    pad: u32,
    cursor_x: u32,
    cursor_y: u32,
    row_height: u32,
}

impl ShelfPacker {
    pub fn new(width: u32, height: u32, pad: u32) -> Self {
        Self {
            width,
            height,
            pad,
            cursor_x: 0,
            cursor_y: 0,
            row_height: 0,
        }
    }

    /// Reserve a `w` x `h` rectangle; returns its top-left corner
    pub fn pack(&mut self, w: u32, h: u32) -> Option<(u32, u32)> {
        if w > self.width || h > self.height {
            return None;
        }

        // Move to next row if doesn't fit in current row
        if self.cursor_x + w > self.width {
            self.cursor_y += self.row_height + self.pad;
            self.cursor_x = 0;
            self.row_height = 0;
        }

        if self.cursor_y + h > self.height {
            return None;
        }

        let pos = (self.cursor_x, self.cursor_y);
        self.cursor_x += w + self.pad;
        self.row_height = self.row_height.max(h);
        Some(pos)
    }
}

/// CPU-side atlas: R8 pixels plus glyph table
pub struct AtlasImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub glyphs: HashMap<char, GlyphInfo>,
    /// Advance of ' ' (fallback for missing characters)
    pub space_advance: f32,
}

impl AtlasImage {
    /// Rasterize the preload range and pack it
    ///
    /// Characters the font cannot produce are skipped.
    /// The atlas edge starts small and doubles until everything fits.
    pub fn build(rasterizer: &mut dyn GlyphRasterizer) -> Result<Self> {
        let mut rasterized: Vec<(char, RasterGlyph)> = Vec::new();
        let mut missing = 0usize;
        for code in ATLAS_CHAR_RANGE {
            let ch = code as char;
            match rasterizer.rasterize(ch) {
                Some(g) => rasterized.push((ch, g)),
                None => {
                    // Control characters have no glyphs in most fonts
                    if !ch.is_ascii_control() {
                        warn!("Failed to load glyph '{}' (U+{:04X})", ch, code);
                    }
                    missing += 1;
                }
            }
        }

        if rasterized.is_empty() {
            return Err(anyhow!(
                "Font produced no glyphs ({} rasterizer)",
                rasterizer.name()
            ));
        }
        debug!(
            "{} glyphs rasterized, {} without glyph ({} rasterizer)",
            rasterized.len(),
            missing,
            rasterizer.name()
        );

        let metrics = rasterizer.line_metrics();
        debug!(
            "Line metrics: ascent {:.1}, descent {:.1}, line height {:.1}",
            metrics.ascent, metrics.descent, metrics.line_height
        );

        let mut size = ATLAS_MIN_SIZE;
        loop {
            if let Some(image) = Self::pack(&rasterized, size) {
                return Ok(image);
            }
            if size >= ATLAS_MAX_SIZE {
                return Err(anyhow!(
                    "Glyphs do not fit in a {}x{} atlas",
                    ATLAS_MAX_SIZE,
                    ATLAS_MAX_SIZE
                ));
            }
            size *= 2;
        }
    }

    /// Pack rasterized glyphs into a `size` x `size` image
    fn pack(rasterized: &[(char, RasterGlyph)], size: u32) -> Option<Self> {
        let mut packer = ShelfPacker::new(size, size, ATLAS_GLYPH_PADDING);
        let mut data = vec![0u8; (size as usize) * (size as usize)];
        let mut glyphs = HashMap::with_capacity(rasterized.len());
        let s = size as f32;

        for (ch, g) in rasterized {
            let (x0, y0) = if g.width == 0 || g.height == 0 {
                (0, 0)
            } else {
                packer.pack(g.width, g.height)?
            };

            // Copy bitmap to atlas
            let bw = g.width as usize;
            for y in 0..g.height as usize {
                let src = &g.bitmap[y * bw..(y + 1) * bw];
                let dst = (y0 as usize + y) * size as usize + x0 as usize;
                data[dst..dst + bw].copy_from_slice(src);
            }

            glyphs.insert(
                *ch,
                GlyphInfo {
                    uv_x: x0 as f32 / s,
                    uv_y: y0 as f32 / s,
                    uv_w: g.width as f32 / s,
                    uv_h: g.height as f32 / s,
                    width: g.width,
                    height: g.height,
                    bearing_x: g.bearing_x as f32,
                    bearing_y: g.bearing_y as f32,
                    advance: g.advance,
                },
            );
        }

        let space_advance = glyphs.get(&' ').map(|g| g.advance).unwrap_or_else(|| {
            // No space glyph: use the widest advance as a stand-in
            glyphs.values().map(|g| g.advance).fold(0.0, f32::max)
        });

        Some(Self {
            width: size,
            height: size,
            data,
            glyphs,
            space_advance,
        })
    }
}

impl GlyphLookup for AtlasImage {
    fn glyph(&self, ch: char) -> Option<&GlyphInfo> {
        self.glyphs.get(&ch)
    }

    fn fallback_advance(&self) -> f32 {
        self.space_advance
    }
}

/// Glyph atlas: texture containing font glyphs
pub struct GlyphAtlas {
    texture: glow::Texture,
    /// Character -> glyph info map
    glyphs: HashMap<char, GlyphInfo>,
    /// Texture width
    pub atlas_width: u32,
    /// Texture height
    pub atlas_height: u32,
    space_advance: f32,
}

impl GlyphAtlas {
    /// Rasterize the preload range and upload it as an R8 texture
    pub fn new(gl: &glow::Context, rasterizer: &mut dyn GlyphRasterizer) -> Result<Self> {
        let image = AtlasImage::build(rasterizer)?;
        Self::upload(gl, image)
    }

    /// Upload a packed image
    pub fn upload(gl: &glow::Context, image: AtlasImage) -> Result<Self> {
        let texture = unsafe {
            let tex = gl
                .create_texture()
                .map_err(|e| anyhow!("Failed to create texture: {}", e))?;

            gl.bind_texture(glow::TEXTURE_2D, Some(tex));

            // R8 rows are not 4-byte aligned
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);

            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::R8 as i32,
                image.width as i32,
                image.height as i32,
                0,
                glow::RED,
                glow::UNSIGNED_BYTE,
                Some(&image.data),
            );

            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );

            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
            gl.bind_texture(glow::TEXTURE_2D, None);

            tex
        };

        let atlas = Self {
            texture,
            glyphs: image.glyphs,
            atlas_width: image.width,
            atlas_height: image.height,
            space_advance: image.space_advance,
        };

        info!(
            "Glyph atlas generated: {}x{}, {} glyphs (ASCII preloaded)",
            atlas.atlas_width,
            atlas.atlas_height,
            atlas.glyphs.len()
        );

        Ok(atlas)
    }

    /// Get glyph info for character
    pub fn get_glyph(&self, ch: char) -> Option<&GlyphInfo> {
        self.glyphs.get(&ch)
    }

    /// Bind texture
    pub fn bind(&self, gl: &glow::Context, unit: u32) {
        unsafe {
            gl.active_texture(glow::TEXTURE0 + unit);
            gl.bind_texture(glow::TEXTURE_2D, Some(self.texture));
        }
    }

    /// Release resources
    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_texture(self.texture);
        }
    }
}

impl GlyphLookup for GlyphAtlas {
    fn glyph(&self, ch: char) -> Option<&GlyphInfo> {
        self.get_glyph(ch)
    }

    fn fallback_advance(&self) -> f32 {
        self.space_advance
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::font::raster::LineMetrics;

    /// Rasterizer producing solid boxes, one per printable ASCII character
    pub(crate) struct BoxRasterizer {
        pub w: u32,
        pub h: u32,
    }

    impl GlyphRasterizer for BoxRasterizer {
        fn name(&self) -> &'static str {
            "box"
        }

        fn rasterize(&mut self, ch: char) -> Option<RasterGlyph> {
            if ch.is_ascii_control() {
                return None;
            }
            if ch == ' ' {
                return Some(RasterGlyph {
                    advance: self.w as f32 + 2.0,
                    ..RasterGlyph::default()
                });
            }
            Some(RasterGlyph {
                bitmap: vec![ch as u8; (self.w * self.h) as usize],
                width: self.w,
                height: self.h,
                bearing_x: 1,
                bearing_y: self.h as i32 - 2,
                advance: self.w as f32 + 2.0,
            })
        }

        fn line_metrics(&self) -> LineMetrics {
            LineMetrics {
                ascent: self.h as f32,
                descent: 0.0,
                line_height: self.h as f32,
            }
        }
    }

    struct EmptyRasterizer;

    impl GlyphRasterizer for EmptyRasterizer {
        fn name(&self) -> &'static str {
            "empty"
        }

        fn rasterize(&mut self, _ch: char) -> Option<RasterGlyph> {
            None
        }

        fn line_metrics(&self) -> LineMetrics {
            LineMetrics {
                ascent: 0.0,
                descent: 0.0,
                line_height: 0.0,
            }
        }
    }

    #[test]
    fn test_shelf_packer_rows() {
        let mut p = ShelfPacker::new(10, 10, 1);
        assert_eq!(p.pack(4, 3), Some((0, 0)));
        assert_eq!(p.pack(4, 2), Some((5, 0)));
        // 10 + 4 > 10 -> new row below tallest (3) + pad (1)
        assert_eq!(p.pack(4, 4), Some((0, 4)));
        assert_eq!(p.pack(5, 2), Some((5, 4)));
        // Next row starts at 4 + 4 + 1 = 9, height 2 does not fit
        assert_eq!(p.pack(3, 2), None);
    }

    #[test]
    fn test_shelf_packer_rejects_oversized() {
        let mut p = ShelfPacker::new(8, 8, 0);
        assert_eq!(p.pack(9, 1), None);
        assert_eq!(p.pack(1, 9), None);
        assert_eq!(p.pack(8, 8), Some((0, 0)));
    }

    #[test]
    fn test_build_preloads_printable_ascii() {
        let mut r = BoxRasterizer { w: 10, h: 12 };
        let image = AtlasImage::build(&mut r).unwrap();

        // 0x20..=0x7E plus nothing else
        assert_eq!(image.glyphs.len(), 95);
        assert!(image.glyph('\n').is_none());
        assert!(image.glyph('é').is_none());
        assert_eq!(image.space_advance, 12.0);
        assert_eq!(image.data.len(), (image.width * image.height) as usize);
    }

    #[test]
    fn test_build_copies_bitmaps_to_uv() {
        let mut r = BoxRasterizer { w: 6, h: 7 };
        let image = AtlasImage::build(&mut r).unwrap();

        for ch in ['A', 'z', '~'] {
            let g = image.glyph(ch).unwrap();
            let x = (g.uv_x * image.width as f32).round() as usize;
            let y = (g.uv_y * image.height as f32).round() as usize;
            assert_eq!(g.width, 6);
            assert_eq!(g.height, 7);
            assert_eq!(g.bearing_y, 5.0);
            // Top-left and bottom-right texel carry the glyph's fill byte
            assert_eq!(image.data[y * image.width as usize + x], ch as u8);
            let br = (y + 6) * image.width as usize + x + 5;
            assert_eq!(image.data[br], ch as u8);
        }
    }

    #[test]
    fn test_build_grows_atlas() {
        // 94 boxes of 60x60 need more than 256x256
        let mut r = BoxRasterizer { w: 60, h: 60 };
        let image = AtlasImage::build(&mut r).unwrap();
        assert!(image.width > ATLAS_MIN_SIZE);
        assert_eq!(image.glyphs.len(), 95);
    }

    #[test]
    fn test_build_fails_when_too_large() {
        let mut r = BoxRasterizer {
            w: ATLAS_MAX_SIZE + 1,
            h: 4,
        };
        assert!(AtlasImage::build(&mut r).is_err());
    }

    #[test]
    fn test_build_fails_without_glyphs() {
        assert!(AtlasImage::build(&mut EmptyRasterizer).is_err());
    }

    #[test]
    fn test_packed_glyphs_do_not_overlap() {
        let mut r = BoxRasterizer { w: 9, h: 11 };
        let image = AtlasImage::build(&mut r).unwrap();
        let s = image.width as f32;
        let rects: Vec<(u32, u32, u32, u32)> = image
            .glyphs
            .values()
            .filter(|g| g.width > 0)
            .map(|g| {
                (
                    (g.uv_x * s).round() as u32,
                    (g.uv_y * s).round() as u32,
                    g.width,
                    g.height,
                )
            })
            .collect();
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                let disjoint = a.0 + a.2 <= b.0
                    || b.0 + b.2 <= a.0
                    || a.1 + a.3 <= b.1
                    || b.1 + b.3 <= a.1;
                assert!(disjoint, "{:?} overlaps {:?}", a, b);
            }
        }
    }
}
