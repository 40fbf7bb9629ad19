//! Text drawing renderer
//!
//! Combine glyph atlas and shader
//! to render text on GPU

use anyhow::{anyhow, Result};
use glow::HasContext;
use log::{info, trace};

use crate::config::BlendMode;
use crate::font::atlas::{GlyphAtlas, GlyphLookup};
use crate::gpu::bytemuck_cast_slice;
use crate::gpu::shader::{self, TextShader};

/// Per-vertex data: position(2) + UV(2) + color(4) = 8 floats
const VERTEX_FLOATS: usize = 8;
/// 1 character = 4 vertices
const VERTICES_PER_GLYPH: usize = 4;
/// 1 character = 6 indices (2 triangles)
const INDICES_PER_GLYPH: usize = 6;
/// Maximum characters per batch
const MAX_GLYPHS: usize = 4096;

/// Screen rectangle and atlas coordinates for one glyph
///
/// Positions are pixels from the bottom-left corner of the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphQuad {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    /// Atlas coordinates of the bitmap's top-left corner
    pub u0: f32,
    pub v0: f32,
    /// Atlas coordinates of the bitmap's bottom-right corner
    pub u1: f32,
    pub v1: f32,
}

/// Lay out a single line of text starting at baseline origin (x, y)
///
/// Glyphs without a bitmap only advance the pen; characters the atlas does
/// not know advance by the fallback (space) width.
pub fn layout_text(
    text: &str,
    x: f32,
    y: f32,
    scale: f32,
    glyphs: &impl GlyphLookup,
) -> Vec<GlyphQuad> {
    let mut quads = Vec::with_capacity(text.len());
    let mut pen_x = x;

    for ch in text.chars() {
        let glyph = match glyphs.glyph(ch) {
            Some(g) => g,
            None => {
                trace!("No glyph for {:?}, advancing by space width", ch);
                pen_x += glyphs.fallback_advance() * scale;
                continue;
            }
        };

        if glyph.width == 0 || glyph.height == 0 {
            pen_x += glyph.advance * scale;
            continue;
        }

        let h = glyph.height as f32;
        quads.push(GlyphQuad {
            x: pen_x + glyph.bearing_x * scale,
            // Bitmap bottom sits (height - bearing_y) below the baseline
            y: y - (h - glyph.bearing_y) * scale,
            w: glyph.width as f32 * scale,
            h: h * scale,
            u0: glyph.uv_x,
            v0: glyph.uv_y,
            u1: glyph.uv_x + glyph.uv_w,
            v1: glyph.uv_y + glyph.uv_h,
        });

        pen_x += glyph.advance * scale;
    }

    quads
}

/// Blend function for a blend mode (source factor, destination factor)
///
/// The text shader outputs premultiplied color.
pub fn blend_factors(mode: BlendMode) -> (u32, u32) {
    match mode {
        BlendMode::Additive => (glow::ONE, glow::ONE),
        BlendMode::Alpha => (glow::ONE, glow::ONE_MINUS_SRC_ALPHA),
    }
}

/// Text renderer
pub struct TextRenderer {
    shader: TextShader,
    vao: glow::VertexArray,
    vbo: glow::Buffer,
    ebo: glow::Buffer,
    /// Vertex buffer (CPU side)
    vertices: Vec<f32>,
    /// Current number of characters in buffer
    glyph_count: usize,
}

impl TextRenderer {
    /// Create text renderer
    pub fn new(gl: &glow::Context) -> Result<Self> {
        let shader = TextShader::new(gl)?;

        unsafe {
            // VAO
            let vao = gl
                .create_vertex_array()
                .map_err(|e| anyhow!("Failed to create VAO: {}", e))?;
            gl.bind_vertex_array(Some(vao));

            // VBO
            let vbo = gl
                .create_buffer()
                .map_err(|e| anyhow!("Failed to create VBO: {}", e))?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            let vbo_size = MAX_GLYPHS * VERTICES_PER_GLYPH * VERTEX_FLOATS * 4;
            gl.buffer_data_size(glow::ARRAY_BUFFER, vbo_size as i32, glow::DYNAMIC_DRAW);

            // EBO (index buffer)
            let ebo = gl
                .create_buffer()
                .map_err(|e| anyhow!("Failed to create EBO: {}", e))?;
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));

            let indices = quad_indices(MAX_GLYPHS);
            gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck_cast_slice(&indices),
                glow::STATIC_DRAW,
            );

            // Set vertex attributes
            let stride = (VERTEX_FLOATS * 4) as i32;

            // a_pos: location=0, vec2
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, stride, 0);

            // a_uv: location=1, vec2
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, stride, 8);

            // a_color: location=2, vec4
            gl.enable_vertex_attrib_array(2);
            gl.vertex_attrib_pointer_f32(2, 4, glow::FLOAT, false, stride, 16);

            gl.bind_vertex_array(None);

            info!("Text renderer initialized");

            Ok(Self {
                shader,
                vao,
                vbo,
                ebo,
                vertices: Vec::with_capacity(MAX_GLYPHS * VERTICES_PER_GLYPH * VERTEX_FLOATS),
                glyph_count: 0,
            })
        }
    }

    /// Clear draw buffer
    pub fn begin(&mut self) {
        self.vertices.clear();
        self.glyph_count = 0;
    }

    /// Add text string to draw buffer
    ///
    /// # Arguments
    /// * `text` - Text string to draw
    /// * `x` - Baseline origin X (pixels from the left edge)
    /// * `y` - Baseline origin Y (pixels from the bottom edge)
    /// * `scale` - Glyph scale factor
    /// * `color` - Text color [r, g, b, a] (0.0-1.0)
    /// * `atlas` - Glyph atlas
    pub fn push_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        scale: f32,
        color: [f32; 4],
        atlas: &GlyphAtlas,
    ) {
        for quad in layout_text(text, x, y, scale, atlas) {
            if self.glyph_count >= MAX_GLYPHS {
                break;
            }
            push_quad_vertices(&mut self.vertices, &quad, color);
            self.glyph_count += 1;
        }
    }

    /// Upload buffer contents to GPU and draw
    pub fn flush(
        &self,
        gl: &glow::Context,
        atlas: &GlyphAtlas,
        blend: BlendMode,
        width: u32,
        height: u32,
    ) {
        if self.glyph_count == 0 {
            return;
        }

        unsafe {
            let (src, dst) = blend_factors(blend);
            gl.enable(glow::BLEND);
            gl.blend_equation(glow::FUNC_ADD);
            gl.blend_func(src, dst);

            self.shader.bind(gl);

            // Bottom-left origin, y up
            let projection = shader::ortho(0.0, width as f32, 0.0, height as f32);
            self.shader.set_projection(gl, &projection);

            atlas.bind(gl, 0);
            self.shader.set_atlas_unit(gl, 0);

            gl.bind_vertex_array(Some(self.vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
            gl.buffer_sub_data_u8_slice(
                glow::ARRAY_BUFFER,
                0,
                bytemuck_cast_slice(&self.vertices),
            );

            gl.draw_elements(
                glow::TRIANGLES,
                (self.glyph_count * INDICES_PER_GLYPH) as i32,
                glow::UNSIGNED_SHORT,
                0,
            );

            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.bind_texture(glow::TEXTURE_2D, None);
            gl.disable(glow::BLEND);
        }
    }

    /// Release resources
    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.vbo);
            gl.delete_buffer(self.ebo);
        }
        self.shader.destroy(gl);
    }
}

/// Index data for `glyphs` quads laid out as 4 vertices each
fn quad_indices(glyphs: usize) -> Vec<u16> {
    let mut indices: Vec<u16> = Vec::with_capacity(glyphs * INDICES_PER_GLYPH);
    for i in 0..glyphs as u16 {
        let base = i * 4;
        // top-left -> top-right -> bottom-right, top-left -> bottom-right -> bottom-left
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    indices
}

/// Append the 4 vertices of a glyph quad
///
/// Atlas rows run top-down while screen y runs bottom-up, so the quad's
/// upper edge samples `v0`.
fn push_quad_vertices(vertices: &mut Vec<f32>, quad: &GlyphQuad, color: [f32; 4]) {
    // Round to integer pixels to prevent blur from texel interpolation
    let x0 = quad.x.round();
    let y0 = quad.y.round();
    let x1 = x0 + quad.w;
    let y1 = y0 + quad.h;
    let [r, g, b, a] = color;

    // Top-left
    vertices.extend_from_slice(&[x0, y1, quad.u0, quad.v0, r, g, b, a]);
    // Top-right
    vertices.extend_from_slice(&[x1, y1, quad.u1, quad.v0, r, g, b, a]);
    // Bottom-right
    vertices.extend_from_slice(&[x1, y0, quad.u1, quad.v1, r, g, b, a]);
    // Bottom-left
    vertices.extend_from_slice(&[x0, y0, quad.u0, quad.v1, r, g, b, a]);
}
