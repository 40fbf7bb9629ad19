//! Full-viewport quad
//!
//! Draws the streamed texture over (almost) the whole window.
//! The quad is inset by a few pixels so the clear color frames it.

use anyhow::{anyhow, Result};
use glow::HasContext;
use log::{debug, info};

use crate::gpu::bytemuck_cast_slice;
use crate::gpu::shader::QuadShader;
use crate::gpu::stream::StreamingTexture;

/// Per-vertex data: position(3) + UV(2) = 5 floats
const VERTEX_FLOATS: usize = 5;
/// Two triangles, no index buffer
const QUAD_VERTICES: usize = 6;

/// Quad vertices in NDC for a `width` x `height` viewport
///
/// Extents are `(w - inset) / w` and `(h - inset) / h`, so `inset` pixels
/// of clear color remain on every side. UV (0,0) is bottom-left, matching
/// the bottom-up row order of the streamed pixels.
pub fn quad_vertices(width: u32, height: u32, inset: f32) -> [f32; VERTEX_FLOATS * QUAD_VERTICES] {
    let extent = |size: u32| -> f32 {
        if size == 0 {
            return 1.0;
        }
        let s = size as f32;
        ((s - inset) / s).clamp(0.0, 1.0)
    };
    let vw = extent(width);
    let vh = extent(height);

    #[rustfmt::skip]
    let vertices = [
        // positions        // texture coords
         vw,  vh, 0.0,      1.0, 1.0, // top right
         vw, -vh, 0.0,      1.0, 0.0, // bottom right
        -vw, -vh, 0.0,      0.0, 0.0, // bottom left

        -vw,  vh, 0.0,      0.0, 1.0, // top left
         vw,  vh, 0.0,      1.0, 1.0, // top right
        -vw, -vh, 0.0,      0.0, 0.0, // bottom left
    ];
    vertices
}

/// Textured quad renderer
pub struct QuadRenderer {
    shader: QuadShader,
    vao: glow::VertexArray,
    vbo: glow::Buffer,
    inset: f32,
}

impl QuadRenderer {
    /// Create quad renderer for a viewport size
    pub fn new(gl: &glow::Context, width: u32, height: u32, inset: f32) -> Result<Self> {
        let shader = QuadShader::new(gl)?;

        unsafe {
            // VAO
            let vao = gl
                .create_vertex_array()
                .map_err(|e| anyhow!("Failed to create VAO (quad): {}", e))?;
            gl.bind_vertex_array(Some(vao));

            // VBO
            let vbo = gl
                .create_buffer()
                .map_err(|e| anyhow!("Failed to create VBO (quad): {}", e))?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            let vertices = quad_vertices(width, height, inset);
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck_cast_slice(&vertices),
                glow::STATIC_DRAW,
            );

            let stride = (VERTEX_FLOATS * 4) as i32;

            // a_pos: location=0, vec3
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);

            // a_uv: location=1, vec2
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, stride, 12);

            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.bind_vertex_array(None);

            info!("Quad renderer initialized ({}x{}, inset {})", width, height, inset);

            Ok(Self {
                shader,
                vao,
                vbo,
                inset,
            })
        }
    }

    /// Rebuild geometry for a new viewport size
    pub fn resize(&self, gl: &glow::Context, width: u32, height: u32) {
        let vertices = quad_vertices(width, height, self.inset);
        unsafe {
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
            gl.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, 0, bytemuck_cast_slice(&vertices));
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
        debug!("Quad geometry rebuilt for {}x{}", width, height);
    }

    /// Draw the streamed texture
    pub fn draw(&self, gl: &glow::Context, texture: &StreamingTexture) {
        unsafe {
            gl.disable(glow::BLEND);

            self.shader.bind(gl);
            texture.bind(gl, 0);
            self.shader.set_texture_unit(gl, 0);

            gl.bind_vertex_array(Some(self.vao));
            gl.draw_arrays(glow::TRIANGLES, 0, QUAD_VERTICES as i32);

            gl.bind_vertex_array(None);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    /// Release resources
    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.vbo);
        }
        self.shader.destroy(gl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_extent_inset() {
        let v = quad_vertices(1000, 500, 3.0);
        let vw = 997.0 / 1000.0;
        let vh = 497.0 / 500.0;
        assert!((v[0] - vw).abs() < 1e-6);
        assert!((v[1] - vh).abs() < 1e-6);
        // bottom left of first triangle
        assert!((v[10] + vw).abs() < 1e-6);
        assert!((v[11] + vh).abs() < 1e-6);
    }

    #[test]
    fn test_quad_uv_corners() {
        let v = quad_vertices(640, 480, 0.0);
        for vertex in v.chunks(VERTEX_FLOATS) {
            let (x, y, u, t) = (vertex[0], vertex[1], vertex[3], vertex[4]);
            // u follows x, v follows y
            assert_eq!(u, if x > 0.0 { 1.0 } else { 0.0 });
            assert_eq!(t, if y > 0.0 { 1.0 } else { 0.0 });
            assert_eq!(x.abs(), 1.0);
            assert_eq!(y.abs(), 1.0);
        }
    }

    #[test]
    fn test_quad_degenerate_sizes() {
        let v = quad_vertices(0, 2, 3.0);
        assert_eq!(v[0], 1.0);
        assert_eq!(v[1], 0.0); // inset larger than height clamps to 0
    }

    #[test]
    fn test_byte_view_length() {
        let v = quad_vertices(8, 8, 0.0);
        assert_eq!(bytemuck_cast_slice(&v).len(), 30 * 4);
        let idx = [1u16, 2, 3];
        assert_eq!(bytemuck_cast_slice(&idx).len(), 6);
    }
}
