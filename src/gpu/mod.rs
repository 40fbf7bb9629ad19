//! GPU rendering with OpenGL
//!
//! Handles:
//! - Window + OpenGL 3.3 core context creation (winit / glutin)
//! - Streaming texture upload through pixel-unpack buffers
//! - Full-viewport quad and glyph atlas text rendering

pub mod context;
pub mod quad;
pub mod shader;
pub mod stream;
pub mod text;

pub use context::{GlInfo, GlWindow};
pub use quad::QuadRenderer;
pub use stream::StreamingTexture;
pub use text::TextRenderer;

/// &[T] -> &[u8] conversion (minimal implementation without bytemuck)
pub(crate) fn bytemuck_cast_slice<T: Copy>(slice: &[T]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const u8, std::mem::size_of_val(slice)) }
}
