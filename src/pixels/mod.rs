//! CPU-side pixel source
//!
//! Handles:
//! - RGBA8 pixel buffer sized to the framebuffer
//! - Per-frame procedural mutation (scan cursor)

pub mod buffer;
pub mod painter;

pub use buffer::PixelBuffer;
pub use painter::{PaintStatus, ScanPainter};
