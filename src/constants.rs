//! Global constants for texstream
//!
//! Consolidates rendering, font and pattern defaults
//! to eliminate magic numbers throughout the codebase.

// ============================================================================
// Window Constants
// ============================================================================

/// Default window width (logical pixels)
pub const DEFAULT_WINDOW_WIDTH: u32 = 1280;

/// Default window height (logical pixels)
pub const DEFAULT_WINDOW_HEIGHT: u32 = 720;

/// Requested OpenGL context version (core profile)
pub const GL_VERSION_MAJOR: u8 = 3;
pub const GL_VERSION_MINOR: u8 = 3;

// ============================================================================
// Streaming Constants
// ============================================================================

/// Bytes per RGBA8 pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// Minimum number of pixel-unpack buffers in the upload ring
pub const MIN_PBO_COUNT: usize = 2;

/// Maximum number of pixel-unpack buffers in the upload ring
pub const MAX_PBO_COUNT: usize = 3;

/// Pixels trimmed from each edge of the full-viewport quad
pub const DEFAULT_QUAD_INSET: f32 = 3.0;

// ============================================================================
// Font Constants
// ============================================================================

/// Default glyph pixel size
pub const DEFAULT_FONT_SIZE: f32 = 48.0;

/// Minimum font size (pixels)
pub const MIN_FONT_SIZE: f32 = 8.0;

/// Maximum font size (pixels)
pub const MAX_FONT_SIZE: f32 = 256.0;

/// Preloaded character range (ASCII)
pub const ATLAS_CHAR_RANGE: std::ops::Range<u8> = 0..128;

/// Padding between packed glyphs (pixels)
pub const ATLAS_GLYPH_PADDING: u32 = 2;

/// Initial atlas texture edge length (pixels), doubled until all glyphs fit
pub const ATLAS_MIN_SIZE: u32 = 256;

/// Largest atlas texture edge length tried (pixels)
pub const ATLAS_MAX_SIZE: u32 = 4096;

// ============================================================================
// Pattern Constants
// ============================================================================

/// Bytes left untouched at the end of the pixel buffer before the pattern stops
pub const DEFAULT_STOP_MARGIN: usize = 1000;
