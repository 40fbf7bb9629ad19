//! Streaming texture upload
//!
//! Pixel data reaches the texture through a ring of pixel-unpack buffers
//! (PBOs). Each frame the GPU copies the slot filled last frame into the
//! texture while the CPU maps and fills the following slot, so the copy
//! never waits on the CPU write and the CPU write never waits on the copy.

use glow::HasContext;
use log::{debug, info, trace, warn};
use thiserror::Error;

use crate::constants::{BYTES_PER_PIXEL, MAX_PBO_COUNT, MIN_PBO_COUNT};

/// Streaming texture errors
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid texture size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("pixel data is {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("failed to create {what}: {reason}")]
    Create { what: &'static str, reason: String },
}

/// Reject pixel data that does not cover the whole texture
fn check_len(expected: usize, actual: usize) -> Result<(), StreamError> {
    if actual != expected {
        return Err(StreamError::SizeMismatch { expected, actual });
    }
    Ok(())
}

/// Round-robin slot selection for the PBO ring
///
/// `current()` is the slot the GPU copies from this frame,
/// `next()` is the slot the CPU fills this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PboRing {
    count: usize,
    index: usize,
}

impl PboRing {
    /// Create a ring of `count` slots (clamped to 2..=3)
    pub fn new(count: usize) -> Self {
        Self {
            count: count.clamp(MIN_PBO_COUNT, MAX_PBO_COUNT),
            index: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn current(&self) -> usize {
        self.index
    }

    pub fn next(&self) -> usize {
        (self.index + 1) % self.count
    }

    /// Rotate: the slot just filled becomes the copy source
    pub fn advance(&mut self) {
        self.index = self.next();
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }
}

/// Byte size of a tightly packed RGBA8 image
pub fn rgba_data_size(width: u32, height: u32) -> Result<usize, StreamError> {
    if width == 0 || height == 0 {
        return Err(StreamError::InvalidSize { width, height });
    }
    let size = width as usize * height as usize * BYTES_PER_PIXEL;
    // GL buffer sizes are i32
    if size > i32::MAX as usize {
        return Err(StreamError::InvalidSize { width, height });
    }
    Ok(size)
}

/// RGBA8 texture fed through a PBO ring
pub struct StreamingTexture {
    texture: glow::Texture,
    pbos: Vec<glow::Buffer>,
    ring: PboRing,
    width: u32,
    height: u32,
    data_size: usize,
}

impl StreamingTexture {
    /// Create the texture and `buffers` pixel-unpack buffers
    pub fn new(
        gl: &glow::Context,
        width: u32,
        height: u32,
        buffers: usize,
    ) -> Result<Self, StreamError> {
        let data_size = rgba_data_size(width, height)?;
        let ring = PboRing::new(buffers);

        unsafe {
            let texture = gl.create_texture().map_err(|reason| StreamError::Create {
                what: "stream texture",
                reason,
            })?;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::NEAREST as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::NEAREST as i32,
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
            Self::allocate_storage(gl, width, height);
            gl.bind_texture(glow::TEXTURE_2D, None);

            let mut pbos = Vec::with_capacity(ring.count());
            for _ in 0..ring.count() {
                let pbo = match gl.create_buffer() {
                    Ok(b) => b,
                    Err(reason) => {
                        for b in pbos {
                            gl.delete_buffer(b);
                        }
                        gl.delete_texture(texture);
                        return Err(StreamError::Create {
                            what: "pixel unpack buffer",
                            reason,
                        });
                    }
                };
                gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, Some(pbo));
                gl.buffer_data_size(
                    glow::PIXEL_UNPACK_BUFFER,
                    data_size as i32,
                    glow::STREAM_DRAW,
                );
                pbos.push(pbo);
            }
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, None);

            info!(
                "Streaming texture created: {}x{}, {} PBOs x {} bytes",
                width,
                height,
                ring.count(),
                data_size
            );

            Ok(Self {
                texture,
                pbos,
                ring,
                width,
                height,
                data_size,
            })
        }
    }

    /// (Re)allocate RGBA8 storage for the bound texture
    unsafe fn allocate_storage(gl: &glow::Context, width: u32, height: u32) {
        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            glow::RGBA8 as i32,
            width as i32,
            height as i32,
            0,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            None,
        );
    }

    /// Fill the slot the first `stream` call copies from
    ///
    /// Without this the first frame shows undefined buffer contents.
    pub fn prime(&self, gl: &glow::Context, pixels: &[u8]) -> Result<(), StreamError> {
        check_len(self.data_size, pixels.len())?;
        unsafe {
            gl.bind_buffer(
                glow::PIXEL_UNPACK_BUFFER,
                Some(self.pbos[self.ring.current()]),
            );
            gl.buffer_sub_data_u8_slice(glow::PIXEL_UNPACK_BUFFER, 0, pixels);
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, None);
        }
        debug!("Streaming texture primed (slot {})", self.ring.current());
        Ok(())
    }

    /// Upload one frame
    ///
    /// 1. Copy PBO[current] into the texture (asynchronous on the GPU side)
    /// 2. Orphan PBO[next], map it write-only and copy `pixels` into it
    /// 3. Unbind the unpack target and rotate the ring
    ///
    /// Returns `Ok(false)` if the buffer could not be mapped; the texture
    /// still received last frame's data but this frame's pixels are lost.
    pub fn stream(&mut self, gl: &glow::Context, pixels: &[u8]) -> Result<bool, StreamError> {
        check_len(self.data_size, pixels.len())?;

        let copy_slot = self.ring.current();
        let fill_slot = self.ring.next();
        let mapped;

        unsafe {
            // Texture <- PBO[current], source is a buffer offset
            gl.bind_texture(glow::TEXTURE_2D, Some(self.texture));
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, Some(self.pbos[copy_slot]));
            gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                self.width as i32,
                self.height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::BufferOffset(0),
            );
            gl.bind_texture(glow::TEXTURE_2D, None);

            // PBO[next] <- pixels
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, Some(self.pbos[fill_slot]));
            // Orphan so the driver hands out fresh storage instead of
            // waiting for a pending copy out of this buffer
            gl.buffer_data_size(
                glow::PIXEL_UNPACK_BUFFER,
                self.data_size as i32,
                glow::STREAM_DRAW,
            );
            let ptr = gl.map_buffer_range(
                glow::PIXEL_UNPACK_BUFFER,
                0,
                self.data_size as i32,
                glow::MAP_WRITE_BIT | glow::MAP_INVALIDATE_BUFFER_BIT,
            );

            if ptr.is_null() {
                warn!("Failed to map PBO {} for writing", fill_slot);
                mapped = false;
            } else {
                std::ptr::copy_nonoverlapping(pixels.as_ptr(), ptr, self.data_size);
                gl.unmap_buffer(glow::PIXEL_UNPACK_BUFFER);
                mapped = true;
            }

            // Later pixel transfers must not read from a PBO
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, None);
        }

        trace!("stream: copy slot {} fill slot {}", copy_slot, fill_slot);
        self.ring.advance();
        Ok(mapped)
    }

    /// Recreate texture storage and PBOs at a new size
    pub fn resize(&mut self, gl: &glow::Context, width: u32, height: u32) -> Result<(), StreamError> {
        if width == self.width && height == self.height {
            return Ok(());
        }
        let data_size = rgba_data_size(width, height)?;

        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(self.texture));
            Self::allocate_storage(gl, width, height);
            gl.bind_texture(glow::TEXTURE_2D, None);

            for &pbo in &self.pbos {
                gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, Some(pbo));
                gl.buffer_data_size(glow::PIXEL_UNPACK_BUFFER, data_size as i32, glow::STREAM_DRAW);
            }
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, None);
        }

        debug!(
            "Streaming texture resized: {}x{} -> {}x{}",
            self.width, self.height, width, height
        );
        self.width = width;
        self.height = height;
        self.data_size = data_size;
        self.ring.reset();
        Ok(())
    }

    /// Bind texture
    pub fn bind(&self, gl: &glow::Context, unit: u32) {
        unsafe {
            gl.active_texture(glow::TEXTURE0 + unit);
            gl.bind_texture(glow::TEXTURE_2D, Some(self.texture));
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per frame (width * height * 4)
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// Release resources
    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            for &pbo in &self.pbos {
                gl.delete_buffer(pbo);
            }
            gl.delete_texture(self.texture);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_slot_ping_pong() {
        let mut ring = PboRing::new(2);
        assert_eq!((ring.current(), ring.next()), (0, 1));
        ring.advance();
        assert_eq!((ring.current(), ring.next()), (1, 0));
        ring.advance();
        assert_eq!((ring.current(), ring.next()), (0, 1));
    }

    #[test]
    fn test_three_slot_rotation() {
        let mut ring = PboRing::new(3);
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push((ring.current(), ring.next()));
            ring.advance();
        }
        assert_eq!(seen, vec![(0, 1), (1, 2), (2, 0), (0, 1), (1, 2), (2, 0)]);
    }

    #[test]
    fn test_filled_slot_is_copied_next_frame() {
        for count in 2..=3 {
            let mut ring = PboRing::new(count);
            for _ in 0..10 {
                let filled = ring.next();
                ring.advance();
                assert_eq!(ring.current(), filled);
            }
        }
    }

    #[test]
    fn test_copy_and_fill_never_collide() {
        for count in 0..8 {
            let mut ring = PboRing::new(count);
            for _ in 0..10 {
                assert_ne!(ring.current(), ring.next());
                ring.advance();
            }
        }
    }

    #[test]
    fn test_ring_count_clamped() {
        assert_eq!(PboRing::new(0).count(), 2);
        assert_eq!(PboRing::new(1).count(), 2);
        assert_eq!(PboRing::new(3).count(), 3);
        assert_eq!(PboRing::new(9).count(), 3);
    }

    #[test]
    fn test_ring_reset() {
        let mut ring = PboRing::new(3);
        ring.advance();
        ring.advance();
        ring.reset();
        assert_eq!(ring.current(), 0);
    }

    #[test]
    fn test_rgba_data_size() {
        assert_eq!(rgba_data_size(1280, 720).unwrap(), 1280 * 720 * 4);
        assert!(matches!(
            rgba_data_size(0, 720),
            Err(StreamError::InvalidSize { width: 0, height: 720 })
        ));
        assert!(rgba_data_size(70_000, 70_000).is_err());
    }

    #[test]
    fn test_check_len() {
        let size = rgba_data_size(4, 2).unwrap();
        assert!(check_len(size, 32).is_ok());
        match check_len(size, 28) {
            Err(StreamError::SizeMismatch { expected, actual }) => {
                assert_eq!((expected, actual), (32, 28));
            }
            other => panic!("expected SizeMismatch, got {:?}", other),
        }
        assert!(check_len(size, 0).is_err());
    }

    #[test]
    fn test_error_messages() {
        let e = StreamError::SizeMismatch {
            expected: 16,
            actual: 12,
        };
        assert_eq!(e.to_string(), "pixel data is 12 bytes, expected 16");
    }
}
