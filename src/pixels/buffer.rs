//! RGBA8 pixel buffer

use crate::constants::BYTES_PER_PIXEL;

/// Tightly packed RGBA8 image, rows bottom-up as OpenGL expects
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl PixelBuffer {
    /// Allocate a buffer with every pixel set to `fill`
    pub fn new(width: u32, height: u32, fill: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * BYTES_PER_PIXEL);
        for _ in 0..pixels {
            data.extend_from_slice(&fill);
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Overwrite every pixel with `fill`
    pub fn fill(&mut self, fill: [u8; 4]) {
        for px in self.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&fill);
        }
    }

    /// Write one pixel at byte offset `offset` (must be pixel aligned)
    ///
    /// Returns false if the pixel would not fit.
    pub fn put_at(&mut self, offset: usize, color: [u8; 4]) -> bool {
        match self.data.get_mut(offset..offset + BYTES_PER_PIXEL) {
            Some(px) => {
                px.copy_from_slice(&color);
                true
            }
            None => false,
        }
    }

    /// Pixel at (x, y), if in bounds
    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = &self.data[idx..idx + BYTES_PER_PIXEL];
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Size in bytes (width * height * 4)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}
