//! Scan cursor pattern
//!
//! Every frame a few pixels starting at a byte cursor are overwritten
//! with the stroke color, so the image visibly changes while streaming.

use super::PixelBuffer;
use crate::constants::BYTES_PER_PIXEL;

/// Result of one painter step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintStatus {
    /// Cursor is still inside the buffer
    Running,
    /// Cursor passed the stop margin; nothing more will be written
    Finished,
}

/// Writes `pixels_per_frame` stroke pixels per step, advancing a byte cursor
#[derive(Debug, Clone)]
pub struct ScanPainter {
    cursor: usize,
    stroke: [u8; 4],
    pixels_per_frame: usize,
    stop_margin: usize,
    finished: bool,
}

impl ScanPainter {
    pub fn new(stroke: [u8; 4], pixels_per_frame: usize, stop_margin: usize) -> Self {
        Self {
            cursor: 0,
            stroke,
            pixels_per_frame: pixels_per_frame.max(1),
            stop_margin,
            finished: false,
        }
    }

    /// Mutate the buffer for one frame
    ///
    /// The stop check runs after every pixel: once the cursor is past
    /// `len - stop_margin` the painter reports `Finished` for good.
    pub fn step(&mut self, buffer: &mut PixelBuffer) -> PaintStatus {
        if self.finished {
            return PaintStatus::Finished;
        }

        let limit = buffer.len().saturating_sub(self.stop_margin);
        for _ in 0..self.pixels_per_frame {
            buffer.put_at(self.cursor, self.stroke);
            self.cursor += BYTES_PER_PIXEL;
            if self.cursor > limit {
                self.finished = true;
                return PaintStatus::Finished;
            }
        }

        PaintStatus::Running
    }

    /// Rewind to the start of the buffer
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.finished = false;
    }

    pub fn set_stroke(&mut self, stroke: [u8; 4]) {
        self.stroke = stroke;
    }

    /// Current byte offset
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
