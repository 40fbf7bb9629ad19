//! Frame counter overlay text

use std::time::{Duration, Instant};

use crate::config::{CounterMode, OverlayConfig};

/// Length of the FPS averaging window
const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Counts presented frames and formats the overlay label
#[derive(Debug, Clone)]
pub struct FrameCounter {
    frames: u64,
    label: String,
    mode: CounterMode,
    /// Start of the current FPS window
    window_start: Option<Instant>,
    /// Frames presented in the current FPS window
    window_frames: u32,
    /// Rate measured over the last complete window
    fps: u32,
}

impl FrameCounter {
    pub fn new(label: impl Into<String>, mode: CounterMode) -> Self {
        Self {
            frames: 0,
            label: label.into(),
            mode,
            window_start: None,
            window_frames: 0,
            fps: 0,
        }
    }

    pub fn from_config(config: &OverlayConfig) -> Self {
        Self::new(config.label.clone(), config.mode)
    }

    /// Record one presented frame
    pub fn tick(&mut self, now: Instant) {
        self.frames += 1;

        // The first tick opens the window; rates count the frames after it
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return;
        };
        self.window_frames += 1;

        let elapsed = now.saturating_duration_since(start);
        if elapsed >= FPS_WINDOW {
            self.fps = (self.window_frames as f64 / elapsed.as_secs_f64()).round() as u32;
            self.window_frames = 0;
            self.window_start = Some(now);
        }
    }

    /// Frames presented so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frames per second over the last complete window (0 until one completes)
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Overlay text: label followed by the counter value
    pub fn text(&self) -> String {
        match self.mode {
            CounterMode::Frames => format!("{}{}", self.label, self.frames),
            CounterMode::Fps => format!("{}{}", self.label, self.fps()),
        }
    }

    /// Pick up label/mode changes from a reloaded config (keeps the count)
    pub fn apply_config(&mut self, config: &OverlayConfig) {
        self.label = config.label.clone();
        self.mode = config.mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_text() {
        let mut c = FrameCounter::new("FPS : ", CounterMode::Frames);
        assert_eq!(c.text(), "FPS : 0");
        let t = Instant::now();
        for _ in 0..3 {
            c.tick(t);
        }
        assert_eq!(c.frames(), 3);
        assert_eq!(c.text(), "FPS : 3");
    }

    #[test]
    fn test_fps_window() {
        let mut c = FrameCounter::new("", CounterMode::Fps);
        let t0 = Instant::now();
        // Opening tick plus 60 frames, the last one on the 1s mark
        for i in 0..=60u64 {
            c.tick(t0 + Duration::from_micros(i * 1_000_000 / 60));
        }
        assert_eq!(c.fps(), 60);
        assert_eq!(c.text(), "60");
        assert_eq!(c.frames(), 61);
    }

    #[test]
    fn test_fps_steady_rate_same_in_every_window() {
        let mut c = FrameCounter::new("", CounterMode::Fps);
        let t0 = Instant::now();
        let mut rates = Vec::new();
        for i in 0..=120u64 {
            c.tick(t0 + Duration::from_micros(i * 1_000_000 / 60));
            if i == 60 || i == 120 {
                rates.push(c.fps());
            }
        }
        assert_eq!(rates, vec![60, 60]);
    }

    #[test]
    fn test_fps_zero_before_first_window() {
        let mut c = FrameCounter::new("fps ", CounterMode::Fps);
        let t0 = Instant::now();
        c.tick(t0);
        c.tick(t0 + Duration::from_millis(500));
        assert_eq!(c.text(), "fps 0");
    }

    #[test]
    fn test_apply_config_keeps_count() {
        let mut c = FrameCounter::new("a", CounterMode::Frames);
        c.tick(Instant::now());
        let cfg = OverlayConfig {
            label: "frame ".to_string(),
            ..OverlayConfig::default()
        };
        c.apply_config(&cfg);
        assert_eq!(c.text(), "frame 1");
    }
}
