//! Configuration file management
//!
//! Loads TOML configuration files and provides application settings.
//! Default config path: ~/.config/texstream/config.toml

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(target_os = "linux")]
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
#[cfg(target_os = "linux")]
use std::sync::mpsc;

use crate::constants::{
    DEFAULT_FONT_SIZE, DEFAULT_QUAD_INSET, DEFAULT_STOP_MARGIN, DEFAULT_WINDOW_HEIGHT,
    DEFAULT_WINDOW_WIDTH, MAX_FONT_SIZE, MAX_PBO_COUNT, MIN_FONT_SIZE, MIN_PBO_COUNT,
};
use crate::utils::color;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Window settings
    pub window: WindowConfig,
    /// Font settings
    pub font: FontConfig,
    /// Frame counter overlay settings
    pub overlay: OverlayConfig,
    /// Appearance settings
    pub appearance: AppearanceConfig,
    /// Pixel pattern settings
    pub pattern: PatternConfig,
    /// Texture streaming settings
    pub stream: StreamConfig,
    /// Path settings
    pub paths: PathConfig,
}

/// Window settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial inner width (logical pixels)
    pub width: u32,
    /// Initial inner height (logical pixels)
    pub height: u32,
    /// Start maximized
    pub maximized: bool,
    /// Wait for vertical blank on swap
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "texstream".to_string(),
            width: DEFAULT_WINDOW_WIDTH,
            height: DEFAULT_WINDOW_HEIGHT,
            maximized: true,
            vsync: true,
        }
    }
}

/// Glyph rasterizer backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterizerKind {
    /// Pure Rust rasterizer
    #[default]
    Fontdue,
    /// System FreeType library
    Freetype,
}

/// Font settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Font: family name or file path (searches system fonts if empty)
    pub main: String,
    /// Glyph pixel size
    pub size: f32,
    /// Rasterizer: "fontdue" (default) or "freetype"
    pub rasterizer: RasterizerKind,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            main: String::new(),
            size: DEFAULT_FONT_SIZE,
            rasterizer: RasterizerKind::Fontdue,
        }
    }
}

/// What the overlay counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterMode {
    /// Frames presented since start
    #[default]
    Frames,
    /// Frames presented during the last full second
    Fps,
}

/// How overlay glyphs are composited onto the quad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// dst + src (glyph coverage adds light)
    #[default]
    Additive,
    /// Premultiplied alpha over
    Alpha,
}

/// Frame counter overlay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Text shown before the counter value
    pub label: String,
    /// Baseline origin X (pixels from the left edge)
    pub x: f32,
    /// Baseline origin Y (pixels from the bottom edge)
    pub y: f32,
    /// Glyph scale factor
    pub scale: f32,
    /// Text color (RRGGBB)
    pub color: String,
    /// Counter mode: "frames" or "fps"
    pub mode: CounterMode,
    /// Blend mode: "additive" or "alpha"
    pub blend: BlendMode,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            label: "FPS : ".to_string(),
            x: 15.0,
            y: 15.0,
            scale: 1.0,
            color: "80cc33".to_string(),
            mode: CounterMode::Frames,
            blend: BlendMode::Additive,
        }
    }
}

impl OverlayConfig {
    /// Text color as normalized RGBA
    pub fn color_rgba(&self) -> [f32; 4] {
        color::parse_hex_color_to_rgba(&self.color)
    }
}

/// Appearance settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Clear color (RRGGBB)
    pub background: String,
    /// Pixels trimmed from each edge of the streamed quad
    pub quad_inset: f32,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            background: "3380b3".to_string(),
            quad_inset: DEFAULT_QUAD_INSET,
        }
    }
}

impl AppearanceConfig {
    /// Clear color as normalized RGBA
    pub fn background_rgba(&self) -> [f32; 4] {
        color::parse_hex_color_to_rgba(&self.background)
    }
}

/// Pixel pattern settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Initial fill color (RRGGBBAA)
    pub fill: String,
    /// Color written by the scan cursor (RRGGBBAA)
    pub stroke: String,
    /// Pixels written per frame
    pub pixels_per_frame: usize,
    /// Bytes left at the end of the buffer when the scan stops
    pub stop_margin: usize,
    /// Close the window once the scan reaches the margin
    pub exit_when_done: bool,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            fill: "0f8080ff".to_string(),
            stroke: "ff0000ff".to_string(),
            pixels_per_frame: 1,
            stop_margin: DEFAULT_STOP_MARGIN,
            exit_when_done: true,
        }
    }
}

impl PatternConfig {
    /// Fill color bytes (falls back to the default fill on parse error)
    pub fn fill_rgba8(&self) -> [u8; 4] {
        color::parse_hex_rgba8(&self.fill).unwrap_or_else(|| {
            warn!("Invalid pattern fill color: {}", self.fill);
            [0x0f, 0x80, 0x80, 0xff]
        })
    }

    /// Stroke color bytes (falls back to opaque red on parse error)
    pub fn stroke_rgba8(&self) -> [u8; 4] {
        color::parse_hex_rgba8(&self.stroke).unwrap_or_else(|| {
            warn!("Invalid pattern stroke color: {}", self.stroke);
            [0xff, 0x00, 0x00, 0xff]
        })
    }
}

/// Texture streaming settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Number of pixel-unpack buffers in the ring (2 or 3)
    pub buffers: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffers: MIN_PBO_COUNT,
        }
    }
}

/// Path settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Screenshot save directory
    pub screenshot_dir: String,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: "~".to_string(),
        }
    }
}

impl Config {
    /// System-wide config path
    const SYSTEM_CONFIG_PATH: &'static str = "/etc/texstream/config.toml";

    /// Get the path that would be used for loading config
    /// Returns None if using built-in defaults
    pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
        // 1. --config command line flag
        if let Some(p) = explicit {
            return Some(p.to_path_buf());
        }

        // 2. TEXSTREAM_CONFIG environment variable
        if let Ok(path) = std::env::var("TEXSTREAM_CONFIG") {
            let p = Path::new(&path);
            if p.exists() {
                return Some(p.to_path_buf());
            }
        }

        // 3. User config: ~/.config/texstream/config.toml
        if let Some(config_path) = default_config_path() {
            if config_path.exists() {
                return Some(config_path);
            }
        }

        // 4. System config: /etc/texstream/config.toml
        let system_config = Path::new(Self::SYSTEM_CONFIG_PATH);
        if system_config.exists() {
            return Some(system_config.to_path_buf());
        }

        None
    }

    /// Load configuration with priority:
    /// 1. --config PATH
    /// 2. TEXSTREAM_CONFIG environment variable
    /// 3. ~/.config/texstream/config.toml (user config)
    /// 4. /etc/texstream/config.toml (system config)
    /// 5. Built-in defaults
    ///
    /// Returns the config together with the file it came from (for hot reload).
    pub fn load(explicit: Option<&Path>) -> (Self, Option<PathBuf>) {
        if let Some(path) = Self::config_path(explicit) {
            match Self::load_from_file(&path) {
                Ok(config) => {
                    info!("Loaded config: {}", path.display());
                    return (config, Some(path));
                }
                Err(e) => {
                    warn!("Failed to load config {}: {:#}", path.display(), e);
                }
            }
        }
        info!("Using built-in default config");
        (Self::default(), None)
    }

    /// Load settings from specified path
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config.sanitized())
    }

    /// Clamp out-of-range values
    pub fn sanitized(mut self) -> Self {
        let buffers = self.stream.buffers.clamp(MIN_PBO_COUNT, MAX_PBO_COUNT);
        if buffers != self.stream.buffers {
            warn!(
                "stream.buffers = {} out of range, using {}",
                self.stream.buffers, buffers
            );
            self.stream.buffers = buffers;
        }

        let size = self.font.size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        if size != self.font.size {
            warn!("font.size = {} out of range, using {}", self.font.size, size);
            self.font.size = size;
        }

        if !(self.overlay.scale > 0.0) {
            warn!("overlay.scale = {} invalid, using 1.0", self.overlay.scale);
            self.overlay.scale = 1.0;
        }

        if self.pattern.pixels_per_frame == 0 {
            warn!("pattern.pixels_per_frame = 0, using 1");
            self.pattern.pixels_per_frame = 1;
        }

        if self.window.width == 0 || self.window.height == 0 {
            warn!("window size must be non-zero, using defaults");
            self.window.width = DEFAULT_WINDOW_WIDTH;
            self.window.height = DEFAULT_WINDOW_HEIGHT;
        }

        self
    }

    /// Take the settings that can change while running from a reloaded config
    ///
    /// Window, font, stream and quad inset own GPU resources and keep their
    /// current values until restart.
    pub fn apply_live(&mut self, new: Config) {
        self.overlay = new.overlay;
        self.appearance.background = new.appearance.background;
        self.pattern.stroke = new.pattern.stroke;
        self.paths = new.paths;
    }

    /// Serialize settings as a TOML document
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| anyhow!("Failed to serialize config: {}", e))
    }

    /// Write the default config to the user config path
    ///
    /// Refuses to overwrite an existing file unless `force` is set.
    pub fn write_default(force: bool) -> Result<PathBuf> {
        let path = default_config_path()
            .ok_or_else(|| anyhow!("Cannot determine config directory"))?;
        Self::default().write_to(&path, force)?;
        Ok(path)
    }

    /// Write config to a specific file
    pub fn write_to(&self, path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(anyhow!(
                "Config file already exists: {} (use --force to overwrite)",
                path.display()
            ));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!("Config written: {}", path.display());
        Ok(())
    }
}

/// Get default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("texstream").join("config.toml"))
}

/// Config file change watcher (Linux only)
#[cfg(target_os = "linux")]
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<()>,
}

#[cfg(target_os = "linux")]
impl ConfigWatcher {
    /// Start watching config file
    pub fn new(config_path: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let file_name = config_path.file_name().map(|n| n.to_os_string());

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                // Editors often save by writing to a temp file then renaming
                use notify::EventKind;
                let relevant = match &file_name {
                    Some(name) => event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(name.as_os_str())),
                    None => true,
                };
                if relevant && matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    let _ = tx.send(());
                }
            }
        })?;

        // Watch the parent directory to catch rename operations
        let watch_path = config_path.parent().unwrap_or(config_path);
        watcher.watch(watch_path, RecursiveMode::NonRecursive)?;
        info!("Watching config: {}", config_path.display());

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Check if config file was modified (non-blocking)
    ///
    /// Drains queued events so one save triggers one reload.
    pub fn check_reload(&self) -> bool {
        let mut changed = false;
        while self.rx.try_recv().is_ok() {
            changed = true;
        }
        changed
    }
}

/// No-op watcher on platforms without notify support
#[cfg(not(target_os = "linux"))]
pub struct ConfigWatcher;

#[cfg(not(target_os = "linux"))]
impl ConfigWatcher {
    pub fn new(_config_path: &Path) -> Result<Self> {
        Ok(Self)
    }

    pub fn check_reload(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.window.width, 1280);
        assert_eq!(cfg.window.height, 720);
        assert_eq!(cfg.font.size, 48.0);
        assert_eq!(cfg.stream.buffers, 2);
        assert_eq!(cfg.overlay.label, "FPS : ");
        assert_eq!(cfg.overlay.blend, BlendMode::Additive);
        assert_eq!(cfg.pattern.fill_rgba8(), [0x0f, 0x80, 0x80, 0xff]);
        assert_eq!(cfg.pattern.stroke_rgba8(), [0xff, 0x00, 0x00, 0xff]);
    }

    #[test]
    fn test_overlay_color() {
        let c = OverlayConfig::default().color_rgba();
        assert!((c[0] - 0.5).abs() < 0.01);
        assert!((c[1] - 0.8).abs() < 0.01);
        assert!((c[2] - 0.2).abs() < 0.01);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [overlay]
            label = "frame "
            mode = "fps"

            [font]
            rasterizer = "freetype"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.overlay.label, "frame ");
        assert_eq!(cfg.overlay.mode, CounterMode::Fps);
        assert_eq!(cfg.overlay.x, 15.0);
        assert_eq!(cfg.font.rasterizer, RasterizerKind::Freetype);
        assert_eq!(cfg.font.size, 48.0);
        assert!(cfg.window.maximized);
    }

    #[test]
    fn test_sanitize_clamps() {
        let mut cfg = Config::default();
        cfg.stream.buffers = 7;
        cfg.font.size = 2.0;
        cfg.overlay.scale = -1.0;
        cfg.pattern.pixels_per_frame = 0;
        let cfg = cfg.sanitized();
        assert_eq!(cfg.stream.buffers, 3);
        assert_eq!(cfg.font.size, 8.0);
        assert_eq!(cfg.overlay.scale, 1.0);
        assert_eq!(cfg.pattern.pixels_per_frame, 1);
    }

    #[test]
    fn test_write_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.stream.buffers = 3;
        cfg.overlay.blend = BlendMode::Alpha;
        cfg.write_to(&path, false).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.stream.buffers, 3);
        assert_eq!(loaded.overlay.blend, BlendMode::Alpha);

        // Second write without force is refused
        assert!(cfg.write_to(&path, false).is_err());
        assert!(cfg.write_to(&path, true).is_ok());
    }

    #[test]
    fn test_load_bad_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        assert!(Config::load_from_file(&path).is_err());
        let (cfg, source) = Config::load(Some(&path));
        assert!(source.is_none());
        assert_eq!(cfg.stream.buffers, 2);
    }

    #[test]
    fn test_apply_live_scope() {
        let mut cfg = Config::default();

        let mut new = Config::default();
        new.overlay.label = "frame ".to_string();
        new.overlay.mode = CounterMode::Frames;
        new.appearance.background = "000000".to_string();
        new.appearance.quad_inset = 40.0;
        new.pattern.stroke = "00ff00ff".to_string();
        new.pattern.pixels_per_frame = 9;
        new.paths.screenshot_dir = "/tmp/shots".to_string();
        new.window.width = 640;
        new.window.vsync = false;
        new.font.size = 20.0;
        new.stream.buffers = 3;

        cfg.apply_live(new);

        // Applied live
        assert_eq!(cfg.overlay.label, "frame ");
        assert_eq!(cfg.overlay.mode, CounterMode::Frames);
        assert_eq!(cfg.appearance.background, "000000");
        assert_eq!(cfg.pattern.stroke_rgba8(), [0x00, 0xff, 0x00, 0xff]);
        assert_eq!(cfg.paths.screenshot_dir, "/tmp/shots");

        // Restart only
        let defaults = Config::default();
        assert_eq!(cfg.appearance.quad_inset, defaults.appearance.quad_inset);
        assert_eq!(cfg.pattern.pixels_per_frame, defaults.pattern.pixels_per_frame);
        assert_eq!(cfg.window.width, defaults.window.width);
        assert_eq!(cfg.window.vsync, defaults.window.vsync);
        assert_eq!(cfg.font.size, defaults.font.size);
        assert_eq!(cfg.stream.buffers, defaults.stream.buffers);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_watcher_reports_write_once() {
        use std::time::{Duration, Instant};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::default().write_to(&path, false).unwrap();

        let watcher = ConfigWatcher::new(&path).unwrap();
        assert!(!watcher.check_reload());

        let mut cfg = Config::default();
        cfg.overlay.label = "frame ".to_string();
        cfg.write_to(&path, true).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut changed = false;
        while Instant::now() < deadline {
            if watcher.check_reload() {
                changed = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(changed, "no change event for {}", path.display());

        // Let trailing events for the same write arrive, then drain them
        std::thread::sleep(Duration::from_millis(200));
        watcher.check_reload();
        assert!(!watcher.check_reload());

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.overlay.label, "frame ");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_watcher_ignores_other_files() {
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::default().write_to(&path, false).unwrap();

        let watcher = ConfigWatcher::new(&path).unwrap();
        std::fs::write(dir.path().join("other.toml"), "x = 1").unwrap();
        std::thread::sleep(Duration::from_millis(200));
        assert!(!watcher.check_reload());
    }
}
