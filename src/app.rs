//! Application loop
//!
//! Owns the window and every GPU resource. winit drives the loop; each
//! redraw runs one frame: mutate buffer, upload, draw quad, draw text,
//! present.

use anyhow::Result;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowId;

use crate::config::{Config, ConfigWatcher};
use crate::font::{self, GlyphAtlas};
use crate::gpu::{GlInfo, GlWindow, QuadRenderer, StreamingTexture, TextRenderer};
use crate::overlay::FrameCounter;
use crate::pixels::{PaintStatus, PixelBuffer, ScanPainter};
use crate::screenshot;

/// Runtime options from the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// File the config was loaded from (watched for changes)
    pub config_path: Option<PathBuf>,
    /// Stop after this many presented frames
    pub max_frames: Option<u64>,
}

/// What a frame asks the loop to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameOutcome {
    Continue,
    Exit,
}

impl FrameOutcome {
    /// Outcome of a presented frame given the pattern state after its step
    fn after_step(status: PaintStatus, exit_when_done: bool) -> Self {
        if status == PaintStatus::Finished && exit_when_done {
            Self::Exit
        } else {
            Self::Continue
        }
    }
}

/// Window, GPU resources and per-frame state; exists between `resumed` and exit
struct RenderState {
    win: GlWindow,
    stream: StreamingTexture,
    quad: QuadRenderer,
    atlas: GlyphAtlas,
    text: TextRenderer,
    pixels: PixelBuffer,
    painter: ScanPainter,
    counter: FrameCounter,
    watcher: Option<ConfigWatcher>,
    /// Framebuffer size (physical pixels)
    size: (u32, u32),
    clear_color: [f32; 4],
    text_color: [f32; 4],
    paused: bool,
    screenshot_pending: bool,
}

impl RenderState {
    fn new(event_loop: &ActiveEventLoop, config: &Config, options: &RunOptions) -> Result<Self> {
        let win = GlWindow::new(event_loop, &config.window)?;
        GlInfo::query(&win.gl).log();

        let (w, h) = win.physical_size();
        let (w, h) = (w.max(1), h.max(1));
        win.set_viewport(w, h);

        let font_data = font::load_font(&config.font)?;
        let mut rasterizer = font::create_rasterizer(&config.font, &font_data)?;
        let atlas = GlyphAtlas::new(&win.gl, rasterizer.as_mut())?;

        let pixels = PixelBuffer::new(w, h, config.pattern.fill_rgba8());
        let stream = StreamingTexture::new(&win.gl, w, h, config.stream.buffers)?;
        stream.prime(&win.gl, pixels.as_bytes())?;

        let quad = QuadRenderer::new(&win.gl, w, h, config.appearance.quad_inset)?;
        let text = TextRenderer::new(&win.gl)?;

        let painter = ScanPainter::new(
            config.pattern.stroke_rgba8(),
            config.pattern.pixels_per_frame,
            config.pattern.stop_margin,
        );

        let watcher = options
            .config_path
            .as_deref()
            .and_then(|path| match ConfigWatcher::new(path) {
                Ok(w) => Some(w),
                Err(e) => {
                    warn!("Config hot reload disabled: {}", e);
                    None
                }
            });

        info!(
            "Render state initialized: {}x{} ({} bytes per frame)",
            pixels.width(),
            pixels.height(),
            pixels.len()
        );

        Ok(Self {
            win,
            stream,
            quad,
            atlas,
            text,
            pixels,
            painter,
            counter: FrameCounter::from_config(&config.overlay),
            watcher,
            size: (w, h),
            clear_color: config.appearance.background_rgba(),
            text_color: config.overlay.color_rgba(),
            paused: false,
            screenshot_pending: false,
        })
    }

    /// Run one frame
    fn render(&mut self, config: &Config) -> Result<FrameOutcome> {
        let gl = &self.win.gl;
        let (w, h) = self.size;

        self.win.clear(self.clear_color);

        let status = if self.paused {
            PaintStatus::Running
        } else {
            self.painter.step(&mut self.pixels)
        };

        debug_assert_eq!(self.pixels.len(), self.stream.data_size());

        // Skip the quad when the upload buffer could not be mapped
        if self.stream.stream(gl, self.pixels.as_bytes())? {
            self.quad.draw(gl, &self.stream);
        }

        let overlay = &config.overlay;
        self.text.begin();
        self.text.push_text(
            &self.counter.text(),
            overlay.x,
            overlay.y,
            overlay.scale,
            self.text_color,
            &self.atlas,
        );
        self.text.flush(gl, &self.atlas, overlay.blend, w, h);

        if self.screenshot_pending {
            self.screenshot_pending = false;
            if let Err(e) = screenshot::save_screenshot(gl, w, h, &config.paths.screenshot_dir) {
                warn!("Screenshot save failed: {:#}", e);
            }
        }

        self.win.swap_buffers()?;
        self.counter.tick(Instant::now());

        // The frame that finishes the pattern is still uploaded and presented
        let outcome = FrameOutcome::after_step(status, config.pattern.exit_when_done);
        if outcome == FrameOutcome::Exit {
            info!(
                "Pattern reached byte {} of {} after {} frames",
                self.painter.cursor(),
                self.pixels.len(),
                self.counter.frames()
            );
        }
        Ok(outcome)
    }

    /// Rebuild size-dependent resources
    fn resize(&mut self, config: &Config, width: u32, height: u32) -> Result<()> {
        // Minimized
        if width == 0 || height == 0 || (width, height) == self.size {
            return Ok(());
        }
        let gl = &self.win.gl;

        self.win.resize_surface(width, height);
        self.win.set_viewport(width, height);

        self.stream.resize(gl, width, height)?;
        self.quad.resize(gl, width, height);
        self.pixels = PixelBuffer::new(width, height, config.pattern.fill_rgba8());
        self.painter.reset();
        self.stream.prime(gl, self.pixels.as_bytes())?;

        debug!(
            "Resized {}x{} -> {}x{} ({} bytes per frame)",
            self.size.0,
            self.size.1,
            self.stream.width(),
            self.stream.height(),
            self.stream.data_size()
        );
        self.size = (width, height);
        Ok(())
    }

    /// Rewind the pattern to the fill color
    fn reset_pattern(&mut self, config: &Config) {
        self.pixels.fill(config.pattern.fill_rgba8());
        self.painter.reset();
        info!("Pattern reset");
    }

    /// Re-apply settings that do not need new GPU resources
    fn apply_reloaded(&mut self, config: &Config) {
        self.clear_color = config.appearance.background_rgba();
        self.text_color = config.overlay.color_rgba();
        self.counter.apply_config(&config.overlay);
        self.painter.set_stroke(config.pattern.stroke_rgba8());
    }

    /// Release GPU resources (reverse creation order)
    fn destroy(&self) {
        let gl = &self.win.gl;
        self.text.destroy(gl);
        self.quad.destroy(gl);
        self.stream.destroy(gl);
        self.atlas.destroy(gl);
        info!("GPU resources released");
    }
}

/// winit application
pub struct App {
    config: Config,
    options: RunOptions,
    state: Option<RenderState>,
    /// First fatal error; reported by `main` after the loop returns
    error: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: Config, options: RunOptions) -> Self {
        Self {
            config,
            options,
            state: None,
            error: None,
        }
    }

    /// Fatal error that ended the loop, if any
    pub fn take_error(&mut self) -> Option<anyhow::Error> {
        self.error.take()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        error!("{:#}", e);
        if self.error.is_none() {
            self.error = Some(e);
        }
        event_loop.exit();
    }

    /// Reload config if the watched file changed
    fn check_config_reload(&mut self) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        let changed = state.watcher.as_ref().is_some_and(|w| w.check_reload());
        let Some(path) = self.options.config_path.as_deref().filter(|_| changed) else {
            return;
        };

        info!("Config file change detected, reloading...");
        match Config::load_from_file(path) {
            Ok(new_cfg) => {
                self.config.apply_live(new_cfg);
                state.apply_reloaded(&self.config);
                info!("Config reloaded (window, font and stream settings need a restart)");
            }
            Err(e) => warn!("Config reload failed, keeping current settings: {:#}", e),
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        let Some(state) = self.state.as_mut() else {
            return;
        };

        match &event.logical_key {
            Key::Named(NamedKey::Escape) => event_loop.exit(),
            Key::Named(NamedKey::F12) => state.screenshot_pending = true,
            Key::Named(NamedKey::Space) => {
                state.paused = !state.paused;
                if state.painter.is_finished() {
                    info!("Pattern finished; press R to restart");
                } else {
                    info!("Pattern {}", if state.paused { "paused" } else { "resumed" });
                }
            }
            Key::Character(s) if s.as_str().eq_ignore_ascii_case("r") => {
                state.reset_pattern(&self.config);
            }
            _ => {}
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        match state.render(&self.config) {
            Ok(FrameOutcome::Continue) => {}
            Ok(FrameOutcome::Exit) => {
                event_loop.exit();
                return;
            }
            Err(e) => {
                self.fail(event_loop, e);
                return;
            }
        }

        if let Some(max) = self.options.max_frames {
            if state.counter.frames() >= max {
                info!("Frame limit reached ({})", max);
                event_loop.exit();
                return;
            }
        }

        self.check_config_reload();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let init_start = Instant::now();
        match RenderState::new(event_loop, &self.config, &self.options) {
            Ok(state) => {
                info!(
                    "Initialized in {:.1}ms",
                    init_start.elapsed().as_secs_f64() * 1000.0
                );
                state.win.request_redraw();
                self.state = Some(state);
            }
            Err(e) => self.fail(event_loop, e.context("Initialization failed")),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                let Some(state) = self.state.as_mut() else {
                    return;
                };
                if let Err(e) = state.resize(&self.config, new_size.width, new_size.height) {
                    self.fail(event_loop, e);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, &event),
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.as_ref() {
            state.win.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.take() {
            state.destroy();
        }
    }
}
