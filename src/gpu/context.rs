//! GPU context management
//!
//! winit window + glutin OpenGL 3.3 core context setup

use anyhow::{anyhow, Result};
use glow::HasContext;
use glutin::config::{ConfigTemplateBuilder, GlConfig};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentGlContext, PossiblyCurrentContext,
    Version,
};
use glutin::display::{GetGlDisplay, GlDisplay};
use glutin::surface::{GlSurface, Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use glutin_winit::DisplayBuilder;
use log::{debug, info, warn};
use raw_window_handle::HasWindowHandle;
use std::ffi::CString;
use std::num::NonZeroU32;
use winit::dpi::LogicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowAttributes};

use crate::config::WindowConfig;
use crate::constants::{GL_VERSION_MAJOR, GL_VERSION_MINOR};

/// Surface sizes must be non-zero (minimized windows report 0)
fn non_zero(v: u32) -> NonZeroU32 {
    NonZeroU32::new(v).unwrap_or(NonZeroU32::MIN)
}

/// Window with a current OpenGL context
///
/// Field order is drop order: GL objects go before the surface,
/// the surface before the context, the context before the window.
pub struct GlWindow {
    pub gl: glow::Context,
    gl_surface: Surface<WindowSurface>,
    gl_context: PossiblyCurrentContext,
    pub window: Window,
}

impl GlWindow {
    /// Create the window and make an OpenGL 3.3 core context current on it
    pub fn new(event_loop: &ActiveEventLoop, config: &WindowConfig) -> Result<Self> {
        let window_attrs = WindowAttributes::default()
            .with_title(config.title.clone())
            .with_inner_size(LogicalSize::new(config.width, config.height))
            .with_maximized(config.maximized);

        let config_template = ConfigTemplateBuilder::new().with_alpha_size(8);

        let (window, gl_config) = DisplayBuilder::new()
            .with_window_attributes(Some(window_attrs))
            .build(event_loop, config_template, |configs| {
                // Fewest samples
                configs
                    .min_by_key(|c| c.num_samples())
                    .expect("glutin passes at least one config to the picker")
            })
            .map_err(|e| anyhow!("Failed to build GL display: {}", e))?;

        let window = window.ok_or_else(|| anyhow!("Failed to create window"))?;
        let gl_display = gl_config.display();

        let raw_handle = window
            .window_handle()
            .map_err(|e| anyhow!("Failed to get window handle: {}", e))?
            .as_raw();

        let context_attrs = ContextAttributesBuilder::new()
            .with_profile(GlProfile::Core)
            .with_context_api(ContextApi::OpenGl(Some(Version::new(
                GL_VERSION_MAJOR,
                GL_VERSION_MINOR,
            ))))
            .build(Some(raw_handle));

        let not_current_context = unsafe { gl_display.create_context(&gl_config, &context_attrs) }
            .map_err(|e| {
                anyhow!(
                    "Failed to create OpenGL {}.{} context: {}",
                    GL_VERSION_MAJOR,
                    GL_VERSION_MINOR,
                    e
                )
            })?;

        let inner = window.inner_size();
        let surface_attrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(
            raw_handle,
            non_zero(inner.width),
            non_zero(inner.height),
        );

        let gl_surface = unsafe { gl_display.create_window_surface(&gl_config, &surface_attrs) }
            .map_err(|e| anyhow!("Failed to create GL surface: {}", e))?;

        let gl_context = not_current_context
            .make_current(&gl_surface)
            .map_err(|e| anyhow!("Failed to make GL context current: {}", e))?;

        let interval = if config.vsync {
            SwapInterval::Wait(NonZeroU32::MIN)
        } else {
            SwapInterval::DontWait
        };
        if let Err(e) = gl_surface.set_swap_interval(&gl_context, interval) {
            warn!("Failed to set swap interval: {}", e);
        }

        let gl = unsafe {
            glow::Context::from_loader_function(|name| {
                CString::new(name)
                    .map(|name| gl_display.get_proc_address(&name))
                    .unwrap_or(std::ptr::null())
            })
        };

        info!(
            "Window created: {}x{} (vsync: {})",
            inner.width, inner.height, config.vsync
        );

        Ok(Self {
            gl,
            gl_surface,
            gl_context,
            window,
        })
    }

    /// Drawable size in physical pixels
    pub fn physical_size(&self) -> (u32, u32) {
        let s = self.window.inner_size();
        (s.width, s.height)
    }

    /// Resize the GL surface to match the window
    pub fn resize_surface(&self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.gl_surface
            .resize(&self.gl_context, non_zero(width), non_zero(height));
        debug!("Surface resized: {}x{}", width, height);
    }

    /// Present the back buffer
    pub fn swap_buffers(&self) -> Result<()> {
        self.gl_surface
            .swap_buffers(&self.gl_context)
            .map_err(|e| anyhow!("Failed to swap buffers: {}", e))
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Clear screen (fill with solid color)
    pub fn clear(&self, color: [f32; 4]) {
        let [r, g, b, a] = color;
        unsafe {
            self.gl.clear_color(r, g, b, a);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    /// Set viewport
    pub fn set_viewport(&self, width: u32, height: u32) {
        unsafe {
            self.gl.viewport(0, 0, width as i32, height as i32);
        }
    }
}

/// OpenGL (or OpenGL ES) version
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlVersion {
    pub major: u32,
    pub minor: u32,
    pub es: bool,
}

impl GlVersion {
    /// Parse version from GL_VERSION string
    ///
    /// Desktop strings start with the version ("3.3.0 NVIDIA 535.54"),
    /// ES strings carry an "OpenGL ES " prefix ("OpenGL ES 3.1 Mesa 23.0.0").
    pub fn parse(version_str: &str) -> Option<Self> {
        let (es, rest) = match version_str.find("ES ") {
            Some(pos) => (true, &version_str[pos + 3..]),
            None => (false, version_str.trim_start()),
        };

        let version_part: String = rest
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();

        let mut parts = version_part.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        Some(Self { major, minor, es })
    }

    /// Pixel-unpack buffers and map_buffer_range need GL 3.0 / ES 3.0
    pub fn supports_streaming(&self) -> bool {
        self.major >= 3
    }
}

/// Driver identification strings
#[derive(Debug, Clone)]
pub struct GlInfo {
    pub version: String,
    pub renderer: String,
    pub vendor: String,
    pub parsed: Option<GlVersion>,
}

impl GlInfo {
    /// Query driver strings from the current context
    pub fn query(gl: &glow::Context) -> Self {
        let (version, renderer, vendor) = unsafe {
            (
                gl.get_parameter_string(glow::VERSION),
                gl.get_parameter_string(glow::RENDERER),
                gl.get_parameter_string(glow::VENDOR),
            )
        };
        let parsed = GlVersion::parse(&version);
        Self {
            version,
            renderer,
            vendor,
            parsed,
        }
    }

    /// Display OpenGL info and the parsed version
    pub fn log(&self) {
        info!("OpenGL: {}", self.version);
        info!("Renderer: {}", self.renderer);
        info!("Vendor: {}", self.vendor);

        match self.parsed {
            Some(v) if !v.supports_streaming() => warn!(
                "OpenGL {}.{} reported; pixel buffer streaming needs 3.0+",
                v.major, v.minor
            ),
            Some(v) => debug!("Detected {}{}.{}", if v.es { "ES " } else { "" }, v.major, v.minor),
            None => warn!("Could not parse GL_VERSION: {}", self.version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_desktop_version() {
        assert_eq!(
            GlVersion::parse("3.3.0 NVIDIA 535.54.03"),
            Some(GlVersion {
                major: 3,
                minor: 3,
                es: false
            })
        );
        let v = GlVersion::parse("4.6 (Core Profile) Mesa 23.2.1").unwrap();
        assert_eq!((v.major, v.minor, v.es), (4, 6, false));
    }

    #[test]
    fn test_parse_es_version() {
        let v = GlVersion::parse("OpenGL ES 3.1 Mesa 23.0.0").unwrap();
        assert_eq!((v.major, v.minor, v.es), (3, 1, true));
        assert!(v.supports_streaming());
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(GlVersion::parse(""), None);
        assert_eq!(GlVersion::parse("unknown driver"), None);
        assert_eq!(GlVersion::parse("3"), None);
    }

    #[test]
    fn test_old_version_cannot_stream() {
        let v = GlVersion::parse("2.1 Mesa 10.0").unwrap();
        assert!(!v.supports_streaming());
    }

    #[test]
    fn test_non_zero() {
        assert_eq!(non_zero(0).get(), 1);
        assert_eq!(non_zero(720).get(), 720);
    }
}
