//! texstream - streaming texture upload demo
//!
//! Streams a CPU-mutated RGBA buffer into a GPU texture through a ring of
//! pixel-unpack buffers, draws it on a full-window quad and overlays a
//! frame counter rendered from a glyph atlas.

mod app;
mod config;
mod constants;
mod font;
mod gpu;
mod overlay;
mod pixels;
mod screenshot;
mod utils;

use anyhow::{anyhow, Result};
use log::info;
use std::path::PathBuf;
use winit::event_loop::EventLoop;

/// Parsed command line
#[derive(Debug, Default, PartialEq)]
struct Args {
    help: bool,
    version: bool,
    init_config: bool,
    force: bool,
    config: Option<PathBuf>,
    /// 0 = unlimited
    frames: u64,
}

impl Args {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut parsed = Self::default();
        let mut iter = args.into_iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-h" | "--help" => parsed.help = true,
                "-V" | "--version" => parsed.version = true,
                "--init-config" => parsed.init_config = true,
                "-f" | "--force" => parsed.force = true,
                "--config" => {
                    let path = iter
                        .next()
                        .ok_or_else(|| anyhow!("--config requires a path"))?;
                    parsed.config = Some(PathBuf::from(path));
                }
                "--frames" => {
                    let n = iter
                        .next()
                        .ok_or_else(|| anyhow!("--frames requires a number"))?;
                    parsed.frames = n
                        .parse()
                        .map_err(|_| anyhow!("--frames: not a number: {}", n))?;
                }
                other => {
                    if let Some(path) = other.strip_prefix("--config=") {
                        parsed.config = Some(PathBuf::from(path));
                    } else if let Some(n) = other.strip_prefix("--frames=") {
                        parsed.frames = n
                            .parse()
                            .map_err(|_| anyhow!("--frames: not a number: {}", n))?;
                    } else {
                        return Err(anyhow!("Unknown option: {} (see --help)", other));
                    }
                }
            }
        }

        Ok(parsed)
    }
}

fn print_help() {
    println!(
        r#"texstream {} - streaming texture upload demo

USAGE:
    texstream [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    --config PATH           Load config from PATH
    --init-config           Generate default config file
    -f, --force             Overwrite existing config file
    --frames N              Exit after N frames (0 = run until closed)

KEYS:
    Escape                  Quit
    F12                     Save screenshot
    Space                   Pause / resume the pattern
    R                       Reset the pattern

ENVIRONMENT:
    TEXSTREAM_CONFIG        Config file path
    TEXSTREAM_FONT          Font file path (when font.main is empty)
    RUST_LOG                Log filter (default: warn)

CONFIG FILE:
    ~/.config/texstream/config.toml
"#,
        env!("CARGO_PKG_VERSION")
    );
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse(std::env::args().skip(1))?;

    if args.help {
        print_help();
        return Ok(());
    }

    if args.version {
        println!("texstream {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if args.init_config {
        let path = config::Config::write_default(args.force)?;
        println!("Config file generated: {}", path.display());
        return Ok(());
    }

    info!("texstream starting...");

    let (cfg, config_path) = config::Config::load(args.config.as_deref());
    let options = app::RunOptions {
        config_path,
        max_frames: (args.frames > 0).then_some(args.frames),
    };

    let event_loop = EventLoop::new().map_err(|e| anyhow!("Failed to create event loop: {}", e))?;
    let mut app = app::App::new(cfg, options);
    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow!("Event loop failed: {}", e))?;

    if let Some(e) = app.take_error() {
        return Err(e);
    }

    info!("texstream exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_no_args() {
        assert_eq!(parse(&[]).unwrap(), Args::default());
    }

    #[test]
    fn test_flags() {
        let a = parse(&["--init-config", "-f"]).unwrap();
        assert!(a.init_config && a.force);
        assert!(parse(&["-V"]).unwrap().version);
        assert!(parse(&["--help"]).unwrap().help);
    }

    #[test]
    fn test_values() {
        let a = parse(&["--config", "/tmp/c.toml", "--frames", "120"]).unwrap();
        assert_eq!(a.config, Some(PathBuf::from("/tmp/c.toml")));
        assert_eq!(a.frames, 120);

        let a = parse(&["--frames=5", "--config=x.toml"]).unwrap();
        assert_eq!(a.frames, 5);
        assert_eq!(a.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn test_errors() {
        assert!(parse(&["--frames"]).is_err());
        assert!(parse(&["--frames", "abc"]).is_err());
        assert!(parse(&["--config"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
    }
}
