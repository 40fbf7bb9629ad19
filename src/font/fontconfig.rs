//! fontconfig integration
//!
//! Search and select system fonts

use anyhow::{anyhow, Result};
use fontconfig::Fontconfig;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Font search result
#[derive(Debug, Clone)]
pub struct FontMatch {
    /// Font file path
    pub path: PathBuf,
    /// Font name
    pub family: String,
}

/// Search fonts using fontconfig
pub struct FontFinder {
    fc: Fontconfig,
}

impl FontFinder {
    /// Initialize FontFinder
    pub fn new() -> Result<Self> {
        let fc = Fontconfig::new().ok_or_else(|| anyhow!("fontconfig initialization failed"))?;
        info!("fontconfig initialized");
        Ok(Self { fc })
    }

    /// Search by font name
    /// Verifies that the returned font actually matches the requested family name
    /// (fontconfig always returns the "closest" match, even if completely unrelated)
    pub fn find_font(&self, family: &str) -> Option<FontMatch> {
        let font = self.fc.find(family, None)?;
        if family_matches(family, &font.name) {
            return Some(FontMatch {
                path: font.path,
                family: font.name,
            });
        }
        warn!(
            "fontconfig: rejected false match for \"{}\": got \"{}\"",
            family, font.name
        );
        None
    }

    /// Search for monospace font
    pub fn find_monospace(&self) -> Option<FontMatch> {
        let fallbacks = [
            "DejaVu Sans Mono",
            "Liberation Mono",
            "Noto Sans Mono",
            "Source Code Pro",
            "Inconsolata",
            "Courier New",
            "monospace",
        ];

        for name in fallbacks {
            if let Some(m) = self.find_font(name) {
                return Some(m);
            }
        }

        warn!("Monospace font not found");
        None
    }
}

/// Loose family name comparison (case-insensitive containment either way)
fn family_matches(requested: &str, got: &str) -> bool {
    let req = requested.to_ascii_lowercase();
    let got = got.to_ascii_lowercase();
    if req.is_empty() || got.is_empty() {
        return false;
    }
    got.contains(&req) || req.contains(&got)
}

/// Load font file
pub fn load_font_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| anyhow!("Failed to read font file: {} ({})", path.display(), e))
}

/// Resolve a font specifier: if it's a valid file path, read it directly.
/// Otherwise, treat it as a font family name and search via fontconfig.
pub fn resolve_font(specifier: &str) -> Result<Vec<u8>> {
    let path = Path::new(specifier);
    if path.is_absolute() && path.exists() {
        info!("Font loaded from path: {}", specifier);
        return load_font_file(path);
    }

    // Try as font family name via fontconfig
    match FontFinder::new() {
        Ok(finder) => {
            if let Some(font_match) = finder.find_font(specifier) {
                info!(
                    "Font resolved by name: \"{}\" → {} ({})",
                    specifier,
                    font_match.family,
                    font_match.path.display()
                );
                return load_font_file(&font_match.path);
            }
        }
        Err(e) => warn!("{}", e),
    }

    // Last resort: try as relative path
    if path.exists() {
        info!("Font loaded from relative path: {}", specifier);
        return load_font_file(path);
    }

    Err(anyhow!(
        "Font not found: \"{}\" (not a valid path or font name)",
        specifier
    ))
}

/// Search and load system font using fontconfig
pub fn load_system_font_fc() -> Result<Vec<u8>> {
    let finder = FontFinder::new()?;

    if let Some(font_match) = finder.find_monospace() {
        info!(
            "System font (fontconfig): {} ({})",
            font_match.family,
            font_match.path.display()
        );
        return load_font_file(&font_match.path);
    }

    Err(anyhow!("Monospace font not found via fontconfig"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_matches() {
        assert!(family_matches("DejaVu Sans Mono", "DejaVu Sans Mono"));
        assert!(family_matches("dejavu sans", "DejaVu Sans Mono"));
        assert!(!family_matches("Inconsolata", "DejaVu Sans"));
    }

    #[test]
    fn test_resolve_missing_relative_path() {
        assert!(resolve_font("definitely/not/a/font-file.ttf").is_err());
    }

    #[test]
    fn test_load_font_file_missing() {
        let err = load_font_file(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/font.ttf"));
    }
}
