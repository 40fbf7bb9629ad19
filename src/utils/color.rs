//! Color parsing utilities
//!
//! Hex color parsing shared by the config module and the pixel pattern.

/// Parse hex color to RGBA bytes
///
/// Accepts RRGGBBAA, RRGGBB (alpha = 255) and the 3-digit short form RGB.
/// Leading `#` is optional. Returns None on invalid input.
pub fn parse_hex_rgba8(hex: &str) -> Option<[u8; 4]> {
    let hex = hex.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        8 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            let a = u8::from_str_radix(&hex[6..8], 16).ok()?;
            Some([r, g, b, a])
        }
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some([r, g, b, 255])
        }
        3 => {
            // Short format: expand F -> FF
            let r = u8::from_str_radix(&hex[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&hex[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&hex[2..3], 16).ok()? * 17;
            Some([r, g, b, 255])
        }
        _ => None,
    }
}

/// Parse hex color to normalized [f32; 4] RGBA
/// Returns white [1.0, 1.0, 1.0, 1.0] on invalid input.
pub fn parse_hex_color_to_rgba(hex: &str) -> [f32; 4] {
    match parse_hex_rgba8(hex) {
        Some(c) => rgba8_to_f32(c),
        None => [1.0, 1.0, 1.0, 1.0],
    }
}

/// Normalize RGBA bytes to 0.0-1.0
pub fn rgba8_to_f32(c: [u8; 4]) -> [f32; 4] {
    [
        c[0] as f32 / 255.0,
        c[1] as f32 / 255.0,
        c[2] as f32 / 255.0,
        c[3] as f32 / 255.0,
    ]
}
