//! CSS-style color strings turned into shader vectors, plus the demo palette.

use log::warn;
use serde::{Deserialize, Serialize};

/// Shader-ready color with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GlslColor {
    Rgb([f32; 3]),
    Rgba([f32; 4]),
}

impl GlslColor {
    pub fn as_slice(&self) -> &[f32] {
        match self {
            Self::Rgb(values) => values,
            Self::Rgba(values) => values,
        }
    }

    /// Drops the alpha channel if present.
    pub fn rgb(&self) -> [f32; 3] {
        match *self {
            Self::Rgb(values) => values,
            Self::Rgba([r, g, b, _]) => [r, g, b],
        }
    }
}

/// Parses `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)` or
/// `rgba(r, g, b, a)` into a shader color.
///
/// With `allow_alpha` the result always carries four channels (a missing
/// alpha is `1.0`); without it the alpha is dropped. Returns `None` for text
/// that is neither notation.
pub fn glsl_color(color: &str, allow_alpha: bool) -> Option<GlslColor> {
    let color = color.trim();
    let (rgb, alpha) = if let Some(hex) = color.strip_prefix('#') {
        parse_hex(hex)?
    } else {
        parse_functional(color)?
    };
    Some(if allow_alpha {
        GlslColor::Rgba([rgb[0], rgb[1], rgb[2], alpha.unwrap_or(1.0)])
    } else {
        GlslColor::Rgb(rgb)
    })
}

fn parse_hex(hex: &str) -> Option<([f32; 3], Option<f32>)> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let digits: Vec<u8> = match hex.len() {
        3 | 4 => hex
            .chars()
            .map(|c| {
                let value = c.to_digit(16).unwrap_or(0) as u8;
                value * 16 + value
            })
            .collect(),
        6 | 8 => hex
            .as_bytes()
            .chunks(2)
            .map(|pair| {
                std::str::from_utf8(pair)
                    .ok()
                    .and_then(|text| u8::from_str_radix(text, 16).ok())
                    .unwrap_or(0)
            })
            .collect(),
        _ => return None,
    };
    let channel = |index: usize| f32::from(digits[index]) / 255.0;
    let alpha = (digits.len() == 4).then(|| channel(3));
    Some(([channel(0), channel(1), channel(2)], alpha))
}

fn parse_functional(color: &str) -> Option<([f32; 3], Option<f32>)> {
    let open = color.find('(')?;
    let close = color.rfind(')')?;
    let name = color[..open].trim().to_ascii_lowercase();
    if name != "rgb" && name != "rgba" {
        return None;
    }
    let values = color
        .get(open + 1..close)?
        .split(',')
        .map(|part| part.trim().parse::<f32>().ok())
        .collect::<Option<Vec<_>>>()?;
    match values.as_slice() {
        [r, g, b] => Some(([r / 255.0, g / 255.0, b / 255.0], None)),
        [r, g, b, a] => Some(([r / 255.0, g / 255.0, b / 255.0], Some(*a))),
        _ => None,
    }
}

/// User-facing color strings for the lit 3D demos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    pub ambient_light: String,
    pub left_light: String,
    pub right_light: String,
    pub top_light: String,
    pub bottom_light: String,
    pub background_a: String,
    pub background_b: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            ambient_light: "#78c7ff".to_string(),
            left_light: "#f79d64".to_string(),
            right_light: "#0090f7".to_string(),
            top_light: "#ffffff".to_string(),
            bottom_light: "#ffffff".to_string(),
            background_a: "#78c7ff".to_string(),
            background_b: "#e4f6ae".to_string(),
        }
    }
}

/// Uniform name paired with its converted color.
pub type NamedColor = (&'static str, GlslColor);

/// Converts every palette entry that parses; background colors keep their
/// alpha, light colors never do.
pub fn glsl_colors(palette: &Palette) -> Vec<NamedColor> {
    let entries: [(&'static str, &str, bool); 7] = [
        ("uAmbientLightColor", &palette.ambient_light, false),
        ("uLeftLightColor", &palette.left_light, false),
        ("uRightLightColor", &palette.right_light, false),
        ("uTopLightColor", &palette.top_light, false),
        ("uBottomLightColor", &palette.bottom_light, false),
        ("uBackgroundA", &palette.background_a, true),
        ("uBackgroundB", &palette.background_b, true),
    ];
    entries
        .into_iter()
        .filter_map(|(uniform, text, allow_alpha)| match glsl_color(text, allow_alpha) {
            Some(color) => Some((uniform, color)),
            None => {
                warn!("ignoring unparseable color {text:?} for {uniform}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: &[f32], b: &[f32]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 0.01)
    }

    #[test]
    fn parses_hex_without_alpha() {
        assert_eq!(glsl_color("#ff0000", false), Some(GlslColor::Rgb([1.0, 0.0, 0.0])));
    }

    #[test]
    fn parses_hex_with_alpha() {
        let color = glsl_color("#ff000080", true).unwrap();
        assert!(approx(color.as_slice(), &[1.0, 0.0, 0.0, 0.5]));
    }

    #[test]
    fn six_digit_hex_gets_opaque_alpha_when_allowed() {
        let color = glsl_color("#00ff00", true).unwrap();
        assert_eq!(color.as_slice(), &[0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn alpha_dropped_when_not_allowed() {
        let color = glsl_color("#ff000080", false).unwrap();
        assert!(approx(color.as_slice(), &[1.0, 0.0, 0.0]));
        let color = glsl_color("rgba(255, 0, 0, 0.3)", false).unwrap();
        assert!(approx(color.as_slice(), &[1.0, 0.0, 0.0]));
    }

    #[test]
    fn parses_functional_notation() {
        assert_eq!(
            glsl_color("rgba(0,0,0,1)", true),
            Some(GlslColor::Rgba([0.0, 0.0, 0.0, 1.0]))
        );
        let color = glsl_color("rgb(100, 100, 100)", false).unwrap();
        assert!(approx(color.as_slice(), &[0.392, 0.392, 0.392]));
    }

    #[test]
    fn short_hex_expands() {
        assert_eq!(glsl_color("#fff", false), Some(GlslColor::Rgb([1.0, 1.0, 1.0])));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(glsl_color("#", true), None);
        assert_eq!(glsl_color("#zzzzzz", true), None);
        assert_eq!(glsl_color("hsl(1, 2, 3)", true), None);
        assert_eq!(glsl_color("rgba(1, 2)", true), None);
        assert_eq!(glsl_color("", false), None);
    }

    #[test]
    fn palette_conversion_skips_bad_entries() {
        let palette = Palette {
            left_light: "nonsense".to_string(),
            ..Palette::default()
        };
        let colors = glsl_colors(&palette);
        assert_eq!(colors.len(), 6);
        assert!(colors.iter().all(|(name, _)| *name != "uLeftLightColor"));
        let background = colors.iter().find(|(name, _)| *name == "uBackgroundA").unwrap();
        assert_eq!(background.1.as_slice().len(), 4);
        let ambient = colors.iter().find(|(name, _)| *name == "uAmbientLightColor").unwrap();
        assert_eq!(ambient.1.as_slice().len(), 3);
    }
}
