//! Four-light rig: presets, brightness scaling and the uniforms it feeds.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::color::{glsl_colors, GlslColor, Palette};
use crate::uniforms::{UniformValue, UniformWrite};

pub const DEFAULT_BRIGHTNESS: f32 = 0.4;
pub const DEFAULT_SHININESS: f32 = 1.0;
pub const DEFAULT_SHADOW_STRENGTH: f32 = 0.25;

/// Positions of the four directional lights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightPositions {
    pub left: Vec3,
    pub right: Vec3,
    pub top: Vec3,
    pub bottom: Vec3,
}

impl Default for LightPositions {
    fn default() -> Self {
        Self {
            left: Vec3::new(-8.0, 4.0, 2.0),
            right: Vec3::new(8.0, 4.0, 2.0),
            top: Vec3::new(2.0, 8.0, 2.0),
            bottom: Vec3::new(-8.0, -8.0, 2.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightIntensities {
    pub ambient: f32,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Default for LightIntensities {
    fn default() -> Self {
        Self {
            ambient: 0.5,
            left: 0.1,
            right: 0.01,
            top: 0.01,
            bottom: 0.01,
        }
    }
}

/// Scales every intensity by `brightness` except `ambient`, which is
/// brightness independent.
pub fn apply_brightness(brightness: f32, intensities: &LightIntensities) -> LightIntensities {
    LightIntensities {
        ambient: intensities.ambient,
        left: intensities.left * brightness,
        right: intensities.right * brightness,
        top: intensities.top * brightness,
        bottom: intensities.bottom * brightness,
    }
}

/// Caller-supplied lighting overrides; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightOverrides {
    pub positions: Option<LightPositions>,
    pub intensities: Option<LightIntensities>,
    pub brightness: Option<f32>,
    pub shininess: Option<f32>,
    pub shadow_strength: Option<f32>,
}

/// Effective lighting of a lit demo.
///
/// `intensities` holds the unscaled presets; the brightness factor is applied
/// when the uniform writes are produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightSettings {
    pub positions: LightPositions,
    pub intensities: LightIntensities,
    pub brightness: f32,
    pub shininess: f32,
    pub shadow_strength: f32,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            positions: LightPositions::default(),
            intensities: LightIntensities::default(),
            brightness: DEFAULT_BRIGHTNESS,
            shininess: DEFAULT_SHININESS,
            shadow_strength: DEFAULT_SHADOW_STRENGTH,
        }
    }
}

impl LightSettings {
    pub fn from_overrides(overrides: &LightOverrides) -> Self {
        let mut settings = Self::default();
        settings.merge(overrides);
        settings
    }

    /// Re-applies overrides on top of the current values.
    pub fn merge(&mut self, overrides: &LightOverrides) {
        if let Some(positions) = overrides.positions {
            self.positions = positions;
        }
        if let Some(intensities) = overrides.intensities {
            self.intensities = intensities;
        }
        if let Some(brightness) = overrides.brightness {
            self.brightness = brightness;
        }
        if let Some(shininess) = overrides.shininess {
            self.shininess = shininess;
        }
        if let Some(shadow_strength) = overrides.shadow_strength {
            self.shadow_strength = shadow_strength;
        }
    }

    pub fn effective_intensities(&self) -> LightIntensities {
        apply_brightness(self.brightness, &self.intensities)
    }

    pub fn uniform_writes(&self) -> Vec<UniformWrite> {
        let intensities = self.effective_intensities();
        let positions = &self.positions;
        vec![
            float("uAmbientLightIntensity", intensities.ambient),
            float("uLeftLightIntensity", intensities.left),
            float("uRightLightIntensity", intensities.right),
            float("uTopLightIntensity", intensities.top),
            float("uBottomLightIntensity", intensities.bottom),
            vec3("uLeftLightPosition", positions.left),
            vec3("uRightLightPosition", positions.right),
            vec3("uTopLightPosition", positions.top),
            vec3("uBottomLightPosition", positions.bottom),
            float("uCustomShininess", self.shininess),
            float("uShadowStrength", self.shadow_strength),
        ]
    }
}

/// Light color writes for `palette`. Background colors are four-channel and
/// are returned separately by [`palette_background`] since they do not map
/// onto the three-component uniform setters.
pub fn palette_writes(palette: &Palette) -> Vec<UniformWrite> {
    glsl_colors(palette)
        .into_iter()
        .filter_map(|(name, color)| match color {
            GlslColor::Rgb(rgb) => Some(vec3(name, Vec3::from_array(rgb))),
            GlslColor::Rgba(_) => None,
        })
        .collect()
}

/// Background colors of the palette as RGBA, keyed by uniform name.
pub fn palette_background(palette: &Palette) -> Vec<(&'static str, [f32; 4])> {
    glsl_colors(palette)
        .into_iter()
        .filter_map(|(name, color)| match color {
            GlslColor::Rgba(rgba) => Some((name, rgba)),
            GlslColor::Rgb(_) => None,
        })
        .collect()
}

fn float(name: &str, value: f32) -> UniformWrite {
    UniformWrite {
        name: name.to_string(),
        value: UniformValue::Float(value),
    }
}

fn vec3(name: &str, value: Vec3) -> UniformWrite {
    UniformWrite {
        name: name.to_string(),
        value: UniformValue::Vec3(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brightness_scales_all_but_ambient() {
        let base = LightIntensities::default();
        for brightness in [0.0, 0.25, 0.4, 1.0] {
            let scaled = apply_brightness(brightness, &base);
            assert_eq!(scaled.ambient, base.ambient);
            assert_eq!(scaled.left, base.left * brightness);
            assert_eq!(scaled.right, base.right * brightness);
            assert_eq!(scaled.top, base.top * brightness);
            assert_eq!(scaled.bottom, base.bottom * brightness);
        }
    }

    #[test]
    fn overrides_merge_into_defaults() {
        let settings = LightSettings::from_overrides(&LightOverrides {
            shininess: Some(32.0),
            brightness: Some(1.0),
            ..LightOverrides::default()
        });
        assert_eq!(settings.shininess, 32.0);
        assert_eq!(settings.shadow_strength, DEFAULT_SHADOW_STRENGTH);
        assert_eq!(settings.positions, LightPositions::default());
        assert_eq!(settings.effective_intensities().left, 0.1);
    }

    #[test]
    fn merge_keeps_unspecified_values() {
        let mut settings = LightSettings::from_overrides(&LightOverrides {
            shadow_strength: Some(0.8),
            ..LightOverrides::default()
        });
        settings.merge(&LightOverrides {
            brightness: Some(0.1),
            ..LightOverrides::default()
        });
        assert_eq!(settings.shadow_strength, 0.8);
        assert_eq!(settings.brightness, 0.1);
    }

    #[test]
    fn uniform_writes_cover_every_light() {
        let writes = LightSettings::default().uniform_writes();
        let names: Vec<_> = writes.iter().map(|w| w.name.as_str()).collect();
        for expected in [
            "uAmbientLightIntensity",
            "uLeftLightPosition",
            "uBottomLightIntensity",
            "uCustomShininess",
            "uShadowStrength",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        let ambient = writes.iter().find(|w| w.name == "uAmbientLightIntensity").unwrap();
        assert_eq!(ambient.value, UniformValue::Float(0.5));
    }

    #[test]
    fn palette_splits_lights_and_backgrounds() {
        let palette = Palette::default();
        let lights = palette_writes(&palette);
        assert_eq!(lights.len(), 5);
        let backgrounds = palette_background(&palette);
        assert_eq!(backgrounds.len(), 2);
        assert_eq!(backgrounds[0].0, "uBackgroundA");
        assert_eq!(backgrounds[0].1[3], 1.0);
    }
}
