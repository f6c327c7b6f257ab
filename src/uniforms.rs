//! Declarative uniform descriptors and the per-frame GPU writes derived from
//! them.
//!
//! The descriptor list is only changed by explicit user edits (UI input,
//! canvas resize). Time-varying values reach the GPU through
//! [`compute_uniform_writes`], which reads a [`FrameInputs`] record and leaves
//! the descriptors untouched.

use std::collections::HashMap;

use glam::{Vec2, Vec3};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::gl::{GraphicsContext, ProgramId, UniformLocation};

pub const RESOLUTION_UNIFORM: &str = "uResolution";
pub const TIME_UNIFORM: &str = "uTime";
pub const MOUSE_UNIFORM: &str = "uMouse";

/// GLSL type of a uniform, which fixes the arity of its GL call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UniformType {
    Float1,
    Int1,
    Vec2,
    Vec3,
}

impl UniformType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "float" | "float_1" | "float1" => Some(Self::Float1),
            "int" | "int_1" | "int1" => Some(Self::Int1),
            "vec2" | "vec_2" => Some(Self::Vec2),
            "vec3" | "vec_3" => Some(Self::Vec3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2(Vec2),
    Vec3(Vec3),
}

impl UniformValue {
    pub fn kind(&self) -> UniformType {
        match self {
            Self::Float(_) => UniformType::Float1,
            Self::Int(_) => UniformType::Int1,
            Self::Vec2(_) => UniformType::Vec2,
            Self::Vec3(_) => UniformType::Vec3,
        }
    }

    /// Parses whitespace or comma separated components for `kind`.
    pub fn parse(kind: UniformType, text: &str) -> Option<Self> {
        let mut numbers = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty());
        let value = match kind {
            UniformType::Float1 => Self::Float(numbers.next()?.parse().ok()?),
            UniformType::Int1 => Self::Int(numbers.next()?.parse().ok()?),
            UniformType::Vec2 => Self::Vec2(Vec2::new(
                numbers.next()?.parse().ok()?,
                numbers.next()?.parse().ok()?,
            )),
            UniformType::Vec3 => Self::Vec3(Vec3::new(
                numbers.next()?.parse().ok()?,
                numbers.next()?.parse().ok()?,
                numbers.next()?.parse().ok()?,
            )),
        };
        numbers.next().is_none().then_some(value)
    }
}

/// One user-facing uniform of a demo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformSetting {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: UniformType,
    pub value: UniformValue,
    pub default_value: UniformValue,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub is_bool: bool,
}

impl UniformSetting {
    pub fn new(name: impl Into<String>, value: UniformValue) -> Self {
        Self {
            name: name.into(),
            kind: value.kind(),
            value,
            default_value: value,
            readonly: false,
            is_bool: false,
        }
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn boolean(mut self) -> Self {
        self.is_bool = true;
        self
    }
}

/// Time-varying inputs of a single animation frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInputs {
    pub time: f32,
    /// Pointer position in canvas pixels, Y flipped (see
    /// [`crate::interaction::pointer_to_canvas`]).
    pub mouse: Vec2,
}

/// A single value destined for the named uniform.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformWrite {
    pub name: String,
    pub value: UniformValue,
}

/// Derives this frame's uniform writes without touching the descriptors.
///
/// `uTime` takes `inputs.time` and `uMouse` takes `inputs.mouse`. A setting
/// whose value does not match its declared type is skipped.
pub fn compute_uniform_writes(settings: &[UniformSetting], inputs: &FrameInputs) -> Vec<UniformWrite> {
    settings
        .iter()
        .filter_map(|setting| {
            let value = match (setting.kind, setting.name.as_str()) {
                (UniformType::Float1, TIME_UNIFORM) => UniformValue::Float(inputs.time),
                (UniformType::Vec2, MOUSE_UNIFORM) => UniformValue::Vec2(inputs.mouse),
                _ => setting.value,
            };
            if value.kind() != setting.kind {
                warn!(
                    "uniform {} declared as {:?} but holds {:?}; skipping",
                    setting.name,
                    setting.kind,
                    value.kind()
                );
                return None;
            }
            Some(UniformWrite {
                name: setting.name.clone(),
                value,
            })
        })
        .collect()
}

/// Uniform locations resolved for one program. Names the program does not
/// use map to `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformLocations {
    locations: HashMap<String, Option<UniformLocation>>,
}

impl UniformLocations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves every name in `names` against `program`.
    pub fn resolve<'a, C, I>(ctx: &mut C, program: ProgramId, names: I) -> Self
    where
        C: GraphicsContext + ?Sized,
        I: IntoIterator<Item = &'a str>,
    {
        let mut locations = Self::new();
        for name in names {
            locations.insert(ctx, program, name);
        }
        locations
    }

    pub fn insert<C>(&mut self, ctx: &mut C, program: ProgramId, name: &str)
    where
        C: GraphicsContext + ?Sized,
    {
        if !self.locations.contains_key(name) {
            let location = ctx.uniform_location(program, name);
            self.locations.insert(name.to_string(), location);
        }
    }

    pub fn get(&self, name: &str) -> Option<UniformLocation> {
        self.locations.get(name).copied().flatten()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.locations.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

/// Pushes `value` to `name` if the program exposes it.
pub fn assign_uniform<C>(ctx: &mut C, locations: &UniformLocations, name: &str, value: UniformValue)
where
    C: GraphicsContext + ?Sized,
{
    if let Some(location) = locations.get(name) {
        ctx.set_uniform(location, &value);
    }
}

/// Pushes every write whose uniform is present in `locations`.
pub fn assign_uniforms<C>(ctx: &mut C, locations: &UniformLocations, writes: &[UniformWrite])
where
    C: GraphicsContext + ?Sized,
{
    for write in writes {
        assign_uniform(ctx, locations, &write.name, write.value);
    }
}

/// Reasons a user edit to a uniform was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniformEditError {
    #[error("unknown uniform {0}")]
    Unknown(String),
    #[error("uniform {0} is read-only")]
    ReadOnly(String),
    #[error("uniform {name} expects {expected:?}")]
    TypeMismatch { name: String, expected: UniformType },
}

/// Ordered uniform descriptors of a demo; index 0 is the canvas resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniformSettings {
    settings: Vec<UniformSetting>,
}

impl UniformSettings {
    /// Wraps `settings` with `uResolution` moved to index 0. A read-only one
    /// is synthesised when the demo declares none.
    pub fn new(mut settings: Vec<UniformSetting>, resolution: Vec2) -> Self {
        let declared = settings
            .iter()
            .position(|setting| setting.name == RESOLUTION_UNIFORM);
        match declared {
            Some(index) if settings[index].kind == UniformType::Vec2 => {
                let setting = settings.remove(index);
                settings.insert(0, setting);
            }
            Some(index) => {
                warn!(
                    "{RESOLUTION_UNIFORM} declared as {:?}, replacing it with a vec2",
                    settings[index].kind
                );
                settings.remove(index);
                settings.insert(0, Self::synthesised_resolution(resolution));
            }
            None => settings.insert(0, Self::synthesised_resolution(resolution)),
        }
        Self { settings }
    }

    fn synthesised_resolution(resolution: Vec2) -> UniformSetting {
        UniformSetting::new(RESOLUTION_UNIFORM, UniformValue::Vec2(resolution)).readonly()
    }

    pub fn as_slice(&self) -> &[UniformSetting] {
        &self.settings
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.settings.iter().map(|setting| setting.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&UniformSetting> {
        self.settings.iter().find(|setting| setting.name == name)
    }

    pub fn value(&self, name: &str) -> Option<UniformValue> {
        self.get(name).map(|setting| setting.value)
    }

    pub fn resolution(&self) -> Vec2 {
        match self.settings.first().map(|setting| setting.value) {
            Some(UniformValue::Vec2(size)) => size,
            _ => Vec2::ZERO,
        }
    }

    /// Rewrites index 0; called by the resize handler, so read-only is
    /// ignored.
    pub fn set_resolution(&mut self, size: Vec2) {
        if let Some(first) = self.settings.first_mut() {
            if first.kind == UniformType::Vec2 {
                first.value = UniformValue::Vec2(size);
            }
        }
    }

    /// Applies a user edit.
    pub fn set_value(&mut self, name: &str, value: UniformValue) -> Result<(), UniformEditError> {
        let setting = self
            .settings
            .iter_mut()
            .find(|setting| setting.name == name)
            .ok_or_else(|| UniformEditError::Unknown(name.to_string()))?;
        if setting.readonly {
            return Err(UniformEditError::ReadOnly(name.to_string()));
        }
        if value.kind() != setting.kind {
            return Err(UniformEditError::TypeMismatch {
                name: name.to_string(),
                expected: setting.kind,
            });
        }
        setting.value = value;
        Ok(())
    }

    /// Restores the default value of `name`.
    pub fn reset(&mut self, name: &str) -> Result<(), UniformEditError> {
        let setting = self
            .settings
            .iter_mut()
            .find(|setting| setting.name == name)
            .ok_or_else(|| UniformEditError::Unknown(name.to_string()))?;
        setting.value = setting.default_value;
        Ok(())
    }

    pub fn writes(&self, inputs: &FrameInputs) -> Vec<UniformWrite> {
        compute_uniform_writes(&self.settings, inputs)
    }
}
