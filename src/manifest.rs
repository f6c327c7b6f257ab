//! Demo manifests: XML documents describing one shader demo.
//!
//! ```xml
//! <demo>
//!     <name>Base triangle</name>
//!     <mode>single</mode>
//!     <mesh type="base"/>
//!     <vertex>...</vertex>
//!     <fragment>...</fragment>
//!     <uniform name="uResolution" type="vec2" value="400 400" readonly="true"/>
//!     <uniform name="uTime" type="float" value="0" readonly="true"/>
//! </demo>
//! ```

use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use glam::{Vec2, Vec3};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::color::Palette;
use crate::config::{ProjectionSettings, DEFAULT_ROTATION_SPEED};
use crate::lighting::LightOverrides;
use crate::loader::MeshRequest;
use crate::math::Transformation;
use crate::mesh::Face;
use crate::uniforms::{UniformSetting, UniformType, UniformValue, RESOLUTION_UNIFORM};

/// CSS size used when a manifest names neither a canvas nor a resolution.
pub const DEFAULT_CANVAS_SIZE: Vec2 = Vec2::new(400.0, 400.0);

/// How many passes a frame takes and where they render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderMode {
    /// One pass straight to the canvas.
    #[default]
    Single,
    /// Ping-pong between two frame buffers, sampling the previous frame.
    Feedback,
    /// Depth pass from the light, then the lit pass.
    Shadow,
    /// Silhouette and shading passes composited by the outline program.
    Outline,
}

impl RenderMode {
    fn parse(text: &str) -> Result<Self> {
        match text.to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "feedback" => Ok(Self::Feedback),
            "shadow" => Ok(Self::Shadow),
            "outline" => Ok(Self::Outline),
            other => Err(anyhow!("unknown render mode {other:?}")),
        }
    }
}

/// Geometry as described by a manifest. OBJ models are parsed later by the
/// mesh loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeshConfig {
    BaseTriangles,
    FaceArray(Vec<Face>),
    Obj(MeshRequest),
}

impl MeshConfig {
    pub fn is_3d(&self) -> bool {
        !matches!(self, Self::BaseTriangles)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoConfig {
    pub name: String,
    pub mode: RenderMode,
    pub mesh: MeshConfig,
    pub vertex_source: String,
    pub fragment_source: String,
    pub depth_vertex_source: Option<String>,
    pub depth_fragment_source: Option<String>,
    pub uniforms: Vec<UniformSetting>,
    /// CSS size of the canvas.
    pub canvas: Vec2,
    pub rotation_delta: Vec3,
    pub follow_mouse: bool,
    pub projection: ProjectionSettings,
    pub lights: LightOverrides,
    pub palette: Palette,
    pub transformation: Transformation,
}

impl DemoConfig {
    /// A single-pass demo with every optional setting at its default.
    pub fn new(name: impl Into<String>, mesh: MeshConfig, vertex_source: impl Into<String>, fragment_source: impl Into<String>) -> Self {
        let rotation_delta = if mesh.is_3d() {
            Vec3::new(0.0, DEFAULT_ROTATION_SPEED, 0.0)
        } else {
            Vec3::ZERO
        };
        Self {
            name: name.into(),
            mode: RenderMode::Single,
            mesh,
            vertex_source: vertex_source.into(),
            fragment_source: fragment_source.into(),
            depth_vertex_source: None,
            depth_fragment_source: None,
            uniforms: Vec::new(),
            canvas: DEFAULT_CANVAS_SIZE,
            rotation_delta,
            follow_mouse: false,
            projection: ProjectionSettings::default(),
            lights: LightOverrides::default(),
            palette: Palette::default(),
            transformation: Transformation::default(),
        }
    }

    /// Parses a `<demo>` manifest.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid demo XML")?;
        let root = document.root_element();
        if !root.has_tag_name("demo") {
            bail!("expected <demo> root element, found <{}>", root.tag_name().name());
        }

        let name = required_text(&root, "name")?;
        let mesh = match child(&root, "mesh") {
            Some(node) => parse_mesh(&node).context("invalid <mesh>")?,
            None => MeshConfig::BaseTriangles,
        };
        let vertex_source = required_text(&root, "vertex")?;
        let fragment_source = required_text(&root, "fragment")?;
        let mut config = Self::new(name, mesh, vertex_source, fragment_source);

        if let Some(mode) = optional_text(&root, "mode") {
            config.mode = RenderMode::parse(&mode)?;
        }
        config.depth_vertex_source = optional_text(&root, "depth-vertex");
        config.depth_fragment_source = optional_text(&root, "depth-fragment");

        for node in root.children().filter(|n| n.has_tag_name("uniform")) {
            config.uniforms.push(parse_uniform(&node)?);
        }

        let resolution = config
            .uniforms
            .iter()
            .find(|setting| setting.name == RESOLUTION_UNIFORM)
            .and_then(|setting| match setting.value {
                UniformValue::Vec2(size) => Some(size),
                _ => None,
            });
        config.canvas = match child(&root, "canvas") {
            Some(node) => Vec2::new(
                parse_attr_f32(&node, "width", DEFAULT_CANVAS_SIZE.x)?,
                parse_attr_f32(&node, "height", DEFAULT_CANVAS_SIZE.y)?,
            ),
            None => resolution.unwrap_or(DEFAULT_CANVAS_SIZE),
        };

        config.rotation_delta = parse_vec3(optional_text(&root, "rotation-delta"), config.rotation_delta)
            .context("invalid <rotation-delta>")?;
        config.follow_mouse = parse_bool(optional_text(&root, "follow-mouse").as_deref(), false)?;

        if let Some(node) = child(&root, "projection") {
            let defaults = ProjectionSettings::default();
            config.projection = ProjectionSettings {
                field_of_view_degrees: parse_attr_f32(&node, "fov", defaults.field_of_view_degrees)?,
                near: parse_attr_f32(&node, "near", defaults.near)?,
                far: parse_attr_f32(&node, "far", defaults.far)?,
                eye: parse_vec3(node.attribute("eye").map(str::to_string), defaults.eye)?,
            };
        }

        if let Some(node) = child(&root, "lights") {
            config.lights = LightOverrides {
                brightness: parse_attr_opt(&node, "brightness")?,
                shininess: parse_attr_opt(&node, "shininess")?,
                shadow_strength: parse_attr_opt(&node, "shadow-strength")?,
                ..LightOverrides::default()
            };
        }

        if let Some(node) = child(&root, "palette") {
            let palette = &mut config.palette;
            let entries = [
                ("ambient", &mut palette.ambient_light),
                ("left", &mut palette.left_light),
                ("right", &mut palette.right_light),
                ("top", &mut palette.top_light),
                ("bottom", &mut palette.bottom_light),
                ("background-a", &mut palette.background_a),
                ("background-b", &mut palette.background_b),
            ];
            for (attribute, slot) in entries {
                if let Some(value) = node.attribute(attribute) {
                    *slot = value.to_string();
                }
            }
        }

        if let Some(node) = child(&root, "transformation") {
            let defaults = Transformation::default();
            config.transformation = Transformation {
                translation: parse_vec3(node.attribute("translation").map(str::to_string), defaults.translation)?,
                rotation: parse_vec3(node.attribute("rotation").map(str::to_string), defaults.rotation)?,
                scale: parse_attr_f32(&node, "scale", defaults.scale)?,
            };
        }

        Ok(config)
    }
}

fn parse_mesh(node: &Node<'_, '_>) -> Result<MeshConfig> {
    match node.attribute("type").unwrap_or("base") {
        "base" => Ok(MeshConfig::BaseTriangles),
        "faces" => {
            let faces = node
                .children()
                .filter(|n| n.has_tag_name("face"))
                .map(|face| parse_face(face.text().unwrap_or_default()))
                .collect::<Result<Vec<_>>>()?;
            if faces.is_empty() {
                bail!("face mesh has no <face> entries");
            }
            Ok(MeshConfig::FaceArray(faces))
        }
        "obj" => {
            let obj_source = required_text(node, "obj")?;
            let mtl_source = optional_text(node, "mtl");
            let textures: HashMap<String, String> = node
                .children()
                .filter(|n| n.has_tag_name("texture"))
                .map(|texture| {
                    let name = texture
                        .attribute("name")
                        .ok_or_else(|| anyhow!("<texture> is missing name"))?;
                    let url = texture.attribute("url").unwrap_or(name);
                    Ok((name.to_string(), url.to_string()))
                })
                .collect::<Result<_>>()?;
            Ok(MeshConfig::Obj(MeshRequest {
                obj_source,
                mtl_source,
                textures,
            }))
        }
        other => Err(anyhow!("unknown mesh type {other:?}")),
    }
}

fn parse_face(text: &str) -> Result<Face> {
    let values = text
        .split_whitespace()
        .map(|component| component.parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .context("face contains a non-numeric component")?;
    if values.len() != 9 {
        bail!("face needs 9 components, found {}", values.len());
    }
    Ok([
        Vec3::from_slice(&values[0..3]),
        Vec3::from_slice(&values[3..6]),
        Vec3::from_slice(&values[6..9]),
    ])
}

fn parse_uniform(node: &Node<'_, '_>) -> Result<UniformSetting> {
    let name = node
        .attribute("name")
        .ok_or_else(|| anyhow!("<uniform> is missing name"))?;
    let kind_name = node
        .attribute("type")
        .ok_or_else(|| anyhow!("uniform {name} is missing type"))?;
    let kind = UniformType::from_name(kind_name)
        .ok_or_else(|| anyhow!("uniform {name} has unknown type {kind_name:?}"))?;
    let value_text = node.attribute("value").unwrap_or("0 0 0");
    let value = UniformValue::parse(kind, value_text)
        .ok_or_else(|| anyhow!("uniform {name} has invalid value {value_text:?}"))?;
    let mut setting = UniformSetting::new(name, value);
    setting.readonly = parse_bool(node.attribute("readonly"), false)?;
    setting.is_bool = parse_bool(node.attribute("bool"), false)?;
    Ok(setting)
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(tag))
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let mut numbers = value.split_whitespace().map(|component| component.parse::<f32>());
    let mut next = || -> Result<f32> {
        Ok(numbers
            .next()
            .ok_or_else(|| anyhow!("vector is missing components"))??)
    };
    let x = next()?;
    let y = next()?;
    let z = next()?;
    Ok(Vec3::new(x, y, z))
}

fn parse_bool(value: Option<&str>, default: bool) -> Result<bool> {
    match value.map(str::trim) {
        None => Ok(default),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some("false") | Some("0") | Some("no") => Ok(false),
        Some(other) => Err(anyhow!("invalid boolean {other:?}")),
    }
}

fn parse_attr_opt(node: &Node<'_, '_>, attribute: &str) -> Result<Option<f32>> {
    node.attribute(attribute)
        .map(|value| {
            value
                .trim()
                .parse::<f32>()
                .map_err(|err| anyhow!("failed to parse {attribute}: {err}"))
        })
        .transpose()
}

fn parse_attr_f32(node: &Node<'_, '_>, attribute: &str, default: f32) -> Result<f32> {
    Ok(parse_attr_opt(node, attribute)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
    <demo>
        <name>Base triangle</name>
        <vertex>attribute vec3 aVertexPosition; void main() { gl_Position = vec4(aVertexPosition, 1.0); }</vertex>
        <fragment>void main() { gl_FragColor = vec4(1.0); }</fragment>
        <uniform name="uResolution" type="vec2" value="400 400" readonly="true"/>
        <uniform name="uTime" type="float" value="0" readonly="true"/>
        <uniform name="uGrid" type="int" value="1" bool="true"/>
    </demo>
    "#;

    #[test]
    fn base_demo_uses_defaults() {
        let config = DemoConfig::from_xml(BASE).unwrap();
        assert_eq!(config.name, "Base triangle");
        assert_eq!(config.mode, RenderMode::Single);
        assert_eq!(config.mesh, MeshConfig::BaseTriangles);
        assert_eq!(config.canvas, Vec2::new(400.0, 400.0));
        assert_eq!(config.rotation_delta, Vec3::ZERO);
        assert_eq!(config.uniforms.len(), 3);
        assert!(config.uniforms[0].readonly);
        assert!(config.uniforms[2].is_bool);
        assert_eq!(config.uniforms[2].value, UniformValue::Int(1));
    }

    #[test]
    fn parses_lit_obj_demo() {
        let xml = r##"
        <demo>
            <name>Crate</name>
            <mode>shadow</mode>
            <mesh type="obj">
                <obj>v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3</obj>
                <mtl>newmtl wood
map_Kd crate.png</mtl>
                <texture name="crate.png" url="/assets/crate.png"/>
            </mesh>
            <vertex>void main() {}</vertex>
            <fragment>void main() {}</fragment>
            <canvas width="640" height="480"/>
            <follow-mouse>true</follow-mouse>
            <projection fov="60" far="50"/>
            <lights brightness="0.8" shininess="16"/>
            <palette left="#ff0000" background-b="rgba(0, 0, 0, 0.5)"/>
        </demo>
        "##;
        let config = DemoConfig::from_xml(xml).unwrap();
        assert_eq!(config.mode, RenderMode::Shadow);
        assert!(config.follow_mouse);
        assert_eq!(config.canvas, Vec2::new(640.0, 480.0));
        assert_eq!(config.rotation_delta, Vec3::new(0.0, DEFAULT_ROTATION_SPEED, 0.0));
        assert_eq!(config.projection.field_of_view_degrees, 60.0);
        assert_eq!(config.projection.near, 0.01);
        assert_eq!(config.projection.far, 50.0);
        assert_eq!(config.lights.brightness, Some(0.8));
        assert_eq!(config.lights.shadow_strength, None);
        assert_eq!(config.palette.left_light, "#ff0000");
        assert_eq!(config.palette.top_light, Palette::default().top_light);
        match config.mesh {
            MeshConfig::Obj(request) => {
                assert!(request.obj_source.contains("f 1 2 3"));
                assert_eq!(
                    request.textures.get("crate.png").map(String::as_str),
                    Some("/assets/crate.png")
                );
            }
            other => panic!("unexpected mesh {other:?}"),
        }
    }

    #[test]
    fn parses_face_arrays() {
        let xml = r#"
        <demo>
            <name>Faces</name>
            <mode>outline</mode>
            <mesh type="faces">
                <face>0 0 0  1 0 0  0 1 0</face>
                <face>1 0 0  1 1 0  0 1 0</face>
            </mesh>
            <vertex>void main() {}</vertex>
            <fragment>void main() {}</fragment>
            <rotation-delta>0.01 0 0</rotation-delta>
        </demo>
        "#;
        let config = DemoConfig::from_xml(xml).unwrap();
        assert_eq!(config.mode, RenderMode::Outline);
        assert_eq!(config.rotation_delta, Vec3::new(0.01, 0.0, 0.0));
        match config.mesh {
            MeshConfig::FaceArray(faces) => {
                assert_eq!(faces.len(), 2);
                assert_eq!(faces[1][1], Vec3::new(1.0, 1.0, 0.0));
            }
            other => panic!("unexpected mesh {other:?}"),
        }
    }

    #[test]
    fn invalid_manifests_are_rejected() {
        assert!(DemoConfig::from_xml("<scene/>").is_err());
        assert!(DemoConfig::from_xml("<demo><vertex>x</vertex><fragment>y</fragment></demo>").is_err());
        let bad_uniform = BASE.replace(r#"type="int""#, r#"type="mat4""#);
        let err = DemoConfig::from_xml(&bad_uniform).unwrap_err();
        assert!(format!("{err:#}").contains("unknown type"));
        let bad_mode = BASE.replace("<name>", "<mode>sideways</mode><name>");
        assert!(DemoConfig::from_xml(&bad_mode).is_err());
        let short_face = r#"<demo><name>x</name><mesh type="faces"><face>0 0 0</face></mesh>
            <vertex>v</vertex><fragment>f</fragment></demo>"#;
        assert!(DemoConfig::from_xml(short_face).is_err());
    }
}
