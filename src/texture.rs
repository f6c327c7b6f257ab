//! Material texture loading (all-of-N join) and binding.

use std::collections::HashMap;

use glam::Vec3;
use log::{debug, warn};
use thiserror::Error;

use crate::config::MAX_SUPPORTED_MATERIALS;
use crate::gl::{GlError, GraphicsContext, TextureId, TextureSource};
use crate::obj::Material;
use crate::uniforms::{assign_uniform, UniformLocations, UniformValue};

pub const DEFAULT_DIFFUSE: [f32; 3] = [1.0, 1.0, 1.0];
pub const DEFAULT_EMISSIVE: [f32; 3] = [0.0, 0.0, 0.0];
pub const DEFAULT_SPECULAR: [f32; 3] = [1.0, 1.0, 1.0];
pub const DEFAULT_REFLECTIVITY: f32 = 1000.0;
pub const DEFAULT_OPACITY: f32 = 1.0;

/// One image to fetch for a material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRequest {
    pub material: String,
    /// Material slot, which is also the texture unit the image binds to.
    pub slot: usize,
    pub kind: &'static str,
    pub url: String,
}

/// Lists every texture the materials reference, in slot order.
pub fn texture_requests(materials: &[Material]) -> Vec<TextureRequest> {
    materials
        .iter()
        .enumerate()
        .flat_map(|(slot, material)| {
            material.textures.iter().map(move |(kind, url)| TextureRequest {
                material: material.name.clone(),
                slot,
                kind,
                url: url.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not load {kind} texture for material {material}: {reason}")]
pub struct TextureError {
    pub material: String,
    pub kind: String,
    pub reason: String,
}

/// Decoded RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub request: TextureRequest,
    pub image: DecodedImage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Pending,
    Ready(Vec<LoadedImage>),
    Failed(TextureError),
}

/// Waits for every requested image; the first failure fails the whole join.
///
/// Completions arriving after the join settled are ignored and report
/// [`JoinOutcome::Pending`].
#[derive(Debug)]
pub struct TextureJoin {
    requests: Vec<TextureRequest>,
    results: Vec<Option<DecodedImage>>,
    settled: bool,
}

impl TextureJoin {
    pub fn new(requests: Vec<TextureRequest>) -> Self {
        let results = vec![None; requests.len()];
        Self {
            requests,
            results,
            settled: false,
        }
    }

    pub fn requests(&self) -> &[TextureRequest] {
        &self.requests
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Settles immediately when nothing was requested.
    pub fn poll(&mut self) -> JoinOutcome {
        if !self.settled && self.results.iter().all(Option::is_some) {
            self.settled = true;
            return JoinOutcome::Ready(self.drain());
        }
        JoinOutcome::Pending
    }

    pub fn complete(&mut self, index: usize, result: Result<DecodedImage, String>) -> JoinOutcome {
        if self.settled {
            return JoinOutcome::Pending;
        }
        let Some(request) = self.requests.get(index) else {
            warn!("texture completion for unknown request {index}");
            return JoinOutcome::Pending;
        };
        match result {
            Ok(image) => {
                debug!(
                    "loaded {} texture {} ({}x{})",
                    request.kind, request.url, image.width, image.height
                );
                self.results[index] = Some(image);
                self.poll()
            }
            Err(reason) => {
                self.settled = true;
                JoinOutcome::Failed(TextureError {
                    material: request.material.clone(),
                    kind: request.kind.to_string(),
                    reason,
                })
            }
        }
    }

    fn drain(&mut self) -> Vec<LoadedImage> {
        self.requests
            .iter()
            .cloned()
            .zip(self.results.iter_mut().map(Option::take))
            .filter_map(|(request, image)| image.map(|image| LoadedImage { request, image }))
            .collect()
    }
}

/// 1×1 transparent texture bound while the real images load.
pub fn init_placeholder_texture<C>(ctx: &mut C) -> Result<TextureId, GlError>
where
    C: GraphicsContext + ?Sized,
{
    ctx.create_texture(TextureSource::Placeholder)
}

/// Uploads a decoded image on unit 0.
pub fn upload_image<C>(ctx: &mut C, image: &DecodedImage) -> Result<TextureId, GlError>
where
    C: GraphicsContext + ?Sized,
{
    let expected = image.width as usize * image.height as usize * 4;
    if image.pixels.len() != expected {
        return Err(GlError::BufferShape {
            len: image.pixels.len(),
            item_size: 4,
        });
    }
    ctx.active_texture(0);
    ctx.create_texture(TextureSource::Rgba {
        width: image.width,
        height: image.height,
        pixels: &image.pixels,
    })
}

/// Uploads every loaded image and returns the texture bound to each
/// material slot.
pub fn upload_images<C>(ctx: &mut C, images: &[LoadedImage]) -> Result<HashMap<usize, TextureId>, GlError>
where
    C: GraphicsContext + ?Sized,
{
    images
        .iter()
        .map(|loaded| Ok((loaded.request.slot, upload_image(ctx, &loaded.image)?)))
        .collect()
}

/// Zero means "unset" for these scalars.
fn non_zero(value: Option<f32>) -> Option<f32> {
    value.filter(|value| *value != 0.0)
}

/// Binds the first materials' textures to units `0..` and pushes their
/// surface parameters.
pub fn bind_materials<C>(
    ctx: &mut C,
    locations: &UniformLocations,
    materials: &[Material],
    textures: &HashMap<usize, TextureId>,
) where
    C: GraphicsContext + ?Sized,
{
    for (slot, material) in materials.iter().take(MAX_SUPPORTED_MATERIALS).enumerate() {
        if let Some(texture) = textures.get(&slot) {
            ctx.active_texture(slot as u32);
            ctx.bind_texture(*texture);
            assign_uniform(ctx, locations, &format!("uSampler{slot}"), UniformValue::Int(slot as i32));
            assign_uniform(ctx, locations, &format!("uDiffuse{slot}"), UniformValue::Int(slot as i32));
            assign_uniform(ctx, locations, "uHasTexture", UniformValue::Float(1.0));
        }
        write_material(
            ctx,
            locations,
            slot,
            material.diffuse.unwrap_or(DEFAULT_DIFFUSE),
            material.emissive.unwrap_or(DEFAULT_EMISSIVE),
            material.specular.unwrap_or(DEFAULT_SPECULAR),
            non_zero(material.reflectivity).unwrap_or(DEFAULT_REFLECTIVITY),
            non_zero(material.opacity).unwrap_or(DEFAULT_OPACITY),
        );
    }
}

/// Restores shader defaults for every material slot and rebinds the
/// placeholder where a texture was bound.
pub fn remove_materials<C>(
    ctx: &mut C,
    locations: &UniformLocations,
    materials: &[Material],
    placeholder: TextureId,
) where
    C: GraphicsContext + ?Sized,
{
    for (slot, material) in materials.iter().take(MAX_SUPPORTED_MATERIALS).enumerate() {
        if material.textures.diffuse_map.is_some() {
            ctx.active_texture(slot as u32);
            ctx.bind_texture(placeholder);
        }
        assign_uniform(ctx, locations, "uHasTexture", UniformValue::Float(0.0));
        write_material(
            ctx,
            locations,
            slot,
            DEFAULT_DIFFUSE,
            DEFAULT_EMISSIVE,
            DEFAULT_SPECULAR,
            DEFAULT_REFLECTIVITY,
            DEFAULT_OPACITY,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn write_material<C>(
    ctx: &mut C,
    locations: &UniformLocations,
    slot: usize,
    diffuse: [f32; 3],
    emissive: [f32; 3],
    specular: [f32; 3],
    reflectivity: f32,
    opacity: f32,
) where
    C: GraphicsContext + ?Sized,
{
    let vec3 = |rgb: [f32; 3]| UniformValue::Vec3(Vec3::from_array(rgb));
    assign_uniform(ctx, locations, &format!("uDiffuseColor{slot}"), vec3(diffuse));
    assign_uniform(ctx, locations, &format!("uEmissiveColor{slot}"), vec3(emissive));
    assign_uniform(ctx, locations, &format!("uSpecularColor{slot}"), vec3(specular));
    assign_uniform(ctx, locations, &format!("uReflectivity{slot}"), UniformValue::Float(reflectivity));
    assign_uniform(ctx, locations, &format!("uOpacity{slot}"), UniformValue::Float(opacity));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{GlCommand, ProgramId, RecordedUniform, RecordingContext};
    use crate::obj::MaterialTextures;

    fn textured(name: &str, url: &str) -> Material {
        Material {
            name: name.to_string(),
            textures: MaterialTextures {
                diffuse_map: Some(url.to_string()),
            },
            ..Material::default()
        }
    }

    fn image(side: u32) -> DecodedImage {
        DecodedImage {
            width: side,
            height: side,
            pixels: vec![255; (side * side * 4) as usize],
        }
    }

    #[test]
    fn requests_skip_untextured_materials() {
        let materials = vec![
            textured("wood", "wood.png"),
            Material::default(),
            textured("metal", "metal.png"),
        ];
        let requests = texture_requests(&materials);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].slot, 2);
        assert_eq!(requests[1].kind, "diffuseMap");
    }

    #[test]
    fn join_waits_for_all_images() {
        let mut join = TextureJoin::new(texture_requests(&[
            textured("a", "a.png"),
            textured("b", "b.png"),
        ]));
        assert_eq!(join.poll(), JoinOutcome::Pending);
        assert_eq!(join.complete(1, Ok(image(2))), JoinOutcome::Pending);
        match join.complete(0, Ok(image(4))) {
            JoinOutcome::Ready(images) => {
                assert_eq!(images.len(), 2);
                assert_eq!(images[0].request.material, "a");
                assert_eq!(images[0].image.width, 4);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(join.is_settled());
    }

    #[test]
    fn first_failure_fails_the_join() {
        let mut join = TextureJoin::new(texture_requests(&[
            textured("a", "a.png"),
            textured("b", "b.png"),
        ]));
        let outcome = join.complete(1, Err("404".to_string()));
        assert_eq!(
            outcome,
            JoinOutcome::Failed(TextureError {
                material: "b".to_string(),
                kind: "diffuseMap".to_string(),
                reason: "404".to_string(),
            })
        );
        assert_eq!(join.complete(0, Ok(image(2))), JoinOutcome::Pending);
    }

    #[test]
    fn empty_join_is_immediately_ready() {
        let mut join = TextureJoin::new(Vec::new());
        assert_eq!(join.poll(), JoinOutcome::Ready(Vec::new()));
    }

    #[test]
    fn mipmaps_only_for_power_of_two_images() {
        let mut ctx = RecordingContext::new();
        upload_image(&mut ctx, &image(4)).unwrap();
        upload_image(
            &mut ctx,
            &DecodedImage {
                width: 3,
                height: 4,
                pixels: vec![0; 48],
            },
        )
        .unwrap();
        let mipmaps: Vec<bool> = ctx
            .commands()
            .iter()
            .filter_map(|command| match command {
                GlCommand::CreateTexture { mipmaps, .. } => Some(*mipmaps),
                _ => None,
            })
            .collect();
        assert_eq!(mipmaps, vec![true, false]);
    }

    #[test]
    fn upload_rejects_truncated_pixels() {
        let mut ctx = RecordingContext::new();
        let truncated = DecodedImage {
            width: 2,
            height: 2,
            pixels: vec![0; 15],
        };
        assert!(upload_image(&mut ctx, &truncated).is_err());
    }

    #[test]
    fn bind_and_remove_materials_write_slot_uniforms() {
        let mut ctx = RecordingContext::new();
        let program = ProgramId(1);
        let locations = UniformLocations::resolve(
            &mut ctx,
            program,
            ["uHasTexture", "uSampler0", "uDiffuseColor0", "uReflectivity0", "uOpacity0"],
        );
        let materials = vec![Material {
            diffuse: Some([0.5, 0.25, 0.0]),
            opacity: Some(0.0),
            ..textured("wood", "wood.png")
        }];
        let placeholder = init_placeholder_texture(&mut ctx).unwrap();
        let texture = upload_image(&mut ctx, &image(2)).unwrap();
        bind_materials(&mut ctx, &locations, &materials, &HashMap::from([(0, texture)]));

        assert_eq!(
            ctx.last_uniform("uDiffuseColor0"),
            Some(RecordedUniform::Value(UniformValue::Vec3(Vec3::new(0.5, 0.25, 0.0))))
        );
        assert_eq!(
            ctx.last_uniform("uOpacity0"),
            Some(RecordedUniform::Value(UniformValue::Float(1.0)))
        );
        assert_eq!(
            ctx.last_uniform("uHasTexture"),
            Some(RecordedUniform::Value(UniformValue::Float(1.0)))
        );

        remove_materials(&mut ctx, &locations, &materials, placeholder);
        assert_eq!(
            ctx.last_uniform("uHasTexture"),
            Some(RecordedUniform::Value(UniformValue::Float(0.0)))
        );
        assert_eq!(
            ctx.last_uniform("uDiffuseColor0"),
            Some(RecordedUniform::Value(UniformValue::Vec3(Vec3::ONE)))
        );
        assert_eq!(
            ctx.commands().last().map(|c| matches!(c, GlCommand::Uniform { .. })),
            Some(true)
        );
        assert!(ctx
            .commands()
            .contains(&GlCommand::BindTexture(placeholder)));
    }
}
