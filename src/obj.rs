use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Texture image URLs of a material, keyed by map type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MaterialTextures {
    pub diffuse_map: Option<String>,
}

impl MaterialTextures {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.diffuse_map
            .as_deref()
            .map(|url| ("diffuseMap", url))
            .into_iter()
    }
}

/// Surface parameters parsed from an MTL `newmtl` block. Absent values fall
/// back to the shader defaults when bound.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub diffuse: Option<[f32; 3]>,
    pub emissive: Option<[f32; 3]>,
    pub specular: Option<[f32; 3]>,
    pub reflectivity: Option<f32>,
    pub opacity: Option<f32>,
    pub textures: MaterialTextures,
}

/// Flat vertex streams ready for upload, plus the materials in slot order.
///
/// `texture_addresses[i]` is the material slot of vertex `i` and is empty
/// when the model uses no materials.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadedMesh {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub textures: Vec<f32>,
    pub texture_addresses: Vec<f32>,
    pub indices: Vec<u16>,
    pub materials: Vec<Material>,
}

impl LoadedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn has_textures(&self) -> bool {
        self.materials
            .iter()
            .any(|material| material.textures.diffuse_map.is_some())
    }
}

/// Parses an OBJ model, resolving `usemtl` names against `materials`.
///
/// Materials referenced by the model but missing from `materials` are
/// appended with default parameters so every slot stays addressable.
pub fn parse_obj(data: &str, materials: Vec<Material>) -> Result<LoadedMesh> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    let mut faces: Vec<[FaceIndex; 3]> = Vec::new();
    let mut materials = materials;
    let mut uses_materials = false;
    let mut current_material = 0usize;

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
            ),
            "vn" => normals.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid normal on line {}", line_no + 1))?,
            ),
            "vt" => uvs.push(
                parse_vec2(parts)
                    .with_context(|| format!("invalid texture coordinate on line {}", line_no + 1))?,
            ),
            "usemtl" => {
                let name = parts.collect::<Vec<_>>().join(" ");
                uses_materials = true;
                current_material = match materials.iter().position(|m| m.name == name) {
                    Some(slot) => slot,
                    None => {
                        materials.push(Material {
                            name,
                            ..Material::default()
                        });
                        materials.len() - 1
                    }
                };
            }
            "f" => {
                let polygon = parse_face(parts, current_material)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                triangulate_face(&polygon, &mut faces);
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        bail!("OBJ file does not define any vertices");
    }

    let mut mesh = build_mesh(&positions, &normals, &uvs, &faces, uses_materials)?;
    if mesh.normals.is_empty() {
        mesh.normals = compute_normals(&mesh.positions, &mesh.indices);
    } else if needs_normals(&mesh.normals) {
        fill_missing_normals(&mut mesh);
    }
    mesh.materials = materials;
    Ok(mesh)
}

/// Parses an MTL library. `textures` maps file names referenced by `map_Kd`
/// to the URLs they are served from; unknown names are kept verbatim.
pub fn parse_mtl(data: &str, textures: &HashMap<String, String>) -> Result<Vec<Material>> {
    let mut materials: Vec<Material> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        if tag == "newmtl" {
            materials.push(Material {
                name: parts.collect::<Vec<_>>().join(" "),
                ..Material::default()
            });
            continue;
        }
        let Some(material) = materials.last_mut() else {
            continue;
        };
        let context = || format!("invalid {tag} on line {}", line_no + 1);
        match tag {
            "Kd" => material.diffuse = Some(parse_vec3(parts).with_context(context)?.to_array()),
            "Ke" => material.emissive = Some(parse_vec3(parts).with_context(context)?.to_array()),
            "Ks" => material.specular = Some(parse_vec3(parts).with_context(context)?.to_array()),
            "Ns" => material.reflectivity = Some(parse_scalar(parts).with_context(context)?),
            "d" => material.opacity = Some(parse_scalar(parts).with_context(context)?),
            "Tr" => material.opacity = Some(1.0 - parse_scalar(parts).with_context(context)?),
            "map_Kd" => {
                // Options such as `-s 1 1 1` precede the file name.
                let file = parts.last().ok_or_else(|| anyhow!("missing texture name"))?;
                let url = textures
                    .get(file)
                    .cloned()
                    .unwrap_or_else(|| file.to_string());
                material.textures.diffuse_map = Some(url);
            }
            _ => {}
        }
    }

    Ok(materials)
}

fn parse_scalar<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<f32> {
    Ok(parts
        .next()
        .ok_or_else(|| anyhow!("missing value"))?
        .parse::<f32>()?)
}

fn parse_vec2<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec2> {
    let u = parse_scalar(&mut parts)?;
    let v = parse_scalar(&mut parts)?;
    Ok(Vec2::new(u, v))
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let x = parse_scalar(&mut parts)?;
    let y = parse_scalar(&mut parts)?;
    let z = parse_scalar(&mut parts)?;
    Ok(Vec3::new(x, y, z))
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>, material: usize) -> Result<Vec<FaceIndex>> {
    let mut indices = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let v = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        let mut optional = || -> Result<i32> {
            match segments.next() {
                Some(text) if !text.is_empty() => Ok(text.parse::<i32>()?),
                _ => Ok(0),
            }
        };
        let vt = optional()?;
        let vn = optional()?;
        indices.push(FaceIndex {
            v,
            vt,
            vn,
            material,
        });
    }
    if indices.len() < 3 {
        bail!("faces must reference at least 3 vertices");
    }
    Ok(indices)
}

fn triangulate_face(polygon: &[FaceIndex], faces: &mut Vec<[FaceIndex; 3]>) {
    for i in 1..polygon.len().saturating_sub(1) {
        faces.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    position: usize,
    uv: Option<usize>,
    normal: Option<usize>,
    material: usize,
}

#[derive(Debug, Clone, Copy)]
struct FaceIndex {
    v: i32,
    vt: i32,
    vn: i32,
    material: usize,
}

fn build_mesh(
    positions: &[Vec3],
    normals: &[Vec3],
    uvs: &[Vec2],
    faces: &[[FaceIndex; 3]],
    uses_materials: bool,
) -> Result<LoadedMesh> {
    let mut lookup: HashMap<Key, u16> = HashMap::new();
    let mut mesh = LoadedMesh::default();
    let has_normals = !normals.is_empty();
    let has_uvs = !uvs.is_empty();

    for face in faces {
        for idx in face {
            let position = fix_index(idx.v, positions.len())
                .ok_or_else(|| anyhow!("invalid vertex index {}", idx.v))?;
            let key = Key {
                position,
                uv: fix_index(idx.vt, uvs.len()),
                normal: fix_index(idx.vn, normals.len()),
                material: idx.material,
            };
            let index = match lookup.get(&key) {
                Some(index) => *index,
                None => {
                    let next = u16::try_from(mesh.vertex_count()).map_err(|_| {
                        anyhow!("mesh exceeds {} unique vertices", u16::MAX as usize + 1)
                    })?;
                    mesh.positions.extend_from_slice(&positions[position].to_array());
                    if has_normals {
                        let normal = key.normal.map(|i| normals[i]).unwrap_or(Vec3::ZERO);
                        mesh.normals.extend_from_slice(&normal.to_array());
                    }
                    if has_uvs {
                        let uv = key.uv.map(|i| uvs[i]).unwrap_or(Vec2::ZERO);
                        mesh.textures.extend_from_slice(&uv.to_array());
                    }
                    if uses_materials {
                        mesh.texture_addresses.push(key.material as f32);
                    }
                    lookup.insert(key, next);
                    next
                }
            };
            mesh.indices.push(index);
        }
    }

    Ok(mesh)
}

fn fix_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let abs = index.unsigned_abs() as usize;
        (abs <= len).then_some(len - abs)
    } else {
        None
    }
}

fn needs_normals(normals: &[f32]) -> bool {
    normals.chunks_exact(3).any(|chunk| chunk == [0.0; 3])
}

/// Replaces zero normals, left by faces without `vn` references, with
/// computed ones. Supplied normals are kept.
fn fill_missing_normals(mesh: &mut LoadedMesh) {
    let computed = compute_normals(&mesh.positions, &mesh.indices);
    for (normal, fallback) in mesh
        .normals
        .chunks_exact_mut(3)
        .zip(computed.chunks_exact(3))
    {
        if normal == [0.0; 3] {
            normal.copy_from_slice(fallback);
        }
    }
}

/// Smooth vertex normals accumulated from the indexed triangles.
fn compute_normals(positions: &[f32], indices: &[u16]) -> Vec<f32> {
    let vertex_count = positions.len() / 3;
    let mut accum = vec![Vec3::ZERO; vertex_count];
    let position = |i: usize| Vec3::from_slice(&positions[i * 3..i * 3 + 3]);

    for triangle in indices.chunks_exact(3) {
        let [i0, i1, i2] = [triangle[0], triangle[1], triangle[2]].map(usize::from);
        let normal = (position(i1) - position(i0)).cross(position(i2) - position(i0));
        if normal.length_squared() > f32::EPSILON {
            let normal = normal.normalize();
            accum[i0] += normal;
            accum[i1] += normal;
            accum[i2] += normal;
        }
    }

    accum
        .into_iter()
        .flat_map(|normal| normal.normalize_or_zero().to_array())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3 4/4
";

    #[test]
    fn triangulates_polygons_into_fans() {
        let mesh = parse_obj(QUAD, Vec::new()).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.textures.len(), 8);
        assert!(mesh.texture_addresses.is_empty());
    }

    #[test]
    fn computes_missing_normals() {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n", Vec::new()).unwrap();
        assert_eq!(mesh.normals.len(), 9);
        for chunk in mesh.normals.chunks_exact(3) {
            assert_eq!(Vec3::from_slice(chunk), Vec3::Z);
        }
    }

    #[test]
    fn fills_normals_for_faces_without_vn() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 0 0 1\nvn 1 0 0\n\
                   f 1//1 4//1 3//1\nf 1 2 3\n";
        let mesh = parse_obj(obj, Vec::new()).unwrap();
        assert_eq!(mesh.vertex_count(), 6);
        for chunk in mesh.normals.chunks_exact(3) {
            assert_ne!(chunk, [0.0; 3]);
        }
        assert_eq!(Vec3::from_slice(&mesh.normals[0..3]), Vec3::X);
        assert_eq!(Vec3::from_slice(&mesh.normals[9..12]), Vec3::Z);
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n", Vec::new()).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn usemtl_assigns_texture_addresses() {
        let obj = "
v 0 0 0
v 1 0 0
v 0 1 0
v 1 1 0
usemtl red
f 1 2 3
usemtl blue
f 2 4 3
";
        let materials = vec![
            Material {
                name: "blue".to_string(),
                ..Material::default()
            },
            Material {
                name: "red".to_string(),
                ..Material::default()
            },
        ];
        let mesh = parse_obj(obj, materials).unwrap();
        assert_eq!(mesh.texture_addresses, vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(mesh.vertex_count(), 6);
    }

    #[test]
    fn unknown_materials_are_appended() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl plain\nf 1 2 3\n";
        let mesh = parse_obj(obj, Vec::new()).unwrap();
        assert_eq!(mesh.materials.len(), 1);
        assert_eq!(mesh.materials[0].name, "plain");
    }

    #[test]
    fn rejects_empty_and_invalid_models() {
        assert!(parse_obj("# nothing", Vec::new()).is_err());
        let err = parse_obj("v 0 0 0\nf 1 2 9\n", Vec::new()).unwrap_err();
        assert!(format!("{err:#}").contains("invalid vertex index"));
        assert!(parse_obj("v 0 0\n", Vec::new()).is_err());
    }

    #[test]
    fn parses_mtl_materials() {
        let mtl = "
newmtl shiny
Kd 1 0 0
Ks 0.5 0.5 0.5
Ns 250
d 0.8
map_Kd -s 1 1 1 crate.png
newmtl glow
Ke 0 1 0
Tr 0.25
";
        let textures = HashMap::from([(
            "crate.png".to_string(),
            "/assets/crate.png".to_string(),
        )]);
        let materials = parse_mtl(mtl, &textures).unwrap();
        assert_eq!(materials.len(), 2);
        assert_eq!(materials[0].diffuse, Some([1.0, 0.0, 0.0]));
        assert_eq!(materials[0].reflectivity, Some(250.0));
        assert_eq!(materials[0].opacity, Some(0.8));
        assert_eq!(
            materials[0].textures.diffuse_map.as_deref(),
            Some("/assets/crate.png")
        );
        assert_eq!(materials[1].emissive, Some([0.0, 1.0, 0.0]));
        assert_eq!(materials[1].opacity, Some(0.75));
        assert!(materials[1].textures.diffuse_map.is_none());
    }
}
