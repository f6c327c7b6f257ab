//! GPU buffer construction for the three mesh kinds a demo can draw.

use std::collections::HashMap;

use glam::Vec3;
use log::debug;

use crate::gl::{BufferData, BufferId, BufferTarget, GlError, GraphicsContext, Primitive, ProgramId};
use crate::math::{cross_vectors, normalize_vector, subtract_vectors};
use crate::obj::LoadedMesh;

/// Full-screen quad drawn as a four-vertex triangle strip.
pub const BASE_TRIANGLE_MESH: [f32; 12] = [
    -1.0, 1.0, 0.0, 1.0, 1.0, 0.0, -1.0, -1.0, 0.0, 1.0, -1.0, 0.0,
];

const EVEN_BARYCENTRIC: [f32; 9] = [0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0];
const ODD_BARYCENTRIC: [f32; 9] = [0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0];

pub const POSITION_ATTRIBUTE: &str = "aVertexPosition";
pub const TEXTURE_COORD_ATTRIBUTE: &str = "aTextureCoord";
pub const NORMAL_ATTRIBUTE: &str = "aVertexNormal";
pub const TEXTURE_ADDRESS_ATTRIBUTE: &str = "aTextureAddress";
pub const BARYCENTRIC_ATTRIBUTE: &str = "aBarycentric";
pub const BASE_POSITION_ATTRIBUTE: &str = "aBaseVertexPosition";

/// Attributes looked up on every program.
pub const MESH_ATTRIBUTES: [&str; 6] = [
    POSITION_ATTRIBUTE,
    TEXTURE_COORD_ATTRIBUTE,
    NORMAL_ATTRIBUTE,
    TEXTURE_ADDRESS_ATTRIBUTE,
    BARYCENTRIC_ATTRIBUTE,
    BASE_POSITION_ATTRIBUTE,
];

/// A GPU buffer together with its vertex layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Buffer {
    pub id: BufferId,
    pub target: BufferTarget,
    /// Components per vertex.
    pub item_size: usize,
    /// `data.len() / item_size`.
    pub num_items: usize,
}

/// Uploads `data` and records its layout. `data.len()` must be a multiple of
/// `item_size`.
pub fn build_buffer<C>(ctx: &mut C, data: BufferData<'_>, item_size: usize) -> Result<Buffer, GlError>
where
    C: GraphicsContext + ?Sized,
{
    if item_size == 0 || data.len() % item_size != 0 {
        return Err(GlError::BufferShape {
            len: data.len(),
            item_size,
        });
    }
    let id = ctx.create_buffer(data)?;
    Ok(Buffer {
        id,
        target: data.target(),
        item_size,
        num_items: data.len() / item_size,
    })
}

/// Buffers of one mesh. Only the position buffer is always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Buffers {
    pub vertex: Buffer,
    pub normal: Option<Buffer>,
    pub texture: Option<Buffer>,
    pub texture_address: Option<Buffer>,
    pub index: Option<Buffer>,
    pub barycentric: Option<Buffer>,
}

impl Buffers {
    fn positions_only(vertex: Buffer) -> Self {
        Self {
            vertex,
            normal: None,
            texture: None,
            texture_address: None,
            index: None,
            barycentric: None,
        }
    }
}

/// How a mesh is submitted once its buffers are bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCall {
    Arrays { primitive: Primitive, first: i32, count: i32 },
    Elements { primitive: Primitive, count: i32 },
}

impl DrawCall {
    pub fn issue<C>(&self, ctx: &mut C)
    where
        C: GraphicsContext + ?Sized,
    {
        match *self {
            Self::Arrays {
                primitive,
                first,
                count,
            } => ctx.draw_arrays(primitive, first, count),
            Self::Elements { primitive, count } => ctx.draw_elements(primitive, count),
        }
    }
}

/// One triangle, vertices in winding order.
pub type Face = [Vec3; 3];

/// Geometry a demo draws. Exactly one kind per demo.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshSource {
    /// The shared full-screen quad.
    BaseTriangles,
    /// Unindexed triangles with computed normals and barycentrics.
    FaceArray(Vec<Face>),
    /// An indexed mesh produced by the OBJ loader.
    Obj(LoadedMesh),
}

impl MeshSource {
    pub fn is_3d(&self) -> bool {
        !matches!(self, Self::BaseTriangles)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBuffers {
    pub buffers: Buffers,
    pub draw: DrawCall,
}

/// Normal of `[a, b, c]`: `normalize(cross(c - b, a - b))`, with negative
/// zero components folded to positive zero.
pub fn compute_face_normal(face: &Face) -> Vec3 {
    let [a, b, c] = *face;
    let normal = normalize_vector(cross_vectors(subtract_vectors(c, b), subtract_vectors(a, b)));
    // `-0.0 + 0.0 == +0.0`; every other value is unchanged.
    normal + Vec3::ZERO
}

/// Flat normals, repeated once per vertex of each face.
pub fn compute_face_normals(faces: &[Face]) -> Vec<f32> {
    faces
        .iter()
        .flat_map(|face| {
            let normal = compute_face_normal(face).to_array();
            std::iter::repeat(normal).take(3)
        })
        .flatten()
        .collect()
}

/// Barycentric coordinates for `face_count` faces, alternating between two
/// vertex orderings so shared edges line up for the wireframe shader.
pub fn compute_barycentric_coords(face_count: usize) -> Vec<f32> {
    (0..face_count)
        .flat_map(|index| {
            if index % 2 == 0 {
                EVEN_BARYCENTRIC
            } else {
                ODD_BARYCENTRIC
            }
        })
        .collect()
}

pub fn init_base_mesh_buffers<C>(ctx: &mut C) -> Result<MeshBuffers, GlError>
where
    C: GraphicsContext + ?Sized,
{
    let vertex = build_buffer(ctx, BufferData::Float(&BASE_TRIANGLE_MESH), 3)?;
    Ok(MeshBuffers {
        buffers: Buffers::positions_only(vertex),
        draw: DrawCall::Arrays {
            primitive: Primitive::TriangleStrip,
            first: 0,
            count: vertex.num_items as i32,
        },
    })
}

fn init_face_array_buffers<C>(ctx: &mut C, faces: &[Face]) -> Result<MeshBuffers, GlError>
where
    C: GraphicsContext + ?Sized,
{
    let positions: Vec<f32> = faces
        .iter()
        .flat_map(|face| face.iter().flat_map(|vertex| vertex.to_array()))
        .collect();
    let vertex = build_buffer(ctx, BufferData::Float(&positions), 3)?;
    let normal = build_buffer(ctx, BufferData::Float(&compute_face_normals(faces)), 3)?;
    let barycentric = build_buffer(
        ctx,
        BufferData::Float(&compute_barycentric_coords(faces.len())),
        3,
    )?;
    Ok(MeshBuffers {
        buffers: Buffers {
            normal: Some(normal),
            barycentric: Some(barycentric),
            ..Buffers::positions_only(vertex)
        },
        draw: DrawCall::Arrays {
            primitive: Primitive::Triangles,
            first: 0,
            count: vertex.num_items as i32,
        },
    })
}

fn init_obj_buffers<C>(ctx: &mut C, mesh: &LoadedMesh) -> Result<MeshBuffers, GlError>
where
    C: GraphicsContext + ?Sized,
{
    let vertex = build_buffer(ctx, BufferData::Float(&mesh.positions), 3)?;
    let optional = |ctx: &mut C, data: &[f32], item_size| -> Result<Option<Buffer>, GlError> {
        if data.is_empty() {
            return Ok(None);
        }
        build_buffer(ctx, BufferData::Float(data), item_size).map(Some)
    };
    let normal = optional(ctx, &mesh.normals, 3)?;
    let texture = optional(ctx, &mesh.textures, 2)?;
    let texture_address = optional(ctx, &mesh.texture_addresses, 1)?;
    let index = build_buffer(ctx, BufferData::Index(&mesh.indices), 1)?;
    Ok(MeshBuffers {
        buffers: Buffers {
            normal,
            texture,
            texture_address,
            index: Some(index),
            ..Buffers::positions_only(vertex)
        },
        draw: DrawCall::Elements {
            primitive: Primitive::Triangles,
            count: index.num_items as i32,
        },
    })
}

/// Builds the buffers for `source`.
pub fn build_mesh_buffers<C>(ctx: &mut C, source: &MeshSource) -> Result<MeshBuffers, GlError>
where
    C: GraphicsContext + ?Sized,
{
    let built = match source {
        MeshSource::BaseTriangles => init_base_mesh_buffers(ctx)?,
        MeshSource::FaceArray(faces) => init_face_array_buffers(ctx, faces)?,
        MeshSource::Obj(mesh) => init_obj_buffers(ctx, mesh)?,
    };
    debug!(
        "built mesh buffers: {} vertices, draw {:?}",
        built.buffers.vertex.num_items, built.draw
    );
    Ok(built)
}

/// Attribute locations resolved once per program. Attributes the program
/// does not use are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeLocations {
    locations: HashMap<&'static str, u32>,
}

impl AttributeLocations {
    pub fn resolve<C>(ctx: &mut C, program: ProgramId, names: &[&'static str]) -> Self
    where
        C: GraphicsContext + ?Sized,
    {
        let locations = names
            .iter()
            .filter_map(|name| Some((*name, ctx.attribute_location(program, name)?)))
            .collect();
        Self { locations }
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.locations.get(name).copied()
    }
}

/// Binds `buffer` to the attribute `name` if the program uses it.
pub fn bind_attribute<C>(ctx: &mut C, attributes: &AttributeLocations, name: &str, buffer: &Buffer)
where
    C: GraphicsContext + ?Sized,
{
    if let Some(location) = attributes.get(name) {
        ctx.bind_buffer(BufferTarget::Array, buffer.id);
        ctx.vertex_attrib_pointer(location, buffer.item_size);
    }
}

/// Binds every present buffer of `buffers`.
pub fn bind_mesh_attributes<C>(ctx: &mut C, attributes: &AttributeLocations, buffers: &Buffers)
where
    C: GraphicsContext + ?Sized,
{
    bind_attribute(ctx, attributes, POSITION_ATTRIBUTE, &buffers.vertex);
    let optional = [
        (TEXTURE_COORD_ATTRIBUTE, buffers.texture),
        (NORMAL_ATTRIBUTE, buffers.normal),
        (TEXTURE_ADDRESS_ATTRIBUTE, buffers.texture_address),
        (BARYCENTRIC_ATTRIBUTE, buffers.barycentric),
    ];
    for (name, buffer) in optional {
        if let Some(buffer) = buffer.filter(|buffer| buffer.num_items > 0) {
            bind_attribute(ctx, attributes, name, &buffer);
        }
    }
    if let Some(index) = buffers.index {
        ctx.bind_buffer(BufferTarget::ElementArray, index.id);
    }
}
