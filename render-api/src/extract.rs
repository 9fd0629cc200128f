//! Data types for extraction from the host scene into the ray-tracing layer.
//! The host fills these each frame; keys must stay stable for the lifetime of the object.

use glam::{Affine3A, Mat4, Vec2, Vec3};

use crate::NativeHandle;

/// Stable host-side identity of a mesh (shared vertex/index data).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeshKey(pub u64);

/// Stable host-side identity of a mesh instance (one scene node referencing a mesh).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceKey(pub u64);

/// Material domain of a geometry; only opaque and alpha-tested surfaces enter the BVH.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MaterialDomain {
    #[default]
    Opaque,
    AlphaTested,
    AlphaBlended,
    Transmissive,
    TransmissiveAlphaTested,
    TransmissiveAlphaBlended,
}

impl MaterialDomain {
    pub fn is_ray_traced(self) -> bool {
        matches!(self, MaterialDomain::Opaque | MaterialDomain::AlphaTested)
    }
}

/// One draw range inside a mesh. Offsets are in elements, relative to the mesh base.
#[derive(Clone, Debug)]
pub struct ExtractedGeometry {
    pub material_domain: MaterialDomain,
    pub index_offset: u32,
    pub vertex_offset: u32,
    pub num_indices: u32,
    pub num_vertices: u32,
}

/// Mesh data living in host-owned GPU buffers.
/// Indices are u32; positions are three f32 (12 bytes per vertex).
#[derive(Clone, Debug)]
pub struct ExtractedMesh {
    pub key: MeshKey,
    pub index_buffer: NativeHandle,
    pub vertex_buffer: NativeHandle,
    /// Mesh base in the shared index buffer, in indices.
    pub index_offset: u32,
    /// Mesh base in the shared vertex buffer, in vertices.
    pub vertex_offset: u32,
    /// Byte offset of the position stream inside the vertex buffer.
    pub position_byte_offset: u64,
    pub geometries: Vec<ExtractedGeometry>,
}

/// One mesh instance in the scene graph.
#[derive(Clone, Debug)]
pub struct ExtractedInstance {
    pub key: InstanceKey,
    pub mesh: MeshKey,
    /// Object-to-world transform of the owning node.
    pub transform: Affine3A,
    /// Node transform changed since the previous frame.
    pub transform_dirty: bool,
    /// Instance is driven by a skin; its mesh vertices change every frame.
    pub skinned: bool,
}

/// Everything the registry needs to synchronize in one frame.
/// Order is preserved when scheduling register tasks.
#[derive(Clone, Debug, Default)]
pub struct ExtractedScene {
    pub meshes: Vec<ExtractedMesh>,
    pub instances: Vec<ExtractedInstance>,
}

impl ExtractedScene {
    pub fn mesh(&self, key: MeshKey) -> Option<&ExtractedMesh> {
        self.meshes.iter().find(|m| m.key == key)
    }
}

/// Light descriptors consumed by shadow tracing. Angles are in degrees, as the host authors them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ExtractedLight {
    Directional {
        /// Direction the light travels.
        direction: Vec3,
        angular_size: f32,
    },
    Spot {
        position: Vec3,
        direction: Vec3,
        intensity: f32,
        radius: f32,
        range: f32,
        outer_angle: f32,
    },
    Point {
        position: Vec3,
        intensity: f32,
        radius: f32,
        range: f32,
    },
}

/// Camera data for the current and previous frame.
#[derive(Clone, Debug)]
pub struct ExtractedView {
    /// World to view.
    pub view: Mat4,
    /// View to clip, without jitter.
    pub projection: Mat4,
    pub prev_view: Mat4,
    pub prev_projection: Mat4,
    /// Sub-pixel jitter in pixels.
    pub pixel_offset: Vec2,
    pub viewport_size: (u32, u32),
}

impl Default for ExtractedView {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            prev_view: Mat4::IDENTITY,
            prev_projection: Mat4::IDENTITY,
            pixel_offset: Vec2::ZERO,
            viewport_size: (800, 600),
        }
    }
}
