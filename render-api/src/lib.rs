//! Shared render API for the Raylite ray-tracing layer.
//! Defines the types the host rasterizer extracts each frame (meshes, instances, lights,
//! camera, G-buffer and output textures) and the RenderBackend trait it drives the
//! ray-tracing layer through (prepare + render_frame).

mod backend;
mod extract;
mod frame;

pub use backend::{HostDevice, RenderBackend};
pub use extract::{
    ExtractedGeometry, ExtractedInstance, ExtractedLight, ExtractedMesh, ExtractedScene, ExtractedView,
    InstanceKey, MaterialDomain, MeshKey,
};
pub use frame::{FrameInputs, GBufferTextures, GpuTexture, NativeHandle, RtOutputTextures, TransparentLayer};
