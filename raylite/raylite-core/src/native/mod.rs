//! Native graphics APIs the ray-tracing SDK runs on, and the adapters that turn engine
//! textures into the descriptors each API's task structures expect.
//!
//! The three adapters are pure functions of (texture, access) and share one contract:
//! single 2D textures only, mip 0 with one level, array layer 0 with one layer, depth
//! formats read through the depth aspect and never bound for unordered access.
//! [`ViewSummary`] maps each native result back to API-neutral terms so they can be compared.

pub mod d3d11;
pub mod d3d12;
pub mod dxgi;
#[cfg(feature = "vulkan")]
pub mod vulkan;

use std::fmt::Debug;

use render_api::{GpuTexture, NativeHandle};

use crate::error::AdapterError;

pub use d3d11::D3D11;
pub use d3d12::D3D12;
#[cfg(feature = "vulkan")]
pub use vulkan::Vulkan;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GraphicsApi {
    D3D11,
    D3D12,
    Vulkan,
}

bitflags::bitflags! {
    /// How a task accesses a texture. Both bits set is a combined read/write binding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureAccess: u8 {
        const SHADER_READ = 1 << 0;
        const UNORDERED_ACCESS = 1 << 1;
        const COMBINED = Self::SHADER_READ.bits() | Self::UNORDERED_ACCESS.bits();
    }
}

/// Image aspect a view reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aspect {
    Color,
    Depth,
}

/// API-neutral description of a native texture view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewSummary {
    /// `None` when the native format has no engine equivalent.
    pub format: Option<wgpu::TextureFormat>,
    pub aspect: Aspect,
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
    pub access: TextureAccess,
}

/// Native descriptor triple: resource handle, view format/dimension, sub-resource range.
pub trait NativeTextureView: Clone + Debug + PartialEq {
    fn native(&self) -> NativeHandle;
    fn summary(&self) -> ViewSummary;
}

/// One native graphics API. Implemented by the [`D3D11`], [`D3D12`] and [`Vulkan`] markers.
pub trait NativeApi: Clone + Copy + Debug + PartialEq + Eq + 'static {
    const KIND: GraphicsApi;
    type TextureView: NativeTextureView;
    /// Where a task container is recorded.
    type CommandList: Clone + Debug;
    /// Argument of the SDK's build call for this API.
    type BuildInput: Clone + Debug;

    fn texture_view(texture: &GpuTexture, access: TextureAccess) -> Result<Self::TextureView, AdapterError>;

    fn build_input(command_list: &Self::CommandList, geometry_task_first: bool) -> Self::BuildInput;

    fn geometry_task_first(input: &Self::BuildInput) -> bool;

    fn shader_resource(texture: &GpuTexture) -> Result<Self::TextureView, AdapterError> {
        Self::texture_view(texture, TextureAccess::SHADER_READ)
    }

    fn unordered_access(texture: &GpuTexture) -> Result<Self::TextureView, AdapterError> {
        Self::texture_view(texture, TextureAccess::UNORDERED_ACCESS)
    }

    fn combined_access(texture: &GpuTexture) -> Result<Self::TextureView, AdapterError> {
        Self::texture_view(texture, TextureAccess::COMBINED)
    }
}

/// Checks shared by every adapter.
pub(crate) fn validate_texture(texture: &GpuTexture, access: TextureAccess) -> Result<(), AdapterError> {
    if access.is_empty() {
        return Err(AdapterError::NoAccess);
    }
    if texture.dimension != wgpu::TextureViewDimension::D2 {
        return Err(AdapterError::NotTexture2D(texture.dimension));
    }
    if texture.array_layers != 1 {
        return Err(AdapterError::LayeredTexture(texture.array_layers));
    }
    if texture.format.has_depth_aspect() && access.contains(TextureAccess::UNORDERED_ACCESS) {
        return Err(AdapterError::DepthUnorderedAccess(texture.format));
    }
    Ok(())
}
