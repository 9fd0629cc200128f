//! Per-frame texture sets shared between the rasterizer and the ray-tracing layer.

use crate::{ExtractedLight, ExtractedView};

/// Opaque native object handle (ID3D11Resource*, ID3D12Resource*, VkImage, VkBuffer...).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NativeHandle(pub u64);

/// Engine-owned texture as seen by the ray-tracing layer.
#[derive(Clone, Debug, PartialEq)]
pub struct GpuTexture {
    pub native: NativeHandle,
    pub format: wgpu::TextureFormat,
    pub dimension: wgpu::TextureViewDimension,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub array_layers: u32,
}

impl GpuTexture {
    /// Single-mip 2D texture.
    pub fn new_2d(native: NativeHandle, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        Self {
            native,
            format,
            dimension: wgpu::TextureViewDimension::D2,
            width,
            height,
            mip_levels: 1,
            array_layers: 1,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Rasterizer outputs read by trace and denoise tasks.
#[derive(Clone, Debug)]
pub struct GBufferTextures {
    pub world_position: GpuTexture,
    pub depth: GpuTexture,
    /// Normal in RGB, roughness in alpha.
    pub normals: GpuTexture,
    pub specular: GpuTexture,
    pub motion_vectors: GpuTexture,
    /// Lit HDR color, sampled for direct-light injection.
    pub hdr_color: GpuTexture,
}

/// Ray-traced outputs consumed by the compositor.
/// The raw textures receive trace output while a denoiser is active; the final ones otherwise.
#[derive(Clone, Debug)]
pub struct RtOutputTextures {
    pub reflections: GpuTexture,
    pub reflections_final: GpuTexture,
    pub gi: GpuTexture,
    pub gi_final: GpuTexture,
    pub ao: GpuTexture,
    pub ao_final: GpuTexture,
    pub shadows: GpuTexture,
    /// Second shadow target written by multi-light shadow tracing.
    pub shadows_aux: GpuTexture,
    pub shadows_final: GpuTexture,
}

/// G-buffer of the first transparent layer plus its reflection target.
#[derive(Clone, Debug)]
pub struct TransparentLayer {
    pub world_position: GpuTexture,
    pub normals: GpuTexture,
    pub reflections: GpuTexture,
}

/// Everything the ray-tracing layer reads for one frame.
#[derive(Clone, Debug)]
pub struct FrameInputs {
    pub frame_index: u64,
    pub view: ExtractedView,
    pub lights: Vec<ExtractedLight>,
    pub gbuffer: GBufferTextures,
    pub outputs: RtOutputTextures,
    pub transparent: Option<TransparentLayer>,
}
