//! Vulkan: task containers are recorded into a command buffer the host submits.

use ash::vk;
use ash::vk::Handle;
use render_api::{GpuTexture, NativeHandle};

use super::{validate_texture, Aspect, GraphicsApi, NativeApi, NativeTextureView, TextureAccess, ViewSummary};
use crate::error::AdapterError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vulkan;

const TABLE: &[(wgpu::TextureFormat, vk::Format)] = &[
    (wgpu::TextureFormat::Rgba8Unorm, vk::Format::R8G8B8A8_UNORM),
    (wgpu::TextureFormat::Rgba8UnormSrgb, vk::Format::R8G8B8A8_SRGB),
    (wgpu::TextureFormat::Bgra8Unorm, vk::Format::B8G8R8A8_UNORM),
    (wgpu::TextureFormat::Bgra8UnormSrgb, vk::Format::B8G8R8A8_SRGB),
    (wgpu::TextureFormat::Rgba16Float, vk::Format::R16G16B16A16_SFLOAT),
    (wgpu::TextureFormat::Rgba16Unorm, vk::Format::R16G16B16A16_UNORM),
    (wgpu::TextureFormat::Rgba32Float, vk::Format::R32G32B32A32_SFLOAT),
    (wgpu::TextureFormat::Rg16Float, vk::Format::R16G16_SFLOAT),
    (wgpu::TextureFormat::Rg32Float, vk::Format::R32G32_SFLOAT),
    (wgpu::TextureFormat::Rg8Unorm, vk::Format::R8G8_UNORM),
    (wgpu::TextureFormat::Rgb10a2Unorm, vk::Format::A2B10G10R10_UNORM_PACK32),
    (wgpu::TextureFormat::R32Float, vk::Format::R32_SFLOAT),
    (wgpu::TextureFormat::R32Uint, vk::Format::R32_UINT),
    (wgpu::TextureFormat::R16Float, vk::Format::R16_SFLOAT),
    (wgpu::TextureFormat::R16Unorm, vk::Format::R16_UNORM),
    (wgpu::TextureFormat::R8Unorm, vk::Format::R8_UNORM),
    (wgpu::TextureFormat::Depth32Float, vk::Format::D32_SFLOAT),
    (wgpu::TextureFormat::Depth24PlusStencil8, vk::Format::D24_UNORM_S8_UINT),
    (wgpu::TextureFormat::Depth16Unorm, vk::Format::D16_UNORM),
    (wgpu::TextureFormat::Depth32FloatStencil8, vk::Format::D32_SFLOAT_S8_UINT),
];

pub fn texture_format_to_vk(format: wgpu::TextureFormat) -> Result<vk::Format, AdapterError> {
    TABLE
        .iter()
        .find(|(f, _)| *f == format)
        .map(|&(_, vk_format)| vk_format)
        .ok_or(AdapterError::UnsupportedFormat(format))
}

pub fn vk_format_to_texture(format: vk::Format) -> Option<wgpu::TextureFormat> {
    TABLE.iter().find(|(_, v)| *v == format).map(|&(f, _)| f)
}

fn format_is_depth(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D16_UNORM | vk::Format::D32_SFLOAT_S8_UINT
    )
}

/// VkImage plus the view parameters a task creates its image view from.
#[derive(Clone, Debug, PartialEq)]
pub struct VulkanTextureView {
    pub image: vk::Image,
    pub view_type: vk::ImageViewType,
    pub format: vk::Format,
    pub aspect_mask: vk::ImageAspectFlags,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
    pub access: TextureAccess,
}

impl VulkanTextureView {
    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange::default()
            .aspect_mask(self.aspect_mask)
            .base_mip_level(self.base_mip_level)
            .level_count(self.level_count)
            .base_array_layer(self.base_array_layer)
            .layer_count(self.layer_count)
    }
}

impl NativeTextureView for VulkanTextureView {
    fn native(&self) -> NativeHandle {
        NativeHandle(self.image.as_raw())
    }

    fn summary(&self) -> ViewSummary {
        ViewSummary {
            format: vk_format_to_texture(self.format),
            aspect: if self.aspect_mask.contains(vk::ImageAspectFlags::DEPTH) { Aspect::Depth } else { Aspect::Color },
            base_mip: self.base_mip_level,
            mip_count: self.level_count,
            base_layer: self.base_array_layer,
            layer_count: self.layer_count,
            access: self.access,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VulkanCommandList(pub vk::CommandBuffer);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VulkanBuildInput {
    pub command_buffer: vk::CommandBuffer,
    pub geometry_task_first: bool,
}

impl NativeApi for Vulkan {
    const KIND: GraphicsApi = GraphicsApi::Vulkan;
    type TextureView = VulkanTextureView;
    type CommandList = VulkanCommandList;
    type BuildInput = VulkanBuildInput;

    fn texture_view(texture: &GpuTexture, access: TextureAccess) -> Result<VulkanTextureView, AdapterError> {
        validate_texture(texture, access)?;
        let format = texture_format_to_vk(texture.format)?;
        let aspect_mask = if format_is_depth(format) {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        };
        Ok(VulkanTextureView {
            image: vk::Image::from_raw(texture.native.0),
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
            access,
        })
    }

    fn build_input(command_list: &VulkanCommandList, geometry_task_first: bool) -> VulkanBuildInput {
        VulkanBuildInput { command_buffer: command_list.0, geometry_task_first }
    }

    fn geometry_task_first(input: &VulkanBuildInput) -> bool {
        input.geometry_task_first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_uses_depth_aspect_only() {
        let t = GpuTexture::new_2d(NativeHandle(7), wgpu::TextureFormat::Depth24PlusStencil8, 16, 16);
        let view = Vulkan::shader_resource(&t).unwrap();
        assert_eq!(view.aspect_mask, vk::ImageAspectFlags::DEPTH);
        assert_eq!(view.subresource_range().layer_count, 1);
        assert_eq!(view.native(), NativeHandle(7));
    }
}
