//! Fixtures shared by unit tests.

use std::cell::Cell;

use glam::Vec3;
use render_api::{
    ExtractedLight, ExtractedView, FrameInputs, GBufferTextures, GpuTexture, HostDevice, NativeHandle,
    RtOutputTextures, TransparentLayer,
};
use wgpu::TextureFormat;

fn texture(native: u64, format: TextureFormat, width: u32, height: u32) -> GpuTexture {
    GpuTexture::new_2d(NativeHandle(native), format, width, height)
}

/// Output targets with distinct handles 0x101..=0x109.
pub(crate) fn output_textures(width: u32, height: u32) -> RtOutputTextures {
    RtOutputTextures {
        reflections: texture(0x101, TextureFormat::Rgba16Float, width, height),
        reflections_final: texture(0x102, TextureFormat::Rgba16Float, width, height),
        gi: texture(0x103, TextureFormat::Rgba16Float, width, height),
        gi_final: texture(0x104, TextureFormat::Rgba16Float, width, height),
        ao: texture(0x105, TextureFormat::R16Float, width, height),
        ao_final: texture(0x106, TextureFormat::R16Float, width, height),
        shadows: texture(0x107, TextureFormat::Rg16Float, width, height),
        shadows_aux: texture(0x108, TextureFormat::Rg16Float, width, height),
        shadows_final: texture(0x109, TextureFormat::R16Float, width, height),
    }
}

/// G-buffer with distinct handles 0x201..=0x206.
pub(crate) fn gbuffer(width: u32, height: u32) -> GBufferTextures {
    GBufferTextures {
        world_position: texture(0x201, TextureFormat::Rgba32Float, width, height),
        depth: texture(0x202, TextureFormat::Depth32Float, width, height),
        normals: texture(0x203, TextureFormat::Rgba16Float, width, height),
        specular: texture(0x204, TextureFormat::Rgba8Unorm, width, height),
        motion_vectors: texture(0x205, TextureFormat::Rg16Float, width, height),
        hdr_color: texture(0x206, TextureFormat::Rgba16Float, width, height),
    }
}

pub(crate) fn transparent_layer(width: u32, height: u32) -> TransparentLayer {
    TransparentLayer {
        world_position: texture(0x301, TextureFormat::Rgba32Float, width, height),
        normals: texture(0x302, TextureFormat::Rgba16Float, width, height),
        reflections: texture(0x303, TextureFormat::Rgba16Float, width, height),
    }
}

/// A 1280x720 frame lit by one directional light and one point light.
pub(crate) fn frame_inputs(frame_index: u64) -> FrameInputs {
    FrameInputs {
        frame_index,
        view: ExtractedView { viewport_size: (1280, 720), ..Default::default() },
        lights: vec![
            ExtractedLight::Directional { direction: Vec3::new(0.3, -0.8, 0.5).normalize(), angular_size: 0.5 },
            ExtractedLight::Point { position: Vec3::new(0.0, 2.0, 0.0), intensity: 5.0, radius: 0.1, range: 20.0 },
        ],
        gbuffer: gbuffer(1280, 720),
        outputs: output_textures(1280, 720),
        transparent: None,
    }
}

/// Host device that counts idle waits.
#[derive(Debug, Default)]
pub(crate) struct TestHost {
    waits: Cell<u32>,
    no_ray_query: bool,
    extensions: Vec<String>,
}

impl TestHost {
    pub(crate) fn without_ray_query() -> Self {
        Self { no_ray_query: true, ..Default::default() }
    }

    pub(crate) fn with_extensions(extensions: &[&str]) -> Self {
        Self { extensions: extensions.iter().map(|e| e.to_string()).collect(), ..Default::default() }
    }

    pub(crate) fn waits(&self) -> u32 {
        self.waits.get()
    }
}

impl HostDevice for TestHost {
    fn wait_idle(&self) -> Result<(), String> {
        self.waits.set(self.waits.get() + 1);
        Ok(())
    }

    fn supports_ray_query(&self) -> bool {
        !self.no_ray_query
    }

    fn enabled_extensions(&self) -> Vec<String> {
        self.extensions.clone()
    }
}
