//! Scene, frame and host fixtures for the frame-loop tests.
#![allow(dead_code)]

use std::cell::Cell;

use glam::{Affine3A, Vec3};
use raylite_core::native::d3d12::D3D12CommandList;
use raylite_core::{FixedLanes, D3D12};
use render_api::{
    ExtractedGeometry, ExtractedInstance, ExtractedLight, ExtractedMesh, ExtractedScene, ExtractedView,
    FrameInputs, GBufferTextures, GpuTexture, HostDevice, InstanceKey, MaterialDomain, MeshKey, NativeHandle,
    RtOutputTextures,
};
use wgpu::TextureFormat;

#[derive(Debug, Default)]
pub struct CountingHost {
    waits: Cell<u32>,
}

impl CountingHost {
    pub fn waits(&self) -> u32 {
        self.waits.get()
    }
}

impl HostDevice for CountingHost {
    fn wait_idle(&self) -> Result<(), String> {
        self.waits.set(self.waits.get() + 1);
        Ok(())
    }

    fn supports_ray_query(&self) -> bool {
        true
    }
}

pub fn mesh(key: u64) -> ExtractedMesh {
    ExtractedMesh {
        key: MeshKey(key),
        index_buffer: NativeHandle(0x1000 + key),
        vertex_buffer: NativeHandle(0x2000 + key),
        index_offset: 0,
        vertex_offset: 0,
        position_byte_offset: 0,
        geometries: vec![ExtractedGeometry {
            material_domain: MaterialDomain::Opaque,
            index_offset: 0,
            vertex_offset: 0,
            num_indices: 36,
            num_vertices: 24,
        }],
    }
}

pub fn instance(key: u64, mesh: u64, x: f32) -> ExtractedInstance {
    ExtractedInstance {
        key: InstanceKey(key),
        mesh: MeshKey(mesh),
        transform: Affine3A::from_translation(Vec3::new(x, 0.0, 0.0)),
        transform_dirty: false,
        skinned: false,
    }
}

/// One mesh drawn twice.
pub fn two_boxes() -> ExtractedScene {
    ExtractedScene { meshes: vec![mesh(1)], instances: vec![instance(10, 1, -1.0), instance(11, 1, 1.0)] }
}

fn texture(native: u64, format: TextureFormat) -> GpuTexture {
    GpuTexture::new_2d(NativeHandle(native), format, 1280, 720)
}

pub fn frame(frame_index: u64) -> FrameInputs {
    FrameInputs {
        frame_index,
        view: ExtractedView { viewport_size: (1280, 720), ..Default::default() },
        lights: vec![ExtractedLight::Directional { direction: Vec3::NEG_Y, angular_size: 0.5 }],
        gbuffer: GBufferTextures {
            world_position: texture(0x201, TextureFormat::Rgba32Float),
            depth: texture(0x202, TextureFormat::Depth32Float),
            normals: texture(0x203, TextureFormat::Rgba16Float),
            specular: texture(0x204, TextureFormat::Rgba8Unorm),
            motion_vectors: texture(0x205, TextureFormat::Rg16Float),
            hdr_color: texture(0x206, TextureFormat::Rgba16Float),
        },
        outputs: RtOutputTextures {
            reflections: texture(0x101, TextureFormat::Rgba16Float),
            reflections_final: texture(0x102, TextureFormat::Rgba16Float),
            gi: texture(0x103, TextureFormat::Rgba16Float),
            gi_final: texture(0x104, TextureFormat::Rgba16Float),
            ao: texture(0x105, TextureFormat::R16Float),
            ao_final: texture(0x106, TextureFormat::R16Float),
            shadows: texture(0x107, TextureFormat::Rg16Float),
            shadows_aux: texture(0x108, TextureFormat::Rg16Float),
            shadows_final: texture(0x109, TextureFormat::R16Float),
        },
        transparent: None,
    }
}

pub fn lanes() -> FixedLanes<D3D12> {
    FixedLanes {
        pre_lighting: D3D12CommandList(NativeHandle(0xc1)),
        main: D3D12CommandList(NativeHandle(0xc2)),
        post_lighting: D3D12CommandList(NativeHandle(0xc3)),
    }
}
