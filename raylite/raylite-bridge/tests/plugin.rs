use std::sync::Arc;

use glam::{Affine3A, Vec3};
use raylite_bridge::{D3D11InteropLanes, InteropQueue, RaylitePlugin};
use raylite_core::native::d3d12::D3D12CommandList;
use raylite_core::{FixedLanes, HeadlessContext, Phase, D3D11, D3D12};
use render_api::{
    ExtractedGeometry, ExtractedInstance, ExtractedLight, ExtractedMesh, ExtractedScene, ExtractedView, FrameInputs,
    GBufferTextures, GpuTexture, HostDevice, InstanceKey, MaterialDomain, MeshKey, NativeHandle, RenderBackend,
    RtOutputTextures,
};
use wgpu::TextureFormat;

struct Host;

impl HostDevice for Host {
    fn wait_idle(&self) -> Result<(), String> {
        Ok(())
    }

    fn supports_ray_query(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
struct FenceLog(Vec<(&'static str, u64)>);

impl InteropQueue for FenceLog {
    fn signal(&mut self, _fence: NativeHandle, value: u64) -> Result<(), String> {
        self.0.push(("signal", value));
        Ok(())
    }

    fn wait(&mut self, _fence: NativeHandle, value: u64) -> Result<(), String> {
        self.0.push(("wait", value));
        Ok(())
    }
}

fn scene() -> ExtractedScene {
    ExtractedScene {
        meshes: vec![ExtractedMesh {
            key: MeshKey(1),
            index_buffer: NativeHandle(0x10),
            vertex_buffer: NativeHandle(0x11),
            index_offset: 0,
            vertex_offset: 0,
            position_byte_offset: 0,
            geometries: vec![ExtractedGeometry {
                material_domain: MaterialDomain::Opaque,
                index_offset: 0,
                vertex_offset: 0,
                num_indices: 3,
                num_vertices: 3,
            }],
        }],
        instances: vec![ExtractedInstance {
            key: InstanceKey(1),
            mesh: MeshKey(1),
            transform: Affine3A::from_translation(Vec3::Z),
            transform_dirty: false,
            skinned: false,
        }],
    }
}

fn frame(frame_index: u64) -> FrameInputs {
    let t = |native: u64, format| GpuTexture::new_2d(NativeHandle(native), format, 640, 360);
    FrameInputs {
        frame_index,
        view: ExtractedView { viewport_size: (640, 360), ..Default::default() },
        lights: vec![ExtractedLight::Directional { direction: Vec3::NEG_Y, angular_size: 0.5 }],
        gbuffer: GBufferTextures {
            world_position: t(0x201, TextureFormat::Rgba32Float),
            depth: t(0x202, TextureFormat::Depth32Float),
            normals: t(0x203, TextureFormat::Rgba16Float),
            specular: t(0x204, TextureFormat::Rgba8Unorm),
            motion_vectors: t(0x205, TextureFormat::Rg16Float),
            hdr_color: t(0x206, TextureFormat::Rgba16Float),
        },
        outputs: RtOutputTextures {
            reflections: t(0x101, TextureFormat::Rgba16Float),
            reflections_final: t(0x102, TextureFormat::Rgba16Float),
            gi: t(0x103, TextureFormat::Rgba16Float),
            gi_final: t(0x104, TextureFormat::Rgba16Float),
            ao: t(0x105, TextureFormat::R16Float),
            ao_final: t(0x106, TextureFormat::R16Float),
            shadows: t(0x107, TextureFormat::Rg16Float),
            shadows_aux: t(0x108, TextureFormat::Rg16Float),
            shadows_final: t(0x109, TextureFormat::R16Float),
        },
        transparent: None,
    }
}

#[test]
fn d3d11_containers_are_fenced() {
    let lanes = D3D11InteropLanes::new(NativeHandle(0xdc), NativeHandle(0xfe), FenceLog::default());
    let mut plugin =
        RaylitePlugin::new(Arc::new(Host), lanes, |s| Ok(HeadlessContext::<D3D11>::new(s))).unwrap();
    plugin.prepare(&scene()).unwrap();
    plugin.render_frame(&frame(0)).unwrap();

    assert_eq!(plugin.last_report().submitted, 2);
    assert_eq!(plugin.lanes().queue().0, vec![("signal", 1), ("wait", 2), ("signal", 3), ("wait", 4)]);
    let ctx = plugin.renderer().context();
    let pre = ctx.last_recorded(Phase::PreLighting).unwrap().build_input;
    let main = ctx.last_recorded(Phase::Main).unwrap().build_input;
    assert_eq!((pre.wait_fence_value, pre.signal_fence_value), (1, 2));
    assert_eq!((main.wait_fence_value, main.signal_fence_value), (3, 4));
    assert!(pre.geometry_task_first);
    assert_eq!(pre.device_context, NativeHandle(0xdc));
}

#[test]
fn d3d12_plugin_runs_as_a_backend() {
    let lanes = FixedLanes::<D3D12>::single(D3D12CommandList(NativeHandle(0xc0)));
    let plugin = RaylitePlugin::new(Arc::new(Host), lanes, |s| Ok(HeadlessContext::<D3D12>::new(s))).unwrap();
    let mut backend: Box<dyn RenderBackend> = Box::new(plugin);
    let scene = scene();
    for index in 0..6 {
        backend.prepare(&scene).unwrap();
        backend.render_frame(&frame(index)).unwrap();
    }
    backend.scene_unloading().unwrap();
}

#[test]
fn core_errors_become_messages() {
    let lanes = FixedLanes::<D3D12>::single(D3D12CommandList(NativeHandle(0xc0)));
    let mut plugin = RaylitePlugin::new(Arc::new(Host), lanes, |s| Ok(HeadlessContext::<D3D12>::new(s))).unwrap();
    let mut orphan = scene();
    orphan.meshes.clear();
    let err = plugin.prepare(&orphan).unwrap_err();
    assert!(err.contains("no registered geometry"), "{err}");
}
