//! Host loop: drive RaylitePlugin as a RenderBackend over a headless execute context.
//!
//! Usage: plugin_loop [--api d3d11|d3d12] [--frames N] [--export PATH]

use std::path::PathBuf;
use std::sync::Arc;

use glam::{Affine3A, Quat, Vec3};
use raylite_bridge::{D3D11InteropLanes, InteropQueue, RaylitePlugin};
use raylite_core::native::d3d12::D3D12CommandList;
use raylite_core::{CommandLanes, FixedLanes, HeadlessContext, NativeApi, RayliteConfig, ShadowMode, D3D11, D3D12};
use render_api::{
    ExtractedGeometry, ExtractedInstance, ExtractedLight, ExtractedMesh, ExtractedScene, ExtractedView, FrameInputs,
    GBufferTextures, GpuTexture, HostDevice, InstanceKey, MaterialDomain, MeshKey, NativeHandle, RenderBackend,
    RtOutputTextures,
};
use wgpu::TextureFormat;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

struct HeadlessHost;

impl HostDevice for HeadlessHost {
    fn wait_idle(&self) -> Result<(), String> {
        log::debug!("host: wait for idle");
        Ok(())
    }

    fn supports_ray_query(&self) -> bool {
        true
    }
}

/// Immediate-context fence ops, logged only.
struct LoggedQueue;

impl InteropQueue for LoggedQueue {
    fn signal(&mut self, fence: NativeHandle, value: u64) -> Result<(), String> {
        log::debug!("signal {fence:?} = {value}");
        Ok(())
    }

    fn wait(&mut self, fence: NativeHandle, value: u64) -> Result<(), String> {
        log::debug!("wait {fence:?} >= {value}");
        Ok(())
    }
}

struct Args {
    api: String,
    frames: u64,
    export: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args { api: "d3d12".into(), frames: 8, export: None };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = || it.next().ok_or_else(|| format!("{arg} needs a value"));
        match arg.as_str() {
            "--api" => args.api = value()?,
            "--frames" => args.frames = value()?.parse().map_err(|e| format!("--frames: {e}"))?,
            "--export" => args.export = Some(PathBuf::from(value()?)),
            other => return Err(format!("unknown argument {other}")),
        }
    }
    Ok(args)
}

/// Three boxes sharing one mesh plus a skinned character.
fn scene(frame: u64) -> ExtractedScene {
    let mesh = |key: u64, indices: u32, vertices: u32| ExtractedMesh {
        key: MeshKey(key),
        index_buffer: NativeHandle(0x1000),
        vertex_buffer: NativeHandle(0x2000),
        index_offset: 0,
        vertex_offset: 0,
        position_byte_offset: 0,
        geometries: vec![ExtractedGeometry {
            material_domain: MaterialDomain::Opaque,
            index_offset: 0,
            vertex_offset: 0,
            num_indices: indices,
            num_vertices: vertices,
        }],
    };
    let mut instances: Vec<ExtractedInstance> = (0..3)
        .map(|i| ExtractedInstance {
            key: InstanceKey(10 + i),
            mesh: MeshKey(1),
            transform: Affine3A::from_translation(Vec3::new(i as f32 * 2.0 - 2.0, 0.0, 0.0)),
            transform_dirty: false,
            skinned: false,
        })
        .collect();
    // The middle box spins.
    let angle = frame as f32 * 0.1;
    instances[1].transform = Affine3A::from_rotation_translation(Quat::from_rotation_y(angle), Vec3::ZERO);
    instances[1].transform_dirty = frame > 0;
    instances.push(ExtractedInstance {
        key: InstanceKey(20),
        mesh: MeshKey(2),
        transform: Affine3A::from_translation(Vec3::new(0.0, 0.0, 3.0)),
        transform_dirty: false,
        skinned: true,
    });
    ExtractedScene { meshes: vec![mesh(1, 36, 24), mesh(2, 3000, 1200)], instances }
}

fn frame_inputs(frame_index: u64) -> FrameInputs {
    let mut next = 0x100;
    let mut t = |format| {
        next += 1;
        GpuTexture::new_2d(NativeHandle(next), format, WIDTH, HEIGHT)
    };
    FrameInputs {
        frame_index,
        view: ExtractedView { viewport_size: (WIDTH, HEIGHT), ..Default::default() },
        lights: vec![
            ExtractedLight::Directional { direction: Vec3::new(0.3, -0.8, 0.5).normalize(), angular_size: 0.53 },
            ExtractedLight::Spot {
                position: Vec3::new(0.0, 4.0, 0.0),
                direction: Vec3::NEG_Y,
                intensity: 20.0,
                radius: 0.2,
                range: 15.0,
                outer_angle: 35.0,
            },
        ],
        gbuffer: GBufferTextures {
            world_position: t(TextureFormat::Rgba32Float),
            depth: t(TextureFormat::Depth32Float),
            normals: t(TextureFormat::Rgba16Float),
            specular: t(TextureFormat::Rgba8Unorm),
            motion_vectors: t(TextureFormat::Rg16Float),
            hdr_color: t(TextureFormat::Rgba16Float),
        },
        outputs: RtOutputTextures {
            reflections: t(TextureFormat::Rgba16Float),
            reflections_final: t(TextureFormat::Rgba16Float),
            gi: t(TextureFormat::Rgba16Float),
            gi_final: t(TextureFormat::Rgba16Float),
            ao: t(TextureFormat::R16Float),
            ao_final: t(TextureFormat::R16Float),
            shadows: t(TextureFormat::Rg16Float),
            shadows_aux: t(TextureFormat::Rg16Float),
            shadows_final: t(TextureFormat::R16Float),
        },
        transparent: None,
    }
}

fn run<A: NativeApi, L: CommandLanes<A>>(lanes: L, args: &Args) -> Result<(), String> {
    let config = RayliteConfig {
        shadows: ShadowMode::MultiLight,
        allocation_log_interval: Some(4),
        ..Default::default()
    };
    let mut plugin =
        RaylitePlugin::new_with_config(config, Arc::new(HeadlessHost), lanes, |s| Ok(HeadlessContext::<A>::new(s)))?;

    for index in 0..args.frames {
        plugin.prepare(&scene(index))?;
        plugin.render_frame(&frame_inputs(index))?;
        let report = plugin.last_report();
        println!(
            "frame {index:>3}: submitted {} retired {} in flight {}",
            report.submitted,
            report.retired,
            plugin.renderer().scheduler().len()
        );
    }

    if let Some(path) = &args.export {
        let written = plugin.renderer().export_shader_list(path).map_err(|e| e.to_string())?;
        println!("shader list {}: {}", path.display(), if written { "written" } else { "empty" });
    }

    plugin.scene_unloading()?;
    let counts = plugin.renderer().context().counts();
    println!("{counts:#?}");
    println!("Raylite plugin_loop ({:?}): {} frames OK", A::KIND, args.frames);
    Ok(())
}

fn main() -> Result<(), String> {
    env_logger::init();
    let args = parse_args()?;
    match args.api.as_str() {
        "d3d12" => run::<D3D12, _>(FixedLanes::single(D3D12CommandList(NativeHandle(0xc0))), &args),
        "d3d11" => run::<D3D11, _>(D3D11InteropLanes::new(NativeHandle(0xdc), NativeHandle(0xfe), LoggedQueue), &args),
        other => Err(format!("unknown api {other}; expected d3d11 or d3d12")),
    }
}
