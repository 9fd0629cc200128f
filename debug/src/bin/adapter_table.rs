//! Print how each native adapter maps a set of engine formats, and flag disagreements.

use raylite_core::native::{NativeTextureView, ViewSummary};
use raylite_core::{AdapterError, NativeApi, TextureAccess, Vulkan, D3D11, D3D12};
use render_api::{GpuTexture, NativeHandle};
use wgpu::TextureFormat;

const FORMATS: &[TextureFormat] = &[
    TextureFormat::Rgba8Unorm,
    TextureFormat::Rgba8UnormSrgb,
    TextureFormat::Bgra8Unorm,
    TextureFormat::Rgba16Float,
    TextureFormat::Rgba32Float,
    TextureFormat::Rg16Float,
    TextureFormat::R32Float,
    TextureFormat::R16Float,
    TextureFormat::Rgb10a2Unorm,
    TextureFormat::Depth32Float,
    TextureFormat::Depth24PlusStencil8,
    TextureFormat::Depth16Unorm,
    TextureFormat::Bc1RgbaUnorm,
];

const ACCESSES: [(&str, TextureAccess); 3] = [
    ("srv", TextureAccess::SHADER_READ),
    ("uav", TextureAccess::UNORDERED_ACCESS),
    ("srv+uav", TextureAccess::COMBINED),
];

fn summary<A: NativeApi>(texture: &GpuTexture, access: TextureAccess) -> Result<ViewSummary, AdapterError> {
    A::texture_view(texture, access).map(|v| v.summary())
}

fn cell(result: &Result<ViewSummary, AdapterError>) -> String {
    match result {
        Ok(s) => format!("{:?}/{:?} mip {}+{} layer {}+{}", s.format, s.aspect, s.base_mip, s.mip_count, s.base_layer, s.layer_count),
        Err(e) => format!("error: {e}"),
    }
}

fn main() {
    env_logger::init();
    let mut mismatches = 0;
    for &format in FORMATS {
        let texture = GpuTexture::new_2d(NativeHandle(1), format, 256, 256);
        println!("{format:?}");
        for (name, access) in ACCESSES {
            let d3d11 = summary::<D3D11>(&texture, access);
            let d3d12 = summary::<D3D12>(&texture, access);
            let vulkan = summary::<Vulkan>(&texture, access);
            let agree = d3d11 == d3d12 && d3d12 == vulkan;
            if !agree {
                mismatches += 1;
            }
            println!("  {name:<8} {} {}", if agree { "ok      " } else { "MISMATCH" }, cell(&d3d12));
            if !agree {
                println!("           d3d11  {}", cell(&d3d11));
                println!("           vulkan {}", cell(&vulkan));
            }
        }
    }
    if mismatches > 0 {
        log::error!("{mismatches} adapter mismatches");
        std::process::exit(1);
    }
    println!("Raylite adapter_table: all adapters agree");
}
