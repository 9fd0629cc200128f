//! DXGI formats and the 2D view descriptors shared by the D3D11 and D3D12 adapters.

use crate::error::AdapterError;
use crate::native::{Aspect, TextureAccess, ViewSummary};

/// DXGI_FORMAT value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DxgiFormat(pub u32);

impl DxgiFormat {
    pub const UNKNOWN: Self = Self(0);
    pub const R32G32B32A32_FLOAT: Self = Self(2);
    pub const R32G32B32_FLOAT: Self = Self(6);
    pub const R16G16B16A16_FLOAT: Self = Self(10);
    pub const R16G16B16A16_UNORM: Self = Self(11);
    pub const R32G32_FLOAT: Self = Self(16);
    pub const R32G8X24_TYPELESS: Self = Self(19);
    pub const D32_FLOAT_S8X24_UINT: Self = Self(20);
    pub const R32_FLOAT_X8X24_TYPELESS: Self = Self(21);
    pub const R10G10B10A2_UNORM: Self = Self(24);
    pub const R8G8B8A8_UNORM: Self = Self(28);
    pub const R8G8B8A8_UNORM_SRGB: Self = Self(29);
    pub const R16G16_FLOAT: Self = Self(34);
    pub const R32_TYPELESS: Self = Self(39);
    pub const D32_FLOAT: Self = Self(40);
    pub const R32_FLOAT: Self = Self(41);
    pub const R32_UINT: Self = Self(42);
    pub const R24G8_TYPELESS: Self = Self(44);
    pub const D24_UNORM_S8_UINT: Self = Self(45);
    pub const R24_UNORM_X8_TYPELESS: Self = Self(46);
    pub const R8G8_UNORM: Self = Self(49);
    pub const R16_TYPELESS: Self = Self(53);
    pub const R16_FLOAT: Self = Self(54);
    pub const D16_UNORM: Self = Self(55);
    pub const R16_UNORM: Self = Self(56);
    pub const R8_UNORM: Self = Self(61);
    pub const B8G8R8A8_UNORM: Self = Self(87);
    pub const B8G8R8A8_UNORM_SRGB: Self = Self(91);
}

/// Resource format and the typed format views are created with.
/// They differ only for depth, whose resources are typeless.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DxgiMapping {
    pub resource: DxgiFormat,
    pub view: DxgiFormat,
}

const TABLE: &[(wgpu::TextureFormat, DxgiFormat, DxgiFormat)] = &[
    (wgpu::TextureFormat::Rgba8Unorm, DxgiFormat::R8G8B8A8_UNORM, DxgiFormat::R8G8B8A8_UNORM),
    (wgpu::TextureFormat::Rgba8UnormSrgb, DxgiFormat::R8G8B8A8_UNORM_SRGB, DxgiFormat::R8G8B8A8_UNORM_SRGB),
    (wgpu::TextureFormat::Bgra8Unorm, DxgiFormat::B8G8R8A8_UNORM, DxgiFormat::B8G8R8A8_UNORM),
    (wgpu::TextureFormat::Bgra8UnormSrgb, DxgiFormat::B8G8R8A8_UNORM_SRGB, DxgiFormat::B8G8R8A8_UNORM_SRGB),
    (wgpu::TextureFormat::Rgba16Float, DxgiFormat::R16G16B16A16_FLOAT, DxgiFormat::R16G16B16A16_FLOAT),
    (wgpu::TextureFormat::Rgba16Unorm, DxgiFormat::R16G16B16A16_UNORM, DxgiFormat::R16G16B16A16_UNORM),
    (wgpu::TextureFormat::Rgba32Float, DxgiFormat::R32G32B32A32_FLOAT, DxgiFormat::R32G32B32A32_FLOAT),
    (wgpu::TextureFormat::Rg16Float, DxgiFormat::R16G16_FLOAT, DxgiFormat::R16G16_FLOAT),
    (wgpu::TextureFormat::Rg32Float, DxgiFormat::R32G32_FLOAT, DxgiFormat::R32G32_FLOAT),
    (wgpu::TextureFormat::Rg8Unorm, DxgiFormat::R8G8_UNORM, DxgiFormat::R8G8_UNORM),
    (wgpu::TextureFormat::Rgb10a2Unorm, DxgiFormat::R10G10B10A2_UNORM, DxgiFormat::R10G10B10A2_UNORM),
    (wgpu::TextureFormat::R32Float, DxgiFormat::R32_FLOAT, DxgiFormat::R32_FLOAT),
    (wgpu::TextureFormat::R32Uint, DxgiFormat::R32_UINT, DxgiFormat::R32_UINT),
    (wgpu::TextureFormat::R16Float, DxgiFormat::R16_FLOAT, DxgiFormat::R16_FLOAT),
    (wgpu::TextureFormat::R16Unorm, DxgiFormat::R16_UNORM, DxgiFormat::R16_UNORM),
    (wgpu::TextureFormat::R8Unorm, DxgiFormat::R8_UNORM, DxgiFormat::R8_UNORM),
    (wgpu::TextureFormat::Depth32Float, DxgiFormat::R32_TYPELESS, DxgiFormat::R32_FLOAT),
    (wgpu::TextureFormat::Depth24PlusStencil8, DxgiFormat::R24G8_TYPELESS, DxgiFormat::R24_UNORM_X8_TYPELESS),
    (wgpu::TextureFormat::Depth16Unorm, DxgiFormat::R16_TYPELESS, DxgiFormat::R16_UNORM),
    (wgpu::TextureFormat::Depth32FloatStencil8, DxgiFormat::R32G8X24_TYPELESS, DxgiFormat::R32_FLOAT_X8X24_TYPELESS),
];

pub fn dxgi_mapping(format: wgpu::TextureFormat) -> Result<DxgiMapping, AdapterError> {
    TABLE
        .iter()
        .find(|(f, _, _)| *f == format)
        .map(|&(_, resource, view)| DxgiMapping { resource, view })
        .ok_or(AdapterError::UnsupportedFormat(format))
}

/// Inverse of [`dxgi_mapping`].
pub fn engine_format(mapping: DxgiMapping) -> Option<wgpu::TextureFormat> {
    TABLE
        .iter()
        .find(|(_, resource, view)| *resource == mapping.resource && *view == mapping.view)
        .map(|&(f, _, _)| f)
}

/// Resource formats whose views read the depth plane.
pub fn is_typeless_depth(format: DxgiFormat) -> bool {
    matches!(
        format,
        DxgiFormat::R32_TYPELESS | DxgiFormat::R24G8_TYPELESS | DxgiFormat::R16_TYPELESS | DxgiFormat::R32G8X24_TYPELESS
    )
}

/// D3D*_SRV_DIMENSION_TEXTURE2D view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Texture2DSrv {
    pub format: DxgiFormat,
    pub most_detailed_mip: u32,
    pub mip_levels: u32,
}

/// D3D*_UAV_DIMENSION_TEXTURE2D view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Texture2DUav {
    pub format: DxgiFormat,
    pub mip_slice: u32,
}

pub(crate) fn views(
    mapping: DxgiMapping,
    access: TextureAccess,
) -> (Option<Texture2DSrv>, Option<Texture2DUav>) {
    let srv = access.contains(TextureAccess::SHADER_READ).then_some(Texture2DSrv {
        format: mapping.view,
        most_detailed_mip: 0,
        mip_levels: 1,
    });
    let uav = access
        .contains(TextureAccess::UNORDERED_ACCESS)
        .then_some(Texture2DUav { format: mapping.view, mip_slice: 0 });
    (srv, uav)
}

/// Summary shared by both D3D view types.
pub(crate) fn summarize(
    resource_format: DxgiFormat,
    srv: Option<&Texture2DSrv>,
    uav: Option<&Texture2DUav>,
) -> ViewSummary {
    let view_format = srv.map(|s| s.format).or(uav.map(|u| u.format)).unwrap_or(DxgiFormat::UNKNOWN);
    let (base_mip, mip_count) = match (srv, uav) {
        (Some(s), _) => (s.most_detailed_mip, s.mip_levels),
        (None, Some(u)) => (u.mip_slice, 1),
        (None, None) => (0, 0),
    };
    let mut access = TextureAccess::empty();
    access.set(TextureAccess::SHADER_READ, srv.is_some());
    access.set(TextureAccess::UNORDERED_ACCESS, uav.is_some());
    ViewSummary {
        format: engine_format(DxgiMapping { resource: resource_format, view: view_format }),
        aspect: if is_typeless_depth(resource_format) { Aspect::Depth } else { Aspect::Color },
        base_mip,
        mip_count,
        base_layer: 0,
        layer_count: 1,
        access,
    }
}
