//! D3D12: task containers are recorded into a graphics command list the host executes.

use render_api::{GpuTexture, NativeHandle};

use super::dxgi::{self, DxgiFormat, Texture2DSrv, Texture2DUav};
use super::{validate_texture, GraphicsApi, NativeApi, NativeTextureView, TextureAccess, ViewSummary};
use crate::error::AdapterError;

/// D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING
pub const DEFAULT_SHADER_4_COMPONENT_MAPPING: u32 = 0x1688;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct D3D12;

/// ID3D12Resource* plus the views a task binds it through.
#[derive(Clone, Debug, PartialEq)]
pub struct D3D12TextureView {
    pub resource: NativeHandle,
    pub resource_format: DxgiFormat,
    pub srv: Option<Texture2DSrv>,
    pub uav: Option<Texture2DUav>,
    pub shader_4_component_mapping: u32,
}

impl NativeTextureView for D3D12TextureView {
    fn native(&self) -> NativeHandle {
        self.resource
    }

    fn summary(&self) -> ViewSummary {
        dxgi::summarize(self.resource_format, self.srv.as_ref(), self.uav.as_ref())
    }
}

/// ID3D12GraphicsCommandList4*
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct D3D12CommandList(pub NativeHandle);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct D3D12BuildInput {
    pub command_list: NativeHandle,
    pub geometry_task_first: bool,
}

impl NativeApi for D3D12 {
    const KIND: GraphicsApi = GraphicsApi::D3D12;
    type TextureView = D3D12TextureView;
    type CommandList = D3D12CommandList;
    type BuildInput = D3D12BuildInput;

    fn texture_view(texture: &GpuTexture, access: TextureAccess) -> Result<D3D12TextureView, AdapterError> {
        validate_texture(texture, access)?;
        let mapping = dxgi::dxgi_mapping(texture.format)?;
        let (srv, uav) = dxgi::views(mapping, access);
        Ok(D3D12TextureView {
            resource: texture.native,
            resource_format: mapping.resource,
            srv,
            uav,
            shader_4_component_mapping: DEFAULT_SHADER_4_COMPONENT_MAPPING,
        })
    }

    fn build_input(command_list: &D3D12CommandList, geometry_task_first: bool) -> D3D12BuildInput {
        D3D12BuildInput { command_list: command_list.0, geometry_task_first }
    }

    fn geometry_task_first(input: &D3D12BuildInput) -> bool {
        input.geometry_task_first
    }
}
