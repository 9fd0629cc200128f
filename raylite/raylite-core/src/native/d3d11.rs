//! D3D11: tasks are invoked immediately on a device context, ordered against other
//! queues by an interop fence wait/signal pair.

use render_api::{GpuTexture, NativeHandle};

use super::dxgi::{self, DxgiFormat, Texture2DSrv, Texture2DUav};
use super::{validate_texture, GraphicsApi, NativeApi, NativeTextureView, TextureAccess, ViewSummary};
use crate::error::AdapterError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct D3D11;

/// ID3D11Resource* plus the views a task binds it through.
#[derive(Clone, Debug, PartialEq)]
pub struct D3D11TextureView {
    pub resource: NativeHandle,
    pub resource_format: DxgiFormat,
    pub srv: Option<Texture2DSrv>,
    pub uav: Option<Texture2DUav>,
}

impl NativeTextureView for D3D11TextureView {
    fn native(&self) -> NativeHandle {
        self.resource
    }

    fn summary(&self) -> ViewSummary {
        dxgi::summarize(self.resource_format, self.srv.as_ref(), self.uav.as_ref())
    }
}

/// Device context plus the interop fence values one task invocation waits on and signals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct D3D11Submission {
    pub device_context: NativeHandle,
    pub fence: NativeHandle,
    pub wait_value: u64,
    pub signal_value: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct D3D11BuildInput {
    pub device_context: NativeHandle,
    pub wait_fence: NativeHandle,
    pub wait_fence_value: u64,
    pub signal_fence: NativeHandle,
    pub signal_fence_value: u64,
    pub geometry_task_first: bool,
}

impl NativeApi for D3D11 {
    const KIND: GraphicsApi = GraphicsApi::D3D11;
    type TextureView = D3D11TextureView;
    type CommandList = D3D11Submission;
    type BuildInput = D3D11BuildInput;

    fn texture_view(texture: &GpuTexture, access: TextureAccess) -> Result<D3D11TextureView, AdapterError> {
        validate_texture(texture, access)?;
        let mapping = dxgi::dxgi_mapping(texture.format)?;
        let (srv, uav) = dxgi::views(mapping, access);
        Ok(D3D11TextureView { resource: texture.native, resource_format: mapping.resource, srv, uav })
    }

    fn build_input(submission: &D3D11Submission, geometry_task_first: bool) -> D3D11BuildInput {
        D3D11BuildInput {
            device_context: submission.device_context,
            wait_fence: submission.fence,
            wait_fence_value: submission.wait_value,
            signal_fence: submission.fence,
            signal_fence_value: submission.signal_value,
            geometry_task_first,
        }
    }

    fn geometry_task_first(input: &D3D11BuildInput) -> bool {
        input.geometry_task_first
    }
}
