//! Error types. Backend and capability failures are unrecoverable for the frame loop:
//! they are logged where they happen and handed up unchanged.

use render_api::{InstanceKey, MeshKey};
use thiserror::Error;

use crate::container::{Phase, TaskState};

/// Non-OK status returned across the SDK boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SdkError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("out of memory")]
    OutOfMemory,
    #[error("all {supported} working sets are in flight")]
    WorkingSetExhausted { supported: u32 },
    #[error("unknown handle {0:#x}")]
    UnknownHandle(u64),
    #[error("handle {0:#x} is still referenced")]
    HandleInUse(u64),
    #[error("not implemented for this backend")]
    NotImplemented,
}

/// Texture cannot be expressed as a native ray-tracing descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("ray-tracing tasks only take 2D textures, got {0:?}")]
    NotTexture2D(wgpu::TextureViewDimension),
    #[error("2D texture has {0} array layers, expected 1")]
    LayeredTexture(u32),
    #[error("format {0:?} has no native mapping")]
    UnsupportedFormat(wgpu::TextureFormat),
    #[error("depth format {0:?} cannot be bound for unordered access")]
    DepthUnorderedAccess(wgpu::TextureFormat),
    #[error("no access mode requested")]
    NoAccess,
}

#[derive(Debug, Error)]
pub enum RtError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("missing device capability: {0}")]
    Capability(String),
    #[error("{call}() failed: {source}")]
    Sdk {
        call: &'static str,
        #[source]
        source: SdkError,
    },
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("instance {instance:?} references mesh {mesh:?} which has no registered geometry")]
    MissingGeometry { instance: InstanceKey, mesh: MeshKey },
    #[error("{phase:?} task container is {state:?}, expected {expected:?}")]
    ContainerState {
        phase: Phase,
        state: TaskState,
        expected: TaskState,
    },
    #[error("no {0} denoising context for an enabled denoiser")]
    MissingDenoisingContext(&'static str),
    #[error("host device: {0}")]
    Host(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type RtResult<T> = Result<T, RtError>;

/// Tag an SDK status with the call that produced it and log it.
pub(crate) fn sdk_call<T>(call: &'static str, result: Result<T, SdkError>) -> RtResult<T> {
    result.map_err(|source| {
        log::error!("{call}() failed: {source}");
        RtError::Sdk { call, source }
    })
}

pub(crate) fn host_call(what: &str, result: Result<(), String>) -> RtResult<()> {
    result.map_err(|e| {
        log::error!("{what}: {e}");
        RtError::Host(e)
    })
}
