//! The ray-tracing SDK boundary: opaque handles and the execute-context trait every
//! backend implements. Everything above this module works against [`ExecuteContext`] only.

mod headless;

pub use headless::{CallCounts, HeadlessContext, RecordedGpuTask, SdkCall};

use crate::config::RayliteConfig;
use crate::container::TaskContainer;
use crate::error::SdkError;
use crate::native::NativeApi;

macro_rules! sdk_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);
    };
}

sdk_handle!(
    /// Bottom-level acceleration structure of one mesh.
    GeometryHandle
);
sdk_handle!(
    /// Top-level instance of a geometry.
    InstanceHandle
);
sdk_handle!(DenoisingContextHandle);
sdk_handle!(
    /// Recorded task container awaiting completion.
    GpuTaskHandle
);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DenoisingMethod {
    Reblur,
    Relax,
    Sigma,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalType {
    Specular,
    Diffuse,
    SpecularAndDiffuse,
    DiffuseOcclusion,
    Shadow,
    MultiShadow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DenoisingContextInput {
    pub method: DenoisingMethod,
    pub signal: SignalType,
    pub max_width: u32,
    pub max_height: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceAllocations {
    pub resource_count: u32,
    pub total_bytes: u64,
}

/// Settings an execute context is created with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecuteContextSettings {
    pub supported_working_sets: u32,
    pub upload_heap_size_per_working_set: u64,
    pub descriptor_heap_size: u32,
    /// Shader identifiers to compile ahead of first use.
    pub cold_load_shader_list: Vec<u32>,
}

impl ExecuteContextSettings {
    pub fn from_config(config: &RayliteConfig, cold_load_shader_list: Vec<u32>) -> Self {
        Self {
            supported_working_sets: config.supported_working_sets,
            upload_heap_size_per_working_set: config.upload_heap_size_per_working_set,
            descriptor_heap_size: config.descriptor_heap_size,
            cold_load_shader_list,
        }
    }
}

/// One SDK execute context bound to a native API. Every call either succeeds or returns
/// the backend's status; callers treat failures as fatal.
pub trait ExecuteContext {
    type Api: NativeApi;

    fn create_geometry_handle(&mut self) -> Result<GeometryHandle, SdkError>;
    fn create_instance_handle(&mut self) -> Result<InstanceHandle, SdkError>;
    fn destroy_geometry_handles(&mut self, handles: &[GeometryHandle]) -> Result<(), SdkError>;
    fn destroy_instance_handles(&mut self, handles: &[InstanceHandle]) -> Result<(), SdkError>;
    fn destroy_all_geometry_handles(&mut self) -> Result<(), SdkError>;
    fn destroy_all_instance_handles(&mut self) -> Result<(), SdkError>;

    fn create_denoising_context_handle(
        &mut self,
        input: &DenoisingContextInput,
    ) -> Result<DenoisingContextHandle, SdkError>;
    fn destroy_denoising_context_handle(&mut self, handle: DenoisingContextHandle) -> Result<(), SdkError>;

    /// Record the container's tasks against the native command list described by `input`.
    fn build_gpu_task(
        &mut self,
        container: &TaskContainer<Self::Api>,
        input: &<Self::Api as NativeApi>::BuildInput,
    ) -> Result<GpuTaskHandle, SdkError>;
    /// Release the working set of a GPU task whose command list finished executing.
    fn mark_gpu_task_as_completed(&mut self, handle: GpuTaskHandle) -> Result<(), SdkError>;

    /// Free resources queued for deferred release. Requires no task in flight.
    fn release_device_resources_immediately(&mut self) -> Result<(), SdkError>;

    fn loaded_shader_list(&self) -> Result<Vec<u32>, SdkError>;
    fn current_resource_allocations(&self) -> Result<ResourceAllocations, SdkError>;
}
