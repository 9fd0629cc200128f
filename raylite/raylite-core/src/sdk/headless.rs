//! In-process execute context. Tracks handle lifetimes the way the SDK does and records
//! every built task container, without touching a GPU. Used by tests and the headless loop.

use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;

use super::{
    DenoisingContextHandle, DenoisingContextInput, ExecuteContext, ExecuteContextSettings, GeometryHandle,
    GpuTaskHandle, InstanceHandle, ResourceAllocations,
};
use crate::container::{Phase, TaskContainer};
use crate::error::SdkError;
use crate::native::NativeApi;
use crate::tasks::{BvhTask, RenderTask, TaskOperation};

/// Calls that can be made to fail on demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SdkCall {
    CreateGeometryHandle,
    CreateInstanceHandle,
    DestroyGeometryHandles,
    DestroyInstanceHandles,
    DestroyAllGeometryHandles,
    DestroyAllInstanceHandles,
    CreateDenoisingContext,
    DestroyDenoisingContext,
    BuildGpuTask,
    MarkGpuTaskAsCompleted,
    ReleaseDeviceResources,
}

/// Successful calls, by kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub geometry_handles_created: u32,
    pub instance_handles_created: u32,
    pub geometry_handles_destroyed: u32,
    pub instance_handles_destroyed: u32,
    pub denoising_contexts_created: u32,
    pub denoising_contexts_destroyed: u32,
    pub gpu_tasks_built: u32,
    pub gpu_tasks_completed: u32,
    pub device_resource_releases: u32,
}

/// Snapshot of one built container, tasks in recording order.
#[derive(Clone, Debug)]
pub struct RecordedGpuTask<A: NativeApi> {
    pub handle: GpuTaskHandle,
    pub phase: Phase,
    pub build_input: A::BuildInput,
    pub bvh_tasks: Vec<BvhTask>,
    pub render_tasks: Vec<RenderTask<A>>,
}

#[derive(Clone, Copy, Debug)]
struct GeometryEntry {
    registered: bool,
    allow_update: bool,
    bytes: u64,
}

const BVH_BUILD_SHADER_ID: u32 = 0x100;

#[derive(Debug)]
pub struct HeadlessContext<A: NativeApi> {
    settings: ExecuteContextSettings,
    next_handle: u64,
    geometries: BTreeMap<GeometryHandle, GeometryEntry>,
    /// Instance handle to the geometry it was registered against.
    instances: BTreeMap<InstanceHandle, Option<GeometryHandle>>,
    denoising_contexts: BTreeMap<DenoisingContextHandle, DenoisingContextInput>,
    in_flight: BTreeSet<GpuTaskHandle>,
    recorded: Vec<RecordedGpuTask<A>>,
    loaded_shaders: BTreeSet<u32>,
    failures: Vec<(SdkCall, SdkError)>,
    counts: CallCounts,
    _api: PhantomData<A>,
}

impl<A: NativeApi> HeadlessContext<A> {
    pub fn new(settings: ExecuteContextSettings) -> Self {
        let loaded_shaders = settings.cold_load_shader_list.iter().copied().collect();
        Self {
            settings,
            next_handle: 1,
            geometries: BTreeMap::new(),
            instances: BTreeMap::new(),
            denoising_contexts: BTreeMap::new(),
            in_flight: BTreeSet::new(),
            recorded: Vec::new(),
            loaded_shaders,
            failures: Vec::new(),
            counts: CallCounts::default(),
            _api: PhantomData,
        }
    }

    /// Make the next `call` return `error`.
    pub fn fail_next(&mut self, call: SdkCall, error: SdkError) {
        self.failures.push((call, error));
    }

    pub fn counts(&self) -> CallCounts {
        self.counts
    }

    pub fn recorded(&self) -> &[RecordedGpuTask<A>] {
        &self.recorded
    }

    pub fn last_recorded(&self, phase: Phase) -> Option<&RecordedGpuTask<A>> {
        self.recorded.iter().rev().find(|r| r.phase == phase)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn live_geometries(&self) -> usize {
        self.geometries.len()
    }

    pub fn live_instances(&self) -> usize {
        self.instances.len()
    }

    pub fn denoising_contexts(&self) -> impl Iterator<Item = (&DenoisingContextHandle, &DenoisingContextInput)> {
        self.denoising_contexts.iter()
    }

    pub fn settings(&self) -> &ExecuteContextSettings {
        &self.settings
    }

    fn check(&mut self, call: SdkCall) -> Result<(), SdkError> {
        match self.failures.iter().position(|(c, _)| *c == call) {
            Some(i) => Err(self.failures.remove(i).1),
            None => Ok(()),
        }
    }

    fn next(&mut self) -> u64 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }

    fn apply_bvh_task(&mut self, task: &BvhTask) -> Result<(), SdkError> {
        match task {
            BvhTask::Geometry { operation, handle, input } => {
                let entry = self.geometries.get_mut(handle).ok_or(SdkError::UnknownHandle(handle.0))?;
                match operation {
                    TaskOperation::Register => {
                        entry.registered = true;
                        entry.allow_update = input.allow_update;
                        entry.bytes = input
                            .components
                            .iter()
                            .map(|c| c.index_buffer.byte_size() + c.vertex_buffer.byte_size())
                            .sum();
                    }
                    TaskOperation::Update => {
                        if !entry.registered || !entry.allow_update {
                            return Err(SdkError::InvalidArgument);
                        }
                    }
                }
            }
            BvhTask::Instance { operation, handle, input } => {
                let geometry_ready = self.geometries.get(&input.geometry).is_some_and(|g| g.registered);
                let bound = self.instances.get_mut(handle).ok_or(SdkError::UnknownHandle(handle.0))?;
                if !geometry_ready {
                    return Err(SdkError::InvalidArgument);
                }
                match operation {
                    TaskOperation::Register => *bound = Some(input.geometry),
                    TaskOperation::Update if bound.is_none() => return Err(SdkError::InvalidArgument),
                    TaskOperation::Update => {}
                }
            }
            BvhTask::Build => {
                self.loaded_shaders.insert(BVH_BUILD_SHADER_ID);
            }
        }
        Ok(())
    }

    fn validate_render_task(&mut self, task: &RenderTask<A>) -> Result<(), SdkError> {
        if let Some(context) = task.denoising_context() {
            if !self.denoising_contexts.contains_key(&context) {
                return Err(SdkError::UnknownHandle(context.0));
            }
        }
        if let RenderTask::DirectLightTransfer(t) = task {
            if !matches!(self.instances.get(&t.target), Some(Some(_))) {
                return Err(SdkError::UnknownHandle(t.target.0));
            }
        }
        self.loaded_shaders.insert((task.kind() as u32) << 1 | task.uses_inline_rt() as u32);
        Ok(())
    }
}

impl<A: NativeApi> ExecuteContext for HeadlessContext<A> {
    type Api = A;

    fn create_geometry_handle(&mut self) -> Result<GeometryHandle, SdkError> {
        self.check(SdkCall::CreateGeometryHandle)?;
        let handle = GeometryHandle(self.next());
        self.geometries.insert(handle, GeometryEntry { registered: false, allow_update: false, bytes: 0 });
        self.counts.geometry_handles_created += 1;
        Ok(handle)
    }

    fn create_instance_handle(&mut self) -> Result<InstanceHandle, SdkError> {
        self.check(SdkCall::CreateInstanceHandle)?;
        let handle = InstanceHandle(self.next());
        self.instances.insert(handle, None);
        self.counts.instance_handles_created += 1;
        Ok(handle)
    }

    fn destroy_geometry_handles(&mut self, handles: &[GeometryHandle]) -> Result<(), SdkError> {
        self.check(SdkCall::DestroyGeometryHandles)?;
        for handle in handles {
            if !self.geometries.contains_key(handle) {
                return Err(SdkError::UnknownHandle(handle.0));
            }
            if self.instances.values().any(|g| *g == Some(*handle)) {
                return Err(SdkError::HandleInUse(handle.0));
            }
        }
        for handle in handles {
            self.geometries.remove(handle);
        }
        self.counts.geometry_handles_destroyed += handles.len() as u32;
        Ok(())
    }

    fn destroy_instance_handles(&mut self, handles: &[InstanceHandle]) -> Result<(), SdkError> {
        self.check(SdkCall::DestroyInstanceHandles)?;
        if let Some(unknown) = handles.iter().find(|h| !self.instances.contains_key(h)) {
            return Err(SdkError::UnknownHandle(unknown.0));
        }
        for handle in handles {
            self.instances.remove(handle);
        }
        self.counts.instance_handles_destroyed += handles.len() as u32;
        Ok(())
    }

    fn destroy_all_geometry_handles(&mut self) -> Result<(), SdkError> {
        self.check(SdkCall::DestroyAllGeometryHandles)?;
        if let Some(bound) = self.instances.values().flatten().next() {
            return Err(SdkError::HandleInUse(bound.0));
        }
        self.counts.geometry_handles_destroyed += self.geometries.len() as u32;
        self.geometries.clear();
        Ok(())
    }

    fn destroy_all_instance_handles(&mut self) -> Result<(), SdkError> {
        self.check(SdkCall::DestroyAllInstanceHandles)?;
        self.counts.instance_handles_destroyed += self.instances.len() as u32;
        self.instances.clear();
        Ok(())
    }

    fn create_denoising_context_handle(
        &mut self,
        input: &DenoisingContextInput,
    ) -> Result<DenoisingContextHandle, SdkError> {
        self.check(SdkCall::CreateDenoisingContext)?;
        if input.max_width == 0 || input.max_height == 0 {
            return Err(SdkError::InvalidArgument);
        }
        let handle = DenoisingContextHandle(self.next());
        self.denoising_contexts.insert(handle, *input);
        self.counts.denoising_contexts_created += 1;
        Ok(handle)
    }

    fn destroy_denoising_context_handle(&mut self, handle: DenoisingContextHandle) -> Result<(), SdkError> {
        self.check(SdkCall::DestroyDenoisingContext)?;
        self.denoising_contexts.remove(&handle).ok_or(SdkError::UnknownHandle(handle.0))?;
        self.counts.denoising_contexts_destroyed += 1;
        Ok(())
    }

    fn build_gpu_task(
        &mut self,
        container: &TaskContainer<A>,
        input: &A::BuildInput,
    ) -> Result<GpuTaskHandle, SdkError> {
        self.check(SdkCall::BuildGpuTask)?;
        if self.in_flight.len() >= self.settings.supported_working_sets as usize {
            return Err(SdkError::WorkingSetExhausted { supported: self.settings.supported_working_sets });
        }
        let bvh_tasks: Vec<BvhTask> =
            container.recorded_bvh_tasks(A::geometry_task_first(input)).into_iter().cloned().collect();
        for task in &bvh_tasks {
            self.apply_bvh_task(task)?;
        }
        for task in container.render_tasks() {
            self.validate_render_task(task)?;
        }
        let handle = GpuTaskHandle(self.next());
        self.in_flight.insert(handle);
        self.recorded.push(RecordedGpuTask {
            handle,
            phase: container.phase(),
            build_input: input.clone(),
            bvh_tasks,
            render_tasks: container.render_tasks().to_vec(),
        });
        self.counts.gpu_tasks_built += 1;
        Ok(handle)
    }

    fn mark_gpu_task_as_completed(&mut self, handle: GpuTaskHandle) -> Result<(), SdkError> {
        self.check(SdkCall::MarkGpuTaskAsCompleted)?;
        if !self.in_flight.remove(&handle) {
            return Err(SdkError::UnknownHandle(handle.0));
        }
        self.counts.gpu_tasks_completed += 1;
        Ok(())
    }

    fn release_device_resources_immediately(&mut self) -> Result<(), SdkError> {
        self.check(SdkCall::ReleaseDeviceResources)?;
        if !self.in_flight.is_empty() {
            return Err(SdkError::InvalidArgument);
        }
        self.counts.device_resource_releases += 1;
        Ok(())
    }

    fn loaded_shader_list(&self) -> Result<Vec<u32>, SdkError> {
        Ok(self.loaded_shaders.iter().copied().collect())
    }

    fn current_resource_allocations(&self) -> Result<ResourceAllocations, SdkError> {
        let geometry_bytes: u64 = self.geometries.values().map(|g| g.bytes).sum();
        let context_bytes: u64 = self
            .denoising_contexts
            .values()
            .map(|c| c.max_width as u64 * c.max_height as u64 * 16)
            .sum();
        Ok(ResourceAllocations {
            resource_count: (self.geometries.len() + self.instances.len() + self.denoising_contexts.len()) as u32,
            total_bytes: geometry_bytes + context_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Float3x4;
    use crate::native::d3d12::D3D12CommandList;
    use crate::native::D3D12;
    use crate::registry::InclusionMask;
    use crate::tasks::{GeometryInput, InstanceInput};
    use render_api::NativeHandle;

    fn ctx() -> HeadlessContext<D3D12> {
        HeadlessContext::new(ExecuteContextSettings { supported_working_sets: 2, ..Default::default() })
    }

    fn input(geometry_first: bool) -> <D3D12 as NativeApi>::BuildInput {
        D3D12::build_input(&D3D12CommandList(NativeHandle(1)), geometry_first)
    }

    fn geometry_register(handle: GeometryHandle) -> BvhTask {
        BvhTask::Geometry {
            operation: TaskOperation::Register,
            handle,
            input: GeometryInput {
                components: Vec::new(),
                allow_update: false,
                allow_light_transfer_target: true,
                surfel_type: 0,
                tiling: Default::default(),
            },
        }
    }

    fn instance_register(handle: InstanceHandle, geometry: GeometryHandle) -> BvhTask {
        BvhTask::Instance {
            operation: TaskOperation::Register,
            handle,
            input: InstanceInput { geometry, transform: Float3x4::IDENTITY, inclusion_mask: InclusionMask::all() },
        }
    }

    #[test]
    fn instance_before_geometry_fails_without_geometry_first() {
        let mut c = ctx();
        let g = c.create_geometry_handle().unwrap();
        let i = c.create_instance_handle().unwrap();
        let mut container = TaskContainer::<D3D12>::new(Phase::PreLighting);
        container.schedule_bvh_task(instance_register(i, g)).unwrap();
        container.schedule_bvh_task(geometry_register(g)).unwrap();
        assert_eq!(c.build_gpu_task(&container, &input(false)), Err(SdkError::InvalidArgument));

        let mut c = ctx();
        let g = c.create_geometry_handle().unwrap();
        let i = c.create_instance_handle().unwrap();
        let mut container = TaskContainer::<D3D12>::new(Phase::PreLighting);
        container.schedule_bvh_task(instance_register(i, g)).unwrap();
        container.schedule_bvh_task(geometry_register(g)).unwrap();
        assert!(c.build_gpu_task(&container, &input(true)).is_ok());
    }

    #[test]
    fn working_sets_are_bounded() {
        let mut c = ctx();
        let container = TaskContainer::<D3D12>::new(Phase::Main);
        let a = c.build_gpu_task(&container, &input(true)).unwrap();
        c.build_gpu_task(&container, &input(true)).unwrap();
        assert_eq!(
            c.build_gpu_task(&container, &input(true)),
            Err(SdkError::WorkingSetExhausted { supported: 2 })
        );
        c.mark_gpu_task_as_completed(a).unwrap();
        assert!(c.build_gpu_task(&container, &input(true)).is_ok());
    }

    #[test]
    fn geometries_outlive_instances() {
        let mut c = ctx();
        let g = c.create_geometry_handle().unwrap();
        let i = c.create_instance_handle().unwrap();
        let mut container = TaskContainer::<D3D12>::new(Phase::PreLighting);
        container.schedule_bvh_tasks([geometry_register(g), instance_register(i, g)]).unwrap();
        c.build_gpu_task(&container, &input(true)).unwrap();
        assert_eq!(c.destroy_all_geometry_handles(), Err(SdkError::HandleInUse(g.0)));
        c.destroy_all_instance_handles().unwrap();
        c.destroy_all_geometry_handles().unwrap();
        assert_eq!(c.live_geometries(), 0);
    }

    #[test]
    fn release_requires_idle_tasks() {
        let mut c = ctx();
        let container = TaskContainer::<D3D12>::new(Phase::Main);
        let t = c.build_gpu_task(&container, &input(true)).unwrap();
        assert_eq!(c.release_device_resources_immediately(), Err(SdkError::InvalidArgument));
        c.mark_gpu_task_as_completed(t).unwrap();
        c.release_device_resources_immediately().unwrap();
    }

    #[test]
    fn injected_failure_fires_once() {
        let mut c = ctx();
        c.fail_next(SdkCall::CreateGeometryHandle, SdkError::OutOfMemory);
        assert_eq!(c.create_geometry_handle(), Err(SdkError::OutOfMemory));
        assert!(c.create_geometry_handle().is_ok());
    }
}
