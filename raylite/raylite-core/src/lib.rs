//! Raylite core: keeps ray-tracing acceleration structures in step with the host scene and
//! schedules trace, denoise and light-cache tasks into per-phase containers, recorded into
//! D3D11, D3D12 or Vulkan command lists through one execute-context interface.

pub mod builder;
pub mod capabilities;
pub mod config;
pub mod container;
pub mod denoise;
pub mod error;
pub mod lanes;
pub mod lights;
pub mod math;
pub mod native;
pub mod registry;
pub mod scheduler;
pub mod sdk;
pub mod shader_list;
pub mod tasks;

#[cfg(test)]
pub(crate) mod testing;

use std::path::Path;
use std::sync::Arc;

use render_api::{ExtractedScene, FrameInputs, HostDevice, InstanceKey};

pub use builder::{FrameFeatures, FrameRequests, FrameTaskBuilder};
pub use config::{
    DebugDisplay, OcclusionDenoiser, RayOffset, RayliteConfig, ShadowDenoiser, ShadowMode, SignalDenoiser,
    SurfelSampleMode, TilingParams,
};
pub use container::{FrameContainers, Phase, TaskContainer, TaskState};
pub use denoise::{DenoisingContextManager, DenoisingContextSet, DesiredDenoising};
pub use error::{AdapterError, RtError, RtResult, SdkError};
pub use lanes::{CommandLanes, FixedLanes};
pub use native::{GraphicsApi, NativeApi, TextureAccess, D3D11, D3D12};
#[cfg(feature = "vulkan")]
pub use native::Vulkan;
pub use registry::{InclusionMask, InstanceState, Registry, SyncStats};
pub use scheduler::{GpuTaskScheduler, InFlightGpuTask};
pub use sdk::{ExecuteContext, ExecuteContextSettings, HeadlessContext};

use error::{host_call, sdk_call};

/// What one `render_frame` call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub retired: usize,
    pub submitted: usize,
    pub contexts_created: u32,
    pub contexts_destroyed: u32,
}

/// Requests made between frames, consumed by the next one.
#[derive(Clone, Copy, Debug, Default)]
struct PendingRequests {
    reset_denoisers: bool,
    light_transfer: bool,
    clear_geometry_cache: bool,
}

/// Scheduling limits fixed at creation.
fn same_limits(a: &RayliteConfig, b: &RayliteConfig) -> bool {
    a.max_render_ahead_frames == b.max_render_ahead_frames
        && a.task_containers_per_frame == b.task_containers_per_frame
        && a.supported_working_sets == b.supported_working_sets
        && a.upload_heap_size_per_working_set == b.upload_heap_size_per_working_set
        && a.descriptor_heap_size == b.descriptor_heap_size
}

pub struct Renderer<C: ExecuteContext> {
    ctx: C,
    host: Arc<dyn HostDevice>,
    config: RayliteConfig,
    registry: Registry,
    denoiser: DenoisingContextManager,
    scheduler: GpuTaskScheduler,
    containers: FrameContainers<C::Api>,
    pending: PendingRequests,
    frames_rendered: u64,
}

impl<C: ExecuteContext> Renderer<C> {
    /// Validate `config` against the device, load the cold-load shader list and create the
    /// execute context through `create`.
    pub fn new(
        mut config: RayliteConfig,
        host: Arc<dyn HostDevice>,
        create: impl FnOnce(ExecuteContextSettings) -> Result<C, SdkError>,
    ) -> RtResult<Self> {
        config.validate()?;
        capabilities::check_capabilities(<C::Api as NativeApi>::KIND, host.as_ref(), &mut config)?;
        let cold_load = shader_list::load_cold_load_shader_list(&config.cold_load_shader_list_path);
        let ctx = sdk_call("CreateExecuteContext", create(ExecuteContextSettings::from_config(&config, cold_load)))?;
        log::info!(
            "raylite renderer on {:?}: {} render-ahead frames x {} containers, inline RT {}",
            <C::Api as NativeApi>::KIND,
            config.max_render_ahead_frames,
            config.task_containers_per_frame,
            config.use_trace_ray_inline
        );
        Ok(Self {
            ctx,
            host,
            registry: Registry::new(&config),
            denoiser: DenoisingContextManager::new(),
            scheduler: GpuTaskScheduler::new(&config),
            containers: FrameContainers::new(),
            config,
            pending: PendingRequests::default(),
            frames_rendered: 0,
        })
    }

    pub fn config(&self) -> &RayliteConfig {
        &self.config
    }

    /// Change feature settings between frames. Scheduling limits cannot change after creation.
    pub fn update_config(&mut self, edit: impl FnOnce(&mut RayliteConfig)) -> RtResult<()> {
        let mut next = self.config.clone();
        edit(&mut next);
        if !same_limits(&self.config, &next) {
            let msg = "scheduling limits are fixed once the renderer exists".to_string();
            log::error!("{msg}");
            return Err(RtError::Config(msg));
        }
        next.validate()?;
        capabilities::check_capabilities(<C::Api as NativeApi>::KIND, self.host.as_ref(), &mut next)?;
        self.config = next;
        Ok(())
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.ctx
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn scheduler(&self) -> &GpuTaskScheduler {
        &self.scheduler
    }

    pub fn denoising_contexts(&self) -> &DenoisingContextSet {
        self.denoiser.contexts()
    }

    pub fn containers(&self) -> &FrameContainers<C::Api> {
        &self.containers
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Edit an instance's inclusion flags; it is updated on the next prepare.
    pub fn edit_instance_state(&mut self, key: InstanceKey, edit: impl FnOnce(&mut InstanceState)) -> bool {
        self.registry.edit_instance_state(key, edit)
    }

    /// Discard denoiser history on the next frame.
    pub fn request_denoiser_reset(&mut self) {
        self.pending.reset_denoisers = true;
    }

    /// Transfer direct lighting onto the light-transfer target on the next frame.
    pub fn request_light_transfer(&mut self) {
        self.pending.light_transfer = true;
    }

    /// Drop every geometry and instance handle at the start of the next prepare.
    pub fn request_geometry_cache_clear(&mut self) {
        self.pending.clear_geometry_cache = true;
    }

    fn clear_geometry_cache(&mut self) -> RtResult<()> {
        host_call("wait for idle", self.host.wait_idle())?;
        self.scheduler.retire_all(&mut self.ctx)?;
        self.containers.reset_all();
        self.registry.clear_all(&mut self.ctx)?;
        Ok(())
    }

    /// Register new meshes and instances and schedule transform updates into the
    /// pre-lighting container.
    pub fn prepare(&mut self, scene: &ExtractedScene) -> RtResult<SyncStats> {
        if std::mem::take(&mut self.pending.clear_geometry_cache) {
            self.clear_geometry_cache()?;
        }
        let skinned = Registry::skinned_meshes(scene);
        let registered = self.registry.sync_scene(&mut self.ctx, scene, &skinned, &mut self.containers.pre_lighting)?;
        let updated = self.registry.sync_transforms(&scene.instances, &mut self.containers.pre_lighting)?;
        Ok(SyncStats {
            geometries_registered: registered.geometries_registered,
            instances_registered: registered.instances_registered,
            geometries_updated: updated.geometries_updated,
            instances_updated: updated.instances_updated,
        })
    }

    /// Retire finished tasks, schedule this frame's work and record every non-empty
    /// container through `lanes`, pre-lighting first.
    pub fn render_frame(
        &mut self,
        frame: &FrameInputs,
        lanes: &mut dyn CommandLanes<C::Api>,
    ) -> RtResult<FrameReport> {
        let mut report = FrameReport {
            retired: self.scheduler.retire(&mut self.ctx, frame.frame_index)?.len(),
            ..Default::default()
        };

        self.containers.pre_lighting.schedule_bvh_task(tasks::BvhTask::Build)?;

        let desired = DesiredDenoising::from_config(&self.config, &frame.outputs);
        let change = self.denoiser.ensure_contexts(&mut self.ctx, &desired)?;
        report.contexts_created = change.created;
        report.contexts_destroyed = change.destroyed;

        let light_transfer = if self.pending.light_transfer {
            let target = self.registry.light_transfer_target();
            if target.is_none() {
                log::warn!("light transfer requested but no instance is a transfer target");
            }
            target
        } else {
            None
        };
        let requests = FrameRequests { reset_denoisers: self.pending.reset_denoisers, light_transfer };
        FrameTaskBuilder::<C::Api>::new(&self.config, frame, self.denoiser.contexts(), requests)
            .schedule(&mut self.containers)?;

        for phase in Phase::ALL {
            let container = self.containers.get_mut(phase);
            if container.is_empty() {
                continue;
            }
            let command_list = lanes.begin(phase)?;
            self.scheduler.submit(&mut self.ctx, container, &command_list, frame.frame_index, self.host.as_ref())?;
            lanes.finish(phase)?;
            report.submitted += 1;
        }
        log::trace!("frame {}: {report:?}", frame.frame_index);

        self.pending.reset_denoisers = false;
        self.pending.light_transfer = false;
        self.frames_rendered += 1;
        self.log_allocations()?;
        Ok(report)
    }

    fn log_allocations(&self) -> RtResult<()> {
        let Some(interval) = self.config.allocation_log_interval.filter(|n| *n > 0) else {
            return Ok(());
        };
        if self.frames_rendered % interval as u64 != 0 {
            return Ok(());
        }
        let allocations = sdk_call("GetCurrentResourceAllocations", self.ctx.current_resource_allocations())?;
        log::info!(
            "frame {}: {} ray-tracing resources, {:.2} MiB",
            self.frames_rendered,
            allocations.resource_count,
            allocations.total_bytes as f64 / (1024.0 * 1024.0)
        );
        Ok(())
    }

    /// Scene teardown: wait for the device, retire everything in flight, then destroy
    /// instances, geometries and denoising contexts and release backend memory.
    pub fn scene_unloading(&mut self) -> RtResult<()> {
        host_call("wait for idle", self.host.wait_idle())?;
        let retired = self.scheduler.retire_all(&mut self.ctx)?;
        self.containers.reset_all();
        self.registry.unload(&mut self.ctx)?;
        self.denoiser.destroy_all(&mut self.ctx)?;
        sdk_call("ReleaseDeviceResourcesImmediately", self.ctx.release_device_resources_immediately())?;
        self.pending = PendingRequests::default();
        log::info!("scene unloaded ({retired} GPU tasks force-retired)");
        Ok(())
    }

    /// Write the backend's loaded shader ids to `path`. Returns false when there was nothing
    /// to write.
    pub fn export_shader_list(&self, path: &Path) -> RtResult<bool> {
        let ids = sdk_call("GetLoadedShaderList", self.ctx.loaded_shader_list())?;
        shader_list::write_shader_list(path, &ids)
    }
}
