//! Geometry/instance registry: host mesh and instance keys to SDK acceleration-structure
//! handles, plus the per-instance state the host can edit between frames.
//!
//! Register tasks are scheduled once per key (insert-if-absent); update tasks follow dirty
//! transforms, edited states, and skinned meshes. Handles are owned here until
//! [`Registry::clear_all`] or [`Registry::unload`].

use std::collections::{BTreeMap, BTreeSet};

use render_api::{ExtractedInstance, ExtractedMesh, ExtractedScene, InstanceKey, MeshKey};

use crate::config::{RayliteConfig, SurfelSampleMode, TilingParams};
use crate::container::TaskContainer;
use crate::error::{sdk_call, RtError, RtResult};
use crate::math::{instance_transform, Float3x4};
use crate::sdk::{ExecuteContext, GeometryHandle, InstanceHandle};
use crate::tasks::{BufferFormat, BufferView, BvhTask, GeometryComponent, GeometryInput, InstanceInput, TaskOperation};

const INDEX_STRIDE: u32 = 4;
const POSITION_STRIDE: u32 = 12;

bitflags::bitflags! {
    /// Which ray-traced lighting passes see an instance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InclusionMask: u32 {
        const DIRECT_LIGHT_INJECTION_TARGET = 1 << 0;
        const LIGHT_TRANSFER_SOURCE = 1 << 1;
        const VISIBLE_IN_RT = 1 << 2;
    }
}

/// Host-editable flags of one instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstanceState {
    pub direct_light_injection_target: bool,
    pub light_transfer_source: bool,
    /// Receives light on the next light-transfer request.
    pub light_transfer_target: bool,
    pub visible_in_rt: bool,
    /// Forces an instance update on the next transform sync.
    pub is_dirty: bool,
}

impl Default for InstanceState {
    fn default() -> Self {
        Self {
            direct_light_injection_target: true,
            light_transfer_source: false,
            light_transfer_target: false,
            visible_in_rt: true,
            is_dirty: false,
        }
    }
}

impl InstanceState {
    pub fn inclusion_mask(&self) -> InclusionMask {
        let mut mask = InclusionMask::empty();
        mask.set(InclusionMask::DIRECT_LIGHT_INJECTION_TARGET, self.direct_light_injection_target);
        mask.set(InclusionMask::LIGHT_TRANSFER_SOURCE, self.light_transfer_source);
        mask.set(InclusionMask::VISIBLE_IN_RT, self.visible_in_rt);
        mask
    }
}

#[derive(Clone, Debug)]
pub struct GeometryRecord {
    pub mesh: MeshKey,
    pub handle: GeometryHandle,
    pub input: GeometryInput,
    pub surfel_sample_mode: SurfelSampleMode,
}

#[derive(Clone, Debug)]
pub struct InstanceRecord {
    pub key: InstanceKey,
    pub mesh: MeshKey,
    pub geometry: GeometryHandle,
    pub handle: InstanceHandle,
    pub transform: Float3x4,
    pub inclusion_mask: InclusionMask,
    /// Registered this frame with a fresh transform; no update needed yet.
    fresh: bool,
}

/// Tasks scheduled by one sync call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub geometries_registered: usize,
    pub instances_registered: usize,
    pub geometries_updated: usize,
    pub instances_updated: usize,
}

#[derive(Debug)]
pub struct Registry {
    geometries: BTreeMap<MeshKey, GeometryRecord>,
    /// Meshes with nothing to ray trace; their instances are skipped.
    excluded: BTreeSet<MeshKey>,
    instances: BTreeMap<InstanceKey, InstanceRecord>,
    states: BTreeMap<InstanceKey, InstanceState>,
    surfel_type: u32,
    surfel_sample_mode: SurfelSampleMode,
    tiling: TilingParams,
}

impl Registry {
    pub fn new(config: &RayliteConfig) -> Self {
        Self {
            geometries: BTreeMap::new(),
            excluded: BTreeSet::new(),
            instances: BTreeMap::new(),
            states: BTreeMap::new(),
            surfel_type: config.surfel_mode,
            surfel_sample_mode: config.surfel_sample_mode,
            tiling: config.tiling,
        }
    }

    pub fn geometry(&self, mesh: MeshKey) -> Option<&GeometryRecord> {
        self.geometries.get(&mesh)
    }

    pub fn instance(&self, key: InstanceKey) -> Option<&InstanceRecord> {
        self.instances.get(&key)
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn instance_state(&self, key: InstanceKey) -> Option<&InstanceState> {
        self.states.get(&key)
    }

    /// Edit the flags of a known instance and mark it dirty. Returns false for unknown keys.
    pub fn edit_instance_state(&mut self, key: InstanceKey, edit: impl FnOnce(&mut InstanceState)) -> bool {
        match self.states.get_mut(&key) {
            Some(state) => {
                edit(state);
                state.is_dirty = true;
                true
            }
            None => false,
        }
    }

    /// First registered instance marked as light-transfer target.
    pub fn light_transfer_target(&self) -> Option<(InstanceKey, InstanceHandle)> {
        self.instances
            .values()
            .find(|r| self.states.get(&r.key).is_some_and(|s| s.light_transfer_target))
            .map(|r| (r.key, r.handle))
    }

    /// Meshes referenced by skinned instances.
    pub fn skinned_meshes(scene: &ExtractedScene) -> BTreeSet<MeshKey> {
        scene.instances.iter().filter(|i| i.skinned).map(|i| i.mesh).collect()
    }

    fn geometry_input(&self, mesh: &ExtractedMesh, allow_update: bool) -> GeometryInput {
        let components = mesh
            .geometries
            .iter()
            .filter(|g| g.material_domain.is_ray_traced())
            .map(|g| GeometryComponent {
                index_buffer: BufferView {
                    buffer: mesh.index_buffer,
                    format: BufferFormat::R32Uint,
                    byte_offset: (mesh.index_offset as u64 + g.index_offset as u64) * INDEX_STRIDE as u64,
                    count: g.num_indices,
                    stride: INDEX_STRIDE,
                },
                vertex_buffer: BufferView {
                    buffer: mesh.vertex_buffer,
                    format: BufferFormat::R32G32B32Float,
                    byte_offset: (mesh.vertex_offset as u64 + g.vertex_offset as u64) * POSITION_STRIDE as u64
                        + mesh.position_byte_offset,
                    count: g.num_vertices,
                    stride: POSITION_STRIDE,
                },
                use_transform: false,
            })
            .collect();
        GeometryInput {
            components,
            allow_update,
            allow_light_transfer_target: true,
            surfel_type: self.surfel_type,
            tiling: self.tiling,
        }
    }

    /// Register meshes and instances seen for the first time. Meshes go first; an instance
    /// whose mesh was never seen is an error.
    pub fn sync_scene<C: ExecuteContext>(
        &mut self,
        ctx: &mut C,
        scene: &ExtractedScene,
        skinned: &BTreeSet<MeshKey>,
        container: &mut TaskContainer<C::Api>,
    ) -> RtResult<SyncStats> {
        let mut stats = SyncStats::default();

        for mesh in &scene.meshes {
            if let Some(record) = self.geometries.get_mut(&mesh.key) {
                // A static mesh that gains a skinned instance is registered again as updatable.
                if skinned.contains(&mesh.key) && !record.input.allow_update {
                    record.input.allow_update = true;
                    container.schedule_bvh_task(BvhTask::Geometry {
                        operation: TaskOperation::Register,
                        handle: record.handle,
                        input: record.input.clone(),
                    })?;
                    log::debug!("mesh {:?} re-registered for skinning", mesh.key);
                    stats.geometries_registered += 1;
                }
                continue;
            }
            if self.excluded.contains(&mesh.key) {
                continue;
            }
            let input = self.geometry_input(mesh, skinned.contains(&mesh.key));
            if input.components.is_empty() {
                log::debug!("mesh {:?} has no opaque geometry, not ray traced", mesh.key);
                self.excluded.insert(mesh.key);
                continue;
            }
            let handle = sdk_call("CreateGeometryHandle", ctx.create_geometry_handle())?;
            container.schedule_bvh_task(BvhTask::Geometry {
                operation: TaskOperation::Register,
                handle,
                input: input.clone(),
            })?;
            self.geometries.insert(
                mesh.key,
                GeometryRecord { mesh: mesh.key, handle, input, surfel_sample_mode: self.surfel_sample_mode },
            );
            stats.geometries_registered += 1;
        }

        for instance in &scene.instances {
            if self.instances.contains_key(&instance.key) || self.excluded.contains(&instance.mesh) {
                continue;
            }
            let Some(geometry) = self.geometries.get(&instance.mesh).map(|g| g.handle) else {
                log::error!("instance {:?} references unregistered mesh {:?}", instance.key, instance.mesh);
                return Err(RtError::MissingGeometry { instance: instance.key, mesh: instance.mesh });
            };
            let state = *self.states.entry(instance.key).or_default();
            let handle = sdk_call("CreateInstanceHandle", ctx.create_instance_handle())?;
            let record = InstanceRecord {
                key: instance.key,
                mesh: instance.mesh,
                geometry,
                handle,
                transform: instance_transform(&instance.transform),
                inclusion_mask: state.inclusion_mask(),
                fresh: true,
            };
            container.schedule_bvh_task(BvhTask::Instance {
                operation: TaskOperation::Register,
                handle,
                input: record.instance_input(),
            })?;
            self.instances.insert(instance.key, record);
            stats.instances_registered += 1;
        }

        if stats.geometries_registered + stats.instances_registered > 0 {
            log::debug!(
                "registered {} geometries, {} instances",
                stats.geometries_registered,
                stats.instances_registered
            );
        }
        Ok(stats)
    }

    /// Schedule updates for moved or edited instances, and refits for skinned geometry.
    pub fn sync_transforms<A: crate::native::NativeApi>(
        &mut self,
        instances: &[ExtractedInstance],
        container: &mut TaskContainer<A>,
    ) -> RtResult<SyncStats> {
        let mut stats = SyncStats::default();
        let mut refitted = BTreeSet::new();

        for instance in instances {
            let Some(record) = self.instances.get_mut(&instance.key) else {
                continue;
            };
            let state = self.states.entry(instance.key).or_default();
            if record.fresh {
                record.fresh = false;
                state.is_dirty = false;
                continue;
            }

            if instance.transform_dirty || state.is_dirty {
                state.is_dirty = false;
                record.transform = instance_transform(&instance.transform);
                record.inclusion_mask = state.inclusion_mask();
                container.schedule_bvh_task(BvhTask::Instance {
                    operation: TaskOperation::Update,
                    handle: record.handle,
                    input: record.instance_input(),
                })?;
                stats.instances_updated += 1;
            }

            if instance.skinned && refitted.insert(record.mesh) {
                if let Some(geometry) = self.geometries.get(&record.mesh) {
                    if !geometry.input.allow_update {
                        log::warn!("mesh {:?} is not updatable, refit skipped until the next scene sync", record.mesh);
                        continue;
                    }
                    container.schedule_bvh_task(BvhTask::Geometry {
                        operation: TaskOperation::Update,
                        handle: geometry.handle,
                        input: geometry.input.clone(),
                    })?;
                    stats.geometries_updated += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Destroy every instance handle, then every geometry handle. The GPU must be idle and
    /// no task may be in flight. Instance states survive.
    pub fn clear_all<C: ExecuteContext>(&mut self, ctx: &mut C) -> RtResult<()> {
        let instances: Vec<InstanceHandle> = self.instances.values().map(|r| r.handle).collect();
        if !instances.is_empty() {
            sdk_call("DestroyInstanceHandles", ctx.destroy_instance_handles(&instances))?;
        }
        let geometries: Vec<GeometryHandle> = self.geometries.values().map(|r| r.handle).collect();
        if !geometries.is_empty() {
            sdk_call("DestroyGeometryHandles", ctx.destroy_geometry_handles(&geometries))?;
        }
        log::info!("geometry cache cleared ({} instances, {} geometries)", instances.len(), geometries.len());
        self.instances.clear();
        self.geometries.clear();
        self.excluded.clear();
        Ok(())
    }

    /// Scene unload: destroy all handles on the backend and forget every state.
    pub fn unload<C: ExecuteContext>(&mut self, ctx: &mut C) -> RtResult<()> {
        sdk_call("DestroyAllInstanceHandles", ctx.destroy_all_instance_handles())?;
        sdk_call("DestroyAllGeometryHandles", ctx.destroy_all_geometry_handles())?;
        self.instances.clear();
        self.geometries.clear();
        self.excluded.clear();
        self.states.clear();
        Ok(())
    }
}

impl InstanceRecord {
    fn instance_input(&self) -> InstanceInput {
        InstanceInput { geometry: self.geometry, transform: self.transform, inclusion_mask: self.inclusion_mask }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Phase;
    use crate::native::d3d12::D3D12CommandList;
    use crate::native::{NativeApi, D3D12};
    use crate::sdk::{ExecuteContextSettings, HeadlessContext};
    use glam::{Affine3A, Vec3};
    use render_api::{ExtractedGeometry, MaterialDomain, NativeHandle};

    fn mesh(key: u64, domain: MaterialDomain) -> ExtractedMesh {
        ExtractedMesh {
            key: MeshKey(key),
            index_buffer: NativeHandle(0x10),
            vertex_buffer: NativeHandle(0x20),
            index_offset: 6,
            vertex_offset: 4,
            position_byte_offset: 0,
            geometries: vec![ExtractedGeometry {
                material_domain: domain,
                index_offset: 0,
                vertex_offset: 0,
                num_indices: 36,
                num_vertices: 24,
            }],
        }
    }

    fn instance(key: u64, mesh: u64) -> ExtractedInstance {
        ExtractedInstance {
            key: InstanceKey(key),
            mesh: MeshKey(mesh),
            transform: Affine3A::from_translation(Vec3::new(key as f32, 0.0, 0.0)),
            transform_dirty: false,
            skinned: false,
        }
    }

    fn setup() -> (HeadlessContext<D3D12>, Registry, TaskContainer<D3D12>) {
        let config = RayliteConfig::default();
        (
            HeadlessContext::new(ExecuteContextSettings::from_config(&config, Vec::new())),
            Registry::new(&config),
            TaskContainer::new(Phase::PreLighting),
        )
    }

    fn sync(
        ctx: &mut HeadlessContext<D3D12>,
        registry: &mut Registry,
        container: &mut TaskContainer<D3D12>,
        scene: &ExtractedScene,
    ) -> RtResult<SyncStats> {
        let skinned = Registry::skinned_meshes(scene);
        registry.sync_scene(ctx, scene, &skinned, container)
    }

    #[test]
    fn cold_start_registers_geometry_before_instances() {
        let (mut ctx, mut registry, mut container) = setup();
        let scene = ExtractedScene {
            meshes: vec![mesh(1, MaterialDomain::Opaque)],
            instances: vec![instance(10, 1), instance(11, 1)],
        };
        let stats = sync(&mut ctx, &mut registry, &mut container, &scene).unwrap();
        assert_eq!((stats.geometries_registered, stats.instances_registered), (1, 2));

        let recorded = container.recorded_bvh_tasks(true);
        assert_eq!(recorded.len(), 3);
        assert!(matches!(recorded[0], BvhTask::Geometry { operation: TaskOperation::Register, .. }));
        assert!(recorded[1..]
            .iter()
            .all(|t| matches!(t, BvhTask::Instance { operation: TaskOperation::Register, .. })));

        let input = D3D12::build_input(&D3D12CommandList(NativeHandle(1)), true);
        ctx.build_gpu_task(&container, &input).unwrap();
    }

    #[test]
    fn buffer_views_follow_mesh_offsets() {
        let (mut ctx, mut registry, mut container) = setup();
        let scene = ExtractedScene { meshes: vec![mesh(1, MaterialDomain::Opaque)], instances: Vec::new() };
        sync(&mut ctx, &mut registry, &mut container, &scene).unwrap();
        let component = &registry.geometry(MeshKey(1)).unwrap().input.components[0];
        assert_eq!(component.index_buffer.byte_offset, 6 * 4);
        assert_eq!(component.vertex_buffer.byte_offset, 4 * 12);
        assert_eq!(component.vertex_buffer.byte_size(), 24 * 12);
    }

    #[test]
    fn large_offsets_are_widened_before_adding() {
        let (mut ctx, mut registry, mut container) = setup();
        let mut large = mesh(1, MaterialDomain::Opaque);
        large.index_offset = u32::MAX;
        large.vertex_offset = u32::MAX;
        large.geometries[0].index_offset = 2;
        large.geometries[0].vertex_offset = 3;
        let scene = ExtractedScene { meshes: vec![large], instances: Vec::new() };
        sync(&mut ctx, &mut registry, &mut container, &scene).unwrap();
        let component = &registry.geometry(MeshKey(1)).unwrap().input.components[0];
        assert_eq!(component.index_buffer.byte_offset, (u32::MAX as u64 + 2) * 4);
        assert_eq!(component.vertex_buffer.byte_offset, (u32::MAX as u64 + 3) * 12);
    }

    #[test]
    fn static_mesh_becomes_updatable_when_skinned() {
        let (mut ctx, mut registry, mut container) = setup();
        let mut scene = ExtractedScene {
            meshes: vec![mesh(1, MaterialDomain::Opaque)],
            instances: vec![instance(10, 1)],
        };
        sync(&mut ctx, &mut registry, &mut container, &scene).unwrap();
        assert!(!registry.geometry(MeshKey(1)).unwrap().input.allow_update);
        let handle = registry.geometry(MeshKey(1)).unwrap().handle;
        container.reset();

        let mut skinned = instance(11, 1);
        skinned.skinned = true;
        scene.instances.push(skinned);
        let stats = sync(&mut ctx, &mut registry, &mut container, &scene).unwrap();
        assert_eq!((stats.geometries_registered, stats.instances_registered), (1, 1));
        assert!(registry.geometry(MeshKey(1)).unwrap().input.allow_update);
        assert!(matches!(
            container.recorded_bvh_tasks(true)[0],
            BvhTask::Geometry { operation: TaskOperation::Register, handle: h, input } if *h == handle && input.allow_update
        ));
        assert_eq!(ctx.counts().geometry_handles_created, 1);

        container.reset();
        let stats = sync(&mut ctx, &mut registry, &mut container, &scene).unwrap();
        assert_eq!(stats, SyncStats::default());
    }

    #[test]
    fn sync_scene_is_idempotent() {
        let (mut ctx, mut registry, mut container) = setup();
        let scene = ExtractedScene {
            meshes: vec![mesh(1, MaterialDomain::Opaque)],
            instances: vec![instance(10, 1)],
        };
        sync(&mut ctx, &mut registry, &mut container, &scene).unwrap();
        container.reset();
        let stats = sync(&mut ctx, &mut registry, &mut container, &scene).unwrap();
        assert_eq!(stats, SyncStats::default());
        assert!(container.is_empty());
    }

    #[test]
    fn instance_without_geometry_is_an_error() {
        let (mut ctx, mut registry, mut container) = setup();
        let scene = ExtractedScene { meshes: Vec::new(), instances: vec![instance(10, 7)] };
        let err = sync(&mut ctx, &mut registry, &mut container, &scene).unwrap_err();
        assert!(matches!(err, RtError::MissingGeometry { mesh: MeshKey(7), .. }));
    }

    #[test]
    fn transparent_meshes_are_skipped() {
        let (mut ctx, mut registry, mut container) = setup();
        let scene = ExtractedScene {
            meshes: vec![mesh(1, MaterialDomain::AlphaBlended)],
            instances: vec![instance(10, 1)],
        };
        let stats = sync(&mut ctx, &mut registry, &mut container, &scene).unwrap();
        assert_eq!(stats, SyncStats::default());
        assert_eq!(ctx.live_geometries(), 0);
    }

    #[test]
    fn dirty_states_converge() {
        let (mut ctx, mut registry, mut container) = setup();
        let scene = ExtractedScene {
            meshes: vec![mesh(1, MaterialDomain::Opaque)],
            instances: vec![instance(10, 1), instance(11, 1), instance(12, 1)],
        };
        sync(&mut ctx, &mut registry, &mut container, &scene).unwrap();
        registry.sync_transforms(&scene.instances, &mut container).unwrap();
        container.reset();

        assert!(registry.edit_instance_state(InstanceKey(10), |s| s.visible_in_rt = false));
        assert!(registry.edit_instance_state(InstanceKey(12), |s| s.light_transfer_source = true));
        let stats = registry.sync_transforms(&scene.instances, &mut container).unwrap();
        assert_eq!(stats.instances_updated, 2);
        assert!(scene.instances.iter().all(|i| !registry.instance_state(i.key).unwrap().is_dirty));
        assert_eq!(
            registry.instance(InstanceKey(10)).unwrap().inclusion_mask,
            InclusionMask::DIRECT_LIGHT_INJECTION_TARGET
        );

        container.reset();
        let stats = registry.sync_transforms(&scene.instances, &mut container).unwrap();
        assert_eq!(stats.instances_updated, 0);
    }

    #[test]
    fn skinned_instance_updates_geometry_and_instance() {
        let (mut ctx, mut registry, mut container) = setup();
        let mut skinned = instance(10, 1);
        skinned.skinned = true;
        let mut scene = ExtractedScene { meshes: vec![mesh(1, MaterialDomain::Opaque)], instances: vec![skinned] };
        sync(&mut ctx, &mut registry, &mut container, &scene).unwrap();
        assert!(registry.geometry(MeshKey(1)).unwrap().input.allow_update);
        registry.sync_transforms(&scene.instances, &mut container).unwrap();
        container.reset();

        scene.instances[0].transform_dirty = true;
        let stats = registry.sync_transforms(&scene.instances, &mut container).unwrap();
        assert_eq!((stats.geometries_updated, stats.instances_updated), (1, 1));
        let ops: Vec<_> = container
            .bvh_tasks()
            .iter()
            .map(|t| match t {
                BvhTask::Geometry { operation, .. } => ("geometry", *operation),
                BvhTask::Instance { operation, .. } => ("instance", *operation),
                BvhTask::Build => ("build", TaskOperation::Update),
            })
            .collect();
        assert!(ops.contains(&("geometry", TaskOperation::Update)));
        assert!(ops.contains(&("instance", TaskOperation::Update)));
    }

    #[test]
    fn clear_keeps_states_and_unload_drops_them() {
        let (mut ctx, mut registry, mut container) = setup();
        let scene = ExtractedScene {
            meshes: vec![mesh(1, MaterialDomain::Opaque)],
            instances: vec![instance(10, 1)],
        };
        sync(&mut ctx, &mut registry, &mut container, &scene).unwrap();
        let input = D3D12::build_input(&D3D12CommandList(NativeHandle(1)), true);
        let task = ctx.build_gpu_task(&container, &input).unwrap();
        ctx.mark_gpu_task_as_completed(task).unwrap();
        registry.edit_instance_state(InstanceKey(10), |s| s.light_transfer_target = true);
        assert!(registry.light_transfer_target().is_some());

        registry.clear_all(&mut ctx).unwrap();
        assert_eq!((ctx.live_instances(), ctx.live_geometries()), (0, 0));
        assert!(registry.instance_state(InstanceKey(10)).unwrap().light_transfer_target);
        assert!(registry.light_transfer_target().is_none());

        container.reset();
        sync(&mut ctx, &mut registry, &mut container, &scene).unwrap();
        registry.unload(&mut ctx).unwrap();
        assert!(registry.instance_state(InstanceKey(10)).is_none());
        assert_eq!(ctx.counts().geometry_handles_destroyed, 2);
    }
}
