//! Task descriptors scheduled into task containers. Texture bindings are native views
//! produced by the adapter of the API `A`.

use glam::{Mat4, Vec3};
use render_api::NativeHandle;

use crate::config::{DebugDisplay, RayOffset, TilingParams};
use crate::math::Float3x4;
use crate::native::NativeApi;
use crate::registry::InclusionMask;
use crate::sdk::{DenoisingContextHandle, GeometryHandle, InstanceHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskOperation {
    Register,
    Update,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferFormat {
    R32Uint,
    R32G32B32Float,
}

/// Range of a host buffer read by BVH builds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BufferView {
    pub buffer: NativeHandle,
    pub format: BufferFormat,
    pub byte_offset: u64,
    pub count: u32,
    pub stride: u32,
}

impl BufferView {
    pub fn byte_size(&self) -> u64 {
        self.count as u64 * self.stride as u64
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeometryComponent {
    pub index_buffer: BufferView,
    pub vertex_buffer: BufferView,
    pub use_transform: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeometryInput {
    pub components: Vec<GeometryComponent>,
    /// Geometry can be refitted in place (skinned meshes).
    pub allow_update: bool,
    pub allow_light_transfer_target: bool,
    pub surfel_type: u32,
    pub tiling: TilingParams,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InstanceInput {
    pub geometry: GeometryHandle,
    pub transform: Float3x4,
    pub inclusion_mask: InclusionMask,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BvhTask {
    Geometry {
        operation: TaskOperation,
        handle: GeometryHandle,
        input: GeometryInput,
    },
    Instance {
        operation: TaskOperation,
        handle: InstanceHandle,
        input: InstanceInput,
    },
    /// Build/refit every pending BLAS and rebuild the TLAS.
    Build,
}

impl BvhTask {
    /// Recording rank when geometry tasks go first: geometry, instance, build.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            BvhTask::Geometry { .. } => 0,
            BvhTask::Instance { .. } => 1,
            BvhTask::Build => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HalfResolutionMode {
    #[default]
    Off,
    Checkerboard,
    CheckerboardInverted,
}

impl HalfResolutionMode {
    /// Checkerboard pattern for a frame; alternates with frame parity.
    pub fn checkerboard(frame_index: u64) -> Self {
        if frame_index % 2 == 0 {
            HalfResolutionMode::Checkerboard
        } else {
            HalfResolutionMode::CheckerboardInverted
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub top_left_x: u32,
    pub top_left_y: u32,
    pub width: u32,
    pub height: u32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn full(size: (u32, u32)) -> Self {
        Self { top_left_x: 0, top_left_y: 0, width: size.0, height: size.1, min_depth: 0.0, max_depth: 1.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthType {
    /// World position in RGB.
    RgbWorldSpace,
    /// Hardware depth in R.
    RClipSpace,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DepthInput<A: NativeApi> {
    pub tex: A::TextureView,
    pub kind: DepthType,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RoughnessInput<A: NativeApi> {
    Global(f32),
    /// Roughness read from the channel selected by the mask.
    Texture { tex: A::TextureView, mask: [f32; 4] },
}

#[derive(Clone, Debug, PartialEq)]
pub enum SpecularInput<A: NativeApi> {
    GlobalMetalness(f32),
    Texture(A::TextureView),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraceTaskCommon<A: NativeApi> {
    pub half_resolution_mode: HalfResolutionMode,
    pub use_inline_rt: bool,
    pub enable_bilinear_sampling: bool,
    pub direct_lighting: Option<A::TextureView>,
    pub depth: DepthInput<A>,
    /// Normal in RGB.
    pub normal: A::TextureView,
    pub roughness: RoughnessInput<A>,
    pub specular: SpecularInput<A>,
    pub viewport: Viewport,
    pub clip_to_view: Mat4,
    pub view_to_world: Mat4,
    pub world_to_view: Mat4,
    pub view_to_clip: Mat4,
    pub max_ray_length: f32,
    pub ray_offset: RayOffset,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DenoisingMode {
    #[default]
    Continue,
    DiscardHistory,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MotionInput<A: NativeApi> {
    /// View-space motion in RG.
    pub tex: A::TextureView,
    pub scale: [f32; 2],
}

#[derive(Clone, Debug, PartialEq)]
pub struct DenoisingTaskCommon<A: NativeApi> {
    pub mode: DenoisingMode,
    pub half_resolution_mode: HalfResolutionMode,
    pub viewport: Viewport,
    pub depth: DepthInput<A>,
    pub normal: A::TextureView,
    pub roughness: RoughnessInput<A>,
    pub motion: MotionInput<A>,
    pub clip_to_view: Mat4,
    pub view_to_clip: Mat4,
    pub view_to_clip_prev: Mat4,
    pub world_to_view: Mat4,
    pub world_to_view_prev: Mat4,
    pub camera_jitter: [f32; 2],
}

/// Light as the shadow tracer takes it. Angles in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightInfo {
    Directional {
        direction: Vec3,
        angular_extent: f32,
        intensity: f32,
    },
    Spot {
        position: Vec3,
        direction: Vec3,
        radius: f32,
        intensity: f32,
        apex_angle: f32,
        range: f32,
    },
    Point {
        position: Vec3,
        intensity: f32,
        radius: f32,
        range: f32,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DiffuseBrdf {
    Lambertian,
    #[default]
    NormalizedDisney,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DirectLightingInjectionTask<A: NativeApi> {
    pub use_inline_rt: bool,
    pub injection_resolution_stride: u32,
    pub depth: DepthInput<A>,
    pub direct_lighting: A::TextureView,
    pub viewport: Viewport,
    pub clip_to_view: Mat4,
    pub view_to_world: Mat4,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DirectLightTransferTask {
    pub use_inline_rt: bool,
    pub target: InstanceHandle,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraceSpecularTask<A: NativeApi> {
    pub common: TraceTaskCommon<A>,
    pub debug_output: DebugDisplay,
    pub out: A::TextureView,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraceDiffuseTask<A: NativeApi> {
    pub common: TraceTaskCommon<A>,
    pub diffuse_brdf: DiffuseBrdf,
    pub out: A::TextureView,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraceAmbientOcclusionTask<A: NativeApi> {
    pub common: TraceTaskCommon<A>,
    pub out: A::TextureView,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraceShadowTask<A: NativeApi> {
    pub common: TraceTaskCommon<A>,
    pub enable_first_hit_and_end_search: bool,
    pub light: LightInfo,
    pub out: A::TextureView,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraceMultiShadowTask<A: NativeApi> {
    pub common: TraceTaskCommon<A>,
    pub enable_first_hit_and_end_search: bool,
    pub lights: Vec<LightInfo>,
    pub out0: A::TextureView,
    pub out1: A::TextureView,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DenoiseSpecularTask<A: NativeApi> {
    pub common: DenoisingTaskCommon<A>,
    pub context: DenoisingContextHandle,
    pub in_specular: A::TextureView,
    pub in_out_specular: A::TextureView,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DenoiseDiffuseTask<A: NativeApi> {
    pub common: DenoisingTaskCommon<A>,
    pub context: DenoisingContextHandle,
    pub in_diffuse: A::TextureView,
    pub in_out_diffuse: A::TextureView,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DenoiseSpecularAndDiffuseTask<A: NativeApi> {
    pub common: DenoisingTaskCommon<A>,
    pub context: DenoisingContextHandle,
    pub in_specular: A::TextureView,
    pub in_out_specular: A::TextureView,
    pub in_diffuse: A::TextureView,
    pub in_out_diffuse: A::TextureView,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DenoiseDiffuseOcclusionTask<A: NativeApi> {
    pub common: DenoisingTaskCommon<A>,
    pub context: DenoisingContextHandle,
    pub in_hit_t: A::TextureView,
    pub in_out_occlusion: A::TextureView,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DenoiseShadowTask<A: NativeApi> {
    pub common: DenoisingTaskCommon<A>,
    pub context: DenoisingContextHandle,
    pub in_shadow: A::TextureView,
    pub in_out_shadow: A::TextureView,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DenoiseMultiShadowTask<A: NativeApi> {
    pub common: DenoisingTaskCommon<A>,
    pub context: DenoisingContextHandle,
    pub in_shadow0: A::TextureView,
    pub in_shadow1: A::TextureView,
    pub in_out_shadow: A::TextureView,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RenderTask<A: NativeApi> {
    DirectLightingInjection(DirectLightingInjectionTask<A>),
    DirectLightTransfer(DirectLightTransferTask),
    TraceSpecular(TraceSpecularTask<A>),
    TraceDiffuse(TraceDiffuseTask<A>),
    TraceAmbientOcclusion(TraceAmbientOcclusionTask<A>),
    TraceShadow(TraceShadowTask<A>),
    TraceMultiShadow(TraceMultiShadowTask<A>),
    DenoiseSpecular(DenoiseSpecularTask<A>),
    DenoiseDiffuse(DenoiseDiffuseTask<A>),
    DenoiseSpecularAndDiffuse(DenoiseSpecularAndDiffuseTask<A>),
    DenoiseDiffuseOcclusion(DenoiseDiffuseOcclusionTask<A>),
    DenoiseShadow(DenoiseShadowTask<A>),
    DenoiseMultiShadow(DenoiseMultiShadowTask<A>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RenderTaskKind {
    DirectLightingInjection,
    DirectLightTransfer,
    TraceSpecular,
    TraceDiffuse,
    TraceAmbientOcclusion,
    TraceShadow,
    TraceMultiShadow,
    DenoiseSpecular,
    DenoiseDiffuse,
    DenoiseSpecularAndDiffuse,
    DenoiseDiffuseOcclusion,
    DenoiseShadow,
    DenoiseMultiShadow,
}

impl<A: NativeApi> RenderTask<A> {
    pub fn kind(&self) -> RenderTaskKind {
        match self {
            RenderTask::DirectLightingInjection(_) => RenderTaskKind::DirectLightingInjection,
            RenderTask::DirectLightTransfer(_) => RenderTaskKind::DirectLightTransfer,
            RenderTask::TraceSpecular(_) => RenderTaskKind::TraceSpecular,
            RenderTask::TraceDiffuse(_) => RenderTaskKind::TraceDiffuse,
            RenderTask::TraceAmbientOcclusion(_) => RenderTaskKind::TraceAmbientOcclusion,
            RenderTask::TraceShadow(_) => RenderTaskKind::TraceShadow,
            RenderTask::TraceMultiShadow(_) => RenderTaskKind::TraceMultiShadow,
            RenderTask::DenoiseSpecular(_) => RenderTaskKind::DenoiseSpecular,
            RenderTask::DenoiseDiffuse(_) => RenderTaskKind::DenoiseDiffuse,
            RenderTask::DenoiseSpecularAndDiffuse(_) => RenderTaskKind::DenoiseSpecularAndDiffuse,
            RenderTask::DenoiseDiffuseOcclusion(_) => RenderTaskKind::DenoiseDiffuseOcclusion,
            RenderTask::DenoiseShadow(_) => RenderTaskKind::DenoiseShadow,
            RenderTask::DenoiseMultiShadow(_) => RenderTaskKind::DenoiseMultiShadow,
        }
    }

    /// Half-resolution mode of trace and denoise tasks.
    pub fn half_resolution_mode(&self) -> Option<HalfResolutionMode> {
        match self {
            RenderTask::TraceSpecular(t) => Some(t.common.half_resolution_mode),
            RenderTask::TraceDiffuse(t) => Some(t.common.half_resolution_mode),
            RenderTask::TraceAmbientOcclusion(t) => Some(t.common.half_resolution_mode),
            RenderTask::TraceShadow(t) => Some(t.common.half_resolution_mode),
            RenderTask::TraceMultiShadow(t) => Some(t.common.half_resolution_mode),
            RenderTask::DenoiseSpecular(t) => Some(t.common.half_resolution_mode),
            RenderTask::DenoiseDiffuse(t) => Some(t.common.half_resolution_mode),
            RenderTask::DenoiseSpecularAndDiffuse(t) => Some(t.common.half_resolution_mode),
            RenderTask::DenoiseDiffuseOcclusion(t) => Some(t.common.half_resolution_mode),
            RenderTask::DenoiseShadow(t) => Some(t.common.half_resolution_mode),
            RenderTask::DenoiseMultiShadow(t) => Some(t.common.half_resolution_mode),
            RenderTask::DirectLightingInjection(_) | RenderTask::DirectLightTransfer(_) => None,
        }
    }

    pub fn denoising_context(&self) -> Option<DenoisingContextHandle> {
        match self {
            RenderTask::DenoiseSpecular(t) => Some(t.context),
            RenderTask::DenoiseDiffuse(t) => Some(t.context),
            RenderTask::DenoiseSpecularAndDiffuse(t) => Some(t.context),
            RenderTask::DenoiseDiffuseOcclusion(t) => Some(t.context),
            RenderTask::DenoiseShadow(t) => Some(t.context),
            RenderTask::DenoiseMultiShadow(t) => Some(t.context),
            _ => None,
        }
    }

    pub fn denoising_mode(&self) -> Option<DenoisingMode> {
        match self {
            RenderTask::DenoiseSpecular(t) => Some(t.common.mode),
            RenderTask::DenoiseDiffuse(t) => Some(t.common.mode),
            RenderTask::DenoiseSpecularAndDiffuse(t) => Some(t.common.mode),
            RenderTask::DenoiseDiffuseOcclusion(t) => Some(t.common.mode),
            RenderTask::DenoiseShadow(t) => Some(t.common.mode),
            RenderTask::DenoiseMultiShadow(t) => Some(t.common.mode),
            _ => None,
        }
    }

    pub fn uses_inline_rt(&self) -> bool {
        match self {
            RenderTask::DirectLightingInjection(t) => t.use_inline_rt,
            RenderTask::DirectLightTransfer(t) => t.use_inline_rt,
            RenderTask::TraceSpecular(t) => t.common.use_inline_rt,
            RenderTask::TraceDiffuse(t) => t.common.use_inline_rt,
            RenderTask::TraceAmbientOcclusion(t) => t.common.use_inline_rt,
            RenderTask::TraceShadow(t) => t.common.use_inline_rt,
            RenderTask::TraceMultiShadow(t) => t.common.use_inline_rt,
            _ => false,
        }
    }
}
