//! Raylite configuration: feature toggles, denoiser selection, ray offsets, scheduling limits.

use std::path::PathBuf;

use crate::error::{RtError, RtResult};

/// Shadow tracing mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShadowMode {
    #[default]
    Off,
    /// One light, traced into a single target.
    SingleLight,
    /// Up to `MAX_LIGHTS` lights, traced into two targets.
    MultiLight,
}

impl ShadowMode {
    pub fn is_enabled(self) -> bool {
        self != ShadowMode::Off
    }
}

/// Denoiser for reflection and GI signals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SignalDenoiser {
    Off,
    Reblur,
    #[default]
    Relax,
}

/// Denoiser for ambient occlusion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OcclusionDenoiser {
    Off,
    #[default]
    Reblur,
}

/// Denoiser for shadows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShadowDenoiser {
    Off,
    #[default]
    Sigma,
}

/// Diagnostic output replacing the reflection buffer. `Off` renders normally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DebugDisplay {
    #[default]
    Off,
    /// Raw backend debug output type (1..).
    Mode(u32),
}

impl DebugDisplay {
    pub fn is_active(self) -> bool {
        !matches!(self, DebugDisplay::Off | DebugDisplay::Mode(0))
    }
}

/// Bias applied to ray origins to avoid self-intersection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RayOffset {
    Off,
    WorldPosition {
        threshold: f32,
        float_scale: f32,
        int_scale: f32,
    },
    CameraDistance {
        constant: f32,
        linear: f32,
        quadratic: f32,
    },
}

impl RayOffset {
    pub fn world_position() -> Self {
        RayOffset::WorldPosition {
            threshold: 1.0 / 32.0,
            float_scale: 1.0 / 65536.0,
            int_scale: 8192.0,
        }
    }

    pub fn camera_distance() -> Self {
        RayOffset::CameraDistance {
            constant: 0.00174,
            linear: -0.0001547,
            quadratic: 0.0000996,
        }
    }
}

impl Default for RayOffset {
    fn default() -> Self {
        Self::world_position()
    }
}

/// How surfels are sampled when reading the lighting cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SurfelSampleMode {
    #[default]
    Point,
    Bilinear,
}

/// Lighting-cache tiling, passed with every geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TilingParams {
    pub tile_unit_length: f32,
    pub tile_resolution_limit: u32,
    pub force_direct_tile_mapping: bool,
}

impl Default for TilingParams {
    fn default() -> Self {
        Self {
            tile_unit_length: 40.0,
            tile_resolution_limit: 64,
            force_direct_tile_mapping: false,
        }
    }
}

/// Raylite renderer and bridge configuration.
#[derive(Clone, Debug)]
pub struct RayliteConfig {
    pub enable_reflection: bool,
    pub enable_gi: bool,
    pub enable_ao: bool,
    pub shadows: ShadowMode,
    pub enable_checkerboard: bool,
    pub denoising_method: SignalDenoiser,
    pub ao_denoising_method: OcclusionDenoiser,
    pub shadow_denoising_method: ShadowDenoiser,
    pub debug_display: DebugDisplay,
    /// Inject direct lighting after the lighting pass instead of in the main container.
    pub enable_late_light_injection: bool,
    pub light_injection_stride: u32,
    pub ray_offset: RayOffset,
    pub max_ray_length: f32,
    /// Use inline ray tracing (ray query). Forced off when the device lacks it.
    pub use_trace_ray_inline: bool,
    /// Surfel type handed to geometry registration.
    pub surfel_mode: u32,
    pub surfel_sample_mode: SurfelSampleMode,
    pub tiling: TilingParams,
    pub global_roughness: f32,
    pub use_global_roughness: bool,
    pub global_metalness: f32,
    pub use_global_metalness: bool,
    /// Reconstruct world position from depth instead of reading the world-position target.
    pub enable_world_pos_from_depth: bool,
    /// Sample the lit HDR buffer as direct lighting in trace tasks.
    pub enable_direct_lighting_sample: bool,
    pub shadows_first_hit_and_end_search: bool,
    pub enable_transparent_reflection: bool,
    pub max_render_ahead_frames: u32,
    pub task_containers_per_frame: u32,
    pub supported_working_sets: u32,
    pub upload_heap_size_per_working_set: u64,
    pub descriptor_heap_size: u32,
    /// Log backend resource allocations every N frames.
    pub allocation_log_interval: Option<u32>,
    pub cold_load_shader_list_path: PathBuf,
}

impl Default for RayliteConfig {
    fn default() -> Self {
        Self {
            enable_reflection: true,
            enable_gi: true,
            enable_ao: true,
            shadows: ShadowMode::Off,
            enable_checkerboard: true,
            denoising_method: SignalDenoiser::Relax,
            ao_denoising_method: OcclusionDenoiser::Reblur,
            shadow_denoising_method: ShadowDenoiser::Sigma,
            debug_display: DebugDisplay::Off,
            enable_late_light_injection: false,
            light_injection_stride: 8,
            ray_offset: RayOffset::default(),
            max_ray_length: 1000.0,
            use_trace_ray_inline: true,
            surfel_mode: 0,
            surfel_sample_mode: SurfelSampleMode::Point,
            tiling: TilingParams::default(),
            global_roughness: 0.3,
            use_global_roughness: false,
            global_metalness: 1.0,
            use_global_metalness: false,
            enable_world_pos_from_depth: false,
            enable_direct_lighting_sample: true,
            shadows_first_hit_and_end_search: false,
            enable_transparent_reflection: false,
            max_render_ahead_frames: 3,
            task_containers_per_frame: 3,
            supported_working_sets: 9,
            upload_heap_size_per_working_set: 8 * 64 * 1024,
            descriptor_heap_size: 8 * 8192,
            allocation_log_interval: None,
            cold_load_shader_list_path: PathBuf::from(crate::shader_list::COLD_LOAD_SHADER_LIST_FILE),
        }
    }
}

impl RayliteConfig {
    /// Upper bound of GPU tasks in flight at once.
    pub fn max_in_flight_tasks(&self) -> usize {
        self.max_render_ahead_frames as usize * self.task_containers_per_frame as usize
    }

    pub fn validate(&self) -> RtResult<()> {
        let fail = |msg: String| {
            log::error!("RayliteConfig: {msg}");
            Err(RtError::Config(msg))
        };
        if self.max_render_ahead_frames == 0 {
            return fail("max_render_ahead_frames must be > 0".into());
        }
        if self.task_containers_per_frame == 0 {
            return fail("task_containers_per_frame must be > 0".into());
        }
        if (self.supported_working_sets as usize) < self.max_in_flight_tasks() {
            return fail(format!(
                "supported_working_sets ({}) is smaller than render-ahead frames x containers ({})",
                self.supported_working_sets,
                self.max_in_flight_tasks()
            ));
        }
        if !(self.max_ray_length > 0.0) {
            return fail(format!("max_ray_length must be positive, got {}", self.max_ray_length));
        }
        if self.light_injection_stride == 0 {
            return fail("light_injection_stride must be > 0".into());
        }
        Ok(())
    }
}
