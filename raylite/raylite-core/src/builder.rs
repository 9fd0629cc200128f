//! Per-frame render task scheduling.
//!
//! Pre-lighting gets ambient occlusion and shadows (they do not read direct lighting),
//! main gets reflections, GI, light injection and transfer, post-lighting gets late light
//! injection. A debug display replaces the whole set with one diagnostic trace.

use std::marker::PhantomData;

use render_api::{FrameInputs, GpuTexture, InstanceKey};

use crate::config::{DebugDisplay, OcclusionDenoiser, RayliteConfig, ShadowDenoiser, ShadowMode, SignalDenoiser, SurfelSampleMode};
use crate::container::FrameContainers;
use crate::denoise::DenoisingContextSet;
use crate::error::{RtError, RtResult};
use crate::lights::{light_infos, MAX_LIGHTS};
use crate::native::NativeApi;
use crate::sdk::{DenoisingContextHandle, InstanceHandle};
use crate::tasks::*;

/// Feature switches of one frame, derived from the configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameFeatures {
    pub reflection: bool,
    pub gi: bool,
    pub ao: bool,
    pub shadows: ShadowMode,
    pub reflection_denoising: bool,
    pub ao_denoising: bool,
    pub shadow_denoising: bool,
    /// Checkerboard allowed this frame; each signal also needs its denoiser.
    pub checkerboard: bool,
    pub debug_display: DebugDisplay,
}

impl FrameFeatures {
    pub fn resolve(config: &RayliteConfig) -> Self {
        Self {
            reflection: config.enable_reflection,
            gi: config.enable_gi,
            ao: config.enable_ao,
            shadows: config.shadows,
            reflection_denoising: config.denoising_method != SignalDenoiser::Off
                && (config.enable_reflection || config.enable_gi),
            ao_denoising: config.ao_denoising_method != OcclusionDenoiser::Off && config.enable_ao,
            shadow_denoising: config.shadow_denoising_method != ShadowDenoiser::Off && config.shadows.is_enabled(),
            checkerboard: config.enable_checkerboard && !config.debug_display.is_active(),
            debug_display: config.debug_display,
        }
    }

    pub fn debug_active(&self) -> bool {
        self.debug_display.is_active()
    }
}

/// One-shot requests a frame consumes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameRequests {
    /// Discard denoiser history this frame.
    pub reset_denoisers: bool,
    /// Instance receiving a direct-light transfer this frame.
    pub light_transfer: Option<(InstanceKey, InstanceHandle)>,
}

pub struct FrameTaskBuilder<'a, A: NativeApi> {
    config: &'a RayliteConfig,
    features: FrameFeatures,
    frame: &'a FrameInputs,
    contexts: &'a DenoisingContextSet,
    requests: FrameRequests,
    _api: PhantomData<A>,
}

fn required(context: Option<DenoisingContextHandle>, what: &'static str) -> RtResult<DenoisingContextHandle> {
    context.ok_or_else(|| {
        log::error!("{what} denoiser enabled without a context");
        RtError::MissingDenoisingContext(what)
    })
}

impl<'a, A: NativeApi> FrameTaskBuilder<'a, A> {
    pub fn new(
        config: &'a RayliteConfig,
        frame: &'a FrameInputs,
        contexts: &'a DenoisingContextSet,
        requests: FrameRequests,
    ) -> Self {
        Self { config, features: FrameFeatures::resolve(config), frame, contexts, requests, _api: PhantomData }
    }

    pub fn features(&self) -> &FrameFeatures {
        &self.features
    }

    fn checkerboard_if(&self, enabled: bool) -> HalfResolutionMode {
        if self.features.checkerboard && enabled {
            HalfResolutionMode::checkerboard(self.frame.frame_index)
        } else {
            HalfResolutionMode::Off
        }
    }

    fn viewport(&self) -> Viewport {
        Viewport::full(self.frame.view.viewport_size)
    }

    fn depth(&self) -> RtResult<DepthInput<A>> {
        let gbuffer = &self.frame.gbuffer;
        Ok(if self.config.enable_world_pos_from_depth {
            DepthInput { tex: A::shader_resource(&gbuffer.depth)?, kind: DepthType::RClipSpace }
        } else {
            DepthInput { tex: A::shader_resource(&gbuffer.world_position)?, kind: DepthType::RgbWorldSpace }
        })
    }

    fn roughness(&self) -> RtResult<RoughnessInput<A>> {
        Ok(if self.config.use_global_roughness {
            RoughnessInput::Global(self.config.global_roughness)
        } else {
            // Alpha of the normal target holds roughness.
            RoughnessInput::Texture { tex: A::shader_resource(&self.frame.gbuffer.normals)?, mask: [0.0, 0.0, 0.0, 1.0] }
        })
    }

    fn trace_common(&self, half_resolution_mode: HalfResolutionMode) -> RtResult<TraceTaskCommon<A>> {
        let view = &self.frame.view;
        let gbuffer = &self.frame.gbuffer;
        Ok(TraceTaskCommon {
            half_resolution_mode,
            use_inline_rt: self.config.use_trace_ray_inline,
            enable_bilinear_sampling: self.config.surfel_sample_mode == SurfelSampleMode::Bilinear,
            direct_lighting: self
                .config
                .enable_direct_lighting_sample
                .then(|| A::shader_resource(&gbuffer.hdr_color))
                .transpose()?,
            depth: self.depth()?,
            normal: A::shader_resource(&gbuffer.normals)?,
            roughness: self.roughness()?,
            specular: if self.config.use_global_metalness {
                SpecularInput::GlobalMetalness(self.config.global_metalness)
            } else {
                SpecularInput::Texture(A::shader_resource(&gbuffer.specular)?)
            },
            viewport: self.viewport(),
            clip_to_view: view.projection.inverse(),
            view_to_world: view.view.inverse(),
            world_to_view: view.view,
            view_to_clip: view.projection,
            max_ray_length: self.config.max_ray_length,
            ray_offset: self.config.ray_offset,
        })
    }

    fn denoise_common(&self, half_resolution_mode: HalfResolutionMode) -> RtResult<DenoisingTaskCommon<A>> {
        let view = &self.frame.view;
        let motion = &self.frame.gbuffer.motion_vectors;
        Ok(DenoisingTaskCommon {
            mode: if self.requests.reset_denoisers { DenoisingMode::DiscardHistory } else { DenoisingMode::Continue },
            half_resolution_mode,
            viewport: self.viewport(),
            depth: self.depth()?,
            normal: A::shader_resource(&self.frame.gbuffer.normals)?,
            roughness: self.roughness()?,
            motion: MotionInput {
                tex: A::shader_resource(motion)?,
                scale: [1.0 / motion.width as f32, 1.0 / motion.height as f32],
            },
            clip_to_view: view.projection.inverse(),
            view_to_clip: view.projection,
            view_to_clip_prev: view.prev_projection,
            world_to_view: view.view,
            world_to_view_prev: view.prev_view,
            camera_jitter: view.pixel_offset.to_array(),
        })
    }

    /// Trace target: the raw texture while its denoiser runs, the final one otherwise.
    fn trace_target<'t>(&self, denoised: bool, raw: &'t GpuTexture, fin: &'t GpuTexture) -> &'t GpuTexture {
        if denoised {
            raw
        } else {
            fin
        }
    }

    /// Schedule every render task of the frame. BVH tasks are already in pre-lighting.
    pub fn schedule(&self, containers: &mut FrameContainers<A>) -> RtResult<()> {
        self.schedule_light_injection(containers)?;
        self.schedule_light_transfer(containers)?;

        if self.features.debug_active() {
            self.schedule_debug(containers)?;
        } else {
            self.schedule_reflection_and_gi(containers)?;
            self.schedule_ambient_occlusion(containers)?;
            self.schedule_shadows(containers)?;
        }

        if self.config.enable_transparent_reflection {
            self.schedule_transparent_reflection(containers)?;
        }
        Ok(())
    }

    fn schedule_light_injection(&self, containers: &mut FrameContainers<A>) -> RtResult<()> {
        let view = &self.frame.view;
        let gbuffer = &self.frame.gbuffer;
        let task = DirectLightingInjectionTask {
            use_inline_rt: self.config.use_trace_ray_inline,
            injection_resolution_stride: self.config.light_injection_stride,
            depth: DepthInput { tex: A::shader_resource(&gbuffer.world_position)?, kind: DepthType::RgbWorldSpace },
            direct_lighting: A::shader_resource(&gbuffer.hdr_color)?,
            viewport: self.viewport(),
            clip_to_view: view.projection.inverse(),
            view_to_world: view.view.inverse(),
        };
        let container =
            if self.config.enable_late_light_injection { &mut containers.post_lighting } else { &mut containers.main };
        container.schedule_render_task(RenderTask::DirectLightingInjection(task))
    }

    fn schedule_light_transfer(&self, containers: &mut FrameContainers<A>) -> RtResult<()> {
        if let Some((key, target)) = self.requests.light_transfer {
            log::debug!("direct light transfer into {key:?}");
            containers.main.schedule_render_task(RenderTask::DirectLightTransfer(DirectLightTransferTask {
                use_inline_rt: self.config.use_trace_ray_inline,
                target,
            }))?;
        }
        Ok(())
    }

    fn schedule_debug(&self, containers: &mut FrameContainers<A>) -> RtResult<()> {
        let task = TraceSpecularTask {
            common: self.trace_common(HalfResolutionMode::Off)?,
            debug_output: self.features.debug_display,
            out: A::unordered_access(&self.frame.outputs.reflections_final)?,
        };
        containers.main.schedule_render_task(RenderTask::TraceSpecular(task))
    }

    fn schedule_reflection_and_gi(&self, containers: &mut FrameContainers<A>) -> RtResult<()> {
        let f = &self.features;
        let outputs = &self.frame.outputs;
        let half = self.checkerboard_if(f.reflection_denoising);
        let reflections = self.trace_target(f.reflection_denoising, &outputs.reflections, &outputs.reflections_final);
        let gi = self.trace_target(f.reflection_denoising, &outputs.gi, &outputs.gi_final);

        if f.reflection {
            containers.main.schedule_render_task(RenderTask::TraceSpecular(TraceSpecularTask {
                common: self.trace_common(half)?,
                debug_output: DebugDisplay::Off,
                out: A::unordered_access(reflections)?,
            }))?;
        }
        if f.gi {
            containers.main.schedule_render_task(RenderTask::TraceDiffuse(TraceDiffuseTask {
                common: self.trace_common(half)?,
                diffuse_brdf: DiffuseBrdf::NormalizedDisney,
                out: A::unordered_access(gi)?,
            }))?;
        }
        if !f.reflection_denoising {
            return Ok(());
        }

        let context = required(self.contexts.spec_diff, "specular/diffuse")?;
        let common = self.denoise_common(self.checkerboard_if(true))?;
        let task = match (f.reflection, f.gi) {
            (true, true) => RenderTask::DenoiseSpecularAndDiffuse(DenoiseSpecularAndDiffuseTask {
                common,
                context,
                in_specular: A::shader_resource(&outputs.reflections)?,
                in_out_specular: A::combined_access(&outputs.reflections_final)?,
                in_diffuse: A::shader_resource(&outputs.gi)?,
                in_out_diffuse: A::combined_access(&outputs.gi_final)?,
            }),
            (true, false) => RenderTask::DenoiseSpecular(DenoiseSpecularTask {
                common,
                context,
                in_specular: A::shader_resource(&outputs.reflections)?,
                in_out_specular: A::combined_access(&outputs.reflections_final)?,
            }),
            _ => RenderTask::DenoiseDiffuse(DenoiseDiffuseTask {
                common,
                context,
                in_diffuse: A::shader_resource(&outputs.gi)?,
                in_out_diffuse: A::combined_access(&outputs.gi_final)?,
            }),
        };
        containers.main.schedule_render_task(task)
    }

    fn schedule_ambient_occlusion(&self, containers: &mut FrameContainers<A>) -> RtResult<()> {
        let f = &self.features;
        if !f.ao {
            return Ok(());
        }
        let outputs = &self.frame.outputs;
        let target = self.trace_target(f.ao_denoising, &outputs.ao, &outputs.ao_final);
        containers.pre_lighting.schedule_render_task(RenderTask::TraceAmbientOcclusion(TraceAmbientOcclusionTask {
            common: self.trace_common(self.checkerboard_if(f.ao_denoising))?,
            out: A::unordered_access(target)?,
        }))?;

        if f.ao_denoising {
            containers.pre_lighting.schedule_render_task(RenderTask::DenoiseDiffuseOcclusion(
                DenoiseDiffuseOcclusionTask {
                    common: self.denoise_common(self.checkerboard_if(true))?,
                    context: required(self.contexts.ao, "ambient occlusion")?,
                    in_hit_t: A::shader_resource(&outputs.ao)?,
                    in_out_occlusion: A::combined_access(&outputs.ao_final)?,
                },
            ))?;
        }
        Ok(())
    }

    fn schedule_shadows(&self, containers: &mut FrameContainers<A>) -> RtResult<()> {
        let f = &self.features;
        if !f.shadows.is_enabled() {
            return Ok(());
        }
        if self.frame.lights.is_empty() {
            log::trace!("shadows enabled but the frame has no lights");
            return Ok(());
        }
        let outputs = &self.frame.outputs;
        let target = self.trace_target(f.shadow_denoising, &outputs.shadows, &outputs.shadows_final);
        let first_hit = self.config.shadows_first_hit_and_end_search;

        let trace = match f.shadows {
            ShadowMode::MultiLight => RenderTask::TraceMultiShadow(TraceMultiShadowTask {
                common: self.trace_common(HalfResolutionMode::Off)?,
                enable_first_hit_and_end_search: first_hit,
                lights: light_infos(&self.frame.lights, MAX_LIGHTS),
                out0: A::unordered_access(target)?,
                out1: A::unordered_access(&outputs.shadows_aux)?,
            }),
            _ => {
                let mut lights = light_infos(&self.frame.lights, 1);
                RenderTask::TraceShadow(TraceShadowTask {
                    common: self.trace_common(HalfResolutionMode::Off)?,
                    enable_first_hit_and_end_search: first_hit,
                    light: lights.remove(0),
                    out: A::unordered_access(target)?,
                })
            }
        };
        containers.pre_lighting.schedule_render_task(trace)?;

        if !f.shadow_denoising {
            return Ok(());
        }
        let common = self.denoise_common(HalfResolutionMode::Off)?;
        let context = required(self.contexts.shadow, "shadow")?;
        let denoise = match f.shadows {
            ShadowMode::MultiLight => RenderTask::DenoiseMultiShadow(DenoiseMultiShadowTask {
                common,
                context,
                in_shadow0: A::shader_resource(&outputs.shadows)?,
                in_shadow1: A::shader_resource(&outputs.shadows_aux)?,
                in_out_shadow: A::combined_access(&outputs.shadows_final)?,
            }),
            _ => RenderTask::DenoiseShadow(DenoiseShadowTask {
                common,
                context,
                in_shadow: A::shader_resource(&outputs.shadows)?,
                in_out_shadow: A::combined_access(&outputs.shadows_final)?,
            }),
        };
        containers.pre_lighting.schedule_render_task(denoise)
    }

    fn schedule_transparent_reflection(&self, containers: &mut FrameContainers<A>) -> RtResult<()> {
        let Some(layer) = &self.frame.transparent else {
            return Ok(());
        };
        let mut common = self.trace_common(HalfResolutionMode::Off)?;
        common.depth = DepthInput { tex: A::shader_resource(&layer.world_position)?, kind: DepthType::RgbWorldSpace };
        common.normal = A::shader_resource(&layer.normals)?;
        common.roughness = RoughnessInput::Global(0.0);
        common.specular = SpecularInput::GlobalMetalness(1.0);
        common.enable_bilinear_sampling = false;
        common.viewport = Viewport::full(layer.world_position.size());
        containers.main.schedule_render_task(RenderTask::TraceSpecular(TraceSpecularTask {
            common,
            debug_output: DebugDisplay::Off,
            out: A::unordered_access(&layer.reflections)?,
        }))
    }
}
