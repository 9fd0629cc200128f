//! Denoising contexts, recreated as a whole whenever the hash of the desired setup changes.

use render_api::{GpuTexture, RtOutputTextures};

use crate::config::{OcclusionDenoiser, RayliteConfig, ShadowDenoiser, ShadowMode, SignalDenoiser};
use crate::error::{sdk_call, RtResult};
use crate::math::hash_combine;
use crate::sdk::{DenoisingContextHandle, DenoisingContextInput, DenoisingMethod, ExecuteContext, SignalType};

/// Which denoisers a frame wants and the contexts they need.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DesiredDenoising {
    pub spec_diff: Option<DenoisingContextInput>,
    pub ao: Option<DenoisingContextInput>,
    pub shadow: Option<DenoisingContextInput>,
    /// Zero when nothing is denoised.
    pub hash: u64,
}

impl DesiredDenoising {
    pub fn from_config(config: &RayliteConfig, outputs: &RtOutputTextures) -> Self {
        let reflection_denoising =
            config.denoising_method != SignalDenoiser::Off && (config.enable_reflection || config.enable_gi);
        let ao_denoising = config.ao_denoising_method != OcclusionDenoiser::Off && config.enable_ao;
        let shadow_denoising = config.shadow_denoising_method != ShadowDenoiser::Off && config.shadows.is_enabled();

        let sized = |texture: &GpuTexture, method, signal| DenoisingContextInput {
            method,
            signal,
            max_width: texture.width,
            max_height: texture.height,
        };

        let spec_diff = reflection_denoising.then(|| {
            let method = match config.denoising_method {
                SignalDenoiser::Reblur => DenoisingMethod::Reblur,
                _ => DenoisingMethod::Relax,
            };
            let signal = match (config.enable_reflection, config.enable_gi) {
                (true, true) => SignalType::SpecularAndDiffuse,
                (false, true) => SignalType::Diffuse,
                _ => SignalType::Specular,
            };
            sized(&outputs.reflections, method, signal)
        });
        let ao = ao_denoising.then(|| sized(&outputs.ao, DenoisingMethod::Reblur, SignalType::DiffuseOcclusion));
        let shadow = shadow_denoising.then(|| {
            let signal = match config.shadows {
                ShadowMode::MultiLight => SignalType::MultiShadow,
                _ => SignalType::Shadow,
            };
            sized(&outputs.shadows, DenoisingMethod::Sigma, signal)
        });

        let mut hash = 0u64;
        if spec_diff.is_some() || ao.is_some() || shadow.is_some() {
            for texture in [&outputs.reflections, &outputs.gi, &outputs.ao, &outputs.shadows] {
                hash_combine(&mut hash, &texture.native);
                hash_combine(&mut hash, &texture.size());
            }
            hash_combine(&mut hash, &config.enable_reflection);
            hash_combine(&mut hash, &config.enable_gi);
            hash_combine(&mut hash, &config.enable_ao);
            hash_combine(&mut hash, &config.shadows);
            hash_combine(&mut hash, &config.denoising_method);
            hash_combine(&mut hash, &config.ao_denoising_method);
            hash_combine(&mut hash, &config.shadow_denoising_method);
            hash = hash.max(1);
        }

        Self { spec_diff, ao, shadow, hash }
    }

    pub fn any(&self) -> bool {
        self.hash != 0
    }
}

/// Live context handles and the hash they were created for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DenoisingContextSet {
    pub spec_diff: Option<DenoisingContextHandle>,
    pub ao: Option<DenoisingContextHandle>,
    pub shadow: Option<DenoisingContextHandle>,
    pub hash: u64,
}

impl DenoisingContextSet {
    pub fn live(&self) -> impl Iterator<Item = DenoisingContextHandle> {
        [self.spec_diff, self.ao, self.shadow].into_iter().flatten()
    }
}

/// Context handles destroyed and created by one call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContextChange {
    pub destroyed: u32,
    pub created: u32,
}

#[derive(Debug, Default)]
pub struct DenoisingContextManager {
    set: DenoisingContextSet,
}

impl DenoisingContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contexts(&self) -> &DenoisingContextSet {
        &self.set
    }

    /// Bring the context set in line with `desired`: a stale set is torn down first,
    /// then whatever is missing is created.
    pub fn ensure_contexts<C: ExecuteContext>(
        &mut self,
        ctx: &mut C,
        desired: &DesiredDenoising,
    ) -> RtResult<ContextChange> {
        let mut change = ContextChange::default();
        if self.set.hash != 0 && self.set.hash != desired.hash {
            change.destroyed = self.destroy_all(ctx)?;
        }
        if self.set.hash == 0 && desired.any() {
            let mut created = DenoisingContextSet::default();
            let result = Self::create_set(ctx, desired, &mut created);
            change.created = created.live().count() as u32;
            if let Err(err) = result {
                // Nothing from a failed attempt stays alive.
                for handle in created.live() {
                    if let Err(destroy) = ctx.destroy_denoising_context_handle(handle) {
                        log::warn!("could not destroy denoising context {handle:?}: {destroy}");
                    }
                }
                return Err(err);
            }
            self.set = created;
            log::info!("denoising contexts created ({}) for hash {:#018x}", change.created, desired.hash);
        }
        Ok(change)
    }

    fn create_set<C: ExecuteContext>(
        ctx: &mut C,
        desired: &DesiredDenoising,
        set: &mut DenoisingContextSet,
    ) -> RtResult<()> {
        let mut create = |input: &Option<DenoisingContextInput>| -> RtResult<Option<DenoisingContextHandle>> {
            input
                .as_ref()
                .map(|input| sdk_call("CreateDenoisingContextHandle", ctx.create_denoising_context_handle(input)))
                .transpose()
        };
        set.spec_diff = create(&desired.spec_diff)?;
        set.ao = create(&desired.ao)?;
        set.shadow = create(&desired.shadow)?;
        set.hash = desired.hash;
        Ok(())
    }

    /// Destroy every live context and clear the hash. Returns how many were destroyed.
    pub fn destroy_all<C: ExecuteContext>(&mut self, ctx: &mut C) -> RtResult<u32> {
        let mut destroyed = 0;
        for slot in [&mut self.set.spec_diff, &mut self.set.ao, &mut self.set.shadow] {
            if let Some(handle) = slot.take() {
                sdk_call("DestroyDenoisingContextHandle", ctx.destroy_denoising_context_handle(handle))?;
                destroyed += 1;
            }
        }
        if destroyed > 0 {
            log::debug!("destroyed {destroyed} denoising contexts");
        }
        self.set.hash = 0;
        Ok(destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::D3D12;
    use crate::sdk::{ExecuteContextSettings, HeadlessContext};
    use crate::testing::output_textures;

    fn ctx() -> HeadlessContext<D3D12> {
        HeadlessContext::new(ExecuteContextSettings::from_config(&RayliteConfig::default(), Vec::new()))
    }

    fn shadows_on() -> RayliteConfig {
        RayliteConfig { shadows: ShadowMode::SingleLight, ..Default::default() }
    }

    #[test]
    fn same_config_creates_once() {
        let mut ctx = ctx();
        let mut manager = DenoisingContextManager::new();
        let outputs = output_textures(1280, 720);
        let desired = DesiredDenoising::from_config(&shadows_on(), &outputs);

        let first = manager.ensure_contexts(&mut ctx, &desired).unwrap();
        assert_eq!(first, ContextChange { destroyed: 0, created: 3 });
        let second = manager.ensure_contexts(&mut ctx, &desired).unwrap();
        assert_eq!(second, ContextChange::default());
        assert_eq!(ctx.counts().denoising_contexts_created, 3);
    }

    #[test]
    fn each_toggle_recreates_once() {
        let outputs = output_textures(1280, 720);
        let base = shadows_on();
        let toggles: Vec<RayliteConfig> = vec![
            RayliteConfig { enable_reflection: false, ..base.clone() },
            RayliteConfig { enable_gi: false, ..base.clone() },
            RayliteConfig { enable_ao: false, ..base.clone() },
            RayliteConfig { shadows: ShadowMode::MultiLight, ..base.clone() },
            RayliteConfig { denoising_method: SignalDenoiser::Reblur, ..base.clone() },
            RayliteConfig { ao_denoising_method: OcclusionDenoiser::Off, ..base.clone() },
            RayliteConfig { shadow_denoising_method: ShadowDenoiser::Off, ..base.clone() },
        ];
        let base_desired = DesiredDenoising::from_config(&base, &outputs);

        for toggled in toggles {
            let mut ctx = ctx();
            let mut manager = DenoisingContextManager::new();
            manager.ensure_contexts(&mut ctx, &base_desired).unwrap();

            let desired = DesiredDenoising::from_config(&toggled, &outputs);
            assert_ne!(desired.hash, base_desired.hash, "{toggled:?}");
            let change = manager.ensure_contexts(&mut ctx, &desired).unwrap();
            assert_eq!(change.destroyed, 3);
            assert!(change.created > 0);
            assert_eq!(manager.contexts().hash, desired.hash);
            assert_eq!(manager.ensure_contexts(&mut ctx, &desired).unwrap(), ContextChange::default());
        }
    }

    #[test]
    fn resize_recreates() {
        let config = RayliteConfig::default();
        let a = DesiredDenoising::from_config(&config, &output_textures(1280, 720));
        let b = DesiredDenoising::from_config(&config, &output_textures(1920, 1080));
        assert_ne!(a.hash, b.hash);
        assert_eq!(b.spec_diff.unwrap().max_width, 1920);
    }

    #[test]
    fn nothing_denoised_means_zero_hash() {
        let config = RayliteConfig {
            denoising_method: SignalDenoiser::Off,
            ao_denoising_method: OcclusionDenoiser::Off,
            ..Default::default()
        };
        let desired = DesiredDenoising::from_config(&config, &output_textures(64, 64));
        assert_eq!(desired.hash, 0);

        let mut ctx = ctx();
        let mut manager = DenoisingContextManager::new();
        let on = DesiredDenoising::from_config(&RayliteConfig::default(), &output_textures(64, 64));
        manager.ensure_contexts(&mut ctx, &on).unwrap();
        let change = manager.ensure_contexts(&mut ctx, &desired).unwrap();
        assert_eq!(change, ContextChange { destroyed: 2, created: 0 });
        assert_eq!(*manager.contexts(), DenoisingContextSet::default());
    }

    #[test]
    fn failed_creation_leaves_no_contexts_behind() {
        let mut ctx = ctx();
        let mut manager = DenoisingContextManager::new();
        let mut outputs = output_textures(1280, 720);
        outputs.ao.width = 0;
        let broken = DesiredDenoising::from_config(&shadows_on(), &outputs);

        assert!(manager.ensure_contexts(&mut ctx, &broken).is_err());
        assert_eq!(ctx.denoising_contexts().count(), 0);
        assert_eq!(ctx.counts().denoising_contexts_created, ctx.counts().denoising_contexts_destroyed);
        assert_eq!(*manager.contexts(), DenoisingContextSet::default());

        let desired = DesiredDenoising::from_config(&shadows_on(), &output_textures(1280, 720));
        let change = manager.ensure_contexts(&mut ctx, &desired).unwrap();
        assert_eq!(change, ContextChange { destroyed: 0, created: 3 });
        assert_eq!(ctx.denoising_contexts().count(), 3);
    }

    #[test]
    fn signal_type_follows_enabled_signals() {
        let outputs = output_textures(64, 64);
        let signal = |enable_reflection, enable_gi| {
            let config = RayliteConfig { enable_reflection, enable_gi, ..Default::default() };
            DesiredDenoising::from_config(&config, &outputs).spec_diff.map(|c| c.signal)
        };
        assert_eq!(signal(true, true), Some(SignalType::SpecularAndDiffuse));
        assert_eq!(signal(false, true), Some(SignalType::Diffuse));
        assert_eq!(signal(true, false), Some(SignalType::Specular));
        assert_eq!(signal(false, false), None);
    }
}
