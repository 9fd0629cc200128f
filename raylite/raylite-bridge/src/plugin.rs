//! Raylite plugin: implements RenderBackend for the host.

use std::sync::Arc;

use raylite_core::{CommandLanes, ExecuteContext, FrameReport, RayliteConfig, Renderer, SdkError};
use raylite_core::sdk::ExecuteContextSettings;
use render_api::{ExtractedScene, FrameInputs, HostDevice, RenderBackend};

/// Owns the renderer and the lanes its containers are recorded through.
pub struct RaylitePlugin<C: ExecuteContext, L: CommandLanes<C::Api>> {
    renderer: Renderer<C>,
    lanes: L,
    last_report: FrameReport,
}

impl<C: ExecuteContext, L: CommandLanes<C::Api>> RaylitePlugin<C, L> {
    /// Create with default config.
    pub fn new(
        host: Arc<dyn HostDevice>,
        lanes: L,
        create: impl FnOnce(ExecuteContextSettings) -> Result<C, SdkError>,
    ) -> Result<Self, String> {
        Self::new_with_config(RayliteConfig::default(), host, lanes, create)
    }

    pub fn new_with_config(
        config: RayliteConfig,
        host: Arc<dyn HostDevice>,
        lanes: L,
        create: impl FnOnce(ExecuteContextSettings) -> Result<C, SdkError>,
    ) -> Result<Self, String> {
        let renderer = Renderer::new(config, host, create).map_err(|e| e.to_string())?;
        Ok(Self { renderer, lanes, last_report: FrameReport::default() })
    }

    pub fn renderer(&self) -> &Renderer<C> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer<C> {
        &mut self.renderer
    }

    pub fn lanes(&self) -> &L {
        &self.lanes
    }

    pub fn lanes_mut(&mut self) -> &mut L {
        &mut self.lanes
    }

    pub fn last_report(&self) -> FrameReport {
        self.last_report
    }
}

impl<C: ExecuteContext, L: CommandLanes<C::Api>> RenderBackend for RaylitePlugin<C, L> {
    fn prepare(&mut self, scene: &ExtractedScene) -> Result<(), String> {
        let stats = self.renderer.prepare(scene).map_err(|e| e.to_string())?;
        log::trace!("prepare: {stats:?}");
        Ok(())
    }

    fn render_frame(&mut self, frame: &FrameInputs) -> Result<(), String> {
        self.last_report = self.renderer.render_frame(frame, &mut self.lanes).map_err(|e| e.to_string())?;
        Ok(())
    }

    fn scene_unloading(&mut self) -> Result<(), String> {
        self.renderer.scene_unloading().map_err(|e| e.to_string())
    }
}
