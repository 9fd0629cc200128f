//! Traits the host and the ray-tracing layer use to talk to each other.

use crate::{ExtractedScene, FrameInputs};

/// Ray-tracing backend the host drives once per frame.
pub trait RenderBackend {
    /// Prepare phase: synchronize extracted meshes/instances with the acceleration structures.
    fn prepare(&mut self, scene: &ExtractedScene) -> Result<(), String>;

    /// Schedule and record this frame's ray-tracing work.
    fn render_frame(&mut self, frame: &FrameInputs) -> Result<(), String>;

    /// Drop every acceleration structure and in-flight task. Waits for the GPU.
    fn scene_unloading(&mut self) -> Result<(), String>;
}

/// The host graphics device, as far as the ray-tracing layer needs it.
pub trait HostDevice {
    /// Wait for the device to become idle (all submitted work finished).
    fn wait_idle(&self) -> Result<(), String>;

    /// Inline ray tracing (ray query) is available.
    fn supports_ray_query(&self) -> bool;

    /// Device extensions that were enabled at creation. Empty for D3D.
    fn enabled_extensions(&self) -> Vec<String> {
        Vec::new()
    }
}
