//! Device capability checks run once at initialisation.

use render_api::HostDevice;

use crate::config::RayliteConfig;
use crate::error::{RtError, RtResult};
use crate::native::GraphicsApi;

/// Device extensions a Vulkan device must enable for ray tracing.
pub const REQUIRED_VULKAN_EXTENSIONS: &[&str] = &[
    "VK_KHR_acceleration_structure",
    "VK_KHR_ray_tracing_pipeline",
    "VK_KHR_ray_query",
    "VK_KHR_deferred_host_operations",
    "VK_KHR_buffer_device_address",
];

/// Fail on missing required extensions and turn inline ray tracing off when the device
/// cannot run ray queries.
pub fn check_capabilities(api: GraphicsApi, host: &dyn HostDevice, config: &mut RayliteConfig) -> RtResult<()> {
    if api == GraphicsApi::Vulkan {
        let enabled = host.enabled_extensions();
        let missing: Vec<&str> = REQUIRED_VULKAN_EXTENSIONS
            .iter()
            .copied()
            .filter(|required| !enabled.iter().any(|e| e == required))
            .collect();
        if !missing.is_empty() {
            let msg = format!("Vulkan device is missing {}", missing.join(", "));
            log::error!("{msg}");
            return Err(RtError::Capability(msg));
        }
    }
    if config.use_trace_ray_inline && !host.supports_ray_query() {
        log::info!("device has no ray query support; inline ray tracing disabled");
        config.use_trace_ray_inline = false;
    }
    Ok(())
}
