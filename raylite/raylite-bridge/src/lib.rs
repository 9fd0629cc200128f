//! Raylite bridge: implements render_api::RenderBackend using raylite-core.

mod interop;
mod plugin;

pub use interop::{D3D11InteropLanes, InteropQueue};
pub use plugin::RaylitePlugin;
