//! Host lights to shadow-tracer light descriptors.

use render_api::ExtractedLight;

use crate::tasks::LightInfo;

/// Lights one multi-light shadow trace accepts.
pub const MAX_LIGHTS: usize = 32;

/// Convert up to `max` lights, in host order. Directional lights are flipped to point at
/// the light; angles become radians.
pub fn light_infos(lights: &[ExtractedLight], max: usize) -> Vec<LightInfo> {
    lights
        .iter()
        .take(max)
        .map(|light| match *light {
            ExtractedLight::Directional { direction, angular_size } => LightInfo::Directional {
                direction: -direction,
                angular_extent: angular_size.to_radians(),
                intensity: 1.0,
            },
            ExtractedLight::Spot { position, direction, intensity, radius, range, outer_angle } => LightInfo::Spot {
                position,
                direction,
                radius,
                intensity,
                apex_angle: outer_angle.to_radians(),
                range,
            },
            ExtractedLight::Point { position, intensity, radius, range } => {
                LightInfo::Point { position, intensity, radius, range }
            }
        })
        .collect()
}
