//! Cold-load shader list: a headerless little-endian `u32` array of shader identifiers the
//! backend compiles ahead of first use. Purely a hint; unreadable files load as empty.

use std::fs;
use std::path::Path;

use crate::error::RtResult;

pub const COLD_LOAD_SHADER_LIST_FILE: &str = "ColdLoadShaderList.bin";

/// Read the list at `path`. Missing or malformed files yield an empty list.
pub fn load_cold_load_shader_list(path: &Path) -> Vec<u32> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("cold load shader list {} not loaded: {e}", path.display());
            return Vec::new();
        }
    };
    if bytes.len() % 4 != 0 {
        log::warn!(
            "cold load shader list {} is {} bytes, not a multiple of 4; ignored",
            path.display(),
            bytes.len()
        );
        return Vec::new();
    }
    let ids: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    log::info!("loaded {} shader ids from {}", ids.len(), path.display());
    ids
}

/// Write `ids` to `path`. An empty list leaves any existing file untouched.
pub fn write_shader_list(path: &Path, ids: &[u32]) -> RtResult<bool> {
    if ids.is_empty() {
        log::info!("no loaded shaders to export");
        return Ok(false);
    }
    let bytes: Vec<u8> = ids.iter().flat_map(|id| id.to_le_bytes()).collect();
    fs::write(path, bytes).map_err(|e| {
        log::error!("failed to write shader list {}: {e}", path.display());
        e
    })?;
    log::info!("exported {} shader ids to {}", ids.len(), path.display());
    Ok(true)
}
