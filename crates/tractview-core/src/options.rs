//! Configuration options for tractview.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Viewer-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Background color.
    pub background_color: Vec3,

    /// Maximum number of volume textures bound at once.
    pub max_bound_textures: usize,

    /// Iso level used by "create iso surface".
    pub iso_level: f32,

    /// Meshes with alpha below this are drawn without depth writes.
    pub opaque_alpha: f32,

    /// Half depth of the orthographic projection.
    pub ortho_depth: f32,

    /// Color map used by the legend and overlay volumes.
    pub color_map: String,

    /// Grid resolution of spline surfaces.
    pub surface_resolution: u32,

    /// Size of headless renders.
    pub render_width: u32,
    pub render_height: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            background_color: Vec3::new(0.0, 0.0, 0.0),
            max_bound_textures: 10,
            iso_level: 0.4,
            opaque_alpha: 0.99,
            ortho_depth: 3000.0,
            color_map: "rainbow".to_string(),
            surface_resolution: 24,
            render_width: 800,
            render_height: 800,
        }
    }
}

impl Options {
    /// Reads options from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Writes options as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
