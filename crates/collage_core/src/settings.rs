//! Canvas settings

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Limits and interaction constants. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSettings {
    pub max_layers: usize,
    /// Number of mementos kept for undo.
    pub history_depth: usize,
    pub max_textures: usize,
    pub max_mesh_triangles: usize,
    pub zoom_scale_factor: f32,
    /// Radius of the selection handles, in window pixels.
    pub handle_half_size: f32,
    /// Distance from the selection box top edge to the rotate handle, in window pixels.
    pub rotate_handle_height: f32,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            max_layers: 2048,
            history_depth: 100,
            max_textures: 100,
            max_mesh_triangles: 65535,
            zoom_scale_factor: 0.3,
            handle_half_size: 10.0,
            rotate_handle_height: 40.0,
        }
    }
}

impl CanvasSettings {
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.history_depth == 0 {
            return Err(SettingsError::Zero { field: "history_depth" });
        }
        if self.max_layers == 0 {
            return Err(SettingsError::Zero { field: "max_layers" });
        }
        Ok(())
    }
}
