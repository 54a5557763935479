//! Viewer settings

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shared::Rgb;

use crate::error::ViewerError;

/// Scene decoration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSettings {
    /// Show reference axes
    pub axes: bool,
    /// Show ground grid
    pub grid: bool,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            axes: true,
            grid: true,
        }
    }
}

/// Viewport settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewportSettings {
    /// Background color RGB
    pub background_color: Rgb,
}

/// Options handed to the model loader before any model is parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Move model coordinates so the model sits at the origin
    pub coordinate_to_origin: bool,
    /// Fast but approximate boolean geometry operations
    pub fast_booleans: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            coordinate_to_origin: true,
            fast_booleans: false,
        }
    }
}

/// Background parsing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingSettings {
    /// Parse models on a background worker
    pub background: bool,
    /// Directory holding the binary decoding assets
    pub worker_asset_path: PathBuf,
}

impl Default for ParsingSettings {
    fn default() -> Self {
        Self {
            background: true,
            worker_asset_path: PathBuf::from("./"),
        }
    }
}

/// Key codes for the clipping plane shortcuts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBindings {
    pub create_plane: String,
    pub delete_plane: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            create_plane: "KeyP".to_string(),
            delete_plane: "KeyO".to_string(),
        }
    }
}

/// All viewer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerSettings {
    #[serde(default)]
    pub viewport: ViewportSettings,
    #[serde(default)]
    pub scene: SceneSettings,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub parsing: ParsingSettings,
    /// Model opened on mount
    #[serde(default = "default_model_url")]
    pub model_url: String,
    #[serde(default)]
    pub keys: KeyBindings,
}

fn default_model_url() -> String {
    "./01.ifc".to_string()
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            viewport: ViewportSettings::default(),
            scene: SceneSettings::default(),
            loader: LoaderConfig::default(),
            parsing: ParsingSettings::default(),
            model_url: default_model_url(),
            keys: KeyBindings::default(),
        }
    }
}

impl ViewerSettings {
    /// Settings file in the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "ifc-viewer", "ifc-viewer")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Load settings from the config directory, or return defaults
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                if path.exists() {
                    tracing::warn!("Ignoring settings at {}: {e}", path.display());
                }
                Self::default()
            }
        }
    }

    /// Load settings from an explicit file
    pub fn load_from(path: &Path) -> Result<Self, ViewerError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ViewerError::Settings(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&json)
            .map_err(|e| ViewerError::Settings(format!("parse {}: {e}", path.display())))
    }

    /// Save settings to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<(), ViewerError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| ViewerError::Settings(format!("create {}: {e}", dir.display())))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ViewerError::Settings(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| ViewerError::Settings(format!("write {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = ViewerSettings::default();
        assert_eq!(s.viewport.background_color, Rgb::WHITE);
        assert!(s.loader.coordinate_to_origin);
        assert!(!s.loader.fast_booleans);
        assert!(s.scene.axes && s.scene.grid);
        assert_eq!(s.keys.create_plane, "KeyP");
        assert_eq!(s.keys.delete_plane, "KeyO");
        assert_eq!(s.model_url, "./01.ifc");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let s: ViewerSettings =
            serde_json::from_str(r#"{"keys": {"create_plane": "KeyC", "delete_plane": "KeyX"}}"#)
                .unwrap();
        assert_eq!(s.keys.create_plane, "KeyC");
        assert!(s.parsing.background);
        assert_eq!(s.model_url, "./01.ifc");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut s = ViewerSettings::default();
        s.model_url = "house.json".to_string();
        s.save_to(&path).unwrap();

        let loaded = ViewerSettings::load_from(&path).unwrap();
        assert_eq!(loaded.model_url, "house.json");
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = ViewerSettings::load_from(&path).unwrap_err();
        assert!(matches!(err, ViewerError::Settings(_)));
    }
}
