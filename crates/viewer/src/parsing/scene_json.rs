//! Parser for JSON model descriptions (`shared::ModelDescription`).

use std::path::{Path, PathBuf};

use shared::ModelDescription;

use super::{ModelParser, ParsedElement, ParsedModel};
use crate::backend::picking::{enclosing, Aabb};
use crate::error::BackendError;
use crate::settings::LoaderConfig;

/// Reads model descriptions from local paths or `file://` URLs.
#[derive(Debug, Clone, Default)]
pub struct SceneJsonParser {
    config: LoaderConfig,
}

impl SceneJsonParser {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn parse_str(&self, url: &str, json: &str) -> Result<ParsedModel, BackendError> {
        let description: ModelDescription =
            serde_json::from_str(json).map_err(|e| BackendError::Parse(format!("{url}: {e}")))?;
        Ok(self.parse_description(url, description))
    }

    /// Compute element bounds and apply the loader configuration
    pub fn parse_description(&self, url: &str, description: ModelDescription) -> ParsedModel {
        let mut elements: Vec<ParsedElement> = description
            .elements
            .iter()
            .map(|element| ParsedElement {
                id: element.id,
                ifc_type: element.ifc_type.clone(),
                bounds: Aabb::from_element(element),
            })
            .collect();

        if self.config.coordinate_to_origin {
            if let Some(bounds) = enclosing(elements.iter().map(|e| &e.bounds)) {
                let offset = -bounds.center();
                for element in &mut elements {
                    element.bounds = element.bounds.translated(offset);
                }
            }
        }

        ParsedModel {
            url: url.to_string(),
            name: description.name,
            elements,
        }
    }
}

fn resolve_path(url: &str) -> Result<PathBuf, BackendError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return Err(BackendError::Fetch(format!("remote models are not supported: {url}")));
    }
    Ok(PathBuf::from(url.strip_prefix("file://").unwrap_or(url)))
}

impl ModelParser for SceneJsonParser {
    fn parse(&self, url: &str, asset_path: &Path) -> Result<ParsedModel, BackendError> {
        let path = resolve_path(url)?;
        tracing::debug!(
            "Reading model {} (decoder assets: {})",
            path.display(),
            asset_path.display()
        );
        let json = std::fs::read_to_string(&path)
            .map_err(|e| BackendError::Fetch(format!("{}: {e}", path.display())))?;
        self.parse_str(url, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    const TWO_WALLS: &str = r#"{
        "name": "walls",
        "elements": [
            {"id": 1, "ifc_type": "IFCWALL", "primitive": {"type": "cube", "width": 2, "height": 2, "depth": 2},
             "transform": {"position": [10, 0, 0], "rotation": [0, 0, 0], "scale": [1, 1, 1]}},
            {"id": 2, "ifc_type": "IFCWALL", "primitive": {"type": "cube", "width": 2, "height": 2, "depth": 2},
             "transform": {"position": [20, 0, 0], "rotation": [0, 0, 0], "scale": [1, 1, 1]}}
        ]
    }"#;

    #[test]
    fn test_coordinates_moved_to_origin() {
        let parser = SceneJsonParser::new(LoaderConfig::default());
        let model = parser.parse_str("walls.json", TWO_WALLS).unwrap();
        assert_eq!(model.name, "walls");
        let all = enclosing(model.elements.iter().map(|e| &e.bounds)).unwrap();
        assert!(all.center().length() < 1e-5);
        assert_eq!(model.elements[0].bounds.center(), Vec3::new(-5.0, 0.0, 0.0));
    }

    #[test]
    fn test_coordinates_kept_when_disabled() {
        let parser = SceneJsonParser::new(LoaderConfig {
            coordinate_to_origin: false,
            fast_booleans: false,
        });
        let model = parser.parse_str("walls.json", TWO_WALLS).unwrap();
        assert_eq!(model.elements[1].bounds.center(), Vec3::new(20.0, 0.0, 0.0));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let parser = SceneJsonParser::default();
        let err = parser.parse_str("x.json", "{").unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)));
    }

    #[test]
    fn test_remote_url_is_fetch_error() {
        let parser = SceneJsonParser::default();
        let err = parser.parse("https://example.com/01.ifc", Path::new("./")).unwrap_err();
        assert!(matches!(err, BackendError::Fetch(_)));
    }

    #[test]
    fn test_reads_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("walls.json");
        std::fs::write(&path, TWO_WALLS).unwrap();
        let url = format!("file://{}", path.display());
        let model = SceneJsonParser::default().parse(&url, Path::new("./")).unwrap();
        assert_eq!(model.elements.len(), 2);
    }
}
