//! Sample models for tests and the command driver.

use shared::*;

use crate::parsing::{ParsedModel, SceneJsonParser};
use crate::settings::LoaderConfig;

// ── Element factories ───────────────────────────────────────────

/// A box-shaped element at `pos`
pub fn box_element(id: ElementId, ifc_type: &str, size: [f64; 3], pos: [f64; 3]) -> ModelElement {
    ModelElement {
        id,
        ifc_type: ifc_type.to_string(),
        name: format!("{ifc_type} #{id}"),
        primitive: Primitive::Cube {
            width: size[0],
            height: size[1],
            depth: size[2],
        },
        transform: Transform::at(pos),
    }
}

/// A single 1x1x1 proxy element at the origin
pub fn unit_model() -> ModelDescription {
    ModelDescription {
        name: "unit".to_string(),
        elements: vec![box_element(1, "IFCBUILDINGELEMENTPROXY", [1.0; 3], [0.0; 3])],
    }
}

/// Small building: slab, four walls, a column and a door
pub fn house() -> ModelDescription {
    ModelDescription {
        name: "house".to_string(),
        elements: vec![
            box_element(100, "IFCSLAB", [8.0, 0.2, 6.0], [0.0, -0.1, 0.0]),
            box_element(201, "IFCWALL", [8.0, 3.0, 0.2], [0.0, 1.5, -3.0]),
            box_element(202, "IFCWALL", [8.0, 3.0, 0.2], [0.0, 1.5, 3.0]),
            box_element(203, "IFCWALL", [0.2, 3.0, 6.0], [-4.0, 1.5, 0.0]),
            box_element(204, "IFCWALL", [0.2, 3.0, 6.0], [4.0, 1.5, 0.0]),
            ModelElement {
                id: 300,
                ifc_type: "IFCCOLUMN".to_string(),
                name: "Column".to_string(),
                primitive: Primitive::Cylinder {
                    radius: 0.2,
                    height: 3.0,
                },
                transform: Transform::at([0.0, 1.5, 0.0]),
            },
            box_element(400, "IFCDOOR", [0.9, 2.1, 0.1], [1.0, 1.05, 3.1]),
        ],
    }
}

pub fn house_json() -> String {
    serde_json::to_string_pretty(&house()).unwrap_or_default()
}

/// `house()` as a parser would produce it (default loader config)
pub fn parsed_house(url: &str) -> ParsedModel {
    SceneJsonParser::new(LoaderConfig::default()).parse_description(url, house())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_house_ids_unique() {
        let h = house();
        let mut ids: Vec<_> = h.elements.iter().map(|e| e.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), h.elements.len());
    }

    #[test]
    fn test_house_json_parses_back() {
        let parsed: ModelDescription = serde_json::from_str(&house_json()).unwrap();
        assert_eq!(parsed, house());
    }

    #[test]
    fn test_parsed_house() {
        let model = parsed_house("house.json");
        assert_eq!(model.elements.len(), 7);
        assert_eq!(model.url, "house.json");
    }
}
