use serde::{Deserialize, Serialize};

/// Идентификатор модели внутри одной сессии просмотра
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(pub u32);

/// Идентификатор элемента модели (express id для IFC)
pub type ElementId = u32;

/// Ссылка на конкретный элемент загруженной модели
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    pub model_id: ModelId,
    pub element_id: ElementId,
}

impl ElementRef {
    pub fn new(model_id: ModelId, element_id: ElementId) -> Self {
        Self {
            model_id,
            element_id,
        }
    }
}

/// Цвет фона в формате RGB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(0xff, 0xff, 0xff);

    /// Из числа вида 0xRRGGBB
    pub fn from_hex(hex: u32) -> Self {
        Self(
            ((hex >> 16) & 0xff) as u8,
            ((hex >> 8) & 0xff) as u8,
            (hex & 0xff) as u8,
        )
    }

    pub fn to_hex(self) -> u32 {
        ((self.0 as u32) << 16) | ((self.1 as u32) << 8) | self.2 as u32
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Геометрия секущей плоскости: точка и нормаль
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneGeometry {
    pub origin: [f64; 3],
    pub normal: [f64; 3],
}

/// Тип примитива
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Primitive {
    Cube {
        width: f64,
        height: f64,
        depth: f64,
    },
    Cylinder {
        radius: f64,
        height: f64,
    },
    Sphere {
        radius: f64,
    },
    Cone {
        radius: f64,
        height: f64,
    },
}

impl Primitive {
    /// Половинные размеры ограничивающего параллелепипеда (до трансформации)
    pub fn half_extents(&self) -> [f64; 3] {
        match *self {
            Primitive::Cube {
                width,
                height,
                depth,
            } => [width / 2.0, height / 2.0, depth / 2.0],
            Primitive::Cylinder { radius, height } | Primitive::Cone { radius, height } => {
                [radius, height / 2.0, radius]
            }
            Primitive::Sphere { radius } => [radius, radius, radius],
        }
    }
}

/// Трансформация элемента (поворот в градусах)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: [f64; 3],
    pub rotation: [f64; 3],
    pub scale: [f64; 3],
}

impl Transform {
    pub fn new() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0],
            scale: [1.0, 1.0, 1.0],
        }
    }

    pub fn at(position: [f64; 3]) -> Self {
        Self {
            position,
            ..Self::new()
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

/// Элемент модели: строительный объект с геометрией
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelElement {
    pub id: ElementId,
    /// Класс IFC, например IFCWALL
    pub ifc_type: String,
    #[serde(default)]
    pub name: String,
    pub primitive: Primitive,
    #[serde(default)]
    pub transform: Transform,
}

/// Описание модели, которое читает парсер
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelDescription {
    #[serde(default)]
    pub name: String,
    pub elements: Vec<ModelElement>,
}

impl ModelDescription {
    pub fn element(&self, id: ElementId) -> Option<&ModelElement> {
        self.elements.iter().find(|e| e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_hex() {
        assert_eq!(Rgb::from_hex(0xffffff), Rgb::WHITE);
        assert_eq!(Rgb::from_hex(0x102030), Rgb(0x10, 0x20, 0x30));
        assert_eq!(Rgb(0x10, 0x20, 0x30).to_hex(), 0x102030);
    }

    #[test]
    fn test_half_extents() {
        let cube = Primitive::Cube {
            width: 2.0,
            height: 4.0,
            depth: 6.0,
        };
        assert_eq!(cube.half_extents(), [1.0, 2.0, 3.0]);
        let cyl = Primitive::Cylinder {
            radius: 0.5,
            height: 3.0,
        };
        assert_eq!(cyl.half_extents(), [0.5, 1.5, 0.5]);
    }

    #[test]
    fn test_model_description_serde() {
        let json = r#"{
            "name": "house",
            "elements": [
                {"id": 12, "ifc_type": "IFCWALL", "primitive": {"type": "cube", "width": 4, "height": 3, "depth": 0.2}}
            ]
        }"#;
        let model: ModelDescription = serde_json::from_str(json).unwrap();
        assert_eq!(model.elements.len(), 1);
        let wall = model.element(12).unwrap();
        assert_eq!(wall.ifc_type, "IFCWALL");
        assert_eq!(wall.transform, Transform::new());
        assert!(wall.name.is_empty());
    }
}
