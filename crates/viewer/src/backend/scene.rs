//! Headless scene backend.
//!
//! Keeps registered models as per-element bounding boxes and answers picks
//! by casting a ray from an orbit camera framed on everything loaded.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use glam::Vec2;
use shared::{ElementRef, ModelId, PlaneGeometry, Rgb};

use super::camera::OrbitCamera;
use super::picking::{dominant_axis, enclosing, pick_nearest, Aabb};
use super::{BackendFactory, RenderingBackend, Surface};
use crate::clipping::PlaneId;
use crate::error::BackendError;
use crate::parsing::{ModelParser, ParsedModel, SceneJsonParser};
use crate::settings::LoaderConfig;

/// A model as the scene holds it
#[derive(Debug, Clone)]
pub struct SceneModel {
    pub url: String,
    pub name: String,
    pub element_count: usize,
    pub bounds: Aabb,
}

pub struct SceneBackend {
    surface: Surface,
    background: Rgb,
    axes: bool,
    grid: bool,
    loader_config: LoaderConfig,
    worker_enabled: bool,
    asset_path: PathBuf,
    camera: OrbitCamera,
    models: HashMap<ModelId, SceneModel>,
    /// Pick targets of every loaded model
    targets: HashMap<ElementRef, Aabb>,
    next_model: u32,
    shadows: BTreeSet<ModelId>,
    clipping_active: bool,
    planes: Vec<(PlaneId, PlaneGeometry)>,
    highlighted: Option<ElementRef>,
    selected: Vec<ElementRef>,
    disposed: bool,
}

impl SceneBackend {
    pub fn new(surface: Surface, background: Rgb) -> Self {
        Self {
            surface,
            background,
            axes: false,
            grid: false,
            loader_config: LoaderConfig::default(),
            worker_enabled: false,
            asset_path: PathBuf::from("./"),
            camera: OrbitCamera::new(),
            models: HashMap::new(),
            targets: HashMap::new(),
            next_model: 0,
            shadows: BTreeSet::new(),
            clipping_active: false,
            planes: Vec::new(),
            highlighted: None,
            selected: Vec::new(),
            disposed: false,
        }
    }

    pub fn background(&self) -> Rgb {
        self.background
    }

    /// (axes, grid)
    pub fn decorations(&self) -> (bool, bool) {
        (self.axes, self.grid)
    }

    pub fn loader_config(&self) -> &LoaderConfig {
        &self.loader_config
    }

    pub fn worker_enabled(&self) -> bool {
        self.worker_enabled
    }

    pub fn asset_path(&self) -> &Path {
        &self.asset_path
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn model(&self, id: ModelId) -> Option<&SceneModel> {
        self.models.get(&id)
    }

    pub fn has_shadow(&self, id: ModelId) -> bool {
        self.shadows.contains(&id)
    }

    pub fn clipping_active(&self) -> bool {
        self.clipping_active
    }

    pub fn planes(&self) -> &[(PlaneId, PlaneGeometry)] {
        &self.planes
    }

    pub fn highlighted(&self) -> Option<&ElementRef> {
        self.highlighted.as_ref()
    }

    pub fn selected(&self) -> &[ElementRef] {
        &self.selected
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// World bounds of one element
    pub fn element_bounds(&self, element: &ElementRef) -> Option<&Aabb> {
        self.targets.get(element)
    }

    fn viewport(&self) -> Vec2 {
        Vec2::new(self.surface.width as f32, self.surface.height as f32)
    }

    fn hit(&self, pointer: Vec2) -> Option<ElementRef> {
        let ray = self.camera.screen_ray(pointer, self.viewport());
        pick_nearest(&ray, &self.targets).map(|(element, _)| element)
    }
}

#[async_trait]
impl RenderingBackend for SceneBackend {
    fn add_axes(&mut self) {
        self.axes = true;
    }

    fn add_grid(&mut self) {
        self.grid = true;
    }

    async fn apply_loader_config(&mut self, config: &LoaderConfig) -> Result<(), BackendError> {
        tracing::debug!(
            "Loader config: coordinate_to_origin={}, fast_booleans={}",
            config.coordinate_to_origin,
            config.fast_booleans
        );
        self.loader_config = config.clone();
        Ok(())
    }

    fn configure_worker(&mut self, enabled: bool, asset_path: &Path) {
        self.worker_enabled = enabled;
        self.asset_path = asset_path.to_path_buf();
    }

    fn set_parsing_asset_path(&mut self, path: &Path) {
        self.asset_path = path.to_path_buf();
    }

    fn parser(&self) -> Arc<dyn ModelParser> {
        Arc::new(SceneJsonParser::new(self.loader_config.clone()))
    }

    fn register_model(&mut self, model: ParsedModel) -> Result<ModelId, BackendError> {
        let bounds = enclosing(model.elements.iter().map(|e| &e.bounds))
            .ok_or_else(|| BackendError::Parse(format!("{}: model has no elements", model.url)))?;

        let id = ModelId(self.next_model);
        self.next_model += 1;
        for element in &model.elements {
            self.targets
                .insert(ElementRef::new(id, element.id), element.bounds);
        }
        self.models.insert(
            id,
            SceneModel {
                url: model.url,
                name: model.name,
                element_count: model.elements.len(),
                bounds,
            },
        );

        if let Some(all) = enclosing(self.models.values().map(|m| &m.bounds)) {
            self.camera.frame(&all);
        }
        Ok(id)
    }

    fn render_shadow(&mut self, model: ModelId) {
        if self.models.contains_key(&model) {
            self.shadows.insert(model);
        }
    }

    fn set_clipping_active(&mut self, active: bool) {
        self.clipping_active = active;
    }

    fn pre_pick(&mut self, pointer: Vec2) -> Option<ElementRef> {
        self.highlighted = self.hit(pointer);
        self.highlighted.clone()
    }

    fn pick(&mut self, pointer: Vec2, exclusive: bool) -> Option<ElementRef> {
        let hit = self.hit(pointer)?;
        if exclusive {
            self.selected.clear();
        }
        if !self.selected.contains(&hit) {
            self.selected.push(hit.clone());
        }
        Some(hit)
    }

    fn create_clipping_plane(
        &mut self,
        id: PlaneId,
        anchor: Option<&ElementRef>,
    ) -> Option<PlaneGeometry> {
        let center = self.targets.get(anchor?)?.center();
        // Face the camera along the closest world axis
        let normal = dominant_axis(self.camera.eye_position() - center);
        let geometry = PlaneGeometry {
            origin: [center.x as f64, center.y as f64, center.z as f64],
            normal: [normal.x as f64, normal.y as f64, normal.z as f64],
        };
        self.planes.push((id, geometry.clone()));
        Some(geometry)
    }

    fn remove_clipping_plane(&mut self, id: PlaneId) {
        self.planes.retain(|(plane, _)| *plane != id);
    }

    async fn dispose(&mut self) -> Result<(), BackendError> {
        if self.disposed {
            return Err(BackendError::Release("scene already released".to_string()));
        }
        self.models.clear();
        self.targets.clear();
        self.shadows.clear();
        self.planes.clear();
        self.highlighted = None;
        self.selected.clear();
        self.clipping_active = false;
        self.disposed = true;
        tracing::debug!("Scene for surface {} released", self.surface.id);
        Ok(())
    }
}

/// Builds a [`SceneBackend`] per surface
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneBackendFactory;

#[async_trait]
impl BackendFactory for SceneBackendFactory {
    async fn construct(
        &self,
        surface: &Surface,
        background: Rgb,
    ) -> Result<Box<dyn RenderingBackend>, BackendError> {
        if surface.width == 0 || surface.height == 0 {
            return Err(BackendError::Construction(format!(
                "surface {} has no area ({}x{})",
                surface.id, surface.width, surface.height
            )));
        }
        tracing::debug!(
            "Scene for surface {} ({}x{}), background #{}",
            surface.id,
            surface.width,
            surface.height,
            background.to_hex()
        );
        Ok(Box::new(SceneBackend::new(surface.clone(), background)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use glam::Vec3;

    fn loaded_scene() -> (SceneBackend, ModelId) {
        let mut scene = SceneBackend::new(Surface::new(800, 600), Rgb::WHITE);
        let id = scene
            .register_model(fixtures::parsed_house("house.json"))
            .unwrap();
        (scene, id)
    }

    fn pixel_of(scene: &SceneBackend, element: &ElementRef) -> Vec2 {
        let center = scene.element_bounds(element).unwrap().center();
        scene.camera().project(center, scene.viewport()).unwrap()
    }

    #[test]
    fn test_register_frames_camera() {
        let (scene, id) = loaded_scene();
        let model = scene.model(id).unwrap();
        assert_eq!(model.element_count, 7);
        assert!((scene.camera().target - model.bounds.center()).length() < 1e-4);
    }

    #[test]
    fn test_empty_model_rejected() {
        let mut scene = SceneBackend::new(Surface::new(800, 600), Rgb::WHITE);
        let empty = ParsedModel {
            url: "empty.json".to_string(),
            name: String::new(),
            elements: Vec::new(),
        };
        assert!(matches!(scene.register_model(empty), Err(BackendError::Parse(_))));
    }

    #[test]
    fn test_pre_pick_finds_door() {
        let (mut scene, id) = loaded_scene();
        let door = ElementRef::new(id, 400);
        let pixel = pixel_of(&scene, &door);

        assert_eq!(scene.pre_pick(pixel), Some(door.clone()));
        assert_eq!(scene.highlighted(), Some(&door));
    }

    #[test]
    fn test_corner_is_empty_space() {
        let (mut scene, _) = loaded_scene();
        assert_eq!(scene.pre_pick(Vec2::ZERO), None);
        assert_eq!(scene.pick(Vec2::ZERO, true), None);
    }

    #[test]
    fn test_exclusive_pick_replaces_selection() {
        let (mut scene, id) = loaded_scene();
        let door = ElementRef::new(id, 400);
        let pixel = pixel_of(&scene, &door);
        scene.selected.push(ElementRef::new(id, 100));

        assert_eq!(scene.pick(pixel, true), Some(door.clone()));
        assert_eq!(scene.selected(), &[door]);
    }

    #[test]
    fn test_plane_anchored_on_element() {
        let (mut scene, id) = loaded_scene();
        let door = ElementRef::new(id, 400);
        let center = scene.element_bounds(&door).unwrap().center();

        let plane = scene.create_clipping_plane(PlaneId(0), Some(&door)).unwrap();
        assert_eq!(
            plane.origin,
            [center.x as f64, center.y as f64, center.z as f64]
        );
        let normal = Vec3::new(
            plane.normal[0] as f32,
            plane.normal[1] as f32,
            plane.normal[2] as f32,
        );
        assert_eq!(normal.length(), 1.0);
        assert_eq!(scene.planes().len(), 1);

        scene.remove_clipping_plane(PlaneId(0));
        assert!(scene.planes().is_empty());
    }

    #[test]
    fn test_plane_needs_anchor() {
        let (mut scene, id) = loaded_scene();
        assert!(scene.create_clipping_plane(PlaneId(0), None).is_none());
        assert!(scene
            .create_clipping_plane(PlaneId(0), Some(&ElementRef::new(id, 9999)))
            .is_none());
    }

    #[tokio::test]
    async fn test_dispose_once() {
        let (mut scene, id) = loaded_scene();
        scene.render_shadow(id);
        assert!(scene.has_shadow(id));

        scene.dispose().await.unwrap();
        assert!(scene.is_disposed());
        assert!(scene.model(id).is_none());
        assert!(scene.dispose().await.is_err());
    }

    #[tokio::test]
    async fn test_factory_rejects_zero_area() {
        let err = SceneBackendFactory
            .construct(&Surface::new(0, 600), Rgb::WHITE)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::Construction(_)));
    }

    #[tokio::test]
    async fn test_parser_follows_loader_config() {
        let mut scene = SceneBackend::new(Surface::new(800, 600), Rgb::WHITE);
        let config = LoaderConfig {
            coordinate_to_origin: false,
            fast_booleans: false,
        };
        scene.apply_loader_config(&config).await.unwrap();
        assert_eq!(scene.loader_config(), &config);

        let json = serde_json::to_string(&fixtures::unit_model()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.json");
        std::fs::write(&path, json).unwrap();
        let model = scene
            .parser()
            .parse(path.to_str().unwrap(), Path::new("./"))
            .unwrap();
        assert_eq!(model.elements.len(), 1);
    }
}
