//! Rendering backend capability interface.
//!
//! The session core never talks to a renderer directly. Everything it needs
//! (scene setup, model registration, shadows, picking, clipping planes and
//! teardown) goes through [`RenderingBackend`], which lets the state machine
//! run against [`scene::SceneBackend`] in production and against the
//! recording fake in [`crate::harness`] under test.

pub mod camera;
pub mod picking;
pub mod scene;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use glam::Vec2;
use shared::{ElementRef, ModelId, PlaneGeometry, Rgb};
use uuid::Uuid;

use crate::clipping::PlaneId;
use crate::error::BackendError;
use crate::parsing::{ModelParser, ParsedModel};
use crate::settings::LoaderConfig;

/// A mountable drawing surface supplied by the host UI
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub id: Uuid,
    pub width: u32,
    pub height: u32,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            width,
            height,
        }
    }
}

/// Builds one backend bound to one surface.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn construct(
        &self,
        surface: &Surface,
        background: Rgb,
    ) -> Result<Box<dyn RenderingBackend>, BackendError>;
}

/// Operations the session core consumes from a rendering backend.
///
/// Pointer positions are in surface pixels, origin top-left.
#[async_trait]
pub trait RenderingBackend: Send {
    fn add_axes(&mut self);

    fn add_grid(&mut self);

    async fn apply_loader_config(&mut self, config: &LoaderConfig) -> Result<(), BackendError>;

    /// Toggle worker-based parsing and point it at its decoding assets.
    fn configure_worker(&mut self, enabled: bool, asset_path: &Path);

    fn set_parsing_asset_path(&mut self, path: &Path);

    /// Parser matching the current loader configuration.
    fn parser(&self) -> Arc<dyn ModelParser>;

    fn register_model(&mut self, model: ParsedModel) -> Result<ModelId, BackendError>;

    fn render_shadow(&mut self, model: ModelId);

    fn set_clipping_active(&mut self, active: bool);

    /// Lightweight hover query; highlights the element under the pointer.
    fn pre_pick(&mut self, pointer: Vec2) -> Option<ElementRef>;

    /// Resolve and select the element under the pointer.
    fn pick(&mut self, pointer: Vec2, exclusive: bool) -> Option<ElementRef>;

    /// Place a plane aligned to `anchor`. `None` when there is nothing to align to.
    fn create_clipping_plane(
        &mut self,
        id: PlaneId,
        anchor: Option<&ElementRef>,
    ) -> Option<PlaneGeometry>;

    fn remove_clipping_plane(&mut self, id: PlaneId);

    /// Release GPU and worker resources. Called at most once.
    async fn dispose(&mut self) -> Result<(), BackendError>;
}
