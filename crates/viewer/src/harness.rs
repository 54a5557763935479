//! Headless test harness: a recording fake backend and helpers to drive a
//! session without a renderer.
//!
//! The fake can hold backend construction or model parsing open until the
//! test releases it, which makes teardown races deterministic.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use async_trait::async_trait;
use glam::Vec2;
use shared::{ElementRef, ModelId, PlaneGeometry, Rgb};
use tokio::sync::Notify;

use crate::backend::{BackendFactory, RenderingBackend, Surface};
use crate::clipping::PlaneId;
use crate::error::{BackendError, ViewerError};
use crate::fixtures;
use crate::interaction::{InteractionController, KeyEvent, KeyOutcome, PointerEvent};
use crate::loader::{ModelHandle, ModelLoader};
use crate::parsing::{ModelParser, ParsedModel};
use crate::session::{Session, SessionConfig, SessionManager};
use crate::settings::{KeyBindings, LoaderConfig};

/// One call observed by the fake backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Construct { background: Rgb },
    AddAxes,
    AddGrid,
    LoaderConfig(LoaderConfig),
    ConfigureWorker { enabled: bool, asset_path: PathBuf },
    SetParsingAssetPath(PathBuf),
    RegisterModel(ModelId),
    RenderShadow(ModelId),
    SetClippingActive(bool),
    PrePick,
    Pick { exclusive: bool },
    CreatePlane(PlaneId),
    RemovePlane(PlaneId),
    Dispose,
}

/// Blocks the parse worker until opened. Announces when a parse is waiting.
#[derive(Default)]
pub struct ParseGate {
    open: Mutex<bool>,
    opened: Condvar,
    entered: Notify,
}

impl ParseGate {
    fn wait(&self) {
        self.entered.notify_one();
        let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        while !*open {
            open = self
                .opened
                .wait(open)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Resolves once a parse is blocked on this gate
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn open(&self) {
        *self.open.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.opened.notify_all();
    }
}

#[derive(Default)]
struct FakeShared {
    calls: Mutex<Vec<BackendCall>>,
    constructed: AtomicUsize,
    disposed: AtomicUsize,
    parsed: AtomicUsize,
    fail_construct: AtomicBool,
    fail_config: AtomicBool,
    fail_dispose: AtomicBool,
    construct_gate: Mutex<Option<Arc<Notify>>>,
    parse_gate: Mutex<Option<Arc<ParseGate>>>,
    /// Pointer position (rounded pixels) → element under it
    targets: Mutex<HashMap<(i32, i32), ElementRef>>,
}

impl FakeShared {
    fn record(&self, call: BackendCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn target_at(&self, pointer: Vec2) -> Option<ElementRef> {
        let key = (pointer.x.round() as i32, pointer.y.round() as i32);
        self.targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }
}

/// Factory for [`FakeBackend`]s. Clones share the same call log and knobs.
#[derive(Clone, Default)]
pub struct FakeBackendFactory {
    shared: Arc<FakeShared>,
}

impl FakeBackendFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// All backend calls so far, in order
    pub fn calls(&self) -> Vec<BackendCall> {
        self.shared
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, call: &BackendCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn constructed(&self) -> usize {
        self.shared.constructed.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    pub fn parsed(&self) -> usize {
        self.shared.parsed.load(Ordering::SeqCst)
    }

    pub fn fail_construct(&self, fail: bool) {
        self.shared.fail_construct.store(fail, Ordering::SeqCst);
    }

    pub fn fail_config(&self, fail: bool) {
        self.shared.fail_config.store(fail, Ordering::SeqCst);
    }

    pub fn fail_dispose(&self, fail: bool) {
        self.shared.fail_dispose.store(fail, Ordering::SeqCst);
    }

    /// Make the next construction wait until the returned notify fires
    pub fn hold_construction(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self
            .shared
            .construct_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(gate.clone());
        gate
    }

    /// Make parses block until the returned gate is opened
    pub fn hold_parsing(&self) -> Arc<ParseGate> {
        let gate = Arc::new(ParseGate::default());
        *self
            .shared
            .parse_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(gate.clone());
        gate
    }

    /// Put `element` under the pointer at (`x`, `y`)
    pub fn set_target(&self, x: i32, y: i32, element: ElementRef) {
        self.shared
            .targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((x, y), element);
    }
}

#[async_trait]
impl BackendFactory for FakeBackendFactory {
    async fn construct(
        &self,
        _surface: &Surface,
        background: Rgb,
    ) -> Result<Box<dyn RenderingBackend>, BackendError> {
        let gate = self
            .shared
            .construct_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.shared.fail_construct.load(Ordering::SeqCst) {
            return Err(BackendError::Construction("no graphics context".to_string()));
        }
        self.shared.record(BackendCall::Construct { background });
        self.shared.constructed.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeBackend {
            shared: self.shared.clone(),
            next_model: 0,
        }))
    }
}

/// Backend that records every call and answers from canned data
pub struct FakeBackend {
    shared: Arc<FakeShared>,
    next_model: u32,
}

#[async_trait]
impl RenderingBackend for FakeBackend {
    fn add_axes(&mut self) {
        self.shared.record(BackendCall::AddAxes);
    }

    fn add_grid(&mut self) {
        self.shared.record(BackendCall::AddGrid);
    }

    async fn apply_loader_config(&mut self, config: &LoaderConfig) -> Result<(), BackendError> {
        if self.shared.fail_config.load(Ordering::SeqCst) {
            return Err(BackendError::Config("unsupported option".to_string()));
        }
        self.shared.record(BackendCall::LoaderConfig(config.clone()));
        Ok(())
    }

    fn configure_worker(&mut self, enabled: bool, asset_path: &Path) {
        self.shared.record(BackendCall::ConfigureWorker {
            enabled,
            asset_path: asset_path.to_path_buf(),
        });
    }

    fn set_parsing_asset_path(&mut self, path: &Path) {
        self.shared
            .record(BackendCall::SetParsingAssetPath(path.to_path_buf()));
    }

    fn parser(&self) -> Arc<dyn ModelParser> {
        Arc::new(FakeParser {
            shared: self.shared.clone(),
        })
    }

    fn register_model(&mut self, _model: ParsedModel) -> Result<ModelId, BackendError> {
        let id = ModelId(self.next_model);
        self.next_model += 1;
        self.shared.record(BackendCall::RegisterModel(id));
        Ok(id)
    }

    fn render_shadow(&mut self, model: ModelId) {
        self.shared.record(BackendCall::RenderShadow(model));
    }

    fn set_clipping_active(&mut self, active: bool) {
        self.shared.record(BackendCall::SetClippingActive(active));
    }

    fn pre_pick(&mut self, pointer: Vec2) -> Option<ElementRef> {
        self.shared.record(BackendCall::PrePick);
        self.shared.target_at(pointer)
    }

    fn pick(&mut self, pointer: Vec2, exclusive: bool) -> Option<ElementRef> {
        self.shared.record(BackendCall::Pick { exclusive });
        self.shared.target_at(pointer)
    }

    fn create_clipping_plane(
        &mut self,
        id: PlaneId,
        _anchor: Option<&ElementRef>,
    ) -> Option<PlaneGeometry> {
        self.shared.record(BackendCall::CreatePlane(id));
        Some(PlaneGeometry {
            origin: [0.0, 0.0, id.0 as f64],
            normal: [0.0, 0.0, 1.0],
        })
    }

    fn remove_clipping_plane(&mut self, id: PlaneId) {
        self.shared.record(BackendCall::RemovePlane(id));
    }

    async fn dispose(&mut self) -> Result<(), BackendError> {
        self.shared.record(BackendCall::Dispose);
        self.shared.disposed.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_dispose.load(Ordering::SeqCst) {
            return Err(BackendError::Release("context lost".to_string()));
        }
        Ok(())
    }
}

/// Parser behind [`FakeBackend`]. URLs containing "missing" fail to fetch,
/// "corrupt" fail to parse; anything else yields the house fixture.
pub struct FakeParser {
    shared: Arc<FakeShared>,
}

impl ModelParser for FakeParser {
    fn parse(&self, url: &str, _asset_path: &Path) -> Result<ParsedModel, BackendError> {
        let gate = self
            .shared
            .parse_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(gate) = gate {
            gate.wait();
        }
        self.shared.parsed.fetch_add(1, Ordering::SeqCst);

        if url.contains("missing") {
            return Err(BackendError::Fetch(format!("404 {url}")));
        }
        if url.contains("corrupt") {
            return Err(BackendError::Parse(format!("bad header in {url}")));
        }
        Ok(fixtures::parsed_house(url))
    }
}

/// Session stack wired to a [`FakeBackendFactory`]
pub struct TestHarness {
    pub factory: FakeBackendFactory,
    pub manager: Arc<SessionManager>,
    pub loader: ModelLoader,
    pub controller: InteractionController,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_keys(KeyBindings::default())
    }

    pub fn with_keys(keys: KeyBindings) -> Self {
        let factory = FakeBackendFactory::new();
        let manager = Arc::new(SessionManager::new(
            Arc::new(factory.clone()),
            SessionConfig::default(),
        ));
        Self {
            factory,
            manager,
            loader: ModelLoader::new(),
            controller: InteractionController::new(keys),
        }
    }

    /// A Ready session on an 800x600 surface
    pub async fn open(&self) -> Result<Session, ViewerError> {
        self.manager.open(Surface::new(800, 600)).await
    }

    /// A Ready session with `url` loaded through the background worker
    pub async fn open_loaded(&self, url: &str) -> Result<(Session, ModelHandle), ViewerError> {
        let session = self.open().await?;
        self.loader
            .configure_background_parsing(&session, Path::new("./"))?;
        let handle = self.loader.load(&session, url).await?;
        Ok((session, handle))
    }

    pub async fn dispose(&self, session: &Session) -> Result<(), ViewerError> {
        self.manager.dispose(session).await.map(|_| ())
    }

    // ── Input ─────────────────────────────────────────────────

    pub fn move_to(&self, session: &Session, x: f32, y: f32) -> Option<ElementRef> {
        self.controller
            .on_pointer_move(session, &PointerEvent::new(x, y))
    }

    pub fn double_click(&self, session: &Session, x: f32, y: f32) -> Option<ElementRef> {
        self.controller
            .on_pointer_double_click(session, &PointerEvent::new(x, y))
    }

    pub fn press(&self, session: &Session, code: &str) -> KeyOutcome {
        self.controller.on_key_down(session, &KeyEvent::new(code))
    }

    pub fn create_plane(&self, session: &Session) -> KeyOutcome {
        let code = self.controller.keys().create_plane.clone();
        self.press(session, &code)
    }

    pub fn delete_plane(&self, session: &Session) -> KeyOutcome {
        let code = self.controller.keys().delete_plane.clone();
        self.press(session, &code)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
