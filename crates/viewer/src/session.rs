//! Viewing session lifecycle.
//!
//! A [`Session`] binds one surface to one backend and moves through
//! `Uninitialized -> Initializing -> Ready -> Disposed`. `Disposed` is
//! terminal. The session is passed explicitly to every loader and
//! interaction call; there is no global "current viewer".
//!
//! Teardown may race initialization. `dispose` never waits for an in-flight
//! `initialize`: it marks the session Disposed and returns, and the
//! initializing task releases the backend it just built when it observes the
//! state on completion.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use shared::{ModelId, Rgb};
use uuid::Uuid;

use crate::backend::{BackendFactory, RenderingBackend, Surface};
use crate::clipping::{ClippingPlane, ClippingPlaneSet};
use crate::error::{BackendError, ViewerError};
use crate::parsing::ParseWorker;
use crate::selection::SelectionState;
use crate::settings::{LoaderConfig, ViewerSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Disposed,
}

/// How models get parsed for this session
pub(crate) enum ParsingMode {
    /// Neither configured nor skipped yet; `load` refuses to run
    Unconfigured,
    Inline { asset_path: std::path::PathBuf },
    Worker(ParseWorker),
}

pub(crate) struct SessionInner {
    pub(crate) state: SessionState,
    pub(crate) surface: Surface,
    pub(crate) backend: Option<Box<dyn RenderingBackend>>,
    /// Bumped on disposal; in-flight work compares against it
    pub(crate) generation: u64,
    pub(crate) parsing: ParsingMode,
    pub(crate) selection: SelectionState,
    pub(crate) planes: ClippingPlaneSet,
    pub(crate) clipping_active: bool,
    pub(crate) models: Vec<ModelId>,
}

impl SessionInner {
    pub(crate) fn require_ready(&self, operation: &'static str) -> Result<(), ViewerError> {
        if self.state == SessionState::Ready {
            Ok(())
        } else {
            Err(ViewerError::PreconditionViolation {
                operation,
                expected: "a Ready session",
                state: self.state,
            })
        }
    }

    /// Backend of a Ready session
    pub(crate) fn ready_backend(&mut self) -> Option<&mut Box<dyn RenderingBackend>> {
        if self.state == SessionState::Ready {
            self.backend.as_mut()
        } else {
            None
        }
    }
}

/// Handle to one viewing session. Clones share the same session.
#[derive(Clone)]
pub struct Session {
    id: Uuid,
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    fn new(surface: Surface) -> Self {
        Self {
            id: Uuid::new_v4(),
            inner: Arc::new(Mutex::new(SessionInner {
                state: SessionState::Uninitialized,
                surface,
                backend: None,
                generation: 0,
                parsing: ParsingMode::Unconfigured,
                selection: SelectionState::default(),
                planes: ClippingPlaneSet::default(),
                clipping_active: false,
                models: Vec::new(),
            })),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run `f` with the session locked. Never held across an await.
    pub(crate) fn with_inner<R>(&self, f: impl FnOnce(&mut SessionInner) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn state(&self) -> SessionState {
        self.with_inner(|inner| inner.state)
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    pub fn surface(&self) -> Surface {
        self.with_inner(|inner| inner.surface.clone())
    }

    pub fn has_backend(&self) -> bool {
        self.with_inner(|inner| inner.backend.is_some())
    }

    /// Snapshot of hover/pick state; `None` once disposed
    pub fn selection(&self) -> Option<SelectionState> {
        self.with_inner(|inner| {
            (inner.state != SessionState::Disposed).then(|| inner.selection.clone())
        })
    }

    /// Number of clipping planes; `None` once disposed
    pub fn plane_count(&self) -> Option<usize> {
        self.with_inner(|inner| (inner.state != SessionState::Disposed).then(|| inner.planes.len()))
    }

    /// Clipping planes in creation order; `None` once disposed
    pub fn planes(&self) -> Option<Vec<ClippingPlane>> {
        self.with_inner(|inner| {
            (inner.state != SessionState::Disposed).then(|| inner.planes.iter().cloned().collect())
        })
    }

    pub fn clipping_active(&self) -> bool {
        self.with_inner(|inner| inner.clipping_active)
    }

    pub fn background_parsing(&self) -> bool {
        self.with_inner(|inner| matches!(inner.parsing, ParsingMode::Worker(_)))
    }

    pub fn model_count(&self) -> usize {
        self.with_inner(|inner| inner.models.len())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// What a `dispose` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    /// The backend was released by this call
    Released,
    /// Initialization was still running; it releases the backend on completion
    Deferred,
    /// Never initialized, nothing to release
    Unused,
    /// Already disposed; no-op
    AlreadyDisposed,
}

/// Scene defaults applied to every new backend
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub background: Rgb,
    pub axes: bool,
    pub grid: bool,
    pub loader: LoaderConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_settings(&ViewerSettings::default())
    }
}

impl SessionConfig {
    pub fn from_settings(settings: &ViewerSettings) -> Self {
        Self {
            background: settings.viewport.background_color,
            axes: settings.scene.axes,
            grid: settings.scene.grid,
            loader: settings.loader.clone(),
        }
    }
}

/// Owns session lifecycles: builds backends and tears them down.
pub struct SessionManager {
    factory: Arc<dyn BackendFactory>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(factory: Arc<dyn BackendFactory>, config: SessionConfig) -> Self {
        Self { factory, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// New session for `surface`, not yet initialized
    pub fn create(&self, surface: Surface) -> Session {
        Session::new(surface)
    }

    /// Create and initialize a session in one step
    pub async fn open(&self, surface: Surface) -> Result<Session, ViewerError> {
        let session = self.create(surface);
        self.initialize(&session).await?;
        Ok(session)
    }

    /// Build the backend, decorate the scene and apply loader options.
    ///
    /// Allowed once, from `Uninitialized`. If the session is disposed while
    /// this runs, the freshly built backend is released instead of installed
    /// and `SessionDisposed` is returned.
    pub async fn initialize(&self, session: &Session) -> Result<(), ViewerError> {
        let surface = session.with_inner(|inner| {
            if inner.state != SessionState::Uninitialized {
                return Err(ViewerError::PreconditionViolation {
                    operation: "initialize",
                    expected: "an Uninitialized session",
                    state: inner.state,
                });
            }
            inner.state = SessionState::Initializing;
            Ok(inner.surface.clone())
        })?;
        tracing::info!("Session {} initializing ({}x{})", session.id(), surface.width, surface.height);

        let mut backend = match self.factory.construct(&surface, self.config.background).await {
            Ok(backend) => backend,
            Err(e) => {
                tracing::error!("Session {}: backend construction failed: {e}", session.id());
                session.with_inner(|inner| inner.state = SessionState::Disposed);
                return Err(ViewerError::Initialization(e));
            }
        };

        if self.config.axes {
            backend.add_axes();
        }
        if self.config.grid {
            backend.add_grid();
        }

        if let Err(e) = backend.apply_loader_config(&self.config.loader).await {
            tracing::error!("Session {}: loader configuration failed: {e}", session.id());
            session.with_inner(|inner| inner.state = SessionState::Disposed);
            release(session.id(), backend.as_mut()).await;
            return Err(ViewerError::Initialization(e));
        }

        let leftover = session.with_inner(|inner| {
            if inner.state == SessionState::Disposed {
                return Some(backend);
            }
            inner.backend = Some(backend);
            inner.state = SessionState::Ready;
            None
        });

        match leftover {
            Some(mut backend) => {
                tracing::info!(
                    "Session {} was disposed during initialization, releasing backend",
                    session.id()
                );
                release(session.id(), backend.as_mut()).await;
                Err(ViewerError::SessionDisposed("initialize"))
            }
            None => {
                tracing::info!("Session {} ready", session.id());
                Ok(())
            }
        }
    }

    /// Release the backend and move to `Disposed`. Idempotent.
    ///
    /// Backend release failures come back as `ViewerError::Disposal`; the
    /// session is Disposed regardless.
    pub async fn dispose(&self, session: &Session) -> Result<Disposal, ViewerError> {
        let (previous, backend) = session.with_inner(|inner| {
            let previous = inner.state;
            if previous == SessionState::Disposed {
                return (previous, None);
            }
            inner.state = SessionState::Disposed;
            inner.generation += 1;
            // Dropping the worker closes its channel
            inner.parsing = ParsingMode::Unconfigured;
            inner.selection.clear();
            inner.planes.clear();
            inner.clipping_active = false;
            inner.models.clear();
            (previous, inner.backend.take())
        });

        match (previous, backend) {
            (SessionState::Disposed, _) => Ok(Disposal::AlreadyDisposed),
            (_, Some(mut backend)) => {
                tracing::info!("Session {} disposing", session.id());
                backend
                    .dispose()
                    .await
                    .map_err(ViewerError::Disposal)?;
                Ok(Disposal::Released)
            }
            (SessionState::Initializing, None) => {
                tracing::info!("Session {} disposed while initializing", session.id());
                Ok(Disposal::Deferred)
            }
            (_, None) => Ok(Disposal::Unused),
        }
    }
}

/// Dispose a backend that never made it into a session. Errors are logged.
async fn release(session_id: Uuid, backend: &mut dyn RenderingBackend) {
    if let Err(e) = backend.dispose().await {
        log_disposal_error(session_id, &e);
    }
}

pub(crate) fn log_disposal_error(session_id: Uuid, e: &BackendError) {
    tracing::warn!("Session {session_id}: backend release failed: {e}");
}
