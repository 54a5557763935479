//! Model loading against a Ready session.
//!
//! Ordering contract: `configure_background_parsing` (or
//! `skip_background_parsing`) must run before `load`. Loading an
//! unconfigured session fails with `PreconditionViolation` and has no side
//! effects. Clipping is switched on only after the model is registered and
//! its shadow rendered, so a failed load leaves clipping as it was.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared::ModelId;
use uuid::Uuid;

use crate::error::{BackendError, ViewerError};
use crate::parsing::{ModelParser, ParseWorker, ParsedModel, PendingParse};
use crate::session::{ParsingMode, Session, SessionState};

/// A model registered with one session. Invalid once the session is disposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelHandle {
    pub session_id: Uuid,
    pub model_id: ModelId,
}

enum Pending {
    Inline {
        parser: Arc<dyn ModelParser>,
        asset_path: std::path::PathBuf,
    },
    Worker(PendingParse),
}

/// Sequences parser setup and model loading.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelLoader;

impl ModelLoader {
    pub fn new() -> Self {
        Self
    }

    /// Move parsing onto a background worker that decodes with the assets
    /// under `worker_asset_path`. Reconfiguring replaces the previous worker.
    pub fn configure_background_parsing(
        &self,
        session: &Session,
        worker_asset_path: &Path,
    ) -> Result<(), ViewerError> {
        session.with_inner(|inner| -> Result<(), ViewerError> {
            inner.require_ready("configure_background_parsing")?;
            let worker = ParseWorker::spawn(worker_asset_path.to_path_buf()).map_err(|e| {
                tracing::error!("Failed to start parse worker: {e}");
                ViewerError::WorkerStart(e)
            })?;
            if let Some(backend) = inner.backend.as_mut() {
                backend.configure_worker(true, worker_asset_path);
                backend.set_parsing_asset_path(worker_asset_path);
            }
            inner.parsing = ParsingMode::Worker(worker);
            Ok(())
        })?;

        tracing::info!(
            "Session {}: background parsing enabled (assets: {})",
            session.id(),
            worker_asset_path.display()
        );
        Ok(())
    }

    /// Parse on the caller's task instead of a worker.
    pub fn skip_background_parsing(
        &self,
        session: &Session,
        asset_path: &Path,
    ) -> Result<(), ViewerError> {
        session.with_inner(|inner| -> Result<(), ViewerError> {
            inner.require_ready("skip_background_parsing")?;
            if let Some(backend) = inner.backend.as_mut() {
                backend.configure_worker(false, asset_path);
                backend.set_parsing_asset_path(asset_path);
            }
            inner.parsing = ParsingMode::Inline {
                asset_path: asset_path.to_path_buf(),
            };
            Ok(())
        })?;

        tracing::info!("Session {}: background parsing skipped", session.id());
        Ok(())
    }

    /// Fetch, parse and register a model, render its shadow and enable
    /// clipping.
    ///
    /// A result that arrives after the session was disposed is discarded and
    /// reported as `SessionDisposed`. Parse failures are `Load` errors; the
    /// session stays Ready.
    pub async fn load(&self, session: &Session, url: &str) -> Result<ModelHandle, ViewerError> {
        let (generation, pending) = session.with_inner(|inner| -> Result<_, ViewerError> {
            inner.require_ready("load")?;
            let parser = inner
                .backend
                .as_ref()
                .map(|backend| backend.parser())
                .ok_or(ViewerError::PreconditionViolation {
                    operation: "load",
                    expected: "a session with a backend",
                    state: inner.state,
                })?;
            let pending = match &mut inner.parsing {
                ParsingMode::Unconfigured => {
                    return Err(ViewerError::PreconditionViolation {
                        operation: "load",
                        expected: "background parsing configured or skipped",
                        state: inner.state,
                    })
                }
                ParsingMode::Inline { asset_path } => Pending::Inline {
                    parser,
                    asset_path: asset_path.clone(),
                },
                ParsingMode::Worker(worker) => {
                    Pending::Worker(worker.submit(url, parser).map_err(ViewerError::Load)?)
                }
            };
            Ok((inner.generation, pending))
        })?;

        tracing::info!("Session {}: loading {url}", session.id());

        let parsed = match pending {
            Pending::Inline { parser, asset_path } => parser.parse(url, &asset_path),
            Pending::Worker(pending) => pending.wait().await,
        };

        self.install(session, generation, url, parsed)
    }

    fn install(
        &self,
        session: &Session,
        generation: u64,
        url: &str,
        parsed: Result<ParsedModel, BackendError>,
    ) -> Result<ModelHandle, ViewerError> {
        let session_id = session.id();
        session.with_inner(|inner| -> Result<ModelHandle, ViewerError> {
            if inner.state != SessionState::Ready || inner.generation != generation {
                tracing::info!("Session {session_id}: discarding late result for {url}");
                return Err(ViewerError::SessionDisposed("load"));
            }

            let parsed = parsed.map_err(|e| {
                tracing::error!("Session {session_id}: failed to load {url}: {e}");
                ViewerError::Load(e)
            })?;
            let element_count = parsed.elements.len();

            let Some(backend) = inner.backend.as_mut() else {
                return Err(ViewerError::SessionDisposed("load"));
            };
            let model_id = backend.register_model(parsed).map_err(ViewerError::Load)?;
            backend.render_shadow(model_id);
            backend.set_clipping_active(true);

            inner.clipping_active = true;
            inner.models.push(model_id);

            tracing::info!(
                "Session {session_id}: model {} loaded from {url} ({element_count} elements)",
                model_id.0
            );
            Ok(ModelHandle {
                session_id,
                model_id,
            })
        })
    }

    /// Whether `handle` still refers to a live model of `session`
    pub fn is_valid(&self, session: &Session, handle: &ModelHandle) -> bool {
        handle.session_id == session.id()
            && session.with_inner(|inner| {
                inner.state == SessionState::Ready && inner.models.contains(&handle.model_id)
            })
    }
}
