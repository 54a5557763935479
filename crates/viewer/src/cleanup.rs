//! Binds surface mount/unmount to session initialize/dispose.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::backend::Surface;
use crate::error::ViewerError;
use crate::session::{Disposal, Session, SessionManager, SessionState};

/// Guarantees exactly one `dispose` per mounted session, whether teardown
/// comes before, during or after initialization and model loading.
///
/// Clones share state, so an unmount handler can race an in-flight mount.
#[derive(Clone)]
pub struct CleanupCoordinator {
    manager: Arc<SessionManager>,
    mounted: Arc<Mutex<Option<Session>>>,
    disposals: Arc<AtomicUsize>,
}

impl CleanupCoordinator {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self {
            manager,
            mounted: Arc::new(Mutex::new(None)),
            disposals: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// The currently mounted session, if any
    pub fn session(&self) -> Option<Session> {
        self.mounted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of sessions this coordinator has disposed
    pub fn disposals(&self) -> usize {
        self.disposals.load(Ordering::SeqCst)
    }

    /// Surface became available: create its session and initialize it.
    ///
    /// The session is registered before initialization starts, so an unmount
    /// arriving mid-initialization finds it.
    pub async fn on_mount(&self, surface: Surface) -> Result<Session, ViewerError> {
        let session = {
            let mut mounted = self.mounted.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = mounted.as_ref() {
                if existing.state() != SessionState::Disposed {
                    return Err(ViewerError::PreconditionViolation {
                        operation: "mount",
                        expected: "no live session on this surface",
                        state: existing.state(),
                    });
                }
            }
            let session = self.manager.create(surface);
            *mounted = Some(session.clone());
            session
        };

        self.manager.initialize(&session).await?;
        Ok(session)
    }

    /// Surface is going away: dispose the mounted session. Disposal errors
    /// are logged, never returned.
    pub async fn on_unmount(&self) {
        let session = self
            .mounted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(session) = session else {
            tracing::debug!("Unmount without a mounted session");
            return;
        };

        match self.manager.dispose(&session).await {
            Ok(Disposal::AlreadyDisposed) => {
                tracing::debug!("Session {} was already disposed", session.id());
            }
            Ok(outcome) => {
                self.disposals.fetch_add(1, Ordering::SeqCst);
                tracing::info!("Session {} unmounted ({outcome:?})", session.id());
            }
            Err(e) => {
                self.disposals.fetch_add(1, Ordering::SeqCst);
                tracing::error!("Session {} teardown: {e}", session.id());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::FakeBackendFactory;
    use crate::session::SessionConfig;

    fn coordinator(factory: &FakeBackendFactory) -> CleanupCoordinator {
        CleanupCoordinator::new(Arc::new(SessionManager::new(
            Arc::new(factory.clone()),
            SessionConfig::default(),
        )))
    }

    #[tokio::test]
    async fn test_mount_unmount() {
        let factory = FakeBackendFactory::new();
        let c = coordinator(&factory);
        let session = c.on_mount(Surface::new(640, 480)).await.unwrap();
        assert!(session.is_ready());

        c.on_unmount().await;
        assert_eq!(session.state(), SessionState::Disposed);
        assert_eq!(c.disposals(), 1);
        assert_eq!(factory.disposed(), 1);
        assert!(c.session().is_none());
    }

    #[tokio::test]
    async fn test_double_unmount_disposes_once() {
        let factory = FakeBackendFactory::new();
        let c = coordinator(&factory);
        c.on_mount(Surface::new(640, 480)).await.unwrap();

        c.on_unmount().await;
        c.on_unmount().await;
        assert_eq!(c.disposals(), 1);
        assert_eq!(factory.disposed(), 1);
    }

    #[tokio::test]
    async fn test_second_mount_rejected_while_live() {
        let factory = FakeBackendFactory::new();
        let c = coordinator(&factory);
        c.on_mount(Surface::new(640, 480)).await.unwrap();

        let err = c.on_mount(Surface::new(640, 480)).await.unwrap_err();
        assert!(err.is_precondition());
        assert_eq!(factory.constructed(), 1);
    }

    #[tokio::test]
    async fn test_disposal_error_is_swallowed() {
        let factory = FakeBackendFactory::new();
        factory.fail_dispose(true);
        let c = coordinator(&factory);
        let session = c.on_mount(Surface::new(640, 480)).await.unwrap();

        c.on_unmount().await;
        assert_eq!(session.state(), SessionState::Disposed);
        assert_eq!(c.disposals(), 1);
    }
}
