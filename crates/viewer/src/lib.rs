// Library crate: the viewing session core, its headless backend and the
// command interface used by the binary, scripts and integration tests.

pub mod backend;
pub mod cleanup;
pub mod clipping;
pub mod command;
pub mod error;
pub mod fixtures;
pub mod harness;
pub mod interaction;
pub mod loader;
pub mod parsing;
pub mod selection;
pub mod session;
pub mod settings;

pub use backend::scene::{SceneBackend, SceneBackendFactory};
pub use backend::{BackendFactory, RenderingBackend, Surface};
pub use cleanup::CleanupCoordinator;
pub use error::{BackendError, ViewerError};
pub use interaction::{InteractionController, KeyEvent, KeyOutcome, PointerEvent};
pub use loader::{ModelHandle, ModelLoader};
pub use session::{Disposal, Session, SessionConfig, SessionManager, SessionState};
pub use settings::ViewerSettings;
