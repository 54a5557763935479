//! Pointer and keyboard handling for a viewing session.
//!
//! Every handler is a no-op unless the session is Ready.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use shared::ElementRef;

use crate::session::{Session, SessionState};
use crate::settings::KeyBindings;

/// Pointer position in surface pixels, origin top-left
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub x: f32,
    pub y: f32,
}

impl PointerEvent {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Key press, identified by its physical key code (e.g. "KeyP")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub code: String,
}

impl KeyEvent {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

/// Whether a key event was consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Handled,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    CreatePlane,
    DeletePlane,
}

/// Translates input events into hover, pick and clipping plane changes.
#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    keys: KeyBindings,
}

impl InteractionController {
    pub fn new(keys: KeyBindings) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &KeyBindings {
        &self.keys
    }

    /// Re-derive the hover target. Unthrottled; repeating it is harmless.
    pub fn on_pointer_move(&self, session: &Session, event: &PointerEvent) -> Option<ElementRef> {
        session.with_inner(|inner| {
            let backend = inner.ready_backend()?;
            let hovered = backend.pre_pick(event.position());
            if inner.selection.set_hovered(hovered.clone()) {
                tracing::debug!("Hover: {:?}", hovered);
            }
            hovered
        })
    }

    /// Exclusive pick of the element under the pointer. Nothing under the
    /// pointer leaves the current pick in place.
    pub fn on_pointer_double_click(
        &self,
        session: &Session,
        event: &PointerEvent,
    ) -> Option<ElementRef> {
        session.with_inner(|inner| {
            let backend = inner.ready_backend()?;
            let picked = backend.pick(event.position(), true)?;
            tracing::debug!("Picked {:?}", picked);
            inner.selection.pick(picked.clone());
            Some(picked)
        })
    }

    pub fn on_key_down(&self, session: &Session, event: &KeyEvent) -> KeyOutcome {
        let Some(action) = self.action_for(&event.code) else {
            return KeyOutcome::Ignored;
        };

        session.with_inner(|inner| {
            if inner.state != SessionState::Ready {
                return KeyOutcome::Ignored;
            }
            let anchor = inner.selection.focus().cloned();
            let Some(backend) = inner.backend.as_mut() else {
                return KeyOutcome::Ignored;
            };

            match action {
                KeyAction::CreatePlane => {
                    if !inner.clipping_active {
                        tracing::debug!("Clipping inactive, plane not created");
                        return KeyOutcome::Handled;
                    }
                    let id = inner.planes.next_id();
                    if let Some(geometry) = backend.create_clipping_plane(id, anchor.as_ref()) {
                        let plane = inner.planes.push(id, geometry);
                        tracing::debug!("Clipping plane {:?} created at {:?}", plane.id, plane.origin);
                    }
                }
                KeyAction::DeletePlane => {
                    if let Some(plane) = inner.planes.pop() {
                        backend.remove_clipping_plane(plane.id);
                        tracing::debug!("Clipping plane {:?} deleted", plane.id);
                    }
                }
            }
            KeyOutcome::Handled
        })
    }

    fn action_for(&self, code: &str) -> Option<KeyAction> {
        if code == self.keys.create_plane {
            Some(KeyAction::CreatePlane)
        } else if code == self.keys.delete_plane {
            Some(KeyAction::DeletePlane)
        } else {
            None
        }
    }
}
