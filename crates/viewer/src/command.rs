//! JSON command protocol for scripted sessions.
//!
//! Commands replay host input (pointer and keyboard) and model loads
//! against one session, so a viewing session can be driven from a file.

use serde::{Deserialize, Serialize};

use crate::interaction::{InteractionController, KeyEvent, KeyOutcome, PointerEvent};
use crate::loader::ModelLoader;
use crate::session::Session;

/// A scripted host event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ViewerCommand {
    /// Pointer moved over the surface
    PointerMove { x: f32, y: f32 },
    /// Double click on the surface
    DoubleClick { x: f32, y: f32 },
    /// Key pressed, by key code ("KeyP")
    KeyDown { code: String },
    /// Load a model into the session
    Load { url: String },
    /// Report session state
    Inspect,
}

/// Response from executing a command.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl CommandResponse {
    fn ok_with_data(data: serde_json::Value) -> Self {
        Self {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
            data: None,
        }
    }
}

/// Everything a command needs: the session and the components acting on it
#[derive(Debug, Clone)]
pub struct CommandTarget {
    pub session: Session,
    pub loader: ModelLoader,
    pub controller: InteractionController,
}

impl CommandTarget {
    pub fn new(session: Session, loader: ModelLoader, controller: InteractionController) -> Self {
        Self {
            session,
            loader,
            controller,
        }
    }
}

/// Execute a single command against the target session.
pub async fn execute_command(target: &CommandTarget, cmd: ViewerCommand) -> CommandResponse {
    let session = &target.session;
    match cmd {
        ViewerCommand::PointerMove { x, y } => {
            let hovered = target
                .controller
                .on_pointer_move(session, &PointerEvent::new(x, y));
            CommandResponse::ok_with_data(serde_json::json!({ "hovered": hovered }))
        }

        ViewerCommand::DoubleClick { x, y } => {
            let picked = target
                .controller
                .on_pointer_double_click(session, &PointerEvent::new(x, y));
            CommandResponse::ok_with_data(serde_json::json!({ "picked": picked }))
        }

        ViewerCommand::KeyDown { code } => {
            let outcome = target.controller.on_key_down(session, &KeyEvent::new(code));
            CommandResponse::ok_with_data(serde_json::json!({
                "handled": outcome == KeyOutcome::Handled,
                "plane_count": session.plane_count(),
            }))
        }

        ViewerCommand::Load { url } => match target.loader.load(session, &url).await {
            Ok(handle) => CommandResponse::ok_with_data(serde_json::json!({ "model": handle })),
            Err(e) => CommandResponse::err(e.to_string()),
        },

        ViewerCommand::Inspect => {
            let selection = session.selection();
            CommandResponse::ok_with_data(serde_json::json!({
                "session": session.id(),
                "state": session.state(),
                "model_count": session.model_count(),
                "clipping_active": session.clipping_active(),
                "background_parsing": session.background_parsing(),
                "hovered": selection.as_ref().and_then(|s| s.hovered().cloned()),
                "picked": selection.as_ref().and_then(|s| s.picked().cloned()),
                "planes": session.planes(),
            }))
        }
    }
}

/// Parse and execute a single JSON command string.
pub async fn execute_json(target: &CommandTarget, json: &str) -> Result<CommandResponse, String> {
    let cmd: ViewerCommand =
        serde_json::from_str(json).map_err(|e| format!("Invalid command JSON: {e}"))?;
    Ok(execute_command(target, cmd).await)
}

/// Parse and execute multiple JSON commands (array), in order.
pub async fn execute_json_batch(
    target: &CommandTarget,
    json: &str,
) -> Result<Vec<CommandResponse>, String> {
    let cmds: Vec<ViewerCommand> =
        serde_json::from_str(json).map_err(|e| format!("Invalid commands JSON: {e}"))?;
    let mut responses = Vec::with_capacity(cmds.len());
    for cmd in cmds {
        responses.push(execute_command(target, cmd).await);
    }
    Ok(responses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::TestHarness;
    use shared::{ElementRef, ModelId};

    async fn target(h: &TestHarness) -> CommandTarget {
        let (session, _) = h.open_loaded("model.ifc").await.unwrap();
        CommandTarget::new(session, h.loader, h.controller.clone())
    }

    #[test]
    fn test_command_serde_key_down() {
        let json = r#"{"command": "key_down", "code": "KeyP"}"#;
        let cmd: ViewerCommand = serde_json::from_str(json).unwrap();
        assert_eq!(
            cmd,
            ViewerCommand::KeyDown {
                code: "KeyP".to_string()
            }
        );
    }

    #[test]
    fn test_command_serde_pointer_move() {
        let json = r#"{"command": "pointer_move", "x": 12.5, "y": 40}"#;
        let cmd: ViewerCommand = serde_json::from_str(json).unwrap();
        assert_eq!(cmd, ViewerCommand::PointerMove { x: 12.5, y: 40.0 });
    }

    #[test]
    fn test_command_serde_unknown() {
        let json = r#"{"command": "rotate"}"#;
        assert!(serde_json::from_str::<ViewerCommand>(json).is_err());
    }

    #[tokio::test]
    async fn test_inspect() {
        let h = TestHarness::new();
        let t = target(&h).await;
        let resp = execute_json(&t, r#"{"command": "inspect"}"#).await.unwrap();
        assert!(resp.success);
        let data = resp.data.unwrap();
        assert_eq!(data["state"], "Ready");
        assert_eq!(data["model_count"], 1);
        assert_eq!(data["clipping_active"], true);
    }

    #[tokio::test]
    async fn test_failed_load_reports_error() {
        let h = TestHarness::new();
        let t = target(&h).await;
        let resp = execute_command(
            &t,
            ViewerCommand::Load {
                url: "missing.ifc".to_string(),
            },
        )
        .await;
        assert!(!resp.success);
        assert!(resp.error.unwrap().contains("missing.ifc"));
    }

    #[tokio::test]
    async fn test_batch_pick_then_plane() {
        let h = TestHarness::new();
        let t = target(&h).await;
        let door = ElementRef::new(ModelId(0), 400);
        h.factory.set_target(100, 100, door.clone());

        let responses = execute_json_batch(
            &t,
            r#"[
                {"command": "double_click", "x": 100, "y": 100},
                {"command": "key_down", "code": "KeyP"},
                {"command": "key_down", "code": "KeyP"},
                {"command": "key_down", "code": "KeyO"}
            ]"#,
        )
        .await
        .unwrap();

        assert!(responses.iter().all(|r| r.success));
        let picked: ElementRef =
            serde_json::from_value(responses[0].data.as_ref().unwrap()["picked"].clone()).unwrap();
        assert_eq!(picked, door);
        assert_eq!(responses[2].data.as_ref().unwrap()["plane_count"], 2);
        assert_eq!(responses[3].data.as_ref().unwrap()["plane_count"], 1);
    }

    #[tokio::test]
    async fn test_invalid_batch() {
        let h = TestHarness::new();
        let t = target(&h).await;
        assert!(execute_json_batch(&t, "{").await.is_err());
    }
}
