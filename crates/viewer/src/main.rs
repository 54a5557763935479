use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use ifc_viewer_lib::command::{execute_json_batch, CommandTarget};
use ifc_viewer_lib::{
    CleanupCoordinator, InteractionController, ModelLoader, SceneBackendFactory, SessionConfig,
    SessionManager, Surface, ViewerSettings,
};

/// Headless surface size
const SURFACE_WIDTH: u32 = 1280;
const SURFACE_HEIGHT: u32 = 720;

#[derive(Debug, Default)]
struct Args {
    model: Option<String>,
    script: Option<PathBuf>,
    settings: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ifc_viewer=info,ifc_viewer_lib=info".into()),
        )
        .init();

    let args = parse_args();
    let settings = match &args.settings {
        Some(path) => match ViewerSettings::load_from(path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => ViewerSettings::load(),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    if runtime.block_on(run(args, settings)) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Mount, load, replay the script, unmount. Returns false on a fatal error.
async fn run(args: Args, settings: ViewerSettings) -> bool {
    let manager = Arc::new(SessionManager::new(
        Arc::new(SceneBackendFactory),
        SessionConfig::from_settings(&settings),
    ));
    let coordinator = CleanupCoordinator::new(manager);

    let session = match coordinator
        .on_mount(Surface::new(SURFACE_WIDTH, SURFACE_HEIGHT))
        .await
    {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Viewer failed to start: {e}");
            coordinator.on_unmount().await;
            return false;
        }
    };

    let loader = ModelLoader::new();
    let asset_path = &settings.parsing.worker_asset_path;
    let parsing = if settings.parsing.background {
        loader.configure_background_parsing(&session, asset_path)
    } else {
        loader.skip_background_parsing(&session, asset_path)
    };
    if let Err(e) = parsing {
        tracing::error!("{e}");
        coordinator.on_unmount().await;
        return false;
    }

    let url = args.model.unwrap_or_else(|| settings.model_url.clone());
    if let Err(e) = loader.load(&session, &url).await {
        // The session stays usable without a model
        tracing::warn!("{e}");
    }

    let mut ok = true;
    if let Some(path) = &args.script {
        let target = CommandTarget::new(
            session.clone(),
            loader,
            InteractionController::new(settings.keys.clone()),
        );
        ok = replay_script(&target, path).await;
    }

    coordinator.on_unmount().await;
    ok
}

async fn replay_script(target: &CommandTarget, path: &Path) -> bool {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to read script {}: {e}", path.display());
            return false;
        }
    };

    match execute_json_batch(target, &json).await {
        Ok(responses) => {
            tracing::info!("Replayed {} commands from {}", responses.len(), path.display());
            for response in &responses {
                match serde_json::to_string(response) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::error!("Failed to encode response: {e}"),
                }
            }
            true
        }
        Err(e) => {
            tracing::error!("{e}");
            false
        }
    }
}

fn parse_args() -> Args {
    let argv: Vec<String> = std::env::args().collect();
    let mut args = Args::default();
    let mut i = 1;
    while i < argv.len() {
        let value = argv.get(i + 1).cloned();
        match (argv[i].as_str(), value) {
            ("--model", Some(v)) => args.model = Some(v),
            ("--script", Some(v)) => args.script = Some(PathBuf::from(v)),
            ("--settings", Some(v)) => args.settings = Some(PathBuf::from(v)),
            (other, _) => {
                tracing::warn!("Ignoring argument {other}");
                i += 1;
                continue;
            }
        }
        i += 2;
    }
    args
}
