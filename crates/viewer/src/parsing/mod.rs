//! Model parsing and the background parse worker.
//!
//! Parsing is handed to a dedicated thread over a channel. Each request
//! carries a `request_id` that the completion echoes back, so the loader can
//! tell a current answer from a stale one after the session moved on.

pub mod scene_json;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use shared::ElementId;
use tokio::sync::oneshot;

use crate::backend::picking::Aabb;
use crate::error::BackendError;

pub use scene_json::SceneJsonParser;

/// One element of a parsed model, ready for registration
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedElement {
    pub id: ElementId,
    pub ifc_type: String,
    pub bounds: Aabb,
}

/// Output of a parser: everything the backend needs to register a model
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedModel {
    pub url: String,
    pub name: String,
    pub elements: Vec<ParsedElement>,
}

/// Fetches and decodes a model. Runs on the parse worker thread.
pub trait ModelParser: Send + Sync {
    fn parse(&self, url: &str, asset_path: &Path) -> Result<ParsedModel, BackendError>;
}

/// A unit of work for the parse worker
pub struct ParseRequest {
    pub request_id: u64,
    pub url: String,
    pub parser: Arc<dyn ModelParser>,
    reply: oneshot::Sender<ParseCompletion>,
}

/// Answer to a [`ParseRequest`], correlated by `request_id`
#[derive(Debug)]
pub struct ParseCompletion {
    pub request_id: u64,
    pub result: Result<ParsedModel, BackendError>,
}

/// Handle to an accepted request
pub struct PendingParse {
    pub request_id: u64,
    pub completion: oneshot::Receiver<ParseCompletion>,
}

impl PendingParse {
    /// Wait for the worker's answer. A completion carrying a different id is
    /// rejected rather than applied.
    pub async fn wait(self) -> Result<ParsedModel, BackendError> {
        let completion = self.completion.await.map_err(|_| BackendError::WorkerGone)?;
        if completion.request_id != self.request_id {
            tracing::warn!(
                "Discarding parse completion {} (expected {})",
                completion.request_id,
                self.request_id
            );
            return Err(BackendError::WorkerGone);
        }
        completion.result
    }
}

/// Background thread that owns model decoding for one session
pub struct ParseWorker {
    asset_path: PathBuf,
    sender: Option<mpsc::Sender<ParseRequest>>,
    thread: Option<JoinHandle<()>>,
    /// Set on shutdown; queued requests are dropped unparsed
    stopped: Arc<AtomicBool>,
    next_request_id: u64,
}

impl ParseWorker {
    pub fn spawn(asset_path: PathBuf) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<ParseRequest>();
        let thread_assets = asset_path.clone();
        let stopped = Arc::new(AtomicBool::new(false));
        let thread_stopped = stopped.clone();
        let thread = std::thread::Builder::new()
            .name("ifc-parse-worker".to_string())
            .spawn(move || run_worker(receiver, thread_assets, thread_stopped))?;

        tracing::debug!("Parse worker started (assets: {})", asset_path.display());
        Ok(Self {
            asset_path,
            sender: Some(sender),
            thread: Some(thread),
            stopped,
            next_request_id: 1,
        })
    }

    pub fn asset_path(&self) -> &Path {
        &self.asset_path
    }

    /// Queue a parse. The result arrives on the returned [`PendingParse`].
    pub fn submit(
        &mut self,
        url: &str,
        parser: Arc<dyn ModelParser>,
    ) -> Result<PendingParse, BackendError> {
        let sender = self.sender.as_ref().ok_or(BackendError::WorkerGone)?;
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let (reply, completion) = oneshot::channel();
        sender
            .send(ParseRequest {
                request_id,
                url: url.to_string(),
                parser,
                reply,
            })
            .map_err(|_| BackendError::WorkerGone)?;

        Ok(PendingParse {
            request_id,
            completion,
        })
    }

    /// Close the request channel. A parse already running is allowed to
    /// finish; requests still queued behind it are discarded unparsed.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.is_finished() {
                let _ = thread.join();
            }
        }
        tracing::debug!("Parse worker shut down");
    }

    pub fn is_running(&self) -> bool {
        self.sender.is_some()
    }
}

impl Drop for ParseWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    receiver: mpsc::Receiver<ParseRequest>,
    asset_path: PathBuf,
    stopped: Arc<AtomicBool>,
) {
    while let Ok(request) = receiver.recv() {
        if stopped.load(Ordering::SeqCst) {
            tracing::debug!("Dropping parse request {} after shutdown", request.request_id);
            continue;
        }
        if request.reply.is_closed() {
            tracing::debug!("Skipping parse request {}, caller is gone", request.request_id);
            continue;
        }
        tracing::debug!("Parsing {} (request {})", request.url, request.request_id);
        let result = request.parser.parse(&request.url, &asset_path);
        let completion = ParseCompletion {
            request_id: request.request_id,
            result,
        };
        if request.reply.send(completion).is_err() {
            tracing::debug!("Parse request {} abandoned", request.request_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    struct EchoParser;

    impl ModelParser for EchoParser {
        fn parse(&self, url: &str, asset_path: &Path) -> Result<ParsedModel, BackendError> {
            if url.contains("broken") {
                return Err(BackendError::Parse(format!("cannot decode {url}")));
            }
            Ok(ParsedModel {
                url: url.to_string(),
                name: asset_path.display().to_string(),
                elements: vec![ParsedElement {
                    id: 7,
                    ifc_type: "IFCDOOR".to_string(),
                    bounds: Aabb::new(Vec3::ZERO, Vec3::ONE),
                }],
            })
        }
    }

    #[tokio::test]
    async fn test_worker_answers_with_matching_id() {
        let mut worker = ParseWorker::spawn(PathBuf::from("wasm/")).unwrap();
        let first = worker.submit("a.ifc", Arc::new(EchoParser)).unwrap();
        let second = worker.submit("b.ifc", Arc::new(EchoParser)).unwrap();
        assert_eq!(first.request_id + 1, second.request_id);

        let model = second.wait().await.unwrap();
        assert_eq!(model.url, "b.ifc");
        assert_eq!(model.name, "wasm/");
        assert_eq!(first.wait().await.unwrap().url, "a.ifc");
    }

    #[tokio::test]
    async fn test_worker_reports_parse_errors() {
        let mut worker = ParseWorker::spawn(PathBuf::from("./")).unwrap();
        let pending = worker.submit("broken.ifc", Arc::new(EchoParser)).unwrap();
        let err = pending.wait().await.unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)));
    }

    /// Blocks each parse until released and counts how many ran
    struct GatedParser {
        started: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
        parses: AtomicUsize,
    }

    impl GatedParser {
        fn new() -> (Arc<Self>, mpsc::Receiver<()>, mpsc::Sender<()>) {
            let (started_tx, started_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            let parser = Arc::new(Self {
                started: Mutex::new(started_tx),
                release: Mutex::new(release_rx),
                parses: AtomicUsize::new(0),
            });
            (parser, started_rx, release_tx)
        }
    }

    impl ModelParser for GatedParser {
        fn parse(&self, url: &str, asset_path: &Path) -> Result<ParsedModel, BackendError> {
            self.parses.fetch_add(1, Ordering::SeqCst);
            let _ = self.started.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            EchoParser.parse(url, asset_path)
        }
    }

    /// Wait until the worker thread dropped every request it was handed
    fn wait_until_released(parser: &Arc<GatedParser>) {
        for _ in 0..500 {
            if Arc::strong_count(parser) == 1 {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("worker still holds parse requests");
    }

    #[test]
    fn test_queued_requests_dropped_after_shutdown() {
        let (parser, started, release) = GatedParser::new();
        let mut worker = ParseWorker::spawn(PathBuf::from("./")).unwrap();
        let pending: Vec<_> = ["a.ifc", "b.ifc", "c.ifc", "d.ifc"]
            .into_iter()
            .map(|url| worker.submit(url, parser.clone()).unwrap())
            .collect();
        started.recv_timeout(Duration::from_secs(5)).unwrap();

        drop(pending);
        drop(worker);
        for _ in 0..4 {
            let _ = release.send(());
        }

        wait_until_released(&parser);
        assert_eq!(parser.parses.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_request_not_parsed() {
        let (parser, started, release) = GatedParser::new();
        let mut worker = ParseWorker::spawn(PathBuf::from("./")).unwrap();
        let first = worker.submit("a.ifc", parser.clone()).unwrap();
        let second = worker.submit("b.ifc", parser.clone()).unwrap();
        started.recv_timeout(Duration::from_secs(5)).unwrap();

        drop(second);
        release.send(()).unwrap();
        assert_eq!(first.wait().await.unwrap().url, "a.ifc");

        worker.shutdown();
        let _ = release.send(());
        wait_until_released(&parser);
        assert_eq!(parser.parses.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let mut worker = ParseWorker::spawn(PathBuf::from("./")).unwrap();
        worker.shutdown();
        assert!(!worker.is_running());
        let err = worker.submit("a.ifc", Arc::new(EchoParser)).err();
        assert_eq!(err, Some(BackendError::WorkerGone));
    }
}
