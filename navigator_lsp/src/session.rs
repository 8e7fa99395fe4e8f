//! Session handle for a spawned language-server process.
//!
//! The session runs on its own thread with a dedicated tokio runtime. The
//! owning thread talks to it over channels and never blocks on protocol
//! traffic: `start` returns before the server is ready, and readiness is
//! reported as a [`SessionEvent::Ready`] once the initialize handshake
//! completes.

use crate::messages::{LogLevel, SessionEvent, SessionRequest};
use crate::transport::{self, JsonRpcMessage, JsonRpcNotification, Transport};
use crossbeam_channel::{Receiver, Sender};
use lsp_types::{
    ClientCapabilities, GotoCapability, InitializeParams, InitializeResult, InitializedParams,
    LogMessageParams, ServerCapabilities, ShowMessageParams, TextDocumentClientCapabilities, Uri,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;

/// The only two requests this client ever issues.
const INIT_REQUEST_ID: i64 = 1;
const SHUTDOWN_REQUEST_ID: i64 = 2;

/// Converts a path to an LSP URI.
fn path_to_uri(path: &Path) -> Uri {
    let path_str = if cfg!(windows) {
        format!("file:///{}", path.to_string_lossy().replace('\\', "/"))
    } else {
        format!("file://{}", path.to_string_lossy())
    };
    path_str.parse().expect("Invalid URI from path")
}

/// How the child process I/O is wired. Only pipes are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoMode {
    #[default]
    Pipe,
}

/// How to launch the language server. Built once at activation and
/// immutable for the session's lifetime.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Command to start the server.
    pub command: String,
    /// Arguments to the command.
    pub args: Vec<String>,
    /// Child process I/O wiring.
    pub io: IoMode,
    /// A detached server is allowed to outlive the host process.
    pub detached: bool,
    /// Working directory.
    pub working_dir: Option<PathBuf>,
}

impl LaunchConfig {
    /// Creates a configuration with piped I/O and no detach.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            io: IoMode::Pipe,
            detached: false,
            working_dir: None,
        }
    }
}

/// Per-session options forwarded to the server at initialize time.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Workspace root the server should index, sent as `rootUri`.
    pub root_path: Option<PathBuf>,
}

/// Pending completion of a graceful shutdown.
///
/// Resolves once the session loop has wound down. There is no timeout on
/// the protocol side; a hung server blocks [`StopSignal::wait`] until the
/// host gives up via [`StopSignal::wait_timeout`].
pub struct StopSignal {
    done: Receiver<()>,
}

impl StopSignal {
    fn new(done: Receiver<()>) -> Self {
        Self { done }
    }

    /// A signal that is already resolved.
    pub fn ready() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let _ = tx.send(());
        Self { done: rx }
    }

    /// Blocks until the session loop has finished.
    pub fn wait(self) {
        let _ = self.done.recv();
    }

    /// Like [`StopSignal::wait`], with an upper bound. Returns false if the
    /// session was still winding down when the timeout elapsed.
    pub fn wait_timeout(self, timeout: Duration) -> bool {
        self.done.recv_timeout(timeout).is_ok()
    }
}

/// Handle to a running language-server session.
pub struct LspSession {
    request_tx: Sender<SessionRequest>,
    event_rx: Receiver<SessionEvent>,
    running: Arc<AtomicBool>,
    done_rx: Option<Receiver<()>>,
}

impl LspSession {
    /// Spawns the server process and starts the protocol session.
    ///
    /// Returns immediately. Spawn failures are reported asynchronously as
    /// [`SessionEvent::Exited`] with no exit code.
    pub fn start(config: LaunchConfig, options: SessionOptions) -> Self {
        let (request_tx, request_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let running = Arc::new(AtomicBool::new(true));
        let loop_running = running.clone();

        // The session owns its runtime so the host never has to be async.
        thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
            rt.block_on(run_session(
                config,
                options,
                request_rx,
                event_tx,
                loop_running,
            ));
            let _ = done_tx.send(());
        });

        Self {
            request_tx,
            event_rx,
            running,
            done_rx: Some(done_rx),
        }
    }

    /// Requests a graceful stop (protocol `shutdown` then `exit`) and
    /// returns the pending completion signal.
    pub fn stop(&mut self) -> StopSignal {
        let _ = self.request_tx.send(SessionRequest::Shutdown);
        match self.done_rx.take() {
            Some(done) => StopSignal::new(done),
            None => StopSignal::ready(),
        }
    }

    /// Returns whether the session loop is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Tries to receive the next session event (non-blocking).
    pub fn try_recv_event(&self) -> Option<SessionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Waits up to `timeout` for the next session event.
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<SessionEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

impl Drop for LspSession {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.request_tx.send(SessionRequest::Shutdown);
        }
    }
}

/// Internal message for the write task.
enum Outgoing {
    Request {
        id: i64,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Shutdown,
}

/// Runs the session loop: spawn, handshake, relay, teardown.
async fn run_session(
    config: LaunchConfig,
    options: SessionOptions,
    request_rx: Receiver<SessionRequest>,
    event_tx: Sender<SessionEvent>,
    running: Arc<AtomicBool>,
) {
    let mut cmd = Command::new(&config.command);
    cmd.args(&config.args);
    match config.io {
        IoMode::Pipe => {
            cmd.stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }
    }
    if let Some(ref dir) = config.working_dir {
        cmd.current_dir(dir);
    }
    // A non-detached server must not outlive its host.
    cmd.kill_on_drop(!config.detached);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            log::error!("Failed to start language server '{}': {}", config.command, e);
            running.store(false, Ordering::SeqCst);
            let _ = event_tx.send(SessionEvent::Exited { code: None });
            return;
        }
    };

    log::info!(
        "Started language server: {} {}",
        config.command,
        config.args.join(" ")
    );

    let stdin = child.stdin.take().expect("child stdin is piped");
    let stdout = child.stdout.take().expect("child stdout is piped");
    let stderr = child.stderr.take().expect("child stderr is piped");

    let (mut reader, mut writer) = Transport::new(stdout, stdin).split();

    // Channel for sending messages to the write task
    let (send_tx, mut send_rx) = mpsc::unbounded_channel::<Outgoing>();

    // Server stderr becomes log events, like an editor output channel.
    let stderr_events = event_tx.clone();
    let stderr_task = tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let _ = stderr_events.send(SessionEvent::Log {
                level: LogLevel::Log,
                message: line,
            });
        }
    });

    // Write task: drains the outgoing queue into the transport.
    let write_task = tokio::spawn(async move {
        while let Some(msg) = send_rx.recv().await {
            match msg {
                Outgoing::Request { id, method, params } => {
                    if let Err(e) = writer.send_request(id, &method, params).await {
                        log::error!("Failed to send request: {}", e);
                    }
                }
                Outgoing::Notification { method, params } => {
                    if let Err(e) = writer.send_notification(&method, params).await {
                        log::error!("Failed to send notification: {}", e);
                    }
                }
                Outgoing::Shutdown => {
                    let _ = writer.send_request(SHUTDOWN_REQUEST_ID, "shutdown", None).await;
                    let _ = writer.send_notification("exit", None).await;
                    break;
                }
            }
        }
    });

    // Pump owner requests into the outgoing queue off the async threads.
    let pump_send = send_tx.clone();
    let pump_task = tokio::task::spawn_blocking(move || {
        while let Ok(request) = request_rx.recv() {
            match request {
                SessionRequest::Shutdown => {
                    let _ = pump_send.send(Outgoing::Shutdown);
                    break;
                }
            }
        }
    });

    send_initialize(&send_tx, options.root_path.as_deref());

    // Read loop: runs until the server closes its end or the stream breaks.
    while running.load(Ordering::SeqCst) {
        match reader.read_message().await {
            Ok(msg) => handle_server_message(msg, &send_tx, &event_tx),
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    log::debug!("Language server stream closed: {}", e);
                }
                break;
            }
        }
    }
    running.store(false, Ordering::SeqCst);

    // Dropping the write half closes the server's stdin, so a server that
    // survived a broken stream still sees EOF and exits before the wait.
    write_task.abort();
    pump_task.abort();

    let code = child.wait().await.ok().and_then(|status| status.code());

    // Drain remaining stderr before reporting the exit.
    let _ = stderr_task.await;
    let _ = event_tx.send(SessionEvent::Exited { code });

    log::info!("Language server session ended (exit code {:?})", code);
}

/// Sends the initialize request that opens the session.
fn send_initialize(send_tx: &mpsc::UnboundedSender<Outgoing>, root: Option<&Path>) {
    #[allow(deprecated)]
    let params = InitializeParams {
        process_id: Some(std::process::id()),
        root_uri: root.map(path_to_uri),
        capabilities: ClientCapabilities {
            text_document: Some(TextDocumentClientCapabilities {
                // The navigator serves definitions; nothing else is advertised.
                definition: Some(GotoCapability {
                    dynamic_registration: Some(false),
                    link_support: Some(false),
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    };

    let _ = send_tx.send(Outgoing::Request {
        id: INIT_REQUEST_ID,
        method: "initialize".to_string(),
        params: Some(serde_json::to_value(params).unwrap()),
    });
}

/// Handles a message from the server.
fn handle_server_message(
    msg: Value,
    send_tx: &mpsc::UnboundedSender<Outgoing>,
    event_tx: &Sender<SessionEvent>,
) {
    let Some(parsed) = transport::parse_message(&msg) else {
        log::warn!("Unrecognized message from language server: {}", msg);
        return;
    };

    match parsed {
        JsonRpcMessage::Response(resp) => match resp.id {
            transport::RequestId::Number(INIT_REQUEST_ID) => {
                if let Some(error) = resp.error {
                    log::error!("Initialize failed: {}", error.message);
                    return;
                }
                let result: InitializeResult = resp
                    .result
                    .and_then(|v| serde_json::from_value(v).ok())
                    .unwrap_or_default();
                let capabilities = format_capabilities(&result.capabilities);
                log::info!("Language server ready ({})", capabilities);

                let _ = send_tx.send(Outgoing::Notification {
                    method: "initialized".to_string(),
                    params: Some(serde_json::to_value(InitializedParams {}).unwrap()),
                });
                let _ = event_tx.send(SessionEvent::Ready { capabilities });
            }
            transport::RequestId::Number(SHUTDOWN_REQUEST_ID) => {
                log::debug!("Shutdown acknowledged");
            }
            other => {
                log::warn!("Response for unknown request: {:?}", other);
            }
        },
        JsonRpcMessage::Notification(notif) => handle_notification(notif, event_tx),
        JsonRpcMessage::Request(req) => {
            // Server-initiated requests (workspace/configuration and friends).
            log::debug!("Ignoring server request: {} (id: {:?})", req.method, req.id);
        }
    }
}

/// Handles a notification from the server.
fn handle_notification(notif: JsonRpcNotification, event_tx: &Sender<SessionEvent>) {
    match notif.method.as_str() {
        "window/logMessage" => {
            if let Some(params) = notif.params {
                if let Ok(log_params) = serde_json::from_value::<LogMessageParams>(params) {
                    let _ = event_tx.send(SessionEvent::Log {
                        level: log_params.typ.into(),
                        message: log_params.message,
                    });
                }
            }
        }
        "window/showMessage" => {
            if let Some(params) = notif.params {
                if let Ok(show_params) = serde_json::from_value::<ShowMessageParams>(params) {
                    let _ = event_tx.send(SessionEvent::Log {
                        level: show_params.typ.into(),
                        message: show_params.message,
                    });
                }
            }
        }
        other => {
            log::trace!("Unhandled notification: {}", other);
        }
    }
}

/// Formats server capabilities as a summary string.
fn format_capabilities(caps: &ServerCapabilities) -> String {
    let mut features = Vec::new();

    if caps.definition_provider.is_some() {
        features.push("definition");
    }
    if caps.references_provider.is_some() {
        features.push("references");
    }
    if caps.hover_provider.is_some() {
        features.push("hover");
    }
    if caps.document_symbol_provider.is_some() {
        features.push("symbols");
    }

    features.join(", ")
}
