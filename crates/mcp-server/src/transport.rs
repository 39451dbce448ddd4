//! Subprocess JSON-RPC transport.
//!
//! Owns one wrapped-server child process for its lifetime: newline-framed
//! JSON-RPC 2.0 over the child's stdin/stdout, request correlation by
//! numeric id, and fan-out of id-less messages to notification listeners.
//! Writes go through a dedicated writer task so concurrent requests never
//! interleave partial lines; reads split the stream on newlines, keeping
//! any trailing fragment for the next read.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use spillway_protocol::jsonrpc::{parse_inbound, Inbound, JsonRpcNotification, JsonRpcRequest};

use crate::error::TransportError;

/// How long a request may wait for its correlated response.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type PendingSender = oneshot::Sender<Result<Value, TransportError>>;
type NotificationHandler = Box<dyn Fn(&JsonRpcNotification) + Send + Sync>;

struct Shared {
    pending: Mutex<HashMap<u64, PendingSender>>,
    listeners: Mutex<Vec<NotificationHandler>>,
    closed: AtomicBool,
}

impl Shared {
    /// Fails every in-flight request at once. The connection is gone;
    /// letting callers wait out their full timeout would only delay the
    /// same answer.
    fn drain(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let drained: Vec<PendingSender> = {
            let mut pending = lock(&self.pending);
            pending.drain().map(|(_, sender)| sender).collect()
        };
        for sender in drained {
            let _ = sender.send(Err(TransportError::ConnectionClosed));
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct WriteRequest {
    line: String,
    reply: oneshot::Sender<std::io::Result<()>>,
}

/// JSON-RPC client over one child process's pipes.
pub struct RpcClient {
    shared: Arc<Shared>,
    write_tx: mpsc::Sender<WriteRequest>,
    next_id: AtomicU64,
    request_timeout: Duration,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl RpcClient {
    /// Spawns the wrapped server and starts the pipe tasks.
    ///
    /// A spawn failure is fatal to the whole proxy; there is no restart.
    pub async fn spawn(
        program: &str,
        args: &[String],
        debug: bool,
    ) -> Result<Self, TransportError> {
        Self::spawn_with_timeout(program, args, debug, REQUEST_TIMEOUT).await
    }

    /// Same as [`RpcClient::spawn`] with a custom request deadline.
    /// Production always uses [`REQUEST_TIMEOUT`]; tests shorten it.
    pub async fn spawn_with_timeout(
        program: &str,
        args: &[String],
        debug: bool,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe(program, "stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe(program, "stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe(program, "stderr"))?;

        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        let shutdown = CancellationToken::new();

        let (write_tx, write_rx) = mpsc::channel::<WriteRequest>(16);
        tokio::spawn(run_write_loop(stdin, write_rx));
        tokio::spawn(run_read_loop(stdout, shared.clone()));
        tokio::spawn(run_stderr_loop(stderr, debug));
        tokio::spawn(supervise_child(child, shared.clone(), shutdown.clone()));

        Ok(Self {
            shared,
            write_tx,
            next_id: AtomicU64::new(1),
            request_timeout,
            shutdown,
        })
    }

    /// Sends one request and awaits its correlated response.
    ///
    /// Resolves with the remote `result`, or fails with the remote error
    /// message, the request timeout, or a connection-closed error if the
    /// subprocess exits first. A response arriving after the timeout finds
    /// no pending entry and is dropped.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        lock(&self.shared.pending).insert(id, sender);

        let request = JsonRpcRequest::new(id, method, params);
        let line = serde_json::to_string(&request)?;
        if let Err(err) = self.write_line(line).await {
            lock(&self.shared.pending).remove(&id);
            return Err(err);
        }

        match tokio::time::timeout(self.request_timeout, receiver).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without a verdict; only a teardown does that.
            Ok(Err(_)) => Err(TransportError::ConnectionClosed),
            Err(_) => {
                lock(&self.shared.pending).remove(&id);
                Err(TransportError::Timeout {
                    method: method.to_string(),
                    after: self.request_timeout,
                })
            }
        }
    }

    /// Fire-and-forget write with the same framing and no id.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), TransportError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        let notification = JsonRpcNotification::new(method, params);
        self.write_line(serde_json::to_string(&notification)?).await
    }

    /// Registers a listener invoked, in arrival order, for every inbound
    /// message that lacks an id.
    pub fn on_notification(
        &self,
        handler: impl Fn(&JsonRpcNotification) + Send + Sync + 'static,
    ) {
        lock(&self.shared.listeners).push(Box::new(handler));
    }

    /// Kills the wrapped server and fails anything still in flight.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn write_line(&self, mut line: String) -> Result<(), TransportError> {
        line.push('\n');
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = WriteRequest {
            line,
            reply: reply_tx,
        };
        if self.write_tx.send(request).await.is_err() {
            return Err(TransportError::ConnectionClosed);
        }
        match reply_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(TransportError::Io(err)),
            Err(_) => Err(TransportError::ConnectionClosed),
        }
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn missing_pipe(program: &str, stream: &str) -> TransportError {
    TransportError::Spawn {
        program: program.to_string(),
        source: std::io::Error::other(format!("{stream} was not piped")),
    }
}

async fn run_write_loop(mut stdin: ChildStdin, mut rx: mpsc::Receiver<WriteRequest>) {
    while let Some(request) = rx.recv().await {
        let result = async {
            stdin.write_all(request.line.as_bytes()).await?;
            stdin.flush().await
        }
        .await;
        let failed = result.is_err();
        let _ = request.reply.send(result);
        if failed {
            break;
        }
    }
}

async fn run_read_loop(stdout: ChildStdout, shared: Arc<Shared>) {
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => dispatch_line(line.trim(), &shared),
            Err(err) => {
                log::warn!("error reading from wrapped server: {err}");
                break;
            }
        }
    }
    log::info!("wrapped server closed its output stream");
    shared.drain();
}

fn dispatch_line(line: &str, shared: &Shared) {
    if line.is_empty() {
        return;
    }
    match parse_inbound(line) {
        Ok(Inbound::Response(response)) => {
            let sender = lock(&shared.pending).remove(&response.id);
            let Some(sender) = sender else {
                log::debug!("dropping response for unknown request id {}", response.id);
                return;
            };
            let outcome = match response.error {
                Some(error) => Err(TransportError::Remote(error.message)),
                None => Ok(response.result.unwrap_or(Value::Null)),
            };
            let _ = sender.send(outcome);
        }
        Ok(Inbound::Notification(notification)) => {
            for handler in lock(&shared.listeners).iter() {
                handler(&notification);
            }
        }
        // A garbage line is dropped; it neither ends the stream nor fails
        // any pending request.
        Err(err) => log::warn!("discarding unparseable line from wrapped server: {err}"),
    }
}

async fn run_stderr_loop(stderr: ChildStderr, debug: bool) {
    // Always drained so the child cannot block on a full pipe; surfaced
    // only when the debug flag asks for it.
    let mut reader = BufReader::new(stderr);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                if debug {
                    log::debug!("wrapped server stderr: {}", line.trim_end());
                }
            }
        }
    }
}

async fn supervise_child(mut child: Child, shared: Arc<Shared>, shutdown: CancellationToken) {
    let exit = tokio::select! {
        status = child.wait() => Some(status),
        () = shutdown.cancelled() => None,
    };
    match exit {
        Some(Ok(status)) => log::warn!("wrapped server exited: {status}"),
        Some(Err(err)) => log::warn!("failed to reap wrapped server: {err}"),
        None => {
            log::debug!("stopping wrapped server");
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
    shared.drain();
}
