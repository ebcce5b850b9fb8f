use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use chess::Move;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::Child;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::protocol::{Inbound, Protocol, ProtocolState};
use crate::{EngineEvent, UciMessageDirection};

const EVENT_CAPACITY: usize = 256;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Handle to a running UCI engine.
///
/// All engine I/O happens on one worker task; this handle only talks to it
/// through channels. Dropping the handle makes the worker send `quit` and exit.
pub struct EngineBridge {
    cmd_tx: mpsc::Sender<BridgeCommand>,
    state_rx: watch::Receiver<ProtocolState>,
    event_tx: broadcast::Sender<EngineEvent>,
    worker: JoinHandle<()>,
    pub(crate) child: Option<Child>,
}

enum BridgeCommand {
    Search {
        fen: String,
        depth: u8,
        reply: oneshot::Sender<Result<PendingSearch, EngineError>>,
    },
    Cancel,
    Quit {
        done: oneshot::Sender<()>,
    },
}

/// Resolves exactly once with the engine's answer to one search request.
#[derive(Debug)]
pub struct PendingSearch {
    rx: oneshot::Receiver<Result<Move, EngineError>>,
}

impl Future for PendingSearch {
    type Output = Result<Move, EngineError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(EngineError::Closed)))
    }
}

impl EngineBridge {
    /// Run the UCI handshake over an arbitrary byte stream and start the worker.
    ///
    /// Returns once the engine has answered `isready`.
    pub async fn connect<R, W>(
        reader: R,
        writer: W,
        config: &EngineConfig,
    ) -> Result<Self, EngineError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (state_tx, mut state_rx) = watch::channel(ProtocolState::Uninitialized);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let mut worker = Worker {
            writer,
            protocol: Protocol::new(),
            pending: None,
            state_tx,
            event_tx: event_tx.clone(),
            search_timeout: config.search_timeout,
        };

        tracing::debug!("Starting UCI handshake");
        let handshake = worker.protocol.handshake(&config.options())?;
        for line in &handshake {
            worker.send_line(line).await?;
        }
        worker.publish_state();

        let lines = BufReader::new(reader).lines();
        let worker = tokio::spawn(worker.run(lines, cmd_rx));

        let ready = tokio::time::timeout(
            config.handshake_timeout,
            state_rx.wait_for(|s| matches!(s, ProtocolState::Ready | ProtocolState::Terminated)),
        )
        .await
        .map(|seen| seen.map(|state| *state));

        match ready {
            Ok(Ok(ProtocolState::Ready)) => {}
            Ok(_) => {
                tracing::error!("Engine closed during handshake");
                return Err(EngineError::Closed);
            }
            Err(_) => {
                tracing::error!("Timeout waiting for readyok");
                worker.abort();
                return Err(EngineError::HandshakeTimeout);
            }
        }

        tracing::info!("Engine ready");
        Ok(Self {
            cmd_tx,
            state_rx,
            event_tx,
            worker,
            child: None,
        })
    }

    /// Ask for the best move in `fen` searched to `depth` plies.
    ///
    /// Fails immediately with `ProtocolState` unless the engine is idle.
    pub async fn request_best_move(
        &self,
        fen: &str,
        depth: u8,
    ) -> Result<PendingSearch, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(BridgeCommand::Search {
                fen: fen.to_string(),
                depth,
                reply,
            })
            .await
            .map_err(|_| EngineError::Closed)?;
        rx.await.map_err(|_| EngineError::Closed)?
    }

    /// Abandon the search in flight, if any. Its `PendingSearch` resolves
    /// with `Cancelled`.
    pub async fn cancel_search(&self) {
        if self.cmd_tx.send(BridgeCommand::Cancel).await.is_err() {
            tracing::debug!("Cancel after engine worker exited");
        }
    }

    pub fn state(&self) -> ProtocolState {
        *self.state_rx.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Send `quit`, give the engine a moment to exit, then kill it.
    pub async fn shutdown(mut self) {
        let (done, done_rx) = oneshot::channel();
        if self.cmd_tx.send(BridgeCommand::Quit { done }).await.is_ok() {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, done_rx).await;
        }
        if let Some(mut child) = self.child.take() {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await;
            let _ = child.kill().await;
        }
        self.worker.abort();
        tracing::info!("Engine shut down");
    }
}

struct InFlight {
    reply: oneshot::Sender<Result<Move, EngineError>>,
    deadline: Option<Instant>,
}

struct Worker<W> {
    writer: W,
    protocol: Protocol,
    pending: Option<InFlight>,
    state_tx: watch::Sender<ProtocolState>,
    event_tx: broadcast::Sender<EngineEvent>,
    search_timeout: Option<Duration>,
}

enum Flow {
    Continue,
    Stop,
}

impl<W> Worker<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn run<R>(
        mut self,
        mut lines: Lines<BufReader<R>>,
        mut cmd_rx: mpsc::Receiver<BridgeCommand>,
    ) where
        R: AsyncRead + Unpin + Send + 'static,
    {
        loop {
            let deadline = self.pending.as_ref().and_then(|p| p.deadline);

            let flow = tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.on_line(&line),
                    Ok(None) => {
                        tracing::warn!("Engine stdout EOF - engine closed");
                        self.close();
                        Flow::Stop
                    }
                    Err(e) => {
                        tracing::error!("Error reading engine output: {}", e);
                        self.close();
                        Flow::Stop
                    }
                },
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.on_command(cmd).await,
                    None => {
                        tracing::debug!("Bridge handle dropped");
                        self.quit().await;
                        Flow::Stop
                    }
                },
                _ = sleep_until(deadline) => {
                    let timeout = self.search_timeout.unwrap_or_default();
                    tracing::warn!("Engine search timed out after {:?}", timeout);
                    self.abandon(EngineError::ProtocolTimeout(timeout)).await
                }
            };

            if let Flow::Stop = flow {
                break;
            }
        }
        tracing::info!("Engine worker exiting");
    }

    fn on_line(&mut self, line: &str) -> Flow {
        let line = line.trim();
        tracing::trace!("UCI << {}", line);
        let _ = self.event_tx.send(EngineEvent::RawUciMessage {
            direction: UciMessageDirection::FromEngine,
            message: line.to_string(),
        });

        let inbound = self.protocol.on_line(line);
        self.publish_state();
        match inbound {
            Inbound::Ready => tracing::debug!("Received readyok"),
            Inbound::BestMove(mv) => {
                tracing::info!("Received bestmove: {}", mv);
                self.resolve(Ok(mv));
            }
            Inbound::SearchFailed(e) => {
                tracing::warn!("Unusable bestmove: {}", e);
                self.resolve(Err(e.into()));
            }
            Inbound::Info(info) => {
                let _ = self.event_tx.send(EngineEvent::Info(info));
            }
            Inbound::StaleBestMove => tracing::debug!("Discarding bestmove of abandoned search"),
            Inbound::Ignored => {}
        }
        Flow::Continue
    }

    async fn on_command(&mut self, cmd: BridgeCommand) -> Flow {
        match cmd {
            BridgeCommand::Search { fen, depth, reply } => {
                let commands = match self.protocol.begin_search(&fen, depth) {
                    Ok(commands) => commands,
                    Err(e) => {
                        tracing::error!("Search requested while engine busy: {}", e);
                        let _ = reply.send(Err(e));
                        return Flow::Continue;
                    }
                };
                tracing::info!("Starting engine search: depth={}, fen={}", depth, fen);
                for line in &commands {
                    if let Err(e) = self.send_line(line).await {
                        let _ = reply.send(Err(e));
                        self.close();
                        return Flow::Stop;
                    }
                }

                let (tx, rx) = oneshot::channel();
                self.pending = Some(InFlight {
                    reply: tx,
                    deadline: self.search_timeout.map(|t| Instant::now() + t),
                });
                self.publish_state();
                let _ = reply.send(Ok(PendingSearch { rx }));
                Flow::Continue
            }
            BridgeCommand::Cancel => {
                tracing::debug!("Cancelling engine search");
                self.abandon(EngineError::Cancelled).await
            }
            BridgeCommand::Quit { done } => {
                self.quit().await;
                let _ = done.send(());
                Flow::Stop
            }
        }
    }

    /// Stop the search in flight and fail its pending handle with `reason`.
    async fn abandon(&mut self, reason: EngineError) -> Flow {
        let flow = match self.protocol.abandon_search() {
            Some(stop) => match self.send_line(&stop).await {
                Ok(()) => Flow::Continue,
                Err(_) => {
                    self.close();
                    Flow::Stop
                }
            },
            None => Flow::Continue,
        };
        self.publish_state();
        self.resolve(Err(reason));
        flow
    }

    async fn quit(&mut self) {
        if let Some(quit) = self.protocol.terminate() {
            let _ = self.send_line(&quit).await;
        }
        self.publish_state();
        self.resolve(Err(EngineError::Cancelled));
        let _ = self.event_tx.send(EngineEvent::Terminated);
    }

    fn close(&mut self) {
        self.protocol.mark_closed();
        self.publish_state();
        self.resolve(Err(EngineError::Closed));
        let _ = self.event_tx.send(EngineEvent::Terminated);
    }

    fn resolve(&mut self, result: Result<Move, EngineError>) {
        if let Some(pending) = self.pending.take() {
            if pending.reply.send(result).is_err() {
                tracing::debug!("Search result dropped by caller");
            }
        }
    }

    fn publish_state(&self) {
        let state = self.protocol.state();
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    async fn send_line(&mut self, line: &str) -> Result<(), EngineError> {
        tracing::trace!("UCI >> {}", line);
        let _ = self.event_tx.send(EngineEvent::RawUciMessage {
            direction: UciMessageDirection::ToEngine,
            message: line.to_string(),
        });

        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await.map_err(|e| {
            tracing::error!("Failed to flush engine stdin: {}", e);
            EngineError::from(e)
        })
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
