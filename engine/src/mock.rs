//! Scripted in-memory engine for tests
//!
//! Speaks just enough UCI to complete the handshake. Search replies come from
//! a test-supplied responder or are pushed by hand with [`MockEngine::reply`].

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::bridge::EngineBridge;
use crate::config::EngineConfig;
use crate::error::EngineError;

type Responder = Box<dyn FnMut(&str) -> Vec<String> + Send>;

enum Control {
    Line(String),
    HangUp,
}

/// Test side of a mock engine connection.
pub struct MockEngine {
    received: Arc<Mutex<Vec<String>>>,
    seen_rx: mpsc::UnboundedReceiver<String>,
    control_tx: mpsc::UnboundedSender<Control>,
}

impl MockEngine {
    /// Connect a bridge to an engine that answers the handshake and stays
    /// silent on `go` until told otherwise.
    pub async fn connect(config: EngineConfig) -> Result<(EngineBridge, MockEngine), EngineError> {
        Self::connect_with(config, Self::handshake_replies).await
    }

    /// Connect a bridge to an engine whose replies to each received command
    /// come from `responder`.
    pub async fn connect_with<F>(
        config: EngineConfig,
        responder: F,
    ) -> Result<(EngineBridge, MockEngine), EngineError>
    where
        F: FnMut(&str) -> Vec<String> + Send + 'static,
    {
        let (bridge_side, engine_side) = tokio::io::duplex(16 * 1024);
        let (bridge_read, bridge_write) = tokio::io::split(bridge_side);

        let received = Arc::new(Mutex::new(Vec::new()));
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_mock(
            engine_side,
            Box::new(responder),
            received.clone(),
            seen_tx,
            control_rx,
        ));

        let bridge = EngineBridge::connect(bridge_read, bridge_write, &config).await?;
        let mock = MockEngine {
            received,
            seen_rx,
            control_tx,
        };
        Ok((bridge, mock))
    }

    /// Standard replies to `uci` and `isready`; nothing otherwise.
    pub fn handshake_replies(command: &str) -> Vec<String> {
        match command {
            "uci" => vec![
                "id name MockEngine".to_string(),
                "id author chessplay".to_string(),
                "option name Threads type spin default 1 min 1 max 512".to_string(),
                "uciok".to_string(),
            ],
            "isready" => vec!["readyok".to_string()],
            _ => Vec::new(),
        }
    }

    /// Every command received so far, in order.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Wait for the next command the bridge sends.
    pub async fn next_command(&mut self) -> Option<String> {
        self.seen_rx.recv().await
    }

    /// Skip ahead to the next command starting with `prefix`.
    pub async fn wait_for_command(&mut self, prefix: &str) -> Option<String> {
        while let Some(command) = self.next_command().await {
            if command.starts_with(prefix) {
                return Some(command);
            }
        }
        None
    }

    /// Print a line as if the engine wrote it.
    pub fn reply(&self, line: impl Into<String>) {
        let _ = self.control_tx.send(Control::Line(line.into()));
    }

    /// Close the engine's side of the pipe.
    pub fn hang_up(&self) {
        let _ = self.control_tx.send(Control::HangUp);
    }
}

async fn run_mock(
    stream: tokio::io::DuplexStream,
    mut responder: Responder,
    received: Arc<Mutex<Vec<String>>>,
    seen_tx: mpsc::UnboundedSender<String>,
    mut control_rx: mpsc::UnboundedReceiver<Control>,
) {
    let (read, mut write) = tokio::io::split(stream);
    let mut lines = BufReader::new(read).lines();
    let mut controlled = true;

    loop {
        let outgoing = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(command)) => {
                    if let Ok(mut log) = received.lock() {
                        log.push(command.clone());
                    }
                    let _ = seen_tx.send(command.clone());
                    if command == "quit" {
                        break;
                    }
                    responder(&command)
                }
                _ => break,
            },
            control = control_rx.recv(), if controlled => match control {
                Some(Control::Line(line)) => vec![line],
                Some(Control::HangUp) => break,
                // Test side dropped; keep serving the bridge.
                None => {
                    controlled = false;
                    Vec::new()
                }
            },
        };

        for line in outgoing {
            if write.write_all(format!("{}\n", line).as_bytes()).await.is_err() {
                return;
            }
        }
        if write.flush().await.is_err() {
            return;
        }
    }
}
