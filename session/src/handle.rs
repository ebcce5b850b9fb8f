use chess::{PieceKind, Square};
use tokio::sync::{broadcast, mpsc, oneshot};

use super::commands::*;
use super::events::SessionEvent;
use super::snapshot::SessionSnapshot;

/// Cheap, cloneable handle to a session actor.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    cmd_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(id: String, cmd_tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { id, cmd_tx }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Submit the human player's move. Without `promotion`, a pawn reaching
    /// the last rank becomes the configured default piece.
    pub async fn make_move(
        &self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    ) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::MakeMove {
            from,
            to,
            promotion,
            reply,
        })
        .await?
    }

    /// Start a new game. Works even after an engine failure.
    pub async fn reset(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::Reset { reply }).await
    }

    pub async fn get_snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::GetSnapshot { reply }).await
    }

    /// Current snapshot plus a receiver for every event after it.
    pub async fn subscribe(
        &self,
    ) -> Result<(SessionSnapshot, broadcast::Receiver<SessionEvent>), SessionError> {
        self.request(|reply| SessionCommand::Subscribe { reply }).await
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Shutdown).await;
        // The actor drops its receiver once the engine is shut down.
        self.cmd_tx.closed().await;
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(command(tx))
            .await
            .map_err(|_| SessionError::Internal("Session actor closed".into()))?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }
}
