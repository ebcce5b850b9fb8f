use chess::{PieceKind, Square};
use tokio::sync::{broadcast, oneshot};

use super::events::SessionEvent;
use super::snapshot::SessionSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    #[error("Not your turn")]
    NotYourTurn,
    #[error("Game is over: {0}")]
    GameOver(String),
    #[error("Engine failed: {0}")]
    EngineFailed(String),
    #[error("Engine not configured")]
    EngineNotConfigured,
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Commands sent to the session actor. Each embeds a oneshot for the reply.
/// Engine moves are requested by the actor itself, never by a command.
pub enum SessionCommand {
    MakeMove {
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    Reset {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    GetSnapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Subscribe {
        reply: oneshot::Sender<(SessionSnapshot, broadcast::Receiver<SessionEvent>)>,
    },
    Shutdown,
}
