//! Game orchestration for one human-vs-engine (or human-vs-human) game.
//!
//! A session is an actor task that owns the [`chess::Game`], the legal
//! destination index and the engine bridge. Callers talk to it through a
//! [`SessionHandle`] and observe it through [`SessionEvent`]s.

mod actor;
pub mod commands;
pub mod config;
pub mod events;
pub mod handle;
pub mod snapshot;
mod state;

use engine::EngineBridge;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use actor::run_session_actor;
pub use commands::SessionError;
pub use config::{GameMode, SessionConfig};
pub use events::{SessionEvent, UciDirection, UciLogEntry};
pub use handle::SessionHandle;
pub use snapshot::{MoveRecord, SessionSnapshot, StatusView};
use state::SessionState;

/// Start a session actor.
///
/// `engine` is required when the game mode includes an engine player. If
/// the engine owns the first move it starts searching right away.
pub fn spawn_session(
    config: SessionConfig,
    engine: Option<EngineBridge>,
) -> Result<SessionHandle, SessionError> {
    if config.game_mode.engine_side().is_some() && engine.is_none() {
        return Err(SessionError::EngineNotConfigured);
    }

    let session_id = Uuid::new_v4().to_string();
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (event_tx, _) = broadcast::channel(100);

    let state = SessionState::new(session_id.clone(), config, engine);
    tokio::spawn(run_session_actor(state, cmd_rx, event_tx));

    Ok(SessionHandle::new(session_id, cmd_tx))
}
