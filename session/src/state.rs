use chess::{DestinationIndex, Game, HistoryEntry, Move, PieceKind};
use engine::{EngineBridge, EngineError, EngineEvent, PendingSearch};
use tokio::sync::broadcast;

use super::commands::SessionError;
use super::config::SessionConfig;
use super::snapshot::{MoveRecord, SessionSnapshot, StatusView};

/// Internal mutable state, owned entirely by the session actor. No locks.
pub(crate) struct SessionState {
    pub session_id: String,
    pub config: SessionConfig,
    pub game: Game,
    pub dests: DestinationIndex,
    /// Bumped on reset; search results from an older generation are dropped.
    pub generation: u64,
    pub engine: Option<EngineBridge>,
    pub engine_events: Option<broadcast::Receiver<EngineEvent>>,
    pub pending: Option<StampedSearch>,
    pub engine_error: Option<String>,
    /// Retries spent on the position currently being searched.
    pub search_retries: u32,
}

/// A search in flight, tagged with the game generation it was issued for.
pub(crate) struct StampedSearch {
    pub generation: u64,
    pub search: PendingSearch,
}

impl SessionState {
    pub fn new(session_id: String, config: SessionConfig, engine: Option<EngineBridge>) -> Self {
        let game = Game::new();
        let dests = DestinationIndex::compute(game.position());
        let engine_events = engine.as_ref().map(EngineBridge::subscribe);
        Self {
            session_id,
            config,
            game,
            dests,
            generation: 0,
            engine,
            engine_events,
            pending: None,
            engine_error: None,
            search_retries: 0,
        }
    }

    pub fn engine_thinking(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether the engine should be searching the current position.
    pub fn engine_to_move(&self) -> bool {
        self.config.game_mode.engine_side() == Some(self.game.side_to_move())
            && self.engine_error.is_none()
            && self.pending.is_none()
            && !self.game.status().is_terminal()
    }

    /// Validate and apply a move submitted by the human player.
    pub fn apply_user_move(&mut self, mv: Move) -> Result<(), SessionError> {
        if let Some(error) = &self.engine_error {
            return Err(SessionError::EngineFailed(error.clone()));
        }
        let status = self.game.status();
        if status.is_terminal() {
            return Err(SessionError::GameOver(status.to_string()));
        }
        if let Some(human) = self.config.game_mode.human_side() {
            if self.game.side_to_move() != human {
                return Err(SessionError::NotYourTurn);
            }
        }

        let mv = self.with_default_promotion(mv);
        self.game
            .apply(mv)
            .map_err(|e| SessionError::IllegalMove(e.to_string()))?;
        self.refresh();
        Ok(())
    }

    /// Apply a move proposed by the engine.
    pub fn apply_engine_move(&mut self, mv: Move) -> Result<(), chess::GameError> {
        let mv = self.with_default_promotion(mv);
        self.game.apply(mv)?;
        self.search_retries = 0;
        self.refresh();
        Ok(())
    }

    /// Stop play until the next reset.
    pub fn freeze(&mut self, reason: String) {
        tracing::error!("Engine failure, freezing play: {}", reason);
        self.pending = None;
        self.engine_error = Some(reason);
    }

    /// Start over from the initial position. Any search in flight is
    /// abandoned.
    pub async fn reset(&mut self) {
        self.generation += 1;
        if self.pending.take().is_some() {
            if let Some(engine) = &self.engine {
                engine.cancel_search().await;
            }
        }
        self.game.reset();
        self.engine_error = None;
        self.search_retries = 0;
        self.refresh();
        tracing::info!("Session reset (generation {})", self.generation);
    }

    /// Ask the engine for a move in the current position.
    pub async fn request_engine_move(&mut self) -> Result<(), EngineError> {
        let Some(engine) = &self.engine else {
            return Err(EngineError::Closed);
        };
        let fen = self.game.to_fen();
        let search = engine
            .request_best_move(&fen, self.config.search_depth)
            .await?;
        self.pending = Some(StampedSearch {
            generation: self.generation,
            search,
        });
        Ok(())
    }

    /// Pawn moves to the last rank without a piece get the configured one.
    fn with_default_promotion(&self, mv: Move) -> Move {
        if mv.promotion.is_some() {
            return mv;
        }
        let Some(piece) = self.game.position().piece_at(mv.from) else {
            return mv;
        };
        let last_rank = match piece.color {
            chess::PieceColor::White => 7,
            chess::PieceColor::Black => 0,
        };
        if piece.kind == PieceKind::Pawn && mv.to.rank() == last_rank {
            Move::with_promotion(mv.from, mv.to, self.config.default_promotion)
        } else {
            mv
        }
    }

    fn refresh(&mut self) {
        self.dests = DestinationIndex::compute(self.game.position());
    }

    /// Build a full snapshot of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        let history: Vec<MoveRecord> = self
            .game
            .history()
            .iter()
            .map(history_entry_to_record)
            .collect();

        let last_move = self
            .game
            .last_move()
            .map(|mv| (mv.from.to_string(), mv.to.to_string()));

        let status = self.game.status();
        SessionSnapshot {
            session_id: self.session_id.clone(),
            generation: self.generation,
            fen: self.game.to_fen(),
            side_to_move: self.game.side_to_move().as_str().to_string(),
            human_side: self
                .config
                .game_mode
                .human_side()
                .map(|side| side.as_str().to_string()),
            status: StatusView::from(status),
            is_terminal: status.is_terminal(),
            in_check: self.game.is_check(),
            destinations: self.dests.to_named(),
            move_count: self.game.history().len(),
            history,
            last_move,
            engine_thinking: self.engine_thinking(),
            engine_error: self.engine_error.clone(),
        }
    }
}

fn history_entry_to_record(entry: &HistoryEntry) -> MoveRecord {
    MoveRecord {
        from: entry.mv.from.to_string(),
        to: entry.mv.to.to_string(),
        piece: entry.piece.kind.to_char_upper().to_string(),
        captured: entry.captured.map(|kind| kind.to_char_upper().to_string()),
        promotion: entry.mv.promotion.map(|kind| kind.to_char_lower().to_string()),
        san: entry.san.clone(),
        fen_after: entry.fen.clone(),
    }
}
