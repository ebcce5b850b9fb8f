use chess::Move;
use engine::{EngineError, EngineEvent};
use tokio::sync::{broadcast, mpsc};
use tracing::Instrument;

use super::commands::*;
use super::events::*;
use super::state::{SessionState, StampedSearch};

/// The main session actor loop.
/// Owns all mutable state. Processes commands and engine results sequentially.
pub(crate) async fn run_session_actor(
    state: SessionState,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    let session_id = state.session_id.clone();
    run_session_actor_inner(state, cmd_rx, event_tx)
        .instrument(tracing::info_span!("session", id = %session_id))
        .await;
}

async fn run_session_actor_inner(
    mut state: SessionState,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    tracing::info!("Session actor started");

    // The engine may own the first move
    if maybe_trigger_engine(&mut state, &event_tx).await {
        let _ = event_tx.send(SessionEvent::StateChanged(state.snapshot()));
    }

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Shutdown) | None => {
                        tracing::info!("Session actor shutting down");
                        state.pending = None;
                        if let Some(engine) = state.engine.take() {
                            engine.shutdown().await;
                        }
                        break;
                    }
                    Some(cmd) => handle_command(&mut state, cmd, &event_tx).await,
                }
            }

            (generation, result) = next_search_result(&mut state.pending) => {
                state.pending = None;
                handle_search_result(&mut state, generation, result, &event_tx).await;
            }

            event = next_engine_event(&mut state.engine_events) => {
                handle_engine_event(&state, event, &event_tx);
            }
        }
    }

    tracing::info!("Session actor exited");
}

async fn handle_command(
    state: &mut SessionState,
    cmd: SessionCommand,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    match cmd {
        SessionCommand::MakeMove {
            from,
            to,
            promotion,
            reply,
        } => {
            let mv = Move {
                from,
                to,
                promotion,
            };
            match state.apply_user_move(mv) {
                Ok(()) => {
                    tracing::debug!("Human played {}", mv);
                    maybe_trigger_engine(state, event_tx).await;
                    let snap = state.snapshot();
                    let _ = event_tx.send(SessionEvent::StateChanged(snap.clone()));
                    let _ = reply.send(Ok(snap));
                }
                Err(e) => {
                    tracing::debug!("Rejected move {}: {}", mv, e);
                    let _ = reply.send(Err(e));
                }
            }
        }
        SessionCommand::Reset { reply } => {
            state.reset().await;
            maybe_trigger_engine(state, event_tx).await;
            let snap = state.snapshot();
            let _ = event_tx.send(SessionEvent::StateChanged(snap.clone()));
            let _ = reply.send(snap);
        }
        SessionCommand::GetSnapshot { reply } => {
            let _ = reply.send(state.snapshot());
        }
        SessionCommand::Subscribe { reply } => {
            let snapshot = state.snapshot();
            let rx = event_tx.subscribe();
            let _ = reply.send((snapshot, rx));
        }
        // Handled by the actor loop
        SessionCommand::Shutdown => {}
    }
}

/// Start an engine search if it is the engine's turn.
///
/// Returns whether the session state changed.
async fn maybe_trigger_engine(
    state: &mut SessionState,
    event_tx: &broadcast::Sender<SessionEvent>,
) -> bool {
    if !state.engine_to_move() {
        return false;
    }
    if let Err(e) = state.request_engine_move().await {
        if matches!(e, EngineError::ProtocolState { .. }) {
            tracing::error!("Engine bridge out of step with session: {}", e);
        }
        fail_engine(state, e.to_string(), event_tx);
    }
    true
}

fn fail_engine(state: &mut SessionState, reason: String, event_tx: &broadcast::Sender<SessionEvent>) {
    state.freeze(reason.clone());
    let _ = event_tx.send(SessionEvent::Error(reason));
}

async fn handle_search_result(
    state: &mut SessionState,
    generation: u64,
    result: Result<Move, EngineError>,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    if generation != state.generation {
        tracing::debug!(
            "Discarding search result from generation {} (now {})",
            generation,
            state.generation
        );
        return;
    }

    match result {
        Ok(mv) => match state.apply_engine_move(mv) {
            Ok(()) => {
                tracing::info!("Engine played {}", mv);
                maybe_trigger_engine(state, event_tx).await;
            }
            Err(e) => {
                fail_engine(state, format!("engine desync: {} ({})", mv, e), event_tx);
            }
        },
        Err(EngineError::ProtocolParse(msg))
            if state.search_retries < state.config.max_search_retries =>
        {
            state.search_retries += 1;
            tracing::warn!(
                "Unreadable engine reply ({}), retrying {}/{}",
                msg,
                state.search_retries,
                state.config.max_search_retries
            );
            maybe_trigger_engine(state, event_tx).await;
        }
        Err(EngineError::Cancelled) => {
            tracing::debug!("Engine search cancelled");
            return;
        }
        Err(EngineError::ProtocolTimeout(after)) => {
            fail_engine(
                state,
                format!("engine unresponsive after {:?}", after),
                event_tx,
            );
        }
        Err(e) => fail_engine(state, e.to_string(), event_tx),
    }

    let _ = event_tx.send(SessionEvent::StateChanged(state.snapshot()));
}

fn handle_engine_event(
    state: &SessionState,
    event: EngineEvent,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    match event {
        EngineEvent::Info(info) => {
            if state.engine_thinking() {
                let _ = event_tx.send(SessionEvent::EngineThinking(info));
            }
        }
        EngineEvent::RawUciMessage { direction, message } => {
            let _ = event_tx.send(SessionEvent::UciMessage(UciLogEntry {
                direction: direction.into(),
                message,
            }));
        }
        EngineEvent::Terminated => {
            tracing::warn!("Engine terminated");
        }
    }
}

/// Resolves with the pending search's result; never resolves while idle.
async fn next_search_result(
    pending: &mut Option<StampedSearch>,
) -> (u64, Result<Move, EngineError>) {
    match pending {
        Some(stamped) => {
            let result = (&mut stamped.search).await;
            (stamped.generation, result)
        }
        None => std::future::pending().await,
    }
}

async fn next_engine_event(
    events: &mut Option<broadcast::Receiver<EngineEvent>>,
) -> EngineEvent {
    loop {
        let Some(rx) = events.as_mut() else {
            return std::future::pending().await;
        };
        match rx.recv().await {
            Ok(event) => return event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Skipped {} engine events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => *events = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use chess::{PieceColor, Square};
    use engine::mock::MockEngine;
    use engine::EngineConfig;

    use super::*;
    use crate::config::{GameMode, SessionConfig};
    use crate::handle::SessionHandle;
    use crate::snapshot::{SessionSnapshot, StatusView};
    use crate::spawn_session;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    fn vs_engine(human_side: PieceColor) -> SessionConfig {
        SessionConfig {
            game_mode: GameMode::HumanVsEngine { human_side },
            ..Default::default()
        }
    }

    /// Engine that answers each `go` with the next scripted line.
    fn answers(replies: &[&str]) -> impl FnMut(&str) -> Vec<String> + Send + 'static {
        let mut queue: VecDeque<String> = replies.iter().map(|s| s.to_string()).collect();
        move |command: &str| {
            if command.starts_with("go") {
                queue.pop_front().into_iter().collect()
            } else {
                MockEngine::handshake_replies(command)
            }
        }
    }

    async fn scripted_session(
        config: SessionConfig,
        replies: &[&str],
    ) -> (SessionHandle, broadcast::Receiver<SessionEvent>, MockEngine) {
        let (bridge, mock) = MockEngine::connect_with(EngineConfig::default(), answers(replies))
            .await
            .unwrap();
        let handle = spawn_session(config, Some(bridge)).unwrap();
        let (_, events) = handle.subscribe().await.unwrap();
        (handle, events, mock)
    }

    async fn wait_for(
        events: &mut broadcast::Receiver<SessionEvent>,
        predicate: impl Fn(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        let wait = async {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::StateChanged(snap)) if predicate(&snap) => return snap,
                    Ok(_) => continue,
                    Err(e) => panic!("event stream ended: {e}"),
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("timed out waiting for snapshot")
    }

    #[tokio::test]
    async fn test_engine_reply_is_applied() {
        let (handle, mut events, mut mock) =
            scripted_session(vs_engine(PieceColor::White), &["bestmove e7e5"]).await;

        let snap = handle.make_move(sq("e2"), sq("e4"), None).await.unwrap();
        assert!(snap.engine_thinking);
        assert_eq!(snap.side_to_move, "black");
        assert_eq!(
            snap.fen,
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );

        assert_eq!(
            mock.wait_for_command("position").await.unwrap(),
            format!("position fen {}", snap.fen)
        );
        assert_eq!(mock.next_command().await.unwrap(), "go depth 15");

        let snap = wait_for(&mut events, |s| s.move_count == 2).await;
        assert!(!snap.engine_thinking);
        assert_eq!(snap.side_to_move, "white");
        assert_eq!(snap.last_move, Some(("e7".to_string(), "e5".to_string())));
        assert!(snap.destinations.contains_key("g1"));
        assert_eq!(snap.history[1].san, "e5");
    }

    #[tokio::test]
    async fn test_illegal_user_move_changes_nothing() {
        let (handle, mut events, mock) =
            scripted_session(vs_engine(PieceColor::White), &[]).await;
        let before = handle.get_snapshot().await.unwrap();

        let err = handle.make_move(sq("e2"), sq("e5"), None).await.unwrap_err();
        assert!(matches!(err, SessionError::IllegalMove(_)));
        let err = handle.make_move(sq("e4"), sq("e5"), None).await.unwrap_err();
        assert!(matches!(err, SessionError::IllegalMove(_)));

        assert_eq!(handle.get_snapshot().await.unwrap(), before);
        assert!(events.try_recv().is_err());
        assert!(!mock.received().iter().any(|c| c.starts_with("go")));
    }

    #[tokio::test]
    async fn test_moving_for_the_engine_is_rejected() {
        let (handle, _events, mut mock) =
            scripted_session(vs_engine(PieceColor::Black), &[]).await;
        mock.wait_for_command("go").await.unwrap();

        let err = handle.make_move(sq("e2"), sq("e4"), None).await.unwrap_err();
        assert_eq!(err, SessionError::NotYourTurn);
        assert!(handle.get_snapshot().await.unwrap().engine_thinking);
    }

    #[tokio::test]
    async fn test_engine_moves_first_when_human_plays_black() {
        let (handle, mut events, mut mock) =
            scripted_session(vs_engine(PieceColor::Black), &["bestmove d2d4", "bestmove c2c4"])
                .await;

        assert_eq!(
            mock.wait_for_command("position").await.unwrap(),
            format!("position fen {}", chess::START_FEN)
        );

        let snap = handle.get_snapshot().await.unwrap();
        let snap = if snap.move_count == 1 {
            snap
        } else {
            wait_for(&mut events, |s| s.move_count == 1).await
        };
        assert_eq!(snap.human_side.as_deref(), Some("black"));
        assert_eq!(snap.side_to_move, "black");
        assert_eq!(snap.last_move, Some(("d2".to_string(), "d4".to_string())));

        handle.make_move(sq("g8"), sq("f6"), None).await.unwrap();
        let snap = wait_for(&mut events, |s| s.move_count == 3).await;
        assert_eq!(snap.history[2].san, "c4");
    }

    #[tokio::test]
    async fn test_illegal_engine_move_freezes_play() {
        let (handle, mut events, _mock) =
            scripted_session(vs_engine(PieceColor::White), &["bestmove a2a3"]).await;

        handle.make_move(sq("e2"), sq("e4"), None).await.unwrap();
        let snap = wait_for(&mut events, |s| s.engine_error.is_some()).await;
        assert!(snap.engine_error.unwrap().contains("desync"));
        assert!(!snap.engine_thinking);
        assert_eq!(snap.move_count, 1);

        let err = handle.make_move(sq("d2"), sq("d4"), None).await.unwrap_err();
        assert!(matches!(err, SessionError::EngineFailed(_)));

        let snap = handle.reset().await.unwrap();
        assert_eq!(snap.engine_error, None);
        assert_eq!(snap.generation, 1);
        assert_eq!(snap.fen, chess::START_FEN);
    }

    #[tokio::test]
    async fn test_stale_reply_after_reset_is_discarded() {
        let (bridge, mut mock) = MockEngine::connect(EngineConfig::default()).await.unwrap();
        let handle = spawn_session(vs_engine(PieceColor::White), Some(bridge)).unwrap();
        let (_, mut events) = handle.subscribe().await.unwrap();

        handle.make_move(sq("e2"), sq("e4"), None).await.unwrap();
        mock.wait_for_command("go").await.unwrap();

        let snap = handle.reset().await.unwrap();
        assert_eq!(snap.generation, 1);
        assert_eq!(snap.move_count, 0);
        assert!(!snap.engine_thinking);
        mock.wait_for_command("stop").await.unwrap();

        // The abandoned search still answers
        mock.reply("bestmove e7e5");

        handle.make_move(sq("d2"), sq("d4"), None).await.unwrap();
        mock.wait_for_command("go").await.unwrap();
        mock.reply("bestmove d7d5");

        let snap = wait_for(&mut events, |s| s.move_count == 2).await;
        assert_eq!(snap.generation, 1);
        assert_eq!(snap.history[0].san, "d4");
        assert_eq!(snap.last_move, Some(("d7".to_string(), "d5".to_string())));
        assert_eq!(snap.engine_error, None);
    }

    #[tokio::test]
    async fn test_unreadable_reply_is_retried() {
        let (handle, mut events, mock) = scripted_session(
            vs_engine(PieceColor::White),
            &["bestmove zz", "bestmove c7c5"],
        )
        .await;

        handle.make_move(sq("e2"), sq("e4"), None).await.unwrap();
        let snap = wait_for(&mut events, |s| s.move_count == 2).await;
        assert_eq!(snap.history[1].san, "c5");
        assert_eq!(snap.engine_error, None);
        let searches = mock.received().iter().filter(|c| c.starts_with("go")).count();
        assert_eq!(searches, 2);
    }

    #[tokio::test]
    async fn test_repeated_unreadable_replies_freeze_play() {
        let (handle, mut events, mock) = scripted_session(
            vs_engine(PieceColor::White),
            &["bestmove zz", "bestmove e7e9"],
        )
        .await;

        handle.make_move(sq("e2"), sq("e4"), None).await.unwrap();
        let snap = wait_for(&mut events, |s| s.engine_error.is_some()).await;
        assert!(snap.engine_error.unwrap().contains("malformed"));
        let searches = mock.received().iter().filter(|c| c.starts_with("go")).count();
        assert_eq!(searches, 2);
    }

    #[tokio::test]
    async fn test_unresponsive_engine_freezes_play() {
        let config = EngineConfig {
            search_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let (bridge, _mock) = MockEngine::connect(config).await.unwrap();
        let handle = spawn_session(vs_engine(PieceColor::White), Some(bridge)).unwrap();
        let (_, mut events) = handle.subscribe().await.unwrap();

        handle.make_move(sq("e2"), sq("e4"), None).await.unwrap();
        let snap = wait_for(&mut events, |s| s.engine_error.is_some()).await;
        assert!(snap.engine_error.unwrap().contains("unresponsive"));
        assert!(!snap.engine_thinking);
    }

    #[tokio::test]
    async fn test_engine_exit_freezes_play() {
        let (bridge, mut mock) = MockEngine::connect(EngineConfig::default()).await.unwrap();
        let handle = spawn_session(vs_engine(PieceColor::White), Some(bridge)).unwrap();
        let (_, mut events) = handle.subscribe().await.unwrap();

        handle.make_move(sq("e2"), sq("e4"), None).await.unwrap();
        mock.wait_for_command("go").await.unwrap();
        mock.hang_up();

        let snap = wait_for(&mut events, |s| s.engine_error.is_some()).await;
        assert!(snap.engine_error.unwrap().contains("closed"));
    }

    #[tokio::test]
    async fn test_uci_traffic_is_forwarded() {
        let (handle, mut events, _mock) =
            scripted_session(vs_engine(PieceColor::White), &["bestmove e7e5"]).await;
        handle.make_move(sq("e2"), sq("e4"), None).await.unwrap();

        let wait = async {
            let mut saw_go = false;
            let mut saw_bestmove = false;
            while !(saw_go && saw_bestmove) {
                if let Ok(SessionEvent::UciMessage(entry)) = events.recv().await {
                    match entry.direction {
                        UciDirection::ToEngine => saw_go |= entry.message == "go depth 15",
                        UciDirection::FromEngine => {
                            saw_bestmove |= entry.message == "bestmove e7e5"
                        }
                    }
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("UCI traffic not forwarded");
    }

    #[tokio::test]
    async fn test_human_vs_human_needs_no_engine() {
        let config = SessionConfig {
            game_mode: GameMode::HumanVsHuman,
            ..Default::default()
        };
        let handle = spawn_session(config, None).unwrap();
        for (from, to) in [("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")] {
            handle.make_move(sq(from), sq(to), None).await.unwrap();
        }
        let snap = handle.get_snapshot().await.unwrap();
        assert!(snap.is_terminal);
        assert!(snap.in_check);
        assert_eq!(
            snap.status,
            StatusView::Checkmate {
                winner: "black".to_string()
            }
        );
        let err = handle.make_move(sq("a2"), sq("a3"), None).await.unwrap_err();
        assert!(matches!(err, SessionError::GameOver(_)));
    }

    #[tokio::test]
    async fn test_engine_mode_requires_engine() {
        let result = spawn_session(SessionConfig::default(), None);
        assert!(matches!(result, Err(SessionError::EngineNotConfigured)));
    }

    #[tokio::test]
    async fn test_snapshot_serializes_for_ui() {
        let config = SessionConfig {
            game_mode: GameMode::HumanVsHuman,
            ..Default::default()
        };
        let handle = spawn_session(config, None).unwrap();
        let snap = handle.make_move(sq("e2"), sq("e4"), None).await.unwrap();

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["side_to_move"], "black");
        assert_eq!(json["status"]["kind"], "ongoing");
        assert_eq!(json["destinations"]["g8"], serde_json::json!(["f6", "h6"]));
        assert_eq!(json["history"][0]["san"], "e4");
        assert_eq!(json["session_id"], handle.id());
    }

    #[tokio::test]
    async fn test_shutdown_quits_engine() {
        let (handle, _events, mut mock) =
            scripted_session(vs_engine(PieceColor::White), &[]).await;
        handle.shutdown().await;
        assert_eq!(mock.wait_for_command("quit").await.unwrap(), "quit");
        assert!(handle.get_snapshot().await.is_err());
    }
}
