//! chessplay - play chess against a UCI engine from the terminal.
//!
//! A thin line-oriented shell over a game session. Moves are typed in UCI
//! notation (`e2e4`, `e7e8q`) and the board is printed after every change.
//! With `--json`, every snapshot is printed as one line of JSON instead, so
//! another process can drive the session through stdin and stdout.
//!
//! Runtime tunables are read from the environment (see [`config`]) and can
//! be overridden on the command line.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use engine::{EngineBridge, EngineConfig};
use session::{GameMode, SessionConfig, SessionEvent, SessionHandle, SessionSnapshot};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod input;
mod render;

use input::Input;

/// Command-line arguments for chessplay.
#[derive(Parser)]
#[command(name = "chessplay", about = "Play chess against a UCI engine")]
struct Cli {
    /// Play the black pieces; the engine opens the game.
    #[arg(long, conflicts_with = "two_player")]
    black: bool,

    /// Both sides are played from the keyboard; no engine is started.
    #[arg(long)]
    two_player: bool,

    /// Print each snapshot as a line of JSON instead of a board.
    #[arg(long)]
    json: bool,

    /// Engine search depth in plies.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..))]
    depth: Option<u8>,

    /// Engine threads.
    #[arg(long)]
    threads: Option<u32>,

    /// Engine playing strength, 0 to 20.
    #[arg(long)]
    skill: Option<u8>,

    /// Give up on an engine search after this many seconds.
    #[arg(long)]
    search_timeout: Option<u64>,

    /// Path to a UCI engine binary.
    #[arg(long)]
    engine_path: Option<PathBuf>,
}

impl Cli {
    fn game_mode(&self) -> GameMode {
        if self.two_player {
            GameMode::HumanVsHuman
        } else if self.black {
            GameMode::HumanVsEngine {
                human_side: chess::PieceColor::Black,
            }
        } else {
            GameMode::HumanVsEngine {
                human_side: chess::PieceColor::White,
            }
        }
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            game_mode: self.game_mode(),
            search_depth: self.depth.unwrap_or_else(config::get_search_depth),
            ..Default::default()
        }
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            path: self.engine_path.clone().or_else(config::get_engine_path),
            threads: Some(self.threads.unwrap_or_else(config::get_engine_threads)),
            skill_level: self.skill,
            search_timeout: self
                .search_timeout
                .map(Duration::from_secs)
                .or_else(config::get_search_timeout),
            ..Default::default()
        }
    }
}

/// Set up tracing to stderr, or to a daily rolling file when a log directory
/// is configured. The returned guard must live as long as logging does.
fn init_tracing() -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match config::get_log_dir() {
        Some(log_dir) => {
            std::fs::create_dir_all(&log_dir)
                .with_context(|| format!("creating log directory {}", log_dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(&log_dir, "chessplay");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_line_number(true),
                )
                .with(filter)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing()?;

    tracing::info!("chessplay starting up");

    let session_config = cli.session_config();
    let engine = match session_config.game_mode {
        GameMode::HumanVsHuman => None,
        GameMode::HumanVsEngine { .. } => {
            let bridge = EngineBridge::spawn(cli.engine_config())
                .await
                .context("starting the chess engine")?;
            Some(bridge)
        }
    };

    let handle = session::spawn_session(session_config, engine)?;
    let (initial, events) = handle.subscribe().await?;

    print_snapshot(&initial, cli.json)?;
    if !cli.json {
        println!("type `help` for commands");
    }
    let printer = tokio::spawn(print_events(events, cli.json));

    let result = read_commands(&handle, cli.json).await;

    handle.shutdown().await;
    printer.abort();
    tracing::info!("chessplay shutting down");
    result
}

async fn read_commands(handle: &SessionHandle, json: bool) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let input = match input::parse(&line) {
            Ok(input) => input,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        match input {
            Input::Move {
                from,
                to,
                promotion,
            } => {
                // The new board arrives as a StateChanged event
                if let Err(e) = handle.make_move(from, to, promotion).await {
                    eprintln!("{}", e);
                }
            }
            Input::New => {
                handle.reset().await?;
            }
            Input::Fen => {
                let snapshot = handle.get_snapshot().await?;
                println!("{}", snapshot.fen);
            }
            Input::Moves => {
                let snapshot = handle.get_snapshot().await?;
                if json {
                    println!("{}", serde_json::to_string(&snapshot.destinations)?);
                } else {
                    println!("{}", render::destinations(&snapshot));
                }
            }
            Input::Help => println!("{}", input::HELP),
            Input::Quit => break,
            Input::Empty => {}
        }
    }

    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>, json: bool) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::StateChanged(snapshot)) => {
                if let Err(e) = print_snapshot(&snapshot, json) {
                    tracing::error!("Failed to print snapshot: {}", e);
                }
            }
            Ok(SessionEvent::EngineThinking(info)) => {
                tracing::debug!(depth = ?info.depth, score = ?info.score, "Engine thinking");
            }
            Ok(SessionEvent::UciMessage(entry)) => {
                tracing::trace!("{:?}: {}", entry.direction, entry.message);
            }
            Ok(SessionEvent::Error(message)) => eprintln!("engine error: {}", message),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Skipped {} session events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_snapshot(snapshot: &SessionSnapshot, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
    } else {
        println!("{}\n", render::snapshot(snapshot));
    }
    Ok(())
}
