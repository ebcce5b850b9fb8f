use std::path::{Path, PathBuf};
use std::process::Stdio;

use crate::bridge::EngineBridge;
use crate::config::EngineConfig;
use crate::error::EngineError;

impl EngineBridge {
    /// Launch the engine binary and complete the UCI handshake with it.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn spawn(config: EngineConfig) -> Result<Self, EngineError> {
        tracing::info!("Starting engine spawn (config: {:?})", config);
        let path = match &config.path {
            Some(path) => path.clone(),
            None => find_stockfish_path().ok_or(EngineError::NotFound)?,
        };
        tracing::info!("Using engine at: {:?}", path);

        let mut process = tokio::process::Command::new(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                tracing::error!("Failed to spawn engine: {}", source);
                EngineError::Spawn {
                    path: path.clone(),
                    source,
                }
            })?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("engine has no stdin"))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("engine has no stdout"))?;

        let mut bridge = Self::connect(stdout, stdin, &config).await?;
        bridge.child = Some(process);
        tracing::info!("Engine spawned and initialized successfully");
        Ok(bridge)
    }
}

/// Find Stockfish executable in common locations
pub fn find_stockfish_path() -> Option<PathBuf> {
    let paths = [
        "/usr/local/bin/stockfish",
        "/usr/bin/stockfish",
        "/opt/homebrew/bin/stockfish",
        "/usr/games/stockfish",
    ];

    if let Some(found) = paths.iter().map(Path::new).find(|path| path.is_file()) {
        return Some(found.to_path_buf());
    }

    // Fall back to whatever is on PATH
    std::env::var_os("PATH").and_then(|dirs| {
        std::env::split_paths(&dirs)
            .map(|dir| dir.join("stockfish"))
            .find(|candidate| candidate.is_file())
    })
}
