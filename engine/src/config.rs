use std::path::PathBuf;
use std::time::Duration;

/// Configuration for launching and talking to a UCI engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Explicit engine binary; searched for when `None`.
    pub path: Option<PathBuf>,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
    pub skill_level: Option<u8>,
    pub handshake_timeout: Duration,
    /// Fail a search that produces no `bestmove` within this long.
    pub search_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: None,
            threads: Some(2),
            hash_mb: None,
            skill_level: None,
            handshake_timeout: Duration::from_secs(10),
            search_timeout: None,
        }
    }
}

/// A single `setoption` sent during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOption {
    pub name: String,
    pub value: String,
}

impl EngineOption {
    pub fn new(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }

    pub fn to_command(&self) -> String {
        format!("setoption name {} value {}", self.name, self.value)
    }
}

impl EngineConfig {
    /// Options to set before the first `isready`, clamped to sane ranges.
    pub fn options(&self) -> Vec<EngineOption> {
        let mut options = Vec::new();
        if let Some(threads) = self.threads {
            options.push(EngineOption::new("Threads", threads.clamp(1, 16)));
        }
        if let Some(hash_mb) = self.hash_mb {
            options.push(EngineOption::new("Hash", hash_mb.clamp(1, 2048)));
        }
        if let Some(level) = self.skill_level {
            options.push(EngineOption::new("Skill Level", level.min(20)));
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sets_two_threads() {
        let options = EngineConfig::default().options();
        assert_eq!(options, vec![EngineOption::new("Threads", 2)]);
        assert_eq!(options[0].to_command(), "setoption name Threads value 2");
    }

    #[test]
    fn test_options_are_clamped() {
        let config = EngineConfig {
            threads: Some(64),
            hash_mb: Some(0),
            skill_level: Some(30),
            ..Default::default()
        };
        let commands: Vec<String> = config.options().iter().map(EngineOption::to_command).collect();
        assert_eq!(
            commands,
            vec![
                "setoption name Threads value 16",
                "setoption name Hash value 1",
                "setoption name Skill Level value 20",
            ]
        );
    }
}
