//! Command-line argument parsing for the gridlink client.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// gridlink command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "gridlink", about = "gridlink game server client")]
pub struct CliArgs {
    /// Server WebSocket URL.
    #[arg(long)]
    pub url: Option<String>,

    /// Heartbeat interval in milliseconds.
    #[arg(long)]
    pub heartbeat_ms: Option<u64>,

    /// Grid size along each axis.
    #[arg(long)]
    pub world_size: Option<i32>,

    /// Drift threshold (Manhattan distance) before snapping to the server.
    #[arg(long)]
    pub drift_threshold: Option<u32>,

    /// Minimum interval between accepted inputs in milliseconds.
    #[arg(long)]
    pub debounce_ms: Option<u64>,

    /// Game mode to queue for.
    #[arg(long)]
    pub game_mode: Option<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref url) = args.url {
            self.server.url = url.clone();
        }
        if let Some(ms) = args.heartbeat_ms {
            self.session.heartbeat_interval_ms = ms;
        }
        if let Some(size) = args.world_size {
            self.prediction.world_size = size;
        }
        if let Some(threshold) = args.drift_threshold {
            self.prediction.drift_threshold = threshold;
        }
        if let Some(ms) = args.debounce_ms {
            self.prediction.debounce_ms = ms;
        }
        if let Some(ref mode) = args.game_mode {
            self.matchmaking.game_mode = mode.clone();
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            url: Some("ws://192.168.1.1:8080".to_string()),
            debounce_ms: Some(20),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.server.url, "ws://192.168.1.1:8080");
        assert_eq!(config.prediction.debounce_ms, 20);
        // Non-overridden fields retain defaults
        assert_eq!(config.prediction.world_size, 8);
        assert_eq!(config.session.heartbeat_interval_ms, 5000);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::parse_from(["gridlink", "--world-size", "12", "--log-level", "debug"]);
        assert_eq!(args.world_size, Some(12));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.url.is_none());
    }
}
