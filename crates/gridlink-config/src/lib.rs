//! Configuration system for the gridlink client.
//!
//! Settings persist to disk as `config.ron` and can be overridden from the
//! command line via clap. Missing sections and fields fall back to defaults,
//! so older files keep loading as new settings are added.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    ChatConfig, Config, DebugConfig, MatchmakingConfig, PredictionConfig, ServerConfig,
    SessionConfig, default_config_dir,
};
pub use error::ConfigError;
