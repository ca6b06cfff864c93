// Configuration management module
// TOML-backed settings plus the interactive setup flow

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{Config, ConfigError, OllamaConfig, RetrievalConfig};

/// Get the base data directory path
#[inline]
pub fn get_base_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_base_dir()
}
