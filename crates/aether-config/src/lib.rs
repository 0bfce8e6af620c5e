//! Configuration for the Aether renderer.
//!
//! Settings persist to disk as a RON file, can be overridden from the command
//! line via clap, and are re-read between frames to pick up edits.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{CONFIG_FILE_NAME, Config, DebugConfig, RenderConfig, ScatteringConfig};
pub use error::ConfigError;
