pub mod commands;
pub mod config;
pub mod tracing_setup;

pub use commands::{run_command, Command};
pub use config::CliConfig;
pub use tracing_setup::init_tracing;
