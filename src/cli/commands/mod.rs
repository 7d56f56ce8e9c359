//! CLI command implementations.

mod config;
mod credential;
mod start;

pub use config::{run_config, ConfigArgs};
pub use credential::{run_credential, CredentialArgs};
pub use start::{init_tracing, load_config, run_start, StartArgs};
