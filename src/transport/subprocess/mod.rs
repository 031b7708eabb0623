//! Subprocess transport running the agent CLI over stdio

mod command;
mod config;
mod lifecycle;
mod reader;
mod transport;

pub use command::CommandBuilder;
pub use config::{ALLOWED_EXTRA_FLAGS, DANGEROUS_ENV_VARS, DEFAULT_MAX_BUFFER_SIZE};
pub use transport::SubprocessTransport;
