//! Configuration constants for subprocess transport

use std::time::Duration;

/// Default maximum size of one JSON document (1MB)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Documents buffered between the stdout reader and the router
pub const READ_CHANNEL_CAPACITY: usize = 64;

/// How long `close` waits for the process to exit before killing it
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Value of the entrypoint variable the CLI uses to identify its caller
pub const ENTRYPOINT: &str = "sdk-rust";

/// Dangerous environment variables that should not be passed to subprocess
///
/// These variables can affect how the subprocess loads and executes code.
pub const DANGEROUS_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "PATH",
    "NODE_OPTIONS",
    "PYTHONPATH",
    "PERL5LIB",
    "RUBYLIB",
];

/// Extra CLI flags that may be passed through `extra_args`
pub const ALLOWED_EXTRA_FLAGS: &[&str] = &[
    "timeout",
    "retries",
    "log-level",
    "cache-dir",
    "include-partial-messages",
    "add-dir",
    "settings",
];
