use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Host contacted when neither configuration nor the hosts file names one.
pub const DEFAULT_SERVER_HOST: &str = "localhost";

/// Well-known server port.
pub const DEFAULT_SERVER_PORT: u16 = 56565;

/// Address the server binds when none is configured.
pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:56565";

/// Retries attempted after the first failed connect, per host.
pub const DEFAULT_MAX_SOCKET_ATTEMPTS: u32 = 3;

/// Upper bound, in seconds, of the randomised pause between connect attempts.
pub const DEFAULT_MAX_SOCKET_DELAY_SECS: u64 = 10;

/// Seconds a single request/response round trip may block.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Location of the hosts file relative to the user's home directory.
pub const HOSTS_FILE_RELATIVE: &str = ".uda/hosts.cfg";

/// Default log filter expression used by the binaries.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Computes `$HOME/.uda/hosts.cfg`, when a home directory is known.
#[must_use]
pub fn default_hosts_file() -> Option<Utf8PathBuf> {
    let home = dirs::home_dir()?;
    let home = Utf8PathBuf::from_path_buf(home).ok()?;
    Some(home.join(HOSTS_FILE_RELATIVE))
}
