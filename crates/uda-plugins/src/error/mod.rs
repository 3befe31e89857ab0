//! Domain errors raised while registering and dispatching plugins.
//!
//! I/O errors are wrapped in `Arc` so the enum stays `Clone` and small
//! enough for the `result_large_err` lint.

use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;
use uda_protocol::{ErrorRecord, StatusCode};

/// Errors arising from plugin registration and dispatch.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// No registered plugin matches the request.
    #[error("no plugin matches request '{request}'")]
    NoPlugin {
        /// Request text.
        request: String,
    },

    /// Several equally specific plugins match the request.
    #[error("request '{request}' matches {stage} of several plugins: {}", candidates.join(", "))]
    Ambiguous {
        /// Request text.
        request: String,
        /// Resolution stage that matched more than once.
        stage: &'static str,
        /// Names of the matching plugins.
        candidates: Vec<String>,
    },

    /// The plugin's one-time initialisation failed.
    #[error("plugin '{plugin}' failed to initialise: {message}")]
    InitFailed {
        /// Plugin name.
        plugin: String,
        /// Failure reported by the plugin.
        message: String,
    },

    /// The plugin ran and reported a failure.
    #[error("plugin '{plugin}' failed: {message}")]
    Failed {
        /// Plugin name.
        plugin: String,
        /// Status chosen by the plugin.
        code: StatusCode,
        /// Failure reported by the plugin.
        message: String,
    },

    /// A plugin descriptor or registry file entry is invalid.
    #[error("manifest error: {message}")]
    Manifest {
        /// Description of the problem.
        message: String,
    },

    /// The plugin registry file could not be read.
    #[error("failed to read plugin registry '{path}': {source}")]
    Io {
        /// Registry file path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl PluginError {
    /// Status code for this failure.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NoPlugin { .. } => StatusCode::NO_PLUGIN,
            Self::Ambiguous { .. } => StatusCode::AMBIGUOUS_PLUGIN,
            Self::InitFailed { .. } | Self::Manifest { .. } | Self::Io { .. } => {
                StatusCode::PLUGIN_INIT_FAILED
            }
            Self::Failed { code, .. } => *code,
        }
    }

    /// Error-stack entry attributed to `location`.
    #[must_use]
    pub fn to_record(&self, location: &str) -> ErrorRecord {
        ErrorRecord::new(self.status(), location, self.to_string())
    }
}
