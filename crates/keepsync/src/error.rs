//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use keepsync_config::ConfigError;
use keepsync_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const STORAGE: i32 = 5;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum CliError {
    // ── Storage ──────────────────────────────────────────────────────

    #[error("Could not load the stored value: {message}")]
    #[diagnostic(
        code(keepsync::load_failed),
        help("Check that the value file exists, is readable and holds valid JSON.")
    )]
    LoadFailed { message: String },

    #[error("Could not persist the value: {message}")]
    #[diagnostic(
        code(keepsync::save_failed),
        help("The value was accepted but not written. Check permissions and free space.")
    )]
    SaveFailed { message: String },

    #[error("Operation was cancelled")]
    #[diagnostic(code(keepsync::cancelled))]
    Cancelled,

    // ── Configuration ────────────────────────────────────────────────

    #[error("Store '{name}' not found in configuration")]
    #[diagnostic(
        code(keepsync::store_not_found),
        help(
            "Add one with: keepsync config add {name} <PATH>\n\
             Or pass a file directly with --file.\n\
             Config file: {path}"
        )
    )]
    StoreNotFound { name: String, path: String },

    #[error(transparent)]
    #[diagnostic(code(keepsync::config))]
    Config(Box<figment::Error>),

    #[error("Could not write the config file: {message}")]
    #[diagnostic(code(keepsync::config_write))]
    ConfigWrite { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(keepsync::validation))]
    Validation { field: String, reason: String },

    #[error("VALUE is not valid JSON: {source}")]
    #[diagnostic(
        code(keepsync::invalid_json),
        help("Quote strings as JSON (e.g. '\"dark\"') or pass --string to store the raw text.")
    )]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("Internal error: {0}")]
    #[diagnostic(code(keepsync::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {0}")]
    #[diagnostic(code(keepsync::render))]
    Render(String),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::LoadFailed { .. } | Self::SaveFailed { .. } => exit_code::STORAGE,
            Self::StoreNotFound { .. } => exit_code::NOT_FOUND,
            Self::Config(_) | Self::ConfigWrite { .. } => exit_code::CONFIG,
            Self::Validation { .. } | Self::InvalidJson { .. } => exit_code::USAGE,
            Self::Cancelled => exit_code::INTERRUPTED,
            Self::Internal(_) | Self::Io(_) | Self::Render(_) => exit_code::GENERAL,
        }
    }
}

// ── Library error mapping ────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::LoadFailed { message } => Self::LoadFailed { message },
            CoreError::SaveFailed { message } => Self::SaveFailed { message },
            CoreError::Cancelled => Self::Cancelled,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::StoreNotFound { name, path } => Self::StoreNotFound {
                name,
                path: path.display().to_string(),
            },
            ConfigError::Serialization(e) => Self::ConfigWrite {
                message: e.to_string(),
            },
            ConfigError::Figment(e) => Self::Config(e),
            ConfigError::Io(e) => Self::Io(e),
        }
    }
}
