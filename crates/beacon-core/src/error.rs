//! Error types for beacon.
//!
//! Every failure the host can hit while driving an extension is a variant of
//! [`BeaconError`]. Variants are grouped into an [`ErrorClass`] so the UI can
//! decide how to surface them without matching on messages.

use std::time::Duration;

use thiserror::Error;

use crate::extensions::ParamType;

/// Coarse classification of a [`BeaconError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Spawn failure, non-zero exit or invalid manifest while discovering.
    Discovery,
    /// Missing, mistyped or unknown command parameter, or a bad selection.
    Parameter,
    /// Missing preference, unresolvable origin, dangling reference.
    Configuration,
    /// Non-zero exit, timeout or malformed output while executing.
    Invocation,
    /// Output shape does not match the declared command mode.
    ProtocolViolation,
    /// The user dismissed the view while the process was running.
    Cancelled,
    /// Clipboard, opener or filesystem failure on the host side.
    Platform,
}

/// Errors that can occur in beacon
#[derive(Debug, Error)]
pub enum BeaconError {
    #[error("Extension '{extension}' is unavailable: {message}")]
    Discovery { extension: String, message: String },

    #[error("Missing required parameter '{param}' for command '{command}'")]
    MissingParameter { command: String, param: String },

    #[error("Parameter '{param}' of command '{command}' expects a {expected}, got a {found}")]
    ParameterType {
        command: String,
        param: String,
        expected: ParamType,
        found: ParamType,
    },

    #[error("Command '{command}' has no parameter named '{param}'")]
    UnknownParameter { command: String, param: String },

    #[error("No such action: {0}")]
    NoSuchAction(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required preference '{preference}' for extension '{extension}'")]
    MissingPreference {
        extension: String,
        preference: String,
    },

    #[error("Preference '{preference}' of extension '{extension}' expects a {expected}, got a {found}")]
    PreferenceType {
        extension: String,
        preference: String,
        expected: ParamType,
        found: ParamType,
    },

    #[error("Extension '{0}' is not configured")]
    ExtensionNotFound(String),

    #[error("Command '{command}' not found in extension '{extension}'")]
    CommandNotFound { extension: String, command: String },

    #[error("{extension}/{command} exited with {}: {stderr}", exit_label(.code))]
    Invocation {
        extension: String,
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to start extension '{extension}': {message}")]
    Spawn { extension: String, message: String },

    #[error("{extension}/{command} timed out after {}s", .timeout.as_secs_f32())]
    Timeout {
        extension: String,
        command: String,
        timeout: Duration,
    },

    #[error("{extension}/{command} returned malformed output: {message}{}", stderr_note(.stderr))]
    MalformedOutput {
        extension: String,
        command: String,
        message: String,
        stderr: String,
    },

    #[error("Protocol violation in {extension}/{command}: {message}{}", stderr_note(.stderr))]
    ProtocolViolation {
        extension: String,
        command: String,
        message: String,
        stderr: String,
    },

    #[error("Reload of {extension}/{command} is already pending")]
    ReloadCycle { extension: String, command: String },

    #[error("Run chain exceeded {0} nested commands")]
    RunDepthExceeded(usize),

    #[error("Invocation of {extension}/{command} was cancelled")]
    Cancelled { extension: String, command: String },

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

/// Captured stderr appended to an error message, when there is any.
fn stderr_note(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(" (stderr: {})", stderr)
    }
}

impl BeaconError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            BeaconError::Discovery { .. } => ErrorClass::Discovery,
            BeaconError::MissingParameter { .. }
            | BeaconError::ParameterType { .. }
            | BeaconError::UnknownParameter { .. }
            | BeaconError::NoSuchAction(_) => ErrorClass::Parameter,
            BeaconError::Config(_)
            | BeaconError::MissingPreference { .. }
            | BeaconError::PreferenceType { .. }
            | BeaconError::ExtensionNotFound(_)
            | BeaconError::CommandNotFound { .. }
            | BeaconError::TomlParse(_)
            | BeaconError::TomlWrite(_) => ErrorClass::Configuration,
            BeaconError::Invocation { .. }
            | BeaconError::Spawn { .. }
            | BeaconError::Timeout { .. }
            | BeaconError::MalformedOutput { .. } => ErrorClass::Invocation,
            BeaconError::ProtocolViolation { .. }
            | BeaconError::ReloadCycle { .. }
            | BeaconError::RunDepthExceeded(_) => ErrorClass::ProtocolViolation,
            BeaconError::Cancelled { .. } => ErrorClass::Cancelled,
            BeaconError::Clipboard(_)
            | BeaconError::Platform(_)
            | BeaconError::Io(_)
            | BeaconError::Json(_) => ErrorClass::Platform,
        }
    }

    /// Whether the error was raised before any process was spawned.
    pub fn is_pre_spawn(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Parameter | ErrorClass::Configuration
        )
    }
}

/// Result type alias for beacon operations
pub type BeaconResult<T> = Result<T, BeaconError>;
