//! Extension manifest parsing.
//!
//! An extension prints its manifest as JSON when spawned without arguments.
//! The manifest declares:
//! - Extension identity (title, description)
//! - External requirements (binaries that must be on `PATH`)
//! - Preferences resolved from the host configuration
//! - Commands and the subset surfaced in the root menu

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Parameter values keyed by name.
///
/// A `BTreeMap` keeps serialized payloads stable across runs.
pub type Params = BTreeMap<String, ParamValue>;

/// Complete manifest printed by an extension on discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Human-readable display name.
    pub title: String,

    /// Short description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Binaries the extension shells out to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Requirement>,

    /// Preferences read from the host configuration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferences: Vec<CommandParam>,

    /// Commands surfaced in the root menu.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub root: Vec<CommandRef>,

    /// Every command the extension can run.
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
}

impl Manifest {
    /// Parse and validate a manifest from raw process output.
    pub fn parse(raw: &[u8]) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_slice(raw).map_err(|e| ManifestError {
            field: "manifest".to_string(),
            message: e.to_string(),
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate the manifest for required fields and constraints.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.title.trim().is_empty() {
            return Err(ManifestError::new("title", "title is required"));
        }

        let mut names = HashSet::new();
        for (idx, cmd) in self.commands.iter().enumerate() {
            if cmd.name.is_empty() {
                return Err(ManifestError::new(
                    format!("commands[{}].name", idx),
                    "command name is required",
                ));
            }
            if !names.insert(cmd.name.as_str()) {
                return Err(ManifestError::new(
                    format!("commands[{}].name", idx),
                    format!("duplicate command '{}'", cmd.name),
                ));
            }
            validate_params(&format!("commands[{}].params", idx), &cmd.params)?;
        }

        validate_params("preferences", &self.preferences)?;

        for (idx, entry) in self.root.iter().enumerate() {
            let Some(cmd) = self.command(&entry.command) else {
                return Err(ManifestError::new(
                    format!("root[{}].command", idx),
                    format!("unknown command '{}'", entry.command),
                ));
            };
            for (name, value) in &entry.params {
                let Some(param) = cmd.param(name) else {
                    return Err(ManifestError::new(
                        format!("root[{}].params.{}", idx, name),
                        format!("command '{}' has no parameter '{}'", cmd.name, name),
                    ));
                };
                if value.param_type() != param.param_type {
                    return Err(ManifestError::new(
                        format!("root[{}].params.{}", idx, name),
                        format!("expected a {}, got a {}", param.param_type, value.param_type()),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Look up a command by name.
    pub fn command(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.iter().find(|cmd| cmd.name == name)
    }

    /// Entries for the root menu.
    ///
    /// Falls back to every non-hidden command when `root` is empty.
    pub fn root_commands(&self) -> Vec<CommandRef> {
        if !self.root.is_empty() {
            return self.root.clone();
        }

        self.commands
            .iter()
            .filter(|cmd| !cmd.hidden)
            .map(|cmd| CommandRef {
                command: cmd.name.clone(),
                title: None,
                description: None,
                params: Params::new(),
            })
            .collect()
    }
}

fn validate_params(path: &str, params: &[CommandParam]) -> Result<(), ManifestError> {
    let mut names = HashSet::new();
    for (idx, param) in params.iter().enumerate() {
        if param.name.is_empty() {
            return Err(ManifestError::new(
                format!("{}[{}].name", path, idx),
                "parameter name is required",
            ));
        }
        if !names.insert(param.name.as_str()) {
            return Err(ManifestError::new(
                format!("{}[{}].name", path, idx),
                format!("duplicate parameter '{}'", param.name),
            ));
        }
        if let Some(default) = &param.default {
            if default.param_type() != param.param_type {
                return Err(ManifestError::new(
                    format!("{}[{}].default", path, idx),
                    format!(
                        "expected a {}, got a {}",
                        param.param_type,
                        default.param_type()
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// A manifest that failed to parse or validate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestError {
    /// Path of the offending field, e.g. `commands[2].params[0].default`.
    pub field: String,
    pub message: String,
}

impl ManifestError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.field, self.message)
    }
}

/// External dependency of an extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Binary name looked up on `PATH`.
    pub name: String,

    /// Where to learn how to install it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Reference to a command, optionally with pre-bound parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRef {
    pub command: String,

    /// Display override for the command title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: Params,
}

/// One invokable command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Unique command identifier within the extension.
    pub name: String,

    /// Human-readable command title.
    #[serde(default)]
    pub title: String,

    /// How the host treats the command's output.
    pub mode: CommandMode,

    /// Excluded from menus but still invokable by name.
    #[serde(default)]
    pub hidden: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub params: Vec<CommandParam>,
}

impl CommandSpec {
    /// Look up a declared parameter by name.
    pub fn param(&self, name: &str) -> Option<&CommandParam> {
        self.params.iter().find(|param| param.name == name)
    }

    /// Title to show in menus.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.name
        } else {
            &self.title
        }
    }
}

/// Command UI mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CommandMode {
    /// Prints a List.
    List,
    /// Prints a Detail.
    Detail,
    /// Owns the terminal until it exits.
    Tty,
    /// Prints nothing.
    Silent,
}

impl CommandMode {
    /// Whether the host parses stdout for this mode.
    pub fn expects_output(self) -> bool {
        matches!(self, CommandMode::List | CommandMode::Detail)
    }
}

impl fmt::Display for CommandMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandMode::List => "list",
            CommandMode::Detail => "detail",
            CommandMode::Tty => "tty",
            CommandMode::Silent => "silent",
        };
        f.write_str(name)
    }
}

/// A named, typed input of a command or an extension preference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandParam {
    pub name: String,

    #[serde(rename = "type")]
    pub param_type: ParamType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub required: bool,

    /// Must match `param_type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ParamValue>,
}

impl CommandParam {
    /// Whether the caller has to supply a value.
    pub fn must_be_supplied(&self) -> bool {
        self.required && self.default.is_none()
    }
}

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Boolean,
    Number,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Boolean => "boolean",
            ParamType::Number => "number",
        };
        f.write_str(name)
    }
}

/// A concrete parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Boolean(bool),
    Number(serde_json::Number),
    String(String),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Boolean(_) => ParamType::Boolean,
            ParamValue::Number(_) => ParamType::Number,
            ParamValue::String(_) => ParamType::String,
        }
    }

    /// Parse user input (CLI flag, prompt answer) into the declared type.
    pub fn coerce(raw: &str, param_type: ParamType) -> Option<Self> {
        match param_type {
            ParamType::String => Some(ParamValue::String(raw.to_string())),
            ParamType::Boolean => match raw.trim().to_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Some(ParamValue::Boolean(true)),
                "false" | "no" | "n" | "0" => Some(ParamValue::Boolean(false)),
                _ => None,
            },
            ParamType::Number => {
                let raw = raw.trim();
                if let Ok(int) = raw.parse::<i64>() {
                    return Some(ParamValue::Number(int.into()));
                }
                raw.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(ParamValue::Number)
            }
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Boolean(value) => write!(f, "{}", value),
            ParamValue::Number(value) => write!(f, "{}", value),
            ParamValue::String(value) => f.write_str(value),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Boolean(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Number(value.into())
    }
}
