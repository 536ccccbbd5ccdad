//! Invocation payloads.
//!
//! A [`Payload`] is serialized to JSON and passed as the single argument of
//! an extension process. The host type-checks every value against the
//! command's declared parameters before anything is spawned.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{BeaconError, BeaconResult};

use super::manifest::{CommandMode, CommandParam, CommandSpec, ParamValue, Params};

/// The single invocation request sent to an extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Name of the command to run.
    pub command: String,

    /// Resolved parameter values.
    #[serde(default)]
    pub params: Params,

    /// Free-text filter state of a list command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Working directory hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// Resolved extension preferences, scoped apart from `params`.
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub preferences: Params,
}

impl Payload {
    /// Build a payload for `spec`, validating `params` against its schema.
    ///
    /// Declared defaults fill absent parameters. A query is only forwarded
    /// to list commands; other modes drop it silently.
    pub fn build(
        spec: &CommandSpec,
        params: Params,
        query: Option<String>,
        cwd: Option<PathBuf>,
    ) -> BeaconResult<Self> {
        let mut resolved = Params::new();

        for (name, value) in params {
            let Some(param) = spec.param(&name) else {
                return Err(BeaconError::UnknownParameter {
                    command: spec.name.clone(),
                    param: name,
                });
            };
            check_type(spec, param, &value)?;
            resolved.insert(name, value);
        }

        for param in &spec.params {
            if resolved.contains_key(&param.name) {
                continue;
            }
            if let Some(default) = &param.default {
                resolved.insert(param.name.clone(), default.clone());
            } else if param.required {
                return Err(BeaconError::MissingParameter {
                    command: spec.name.clone(),
                    param: param.name.clone(),
                });
            }
        }

        let query = match spec.mode {
            CommandMode::List => query,
            _ => {
                if query.is_some() {
                    tracing::debug!("Ignoring query for {} command '{}'", spec.mode, spec.name);
                }
                None
            }
        };

        Ok(Self {
            command: spec.name.clone(),
            params: resolved,
            query,
            cwd,
            preferences: Params::new(),
        })
    }

    /// Attach resolved preferences.
    pub fn with_preferences(mut self, preferences: Params) -> Self {
        self.preferences = preferences;
        self
    }

    /// Serialize to the single process argument.
    pub fn to_arg(&self) -> BeaconResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn check_type(spec: &CommandSpec, param: &CommandParam, value: &ParamValue) -> BeaconResult<()> {
    if value.param_type() != param.param_type {
        return Err(BeaconError::ParameterType {
            command: spec.name.clone(),
            param: param.name.clone(),
            expected: param.param_type,
            found: value.param_type(),
        });
    }
    Ok(())
}

/// Source of interactive answers for parameters nothing else supplied.
pub trait Prompter {
    /// Ask for `param` of `command`. `None` means the user gave no value.
    fn prompt(&mut self, command: &CommandSpec, param: &CommandParam) -> Option<ParamValue>;
}

/// Prompter for non-interactive hosts; never answers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn prompt(&mut self, _command: &CommandSpec, _param: &CommandParam) -> Option<ParamValue> {
        None
    }
}

/// Merge parameter sources by precedence.
///
/// Values pinned by a root item or run action win over values from the
/// current interactive state. Required parameters still missing after that
/// (and without a default) are asked from `prompter`.
pub fn resolve_params(
    spec: &CommandSpec,
    pinned: &Params,
    state: &Params,
    prompter: &mut dyn Prompter,
) -> Params {
    let mut params = state.clone();
    for (name, value) in pinned {
        params.insert(name.clone(), value.clone());
    }

    for param in spec.params.iter().filter(|p| p.must_be_supplied()) {
        if params.contains_key(&param.name) {
            continue;
        }
        if let Some(value) = prompter.prompt(spec, param) {
            params.insert(param.name.clone(), value);
        }
    }

    params
}
