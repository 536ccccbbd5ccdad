//! Extension host - drives extension processes.
//!
//! The ExtensionHost is responsible for:
//! - Discovering manifests (concurrently, one process per extension)
//! - Building the combined root menu and searching it
//! - Resolving parameters and preferences into a payload
//! - Spawning commands and interpreting their output
//!
//! A failing extension is recorded as unavailable and never affects the
//! others.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Serialize;

use crate::config::Config;
use crate::error::{exit_label, BeaconError, BeaconResult};
use crate::process::{find_in_path, CancelToken, Invocation, ProcessRunner, Termination};

use super::components::{parse_response, View};
use super::manifest::{CommandMode, CommandSpec, Manifest, Params, Requirement};
use super::payload::{resolve_params, Payload, Prompter};

/// Set to `1` in every extension process.
pub const HOST_ENV: &str = "BEACON";

/// Alias of the extension being run.
pub const EXTENSION_ENV: &str = "BEACON_EXTENSION";

/// Configuration for the extension host.
#[derive(Debug, Clone)]
pub struct ExtensionHostConfig {
    /// Maximum time to wait for a manifest.
    pub discovery_timeout: Duration,

    /// Maximum execution time for a list, detail or silent command.
    pub execution_timeout: Duration,

    /// Maximum number of pages a run chain may stack.
    pub max_run_depth: usize,
}

impl Default for ExtensionHostConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(10),
            execution_timeout: Duration::from_secs(60),
            max_run_depth: 16,
        }
    }
}

/// An entry of the combined root menu.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RootEntry {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub target: RootTarget,
}

/// What selecting a root entry does.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RootTarget {
    Command {
        extension: String,
        command: String,
        #[serde(skip_serializing_if = "Params::is_empty")]
        params: Params,
    },
    Oneliner {
        alias: String,
    },
}

/// A request to run a command, before parameters are resolved.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvocationRequest {
    pub extension: String,
    pub command: String,
    /// Values fixed by a root item or run action.
    pub pinned: Params,
    /// Values from the current interactive state.
    pub state: Params,
    pub query: Option<String>,
    pub cwd: Option<PathBuf>,
}

impl InvocationRequest {
    pub fn new(extension: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_params(mut self, pinned: Params) -> Self {
        self.pinned = pinned;
        self
    }

    pub fn with_state(mut self, state: Params) -> Self {
        self.state = state;
        self
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }
}

/// A validated invocation, ready to spawn.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedInvocation {
    pub extension: String,
    pub program: PathBuf,
    pub mode: CommandMode,
    pub payload: Payload,
}

impl PreparedInvocation {
    pub fn command(&self) -> &str {
        &self.payload.command
    }
}

/// Result of a successful execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A list or detail to render.
    View(View),
    /// A silent or tty command finished.
    Done,
}

/// The extension host.
pub struct ExtensionHost {
    /// Host configuration registry.
    config: Config,

    settings: ExtensionHostConfig,

    runner: Arc<dyn ProcessRunner>,

    /// Discovered manifests by alias.
    manifests: HashMap<String, Manifest>,

    /// Aliases that failed discovery, with the reason.
    unavailable: BTreeMap<String, String>,

    /// Fuzzy matcher for search.
    matcher: SkimMatcherV2,
}

impl ExtensionHost {
    pub fn new(config: Config, runner: Arc<dyn ProcessRunner>) -> Self {
        Self::with_settings(config, runner, ExtensionHostConfig::default())
    }

    pub fn with_settings(
        config: Config,
        runner: Arc<dyn ProcessRunner>,
        settings: ExtensionHostConfig,
    ) -> Self {
        Self {
            config,
            settings,
            runner,
            manifests: HashMap::new(),
            unavailable: BTreeMap::new(),
            matcher: SkimMatcherV2::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> &ExtensionHostConfig {
        &self.settings
    }

    /// Discover one extension, replacing any cached manifest.
    pub fn discover(&mut self, alias: &str) -> BeaconResult<&Manifest> {
        let result = self
            .config
            .resolve_origin(alias)
            .and_then(|program| {
                fetch_manifest(
                    self.runner.as_ref(),
                    alias,
                    &program,
                    self.settings.discovery_timeout,
                )
            });
        self.record(alias, result)?;

        self.manifests
            .get(alias)
            .ok_or_else(|| BeaconError::ExtensionNotFound(alias.to_string()))
    }

    /// Discover every configured extension concurrently.
    ///
    /// Returns the failures; they are also kept in [`Self::unavailable`].
    pub fn discover_all(&mut self) -> Vec<(String, BeaconError)> {
        let targets: Vec<(String, BeaconResult<PathBuf>)> = self
            .config
            .extensions
            .keys()
            .map(|alias| (alias.clone(), self.config.resolve_origin(alias)))
            .collect();

        let runner = self.runner.as_ref();
        let timeout = self.settings.discovery_timeout;

        let results: Vec<(String, BeaconResult<Manifest>)> = thread::scope(|scope| {
            let handles: Vec<_> = targets
                .into_iter()
                .map(|(alias, origin)| {
                    let name = alias.clone();
                    let handle = scope.spawn(move || {
                        origin.and_then(|program| fetch_manifest(runner, &alias, &program, timeout))
                    });
                    (name, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(alias, handle)| {
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(BeaconError::Discovery {
                            extension: alias.clone(),
                            message: "discovery thread panicked".to_string(),
                        })
                    });
                    (alias, result)
                })
                .collect()
        });

        let mut failures = Vec::new();
        for (alias, result) in results {
            if let Err(e) = self.record(&alias, result) {
                failures.push((alias, e));
            }
        }

        tracing::info!(
            "Discovered {} extension(s), {} unavailable",
            self.manifests.len(),
            self.unavailable.len()
        );
        failures
    }

    fn record(&mut self, alias: &str, result: BeaconResult<Manifest>) -> BeaconResult<()> {
        match result {
            Ok(manifest) => {
                for req in missing(&manifest.requirements) {
                    tracing::warn!(
                        "Extension '{}' requires '{}' which is not on PATH",
                        alias,
                        req.name
                    );
                }
                self.unavailable.remove(alias);
                self.manifests.insert(alias.to_string(), manifest);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("{}", e);
                self.manifests.remove(alias);
                self.unavailable.insert(alias.to_string(), e.to_string());
                Err(e)
            }
        }
    }

    /// Cached manifest, if discovered.
    pub fn manifest(&self, alias: &str) -> Option<&Manifest> {
        self.manifests.get(alias)
    }

    /// Drop the cached manifest so the next use re-discovers.
    pub fn invalidate(&mut self, alias: &str) {
        self.manifests.remove(alias);
        self.unavailable.remove(alias);
    }

    /// Extensions that failed discovery, with the reason.
    pub fn unavailable(&self) -> &BTreeMap<String, String> {
        &self.unavailable
    }

    /// Requirements of a discovered extension not found on `PATH`.
    pub fn missing_requirements(&self, alias: &str) -> Vec<Requirement> {
        self.manifests
            .get(alias)
            .map(|m| missing(&m.requirements).cloned().collect())
            .unwrap_or_default()
    }

    fn ensure_discovered(&mut self, alias: &str) -> BeaconResult<&Manifest> {
        if self.manifests.contains_key(alias) {
            return self
                .manifests
                .get(alias)
                .ok_or_else(|| BeaconError::ExtensionNotFound(alias.to_string()));
        }
        self.discover(alias)
    }

    /// Look up a command of a discovered extension.
    pub fn command(&self, alias: &str, command: &str) -> BeaconResult<&CommandSpec> {
        let manifest = self
            .manifests
            .get(alias)
            .ok_or_else(|| BeaconError::ExtensionNotFound(alias.to_string()))?;
        manifest
            .command(command)
            .ok_or_else(|| BeaconError::CommandNotFound {
                extension: alias.to_string(),
                command: command.to_string(),
            })
    }

    /// Root entries of one extension: its manifest root, then pinned items.
    ///
    /// A pinned item naming an unknown command or parameter is a
    /// configuration error.
    pub fn root_entries(&self, alias: &str) -> BeaconResult<Vec<RootEntry>> {
        let manifest = self
            .manifests
            .get(alias)
            .ok_or_else(|| BeaconError::ExtensionNotFound(alias.to_string()))?;

        let mut entries = Vec::new();
        for entry in manifest.root_commands() {
            let Some(spec) = manifest.command(&entry.command) else {
                continue;
            };
            entries.push(RootEntry {
                title: entry
                    .title
                    .unwrap_or_else(|| spec.display_title().to_string()),
                subtitle: Some(manifest.title.clone()),
                target: RootTarget::Command {
                    extension: alias.to_string(),
                    command: entry.command,
                    params: entry.params,
                },
            });
        }

        for item in self.config.root_items(alias)? {
            let spec = manifest.command(&item.command).ok_or_else(|| {
                BeaconError::Config(format!(
                    "root item '{}' of extension '{}' references unknown command '{}'",
                    item.title, alias, item.command
                ))
            })?;
            for (name, value) in &item.params {
                match spec.param(name) {
                    Some(param) if param.param_type == value.param_type() => {}
                    Some(param) => {
                        return Err(BeaconError::Config(format!(
                            "root item '{}': parameter '{}' expects a {}",
                            item.title, name, param.param_type
                        )))
                    }
                    None => {
                        return Err(BeaconError::Config(format!(
                            "root item '{}': command '{}' has no parameter '{}'",
                            item.title, item.command, name
                        )))
                    }
                }
            }
            entries.push(RootEntry {
                title: item.title,
                subtitle: Some(manifest.title.clone()),
                target: RootTarget::Command {
                    extension: alias.to_string(),
                    command: item.command,
                    params: item.params,
                },
            });
        }

        Ok(entries)
    }

    /// Combined root menu of every available extension plus oneliners.
    pub fn root_menu(&self) -> Vec<RootEntry> {
        let mut menu = Vec::new();

        for alias in self.config.extensions.keys() {
            if !self.manifests.contains_key(alias) {
                continue;
            }
            match self.root_entries(alias) {
                Ok(entries) => menu.extend(entries),
                Err(e) => tracing::warn!("Skipping root items of '{}': {}", alias, e),
            }
        }

        for (alias, oneliner) in &self.config.oneliners {
            menu.push(RootEntry {
                title: alias.clone(),
                subtitle: Some(oneliner.command.clone()),
                target: RootTarget::Oneliner {
                    alias: alias.clone(),
                },
            });
        }

        menu
    }

    /// Fuzzy-search the root menu.
    pub fn search(&self, query: &str) -> Vec<RootEntry> {
        let menu = self.root_menu();
        if query.trim().is_empty() {
            return menu;
        }

        let mut matches: Vec<(i64, RootEntry)> = menu
            .into_iter()
            .filter_map(|entry| {
                let text = match &entry.subtitle {
                    Some(subtitle) => format!("{} {}", entry.title, subtitle),
                    None => entry.title.clone(),
                };
                self.matcher
                    .fuzzy_match(&text, query)
                    .map(|score| (score, entry))
            })
            .collect();

        // Sort by score descending
        matches.sort_by(|a, b| b.0.cmp(&a.0));
        matches.into_iter().map(|(_, entry)| entry).collect()
    }

    /// Resolve a request into a payload without spawning anything.
    ///
    /// Parameter and configuration errors surface here.
    pub fn prepare(
        &mut self,
        request: &InvocationRequest,
        prompter: &mut dyn Prompter,
    ) -> BeaconResult<PreparedInvocation> {
        let program = self.config.resolve_origin(&request.extension)?;
        self.ensure_discovered(&request.extension)?;

        // A bad preference fails before the user is asked for anything
        let preferences = self.preferences(&request.extension)?;
        let spec = self.command(&request.extension, &request.command)?;
        let params = resolve_params(spec, &request.pinned, &request.state, prompter);
        let payload = Payload::build(spec, params, request.query.clone(), request.cwd.clone())?
            .with_preferences(preferences);

        Ok(PreparedInvocation {
            extension: request.extension.clone(),
            program,
            mode: spec.mode,
            payload,
        })
    }

    /// Resolve configured preferences against the manifest declarations.
    ///
    /// Undeclared configured values are passed through unchanged.
    pub fn preferences(&self, alias: &str) -> BeaconResult<Params> {
        let manifest = self
            .manifests
            .get(alias)
            .ok_or_else(|| BeaconError::ExtensionNotFound(alias.to_string()))?;
        let configured = self.config.resolve_preferences(alias)?;

        let mut resolved = Params::new();
        for decl in &manifest.preferences {
            match configured.get(&decl.name) {
                Some(value) if value.param_type() != decl.param_type => {
                    return Err(BeaconError::PreferenceType {
                        extension: alias.to_string(),
                        preference: decl.name.clone(),
                        expected: decl.param_type,
                        found: value.param_type(),
                    });
                }
                Some(value) => {
                    resolved.insert(decl.name.clone(), value.clone());
                }
                None => {
                    if let Some(default) = &decl.default {
                        resolved.insert(decl.name.clone(), default.clone());
                    } else if decl.required {
                        return Err(BeaconError::MissingPreference {
                            extension: alias.to_string(),
                            preference: decl.name.clone(),
                        });
                    }
                }
            }
        }

        for (name, value) in configured {
            resolved.entry(name).or_insert(value);
        }

        Ok(resolved)
    }

    /// Spawn a prepared invocation and interpret its result.
    pub fn execute(
        &self,
        prepared: &PreparedInvocation,
        cancel: &CancelToken,
    ) -> BeaconResult<Outcome> {
        let extension = prepared.extension.as_str();
        let command = prepared.command();
        let invocation = base_invocation(extension, &prepared.program)
            .arg(prepared.payload.to_arg()?)
            .cwd(prepared.payload.cwd.clone());

        tracing::info!("Invoking {}/{} ({})", extension, command, prepared.mode);

        if prepared.mode == CommandMode::Tty {
            let code = self
                .runner
                .interactive(&invocation)
                .map_err(|e| spawn_error(extension, &prepared.program, &e))?;
            return match code {
                Some(0) => Ok(Outcome::Done),
                code => Err(BeaconError::Invocation {
                    extension: extension.to_string(),
                    command: command.to_string(),
                    code,
                    stderr: String::new(),
                }),
            };
        }

        let invocation = invocation.timeout(self.settings.execution_timeout);
        let output = self
            .runner
            .capture(&invocation, cancel)
            .map_err(|e| spawn_error(extension, &prepared.program, &e))?;

        match output.termination {
            Termination::Cancelled => {
                return Err(BeaconError::Cancelled {
                    extension: extension.to_string(),
                    command: command.to_string(),
                })
            }
            Termination::TimedOut => {
                return Err(BeaconError::Timeout {
                    extension: extension.to_string(),
                    command: command.to_string(),
                    timeout: self.settings.execution_timeout,
                })
            }
            Termination::Exited(code) if code != Some(0) => {
                return Err(BeaconError::Invocation {
                    extension: extension.to_string(),
                    command: command.to_string(),
                    code,
                    stderr: output.stderr.trim_end().to_string(),
                })
            }
            Termination::Exited(_) => {}
        }

        if !output.stderr.trim().is_empty() {
            tracing::debug!("{}/{} stderr: {}", extension, command, output.stderr.trim_end());
        }

        match parse_response(prepared.mode, &output.stdout) {
            Ok(Some(view)) => Ok(Outcome::View(view)),
            Ok(None) => Ok(Outcome::Done),
            Err(e) if e.is_malformed() => Err(BeaconError::MalformedOutput {
                extension: extension.to_string(),
                command: command.to_string(),
                message: e.to_string(),
                stderr: output.stderr.trim_end().to_string(),
            }),
            Err(e) => Err(BeaconError::ProtocolViolation {
                extension: extension.to_string(),
                command: command.to_string(),
                message: e.to_string(),
                stderr: output.stderr.trim_end().to_string(),
            }),
        }
    }

    /// Run a oneliner through `sh -c` with the terminal attached.
    ///
    /// Returns whether the host should exit afterwards.
    pub fn run_oneliner(&self, alias: &str) -> BeaconResult<bool> {
        let oneliner = self.config.oneliner(alias)?;
        let invocation = Invocation::new("sh")
            .arg("-c")
            .arg(oneliner.command.as_str())
            .cwd(oneliner.resolved_dir()?)
            .env(HOST_ENV, "1");

        tracing::info!("Running oneliner '{}': {}", alias, oneliner.command);
        let code = self
            .runner
            .interactive(&invocation)
            .map_err(|e| spawn_error(alias, Path::new("sh"), &e))?;

        if code != Some(0) {
            return Err(BeaconError::Invocation {
                extension: alias.to_string(),
                command: oneliner.command.clone(),
                code,
                stderr: String::new(),
            });
        }
        Ok(oneliner.exit)
    }
}

fn base_invocation(alias: &str, program: &Path) -> Invocation {
    Invocation::new(program)
        .env(HOST_ENV, "1")
        .env(EXTENSION_ENV, alias)
}

fn fetch_manifest(
    runner: &dyn ProcessRunner,
    alias: &str,
    program: &Path,
    timeout: Duration,
) -> BeaconResult<Manifest> {
    let discovery = |message: String| BeaconError::Discovery {
        extension: alias.to_string(),
        message,
    };

    tracing::debug!("Discovering '{}' from {}", alias, program.display());
    let invocation = base_invocation(alias, program).timeout(timeout);
    let output = runner
        .capture(&invocation, &CancelToken::new())
        .map_err(|e| discovery(spawn_message(program, &e)))?;

    match output.termination {
        Termination::Exited(Some(0)) => {}
        Termination::Exited(code) => {
            return Err(discovery(format!(
                "exited with {}: {}",
                exit_label(&code),
                output.stderr.trim_end()
            )))
        }
        Termination::TimedOut => {
            return Err(discovery(format!(
                "no manifest after {}s",
                timeout.as_secs_f32()
            )))
        }
        Termination::Cancelled => return Err(discovery("discovery cancelled".to_string())),
    }

    Manifest::parse(&output.stdout).map_err(|e| discovery(e.to_string()))
}

fn missing(requirements: &[Requirement]) -> impl Iterator<Item = &Requirement> {
    requirements
        .iter()
        .filter(|req| find_in_path(&req.name).is_none())
}

fn spawn_message(program: &Path, err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::PermissionDenied => format!(
            "{} is not executable, try `chmod +x {}`",
            program.display(),
            program.display()
        ),
        io::ErrorKind::NotFound => format!("{} not found", program.display()),
        _ => format!("cannot run {}: {}", program.display(), err),
    }
}

fn spawn_error(alias: &str, program: &Path, err: &io::Error) -> BeaconError {
    BeaconError::Spawn {
        extension: alias.to_string(),
        message: spawn_message(program, err),
    }
}
