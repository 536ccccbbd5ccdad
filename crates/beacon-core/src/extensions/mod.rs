//! Extension protocol for beacon.
//!
//! Extensions are standalone programs. Spawned without arguments they
//! print a manifest; spawned with a single JSON payload argument they run
//! one command and print its result.
//!
//! # Architecture
//!
//! ```text
//! ExtensionHost
//! ├── config: Config (alias -> origin, preferences, pinned items)
//! ├── manifests: HashMap<alias, Manifest>
//! ├── unavailable: BTreeMap<alias, reason>
//! └── runner: Arc<dyn ProcessRunner>
//! ```
//!
//! Manifests are discovered on demand (or all at once for the root menu)
//! and cached until invalidated. Every command run is a fresh process.

pub mod components;
mod host;
mod manifest;
mod payload;

pub use components::{Action, ActionKind, Detail, List, ListItem, View};
pub use host::{
    ExtensionHost, ExtensionHostConfig, InvocationRequest, Outcome, PreparedInvocation,
    RootEntry, RootTarget, EXTENSION_ENV, HOST_ENV,
};
pub use manifest::{
    CommandMode, CommandParam, CommandRef, CommandSpec, Manifest, ManifestError, ParamType,
    ParamValue, Params, Requirement,
};
pub use payload::{resolve_params, NoPrompt, Payload, Prompter};
