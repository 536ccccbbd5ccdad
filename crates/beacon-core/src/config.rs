//! Host configuration.
//!
//! ```toml
//! [extensions.gists]
//! origin = "~/extensions/gists.sh"
//! preferences = { token = "ghp_..." }
//! items = [{ title = "My Notes", command = "view", params = { id = "abc" } }]
//!
//! [oneliners.htop]
//! command = "htop"
//! exit = true
//! ```
//!
//! The protocol only reads the config through [`Config::resolve_preferences`]
//! and [`Config::root_items`]; it is passed to the host as a value.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BeaconError, BeaconResult};
use crate::extensions::Params;
use crate::process::find_in_path;

/// Environment variable overriding the config location.
pub const CONFIG_ENV: &str = "BEACON_CONFIG";

/// Project-local config file name, searched from the working directory up.
pub const LOCAL_CONFIG_FILE: &str = "beacon.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub extensions: BTreeMap<String, ExtensionConfig>,
    pub oneliners: BTreeMap<String, Oneliner>,

    /// File this config was loaded from.
    #[serde(skip)]
    path: Option<PathBuf>,
}

/// One configured extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionConfig {
    /// Path of the extension program.
    pub origin: String,

    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub preferences: Params,

    /// Commands pinned to the root menu.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<RootItem>,
}

/// A command with fixed params pinned to the root menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootItem {
    pub title: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
}

/// A shell command run directly, outside the extension protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Oneliner {
    pub command: String,

    /// Working directory; `~` and `$VAR` are expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    /// Close the host once the command finishes.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exit: bool,
}

impl Config {
    /// Default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
            })
            .join("beacon")
            .join("config.toml")
    }

    /// Resolve which config file applies.
    ///
    /// `$BEACON_CONFIG` wins, then the nearest `beacon.toml` above the
    /// working directory, then the per-user default.
    pub fn locate() -> PathBuf {
        locate_with(
            std::env::var_os(CONFIG_ENV).map(PathBuf::from),
            std::env::current_dir().ok(),
        )
    }

    /// Load the config from its resolved location.
    pub fn load() -> BeaconResult<Self> {
        Self::load_from(&Self::locate())
    }

    /// Load from `path`, or return defaults if it does not exist.
    pub fn load_from(path: &Path) -> BeaconResult<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self {
                path: Some(path.to_path_buf()),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(path).map_err(|e| {
            BeaconError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml(&content)
            .map_err(|e| BeaconError::Config(format!("{}: {}", path.display(), e)))?;
        config.path = Some(path.to_path_buf());

        tracing::debug!(
            "Loaded {} extension(s) and {} oneliner(s) from {}",
            config.extensions.len(),
            config.oneliners.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn from_toml(content: &str) -> BeaconResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save config back to the file it came from.
    pub fn save(&self) -> BeaconResult<()> {
        let path = self.path.clone().unwrap_or_else(Self::locate);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        tracing::info!("Saved config to {}", path.display());

        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Directory relative origins are resolved against.
    fn base_dir(&self) -> Option<PathBuf> {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok())
    }

    pub fn extension(&self, alias: &str) -> BeaconResult<&ExtensionConfig> {
        self.extensions
            .get(alias)
            .ok_or_else(|| BeaconError::ExtensionNotFound(alias.to_string()))
    }

    pub fn oneliner(&self, alias: &str) -> BeaconResult<&Oneliner> {
        self.oneliners
            .get(alias)
            .ok_or_else(|| BeaconError::Config(format!("unknown oneliner '{}'", alias)))
    }

    /// Locate the program behind an extension alias.
    ///
    /// A bare name without a path separator is also looked up on `PATH`.
    pub fn resolve_origin(&self, alias: &str) -> BeaconResult<PathBuf> {
        let extension = self.extension(alias)?;
        let expanded = expand(&extension.origin)?;

        let mut origin = PathBuf::from(&expanded);
        if origin.is_relative() {
            if let Some(base) = self.base_dir() {
                origin = base.join(origin);
            }
        }
        if origin.exists() {
            return Ok(origin);
        }

        if !expanded.contains(std::path::MAIN_SEPARATOR) {
            if let Some(found) = find_in_path(&expanded) {
                return Ok(found);
            }
        }

        Err(BeaconError::Config(format!(
            "origin of extension '{}' not found: {}",
            alias,
            origin.display()
        )))
    }

    /// Configured preference values for an extension.
    pub fn resolve_preferences(&self, alias: &str) -> BeaconResult<Params> {
        Ok(self.extension(alias)?.preferences.clone())
    }

    /// Root items pinned for an extension, in configured order.
    pub fn root_items(&self, alias: &str) -> BeaconResult<Vec<RootItem>> {
        Ok(self.extension(alias)?.items.clone())
    }
}

impl Oneliner {
    /// Working directory with `~` and variables expanded.
    pub fn resolved_dir(&self) -> BeaconResult<Option<PathBuf>> {
        self.dir
            .as_deref()
            .map(|dir| expand(dir).map(PathBuf::from))
            .transpose()
    }
}

fn expand(raw: &str) -> BeaconResult<String> {
    shellexpand::full(raw)
        .map(|expanded| expanded.into_owned())
        .map_err(|e| BeaconError::Config(format!("cannot expand '{}': {}", raw, e)))
}

fn locate_with(env_path: Option<PathBuf>, cwd: Option<PathBuf>) -> PathBuf {
    if let Some(path) = env_path.filter(|p| !p.as_os_str().is_empty()) {
        return path;
    }

    if let Some(cwd) = cwd {
        if let Some(found) = cwd
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_FILE))
            .find(|candidate| candidate.is_file())
        {
            return found;
        }
    }

    Config::config_path()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use crate::extensions::ParamValue;

    const SAMPLE: &str = r#"
[extensions.gists]
origin = "gists.sh"
preferences = { token = "secret", limit = 5 }
items = [
    { title = "My Notes", command = "view", params = { id = "abc" } },
    { title = "Search", command = "manage" },
]

[extensions.tldr]
origin = "/usr/local/bin/tldr-ext"

[oneliners.htop]
command = "htop"
exit = true

[oneliners.logs]
command = "tail -f app.log"
dir = "~/work"
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.extensions.len(), 2);
        assert_eq!(config.oneliners.len(), 2);
        assert!(config.oneliners["htop"].exit);
        assert!(!config.oneliners["logs"].exit);
    }

    #[test]
    fn test_resolve_preferences() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let prefs = config.resolve_preferences("gists").unwrap();
        assert_eq!(prefs.get("token"), Some(&ParamValue::from("secret")));
        assert_eq!(prefs.get("limit"), Some(&ParamValue::from(5i64)));
        assert!(config.resolve_preferences("tldr").unwrap().is_empty());
    }

    #[test]
    fn test_root_items_keep_order() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let items = config.root_items("gists").unwrap();
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["My Notes", "Search"]);
        assert_eq!(items[0].params.get("id"), Some(&ParamValue::from("abc")));
    }

    #[test]
    fn test_unknown_alias_is_configuration_error() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let err = config.resolve_preferences("nope").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Configuration);
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let err = Config::from_toml("[extensions.x]\norigin = 1").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Configuration);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let config = Config::load_from(&path).unwrap();
        assert!(config.extensions.is_empty());
        assert_eq!(config.path(), Some(path.as_path()));
    }

    #[test]
    fn test_relative_origin_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("gists.sh"), "#!/bin/sh\n").unwrap();
        let path = dir.path().join("beacon.toml");
        fs::write(&path, SAMPLE).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(
            config.resolve_origin("gists").unwrap(),
            dir.path().join("gists.sh")
        );
    }

    #[test]
    fn test_missing_origin_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.toml");
        fs::write(&path, "[extensions.ghost]\norigin = \"./ghost.sh\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        let err = config.resolve_origin("ghost").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Configuration);
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::load_from(&path).unwrap();
        config.oneliners.insert(
            "top".to_string(),
            Oneliner {
                command: "top".to_string(),
                dir: None,
                exit: true,
            },
        );
        config.save().unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_locate_prefers_env_then_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(LOCAL_CONFIG_FILE), "").unwrap();

        let explicit = PathBuf::from("/etc/beacon.toml");
        assert_eq!(
            locate_with(Some(explicit.clone()), Some(nested.clone())),
            explicit
        );
        assert_eq!(
            locate_with(None, Some(nested)),
            dir.path().join(LOCAL_CONFIG_FILE)
        );
    }

    #[test]
    fn test_oneliner_dir_is_expanded() {
        let oneliner = Oneliner {
            command: "ls".to_string(),
            dir: Some("$HOME/work".to_string()),
            exit: false,
        };
        let dir = oneliner.resolved_dir().unwrap().unwrap();
        assert!(!dir.to_string_lossy().contains('$'));
    }
}
