//! CLI definition for `beacon`.

use std::path::PathBuf;

use beacon_core::extensions::CommandMode;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "Keyboard-driven launcher host for process-boundary extensions", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (default: nearest beacon.toml, then the user config)
    #[arg(long, global = true, env = "BEACON_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the combined root menu
    Menu {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Fuzzy-search the root menu
    Search {
        query: String,

        #[arg(long)]
        json: bool,
    },

    /// List configured extensions and their status
    Extensions,

    /// Print the manifest of an extension
    Manifest { alias: String },

    /// Run an extension command
    Run {
        /// Extension alias from the config
        alias: String,

        /// Command name from the manifest
        command: String,

        /// Parameter value (repeatable)
        #[arg(short, long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,

        /// Query passed to list commands
        #[arg(short, long)]
        query: Option<String>,

        /// Working directory passed to the extension
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// List item whose action to trigger
        #[arg(long, value_name = "N", requires = "action")]
        item: Option<usize>,

        /// Trigger the action with this key or title
        #[arg(long, value_name = "KEY|TITLE")]
        action: Option<String>,
    },

    /// Render a saved list or detail response without running anything
    Read {
        /// Response file (default: stdin)
        file: Option<PathBuf>,

        /// Expected shape (default: detected from the JSON)
        #[arg(long, value_enum)]
        mode: Option<ReadMode>,

        /// Print the parsed view as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a oneliner
    Oneliner { alias: String },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        what: ConfigCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReadMode {
    List,
    Detail,
}

impl From<ReadMode> for CommandMode {
    fn from(mode: ReadMode) -> Self {
        match mode {
            ReadMode::List => CommandMode::List,
            ReadMode::Detail => CommandMode::Detail,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the config file in use
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "beacon", "run", "gists", "view", "-p", "id=abc", "--param", "raw=true", "-q", "rust",
            "--item", "0", "--action", "c",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Run {
                alias,
                command,
                params,
                query,
                item,
                action,
                ..
            }) => {
                assert_eq!(alias, "gists");
                assert_eq!(command, "view");
                assert_eq!(params, vec!["id=abc", "raw=true"]);
                assert_eq!(query.as_deref(), Some("rust"));
                assert_eq!(item, Some(0));
                assert_eq!(action.as_deref(), Some("c"));
            }
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_parse_read() {
        let cli =
            Cli::try_parse_from(["beacon", "read", "page.json", "--mode", "detail", "--json"])
                .unwrap();
        match cli.command {
            Some(Commands::Read { file, mode, json }) => {
                assert_eq!(file, Some(PathBuf::from("page.json")));
                assert_eq!(mode, Some(ReadMode::Detail));
                assert!(json);
            }
            _ => panic!("Expected read command"),
        }

        let cli = Cli::try_parse_from(["beacon", "read"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Read { file: None, mode: None, json: false })
        ));
        assert!(Cli::try_parse_from(["beacon", "read", "--mode", "silent"]).is_err());
    }

    #[test]
    fn test_item_requires_action() {
        assert!(Cli::try_parse_from(["beacon", "run", "a", "b", "--item", "1"]).is_err());
    }
}
