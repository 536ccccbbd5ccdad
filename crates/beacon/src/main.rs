mod cli;
mod logging;
mod prompt;
mod render;

use std::io::{IsTerminal, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use beacon_core::extensions::{
    ExtensionHost, InvocationRequest, NoPrompt, ParamValue, Params, Prompter,
};
use beacon_core::{CommandRunner, Config, Session, Transition};
use beacon_platform::SystemEffects;
use clap::Parser;
use console::style;

use cli::{Cli, Commands, ConfigCommands};
use prompt::TermPrompter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(Config::locate);
    let config = Config::load_from(&config_path)?;

    match cli.command.unwrap_or(Commands::Menu { json: false }) {
        Commands::Menu { json } => {
            let mut session = session(config);
            let menu = session.open_root();
            report_unavailable(session.host());
            render::print_menu(&menu, json)
        }
        Commands::Search { query, json } => {
            let mut host = host(config);
            host.discover_all();
            render::print_menu(&host.search(&query), json)
        }
        Commands::Extensions => list_extensions(host(config)),
        Commands::Manifest { alias } => {
            let mut host = host(config);
            let manifest = host.discover(&alias)?;
            println!("{}", serde_json::to_string_pretty(manifest)?);
            Ok(())
        }
        Commands::Run {
            alias,
            command,
            params,
            query,
            cwd,
            json,
            item,
            action,
        } => {
            let cwd = match cwd {
                Some(cwd) => Some(cwd),
                None => std::env::current_dir().ok(),
            };
            let mut session = session(config).with_cwd(cwd);
            let params = parse_params(session.host_mut(), &alias, &command, &params)?;
            let request = InvocationRequest::new(alias, command)
                .with_params(params)
                .with_query(query);
            run(&mut session, request, item, action.as_deref(), json)
        }
        Commands::Read { file, mode, json } => {
            let raw = read_input(file.as_deref())?;
            let view = render::parse_page(&raw, mode.map(Into::into))?;
            render::print_view(&view, json)
        }
        Commands::Oneliner { alias } => {
            host(config).run_oneliner(&alias)?;
            Ok(())
        }
        Commands::Config { what } => match what {
            ConfigCommands::Path => {
                let status = if config_path.exists() { "" } else { " (not created yet)" };
                println!("{}{}", config_path.display(), status);
                Ok(())
            }
        },
    }
}

fn read_input(file: Option<&Path>) -> Result<Vec<u8>> {
    match file {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))
        }
        None => {
            let mut raw = Vec::new();
            std::io::stdin()
                .read_to_end(&mut raw)
                .context("cannot read stdin")?;
            Ok(raw)
        }
    }
}

fn host(config: Config) -> ExtensionHost {
    ExtensionHost::new(config, Arc::new(CommandRunner::new()))
}

fn session(config: Config) -> Session {
    Session::new(host(config), Box::new(SystemEffects::current()))
}

fn prompter() -> Box<dyn Prompter> {
    if std::io::stdin().is_terminal() {
        Box::new(TermPrompter::new())
    } else {
        Box::new(NoPrompt)
    }
}

fn run(
    session: &mut Session,
    request: InvocationRequest,
    item: Option<usize>,
    action: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut prompter = prompter();

    let transition = session.run(request, prompter.as_mut())?;
    show(session, transition, json)?;

    let Some(needle) = action else {
        return Ok(());
    };
    let index = session
        .find_action(item, needle)
        .ok_or_else(|| anyhow!("no action matching '{}'", needle))?;
    let transition = session.trigger(item, index, prompter.as_mut())?;
    show(session, transition, json)
}

fn show(session: &Session, transition: Transition, json: bool) -> Result<()> {
    match transition {
        Transition::Rendered | Transition::Refreshed => match session.current_view() {
            Some(view) => render::print_view(view, json),
            None => Ok(()),
        },
        Transition::Completed
        | Transition::Unchanged
        | Transition::Dismissed
        | Transition::Exit => Ok(()),
    }
}

/// Turn `name=value` flags into typed values using the command's schema.
///
/// Names the command does not declare are kept as strings so the payload
/// check reports them.
fn parse_params(
    host: &mut ExtensionHost,
    alias: &str,
    command: &str,
    raw: &[String],
) -> Result<Params> {
    if raw.is_empty() {
        return Ok(Params::new());
    }

    host.discover(alias)?;
    let spec = host.command(alias, command)?;

    let mut params = Params::new();
    for pair in raw {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("expected NAME=VALUE, got '{}'", pair);
        };
        let value = match spec.param(name) {
            Some(param) => ParamValue::coerce(value, param.param_type).with_context(|| {
                format!("parameter '{}' expects a {}", name, param.param_type)
            })?,
            None => ParamValue::from(value),
        };
        params.insert(name.to_string(), value);
    }
    Ok(params)
}

fn list_extensions(mut host: ExtensionHost) -> Result<()> {
    host.discover_all();
    let aliases: Vec<String> = host.config().extensions.keys().cloned().collect();
    if aliases.is_empty() {
        println!("{}", style("No extensions configured").dim());
        return Ok(());
    }

    for alias in aliases {
        match host.manifest(&alias) {
            Some(manifest) => {
                println!(
                    "{} {}  {}  {}",
                    style("✓").green(),
                    style(&alias).bold(),
                    manifest.title,
                    style(format!("{} command(s)", manifest.commands.len())).dim()
                );
                for req in host.missing_requirements(&alias) {
                    let link = req.link.map(|l| format!(" ({})", l)).unwrap_or_default();
                    println!("    {} requires {}{}", style("!").yellow(), req.name, link);
                }
            }
            None => {
                let reason = host
                    .unavailable()
                    .get(&alias)
                    .cloned()
                    .unwrap_or_default();
                println!(
                    "{} {}  {}",
                    style("✗").red(),
                    style(&alias).bold(),
                    style(reason).dim()
                );
            }
        }
    }
    Ok(())
}

fn report_unavailable(host: &ExtensionHost) {
    for (alias, reason) in host.unavailable() {
        eprintln!("{} {}: {}", style("warning").yellow(), alias, reason);
    }
}
