//! Terminal rendering of menus and views.

use anyhow::{anyhow, Result};
use beacon_core::extensions::components::{parse_response, ComponentError};
use beacon_core::extensions::{Action, ActionKind, CommandMode, Detail, List, RootEntry, View};
use console::style;

pub fn print_menu(entries: &[RootEntry], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}", style("No extensions or oneliners configured").dim());
        return Ok(());
    }

    for (idx, entry) in entries.iter().enumerate() {
        match &entry.subtitle {
            Some(subtitle) => println!(
                "{:>3}  {}  {}",
                idx,
                style(&entry.title).bold(),
                style(subtitle).dim()
            ),
            None => println!("{:>3}  {}", idx, style(&entry.title).bold()),
        }
    }
    Ok(())
}

/// Parse a saved command response.
///
/// Without a mode the shape is taken from the JSON itself.
pub fn parse_page(raw: &[u8], mode: Option<CommandMode>) -> Result<View> {
    let parsed = match mode {
        Some(mode) => parse_response(mode, raw),
        None => match parse_response(CommandMode::List, raw) {
            Err(ComponentError::ModeMismatch { found, .. }) => parse_response(found, raw),
            other => other,
        },
    };
    parsed?.ok_or_else(|| anyhow!("response has no view"))
}

pub fn print_view(view: &View, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    match view {
        View::List(list) => print_list(list),
        View::Detail(detail) => print_detail(detail),
    }
    Ok(())
}

fn print_list(list: &List) {
    if let Some(title) = &list.title {
        println!("{}", style(title).bold().underlined());
    }

    if list.items.is_empty() {
        let text = list.empty_text().unwrap_or("No items");
        println!("{}", style(text).dim());
        return;
    }

    for (idx, item) in list.items.iter().enumerate() {
        let mut line = format!("{:>3}  {}", idx, style(&item.title).bold());
        if let Some(subtitle) = &item.subtitle {
            line.push_str(&format!("  {}", style(subtitle).dim()));
        }
        if !item.accessories.is_empty() {
            line.push_str(&format!("  {}", style(item.accessories.join(" · ")).cyan()));
        }
        println!("{}", line);
        print_actions(&item.actions, 5);
    }
}

fn print_detail(detail: &Detail) {
    if let Some(title) = &detail.title {
        println!("{}\n", style(title).bold().underlined());
    }
    println!("{}", detail.markdown.trim_end());
    if !detail.actions.is_empty() {
        println!();
        print_actions(&detail.actions, 0);
    }
}

fn print_actions(actions: &[Action], indent: usize) {
    for action in actions {
        let key = action.key.as_deref().unwrap_or(" ");
        println!(
            "{:indent$}{} {}  {}",
            "",
            style(format!("[{}]", key)).yellow(),
            action.title,
            style(describe(&action.kind)).dim(),
            indent = indent
        );
    }
}

fn describe(kind: &ActionKind) -> String {
    match kind {
        ActionKind::Open { url } => format!("open {}", url),
        ActionKind::Copy { .. } => "copy".to_string(),
        ActionKind::Run {
            command,
            extension,
            reload,
            ..
        } => {
            let target = match extension {
                Some(extension) => format!("{}/{}", extension, command),
                None => command.clone(),
            };
            if *reload {
                format!("run {} and reload", target)
            } else {
                format!("run {}", target)
            }
        }
        ActionKind::Reload => "reload".to_string(),
    }
}
