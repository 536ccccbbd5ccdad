//! Interactive parameter prompts.

use beacon_core::extensions::{CommandParam, CommandSpec, ParamType, ParamValue, Prompter};
use dialoguer::{theme::ColorfulTheme, Confirm, Input};

/// Asks for missing parameters on the terminal.
pub struct TermPrompter {
    theme: ColorfulTheme,
}

impl TermPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Prompter for TermPrompter {
    fn prompt(&mut self, command: &CommandSpec, param: &CommandParam) -> Option<ParamValue> {
        let label = match &param.description {
            Some(description) => format!("{} ({})", param.name, description),
            None => param.name.clone(),
        };
        tracing::debug!("Prompting for '{}' of '{}'", param.name, command.name);

        match param.param_type {
            ParamType::Boolean => Confirm::with_theme(&self.theme)
                .with_prompt(label)
                .interact()
                .ok()
                .map(ParamValue::Boolean),
            ParamType::String => Input::<String>::with_theme(&self.theme)
                .with_prompt(label)
                .interact_text()
                .ok()
                .map(ParamValue::String),
            ParamType::Number => Input::<String>::with_theme(&self.theme)
                .with_prompt(label)
                .validate_with(|raw: &String| -> Result<(), &str> {
                    ParamValue::coerce(raw, ParamType::Number)
                        .map(|_| ())
                        .ok_or("expected a number")
                })
                .interact_text()
                .ok()
                .and_then(|raw| ParamValue::coerce(&raw, ParamType::Number)),
        }
    }
}
