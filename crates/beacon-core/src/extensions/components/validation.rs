//! Response validation.
//!
//! Serde enforces the wire shape; these checks cover the constraints a
//! derive cannot express, such as non-empty titles.

use thiserror::Error;

use crate::extensions::manifest::CommandMode;

use super::action::{Action, ActionKind};
use super::detail::Detail;
use super::list::{List, ListItem};
use super::View;

/// Error type for response parsing and validation failures.
#[derive(Debug, Error)]
pub enum ComponentError {
    /// Output was expected but stdout is not JSON
    #[error("output is not valid JSON: {0}")]
    Malformed(String),

    /// A required field is missing
    #[error("missing required field '{field}' in {component}")]
    MissingRequired { component: String, field: String },

    /// A field has an invalid value
    #[error("invalid value for '{field}' in {component}: {reason}")]
    InvalidValue {
        component: String,
        field: String,
        reason: String,
    },

    /// The JSON does not have the shape of any response
    #[error("invalid response structure: {0}")]
    InvalidStructure(String),

    /// The response shape disagrees with the declared mode
    #[error("{expected} command returned a {found}")]
    ModeMismatch {
        expected: CommandMode,
        found: CommandMode,
    },

    /// A command without structured output printed something
    #[error("{0} command must not print to stdout")]
    UnexpectedOutput(CommandMode),
}

impl ComponentError {
    /// Whether stdout could not be read as JSON at all.
    ///
    /// Everything else is a well-formed response of the wrong shape.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ComponentError::Malformed(_))
    }
}

/// Trait for validating components.
pub trait Validate {
    /// Validate this component and return an error if invalid.
    fn validate(&self) -> Result<(), ComponentError>;
}

impl Validate for View {
    fn validate(&self) -> Result<(), ComponentError> {
        match self {
            View::List(list) => list.validate(),
            View::Detail(detail) => detail.validate(),
        }
    }
}

impl Validate for List {
    fn validate(&self) -> Result<(), ComponentError> {
        for item in &self.items {
            item.validate()?;
        }
        Ok(())
    }
}

impl Validate for ListItem {
    fn validate(&self) -> Result<(), ComponentError> {
        if self.title.trim().is_empty() {
            return Err(ComponentError::MissingRequired {
                component: "ListItem".to_string(),
                field: "title".to_string(),
            });
        }
        for action in &self.actions {
            action.validate()?;
        }
        Ok(())
    }
}

impl Validate for Detail {
    fn validate(&self) -> Result<(), ComponentError> {
        // An empty markdown body is a valid (blank) detail view
        for action in &self.actions {
            action.validate()?;
        }
        Ok(())
    }
}

impl Validate for Action {
    fn validate(&self) -> Result<(), ComponentError> {
        if self.title.trim().is_empty() {
            return Err(ComponentError::MissingRequired {
                component: "Action".to_string(),
                field: "title".to_string(),
            });
        }
        if let ActionKind::Run { command, .. } = &self.kind {
            if command.is_empty() {
                return Err(ComponentError::MissingRequired {
                    component: format!("Action '{}'", self.title),
                    field: "command".to_string(),
                });
            }
        }
        Ok(())
    }
}
