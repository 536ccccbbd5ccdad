//! Detail component definitions.
//!
//! Detail displays a markdown body, the result of a detail-mode command.

use serde::{Deserialize, Serialize};

use super::action::Action;

/// Detail component - displays markdown content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Detail {
    /// Optional header title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Markdown content to render
    pub markdown: String,

    /// Actions available for this view
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}
