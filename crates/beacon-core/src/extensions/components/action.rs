//! Action definitions.
//!
//! Actions are the effects a user can trigger from a list item or a detail
//! view. The kind is a closed set, so every dispatch site is exhaustive.

use serde::{Deserialize, Serialize};

use crate::extensions::manifest::Params;

/// A single action that can be triggered by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Menu label
    pub title: String,

    /// Single-key accelerator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Close the host UI after the effect
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exit: bool,

    #[serde(flatten)]
    pub kind: ActionKind,
}

impl Action {
    /// Whether this action re-invokes the command that rendered it.
    pub fn reloads(&self) -> bool {
        match &self.kind {
            ActionKind::Run { reload, .. } => *reload,
            ActionKind::Reload => true,
            ActionKind::Open { .. } | ActionKind::Copy { .. } => false,
        }
    }
}

/// What an action does, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionKind {
    /// Open a URL or path with the platform's default handler.
    Open {
        #[serde(alias = "target")]
        url: String,
    },

    /// Place text on the clipboard.
    Copy { text: String },

    /// Invoke a command, by default in the same extension.
    Run {
        command: String,

        #[serde(default, skip_serializing_if = "Params::is_empty")]
        params: Params,

        /// Alias of another configured extension.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extension: Option<String>,

        /// Refresh the originating view once the command completes.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        reload: bool,
    },

    /// Re-invoke the current command in place.
    Reload,
}
