//! Result shapes an extension can print.
//!
//! # Component Types
//!
//! - **List** - ordered items, each with its own actions
//! - **Detail** - markdown body with actions
//!
//! Silent commands print nothing and tty commands own the terminal, so
//! neither has a component. [`parse_response`] is the only way process
//! output enters the host: it checks the shape against the declared mode,
//! validates it, and normalizes accelerator keys.

mod action;
mod detail;
mod list;
mod validation;

pub use action::{Action, ActionKind};
pub use detail::Detail;
pub use list::{List, ListItem};
pub use validation::{ComponentError, Validate};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extensions::manifest::CommandMode;

/// A rendered result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum View {
    List(List),
    Detail(Detail),
}

impl View {
    pub fn title(&self) -> Option<&str> {
        match self {
            View::List(list) => list.title.as_deref(),
            View::Detail(detail) => detail.title.as_deref(),
        }
    }

    /// Actions of a list item, or of the detail body when `item` is `None`.
    pub fn actions(&self, item: Option<usize>) -> Option<&[Action]> {
        match (self, item) {
            (View::List(list), Some(idx)) => list.items.get(idx).map(|i| i.actions.as_slice()),
            (View::Detail(detail), None) => Some(detail.actions.as_slice()),
            _ => None,
        }
    }

    fn actions_mut(&mut self) -> Vec<&mut Vec<Action>> {
        match self {
            View::List(list) => list.items.iter_mut().map(|i| &mut i.actions).collect(),
            View::Detail(detail) => vec![&mut detail.actions],
        }
    }
}

/// Interpret the stdout of a command run in `mode`.
///
/// Returns `None` for modes without structured output.
pub fn parse_response(mode: CommandMode, stdout: &[u8]) -> Result<Option<View>, ComponentError> {
    match mode {
        CommandMode::Tty => return Ok(None),
        CommandMode::Silent => {
            if String::from_utf8_lossy(stdout).trim().is_empty() {
                return Ok(None);
            }
            return Err(ComponentError::UnexpectedOutput(mode));
        }
        CommandMode::List | CommandMode::Detail => {}
    }

    let value: Value =
        serde_json::from_slice(stdout).map_err(|e| ComponentError::Malformed(e.to_string()))?;

    let shape = response_shape(&value)?;
    if shape != mode {
        return Err(ComponentError::ModeMismatch {
            expected: mode,
            found: shape,
        });
    }

    let mut view = match shape {
        CommandMode::Detail => View::Detail(
            serde_json::from_value(value)
                .map_err(|e| ComponentError::InvalidStructure(e.to_string()))?,
        ),
        _ => View::List(
            serde_json::from_value(value)
                .map_err(|e| ComponentError::InvalidStructure(e.to_string()))?,
        ),
    };

    view.validate()?;
    for actions in view.actions_mut() {
        normalize_keys(actions);
    }

    Ok(Some(view))
}

/// Detect which component a JSON value describes.
///
/// An explicit `type` wins; otherwise a `markdown` body marks a detail.
fn response_shape(value: &Value) -> Result<CommandMode, ComponentError> {
    let Some(obj) = value.as_object() else {
        return Err(ComponentError::InvalidStructure(
            "expected a JSON object".to_string(),
        ));
    };

    match obj.get("type") {
        Some(Value::String(kind)) => match kind.as_str() {
            "list" => Ok(CommandMode::List),
            "detail" => Ok(CommandMode::Detail),
            other => Err(ComponentError::InvalidValue {
                component: "response".to_string(),
                field: "type".to_string(),
                reason: format!("unknown type '{}'", other),
            }),
        },
        Some(_) => Err(ComponentError::InvalidValue {
            component: "response".to_string(),
            field: "type".to_string(),
            reason: "expected a string".to_string(),
        }),
        None if obj.contains_key("markdown") => Ok(CommandMode::Detail),
        None => Ok(CommandMode::List),
    }
}

/// Disable accelerators that collide or are not a single character.
fn normalize_keys(actions: &mut [Action]) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for key in actions.iter().filter_map(|a| a.key.as_ref()) {
        *counts.entry(key.clone()).or_default() += 1;
    }

    for action in actions.iter_mut() {
        let Some(key) = action.key.as_deref() else {
            continue;
        };
        if key.chars().count() != 1 {
            tracing::warn!("Disabling key '{}' on '{}': not a single character", key, action.title);
            action.key = None;
        } else if counts.get(key).copied().unwrap_or(0) > 1 {
            tracing::warn!("Disabling key '{}' on '{}': used by another action", key, action.title);
            action.key = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_item_list() {
        let view = parse_response(CommandMode::List, br#"{"items":[{"title":"X"}]}"#)
            .unwrap()
            .unwrap();
        match view {
            View::List(list) => {
                assert_eq!(list.items.len(), 1);
                assert_eq!(list.items[0].title, "X");
            }
            other => panic!("Expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_object_is_empty_list() {
        let view = parse_response(CommandMode::List, b"{}").unwrap().unwrap();
        assert_eq!(view, View::List(List::default()));
    }

    #[test]
    fn test_parse_detail() {
        let view = parse_response(CommandMode::Detail, br#"{"markdown": "hi", "title": "T"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(view.title(), Some("T"));
        assert_eq!(view.actions(None).map(|a| a.len()), Some(0));
    }

    #[test]
    fn test_silent_accepts_whitespace_only() {
        assert_eq!(parse_response(CommandMode::Silent, b"  \n").unwrap(), None);
    }

    #[test]
    fn test_silent_with_output_is_violation() {
        let err = parse_response(CommandMode::Silent, b"hello").unwrap_err();
        assert!(matches!(err, ComponentError::UnexpectedOutput(CommandMode::Silent)));
        assert!(!err.is_malformed());
    }

    #[test]
    fn test_tty_output_is_not_parsed() {
        assert_eq!(parse_response(CommandMode::Tty, b"not json").unwrap(), None);
    }

    #[test]
    fn test_non_json_is_malformed() {
        let err =
            parse_response(CommandMode::List, b"Traceback (most recent call last)").unwrap_err();
        assert!(err.is_malformed());

        let err = parse_response(CommandMode::Detail, b"").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_detail_for_list_command_is_mismatch() {
        let err = parse_response(CommandMode::List, br##"{"markdown": "# Hi"}"##).unwrap_err();
        assert!(matches!(
            err,
            ComponentError::ModeMismatch {
                expected: CommandMode::List,
                found: CommandMode::Detail
            }
        ));
    }

    #[test]
    fn test_explicit_type_wins() {
        let err = parse_response(CommandMode::Detail, br#"{"type": "list", "markdown": "x"}"#)
            .unwrap_err();
        assert!(matches!(err, ComponentError::ModeMismatch { .. }));

        let view = parse_response(CommandMode::List, br#"{"type": "list", "items": []}"#).unwrap();
        assert!(matches!(view, Some(View::List(_))));
    }

    #[test]
    fn test_wrong_field_types_are_structure_errors() {
        let err = parse_response(CommandMode::List, br#"{"items": "nope"}"#).unwrap_err();
        assert!(matches!(err, ComponentError::InvalidStructure(_)));

        let err = parse_response(CommandMode::List, b"[1, 2]").unwrap_err();
        assert!(matches!(err, ComponentError::InvalidStructure(_)));
    }

    #[test]
    fn test_colliding_keys_are_disabled_but_kept() {
        let json = br#"{"items": [{
            "title": "X",
            "actions": [
                {"type": "copy", "title": "Copy A", "text": "a", "key": "c"},
                {"type": "copy", "title": "Copy B", "text": "b", "key": "c"},
                {"type": "open", "title": "Open", "url": "https://x", "key": "o"},
                {"type": "reload", "title": "Refresh", "key": "ctrl+r"}
            ]
        }]}"#;

        let view = parse_response(CommandMode::List, json).unwrap().unwrap();
        let actions = view.actions(Some(0)).unwrap();
        assert_eq!(actions.len(), 4);
        assert_eq!(actions[0].key, None);
        assert_eq!(actions[1].key, None);
        assert_eq!(actions[2].key.as_deref(), Some("o"));
        assert_eq!(actions[3].key, None);
    }

    #[test]
    fn test_keys_are_scoped_per_item() {
        let json = br#"{"items": [
            {"title": "A", "actions": [{"type": "copy", "title": "Copy", "text": "a", "key": "c"}]},
            {"title": "B", "actions": [{"type": "copy", "title": "Copy", "text": "b", "key": "c"}]}
        ]}"#;

        let view = parse_response(CommandMode::List, json).unwrap().unwrap();
        assert_eq!(view.actions(Some(0)).unwrap()[0].key.as_deref(), Some("c"));
        assert_eq!(view.actions(Some(1)).unwrap()[0].key.as_deref(), Some("c"));
    }

    #[test]
    fn test_view_serializes_with_type_tag() {
        let view = View::Detail(Detail {
            markdown: "x".to_string(),
            ..Default::default()
        });
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "detail");
    }
}
