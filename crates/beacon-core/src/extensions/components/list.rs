//! List component definitions.
//!
//! List is the result of a list-mode command: an ordered sequence of items.
//! The host never re-sorts items; order is exactly what the extension
//! printed.

use serde::{Deserialize, Serialize};

use super::action::Action;

/// List component - displays an ordered list of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct List {
    /// Optional header title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Items, in display order
    #[serde(default)]
    pub items: Vec<ListItem>,

    /// Text shown when there are no items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_text: Option<String>,
}

impl List {
    /// Empty-state text, only when there is nothing else to show.
    pub fn empty_text(&self) -> Option<&str> {
        if self.items.is_empty() {
            self.empty_text.as_deref()
        } else {
            None
        }
    }
}

/// A single item in a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ListItem {
    /// Primary text (required)
    pub title: String,

    /// Secondary text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,

    /// Short strings displayed on the right
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessories: Vec<String>,

    /// Actions available for this item
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_item_deserialize() {
        let json = r#"{
            "title": "my-repo",
            "subtitle": "A cool project",
            "accessories": ["Public", "2h ago"],
            "actions": [{"type": "copy", "title": "Copy Name", "text": "my-repo"}]
        }"#;

        let item: ListItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.title, "my-repo");
        assert_eq!(item.subtitle.as_deref(), Some("A cool project"));
        assert_eq!(item.accessories, vec!["Public", "2h ago"]);
        assert_eq!(item.actions.len(), 1);
    }

    #[test]
    fn test_empty_text_only_when_empty() {
        let list: List = serde_json::from_str(r#"{"emptyText": "Enter a search query"}"#).unwrap();
        assert_eq!(list.empty_text(), Some("Enter a search query"));

        let list: List = serde_json::from_str(
            r#"{"emptyText": "Enter a search query", "items": [{"title": "X"}]}"#,
        )
        .unwrap();
        assert_eq!(list.empty_text(), None);
    }

    #[test]
    fn test_item_order_preserved() {
        let list: List = serde_json::from_str(
            r#"{"items": [{"title": "zeta"}, {"title": "alpha"}, {"title": "mu"}]}"#,
        )
        .unwrap();
        let titles: Vec<_> = list.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["zeta", "alpha", "mu"]);
    }

    #[test]
    fn test_list_serialize_uses_camel_case() {
        let list = List {
            empty_text: Some("Nothing here".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&list).unwrap();
        assert!(json.contains("\"emptyText\""));
    }
}
