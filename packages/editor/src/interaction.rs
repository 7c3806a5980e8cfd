//! # Interaction Router
//!
//! Maps pointer events on the rendered chapter to editor actions.
//!
//! - Left click on a reference opens the reference panel for that entity
//! - Right click with a non-empty selection opens the "create association"
//!   menu for the selected text
//!
//! Everything else passes through to the host editing surface.

use serde::{Deserialize, Serialize};
use storyloom_model::{ChapterTree, InlineNode, KeyId};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

/// Inline child under the pointer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePath {
    pub key_id: KeyId,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub button: PointerButton,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub target: Option<NodePath>,
    /// Current text selection, if the host has one
    #[serde(default)]
    pub selection: Option<String>,
}

/// Payload surfaced to the host: `{id?, text?, x, y}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum EditorAction {
    OpenReference(InteractionEvent),
    OpenContextMenu(InteractionEvent),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InteractionRouter;

impl InteractionRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, tree: &ChapterTree, event: &PointerEvent) -> Option<EditorAction> {
        let reference = event.target.as_ref().and_then(|target| {
            match tree.get(&target.key_id)?.children.get(target.index)? {
                InlineNode::Reference(reference) => Some(reference),
                InlineNode::Text(_) => None,
            }
        });

        let action = match event.button {
            PointerButton::Left => reference.map(|reference| {
                EditorAction::OpenReference(InteractionEvent {
                    id: Some(reference.entity_id.clone()),
                    text: Some(reference.text.clone()),
                    x: event.x,
                    y: event.y,
                })
            }),
            PointerButton::Right => event
                .selection
                .as_deref()
                .map(str::trim)
                .filter(|selection| !selection.is_empty())
                .map(|selection| {
                    EditorAction::OpenContextMenu(InteractionEvent {
                        id: reference.map(|r| r.entity_id.clone()),
                        text: Some(selection.to_string()),
                        x: event.x,
                        y: event.y,
                    })
                }),
            PointerButton::Middle => None,
        };

        trace!(button = ?event.button, routed = action.is_some(), "Pointer event");
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyloom_model::{ChapterRef, EntityType, ParagraphNode, ReferenceNode, TextNode};

    fn tree() -> ChapterTree {
        ChapterTree::new(ChapterRef::new("s", "c")).with_paragraphs(vec![ParagraphNode::new("p1")
            .with_children(vec![
                ReferenceNode {
                    text: "Aria".to_string(),
                    entity_id: "7".to_string(),
                    description: "Heroine".to_string(),
                    entity_type: EntityType::Character,
                    portrait: None,
                    class_modifier: None,
                }
                .into(),
                TextNode::new(" waved").into(),
            ])])
    }

    fn event(button: PointerButton, index: Option<usize>, selection: Option<&str>) -> PointerEvent {
        PointerEvent {
            button,
            x: 10.0,
            y: 20.0,
            target: index.map(|index| NodePath {
                key_id: KeyId::from("p1"),
                index,
            }),
            selection: selection.map(str::to_string),
        }
    }

    #[test]
    fn test_left_click_on_reference_opens_panel() {
        let action = InteractionRouter::new().route(&tree(), &event(PointerButton::Left, Some(0), None));

        assert_eq!(
            action,
            Some(EditorAction::OpenReference(InteractionEvent {
                id: Some("7".to_string()),
                text: Some("Aria".to_string()),
                x: 10.0,
                y: 20.0,
            }))
        );
    }

    #[test]
    fn test_left_click_on_text_passes_through() {
        let router = InteractionRouter::new();
        assert_eq!(router.route(&tree(), &event(PointerButton::Left, Some(1), None)), None);
        assert_eq!(router.route(&tree(), &event(PointerButton::Left, Some(9), None)), None);
    }

    #[test]
    fn test_right_click_with_selection_opens_menu() {
        let action = InteractionRouter::new()
            .route(&tree(), &event(PointerButton::Right, Some(1), Some(" waved ")));

        let Some(EditorAction::OpenContextMenu(payload)) = action else {
            panic!("expected context menu, got {:?}", action);
        };
        assert_eq!(payload.text.as_deref(), Some("waved"));
        assert_eq!(payload.id, None);
    }

    #[test]
    fn test_right_click_without_selection_passes_through() {
        let router = InteractionRouter::new();
        assert_eq!(router.route(&tree(), &event(PointerButton::Right, None, None)), None);
        assert_eq!(router.route(&tree(), &event(PointerButton::Right, None, Some("  "))), None);
    }

    #[test]
    fn test_action_json_shape() {
        let action = EditorAction::OpenContextMenu(InteractionEvent {
            id: None,
            text: Some("Bram".to_string()),
            x: 1.0,
            y: 2.0,
        });
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            serde_json::json!({ "action": "openContextMenu", "text": "Bram", "x": 1.0, "y": 2.0 })
        );
    }
}
