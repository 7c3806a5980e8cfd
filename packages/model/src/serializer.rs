//! Persisted block format.
//!
//! A paragraph is stored as a [`Block`] whose `chunk` is the JSON node tree
//! produced by [`serialize`]. Serialization is a pure function of the
//! paragraph's current content: the same paragraph always yields the same
//! chunk.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::error::{ModelError, ModelResult};
use crate::nodes::{
    ElementFormat, EntityType, InlineNode, KeyId, ParagraphNode, ReferenceNode, TextFormat,
    TextNode,
};
use crate::place::Place;

fn default_version() -> u32 {
    1
}

/// Serialized node tree (the `chunk` of a block)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SerializedNode {
    Paragraph(SerializedParagraph),
    Text(SerializedText),
    Reference(SerializedReference),
}

impl SerializedNode {
    pub fn kind(&self) -> &'static str {
        match self {
            SerializedNode::Paragraph(_) => "paragraph",
            SerializedNode::Text(_) => "text",
            SerializedNode::Reference(_) => "reference",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedParagraph {
    #[serde(default)]
    pub key_id: String,
    #[serde(default)]
    pub children: Vec<SerializedNode>,
    #[serde(default)]
    pub format: ElementFormat,
    #[serde(default)]
    pub indent: u32,
    #[serde(default = "default_version")]
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedText {
    pub text: String,
    #[serde(default)]
    pub format: u32,
    #[serde(default)]
    pub style: String,
    #[serde(default = "default_version")]
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedReference {
    pub text: String,
    pub entity_id: String,
    #[serde(default)]
    pub description: String,
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portrait: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_modifier: Option<String>,
    #[serde(default = "default_version")]
    pub version: u32,
}

/// Serialize a paragraph and its children, in order
pub fn serialize(paragraph: &ParagraphNode) -> ModelResult<SerializedNode> {
    if paragraph.key_id().is_empty() {
        return Err(ModelError::missing_identity("paragraph"));
    }

    let children = paragraph
        .children
        .iter()
        .map(serialize_inline)
        .collect::<ModelResult<Vec<_>>>()?;

    Ok(SerializedNode::Paragraph(SerializedParagraph {
        key_id: paragraph.key_id().to_string(),
        children,
        format: paragraph.format,
        indent: paragraph.indent,
        version: default_version(),
    }))
}

fn serialize_inline(node: &InlineNode) -> ModelResult<SerializedNode> {
    match node {
        InlineNode::Text(text) => Ok(SerializedNode::Text(SerializedText {
            text: text.text().to_string(),
            format: text.format().bits(),
            style: text.style().to_string(),
            version: default_version(),
        })),
        InlineNode::Reference(reference) => {
            if reference.entity_id.trim().is_empty() {
                return Err(ModelError::missing_identity("reference"));
            }
            Ok(SerializedNode::Reference(SerializedReference {
                text: reference.text.clone(),
                entity_id: reference.entity_id.clone(),
                description: reference.description.clone(),
                entity_type: reference.entity_type,
                portrait: reference.portrait.clone(),
                class_modifier: reference.class_modifier.clone(),
                version: default_version(),
            }))
        }
    }
}

/// Rebuild a paragraph from its serialized tree
pub fn deserialize(node: &SerializedNode) -> ModelResult<ParagraphNode> {
    let SerializedNode::Paragraph(paragraph) = node else {
        return Err(ModelError::unexpected_node("paragraph", node.kind()));
    };

    let key_id = KeyId::new(paragraph.key_id.clone());
    if key_id.is_empty() {
        return Err(ModelError::missing_identity("paragraph"));
    }

    let children = paragraph
        .children
        .iter()
        .map(deserialize_inline)
        .collect::<ModelResult<Vec<_>>>()?;

    let mut result = ParagraphNode::new(key_id).with_children(children);
    result.format = paragraph.format;
    result.indent = paragraph.indent;
    Ok(result)
}

fn deserialize_inline(node: &SerializedNode) -> ModelResult<InlineNode> {
    match node {
        SerializedNode::Text(text) => Ok(InlineNode::Text(
            TextNode::new(text.text.clone())
                .with_format(TextFormat::from_bits(text.format))
                .with_style(text.style.clone()),
        )),
        SerializedNode::Reference(reference) => {
            if reference.entity_id.trim().is_empty() {
                return Err(ModelError::missing_identity("reference"));
            }
            Ok(InlineNode::Reference(ReferenceNode {
                text: reference.text.clone(),
                entity_id: reference.entity_id.clone(),
                description: reference.description.clone(),
                entity_type: reference.entity_type,
                portrait: reference.portrait.clone(),
                class_modifier: reference.class_modifier.clone(),
            }))
        }
        SerializedNode::Paragraph(_) => Err(ModelError::unexpected_node("inline", "paragraph")),
    }
}

/// Persisted paragraph record: `{ key_id, chunk?, place? }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub key_id: KeyId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<SerializedNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<Place>,
}

impl Block {
    /// Full save record for a paragraph
    pub fn from_paragraph(paragraph: &ParagraphNode, place: Option<Place>) -> ModelResult<Self> {
        Ok(Self {
            key_id: paragraph.key_id().clone(),
            chunk: Some(serialize(paragraph)?),
            place,
        })
    }

    /// Delete record: key only
    pub fn key_only(key_id: KeyId) -> Self {
        Self {
            key_id,
            chunk: None,
            place: None,
        }
    }

    /// Reorder record: key and place
    pub fn order(key_id: KeyId, place: Place) -> Self {
        Self {
            key_id,
            chunk: None,
            place: Some(place),
        }
    }

    /// The block key wins over whatever id the chunk carries.
    pub fn to_paragraph(&self) -> ModelResult<ParagraphNode> {
        if self.key_id.is_empty() {
            return Err(ModelError::missing_identity("block"));
        }
        let chunk = self
            .chunk
            .as_ref()
            .ok_or_else(|| ModelError::MissingChunk(self.key_id.to_string()))?;

        let chunk = match chunk {
            SerializedNode::Paragraph(paragraph) if paragraph.key_id != self.key_id.as_str() => {
                let mut paragraph = paragraph.clone();
                paragraph.key_id = self.key_id.to_string();
                SerializedNode::Paragraph(paragraph)
            }
            other => other.clone(),
        };
        deserialize(&chunk)
    }
}

/// Render a paragraph to HTML for clipboard and preview export
pub fn export_html(paragraph: &ParagraphNode) -> String {
    let mut out = String::new();
    let mut styles = Vec::new();
    if paragraph.format != ElementFormat::Unset {
        styles.push(format!("text-align: {}", paragraph.format.as_str()));
    }
    if paragraph.indent > 0 {
        styles.push(format!("padding-inline-start: {}px", paragraph.indent * 40));
    }

    let _ = write!(
        out,
        "<p data-key-id=\"{}\"",
        escape_html(paragraph.key_id().as_str())
    );
    if !styles.is_empty() {
        let _ = write!(out, " style=\"{}\"", escape_html(&styles.join("; ")));
    }
    out.push('>');

    for child in &paragraph.children {
        match child {
            InlineNode::Text(text) => export_text(text, &mut out),
            InlineNode::Reference(reference) => export_reference(reference, &mut out),
        }
    }

    out.push_str("</p>");
    out
}

const FORMAT_TAGS: [(TextFormat, &str); 8] = [
    (TextFormat::BOLD, "strong"),
    (TextFormat::ITALIC, "em"),
    (TextFormat::UNDERLINE, "u"),
    (TextFormat::STRIKETHROUGH, "s"),
    (TextFormat::CODE, "code"),
    (TextFormat::SUBSCRIPT, "sub"),
    (TextFormat::SUPERSCRIPT, "sup"),
    (TextFormat::HIGHLIGHT, "mark"),
];

fn export_text(text: &TextNode, out: &mut String) {
    let tags: Vec<&str> = FORMAT_TAGS
        .iter()
        .filter(|(flag, _)| text.format().contains(*flag))
        .map(|(_, tag)| *tag)
        .collect();

    if !text.style().is_empty() {
        let _ = write!(out, "<span style=\"{}\">", escape_html(text.style()));
    }
    for tag in &tags {
        let _ = write!(out, "<{}>", tag);
    }
    out.push_str(&escape_html(text.text()));
    for tag in tags.iter().rev() {
        let _ = write!(out, "</{}>", tag);
    }
    if !text.style().is_empty() {
        out.push_str("</span>");
    }
}

fn export_reference(reference: &ReferenceNode, out: &mut String) {
    let mut class = format!("entity-reference entity-{}", reference.entity_type);
    if let Some(modifier) = &reference.class_modifier {
        class.push(' ');
        class.push_str(modifier);
    }

    let _ = write!(
        out,
        "<span class=\"{}\" contenteditable=\"false\" data-entity-id=\"{}\" data-entity-type=\"{}\" title=\"{}\"",
        escape_html(&class),
        escape_html(&reference.entity_id),
        reference.entity_type,
        escape_html(&reference.description),
    );
    if let Some(portrait) = &reference.portrait {
        let _ = write!(out, " data-portrait=\"{}\"", escape_html(portrait));
    }
    let _ = write!(out, ">{}</span>", escape_html(&reference.text));
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
