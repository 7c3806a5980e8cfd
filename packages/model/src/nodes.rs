use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// External paragraph identity, the join key between tree and persisted block
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Ids minted on the client that the remote store may replace on first save
    pub fn is_provisional(&self) -> bool {
        self.0.starts_with(crate::id_generator::PROVISIONAL_PREFIX)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for KeyId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifies the chapter a tree belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChapterRef {
    pub story_id: String,
    pub chapter_id: String,
}

impl ChapterRef {
    pub fn new(story_id: impl Into<String>, chapter_id: impl Into<String>) -> Self {
        Self {
            story_id: story_id.into(),
            chapter_id: chapter_id.into(),
        }
    }
}

impl fmt::Display for ChapterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.story_id, self.chapter_id)
    }
}

/// Text format bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextFormat(u32);

impl TextFormat {
    pub const BOLD: TextFormat = TextFormat(1);
    pub const ITALIC: TextFormat = TextFormat(1 << 1);
    pub const STRIKETHROUGH: TextFormat = TextFormat(1 << 2);
    pub const UNDERLINE: TextFormat = TextFormat(1 << 3);
    pub const CODE: TextFormat = TextFormat(1 << 4);
    pub const SUBSCRIPT: TextFormat = TextFormat(1 << 5);
    pub const SUPERSCRIPT: TextFormat = TextFormat(1 << 6);
    pub const HIGHLIGHT: TextFormat = TextFormat(1 << 7);

    pub const fn empty() -> Self {
        TextFormat(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        TextFormat(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: TextFormat) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: TextFormat) -> Self {
        TextFormat(self.0 | other.0)
    }

    pub const fn difference(self, other: TextFormat) -> Self {
        TextFormat(self.0 & !other.0)
    }

    pub const fn toggled(self, other: TextFormat) -> Self {
        TextFormat(self.0 ^ other.0)
    }
}

/// Plain text leaf. Edits produce new nodes rather than mutating this one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextNode {
    text: String,
    format: TextFormat,
    style: String,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::empty(),
            style: String::new(),
        }
    }

    pub fn with_format(mut self, format: TextFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn format(&self) -> TextFormat {
        self.format
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Same formatting, new content
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: self.format,
            style: self.style.clone(),
        }
    }

    /// Characters `[start, end)` as a node with the same formatting
    pub fn slice_chars(&self, start: usize, end: usize) -> Self {
        let from = byte_offset(&self.text, start);
        let to = byte_offset(&self.text, end.max(start));
        self.with_text(&self.text[from..to])
    }

    /// Splits at a character offset, keeping formatting on both halves
    pub fn split_at(&self, offset: usize) -> (Self, Self) {
        let at = byte_offset(&self.text, offset);
        (
            self.with_text(&self.text[..at]),
            self.with_text(&self.text[at..]),
        )
    }

    /// Splits at byte offsets (as produced by a regex match)
    pub fn split_bytes(&self, start: usize, end: usize) -> (Self, Self, Self) {
        (
            self.with_text(&self.text[..start]),
            self.with_text(&self.text[start..end]),
            self.with_text(&self.text[end..]),
        )
    }

    pub fn can_merge(&self, other: &TextNode) -> bool {
        self.format == other.format && self.style == other.style
    }

    pub fn merged(&self, other: &TextNode) -> Self {
        let mut text = String::with_capacity(self.text.len() + other.text.len());
        text.push_str(&self.text);
        text.push_str(&other.text);
        self.with_text(text)
    }
}

fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Kind of entity a reference points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Character,
    Place,
    Event,
    Item,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Character => "character",
            EntityType::Place => "place",
            EntityType::Event => "event",
            EntityType::Item => "item",
        }
    }
}

impl FromStr for EntityType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "character" | "characters" => Ok(EntityType::Character),
            "place" | "places" | "location" => Ok(EntityType::Place),
            "event" | "events" => Ok(EntityType::Event),
            "item" | "items" => Ok(EntityType::Item),
            other => Err(ModelError::UnknownEntityType(other.to_string())),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic leaf standing in for a recognized entity mention.
///
/// `text` is the matched substring at creation time; the node is never
/// partially edited, only removed as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceNode {
    pub text: String,
    pub entity_id: String,
    pub description: String,
    pub entity_type: EntityType,
    pub portrait: Option<String>,
    pub class_modifier: Option<String>,
}

impl ReferenceNode {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Inline child of a paragraph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineNode {
    Text(TextNode),
    Reference(ReferenceNode),
}

impl InlineNode {
    pub fn text(&self) -> &str {
        match self {
            InlineNode::Text(node) => node.text(),
            InlineNode::Reference(node) => &node.text,
        }
    }

    pub fn node_type(&self) -> &'static str {
        match self {
            InlineNode::Text(_) => "text",
            InlineNode::Reference(_) => "reference",
        }
    }

    pub fn char_len(&self) -> usize {
        match self {
            InlineNode::Text(node) => node.char_len(),
            InlineNode::Reference(node) => node.char_len(),
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            InlineNode::Text(node) => Some(node),
            InlineNode::Reference(_) => None,
        }
    }

    pub fn as_reference(&self) -> Option<&ReferenceNode> {
        match self {
            InlineNode::Reference(node) => Some(node),
            InlineNode::Text(_) => None,
        }
    }
}

impl From<TextNode> for InlineNode {
    fn from(node: TextNode) -> Self {
        InlineNode::Text(node)
    }
}

impl From<ReferenceNode> for InlineNode {
    fn from(node: ReferenceNode) -> Self {
        InlineNode::Reference(node)
    }
}

/// Paragraph alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementFormat {
    #[default]
    #[serde(rename = "")]
    Unset,
    Left,
    Center,
    Right,
    Justify,
    Start,
    End,
}

impl ElementFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementFormat::Unset => "",
            ElementFormat::Left => "left",
            ElementFormat::Center => "center",
            ElementFormat::Right => "right",
            ElementFormat::Justify => "justify",
            ElementFormat::Start => "start",
            ElementFormat::End => "end",
        }
    }
}

/// Block-level node with a stable external id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphNode {
    key_id: KeyId,
    pub children: Vec<InlineNode>,
    pub format: ElementFormat,
    pub indent: u32,
}

impl ParagraphNode {
    pub fn new(key_id: impl Into<KeyId>) -> Self {
        Self {
            key_id: key_id.into(),
            children: Vec::new(),
            format: ElementFormat::Unset,
            indent: 0,
        }
    }

    pub fn with_children(mut self, children: Vec<InlineNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_children(vec![InlineNode::Text(TextNode::new(text))])
    }

    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    /// Replaces the external id. Only used when the remote store assigns a
    /// permanent id to a provisional one.
    pub fn assign_key(&mut self, key_id: KeyId) {
        self.key_id = key_id;
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Concatenated visible text
    pub fn text_content(&self) -> String {
        self.children.iter().map(InlineNode::text).collect()
    }

    pub fn char_len(&self) -> usize {
        self.children.iter().map(InlineNode::char_len).sum()
    }

    pub fn references(&self) -> impl Iterator<Item = &ReferenceNode> {
        self.children.iter().filter_map(InlineNode::as_reference)
    }

    /// Merges adjacent text nodes with identical formatting and drops empty
    /// ones. Returns whether anything changed.
    pub fn normalize(&mut self) -> bool {
        let before = self.children.len();
        let mut changed = false;
        let mut out: Vec<InlineNode> = Vec::with_capacity(before);

        for child in self.children.drain(..) {
            match child {
                InlineNode::Text(text) if text.is_empty() => changed = true,
                InlineNode::Text(text) => match out.last_mut() {
                    Some(InlineNode::Text(prev)) if prev.can_merge(&text) => {
                        *prev = prev.merged(&text);
                        changed = true;
                    }
                    _ => out.push(InlineNode::Text(text)),
                },
                reference => out.push(reference),
            }
        }

        self.children = out;
        changed
    }
}

/// In-memory tree of one chapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterTree {
    pub chapter: ChapterRef,
    pub paragraphs: Vec<ParagraphNode>,
}

impl ChapterTree {
    pub fn new(chapter: ChapterRef) -> Self {
        Self {
            chapter,
            paragraphs: Vec::new(),
        }
    }

    pub fn with_paragraphs(mut self, paragraphs: Vec<ParagraphNode>) -> Self {
        self.paragraphs = paragraphs;
        self
    }

    pub fn position(&self, key_id: &KeyId) -> Option<usize> {
        self.paragraphs.iter().position(|p| p.key_id() == key_id)
    }

    pub fn get(&self, key_id: &KeyId) -> Option<&ParagraphNode> {
        self.paragraphs.iter().find(|p| p.key_id() == key_id)
    }

    pub fn get_mut(&mut self, key_id: &KeyId) -> Option<&mut ParagraphNode> {
        self.paragraphs.iter_mut().find(|p| p.key_id() == key_id)
    }

    pub fn key_ids(&self) -> Vec<KeyId> {
        self.paragraphs.iter().map(|p| p.key_id().clone()).collect()
    }

    /// Visible text, one line per paragraph
    pub fn text_content(&self) -> String {
        self.paragraphs
            .iter()
            .map(ParagraphNode::text_content)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
