//! # Chapter Mutations
//!
//! Semantic operations the host editing surface commits against a chapter.
//!
//! ## Mutation Semantics
//!
//! ### Paragraph identity
//! - A paragraph keeps its `key_id` through every inline edit
//! - Splitting keeps the original key on the first half; the second half
//!   gets a freshly minted key
//! - Merging keeps the key of the surviving (previous) paragraph
//!
//! ### Inline edits
//! - Offsets are in characters of visible text
//! - Reference nodes are atomic: an insertion point inside one snaps to its
//!   end, and a deletion range touching one removes it whole
//! - Adjacent text nodes with identical formatting are merged afterwards

use serde::{Deserialize, Serialize};
use storyloom_model::{
    deserialize, ChapterTree, ElementFormat, IdGenerator, InlineNode, KeyId, ModelError,
    ParagraphNode, SerializedNode, SerializedParagraph, TextFormat, TextNode,
};
use thiserror::Error;

/// Semantic mutations (intent-preserving operations)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    /// Insert a new paragraph after `after` (or at the top)
    InsertParagraph {
        #[serde(default)]
        after: Option<KeyId>,
        #[serde(default)]
        key_id: Option<KeyId>,
        #[serde(default)]
        text: String,
    },

    /// Remove a paragraph and everything in it
    RemoveParagraph { key_id: KeyId },

    /// Move a paragraph to a new index
    MoveParagraph { key_id: KeyId, index: usize },

    /// Split a paragraph at a character offset (Enter)
    SplitParagraph {
        key_id: KeyId,
        offset: usize,
        #[serde(default)]
        new_key_id: Option<KeyId>,
    },

    /// Append a paragraph to the one before it (Backspace at start)
    MergeWithPrevious { key_id: KeyId },

    /// Insert plain text at a character offset
    InsertText {
        key_id: KeyId,
        offset: usize,
        text: String,
    },

    /// Delete `length` characters starting at `offset`
    DeleteText {
        key_id: KeyId,
        offset: usize,
        length: usize,
    },

    /// Replace a paragraph's inline content wholesale
    ReplaceChildren {
        key_id: KeyId,
        children: Vec<SerializedNode>,
    },

    /// Set or clear format bits over a character range
    FormatText {
        key_id: KeyId,
        offset: usize,
        length: usize,
        format: TextFormat,
        enable: bool,
    },

    /// Set paragraph alignment
    SetAlignment {
        key_id: KeyId,
        format: ElementFormat,
    },

    /// Set paragraph indent level
    SetIndent { key_id: KeyId, indent: u32 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Paragraph not found: {0}")]
    ParagraphNotFound(KeyId),

    #[error("Paragraph already exists: {0}")]
    DuplicateKey(KeyId),

    #[error("Paragraph key was not assigned")]
    MissingKey,

    #[error("Offset {offset} out of range for paragraph of length {len}")]
    OffsetOutOfRange { offset: usize, len: usize },

    #[error("First paragraph has nothing to merge into")]
    NothingToMerge,

    #[error("Invalid content: {0}")]
    InvalidContent(#[from] ModelError),
}

/// Structural outcome of a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationEffect {
    Content(KeyId),
    Inserted(KeyId),
    Removed(KeyId),
    Moved(KeyId),
    Split { original: KeyId, created: KeyId },
    Merged { into: KeyId, removed: KeyId },
}

impl Mutation {
    /// Paragraph this mutation targets
    pub fn key_id(&self) -> Option<&KeyId> {
        match self {
            Mutation::InsertParagraph { key_id, .. } => key_id.as_ref(),
            Mutation::RemoveParagraph { key_id }
            | Mutation::MoveParagraph { key_id, .. }
            | Mutation::SplitParagraph { key_id, .. }
            | Mutation::MergeWithPrevious { key_id }
            | Mutation::InsertText { key_id, .. }
            | Mutation::DeleteText { key_id, .. }
            | Mutation::ReplaceChildren { key_id, .. }
            | Mutation::FormatText { key_id, .. }
            | Mutation::SetAlignment { key_id, .. }
            | Mutation::SetIndent { key_id, .. } => Some(key_id),
        }
    }

    /// Fill in keys for paragraphs this mutation creates
    pub fn resolve_keys(self, ids: &mut IdGenerator) -> Self {
        match self {
            Mutation::InsertParagraph {
                after,
                key_id: None,
                text,
            } => Mutation::InsertParagraph {
                after,
                key_id: Some(ids.new_id()),
                text,
            },
            Mutation::SplitParagraph {
                key_id,
                offset,
                new_key_id: None,
            } => Mutation::SplitParagraph {
                key_id,
                offset,
                new_key_id: Some(ids.new_id()),
            },
            other => other,
        }
    }

    /// Apply mutation to the tree with validation
    pub fn apply(&self, tree: &mut ChapterTree) -> Result<MutationEffect, MutationError> {
        self.validate(tree)?;

        match self {
            Mutation::InsertParagraph {
                after,
                key_id,
                text,
            } => {
                let key_id = key_id.clone().ok_or(MutationError::MissingKey)?;
                Self::apply_insert_paragraph(tree, after.as_ref(), key_id, text)
            }

            Mutation::RemoveParagraph { key_id } => Self::apply_remove(tree, key_id),

            Mutation::MoveParagraph { key_id, index } => Self::apply_move(tree, key_id, *index),

            Mutation::SplitParagraph {
                key_id,
                offset,
                new_key_id,
            } => {
                let created = new_key_id.clone().ok_or(MutationError::MissingKey)?;
                Self::apply_split(tree, key_id, *offset, created)
            }

            Mutation::MergeWithPrevious { key_id } => Self::apply_merge(tree, key_id),

            Mutation::InsertText {
                key_id,
                offset,
                text,
            } => {
                let paragraph = paragraph_mut(tree, key_id)?;
                insert_text(paragraph, *offset, text);
                Ok(MutationEffect::Content(key_id.clone()))
            }

            Mutation::DeleteText {
                key_id,
                offset,
                length,
            } => {
                let paragraph = paragraph_mut(tree, key_id)?;
                delete_text(paragraph, *offset, offset.saturating_add(*length));
                Ok(MutationEffect::Content(key_id.clone()))
            }

            Mutation::ReplaceChildren { key_id, children } => {
                let paragraph = paragraph_mut(tree, key_id)?;
                paragraph.children = decode_children(key_id, children)?;
                paragraph.normalize();
                Ok(MutationEffect::Content(key_id.clone()))
            }

            Mutation::FormatText {
                key_id,
                offset,
                length,
                format,
                enable,
            } => {
                let paragraph = paragraph_mut(tree, key_id)?;
                format_text(
                    paragraph,
                    *offset,
                    offset.saturating_add(*length),
                    *format,
                    *enable,
                );
                Ok(MutationEffect::Content(key_id.clone()))
            }

            Mutation::SetAlignment { key_id, format } => {
                paragraph_mut(tree, key_id)?.format = *format;
                Ok(MutationEffect::Content(key_id.clone()))
            }

            Mutation::SetIndent { key_id, indent } => {
                paragraph_mut(tree, key_id)?.indent = *indent;
                Ok(MutationEffect::Content(key_id.clone()))
            }
        }
    }

    fn apply_insert_paragraph(
        tree: &mut ChapterTree,
        after: Option<&KeyId>,
        key_id: KeyId,
        text: &str,
    ) -> Result<MutationEffect, MutationError> {
        let index = match after {
            Some(after) => {
                tree.position(after)
                    .ok_or_else(|| MutationError::ParagraphNotFound(after.clone()))?
                    + 1
            }
            None => 0,
        };

        let mut paragraph = ParagraphNode::new(key_id.clone());
        if !text.is_empty() {
            paragraph = paragraph.with_text(text);
        }
        tree.paragraphs.insert(index, paragraph);
        Ok(MutationEffect::Inserted(key_id))
    }

    fn apply_remove(tree: &mut ChapterTree, key_id: &KeyId) -> Result<MutationEffect, MutationError> {
        let index = position(tree, key_id)?;
        tree.paragraphs.remove(index);
        Ok(MutationEffect::Removed(key_id.clone()))
    }

    fn apply_move(
        tree: &mut ChapterTree,
        key_id: &KeyId,
        index: usize,
    ) -> Result<MutationEffect, MutationError> {
        let from = position(tree, key_id)?;
        let paragraph = tree.paragraphs.remove(from);
        let to = index.min(tree.paragraphs.len());
        tree.paragraphs.insert(to, paragraph);
        Ok(MutationEffect::Moved(key_id.clone()))
    }

    fn apply_split(
        tree: &mut ChapterTree,
        key_id: &KeyId,
        offset: usize,
        created: KeyId,
    ) -> Result<MutationEffect, MutationError> {
        let index = position(tree, key_id)?;
        let paragraph = &mut tree.paragraphs[index];

        let offset = snap_offset(&paragraph.children, offset);
        let (left, right) = split_children(std::mem::take(&mut paragraph.children), offset);
        paragraph.children = left;
        paragraph.normalize();

        let mut second = ParagraphNode::new(created.clone()).with_children(right);
        second.format = paragraph.format;
        second.indent = paragraph.indent;
        second.normalize();

        tree.paragraphs.insert(index + 1, second);
        Ok(MutationEffect::Split {
            original: key_id.clone(),
            created,
        })
    }

    fn apply_merge(tree: &mut ChapterTree, key_id: &KeyId) -> Result<MutationEffect, MutationError> {
        let index = position(tree, key_id)?;
        if index == 0 {
            return Err(MutationError::NothingToMerge);
        }

        let removed = tree.paragraphs.remove(index);
        let previous = &mut tree.paragraphs[index - 1];
        previous.children.extend(removed.children);
        previous.normalize();

        Ok(MutationEffect::Merged {
            into: previous.key_id().clone(),
            removed: key_id.clone(),
        })
    }

    /// Validate without applying
    pub fn validate(&self, tree: &ChapterTree) -> Result<(), MutationError> {
        match self {
            Mutation::InsertParagraph { after, key_id, .. } => {
                let key_id = key_id.as_ref().ok_or(MutationError::MissingKey)?;
                if key_id.is_empty() {
                    return Err(MutationError::MissingKey);
                }
                if tree.get(key_id).is_some() {
                    return Err(MutationError::DuplicateKey(key_id.clone()));
                }
                if let Some(after) = after {
                    position(tree, after)?;
                }
                Ok(())
            }

            Mutation::SplitParagraph {
                key_id,
                offset,
                new_key_id,
            } => {
                let created = new_key_id.as_ref().ok_or(MutationError::MissingKey)?;
                if created.is_empty() {
                    return Err(MutationError::MissingKey);
                }
                if tree.get(created).is_some() {
                    return Err(MutationError::DuplicateKey(created.clone()));
                }
                check_offset(paragraph(tree, key_id)?, *offset)
            }

            Mutation::InsertText { key_id, offset, .. }
            | Mutation::DeleteText { key_id, offset, .. }
            | Mutation::FormatText { key_id, offset, .. } => {
                check_offset(paragraph(tree, key_id)?, *offset)
            }

            Mutation::ReplaceChildren { key_id, children } => {
                paragraph(tree, key_id)?;
                decode_children(key_id, children)?;
                Ok(())
            }

            Mutation::RemoveParagraph { key_id }
            | Mutation::MoveParagraph { key_id, .. }
            | Mutation::MergeWithPrevious { key_id }
            | Mutation::SetAlignment { key_id, .. }
            | Mutation::SetIndent { key_id, .. } => {
                paragraph(tree, key_id)?;
                Ok(())
            }
        }
    }
}

fn position(tree: &ChapterTree, key_id: &KeyId) -> Result<usize, MutationError> {
    tree.position(key_id)
        .ok_or_else(|| MutationError::ParagraphNotFound(key_id.clone()))
}

fn paragraph<'a>(tree: &'a ChapterTree, key_id: &KeyId) -> Result<&'a ParagraphNode, MutationError> {
    tree.get(key_id)
        .ok_or_else(|| MutationError::ParagraphNotFound(key_id.clone()))
}

fn paragraph_mut<'a>(
    tree: &'a mut ChapterTree,
    key_id: &KeyId,
) -> Result<&'a mut ParagraphNode, MutationError> {
    tree.get_mut(key_id)
        .ok_or_else(|| MutationError::ParagraphNotFound(key_id.clone()))
}

fn check_offset(paragraph: &ParagraphNode, offset: usize) -> Result<(), MutationError> {
    let len = paragraph.char_len();
    if offset > len {
        return Err(MutationError::OffsetOutOfRange { offset, len });
    }
    Ok(())
}

fn decode_children(
    key_id: &KeyId,
    children: &[SerializedNode],
) -> Result<Vec<InlineNode>, MutationError> {
    let wrapper = SerializedNode::Paragraph(SerializedParagraph {
        key_id: key_id.to_string(),
        children: children.to_vec(),
        format: ElementFormat::Unset,
        indent: 0,
        version: 1,
    });
    Ok(deserialize(&wrapper)?.children)
}

/// Moves an offset that lands inside a reference to the reference's end
fn snap_offset(children: &[InlineNode], offset: usize) -> usize {
    let mut start = 0;
    for child in children {
        let end = start + child.char_len();
        if matches!(child, InlineNode::Reference(_)) && offset > start && offset < end {
            return end;
        }
        start = end;
    }
    offset
}

fn split_children(children: Vec<InlineNode>, offset: usize) -> (Vec<InlineNode>, Vec<InlineNode>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut start = 0;

    for child in children {
        let end = start + child.char_len();
        if end <= offset {
            left.push(child);
        } else if start >= offset {
            right.push(child);
        } else {
            match child {
                InlineNode::Text(text) => {
                    let (head, tail) = text.split_at(offset - start);
                    left.push(head.into());
                    right.push(tail.into());
                }
                reference => right.push(reference),
            }
        }
        start = end;
    }

    (left, right)
}

/// Formatting new text inherits from the text it is typed into
fn text_template(children: &[InlineNode], offset: usize) -> TextNode {
    let mut start = 0;
    let mut first_text = None;
    for child in children {
        let end = start + child.char_len();
        if let InlineNode::Text(text) = child {
            if first_text.is_none() {
                first_text = Some(text);
            }
            if start < offset && offset <= end {
                return text.with_text("");
            }
        }
        start = end;
    }
    match first_text {
        Some(text) if offset == 0 => text.with_text(""),
        _ => TextNode::default(),
    }
}

fn insert_text(paragraph: &mut ParagraphNode, offset: usize, text: &str) {
    if text.is_empty() {
        return;
    }
    let offset = snap_offset(&paragraph.children, offset);
    let template = text_template(&paragraph.children, offset);
    let (mut left, right) = split_children(std::mem::take(&mut paragraph.children), offset);
    left.push(template.with_text(text).into());
    left.extend(right);
    paragraph.children = left;
    paragraph.normalize();
}

fn delete_text(paragraph: &mut ParagraphNode, from: usize, to: usize) {
    if from >= to {
        return;
    }

    let mut kept = Vec::with_capacity(paragraph.children.len());
    let mut start = 0;
    for child in std::mem::take(&mut paragraph.children) {
        let len = child.char_len();
        let end = start + len;
        if end <= from || start >= to {
            kept.push(child);
        } else if let InlineNode::Text(text) = child {
            if from > start {
                kept.push(text.slice_chars(0, from - start).into());
            }
            if to < end {
                kept.push(text.slice_chars(to - start, len).into());
            }
        }
        // references touched by the range are dropped whole
        start = end;
    }

    paragraph.children = kept;
    paragraph.normalize();
}

fn format_text(
    paragraph: &mut ParagraphNode,
    from: usize,
    to: usize,
    format: TextFormat,
    enable: bool,
) {
    if from >= to {
        return;
    }

    let apply = |text: &TextNode| {
        let next = if enable {
            text.format().union(format)
        } else {
            text.format().difference(format)
        };
        text.clone().with_format(next)
    };

    let mut out = Vec::with_capacity(paragraph.children.len() + 2);
    let mut start = 0;
    for child in std::mem::take(&mut paragraph.children) {
        let len = child.char_len();
        let end = start + len;
        match child {
            InlineNode::Text(text) if end > from && start < to => {
                let inner_from = from.saturating_sub(start);
                let inner_to = (to - start).min(len);
                if inner_from > 0 {
                    out.push(text.slice_chars(0, inner_from).into());
                }
                out.push(apply(&text.slice_chars(inner_from, inner_to)).into());
                if inner_to < len {
                    out.push(text.slice_chars(inner_to, len).into());
                }
            }
            other => out.push(other),
        }
        start = end;
    }

    paragraph.children = out;
    paragraph.normalize();
}
