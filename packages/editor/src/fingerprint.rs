//! # Change Fingerprints
//!
//! A short, stable summary of a tree's content and formatting, cheap enough
//! to recompute on every keystroke. Each node contributes
//! `"{id}:{type}:{text}:{attrs};"` to a 32-bit multiplicative rolling hash
//! (`hash = 31 * hash + code unit`, wrapping), rendered unsigned in base 36.
//!
//! Node ids are the paragraph `key_id` for paragraphs and `{key_id}/{index}`
//! for inline children. Fingerprints are a dirty check only: collisions are
//! possible and are never used to address stored content.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};
use storyloom_common::{walk_paragraph, Visitor};
use storyloom_model::{ChapterTree, ParagraphNode, ReferenceNode, TextNode};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint of a whole chapter
pub fn fingerprint(tree: &ChapterTree) -> Fingerprint {
    let mut visitor = FingerprintVisitor::default();
    visitor.visit_chapter(tree);
    visitor.finish()
}

/// Fingerprint of one paragraph, used to decide which paragraphs need saving
pub fn fingerprint_paragraph(paragraph: &ParagraphNode) -> Fingerprint {
    let mut visitor = FingerprintVisitor::default();
    visitor.visit_paragraph(paragraph);
    visitor.finish()
}

/// `hash = 31 * hash + unit` over UTF-16 code units, with 32-bit wraparound
#[derive(Debug, Default, Clone, Copy)]
pub struct RollingHash(u32);

impl RollingHash {
    pub fn update(&mut self, s: &str) {
        for unit in s.encode_utf16() {
            self.0 = self.0.wrapping_mul(31).wrapping_add(u32::from(unit));
        }
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Write for RollingHash {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.update(s);
        Ok(())
    }
}

/// Unsigned base-36 rendering
pub fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::with_capacity(7);
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[derive(Default)]
struct FingerprintVisitor {
    hash: RollingHash,
}

impl FingerprintVisitor {
    fn finish(self) -> Fingerprint {
        Fingerprint(to_base36(self.hash.value()))
    }

    fn emit(&mut self, id: fmt::Arguments<'_>, kind: &str, text: &str, attrs: &str) {
        // RollingHash never fails to write
        let _ = write!(self.hash, "{}:{}:{}:{};", id, kind, text, attrs);
    }
}

impl Visitor for FingerprintVisitor {
    fn visit_paragraph(&mut self, paragraph: &ParagraphNode) {
        let attrs = serde_json::json!({
            "format": paragraph.format.as_str(),
            "indent": paragraph.indent,
        })
        .to_string();
        self.emit(format_args!("{}", paragraph.key_id()), "paragraph", "", &attrs);
        walk_paragraph(self, paragraph);
    }

    fn visit_text(&mut self, paragraph: &ParagraphNode, index: usize, text: &TextNode) {
        let attrs = serde_json::json!({
            "format": text.format().bits(),
            "style": text.style(),
        })
        .to_string();
        self.emit(
            format_args!("{}/{}", paragraph.key_id(), index),
            "text",
            text.text(),
            &attrs,
        );
    }

    fn visit_reference(&mut self, paragraph: &ParagraphNode, index: usize, reference: &ReferenceNode) {
        let attrs = serde_json::json!({ "entityId": reference.entity_id }).to_string();
        self.emit(
            format_args!("{}/{}", paragraph.key_id(), index),
            "reference",
            &reference.text,
            &attrs,
        );
    }
}
