//! # Entity Decoration Scanner
//!
//! Reference nodes are derived state: they are recomputed from text content
//! and the entity catalog on every committed update, never hand-maintained.
//!
//! A pass does two things per paragraph:
//! 1. Reverts stale references (entity gone, or its name/aliases no longer
//!    match the displayed text) back to plain text, and refreshes metadata on
//!    the ones that still match.
//! 2. For every text node, finds the best catalog match (earliest start,
//!    longest term) and splits the node into `[before, reference, after]`.
//!
//! Each text node is converted at most once per pass, so a node holding the
//! same name twice needs two passes. [`Scanner::scan`] repeats passes until
//! nothing changes; [`Scanner::scan_pass`] runs exactly one.
//!
//! Matches that straddle two text nodes (for example a name half in bold)
//! are not detected.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use storyloom_common::VisitorMut;
use storyloom_model::{ChapterTree, EntityType, InlineNode, ParagraphNode, ReferenceNode, TextNode};
use tracing::{debug, warn};

use crate::errors::EditorError;
use crate::listeners::{UpdateContext, UpdateListener};

/// Class modifier given to references matched through an alias
pub const ALIAS_CLASS: &str = "alias";

/// Catalog entry as supplied by the story service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    #[serde(deserialize_with = "string_or_number")]
    pub association_id: String,
    #[serde(default)]
    pub association_name: String,
    #[serde(default)]
    pub association_type: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub portrait: Option<String>,
    #[serde(default)]
    pub details: AssociationDetails,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssociationDetails {
    /// Comma separated
    #[serde(default)]
    pub aliases: String,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub extended_description: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TermKind {
    Name,
    Alias,
}

#[derive(Debug, Clone)]
struct Term {
    kind: TermKind,
    regex: Regex,
}

/// An association compiled into match patterns
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub entity_type: EntityType,
    pub description: String,
    pub portrait: Option<String>,
    pub case_sensitive: bool,
    terms: Vec<Term>,
}

impl CatalogEntry {
    /// Compiles an association; `None` when it has no usable name or type
    pub fn compile(association: &Association) -> Option<Self> {
        let name = association.association_name.trim();
        if name.is_empty() {
            warn!(association_id = %association.association_id, "Skipping catalog entry with empty name");
            return None;
        }

        let entity_type = match association.association_type.parse::<EntityType>() {
            Ok(entity_type) => entity_type,
            Err(e) => {
                warn!(association_id = %association.association_id, error = %e, "Skipping catalog entry");
                return None;
            }
        };

        let case_sensitive = association.details.case_sensitive;
        let aliases = association
            .details
            .aliases
            .split(',')
            .map(str::trim)
            .filter(|alias| !alias.is_empty());

        let terms = std::iter::once((TermKind::Name, name))
            .chain(aliases.map(|alias| (TermKind::Alias, alias)))
            .filter_map(|(kind, term)| match term_regex(term, case_sensitive) {
                Ok(regex) => Some(Term { kind, regex }),
                Err(e) => {
                    warn!(term = %term, error = %e, "Skipping unmatchable term");
                    None
                }
            })
            .collect::<Vec<_>>();

        if terms.is_empty() {
            return None;
        }

        Some(Self {
            id: association.association_id.clone(),
            name: name.to_string(),
            entity_type,
            description: association.short_description.clone(),
            portrait: association.portrait.clone().filter(|p| !p.is_empty()),
            case_sensitive,
            terms,
        })
    }

    /// First occurrence of the name, then of each alias
    fn first_match(&self, text: &str) -> Option<(usize, usize, TermKind)> {
        self.terms
            .iter()
            .filter_map(|term| term.regex.find(text).map(|m| (m.start(), m.end(), term.kind)))
            .min_by_key(|(start, end, _)| (*start, std::cmp::Reverse(end - start)))
    }

    /// Whether `text` is exactly one of this entry's terms
    fn accepts(&self, text: &str) -> Option<TermKind> {
        self.terms.iter().find_map(|term| {
            term.regex
                .find(text)
                .filter(|m| m.start() == 0 && m.end() == text.len())
                .map(|_| term.kind)
        })
    }

    fn reference(&self, text: &str, kind: TermKind) -> ReferenceNode {
        ReferenceNode {
            text: text.to_string(),
            entity_id: self.id.clone(),
            description: self.description.clone(),
            entity_type: self.entity_type,
            portrait: self.portrait.clone(),
            class_modifier: (kind == TermKind::Alias).then(|| ALIAS_CLASS.to_string()),
        }
    }
}

fn term_regex(term: &str, case_sensitive: bool) -> Result<Regex, regex::Error> {
    let starts_word = term.chars().next().is_some_and(is_word_char);
    let ends_word = term.chars().last().is_some_and(is_word_char);
    let pattern = format!(
        "{}{}{}",
        if starts_word { r"\b" } else { "" },
        regex::escape(term),
        if ends_word { r"\b" } else { "" },
    );
    RegexBuilder::new(&pattern)
        .case_insensitive(!case_sensitive)
        .build()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Compiled entity catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    by_id: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(associations: &[Association]) -> Self {
        let mut catalog = Catalog::default();
        for entry in associations.iter().filter_map(CatalogEntry::compile) {
            catalog.by_id.insert(entry.id.clone(), catalog.entries.len());
            catalog.entries.push(entry);
        }
        debug!(entries = catalog.entries.len(), skipped = associations.len() - catalog.entries.len(), "Compiled catalog");
        catalog
    }

    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        let associations: Vec<Association> = serde_json::from_str(json)
            .map_err(|e| EditorError::Catalog(e.to_string()))?;
        Ok(Self::new(&associations))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.by_id.get(id).map(|&index| &self.entries[index])
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Best match across all entries: earliest, then longest, then catalog order
    fn best_match(&self, text: &str) -> Option<(usize, usize, TermKind, &CatalogEntry)> {
        self.entries
            .iter()
            .filter_map(|entry| {
                entry
                    .first_match(text)
                    .map(|(start, end, kind)| (start, end, kind, entry))
            })
            .min_by_key(|(start, end, _, _)| (*start, std::cmp::Reverse(end - start)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScannerOptions {
    /// Cap on passes per scan; `None` runs until nothing changes
    pub max_passes: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub decorated: usize,
    pub reverted: usize,
    pub refreshed: usize,
    pub passes: usize,
}

impl ScanReport {
    pub fn changed(&self) -> bool {
        self.decorated + self.reverted + self.refreshed > 0
    }

    fn absorb(&mut self, other: ScanReport) {
        self.decorated += other.decorated;
        self.reverted += other.reverted;
        self.refreshed += other.refreshed;
        self.passes += other.passes;
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scanner {
    catalog: Catalog,
    options: ScannerOptions,
}

impl Scanner {
    pub fn new(catalog: Catalog) -> Self {
        Self::with_options(catalog, ScannerOptions::default())
    }

    pub fn with_options(catalog: Catalog, options: ScannerOptions) -> Self {
        Self { catalog, options }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Runs passes until the tree stops changing
    pub fn scan(&self, tree: &mut ChapterTree) -> ScanReport {
        let limit = self
            .options
            .max_passes
            .unwrap_or_else(|| pass_bound(tree))
            .max(1);
        let mut total = ScanReport::default();
        for _ in 0..limit {
            let pass = self.scan_pass(tree);
            total.absorb(pass);
            if !pass.changed() {
                break;
            }
        }
        if total.changed() {
            debug!(chapter = %tree.chapter, decorated = total.decorated, reverted = total.reverted, passes = total.passes, "Decorations updated");
        }
        total
    }

    /// Exactly one pass over every paragraph
    pub fn scan_pass(&self, tree: &mut ChapterTree) -> ScanReport {
        let mut pass = PassVisitor {
            scanner: self,
            report: ScanReport {
                passes: 1,
                ..Default::default()
            },
        };
        pass.visit_chapter_mut(tree);
        pass.report
    }

    pub fn scan_paragraph(&self, paragraph: &mut ParagraphNode) -> ScanReport {
        let mut report = ScanReport::default();
        self.prune_stale(paragraph, &mut report);
        self.decorate(paragraph, &mut report);
        report
    }

    fn prune_stale(&self, paragraph: &mut ParagraphNode, report: &mut ScanReport) {
        let mut reverted = false;
        for child in paragraph.children.iter_mut() {
            let InlineNode::Reference(reference) = child else {
                continue;
            };

            let current = self.catalog.get(&reference.entity_id).and_then(|entry| {
                entry
                    .accepts(&reference.text)
                    .map(|kind| entry.reference(&reference.text, kind))
            });

            match current {
                Some(fresh) if fresh != *reference => {
                    *reference = fresh;
                    report.refreshed += 1;
                }
                Some(_) => {}
                None => {
                    debug!(entity_id = %reference.entity_id, text = %reference.text, "Reverting stale reference");
                    *child = InlineNode::Text(TextNode::new(reference.text.clone()));
                    report.reverted += 1;
                    reverted = true;
                }
            }
        }
        if reverted {
            paragraph.normalize();
        }
    }

    fn decorate(&self, paragraph: &mut ParagraphNode, report: &mut ScanReport) {
        if self.catalog.is_empty() {
            return;
        }

        let mut out = Vec::with_capacity(paragraph.children.len());
        for child in std::mem::take(&mut paragraph.children) {
            let InlineNode::Text(text) = child else {
                out.push(child);
                continue;
            };

            match self.catalog.best_match(text.text()) {
                Some((start, end, kind, entry)) => {
                    let (before, matched, after) = text.split_bytes(start, end);
                    if !before.is_empty() {
                        out.push(before.into());
                    }
                    out.push(entry.reference(matched.text(), kind).into());
                    if !after.is_empty() {
                        out.push(after.into());
                    }
                    report.decorated += 1;
                }
                None => out.push(InlineNode::Text(text)),
            }
        }
        paragraph.children = out;
    }
}

/// Every pass after the first decorates at least one visible character,
/// so a scan settles within this many passes
fn pass_bound(tree: &ChapterTree) -> usize {
    tree.paragraphs
        .iter()
        .flat_map(|p| p.children.iter())
        .map(|child| child.text().chars().count())
        .sum::<usize>()
        + 2
}

struct PassVisitor<'a> {
    scanner: &'a Scanner,
    report: ScanReport,
}

impl VisitorMut for PassVisitor<'_> {
    fn visit_paragraph_mut(&mut self, paragraph: &mut ParagraphNode) {
        let report = self.scanner.scan_paragraph(paragraph);
        self.report.decorated += report.decorated;
        self.report.reverted += report.reverted;
        self.report.refreshed += report.refreshed;
    }
}

impl UpdateListener for Scanner {
    fn name(&self) -> &'static str {
        "decorations"
    }

    fn on_update(&mut self, tree: &mut ChapterTree, _context: &UpdateContext) -> bool {
        self.scan(tree).changed()
    }
}
