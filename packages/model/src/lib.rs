//! # Storyloom Model
//!
//! Node vocabulary for chapter documents and the persisted block format.
//!
//! A chapter is an ordered list of [`ParagraphNode`]s. Each paragraph carries
//! a stable external [`KeyId`] that survives edits, re-renders, splits and
//! clones; inline children are either plain [`TextNode`]s or atomic
//! [`ReferenceNode`]s standing in for a recognized entity mention.
//!
//! Paragraphs are persisted as [`Block`]s (`{ key_id, chunk?, place? }`),
//! where `chunk` is the serialized node tree and `place` is a string-sortable
//! [`Place`] key.

pub mod error;
pub mod id_generator;
pub mod nodes;
pub mod place;
pub mod serializer;

pub use error::{ModelError, ModelResult};
pub use id_generator::{get_chapter_seed, IdGenerator, PROVISIONAL_PREFIX};
pub use nodes::{
    ChapterRef, ChapterTree, ElementFormat, EntityType, InlineNode, KeyId, ParagraphNode,
    ReferenceNode, TextFormat, TextNode,
};
pub use place::Place;
pub use serializer::{
    deserialize, export_html, serialize, Block, SerializedNode, SerializedParagraph,
    SerializedReference, SerializedText,
};
