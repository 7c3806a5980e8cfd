//! # Storyloom Editor
//!
//! Chapter editing engine for Storyloom.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: blocks ⇄ paragraph tree              │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: EditSession                         │
//! │  - Apply mutations to the open chapter      │
//! │  - Re-derive entity references (Scanner)    │
//! │  - Fingerprint paragraphs for dirty checks  │
//! │  - Route pointer events to actions          │
//! │  - Queue save / delete / syncOrder          │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ sync: drain the queue into a remote store   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The tree is the source of truth**: references and fingerprints are derived views
//! 2. **Stable identity**: a paragraph's `key_id` survives edits, splits and re-renders
//! 3. **Last write wins per key**: newer operations supersede queued ones
//! 4. **Snapshots in flight**: sending never borrows the live tree
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storyloom_editor::{Catalog, EditSession, Mutation};
//!
//! let mut session = EditSession::new("client-1");
//! session.set_catalog(Catalog::from_json(&catalog_json)?)?;
//! session.open_chapter(chapter, &blocks);
//!
//! // Apply mutation; saves are queued if the fingerprint moved
//! session.apply(Mutation::InsertText {
//!     key_id: "p1".into(),
//!     offset: 5,
//!     text: "!".to_string(),
//! })?;
//!
//! // Hand the batch to a transport, then report back
//! for op in session.take_batch() {
//!     session.acknowledge(op.id, &[])?;
//! }
//! ```

mod document;
mod errors;
mod fingerprint;
mod interaction;
mod listeners;
mod mutations;
mod pipeline;
mod queue;
mod scanner;
mod session;

pub use document::Document;
pub use errors::EditorError;
pub use fingerprint::{fingerprint, fingerprint_paragraph, to_base36, Fingerprint, RollingHash};
pub use interaction::{
    EditorAction, InteractionEvent, InteractionRouter, NodePath, PointerButton, PointerEvent,
};
pub use listeners::{ListenerRegistry, NormalizeText, UpdateContext, UpdateListener};
pub use mutations::{Mutation, MutationEffect, MutationError};
pub use pipeline::{ChangeSet, Commit, Pipeline};
pub use queue::{
    DbOperation, IdAssignment, OperationId, OperationQueue, OperationType, QueueError,
    QueuedOperation, SyncState,
};
pub use scanner::{
    Association, AssociationDetails, Catalog, CatalogEntry, ScanReport, Scanner, ScannerOptions,
    ALIAS_CLASS,
};
pub use session::{ClosePolicy, ClosedChapter, EditSession, SessionOptions};

// Re-export model types for convenience
pub use storyloom_model::{Block, ChapterRef, ChapterTree, KeyId, ParagraphNode, Place};
