//! # Storyloom Sync
//!
//! Moves queued chapter operations to a remote store.
//!
//! - [`StoreRequest`]: the wire shape of `save`, `delete` and `syncOrder`
//! - [`RemoteStore`]: where requests go (an HTTP client in the browser host,
//!   [`InMemoryStore`] in tests and the dev server)
//! - [`SyncDriver`]: drains an [`EditSession`](storyloom_editor::EditSession)
//!   queue once per cycle
//! - `server` (feature `server`): an axum app exposing [`InMemoryStore`]
//!   over HTTP

pub mod drain;
pub mod error;
pub mod memory;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

pub use drain::{DrainReport, SendOutcome, SyncDriver};
pub use error::{StoreError, TransportError, TransportResult};
pub use memory::InMemoryStore;
pub use store::{DeleteBody, OrderBody, RemoteStore, SaveBody, StoreRequest, StoreResponse};
