//! Saving and restoring adapter state
//!
//! Sources serialize their own items through an [`ItemCodec`]; the adapter
//! collects the blobs into an [`AdapterState`] that any [`StateStore`] can
//! persist.

mod codec;
mod memory;
mod sqlite;
mod traits;

pub use codec::JsonCodec;
pub use memory::MemoryStateStore;
pub use sqlite::SqliteStateStore;
pub use traits::{
    source_key, AdapterState, ItemCodec, OpenStore, SourceState, StateError, StateResult,
    StateStore,
};
