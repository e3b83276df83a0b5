//! Storage for multisig records
//!
//! [`RecordStore`] is the atomic per-record interface the engine runs on;
//! [`MemoryStore`] implements it in memory and [`Storage`] persists
//! snapshots to disk.

pub mod memory;
pub mod persistence;
pub mod store;

pub use memory::{MemoryStore, Snapshot};
pub use persistence::{load_from_file, save_to_file, Storage, StorageConfig};
pub use store::{RecordKind, RecordStore, StorageError};
