//! Embedded key-value storage for the local row backend.
//!
//! Keys are plain strings (`posts/3f2a...`, `likes/9c1e...`); values are
//! opaque bytes. Writes go through [`WriteBatch`] so multi-key updates, such
//! as a like row plus its post counter, commit atomically.

pub mod batch;
pub mod error;
pub mod memory;
pub mod redb;
pub mod traits;

pub use batch::{WriteBatch, WriteOp};
pub use error::KVError;
pub use memory::MemoryStore;
pub use redb::RedbStore;
pub use traits::KVStore;
