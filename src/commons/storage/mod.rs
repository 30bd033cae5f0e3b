//! Persistent storage of data.

mod disk;
mod key;
mod kv;
mod memory;
mod scope;
mod segment;

pub use self::disk::Disk;
pub use self::key::Key;
pub use self::kv::{KeyValueError, KeyValueStore, KeyValueStoreDispatcher, StorageResult};
pub use self::memory::Memory;
pub use self::scope::Scope;
pub use self::segment::{ParseSegmentError, SegmentBuf};
