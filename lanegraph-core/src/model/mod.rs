//! Graph data model and storage
//!
//! Nodes and segments, the storage backend, and the store that owns them.

mod batch;
mod components;
mod storage;
mod store;

pub use batch::{ChunkOptions, ChunkReport, DEFAULT_CHUNK_SIZE, write_chunk, write_in_chunks};
pub use components::{Bounds, Collection, Node, Segment, SegmentEndpoints};
pub use storage::{MemoryStorage, Storage, StorageSnapshot, WriteBatch, WriteOp};
pub use store::{GraphStore, IngestReport};
