//! Chunked write-back of the bike compatibility flag
//!
//! Large id lists are split into chunks that are committed one after another,
//! each as its own atomic [`WriteBatch`]. A failing chunk leaves the chunks
//! before it committed and is reported together with what already landed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};

use super::storage::{Storage, WriteBatch, WriteOp};
use crate::{Error, SegmentId};

/// Default number of ids per committed chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 900;

#[derive(Debug, Clone)]
pub struct ChunkOptions {
    pub chunk_size: usize,
    /// Extra attempts for a failing chunk before giving up
    pub retries: u32,
    /// Checked between chunks, set it to stop after the current chunk
    pub abort: Option<Arc<AtomicBool>>,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            retries: 0,
            abort: None,
        }
    }
}

/// Rows changed by every committed chunk, in commit order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkReport {
    pub committed: Vec<usize>,
}

impl ChunkReport {
    pub fn chunks(&self) -> usize {
        self.committed.len()
    }

    pub fn total_rows(&self) -> usize {
        self.committed.iter().sum()
    }
}

/// Commits one chunk of ids as a single atomic batch.
///
/// # Errors
///
/// Propagates the storage error; the chunk is then not applied at all.
pub fn write_chunk(storage: &mut dyn Storage, ids: &[SegmentId]) -> Result<usize, Error> {
    let batch = WriteBatch::from_iter([WriteOp::SetBikeCompatible(ids.to_vec())]);
    storage.apply(batch)
}

/// Flags `ids` as bike compatible, `options.chunk_size` ids at a time.
///
/// # Errors
///
/// - [`Error::InvalidData`] for a zero chunk size
/// - [`Error::WriteFailure`] when a chunk still fails after its retries
/// - [`Error::Interrupted`] when the abort flag was raised between chunks
///
/// Both failure variants carry the chunks and rows committed so far.
pub fn write_in_chunks(
    storage: &mut dyn Storage,
    ids: &[SegmentId],
    options: &ChunkOptions,
) -> Result<ChunkReport, Error> {
    if options.chunk_size == 0 {
        return Err(Error::InvalidData("Chunk size must be positive".to_string()));
    }

    let mut report = ChunkReport::default();

    for (chunk_idx, chunk) in ids.chunks(options.chunk_size).enumerate() {
        if options
            .abort
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return Err(Error::Interrupted {
                committed_chunks: report.chunks(),
                committed_rows: report.total_rows(),
            });
        }

        debug!(
            "Processing chunk {} (ids {}..{})",
            chunk_idx + 1,
            chunk[0],
            chunk[chunk.len() - 1]
        );

        let mut attempt = 0;
        let changed = loop {
            match write_chunk(storage, chunk) {
                Ok(changed) => break changed,
                Err(e) if attempt < options.retries => {
                    attempt += 1;
                    warn!("Chunk {} failed ({e}), retry {attempt}/{}", chunk_idx + 1, options.retries);
                }
                Err(e) => {
                    return Err(Error::WriteFailure {
                        committed_chunks: report.chunks(),
                        committed_rows: report.total_rows(),
                        failed_chunk: chunk_idx,
                        reason: e.to_string(),
                    });
                }
            }
        };

        report.committed.push(changed);
    }

    Ok(report)
}
