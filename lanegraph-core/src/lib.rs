//! Road graph with bike lane matching.
//!
//! Builds a deduplicated graph of road and bike lane segments from GeoJSON
//! sources, flags the road segments that run along a bike lane and answers
//! spatial and adjacency queries over the result.

pub mod algo;
mod error;
pub mod loading;
pub mod matching;
pub mod model;
pub mod prelude;

pub use error::Error;

/// Identifier of a segment within its collection
pub type SegmentId = u32;
