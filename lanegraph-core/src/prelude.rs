pub use crate::Error;
pub use crate::SegmentId;

// Graph building and querying
pub use crate::loading::{BuildReport, MatchingConfig, PipelineConfig, build_graph};
pub use crate::matching::{MatchOutcome, find_matches, run_matching_pipeline};
pub use crate::model::{Bounds, Collection, GraphStore, Node, Segment, SegmentEndpoints};

// Geometry
pub use crate::algo::{Corridor, DensityConfig, DensityGrid, MatchParams, is_match};
