//! Loading GeoJSON sources and building the road graph from them.

mod builder;
mod config;
pub mod features;

pub use builder::{
    ANNOTATE_SIDEWALKS, BuildReport, LOAD_BIKE_LANES, LOAD_ROADS, MATCH_BIKE_LANES, Step,
    StepKind, build_graph, run_steps,
};
pub use config::{MatchingConfig, PipelineConfig};
