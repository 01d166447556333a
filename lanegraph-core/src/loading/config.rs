use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::algo::{DEFAULT_BUFFER_WIDTH, DEFAULT_SLOPE_TOLERANCE, MatchParams};
use crate::model::{ChunkOptions, DEFAULT_CHUNK_SIZE};

/// Parameters of the bike lane matching pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Corridor half-width around bike segments, in coordinate degrees
    pub buffer_width: f64,
    /// Maximum relative slope difference between road and bike segment
    pub slope_tolerance: f64,
    /// Ids per committed write chunk
    pub chunk_size: usize,
    /// Extra attempts for a failing chunk
    pub chunk_retries: u32,
    /// Only test bike corridors whose envelope overlaps the road segment
    pub spatial_prefilter: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            buffer_width: DEFAULT_BUFFER_WIDTH,
            slope_tolerance: DEFAULT_SLOPE_TOLERANCE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_retries: 0,
            spatial_prefilter: false,
        }
    }
}

impl MatchingConfig {
    pub fn params(&self) -> MatchParams {
        MatchParams {
            buffer_width: self.buffer_width,
            slope_tolerance: self.slope_tolerance,
        }
    }

    pub fn chunk_options(&self) -> ChunkOptions {
        ChunkOptions {
            chunk_size: self.chunk_size,
            retries: self.chunk_retries,
            abort: None,
        }
    }
}

/// Sources and options of the graph build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base road network, required
    pub roads_path: PathBuf,
    /// Walk network carrying sidewalk tags, skipped when unreadable
    pub sidewalks_path: Option<PathBuf>,
    /// Bicycle lanes, skipped when unreadable
    pub bike_path: Option<PathBuf>,
    pub road_name_property: String,
    pub bike_name_property: String,
    pub sidewalk_property: String,
    /// Where the built graph is saved, and reopened from with `skip_init`
    pub snapshot_path: Option<PathBuf>,
    /// Reuse the snapshot instead of rebuilding from the sources
    pub skip_init: bool,
    pub matching: MatchingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            roads_path: PathBuf::from("highway.geojson"),
            sidewalks_path: Some(PathBuf::from("osm-walk.geojson")),
            bike_path: Some(PathBuf::from("bike.geojson")),
            road_name_property: "name".to_string(),
            bike_name_property: "路段名稱".to_string(),
            sidewalk_property: "sidewalk".to_string(),
            snapshot_path: None,
            skip_init: false,
            matching: MatchingConfig::default(),
        }
    }
}
