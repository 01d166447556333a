//! Bike lane matching pass
//!
//! Every road segment is tested against the bike segments in id order and
//! flagged on the first corridor that covers it. A road segment is therefore
//! recorded at most once, whichever corridor happens to come first.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use log::info;
use rstar::{AABB, RTree, RTreeObject};

use crate::algo::Corridor;
use crate::algo::matcher::{matches_corridor, slope};
use crate::loading::MatchingConfig;
use crate::model::{ChunkReport, GraphStore, SegmentEndpoints};
use crate::{Error, SegmentId};

/// Result of one matching run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    pub road_segments: usize,
    pub bike_segments: usize,
    /// Road segments covered by a bike corridor, in id order
    pub matched: Vec<SegmentId>,
    pub write: ChunkReport,
}

impl MatchOutcome {
    /// Segments whose flag flipped during this run.
    pub fn newly_marked(&self) -> usize {
        self.write.total_rows()
    }
}

/// Corridor and slope of a bike segment, built once per run
struct PreparedBike {
    corridor: Corridor,
    slope: f64,
}

impl PreparedBike {
    fn new(bike: &SegmentEndpoints, buffer_width: f64) -> Option<Self> {
        let (start, end) = bike.coords();
        Corridor::around(start, end, buffer_width).map(|corridor| Self {
            corridor,
            slope: slope(start, end),
        })
    }
}

struct CorridorEnvelope {
    idx: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for CorridorEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn road_envelope(road: &SegmentEndpoints) -> AABB<[f64; 2]> {
    AABB::from_corners([road.start.lng, road.start.lat], [road.end.lng, road.end.lat])
}

/// Ids of the road segments covered by at least one bike segment.
///
/// Zero-length bike segments have no corridor and are skipped.
pub fn find_matches(
    roads: &[SegmentEndpoints],
    bikes: &[SegmentEndpoints],
    config: &MatchingConfig,
) -> Vec<SegmentId> {
    let params = config.params();
    let prepared: Vec<PreparedBike> = bikes
        .iter()
        .filter_map(|bike| PreparedBike::new(bike, params.buffer_width))
        .collect();

    let covers = |road: &SegmentEndpoints, bike: &PreparedBike| {
        matches_corridor(road.coords(), &bike.corridor, bike.slope, params.slope_tolerance)
    };

    if config.spatial_prefilter {
        let tree = RTree::bulk_load(
            prepared
                .iter()
                .enumerate()
                .map(|(idx, bike)| {
                    let (min, max) = bike.corridor.envelope();
                    CorridorEnvelope {
                        idx,
                        envelope: AABB::from_corners(min, max),
                    }
                })
                .collect(),
        );

        roads
            .iter()
            .filter(|road| {
                let mut candidates: Vec<usize> = tree
                    .locate_in_envelope_intersecting(&road_envelope(road))
                    .map(|entry| entry.idx)
                    .collect();
                candidates.sort_unstable();
                candidates.into_iter().any(|idx| covers(road, &prepared[idx]))
            })
            .map(|road| road.id)
            .collect()
    } else {
        roads
            .iter()
            .filter(|road| prepared.iter().any(|bike| covers(road, bike)))
            .map(|road| road.id)
            .collect()
    }
}

/// Reads both collections, matches them and writes the bike flag back.
///
/// # Errors
///
/// Returns [`Error::NotInitialized`] before the road network is loaded, or a
/// chunk write error (see [`GraphStore::set_bike_compatible`]).
pub fn run_matching_pipeline(
    store: &mut GraphStore,
    config: &MatchingConfig,
    abort: Option<Arc<AtomicBool>>,
) -> Result<MatchOutcome, Error> {
    let (roads, bikes) = {
        let reader = &*store;
        rayon::join(
            || reader.fetch_all_road_segments(),
            || reader.fetch_all_bike_segments(),
        )
    };
    let (roads, bikes) = (roads?, bikes?);
    info!(
        "Fetched {} road segments and {} bike segments for matching",
        roads.len(),
        bikes.len()
    );

    let matched = find_matches(&roads, &bikes, config);
    info!("Matching complete, {} road segments follow a bike lane", matched.len());

    let write = if matched.is_empty() {
        info!("No matches found, no updates needed");
        ChunkReport::default()
    } else {
        let options = crate::model::ChunkOptions {
            abort,
            ..config.chunk_options()
        };
        store.set_bike_compatible(&matched, &options)?
    };

    Ok(MatchOutcome {
        road_segments: roads.len(),
        bike_segments: bikes.len(),
        matched,
        write,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Node;

    fn endpoints(id: SegmentId, start: (f64, f64), end: (f64, f64)) -> SegmentEndpoints {
        // (lng, lat) pairs, as in GeoJSON
        SegmentEndpoints {
            id,
            start: Node::new(start.1, start.0),
            end: Node::new(end.1, end.0),
        }
    }

    fn sample() -> (Vec<SegmentEndpoints>, Vec<SegmentEndpoints>) {
        let roads = vec![
            endpoints(1, (121.501, 25.0011), (121.509, 25.0091)),
            endpoints(2, (121.509, 25.0091), (121.52, 25.0091)),
            endpoints(3, (121.53, 25.02), (121.54, 25.03)),
            endpoints(4, (121.5012, 25.0010), (121.5088, 25.0089)),
        ];
        let bikes = vec![
            endpoints(1, (121.55, 25.05), (121.55, 25.05)),
            endpoints(2, (121.50, 25.00), (121.51, 25.01)),
            endpoints(3, (121.500, 25.0002), (121.510, 25.0102)),
        ];
        (roads, bikes)
    }

    #[test]
    fn each_road_segment_matches_at_most_once() {
        let (roads, bikes) = sample();
        let matched = find_matches(&roads, &bikes, &MatchingConfig::default());
        assert_eq!(matched, vec![1, 4]);
    }

    #[test]
    fn prefilter_gives_identical_results() {
        let (roads, bikes) = sample();
        let config = MatchingConfig {
            spatial_prefilter: true,
            ..MatchingConfig::default()
        };
        assert_eq!(
            find_matches(&roads, &bikes, &config),
            find_matches(&roads, &bikes, &MatchingConfig::default())
        );
    }

    #[test]
    fn buffer_width_comes_from_config() {
        let (roads, bikes) = sample();
        let narrow = MatchingConfig {
            buffer_width: 1e-6,
            ..MatchingConfig::default()
        };
        assert!(find_matches(&roads, &bikes, &narrow).is_empty());
    }

    #[test]
    fn no_bike_lanes_no_matches() {
        let (roads, _) = sample();
        assert!(find_matches(&roads, &[], &MatchingConfig::default()).is_empty());
    }

    #[test]
    fn pipeline_requires_initialized_store() {
        let mut store = GraphStore::in_memory();
        assert!(matches!(
            run_matching_pipeline(&mut store, &MatchingConfig::default(), None),
            Err(Error::NotInitialized)
        ));
    }
}
