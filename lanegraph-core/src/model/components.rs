//! Road graph components - nodes, directed segments and query bounds

use std::fmt;

use geo::Coord;
use ordered_float::OrderedFloat;
use rstar::{AABB, RTreeObject};
use serde::{Deserialize, Serialize};

use crate::SegmentId;

/// Deduplicated endpoint of one or more segments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub lat: f64,
    pub lng: f64,
}

/// Hashable identity of a coordinate pair, `0.0` and `-0.0` compare equal.
pub(crate) type NodeKey = (OrderedFloat<f64>, OrderedFloat<f64>);

impl Node {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Planar coordinate with `x` = longitude and `y` = latitude.
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lng,
            y: self.lat,
        }
    }

    pub(crate) fn key(&self) -> NodeKey {
        (OrderedFloat(self.lat), OrderedFloat(self.lng))
    }
}

impl From<Coord<f64>> for Node {
    fn from(coord: Coord<f64>) -> Self {
        Self {
            lat: coord.y,
            lng: coord.x,
        }
    }
}

impl RTreeObject for Node {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

/// The two independent segment collections of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Base road network ("Lines"), optionally annotated with sidewalks
    Road,
    /// Bicycle lanes ("Bike")
    Bike,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Road => "Lines",
            Collection::Bike => "Bike",
        }
    }

    /// Prefix of generated segment names, followed by the segment id.
    pub fn segment_prefix(self) -> &'static str {
        match self {
            Collection::Road => "line",
            Collection::Bike => "bike",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Directed segment between two consecutive polyline points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub name: String,
    /// Name of the source feature the segment was cut from
    pub source_label: Option<String>,
    /// Sidewalk tag of a road segment, absent when unknown or "no"
    pub sidewalk: Option<String>,
    pub start: Node,
    pub end: Node,
    pub bike_compatible: bool,
}

impl Segment {
    pub fn endpoints(&self) -> SegmentEndpoints {
        SegmentEndpoints {
            id: self.id,
            start: self.start,
            end: self.end,
        }
    }

    /// Same endpoint pair, in either direction.
    pub fn connects(&self, a: &Node, b: &Node) -> bool {
        let (start, end) = (self.start.key(), self.end.key());
        (start == a.key() && end == b.key()) || (start == b.key() && end == a.key())
    }
}

/// Minimal projection of a segment used by the matching pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentEndpoints {
    pub id: SegmentId,
    pub start: Node,
    pub end: Node,
}

impl SegmentEndpoints {
    pub fn coords(&self) -> (Coord<f64>, Coord<f64>) {
        (self.start.coord(), self.end.coord())
    }
}

/// Inclusive latitude/longitude rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl Bounds {
    pub fn new(lat_min: f64, lat_max: f64, lng_min: f64, lng_max: f64) -> Self {
        Self {
            lat_min,
            lat_max,
            lng_min,
            lng_max,
        }
    }

    /// Bounds with a minimum above its maximum (or NaN) select nothing.
    pub fn is_empty(&self) -> bool {
        !(self.lat_min <= self.lat_max && self.lng_min <= self.lng_max)
    }

    pub fn contains(&self, node: &Node) -> bool {
        (self.lat_min..=self.lat_max).contains(&node.lat)
            && (self.lng_min..=self.lng_max).contains(&node.lng)
    }

    pub(crate) fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.lng_min, self.lat_min], [self.lng_max, self.lat_max])
    }
}
