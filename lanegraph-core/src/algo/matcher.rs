//! Decides whether a road segment runs along a bike lane segment

use geo::Coord;
use serde::{Deserialize, Serialize};

use super::corridor::{Corridor, DEFAULT_BUFFER_WIDTH};

/// Default relative tolerance on the slope ratio.
pub const DEFAULT_SLOPE_TOLERANCE: f64 = 0.1;

/// Geometric parameters of the road/bike lane match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchParams {
    /// Corridor half-width in coordinate degrees
    pub buffer_width: f64,
    /// Maximum `|road_slope / bike_slope - 1|`
    pub slope_tolerance: f64,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            buffer_width: DEFAULT_BUFFER_WIDTH,
            slope_tolerance: DEFAULT_SLOPE_TOLERANCE,
        }
    }
}

/// `dx / dy` of a segment, where `x` is longitude and `y` latitude.
///
/// Segments with no latitude change produce an infinite value, zero-length
/// segments produce NaN.
pub fn slope(start: Coord<f64>, end: Coord<f64>) -> f64 {
    (start.x - end.x) / (start.y - end.y)
}

/// Whether two slopes are within `tolerance` of each other, relative to
/// `reference`.
///
/// Identical slopes always agree. Two horizontal segments agree whichever
/// way they were drawn, as their slopes are both infinite. Any other infinite
/// or NaN ratio fails the comparison.
pub fn slopes_similar(slope: f64, reference: f64, tolerance: f64) -> bool {
    if slope == reference || (slope.is_infinite() && reference.is_infinite()) {
        return true;
    }
    ((slope / reference) - 1.0).abs() < tolerance
}

/// Road segment fully inside an already built corridor with a similar slope.
pub fn matches_corridor(
    road: (Coord<f64>, Coord<f64>),
    corridor: &Corridor,
    bike_slope: f64,
    slope_tolerance: f64,
) -> bool {
    let (start, end) = road;
    corridor.contains(start)
        && corridor.contains(end)
        && slopes_similar(slope(start, end), bike_slope, slope_tolerance)
}

/// Road segment `road` is covered by the bike segment `bike`.
pub fn is_match(road: (Coord<f64>, Coord<f64>), bike: (Coord<f64>, Coord<f64>), params: &MatchParams) -> bool {
    let Some(corridor) = Corridor::around(bike.0, bike.1, params.buffer_width) else {
        return false;
    };
    matches_corridor(road, &corridor, slope(bike.0, bike.1), params.slope_tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    fn seg(x1: f64, y1: f64, x2: f64, y2: f64) -> (Coord<f64>, Coord<f64>) {
        (coord! { x: x1, y: y1 }, coord! { x: x2, y: y2 })
    }

    #[test]
    fn parallel_segment_inside_buffer_matches() {
        let bike = seg(0.0, 0.0, 10.0, 0.0);
        assert!(is_match(seg(0.0, 0.0001, 10.0, 0.0001), bike, &MatchParams::default()));
    }

    #[test]
    fn distant_segment_does_not_match() {
        let bike = seg(0.0, 0.0, 10.0, 0.0);
        assert!(!is_match(seg(0.0, 5.0, 10.0, 5.0), bike, &MatchParams::default()));
    }

    #[test]
    fn diagonal_segment_inside_buffer_matches() {
        let bike = seg(121.50, 25.00, 121.51, 25.01);
        let road = seg(121.501, 25.0011, 121.509, 25.0091);
        assert!(is_match(road, bike, &MatchParams::default()));
        // Reversed direction has the same slope.
        assert!(is_match((road.1, road.0), bike, &MatchParams::default()));
    }

    #[test]
    fn crossing_segment_inside_wide_buffer_fails_slope_check() {
        let bike = seg(0.0, 0.0, 1.0, 1.0);
        let road = seg(0.45, 0.55, 0.55, 0.45);
        let params = MatchParams {
            buffer_width: 0.5,
            ..MatchParams::default()
        };
        assert!(!is_match(road, bike, &params));
    }

    #[test]
    fn degenerate_slopes_resolve_to_booleans() {
        let bike = seg(0.0, 0.0, 1.0, 1.0);
        let params = MatchParams {
            buffer_width: 1.0,
            ..MatchParams::default()
        };
        // No latitude change: infinite slope against a finite one.
        assert!(!is_match(seg(0.4, 0.5, 0.6, 0.5), bike, &params));
        // No longitude change: zero slope against a finite one.
        assert!(!is_match(seg(0.5, 0.4, 0.5, 0.6), bike, &params));
        // Zero-length road segment: NaN slope.
        assert!(!is_match(seg(0.5, 0.5, 0.5, 0.5), bike, &params));

        // Horizontal road drawn against a horizontal bike lane.
        let east_bound = seg(0.0, 0.0, 10.0, 0.0);
        assert!(is_match(seg(10.0, 0.0001, 0.0, 0.0001), east_bound, &MatchParams::default()));
        assert!(is_match(seg(9.0, -0.0001, 1.0, -0.0001), east_bound, &MatchParams::default()));
        assert!(slopes_similar(f64::INFINITY, f64::NEG_INFINITY, 0.1));
        assert!(!slopes_similar(f64::NAN, f64::INFINITY, 0.1));

        let north_bound = seg(0.0, 0.0, 0.0, 10.0);
        assert!(is_match(seg(0.0001, 1.0, 0.0001, 9.0), north_bound, &MatchParams::default()));
        assert!(!is_match(seg(0.0001, 1.0, 0.0002, 1.0), north_bound, &MatchParams::default()));
    }

    #[test]
    fn zero_length_bike_segment_never_matches() {
        let bike = seg(1.0, 1.0, 1.0, 1.0);
        assert!(!is_match(seg(1.0, 1.0, 1.0, 1.0), bike, &MatchParams::default()));
    }

    #[test]
    fn slope_tolerance_is_relative() {
        assert!(slopes_similar(1.05, 1.0, 0.1));
        assert!(!slopes_similar(1.2, 1.0, 0.1));
        assert!(!slopes_similar(f64::NAN, 1.0, 0.1));
        assert!(!slopes_similar(1.0, 0.0, 0.1));
        assert!(slopes_similar(f64::INFINITY, f64::INFINITY, 0.1));
    }
}
