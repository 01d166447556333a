//! Buffered rectangle around a directed bike segment

use geo::Coord;

use super::geometry::point_in_quadrilateral;

/// Default half-width of a corridor, in coordinate degrees.
pub const DEFAULT_BUFFER_WIDTH: f64 = 0.0005;

/// Rectangle around a segment, labelled the way
/// [`point_in_quadrilateral`] expects its corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corridor {
    pub east: Coord<f64>,
    pub north: Coord<f64>,
    pub south: Coord<f64>,
    pub west: Coord<f64>,
}

impl Corridor {
    /// Builds the corridor of half-width `buffer_width` around `start -> end`.
    ///
    /// Returns `None` for a zero-length segment, which has no perpendicular.
    pub fn around(start: Coord<f64>, end: Coord<f64>, buffer_width: f64) -> Option<Self> {
        let direction = end - start;
        let perpendicular = Coord {
            x: -direction.y,
            y: direction.x,
        };
        let length = (perpendicular.x * perpendicular.x + perpendicular.y * perpendicular.y).sqrt();
        if length == 0.0 {
            return None;
        }

        let offset = perpendicular / length * buffer_width;

        // start - o / end - o / end + o / start + o, relabelled so that
        // `south` is the origin and west/east span the two basis vectors.
        Some(Self {
            east: end - offset,
            north: start - offset,
            south: end + offset,
            west: start + offset,
        })
    }

    pub fn corners(&self) -> [Coord<f64>; 4] {
        [self.east, self.north, self.south, self.west]
    }

    pub fn contains(&self, point: Coord<f64>) -> bool {
        point_in_quadrilateral(&self.corners(), point)
    }

    /// Axis-aligned envelope `([min_x, min_y], [max_x, max_y])`.
    pub fn envelope(&self) -> ([f64; 2], [f64; 2]) {
        let corners = self.corners();
        let mut min = [f64::INFINITY; 2];
        let mut max = [f64::NEG_INFINITY; 2];
        for corner in corners {
            min[0] = min[0].min(corner.x);
            min[1] = min[1].min(corner.y);
            max[0] = max[0].max(corner.x);
            max[1] = max[1].max(corner.y);
        }
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    #[test]
    fn zero_length_segment_has_no_corridor() {
        let p = coord! { x: 121.5, y: 25.0 };
        assert!(Corridor::around(p, p, DEFAULT_BUFFER_WIDTH).is_none());
    }

    #[test]
    fn corners_are_offset_perpendicular() {
        let corridor = Corridor::around(
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 10.0, y: 0.0 },
            DEFAULT_BUFFER_WIDTH,
        )
        .unwrap();

        assert_eq!(corridor.east, coord! { x: 10.0, y: -0.0005 });
        assert_eq!(corridor.north, coord! { x: 0.0, y: -0.0005 });
        assert_eq!(corridor.south, coord! { x: 10.0, y: 0.0005 });
        assert_eq!(corridor.west, coord! { x: 0.0, y: 0.0005 });
    }

    #[test]
    fn midpoint_is_always_inside() {
        let segments = [
            (coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 0.0 }),
            (coord! { x: 121.5, y: 25.0 }, coord! { x: 121.51, y: 25.013 }),
            (coord! { x: 3.0, y: 7.0 }, coord! { x: 3.0, y: -2.0 }),
            (coord! { x: -1.0, y: 1.0 }, coord! { x: 2.0, y: -0.5 }),
        ];
        for width in [1e-6, DEFAULT_BUFFER_WIDTH, 0.5] {
            for (start, end) in segments {
                let corridor = Corridor::around(start, end, width).unwrap();
                let midpoint = (start + end) / 2.0;
                assert!(corridor.contains(midpoint), "{start:?} -> {end:?} @ {width}");
            }
        }
    }

    #[test]
    fn points_beyond_the_buffer_are_outside() {
        let corridor = Corridor::around(
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 10.0, y: 0.0 },
            DEFAULT_BUFFER_WIDTH,
        )
        .unwrap();
        assert!(corridor.contains(coord! { x: 5.0, y: 0.0004 }));
        assert!(!corridor.contains(coord! { x: 5.0, y: 0.0006 }));
        assert!(!corridor.contains(coord! { x: 10.1, y: 0.0 }));
        assert!(!corridor.contains(coord! { x: -0.1, y: 0.0 }));
    }

    #[test]
    fn envelope_covers_all_corners() {
        let corridor = Corridor::around(
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 1.0, y: 1.0 },
            0.1,
        )
        .unwrap();
        let (min, max) = corridor.envelope();
        for corner in corridor.corners() {
            assert!(corner.x >= min[0] && corner.x <= max[0]);
            assert!(corner.y >= min[1] && corner.y <= max[1]);
        }
    }
}
