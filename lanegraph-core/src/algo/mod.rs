//! Geometric building blocks: the 2x2 kernel, bike corridors, the segment
//! matcher and the density grid.

pub mod corridor;
pub mod density;
pub mod geometry;
pub mod matcher;

pub use corridor::{Corridor, DEFAULT_BUFFER_WIDTH};
pub use density::{DensityConfig, DensityGrid};
pub use geometry::{Matrix2, invert2x2, multiply, point_in_quadrilateral, segments_parallel};
pub use matcher::{DEFAULT_SLOPE_TOLERANCE, MatchParams, is_match};
