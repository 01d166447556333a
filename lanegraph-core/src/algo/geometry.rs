//! Small planar linear algebra used by the corridor containment test.
//!
//! Coordinates are `geo::Coord` with `x` = longitude and `y` = latitude and are
//! treated as planar. Degenerate inputs (zero determinant) are reported through
//! `Option`/`false` rather than errors so that callers scanning many
//! candidates never have to bail out.

use geo::Coord;

use crate::Error;

/// Cross product magnitude below which two direction vectors count as parallel.
pub const PARALLEL_EPSILON: f64 = 8e-7;

pub type Matrix2 = [[f64; 2]; 2];

/// Dense matrix product `a * b`.
///
/// Rows may be any slice-like type, so both `[[f64; 2]; 2]` and
/// `Vec<Vec<f64>>` operands work.
///
/// # Errors
///
/// Returns [`Error::DimensionMismatch`] if either operand is empty or the
/// column count of `a` differs from the row count of `b`.
pub fn multiply<A, B>(a: &[A], b: &[B]) -> Result<Vec<Vec<f64>>, Error>
where
    A: AsRef<[f64]>,
    B: AsRef<[f64]>,
{
    let left_cols = a.first().map_or(0, |row| row.as_ref().len());
    let right_cols = b.first().map_or(0, |row| row.as_ref().len());

    let ragged = a.iter().any(|row| row.as_ref().len() != left_cols)
        || b.iter().any(|row| row.as_ref().len() != right_cols);

    if left_cols == 0 || right_cols == 0 || left_cols != b.len() || ragged {
        return Err(Error::DimensionMismatch {
            left_rows: a.len(),
            left_cols,
            right_rows: b.len(),
            right_cols,
        });
    }

    let product: Vec<Vec<f64>> = a
        .iter()
        .map(|row| {
            let row = row.as_ref();
            (0..right_cols)
                .map(|j| {
                    row.iter()
                        .zip(b)
                        .map(|(value, b_row)| value * b_row.as_ref()[j])
                        .sum::<f64>()
                })
                .collect()
        })
        .collect();

    Ok(product)
}

/// Inverse of a 2x2 matrix, `None` when the determinant is exactly zero.
pub fn invert2x2(m: &Matrix2) -> Option<Matrix2> {
    let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
    if det == 0.0 {
        return None;
    }
    let inv_det = 1.0 / det;
    Some([
        [m[1][1] * inv_det, -m[0][1] * inv_det],
        [-m[1][0] * inv_det, m[0][0] * inv_det],
    ])
}

/// Tests whether `point` lies inside the quadrilateral spanned by
/// `[east, north, south, west]`, boundary included.
///
/// `south` is the origin of a local frame with basis `u = west - south` and
/// `v = east - south`; the point is inside iff both of its coordinates in that
/// frame fall within `[0, 1]`. A non-invertible basis (collinear corners)
/// contains nothing.
pub fn point_in_quadrilateral(corners: &[Coord<f64>; 4], point: Coord<f64>) -> bool {
    let [east, _north, south, west] = *corners;

    let u = west - south;
    let v = east - south;
    let basis = [[u.x, v.x], [u.y, v.y]];

    let Some(inverse) = invert2x2(&basis) else {
        return false;
    };

    let relative = point - south;
    let (m, n) = match multiply(&inverse, &[[relative.x], [relative.y]]) {
        Ok(coords) => (coords[0][0], coords[1][0]),
        Err(_) => return false,
    };

    (0.0..=1.0).contains(&m) && (0.0..=1.0).contains(&n)
}

/// True when segments `a1 -> a2` and `b1 -> b2` have (almost) parallel
/// directions, regardless of orientation or length.
pub fn segments_parallel(a1: Coord<f64>, a2: Coord<f64>, b1: Coord<f64>, b2: Coord<f64>) -> bool {
    let a = a2 - a1;
    let b = b2 - b1;
    (a.x * b.y - a.y * b.x).abs() < PARALLEL_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    const TOLERANCE: f64 = 1e-9;

    fn unit_square() -> [Coord<f64>; 4] {
        // east, north, south, west
        [
            coord! { x: 1.0, y: 0.0 },
            coord! { x: 1.0, y: 1.0 },
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 0.0, y: 1.0 },
        ]
    }

    #[test]
    fn multiply_produces_rows_of_left_by_cols_of_right() {
        let a = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let b = vec![vec![7.0], vec![8.0], vec![9.0]];
        let product = multiply(&a, &b).unwrap();
        assert_eq!(product, vec![vec![50.0], vec![122.0]]);
    }

    #[test]
    fn multiply_rejects_incompatible_operands() {
        let a = [[1.0, 2.0], [3.0, 4.0]];
        let b = [[1.0, 2.0, 3.0]];
        assert!(matches!(
            multiply(&a, &b),
            Err(Error::DimensionMismatch {
                left_cols: 2,
                right_rows: 1,
                ..
            })
        ));

        let empty: [[f64; 2]; 0] = [];
        assert!(multiply(&empty, &a).is_err());
        assert!(multiply(&a, &empty).is_err());
    }

    #[test]
    fn inverse_round_trips_to_identity() {
        for m in [
            [[2.0, 1.0], [1.0, 3.0]],
            [[0.0005, -10.0], [7.25, 0.001]],
            [[-4.0, 0.5], [3.0, 2.0]],
        ] {
            let inverse = invert2x2(&m).unwrap();
            for product in [multiply(&inverse, &m).unwrap(), multiply(&m, &inverse).unwrap()] {
                for (i, row) in product.iter().enumerate() {
                    for (j, value) in row.iter().enumerate() {
                        let expected = if i == j { 1.0 } else { 0.0 };
                        assert!((value - expected).abs() < TOLERANCE, "{product:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        assert!(invert2x2(&[[1.0, 2.0], [2.0, 4.0]]).is_none());
        assert!(invert2x2(&[[0.0, 0.0], [0.0, 0.0]]).is_none());
        // Tiny but non-zero determinants still invert.
        assert!(invert2x2(&[[1e-200, 0.0], [0.0, 1e-100]]).is_some());
    }

    #[test]
    fn corners_are_inside() {
        let square = unit_square();
        for corner in square {
            assert!(point_in_quadrilateral(&square, corner), "{corner:?}");
        }
    }

    #[test]
    fn interior_and_exterior_points() {
        let square = unit_square();
        assert!(point_in_quadrilateral(&square, coord! { x: 0.5, y: 0.5 }));
        assert!(point_in_quadrilateral(&square, coord! { x: 0.0, y: 0.3 }));
        assert!(!point_in_quadrilateral(&square, coord! { x: 1.5, y: 0.5 }));
        assert!(!point_in_quadrilateral(&square, coord! { x: 0.5, y: -0.01 }));
    }

    #[test]
    fn collinear_corners_contain_nothing() {
        let line = [
            coord! { x: 2.0, y: 2.0 },
            coord! { x: 3.0, y: 3.0 },
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 1.0, y: 1.0 },
        ];
        assert!(!point_in_quadrilateral(&line, coord! { x: 0.0, y: 0.0 }));
        assert!(!point_in_quadrilateral(&line, coord! { x: 1.0, y: 1.0 }));
    }

    #[test]
    fn parallel_detection_ignores_orientation() {
        let a1 = coord! { x: 0.0, y: 0.0 };
        let a2 = coord! { x: 1.0, y: 1.0 };
        assert!(segments_parallel(a1, a2, coord! { x: 5.0, y: 2.0 }, coord! { x: 3.0, y: 0.0 }));
        assert!(!segments_parallel(a1, a2, coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 0.0 }));
    }
}
