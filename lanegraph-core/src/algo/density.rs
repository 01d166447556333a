//! Point density lookups over a precomputed 2D histogram
//!
//! The grid is stored row-major by latitude: `counts[j][i]` holds the number of
//! events in longitude bin `i` and latitude bin `j`.

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Grid layout and lookup defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
    /// Number of bins along longitude and latitude
    pub bins: [usize; 2],
    /// `[[lng_min, lng_max], [lat_min, lat_max]]`
    pub extent: [[f64; 2]; 2],
    /// Default neighbourhood radius in cells
    pub radius: usize,
    /// Density above which a point counts as dangerous
    pub danger_threshold: u64,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            bins: [200, 200],
            extent: [[121.4, 121.6], [24.9, 25.1]],
            radius: 5,
            danger_threshold: 50,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCell {
    count: u64,
}

#[derive(Debug, Clone)]
pub struct DensityGrid {
    config: DensityConfig,
    counts: Vec<Vec<u64>>,
}

impl DensityGrid {
    /// # Errors
    ///
    /// Returns [`Error::InvalidData`] if the grid does not have
    /// `bins[1]` rows of `bins[0]` cells, or the extent is empty.
    pub fn new(config: DensityConfig, counts: Vec<Vec<u64>>) -> Result<Self, Error> {
        let [nx, ny] = config.bins;
        let [[xmin, xmax], [ymin, ymax]] = config.extent;

        if nx == 0 || ny == 0 {
            return Err(Error::InvalidData("Density grid needs at least one bin".into()));
        }
        if !(xmax > xmin && ymax > ymin) {
            return Err(Error::InvalidData(format!(
                "Empty density grid extent {:?}",
                config.extent
            )));
        }
        if counts.len() != ny || counts.iter().any(|row| row.len() != nx) {
            return Err(Error::InvalidData(format!(
                "Density grid shape does not match {nx}x{ny} bins"
            )));
        }

        Ok(Self { config, counts })
    }

    /// Loads a grid stored as JSON rows of `{"count": n}` cells.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if its shape
    /// does not match the configured bins.
    pub fn load(path: &Path, config: DensityConfig) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)?;
        let raw: Vec<Vec<RawCell>> = serde_json::from_str(&contents)?;
        let counts = raw
            .into_iter()
            .map(|row| row.into_iter().map(|cell| cell.count).collect())
            .collect();

        let grid = Self::new(config, counts)?;
        info!(
            "Loaded {}x{} density grid from {}",
            grid.config.bins[0],
            grid.config.bins[1],
            path.display()
        );
        Ok(grid)
    }

    pub fn config(&self) -> &DensityConfig {
        &self.config
    }

    /// `(i, j)` cell of a point, `None` outside the extent.
    ///
    /// The lower edge belongs to the grid, the upper edge does not.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn cell_of(&self, lng: f64, lat: f64) -> Option<(usize, usize)> {
        let [nx, ny] = self.config.bins;
        let [[xmin, xmax], [ymin, ymax]] = self.config.extent;

        let dx = (xmax - xmin) / nx as f64;
        let dy = (ymax - ymin) / ny as f64;

        let i = ((lng - xmin) / dx).floor();
        let j = ((lat - ymin) / dy).floor();

        // NaN fails both comparisons.
        if !(i >= 0.0 && i < nx as f64 && j >= 0.0 && j < ny as f64) {
            return None;
        }
        Some((i as usize, j as usize))
    }

    /// Sum of the cells within `radius` cells of the point's cell in both
    /// axes, clipped to the grid. Points outside the extent have density 0.
    pub fn point_density(&self, lng: f64, lat: f64, radius: usize) -> u64 {
        let Some((i, j)) = self.cell_of(lng, lat) else {
            return 0;
        };
        let [nx, ny] = self.config.bins;

        let rows = j.saturating_sub(radius)..=(j + radius).min(ny - 1);
        let cols = i.saturating_sub(radius)..=(i + radius).min(nx - 1);

        self.counts[rows]
            .iter()
            .map(|row| row[cols.clone()].iter().sum::<u64>())
            .sum()
    }

    /// Density with the configured default radius.
    pub fn density(&self, lng: f64, lat: f64) -> u64 {
        self.point_density(lng, lat, self.config.radius)
    }

    pub fn is_dangerous(&self, lng: f64, lat: f64) -> bool {
        self.density(lng, lat) > self.config.danger_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_grid(value: u64) -> DensityGrid {
        let config = DensityConfig::default();
        let [nx, ny] = config.bins;
        DensityGrid::new(config, vec![vec![value; nx]; ny]).unwrap()
    }

    #[test]
    fn upper_extent_edge_is_outside() {
        let grid = uniform_grid(1);
        assert_eq!(grid.point_density(121.6, 25.0, 0), 0);
        assert_eq!(grid.point_density(121.5, 25.1, 0), 0);
        assert_eq!(grid.point_density(121.6, 25.1, 5), 0);
        assert_eq!(grid.point_density(121.39, 25.0, 5), 0);
        assert_eq!(grid.point_density(f64::NAN, 25.0, 5), 0);
    }

    #[test]
    fn lower_extent_edge_is_inside() {
        let grid = uniform_grid(1);
        assert_eq!(grid.cell_of(121.4, 24.9), Some((0, 0)));
        // Neighbourhood is clipped at the corner: (0..=2) x (0..=2)
        assert_eq!(grid.point_density(121.4, 24.9, 2), 9);
    }

    #[test]
    fn zero_radius_sums_one_cell() {
        let config = DensityConfig::default();
        let [nx, ny] = config.bins;
        let counts = (0..ny)
            .map(|j| (0..nx).map(|i| (j * nx + i) as u64).collect())
            .collect();
        let grid = DensityGrid::new(config, counts).unwrap();

        let (i, j) = grid.cell_of(121.5005, 25.0005).unwrap();
        assert_eq!(grid.point_density(121.5005, 25.0005, 0), (j * nx + i) as u64);
    }

    #[test]
    fn interior_box_neighbourhood() {
        let grid = uniform_grid(2);
        // (2 * 5 + 1)^2 cells of 2
        assert_eq!(grid.density(121.5005, 25.0005), 242);
        assert!(grid.is_dangerous(121.5005, 25.0005));
        assert!(!uniform_grid(0).is_dangerous(121.5005, 25.0005));
    }

    #[test]
    fn shape_is_validated() {
        let config = DensityConfig {
            bins: [2, 3],
            ..DensityConfig::default()
        };
        assert!(DensityGrid::new(config.clone(), vec![vec![0; 2]; 3]).is_ok());
        assert!(matches!(
            DensityGrid::new(config.clone(), vec![vec![0; 3]; 2]),
            Err(Error::InvalidData(_))
        ));
        assert!(DensityGrid::new(config, vec![vec![0; 2], vec![0; 2], vec![0; 1]]).is_err());
    }

    #[test]
    fn loads_json_grid() {
        let path = std::env::temp_dir().join(format!("lanegraph-grid-{}.json", std::process::id()));
        fs::write(
            &path,
            r#"[[{"count": 1}, {"count": 2}], [{"count": 3}, {"count": 4}]]"#,
        )
        .unwrap();
        let config = DensityConfig {
            bins: [2, 2],
            extent: [[0.0, 2.0], [0.0, 2.0]],
            ..DensityConfig::default()
        };

        let grid = DensityGrid::load(&path, config).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(grid.point_density(1.5, 0.5, 0), 2);
        assert_eq!(grid.point_density(0.5, 1.5, 0), 3);
        assert_eq!(grid.point_density(0.5, 0.5, 1), 10);
    }
}
