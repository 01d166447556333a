use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use lanegraph_core::algo::DensityConfig;
use lanegraph_core::loading::PipelineConfig;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(author, version, about = "HTTP API over the lane graph", long_about = None)]
pub struct Args {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Address to listen on, overrides the file
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Reuse the saved snapshot instead of rebuilding the graph
    #[arg(long)]
    pub skip_init: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Requests served at the same time
    pub max_concurrent_requests: usize,
    /// Accident density grid; `/interact` is unavailable without it
    pub density_path: Option<PathBuf>,
    pub density: DensityConfig,
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5121)),
            max_concurrent_requests: 256,
            density_path: None,
            density: DensityConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// File configuration (or defaults) with the command line applied on top.
    pub fn from_args(args: &Args) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = match &args.config {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::load(path)?
            }
            None => {
                tracing::info!("Using default configuration");
                Self::default()
            }
        };

        if let Some(bind) = args.bind {
            config.bind = bind;
        }
        if args.skip_init {
            config.pipeline.skip_init = true;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            bind = "0.0.0.0:8080"
            density_path = "grid.json"

            [pipeline]
            roads_path = "data/highway.geojson"
            snapshot_path = "data/graph.json"

            [pipeline.matching]
            chunk_retries = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.bind, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.density_path, Some(PathBuf::from("grid.json")));
        assert_eq!(config.density.danger_threshold, 50);
        assert_eq!(config.pipeline.roads_path, PathBuf::from("data/highway.geojson"));
        assert_eq!(config.pipeline.bike_name_property, "路段名稱");
        assert_eq!(config.pipeline.matching.chunk_retries, 2);
        assert_eq!(config.pipeline.matching.chunk_size, 900);
        assert!(!config.pipeline.skip_init);
    }

    #[test]
    fn command_line_overrides_file() {
        let args = Args::parse_from(["lanegraph-server", "--bind", "0.0.0.0:9000", "--skip-init"]);
        let config = ServerConfig::from_args(&args).unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert!(config.pipeline.skip_init);
        assert_eq!(config.bind.to_string(), "0.0.0.0:9000");
    }
}
