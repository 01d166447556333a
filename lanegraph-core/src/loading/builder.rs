use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use log::{info, warn};

use super::config::PipelineConfig;
use super::features::read_feature_collection;
use crate::Error;
use crate::matching::run_matching_pipeline;
use crate::model::{Collection, GraphStore};

/// Whether a failing step stops the build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Any failure aborts the remaining steps
    Mandatory,
    /// An unreadable or malformed source skips the step; other failures abort
    Optional,
}

type StepFn<'a> = Box<dyn FnOnce(&mut GraphStore) -> Result<usize, Error> + 'a>;

/// Named unit of the build, returning the number of rows it produced
pub struct Step<'a> {
    pub name: &'static str,
    pub kind: StepKind,
    run: StepFn<'a>,
}

impl<'a> Step<'a> {
    pub fn new(
        name: &'static str,
        kind: StepKind,
        run: impl FnOnce(&mut GraphStore) -> Result<usize, Error> + 'a,
    ) -> Self {
        Self {
            name,
            kind,
            run: Box::new(run),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Steps that ran, with their row counts
    pub completed: Vec<(&'static str, usize)>,
    /// Optional steps skipped because their source was unusable
    pub skipped: Vec<&'static str>,
    /// Whether the graph came from a snapshot instead of the sources
    pub from_snapshot: bool,
}

impl BuildReport {
    pub fn rows(&self, step: &str) -> Option<usize> {
        self.completed
            .iter()
            .find(|(name, _)| *name == step)
            .map(|(_, rows)| *rows)
    }
}

/// Runs `steps` in order against `store`.
///
/// # Errors
///
/// Returns [`Error::PipelineAborted`] naming the first step whose failure
/// is not skippable; later steps do not run.
pub fn run_steps(store: &mut GraphStore, steps: Vec<Step<'_>>) -> Result<BuildReport, Error> {
    let total = steps.len();
    let mut report = BuildReport::default();

    for (idx, step) in steps.into_iter().enumerate() {
        info!("Step {}/{total}: {}", idx + 1, step.name);
        match (step.run)(store) {
            Ok(rows) => {
                info!("Step {} complete ({rows} rows)", step.name);
                report.completed.push((step.name, rows));
            }
            Err(Error::IngestionFailure(reason)) if step.kind == StepKind::Optional => {
                warn!("Skipping step {}: {reason}", step.name);
                report.skipped.push(step.name);
            }
            Err(source) => {
                return Err(Error::PipelineAborted {
                    step: step.name,
                    source: Box::new(source),
                });
            }
        }
    }

    Ok(report)
}

pub const LOAD_ROADS: &str = "load_roads";
pub const ANNOTATE_SIDEWALKS: &str = "annotate_sidewalks";
pub const LOAD_BIKE_LANES: &str = "load_bike_lanes";
pub const MATCH_BIKE_LANES: &str = "match_bike_lanes";

/// Builds the road graph: roads, sidewalk tags, bike lanes, then matching.
///
/// With `skip_init` and an existing snapshot the sources are not read at all.
/// After a full build the snapshot is (re)written when a path is configured.
///
/// # Errors
///
/// Returns [`Error::PipelineAborted`] if a mandatory step fails, or an error
/// reading or writing the snapshot.
pub fn build_graph(
    config: &PipelineConfig,
    abort: Option<Arc<AtomicBool>>,
) -> Result<(GraphStore, BuildReport), Error> {
    if config.skip_init {
        match &config.snapshot_path {
            Some(path) if path.exists() => {
                info!("skip_init set, reusing existing data from {}", path.display());
                let store = GraphStore::open_snapshot(path)?;
                let report = BuildReport {
                    from_snapshot: true,
                    ..BuildReport::default()
                };
                return Ok((store, report));
            }
            _ => warn!("skip_init set but no snapshot is available, building from sources"),
        }
    }

    let mut steps = vec![Step::new(LOAD_ROADS, StepKind::Mandatory, |store| {
        let features = read_feature_collection(&config.roads_path)?;
        let report =
            store.ingest_polylines(Collection::Road, &features, &config.road_name_property)?;
        Ok(report.segments)
    })];

    if let Some(path) = &config.sidewalks_path {
        steps.push(Step::new(ANNOTATE_SIDEWALKS, StepKind::Optional, move |store| {
            let features = read_feature_collection(path)?;
            store.annotate_sidewalks(&features, &config.sidewalk_property)
        }));
    }

    if let Some(path) = &config.bike_path {
        steps.push(Step::new(LOAD_BIKE_LANES, StepKind::Optional, move |store| {
            let features = read_feature_collection(path)?;
            let report =
                store.ingest_polylines(Collection::Bike, &features, &config.bike_name_property)?;
            Ok(report.segments)
        }));
    }

    steps.push(Step::new(MATCH_BIKE_LANES, StepKind::Mandatory, move |store| {
        let outcome = run_matching_pipeline(store, &config.matching, abort)?;
        Ok(outcome.newly_marked())
    }));

    let mut store = GraphStore::in_memory();
    let report = run_steps(&mut store, steps)?;

    if let Some(path) = &config.snapshot_path {
        store.save_snapshot(path)?;
    }

    info!("All graph build steps finished");
    Ok((store, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_ingestion_failures_are_skipped() {
        let mut store = GraphStore::in_memory();
        let steps = vec![
            Step::new("first", StepKind::Mandatory, |_| Ok(3)),
            Step::new("optional", StepKind::Optional, |_| {
                Err(Error::IngestionFailure("missing".into()))
            }),
            Step::new("last", StepKind::Mandatory, |_| Ok(1)),
        ];

        let report = run_steps(&mut store, steps).unwrap();
        assert_eq!(report.completed, vec![("first", 3), ("last", 1)]);
        assert_eq!(report.skipped, vec!["optional"]);
    }

    #[test]
    fn mandatory_failure_stops_later_steps() {
        let mut store = GraphStore::in_memory();
        let mut ran_last = false;
        let steps = vec![
            Step::new("roads", StepKind::Mandatory, |_| {
                Err(Error::IngestionFailure("missing".into()))
            }),
            Step::new("last", StepKind::Mandatory, |_| {
                ran_last = true;
                Ok(0)
            }),
        ];

        let err = run_steps(&mut store, steps).unwrap_err();
        assert!(matches!(err, Error::PipelineAborted { step: "roads", .. }));
        assert!(!ran_last);
    }

    #[test]
    fn optional_step_aborts_on_non_ingestion_error() {
        let mut store = GraphStore::in_memory();
        let steps = vec![Step::new("optional", StepKind::Optional, |_| {
            Err(Error::NotInitialized)
        })];
        assert!(matches!(
            run_steps(&mut store, steps),
            Err(Error::PipelineAborted {
                step: "optional",
                ..
            })
        ));
    }

    #[test]
    fn missing_road_source_aborts_build() {
        let config = PipelineConfig {
            roads_path: "/nonexistent/lanegraph/highway.geojson".into(),
            sidewalks_path: None,
            bike_path: None,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            build_graph(&config, None),
            Err(Error::PipelineAborted {
                step: LOAD_ROADS,
                ..
            })
        ));
    }
}
