//! Graph store handle: ingestion, spatial queries and the bike flag write-back

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use geojson::FeatureCollection;
use itertools::Itertools;
use log::{debug, info};

use super::batch::{ChunkOptions, ChunkReport, write_in_chunks};
use super::components::{Bounds, Collection, Node, Segment, SegmentEndpoints};
use super::storage::{MemoryStorage, Storage, StorageSnapshot, WriteBatch, WriteOp};
use crate::loading::features::{polylines, property_string, sidewalk_value};
use crate::{Error, SegmentId};

/// Outcome of loading one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub features: usize,
    pub segments: usize,
    /// Nodes that did not exist before
    pub new_nodes: usize,
}

/// Owner of the node and segment collections
///
/// Every query goes through this handle; there is no global connection. Read
/// operations require the road collection to have been loaded (or a snapshot
/// to have been opened) and fail with [`Error::NotInitialized`] before that.
pub struct GraphStore {
    storage: Box<dyn Storage>,
    initialized: bool,
}

impl GraphStore {
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self {
            storage,
            initialized: false,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()))
    }

    /// Opens a store previously written by [`GraphStore::save_snapshot`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains duplicate ids.
    pub fn open_snapshot(path: &Path) -> Result<Self, Error> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: StorageSnapshot = serde_json::from_reader(reader)?;
        let storage = MemoryStorage::from_snapshot(snapshot)?;
        info!(
            "Opened snapshot {}: {} nodes, {} road segments, {} bike segments",
            path.display(),
            storage.node_count(),
            storage.segment_count(Collection::Road),
            storage.segment_count(Collection::Bike)
        );
        Ok(Self {
            storage: Box::new(storage),
            initialized: true,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), Error> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &self.storage.snapshot())?;
        info!("Saved snapshot to {}", path.display());
        Ok(())
    }

    /// Releases the backend.
    pub fn close(self) {
        info!(
            "Closing graph store ({} nodes, {} road segments)",
            self.storage.node_count(),
            self.storage.segment_count(Collection::Road)
        );
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ensure_initialized(&self) -> Result<&dyn Storage, Error> {
        if self.initialized {
            Ok(self.storage.as_ref())
        } else {
            Err(Error::NotInitialized)
        }
    }

    pub fn node_count(&self) -> usize {
        self.storage.node_count()
    }

    pub fn segment_count(&self, collection: Collection) -> usize {
        self.storage.segment_count(collection)
    }

    /// Cuts every `LineString` feature into consecutive-point segments and
    /// stores them, together with their endpoints, as one atomic batch.
    ///
    /// Ids continue after the highest id already in the collection. Loading
    /// the road collection marks the store as initialized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IngestionFailure`] for malformed geometry and
    /// [`Error::DuplicateSegment`] on an id clash. Nothing is stored then.
    pub fn ingest_polylines(
        &mut self,
        collection: Collection,
        features: &FeatureCollection,
        name_property: &str,
    ) -> Result<IngestReport, Error> {
        let lines = polylines(features)?;
        let nodes_before = self.storage.node_count();

        let mut batch = WriteBatch::new();
        let mut next_id = self.storage.max_segment_id(collection) + 1;
        let mut segments = 0;

        for line in &lines {
            let label = property_string(line.feature, name_property);
            for node in &line.nodes {
                batch.push(WriteOp::InsertNode(*node));
            }
            for (start, end) in line.nodes.iter().tuple_windows() {
                batch.push(WriteOp::InsertSegment(
                    collection,
                    Segment {
                        id: next_id,
                        name: format!("{}{next_id}", collection.segment_prefix()),
                        source_label: label.clone(),
                        sidewalk: None,
                        start: *start,
                        end: *end,
                        bike_compatible: false,
                    },
                ));
                next_id += 1;
                segments += 1;
            }
        }

        self.storage.apply(batch)?;
        if collection == Collection::Road {
            self.initialized = true;
        }

        let report = IngestReport {
            features: lines.len(),
            segments,
            new_nodes: self.storage.node_count() - nodes_before,
        };
        info!(
            "Inserted {} {} segments from {} LineString features",
            report.segments, collection, report.features
        );
        Ok(report)
    }

    /// Copies the sidewalk tag of walk geometry onto road segments with the
    /// same endpoint pair, in either direction.
    ///
    /// Features without a tag, tagged `"no"`, or without a matching road
    /// segment are skipped. Returns the number of updated segments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before the road collection is
    /// loaded, or [`Error::IngestionFailure`] for malformed geometry.
    pub fn annotate_sidewalks(
        &mut self,
        features: &FeatureCollection,
        sidewalk_property: &str,
    ) -> Result<usize, Error> {
        self.ensure_initialized()?;

        let batch: WriteBatch = polylines(features)?
            .into_iter()
            .filter_map(|line| {
                sidewalk_value(line.feature, sidewalk_property).map(|value| (line.nodes, value))
            })
            .flat_map(|(nodes, value)| {
                nodes
                    .into_iter()
                    .tuple_windows()
                    .map(|(a, b)| WriteOp::SetSidewalk {
                        a,
                        b,
                        value: value.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        let lookups = batch.len();
        let updated = self.storage.apply(batch)?;
        info!("Sidewalk update complete: {updated} segments updated from {lookups} walk segments");
        Ok(updated)
    }

    /// Nodes with both coordinates inside the inclusive bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before ingestion.
    pub fn find_nodes_in_bounds(&self, bounds: &Bounds) -> Result<Vec<Node>, Error> {
        Ok(self.ensure_initialized()?.nodes_in_bounds(bounds))
    }

    /// Road segments whose start or end is one of the nodes in `bounds`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before ingestion.
    pub fn find_segments_touching_nodes_in_bounds(
        &self,
        bounds: &Bounds,
    ) -> Result<Vec<Segment>, Error> {
        let storage = self.ensure_initialized()?;
        let nodes = storage.nodes_in_bounds(bounds);
        Ok(storage.segments_touching(Collection::Road, &nodes))
    }

    /// Road segments sharing an endpoint with segment `id`, the segment itself
    /// included. Unknown ids yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before ingestion.
    pub fn find_segments_adjacent_to(&self, id: SegmentId) -> Result<Vec<Segment>, Error> {
        let storage = self.ensure_initialized()?;
        let Some(target) = storage.segment(Collection::Road, id) else {
            debug!("Adjacency lookup for unknown segment {id}");
            return Ok(Vec::new());
        };
        Ok(storage.segments_touching(Collection::Road, &[target.start, target.end]))
    }

    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before ingestion.
    pub fn all_road_segments(&self) -> Result<Vec<Segment>, Error> {
        Ok(self.ensure_initialized()?.scan(Collection::Road))
    }

    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before ingestion.
    pub fn fetch_all_road_segments(&self) -> Result<Vec<SegmentEndpoints>, Error> {
        Ok(self.ensure_initialized()?.scan_endpoints(Collection::Road))
    }

    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before ingestion.
    pub fn fetch_all_bike_segments(&self) -> Result<Vec<SegmentEndpoints>, Error> {
        Ok(self.ensure_initialized()?.scan_endpoints(Collection::Bike))
    }

    /// Flags road segments as bike compatible in atomic chunks.
    ///
    /// Returns the per-chunk report; already flagged and unknown ids do not
    /// count as changed rows.
    ///
    /// # Errors
    ///
    /// See [`write_in_chunks`].
    pub fn set_bike_compatible(
        &mut self,
        ids: &[SegmentId],
        options: &ChunkOptions,
    ) -> Result<ChunkReport, Error> {
        self.ensure_initialized()?;
        info!(
            "Marking {} road segments as bike lanes in chunks of {}",
            ids.len(),
            options.chunk_size
        );
        let report = write_in_chunks(self.storage.as_mut(), ids, options)?;
        info!(
            "Marked {} segments as bike lanes in {} chunks",
            report.total_rows(),
            report.chunks()
        );
        Ok(report)
    }
}
