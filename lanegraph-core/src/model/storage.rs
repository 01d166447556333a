//! Storage backend behind the graph store
//!
//! A backend only has to apply [`WriteBatch`]es atomically and answer a handful
//! of lookups. [`MemoryStorage`] keeps everything in memory with an R-tree over
//! nodes and an endpoint index per collection.

use hashbrown::{HashMap, HashSet};
use rstar::RTree;
use serde::{Deserialize, Serialize};

use super::components::{Bounds, Collection, Node, NodeKey, Segment, SegmentEndpoints};
use crate::{Error, SegmentId};

/// Single write inside a [`WriteBatch`]
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert a node, ignored if the coordinate already exists
    InsertNode(Node),
    /// Insert a segment, fails the batch on a duplicate id
    InsertSegment(Collection, Segment),
    /// Set the sidewalk tag of every road segment joining the two points
    SetSidewalk { a: Node, b: Node, value: String },
    /// Flag road segments as bike compatible
    SetBikeCompatible(Vec<SegmentId>),
}

/// Ordered writes applied all-or-nothing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

impl FromIterator<WriteOp> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = WriteOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

/// Persistence collaborator of [`GraphStore`](super::GraphStore)
pub trait Storage: Send + Sync {
    /// Applies every write of `batch` or none of them.
    ///
    /// Returns the number of rows changed: newly inserted nodes and
    /// segments, and updated segments whose value actually changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateSegment`] on an id clash, or any backend
    /// error. Nothing from the batch is visible afterwards.
    fn apply(&mut self, batch: WriteBatch) -> Result<usize, Error>;

    fn node_count(&self) -> usize;

    fn segment_count(&self, collection: Collection) -> usize;

    /// Highest segment id in the collection, 0 when empty.
    fn max_segment_id(&self, collection: Collection) -> SegmentId;

    fn nodes_in_bounds(&self, bounds: &Bounds) -> Vec<Node>;

    fn segment(&self, collection: Collection, id: SegmentId) -> Option<Segment>;

    /// Segments with a start or end coordinate among `nodes`, ordered by id.
    fn segments_touching(&self, collection: Collection, nodes: &[Node]) -> Vec<Segment>;

    /// All segments ordered by id.
    fn scan(&self, collection: Collection) -> Vec<Segment>;

    /// Ids and endpoints of all segments ordered by id.
    fn scan_endpoints(&self, collection: Collection) -> Vec<SegmentEndpoints>;

    /// Every stored node.
    fn all_nodes(&self) -> Vec<Node>;

    /// Full content, reloadable with [`MemoryStorage::from_snapshot`].
    fn snapshot(&self) -> StorageSnapshot {
        StorageSnapshot {
            nodes: self.all_nodes(),
            road: self.scan(Collection::Road),
            bike: self.scan(Collection::Bike),
        }
    }
}

#[derive(Debug, Default, Clone)]
struct SegmentTable {
    segments: Vec<Segment>,
    by_id: HashMap<SegmentId, usize>,
    by_endpoint: HashMap<NodeKey, Vec<usize>>,
}

impl SegmentTable {
    fn insert(&mut self, segment: Segment) {
        let idx = self.segments.len();
        self.by_id.insert(segment.id, idx);
        self.by_endpoint.entry(segment.start.key()).or_default().push(idx);
        if segment.end.key() != segment.start.key() {
            self.by_endpoint.entry(segment.end.key()).or_default().push(idx);
        }
        self.segments.push(segment);
    }

    fn indices_touching(&self, key: &NodeKey) -> &[usize] {
        self.by_endpoint
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn sorted_by_id(&self, mut indices: Vec<usize>) -> Vec<Segment> {
        indices.sort_unstable_by_key(|&idx| self.segments[idx].id);
        indices.dedup();
        indices
            .into_iter()
            .map(|idx| self.segments[idx].clone())
            .collect()
    }
}

/// In-memory backend
#[derive(Default)]
pub struct MemoryStorage {
    node_keys: HashSet<NodeKey>,
    node_tree: RTree<Node>,
    road: SegmentTable,
    bike: SegmentTable,
}

/// Serializable content of a [`MemoryStorage`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSnapshot {
    pub nodes: Vec<Node>,
    pub road: Vec<Segment>,
    pub bike: Vec<Segment>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a backend from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateSegment`] if the snapshot repeats an id.
    pub fn from_snapshot(snapshot: StorageSnapshot) -> Result<Self, Error> {
        let mut storage = Self::new();
        let batch = snapshot
            .nodes
            .into_iter()
            .map(WriteOp::InsertNode)
            .chain(
                snapshot
                    .road
                    .into_iter()
                    .map(|segment| WriteOp::InsertSegment(Collection::Road, segment)),
            )
            .chain(
                snapshot
                    .bike
                    .into_iter()
                    .map(|segment| WriteOp::InsertSegment(Collection::Bike, segment)),
            )
            .collect();
        storage.apply(batch)?;
        Ok(storage)
    }

    fn table(&self, collection: Collection) -> &SegmentTable {
        match collection {
            Collection::Road => &self.road,
            Collection::Bike => &self.bike,
        }
    }

    fn table_mut(&mut self, collection: Collection) -> &mut SegmentTable {
        match collection {
            Collection::Road => &mut self.road,
            Collection::Bike => &mut self.bike,
        }
    }

    /// Rejects batches that would insert a duplicate segment id.
    fn validate(&self, batch: &WriteBatch) -> Result<(), Error> {
        let mut pending: HashSet<(Collection, SegmentId)> = HashSet::new();
        for op in batch.ops() {
            if let WriteOp::InsertSegment(collection, segment) = op {
                let clash = self.table(*collection).by_id.contains_key(&segment.id)
                    || !pending.insert((*collection, segment.id));
                if clash {
                    return Err(Error::DuplicateSegment {
                        collection: collection.name(),
                        id: segment.id,
                    });
                }
            }
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn apply(&mut self, batch: WriteBatch) -> Result<usize, Error> {
        self.validate(&batch)?;

        let mut changed = 0;
        for op in batch.ops {
            match op {
                WriteOp::InsertNode(node) => {
                    if self.node_keys.insert(node.key()) {
                        self.node_tree.insert(node);
                        changed += 1;
                    }
                }
                WriteOp::InsertSegment(collection, segment) => {
                    self.table_mut(collection).insert(segment);
                    changed += 1;
                }
                WriteOp::SetSidewalk { a, b, value } => {
                    let table = &mut self.road;
                    let candidates = table.indices_touching(&a.key()).to_vec();
                    for idx in candidates {
                        let segment = &mut table.segments[idx];
                        if segment.connects(&a, &b) && segment.sidewalk.as_deref() != Some(value.as_str()) {
                            segment.sidewalk = Some(value.clone());
                            changed += 1;
                        }
                    }
                }
                WriteOp::SetBikeCompatible(ids) => {
                    for id in ids {
                        if let Some(&idx) = self.road.by_id.get(&id) {
                            let segment = &mut self.road.segments[idx];
                            if !segment.bike_compatible {
                                segment.bike_compatible = true;
                                changed += 1;
                            }
                        }
                    }
                }
            }
        }
        Ok(changed)
    }

    fn node_count(&self) -> usize {
        self.node_keys.len()
    }

    fn segment_count(&self, collection: Collection) -> usize {
        self.table(collection).segments.len()
    }

    fn max_segment_id(&self, collection: Collection) -> SegmentId {
        self.table(collection)
            .segments
            .iter()
            .map(|segment| segment.id)
            .max()
            .unwrap_or(0)
    }

    fn nodes_in_bounds(&self, bounds: &Bounds) -> Vec<Node> {
        if bounds.is_empty() {
            return Vec::new();
        }
        let mut nodes: Vec<Node> = self
            .node_tree
            .locate_in_envelope(&bounds.envelope())
            .copied()
            .collect();
        nodes.sort_by(|a, b| a.lat.total_cmp(&b.lat).then(a.lng.total_cmp(&b.lng)));
        nodes
    }

    fn segment(&self, collection: Collection, id: SegmentId) -> Option<Segment> {
        let table = self.table(collection);
        table.by_id.get(&id).map(|&idx| table.segments[idx].clone())
    }

    fn segments_touching(&self, collection: Collection, nodes: &[Node]) -> Vec<Segment> {
        let table = self.table(collection);
        let indices = nodes
            .iter()
            .flat_map(|node| table.indices_touching(&node.key()).iter().copied())
            .collect();
        table.sorted_by_id(indices)
    }

    fn scan(&self, collection: Collection) -> Vec<Segment> {
        let table = self.table(collection);
        table.sorted_by_id((0..table.segments.len()).collect())
    }

    fn scan_endpoints(&self, collection: Collection) -> Vec<SegmentEndpoints> {
        let mut endpoints: Vec<SegmentEndpoints> = self
            .table(collection)
            .segments
            .iter()
            .map(Segment::endpoints)
            .collect();
        endpoints.sort_unstable_by_key(|segment| segment.id);
        endpoints
    }

    fn all_nodes(&self) -> Vec<Node> {
        self.node_tree.iter().copied().collect()
    }
}
