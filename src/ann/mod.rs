//! First-party approximate nearest neighbor engine (HNSW family).
//!
//! Implements the operation table of spec §4.3: `init`, `add`, `set_ef`,
//! `query`, `resize`, `mark_deleted`, `get_items`, `get_ids`, the metadata
//! readers, and opaque `save`/`load`. One `AnnIndex` instance backs one
//! `IndexWrapper` (`crate::index`); all methods here are synchronous and
//! CPU-bound — callers are responsible for offloading them to a worker
//! thread (spec §5).

pub mod distance;

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::io;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

pub use distance::Space;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum AnnError {
    #[error("already initialized")]
    AlreadyInitialized,
    #[error("not initialized")]
    NotInitialized,
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("capacity exceeded: would be {would_be}, max {max}")]
    CapacityExceeded { would_be: usize, max: usize },
    #[error("unknown label {0}")]
    UnknownLabel(i64),
}

#[derive(Clone, Serialize, Deserialize)]
struct Node {
    label: i64,
    vector: Vec<f32>,
    /// neighbor lists, one per layer this node participates in
    links: Vec<Vec<usize>>,
    deleted: bool,
}

/// Opaque, serializable graph state — what `save`/`load` persist.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    space: Space,
    dim: usize,
    m: usize,
    ef_construction: usize,
    ef: usize,
    max_elements: usize,
    entry_point: Option<usize>,
    nodes: Vec<Node>,
    label_to_internal: HashMap<i64, usize>,
}

/// A single HNSW-style graph. Internal ids are dense `Vec` indices; labels
/// are the caller-facing integer ids (spec's "label").
pub struct AnnIndex {
    space: Space,
    dim: usize,
    m: usize,
    ef_construction: usize,
    ef: usize,
    max_elements: usize,
    entry_point: Option<usize>,
    nodes: Vec<Node>,
    label_to_internal: HashMap<i64, usize>,
    initialized: bool,
}

const DEFAULT_EF: usize = 10;
/// hnswlib's `level_mult` default: `1 / ln(M)`.
fn level_mult(m: usize) -> f64 {
    1.0 / (m.max(2) as f64).ln()
}

impl AnnIndex {
    /// A created-but-uninitialized wrapper: `M == 0` per spec invariant I3.
    pub fn new(space: Space, dim: usize) -> Self {
        Self {
            space,
            dim,
            m: 0,
            ef_construction: 0,
            ef: DEFAULT_EF,
            max_elements: 0,
            entry_point: None,
            nodes: Vec::new(),
            label_to_internal: HashMap::new(),
            initialized: false,
        }
    }

    pub fn space(&self) -> Space {
        self.space
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn ef(&self) -> usize {
        self.ef
    }

    pub fn ef_construction(&self) -> usize {
        self.ef_construction
    }

    pub fn max_elements(&self) -> usize {
        self.max_elements
    }

    pub fn current_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn init(&mut self, max_elements: usize, ef_construction: usize, m: usize) -> Result<(), AnnError> {
        if self.initialized {
            return Err(AnnError::AlreadyInitialized);
        }
        self.max_elements = max_elements;
        self.ef_construction = ef_construction;
        self.m = m;
        self.initialized = true;
        Ok(())
    }

    pub fn set_ef(&mut self, n: usize) -> Result<(), AnnError> {
        self.require_initialized()?;
        self.ef = n;
        Ok(())
    }

    pub fn resize(&mut self, new_capacity: usize) -> Result<(), AnnError> {
        self.require_initialized()?;
        self.max_elements = new_capacity;
        Ok(())
    }

    pub fn add(&mut self, data: &[Vec<f32>], ids: &[i64]) -> Result<(), AnnError> {
        self.require_initialized()?;
        let would_be = self.nodes.len() + data.len();
        if would_be > self.max_elements {
            return Err(AnnError::CapacityExceeded { would_be, max: self.max_elements });
        }
        for row in data {
            if row.len() != self.dim {
                return Err(AnnError::DimensionMismatch { expected: self.dim, got: row.len() });
            }
        }

        let mut rng = rand::thread_rng();
        for (row, &label) in data.iter().zip(ids.iter()) {
            self.insert_one(row.clone(), label, &mut rng);
        }
        Ok(())
    }

    fn insert_one(&mut self, vector: Vec<f32>, label: i64, rng: &mut impl Rng) {
        let internal = self.nodes.len();
        let level = Self::random_level(self.m, rng);

        let node = Node { label, vector, links: vec![Vec::new(); level + 1], deleted: false };
        self.nodes.push(node);
        self.label_to_internal.insert(label, internal);

        let entry = match self.entry_point {
            None => {
                self.entry_point = Some(internal);
                return;
            }
            Some(e) => e,
        };

        let top_layer = self.nodes[entry].links.len() - 1;
        let mut cur = entry;

        for layer in (level + 1..=top_layer).rev() {
            cur = self.greedy_closest(cur, internal, layer);
        }

        for layer in (0..=level.min(top_layer)).rev() {
            let candidates = self.search_layer(internal, cur, self.ef_construction.max(1), layer);
            let neighbors = Self::select_neighbors(&candidates, self.m);
            for &n in &neighbors {
                self.connect(internal, n, layer);
                self.connect(n, internal, layer);
            }
            if let Some(&(best, _)) = candidates.first() {
                cur = best;
            }
        }

        if level > top_layer {
            self.entry_point = Some(internal);
        }
    }

    fn random_level(m: usize, rng: &mut impl Rng) -> usize {
        if m < 2 {
            return 0;
        }
        let r: f64 = rng.gen_range(0.0..1.0);
        (-r.ln() * level_mult(m)).floor() as usize
    }

    fn connect(&mut self, from: usize, to: usize, layer: usize) {
        let links = &mut self.nodes[from].links;
        if layer >= links.len() {
            return;
        }
        if !links[layer].contains(&to) {
            links[layer].push(to);
        }
        if links[layer].len() > self.m.max(1) * 2 {
            let keep = self.m.max(1) * 2;
            let vector = self.nodes[from].vector.clone();
            let space = self.space;
            let mut scored: Vec<(usize, f32)> = self.nodes[from].links[layer]
                .iter()
                .map(|&id| (id, space.distance(&vector, &self.nodes[id].vector)))
                .collect();
            scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
            scored.truncate(keep);
            self.nodes[from].links[layer] = scored.into_iter().map(|(id, _)| id).collect();
        }
    }

    fn greedy_closest(&self, from: usize, target: usize, layer: usize) -> usize {
        let mut cur = from;
        let target_vec = &self.nodes[target].vector;
        loop {
            let mut improved = false;
            let cur_dist = self.space.distance(&self.nodes[cur].vector, target_vec);
            let mut best = (cur, cur_dist);
            if layer < self.nodes[cur].links.len() {
                for &nb in &self.nodes[cur].links[layer] {
                    let d = self.space.distance(&self.nodes[nb].vector, target_vec);
                    if d < best.1 {
                        best = (nb, d);
                        improved = true;
                    }
                }
            }
            if !improved {
                return cur;
            }
            cur = best.0;
        }
    }

    /// Best-first search within one layer, returning `(internal_id, distance)`
    /// candidates sorted ascending, closest first.
    fn search_layer(&self, query_internal: usize, entry: usize, ef: usize, layer: usize) -> Vec<(usize, f32)> {
        let query_vec = self.nodes[query_internal].vector.clone();
        self.search_layer_vec(&query_vec, entry, ef, layer)
    }

    fn search_layer_vec(&self, query_vec: &[f32], entry: usize, ef: usize, layer: usize) -> Vec<(usize, f32)> {
        #[derive(PartialEq)]
        struct Scored(f32, usize);
        impl Eq for Scored {}
        impl Ord for Scored {
            fn cmp(&self, other: &Self) -> Ordering {
                other.0.partial_cmp(&self.0).unwrap_or(Ordering::Equal)
            }
        }
        impl PartialOrd for Scored {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        let mut visited = HashSet::new();
        visited.insert(entry);
        let entry_dist = self.space.distance(query_vec, &self.nodes[entry].vector);

        let mut candidates = BinaryHeap::new();
        candidates.push(Scored(entry_dist, entry));
        let mut results: Vec<(usize, f32)> = vec![(entry, entry_dist)];

        while let Some(Scored(dist, cur)) = candidates.pop() {
            let worst = results.last().map(|(_, d)| *d).unwrap_or(f32::MAX);
            if dist > worst && results.len() >= ef {
                break;
            }
            if layer >= self.nodes[cur].links.len() {
                continue;
            }
            for &nb in &self.nodes[cur].links[layer].clone() {
                if !visited.insert(nb) {
                    continue;
                }
                let d = self.space.distance(query_vec, &self.nodes[nb].vector);
                if results.len() < ef || d < results.last().map(|(_, d)| *d).unwrap_or(f32::MAX) {
                    candidates.push(Scored(d, nb));
                    results.push((nb, d));
                    results.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
                    results.truncate(ef);
                }
            }
        }

        results
    }

    fn select_neighbors(candidates: &[(usize, f32)], m: usize) -> Vec<usize> {
        candidates.iter().take(m.max(1)).map(|(id, _)| *id).collect()
    }

    pub fn query(&self, vectors: &[Vec<f32>], k: usize) -> Result<(Vec<Vec<i64>>, Vec<Vec<f32>>), AnnError> {
        self.require_initialized()?;
        for v in vectors {
            if v.len() != self.dim {
                return Err(AnnError::DimensionMismatch { expected: self.dim, got: v.len() });
            }
        }

        let mut labels = Vec::with_capacity(vectors.len());
        let mut dists = Vec::with_capacity(vectors.len());

        let Some(entry) = self.entry_point else {
            for _ in vectors {
                labels.push(Vec::new());
                dists.push(Vec::new());
            }
            return Ok((labels, dists));
        };

        let top_layer = self.nodes[entry].links.len() - 1;
        let ef = self.ef.max(k);

        for v in vectors {
            let mut cur = entry;
            for layer in (1..=top_layer).rev() {
                cur = self.greedy_closest_vec(cur, v, layer);
            }
            let mut candidates = self.search_layer_vec(v, cur, ef.max(1), 0);
            candidates.retain(|(id, _)| !self.nodes[*id].deleted);
            candidates.truncate(k);

            labels.push(candidates.iter().map(|(id, _)| self.nodes[*id].label).collect());
            dists.push(candidates.iter().map(|(_, d)| *d).collect());
        }

        Ok((labels, dists))
    }

    fn greedy_closest_vec(&self, from: usize, target: &[f32], layer: usize) -> usize {
        let mut cur = from;
        loop {
            let mut improved = false;
            let cur_dist = self.space.distance(&self.nodes[cur].vector, target);
            let mut best = (cur, cur_dist);
            if layer < self.nodes[cur].links.len() {
                for &nb in &self.nodes[cur].links[layer] {
                    let d = self.space.distance(&self.nodes[nb].vector, target);
                    if d < best.1 {
                        best = (nb, d);
                        improved = true;
                    }
                }
            }
            if !improved {
                return cur;
            }
            cur = best.0;
        }
    }

    pub fn mark_deleted(&mut self, label: i64) -> Result<(), AnnError> {
        self.require_initialized()?;
        let &internal = self.label_to_internal.get(&label).ok_or(AnnError::UnknownLabel(label))?;
        self.nodes[internal].deleted = true;
        Ok(())
    }

    pub fn get_items(&self, ids: &[i64]) -> Result<Vec<Vec<f32>>, AnnError> {
        self.require_initialized()?;
        ids.iter()
            .map(|label| {
                self.label_to_internal
                    .get(label)
                    .map(|&internal| self.nodes[internal].vector.clone())
                    .ok_or(AnnError::UnknownLabel(*label))
            })
            .collect()
    }

    pub fn get_ids(&self) -> Vec<i64> {
        self.nodes.iter().filter(|n| !n.deleted).map(|n| n.label).collect()
    }

    fn require_initialized(&self) -> Result<(), AnnError> {
        if !self.initialized {
            return Err(AnnError::NotInitialized);
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let snapshot = Snapshot {
            space: self.space,
            dim: self.dim,
            m: self.m,
            ef_construction: self.ef_construction,
            ef: self.ef,
            max_elements: self.max_elements,
            entry_point: self.entry_point,
            nodes: self.nodes.clone(),
            label_to_internal: self.label_to_internal.clone(),
        };
        let bytes = bincode::serialize(&snapshot).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let tmp = path.with_extension("bin.tmp");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let snapshot: Snapshot =
            bincode::deserialize(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Self {
            space: snapshot.space,
            dim: snapshot.dim,
            m: snapshot.m,
            ef_construction: snapshot.ef_construction,
            ef: snapshot.ef,
            max_elements: snapshot.max_elements,
            entry_point: snapshot.entry_point,
            nodes: snapshot.nodes,
            label_to_internal: snapshot.label_to_internal,
            initialized: snapshot.m > 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec_of(x: f32, dim: usize) -> Vec<f32> {
        (0..dim).map(|i| x + i as f32 * 0.01).collect()
    }

    #[test]
    fn uninitialized_operations_fail() {
        let idx = AnnIndex::new(Space::L2, 4);
        assert_eq!(idx.query(&[vec_of(0.0, 4)], 1), Err(AnnError::NotInitialized));
    }

    #[test]
    fn add_then_query_returns_self() {
        let mut idx = AnnIndex::new(Space::L2, 4);
        idx.init(100, 100, 12).unwrap();
        let data: Vec<Vec<f32>> = (0..20).map(|i| vec_of(i as f32, 4)).collect();
        let ids: Vec<i64> = (0..20).collect();
        idx.add(&data, &ids).unwrap();
        assert_eq!(idx.current_count(), 20);

        let (labels, dists) = idx.query(&data[..5], 1).unwrap();
        for (row, label_row) in labels.iter().enumerate() {
            assert_eq!(label_row[0], row as i64);
            assert!(dists[row][0].abs() < 1e-3);
        }
    }

    #[test]
    fn capacity_exceeded() {
        let mut idx = AnnIndex::new(Space::L2, 2);
        idx.init(1, 50, 8).unwrap();
        let err = idx.add(&[vec_of(0.0, 2), vec_of(1.0, 2)], &[0, 1]).unwrap_err();
        assert!(matches!(err, AnnError::CapacityExceeded { would_be: 2, max: 1 }));
    }

    #[test]
    fn dimension_mismatch() {
        let mut idx = AnnIndex::new(Space::L2, 4);
        idx.init(10, 50, 8).unwrap();
        let err = idx.add(&[vec![0.0, 1.0]], &[0]).unwrap_err();
        assert!(matches!(err, AnnError::DimensionMismatch { expected: 4, got: 2 }));
    }

    #[test]
    fn mark_deleted_excludes_from_query() {
        let mut idx = AnnIndex::new(Space::L2, 3);
        idx.init(10, 50, 8).unwrap();
        let data: Vec<Vec<f32>> = (0..5).map(|i| vec_of(i as f32, 3)).collect();
        idx.add(&data, &[0, 1, 2, 3, 4]).unwrap();
        idx.mark_deleted(0).unwrap();

        let (labels, _) = idx.query(&data, data.len()).unwrap();
        for row in &labels {
            assert!(!row.contains(&0));
        }
        assert!(!idx.get_ids().contains(&0));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idx.bin");

        let mut idx = AnnIndex::new(Space::Cosine, 4);
        idx.init(50, 80, 10).unwrap();
        let data: Vec<Vec<f32>> = (0..10).map(|i| vec_of(i as f32, 4)).collect();
        idx.add(&data, &(0..10).collect::<Vec<_>>()).unwrap();
        idx.save(&path).unwrap();

        let loaded = AnnIndex::load(&path).unwrap();
        assert_eq!(loaded.current_count(), 10);
        assert_eq!(loaded.space(), Space::Cosine);
        assert_eq!(loaded.dim(), 4);
        assert_eq!(loaded.get_ids().len(), 10);
    }

    #[test]
    fn resize_updates_max_elements() {
        let mut idx = AnnIndex::new(Space::L2, 2);
        idx.init(10, 50, 8).unwrap();
        idx.resize(200).unwrap();
        assert_eq!(idx.max_elements(), 200);
    }

    #[test]
    fn unknown_label_errors() {
        let mut idx = AnnIndex::new(Space::L2, 2);
        idx.init(10, 50, 8).unwrap();
        assert_eq!(idx.mark_deleted(99), Err(AnnError::UnknownLabel(99)));
        assert_eq!(idx.get_items(&[99]).unwrap_err(), AnnError::UnknownLabel(99));
    }
}
