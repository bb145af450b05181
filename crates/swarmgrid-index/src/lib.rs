//! Spatial indexing for agent neighbourhood queries.
//!
//! [`StaggeredGridIndex`] keeps four layers of the same cell lattice. Layer keys pair the floor
//! or floor + 1 row with the floor or floor + 1 column of a position, so every indexed handle
//! occupies a 2x2 block of cells. A query probes the block around the query point, which covers
//! the 3x3 cell neighbourhood without scanning it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

/// Upper bound on buckets per layer.
pub const MAX_CELLS_PER_LAYER: usize = 1 << 24;

/// Errors emitted by spatial index implementations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., non-positive cell size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A position with a NaN or infinite coordinate was handed to the index.
    #[error("non-finite position ({x}, {y})")]
    NonFinite { x: f64, y: f64 },
    /// A computed cell key fell outside the backing grid.
    #[error("cell ({row}, {col}) outside the {rows}x{cols} grid")]
    OutOfBounds {
        row: i64,
        col: i64,
        rows: usize,
        cols: usize,
    },
}

/// Result of moving a handle from its previous cells to its current ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReindexOutcome {
    /// Old and new keys matched; no bucket was touched.
    Unchanged,
    /// The handle left its old buckets and joined the new ones.
    Moved,
}

/// Common behaviour exposed by neighbourhood indices.
pub trait NeighborhoodIndex<H> {
    /// Insert a handle that has no prior membership.
    fn insert_initial(&mut self, handle: H, position: (f64, f64)) -> Result<(), IndexError>;

    /// Move `handle` from the cells of `previous` to the cells of `current`.
    fn reindex(
        &mut self,
        handle: H,
        previous: (f64, f64),
        current: (f64, f64),
    ) -> Result<ReindexOutcome, IndexError>;

    /// Drop `handle` from the cells of `position`. Absent handles are ignored.
    fn remove(&mut self, handle: H, position: (f64, f64)) -> Result<(), IndexError>;

    /// Handles registered near `position`.
    fn query(&self, position: (f64, f64)) -> BTreeSet<H>;
}

/// One of the four staggered layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    CeilCeil,
    CeilFloor,
    FloorCeil,
    FloorFloor,
}

impl Layer {
    /// Every layer in probe order.
    pub const ALL: [Layer; 4] = [
        Layer::CeilCeil,
        Layer::CeilFloor,
        Layer::FloorCeil,
        Layer::FloorFloor,
    ];

    /// Row and column offsets added to the floor cell.
    #[must_use]
    pub const fn offsets(self) -> (i64, i64) {
        match self {
            Layer::CeilCeil => (1, 1),
            Layer::CeilFloor => (1, 0),
            Layer::FloorCeil => (0, 1),
            Layer::FloorFloor => (0, 0),
        }
    }

    const fn slot(self) -> usize {
        match self {
            Layer::CeilCeil => 0,
            Layer::CeilFloor => 1,
            Layer::FloorCeil => 2,
            Layer::FloorFloor => 3,
        }
    }
}

/// Row/column address of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub row: usize,
    pub col: usize,
}

/// The four layer keys derived from one position, in [`Layer::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaggeredKeys([CellKey; 4]);

impl StaggeredKeys {
    /// Key used by `layer`.
    #[must_use]
    pub const fn get(&self, layer: Layer) -> CellKey {
        self.0[layer.slot()]
    }

    /// Iterate the keys in layer order.
    pub fn iter(&self) -> impl Iterator<Item = CellKey> + '_ {
        self.0.iter().copied()
    }
}

/// Four staggered grids of handle buckets covering a `width` x `height` world.
#[derive(Debug, Clone)]
pub struct StaggeredGridIndex<H> {
    cell_size: f64,
    width: f64,
    height: f64,
    rows: usize,
    cols: usize,
    layers: [Vec<BTreeSet<H>>; 4],
}

impl<H: Copy + Ord> StaggeredGridIndex<H> {
    /// Create an empty index with cells of side `cell_size`.
    pub fn new(cell_size: f64, width: f64, height: f64) -> Result<Self, IndexError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(IndexError::InvalidConfig("cell_size must be positive"));
        }
        if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
            return Err(IndexError::InvalidConfig("world bounds must be positive"));
        }
        // floor(bound / S) + 1 is the largest ceil key a clamped position can produce.
        let too_large =
            IndexError::InvalidConfig("world bounds need too many cells at this cell_size");
        let rows = ((height / cell_size).floor() as usize)
            .checked_add(2)
            .ok_or(too_large.clone())?;
        let cols = ((width / cell_size).floor() as usize)
            .checked_add(2)
            .ok_or(too_large.clone())?;
        let cells = rows
            .checked_mul(cols)
            .filter(|&cells| cells <= MAX_CELLS_PER_LAYER)
            .ok_or(too_large)?;
        Ok(Self {
            cell_size,
            width,
            height,
            rows,
            cols,
            layers: std::array::from_fn(|_| vec![BTreeSet::new(); cells]),
        })
    }

    /// Edge length of each grid cell.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of bucket rows per layer.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of bucket columns per layer.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Derive the four layer keys for `position`.
    pub fn keys_for(&self, position: (f64, f64)) -> Result<StaggeredKeys, IndexError> {
        let (x, y) = position;
        if !x.is_finite() || !y.is_finite() {
            return Err(IndexError::NonFinite { x, y });
        }
        let base_row = (y / self.cell_size).floor() as i64;
        let base_col = (x / self.cell_size).floor() as i64;
        let mut keys = [CellKey { row: 0, col: 0 }; 4];
        for layer in Layer::ALL {
            let (dr, dc) = layer.offsets();
            let row = base_row + dr;
            let col = base_col + dc;
            if row < 0 || col < 0 || row as usize >= self.rows || col as usize >= self.cols {
                return Err(IndexError::OutOfBounds {
                    row,
                    col,
                    rows: self.rows,
                    cols: self.cols,
                });
            }
            keys[layer.slot()] = CellKey {
                row: row as usize,
                col: col as usize,
            };
        }
        Ok(StaggeredKeys(keys))
    }

    /// Bucket at `key` within `layer`, if the key is on the grid.
    #[must_use]
    pub fn bucket(&self, layer: Layer, key: CellKey) -> Option<&BTreeSet<H>> {
        if key.row >= self.rows || key.col >= self.cols {
            return None;
        }
        self.layers[layer.slot()].get(self.offset(key))
    }

    /// Number of buckets holding `handle` in each layer (scans every cell).
    #[must_use]
    pub fn memberships(&self, handle: H) -> [usize; 4] {
        let mut counts = [0; 4];
        for layer in Layer::ALL {
            counts[layer.slot()] = self.layers[layer.slot()]
                .iter()
                .filter(|bucket| bucket.contains(&handle))
                .count();
        }
        counts
    }

    /// Returns true when `handle` sits in every layer bucket derived from `position`.
    #[must_use]
    pub fn is_indexed_at(&self, handle: H, position: (f64, f64)) -> bool {
        let Ok(keys) = self.keys_for(position) else {
            return false;
        };
        Layer::ALL.iter().all(|&layer| {
            self.bucket(layer, keys.get(layer))
                .is_some_and(|bucket| bucket.contains(&handle))
        })
    }

    /// Remove every handle from every bucket.
    pub fn clear(&mut self) {
        for layer in &mut self.layers {
            for bucket in layer.iter_mut() {
                bucket.clear();
            }
        }
    }

    fn offset(&self, key: CellKey) -> usize {
        key.row * self.cols + key.col
    }

    fn insert_keys(&mut self, handle: H, keys: &StaggeredKeys) {
        for layer in Layer::ALL {
            let offset = self.offset(keys.get(layer));
            self.layers[layer.slot()][offset].insert(handle);
        }
    }

    fn remove_keys(&mut self, handle: H, keys: &StaggeredKeys) {
        for layer in Layer::ALL {
            let offset = self.offset(keys.get(layer));
            self.layers[layer.slot()][offset].remove(&handle);
        }
    }

    fn clamp_to_world(&self, position: (f64, f64)) -> (f64, f64) {
        (
            position.0.clamp(0.0, self.width),
            position.1.clamp(0.0, self.height),
        )
    }
}

impl<H: Copy + Ord> NeighborhoodIndex<H> for StaggeredGridIndex<H> {
    fn insert_initial(&mut self, handle: H, position: (f64, f64)) -> Result<(), IndexError> {
        let keys = self.keys_for(position)?;
        self.insert_keys(handle, &keys);
        Ok(())
    }

    fn reindex(
        &mut self,
        handle: H,
        previous: (f64, f64),
        current: (f64, f64),
    ) -> Result<ReindexOutcome, IndexError> {
        // Validate both key sets before touching any bucket.
        let old = self.keys_for(previous)?;
        let new = self.keys_for(current)?;
        if old == new {
            return Ok(ReindexOutcome::Unchanged);
        }
        self.remove_keys(handle, &old);
        self.insert_keys(handle, &new);
        Ok(ReindexOutcome::Moved)
    }

    fn remove(&mut self, handle: H, position: (f64, f64)) -> Result<(), IndexError> {
        let keys = self.keys_for(position)?;
        self.remove_keys(handle, &keys);
        Ok(())
    }

    fn query(&self, position: (f64, f64)) -> BTreeSet<H> {
        let (x, y) = position;
        if !x.is_finite() || !y.is_finite() {
            warn!(x, y, "ignoring neighbourhood query at non-finite point");
            return BTreeSet::new();
        }
        let keys = match self.keys_for(self.clamp_to_world(position)) {
            Ok(keys) => keys,
            Err(err) => {
                error!(%err, x, y, "clamped query point produced an invalid cell key");
                return BTreeSet::new();
            }
        };
        // A handle shares a bucket with the query whenever its own 2x2 block overlaps the
        // query's block, so every layer is probed under each of the four keys. The layers hold
        // the same handles at shifted keys; nine probes of one layer would return the same set,
        // so the extra layers only mirror the four-grid storage layout.
        let mut group = BTreeSet::new();
        for layer in Layer::ALL {
            for key in keys.iter() {
                if let Some(bucket) = self.bucket(layer, key) {
                    group.extend(bucket.iter().copied());
                }
            }
        }
        group
    }
}
