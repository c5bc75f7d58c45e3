// src/model/resolver.rs
//
// Point index -> (structure file, frame, atom). Per-atom embeddings produce
// one scatter point per atom, so several points share a frame; the clicked
// atom is the point's rank among the rows of its partition that share the
// same dataset index.

use super::embedding::{EmbeddingStore, Partition};
use crate::error::{Result, ViewerError};
use crate::utils::report;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Where a partition's frames live and how rows map onto them.
#[derive(Clone, Debug)]
pub struct PartitionLayout {
    pub structure_path: PathBuf,
    pub frame_count: usize,
    pub trim_factor: usize,
    pub highlight_atoms: bool,
    /// Digest of the structure file's contents; part of every cache key.
    pub dataset_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedPoint {
    pub point: usize,
    pub partition: Partition,
    /// Row within the partition.
    pub local: usize,
    pub dataset_index: usize,
    pub structure_path: PathBuf,
    pub frame: usize,
    pub atom: Option<usize>,
    pub title: String,
}

#[derive(Debug)]
struct PartitionTable {
    layout: PartitionLayout,
    // Rank of each row among rows with the same dataset index
    ranks: Vec<usize>,
    per_atom: bool,
}

#[derive(Debug)]
pub struct Resolver {
    store: Arc<EmbeddingStore>,
    train: PartitionTable,
    test: Option<PartitionTable>,
}

impl Resolver {
    /// Checks every row against its structure file; the first row whose
    /// frame is out of bounds is returned as an error.
    pub fn new(
        store: Arc<EmbeddingStore>,
        train: PartitionLayout,
        test: Option<PartitionLayout>,
    ) -> Result<Self> {
        let train = Self::build_table(&store, Partition::Train, train)?;
        let test = match test {
            Some(layout) => Some(Self::build_table(&store, Partition::Test, layout)?),
            None if store.test_len() > 0 => {
                return Err(ViewerError::Config {
                    path: PathBuf::from("test"),
                    reason: "test points loaded without a test structure file".to_string(),
                })
            }
            None => None,
        };
        Ok(Self { store, train, test })
    }

    fn build_table(store: &EmbeddingStore, partition: Partition, layout: PartitionLayout) -> Result<PartitionTable> {
        let arrays = store.arrays(partition);
        let trim = layout.trim_factor.max(1);

        let mut seen: HashMap<usize, usize> = HashMap::new();
        let mut ranks = Vec::with_capacity(arrays.len());
        for row in 0..arrays.len() {
            let d = arrays.dataset_index(row);
            let frame = d.checked_mul(trim).unwrap_or(usize::MAX);
            if frame >= layout.frame_count {
                return Err(ViewerError::FrameOutOfRange {
                    path: layout.structure_path.clone(),
                    frame,
                    count: layout.frame_count,
                });
            }
            let rank = seen.entry(d).or_insert(0);
            ranks.push(*rank);
            *rank += 1;
        }

        let per_atom = layout.highlight_atoms && arrays.indices.is_some();
        log::debug!(
            "{} partition: {} rows over {} distinct structures (per-atom: {})",
            partition.as_str(),
            arrays.len(),
            seen.len(),
            per_atom
        );
        Ok(PartitionTable { layout: PartitionLayout { trim_factor: trim, ..layout }, ranks, per_atom })
    }

    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn layout(&self, partition: Partition) -> Option<&PartitionLayout> {
        match partition {
            Partition::Train => Some(&self.train.layout),
            Partition::Test => self.test.as_ref().map(|t| &t.layout),
        }
    }

    pub fn resolve(&self, point: usize) -> Result<ResolvedPoint> {
        let (partition, local) = self.store.locate(point)?;
        let table = match partition {
            Partition::Train => &self.train,
            // locate() only yields Test when test rows exist, and new() requires a layout for them
            Partition::Test => self.test.as_ref().ok_or(ViewerError::PointOutOfRange {
                index: point,
                total: self.store.train_len(),
            })?,
        };

        let dataset_index = self.store.arrays(partition).dataset_index(local);
        let frame = dataset_index * table.layout.trim_factor;
        let atom = table.per_atom.then(|| table.ranks[local]);

        let title = report::point_title(point, partition, frame, atom, &table.layout.structure_path);

        Ok(ResolvedPoint {
            point,
            partition,
            local,
            dataset_index,
            structure_path: table.layout.structure_path.clone(),
            frame,
            atom,
            title,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::embedding::PartitionArrays;

    fn arrays(n: usize, indices: Option<Vec<usize>>) -> PartitionArrays {
        PartitionArrays {
            points: (0..n).map(|i| [i as f64, 0.0, 0.0]).collect(),
            labels: vec![0; n],
            indices,
        }
    }

    fn layout(name: &str, frames: usize, trim: usize) -> PartitionLayout {
        PartitionLayout {
            structure_path: PathBuf::from(name),
            frame_count: frames,
            trim_factor: trim,
            highlight_atoms: true,
            dataset_id: format!("{}-{}", name, frames),
        }
    }

    fn resolver(train: PartitionArrays, test: PartitionArrays, test_frames: usize) -> Resolver {
        let has_test = !test.is_empty();
        let store = Arc::new(EmbeddingStore::from_arrays(train, test));
        Resolver::new(store, layout("train.xyz", 10, 1), has_test.then(|| layout("test.xyz", test_frames, 1))).unwrap()
    }

    #[test]
    fn test_repeated_index_gives_atom_rank() {
        let r = resolver(arrays(10, Some(vec![0, 0, 0, 5, 5, 9, 9, 9, 9, 9])), arrays(0, None), 0);

        let p = r.resolve(2).unwrap();
        assert_eq!(p.frame, 0);
        assert_eq!(p.atom, Some(2));

        assert_eq!(r.resolve(4).unwrap().atom, Some(1));
        assert_eq!(r.resolve(5).unwrap().atom, Some(0));
        assert_eq!(r.resolve(9).unwrap().atom, Some(4));
        assert_eq!(r.resolve(9).unwrap().frame, 9);
    }

    #[test]
    fn test_rank_survives_non_contiguous_runs() {
        let r = resolver(arrays(5, Some(vec![3, 1, 3, 1, 3])), arrays(0, None), 0);
        let atoms: Vec<_> = (0..5).map(|i| r.resolve(i).unwrap().atom.unwrap()).collect();
        assert_eq!(atoms, vec![0, 0, 1, 1, 2]);
    }

    #[test]
    fn test_train_test_boundary() {
        let r = resolver(arrays(10, None), arrays(2, Some(vec![4, 7])), 8);

        let last_train = r.resolve(9).unwrap();
        assert_eq!(last_train.partition, Partition::Train);
        assert_eq!(last_train.structure_path, PathBuf::from("train.xyz"));

        let first_test = r.resolve(10).unwrap();
        assert_eq!(first_test.partition, Partition::Test);
        assert_eq!(first_test.local, 0);

        let p = r.resolve(11).unwrap();
        assert_eq!(p.partition, Partition::Test);
        assert_eq!(p.local, 1);
        assert_eq!(p.frame, 7);
        assert_eq!(p.structure_path, PathBuf::from("test.xyz"));

        assert!(matches!(r.resolve(12), Err(ViewerError::PointOutOfRange { index: 12, total: 12 })));
    }

    #[test]
    fn test_every_point_lands_in_bounds_and_is_stable() {
        let r = resolver(arrays(10, Some(vec![0, 0, 3, 3, 3, 6, 9, 9, 1, 2])), arrays(3, None), 3);
        for i in 0..r.len() {
            let a = r.resolve(i).unwrap();
            let frames = r.layout(a.partition).unwrap().frame_count;
            assert!(a.frame < frames, "point {} -> frame {} of {}", i, a.frame, frames);
            let b = r.resolve(i).unwrap();
            assert_eq!((a.structure_path, a.frame, a.atom), (b.structure_path, b.frame, b.atom));
        }
    }

    #[test]
    fn test_trim_factor_and_no_index_file() {
        let store = Arc::new(EmbeddingStore::from_arrays(arrays(4, None), arrays(0, None)));
        let r = Resolver::new(store, layout("d.xyz", 20, 5), None).unwrap();
        let p = r.resolve(3).unwrap();
        assert_eq!(p.frame, 15);
        assert_eq!(p.atom, None);
        assert!(p.title.contains("15"));
    }

    #[test]
    fn test_out_of_bounds_frame_is_rejected_up_front() {
        let store = Arc::new(EmbeddingStore::from_arrays(arrays(4, None), arrays(0, None)));
        let err = Resolver::new(store, layout("d.xyz", 15, 5), None).unwrap_err();
        assert!(matches!(err, ViewerError::FrameOutOfRange { frame: 15, count: 15, .. }));
    }

    #[test]
    fn test_test_rows_need_a_layout() {
        let store = Arc::new(EmbeddingStore::from_arrays(arrays(2, None), arrays(1, None)));
        assert!(Resolver::new(store, layout("d.xyz", 2, 1), None).is_err());
    }
}
