// src/state.rs
// Everything a request handler needs, built once at startup and shared
// read-only between the HTTP loop and the render workers.

use crate::config::{Config, PartitionConfig, RenderStyle};
use crate::error::{Result, ViewerError};
use crate::io::xyz::FrameIndex;
use crate::jobs::{EvictionPolicy, FrameRenderer, RenderCache, RenderQueue, RenderedView};
use crate::model::{EmbeddingStore, Partition, PartitionLayout, ResolvedPoint, Resolver};
use crate::rendering::{render_png, RenderRequest};
use crate::utils::report;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolve -> read frame -> render.
pub struct Viewer {
    resolver: Resolver,
    frames: HashMap<Partition, FrameIndex>,
    style: RenderStyle,
}

impl Viewer {
    /// Opens every data file named by `config`. The first missing or
    /// malformed file is returned as the error.
    pub fn open(config: &Config) -> Result<Self> {
        for part in config.partitions() {
            for path in part.files() {
                if !path.exists() {
                    return Err(ViewerError::MissingFile { path: path.to_path_buf() });
                }
            }
        }

        let store = Arc::new(EmbeddingStore::load(config)?);

        let mut frames = HashMap::new();
        let train_index = FrameIndex::build(&config.train.structures)?;
        let train_layout = layout(&config.train, &train_index);
        frames.insert(Partition::Train, train_index);

        let test_layout = match &config.test {
            Some(cfg) => {
                let index = FrameIndex::build(&cfg.structures)?;
                let l = layout(cfg, &index);
                frames.insert(Partition::Test, index);
                Some(l)
            }
            None => None,
        };

        let resolver = Resolver::new(store, train_layout, test_layout)?;
        log::info!(
            "Viewer ready: {} points ({} train, {} test)",
            resolver.len(),
            resolver.store().train_len(),
            resolver.store().test_len()
        );
        Ok(Self { resolver, frames, style: config.style.clone() })
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn store(&self) -> &EmbeddingStore {
        self.resolver.store()
    }

    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    pub fn resolve(&self, point: usize) -> Result<ResolvedPoint> {
        self.resolver.resolve(point)
    }

    /// Reads the point's frame and rasterizes it.
    pub fn render_point(&self, point: &ResolvedPoint) -> Result<RenderedView> {
        let index = self.frames.get(&point.partition).ok_or(ViewerError::FrameOutOfRange {
            path: point.structure_path.clone(),
            frame: point.frame,
            count: 0,
        })?;
        let structure = index.read_frame(point.frame)?;
        log::debug!(
            "{}",
            report::structure_summary(&structure, &format!("{} #{}", point.partition.as_str(), point.frame))
        );

        let request = RenderRequest {
            structure,
            highlight: point.atom,
            style: self.style.clone(),
        };
        let png = render_png(&request)?;
        Ok(RenderedView {
            key: self.cache_key(point),
            title: point.title.clone(),
            caption: report::structure_caption(&request.structure),
            png: Arc::new(png),
        })
    }
}

fn layout(cfg: &PartitionConfig, index: &FrameIndex) -> PartitionLayout {
    PartitionLayout {
        structure_path: cfg.structures.clone(),
        frame_count: index.len(),
        trim_factor: cfg.trim_factor,
        highlight_atoms: cfg.highlight_atoms,
        dataset_id: index.digest().to_string(),
    }
}

impl FrameRenderer for Viewer {
    fn cache_key(&self, point: &ResolvedPoint) -> String {
        let dataset = self.resolver.layout(point.partition).map_or("none", |l| l.dataset_id.as_str());
        RenderCache::make_key(point, dataset, &self.style)
    }

    fn render(&self, point: &ResolvedPoint) -> Result<RenderedView> {
        self.render_point(point)
    }
}

/// Shared by every request handler.
pub struct AppState {
    pub viewer: Arc<Viewer>,
    pub queue: RenderQueue<Viewer>,
    pub initial: RenderedView,
    pub config: Config,
}

impl AppState {
    /// Starts the workers and renders `config.initial_point` before the
    /// server accepts requests.
    pub fn new(viewer: Viewer, config: Config) -> Result<Self> {
        let viewer = Arc::new(viewer);
        let mut cache = RenderCache::new(config.cache_entries, config.cache_memory_mb)
            .with_disk(&config.resolved_cache_dir());
        cache.set_eviction_policy(EvictionPolicy::from_name(&config.cache_policy));
        let queue = RenderQueue::new(
            Arc::clone(&viewer),
            cache,
            config.worker_count(),
            config.max_finished_jobs,
        )?;

        let point = viewer.resolve(config.initial_point)?;
        let mut initial = queue.render_now(&point)?;
        initial.title = report::initial_title(point.frame);
        log::info!("Initial structure {} rendered", point.frame);

        Ok(Self { viewer, queue, initial, config })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small on-disk dataset shared by the state and server tests.

    use crate::config::{Config, PartitionConfig};
    use crate::io::xyz;
    use crate::model::{Atom, Structure};
    use ndarray::{arr1, Array2};
    use ndarray_npy::write_npy;
    use std::path::Path;

    fn frame(n: usize, shift: f64) -> Structure {
        let atoms = (0..n)
            .map(|i| Atom {
                element: if i % 2 == 0 { "Si".into() } else { "O".into() },
                position: [shift + 1.6 * i as f64, 0.0, 0.0],
            })
            .collect();
        Structure::new(atoms)
    }

    /// Replaces train.xyz in place: same frame and atom counts, every atom `element`.
    pub fn rewrite_train(dir: &Path, element: &str) {
        let frames: Vec<Structure> = (0..3)
            .map(|k| {
                let mut s = frame(3, k as f64);
                for atom in &mut s.atoms {
                    atom.element = element.to_string();
                }
                s
            })
            .collect();
        xyz::write(dir.join("train.xyz").to_str().unwrap(), &frames).unwrap();
    }

    /// Train: 6 points over structures [0,0,0,1,1,2] of a 3-frame file.
    /// Test: 2 points over structures [0,1] of a 2-frame file.
    pub fn write_dataset(dir: &Path) -> Config {
        let train_frames: Vec<Structure> = (0..3).map(|k| frame(3, k as f64)).collect();
        let test_frames: Vec<Structure> = (0..2).map(|k| frame(2, k as f64)).collect();
        let train_xyz = dir.join("train.xyz");
        let test_xyz = dir.join("test.xyz");
        xyz::write(train_xyz.to_str().unwrap(), &train_frames).unwrap();
        xyz::write(test_xyz.to_str().unwrap(), &test_frames).unwrap();

        let train_emb = Array2::from_shape_fn((6, 3), |(i, j)| (i * 3 + j) as f64);
        let test_emb = Array2::from_shape_fn((2, 3), |(i, j)| -((i * 3 + j) as f64));
        write_npy(dir.join("train_emb.npy"), &train_emb).unwrap();
        write_npy(dir.join("test_emb.npy"), &test_emb).unwrap();
        write_npy(dir.join("train_labels.npy"), &arr1(&[0i64, 0, 1, 1, 2, 2])).unwrap();
        write_npy(dir.join("test_labels.npy"), &arr1(&[1i64, 2])).unwrap();
        write_npy(dir.join("train_idx.npy"), &arr1(&[0i64, 0, 0, 1, 1, 2])).unwrap();
        write_npy(dir.join("test_idx.npy"), &arr1(&[0i64, 1])).unwrap();

        let mut config = Config::default();
        config.open_browser = false;
        config.workers = 1;
        config.cache_dir = Some(dir.join("cache"));
        config.style.width = 64;
        config.style.height = 64;
        config.train = PartitionConfig {
            embedding: dir.join("train_emb.npy"),
            labels: dir.join("train_labels.npy"),
            indices: Some(dir.join("train_idx.npy")),
            structures: train_xyz,
            trim_factor: 1,
            highlight_atoms: true,
        };
        config.test = Some(PartitionConfig {
            embedding: dir.join("test_emb.npy"),
            labels: dir.join("test_labels.npy"),
            indices: Some(dir.join("test_idx.npy")),
            structures: test_xyz,
            trim_factor: 1,
            highlight_atoms: true,
        });
        config
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{rewrite_train, write_dataset};
    use super::*;

    #[test]
    fn test_open_and_render() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_dataset(dir.path());
        let viewer = Viewer::open(&config).unwrap();
        assert_eq!(viewer.store().len(), 8);

        let p = viewer.resolve(4).unwrap();
        assert_eq!((p.partition, p.frame, p.atom), (Partition::Train, 1, Some(1)));

        let view = viewer.render_point(&p).unwrap();
        assert_eq!(&view.png[1..4], b"PNG");
        assert_eq!(view.title, p.title);
        assert!(view.caption.contains("3 atoms"), "{}", view.caption);
    }

    #[test]
    fn test_missing_file_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_dataset(dir.path());
        config.train.labels = dir.path().join("nope.npy");
        match Viewer::open(&config) {
            Err(ViewerError::MissingFile { path }) => assert!(path.ends_with("nope.npy")),
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("open should fail"),
        }
    }

    #[test]
    fn test_frame_bounds_checked_at_startup() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_dataset(dir.path());
        // dataset index 2 * 2 = 4 >= 3 frames
        config.train.trim_factor = 2;
        assert!(matches!(Viewer::open(&config), Err(ViewerError::FrameOutOfRange { .. })));
    }

    #[test]
    fn test_app_state_prerenders_initial_point() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_dataset(dir.path());
        config.initial_point = 5;
        let viewer = Viewer::open(&config).unwrap();
        let state = AppState::new(viewer, config).unwrap();
        assert_eq!(state.initial.title, report::initial_title(2));
        assert_eq!(state.queue.cache_stats().entries, 1);
    }

    #[test]
    fn test_rewritten_structure_file_is_not_served_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_dataset(dir.path());
        let first = AppState::new(Viewer::open(&config).unwrap(), config.clone()).unwrap();
        let stale = first.initial.png.clone();
        drop(first);

        // Same file name, same shape, different atoms; the disk cache is shared
        rewrite_train(dir.path(), "Au");
        let state = AppState::new(Viewer::open(&config).unwrap(), config.clone()).unwrap();
        let point = state.viewer.resolve(config.initial_point).unwrap();
        let fresh = state.viewer.render_point(&point).unwrap();
        assert_eq!(state.initial.png, fresh.png);
        assert_ne!(state.initial.png, stale);
    }
}
