// src/model/embedding.rs

use crate::config::{Config, PartitionConfig};
use crate::error::{Result, ViewerError};
use crate::io::npy;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
  Train,
  Test,
}

impl Partition {
  pub fn as_str(&self) -> &'static str {
    match self {
      Partition::Train => "train",
      Partition::Test => "test",
    }
  }
}

/// One row of the embedding table.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
  pub position: [f64; 3],
  pub cluster: String,
  pub dataset_index: usize,
  pub partition: Partition,
}

/// Arrays of one partition, as loaded from disk.
#[derive(Clone, Debug, Default)]
pub struct PartitionArrays {
  pub points: Vec<[f64; 3]>,
  pub labels: Vec<i64>,
  /// `None` when no index file was given: row `r` is structure `r`.
  pub indices: Option<Vec<usize>>,
}

impl PartitionArrays {
  pub fn load(cfg: &PartitionConfig) -> Result<Self> {
    let points = npy::read_points(&cfg.embedding)?;
    let labels = npy::read_integers(&cfg.labels)?;
    if labels.len() != points.len() {
      return Err(ViewerError::Shape {
        path: cfg.labels.clone(),
        reason: format!("{} labels for {} embedding rows", labels.len(), points.len()),
      });
    }

    let indices = match &cfg.indices {
      Some(path) => {
        let idx = npy::read_indices(path)?;
        if idx.len() != points.len() {
          return Err(ViewerError::Shape {
            path: path.clone(),
            reason: format!("{} indices for {} embedding rows", idx.len(), points.len()),
          });
        }
        Some(idx)
      }
      None => None,
    };

    Ok(Self { points, labels, indices })
  }

  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  pub fn dataset_index(&self, row: usize) -> usize {
    match &self.indices {
      Some(idx) => idx[row],
      None => row,
    }
  }
}

/// One plot trace: every point of a single cluster.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Trace {
  pub name: String,
  pub x: Vec<f64>,
  pub y: Vec<f64>,
  pub z: Vec<f64>,
  /// Global point index of every member, in trace order.
  pub customdata: Vec<usize>,
}

/// Train rows followed by test rows, addressable by one global index.
#[derive(Clone, Debug)]
pub struct EmbeddingStore {
  train: PartitionArrays,
  test: PartitionArrays,
  traces: Vec<Trace>,
}

impl EmbeddingStore {
  pub fn load(config: &Config) -> Result<Self> {
    let train = PartitionArrays::load(&config.train)?;
    log::info!("Loaded {} train points from {}", train.len(), config.train.embedding.display());

    let test = match &config.test {
      Some(cfg) => {
        let t = PartitionArrays::load(cfg)?;
        log::info!("Loaded {} test points from {}", t.len(), cfg.embedding.display());
        t
      }
      None => PartitionArrays::default(),
    };

    Ok(Self::from_arrays(train, test))
  }

  pub fn from_arrays(train: PartitionArrays, test: PartitionArrays) -> Self {
    let mut store = Self { train, test, traces: Vec::new() };
    store.traces = store.build_traces();
    store
  }

  pub fn len(&self) -> usize {
    self.train.len() + self.test.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn train_len(&self) -> usize {
    self.train.len()
  }

  pub fn test_len(&self) -> usize {
    self.test.len()
  }

  pub fn arrays(&self, partition: Partition) -> &PartitionArrays {
    match partition {
      Partition::Train => &self.train,
      Partition::Test => &self.test,
    }
  }

  /// Splits a global index into (partition, local row).
  pub fn locate(&self, index: usize) -> Result<(Partition, usize)> {
    if index < self.train.len() {
      Ok((Partition::Train, index))
    } else if index < self.len() {
      Ok((Partition::Test, index - self.train.len()))
    } else {
      Err(ViewerError::PointOutOfRange { index, total: self.len() })
    }
  }

  pub fn record(&self, index: usize) -> Result<Record> {
    let (partition, row) = self.locate(index)?;
    let arrays = self.arrays(partition);
    Ok(Record {
      position: arrays.points[row],
      cluster: arrays.labels[row].to_string(),
      dataset_index: arrays.dataset_index(row),
      partition,
    })
  }

  pub fn traces(&self) -> &[Trace] {
    &self.traces
  }

  /// Maps a plot click (curve, point within curve) to the global index.
  pub fn point_for(&self, curve: usize, point: usize) -> Result<usize> {
    self
      .traces
      .get(curve)
      .and_then(|t| t.customdata.get(point))
      .copied()
      .ok_or(ViewerError::UnknownCurvePoint { curve, point })
  }

  // One trace per cluster, ordered by first appearance like a categorical colour map.
  fn build_traces(&self) -> Vec<Trace> {
    let mut traces: Vec<Trace> = Vec::new();
    let rows = self.train.points.iter().zip(&self.train.labels).chain(self.test.points.iter().zip(&self.test.labels));

    for (global, (p, label)) in rows.enumerate() {
      let name = label.to_string();
      let pos = match traces.iter().position(|t| t.name == name) {
        Some(pos) => pos,
        None => {
          traces.push(Trace { name, ..Default::default() });
          traces.len() - 1
        }
      };
      let t = &mut traces[pos];
      t.x.push(p[0]);
      t.y.push(p[1]);
      t.z.push(p[2]);
      t.customdata.push(global);
    }
    traces
  }
}
