// src/config.rs

use crate::error::{Result, ViewerError};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

// --- RenderStyle ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
  pub width: u32,
  pub height: u32,
  pub atom_scale: f64,
  /// Overrides per-element radii when set (Angstrom).
  pub fixed_radius: Option<f64>,
  pub show_bonds: bool,
  pub bond_radius: f64,
  pub bond_tolerance: f64,
  pub bond_color: (f64, f64, f64),
  pub show_cell: bool,
  pub background_color: Option<(f64, f64, f64)>,
  pub camera_dir: [f64; 3],
  pub fov_deg: f64,
  /// 0 = non-highlighted atoms opaque, 1 = invisible.
  pub dim_transparency: f64,
  pub metallic: f64,
  pub roughness: f64,
  pub element_colors: HashMap<String, (f64, f64, f64)>,
}

impl Default for RenderStyle {
  fn default() -> Self {
    Self {
      width: 800,
      height: 800,
      atom_scale: 0.5,
      fixed_radius: None,
      show_bonds: true,
      bond_radius: 0.12,
      bond_tolerance: 1.15,
      bond_color: (0.5, 0.5, 0.5),
      show_cell: true,
      background_color: None,
      camera_dir: [-1.0, -1.0, -1.0],
      fov_deg: 40.0,
      dim_transparency: 0.7,
      metallic: 0.0,
      roughness: 0.3,
      element_colors: HashMap::new(),
    }
  }
}

impl RenderStyle {
  /// Short quantized digest used in cache keys.
  ///
  /// Two styles that render identically at 1/100 precision share a digest.
  pub fn fingerprint(&self) -> String {
    let q = |v: f64| (v * 100.0).round() as i64;
    let mut colors: Vec<_> = self.element_colors.iter().collect();
    colors.sort_by(|a, b| a.0.cmp(b.0));

    let mut text = format!(
      "{}:{}:{}:{}:{}:{}:{}:{}:{:?}:{:?}:{}:{}:{}:{}",
      q(self.atom_scale),
      self.fixed_radius.map(q).unwrap_or(-1),
      self.show_bonds,
      q(self.bond_radius),
      q(self.bond_tolerance),
      self.show_cell,
      q(self.fov_deg),
      q(self.dim_transparency),
      self.camera_dir.map(q),
      self.background_color.map(|(r, g, b)| (q(r), q(g), q(b))),
      q(self.metallic),
      q(self.roughness),
      q(self.bond_color.0) * 10000 + q(self.bond_color.1) * 100 + q(self.bond_color.2),
      colors.len(),
    );
    for (el, (r, g, b)) in colors {
      text.push_str(&format!(":{}{}/{}/{}", el, q(*r), q(*g), q(*b)));
    }

    blake3::hash(text.as_bytes()).to_hex()[..16].to_string()
  }
}

// --- Partition files ---

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartitionConfig {
  pub embedding: PathBuf,
  pub labels: PathBuf,
  /// Dataset index of every row. Absent means row `r` maps to structure `r`.
  #[serde(default)]
  pub indices: Option<PathBuf>,
  pub structures: PathBuf,
  #[serde(default = "default_trim")]
  pub trim_factor: usize,
  #[serde(default = "default_true")]
  pub highlight_atoms: bool,
}

fn default_trim() -> usize {
  1
}

fn default_true() -> bool {
  true
}

impl PartitionConfig {
  /// All files this partition needs, in load order.
  pub fn files(&self) -> Vec<&Path> {
    let mut out = vec![self.embedding.as_path(), self.labels.as_path()];
    if let Some(idx) = &self.indices {
      out.push(idx.as_path());
    }
    out.push(self.structures.as_path());
    out
  }
}

// --- Main Config Struct ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,
  #[serde(default = "default_true")]
  pub open_browser: bool,

  /// Render worker threads; 0 picks the available parallelism.
  #[serde(default)]
  pub workers: usize,

  #[serde(default)]
  pub cache_dir: Option<PathBuf>,
  #[serde(default = "default_cache_entries")]
  pub cache_entries: usize,
  #[serde(default = "default_cache_memory")]
  pub cache_memory_mb: f64,
  /// "lru", "lfu", "size" or "adaptive".
  #[serde(default = "default_cache_policy")]
  pub cache_policy: String,
  #[serde(default = "default_max_finished")]
  pub max_finished_jobs: usize,

  #[serde(default = "default_log_level")]
  pub log_level: String,

  #[serde(default)]
  pub initial_point: usize,

  pub train: PartitionConfig,
  #[serde(default)]
  pub test: Option<PartitionConfig>,

  #[serde(default)]
  pub style: RenderStyle,
}

fn default_host() -> String {
  "127.0.0.1".to_string()
}

fn default_port() -> u16 {
  8050
}

fn default_cache_entries() -> usize {
  512
}

fn default_cache_memory() -> f64 {
  256.0
}

fn default_cache_policy() -> String {
  "adaptive".to_string()
}

fn default_max_finished() -> usize {
  1024
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Default for Config {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_port(),
      open_browser: true,
      workers: 0,
      cache_dir: None,
      cache_entries: default_cache_entries(),
      cache_memory_mb: default_cache_memory(),
      cache_policy: default_cache_policy(),
      max_finished_jobs: default_max_finished(),
      log_level: default_log_level(),
      initial_point: 0,
      train: PartitionConfig {
        embedding: PathBuf::from("3d_embedding.npy"),
        labels: PathBuf::from("labels.npy"),
        indices: None,
        structures: PathBuf::from("dataset.xyz"),
        trim_factor: 5,
        highlight_atoms: true,
      },
      test: None,
      style: RenderStyle::default(),
    }
  }
}

impl Config {
  /// Loads config from standard OS location (e.g., ~/.config/cview-embed/settings.json)
  pub fn load() -> (Self, String) {
    let path = Self::get_path();
    if path.exists() {
      match Self::load_from(&path) {
        Ok(cfg) => (cfg, format!("Config loaded from {:?}", path)),
        Err(e) => (Self::default(), format!("{}. Using defaults.", e)),
      }
    } else {
      // Leave a template next to where it will be looked up
      let cfg = Self::default();
      let saved = cfg.save();
      (cfg, format!("No config found. Using defaults. {}", saved))
    }
  }

  /// Loads an explicitly named config file. Any failure is an error.
  pub fn load_from(path: &Path) -> Result<Self> {
    let file = File::open(path).map_err(|e| ViewerError::Config {
      path: path.to_path_buf(),
      reason: e.to_string(),
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| ViewerError::Config {
      path: path.to_path_buf(),
      reason: e.to_string(),
    })
  }

  /// Saves config to standard OS location
  pub fn save(&self) -> String {
    let path = Self::get_path();
    if let Some(parent) = path.parent() {
      let _ = fs::create_dir_all(parent);
    }

    match File::create(&path) {
      Ok(file) => {
        let writer = BufWriter::new(file);
        match serde_json::to_writer_pretty(writer, self) {
          Ok(_) => format!("Config saved to {:?}", path),
          Err(e) => format!("Failed to save config: {}", e),
        }
      }
      Err(e) => format!("Could not create config file: {}", e),
    }
  }

  /// Directory for rendered images; falls back to ./cache like the page server always did.
  pub fn resolved_cache_dir(&self) -> PathBuf {
    if let Some(dir) = &self.cache_dir {
      return dir.clone();
    }
    if let Some(proj) = Self::project_dirs() {
      proj.cache_dir().to_path_buf()
    } else {
      PathBuf::from("cache")
    }
  }

  pub fn worker_count(&self) -> usize {
    if self.workers > 0 {
      self.workers
    } else {
      std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
    }
  }

  pub fn partitions(&self) -> impl Iterator<Item = &PartitionConfig> {
    std::iter::once(&self.train).chain(self.test.iter())
  }

  fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "mavensgroup", "cview-embed")
  }

  fn get_path() -> PathBuf {
    if let Some(proj) = Self::project_dirs() {
      proj.config_dir().join("settings.json")
    } else {
      PathBuf::from("settings.json")
    }
  }
}
