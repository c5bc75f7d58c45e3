// src/jobs/cache.rs
// Rendered-image cache: bounded in memory, optionally backed by a directory
// so renders survive restarts.

use super::RenderedView;
use crate::config::RenderStyle;
use crate::model::ResolvedPoint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Cache entry with LRU tracking and metadata
#[derive(Clone, Debug)]
struct CacheEntry {
    view: RenderedView,
    last_used: u64,
    access_count: u64,
    size_bytes: usize,
}

impl CacheEntry {
    fn new(view: RenderedView, tick: u64) -> Self {
        let size_bytes = view.size_bytes();
        Self {
            view,
            last_used: tick,
            access_count: 1,
            size_bytes,
        }
    }
}

/// Cache statistics for the /api/stats endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub memory_mb: f64,
    pub max_memory_mb: f64,
    pub hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

/// Eviction strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvictionPolicy {
    Lru,      // Least Recently Used
    Lfu,      // Least Frequently Used
    Size,     // Largest images first
    Adaptive, // Hybrid LRU + access frequency (default)
}

impl EvictionPolicy {
    /// "lru", "lfu", "size" or "adaptive"; anything else is Adaptive.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "lru" => EvictionPolicy::Lru,
            "lfu" => EvictionPolicy::Lfu,
            "size" => EvictionPolicy::Size,
            _ => EvictionPolicy::Adaptive,
        }
    }
}

/// Sidecar written next to each cached PNG.
#[derive(Serialize, Deserialize)]
struct DiskMeta {
    title: String,
    caption: String,
}

#[derive(Debug)]
pub struct RenderCache {
    cache: HashMap<String, CacheEntry>,
    current_tick: u64,

    // Memory management
    max_entries: usize,
    max_memory_mb: f64,
    current_memory_bytes: usize,

    // Statistics
    hits: u64,
    disk_hits: u64,
    misses: u64,
    evictions: u64,

    eviction_policy: EvictionPolicy,
    disk_dir: Option<PathBuf>,
}

impl RenderCache {
    pub fn new(max_entries: usize, max_memory_mb: f64) -> Self {
        Self {
            cache: HashMap::with_capacity(max_entries.min(1024)),
            current_tick: 0,
            max_entries: max_entries.max(1),
            max_memory_mb,
            current_memory_bytes: 0,
            hits: 0,
            disk_hits: 0,
            misses: 0,
            evictions: 0,
            eviction_policy: EvictionPolicy::Adaptive,
            disk_dir: None,
        }
    }

    /// Enables the disk tier. The directory is created if missing; if that
    /// fails the cache stays memory-only.
    pub fn with_disk(mut self, dir: &Path) -> Self {
        match fs::create_dir_all(dir) {
            Ok(()) => {
                log::info!("Render cache directory: {}", dir.display());
                self.disk_dir = Some(dir.to_path_buf());
            }
            Err(e) => log::warn!("Cannot use cache directory {}: {}", dir.display(), e),
        }
        self
    }

    /// Key built from everything that changes the image.
    ///
    /// Format: "train_f000120_a002_w800x800_<dataset digest>_<style digest>".
    /// Disk entries outlive a run; the dataset digest ties each one to the
    /// structure file contents it was rendered from.
    pub fn make_key(point: &ResolvedPoint, dataset: &str, style: &RenderStyle) -> String {
        let atom = match point.atom {
            Some(a) => format!("a{:03}", a),
            None => "anone".to_string(),
        };
        format!(
            "{}_f{:06}_{}_w{}x{}_{}_{}",
            point.partition.as_str(),
            point.frame,
            atom,
            style.width,
            style.height,
            dataset,
            style.fingerprint(),
        )
    }

    /// Memory first, then disk. A disk hit is promoted into memory.
    pub fn get(&mut self, key: &str) -> Option<RenderedView> {
        self.current_tick += 1;

        if let Some(entry) = self.cache.get_mut(key) {
            entry.last_used = self.current_tick;
            entry.access_count += 1;
            self.hits += 1;
            return Some(entry.view.clone());
        }

        if let Some(view) = self.read_disk(key) {
            self.disk_hits += 1;
            self.insert_memory(view.clone());
            return Some(view);
        }

        self.misses += 1;
        None
    }

    pub fn insert(&mut self, view: RenderedView) {
        self.current_tick += 1;
        self.write_disk(&view);
        self.insert_memory(view);
    }

    fn insert_memory(&mut self, view: RenderedView) {
        let entry_size = view.size_bytes();
        if let Some(old) = self.cache.remove(&view.key) {
            self.current_memory_bytes = self.current_memory_bytes.saturating_sub(old.size_bytes);
        }
        while !self.cache.is_empty() && self.should_evict(entry_size) {
            self.evict_one();
        }
        self.current_memory_bytes += entry_size;
        self.cache.insert(view.key.clone(), CacheEntry::new(view, self.current_tick));
    }

    #[cfg(test)]
    fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    /// Check if eviction is needed
    #[inline]
    fn should_evict(&self, incoming_bytes: usize) -> bool {
        let would_exceed_entries = self.cache.len() >= self.max_entries;
        let would_exceed_memory = (self.current_memory_bytes + incoming_bytes) as f64
            > (self.max_memory_mb * 1024.0 * 1024.0);

        would_exceed_entries || would_exceed_memory
    }

    /// Evict one entry using configured policy
    fn evict_one(&mut self) {
        let victim_key = match self.eviction_policy {
            EvictionPolicy::Lru => self.find_lru(),
            EvictionPolicy::Lfu => self.find_lfu(),
            EvictionPolicy::Size => self.find_largest(),
            EvictionPolicy::Adaptive => self.find_adaptive(),
        };

        if let Some(key) = victim_key {
            if let Some(entry) = self.cache.remove(&key) {
                self.current_memory_bytes =
                    self.current_memory_bytes.saturating_sub(entry.size_bytes);
                self.evictions += 1;
                log::debug!("Evicted {} from render cache", key);
            }
        }
    }

    fn find_lru(&self) -> Option<String> {
        self.cache
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone())
    }

    fn find_lfu(&self) -> Option<String> {
        self.cache
            .iter()
            .min_by_key(|(_, entry)| (entry.access_count, entry.last_used))
            .map(|(key, _)| key.clone())
    }

    fn find_largest(&self) -> Option<String> {
        self.cache
            .iter()
            .max_by_key(|(_, entry)| entry.size_bytes)
            .map(|(key, _)| key.clone())
    }

    /// Adaptive eviction: Hybrid score = recency × frequency
    ///
    /// Score = (ticks_since_use) × (1.0 / access_count)
    /// - High score = old AND rarely used → evict first
    fn find_adaptive(&self) -> Option<String> {
        self.cache
            .iter()
            .max_by(|(_, a), (_, b)| {
                let score_a = (self.current_tick - a.last_used) as f64 / a.access_count as f64;
                let score_b = (self.current_tick - b.last_used) as f64 / b.access_count as f64;
                score_a
                    .partial_cmp(&score_b)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(key, _)| key.clone())
    }

    pub fn set_eviction_policy(&mut self, policy: EvictionPolicy) {
        self.eviction_policy = policy;
    }

    pub fn stats(&self) -> CacheStats {
        let total_requests = self.hits + self.disk_hits + self.misses;
        CacheStats {
            entries: self.cache.len(),
            max_entries: self.max_entries,
            memory_mb: self.current_memory_bytes as f64 / (1024.0 * 1024.0),
            max_memory_mb: self.max_memory_mb,
            hits: self.hits,
            disk_hits: self.disk_hits,
            misses: self.misses,
            evictions: self.evictions,
            hit_rate: if total_requests > 0 {
                (self.hits + self.disk_hits) as f64 / total_requests as f64
            } else {
                0.0
            },
        }
    }

    // --- Disk tier ---

    fn disk_paths(&self, key: &str) -> Option<(PathBuf, PathBuf)> {
        let dir = self.disk_dir.as_ref()?;
        Some((dir.join(format!("{}.png", key)), dir.join(format!("{}.json", key))))
    }

    fn read_disk(&self, key: &str) -> Option<RenderedView> {
        let (png_path, meta_path) = self.disk_paths(key)?;
        if !png_path.exists() || !meta_path.exists() {
            return None;
        }
        let png = match fs::read(&png_path) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("Failed to read cached image {}: {}", png_path.display(), e);
                return None;
            }
        };
        let meta: DiskMeta = match fs::read(&meta_path)
            .map_err(|e| e.to_string())
            .and_then(|b| serde_json::from_slice(&b).map_err(|e| e.to_string()))
        {
            Ok(m) => m,
            Err(e) => {
                log::warn!("Ignoring cache entry {}: {}", meta_path.display(), e);
                return None;
            }
        };
        log::debug!("Disk cache hit {}", key);
        Some(RenderedView {
            key: key.to_string(),
            title: meta.title,
            caption: meta.caption,
            png: Arc::new(png),
        })
    }

    fn write_disk(&self, view: &RenderedView) {
        let Some((png_path, meta_path)) = self.disk_paths(&view.key) else {
            return;
        };
        let meta = DiskMeta {
            title: view.title.clone(),
            caption: view.caption.clone(),
        };
        // Image first: a sidecar without its PNG is never read back
        let result = fs::write(&png_path, view.png.as_slice()).and_then(|_| {
            let json = serde_json::to_vec(&meta)?;
            fs::write(&meta_path, json)
        });
        if let Err(e) = result {
            log::warn!("Failed to write cache entry {}: {}", view.key, e);
        }
    }
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new(512, 256.0)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Partition;

    fn view(key: &str, bytes: usize) -> RenderedView {
        RenderedView {
            key: key.to_string(),
            title: format!("title {}", key),
            caption: String::new(),
            png: Arc::new(vec![7u8; bytes]),
        }
    }

    fn point(frame: usize, atom: Option<usize>) -> ResolvedPoint {
        ResolvedPoint {
            point: 0,
            partition: Partition::Train,
            local: 0,
            dataset_index: frame,
            structure_path: PathBuf::from("d.xyz"),
            frame,
            atom,
            title: String::new(),
        }
    }

    #[test]
    fn test_cache_key_generation() {
        let style = RenderStyle::default();
        let key = RenderCache::make_key(&point(120, Some(2)), "0123abcd", &style);
        assert!(key.starts_with("train_f000120_a002_w800x800_0123abcd_"), "{}", key);
        let none = RenderCache::make_key(&point(120, None), "0123abcd", &style);
        assert!(none.starts_with("train_f000120_anone_"));
        assert_ne!(key, none);
    }

    #[test]
    fn test_cache_key_separates_datasets() {
        let style = RenderStyle::default();
        let p = point(0, None);
        assert_ne!(RenderCache::make_key(&p, "aaaa", &style), RenderCache::make_key(&p, "bbbb", &style));
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = RenderCache::new(2, 100.0);
        cache.set_eviction_policy(EvictionPolicy::Lru);
        cache.insert(view("a", 10));
        cache.insert(view("b", 10));
        assert!(cache.get("a").is_some()); // b is now least recent
        cache.insert(view("c", 10));

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(EvictionPolicy::from_name("LFU"), EvictionPolicy::Lfu);
        assert_eq!(EvictionPolicy::from_name("size"), EvictionPolicy::Size);
        assert_eq!(EvictionPolicy::from_name("whatever"), EvictionPolicy::Adaptive);
    }

    #[test]
    fn test_largest_evicted_first() {
        let mut cache = RenderCache::new(2, 100.0);
        cache.set_eviction_policy(EvictionPolicy::Size);
        cache.insert(view("big", 500));
        cache.insert(view("small", 5));
        cache.insert(view("new", 5));
        assert!(!cache.contains("big"));
        assert!(cache.contains("small"));
    }

    #[test]
    fn test_memory_budget() {
        // ~1 KiB budget, 600-byte images: only one fits
        let mut cache = RenderCache::new(100, 1.0 / 1024.0);
        cache.insert(view("a", 600));
        cache.insert(view("b", 600));
        assert_eq!(cache.stats().entries, 1);
        assert!(cache.contains("b"));
    }

    #[test]
    fn test_hit_rate() {
        let mut cache = RenderCache::default();
        assert!(cache.get("x").is_none());
        cache.insert(view("x", 4));
        assert_eq!(cache.get("x").unwrap().title, "title x");
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert!((stats.hit_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_disk_tier_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut cache = RenderCache::new(4, 10.0).with_disk(dir.path());
            cache.insert(view("persisted", 32));
        }
        let mut fresh = RenderCache::new(4, 10.0).with_disk(dir.path());
        let v = fresh.get("persisted").unwrap();
        assert_eq!(v.png.len(), 32);
        assert_eq!(v.title, "title persisted");
        assert_eq!(fresh.stats().disk_hits, 1);
        // Promoted
        assert!(fresh.contains("persisted"));
    }

    #[test]
    fn test_corrupt_sidecar_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("k.png"), b"png").unwrap();
        fs::write(dir.path().join("k.json"), b"{").unwrap();
        let mut cache = RenderCache::new(4, 10.0).with_disk(dir.path());
        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().misses, 1);
    }
}
