// src/jobs/queue.rs
// Background render jobs. Clicks submit a resolved point; the page polls
// the returned job id until the image is ready.

use super::{CacheStats, RenderCache, RenderedView};
use crate::error::{Result, ViewerError};
use crate::model::ResolvedPoint;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

pub type JobId = u64;

/// Anything that can turn a resolved point into an image.
pub trait FrameRenderer: Send + Sync + 'static {
  /// Cache key for the image of `point`. Equal keys mean equal images.
  fn cache_key(&self, point: &ResolvedPoint) -> String;
  fn render(&self, point: &ResolvedPoint) -> Result<RenderedView>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum JobStatus {
  Pending,
  Done(RenderedView),
  Failed(String),
}

/// Result of a submit: either served from cache or queued.
#[derive(Clone, Debug, PartialEq)]
pub enum Submission {
  Ready(RenderedView),
  Queued(JobId),
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
  pub pending: usize,
  pub finished: usize,
  pub submitted: u64,
  pub workers: usize,
  pub cache: CacheStats,
}

#[derive(Default)]
struct JobTable {
  next_id: JobId,
  submitted: u64,
  status: HashMap<JobId, JobStatus>,
  // cache key -> job rendering it
  in_flight: HashMap<String, JobId>,
  // Oldest first; trimmed to `max_finished`
  finished: VecDeque<JobId>,
}

impl JobTable {
  fn finish(&mut self, id: JobId, key: &str, status: JobStatus, max_finished: usize) {
    self.in_flight.remove(key);
    self.status.insert(id, status);
    self.finished.push_back(id);
    while self.finished.len() > max_finished {
      if let Some(old) = self.finished.pop_front() {
        self.status.remove(&old);
      }
    }
  }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
  // A panicking render must not wedge the queue
  m.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct RenderQueue<R: FrameRenderer> {
  pool: ThreadPool,
  workers: usize,
  renderer: Arc<R>,
  cache: Arc<Mutex<RenderCache>>,
  jobs: Arc<Mutex<JobTable>>,
  max_finished: usize,
}

impl<R: FrameRenderer> RenderQueue<R> {
  pub fn new(renderer: Arc<R>, cache: RenderCache, workers: usize, max_finished: usize) -> Result<Self> {
    let workers = workers.max(1);
    let pool = ThreadPoolBuilder::new()
      .num_threads(workers)
      .thread_name(|i| format!("render-{}", i))
      .panic_handler(|_| log::error!("Render worker panicked"))
      .build()
      .map_err(|e| ViewerError::Render(format!("cannot start render workers: {}", e)))?;
    log::info!("Render queue ready with {} worker(s)", workers);
    Ok(Self {
      pool,
      workers,
      renderer,
      cache: Arc::new(Mutex::new(cache)),
      jobs: Arc::new(Mutex::new(JobTable::default())),
      max_finished: max_finished.max(1),
    })
  }

  /// Cached images come back immediately. Otherwise a job is queued, unless
  /// one for the same image is already running, in which case its id is
  /// returned.
  pub fn submit(&self, point: &ResolvedPoint) -> Submission {
    let key = self.renderer.cache_key(point);
    if let Some(view) = lock(&self.cache).get(&key) {
      log::debug!("Cache hit for point {} ({})", point.point, key);
      return Submission::Ready(view);
    }

    let mut jobs = lock(&self.jobs);
    jobs.submitted += 1;
    if let Some(&id) = jobs.in_flight.get(&key) {
      log::debug!("Point {} joins running job {}", point.point, id);
      return Submission::Queued(id);
    }
    jobs.next_id += 1;
    let id = jobs.next_id;
    jobs.status.insert(id, JobStatus::Pending);
    jobs.in_flight.insert(key.clone(), id);
    drop(jobs);

    log::info!("Queued job {} for point {}", id, point.point);
    let renderer = Arc::clone(&self.renderer);
    let cache = Arc::clone(&self.cache);
    let table = Arc::clone(&self.jobs);
    let max_finished = self.max_finished;
    let point = point.clone();
    self.pool.spawn(move || {
      let status = run_job(renderer.as_ref(), &point, &cache);
      lock(&table).finish(id, &key, status, max_finished);
    });
    Submission::Queued(id)
  }

  /// `None` for ids that were never issued or have aged out.
  pub fn status(&self, id: JobId) -> Option<JobStatus> {
    lock(&self.jobs).status.get(&id).cloned()
  }

  /// Renders on the calling thread, going through the cache.
  pub fn render_now(&self, point: &ResolvedPoint) -> Result<RenderedView> {
    let key = self.renderer.cache_key(point);
    if let Some(view) = lock(&self.cache).get(&key) {
      return Ok(view);
    }
    let view = self.renderer.render(point)?;
    lock(&self.cache).insert(view.clone());
    Ok(view)
  }

  pub fn cache_stats(&self) -> CacheStats {
    lock(&self.cache).stats()
  }

  pub fn stats(&self) -> QueueStats {
    let cache = self.cache_stats();
    let jobs = lock(&self.jobs);
    QueueStats {
      pending: jobs.in_flight.len(),
      finished: jobs.finished.len(),
      submitted: jobs.submitted,
      workers: self.workers,
      cache,
    }
  }
}

fn run_job<R: FrameRenderer>(renderer: &R, point: &ResolvedPoint, cache: &Mutex<RenderCache>) -> JobStatus {
  let started = std::time::Instant::now();
  match catch_unwind(AssertUnwindSafe(|| renderer.render(point))) {
    Ok(Ok(view)) => {
      log::info!(
        "Rendered point {} (frame {}) in {:.0} ms",
        point.point,
        point.frame,
        started.elapsed().as_secs_f64() * 1000.0
      );
      lock(cache).insert(view.clone());
      JobStatus::Done(view)
    }
    Ok(Err(e)) => {
      log::error!("Render failed for point {}: {}", point.point, e);
      JobStatus::Failed(e.to_string())
    }
    Err(_) => {
      log::error!("Render panicked for point {}", point.point);
      JobStatus::Failed(format!("renderer crashed on point {}", point.point))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Partition;
  use std::path::PathBuf;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::mpsc;
  use std::time::{Duration, Instant};

  struct FakeRenderer {
    calls: AtomicUsize,
    // Renders block until the test sends on this
    gate: Mutex<Option<mpsc::Receiver<()>>>,
  }

  impl FakeRenderer {
    fn new() -> Self {
      Self { calls: AtomicUsize::new(0), gate: Mutex::new(None) }
    }

    fn gated() -> (Self, mpsc::Sender<()>) {
      let (tx, rx) = mpsc::channel();
      (Self { calls: AtomicUsize::new(0), gate: Mutex::new(Some(rx)) }, tx)
    }
  }

  impl FrameRenderer for FakeRenderer {
    fn cache_key(&self, point: &ResolvedPoint) -> String {
      format!("f{}", point.frame)
    }

    fn render(&self, point: &ResolvedPoint) -> Result<RenderedView> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if let Some(rx) = lock(&self.gate).as_ref() {
        let _ = rx.recv_timeout(Duration::from_secs(5));
      }
      if point.frame == 666 {
        return Err(ViewerError::Render("bad frame".into()));
      }
      if point.frame == 667 {
        panic!("boom");
      }
      Ok(RenderedView {
        key: self.cache_key(point),
        title: format!("frame {}", point.frame),
        caption: String::new(),
        png: Arc::new(vec![1, 2, 3]),
      })
    }
  }

  fn point(index: usize, frame: usize) -> ResolvedPoint {
    ResolvedPoint {
      point: index,
      partition: Partition::Train,
      local: index,
      dataset_index: frame,
      structure_path: PathBuf::from("d.xyz"),
      frame,
      atom: None,
      title: String::new(),
    }
  }

  fn wait<R: FrameRenderer>(queue: &RenderQueue<R>, id: JobId) -> JobStatus {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
      match queue.status(id) {
        Some(JobStatus::Pending) if Instant::now() < deadline => std::thread::sleep(Duration::from_millis(5)),
        Some(status) => return status,
        None => panic!("job {} vanished", id),
      }
    }
  }

  #[test]
  fn test_job_completes_then_hits_cache() {
    let renderer = Arc::new(FakeRenderer::new());
    let queue = RenderQueue::new(Arc::clone(&renderer), RenderCache::default(), 2, 16).unwrap();
    let Submission::Queued(id) = queue.submit(&point(0, 5)) else {
      panic!("expected a queued job");
    };
    match wait(&queue, id) {
      JobStatus::Done(view) => assert_eq!(view.title, "frame 5"),
      other => panic!("unexpected {:?}", other),
    }
    // Same frame from a different point is served from cache
    assert!(matches!(queue.submit(&point(3, 5)), Submission::Ready(_)));
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_in_flight_dedup() {
    let (renderer, release) = FakeRenderer::gated();
    let renderer = Arc::new(renderer);
    let queue = RenderQueue::new(Arc::clone(&renderer), RenderCache::default(), 2, 16).unwrap();
    let a = queue.submit(&point(0, 9));
    let b = queue.submit(&point(1, 9));
    assert_eq!(a, b);
    release.send(()).unwrap();
    let Submission::Queued(id) = a else { panic!("expected a queued job") };
    assert!(matches!(wait(&queue, id), JobStatus::Done(_)));
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_failures_are_reported() {
    let queue = RenderQueue::new(Arc::new(FakeRenderer::new()), RenderCache::default(), 1, 16).unwrap();
    let Submission::Queued(err_id) = queue.submit(&point(0, 666)) else { panic!() };
    let Submission::Queued(panic_id) = queue.submit(&point(1, 667)) else { panic!() };
    assert!(matches!(wait(&queue, err_id), JobStatus::Failed(m) if m.contains("bad frame")));
    assert!(matches!(wait(&queue, panic_id), JobStatus::Failed(_)));
    // Failures are not cached; the queue still works
    assert!(matches!(queue.submit(&point(2, 666)), Submission::Queued(_)));
    assert!(queue.render_now(&point(3, 1)).is_ok());
  }

  #[test]
  fn test_finished_jobs_age_out() {
    let queue = RenderQueue::new(Arc::new(FakeRenderer::new()), RenderCache::default(), 1, 2).unwrap();
    let mut ids = Vec::new();
    for frame in 0..3 {
      if let Submission::Queued(id) = queue.submit(&point(frame, frame)) {
        wait(&queue, id);
        ids.push(id);
      }
    }
    assert_eq!(ids.len(), 3);
    assert!(queue.status(ids[0]).is_none());
    assert!(queue.status(ids[2]).is_some());
    assert!(queue.status(999).is_none());
  }

  #[test]
  fn test_render_now_fills_cache() {
    let queue = RenderQueue::new(Arc::new(FakeRenderer::new()), RenderCache::default(), 1, 4).unwrap();
    let view = queue.render_now(&point(0, 42)).unwrap();
    assert_eq!(view.key, "f42");
    assert!(matches!(queue.submit(&point(0, 42)), Submission::Ready(_)));
    assert_eq!(queue.cache_stats().entries, 1);
  }
}
