// src/jobs/mod.rs
pub mod cache;
pub mod queue;

use crate::rendering::png_data_uri;
use std::sync::Arc;

pub use cache::{CacheStats, EvictionPolicy, RenderCache};
pub use queue::{FrameRenderer, JobId, JobStatus, QueueStats, RenderQueue, Submission};

/// A finished render: what the page shows for one click.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedView {
  pub key: String,
  pub title: String,
  pub caption: String,
  pub png: Arc<Vec<u8>>,
}

impl RenderedView {
  pub fn image_uri(&self) -> String {
    png_data_uri(&self.png)
  }

  pub fn size_bytes(&self) -> usize {
    self.png.len() + self.title.len() + self.caption.len() + self.key.len()
  }
}
