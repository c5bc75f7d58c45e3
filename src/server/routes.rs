// src/server/routes.rs
// Request dispatch, kept free of any socket handling so it can be tested
// by calling `route` directly.

use super::page;
use crate::jobs::{JobId, JobStatus, RenderedView, Submission};
use crate::model::Partition;
use crate::state::AppState;
use serde_json::{json, Value};
use std::collections::HashMap;

pub const JSON: &str = "application/json";
pub const HTML: &str = "text/html; charset=utf-8";

#[derive(Debug)]
pub struct Reply {
  pub status: u16,
  pub content_type: &'static str,
  pub body: Vec<u8>,
}

impl Reply {
  fn json(status: u16, value: Value) -> Self {
    Self { status, content_type: JSON, body: value.to_string().into_bytes() }
  }

  fn error(status: u16, message: impl Into<String>) -> Self {
    Self::json(status, json!({ "error": message.into() }))
  }

  fn no_content() -> Self {
    Self { status: 204, content_type: JSON, body: Vec::new() }
  }
}

/// Splits "a=1&b=2" into a map. No percent-decoding: every parameter is an integer.
pub fn parse_query(query: &str) -> HashMap<&str, &str> {
  query
    .split('&')
    .filter(|kv| !kv.is_empty())
    .map(|kv| kv.split_once('=').unwrap_or((kv, "")))
    .collect()
}

fn int_param(params: &HashMap<&str, &str>, name: &str) -> Result<Option<usize>, String> {
  match params.get(name) {
    None => Ok(None),
    Some(v) if v.is_empty() || *v == "null" => Ok(None),
    Some(v) => v
      .parse()
      .map(Some)
      .map_err(|_| format!("parameter '{}' is not a non-negative integer: {:?}", name, v)),
  }
}

pub fn route(state: &AppState, method: &str, url: &str) -> Reply {
  if method != "GET" {
    return Reply::error(405, format!("method {} not allowed", method));
  }
  let (path, query) = url.split_once('?').unwrap_or((url, ""));
  let params = parse_query(query);

  match path {
    "/" | "/index.html" => Reply { status: 200, content_type: HTML, body: page::render().into_bytes() },
    "/api/figure" => figure(state),
    "/api/initial" => {
      let mut body = view_json(&state.initial);
      body["title"] = json!(state.initial.title);
      Reply::json(200, body)
    }
    "/api/click" => click(state, &params),
    "/api/stats" => Reply::json(200, json!(state.queue.stats())),
    p if p.starts_with("/api/jobs/") => job(state, &p["/api/jobs/".len()..]),
    _ => Reply::error(404, format!("no route for {}", path)),
  }
}

fn figure(state: &AppState) -> Reply {
  let viewer = &state.viewer;
  let store = viewer.store();
  let partitions: Vec<Value> = [Partition::Train, Partition::Test]
    .into_iter()
    .filter_map(|p| viewer.resolver().layout(p).map(|l| (p, l)))
    .map(|(p, l)| {
      json!({
        "name": p,
        "points": store.arrays(p).len(),
        "structures": l.structure_path.display().to_string(),
        "frames": l.frame_count,
        "trim_factor": l.trim_factor,
      })
    })
    .collect();
  Reply::json(
    200,
    json!({
      "title": "3D embedding with clustering",
      "points": store.len(),
      "partitions": partitions,
      "image_size": [viewer.style().width, viewer.style().height],
      "traces": store.traces(),
    }),
  )
}

/// Image payload without a title: a cached or shared render may have been
/// made for a different point than the one being answered.
fn view_json(view: &RenderedView) -> Value {
  json!({
    "status": "done",
    "caption": view.caption,
    "image": view.image_uri(),
  })
}

fn click(state: &AppState, params: &HashMap<&str, &str>) -> Reply {
  let index = match (int_param(params, "index"), int_param(params, "curve"), int_param(params, "point")) {
    (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return Reply::error(400, e),
    (Ok(Some(index)), _, _) => index,
    (Ok(None), Ok(Some(curve)), Ok(Some(point))) => match state.viewer.store().point_for(curve, point) {
      Ok(index) => index,
      Err(e) => return Reply::error(400, e.to_string()),
    },
    // Nothing clicked
    _ => return Reply::no_content(),
  };

  let (point, record) = match state.viewer.resolve(index).and_then(|p| Ok((p, state.viewer.store().record(index)?))) {
    Ok(found) => found,
    Err(e) => return Reply::error(400, e.to_string()),
  };
  log::info!("Click on point {} -> {} frame {}", index, point.partition.as_str(), point.frame);

  // The title always describes the clicked point, even when the image was
  // rendered for another point showing the same frame.
  let mut body = match state.queue.submit(&point) {
    Submission::Ready(view) => view_json(&view),
    Submission::Queued(id) => json!({ "status": "pending", "job": id }),
  };
  body["title"] = json!(point.title);
  body["point"] = json!(point);
  body["cluster"] = json!(record.cluster);
  Reply::json(200, body)
}

fn job(state: &AppState, id: &str) -> Reply {
  let Ok(id) = id.parse::<JobId>() else {
    return Reply::error(400, format!("invalid job id {:?}", id));
  };
  match state.queue.status(id) {
    None => Reply::error(404, format!("unknown job {}", id)),
    Some(JobStatus::Pending) => Reply::json(200, json!({ "status": "pending", "job": id })),
    Some(JobStatus::Done(view)) => {
      let mut body = view_json(&view);
      body["job"] = json!(id);
      Reply::json(200, body)
    }
    Some(JobStatus::Failed(message)) => Reply::json(200, json!({ "status": "failed", "job": id, "error": message })),
  }
}
