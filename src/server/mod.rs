// src/server/mod.rs
// HTTP surface. Requests are answered on this thread; rendering happens on
// the job queue's workers, so no handler blocks on a render.

pub mod page;
pub mod routes;

use crate::state::AppState;
use anyhow::Result;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Response, Server};

pub use routes::{route, Reply};

/// Serves until the process is stopped.
pub fn run(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let server = Server::http(&addr).map_err(|e| anyhow::anyhow!("Failed to start server on {}: {}", addr, e))?;

    let url = format!("http://{}", addr);
    log::info!("Server ready at {}", url);
    log::info!("Press Ctrl+C to stop");

    if state.config.open_browser {
        open_browser_later(url);
    }

    for request in server.incoming_requests() {
        let method = request.method().to_string();
        let reply = route(&state, &method, request.url());
        log::debug!("{} {} -> {}", method, request.url(), reply.status);

        let mut response = Response::from_data(reply.body).with_status_code(reply.status);
        if let Ok(header) = Header::from_bytes("Content-Type", reply.content_type) {
            response = response.with_header(header);
        }
        if let Err(e) = request.respond(response) {
            log::warn!("Failed to send response: {}", e);
        }
    }
    Ok(())
}

// Gives the listener time to come up before the browser connects
fn open_browser_later(url: String) {
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(2));
        if let Err(e) = webbrowser::open(&url) {
            log::warn!("Could not open browser: {}. Please open {} manually.", e, url);
        }
    });
}
