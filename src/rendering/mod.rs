pub mod export;
pub mod painter;
pub mod primitives;
pub mod scene;

// Re-export specific functions to keep the API clean for the rest of the app
pub use export::{png_data_uri, render_png};
pub use scene::RenderRequest;
