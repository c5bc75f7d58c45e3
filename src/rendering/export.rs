// src/rendering/export.rs

use super::{painter, scene};
use super::scene::RenderRequest;
use crate::error::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cairo::{Context, Format, ImageSurface};

/// Rasterizes one request to PNG bytes.
pub fn render_png(req: &RenderRequest) -> Result<Vec<u8>> {
    let scene = scene::calculate_scene(req)?;
    let surface = ImageSurface::create(Format::ARgb32, req.style.width as i32, req.style.height as i32)?;

    {
        let cr = Context::new(&surface)?;

        // Transparent unless a background is configured
        if let Some((r, g, b)) = req.style.background_color {
            cr.set_source_rgb(r, g, b);
            cr.paint()?;
        }

        let cell_alpha = if req.highlight.is_some() { 0.6 } else { 1.0 };
        painter::draw_unit_cell(&cr, &scene.cell_corners, cell_alpha)?;
        painter::draw_structure(&cr, &scene, req)?;
    }

    let mut png = Vec::new();
    surface.write_to_png(&mut png)?;
    Ok(png)
}

/// `data:` URI suitable for an `<img src>`.
pub fn png_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}
