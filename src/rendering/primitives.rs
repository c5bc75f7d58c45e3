// src/rendering/primitives.rs

use crate::error::Result;
use cairo::{Context, LinearGradient, RadialGradient};
use std::f64::consts::PI;

fn lighten(c: f64, by: f64) -> f64 {
    (c + by).min(1.0)
}

/// Shaded sphere: specular highlight offset to the top-left, darker rim.
#[allow(clippy::too_many_arguments)]
pub fn draw_atom_vector(
    cr: &Context,
    x: f64,
    y: f64,
    radius: f64,
    color: (f64, f64, f64),
    alpha: f64,
    metallic: f64,
    roughness: f64,
) -> Result<()> {
    if radius <= 0.0 || alpha <= 0.0 {
        return Ok(());
    }
    let (r, g, b) = color;

    let spec_r = 1.0 + (r - 1.0) * metallic;
    let spec_g = 1.0 + (g - 1.0) * metallic;
    let spec_b = 1.0 + (b - 1.0) * metallic;
    let highlight_size = 0.05 + roughness * 0.35;

    // 1. Create a Radial Gradient to simulate 3D lighting
    let gradient = RadialGradient::new(
        x - radius * 0.3,
        y - radius * 0.3,
        radius * highlight_size,
        x,
        y,
        radius,
    );

    // "Shininess" (Highlight) -> Base Color -> Shadow
    gradient.add_color_stop_rgba(0.0, spec_r, spec_g, spec_b, alpha * (1.0 - roughness * 0.5));
    gradient.add_color_stop_rgba(0.2, lighten(r, 0.2), lighten(g, 0.2), lighten(b, 0.2), alpha);
    gradient.add_color_stop_rgba(1.0, r * 0.6, g * 0.6, b * 0.6, alpha);

    // 2. Draw the Circle
    cr.set_source(&gradient)?;
    cr.arc(x, y, radius, 0.0, 2.0 * PI);
    cr.fill()?;

    // Thin outline for crispness
    cr.set_source_rgba(0.0, 0.0, 0.0, 0.3 * alpha);
    cr.set_line_width((radius * 0.05).max(0.5));
    cr.arc(x, y, radius, 0.0, 2.0 * PI);
    cr.stroke()?;
    Ok(())
}

/// Ring drawn behind the highlighted atom.
pub fn draw_selection_glow(cr: &Context, x: f64, y: f64, radius: f64) -> Result<()> {
    cr.save()?;
    let glow = RadialGradient::new(x, y, radius, x, y, radius + 6.0);
    glow.add_color_stop_rgba(0.0, 1.0, 0.85, 0.0, 0.9);
    glow.add_color_stop_rgba(1.0, 1.0, 0.85, 0.0, 0.0);
    cr.set_source(&glow)?;
    cr.arc(x, y, radius + 6.0, 0.0, 2.0 * PI);
    cr.fill()?;
    cr.restore()?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn draw_cylinder_impostor(
    cr: &Context,
    p1: [f64; 3],
    p2: [f64; 3],
    radius: f64,
    color: (f64, f64, f64),
    metallic: f64,
    roughness: f64,
    transmission: f64,
) -> Result<()> {
    let dx = p2[0] - p1[0];
    let dy = p2[1] - p1[1];
    let len_sq = dx * dx + dy * dy;
    if len_sq < 0.0001 {
        return Ok(());
    }

    let nx = -dy / len_sq.sqrt();
    let ny = dx / len_sq.sqrt();

    let c1x = p1[0] + nx * radius;
    let c1y = p1[1] + ny * radius;
    let c2x = p2[0] + nx * radius;
    let c2y = p2[1] + ny * radius;
    let c3x = p2[0] - nx * radius;
    let c3y = p2[1] - ny * radius;
    let c4x = p1[0] - nx * radius;
    let c4y = p1[1] - ny * radius;

    let gradient = LinearGradient::new(c1x, c1y, c4x, c4y);
    let (r, g, b) = color;
    let alpha = 1.0 - transmission;

    let sr = 1.0 + (r - 1.0) * metallic;
    let sg = 1.0 + (g - 1.0) * metallic;
    let sb = 1.0 + (b - 1.0) * metallic;

    let shadow = 0.3 - (metallic * 0.2);

    gradient.add_color_stop_rgba(0.0, r * shadow, g * shadow, b * shadow, alpha);
    gradient.add_color_stop_rgba(0.3, r, g, b, alpha);

    let h_width = 0.05 + roughness * 0.2;
    gradient.add_color_stop_rgba(0.5 - h_width, r, g, b, alpha);
    gradient.add_color_stop_rgba(0.5, sr, sg, sb, alpha * (1.0 - roughness * 0.3));
    gradient.add_color_stop_rgba(0.5 + h_width, r, g, b, alpha);

    gradient.add_color_stop_rgba(0.7, r, g, b, alpha);
    gradient.add_color_stop_rgba(1.0, r * shadow, g * shadow, b * shadow, alpha);

    cr.set_source(&gradient)?;
    cr.move_to(c1x, c1y);
    cr.line_to(c2x, c2y);
    cr.line_to(c3x, c3y);
    cr.line_to(c4x, c4y);
    cr.close_path();
    cr.fill()?;
    Ok(())
}
