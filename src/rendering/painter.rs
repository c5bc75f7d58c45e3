// src/rendering/painter.rs

use super::primitives::*;
use super::scene::{atom_radius, RenderAtom, RenderRequest, Scene};
use crate::error::Result;
use crate::model::elements::get_atom_properties;
use cairo::Context;
use std::cmp::Ordering;

// ============================================================================
// UNIT CELL DRAWING
// ============================================================================

pub fn draw_unit_cell(cr: &Context, corners: &[[f64; 3]], alpha: f64) -> Result<()> {
    if corners.len() != 8 {
        return Ok(());
    }

    cr.set_source_rgba(0.5, 0.5, 0.5, alpha);
    cr.set_line_width(1.5);

    let edges = [
        (0, 1),
        (0, 2),
        (0, 4),
        (1, 3),
        (1, 5),
        (2, 3),
        (2, 6),
        (4, 5),
        (4, 6),
        (7, 6),
        (7, 5),
        (7, 3),
    ];

    for (start, end) in edges {
        let p1 = corners[start];
        let p2 = corners[end];
        cr.move_to(p1[0], p1[1]);
        cr.line_to(p2[0], p2[1]);
    }
    cr.stroke()?;
    Ok(())
}

// ============================================================================
// MAIN STRUCTURE DRAWING
// ============================================================================

struct ScreenBond {
    start: [f64; 3],
    end: [f64; 3],
    radius: f64,
    alpha: f64,
}

pub fn draw_structure(cr: &Context, scene: &Scene, req: &RenderRequest) -> Result<()> {
    let style = &req.style;

    // Atoms are depth sorted; bonds refer to original indices
    let mut by_index: Vec<Option<&RenderAtom>> = vec![None; scene.atoms.len()];
    for atom in &scene.atoms {
        by_index[atom.original_index] = Some(atom);
    }

    // ========================================================================
    // STEP 1: Collect Bonds (trimmed to the sphere surfaces)
    // ========================================================================
    let mut render_bonds: Vec<ScreenBond> = Vec::with_capacity(scene.bonds.len());
    for &(i, j) in &scene.bonds {
        let (Some(a), Some(b)) = (by_index[i], by_index[j]) else {
            continue;
        };
        let v = [
            b.world[0] - a.world[0],
            b.world[1] - a.world[1],
            b.world[2] - a.world[2],
        ];
        let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();

        // Offset bonds to avoid overlapping atoms
        let off1 = atom_radius(&a.element, style) * 0.95;
        let off2 = atom_radius(&b.element, style) * 0.95;
        if len <= off1 + off2 {
            continue;
        }
        let t1 = off1 / len;
        let t2 = off2 / len;
        let start = scene.camera.project([a.world[0] + v[0] * t1, a.world[1] + v[1] * t1, a.world[2] + v[2] * t1]);
        let end = scene.camera.project([b.world[0] - v[0] * t2, b.world[1] - v[1] * t2, b.world[2] - v[2] * t2]);

        let mid_depth = (start[2] + end[2]) / 2.0;
        render_bonds.push(ScreenBond {
            start,
            end,
            radius: style.bond_radius * scene.camera.scale_at(mid_depth),
            alpha: a.alpha.max(b.alpha),
        });
    }

    // Sort bonds by depth (far first)
    render_bonds.sort_by(|a, b| {
        let z_a = (a.start[2] + a.end[2]) / 2.0;
        let z_b = (b.start[2] + b.end[2]) / 2.0;
        z_b.partial_cmp(&z_a).unwrap_or(Ordering::Equal) // NaN-safe
    });

    // ========================================================================
    // STEP 2: Draw Bonds (Layer 0 - Behind atoms)
    // ========================================================================
    for bond in render_bonds {
        draw_cylinder_impostor(
            cr,
            bond.start,
            bond.end,
            bond.radius,
            style.bond_color,
            style.metallic,
            style.roughness,
            1.0 - bond.alpha,
        )?;
    }

    // ========================================================================
    // STEP 3: Draw Atoms (Layer 1 - Front, far to near)
    // ========================================================================
    for atom in &scene.atoms {
        let (_, default_rgb) = get_atom_properties(&atom.element);
        let rgb = style.element_colors.get(&atom.element).copied().unwrap_or(default_rgb);

        if atom.highlighted {
            draw_selection_glow(cr, atom.screen_pos[0], atom.screen_pos[1], atom.radius_px)?;
        }

        draw_atom_vector(
            cr,
            atom.screen_pos[0],
            atom.screen_pos[1],
            atom.radius_px,
            rgb,
            atom.alpha,
            style.metallic,
            style.roughness,
        )?;
    }
    Ok(())
}
