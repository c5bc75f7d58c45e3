// src/rendering/scene.rs

use crate::config::RenderStyle;
use crate::error::{Result, ViewerError};
use crate::model::elements::{get_atom_cov, get_atom_properties};
use crate::model::Structure;
use nalgebra::{Point3, Vector3};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Everything needed to draw one image. Built fresh for every render.
#[derive(Clone, Debug)]
pub struct RenderRequest {
  pub structure: Structure,
  /// Atom drawn at full opacity; all others are dimmed. `None` dims nothing.
  pub highlight: Option<usize>,
  pub style: RenderStyle,
}

impl RenderRequest {
  pub fn validate(&self) -> Result<()> {
    if let Some(h) = self.highlight {
      if h >= self.structure.atoms.len() {
        return Err(ViewerError::Render(format!(
          "highlight atom {} out of range ({} atoms)",
          h,
          self.structure.atoms.len()
        )));
      }
    }
    let (w, h) = (self.style.width, self.style.height);
    if w == 0 || h == 0 || w > 8192 || h > 8192 {
      return Err(ViewerError::Render(format!("unsupported image size {}x{}", w, h)));
    }
    if !(1.0..=170.0).contains(&self.style.fov_deg) {
      return Err(ViewerError::Render(format!("unsupported field of view {}", self.style.fov_deg)));
    }
    Ok(())
  }

  fn alpha_for(&self, index: usize) -> f64 {
    match self.highlight {
      Some(h) if h != index => (1.0 - self.style.dim_transparency).clamp(0.0, 1.0),
      _ => 1.0,
    }
  }
}

// Used by painter.rs for drawing.
#[derive(Clone, Debug)]
pub struct RenderAtom {
  pub screen_pos: [f64; 3], // x, y (pixels), z (depth along the view direction)
  pub world: [f64; 3],
  pub radius_px: f64,
  pub element: String,
  pub original_index: usize,
  pub alpha: f64,
  pub highlighted: bool,
}

/// Perspective camera looking along a fixed direction, fitted to the scene.
#[derive(Clone, Debug)]
pub struct Camera {
  eye: Point3<f64>,
  right: Vector3<f64>,
  up: Vector3<f64>,
  forward: Vector3<f64>,
  focal: f64,
  cx: f64,
  cy: f64,
}

impl Camera {
  /// Places the camera so every sphere (center, radius) fits the frame.
  pub fn fit(spheres: &[([f64; 3], f64)], dir: [f64; 3], fov_deg: f64, width: f64, height: f64) -> Result<Self> {
    let forward = Vector3::new(dir[0], dir[1], dir[2]);
    let norm = forward.norm();
    if !norm.is_finite() || norm < 1e-9 {
      return Err(ViewerError::Render("camera direction must be non-zero".to_string()));
    }
    let forward = forward / norm;

    // Z-up unless looking straight along Z
    let world_up = if forward.z.abs() > 0.99 { Vector3::y() } else { Vector3::z() };
    let right = forward.cross(&world_up).normalize();
    let up = right.cross(&forward);

    let (mut lo, mut hi) = ([f64::MAX; 3], [f64::MIN; 3]);
    for (c, _) in spheres {
      for k in 0..3 {
        lo[k] = lo[k].min(c[k]);
        hi[k] = hi[k].max(c[k]);
      }
    }
    let center = if spheres.is_empty() {
      Point3::origin()
    } else {
      Point3::new((lo[0] + hi[0]) / 2.0, (lo[1] + hi[1]) / 2.0, (lo[2] + hi[2]) / 2.0)
    };
    let radius = spheres
      .iter()
      .map(|(c, r)| (Point3::new(c[0], c[1], c[2]) - center).norm() + r)
      .fold(1.0_f64, f64::max);

    let half_fov = fov_deg.to_radians() / 2.0;
    let distance = radius / half_fov.sin() * 1.05;
    let focal = (width.min(height) / 2.0) / half_fov.tan();

    Ok(Self {
      eye: center - forward * distance,
      right,
      up,
      forward,
      focal,
      cx: width / 2.0,
      cy: height / 2.0,
    })
  }

  /// World -> (pixel x, pixel y, depth). Depth <= 0 means behind the camera.
  pub fn project(&self, p: [f64; 3]) -> [f64; 3] {
    let v = Point3::new(p[0], p[1], p[2]) - self.eye;
    let depth = v.dot(&self.forward);
    let d = depth.max(1e-6);
    [
      self.cx + self.focal * v.dot(&self.right) / d,
      self.cy - self.focal * v.dot(&self.up) / d,
      depth,
    ]
  }

  /// Pixel size of a world length at the given depth.
  pub fn scale_at(&self, depth: f64) -> f64 {
    self.focal / depth.max(1e-6)
  }
}

pub struct Scene {
  pub atoms: Vec<RenderAtom>,
  pub bonds: Vec<(usize, usize)>,
  pub cell_corners: Vec<[f64; 3]>,
  pub camera: Camera,
}

pub fn atom_radius(element: &str, style: &RenderStyle) -> f64 {
  match style.fixed_radius {
    Some(r) => r,
    None => get_atom_properties(element).0 * style.atom_scale,
  }
}

fn lattice_corners(lattice: [[f64; 3]; 3]) -> Vec<[f64; 3]> {
  let mut raw_corners = Vec::with_capacity(8);
  for x in 0..=1 {
    for y in 0..=1 {
      for z in 0..=1 {
        let fx = x as f64;
        let fy = y as f64;
        let fz = z as f64;
        let cx = fx * lattice[0][0] + fy * lattice[1][0] + fz * lattice[2][0];
        let cy = fx * lattice[0][1] + fy * lattice[1][1] + fz * lattice[2][1];
        let cz = fx * lattice[0][2] + fy * lattice[1][2] + fz * lattice[2][2];
        raw_corners.push([cx, cy, cz]);
      }
    }
  }
  raw_corners
}

pub fn calculate_scene(req: &RenderRequest) -> Result<Scene> {
  req.validate()?;
  let structure = &req.structure;
  let style = &req.style;

  let show_cell = style.show_cell && structure.has_cell;
  let world_corners = if show_cell { lattice_corners(structure.lattice) } else { Vec::new() };

  let mut spheres: Vec<([f64; 3], f64)> = structure
    .atoms
    .iter()
    .map(|a| (a.position, atom_radius(&a.element, style)))
    .collect();
  spheres.extend(world_corners.iter().map(|&c| (c, 0.0)));

  let camera = Camera::fit(&spheres, style.camera_dir, style.fov_deg, style.width as f64, style.height as f64)?;

  let mut atoms: Vec<RenderAtom> = structure
    .atoms
    .iter()
    .enumerate()
    .map(|(i, a)| {
      let screen_pos = camera.project(a.position);
      RenderAtom {
        screen_pos,
        world: a.position,
        radius_px: atom_radius(&a.element, style) * camera.scale_at(screen_pos[2]),
        element: a.element.clone(),
        original_index: i,
        alpha: req.alpha_for(i),
        highlighted: req.highlight == Some(i),
      }
    })
    .collect();

  let bonds = if style.show_bonds {
    detect_bonds(structure, style.bond_tolerance)
  } else {
    Vec::new()
  };

  // Sort by Depth (far first) for Painter's Algorithm; bonds keep original indices
  atoms.sort_by(|a, b| b.screen_pos[2].partial_cmp(&a.screen_pos[2]).unwrap_or(Ordering::Equal));

  let cell_corners = world_corners.iter().map(|&c| camera.project(c)).collect();

  Ok(Scene { atoms, bonds, cell_corners, camera })
}

/// Pairs whose distance lies in (0.4, (cov_a + cov_b) * tolerance) Angstrom.
///
/// Atoms are binned on a grid of the largest possible bond length, so only
/// neighbouring cells are compared.
pub fn detect_bonds(structure: &Structure, tolerance: f64) -> Vec<(usize, usize)> {
  let tolerance = if tolerance < 0.1 || tolerance > 2.0 { 1.15 } else { tolerance };
  let atoms = &structure.atoms;
  if atoms.len() < 2 {
    return Vec::new();
  }

  let radii: Vec<f64> = atoms.iter().map(|a| get_atom_cov(&a.element)).collect();
  let max_r = radii.iter().cloned().fold(0.0, f64::max);
  let cell = (2.0 * max_r * tolerance).max(0.5);
  let key = |p: [f64; 3]| {
    (
      (p[0] / cell).floor() as i64,
      (p[1] / cell).floor() as i64,
      (p[2] / cell).floor() as i64,
    )
  };

  let mut grid: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
  for (i, a) in atoms.iter().enumerate() {
    grid.entry(key(a.position)).or_default().push(i);
  }

  let min_bond_dist = 0.4;
  let mut bonds = Vec::new();
  for (i, a) in atoms.iter().enumerate() {
    let (kx, ky, kz) = key(a.position);
    for dx in -1..=1 {
      for dy in -1..=1 {
        for dz in -1..=1 {
          let Some(members) = grid.get(&(kx + dx, ky + dy, kz + dz)) else {
            continue;
          };
          for &j in members {
            if j <= i {
              continue; // Avoid duplicates
            }
            let p = atoms[j].position;
            let d = ((p[0] - a.position[0]).powi(2) + (p[1] - a.position[1]).powi(2) + (p[2] - a.position[2]).powi(2)).sqrt();
            if d > min_bond_dist && d < (radii[i] + radii[j]) * tolerance {
              bonds.push((i, j));
            }
          }
        }
      }
    }
  }
  bonds.sort_unstable();
  bonds
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Atom;

  fn atom(el: &str, p: [f64; 3]) -> Atom {
    Atom { element: el.to_string(), position: p }
  }

  fn water() -> Structure {
    Structure::new(vec![
      atom("O", [0.0, 0.0, 0.0]),
      atom("H", [0.96, 0.0, 0.0]),
      atom("H", [-0.24, 0.93, 0.0]),
    ])
  }

  #[test]
  fn test_bonds_in_water() {
    let bonds = detect_bonds(&water(), 1.15);
    assert_eq!(bonds, vec![(0, 1), (0, 2)]);
  }

  #[test]
  fn test_bonds_across_grid_cells() {
    // Place atoms right on a cell boundary in every direction
    let s = Structure::new(vec![atom("C", [-0.01, -0.01, -0.01]), atom("C", [0.87, 0.87, 0.87])]);
    assert_eq!(detect_bonds(&s, 1.15), vec![(0, 1)]);

    let far = Structure::new(vec![atom("C", [0.0, 0.0, 0.0]), atom("C", [5.0, 0.0, 0.0])]);
    assert!(detect_bonds(&far, 1.15).is_empty());
  }

  #[test]
  fn test_camera_fits_scene_inside_image() {
    let style = RenderStyle::default();
    let req = RenderRequest { structure: water(), highlight: Some(1), style };
    let scene = calculate_scene(&req).unwrap();

    for a in &scene.atoms {
      let [x, y, depth] = a.screen_pos;
      assert!(depth > 0.0);
      assert!(x - a.radius_px >= 0.0 && x + a.radius_px <= 800.0, "x = {}", x);
      assert!(y - a.radius_px >= 0.0 && y + a.radius_px <= 800.0, "y = {}", y);
    }
    // Far-to-near
    assert!(scene.atoms.windows(2).all(|w| w[0].screen_pos[2] >= w[1].screen_pos[2]));

    let lit: Vec<_> = scene.atoms.iter().filter(|a| a.alpha == 1.0).collect();
    assert_eq!(lit.len(), 1);
    assert_eq!(lit[0].original_index, 1);
    assert!(lit[0].highlighted);
  }

  #[test]
  fn test_highlight_out_of_range_is_rejected() {
    let req = RenderRequest { structure: water(), highlight: Some(3), style: RenderStyle::default() };
    assert!(matches!(calculate_scene(&req), Err(ViewerError::Render(_))));
  }

  #[test]
  fn test_zero_camera_direction_is_rejected() {
    let mut style = RenderStyle::default();
    style.camera_dir = [0.0, 0.0, 0.0];
    let req = RenderRequest { structure: water(), highlight: None, style };
    assert!(calculate_scene(&req).is_err());
  }

  #[test]
  fn test_cell_corners_only_with_lattice() {
    let mut s = water();
    let req = RenderRequest { structure: s.clone(), highlight: None, style: RenderStyle::default() };
    assert!(calculate_scene(&req).unwrap().cell_corners.is_empty());

    s.has_cell = true;
    s.lattice = [[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]];
    let req = RenderRequest { structure: s, highlight: None, style: RenderStyle::default() };
    assert_eq!(calculate_scene(&req).unwrap().cell_corners.len(), 8);
  }
}
