// src/utils/report.rs

use crate::model::{Partition, Structure};
use std::collections::HashMap;
use std::path::Path;

/// Heading shown above the rendered structure.
pub fn point_title(point: usize, partition: Partition, frame: usize, atom: Option<usize>, file: &Path) -> String {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    match atom {
        Some(a) => format!(
            "Configuration for point {} ({} structure {} in {}, atom {})",
            point,
            partition.as_str(),
            frame,
            name,
            a
        ),
        None => format!(
            "Configuration for point {} ({} structure {} in {})",
            point,
            partition.as_str(),
            frame,
            name
        ),
    }
}

pub fn initial_title(frame: usize) -> String {
    format!("Click a point to visualize it. Showing structure {}.", frame)
}

/// One-line caption: formula and atom count.
pub fn structure_caption(structure: &Structure) -> String {
    let n = structure.atoms.len();
    format!("{} · {} atom{}", structure.formula(), n, if n == 1 { "" } else { "s" })
}

/// Multi-line listing of a frame, written to the debug log when a frame is read
pub fn structure_summary(structure: &Structure, label: &str) -> String {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for atom in &structure.atoms {
        *counts.entry(atom.element.clone()).or_insert(0) += 1;
    }

    let mut parts: Vec<_> = counts.into_iter().collect();
    parts.sort_by(|a, b| a.0.cmp(&b.0));

    let formula_str: String = parts
        .iter()
        .map(|(el, count)| format!("{}{}", el, count))
        .collect::<Vec<_>>()
        .join(" ");

    let mut out = String::new();
    out.push_str(&format!("Frame: {}\n", label));
    out.push_str(&format!("Composition: {}\n", formula_str));
    out.push_str("--------------------------------------------------\n");
    out.push_str(&format!(
        "{:<8} {:<8} {:<10} {:<10} {:<10}\n",
        "Index", "Element", "X", "Y", "Z"
    ));
    out.push_str("--------------------------------------------------\n");

    for (i, atom) in structure.atoms.iter().take(20).enumerate() {
        out.push_str(&format!(
            "{:<8} {:<8} {:<10.4} {:<10.4} {:<10.4}\n",
            i, atom.element, atom.position[0], atom.position[1], atom.position[2]
        ));
    }

    if structure.atoms.len() > 20 {
        out.push_str(&format!("... and {} more atoms.\n", structure.atoms.len() - 20));
    }

    out
}
