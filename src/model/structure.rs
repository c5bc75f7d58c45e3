// src/model/structure.rs

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub element: String,
    pub position: [f64; 3],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    // Lattice vectors: [a_vec, b_vec, c_vec]
    pub lattice: [[f64; 3]; 3],
    pub atoms: Vec<Atom>,
    /// False when the frame carried no lattice (the 20 A placeholder box).
    pub has_cell: bool,
    pub pbc: [bool; 3],
}

impl Structure {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self {
            lattice: [[20.0, 0.0, 0.0], [0.0, 20.0, 0.0], [0.0, 0.0, 20.0]],
            atoms,
            has_cell: false,
            pbc: [false; 3],
        }
    }

    /// Hill-ordered formula, e.g. "C2H6O".
    pub fn formula(&self) -> String {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for atom in &self.atoms {
            match counts.iter_mut().find(|(el, _)| *el == atom.element) {
                Some((_, n)) => *n += 1,
                None => counts.push((atom.element.clone(), 1)),
            }
        }
        let has_carbon = counts.iter().any(|(el, _)| el == "C");
        counts.sort_by(|a, b| {
            let rank = |el: &str| match (has_carbon, el) {
                (true, "C") => 0,
                (true, "H") => 1,
                _ => 2,
            };
            rank(&a.0).cmp(&rank(&b.0)).then_with(|| a.0.cmp(&b.0))
        });
        counts
            .into_iter()
            .map(|(el, n)| if n == 1 { el } else { format!("{}{}", el, n) })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(el: &str, x: f64) -> Atom {
        Atom { element: el.to_string(), position: [x, 0.0, 0.0] }
    }

    #[test]
    fn test_hill_formula() {
        let s = Structure::new(vec![atom("O", 0.0), atom("H", 1.0), atom("C", 2.0), atom("H", 3.0), atom("C", 4.0)]);
        assert_eq!(s.formula(), "C2H2O");

        let water = Structure::new(vec![atom("O", 0.0), atom("H", 1.0), atom("H", 2.0)]);
        assert_eq!(water.formula(), "H2O");
    }
}
