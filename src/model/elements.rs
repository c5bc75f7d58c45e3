// src/model/elements.rs

/// Element symbols in order of atomic number, Z = 1..=118.
const SYMBOLS: [&str; 118] = [
    "H", "He",
    "Li", "Be", "B", "C", "N", "O", "F", "Ne",
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar",
    "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn",
    "Ga", "Ge", "As", "Se", "Br", "Kr",
    "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd",
    "In", "Sn", "Sb", "Te", "I", "Xe",
    "Cs", "Ba",
    "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu",
    "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn",
    "Fr", "Ra",
    "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm", "Md", "No", "Lr",
    "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn",
    "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Returns the Atomic Number (Z) for a given element symbol, 0 if unknown.
pub fn get_atomic_number(element: &str) -> i32 {
    SYMBOLS
        .iter()
        .position(|s| *s == element)
        .map_or(0, |i| i as i32 + 1)
}

/// Accepts "fe", "FE" or "Fe1" and returns "Fe".
///
/// Structure files written by simulation codes often carry site labels
/// instead of bare symbols. A two-letter prefix that names an element wins;
/// otherwise a known first letter is kept and the rest is a label suffix.
pub fn normalize_symbol(raw: &str) -> String {
    let letters: String = raw.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let mut chars = letters.chars();
    let Some(first) = chars.next() else {
        return raw.to_string();
    };
    let single = first.to_ascii_uppercase().to_string();
    if let Some(second) = chars.next() {
        let pair = format!("{}{}", single, second.to_ascii_lowercase());
        if get_atomic_number(&pair) != 0 || get_atomic_number(&single) == 0 {
            return pair;
        }
    }
    single
}

/// Returns (radius_in_angstroms, (r, g, b))
/// Radii are display radii. Colors are standard CPK.
pub fn get_atom_properties(element: &str) -> (f64, (f64, f64, f64)) {
    match element {
        // --- Period 1 ---
        "H"  => (0.46, (1.00, 1.00, 1.00)), // White
        "He" => (0.32, (0.85, 1.00, 1.00)), // Cyan-White

        // --- Period 2 ---
        "Li" => (1.34, (0.80, 0.50, 1.00)), // Violet
        "Be" => (0.90, (0.76, 1.00, 0.00)), // Yellow-Green
        "B"  => (0.82, (1.00, 0.70, 0.70)), // Pink-Salmon
        "C"  => (0.77, (0.20, 0.20, 0.20)), // Dark Grey
        "N"  => (0.75, (0.19, 0.31, 0.97)), // Blue
        "O"  => (0.74, (1.00, 0.05, 0.05)), // Red
        "F"  => (0.71, (0.56, 0.88, 0.31)), // Green
        "Ne" => (0.69, (0.70, 0.89, 0.96)), // Light Cyan

        // --- Period 3 ---
        "Na" => (1.54, (0.67, 0.36, 0.95)), // Violet
        "Mg" => (1.30, (0.54, 1.00, 0.00)), // Forest Green
        "Al" => (1.18, (0.75, 0.65, 0.65)), // Silver-Grey
        "Si" => (1.11, (0.94, 0.78, 0.63)), // Tan
        "P"  => (1.06, (1.00, 0.50, 0.00)), // Orange
        "S"  => (1.02, (1.00, 1.00, 0.19)), // Yellow
        "Cl" => (0.99, (0.12, 0.94, 0.12)), // Bright Green
        "Ar" => (0.97, (0.50, 0.82, 0.89)), // Cyan

        // --- Period 4 (Selected Common Metals) ---
        "K"  => (1.96, (0.56, 0.25, 0.83)), // Purple
        "Ca" => (1.74, (0.24, 1.00, 0.00)), // Dark Green
        "Ti" => (1.36, (0.75, 0.76, 0.78)), // Silver
        "V"  => (1.25, (0.65, 0.65, 0.67)), // Grey
        "Cr" => (1.27, (0.54, 0.60, 0.78)), // Blue-Grey
        "Mn" => (1.39, (0.61, 0.48, 0.78)), // Purple-Grey
        "Fe" => (1.25, (0.88, 0.40, 0.20)), // Rust / Orange
        "Co" => (1.26, (0.94, 0.56, 0.63)), // Pink-ish
        "Ni" => (1.21, (0.31, 0.82, 0.31)), // Green
        "Cu" => (1.38, (0.78, 0.50, 0.20)), // Copper
        "Zn" => (1.31, (0.49, 0.50, 0.69)), // Slate
        "Ga" => (1.26, (0.76, 0.56, 0.56)), // Dark Pink
        "Ge" => (1.22, (0.40, 0.56, 0.56)), // Grey-Teal
        "As" => (1.19, (0.74, 0.50, 0.89)), // Violet
        "Se" => (1.16, (1.00, 0.63, 0.00)), // Orange
        "Br" => (1.14, (0.65, 0.16, 0.16)), // Brown
        "Kr" => (1.10, (0.36, 0.72, 0.82)), // Blue-Green

        // --- Period 5/6 (Selected) ---
        "Ag" => (1.53, (0.75, 0.75, 0.75)), // Silver
        "Sn" => (1.41, (0.40, 0.50, 0.50)), // Pewter
        "I"  => (1.33, (0.58, 0.00, 0.58)), // Purple
        "Pt" => (1.36, (0.82, 0.82, 0.88)), // Platinum
        "Au" => (1.44, (1.00, 0.82, 0.14)), // Gold
        "Pb" => (1.47, (0.34, 0.35, 0.38)), // Dark Grey

        // --- Catch-All (Unknown) ---
        _    => (1.00, (1.00, 0.08, 0.58)), // Hot Pink for errors
    }
}

/// Covalent radius in Angstrom, used for bond detection.
pub fn get_atom_cov(element: &str) -> f64 {
    match element {
        "H" => 0.31, "He" => 0.28,
        "Li" => 1.28, "Be" => 0.96, "B" => 0.84, "C" => 0.76, "N" => 0.71, "O" => 0.66,
        "F" => 0.57, "Ne" => 0.58,
        "Na" => 1.66, "Mg" => 1.41, "Al" => 1.21, "Si" => 1.11, "P" => 1.07, "S" => 1.05,
        "Cl" => 1.02, "Ar" => 1.06,
        "K" => 2.03, "Ca" => 1.76, "Sc" => 1.70, "Ti" => 1.60, "V" => 1.53, "Cr" => 1.39,
        "Mn" => 1.39, "Fe" => 1.32, "Co" => 1.26, "Ni" => 1.24, "Cu" => 1.32, "Zn" => 1.22,
        "Ga" => 1.22, "Ge" => 1.20, "As" => 1.19, "Se" => 1.20, "Br" => 1.20, "Kr" => 1.16,
        "Ag" => 1.45, "Sn" => 1.39, "I" => 1.39, "Pt" => 1.36, "Au" => 1.36, "Pb" => 1.46,
        _ => 1.50,
    }
}
