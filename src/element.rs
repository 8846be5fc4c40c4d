//! Static element lookup tables.
//!
//! Every table is a read-only `static`. Lookups take the canonical symbol
//! (`"C"`, `"Cl"`, `"Se"`) and fall back to explicit defaults for symbols the
//! tables do not know, so layout can keep going on odd input.

/// Atomic number used for unknown symbols.
pub const FALLBACK_ATOMIC_NUMBER: u8 = 1;

/// Maximum bond count used for symbols missing from [`MAX_BONDS`].
pub const FALLBACK_MAX_BONDS: u8 = 1;

static SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne",
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca",
    "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn",
    "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr",
    "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn",
    "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd",
    "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb",
    "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th",
    "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm",
    "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds",
    "Rg", "Cn", "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Drawing-oriented bond limits. These are what the layout assumes an atom
/// can carry when it fills in implicit hydrogens for priority ranking.
pub static MAX_BONDS: [(&str, u8); 11] = [
    ("H", 1),
    ("B", 3),
    ("C", 4),
    ("N", 3),
    ("O", 2),
    ("P", 3),
    ("S", 2),
    ("F", 1),
    ("Cl", 1),
    ("Br", 1),
    ("I", 1),
];

/// Atomic number for a canonical symbol, `None` if the symbol is not an element.
pub fn lookup_atomic_number(symbol: &str) -> Option<u8> {
    SYMBOLS
        .iter()
        .position(|s| *s == symbol)
        .map(|i| (i + 1) as u8)
}

/// Atomic number with the unknown-symbol fallback applied.
pub fn atomic_number(symbol: &str) -> u8 {
    lookup_atomic_number(symbol).unwrap_or(FALLBACK_ATOMIC_NUMBER)
}

pub fn is_known(symbol: &str) -> bool {
    lookup_atomic_number(symbol).is_some()
}

pub fn symbol(atomic_number: u8) -> Option<&'static str> {
    SYMBOLS.get((atomic_number as usize).checked_sub(1)?).copied()
}

pub fn max_bonds(symbol: &str) -> u8 {
    MAX_BONDS
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, n)| *n)
        .unwrap_or(FALLBACK_MAX_BONDS)
}

/// Normal valences used to derive implicit hydrogen counts, smallest first.
/// Empty for elements without a conventional organic valence.
pub fn default_valences(symbol: &str) -> &'static [u8] {
    match symbol {
        "H" => &[1],
        "B" => &[3],
        "C" => &[4],
        "N" => &[3, 5],
        "O" => &[2],
        "F" | "Cl" | "Br" | "At" => &[1],
        "Si" | "Ge" => &[4],
        "P" | "As" => &[3, 5],
        "S" | "Se" | "Te" => &[2, 4, 6],
        "I" => &[1, 3, 5, 7],
        _ => &[],
    }
}

/// Symbols that may appear outside brackets.
pub fn is_organic_subset(symbol: &str) -> bool {
    matches!(
        symbol,
        "B" | "C" | "N" | "O" | "P" | "S" | "F" | "Cl" | "Br" | "I"
    )
}

/// Lower-case symbols accepted for aromatic atoms. The single letters are
/// valid bare, the two-letter ones only inside brackets.
pub fn is_aromatic_symbol(symbol: &str) -> bool {
    matches!(symbol, "b" | "c" | "n" | "o" | "p" | "s" | "se" | "as" | "te")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_numbers() {
        assert_eq!(atomic_number("H"), 1);
        assert_eq!(atomic_number("C"), 6);
        assert_eq!(atomic_number("Cl"), 17);
        assert_eq!(atomic_number("Og"), 118);
    }

    #[test]
    fn unknown_symbol_falls_back() {
        assert_eq!(lookup_atomic_number("Xx"), None);
        assert_eq!(atomic_number("Xx"), 1);
        assert_eq!(max_bonds("Xx"), 1);
        assert!(default_valences("Xx").is_empty());
    }

    #[test]
    fn max_bonds_table() {
        assert_eq!(max_bonds("C"), 4);
        assert_eq!(max_bonds("N"), 3);
        assert_eq!(max_bonds("O"), 2);
        assert_eq!(max_bonds("Br"), 1);
        // listed only through the fallback
        assert_eq!(max_bonds("Fe"), 1);
    }

    #[test]
    fn symbol_round_trip() {
        for n in 1..=118u8 {
            let s = symbol(n).unwrap();
            assert_eq!(atomic_number(s), n);
        }
        assert_eq!(symbol(0), None);
        assert_eq!(symbol(119), None);
    }

    #[test]
    fn organic_and_aromatic_sets() {
        assert!(is_organic_subset("Cl"));
        assert!(!is_organic_subset("Na"));
        assert!(is_aromatic_symbol("se"));
        assert!(!is_aromatic_symbol("C"));
    }
}
