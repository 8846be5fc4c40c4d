use serde::Deserialize;

/// Tuning knobs for [`Layout`](crate::layout::Layout).
///
/// Every field has a default, so a partial JSON object is enough:
///
/// ```
/// use crabdepict::LayoutOptions;
///
/// let opts: LayoutOptions = serde_json::from_str(r#"{ "bond_length": 30.0 }"#).unwrap();
/// assert_eq!(opts.bond_length, 30.0);
/// assert!(opts.isomeric);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Distance between bonded atoms.
    pub bond_length: f64,
    /// Per-atom overlap score above which an atom counts as overlapping.
    pub overlap_sensitivity: f64,
    /// Passes of the rotatable-bond overlap resolution.
    pub overlap_resolution_iterations: usize,
    /// Perceive stereocenters and assign wedges.
    pub isomeric: bool,
    /// Fold terminal groups such as CF3 into their neighbour's label.
    pub compact_drawing: bool,
    /// Label terminal carbons explicitly.
    pub terminal_carbons: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            bond_length: 1.0,
            overlap_sensitivity: 0.42,
            overlap_resolution_iterations: 1,
            isomeric: true,
            compact_drawing: true,
            terminal_carbons: false,
        }
    }
}

impl LayoutOptions {
    pub fn bond_length_sq(&self) -> f64 {
        self.bond_length * self.bond_length
    }
}
