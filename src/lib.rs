//! SMILES parsing, ring perception and 2D coordinate generation for
//! structure diagrams.
//!
//! ```
//! use crabdepict::{depict, LayoutOptions};
//!
//! let drawing = depict("c1ccccc1O", &LayoutOptions::default()).unwrap();
//! assert_eq!(drawing.atoms.len(), 7);
//! assert_eq!(drawing.rings.len(), 1);
//! ```

pub mod atom;
pub mod depiction;
pub mod diagnostics;
pub mod edge;
pub mod element;
pub mod graph;
pub mod layout;
pub mod options;
pub mod ring;
pub mod rings;
pub mod smiles;
pub mod vector2;

pub use atom::{Atom, BracketInfo, ChiralTag, Chirality, Direction, PseudoElement};
pub use depiction::{DepictedAtom, DepictedEdge, DepictedRing, Depiction};
pub use diagnostics::{ChemistryWarning, LayoutDiagnostic};
pub use edge::{BondType, Edge};
pub use graph::Graph;
pub use layout::{Layout, LayoutStage};
pub use options::LayoutOptions;
pub use ring::{Ring, RingConnection};
pub use rings::RingSystem;
pub use smiles::{parse_smiles, ParseError};
pub use vector2::Vector2;

/// Failure of the [`depict`] pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Parses `smiles`, perceives its rings and lays it out.
pub fn depict(smiles: &str, options: &LayoutOptions) -> Result<Depiction> {
    let mut graph = parse_smiles(smiles)?;
    let rings = RingSystem::perceive(&mut graph);
    let mut layout = Layout::new(graph, rings, options.clone());
    layout.run();
    Ok(Depiction::from_layout(&layout))
}

#[cfg(test)]
mod tests;
