use std::fmt;

use petgraph::graph::NodeIndex;
use serde::Serialize;

/// Chemically suspicious input. Recorded on the graph, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChemistryWarning {
    /// Bracket symbol that is not an element. Tables fall back to their
    /// defaults for it.
    UnknownElement {
        #[serde(serialize_with = "serialize_node")]
        atom: NodeIndex,
        symbol: String,
    },
    /// Sum of bond weights above what the element normally carries.
    ValenceExceeded {
        #[serde(serialize_with = "serialize_node")]
        atom: NodeIndex,
        element: String,
        bonds: u32,
        max: u32,
    },
}

impl fmt::Display for ChemistryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChemistryWarning::UnknownElement { atom, symbol } => {
                write!(f, "unknown element '{}' on atom {}", symbol, atom.index())
            }
            ChemistryWarning::ValenceExceeded {
                atom,
                element,
                bonds,
                max,
            } => write!(
                f,
                "atom {} ({}) carries {} bonds, at most {} expected",
                atom.index(),
                element,
                bonds,
                max
            ),
        }
    }
}

/// Geometry the layout had to repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutDiagnostic {
    /// A non-finite or coincident position was replaced by a unit offset.
    Degenerate {
        #[serde(serialize_with = "serialize_node")]
        atom: NodeIndex,
        reason: &'static str,
    },
}

impl fmt::Display for LayoutDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutDiagnostic::Degenerate { atom, reason } => {
                write!(f, "degenerate position for atom {}: {}", atom.index(), reason)
            }
        }
    }
}

pub(crate) fn serialize_node<S: serde::Serializer>(
    node: &NodeIndex,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(node.index() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let w = ChemistryWarning::UnknownElement {
            atom: NodeIndex::new(2),
            symbol: "Xx".into(),
        };
        assert_eq!(w.to_string(), "unknown element 'Xx' on atom 2");

        let d = LayoutDiagnostic::Degenerate {
            atom: NodeIndex::new(0),
            reason: "non-finite coordinate",
        };
        assert_eq!(
            d.to_string(),
            "degenerate position for atom 0: non-finite coordinate"
        );
    }
}
