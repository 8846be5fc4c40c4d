use thiserror::Error;

/// Errors produced when parsing a SMILES string. `pos` is a character
/// offset into the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The input was empty or contained only whitespace.
    #[error("empty SMILES string")]
    EmptyInput { pos: usize },
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    /// A bracket atom without a usable element symbol.
    #[error("invalid element '{text}' at position {pos}")]
    InvalidElement { pos: usize, text: String },
    #[error("unclosed bracket atom starting at position {pos}")]
    UnclosedBracket { pos: usize },
    #[error("invalid charge at position {pos}")]
    InvalidCharge { pos: usize },
    #[error("isotope overflow at position {pos}")]
    InvalidIsotope { pos: usize },
    #[error("invalid hydrogen count at position {pos}")]
    InvalidHydrogenCount { pos: usize },
    #[error("atom class overflow at position {pos}")]
    InvalidAtomClass { pos: usize },
    #[error("unmatched parenthesis at position {pos}")]
    UnmatchedParen { pos: usize },
    /// A ring-closure id opened but never closed.
    #[error("unclosed ring {id} opened at position {pos}")]
    UnclosedRing { pos: usize, id: u16 },
    /// A bond symbol not followed by an atom or ring-closure id.
    #[error("dangling bond at position {pos}")]
    DanglingBond { pos: usize },
    /// The two ends of a ring closure specify different bond types.
    #[error("conflicting bond types on ring closure {id} at position {pos}")]
    RingBondConflict { pos: usize, id: u16 },
    /// A ring closure with no atom to attach to, onto its own atom, or onto
    /// an atom that is already bonded.
    #[error("invalid ring bond {id} at position {pos}")]
    InvalidRingBond { pos: usize, id: u16 },
}

impl ParseError {
    pub fn pos(&self) -> usize {
        match self {
            Self::EmptyInput { pos }
            | Self::UnexpectedChar { pos, .. }
            | Self::InvalidElement { pos, .. }
            | Self::UnclosedBracket { pos }
            | Self::InvalidCharge { pos }
            | Self::InvalidIsotope { pos }
            | Self::InvalidHydrogenCount { pos }
            | Self::InvalidAtomClass { pos }
            | Self::UnmatchedParen { pos }
            | Self::UnclosedRing { pos, .. }
            | Self::DanglingBond { pos }
            | Self::RingBondConflict { pos, .. }
            | Self::InvalidRingBond { pos, .. } => *pos,
        }
    }
}
