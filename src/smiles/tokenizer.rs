use crate::atom::{BracketInfo, ChiralTag};
use crate::edge::BondType;
use crate::element;
use crate::smiles::error::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Atom(AtomToken),
    Bond {
        bond: BondType,
        pos: usize,
    },
    RingClosure {
        bond: Option<BondType>,
        id: u16,
        pos: usize,
    },
    OpenParen(usize),
    CloseParen(usize),
    Dot(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomToken {
    /// Symbol as written, lower case for aromatic atoms.
    pub symbol: String,
    pub bracket: Option<BracketInfo>,
    pub pos: usize,
}

/// Splits `input` into tokens. `offset` is added to every reported position.
pub fn tokenize(input: &str, offset: usize) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let pos = offset + i;
        match chars[i] {
            '[' => {
                let (tok, next) = parse_bracket_atom(&chars, i, offset)?;
                tokens.push(Token::Atom(tok));
                i = next;
            }
            'B' if chars.get(i + 1) == Some(&'r') => {
                tokens.push(bare_atom("Br", pos));
                i += 2;
            }
            'C' if chars.get(i + 1) == Some(&'l') => {
                tokens.push(bare_atom("Cl", pos));
                i += 2;
            }
            c @ ('B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I' | 'b' | 'c' | 'n' | 'o' | 'p' | 's') => {
                tokens.push(bare_atom(&c.to_string(), pos));
                i += 1;
            }
            '(' => {
                tokens.push(Token::OpenParen(pos));
                i += 1;
            }
            ')' => {
                tokens.push(Token::CloseParen(pos));
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot(pos));
                i += 1;
            }
            '%' => {
                let pending_bond = try_consume_pending_bond(&mut tokens);
                let (id, next) = parse_percent_ring(&chars, i, offset)?;
                tokens.push(Token::RingClosure {
                    bond: pending_bond,
                    id,
                    pos,
                });
                i = next;
            }
            d @ '0'..='9' => {
                let pending_bond = try_consume_pending_bond(&mut tokens);
                tokens.push(Token::RingClosure {
                    bond: pending_bond,
                    id: digit(d),
                    pos,
                });
                i += 1;
            }
            ch => match BondType::from_char(ch) {
                Some(bond) => {
                    tokens.push(Token::Bond { bond, pos });
                    i += 1;
                }
                None => return Err(ParseError::UnexpectedChar { pos, ch }),
            },
        }
    }

    Ok(tokens)
}

fn digit(c: char) -> u16 {
    c as u16 - b'0' as u16
}

fn bare_atom(symbol: &str, pos: usize) -> Token {
    Token::Atom(AtomToken {
        symbol: symbol.to_string(),
        bracket: None,
        pos,
    })
}

fn try_consume_pending_bond(tokens: &mut Vec<Token>) -> Option<BondType> {
    if let Some(Token::Bond { .. }) = tokens.last() {
        if let Some(Token::Bond { bond, .. }) = tokens.pop() {
            return Some(bond);
        }
    }
    None
}

fn parse_percent_ring(chars: &[char], start: usize, offset: usize) -> Result<(u16, usize), ParseError> {
    let i = start + 1;
    match (chars.get(i), chars.get(i + 1)) {
        (Some(a), Some(b)) if a.is_ascii_digit() && b.is_ascii_digit() => {
            Ok((digit(*a) * 10 + digit(*b), i + 2))
        }
        _ => Err(ParseError::UnexpectedChar {
            pos: offset + start,
            ch: '%',
        }),
    }
}

fn parse_bracket_atom(chars: &[char], start: usize, offset: usize) -> Result<(AtomToken, usize), ParseError> {
    let bracket_pos = offset + start;
    let mut i = start + 1; // skip '['

    let isotope = parse_isotope(chars, &mut i, offset)?;
    let symbol = parse_bracket_element(chars, &mut i, offset, bracket_pos)?;
    let chirality = parse_chirality(chars, &mut i);
    let hydrogen_count = parse_hcount(chars, &mut i, offset)?;
    let charge = parse_charge(chars, &mut i, bracket_pos)?;
    let atom_class = parse_atom_class(chars, &mut i, offset)?;

    match chars.get(i) {
        Some(']') => {}
        Some(&ch) => return Err(ParseError::UnexpectedChar { pos: offset + i, ch }),
        None => return Err(ParseError::UnclosedBracket { pos: bracket_pos }),
    }
    i += 1; // skip ']'

    Ok((
        AtomToken {
            symbol,
            bracket: Some(BracketInfo {
                hydrogen_count,
                charge,
                isotope,
                chirality,
                atom_class,
            }),
            pos: bracket_pos,
        },
        i,
    ))
}

fn parse_isotope(chars: &[char], i: &mut usize, offset: usize) -> Result<u16, ParseError> {
    let start = *i;
    let mut val: u16 = 0;
    while let Some(c) = chars.get(*i).filter(|c| c.is_ascii_digit()) {
        val = val
            .checked_mul(10)
            .and_then(|v| v.checked_add(digit(*c)))
            .ok_or(ParseError::InvalidIsotope { pos: offset + start })?;
        *i += 1;
    }
    Ok(val)
}

/// Reads the element symbol. Aromatic forms come first; an upper-case letter
/// takes a following lower-case letter when the pair is an element, or when
/// neither the pair nor the single letter is one (an unknown symbol the
/// lookup tables fall back on).
fn parse_bracket_element(
    chars: &[char],
    i: &mut usize,
    offset: usize,
    bracket_pos: usize,
) -> Result<String, ParseError> {
    let Some(&first) = chars.get(*i) else {
        return Err(ParseError::UnclosedBracket { pos: bracket_pos });
    };
    let second = chars.get(*i + 1).copied();

    if first.is_ascii_lowercase() {
        if let Some(s) = second {
            let pair: String = [first, s].iter().collect();
            if matches!(pair.as_str(), "se" | "as" | "te") {
                *i += 2;
                return Ok(pair);
            }
        }
        let single = first.to_string();
        if element::is_aromatic_symbol(&single) {
            *i += 1;
            return Ok(single);
        }
        return Err(ParseError::InvalidElement {
            pos: offset + *i,
            text: single,
        });
    }

    if first.is_ascii_uppercase() {
        let single = first.to_string();
        if let Some(s) = second.filter(|c| c.is_ascii_lowercase()) {
            let pair: String = [first, s].iter().collect();
            if element::is_known(&pair) || !element::is_known(&single) {
                *i += 2;
                return Ok(pair);
            }
        }
        *i += 1;
        return Ok(single);
    }

    Err(ParseError::InvalidElement {
        pos: offset + *i,
        text: first.to_string(),
    })
}

fn parse_chirality(chars: &[char], i: &mut usize) -> Option<ChiralTag> {
    if chars.get(*i) != Some(&'@') {
        return None;
    }
    *i += 1;
    if chars.get(*i) == Some(&'@') {
        *i += 1;
        return Some(ChiralTag::Clockwise);
    }
    // @TH1 and @TH2 are the long forms of @ and @@
    if chars.get(*i) == Some(&'T') && chars.get(*i + 1) == Some(&'H') {
        match chars.get(*i + 2) {
            Some('1') => {
                *i += 3;
                return Some(ChiralTag::Anticlockwise);
            }
            Some('2') => {
                *i += 3;
                return Some(ChiralTag::Clockwise);
            }
            _ => {}
        }
    }
    Some(ChiralTag::Anticlockwise)
}

fn parse_hcount(chars: &[char], i: &mut usize, offset: usize) -> Result<u8, ParseError> {
    if chars.get(*i) != Some(&'H') {
        return Ok(0);
    }
    let start = *i;
    *i += 1;
    let mut count: Option<u8> = None;
    while let Some(c) = chars.get(*i).filter(|c| c.is_ascii_digit()) {
        count = Some(
            count
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit(*c) as u8))
                .ok_or(ParseError::InvalidHydrogenCount { pos: offset + start })?,
        );
        *i += 1;
    }
    Ok(count.unwrap_or(1))
}

fn parse_charge(chars: &[char], i: &mut usize, bracket_pos: usize) -> Result<i8, ParseError> {
    let sign: i8 = match chars.get(*i) {
        Some('+') => 1,
        Some('-') => -1,
        _ => return Ok(0),
    };
    let symbol = chars[*i];
    *i += 1;

    if chars.get(*i) == Some(&symbol) {
        // ++ or --
        let mut count: i8 = 1;
        while chars.get(*i) == Some(&symbol) {
            count = count
                .checked_add(1)
                .ok_or(ParseError::InvalidCharge { pos: bracket_pos })?;
            *i += 1;
        }
        return Ok(sign * count);
    }

    let mut val: Option<i8> = None;
    while let Some(c) = chars.get(*i).filter(|c| c.is_ascii_digit()) {
        val = Some(
            val.unwrap_or(0)
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit(*c) as i8))
                .ok_or(ParseError::InvalidCharge { pos: bracket_pos })?,
        );
        *i += 1;
    }
    Ok(sign * val.unwrap_or(1))
}

fn parse_atom_class(chars: &[char], i: &mut usize, offset: usize) -> Result<u16, ParseError> {
    if chars.get(*i) != Some(&':') {
        return Ok(0);
    }
    let start = *i;
    *i += 1;
    let mut val: u16 = 0;
    while let Some(c) = chars.get(*i).filter(|c| c.is_ascii_digit()) {
        val = val
            .checked_mul(10)
            .and_then(|v| v.checked_add(digit(*c)))
            .ok_or(ParseError::InvalidAtomClass { pos: offset + start })?;
        *i += 1;
    }
    Ok(val)
}
