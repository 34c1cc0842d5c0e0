use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecStructError {
    #[error("Unmatched closing bracket '{symbol}' at position {position}")]
    UnmatchedClose { symbol: char, position: usize },
    #[error("Unmatched opening bracket '{symbol}' at position {position}")]
    UnmatchedOpen { symbol: char, position: usize },
    #[error("Unexpected character '{symbol}' at position {position}")]
    UnexpectedCharacter { symbol: char, position: usize },
    #[error("Secondary structure covers {found} residues, pose has {expected}")]
    LengthMismatch { expected: usize, found: usize },
}

/// Helix / strand / loop propensities of one residue. The three fractions sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecStructFractions {
    pub helix: f64,
    pub strand: f64,
    pub loop_: f64,
}

impl SecStructFractions {
    pub const HELIX: Self = Self {
        helix: 1.0,
        strand: 0.0,
        loop_: 0.0,
    };
    pub const STRAND: Self = Self {
        helix: 0.0,
        strand: 1.0,
        loop_: 0.0,
    };
    pub const LOOP: Self = Self {
        helix: 0.0,
        strand: 0.0,
        loop_: 1.0,
    };

    pub fn dominant(&self) -> char {
        if self.helix >= self.strand && self.helix > self.loop_ {
            'H'
        } else if self.strand > self.loop_ {
            'E'
        } else {
            'L'
        }
    }
}

/// Per-residue secondary-structure profile, indexed by 1-based residue number.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryStructure {
    fractions: Vec<SecStructFractions>,
}

impl SecondaryStructure {
    pub fn all_loop(total_residue: usize) -> Self {
        Self {
            fractions: vec![SecStructFractions::LOOP; total_residue],
        }
    }

    pub fn from_fractions(fractions: Vec<SecStructFractions>) -> Self {
        Self { fractions }
    }

    /// Parses a DSSP-like string: `H` helix, `E` strand, anything else loop.
    pub fn from_dssp(ss: &str) -> Self {
        let fractions = ss
            .chars()
            .map(|c| match c {
                'H' | 'G' | 'I' => SecStructFractions::HELIX,
                'E' | 'B' => SecStructFractions::STRAND,
                _ => SecStructFractions::LOOP,
            })
            .collect();
        Self { fractions }
    }

    /// Paired positions of a dot-bracket string count as helix, unpaired ones as loop.
    pub fn from_dot_bracket(dot_bracket: &str) -> Result<Self, SecStructError> {
        let pairs = parse_dot_bracket(dot_bracket)?;
        let mut fractions = vec![SecStructFractions::LOOP; dot_bracket.chars().count()];
        for (i, j) in pairs {
            fractions[i - 1] = SecStructFractions::HELIX;
            fractions[j - 1] = SecStructFractions::HELIX;
        }
        Ok(Self { fractions })
    }

    pub fn len(&self) -> usize {
        self.fractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fractions.is_empty()
    }

    /// Positions past the end of the profile (e.g. virtual residues) are pure loop.
    pub fn fractions(&self, seqpos: usize) -> SecStructFractions {
        seqpos
            .checked_sub(1)
            .and_then(|i| self.fractions.get(i))
            .copied()
            .unwrap_or(SecStructFractions::LOOP)
    }

    pub fn loop_fraction(&self, seqpos: usize) -> f64 {
        self.fractions(seqpos).loop_
    }

    pub fn helix_fraction(&self, seqpos: usize) -> f64 {
        self.fractions(seqpos).helix
    }

    pub fn strand_fraction(&self, seqpos: usize) -> f64 {
        self.fractions(seqpos).strand
    }

    pub fn secstruct(&self, seqpos: usize) -> char {
        self.fractions(seqpos).dominant()
    }

    /// Letters for the window `[start, start + len)`.
    pub fn window(&self, start: usize, len: usize) -> String {
        (start..start + len).map(|i| self.secstruct(i)).collect()
    }

    pub(crate) fn remove(&mut self, seqpos: usize) {
        if seqpos >= 1 && seqpos <= self.fractions.len() {
            self.fractions.remove(seqpos - 1);
        }
    }
}

/// Returns 1-based `(i, j)` pairs with `i < j` from a dot-bracket string.
///
/// `()`, `[]`, `{}` and `<>` are tracked independently so pseudoknots can be written.
pub fn parse_dot_bracket(dot_bracket: &str) -> Result<Vec<(usize, usize)>, SecStructError> {
    const BRACKETS: [(char, char); 4] = [('(', ')'), ('[', ']'), ('{', '}'), ('<', '>')];
    let mut stacks: [Vec<usize>; 4] = Default::default();
    let mut pairs = Vec::new();

    for (idx, symbol) in dot_bracket.chars().enumerate() {
        let position = idx + 1;
        if symbol == '.' || symbol == '-' {
            continue;
        }
        if let Some(k) = BRACKETS.iter().position(|(open, _)| *open == symbol) {
            stacks[k].push(position);
        } else if let Some(k) = BRACKETS.iter().position(|(_, close)| *close == symbol) {
            let i = stacks[k]
                .pop()
                .ok_or(SecStructError::UnmatchedClose { symbol, position })?;
            pairs.push((i, position));
        } else {
            return Err(SecStructError::UnexpectedCharacter { symbol, position });
        }
    }

    for (k, stack) in stacks.iter().enumerate() {
        if let Some(&position) = stack.first() {
            return Err(SecStructError::UnmatchedOpen {
                symbol: BRACKETS[k].0,
                position,
            });
        }
    }

    pairs.sort_unstable();
    Ok(pairs)
}
