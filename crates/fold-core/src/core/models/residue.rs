use super::atom::Atom;
use nalgebra::Point3;
use phf::{Map, phf_map};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Distance between consecutive backbone reference atoms (P–P) in an RNA chain.
pub const RNA_BOND_LENGTH: f64 = 5.9;
/// Distance between consecutive CA atoms in a protein chain.
pub const PROTEIN_BOND_LENGTH: f64 = 3.8;

static AMINO_ACID_NAMES: Map<char, &'static str> = phf_map! {
    'A' => "ALA", 'R' => "ARG", 'N' => "ASN", 'D' => "ASP", 'C' => "CYS",
    'Q' => "GLN", 'E' => "GLU", 'G' => "GLY", 'H' => "HIS", 'I' => "ILE",
    'L' => "LEU", 'K' => "LYS", 'M' => "MET", 'F' => "PHE", 'P' => "PRO",
    'S' => "SER", 'T' => "THR", 'W' => "TRP", 'Y' => "TYR", 'V' => "VAL",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Base {
    A,
    C,
    G,
    U,
}

impl Base {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Base::A),
            'C' => Some(Base::C),
            'G' => Some(Base::G),
            'U' | 'T' => Some(Base::U),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Base::A => 'a',
            Base::C => 'c',
            Base::G => 'g',
            Base::U => 'u',
        }
    }

    /// Watson–Crick pairs plus the G·U wobble.
    pub fn pairs_with(self, other: Base) -> bool {
        matches!(
            (self, other),
            (Base::A, Base::U)
                | (Base::U, Base::A)
                | (Base::G, Base::C)
                | (Base::C, Base::G)
                | (Base::G, Base::U)
                | (Base::U, Base::G)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Polymer {
    #[default]
    Rna,
    Protein,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResidueKind {
    Nucleotide(Base),
    AminoAcid(char),
    Virtual,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unrecognized residue code '{code}' for {polymer:?}")]
pub struct ParseResidueError {
    pub code: char,
    pub polymer: Polymer,
}

impl ResidueKind {
    pub fn from_code(code: char, polymer: Polymer) -> Result<Self, ParseResidueError> {
        let parsed = match polymer {
            Polymer::Rna => Base::from_char(code).map(ResidueKind::Nucleotide),
            Polymer::Protein => {
                let upper = code.to_ascii_uppercase();
                AMINO_ACID_NAMES
                    .contains_key(&upper)
                    .then_some(ResidueKind::AminoAcid(upper))
            }
        };
        parsed.ok_or(ParseResidueError { code, polymer })
    }

    pub fn from_pdb_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name == "VRT" {
            return Some(ResidueKind::Virtual);
        }
        if name.len() == 1 {
            return name
                .chars()
                .next()
                .and_then(Base::from_char)
                .map(ResidueKind::Nucleotide);
        }
        AMINO_ACID_NAMES
            .entries()
            .find(|(_, three)| **three == name)
            .map(|(one, _)| ResidueKind::AminoAcid(*one))
    }

    pub fn one_letter(&self) -> char {
        match self {
            ResidueKind::Nucleotide(base) => base.to_char(),
            ResidueKind::AminoAcid(code) => *code,
            ResidueKind::Virtual => 'X',
        }
    }

    pub fn pdb_name(&self) -> &'static str {
        match self {
            ResidueKind::Nucleotide(Base::A) => "A",
            ResidueKind::Nucleotide(Base::C) => "C",
            ResidueKind::Nucleotide(Base::G) => "G",
            ResidueKind::Nucleotide(Base::U) => "U",
            ResidueKind::AminoAcid(code) => AMINO_ACID_NAMES.get(code).copied().unwrap_or("UNK"),
            ResidueKind::Virtual => "VRT",
        }
    }

    pub fn base(&self) -> Option<Base> {
        match self {
            ResidueKind::Nucleotide(base) => Some(*base),
            _ => None,
        }
    }

    /// Atom whose position defines the residue frame origin and the chain trace.
    pub fn backbone_atom(&self) -> &'static str {
        match self {
            ResidueKind::Nucleotide(_) => "P",
            ResidueKind::AminoAcid(_) => "CA",
            ResidueKind::Virtual => "ORIG",
        }
    }

    /// Atom used as the coarse interaction site by the low-resolution terms.
    pub fn bead_atom(&self) -> &'static str {
        match self {
            ResidueKind::Nucleotide(_) | ResidueKind::AminoAcid(_) => "CEN",
            ResidueKind::Virtual => "ORIG",
        }
    }

    pub fn ideal_bond_length(&self) -> f64 {
        match self {
            ResidueKind::AminoAcid(_) => PROTEIN_BOND_LENGTH,
            _ => RNA_BOND_LENGTH,
        }
    }
}

impl fmt::Display for ResidueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pdb_name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Residue {
    kind: ResidueKind,
    atoms: Vec<Atom>,
    atom_name_map: HashMap<String, usize>,
}

impl Residue {
    /// Builds a residue with the idealized coarse-grained atom set for `kind`.
    pub fn ideal(kind: ResidueKind) -> Self {
        let atoms = match kind {
            ResidueKind::Nucleotide(_) => vec![
                Atom::new("P", Point3::origin()),
                Atom::new("C4'", Point3::new(1.6, 2.2, 0.0)),
                Atom::new("CEN", Point3::new(0.5, 4.8, 0.9)),
            ],
            ResidueKind::AminoAcid(_) => vec![
                Atom::new("CA", Point3::origin()),
                Atom::new("CEN", Point3::new(0.0, 2.4, 0.0)),
            ],
            ResidueKind::Virtual => vec![
                Atom::new("ORIG", Point3::origin()),
                Atom::new("X", Point3::new(1.0, 0.0, 0.0)),
                Atom::new("Y", Point3::new(0.0, 1.0, 0.0)),
            ],
        };
        Self::with_atoms(kind, atoms)
    }

    pub fn with_atoms(kind: ResidueKind, atoms: Vec<Atom>) -> Self {
        let atom_name_map = atoms
            .iter()
            .enumerate()
            .map(|(i, atom)| (atom.name.clone(), i))
            .collect();
        Self {
            kind,
            atoms,
            atom_name_map,
        }
    }

    pub fn kind(&self) -> ResidueKind {
        self.kind
    }

    pub fn is_virtual(&self) -> bool {
        self.kind == ResidueKind::Virtual
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom(&self, name: &str) -> Option<&Atom> {
        self.atom_name_map.get(name).map(|&i| &self.atoms[i])
    }

    pub fn has_atom(&self, name: &str) -> bool {
        self.atom_name_map.contains_key(name)
    }
}
