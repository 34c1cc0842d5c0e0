use crate::core::io::traits::StructureFile;
use crate::core::models::atom::Atom;
use crate::core::models::pose::{Pose, frames_from_trace};
use crate::core::models::residue::{Residue, ResidueKind};
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdbMetadata {
    pub remarks: Vec<String>,
}

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("Residue {residue} has no backbone atom '{atom}'")]
    MissingBackbone { residue: String, atom: &'static str },
    #[error("No ATOM/HETATM records found")]
    NoAtoms,
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: &'static str, value: String },
    #[error("Line is too short for an ATOM/HETATM record (must be at least 54 chars)")]
    LineTooShort,
    #[error("Unknown residue name '{0}'")]
    UnknownResidue(String),
}

const MIN_ATOM_LINE: usize = 54;
const CHAIN_IDS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start.min(line.len())..end.min(line.len()))
        .unwrap_or("")
        .trim()
}

struct RawResidue {
    key: (char, String),
    kind: ResidueKind,
    label: String,
    atoms: Vec<(String, Point3<f64>)>,
}

/// Coarse-grained PDB models: one record per stored atom, virtual residues omitted,
/// chains split at the pose's chain ends.
pub struct PdbFile;

impl StructureFile for PdbFile {
    type Metadata = PdbMetadata;
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Pose, Self::Metadata), Self::Error> {
        let mut metadata = PdbMetadata::default();
        let mut residues: Vec<RawResidue> = Vec::new();
        let mut chain_ends: Vec<usize> = Vec::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let record_type = slice_and_trim(&line, 0, 6);

            match record_type {
                "ATOM" | "HETATM" => {
                    if line.len() < MIN_ATOM_LINE {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::LineTooShort,
                        });
                    }
                    let name = slice_and_trim(&line, 12, 16);
                    let res_name = slice_and_trim(&line, 17, 20);
                    let chain_id = line.get(21..22).and_then(|s| s.chars().next()).unwrap_or(' ');
                    let res_seq = slice_and_trim(&line, 22, 27);
                    let coord = |start: usize, end: usize, columns: &'static str| {
                        let value = slice_and_trim(&line, start, end);
                        value.parse::<f64>().map_err(|_| PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::InvalidFloat {
                                columns,
                                value: value.to_string(),
                            },
                        })
                    };
                    let position = Point3::new(
                        coord(30, 38, "31-38")?,
                        coord(38, 46, "39-46")?,
                        coord(46, 54, "47-54")?,
                    );

                    let kind = ResidueKind::from_pdb_name(res_name).ok_or_else(|| {
                        PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::UnknownResidue(res_name.to_string()),
                        }
                    })?;
                    if kind == ResidueKind::Virtual {
                        continue;
                    }

                    let key = (chain_id, res_seq.to_string());
                    let is_new = residues.last().is_none_or(|r| r.key != key);
                    if is_new {
                        if let Some(previous) = residues.last() {
                            let end = residues.len();
                            if previous.key.0 != chain_id && !chain_ends.contains(&end) {
                                chain_ends.push(end);
                            }
                        }
                        residues.push(RawResidue {
                            key,
                            kind,
                            label: format!("{}{}{}", res_name, chain_id, res_seq),
                            atoms: Vec::new(),
                        });
                    }
                    if let Some(current) = residues.last_mut() {
                        current.atoms.push((name.to_string(), position));
                    }
                }
                "TER" => {
                    let end = residues.len();
                    if end > 0 && !chain_ends.contains(&end) {
                        chain_ends.push(end);
                    }
                }
                "REMARK" => {
                    metadata
                        .remarks
                        .push(line.get(7..).unwrap_or("").trim_end().to_string());
                }
                "END" | "ENDMDL" => break,
                _ => {}
            }
        }

        if residues.is_empty() {
            return Err(PdbError::NoAtoms);
        }
        let total = residues.len();
        chain_ends.retain(|&c| c < total);

        let trace = residues
            .iter()
            .map(|r| {
                let atom = r.kind.backbone_atom();
                r.atoms
                    .iter()
                    .find(|(name, _)| name == atom)
                    .map(|(_, p)| *p)
                    .ok_or_else(|| PdbError::MissingBackbone {
                        residue: r.label.clone(),
                        atom,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let frames = frames_from_trace(&trace);

        let built = residues
            .into_iter()
            .zip(&frames)
            .map(|(raw, frame)| {
                let mut atoms: Vec<Atom> = raw
                    .atoms
                    .iter()
                    .map(|(name, p)| Atom::new(name, frame.inverse_transform_point(p)))
                    .collect();
                for ideal in Residue::ideal(raw.kind).atoms() {
                    if !atoms.iter().any(|a| a.name == ideal.name) {
                        atoms.push(ideal.clone());
                    }
                }
                Residue::with_atoms(raw.kind, atoms)
            })
            .collect();

        Ok((Pose::from_frames(built, frames, chain_ends), metadata))
    }

    fn write_to(
        pose: &Pose,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        for remark in &metadata.remarks {
            writeln!(writer, "REMARK {}", remark)?;
        }

        let mut serial = 0usize;
        let mut chain_index = 0usize;
        let mut res_seq = 0usize;
        for seqpos in 1..=pose.total_residue() {
            let Some(residue) = pose.residue(seqpos) else {
                continue;
            };
            if residue.is_virtual() {
                continue;
            }
            res_seq += 1;
            let chain_id = CHAIN_IDS[chain_index % CHAIN_IDS.len()] as char;
            let frame = pose.frame(seqpos);
            for atom in residue.atoms() {
                serial += 1;
                let position = frame * atom.local;
                let name = if atom.name.len() < 4 {
                    format!(" {:<3}", atom.name)
                } else {
                    atom.name.clone()
                };
                writeln!(
                    writer,
                    "ATOM  {:>5} {:<4} {:>3} {}{:>4}    {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}",
                    serial,
                    name,
                    residue.kind().pdb_name(),
                    chain_id,
                    res_seq,
                    position.x,
                    position.y,
                    position.z,
                    1.0,
                    0.0
                )?;
            }
            if pose.chain_ends().contains(&seqpos) {
                writeln!(writer, "TER")?;
                chain_index += 1;
            }
        }
        writeln!(writer, "END")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::residue::Polymer;
    use std::io::{BufReader, Cursor};
    use tempfile::tempdir;

    fn read_str(content: &str) -> Result<(Pose, PdbMetadata), PdbError> {
        PdbFile::read_from(&mut BufReader::new(Cursor::new(content)))
    }

    #[test]
    fn written_models_read_back_with_same_coordinates() {
        let mut pose = Pose::from_sequence("ggacuucc", Polymer::Rna).unwrap();
        pose.set_bond_torsions(3, 100.0, 60.0).unwrap();
        let metadata = PdbMetadata {
            remarks: vec!["score -12.5".to_string()],
        };
        let mut buffer = Vec::new();
        PdbFile::write_to(&pose, &metadata, &mut buffer).unwrap();

        let (read, read_meta) = read_str(&String::from_utf8(buffer).unwrap()).unwrap();
        assert_eq!(read_meta.remarks, metadata.remarks);
        assert_eq!(read.sequence(), pose.sequence());
        for seqpos in 1..=pose.total_residue() {
            let d = nalgebra::distance(&read.backbone_xyz(seqpos), &pose.backbone_xyz(seqpos));
            assert!(d < 2e-3);
            assert!(nalgebra::distance(&read.bead(seqpos), &pose.bead(seqpos)) < 2e-3);
        }
    }

    #[test]
    fn virtual_residues_are_not_written() {
        let mut pose = Pose::from_sequence("acgu", Polymer::Rna).unwrap();
        pose.append_virtual_root(Point3::new(1.0, 1.0, 1.0)).unwrap();
        let mut buffer = Vec::new();
        PdbFile::write_pose_to(&pose, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(!text.contains("VRT"));
        let (read, _) = read_str(&text).unwrap();
        assert_eq!(read.total_residue(), 4);
    }

    #[test]
    fn ter_records_become_chain_ends() {
        let content = "\
ATOM      1  P     G A   1       0.000   0.000   0.000  1.00  0.00
ATOM      2  P     G A   2       5.900   0.000   0.000  1.00  0.00
TER
ATOM      3  P     C B   1      20.000   0.000   0.000  1.00  0.00
ATOM      4  P     C B   2      25.900   0.000   0.000  1.00  0.00
END
";
        let (pose, _) = read_str(content).unwrap();
        assert_eq!(pose.total_residue(), 4);
        assert_eq!(pose.chain_ends(), &[2]);
        assert!(pose.residue(1).unwrap().has_atom("CEN"));
    }

    #[test]
    fn read_reports_malformed_records() {
        let short = "ATOM      1  P     G A   1       0.000\n";
        assert!(matches!(
            read_str(short),
            Err(PdbError::Parse {
                line: 1,
                kind: PdbParseErrorKind::LineTooShort
            })
        ));
        let bad_float = "ATOM      1  P     G A   1       x.000   0.000   0.000  1.00  0.00\n";
        assert!(matches!(
            read_str(bad_float),
            Err(PdbError::Parse {
                kind: PdbParseErrorKind::InvalidFloat { .. },
                ..
            })
        ));
        let unknown = "ATOM      1  P   XYZ A   1       0.000   0.000   0.000  1.00  0.00\n";
        assert!(matches!(
            read_str(unknown),
            Err(PdbError::Parse {
                kind: PdbParseErrorKind::UnknownResidue(_),
                ..
            })
        ));
        let no_backbone = "ATOM      1  CEN   G A   1       0.000   0.000   0.000  1.00  0.00\n";
        assert!(matches!(
            read_str(no_backbone),
            Err(PdbError::MissingBackbone { .. })
        ));
        assert!(matches!(read_str("REMARK empty\n"), Err(PdbError::NoAtoms)));
    }

    #[test]
    fn path_helpers_round_trip_through_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.pdb");
        let pose = Pose::from_sequence("acguacgu", Polymer::Rna).unwrap();
        PdbFile::write_pose_to_path(&pose, &path).unwrap();
        let (read, _) = PdbFile::read_from_path(&path).unwrap();
        assert_eq!(read.total_residue(), 8);
    }
}
