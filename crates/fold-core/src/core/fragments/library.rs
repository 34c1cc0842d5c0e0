use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FragmentError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Malformed fragment line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Fragment library has no fragments of size {0}")]
    MissingSize(usize),
}

/// Virtual-bond angle and torsion, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorsionSet {
    pub angle: f64,
    pub torsion: f64,
}

impl TorsionSet {
    pub const fn new(angle: f64, torsion: f64) -> Self {
        Self { angle, torsion }
    }
}

/// Consecutive bond geometries with the secondary structure they were observed in.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub torsions: Vec<TorsionSet>,
    pub secstruct: String,
}

impl Fragment {
    pub fn len(&self) -> usize {
        self.torsions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.torsions.is_empty()
    }
}

const IDEAL_HELIX: TorsionSet = TorsionSet::new(95.0, 60.0);
const LOOP_ANGLES: [f64; 5] = [80.0, 100.0, 120.0, 140.0, 160.0];
const LOOP_TORSION_STEP: f64 = 30.0;

/// Fragments grouped by length.
#[derive(Debug, Clone, Default)]
pub struct FragmentLibrary {
    by_size: BTreeMap<usize, Vec<Fragment>>,
}

impl FragmentLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idealized helix variants plus a deterministic spread of loop geometries for
    /// every size in `sizes`.
    pub fn ideal(sizes: &[usize]) -> Self {
        let mut helix_variants = Vec::new();
        for da in [-5.0, 0.0, 5.0] {
            for dt in [-10.0, 0.0, 10.0] {
                helix_variants.push(TorsionSet::new(
                    IDEAL_HELIX.angle + da,
                    IDEAL_HELIX.torsion + dt,
                ));
            }
        }
        let loop_grid: Vec<TorsionSet> = LOOP_ANGLES
            .iter()
            .flat_map(|&angle| {
                (0..12).map(move |k| TorsionSet::new(angle, -180.0 + LOOP_TORSION_STEP * k as f64))
            })
            .collect();

        let mut library = Self::new();
        for &size in sizes.iter().filter(|&&s| s > 0) {
            for variant in &helix_variants {
                library.add(Fragment {
                    torsions: vec![*variant; size],
                    secstruct: "H".repeat(size),
                });
            }
            for start in 0..loop_grid.len() {
                let torsions = (0..size)
                    .map(|k| loop_grid[(start + 7 * k) % loop_grid.len()])
                    .collect();
                library.add(Fragment {
                    torsions,
                    secstruct: "L".repeat(size),
                });
            }
        }
        library
    }

    /// Parses a vall-style torsion database and cuts it into fragments of each size.
    ///
    /// Each line holds `<residue> <secstruct> <angle> <torsion>`; blank lines and lines
    /// starting with `#` end a segment, so fragments never span two segments.
    pub fn from_vall(reader: impl BufRead, sizes: &[usize]) -> Result<Self, FragmentError> {
        let mut segments: Vec<Vec<(char, TorsionSet)>> = vec![Vec::new()];
        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|e| FragmentError::Io {
                path: "<reader>".to_string(),
                source: e,
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                if segments.last().is_some_and(|s| !s.is_empty()) {
                    segments.push(Vec::new());
                }
                continue;
            }
            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() < 4 {
                return Err(FragmentError::Parse {
                    line: line_no,
                    message: format!("expected 4 columns, found {}", fields.len()),
                });
            }
            let ss = fields[1].chars().next().unwrap_or('L');
            let parse = |s: &str, what: &str| {
                s.parse::<f64>().map_err(|_| FragmentError::Parse {
                    line: line_no,
                    message: format!("invalid {what} '{s}'"),
                })
            };
            let angle = parse(fields[2], "angle")?;
            let torsion = parse(fields[3], "torsion")?;
            if let Some(segment) = segments.last_mut() {
                segment.push((ss, TorsionSet::new(angle, torsion)));
            }
        }

        let mut library = Self::new();
        for segment in segments.iter().filter(|s| !s.is_empty()) {
            for &size in sizes.iter().filter(|&&s| s > 0) {
                for window in segment.windows(size) {
                    library.add(Fragment {
                        torsions: window.iter().map(|(_, t)| *t).collect(),
                        secstruct: window.iter().map(|(ss, _)| *ss).collect(),
                    });
                }
            }
        }
        debug!(sizes = ?library.sizes(), "Parsed fragment library");
        Ok(library)
    }

    pub fn from_vall_path(path: &Path, sizes: &[usize]) -> Result<Self, FragmentError> {
        let file = std::fs::File::open(path).map_err(|e| FragmentError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_vall(std::io::BufReader::new(file), sizes)
    }

    pub fn add(&mut self, fragment: Fragment) {
        self.by_size.entry(fragment.len()).or_default().push(fragment);
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.by_size.keys().copied().collect()
    }

    pub fn fragments(&self, size: usize) -> &[Fragment] {
        self.by_size.get(&size).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Largest available size not exceeding `size`.
    pub fn best_size_at_most(&self, size: usize) -> Option<usize> {
        self.by_size.range(..=size).next_back().map(|(&s, _)| s)
    }

    /// Random fragment of `size`, preferring ones whose secondary structure matches
    /// `ss_window` exactly.
    pub fn pick<R: Rng + ?Sized>(
        &self,
        size: usize,
        ss_window: &str,
        rng: &mut R,
    ) -> Result<&Fragment, FragmentError> {
        let all = self.fragments(size);
        let matching: Vec<&Fragment> = all.iter().filter(|f| f.secstruct == ss_window).collect();
        let chosen = if matching.is_empty() {
            all.choose(rng)
        } else {
            matching.choose(rng).copied()
        };
        chosen.ok_or(FragmentError::MissingSize(size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::io::Cursor;

    const VALL: &str = "\
# segment one
1 H 95.0 60.0
2 H 96.0 61.0
3 L 120.0 -90.0
4 L 130.0 150.0

5 E 140.0 180.0
6 E 141.0 179.0
";

    #[test]
    fn from_vall_cuts_windows_within_segments() {
        let library = FragmentLibrary::from_vall(Cursor::new(VALL), &[1, 3]).unwrap();
        assert_eq!(library.fragments(1).len(), 6);
        assert_eq!(library.fragments(3).len(), 2);
        assert_eq!(library.fragments(3)[0].secstruct, "HHL");
        assert_eq!(library.fragments(3)[1].torsions[2], TorsionSet::new(130.0, 150.0));
        assert_eq!(library.sizes(), vec![1, 3]);
    }

    #[test]
    fn from_vall_reports_line_numbers() {
        let err = FragmentLibrary::from_vall(Cursor::new("1 H 95.0\n"), &[1]).unwrap_err();
        assert!(matches!(err, FragmentError::Parse { line: 1, .. }));
        let err = FragmentLibrary::from_vall(Cursor::new("1 H 95.0 60.0\n2 H x 60.0\n"), &[1])
            .unwrap_err();
        assert!(matches!(err, FragmentError::Parse { line: 2, .. }));
    }

    #[test]
    fn from_vall_path_reports_missing_file() {
        let err = FragmentLibrary::from_vall_path(Path::new("/nonexistent/vall.txt"), &[3])
            .unwrap_err();
        assert!(matches!(err, FragmentError::Io { .. }));
    }

    #[test]
    fn ideal_library_has_helix_and_loop_fragments() {
        let library = FragmentLibrary::ideal(&[1, 2, 3]);
        assert_eq!(library.sizes(), vec![1, 2, 3]);
        for size in 1..=3 {
            let fragments = library.fragments(size);
            assert_eq!(fragments.len(), 9 + 60);
            assert!(fragments.iter().all(|f| f.len() == size));
            assert!(fragments.iter().any(|f| f.secstruct == "H".repeat(size)));
        }
    }

    #[test]
    fn pick_prefers_matching_secondary_structure() {
        let library = FragmentLibrary::ideal(&[3]);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            assert_eq!(library.pick(3, "HHH", &mut rng).unwrap().secstruct, "HHH");
        }
        let fallback = library.pick(3, "EEE", &mut rng).unwrap();
        assert_eq!(fallback.len(), 3);
        assert!(matches!(
            library.pick(5, "LLLLL", &mut rng),
            Err(FragmentError::MissingSize(5))
        ));
    }

    #[test]
    fn best_size_at_most_falls_back_to_smaller_sizes() {
        let library = FragmentLibrary::ideal(&[1, 3]);
        assert_eq!(library.best_size_at_most(3), Some(3));
        assert_eq!(library.best_size_at_most(2), Some(1));
        assert_eq!(library.best_size_at_most(0), None);
    }
}
