use super::term::{EnergyMap, ScoreType};
use super::terms;
use crate::core::models::pose::Pose;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoreFileError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Unknown score term '{name}' in '{path}'")]
    UnknownTerm { path: String, name: String },
    #[error("Unknown preset '{name}' in '{path}' (expected 'lores' or 'hires')")]
    UnknownPreset { path: String, name: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WeightsFile {
    preset: Option<String>,
    #[serde(default)]
    weights: BTreeMap<String, f64>,
}

/// Weighted sum of coarse-grained energy terms.
///
/// Cloning is cheap and yields an independent function, so callers can ramp weights
/// on a working copy without touching a shared instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreFunction {
    weights: EnergyMap,
}

impl ScoreFunction {
    pub fn empty() -> Self {
        Self {
            weights: EnergyMap::new(),
        }
    }

    pub fn from_weights(weights: EnergyMap) -> Self {
        Self { weights }
    }

    /// Low-resolution assembly weights.
    pub fn lores() -> Self {
        Self::from_pairs(&[
            (ScoreType::Repulsive, 2.0),
            (ScoreType::BasePair, 4.0),
            (ScoreType::BaseStack, 1.0),
            (ScoreType::BaseAxis, 0.5),
            (ScoreType::Chainbreak, 2.0),
            (ScoreType::LinearChainbreak, 2.0),
            (ScoreType::AtomPairConstraint, 1.0),
            (ScoreType::CoordinateConstraint, 1.0),
            (ScoreType::RadiusOfGyration, 0.3),
        ])
    }

    /// Final-model weights: stronger geometry penalties, weaker compaction.
    pub fn hires() -> Self {
        Self::from_pairs(&[
            (ScoreType::Repulsive, 4.0),
            (ScoreType::BasePair, 6.0),
            (ScoreType::BaseStack, 2.0),
            (ScoreType::BaseAxis, 1.0),
            (ScoreType::Chainbreak, 5.0),
            (ScoreType::LinearChainbreak, 5.0),
            (ScoreType::AtomPairConstraint, 1.0),
            (ScoreType::CoordinateConstraint, 1.0),
            (ScoreType::RadiusOfGyration, 0.1),
        ])
    }

    fn from_pairs(pairs: &[(ScoreType, f64)]) -> Self {
        let mut weights = EnergyMap::new();
        for &(t, w) in pairs {
            weights.set(t, w);
        }
        Self { weights }
    }

    /// Loads weights from a TOML file:
    ///
    /// ```toml
    /// preset = "lores"        # optional starting point
    /// [weights]
    /// rna_base_pair = 5.0
    /// rg = 0.0
    /// ```
    pub fn from_weights_file(path: &Path) -> Result<Self, ScoreFileError> {
        let display = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| ScoreFileError::Io {
            path: display.clone(),
            source: e,
        })?;
        let file: WeightsFile = toml::from_str(&content).map_err(|e| ScoreFileError::Toml {
            path: display.clone(),
            source: e,
        })?;

        let mut function = match file.preset.as_deref() {
            None => Self::empty(),
            Some("lores") => Self::lores(),
            Some("hires") => Self::hires(),
            Some(other) => {
                return Err(ScoreFileError::UnknownPreset {
                    path: display,
                    name: other.to_string(),
                });
            }
        };
        for (name, weight) in file.weights {
            let score_type =
                ScoreType::from_name(&name).ok_or_else(|| ScoreFileError::UnknownTerm {
                    path: display.clone(),
                    name: name.clone(),
                })?;
            function.set_weight(score_type, weight);
        }
        Ok(function)
    }

    pub fn weight(&self, score_type: ScoreType) -> f64 {
        self.weights.get(score_type)
    }

    pub fn set_weight(&mut self, score_type: ScoreType, weight: f64) {
        self.weights.set(score_type, weight);
    }

    pub fn weights(&self) -> &EnergyMap {
        &self.weights
    }

    pub fn has_nonzero_weight(&self, score_type: ScoreType) -> bool {
        self.weights.get(score_type) != 0.0
    }

    /// Raw energies of the active terms.
    pub fn breakdown(&self, pose: &Pose) -> EnergyMap {
        terms::evaluate(pose, &self.weights)
    }

    pub fn score(&self, pose: &Pose) -> f64 {
        self.breakdown(pose).weighted_total(&self.weights)
    }
}

impl Default for ScoreFunction {
    fn default() -> Self {
        Self::lores()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::residue::Polymer;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn clones_are_independent() {
        let shared = ScoreFunction::lores();
        let mut working = shared.clone();
        working.set_weight(ScoreType::Chainbreak, 0.0);
        assert_eq!(shared.weight(ScoreType::Chainbreak), 2.0);
        assert!(!working.has_nonzero_weight(ScoreType::Chainbreak));
    }

    #[test]
    fn score_is_weighted_breakdown() {
        let pose = Pose::from_sequence("ggggaaaacccc", Polymer::Rna).unwrap();
        let function = ScoreFunction::lores();
        let breakdown = function.breakdown(&pose);
        let expected: f64 = breakdown
            .iter()
            .map(|(t, v)| v * function.weight(t))
            .sum();
        assert!((function.score(&pose) - expected).abs() < 1e-12);
    }

    #[test]
    fn empty_function_scores_zero() {
        let pose = Pose::from_sequence("acgu", Polymer::Rna).unwrap();
        assert_eq!(ScoreFunction::empty().score(&pose), 0.0);
    }

    #[test]
    fn from_weights_file_applies_preset_and_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("weights.toml");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            r#"
            preset = "hires"

            [weights]
            rna_base_pair = 7.5
            rg = 0.0
            "#
        )
        .unwrap();

        let function = ScoreFunction::from_weights_file(&path).unwrap();
        assert_eq!(function.weight(ScoreType::BasePair), 7.5);
        assert_eq!(function.weight(ScoreType::RadiusOfGyration), 0.0);
        assert_eq!(function.weight(ScoreType::Chainbreak), 5.0);
    }

    #[test]
    fn from_weights_file_rejects_unknown_terms_and_presets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[weights]\nfa_rep = 1.0\n").unwrap();
        assert!(matches!(
            ScoreFunction::from_weights_file(&path),
            Err(ScoreFileError::UnknownTerm { name, .. }) if name == "fa_rep"
        ));

        std::fs::write(&path, "preset = \"centroid\"\n").unwrap();
        assert!(matches!(
            ScoreFunction::from_weights_file(&path),
            Err(ScoreFileError::UnknownPreset { .. })
        ));
    }

    #[test]
    fn from_weights_file_reports_missing_and_malformed_files() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            ScoreFunction::from_weights_file(&dir.path().join("missing.toml")),
            Err(ScoreFileError::Io { .. })
        ));
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[weights\n").unwrap();
        assert!(matches!(
            ScoreFunction::from_weights_file(&path),
            Err(ScoreFileError::Toml { .. })
        ));
    }
}
