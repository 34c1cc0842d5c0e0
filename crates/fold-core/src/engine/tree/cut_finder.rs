use crate::core::models::secstruct::SecondaryStructure;
use crate::engine::error::TreeBuildError;
use tracing::trace;

/// Position favored when several residues are equally loop-like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutPreference {
    #[default]
    Midpoint,
    Lower,
    Upper,
}

/// Chooses where to break the chain between two jump anchors.
#[derive(Debug, Clone, Copy, Default)]
pub struct CutFinder {
    preference: CutPreference,
}

impl CutFinder {
    pub fn new(preference: CutPreference) -> Self {
        Self { preference }
    }

    pub fn preference(&self) -> CutPreference {
        self.preference
    }

    /// Returns the residue in `[lower, upper]` with the largest loop fraction.
    ///
    /// Ties go to the residue closest to the preferred position (for
    /// [`CutPreference::Midpoint`], `(lower + upper) / 2` rounded down), then to the
    /// lower index. Without a secondary-structure profile every residue is loop.
    pub fn choose_cutpoint(
        &self,
        lower: usize,
        upper: usize,
        secstruct: Option<&SecondaryStructure>,
    ) -> Result<usize, TreeBuildError> {
        if lower > upper {
            return Err(TreeBuildError::InvalidRange { lower, upper });
        }
        let target = match self.preference {
            CutPreference::Midpoint => (lower + upper) / 2,
            CutPreference::Lower => lower,
            CutPreference::Upper => upper,
        };
        let loop_fraction = |seqpos: usize| secstruct.map_or(1.0, |ss| ss.loop_fraction(seqpos));

        let mut best = lower;
        for seqpos in lower + 1..=upper {
            let better_loop = loop_fraction(seqpos).total_cmp(&loop_fraction(best));
            let closer = seqpos.abs_diff(target) < best.abs_diff(target);
            if better_loop.is_gt() || (better_loop.is_eq() && closer) {
                best = seqpos;
            }
        }
        trace!(lower, upper, cut = best, "Chose cutpoint");
        Ok(best)
    }
}
