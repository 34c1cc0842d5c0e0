use super::TreeBuilder;
use super::cut_finder::CutFinder;
use crate::core::kinematics::FoldTree;
use crate::core::models::chunk::{Chunk, ChunkError, center_of_mass, validate_chunks};
use crate::core::models::pose::Pose;
use crate::core::utils::sampling::WeightedReservoirSampler;
use crate::engine::error::TreeBuildError;
use rand::RngCore;
use tracing::{debug, warn};

/// Builds a star-shaped fold tree: a virtual residue at the chunks' center of mass is
/// the root, and one jump runs from it to an anchor residue inside every chunk.
///
/// Between consecutive anchors the chain is cut where the secondary structure is most
/// loop-like, and a final cut separates the last real residue from the virtual root,
/// so each chunk with its flanking loops hangs from the root independently.
#[derive(Debug, Default)]
pub struct StarTreeBuilder {
    cut_finder: CutFinder,
    virtual_res: Option<usize>,
    previous_tree: Option<FoldTree>,
    anchors: Vec<usize>,
}

impl StarTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cut_finder(cut_finder: CutFinder) -> Self {
        Self {
            cut_finder,
            ..Self::default()
        }
    }

    /// Index of the virtual root while a tree is built.
    pub fn virtual_res(&self) -> Option<usize> {
        self.virtual_res
    }

    /// Jump anchors chosen by the last successful `set_up`, in chunk order.
    pub fn anchors(&self) -> &[usize] {
        &self.anchors
    }

    /// Conservation-weighted draw when the pose carries conservation scores (a residue
    /// without a score weighs zero), the chunk midpoint otherwise.
    fn choose_anchor(
        &self,
        chunk: &Chunk,
        pose: &Pose,
        rng: &mut dyn RngCore,
    ) -> Result<usize, TreeBuildError> {
        if !pose.has_conservation() {
            return Ok(chunk.midpoint());
        }
        let mut sampler = WeightedReservoirSampler::new(1)?;
        for seqpos in chunk.residues() {
            let weight = pose.structural_conservation(seqpos).unwrap_or(0.0);
            sampler.consider_sample(seqpos, weight, rng)?;
        }
        Ok(sampler
            .samples()
            .first()
            .copied()
            .unwrap_or_else(|| chunk.midpoint()))
    }

    fn build_star(
        &mut self,
        chunks: &[Chunk],
        pose: &mut Pose,
        rng: &mut dyn RngCore,
        virtual_res: usize,
        last_real: usize,
    ) -> Result<(), TreeBuildError> {
        let anchors = chunks
            .iter()
            .map(|chunk| self.choose_anchor(chunk, pose, rng))
            .collect::<Result<Vec<_>, _>>()?;

        let jumps: Vec<(usize, usize)> = anchors.iter().map(|&a| (virtual_res, a)).collect();
        let mut cuts = Vec::with_capacity(anchors.len());
        for pair in anchors.windows(2) {
            let cut = self
                .cut_finder
                .choose_cutpoint(pair[0] + 1, pair[1] - 1, pose.secstruct())?;
            cuts.push(cut);
        }
        cuts.push(last_real);

        let tree = FoldTree::from_jumps_and_cuts(virtual_res, &jumps, &cuts, virtual_res)?;
        debug!(%tree, "Star fold tree built");
        pose.set_fold_tree(tree)?;
        self.anchors = anchors;
        Ok(())
    }
}

impl TreeBuilder for StarTreeBuilder {
    fn set_up(
        &mut self,
        chunks: &[Chunk],
        pose: &mut Pose,
        rng: &mut dyn RngCore,
    ) -> Result<(), TreeBuildError> {
        if self.is_built() {
            return Err(TreeBuildError::AlreadyBuilt);
        }
        let last_real = pose.total_residue();
        validate_chunks(chunks, last_real)?;
        let center = center_of_mass(chunks, pose).ok_or(ChunkError::Empty)?;

        let previous_tree = pose.fold_tree().clone();
        let virtual_res = pose.append_virtual_root(center)?;
        self.virtual_res = Some(virtual_res);
        self.previous_tree = Some(previous_tree);

        if let Err(error) = self.build_star(chunks, pose, rng, virtual_res, last_real) {
            if let Err(cleanup) = self.tear_down(pose) {
                warn!(%cleanup, "Tear-down after a failed star tree setup also failed");
            }
            return Err(error);
        }
        Ok(())
    }

    fn tear_down(&mut self, pose: &mut Pose) -> Result<(), TreeBuildError> {
        let Some(virtual_res) = self.virtual_res.take() else {
            return Ok(());
        };
        let previous_tree = self.previous_tree.take();
        self.anchors.clear();
        pose.delete_residue(virtual_res)?;
        if let Some(tree) = previous_tree {
            pose.set_fold_tree(tree)?;
        }
        Ok(())
    }

    fn is_built(&self) -> bool {
        self.virtual_res.is_some()
    }

    fn name(&self) -> &'static str {
        "star"
    }
}
