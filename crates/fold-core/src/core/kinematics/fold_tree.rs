use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FoldTreeError {
    #[error("A fold tree needs at least one residue")]
    Empty,
    #[error("Residue {seqpos} is outside the valid range 1..={nres}")]
    ResidueOutOfRange { seqpos: usize, nres: usize },
    #[error("Cutpoint {cut} is invalid for {nres} residues (must be in 1..{nres})")]
    InvalidCutpoint { cut: usize, nres: usize },
    #[error("Cutpoint {0} was given more than once")]
    DuplicateCutpoint(usize),
    #[error("Jump {jump} connects residue {seqpos} to itself")]
    SelfJump { jump: usize, seqpos: usize },
    #[error("{jumps} jump(s) require exactly as many cutpoints, got {cuts}")]
    JumpCutMismatch { jumps: usize, cuts: usize },
    #[error("Edge {start}-{stop} closes a cycle")]
    Cycle { start: usize, stop: usize },
    #[error("Residue {0} is not reachable from the root")]
    Disconnected(usize),
}

/// How a residue is attached to its parent in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connection {
    /// Backbone bond to the sequence neighbor.
    Bond,
    /// Rigid-body jump, numbered from 1.
    Jump(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeLabel {
    Peptide,
    Jump(usize),
}

/// A directed edge. Peptide edges cover the whole residue run `start..=stop` (or the
/// reverse), jump edges connect exactly two residues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub start: usize,
    pub stop: usize,
    pub label: EdgeLabel,
}

/// One parent→child step of the tree, in build order from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub parent: usize,
    pub child: usize,
    pub connection: Connection,
}

/// A kinematic spanning tree over residues `1..=nres`.
///
/// The tree is defined by its jumps and cutpoints: every backbone bond `(c, c + 1)`
/// exists except where `c` is a cutpoint, and every jump adds one rigid-body edge.
/// A valid tree therefore has exactly as many cutpoints as jumps and no cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldTree {
    nres: usize,
    root: usize,
    jumps: Vec<(usize, usize)>,
    cuts: Vec<usize>,
    edges: Vec<Edge>,
    steps: Vec<Step>,
    parents: Vec<Option<(usize, Connection)>>,
}

impl FoldTree {
    /// A single peptide edge `1 → nres`, rooted at residue 1.
    pub fn simple(nres: usize) -> Self {
        let adjacency = build_adjacency(nres, &[], &BTreeSet::new());
        Self::orient(nres, 1, &[], Vec::new(), &adjacency)
    }

    /// Builds a tree from jump pairs and cutpoints and orients it away from `root`.
    ///
    /// Jumps are numbered by their position in `jumps`, starting at 1. Their stored
    /// direction follows the tree, so `upstream_jump_residue` is always the endpoint
    /// closer to the root.
    pub fn from_jumps_and_cuts(
        nres: usize,
        jumps: &[(usize, usize)],
        cuts: &[usize],
        root: usize,
    ) -> Result<Self, FoldTreeError> {
        if nres == 0 {
            return Err(FoldTreeError::Empty);
        }
        let check = |seqpos: usize| {
            if seqpos == 0 || seqpos > nres {
                Err(FoldTreeError::ResidueOutOfRange { seqpos, nres })
            } else {
                Ok(())
            }
        };
        check(root)?;
        for (n, &(a, b)) in jumps.iter().enumerate() {
            check(a)?;
            check(b)?;
            if a == b {
                return Err(FoldTreeError::SelfJump {
                    jump: n + 1,
                    seqpos: a,
                });
            }
        }
        let mut cut_set = BTreeSet::new();
        for &cut in cuts {
            if cut == 0 || cut >= nres {
                return Err(FoldTreeError::InvalidCutpoint { cut, nres });
            }
            if !cut_set.insert(cut) {
                return Err(FoldTreeError::DuplicateCutpoint(cut));
            }
        }
        if jumps.len() != cuts.len() {
            return Err(FoldTreeError::JumpCutMismatch {
                jumps: jumps.len(),
                cuts: cuts.len(),
            });
        }

        let mut components = DisjointSet::new(nres);
        for i in (1..nres).filter(|i| !cut_set.contains(i)) {
            if !components.union(i, i + 1) {
                return Err(FoldTreeError::Cycle {
                    start: i,
                    stop: i + 1,
                });
            }
        }
        for &(a, b) in jumps {
            if !components.union(a, b) {
                return Err(FoldTreeError::Cycle { start: a, stop: b });
            }
        }
        if let Some(orphan) = (1..=nres).find(|&i| !components.same(i, root)) {
            return Err(FoldTreeError::Disconnected(orphan));
        }

        let adjacency = build_adjacency(nres, jumps, &cut_set);
        Ok(Self::orient(
            nres,
            root,
            jumps,
            cut_set.into_iter().collect(),
            &adjacency,
        ))
    }

    fn orient(
        nres: usize,
        root: usize,
        jumps: &[(usize, usize)],
        cuts: Vec<usize>,
        adjacency: &[Vec<(usize, Connection)>],
    ) -> Self {
        let mut parents = vec![None; nres + 1];
        let mut visited = vec![false; nres + 1];
        let mut steps = Vec::with_capacity(nres.saturating_sub(1));
        let mut queue = VecDeque::from([root]);
        visited[root] = true;

        while let Some(parent) = queue.pop_front() {
            for &(child, connection) in &adjacency[parent] {
                if visited[child] {
                    continue;
                }
                visited[child] = true;
                parents[child] = Some((parent, connection));
                steps.push(Step {
                    parent,
                    child,
                    connection,
                });
                queue.push_back(child);
            }
        }

        let oriented_jumps: Vec<(usize, usize)> = jumps
            .iter()
            .map(|&(a, b)| match parents[b] {
                Some((p, Connection::Jump(_))) if p == a => (a, b),
                _ => (b, a),
            })
            .collect();

        let edges = collect_edges(nres, root, &oriented_jumps, &cuts, &parents);

        Self {
            nres,
            root,
            jumps: oriented_jumps,
            cuts,
            edges,
            steps,
            parents,
        }
    }

    pub fn nres(&self) -> usize {
        self.nres
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn num_jump(&self) -> usize {
        self.jumps.len()
    }

    pub fn num_cutpoint(&self) -> usize {
        self.cuts.len()
    }

    /// Sorted cutpoints.
    pub fn cutpoints(&self) -> &[usize] {
        &self.cuts
    }

    pub fn is_cutpoint(&self, seqpos: usize) -> bool {
        self.cuts.binary_search(&seqpos).is_ok()
    }

    /// `(upstream, downstream)` residues of jump `n` (1-based).
    pub fn jump_edge(&self, n: usize) -> Option<(usize, usize)> {
        n.checked_sub(1).and_then(|i| self.jumps.get(i)).copied()
    }

    pub fn upstream_jump_residue(&self, n: usize) -> Option<usize> {
        self.jump_edge(n).map(|(up, _)| up)
    }

    pub fn downstream_jump_residue(&self, n: usize) -> Option<usize> {
        self.jump_edge(n).map(|(_, down)| down)
    }

    pub fn jumps(&self) -> &[(usize, usize)] {
        &self.jumps
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Parent→child steps in breadth-first order from the root.
    pub fn traversal(&self) -> &[Step] {
        &self.steps
    }

    pub fn parent(&self, seqpos: usize) -> Option<(usize, Connection)> {
        self.parents.get(seqpos).copied().flatten()
    }

    /// True when `seqpos` lies in the subtree hanging below `ancestor` (inclusive).
    pub fn is_downstream(&self, ancestor: usize, seqpos: usize) -> bool {
        let mut current = seqpos;
        loop {
            if current == ancestor {
                return true;
            }
            match self.parent(current) {
                Some((parent, _)) => current = parent,
                None => return false,
            }
        }
    }

    /// Jump number whose downstream residue is `seqpos`, if any.
    pub fn jump_into(&self, seqpos: usize) -> Option<usize> {
        match self.parent(seqpos) {
            Some((_, Connection::Jump(n))) => Some(n),
            _ => None,
        }
    }

    /// The defining jumps (in tree orientation) and cutpoints.
    pub fn jumps_and_cuts(&self) -> (Vec<(usize, usize)>, Vec<usize>) {
        (self.jumps.clone(), self.cuts.clone())
    }
}

impl fmt::Display for FoldTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FOLD_TREE")?;
        for edge in &self.edges {
            let label: isize = match edge.label {
                EdgeLabel::Peptide => -1,
                EdgeLabel::Jump(n) => n as isize,
            };
            write!(f, "  EDGE {} {} {}", edge.start, edge.stop, label)?;
        }
        Ok(())
    }
}

fn build_adjacency(
    nres: usize,
    jumps: &[(usize, usize)],
    cuts: &BTreeSet<usize>,
) -> Vec<Vec<(usize, Connection)>> {
    let mut adjacency = vec![Vec::new(); nres + 1];
    for i in (1..nres).filter(|i| !cuts.contains(i)) {
        adjacency[i].push((i + 1, Connection::Bond));
        adjacency[i + 1].push((i, Connection::Bond));
    }
    for (n, &(a, b)) in jumps.iter().enumerate() {
        adjacency[a].push((b, Connection::Jump(n + 1)));
        adjacency[b].push((a, Connection::Jump(n + 1)));
    }
    for neighbors in adjacency.iter_mut() {
        neighbors.sort_by_key(|&(residue, connection)| {
            let rank = match connection {
                Connection::Bond => 0,
                Connection::Jump(n) => n,
            };
            (rank, residue)
        });
    }
    adjacency
}

/// Compresses the oriented tree into peptide runs and jump edges.
///
/// Each backbone segment (bounded by cutpoints and chain ends) is entered at exactly
/// one residue; from there at most two peptide edges run towards the segment ends.
fn collect_edges(
    nres: usize,
    root: usize,
    jumps: &[(usize, usize)],
    cuts: &[usize],
    parents: &[Option<(usize, Connection)>],
) -> Vec<Edge> {
    let mut boundaries = vec![0];
    boundaries.extend_from_slice(cuts);
    boundaries.push(nres);

    let mut edges = Vec::new();
    for window in boundaries.windows(2) {
        let (seg_start, seg_stop) = (window[0] + 1, window[1]);
        let entry = (seg_start..=seg_stop)
            .find(|&i| i == root || !matches!(parents[i], Some((_, Connection::Bond))))
            .unwrap_or(seg_start);
        if entry > seg_start {
            edges.push(Edge {
                start: entry,
                stop: seg_start,
                label: EdgeLabel::Peptide,
            });
        }
        if entry < seg_stop {
            edges.push(Edge {
                start: entry,
                stop: seg_stop,
                label: EdgeLabel::Peptide,
            });
        }
    }
    for (n, &(up, down)) in jumps.iter().enumerate() {
        edges.push(Edge {
            start: up,
            stop: down,
            label: EdgeLabel::Jump(n + 1),
        });
    }
    edges
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..=n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn same(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// Returns false when `a` and `b` were already connected.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        self.parent[rb] = ra;
        true
    }
}
