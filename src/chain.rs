//! A single nuclide chain as it grows, truncates, and is solved, per spec
//! section 4.4.
//!
//! Ported conceptually from `original_source/src/Chains/Chain.h` (only the
//! header/description survives in the retrieval pack; the DFS driver below
//! is written from its documented contract rather than transliterated from a
//! missing `Chain.C`).
//!
//! Unsafe: no

use alloc::vec;
use alloc::vec::Vec;

use crate::{
    config::Config,
    data_service::DataService,
    error::Error,
    kza::{FluxId, Kza, PathId},
    math::fill_t_element,
    matrix::Matrix,
    rates::RateVector,
};

/// Initial capacity of the flat rate arrays (`INITMAXCHAINLENGTH` in the
/// original).
const INIT_MAX_CHAIN_LENGTH: usize = 25;

struct RankEntry {
    kza: Kza,
    /// Rank at which `kza` first appeared earlier in the chain, or `-1`.
    loop_rank: i64,
    /// Cached `(daughter, path)` list for this rank's nuclide, fetched once.
    daughters: Option<Vec<(Kza, PathId)>>,
    /// Index of the next unvisited daughter.
    daughter_cursor: usize,
    /// Set when truncation decided this rank should not be grown further:
    /// the next `build()` call treats it as if it had no daughters left.
    force_leaf: bool,
    /// Group-wise production rate vector along the edge that produced this
    /// rank from its parent (`None` for rank 0, the root).
    production_vector: Option<RateVector>,
    /// Group-wise total transmutation destruction-rate vector for this
    /// nuclide.
    destruction_vector: Option<RateVector>,
}

/// Holds one chain as it is grown, truncated and solved for a single target
/// (root) nuclide, per spec section 4.4.
#[derive(Debug)]
pub struct Chain {
    target: Kza,
    ranks: Vec<RankEntry>,
    /// Rank of the first nuclide that changed since the previous chain
    /// returned by [`Self::build`].
    new_rank: usize,
    /// Rank of the first nuclide to be tallied for this chain, or
    /// `ranks.len()` (an empty range) when the last [`Self::build`] call
    /// only grew the chain and settled nothing yet.
    set_rank: usize,
    /// Ranks to physically remove at the start of the next [`Self::build`]
    /// call: popping is deferred past the exhaustion event that reports
    /// `set_rank` so the caller can solve and tally against the
    /// not-yet-shrunk chain first.
    pending_pop: usize,
    /// Set once every chain rooted at `target` has been fully explored.
    finished: bool,
    solving_ref: bool,
    n_fluxes: usize,
    max_chain_length: usize,
    /// `P[col + flux*max_chain_length]`-style flat storage, per spec
    /// section 4.4's `colRates` layout.
    p: Vec<f64>,
    d: Vec<f64>,
    l_prod: Vec<f64>,
    l_dest: Vec<f64>,
}

impl core::fmt::Debug for RankEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RankEntry")
            .field("kza", &self.kza)
            .field("loop_rank", &self.loop_rank)
            .finish_non_exhaustive()
    }
}

impl Chain {
    /// Creates an un-grown chain for `target`: a call to [`Self::build`]
    /// must follow before any rates or matrices are meaningful.
    #[must_use]
    pub fn new(target: Kza, n_fluxes: usize) -> Self {
        Self {
            target,
            ranks: Vec::new(),
            new_rank: 0,
            set_rank: 0,
            pending_pop: 0,
            finished: false,
            solving_ref: false,
            n_fluxes,
            max_chain_length: INIT_MAX_CHAIN_LENGTH,
            p: vec![0.0; INIT_MAX_CHAIN_LENGTH * n_fluxes.max(1)],
            d: vec![0.0; INIT_MAX_CHAIN_LENGTH * n_fluxes.max(1)],
            l_prod: vec![0.0; INIT_MAX_CHAIN_LENGTH],
            l_dest: vec![0.0; INIT_MAX_CHAIN_LENGTH],
        }
    }

    /// The root (target) nuclide of this chain.
    #[must_use]
    pub fn root(&self) -> Kza {
        self.target
    }

    /// Current chain length. `0` before the first [`Self::build`] call.
    #[must_use]
    pub fn chain_length(&self) -> usize {
        self.ranks.len()
    }

    /// Rank of the first nuclide changed since the previous valid chain.
    #[must_use]
    pub fn new_rank(&self) -> usize {
        self.new_rank
    }

    /// Rank of the first nuclide to be tallied for the current chain.
    #[must_use]
    pub fn set_rank(&self) -> usize {
        self.set_rank
    }

    /// The nuclide identity at `rank`, or `None` if `rank >= chain_length()`.
    #[must_use]
    pub fn kza_at(&self, rank: usize) -> Option<Kza> {
        self.ranks.get(rank).map(|r| r.kza)
    }

    /// Switches between reference-flux truncation evaluation and the full
    /// solution (spec section 4.4). In reference mode the last pole
    /// `d[chain_length-1]` is forced to zero to avoid a spurious
    /// degeneracy.
    pub fn set_solving_ref(&mut self, solving_ref: bool) {
        self.solving_ref = solving_ref;
    }

    fn ensure_rate_capacity(&mut self) {
        let needed = self.ranks.len();
        if needed > self.max_chain_length {
            self.max_chain_length *= 2;
            self.p.resize(self.max_chain_length * self.n_fluxes.max(1), 0.0);
            self.d.resize(self.max_chain_length * self.n_fluxes.max(1), 0.0);
            self.l_prod.resize(self.max_chain_length, 0.0);
            self.l_dest.resize(self.max_chain_length, 0.0);
        } else if self.max_chain_length > INIT_MAX_CHAIN_LENGTH
            && needed < self.max_chain_length / 4
        {
            self.max_chain_length /= 2;
            self.p.truncate(self.max_chain_length * self.n_fluxes.max(1));
            self.d.truncate(self.max_chain_length * self.n_fluxes.max(1));
            self.l_prod.truncate(self.max_chain_length);
            self.l_dest.truncate(self.max_chain_length);
        }
    }

    fn push_rank(
        &mut self,
        kza: Kza,
        loop_rank: i64,
        production_vector: Option<RateVector>,
        destruction_vector: Option<RateVector>,
    ) {
        self.ranks.push(RankEntry {
            kza,
            loop_rank,
            daughters: None,
            daughter_cursor: 0,
            force_leaf: false,
            production_vector,
            destruction_vector,
        });
        self.ensure_rate_capacity();
    }

    fn pop_rank(&mut self) {
        self.ranks.pop();
        self.ensure_rate_capacity();
    }

    fn ensure_daughters(&mut self, rank: usize, data: &dyn DataService) {
        if self.ranks[rank].daughters.is_none() {
            let kza = self.ranks[rank].kza;
            let daughters = if self.ranks[rank].force_leaf {
                Vec::new()
            } else {
                data.daughters(kza)
            };
            self.ranks[rank].daughters = Some(daughters);
        }
    }

    /// Rough truncation metric (spec section 4.4): product of per-edge
    /// weights (branching ratio, or production/destruction ratio for
    /// transmutation edges) from rank 1 through `tail`, evaluated against
    /// the reference flux.
    fn truncation_metric(&self, tail: usize, data: &dyn DataService, reference_flux: &[f64]) -> f64 {
        let mut metric = 1.0;
        for rank in 1..=tail {
            let parent = self.ranks[rank - 1].kza;
            let child = self.ranks[rank].kza;
            let branch = data.branch_ratio(parent, child);
            let edge_weight = if branch > 0.0 {
                branch
            } else {
                let prod = self.ranks[rank]
                    .production_vector
                    .as_ref()
                    .and_then(|rv| rv.dot(reference_flux).ok())
                    .unwrap_or(0.0);
                let dest = self.ranks[rank - 1]
                    .destruction_vector
                    .as_ref()
                    .and_then(|rv| rv.dot(reference_flux).ok())
                    .unwrap_or(0.0);
                if dest > 0.0 {
                    (prod / dest).min(1.0)
                } else {
                    0.0
                }
            };
            metric *= edge_weight;
        }
        metric
    }

    /// Grows or backtracks the chain by one step, per spec section 4.4.
    ///
    /// Returns `true` with a valid chain state, or `false` once every
    /// chain rooted at this target has been exhausted.
    ///
    /// Two kinds of `true` return carry different tallying obligations
    /// (spec section 4.8; `Chain.h`'s `setRank` doc): a *grow* return adds
    /// one new rank and leaves nothing settled yet (`set_rank() ==
    /// chain_length()`, an empty tally range); an *exhaustion* return
    /// settles the contiguous run of ranks from `set_rank()` up to
    /// `chain_length() - 1` that have all just run out of daughters, still
    /// against the chain's current, not-yet-shrunk shape. The ranks
    /// themselves aren't physically removed until the following call, so
    /// the caller can solve and tally them first.
    pub fn build(&mut self, data: &dyn DataService, config: &Config, reference_flux: &[f64]) -> bool {
        if self.finished {
            return false;
        }

        if self.pending_pop > 0 {
            for _ in 0..self.pending_pop {
                self.pop_rank();
            }
            self.pending_pop = 0;
            if self.ranks.is_empty() {
                self.finished = true;
                tracing::trace!(target = %self.target, "chain exhausted");
                return false;
            }
        } else if self.ranks.is_empty() {
            let dest = data.destruction_rate(self.target);
            self.push_rank(self.target, -1, None, dest);
            tracing::trace!(target = %self.target, "chain seeded with root");
        }

        loop {
            let tail = self.ranks.len() - 1;
            self.ensure_daughters(tail, data);

            let cursor = self.ranks[tail].daughter_cursor;
            let n_daughters = self.ranks[tail].daughters.as_ref().unwrap().len();

            if cursor >= n_daughters {
                // Walk upward over the contiguous run of ancestors that
                // have also run out of daughters: all of them settle
                // together in this one tally event.
                let mut top = tail;
                while top > 0 {
                    let parent = top - 1;
                    self.ensure_daughters(parent, data);
                    let parent_cursor = self.ranks[parent].daughter_cursor;
                    let parent_n = self.ranks[parent].daughters.as_ref().unwrap().len();
                    if parent_cursor >= parent_n {
                        top = parent;
                    } else {
                        break;
                    }
                }

                self.set_rank = top;
                self.pending_pop = tail - top + 1;
                tracing::trace!(rank = top, tail, "chain exhausted: settling contiguous range");
                return true;
            }

            let (daughter_kza, path) = self.ranks[tail].daughters.as_ref().unwrap()[cursor];
            self.ranks[tail].daughter_cursor += 1;

            let loop_rank = self.ranks[..=tail]
                .iter()
                .position(|r| r.kza == daughter_kza)
                .map_or(-1, |r| r as i64);

            let production_vector =
                data.production_rate(self.ranks[tail].kza, daughter_kza, path);
            let destruction_vector = data.destruction_rate(daughter_kza);

            self.push_rank(daughter_kza, loop_rank, production_vector, destruction_vector);
            let new_tail = self.ranks.len() - 1;

            let metric = self.truncation_metric(new_tail, data, reference_flux);

            if metric < config.ignore_limit {
                self.pop_rank();
                tracing::trace!(rank = new_tail, metric, "ignored: below ignore_limit");
                continue;
            }

            if metric < config.truncation_limit {
                self.ranks[new_tail].force_leaf = true;
                tracing::trace!(rank = new_tail, metric, "truncated: below truncation_limit");
            }

            self.new_rank = new_tail;
            // Nothing settles on a grow: set_rank == chain_length is an
            // empty tally range until a later exhaustion event commits it.
            self.set_rank = self.ranks.len();
            self.pending_pop = 0;
            return true;
        }
    }

    /// Precomputes the four scalar rates `(P, d, L, l)` for every rank and
    /// every flux in the problem, per spec section 4.4.
    ///
    /// # Errors
    /// Propagates [`Error::GroupMismatch`] if a flux vector's length does
    /// not match the rate vectors' group count.
    pub fn collapse_rates(&mut self, data: &dyn DataService, fluxes: &[Vec<f64>]) -> Result<(), Error> {
        let n = self.ranks.len();
        let nf = self.n_fluxes.max(1);
        for rank in 0..n {
            self.l_dest[rank] = data.decay_constant(self.ranks[rank].kza);
            self.l_prod[rank] = 0.0; // flux-independent decay production folded in at fill time per daughter edge

            for (flux_idx, flux) in fluxes.iter().enumerate() {
                let p = match &self.ranks[rank].production_vector {
                    Some(rv) => rv.dot(flux)?,
                    None => 0.0,
                };
                let d = match &self.ranks[rank].destruction_vector {
                    Some(rv) => rv.dot(flux)?,
                    None => 0.0,
                };
                self.p[flux_idx * self.max_chain_length + rank] = p;
                self.d[flux_idx * self.max_chain_length + rank] = d;
            }
        }

        if self.solving_ref && n > 0 {
            // force the last pole to zero to avoid a spurious degeneracy
            // during reference/truncation evaluation (spec section 4.4).
            for flux_idx in 0..nf {
                self.d[flux_idx * self.max_chain_length + n - 1] = 0.0;
            }
        }

        Ok(())
    }

    fn destruction_slice(&self, flux_id: FluxId) -> &[f64] {
        let flux_idx = flux_id.0 as usize;
        let base = flux_idx * self.max_chain_length;
        &self.d[base..base + self.ranks.len()]
    }

    /// Fills a transfer matrix for one constant-flux pulse, per spec
    /// section 4.4.
    ///
    /// The original reuses rows `< new_rank()` across successive chains
    /// that only grow by one rank at a time; here every schedule node's
    /// transfer matrices are rebuilt from scratch per valid chain (see
    /// `schedule.rs`), so every row is filled unconditionally rather than
    /// only `row >= new_rank()`. `new_rank()`/`set_rank()` remain the
    /// source of truth for which ranks to tally.
    pub fn fill_t_mat(&self, m: &mut Matrix, t: f64, flux_id: FluxId) {
        let n = self.ranks.len();
        if m.size() != n {
            *m = Matrix::identity(n);
        }
        let d = self.destruction_slice(flux_id);
        let flux_idx = flux_id.0 as usize;
        let p_base = flux_idx * self.max_chain_length;
        let loop_ranks: Vec<i64> = self.ranks.iter().map(|r| r.loop_rank).collect();

        for row in 0..n {
            m.set(row, row, (-d[row] * t).exp());
            for col in 0..row {
                let production: f64 = (col + 1..=row).map(|k| self.p[p_base + k]).product();
                let value = fill_t_element(row, col, production, d, t, &loop_ranks, row);
                m.set(row, col, value);
            }
        }
    }

    /// Fills a pure-decay matrix over elapsed time `tau`. Pure decay never
    /// loops (spec section 4.4), so this always uses the Bateman form,
    /// falling back to Laplace inversion only as defensive degenerate-pole
    /// handling. See [`Self::fill_t_mat`] on why every row is filled.
    pub fn set_decay(&self, m: &mut Matrix, tau: f64) {
        let n = self.ranks.len();
        if m.size() != n {
            *m = Matrix::identity(n);
        }
        for row in 0..n {
            m.set(row, row, (-self.l_dest[row] * tau).exp());
            for col in 0..row {
                let value = crate::math::bateman(row, col, &self.l_dest[..n], tau)
                    .unwrap_or_else(|| crate::math::laplace_inverse(row, col, &self.l_dest[..n], tau).0);
                m.set(row, col, value);
            }
        }
    }

    /// `C = A . B` over the whole chain.
    pub fn mult(&self, c: &mut Matrix, a: &Matrix, b: &Matrix) {
        c.multiply_from(a, b, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kza::FissionType;

    struct TwoIsotope;
    impl DataService for TwoIsotope {
        fn ngroups(&self) -> usize {
            1
        }
        fn daughters(&self, parent: Kza) -> Vec<(Kza, PathId)> {
            if parent == Kza::new(1, 1, 0) {
                alloc::vec![(Kza::new(1, 2, 0), PathId(0))]
            } else {
                Vec::new()
            }
        }
        fn production_rate(&self, _parent: Kza, _daughter: Kza, _path: PathId) -> Option<RateVector> {
            Some(RateVector::new(alloc::vec![1e-24]))
        }
        fn destruction_rate(&self, parent: Kza) -> Option<RateVector> {
            if parent == Kza::new(1, 1, 0) {
                Some(RateVector::new(alloc::vec![1e-24]))
            } else {
                None
            }
        }
        fn decay_constant(&self, _parent: Kza) -> f64 {
            0.0
        }
        fn branch_ratio(&self, _parent: Kza, _daughter: Kza) -> f64 {
            0.0
        }
        fn fission_yield(&self, _parent: Kza, _daughter: Kza, _fission_type: FissionType) -> f64 {
            0.0
        }
        fn spontaneous_fission_branch(&self, _parent: Kza) -> f64 {
            0.0
        }
    }

    #[test]
    fn grows_then_exhausts() {
        let data = TwoIsotope;
        let config = Config::default();
        let flux = [1.0];
        let mut chain = Chain::new(Kza::new(1, 1, 0), 1);

        // root has a single daughter: seeding and growing into it happen
        // in the same call, since nothing stops the search.
        assert!(chain.build(&data, &config, &flux));
        assert_eq!(chain.chain_length(), 2);
        assert_eq!(chain.kza_at(1), Some(Kza::new(1, 2, 0)));
        assert_eq!(chain.set_rank(), chain.chain_length(), "grow leaves an empty tally range");

        // the daughter is stable and root has no further daughters either:
        // both ranks settle together in one contiguous exhaustion event,
        // against the still-intact two-rank chain.
        assert!(chain.build(&data, &config, &flux));
        assert_eq!(chain.set_rank(), 0);
        assert_eq!(chain.chain_length(), 2);

        // the exhausted ranks are popped at the start of this call, and
        // nothing is left to grow.
        assert!(!chain.build(&data, &config, &flux));
    }

    #[test]
    fn fill_t_mat_scenario_a() {
        // single stable parent, single pulse (spec section 8, scenario A)
        struct Stable;
        impl DataService for Stable {
            fn ngroups(&self) -> usize {
                1
            }
            fn daughters(&self, _parent: Kza) -> Vec<(Kza, PathId)> {
                Vec::new()
            }
            fn production_rate(&self, _p: Kza, _d: Kza, _path: PathId) -> Option<RateVector> {
                None
            }
            fn destruction_rate(&self, _parent: Kza) -> Option<RateVector> {
                Some(RateVector::new(alloc::vec![2e-24]))
            }
            fn decay_constant(&self, _parent: Kza) -> f64 {
                0.0
            }
            fn branch_ratio(&self, _p: Kza, _d: Kza) -> f64 {
                0.0
            }
            fn fission_yield(&self, _p: Kza, _d: Kza, _f: FissionType) -> f64 {
                0.0
            }
            fn spontaneous_fission_branch(&self, _p: Kza) -> f64 {
                0.0
            }
        }

        let data = Stable;
        let config = Config::default();
        let flux = [5e14];
        let mut chain = Chain::new(Kza::new(26, 56, 0), 1);
        assert!(chain.build(&data, &config, &flux));
        chain.collapse_rates(&data, &[alloc::vec![5e14]]).unwrap();

        let mut m = Matrix::identity(1);
        chain.fill_t_mat(&mut m, 3.154e7, FluxId(0));
        approx::assert_relative_eq!(m.get(0, 0), 0.968_95, max_relative = 1e-4);
    }
}
