//! A pulsing history: a nested sequence of (pulse, dwell) levels applied to
//! a transfer matrix, per spec section 4.5.
//!
//! Ported from `original_source/src/PulseHistory.C`.
//!
//! Unsafe: no

use alloc::string::String;
use alloc::vec::Vec;

use crate::{chain::Chain, generation, matrix::Matrix};

/// One pulsing history, shared by reference across every node of the
/// schedule hierarchy that pulses the same way.
#[derive(Debug, Clone)]
pub struct PulseHistory {
    name: String,
    /// Number of pulses at each level.
    n_pulse: Vec<u64>,
    /// Dwell time between pulses at each level, in seconds.
    td: Vec<f64>,
    /// Cached decay matrix per level, valid only while `set_code` matches
    /// the current chain generation ([`generation::current`]).
    decay: Vec<Matrix>,
    set_code: Option<u64>,
}

impl PulseHistory {
    /// Builds a pulsing history of `n_pulse.len()` levels. Panics if
    /// `n_pulse.len() != td.len()`.
    #[must_use]
    pub fn new(name: impl Into<String>, n_pulse: Vec<u64>, td: Vec<f64>) -> Self {
        assert_eq!(n_pulse.len(), td.len(), "PulseHistory::new: level count mismatch");
        let n_levels = n_pulse.len();
        Self {
            name: name.into(),
            n_pulse,
            td,
            decay: alloc::vec![Matrix::empty(); n_levels],
            set_code: None,
        }
    }

    /// A history with no pulsing levels at all: `doHistory` is then the
    /// identity operation.
    #[must_use]
    pub fn none(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new(), Vec::new())
    }

    /// Combines `hist1`, an optional intervening delay, and `hist2` into a
    /// single flattened history, per spec section 4.5 ("merge
    /// constructor"): a schedule collapse folds a sub-schedule's own
    /// history into its parent's this way.
    #[must_use]
    pub fn merge(hist1: Option<&Self>, delay: f64, hist2: Option<&Self>) -> Self {
        let mut n_pulse = Vec::new();
        let mut td = Vec::new();

        if let Some(h1) = hist1 {
            n_pulse.extend_from_slice(&h1.n_pulse);
            td.extend_from_slice(&h1.td);
        }
        if delay > 0.0 {
            n_pulse.push(1);
            td.push(delay);
        }
        if let Some(h2) = hist2 {
            n_pulse.extend_from_slice(&h2.n_pulse);
            td.extend_from_slice(&h2.td);
        }

        let n_levels = n_pulse.len();
        Self {
            name: String::new(),
            n_pulse,
            td,
            decay: alloc::vec![Matrix::empty(); n_levels],
            // the merged history tracks the same chain as hist1 did, same
            // as the original copying `hist1->setCode`
            set_code: hist1.and_then(|h| h.set_code),
        }
    }

    /// Name used to identify this history in output.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of pulsing levels.
    #[must_use]
    pub fn n_levels(&self) -> usize {
        self.n_pulse.len()
    }

    /// Solves the decay matrix for every level against `chain`, unless it
    /// has already been solved for the chain's current generation (spec
    /// section 4.5: decay matrices are flux-independent and process-wide
    /// cacheable per chain).
    pub fn set_decay(&mut self, chain: &Chain) {
        let current = generation::current();
        if self.set_code != Some(current) {
            for (level, &dwell) in self.td.iter().enumerate() {
                chain.set_decay(&mut self.decay[level], dwell);
            }
            self.set_code = Some(current);
        }
    }

    /// Applies this pulsing history to a transfer matrix, per spec section
    /// 4.5: level by level, `T' = (T . D)^(n-1) . T`.
    #[must_use]
    pub fn do_history(&self, mut op_t: Matrix) -> Matrix {
        for (level, &n) in self.n_pulse.iter().enumerate() {
            let mut work_t = op_t.multiply(&self.decay[level]);
            work_t = work_t.pow(n.saturating_sub(1));
            op_t = work_t.multiply(&op_t);
        }
        op_t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_service::DataService;
    use crate::kza::{FissionType, Kza, PathId};
    use approx::assert_relative_eq;

    struct Stable;
    impl DataService for Stable {
        fn ngroups(&self) -> usize {
            1
        }
        fn daughters(&self, _parent: Kza) -> Vec<(Kza, PathId)> {
            Vec::new()
        }
        fn production_rate(&self, _p: Kza, _d: Kza, _path: PathId) -> Option<crate::rates::RateVector> {
            None
        }
        fn destruction_rate(&self, _parent: Kza) -> Option<crate::rates::RateVector> {
            None
        }
        fn decay_constant(&self, _parent: Kza) -> f64 {
            1e-2
        }
        fn branch_ratio(&self, _p: Kza, _d: Kza) -> f64 {
            0.0
        }
        fn fission_yield(&self, _p: Kza, _d: Kza, _f: FissionType) -> f64 {
            0.0
        }
        fn spontaneous_fission_branch(&self, _parent: Kza) -> f64 {
            0.0
        }
    }

    #[test]
    fn no_levels_is_identity() {
        let history = PulseHistory::none("single-pulse");
        let m = Matrix::identity(1);
        let result = history.do_history(m.clone());
        assert_eq!(result, m);
    }

    #[test]
    fn single_pulse_one_level_matches_plain_decay() {
        // one level, one pulse: (T.D)^0 . T == T, so doHistory is a no-op
        // regardless of the decay matrix's contents.
        let data = Stable;
        let mut chain = Chain::new(Kza::new(1, 1, 0), 1);
        let config = crate::config::Config::default();
        let flux = [1.0];
        chain.build(&data, &config, &flux);

        let mut history = PulseHistory::new("one-shot", alloc::vec![1], alloc::vec![1e4]);
        history.set_decay(&chain);

        let t = Matrix::identity(1);
        let result = history.do_history(t.clone());
        assert_relative_eq!(result.get(0, 0), t.get(0, 0));
    }

    #[test]
    fn merge_concatenates_levels() {
        let h1 = PulseHistory::new("h1", alloc::vec![3], alloc::vec![10.0]);
        let h2 = PulseHistory::new("h2", alloc::vec![5], alloc::vec![20.0]);
        let merged = PulseHistory::merge(Some(&h1), 2.0, Some(&h2));
        assert_eq!(merged.n_levels(), 3);
        assert_eq!(merged.td, alloc::vec![10.0, 2.0, 20.0]);
        assert_eq!(merged.n_pulse, alloc::vec![3, 1, 5]);
    }

    #[test]
    fn merge_skips_zero_delay() {
        let h1 = PulseHistory::new("h1", alloc::vec![3], alloc::vec![10.0]);
        let merged = PulseHistory::merge(Some(&h1), 0.0, None);
        assert_eq!(merged.n_levels(), 1);
    }
}
