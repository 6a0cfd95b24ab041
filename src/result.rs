//! Accumulates tallied results per target isotope for one root's solve, per
//! spec section 4.8.
//!
//! Ported from `original_source/src/Output/ResultList.C`. Mixture/component
//! bookkeeping (`ResultList::postProcList`, distributing into an output
//! list per mixture component) is out of scope (spec section 1): this only
//! keeps the per-isotope totals a caller can then distribute itself through
//! [`crate::mixture::MixtureSource`].
//!
//! Unsafe: no

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::{chain::Chain, config::Mode, kza::Kza, schedule::TopScheduleResult};

/// Per-target-isotope tallies accumulated across every chain occurrence of
/// that isotope for one root's solve.
#[derive(Debug, Clone, Default)]
pub struct ResultList {
    totals: BTreeMap<Kza, Vec<f64>>,
}

impl ResultList {
    /// An empty result list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tallies every rank that has just been finally determined for this
    /// chain occurrence (spec section 4.8): `chain.set_rank()` through
    /// `chain.chain_length() - 1` identifies the contiguous run of isotopes
    /// whose contributions are ready to commit, since each of them (and
    /// every isotope below them) has exhausted its own daughter search.
    pub fn tally(&mut self, chain: &Chain, result: &TopScheduleResult, mode: Mode) {
        for rank in chain.set_rank()..chain.chain_length() {
            let Some(kza) = chain.kza_at(rank) else {
                continue;
            };
            let values = result.results(rank, mode);
            Self::accumulate(&mut self.totals, kza, &values);
        }
    }

    fn accumulate(totals: &mut BTreeMap<Kza, Vec<f64>>, kza: Kza, values: &[f64]) {
        let entry = totals
            .entry(kza)
            .or_insert_with(|| alloc::vec![0.0; values.len()]);
        if entry.len() < values.len() {
            entry.resize(values.len(), 0.0);
        }
        for (acc, v) in entry.iter_mut().zip(values) {
            *acc += v;
        }
    }

    /// Accumulated `(shutdown, cooling...)` results for `kza`, if any chain
    /// occurrence tallied it.
    #[must_use]
    pub fn get(&self, kza: Kza) -> Option<&[f64]> {
        self.totals.get(&kza).map(Vec::as_slice)
    }

    /// Every tallied isotope and its accumulated results, in ascending
    /// `Kza` order (spec section 6.3: dump output is deterministically
    /// ordered).
    pub fn iter(&self) -> impl Iterator<Item = (Kza, &[f64])> {
        self.totals.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Number of distinct isotopes tallied.
    #[must_use]
    pub fn len(&self) -> usize {
        self.totals.len()
    }

    /// Whether nothing has been tallied yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Merges another result list's tallies into this one, per
    /// `Root::merge`'s corresponding `ResultList::tally` call in the
    /// original.
    pub fn merge(&mut self, other: &Self) {
        for (kza, values) in &other.totals {
            Self::accumulate(&mut self.totals, *kza, values);
        }
    }

    /// Merges another result list's tallies into this one after scaling
    /// every value by `factor`, grounded on `ResultList::postProc` in the
    /// original: a mixture component's output accumulates a root target's
    /// per-daughter concentrations scaled by that target's density in the
    /// component (spec section 4.8).
    pub fn merge_scaled(&mut self, other: &Self, factor: f64) {
        for (kza, values) in &other.totals {
            let scaled: Vec<f64> = values.iter().map(|v| v * factor).collect();
            Self::accumulate(&mut self.totals, *kza, &scaled);
        }
    }
}
