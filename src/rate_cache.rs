//! Memoizes collapsed scalar rates keyed by `(flux, nuclide)`, per spec
//! section 4.3.
//!
//! Requires `std`: the memoization is a pure performance layer (every entry
//! can always be recomputed from the data service on a miss), so gating it
//! out of `no_std` builds rather than pulling in a `hashbrown` dependency
//! the rest of the crate has no other use for costs nothing but repeated
//! work in that configuration.
//!
//! Unsafe: no

use std::collections::HashMap;

use crate::{
    data_service::DataService,
    error::Error,
    kza::{FluxId, Kza},
};

/// The four collapsed scalars for one `(nuclide, flux)` pair: transmutation
/// production `P`, transmutation destruction `d`, decay production `L`,
/// decay destruction `l`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collapsed {
    /// Transmutation production rate, `<sigma_prod, phi>`.
    pub production: f64,
    /// Transmutation destruction rate, `<sigma_dest, phi>`.
    pub destruction: f64,
    /// Decay production rate (flux-independent).
    pub decay_production: f64,
    /// Decay destruction rate (flux-independent), i.e. `lambda_d`.
    pub decay_destruction: f64,
}

/// Two-level memoization: outer key is flux identity, inner key is nuclide
/// identity. Lifetime is process-wide (spec section 4.3: "Evicted only at
/// end of run").
#[derive(Debug, Default)]
pub struct RateCache {
    by_flux: HashMap<FluxId, HashMap<Kza, Collapsed>>,
}

impl RateCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the collapsed scalars for `(nuclide, flux)`, computing and
    /// memoizing them on a cache miss.
    ///
    /// `production_total` is the nuclide's destruction-rate-weighted
    /// production contribution along a specific daughter path: since a
    /// parent may produce several daughters, callers collapse per
    /// `(parent, daughter, path)` and pass the already-selected production
    /// rate vector; this cache stores one production scalar per nuclide
    /// (i.e. per rank in a chain, where the production edge is fixed by the
    /// chain itself) and the parent's total destruction scalar.
    ///
    /// # Errors
    /// Propagates [`Error::GroupMismatch`] from the inner product.
    pub fn collapse(
        &mut self,
        data: &dyn DataService,
        flux: &[f64],
        flux_id: FluxId,
        nuclide: Kza,
        production_rate: Option<&crate::rates::RateVector>,
    ) -> Result<Collapsed, Error> {
        if let Some(hit) = self.by_flux.get(&flux_id).and_then(|inner| inner.get(&nuclide)) {
            return Ok(*hit);
        }

        let production = match production_rate {
            Some(rv) => rv.dot(flux)?,
            None => 0.0,
        };
        let destruction = match data.destruction_rate(nuclide) {
            Some(rv) => rv.dot(flux)?,
            None => 0.0,
        };
        let decay_destruction = data.decay_constant(nuclide);

        let collapsed = Collapsed {
            production,
            destruction,
            decay_production: 0.0,
            decay_destruction,
        };

        self.by_flux
            .entry(flux_id)
            .or_default()
            .insert(nuclide, collapsed);

        Ok(collapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub;
    impl DataService for Stub {
        fn ngroups(&self) -> usize {
            1
        }
        fn daughters(&self, _parent: Kza) -> Vec<(Kza, crate::kza::PathId)> {
            Vec::new()
        }
        fn production_rate(
            &self,
            _parent: Kza,
            _daughter: Kza,
            _path: crate::kza::PathId,
        ) -> Option<crate::rates::RateVector> {
            None
        }
        fn destruction_rate(&self, _parent: Kza) -> Option<crate::rates::RateVector> {
            Some(crate::rates::RateVector::new(alloc::vec![2.0]))
        }
        fn decay_constant(&self, _parent: Kza) -> f64 {
            0.0
        }
        fn branch_ratio(&self, _parent: Kza, _daughter: Kza) -> f64 {
            0.0
        }
        fn fission_yield(
            &self,
            _parent: Kza,
            _daughter: Kza,
            _fission_type: crate::kza::FissionType,
        ) -> f64 {
            0.0
        }
        fn spontaneous_fission_branch(&self, _parent: Kza) -> f64 {
            0.0
        }
    }

    #[test]
    fn caches_on_second_lookup() {
        let mut cache = RateCache::new();
        let data = Stub;
        let flux = [3.0];
        let flux_id = FluxId(0);
        let kza = Kza::new(26, 56, 0);

        let first = cache.collapse(&data, &flux, flux_id, kza, None).unwrap();
        assert_eq!(first.destruction, 6.0);

        let second = cache.collapse(&data, &flux, flux_id, kza, None).unwrap();
        assert_eq!(second, first);
    }
}
