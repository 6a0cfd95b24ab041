//! The nuclear-data service interface consumed by [`crate::chain::Chain`] and
//! [`crate::driver::RootDriver`], per spec section 6.1.
//!
//! Parsing the on-disk library formats and maintaining the in-memory service
//! behind this trait are explicitly out of scope (spec section 1): the core
//! only ever asks for production/destruction rates, daughters and scalar
//! decay data through this narrow query interface.
//!
//! Unsafe: no

use alloc::vec::Vec;

use crate::{
    kza::{FissionType, Kza, PathId},
    rates::RateVector,
};

/// Read-only, process-wide nuclear-data service.
///
/// Implementations are expected to be immutable after load (spec section 5):
/// the core never mutates through this trait and caches results under the
/// assumption that a given `(parent, daughter, path)` query always answers
/// the same way.
pub trait DataService {
    /// Number of neutron-energy groups, fixed for the lifetime of the
    /// service.
    fn ngroups(&self) -> usize;

    /// Ordered, finite sequence of `(daughter, path)` pairs reachable from
    /// `parent` by any single reaction or decay step.
    fn daughters(&self, parent: Kza) -> Vec<(Kza, PathId)>;

    /// Group-wise production rate of `daughter` from `parent` via the given
    /// path. `None` means "no data for this query", which the core treats as
    /// a zero rate vector (spec section 7).
    fn production_rate(&self, parent: Kza, daughter: Kza, path: PathId) -> Option<RateVector>;

    /// Group-wise total destruction rate of `parent` by transmutation.
    fn destruction_rate(&self, parent: Kza) -> Option<RateVector>;

    /// Decay constant `lambda_d >= 0` of `parent`.
    fn decay_constant(&self, parent: Kza) -> f64;

    /// Branching ratio of `parent` decaying into `daughter`, in `[0, 1]`.
    fn branch_ratio(&self, parent: Kza, daughter: Kza) -> f64;

    /// Fission yield of `daughter` from `parent` fissioning via
    /// `fission_type`.
    fn fission_yield(&self, parent: Kza, daughter: Kza, fission_type: FissionType) -> f64;

    /// Spontaneous-fission branching ratio of `parent`.
    fn spontaneous_fission_branch(&self, parent: Kza) -> f64;
}
