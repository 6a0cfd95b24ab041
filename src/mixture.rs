//! The narrow interface [`crate::driver::RootDriver`] needs onto mixture
//! bookkeeping: which components contain a given target nuclide, and at
//! what number density. Mixture/component bookkeeping itself is out of
//! scope (spec section 1); this only specifies the query the core issues
//! into it, grounded on `mixList->solve`/`getComp` in
//! `original_source/src/Chains/Root.C`.
//!
//! Unsafe: no

use alloc::vec::Vec;

use crate::kza::Kza;

/// One component of a mixture that contains a target nuclide.
///
/// The schedule tree (and hence the flux each pulse draws from) is the same
/// for every mixture solving a given target; only the density scaling at
/// post-processing time is component-specific (spec section 4.8).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentRef {
    /// Stable identifier of the component, used as the dump record key
    /// (spec section 6.3).
    pub component_id: i32,
    /// Number density of the target nuclide in this component.
    pub density: f64,
}

/// Supplies the set of mixture components that contain a given root
/// nuclide.
pub trait MixtureSource {
    /// Every component across every mixture that contains `target`, per
    /// spec section 2 ("solve each chain across the schedule for each
    /// mixture that contains that target").
    fn components_containing(&self, target: Kza) -> Vec<ComponentRef>;
}
