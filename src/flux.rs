//! The flux source interface, per spec section 6.2.
//!
//! Unsafe: no

use alloc::vec::Vec;

use crate::kza::FluxId;

/// Supplies the group-wise neutron flux for a given flux identity.
///
/// Units: particles * cm^-2 * s^-1. Geometry and flux bookkeeping (how a
/// `FluxId` maps onto a physical interval/location) are out of scope (spec
/// section 1); the core only ever needs the vector itself.
pub trait FluxSource {
    /// The `ngroups`-long flux vector for `flux_id`.
    fn flux_vector(&self, flux_id: FluxId) -> Vec<f64>;
}
