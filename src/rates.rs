//! Group-wise rate vectors and the fixed group structure.
//!
//! Unsafe: no

use alloc::vec::Vec;

use crate::error::Error;

/// A finite sequence of non-negative doubles over neutron energy groups, of
/// length `ngroups` fixed globally after data load (spec section 3).
#[derive(Debug, Clone, PartialEq)]
pub struct RateVector(Vec<f64>);

impl RateVector {
    /// Builds a rate vector from raw group values. Does not validate
    /// non-negativity: the data service is trusted to supply physical rates,
    /// per spec section 7 ("all inputs are pre-validated").
    #[must_use]
    #[inline]
    pub fn new(groups: Vec<f64>) -> Self {
        Self(groups)
    }

    /// A rate vector of `ngroups` zeros, used when the data service reports
    /// no entry for a nuclide (spec section 7: "treated as zero rate").
    #[must_use]
    #[inline]
    pub fn zero(ngroups: usize) -> Self {
        Self(alloc::vec![0.0; ngroups])
    }

    /// Number of groups.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this rate vector has no groups.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Inner product against a flux vector of matching length, per spec
    /// section 4.3 ("integrates them against the flux").
    ///
    /// # Errors
    /// Returns [`Error::GroupMismatch`] if `flux.len() != self.len()`.
    pub fn dot(&self, flux: &[f64]) -> Result<f64, Error> {
        if flux.len() != self.0.len() {
            return Err(Error::GroupMismatch {
                expected: self.0.len(),
                found: flux.len(),
            });
        }
        Ok(self
            .as_slice()
            .iter()
            .zip(flux)
            .map(|(sigma, phi)| sigma * phi)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_product() {
        let rv = RateVector::new(alloc::vec![1.0, 2.0, 3.0]);
        let flux = [2.0, 2.0, 2.0];
        assert_eq!(rv.dot(&flux).unwrap(), 12.0);
    }

    #[test]
    fn mismatch_errors() {
        let rv = RateVector::new(alloc::vec![1.0, 2.0]);
        assert!(matches!(
            rv.dot(&[1.0]).unwrap_err(),
            Error::GroupMismatch {
                expected: 2,
                found: 1
            }
        ));
    }
}
