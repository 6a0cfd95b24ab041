//! Run-wide configuration, replacing the original's static class members
//! (spec section 9, ambient "Configuration" addition).
//!
//! Unsafe: no

use crate::error::Error;

/// Forward mode reports concentrations/activities at each cooling time;
/// reverse mode distributes a target spec backwards across operation
/// intervals (spec section 4.7, `TopScheduleT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `TopSchedule`: ordinary forward solve.
    Forward,
    /// `TopScheduleT`: reverse/target mode.
    Reverse,
}

/// Immutable run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Chains whose truncation metric falls below this are still tallied,
    /// but not grown further (spec section 4.4).
    pub truncation_limit: f64,
    /// Chains whose truncation metric falls below this are discarded
    /// outright (spec section 4.4). Must be `<= truncation_limit`.
    pub ignore_limit: f64,
    /// Cooling times appended after the last pulsing schedule, in seconds
    /// (spec section 4.7).
    pub cooling_times: alloc::vec::Vec<f64>,
    /// Forward or reverse solve mode.
    pub mode: Mode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            truncation_limit: 0.0,
            ignore_limit: 0.0,
            cooling_times: alloc::vec::Vec::new(),
            mode: Mode::Forward,
        }
    }
}

impl Config {
    /// Validates the invariants section 4.4/4.7 assume hold.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.ignore_limit <= self.truncation_limit
            && self.truncation_limit >= 0.0
            && self.ignore_limit >= 0.0
            && self.cooling_times.iter().all(|t| t.is_finite() && *t >= 0.0)
    }

    /// Validates and returns `self`, for call sites that want a `Result`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if [`Self::is_valid`] is `false`.
    pub fn validate(self) -> Result<Self, Error> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(Error::InvalidConfig {
                reason: "ignore_limit must be <= truncation_limit and all limits finite and non-negative",
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(Config::default().is_valid());
    }

    #[test]
    fn ignore_above_truncation_is_invalid() {
        let cfg = Config {
            truncation_limit: 1e-3,
            ignore_limit: 1e-1,
            ..Config::default()
        };
        assert!(!cfg.is_valid());
    }
}
