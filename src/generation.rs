//! Process-wide chain generation counter (`chainCode` in the original),
//! used to invalidate per-chain caches such as [`crate::pulse_history`]'s
//! decay matrices without threading a token through every call site.
//!
//! Unsafe: no

use core::sync::atomic::{AtomicU64, Ordering};

static CURRENT: AtomicU64 = AtomicU64::new(0);

/// The generation counter for the chain currently being solved.
#[must_use]
pub fn current() -> u64 {
    CURRENT.load(Ordering::Relaxed)
}

/// Advances to a new generation, invalidating every cache keyed on the
/// previous value. Called once per chain by [`crate::driver::RootDriver`].
pub fn advance() -> u64 {
    CURRENT.fetch_add(1, Ordering::Relaxed) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_is_monotone() {
        let a = advance();
        let b = advance();
        assert!(b > a);
        assert_eq!(current(), b);
    }
}
