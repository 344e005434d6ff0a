//! Working-precision control.

/// Tracks the working precision of a continuation, escalating it
/// geometrically up to a ceiling when certification fails.
#[derive(Clone, Debug)]
pub struct PrecisionCtl {
    bits: usize,
    ceiling: usize,
}

impl PrecisionCtl {
    /// Creates a controller starting at `initial` bits with the given
    /// ceiling.
    #[must_use]
    pub fn new(initial: usize, ceiling: usize) -> Self {
        let bits = initial.max(64).min(ceiling);
        Self { bits, ceiling }
    }

    /// Picks a starting precision for a target error: roughly twice the
    /// number of requested bits, plus guard bits for the recurrence.
    #[must_use]
    pub fn for_target(target_error: f64, ceiling: usize) -> Self {
        let wanted = if target_error > 0.0 && target_error < 1.0 {
            let bits = -target_error.log2();
            (2.0 * bits) as usize + 32
        } else {
            64
        };
        Self::new(wanted, ceiling)
    }

    /// The current working precision in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.bits
    }

    /// The precision ceiling in bits.
    #[must_use]
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Doubles the working precision. Returns `false` when the ceiling
    /// has already been reached.
    pub fn escalate(&mut self) -> bool {
        if self.bits >= self.ceiling {
            return false;
        }
        self.bits = (self.bits * 2).min(self.ceiling);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalation_doubles_up_to_ceiling() {
        let mut p = PrecisionCtl::new(64, 300);
        assert_eq!(p.bits(), 64);
        assert!(p.escalate());
        assert_eq!(p.bits(), 128);
        assert!(p.escalate());
        assert_eq!(p.bits(), 256);
        assert!(p.escalate());
        assert_eq!(p.bits(), 300);
        assert!(!p.escalate());
    }

    #[test]
    fn target_error_sets_initial_bits() {
        let p = PrecisionCtl::for_target(1e-30, 100_000);
        // 1e-30 is about 100 bits; start near twice that.
        assert!(p.bits() > 150 && p.bits() < 350);

        let q = PrecisionCtl::for_target(0.5, 100_000);
        assert_eq!(q.bits(), 64);
    }
}
