//! Property-based tests for ball arithmetic.
//!
//! The one invariant every operation must keep is enclosure soundness:
//! applying an operation to balls built from exact rationals must produce
//! a ball containing the exact rational result.
