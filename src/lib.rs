// Copyright 2024 The cofactor64 authors. All rights reserved.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Fast first-line cofactorization for integers below 64 bits.
//!
//! This crate collects the specialized leaf algorithms used to break up
//! residues surviving trial division in a larger factoring pipeline:
//! two independent implementations of Shanks's square form factorization,
//! Brent's variant of Pollard's rho over Montgomery arithmetic, and a
//! sieve-accelerated Fermat difference-of-squares search.
//!
//! Each entry point is a pure function mapping a candidate integer to a
//! nontrivial divisor, or to `None` when its iteration budget is exhausted.
//! A `None` result is never a primality proof.

pub mod arith;
pub mod arith_montgomery;

// Implementations
pub mod fermat;
pub mod pollard_rho;
pub mod squfof;

// Larger inputs are staged through a fixed-width big integer
// before being lowered to u64 for the actual computations.
pub type Uint = bnum::types::U256;

/// How chatty the staged drivers are on stderr.
///
/// Leaf routines never log; only the `Uint`-level drivers do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent,
    Info,
    Debug,
}
