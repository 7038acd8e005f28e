// Copyright 2024 The cofactor64 authors. All rights reserved.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Fermat's difference-of-squares method, accelerated by a sieve over
//! smooth moduli (an idea credited to 'neonsignal').
//!
//! Writing n = a^2 - b^2 requires b^2 = a^2 - n to be a square, which is
//! already decided modulo small numbers for most a. For each modulus M in
//! {72, 77, 65} a table indexed by (a mod M, b^2 mod M) marks the offsets
//! i where the shifted value (a+i)^2 - n can be a square mod M; scanning
//! only offsets allowed by all three moduli skips the vast majority of
//! candidates. The tables depend on nothing but the moduli and are built
//! once per process.
//!
//! The method shines on semiprimes p*q with u*p close to v*q for small
//! u, v: calling it with mult = u*v then finds the factorization almost
//! immediately.

use std::sync::OnceLock;

use bitvec_simd::BitVec;

use crate::arith::{exact_sqrt, gcd64, isqrt_ceil};

const M0: usize = 72;
const M1: usize = 77;
const M2: usize = 65;

/// Square-location tables for the three moduli.
///
/// Table for modulus M holds M*M*M bits: bit ((j*M + k)*M + i) says
/// whether k + ((j+i)^2 - j^2) mod M is a quadratic residue, i.e. whether
/// offset i can make b^2 square mod M when a = j and b^2 = k mod M.
pub struct FermatSieve {
    mod0: BitVec,
    mod1: BitVec,
    mod2: BitVec,
}

fn build_table(m: usize) -> BitVec {
    let mut sqr = BitVec::zeros(m);
    for i in 0..m {
        sqr.set((i * i) % m, true);
    }
    let mut tab = BitVec::zeros(m * m * m);
    for j in 0..m {
        for k in 0..m {
            let base = (j * m + k) * m;
            // b^2 steps by 2a+1 when a steps by 1
            let mut a = j;
            let mut b2 = k;
            for i in 0..m {
                if sqr.get_unchecked(b2) {
                    tab.set(base + i, true);
                }
                b2 = (b2 + 2 * a + 1) % m;
                a = (a + 1) % m;
            }
        }
    }
    tab
}

impl FermatSieve {
    pub fn new() -> Self {
        FermatSieve {
            mod0: build_table(M0),
            mod1: build_table(M1),
            mod2: build_table(M2),
        }
    }
}

impl Default for FermatSieve {
    fn default() -> Self {
        FermatSieve::new()
    }
}

static TABLES: OnceLock<FermatSieve> = OnceLock::new();

/// The process-wide tables (about 150kB), built on first use.
/// Concurrent callers block until the single build completes.
pub fn tables() -> &'static FermatSieve {
    TABLES.get_or_init(FermatSieve::new)
}

/// Fermat's method on mult*n, scanning at most limit values of a.
///
/// Returns a nontrivial divisor of n. Perfect squares return their root
/// immediately. The product mult*n must fit in 64 bits.
pub fn fermat_with(sieve: &FermatSieve, n: u64, mult: u64, limit: u64) -> Option<u64> {
    if n <= 3 || mult == 0 {
        return None;
    }
    if let Some(r) = exact_sqrt(n) {
        return Some(r);
    }
    let multn = n.checked_mul(mult)?;
    let a = isqrt_ceil(multn);
    // a*a exceeds 64 bits when multn is close to 2^64; the difference
    // itself is below 2a so the downcast is exact.
    let mut b2 = (a as u128 * a as u128 - multn as u128) as u64;
    if let Some(b) = exact_sqrt(b2) {
        // mult*n = (a-b)(a+b) already
        let f = gcd64(n, a + b);
        return if f > 1 && f < n { Some(f) } else { None };
    }

    // Distance from each offset (mod M0) to the next allowed one,
    // wrapping around the row.
    let base0 = ((a % M0 as u64) as usize * M0 + (b2 % M0 as u64) as usize) * M0;
    let mut s = 0_u16;
    while (s as usize) < M0 && !sieve.mod0.get_unchecked(base0 + s as usize) {
        s += 1;
    }
    if s as usize == M0 {
        // nothing is allowed at this residue pair (bad multiplier)
        return None;
    }
    let mut skip = [0_u16; M0];
    for i in (0..M0).rev() {
        s += 1;
        skip[i] = s;
        if sieve.mod0.get_unchecked(base0 + i) {
            s = 0;
        }
    }

    let base1 = ((a % M1 as u64) as usize * M1 + (b2 % M1 as u64) as usize) * M1;
    let base2 = ((a % M2 as u64) as usize * M2 + (b2 % M2 as u64) as usize) * M2;

    let (mut i0, mut i1, mut i2) = (0_usize, 0_usize, 0_usize);
    let mut a2 = a << 1;
    let mut count = 0_u64;
    loop {
        // advance to the next offset allowed by all three moduli
        let mut d = 0_u64;
        let mut guard = 0;
        loop {
            let s = skip[i0] as usize;
            d += s as u64;
            i0 = (i0 + s) % M0;
            i1 = (i1 + s) % M1;
            i2 = (i2 + s) % M2;
            guard += 1;
            if guard > M0 {
                // the residues never line up for this multiplier
                return None;
            }
            if sieve.mod1.get_unchecked(base1 + i1) && sieve.mod2.get_unchecked(base2 + i2) {
                break;
            }
        }
        // (a+d)^2 - multn from the previous value, without squaring
        b2 += (a2 + d) * d;
        a2 += 2 * d;
        count += d;
        if let Some(b) = exact_sqrt(b2) {
            let f = gcd64(n, a + count + b);
            return if f > 1 && f < n { Some(f) } else { None };
        }
        if count > limit {
            return None;
        }
    }
}

/// [`fermat_with`] using the shared process-wide tables.
pub fn fermat64(n: u64, mult: u64, limit: u64) -> Option<u64> {
    fermat_with(tables(), n, mult, limit)
}

#[test]
fn test_fermat_close_factors() {
    // 83 * 97: the first candidate already splits it
    let f = fermat64(8051, 1, 100).unwrap();
    assert!(f == 83 || f == 97);
    // 2147483647 * 2147483659, a gap of 12 around 2^31
    let n = 2147483647 * 2147483659;
    let f = fermat64(n, 1, 100).unwrap();
    assert!(n % f == 0 && f > 1 && f < n, "bad divisor {f}");
    // perfect squares
    assert_eq!(fermat64(81, 1, 10), Some(9));
    assert_eq!(fermat64(25, 1, 10), Some(5));
}

#[test]
fn test_fermat_multiplier() {
    // 9973 * 30011 with 3*9973 = 29919 close to 30011: the multiplier 3
    // rebalances the factors, a bare scan would need thousands of steps.
    let n = 9973 * 30011;
    assert_eq!(fermat64(n, 1, 50), None);
    let f = fermat64(n, 3, 50).unwrap();
    assert!(n % f == 0 && f > 1 && f < n);
}

#[test]
fn test_fermat_scan() {
    // factorizations requiring an actual sieve scan
    for (p, q) in [(10007_u64, 10177_u64), (65537, 65539), (104729, 106033)] {
        let n = p * q;
        let f = fermat64(n, 1, 100_000).unwrap_or_else(|| panic!("failed on {n}"));
        assert!(f == p || f == q, "bad divisor {f} of {n}");
    }
}

#[test]
fn test_fermat_top_range() {
    // mult*n just below 2^64: ceil(sqrt) is 2^32 and the first b^2 must
    // be formed without wrapping
    let n = u64::MAX - 58;
    if let Some(f) = fermat64(n, 1, 10) {
        assert!(f > 1 && f < n && n % f == 0);
    }
    // close factors just below 2^32
    let (p, q) = (4294967279_u64, 4294967291_u64);
    let f = fermat64(p * q, 1, 10).unwrap();
    assert!(f == p || f == q);
}

#[test]
fn test_fermat_failure() {
    // prime input, budget too small for the trivial representation
    assert_eq!(fermat64(1429332497, 1, 1000), None);
    // degenerate inputs
    assert_eq!(fermat64(3, 1, 10), None);
    assert_eq!(fermat64(8051, 0, 10), None);
    // mult*n overflowing 64 bits
    assert_eq!(fermat64(u64::MAX - 58, 3, 10), None);
}

#[test]
fn test_fermat_tables_concurrent() {
    // the lazy initialization is safe to race
    let handles: Vec<_> = (0..8)
        .map(|_| {
            std::thread::spawn(|| {
                let f = fermat64(8051, 1, 100).unwrap();
                assert!(f == 83 || f == 97);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}
