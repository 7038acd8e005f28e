// Copyright 2024 The cofactor64 authors. All rights reserved.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Pollard's rho with Brent's improvements, over Montgomery arithmetic.
//!
//! The iteration map is y -> y*(y+c) mod n, which is conjugate to the
//! usual x^2+c' and equally suitable. Differences are accumulated into a
//! running product so that a single GCD covers a whole batch; when the
//! product collapses to a multiple of n, the batch is replayed one step
//! at a time from its saved start.
//!
//! Reference: R. P. Brent, An improved Monte Carlo factorization algorithm
//! <https://maths-people.anu.edu.au/~brent/pd/rpb051i.pdf>

use num_traits::ToPrimitive;

use crate::arith::gcd64;
use crate::arith_montgomery::{addmod, mg_2adic_inv, mulredc, mulredc63, submod};
use crate::{Uint, Verbosity};

/// Steps between GCD checks. Smaller inputs check more often since their
/// expected cycle is short.
fn batch_size(n: u64) -> u64 {
    let lz = n.leading_zeros();
    if lz > 20 {
        32
    } else if lz > 16 {
        160
    } else if lz > 3 {
        256
    } else {
        384
    }
}

/// Brent's rho with polynomial y(y+c), budget of imax batches.
///
/// Returns a nontrivial divisor of n, or None when the budget runs out
/// or the cycle only yields trivial GCDs. The modulus must be odd and
/// greater than 3.
pub fn brent(n: u64, c: u64, imax: u64) -> Option<u64> {
    assert!(n & 1 == 1 && n > 3);
    if n >> 61 == 0 {
        brent_lazy(n, c, imax)
    } else {
        brent_strict(n, c, imax)
    }
}

/// [`brent`] with the conventional c=1 polynomial.
pub fn brent64(n: u64, imax: u64) -> Option<u64> {
    brent(n, 1, imax)
}

/// Fast path for n below 2^61: values stay unreduced between operations
/// and the cheaper REDC without carry handling applies.
fn brent_lazy(n: u64, c: u64, imax: u64) -> Option<u64> {
    let nhat = mg_2adic_inv(n);
    let m = batch_size(n);
    // Montgomery representation of c
    let c = (((c as u128) << 64) % (n as u128)) as u64;
    let mut y = c;
    let mut x = y;
    let mut ys = y;
    let mut q = 1_u64;
    let mut g = 1_u64;
    let mut r = 1_u64;
    let mut it = 0_u64;

    while g == 1 {
        x = y;
        for _ in 0..=r {
            y = mulredc63(y, y + c, n, nhat);
        }
        let mut k = 0;
        while k < r && g == 1 {
            ys = y;
            for _ in 0..std::cmp::min(m, r - k) {
                y = mulredc63(y, y + c, n, nhat);
                let t1 = if x > y {
                    y.wrapping_sub(x).wrapping_add(n)
                } else {
                    y - x
                };
                q = mulredc63(q, t1, n, nhat);
            }
            g = gcd64(n, q);
            k += m;
            it += 1;
            if it > imax {
                return None;
            }
        }
        r *= 2;
    }

    if g == n {
        // The whole batch collapsed: replay it one step at a time.
        g = 1;
        for _ in 0..=m {
            ys = mulredc63(ys, ys + c, n, nhat);
            let t1 = if x > ys {
                ys.wrapping_sub(x).wrapping_add(n)
            } else {
                ys - x
            };
            g = gcd64(n, t1);
            if g > 1 {
                break;
            }
        }
    }
    if g > 1 && g < n {
        Some(g)
    } else {
        None
    }
}

/// General path, valid for any odd 64-bit modulus: canonical
/// representatives and fully reduced REDC at every step.
fn brent_strict(n: u64, c: u64, imax: u64) -> Option<u64> {
    let nhat = mg_2adic_inv(n);
    let m = batch_size(n);
    let c = (((c as u128) << 64) % (n as u128)) as u64;
    let mut y = c;
    let mut x = y;
    let mut ys = y;
    let mut q = 1_u64;
    let mut g = 1_u64;
    let mut r = 1_u64;
    let mut it = 0_u64;

    while g == 1 {
        x = y;
        for _ in 0..=r {
            y = mulredc(y, addmod(y, c, n), n, nhat);
        }
        let mut k = 0;
        while k < r && g == 1 {
            ys = y;
            for _ in 0..std::cmp::min(m, r - k) {
                y = mulredc(y, addmod(y, c, n), n, nhat);
                q = mulredc(q, submod(y, x, n), n, nhat);
            }
            g = gcd64(n, q);
            k += m;
            it += 1;
            if it > imax {
                return None;
            }
        }
        r *= 2;
    }

    if g == n {
        g = 1;
        for _ in 0..=m {
            ys = mulredc(ys, addmod(ys, c, n), n, nhat);
            g = gcd64(n, submod(ys, x, n));
            if g > 1 {
                break;
            }
        }
    }
    if g > 1 && g < n {
        Some(g)
    } else {
        None
    }
}

/// Staged driver: runs [`brent`] with a size-dependent budget, retrying
/// with different polynomials when a cycle yields nothing.
pub fn rho(n: &Uint, v: Verbosity) -> Option<(u64, u64)> {
    if n.bits() > 64 {
        return None;
    }
    let n64 = n.to_u64()?;
    if n64 < 5 || n64 & 1 == 0 {
        return None;
    }
    let start = std::time::Instant::now();
    let imax = 1_u64 << (n.bits() / 4 + 2);
    for c in 1..=3_u64 {
        if let Some(f) = brent(n64, c, imax) {
            if v >= Verbosity::Info {
                let ms = start.elapsed().as_secs_f64() * 1000.0;
                eprintln!("Pollard rho found factor {f} (c={c}) in {ms:.3}ms");
            }
            return Some((f, n64 / f));
        }
    }
    None
}

#[test]
fn test_brent() {
    // 8051 = 83 * 97
    let f = brent64(8051, 1 << 16).unwrap();
    assert!(f == 83 || f == 97);
    let ns: &[u64] = &[
        235075827453629,
        166130059616737,
        159247921097933,
        224077614412439,
        219669028971857,
    ];
    for &n in ns {
        let f = brent64(n, 1 << 20).unwrap_or_else(|| panic!("failed to factor {n}"));
        assert!(f > 1 && f < n && n % f == 0);
    }
    // prime input: the budget runs out without a factor
    assert_eq!(brent64(1429332497, 1 << 10), None);
}

#[test]
fn test_brent_strict() {
    // (2^31 - 1) * (2^32 - 5) is above 2^61, exercising the general path.
    let n = 2147483647 * 4294967291;
    assert!(n >> 61 != 0);
    let f = brent64(n, 1 << 22).unwrap();
    assert!(f == 2147483647 || f == 4294967291);
}

#[test]
fn test_rho() {
    let ns: &[u64] = &[
        8051,
        235075827453629,
        166130059616737,
        159247921097933,
        224077614412439,
        219669028971857,
        // close primes near sqrt(2^62)
        2147483647 * 2147483659,
    ];
    for &n in ns {
        let (x, y) = rho(&Uint::from(n), Verbosity::Silent)
            .unwrap_or_else(|| panic!("failed to factor {n}"));
        assert!(x > 1 && y > 1 && x * y == n);
    }
    // trivial and even inputs are rejected
    assert_eq!(rho(&Uint::from(4_u64), Verbosity::Silent), None);
    assert_eq!(rho(&Uint::from(3_u64), Verbosity::Silent), None);
}
