// Copyright 2024 The cofactor64 authors. All rights reserved.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Montgomery form arithmetic for 64-bit moduli.
//!
//! The REDC primitives are written with portable double-width (u128)
//! arithmetic; no architecture-specific code is required for correctness.
//!
//! Reference:
//! Peter L. Montgomery, Modular Multiplication Without Trial Division
//! <https://www.ams.org/journals/mcom/1985-44-170/S0025-5718-1985-0777282-X/S0025-5718-1985-0777282-X.pdf>

/// Returns nhat such that n*nhat = -1 mod 2^64.
///
/// Computed by Newton iteration: each doubling pass squares the number
/// of correct low bits of the inverse.
pub fn mg_2adic_inv(n: u64) -> u64 {
    debug_assert!(n & 1 == 1);
    // x*n == 1 mod 2^4
    let mut x = (n.wrapping_add(2) & 4).wrapping_shl(1).wrapping_add(n);
    for _ in 0..4 {
        // doubles to mod 2^8, 2^16, 2^32, 2^64
        x = x.wrapping_mul(2u64.wrapping_sub(n.wrapping_mul(x)));
    }
    debug_assert!(n.wrapping_mul(x) == 1);
    x.wrapping_neg()
}

/// Montgomery product x*y/R mod n for any odd 64-bit n.
///
/// Requires x, y < n; the result is < n.
#[inline(always)]
pub fn mulredc(x: u64, y: u64, n: u64, nhat: u64) -> u64 {
    let t = (x as u128) * (y as u128);
    let m = (t as u64).wrapping_mul(nhat);
    let (s, carry) = t.overflowing_add((m as u128) * (n as u128));
    let r = (s >> 64) as u64;
    // The true result is carry*2^64 + r < 2n: a single subtraction
    // of n reduces it, even when the carry bit is set.
    if carry || r >= n {
        r.wrapping_sub(n)
    } else {
        r
    }
}

/// Montgomery square x^2/R mod n.
#[inline(always)]
pub fn sqrredc(x: u64, n: u64, nhat: u64) -> u64 {
    mulredc(x, x, n, nhat)
}

/// Faster Montgomery product without the top-bit carry correction and
/// without the final conditional subtraction.
///
/// This is a distinct primitive with a narrower contract, not a shortcut:
/// it is only valid when the most significant bit of n is clear. The
/// result lies in [0, 2n) and operands are allowed to be unreduced
/// (below 2n) as long as n stays below 2^61, which keeps every
/// intermediate below 2^128 and every output below 2n.
#[inline(always)]
pub fn mulredc63(x: u64, y: u64, n: u64, nhat: u64) -> u64 {
    debug_assert!(n >> 63 == 0);
    let t = (x as u128) * (y as u128);
    let m = (t as u64).wrapping_mul(nhat);
    ((t + (m as u128) * (n as u128)) >> 64) as u64
}

/// Squaring counterpart of [`mulredc63`], same contract.
#[inline(always)]
pub fn sqrredc63(x: u64, n: u64, nhat: u64) -> u64 {
    mulredc63(x, x, n, nhat)
}

/// Modular addition of canonical representatives (x, y < n).
#[inline(always)]
pub fn addmod(x: u64, y: u64, n: u64) -> u64 {
    debug_assert!(x < n && y < n);
    if x >= n - y {
        x - (n - y)
    } else {
        x + y
    }
}

/// Modular subtraction of canonical representatives (x, y < n).
#[inline(always)]
pub fn submod(x: u64, y: u64, n: u64) -> u64 {
    debug_assert!(x < n && y < n);
    let (r, borrow) = x.overflowing_sub(y);
    if borrow {
        r.wrapping_add(n)
    } else {
        r
    }
}

/// The modulus did not satisfy the contract of [`ZmodN64::new`]
/// (it must be odd and greater than 1).
#[derive(Debug, PartialEq, Eq)]
pub struct InvalidModulus(pub u64);

/// Context for modular Montgomery arithmetic with a 64-bit modulus.
///
/// Immutable after construction and scoped to one factoring call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZmodN64 {
    pub n: u64,
    // Minus n^-1 mod 2^64
    nhat: u64,
    // R mod n where R = 2^64
    r: u64,
    // R^2 mod n
    r2: u64,
}

impl ZmodN64 {
    pub fn new(n: u64) -> Result<Self, InvalidModulus> {
        if n & 1 == 0 || n <= 1 {
            return Err(InvalidModulus(n));
        }
        let nhat = mg_2adic_inv(n);
        let r = ((1_u128 << 64) % n as u128) as u64;
        let r2 = ((r as u128 * r as u128) % n as u128) as u64;
        Ok(ZmodN64 { n, nhat, r, r2 })
    }

    pub fn zero(&self) -> u64 {
        0
    }

    pub fn one(&self) -> u64 {
        self.r
    }

    /// Montgomery representation of x (x must be < n).
    pub fn from_int(&self, x: u64) -> u64 {
        debug_assert!(x < self.n);
        mulredc(x, self.r2, self.n, self.nhat)
    }

    /// Recovers the ordinary representative of x.
    pub fn to_int(&self, x: u64) -> u64 {
        // REDC of x viewed as a 128-bit value.
        let m = x.wrapping_mul(self.nhat);
        let s = x as u128 + (m as u128) * (self.n as u128);
        let r = (s >> 64) as u64;
        if r >= self.n {
            r - self.n
        } else {
            r
        }
    }

    pub fn mul(&self, x: u64, y: u64) -> u64 {
        debug_assert!(x < self.n && y < self.n);
        mulredc(x, y, self.n, self.nhat)
    }

    pub fn sqr(&self, x: u64) -> u64 {
        debug_assert!(x < self.n);
        sqrredc(x, self.n, self.nhat)
    }

    pub fn add(&self, x: u64, y: u64) -> u64 {
        addmod(x, y, self.n)
    }

    pub fn sub(&self, x: u64, y: u64) -> u64 {
        submod(x, y, self.n)
    }
}

#[test]
fn test_2adic_inv() {
    for n in [3_u64, 5, 17, 12345677, 0xdeadbeef, u64::MAX, u64::MAX - 41] {
        let nhat = mg_2adic_inv(n);
        // n*nhat == -1 mod 2^64
        assert_eq!(n.wrapping_mul(nhat), u64::MAX);
        assert_eq!(n.wrapping_mul(nhat.wrapping_neg()), 1);
    }
}

#[test]
fn test_montgomery_roundtrip() {
    let moduli: &[u64] = &[
        3,
        65537,
        235075827453629,
        (1 << 62) - 57,
        u64::MAX - 58, // odd, top bit set
        u64::MAX,
    ];
    for &n in moduli {
        let zn = ZmodN64::new(n).unwrap();
        assert_eq!(zn.to_int(zn.one()), 1 % n);
        let mut x = 1_u64;
        for _ in 0..1000 {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(12345);
            let v = x % n;
            assert_eq!(zn.to_int(zn.from_int(v)), v);
        }
    }
}

#[test]
fn test_montgomery_mul() {
    let moduli: &[u64] = &[
        10403,
        235075827453629,
        (1 << 61) + 9,
        u64::MAX - 58,
        u64::MAX,
    ];
    for &n in moduli {
        let zn = ZmodN64::new(n).unwrap();
        let mut s = 0xfeed_5eed_u64;
        for _ in 0..1000 {
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
            let x = s % n;
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
            let y = s % n;
            let expect = ((x as u128 * y as u128) % n as u128) as u64;
            let got = zn.to_int(zn.mul(zn.from_int(x), zn.from_int(y)));
            assert_eq!(got, expect, "n={n} x={x} y={y}");
            let got2 = zn.to_int(zn.sqr(zn.from_int(x)));
            let expect2 = ((x as u128 * x as u128) % n as u128) as u64;
            assert_eq!(got2, expect2);
        }
    }
}

#[test]
fn test_montgomery_addsub() {
    let n = (1 << 63) + 29; // odd, top bit set
    let zn = ZmodN64::new(n).unwrap();
    let mut s = 7_u64;
    for _ in 0..1000 {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(99);
        let x = s % n;
        s = s.wrapping_mul(6364136223846793005).wrapping_add(99);
        let y = s % n;
        let sum = zn.add(x, y);
        let diff = zn.sub(x, y);
        assert_eq!(sum, ((x as u128 + y as u128) % n as u128) as u64);
        assert_eq!(zn.add(diff, y), x);
    }
}

#[test]
fn test_mulredc63() {
    // Below 61 bits the relaxed primitive agrees with the strict one
    // modulo n, and stays below 2n.
    let moduli: &[u64] = &[10403, 235075827453629, (1 << 60) + 33];
    for &n in moduli {
        let nhat = mg_2adic_inv(n);
        let mut s = 3_u64;
        for _ in 0..1000 {
            s = s.wrapping_mul(6364136223846793005).wrapping_add(17);
            let x = s % n;
            s = s.wrapping_mul(6364136223846793005).wrapping_add(17);
            let y = s % n;
            let r = mulredc63(x, y, n, nhat);
            assert!(r < 2 * n);
            assert_eq!(r % n, mulredc(x, y, n, nhat));
        }
    }
}

#[test]
fn test_invalid_modulus() {
    assert_eq!(ZmodN64::new(0), Err(InvalidModulus(0)));
    assert_eq!(ZmodN64::new(1), Err(InvalidModulus(1)));
    assert_eq!(ZmodN64::new(1 << 40), Err(InvalidModulus(1 << 40)));
    assert!(ZmodN64::new(3).is_ok());
}
