// Copyright 2024 The cofactor64 authors. All rights reserved.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Small integer arithmetic shared by the factoring kernels.

/// Rounded down integer square root.
///
/// The floating-point estimate can be off by one unit in either
/// direction for large inputs, so it is refined with exact divisions.
pub fn isqrt(n: u64) -> u64 {
    if n < 4 {
        return std::cmp::min(n, 1);
    }
    let mut r = (n as f64).sqrt() as u64;
    loop {
        let q = n / r;
        if q == r || q == r + 1 {
            return r;
        }
        if q == r - 1 {
            return r - 1;
        }
        r = (r + q) / 2;
        // r^2 ~= n/2 + (r^2 + n^2/r^2)/2 >= n
    }
}

/// Rounded up integer square root.
pub fn isqrt_ceil(n: u64) -> u64 {
    let r = isqrt(n);
    if r * r == n {
        r
    } else {
        r + 1
    }
}

// Quadratic residues modulo 32.
const SQR_MOD32: u32 = (1 << 0) | (1 << 1) | (1 << 4) | (1 << 9) | (1 << 16) | (1 << 17) | (1 << 25);

/// Cheap filter: false guarantees n is not a perfect square.
#[inline]
pub fn maybe_square(n: u64) -> bool {
    SQR_MOD32 >> (n & 31) & 1 == 1
}

/// Returns the square root of n when n is a perfect square.
pub fn exact_sqrt(n: u64) -> Option<u64> {
    if !maybe_square(n) {
        return None;
    }
    let r = isqrt(n);
    if r * r == n {
        Some(r)
    } else {
        None
    }
}

/// Binary GCD, using shifts and subtractions instead of divisions.
pub fn gcd64(mut u: u64, mut v: u64) -> u64 {
    if u == 0 {
        return v;
    }
    if v == 0 {
        return u;
    }
    let shift = (u | v).trailing_zeros();
    u >>= u.trailing_zeros();
    loop {
        v >>= v.trailing_zeros();
        if u > v {
            (u, v) = (v, u);
        }
        v -= u;
        if v == 0 {
            return u << shift;
        }
    }
}

#[test]
fn test_isqrt() {
    for n in 0..=500_000 {
        let r = isqrt(n);
        assert!(r * r <= n && n < (r + 1) * (r + 1));
    }
    for k in 0..=500_000_u64 {
        let n = 123456789 + 1234 * k;
        let r = isqrt(n);
        assert!(r * r <= n && n < (r + 1) * (r + 1));
    }
    // Near the top of the range the float estimate is farthest off.
    for k in 0..=10_000_u64 {
        let n = u64::MAX - 37 * k;
        let r = isqrt(n);
        assert!(r * r <= n);
        assert!((r + 1).checked_mul(r + 1).map_or(true, |s| s > n));
    }
}

#[test]
fn test_isqrt_ceil() {
    assert_eq!(isqrt_ceil(0), 0);
    assert_eq!(isqrt_ceil(1), 1);
    assert_eq!(isqrt_ceil(2), 2);
    assert_eq!(isqrt_ceil(81), 9);
    assert_eq!(isqrt_ceil(82), 10);
}

#[test]
fn test_exact_sqrt() {
    for k in 0..=10_000_u64 {
        assert_eq!(exact_sqrt(k * k), Some(k));
    }
    for n in 0..=100_000_u64 {
        let r = isqrt(n);
        if r * r != n {
            assert_eq!(exact_sqrt(n), None);
        }
    }
}

#[test]
fn test_gcd64() {
    use num_integer::Integer;
    assert_eq!(gcd64(0, 42), 42);
    assert_eq!(gcd64(42, 0), 42);
    let mut x = 0x1234_5678_9abc_def0_u64;
    for k in 1..=20_000_u64 {
        x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let a = x >> 12;
        let b = k * 2468 + 1;
        assert_eq!(gcd64(a, b), Integer::gcd(&a, &b));
    }
}
