// Copyright 2024 The cofactor64 authors. All rights reserved.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Implementations of Shanks's square forms factorization.
//!
//! Two independent variants of the two-phase continued fraction cycle are
//! provided. [`squfof_forward`] records (factor, residue) pairs for small
//! coefficients and filters square forms against both values;
//! [`squfof_classic`] stores bare coefficients and filters on those alone,
//! a weaker test kept deliberately distinct (it is not a simplification of
//! the former, the two differ in cadence and queue discipline as well).
//! On top of them, [`squfof`] races a list of square-free multipliers with
//! small iteration allowances, which is much more robust than any single
//! multiplier, and [`squfof_batch`] fans that driver out over a slice.
//!
//! References: <http://homes.cerias.purdue.edu/~ssw/squfof.pdf>

use num_traits::ToPrimitive;
use rayon::prelude::*;

use crate::arith::{gcd64, isqrt, maybe_square};
use crate::{Uint, Verbosity};

/// Queue capacity for both variants, sized like the historical
/// implementations. Exceeding it aborts the call instead of silently
/// overwriting older candidate forms.
const QUEUE_SIZE: usize = 64;

/// Bounded FIFO of candidate ambiguous forms (factor, P residue).
struct FormQueue {
    entries: [(u64, u64); QUEUE_SIZE],
    head: usize,
    tail: usize,
    len: usize,
}

struct QueueOverflow;

impl FormQueue {
    fn new() -> Self {
        FormQueue {
            entries: [(0, 0); QUEUE_SIZE],
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    fn push(&mut self, s: u64, t: u64) -> Result<(), QueueOverflow> {
        if self.len == QUEUE_SIZE {
            return Err(QueueOverflow);
        }
        self.entries[self.head] = (s, t);
        self.head = (self.head + 1) % QUEUE_SIZE;
        self.len += 1;
        Ok(())
    }

    /// Index (from the oldest entry) of the first live entry matching pred.
    fn scan(&self, pred: impl Fn(u64, u64) -> bool) -> Option<usize> {
        for k in 0..self.len {
            let (s, t) = self.entries[(self.tail + k) % QUEUE_SIZE];
            if pred(s, t) {
                return Some(k);
            }
        }
        None
    }

    /// Discards the k+1 oldest entries.
    fn drop_first(&mut self, k: usize) {
        debug_assert!(k < self.len);
        self.tail = (self.tail + k + 1) % QUEUE_SIZE;
        self.len -= k + 1;
    }
}

/// SQUFOF with a single pass of the principal form cycle
/// (the variant published by Dario Alpern).
///
/// Returns a nontrivial divisor of n, or None when the forward bound is
/// exceeded, the candidate queue overflows, or only trivial forms appear.
/// The input must be below 62 bits (it may be doubled internally).
pub fn squfof_forward(n0: u64) -> Option<u64> {
    assert!(n0 >> 62 == 0, "squfof_forward: input must be below 62 bits");
    if n0 <= 3 {
        return None;
    }
    // Perfect squares are resolved before the discriminant adjustment.
    if let Some(r) = crate::arith::exact_sqrt(n0) {
        return Some(r);
    }
    // Work with discriminant 4n: numbers 1 mod 4 are doubled.
    let n = if n0 & 3 == 1 { n0 << 1 } else { n0 };
    let s = isqrt(n);
    if s * s == n {
        return Some(s);
    }
    let mut q1: u64 = 1;
    let mut p: u64 = s;
    let mut q: u64 = n - s * s;
    // Small-coefficient bound L ~ 2 sqrt(2 sqrt(n)).
    let l = 2 * isqrt(2 * s);
    let bound = 2 * l;
    let mut queue = FormQueue::new();

    for i in 0..=bound {
        // Advance the reduced form one step.
        let b = (s + p) / q;
        let p1 = b * q - p;
        if q <= l {
            // Remember small coefficients: they flag ambiguous cycles.
            let pushed = if q & 1 == 0 {
                queue.push(q >> 1, p % (q >> 1))
            } else if 2 * q <= l {
                queue.push(q, p % q)
            } else {
                Ok(())
            };
            if pushed.is_err() {
                return None;
            }
        }
        let t = if p >= p1 {
            q1 + b * (p - p1)
        } else {
            q1 - b * (p1 - p)
        };
        q1 = q;
        q = t;
        p = p1;

        // Square forms can only appear on even steps; the residue test
        // rejects most non-squares without computing a square root.
        if i & 1 == 0 && matches!(q & 7, 0 | 1 | 2 | 4) {
            let r = isqrt(q);
            if r * r == q {
                if let Some(k) = queue.scan(|sq, tq| p % sq == tq) {
                    // Previously seen ambiguous form: skip it and keep
                    // cycling. Matched entries are consumed.
                    if r > 1 {
                        queue.drop_first(k);
                    } else if queue.scan(|sq, _| sq == 1).is_some() {
                        // A stored factor of 1 means the cycle can only
                        // produce the trivial form again.
                        return None;
                    }
                    continue;
                }
                // Reverse cycle from the inverse square root of the form.
                q1 = r;
                let u = (s % r + r - p % r) % r;
                p = s - u;
                q = (n - p * p) / q1;
                loop {
                    let b = (s + p) / q;
                    let p1 = b * q - p;
                    if p == p1 {
                        break;
                    }
                    let t = if p >= p1 {
                        q1 + b * (p - p1)
                    } else {
                        q1 - b * (p1 - p)
                    };
                    q1 = q;
                    q = t;
                    p = p1;
                }
                let f = if q & 1 == 0 { q >> 1 } else { q };
                if f > 1 && f < n0 && n0 % f == 0 {
                    return Some(f);
                }
                return None;
            }
        }
    }
    None
}

// Forward/reverse iteration caps of the classic variant.
const CLASSIC_FORWARD_CAP: u32 = 800_000;
const CLASSIC_REVERSE_CAP: u32 = 40_000;
const CLASSIC_QUEUE_SIZE: usize = 100;

/// The classic SQUFOF formulation (after R. D. Silverman).
///
/// Returns (factor, cofactor) on success. A perfect square n returns
/// (sqrt n, sqrt n). The stored-coefficient filter compares square roots
/// against bare queue entries and the square test runs on alternating
/// iterations only; see the module documentation.
pub fn squfof_classic(n: u64) -> Option<(u64, u64)> {
    assert!(n >> 62 == 0, "squfof_classic: input must be below 62 bits");
    if n <= 3 {
        return None;
    }
    let s = isqrt(n);
    if s * s == n {
        return Some((s, s));
    }
    let mut qlast: u64 = 1;
    let mut p: u64 = s;
    let mut q: u64 = n - s * s;
    let ll = 1 + 2 * isqrt(2 * p);
    let l2 = ll / 2;
    let mut qlist: Vec<u64> = Vec::with_capacity(CLASSIC_QUEUE_SIZE);

    let mut root = 0_u64;
    let mut got_square = false;
    for jter in 0..CLASSIC_FORWARD_CAP {
        let iq = (s + p) / q;
        let pnext = iq * q - p;
        if q <= ll {
            let stored = if q & 1 == 0 {
                Some(q / 2)
            } else if q <= l2 {
                Some(q)
            } else {
                None
            };
            if let Some(v) = stored {
                if qlist.len() == CLASSIC_QUEUE_SIZE {
                    // Bounded list is full: report failure rather than
                    // dropping candidates.
                    return None;
                }
                qlist.push(v);
            }
        }
        let t = if p >= pnext {
            qlast + iq * (p - pnext)
        } else {
            qlast - iq * (pnext - p)
        };
        qlast = q;
        q = t;
        p = pnext;
        if jter & 1 == 1 {
            // odd iteration: omit the square test
            continue;
        }
        let r = isqrt(q);
        if q != r * r {
            continue;
        }
        // The whole list is treated as a flat set of coefficients.
        if !qlist.iter().any(|&v| v == r) {
            root = r;
            got_square = true;
            break;
        }
    }
    if !got_square {
        // Forward budget exhausted.
        return None;
    }

    // Reverse cycle to the symmetry point.
    qlast = root;
    p += root * ((s - p) / root);
    q = (n - p * p) / qlast;
    for _ in 0..CLASSIC_REVERSE_CAP {
        // four steps per pass
        for _ in 0..4 {
            let iq = (s + p) / q;
            let pnext = iq * q - p;
            if p == pnext {
                let f = if q & 1 == 0 { q / 2 } else { q };
                if f > 1 && f < n && n % f == 0 {
                    return Some((f, n / f));
                }
                return None;
            }
            let t = if p >= pnext {
                qlast + iq * (p - pnext)
            } else {
                qlast - iq * (pnext - p)
            };
            qlast = q;
            q = t;
            p = pnext;
        }
    }
    None
}

// Square-free multipliers (list due to Dana Jacobsen): racing many
// multipliers with small iteration allowances beats any single one.
const MULTIPLIERS: [u64; 38] = [
    3 * 5 * 7 * 11,
    3 * 5 * 7,
    3 * 5 * 7 * 11 * 13,
    3 * 5 * 7 * 13,
    3 * 5 * 7 * 11 * 17,
    3 * 5 * 11,
    3 * 5 * 7 * 17,
    3 * 5,
    3 * 5 * 7 * 11 * 19,
    3 * 5 * 11 * 13,
    3 * 5 * 7 * 19,
    3 * 5 * 7 * 13 * 17,
    3 * 5 * 13,
    3 * 7 * 11,
    3 * 7,
    5 * 7 * 11,
    3 * 7 * 13,
    5 * 7,
    3 * 5 * 17,
    5 * 7 * 13,
    3 * 5 * 19,
    3 * 11,
    3 * 7 * 17,
    3,
    3 * 11 * 13,
    5 * 11,
    3 * 7 * 19,
    3 * 13,
    5,
    5 * 11 * 13,
    5 * 7 * 19,
    5 * 13,
    7 * 11,
    7,
    3 * 17,
    7 * 13,
    11,
    1,
];

// Inputs multiplied by any entry of MULTIPLIERS must stay below 2^62.
const MULT_LIMIT: u64 = 0x3FFF_FFFF_FFFF_FFFF;

/// Saved continued-fraction position for one multiplier, letting the
/// racing driver resume each form cycle where the previous round left it.
struct MultState {
    mult: u64,
    valid: bool,
    p: u64,
    bn: u64,
    qn: u64,
    q0: u64,
    b0: u64,
    it: u32,
    imax: u32,
}

impl MultState {
    fn invalid(mult: u64) -> Self {
        MultState {
            mult,
            valid: false,
            p: 0,
            bn: 0,
            qn: 0,
            q0: 0,
            b0: 0,
            it: 0,
            imax: 0,
        }
    }
}

/// Advances one multiplier's form cycle by its iteration allowance.
///
/// Returns Some(f) with f = gcd(Ro, mn) > 1 when a square form led to a
/// symmetry point, None when the allowance ran out (state is saved) or the
/// state became unusable (the multiplier is retired).
fn shanks_mult_unit(mn: u64, st: &mut MultState) -> Option<u64> {
    let b0 = st.b0;
    let (mut p, mut bn, mut qn, mut q0) = (st.p, st.bn, st.qn, st.q0);
    let mut i = st.it;
    let imax = i + st.imax;

    #[inline(always)]
    fn step(p: &mut u64, bn: &mut u64, qn: &mut u64, q0: &mut u64, b0: u64) -> bool {
        let t1 = *p;
        *p = *bn * *qn - *p;
        let t2 = *qn;
        *qn = if t1 >= *p {
            *q0 + *bn * (t1 - *p)
        } else {
            *q0 - *bn * (*p - t1)
        };
        *q0 = t2;
        if *qn == 0 {
            return false;
        }
        *bn = (b0 + *p) / *qn;
        true
    }

    loop {
        // The square test below is only meaningful on even iteration
        // counts: restore parity if a previous round broke it.
        if i & 1 == 1 {
            if !step(&mut p, &mut bn, &mut qn, &mut q0, b0) {
                st.valid = false;
                return None;
            }
            i += 1;
        }
        loop {
            if i >= imax {
                // Allowance exhausted: save the position so the next
                // round can resume, and let another multiplier race.
                st.p = p;
                st.bn = bn;
                st.qn = qn;
                st.q0 = q0;
                st.it = i;
                return None;
            }
            if !step(&mut p, &mut bn, &mut qn, &mut q0, b0) {
                st.valid = false;
                return None;
            }
            i += 1;
            if maybe_square(qn) {
                let r = isqrt(qn);
                if qn == r * r {
                    break;
                }
            }
            if !step(&mut p, &mut bn, &mut qn, &mut q0, b0) {
                st.valid = false;
                return None;
            }
            i += 1;
        }

        // Reduce to the inverse square root form.
        let r = isqrt(qn);
        let ro = p + r * ((b0 - p) / r);
        let so = (mn - ro * ro) / r;
        if so == 0 {
            st.valid = false;
            return None;
        }
        let mut s = r;
        let mut so = so;
        let mut ro = ro;
        let mut bbn = (b0 + ro) / so;

        // Search for the symmetry point of the reverse cycle.
        let mut failsafe = 10_000;
        loop {
            let t1 = ro;
            ro = bbn * so - ro;
            let t2 = so;
            so = if t1 >= ro {
                s + bbn * (t1 - ro)
            } else {
                s - bbn * (ro - t1)
            };
            s = t2;
            if so == 0 {
                st.valid = false;
                return None;
            }
            bbn = (b0 + ro) / so;
            if ro == t1 {
                break;
            }
            failsafe -= 1;
            if failsafe == 0 {
                st.valid = false;
                return None;
            }
        }

        let f = gcd64(ro, mn);
        if f > 1 {
            st.it = i;
            return Some(f);
        }
        // Trivial symmetry point: keep cycling forward.
    }
}

/// Multiplier-racing SQUFOF for inputs of at most 62 bits.
///
/// Each still-valid multiplier advances by a small iteration allowance per
/// round; the round count grows with the input size. This is the intended
/// entry point for quadratic sieve cofactors in the 40-60 bit range.
pub fn squfof(n: &Uint, v: Verbosity) -> Option<(u64, u64)> {
    if n.bits() > 62 {
        return None;
    }
    let n64 = n.to_u64()?;
    if n64 <= 3 {
        return None;
    }
    let start = std::time::Instant::now();
    let rounds = match n.bits() {
        0..=49 => 4,
        50..=54 => 8,
        55..=57 => 16,
        58..=60 => 24,
        _ => 32,
    };

    let mut states: Vec<MultState> = Vec::with_capacity(MULTIPLIERS.len());
    for &mult in &MULTIPLIERS {
        if MULT_LIMIT / mult < n64 {
            // This multiplier would overflow 62 bits.
            states.push(MultState::invalid(mult));
            continue;
        }
        let mn = n64 * mult;
        let b0 = isqrt(mn);
        let qn = mn - b0 * b0;
        if qn == 0 {
            // mult*n is a perfect square.
            let f = gcd64(b0, n64);
            if f > 1 && f < n64 {
                return Some((f, n64 / f));
            }
            states.push(MultState::invalid(mult));
            continue;
        }
        states.push(MultState {
            mult,
            valid: true,
            p: b0,
            bn: (b0 + b0) / qn,
            qn,
            q0: 1,
            b0,
            it: 0,
            // iteration allowance per round ~ (mult*n)^(1/4) / 16
            imax: std::cmp::max(isqrt(b0) as u32 / 16, 1),
        });
    }

    for _ in 0..rounds {
        for st in states.iter_mut() {
            if !st.valid {
                continue;
            }
            let mn = n64 * st.mult;
            let Some(f) = shanks_mult_unit(mn, st) else {
                continue;
            };
            // The factor may contain part of the multiplier.
            let f = f / gcd64(f, st.mult);
            if f > 1 && f < n64 && n64 % f == 0 {
                if v >= Verbosity::Info {
                    let ms = start.elapsed().as_secs_f64() * 1000.0;
                    eprintln!(
                        "SQUFOF found factor {f} (multiplier {}, {} iters) in {ms:.3}ms",
                        st.mult, st.it
                    );
                }
                return Some((f, n64 / f));
            }
            // Trivial factor: retire this multiplier.
            st.valid = false;
        }
    }
    None
}

/// Races SQUFOF over a slice of inputs using worker threads.
///
/// Inputs are independent; the provided pool is used when given,
/// otherwise the global rayon pool.
pub fn squfof_batch(ns: &[u64], tpool: Option<&rayon::ThreadPool>) -> Vec<Option<(u64, u64)>> {
    let run = || {
        ns.par_iter()
            .map(|&n| squfof(&Uint::from(n), Verbosity::Silent))
            .collect()
    };
    match tpool {
        Some(pool) => pool.install(run),
        None => run(),
    }
}

#[test]
fn test_squfof_forward() {
    // 8051 = 83 * 97
    let f = squfof_forward(8051).unwrap();
    assert!(f == 83 || f == 97);
    // perfect squares
    assert_eq!(squfof_forward(9), Some(3));
    assert_eq!(squfof_forward(81), Some(9));
    assert_eq!(squfof_forward(1 << 40), Some(1 << 20));
    // divisor property over a grid of semiprimes
    let mut found = 0;
    for i in 0..40_u64 {
        for j in 0..40_u64 {
            let p = 10007 + 12 * i * (i + 1); // not all prime, doesn't matter
            let q = 20011 + 30 * j * (j + 1);
            let n = p * q;
            if let Some(f) = squfof_forward(n) {
                assert!(f > 1 && f < n && n % f == 0, "bad divisor {f} of {n}");
                found += 1;
            }
        }
    }
    // The single form cycle is allowed to fail sometimes, but it should
    // succeed on a large share of these.
    assert!(found > 500, "only {found} successes");
}

#[test]
fn test_squfof_classic() {
    let (a, b) = squfof_classic(8051).unwrap();
    assert!((a, b) == (83, 97) || (a, b) == (97, 83));
    assert_eq!(squfof_classic(9), Some((3, 3)));
    let mut found = 0;
    for i in 0..40_u64 {
        for j in 0..40_u64 {
            let p = 123456789 + i * 2468;
            let q = 198765431 + j * 1590;
            let n = p * q;
            if let Some((a, b)) = squfof_classic(n) {
                assert!(a > 1 && a < n && a * b == n, "bad pair {a},{b} for {n}");
                found += 1;
            }
        }
    }
    assert!(found > 500, "only {found} successes");
}

#[test]
fn test_squfof_racing() {
    let ns: &[u64] = &[
        2965576997959,
        2631165445817,
        2794378024157,
        2822044701943,
        3052120253579,
        235075827453629,
        166130059616737,
        159247921097933,
        224077614412439,
        219669028971857,
    ];
    for &n in ns {
        let (x, y) = squfof(&Uint::from(n), Verbosity::Silent)
            .unwrap_or_else(|| panic!("failed to factor {n}"));
        assert!(x > 1 && y > 1 && x * y == n);
    }
    // perfect square via the init path
    assert_eq!(squfof(&Uint::from(81_u64), Verbosity::Silent), Some((9, 9)));
    // oversized inputs are rejected gracefully
    assert_eq!(squfof(&(Uint::ONE << 63), Verbosity::Silent), None);
}

#[test]
fn test_squfof_batch() {
    let ns: &[u64] = &[
        235075827453629,
        166130059616737,
        159247921097933,
        224077614412439,
        219669028971857,
    ];
    let out = squfof_batch(ns, None);
    for (i, r) in out.iter().enumerate() {
        let (x, y) = r.unwrap();
        assert_eq!(x * y, ns[i]);
    }
    let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
    let out2 = squfof_batch(ns, Some(&pool));
    assert_eq!(out, out2);
}
