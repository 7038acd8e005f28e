use std::time::Duration;

use brunch::Bench;
use cofactor64::{fermat, pollard_rho, squfof, Uint, Verbosity};

brunch::benches! {
    {
        let n42: &[u64] = &[
            2965576997959,
            2631165445817,
            2794378024157,
            2822044701943,
            3052120253579,
        ];
        Bench::new("5x SQUFOF n=42 bits")
            .with_timeout(Duration::from_secs(3))
            .run_seeded(n42, |ns| for &n in ns {
                squfof::squfof(&Uint::from(n), Verbosity::Silent).unwrap();
            })
    },
    {
        let n48: &[u64] = &[
            235075827453629,
            166130059616737,
            159247921097933,
            224077614412439,
            219669028971857,
        ];
        Bench::new("5x SQUFOF n=48 bits")
            .with_timeout(Duration::from_secs(3))
            .run_seeded(n48, |ns| for &n in ns {
                squfof::squfof(&Uint::from(n), Verbosity::Silent).unwrap();
            })
    },
    {
        let n56: &[u64] = &[
            42795961034553971,
            39128513926139749,
            44643473083983271,
            40952332749496541,
            56396468816856241,
        ];
        Bench::new("5x SQUFOF n=56 bits")
            .with_timeout(Duration::from_secs(3))
            .run_seeded(n56, |ns| for &n in ns {
                squfof::squfof(&Uint::from(n), Verbosity::Silent).unwrap();
            })
    },
    {
        let n42: &[u64] = &[
            2965576997959,
            2631165445817,
            2794378024157,
            2822044701943,
            3052120253579,
        ];
        Bench::new("5x SQUFOF forward n=42 bits")
            .with_timeout(Duration::from_secs(3))
            .run_seeded(n42, |ns| for &n in ns {
                // the single cycle variants may fail on some inputs
                let _ = squfof::squfof_forward(n);
            })
    },
    {
        let n42: &[u64] = &[
            2965576997959,
            2631165445817,
            2794378024157,
            2822044701943,
            3052120253579,
        ];
        Bench::new("5x SQUFOF classic n=42 bits")
            .with_timeout(Duration::from_secs(3))
            .run_seeded(n42, |ns| for &n in ns {
                let _ = squfof::squfof_classic(n);
            })
    },
    {
        let n42: &[u64] = &[
            2965576997959,
            2631165445817,
            2794378024157,
            2822044701943,
            3052120253579,
        ];
        Bench::new("5x Pollard rho n=42 bits")
            .with_timeout(Duration::from_secs(3))
            .run_seeded(n42, |ns| for &n in ns {
                pollard_rho::rho(&Uint::from(n), Verbosity::Silent).unwrap();
            })
    },
    {
        let n48: &[u64] = &[
            235075827453629,
            166130059616737,
            159247921097933,
            224077614412439,
            219669028971857,
        ];
        Bench::new("5x Pollard rho n=48 bits")
            .with_timeout(Duration::from_secs(3))
            .run_seeded(n48, |ns| for &n in ns {
                pollard_rho::rho(&Uint::from(n), Verbosity::Silent).unwrap();
            })
    },
    {
        let n56: &[u64] = &[
            42795961034553971,
            39128513926139749,
            44643473083983271,
            40952332749496541,
            56396468816856241,
        ];
        Bench::new("5x Pollard rho n=56 bits")
            .with_timeout(Duration::from_secs(3))
            .run_seeded(n56, |ns| for &n in ns {
                pollard_rho::rho(&Uint::from(n), Verbosity::Silent).unwrap();
            })
    },
    {
        // close factors around 2^31
        let nfermat: &[u64] = &[
            2147483647 * 2147483659,
            1073741789 * 1073741827,
            536870909 * 536870923,
        ];
        Bench::new("3x Fermat close factors")
            .with_timeout(Duration::from_secs(3))
            .run_seeded(nfermat, |ns| for &n in ns {
                fermat::fermat64(n, 1, 10_000).unwrap();
            })
    },
    {
        Bench::new("Fermat sieve tables")
            .with_timeout(Duration::from_secs(3))
            .run(fermat::FermatSieve::new)
    },
}
