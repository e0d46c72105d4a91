//! Seeded input generation. The same seed always yields the same arrays.

use crate::error::{try_alloc, BenchResult};

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::{SystemTime, UNIX_EPOCH};

/// The range input values are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRange {
    /// Whole numbers in `1..=100`; never zero, safe as a divisor.
    NonZeroInt,
    /// Reals uniformly drawn from `[0, 100)`; zero divisors are possible and guarded at use.
    Percent,
}

impl Default for ValueRange {
    fn default() -> Self {
        ValueRange::NonZeroInt
    }
}

/// Resolve the base seed: the explicit one, or the wall clock in seconds.
pub fn base_seed(explicit: Option<u64>) -> u64 {
    match explicit {
        Some(seed) => seed,
        None => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    }
}

/// Fill both arrays from a single stream, alternating `a[i]`, `b[i]`.
pub fn fill_arrays(a: &mut [f64], b: &mut [f64], seed: u64, range: ValueRange) {
    assert_eq!(a.len(), b.len());
    let mut rng = StdRng::seed_from_u64(seed);
    match range {
        ValueRange::NonZeroInt => {
            let dist = Uniform::new_inclusive(1u32, 100u32);
            for (x, y) in a.iter_mut().zip(b.iter_mut()) {
                *x = dist.sample(&mut rng) as f64;
                *y = dist.sample(&mut rng) as f64;
            }
        }
        ValueRange::Percent => {
            let dist = Uniform::new(0.0f64, 100.0f64);
            for (x, y) in a.iter_mut().zip(b.iter_mut()) {
                *x = dist.sample(&mut rng);
                *y = dist.sample(&mut rng);
            }
        }
    }
}

/// Values in `0..100` for the sum reduction.
pub fn fill_counts(buf: &mut [i32], seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Uniform::new(0i32, 100i32);
    for x in buf.iter_mut() {
        *x = dist.sample(&mut rng);
    }
}

/// The two equal length operands of the elementwise benchmark.
#[derive(Debug, Clone, PartialEq)]
pub struct InputPair {
    pub a: Vec<f64>,
    pub b: Vec<f64>,
}

impl InputPair {
    pub fn generate(len: usize, seed: u64, range: ValueRange, pe: usize) -> BenchResult<InputPair> {
        let mut pair = InputPair {
            a: try_alloc(len, pe)?,
            b: try_alloc(len, pe)?,
        };
        pair.refill(seed, range);
        Ok(pair)
    }

    /// Overwrite both arrays in place with a new seed.
    pub fn refill(&mut self, seed: u64, range: ValueRange) {
        fill_arrays(&mut self.a, &mut self.b, seed, range);
    }

    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_arrays() {
        let x = InputPair::generate(1000, 17, ValueRange::NonZeroInt, 0).unwrap();
        let y = InputPair::generate(1000, 17, ValueRange::NonZeroInt, 0).unwrap();
        assert_eq!(x, y);
        let z = InputPair::generate(1000, 18, ValueRange::NonZeroInt, 0).unwrap();
        assert_ne!(x, z);
    }

    #[test]
    fn non_zero_range() {
        let pair = InputPair::generate(10_000, 3, ValueRange::NonZeroInt, 0).unwrap();
        for v in pair.a.iter().chain(pair.b.iter()) {
            assert!(*v >= 1.0 && *v <= 100.0);
            assert_eq!(v.fract(), 0.0);
        }
    }

    #[test]
    fn percent_range() {
        let pair = InputPair::generate(10_000, 3, ValueRange::Percent, 0).unwrap();
        for v in pair.a.iter().chain(pair.b.iter()) {
            assert!(*v >= 0.0 && *v < 100.0);
        }
    }

    #[test]
    fn refill_overwrites() {
        let mut pair = InputPair::generate(64, 1, ValueRange::NonZeroInt, 0).unwrap();
        let fresh = InputPair::generate(64, 2, ValueRange::NonZeroInt, 0).unwrap();
        pair.refill(2, ValueRange::NonZeroInt);
        assert_eq!(pair, fresh);
    }

    #[test]
    fn empty_is_fine() {
        let pair = InputPair::generate(0, 5, ValueRange::Percent, 0).unwrap();
        assert!(pair.is_empty());
        let mut counts: Vec<i32> = vec![];
        fill_counts(&mut counts, 5);
    }

    #[test]
    fn counts_are_deterministic() {
        let mut x = vec![0i32; 500];
        let mut y = vec![0i32; 500];
        fill_counts(&mut x, 9);
        fill_counts(&mut y, 9);
        assert_eq!(x, y);
        assert!(x.iter().all(|v| (0..100).contains(v)));
        assert_eq!(base_seed(Some(11)), 11);
    }
}
