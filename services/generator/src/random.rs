//! Seedable randomness and small sampling helpers.
//!
//! Every synthesizing function takes an explicit `&mut SimRng`; nothing reads
//! a thread-local generator, so a seed fully determines a device's output.

use crate::error::{GeneratorError, Result};
use rand::distributions::uniform::SampleBorrow;
use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

pub type SimRng = StdRng;

pub fn rng_from_seed(seed: u64) -> SimRng {
    StdRng::seed_from_u64(seed)
}

/// Derive an independent stream seed from a base seed (splitmix64 finalizer).
pub fn derive_seed(base: u64, stream: u64) -> u64 {
    let mut z = base
        .wrapping_add(stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Uniform pick from a static pool. An empty pool yields `T::default()`.
pub fn pick<T: Copy + Default, R: Rng + ?Sized>(rng: &mut R, items: &[T]) -> T {
    items.choose(rng).copied().unwrap_or_default()
}

/// Weighted sampler over `weights`; negative, non-finite or all-zero
/// weights are a configuration error.
pub fn distribution<I>(name: &str, weights: I) -> Result<WeightedIndex<f64>>
where
    I: IntoIterator,
    I::Item: SampleBorrow<f64>,
{
    WeightedIndex::new(weights).map_err(|e| GeneratorError::config(format!("invalid {name} weights: {e}")))
}

pub fn weighted_pick<T: Copy, R: Rng + ?Sized>(rng: &mut R, items: &[(T, f64)]) -> Result<T> {
    items
        .choose_weighted(rng, |(_, weight)| *weight)
        .map(|(item, _)| *item)
        .map_err(|e| GeneratorError::config(format!("invalid weights: {e}")))
}

/// Gaussian sample. A non-finite or negative `std_dev` yields `mean`.
pub fn normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    Normal::new(mean, std_dev).map_or(mean, |dist| dist.sample(rng))
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn hex_id<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
        .collect()
}
