//! Random choice of targets
//!
//! Every random pick goes through [`RandomSource`] so callers (and tests)
//! decide where the randomness comes from.

use rand::rngs::StdRng;
use rand::SeedableRng;

#[cfg_attr(test, mockall::automock)]
pub trait RandomSource: Send {
    /// Return `amount` distinct indices taken from `0..len`
    fn sample(&mut self, len: usize, amount: usize) -> Vec<usize>;
}

/// Default source backed by a `StdRng`
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for StdRandom {
    fn sample(&mut self, len: usize, amount: usize) -> Vec<usize> {
        rand::seq::index::sample(&mut self.rng, len, amount.min(len)).into_vec()
    }
}

/// How many of the matched targets to act upon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    All,
    First,
    Random(usize),
}

/// Narrow `items` down according to `pick`. Order of the input is kept for
/// `All` and `First`; `Random` follows the order the source returns.
pub fn pick<T>(items: Vec<T>, pick: Pick, rng: &mut dyn RandomSource) -> Vec<T> {
    match pick {
        Pick::All => items,
        Pick::First => items.into_iter().take(1).collect(),
        Pick::Random(amount) => {
            let len = items.len();
            let amount = amount.min(len);
            if amount == 0 {
                return Vec::new();
            }
            let mut indices = rng.sample(len, amount);
            indices.retain(|i| *i < len);
            indices.dedup();
            let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
            indices
                .into_iter()
                .filter_map(|i| slots[i].take())
                .collect()
        }
    }
}
