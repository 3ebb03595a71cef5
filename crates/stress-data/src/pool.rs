//! Precomputed pool of random strings.
//!
//! Generating a fresh 64 character random string for every field of every
//! point is too slow at the rates dbstress targets, so strings are produced
//! once up front and items cycle through them.

use std::sync::Arc;

use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::DataError;

/// Length of every generated string, matching the `CHAR(64)` table columns.
pub const STRING_LENGTH: usize = 64;

/// Default number of strings in a pool.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Shared, immutable set of random alphanumeric strings.
#[derive(Debug, Clone)]
pub struct StringPool {
    values: Arc<[String]>,
}

impl StringPool {
    /// Build a pool of `size` strings from the thread-local RNG.
    pub fn generate(size: usize) -> Result<Self, DataError> {
        Self::generate_with(&mut rand::rng(), size)
    }

    /// Build a reproducible pool from a seed.
    pub fn seeded(seed: u64, size: usize) -> Result<Self, DataError> {
        Self::generate_with(&mut StdRng::seed_from_u64(seed), size)
    }

    fn generate_with<R: Rng>(rng: &mut R, size: usize) -> Result<Self, DataError> {
        if size == 0 {
            return Err(DataError::EmptyPool);
        }
        let values: Vec<String> = (0..size)
            .map(|_| {
                (0..STRING_LENGTH)
                    .map(|_| char::from(rng.sample(Alphanumeric)))
                    .collect()
            })
            .collect();
        Ok(Self {
            values: values.into(),
        })
    }

    /// Pool made of caller supplied strings.
    pub fn from_values(values: Vec<String>) -> Result<Self, DataError> {
        if values.is_empty() {
            return Err(DataError::EmptyPool);
        }
        Ok(Self {
            values: values.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> &str {
        &self.values[index % self.values.len()]
    }

    /// A cursor starting at `offset`.
    pub fn cursor(&self, offset: usize) -> PoolCursor {
        PoolCursor {
            pool: self.clone(),
            pos: offset % self.values.len(),
        }
    }
}

/// Position within a [`StringPool`], advanced deterministically.
#[derive(Debug, Clone)]
pub struct PoolCursor {
    pool: StringPool,
    pos: usize,
}

impl PoolCursor {
    pub fn current(&self) -> &str {
        self.pool.get(self.pos)
    }

    pub fn advance(&mut self) {
        self.pos = (self.pos + 1) % self.pool.len();
    }
}
