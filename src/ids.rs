//! External product identifiers.
//!
//! IDs look like `product-<unixSeconds>-<n>` with `n` in `0..=999_999`.
//! Two IDs generated in the same second can collide; the unique column is
//! `name`, not `product_id`.

use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const PREFIX: &str = "product-";
const MAX_SUFFIX: u32 = 999_999;

/// Generates external product IDs from one random source that lives as long
/// as the service. Share it behind an `Arc`; it is never reseeded.
#[derive(Debug)]
pub struct ProductIdGenerator {
    rng: Mutex<StdRng>,
}

impl ProductIdGenerator {
    /// Seeds the random source once from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic generator for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn generate(&self) -> String {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        self.generate_at(seconds)
    }

    /// Generates an ID for the given unix timestamp.
    pub fn generate_at(&self, unix_seconds: u64) -> String {
        let suffix = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(0..=MAX_SUFFIX);
        format!("{PREFIX}{unix_seconds}-{suffix}")
    }
}

impl Default for ProductIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns true if `id` has the `product-<digits>-<digits>` shape with a
/// suffix no larger than 999999.
pub fn is_product_id(id: &str) -> bool {
    let Some(rest) = id.strip_prefix(PREFIX) else {
        return false;
    };
    let Some((seconds, suffix)) = rest.split_once('-') else {
        return false;
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(seconds)
        && all_digits(suffix)
        && suffix.parse::<u32>().is_ok_and(|n| n <= MAX_SUFFIX)
}
