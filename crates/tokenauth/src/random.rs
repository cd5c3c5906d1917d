//! Random string generation.

use rand::{Rng, distr::Alphanumeric};

/// Returns a random string of exactly `size` ASCII letters and digits.
///
/// Drawn from the thread-local CSPRNG.
///
/// # Example
///
/// ```
/// let s = tokenauth::generate_random_string(12);
/// assert_eq!(s.len(), 12);
/// assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
#[must_use]
pub fn generate_random_string(size: usize) -> String {
    rand::rng().sample_iter(&Alphanumeric).take(size).map(char::from).collect()
}
