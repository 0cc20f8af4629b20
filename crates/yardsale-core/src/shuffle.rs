//! Unbiased random permutation of agent indices.
//!
//! Uses the Durstenfeld variant of Fisher-Yates, as popularized by Knuth:
//! walk `i` from the last position down to 1, draw `r` uniformly from
//! `[0, i]`, and swap positions `i` and `r`. O(n) time, O(1) extra space,
//! and every permutation is equally likely given a uniform source.
//!
//! The same buffer is reshuffled in place every play; it is never
//! reallocated after initialization.

use rand::Rng;

/// Fill `buffer` with `0..buffer.len()` in order.
pub fn identity(buffer: &mut [usize]) {
    for (position, slot) in buffer.iter_mut().enumerate() {
        *slot = position;
    }
}

/// Shuffle `buffer` in place with the Durstenfeld Fisher-Yates algorithm.
pub fn fisher_yates<R: Rng + ?Sized>(buffer: &mut [usize], rng: &mut R) {
    for i in (1..buffer.len()).rev() {
        let r = rng.random_range(0..=i);
        buffer.swap(i, r);
    }
}

/// Returns `true` if `buffer` holds each of `0..buffer.len()` exactly once.
pub fn is_permutation(buffer: &[usize]) -> bool {
    let mut seen = vec![false; buffer.len()];
    buffer.iter().all(|&index| match seen.get_mut(index) {
        Some(flag) if !*flag => {
            *flag = true;
            true
        }
        _ => false,
    })
}
