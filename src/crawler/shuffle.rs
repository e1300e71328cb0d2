//! Seeded shuffle primitive for reproducible key ordering.
//!
//! Uses mulberry32 for the pseudo-random stream and a back-to-front
//! Fisher-Yates pass. The same seed always yields the same permutation, so a
//! resumed run regenerates the exact order of the checkpointed run.

/// Mulberry32 pseudo-random generator. Deterministic per seed, no global
/// state. Uniformity is best effort, not cryptographic.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u32,
}

impl SeededRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6d2b_79f5);
        let mut t = (self.state ^ (self.state >> 15)).wrapping_mul(self.state | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        f64::from(t ^ (t >> 14)) / 4_294_967_296.0
    }
}

/// Fisher-Yates shuffle, in place, seeded. Slices of length 0 or 1 are
/// untouched.
pub fn shuffle<T>(items: &mut [T], seed: u32) {
    let mut rng = SeededRng::new(seed);
    for i in (1..items.len()).rev() {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let j = (rng.next_f64() * (i as f64 + 1.0)) as usize;
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = SeededRng::new(42);
        let mut b = SeededRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_f64(), b.next_f64());
        }
    }

    #[test]
    fn values_in_unit_interval() {
        let mut rng = SeededRng::new(7);
        for _ in 0..1000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn shuffle_is_noop_for_trivial_lengths() {
        let mut empty: Vec<u32> = vec![];
        shuffle(&mut empty, 42);
        assert!(empty.is_empty());

        let mut single = vec![9];
        shuffle(&mut single, 42);
        assert_eq!(single, vec![9]);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut items: Vec<u32> = (0..100).collect();
        shuffle(&mut items, 42);

        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn same_seed_same_permutation() {
        let mut a: Vec<u32> = (0..50).collect();
        let mut b: Vec<u32> = (0..50).collect();
        shuffle(&mut a, 42);
        shuffle(&mut b, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let mut a: Vec<u32> = (0..50).collect();
        let mut b: Vec<u32> = (0..50).collect();
        shuffle(&mut a, 42);
        shuffle(&mut b, 123);
        assert_ne!(a, b);
    }
}
