//! Deterministic RNG hierarchy and pool samplers.
//!
//! A master seed generates deterministic sub-seeds for each `(stream, lane, iteration)`
//! tuple. Sub-seeds are derived via BLAKE3 hashing, independently of thread scheduling
//! order, so a parallel Monte Carlo run produces the same paths as a sequential one.
//!
//! Engines never talk to an RNG directly: they draw pool indices through the
//! [`Sampler`] trait so tests can script the exact outcome sequence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Draws one pool element uniformly, with replacement.
pub trait Sampler {
    /// Returns an index in `0..len`. `len` is always > 0.
    fn next_index(&mut self, len: usize) -> usize;
}

impl<S: Sampler + ?Sized> Sampler for &mut S {
    fn next_index(&mut self, len: usize) -> usize {
        (**self).next_index(len)
    }
}

/// Uniform sampler backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngSampler<R> {
    rng: R,
}

impl<R: Rng> RngSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl RngSampler<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Sampler for RngSampler<R> {
    fn next_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

/// Replays a fixed index sequence, wrapping around when exhausted.
///
/// Indices are reduced modulo the pool length, so a script written for a
/// larger pool never panics. An empty script always draws index 0.
#[derive(Debug, Clone)]
pub struct ScriptedSampler {
    script: Vec<usize>,
    cursor: usize,
}

impl ScriptedSampler {
    pub fn new(script: Vec<usize>) -> Self {
        Self { script, cursor: 0 }
    }

    /// Script that walks the pool in order: 0, 1, 2, ...
    pub fn sequential(len: usize) -> Self {
        Self::new((0..len).collect())
    }
}

impl Sampler for ScriptedSampler {
    fn next_index(&mut self, len: usize) -> usize {
        if self.script.is_empty() || len == 0 {
            return 0;
        }
        let idx = self.script[self.cursor % self.script.len()];
        self.cursor += 1;
        idx % len
    }
}

/// Deterministic RNG hierarchy.
///
/// The master seed is expanded into per-(stream, lane, iteration) sub-seeds using
/// BLAKE3. Because derivation is hash-based (not order-dependent), the same
/// master seed produces identical sub-seeds regardless of the order in which
/// trials are processed.
#[derive(Debug, Clone)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive a deterministic sub-seed for a specific (stream, lane, iteration).
    ///
    /// `stream` names the engine ("monte-carlo", "optimal-f"), `lane` separates
    /// independent batches inside it (one per swept fraction), `iteration` is the
    /// trial index.
    pub fn sub_seed(&self, stream: &str, lane: u64, iteration: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(stream.as_bytes());
        hasher.update(&lane.to_le_bytes());
        hasher.update(&iteration.to_le_bytes());
        let hash = hasher.finalize();
        let mut word = [0u8; 8];
        word.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(word)
    }

    /// Create a seeded StdRng from a sub-seed.
    pub fn rng_for(&self, stream: &str, lane: u64, iteration: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(stream, lane, iteration))
    }

    /// Pool sampler on its own independent stream.
    pub fn sampler_for(&self, stream: &str, lane: u64, iteration: u64) -> RngSampler<StdRng> {
        RngSampler::new(self.rng_for(stream, lane, iteration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_seeds_are_deterministic() {
        let hierarchy = RngHierarchy::new(42);
        let s1 = hierarchy.sub_seed("monte-carlo", 0, 7);
        let s2 = hierarchy.sub_seed("monte-carlo", 0, 7);
        assert_eq!(s1, s2);
    }

    #[test]
    fn different_streams_different_seeds() {
        let hierarchy = RngHierarchy::new(42);
        let mc = hierarchy.sub_seed("monte-carlo", 0, 0);
        let of = hierarchy.sub_seed("optimal-f", 0, 0);
        assert_ne!(mc, of);
    }

    #[test]
    fn different_lanes_and_iterations_different_seeds() {
        let hierarchy = RngHierarchy::new(42);
        let base = hierarchy.sub_seed("optimal-f", 0, 0);
        assert_ne!(base, hierarchy.sub_seed("optimal-f", 1, 0));
        assert_ne!(base, hierarchy.sub_seed("optimal-f", 0, 1));
    }

    #[test]
    fn derivation_order_independent() {
        let hierarchy = RngHierarchy::new(42);

        let a_first = hierarchy.sub_seed("monte-carlo", 0, 1);
        let b_second = hierarchy.sub_seed("monte-carlo", 0, 2);

        let b_first = hierarchy.sub_seed("monte-carlo", 0, 2);
        let a_second = hierarchy.sub_seed("monte-carlo", 0, 1);

        assert_eq!(a_first, a_second);
        assert_eq!(b_first, b_second);
    }

    #[test]
    fn different_master_seeds_different_output() {
        let h1 = RngHierarchy::new(42);
        let h2 = RngHierarchy::new(43);
        assert_ne!(
            h1.sub_seed("monte-carlo", 0, 0),
            h2.sub_seed("monte-carlo", 0, 0)
        );
    }

    #[test]
    fn rng_sampler_stays_in_bounds() {
        let mut sampler = RngSampler::seeded(7);
        for _ in 0..1000 {
            assert!(sampler.next_index(5) < 5);
        }
    }

    #[test]
    fn rng_sampler_reaches_every_index() {
        let mut sampler = RngSampler::seeded(11);
        let mut seen = [false; 4];
        for _ in 0..500 {
            seen[sampler.next_index(4)] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn scripted_sampler_replays_and_wraps() {
        let mut sampler = ScriptedSampler::new(vec![2, 0, 1]);
        let drawn: Vec<usize> = (0..5).map(|_| sampler.next_index(3)).collect();
        assert_eq!(drawn, vec![2, 0, 1, 2, 0]);
    }

    #[test]
    fn scripted_sampler_reduces_modulo_len() {
        let mut sampler = ScriptedSampler::new(vec![5]);
        assert_eq!(sampler.next_index(3), 2);
    }

    #[test]
    fn empty_script_draws_first_index() {
        let mut sampler = ScriptedSampler::new(Vec::new());
        assert_eq!(sampler.next_index(4), 0);
        assert_eq!(ScriptedSampler::sequential(0).next_index(3), 0);
    }

    #[test]
    fn same_sub_seed_same_draws() {
        let hierarchy = RngHierarchy::new(99);
        let mut a = hierarchy.sampler_for("monte-carlo", 0, 3);
        let mut b = hierarchy.sampler_for("monte-carlo", 0, 3);
        let da: Vec<usize> = (0..20).map(|_| a.next_index(10)).collect();
        let db: Vec<usize> = (0..20).map(|_| b.next_index(10)).collect();
        assert_eq!(da, db);
    }
}
