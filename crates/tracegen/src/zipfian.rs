use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Zipf;

/// Wraps a Zipfian distribution for generating item IDs.
pub struct ZipfianGenerator {
    dist: Zipf<f64>,
    rng: StdRng,
}

impl ZipfianGenerator {
    /// A seeded generator replays the same ID sequence; without a seed the
    /// trace differs per run.
    pub fn new(num_items: u64, alpha: f64, seed: Option<u64>) -> Self {
        let dist = Zipf::new(num_items, alpha).expect("invalid Zipfian parameters");
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { dist, rng }
    }

    /// Generate the next item ID (1-based).
    pub fn next_id(&mut self) -> u64 {
        self.rng.sample(&self.dist) as u64
    }
}
