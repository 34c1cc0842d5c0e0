use rand::Rng;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SamplingError {
    #[error("Reservoir capacity must be at least 1")]
    ZeroCapacity,
    #[error("Invalid sample weight: {0}. Weights must be finite and non-negative")]
    InvalidWeight(f64),
}

/// Weighted sampling without replacement over a stream of `(item, weight)` pairs.
///
/// Positive-weight items compete for the reservoir with Efraimidis–Spirakis keys
/// `ln(u) / w`, so each is kept with probability proportional to its weight while only
/// `capacity` items are ever stored. Zero-weight items go to a separate uniform
/// reservoir (Algorithm R) that is consulted only when fewer than `capacity`
/// positive-weight items were seen:
///
/// * a zero-weight item is never returned while a positive-weight item could fill its
///   slot;
/// * if every weight seen is zero, the result is a uniform sample of the stream.
///
/// The sampler is a single-writer object; use one instance per independent stream.
#[derive(Debug, Clone)]
pub struct WeightedReservoirSampler<T> {
    capacity: usize,
    weighted: Vec<(f64, T)>,
    uniform: Vec<T>,
    zero_weight_seen: usize,
    considered: usize,
}

impl<T: Clone> WeightedReservoirSampler<T> {
    pub fn new(capacity: usize) -> Result<Self, SamplingError> {
        if capacity == 0 {
            return Err(SamplingError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            weighted: Vec::with_capacity(capacity),
            uniform: Vec::with_capacity(capacity),
            zero_weight_seen: 0,
            considered: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn num_considered(&self) -> usize {
        self.considered
    }

    pub fn consider_sample<R: Rng + ?Sized>(
        &mut self,
        item: T,
        weight: f64,
        rng: &mut R,
    ) -> Result<(), SamplingError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(SamplingError::InvalidWeight(weight));
        }
        self.considered += 1;

        if weight == 0.0 {
            self.zero_weight_seen += 1;
            if self.uniform.len() < self.capacity {
                self.uniform.push(item);
            } else {
                let j = rng.gen_range(0..self.zero_weight_seen);
                if j < self.capacity {
                    self.uniform[j] = item;
                }
            }
            return Ok(());
        }

        // 1 - u lies in (0, 1], keeping the logarithm finite.
        let u: f64 = 1.0 - rng.r#gen::<f64>();
        let key = u.ln() / weight;
        if self.weighted.len() < self.capacity {
            self.weighted.push((key, item));
            return Ok(());
        }
        let weakest = self
            .weighted
            .iter()
            .enumerate()
            .map(|(i, (k, _))| (i, *k))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((min_idx, min_key)) = weakest {
            if key > min_key {
                trace!(key, replaced = min_key, "Reservoir slot replaced");
                self.weighted[min_idx] = (key, item);
            }
        }
        Ok(())
    }

    /// Current reservoir: positive-weight items by decreasing key, then zero-weight
    /// fill. Holds at most `capacity` items and does not consume randomness.
    pub fn samples(&self) -> Vec<T> {
        let mut ranked: Vec<&(f64, T)> = self.weighted.iter().collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        let missing = self.capacity - ranked.len();
        ranked
            .into_iter()
            .map(|(_, item)| item.clone())
            .chain(self.uniform.iter().take(missing).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(
            WeightedReservoirSampler::<u32>::new(0).unwrap_err(),
            SamplingError::ZeroCapacity
        );
    }

    #[test]
    fn invalid_weights_are_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut sampler = WeightedReservoirSampler::new(1).unwrap();
        for weight in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(sampler.consider_sample(7, weight, &mut rng).is_err());
        }
        assert_eq!(sampler.num_considered(), 0);
        assert!(sampler.samples().is_empty());
    }

    #[test]
    fn single_nonzero_weight_always_wins() {
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut sampler = WeightedReservoirSampler::new(1).unwrap();
            for i in 0..20 {
                let weight = if i == 13 { 0.25 } else { 0.0 };
                sampler.consider_sample(i, weight, &mut rng).unwrap();
            }
            assert_eq!(sampler.samples(), vec![13]);
        }
    }

    #[test]
    fn all_zero_weights_fall_back_to_uniform() {
        let mut counts: HashMap<u32, usize> = HashMap::new();
        let trials = 6000;
        for seed in 0..trials {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut sampler = WeightedReservoirSampler::new(1).unwrap();
            for i in 0..3 {
                sampler.consider_sample(i, 0.0, &mut rng).unwrap();
            }
            *counts.entry(sampler.samples()[0]).or_default() += 1;
        }
        for i in 0..3 {
            let freq = counts[&i] as f64 / trials as f64;
            assert!((freq - 1.0 / 3.0).abs() < 0.04, "item {i} frequency {freq}");
        }
    }

    #[test]
    fn selection_frequency_follows_weights() {
        let mut counts = [0usize; 2];
        let trials = 8000;
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..trials {
            let mut sampler = WeightedReservoirSampler::new(1).unwrap();
            sampler.consider_sample(0usize, 1.0, &mut rng).unwrap();
            sampler.consider_sample(1usize, 3.0, &mut rng).unwrap();
            counts[sampler.samples()[0]] += 1;
        }
        let freq = counts[1] as f64 / trials as f64;
        assert!((freq - 0.75).abs() < 0.03, "heavy item frequency {freq}");
    }

    #[test]
    fn samples_is_idempotent_and_bounded() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut sampler = WeightedReservoirSampler::new(3).unwrap();
        for i in 0..50 {
            sampler
                .consider_sample(i, 1.0 + (i % 4) as f64, &mut rng)
                .unwrap();
        }
        let first = sampler.samples();
        assert_eq!(first.len(), 3);
        assert_eq!(first, sampler.samples());
        assert_eq!(sampler.num_considered(), 50);
    }

    #[test]
    fn zero_weight_items_only_fill_empty_slots() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut sampler = WeightedReservoirSampler::new(3).unwrap();
        sampler.consider_sample("zero-a", 0.0, &mut rng).unwrap();
        sampler.consider_sample("heavy", 2.0, &mut rng).unwrap();
        sampler.consider_sample("zero-b", 0.0, &mut rng).unwrap();
        let samples = sampler.samples();
        assert_eq!(samples[0], "heavy");
        assert_eq!(samples.len(), 3);
    }
}
