//! Phased weighted random selection.
//!
//! A marble bag holds (item, weight) entries grouped by phase. A pick always
//! comes from the lowest phase that has any positive weight, so callers express
//! "prefer these, fall back to those" simply by adding the fallbacks at a
//! higher phase.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;

/// Phased weighted bag of items.
#[derive(Debug, Clone)]
pub struct MarbleBag<T> {
    phases: BTreeMap<u32, Vec<(T, f64)>>,
}

impl<T> Default for MarbleBag<T> {
    fn default() -> Self {
        Self {
            phases: BTreeMap::new(),
        }
    }
}

impl<T> MarbleBag<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `item` at `phase` with `weight`.
    ///
    /// Entries with a weight that is not a positive finite number can never be
    /// drawn and are not stored.
    pub fn add(&mut self, phase: u32, item: T, weight: f64) {
        if !weight.is_finite() || weight <= 0.0 {
            return;
        }
        self.phases.entry(phase).or_default().push((item, weight));
    }

    /// True only if every phase is empty.
    pub fn is_empty(&self) -> bool {
        self.phases.values().all(|entries| entries.is_empty())
    }

    /// Total number of entries across all phases.
    pub fn len(&self) -> usize {
        self.phases.values().map(Vec::len).sum()
    }

    /// Phase numbers that hold at least one entry, ascending.
    pub fn phases(&self) -> Vec<u32> {
        self.phases
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(phase, _)| *phase)
            .collect()
    }

    /// Total weight of one phase.
    pub fn phase_weight(&self, phase: u32) -> f64 {
        self.phases
            .get(&phase)
            .map(|entries| entries.iter().map(|(_, w)| *w).sum())
            .unwrap_or(0.0)
    }

    /// Draws one item from the lowest phase with positive total weight.
    ///
    /// The index is sampled over that phase's entries in insertion order, so a
    /// seeded generator always reproduces the same pick. Returns None if the
    /// bag is empty.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&T> {
        let (_, entries) = self
            .phases
            .iter()
            .find(|(_, entries)| entries.iter().any(|(_, w)| *w > 0.0))?;
        let dist = WeightedIndex::new(entries.iter().map(|(_, w)| *w)).ok()?;
        entries.get(dist.sample(rng)).map(|(item, _)| item)
    }
}

impl<T: fmt::Display> MarbleBag<T> {
    /// One line per phase listing each entry and its weight, for diagnostics.
    pub fn report(&self) -> String {
        let mut lines = Vec::new();
        for (phase, entries) in &self.phases {
            let parts: Vec<String> = entries
                .iter()
                .map(|(item, weight)| format!("{}:{:.3}", item, weight))
                .collect();
            lines.push(format!("phase {}: {}", phase, parts.join(", ")));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    #[test]
    fn empty_bag_picks_nothing() {
        let bag: MarbleBag<&str> = MarbleBag::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(bag.is_empty());
        assert!(bag.pick(&mut rng).is_none());
    }

    #[test]
    fn non_positive_weights_are_ignored() {
        let mut bag = MarbleBag::new();
        bag.add(1, "zero", 0.0);
        bag.add(1, "neg", -3.0);
        bag.add(1, "nan", f64::NAN);
        assert!(bag.is_empty());
        assert_eq!(bag.len(), 0);
    }

    #[test]
    fn lower_phase_always_wins() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for round in 0..200 {
            let mut bag = MarbleBag::new();
            bag.add(2, "library", 1000.0 + round as f64);
            bag.add(1, "direct", 0.001 + round as f64 * 0.01);
            bag.add(3, "other", 50.0);
            assert_eq!(bag.pick(&mut rng), Some(&"direct"));
        }
    }

    #[test]
    fn falls_back_to_next_phase() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut bag = MarbleBag::new();
        bag.add(1, "nothing", 0.0);
        bag.add(2, "library", 1.0);
        assert_eq!(bag.phases(), vec![2]);
        assert_eq!(bag.pick(&mut rng), Some(&"library"));
    }

    #[test]
    fn frequencies_rank_by_weight() {
        let mut bag = MarbleBag::new();
        bag.add(1, "A", 1000.0);
        bag.add(1, "B", 30.0);
        bag.add(1, "C", 5.0);

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for _ in 0..20_000 {
            let item = bag.pick(&mut rng).unwrap();
            *counts.entry(*item).or_default() += 1;
        }
        let a = counts.get("A").copied().unwrap_or(0);
        let b = counts.get("B").copied().unwrap_or(0);
        let c = counts.get("C").copied().unwrap_or(0);
        assert!(a > b, "A={} B={}", a, b);
        assert!(b > c, "B={} C={}", b, c);
    }

    #[test]
    fn seeded_picks_reproduce() {
        let mut bag = MarbleBag::new();
        for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
            bag.add(1, *name, 1.0 + i as f64);
        }
        let picks = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..16).map(|_| *bag.pick(&mut rng).unwrap()).collect::<Vec<_>>()
        };
        assert_eq!(picks(99), picks(99));
    }

    #[test]
    fn single_entry_phase_always_picks_it() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut bag = MarbleBag::new();
        bag.add(1, "tiny", f64::MIN_POSITIVE);
        bag.add(2, "big", 1e12);
        for _ in 0..50 {
            assert_eq!(bag.pick(&mut rng), Some(&"tiny"));
        }
    }

    #[test]
    fn report_lists_phases() {
        let mut bag = MarbleBag::new();
        bag.add(1, "x", 2.0);
        bag.add(2, "y", 0.5);
        assert_eq!(bag.phase_weight(1), 2.0);
        assert_eq!(bag.report(), "phase 1: x:2.000\nphase 2: y:0.500");
    }
}
