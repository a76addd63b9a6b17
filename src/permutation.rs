use crate::population::GroupedPopulation;

use rand::seq::SliceRandom;
use rand::Rng;

/// Draws random assignments of a fixed 0/1 multiset to the positions of a
/// `GroupedPopulation`.
///
/// The buffer is allocated once and shuffled in place on every call, so a
/// worker can hold one engine for all of its iterations. Shuffling keeps the
/// multiset intact, and a uniform shuffle of any arrangement is a uniform
/// permutation, so the buffer never needs resetting between draws.
pub struct PermutationEngine {
    outcomes: Vec<u8>,
    assigned: usize,
}

impl PermutationEngine {
    pub fn new(population: &GroupedPopulation) -> Self {
        let n = population.draw_population();
        let k = population.success_count();
        let mut outcomes = vec![0u8; n];
        outcomes[..k].fill(1);
        PermutationEngine {
            outcomes,
            assigned: population.assigned_population(),
        }
    }

    /// Fisher–Yates shuffle of all `draw_population` items. Returns the full
    /// outcome vector; groups only read the leading `assigned_population`.
    pub fn permute<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &[u8] {
        self.outcomes.shuffle(rng);
        &self.outcomes
    }

    /// Outcomes of the current draw that carry group membership.
    pub fn assigned(&self) -> &[u8] {
        &self.outcomes[..self.assigned]
    }
}
