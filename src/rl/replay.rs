//! Experience replay buffer.

use std::collections::VecDeque;

use rand::seq::index;
use rand::Rng;

/// One `(state, action, reward, next_state, terminal)` record.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Vec<f64>,
    pub action: usize,
    pub reward: f64,
    pub next_state: Vec<f64>,
    /// Whether `next_state` ends the trajectory (no bootstrapping).
    pub terminal: bool,
}

/// Fixed-capacity ring of transitions.
///
/// When full, each insert evicts the oldest entry regardless of whether it
/// was ever sampled.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    entries: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1 << 16)),
            capacity,
        }
    }

    /// Appends a transition, evicting the oldest one on overflow.
    pub fn push(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(transition);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fill level in percent of capacity, `0..=100`.
    pub fn fill_percent(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        (self.entries.len() as f64 * 100.0 / self.capacity as f64).min(100.0)
    }

    /// Uniform sample of `n` distinct transitions.
    ///
    /// Returns fewer than `n` only when the buffer holds fewer than `n`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<&Transition> {
        let amount = n.min(self.entries.len());
        index::sample(rng, self.entries.len(), amount)
            .into_iter()
            .map(|i| &self.entries[i])
            .collect()
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn transition(tag: f64) -> Transition {
        Transition {
            state: vec![tag; 5],
            action: 0,
            reward: tag,
            next_state: vec![tag; 5],
            terminal: false,
        }
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut buf = ReplayBuffer::new(3);
        for i in 0..10 {
            buf.push(transition(i as f64));
            assert!(buf.len() <= 3);
        }
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn evicts_in_insertion_order() {
        let mut buf = ReplayBuffer::new(4);
        for i in 0..5 {
            buf.push(transition(i as f64));
        }
        let rewards: Vec<f64> = buf.iter().map(|t| t.reward).collect();
        assert!(!rewards.contains(&0.0));
        assert!(rewards.contains(&1.0));
        assert_eq!(rewards, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn eviction_ignores_sampling_history() {
        let mut buf = ReplayBuffer::new(2);
        let mut rng = StdRng::seed_from_u64(0);
        buf.push(transition(0.0));
        buf.push(transition(1.0));
        for _ in 0..10 {
            buf.sample(&mut rng, 1);
        }
        buf.push(transition(2.0));
        let rewards: Vec<f64> = buf.iter().map(|t| t.reward).collect();
        assert_eq!(rewards, vec![1.0, 2.0]);
    }

    #[test]
    fn sample_is_without_replacement() {
        let mut buf = ReplayBuffer::new(10);
        for i in 0..10 {
            buf.push(transition(i as f64));
        }
        let mut rng = StdRng::seed_from_u64(42);
        let batch = buf.sample(&mut rng, 10);
        let mut rewards: Vec<f64> = batch.iter().map(|t| t.reward).collect();
        rewards.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(rewards, (0..10).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn sample_caps_at_len() {
        let mut buf = ReplayBuffer::new(10);
        buf.push(transition(1.0));
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(buf.sample(&mut rng, 32).len(), 1);
    }

    #[test]
    fn fill_percent() {
        let mut buf = ReplayBuffer::new(200);
        assert_eq!(buf.fill_percent(), 0.0);
        for i in 0..50 {
            buf.push(transition(i as f64));
        }
        assert!((buf.fill_percent() - 25.0).abs() < 1e-10);
    }
}
