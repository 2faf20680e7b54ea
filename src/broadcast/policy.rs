//! Target selection and delta generation for broadcast ticks.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{DeltaBounds, SellerId};

/// How a tick picks the seller its delta applies to.
///
/// Every tick is delivered to every subscriber regardless of policy; the
/// policy only decides which identifier the event names. Clients filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetPolicy {
    /// Always the same seller.
    Fixed(SellerId),
    /// Cycle through a list of sellers.
    RoundRobin(Vec<SellerId>),
    /// Cycle through the sellers connected clients declared interest in,
    /// or `fallback` when nobody declared any.
    Interested {
        /// Used while no subscriber has an interest.
        fallback: SellerId,
    },
}

impl TargetPolicy {
    /// Pick the next target.
    ///
    /// `cursor` advances on every rotating pick. Returns `None` only for an
    /// empty round-robin list.
    pub fn select<'a, I>(&self, interests: I, cursor: &mut usize) -> Option<SellerId>
    where
        I: IntoIterator<Item = &'a SellerId>,
    {
        match self {
            Self::Fixed(id) => Some(id.clone()),
            Self::RoundRobin(ids) => {
                if ids.is_empty() {
                    return None;
                }
                let picked = ids[*cursor % ids.len()].clone();
                *cursor = cursor.wrapping_add(1);
                Some(picked)
            }
            Self::Interested { fallback } => {
                // BTreeSet keeps rotation order stable between ticks.
                let interests: BTreeSet<&SellerId> = interests.into_iter().collect();
                if interests.is_empty() {
                    return Some(fallback.clone());
                }
                let picked = interests
                    .iter()
                    .nth(*cursor % interests.len())
                    .map(|id| (*id).clone());
                *cursor = cursor.wrapping_add(1);
                picked
            }
        }
    }
}

/// Draws score changes uniformly from inclusive bounds.
#[derive(Debug)]
pub struct DeltaGenerator {
    bounds: DeltaBounds,
    rng: StdRng,
}

impl DeltaGenerator {
    /// Generator seeded from OS entropy.
    pub fn new(bounds: DeltaBounds) -> Self {
        Self {
            bounds,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator.
    pub fn with_seed(bounds: DeltaBounds, seed: u64) -> Self {
        Self {
            bounds,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Configured bounds.
    pub fn bounds(&self) -> DeltaBounds {
        self.bounds
    }

    /// Draw the next change.
    pub fn next_change(&mut self) -> i32 {
        self.rng.gen_range(self.bounds.min()..=self.bounds.max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(s: &str) -> SellerId {
        SellerId::parse(s).unwrap()
    }

    #[test]
    fn test_fixed_policy_ignores_interests() {
        let policy = TargetPolicy::Fixed(id("S-1"));
        let interests = [id("S-2")];
        let mut cursor = 0;
        assert_eq!(policy.select(&interests, &mut cursor), Some(id("S-1")));
        assert_eq!(cursor, 0);
    }

    #[test]
    fn test_round_robin_cycles() {
        let policy = TargetPolicy::RoundRobin(vec![id("S-1"), id("S-2")]);
        let mut cursor = 0;
        let picks: Vec<_> = (0..4)
            .map(|_| policy.select(std::iter::empty(), &mut cursor).unwrap())
            .collect();
        assert_eq!(picks, vec![id("S-1"), id("S-2"), id("S-1"), id("S-2")]);
    }

    #[test]
    fn test_round_robin_empty_selects_nothing() {
        let mut cursor = 0;
        assert!(TargetPolicy::RoundRobin(vec![]).select(std::iter::empty(), &mut cursor).is_none());
    }

    #[test]
    fn test_interested_uses_fallback_then_interests() {
        let policy = TargetPolicy::Interested { fallback: id("S-0") };
        let mut cursor = 0;
        assert_eq!(policy.select(std::iter::empty(), &mut cursor), Some(id("S-0")));

        let interests = [id("S-2"), id("S-1"), id("S-2")];
        let first = policy.select(&interests, &mut cursor).unwrap();
        let second = policy.select(&interests, &mut cursor).unwrap();
        assert_ne!(first, second);
        assert!([id("S-1"), id("S-2")].contains(&first));
    }

    #[test]
    fn test_seeded_generator_is_reproducible() {
        let mut a = DeltaGenerator::with_seed(DeltaBounds::default(), 7);
        let mut b = DeltaGenerator::with_seed(DeltaBounds::default(), 7);
        let xs: Vec<i32> = (0..32).map(|_| a.next_change()).collect();
        let ys: Vec<i32> = (0..32).map(|_| b.next_change()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_degenerate_bounds() {
        let mut generator = DeltaGenerator::new(DeltaBounds::new(3, 3).unwrap());
        assert!((0..16).all(|_| generator.next_change() == 3));
    }

    proptest! {
        #[test]
        fn delta_within_bounds(min in -50i32..50, span in 0i32..50, seed in any::<u64>()) {
            let bounds = DeltaBounds::new(min, min + span).unwrap();
            let mut generator = DeltaGenerator::with_seed(bounds, seed);
            for _ in 0..64 {
                prop_assert!(bounds.contains(generator.next_change()));
            }
        }
    }
}
