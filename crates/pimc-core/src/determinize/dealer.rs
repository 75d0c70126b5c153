//! Re-deals the cards a seat cannot see.

use crate::model::card::Card;
use crate::model::hand::Hand;
use crate::model::seat::Seat;
use crate::model::suit::{Suit, SuitMask};
use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

const DEFAULT_MAX_ATTEMPTS: usize = 16;
const MAX_REPAIR_SWAPS: usize = 64;

/// Shuffles the unseen cards among the opponents of one seat.
///
/// The perspective seat keeps its hand, every opponent keeps its hand size,
/// and no card is dealt to a seat publicly known to be void in its suit.
#[derive(Debug, Clone, Copy)]
pub struct Dealer {
    max_attempts: usize,
}

impl Default for Dealer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl Dealer {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Draws a consistent deal, trying a swap repair after each rejected
    /// shuffle.
    pub fn redeal<R: Rng + ?Sized>(
        &self,
        hands: &[Hand],
        perspective: Seat,
        voids: &[SuitMask],
        rng: &mut R,
        mut stats: Option<&mut DealStats>,
    ) -> Result<Vec<Hand>, DealError> {
        if hands.len() != voids.len() {
            return Err(DealError::ShapeMismatch {
                hands: hands.len(),
                voids: voids.len(),
            });
        }
        if perspective.index() >= hands.len() {
            return Err(DealError::UnknownSeat {
                seat: perspective,
                players: hands.len(),
            });
        }

        let mut pool: Vec<Card> = hands
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != perspective.index())
            .flat_map(|(_, hand)| hand.cards().iter().copied())
            .collect();

        for _ in 0..self.max_attempts {
            if let Some(inner) = stats.as_deref_mut() {
                inner.attempts += 1;
            }
            pool.shuffle(rng);
            let mut dealt = deal_pool(hands, perspective, &pool);
            if respects_voids(&dealt, perspective, voids) {
                if let Some(inner) = stats.as_deref_mut() {
                    inner.succeeded += 1;
                }
                return Ok(dealt);
            }
            if attempt_repair(&mut dealt, perspective, voids) {
                if let Some(inner) = stats.as_deref_mut() {
                    inner.succeeded += 1;
                    inner.repairs += 1;
                }
                return Ok(dealt);
            }
        }

        Err(DealError::Unsatisfiable {
            attempts: self.max_attempts,
        })
    }

    /// Like [`Dealer::redeal`], but falls back to the given (always
    /// consistent) deal when no alternative could be drawn.
    pub fn redeal_or_keep<R: Rng + ?Sized>(
        &self,
        hands: &[Hand],
        perspective: Seat,
        voids: &[SuitMask],
        rng: &mut R,
        mut stats: Option<&mut DealStats>,
    ) -> Vec<Hand> {
        match self.redeal(hands, perspective, voids, rng, stats.as_deref_mut()) {
            Ok(dealt) => dealt,
            Err(err) => {
                tracing::warn!(
                    target: "pimc_core::determinize",
                    seat = %perspective,
                    error = %err,
                    "keeping the true deal for determinization"
                );
                if let Some(inner) = stats {
                    inner.fallbacks += 1;
                }
                hands.to_vec()
            }
        }
    }
}

fn deal_pool(hands: &[Hand], perspective: Seat, pool: &[Card]) -> Vec<Hand> {
    let mut cursor = 0;
    hands
        .iter()
        .enumerate()
        .map(|(index, hand)| {
            if index == perspective.index() {
                return hand.clone();
            }
            let slice = &pool[cursor..cursor + hand.len()];
            cursor += hand.len();
            Hand::with_cards(slice.to_vec())
        })
        .collect()
}

fn respects_voids(hands: &[Hand], perspective: Seat, voids: &[SuitMask]) -> bool {
    hands.iter().enumerate().all(|(index, hand)| {
        index == perspective.index() || hand.iter().all(|card| !voids[index].contains(card.suit))
    })
}

fn find_violation(hands: &[Hand], perspective: Seat, voids: &[SuitMask]) -> Option<(usize, Suit)> {
    hands.iter().enumerate().find_map(|(index, hand)| {
        if index == perspective.index() {
            return None;
        }
        hand.iter()
            .find(|card| voids[index].contains(card.suit))
            .map(|card| (index, card.suit))
    })
}

/// Swaps offending cards with other opponents until every void holds.
fn attempt_repair(hands: &mut [Hand], perspective: Seat, voids: &[SuitMask]) -> bool {
    for _ in 0..MAX_REPAIR_SWAPS {
        let Some((holder, bad_suit)) = find_violation(hands, perspective, voids) else {
            return true;
        };

        let swap = (0..hands.len())
            .filter(|&donor| donor != holder && donor != perspective.index())
            .filter(|&donor| !voids[donor].contains(bad_suit))
            .find_map(|donor| {
                hands[donor]
                    .iter()
                    .find(|card| !voids[holder].contains(card.suit))
                    .map(|card| (donor, *card))
            });
        let Some((donor, returned)) = swap else {
            return false;
        };

        let (holder_hand, donor_hand) = split_two_mut(hands, holder, donor);
        let Some(offending) = holder_hand.take_suit(bad_suit) else {
            return false;
        };
        donor_hand.remove(returned);
        holder_hand.add(returned);
        donor_hand.add(offending);
    }
    find_violation(hands, perspective, voids).is_none()
}

fn split_two_mut<T>(slice: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b);
    if a < b {
        let (left, right) = slice.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = slice.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DealStats {
    pub attempts: usize,
    pub succeeded: usize,
    pub repairs: usize,
    pub fallbacks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DealError {
    #[error("{hands} hands but {voids} void masks")]
    ShapeMismatch { hands: usize, voids: usize },
    #[error("{seat} is not seated in a {players}-player deal")]
    UnknownSeat { seat: Seat, players: usize },
    #[error("no deal satisfied the void constraints after {attempts} attempts")]
    Unsatisfiable { attempts: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn hand(cards: &[&str]) -> Hand {
        Hand::with_cards(cards.iter().map(|raw| raw.parse().unwrap()).collect())
    }

    fn sorted_cards(hands: &[Hand], skip: usize) -> Vec<Card> {
        let mut cards: Vec<Card> = hands
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != skip)
            .flat_map(|(_, hand)| hand.cards().to_vec())
            .collect();
        cards.sort();
        cards
    }

    #[test]
    fn perspective_hand_and_hand_sizes_are_kept() {
        let hands = vec![
            hand(&["AS", "KS", "QS"]),
            hand(&["AH", "KH", "QH"]),
            hand(&["AC", "KC", "QC"]),
        ];
        let voids = vec![SuitMask::EMPTY; 3];
        let mut rng = SmallRng::seed_from_u64(9);
        let dealt = Dealer::default()
            .redeal(&hands, Seat::new(0), &voids, &mut rng, None)
            .unwrap();
        assert_eq!(dealt[0], hands[0]);
        assert_eq!(dealt[1].len(), 3);
        assert_eq!(dealt[2].len(), 3);
        assert_eq!(sorted_cards(&dealt, 0), sorted_cards(&hands, 0));
    }

    #[test]
    fn voids_are_respected() {
        let hands = vec![
            hand(&["2D"]),
            hand(&["AH", "KH", "AC"]),
            hand(&["QC", "JC", "10C"]),
        ];
        let voids = vec![
            SuitMask::EMPTY,
            SuitMask::EMPTY,
            SuitMask::EMPTY.with(Suit::Hearts),
        ];
        let mut stats = DealStats::default();
        for seed in 0..32 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let dealt = Dealer::new(4)
                .redeal(&hands, Seat::new(0), &voids, &mut rng, Some(&mut stats))
                .unwrap();
            assert!(dealt[2].iter().all(|card| card.suit != Suit::Hearts));
            assert!(dealt[1].contains("AH".parse().unwrap()));
            assert!(dealt[1].contains("KH".parse().unwrap()));
        }
        assert_eq!(stats.succeeded, 32);
        assert!(stats.attempts >= 32);
    }

    #[test]
    fn repair_swaps_offending_cards() {
        let mut hands = vec![hand(&[]), hand(&["AC", "KC"]), hand(&["AH", "2H"])];
        let voids = vec![
            SuitMask::EMPTY,
            SuitMask::EMPTY.with(Suit::Clubs),
            SuitMask::EMPTY,
        ];
        assert!(attempt_repair(&mut hands, Seat::new(0), &voids));
        assert!(hands[1].iter().all(|card| card.suit == Suit::Hearts));
        assert_eq!(hands[2].len(), 2);
    }

    #[test]
    fn impossible_constraints_fall_back_to_true_deal() {
        let hands = vec![hand(&[]), hand(&["AC"]), hand(&["KC"])];
        let voids = vec![
            SuitMask::EMPTY,
            SuitMask::EMPTY.with(Suit::Clubs),
            SuitMask::EMPTY.with(Suit::Clubs),
        ];
        let mut rng = SmallRng::seed_from_u64(1);
        let dealer = Dealer::new(2);
        assert!(matches!(
            dealer.redeal(&hands, Seat::new(0), &voids, &mut rng, None),
            Err(DealError::Unsatisfiable { attempts: 2 })
        ));
        let mut stats = DealStats::default();
        let kept = dealer.redeal_or_keep(&hands, Seat::new(0), &voids, &mut rng, Some(&mut stats));
        assert_eq!(kept, hands);
        assert_eq!(stats.fallbacks, 1);
    }

    #[test]
    fn mismatched_inputs_are_reported() {
        let hands = vec![hand(&["AC"]), hand(&["KC"])];
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(matches!(
            Dealer::default().redeal(&hands, Seat::new(0), &[SuitMask::EMPTY], &mut rng, None),
            Err(DealError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            Dealer::default().redeal(&hands, Seat::new(3), &[SuitMask::EMPTY; 2], &mut rng, None),
            Err(DealError::UnknownSeat { .. })
        ));
    }
}
