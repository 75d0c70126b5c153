use crate::model::card::Card;
use crate::model::rank::Rank;
use crate::model::suit::Suit;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    pub fn standard() -> Self {
        let mut cards = Vec::with_capacity(52);
        for suit in Suit::ALL {
            for rank in Rank::ORDERED {
                cards.push(Card::new(rank, suit));
            }
        }
        Self { cards }
    }

    /// The `count` highest cards of a standard deck, taken rank by rank
    /// so every suit stays represented.
    pub fn top_ranks(count: usize) -> Self {
        let mut cards = Vec::with_capacity(count.min(52));
        'ranks: for rank in Rank::ORDERED.iter().rev().copied() {
            for suit in Suit::ALL {
                if cards.len() == count {
                    break 'ranks;
                }
                cards.push(Card::new(rank, suit));
            }
        }
        Self { cards }
    }

    pub fn shuffled_with_seed(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut deck = Self::standard();
        deck.shuffle_in_place(&mut rng);
        deck
    }

    pub fn shuffle_in_place<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, Card> {
        self.cards.drain(..)
    }
}
