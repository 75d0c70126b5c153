use super::iterator::GameIterator;
use super::world::GameWorld;
use crate::error::{EngineError, EngineResult};
use crate::model::seat::Seat;
use rand::RngCore;

/// One seat's view of the true game.
pub struct Perspective<'a, W: GameWorld> {
    seat: Seat,
    source: &'a GameIterator<W>,
}

impl<'a, W: GameWorld> Perspective<'a, W> {
    pub fn new(source: &'a GameIterator<W>, seat: Seat) -> Self {
        Self { seat, source }
    }

    pub fn seat(&self) -> Seat {
        self.seat
    }

    pub fn source(&self) -> &'a GameIterator<W> {
        self.source
    }

    /// A cursor over a determinized copy of the true world: everything hidden
    /// from this seat is re-dealt, everything public is preserved. The source
    /// cursor and its world are left untouched.
    pub fn resolve(&self, rng: &mut dyn RngCore) -> EngineResult<GameIterator<W>> {
        let players = self.source.num_players();
        if self.seat.index() >= players {
            return Err(EngineError::contract(format!(
                "{} cannot resolve a {players}-player game",
                self.seat
            )));
        }
        let world = self.source.world().determinize(self.seat, rng);
        Ok(self.source.fork(world, rng.next_u64()))
    }
}
