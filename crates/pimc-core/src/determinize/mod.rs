//! Determinization: turning one seat's partial knowledge into a complete,
//! consistent deal.

mod dealer;

pub use dealer::{DealError, DealStats, Dealer};
