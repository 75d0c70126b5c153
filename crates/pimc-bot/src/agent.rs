use crate::heuristics::{HeuristicsRecorder, TelemetrySink, TracingSink};
use crate::search::{MonteCarloEngine, SearchConfig, SearchOutcome};
use pimc_core::context::MatchContext;
use pimc_core::model::seat::Seat;
use pimc_core::tree::{GameIterator, GameWorld};
use pimc_core::{EngineError, EngineResult};
use std::marker::PhantomData;
use std::sync::Arc;

/// A player that picks an option index at each of its real decisions.
pub trait Agent<W: GameWorld>: Send {
    fn seat(&self) -> Seat;

    fn name(&self) -> &str;

    /// Index in `[0, num_choices)` of the option to play at `cursor`.
    fn make_action(&mut self, cursor: &GameIterator<W>, num_choices: usize) -> EngineResult<usize>;
}

/// Determinized Monte Carlo player for one seat.
pub struct PimcAgent<W: GameWorld> {
    seat: Seat,
    engine: MonteCarloEngine,
    recorder: HeuristicsRecorder,
    sink: Box<dyn TelemetrySink>,
    context: Option<Arc<MatchContext>>,
    record_heuristics: bool,
    decisions: u64,
    last_outcome: Option<SearchOutcome>,
    _world: PhantomData<fn() -> W>,
}

impl<W: GameWorld> PimcAgent<W> {
    pub fn new(seat: Seat, config: SearchConfig) -> EngineResult<Self> {
        Ok(Self {
            seat,
            engine: MonteCarloEngine::new(config)?,
            recorder: HeuristicsRecorder::new(seat),
            sink: Box::new(TracingSink),
            context: None,
            record_heuristics: true,
            decisions: 0,
            last_outcome: None,
            _world: PhantomData,
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_context(mut self, context: Arc<MatchContext>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_heuristics(mut self, enabled: bool) -> Self {
        self.record_heuristics = enabled;
        self
    }

    pub fn config(&self) -> &SearchConfig {
        self.engine.config()
    }

    /// Leader utility of every recorded decision, oldest first.
    pub fn lead_history(&self) -> &[f64] {
        self.recorder.lead_history()
    }

    pub fn decisions(&self) -> u64 {
        self.decisions
    }

    pub fn last_outcome(&self) -> Option<&SearchOutcome> {
        self.last_outcome.as_ref()
    }

    fn decision_seed(&self) -> u64 {
        self.engine
            .config()
            .seed
            .wrapping_add((self.seat.index() as u64) << 48)
            .wrapping_add(self.decisions.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }
}

impl<W: GameWorld> Agent<W> for PimcAgent<W> {
    fn seat(&self) -> Seat {
        self.seat
    }

    fn name(&self) -> &str {
        "pimc"
    }

    fn make_action(&mut self, cursor: &GameIterator<W>, num_choices: usize) -> EngineResult<usize> {
        if num_choices == 0 {
            return Err(EngineError::contract("a decision needs at least one choice"));
        }
        let seed = self.decision_seed();
        let outcome = self.engine.evaluate(cursor, self.seat, num_choices, seed)?;
        if self.record_heuristics {
            self.recorder.record(
                outcome.utilities.values(),
                cursor.num_players(),
                self.decisions + 1,
                self.sink.as_ref(),
            )?;
        }

        // Nothing below can fail: a rejected decision leaves no trace.
        self.decisions += 1;
        if let Some(context) = &self.context {
            context.record_decision(num_choices, self.seat, cursor.world().tree_location());
        }
        let choice = outcome.choice;
        self.last_outcome = Some(outcome);
        Ok(choice)
    }
}
