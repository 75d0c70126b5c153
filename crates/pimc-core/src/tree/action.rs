use super::world::GameWorld;
use serde::Serialize;

/// Closed set of action shapes. The payload stays opaque to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Play,
    Call,
    Other,
}

/// One legal choice: an ordered group of mutations applied as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCollection<M> {
    kind: ActionKind,
    mutations: Vec<M>,
}

impl<M> ActionCollection<M> {
    pub fn new(kind: ActionKind, mutations: Vec<M>) -> Self {
        Self { kind, mutations }
    }

    pub fn single(kind: ActionKind, mutation: M) -> Self {
        Self::new(kind, vec![mutation])
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn mutations(&self) -> &[M] {
        &self.mutations
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Applies every mutation in order. The group is checked as a whole
    /// first, so either all of it lands or `world` is left untouched.
    pub fn execute_all<W>(&self, world: &mut W) -> Result<(), W::Error>
    where
        W: GameWorld<Mutation = M>,
    {
        world.check_mutations(&self.mutations)?;
        self.mutations
            .iter()
            .try_for_each(|mutation| world.apply(mutation))
    }
}
