use serde::Serialize;

/// Rank-based utility per candidate action, plus how many rollouts backed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtilityVector {
    values: Vec<f64>,
    completed: Vec<usize>,
}

impl UtilityVector {
    pub fn zeros(num_choices: usize) -> Self {
        Self {
            values: vec![0.0; num_choices],
            completed: vec![0; num_choices],
        }
    }

    /// Reduces per-rollout placements in rollout order. Each placement `r`
    /// adds `(1/(r+1))/planned`; a partial batch is rescaled by the number
    /// of rollouts that actually ran, an empty one stays at zero.
    pub fn accumulate(&mut self, action: usize, placements: &[Option<usize>], planned: usize) {
        let planned = planned.max(1) as f64;
        let mut total = 0.0;
        let mut completed = 0;
        for rank in placements.iter().flatten() {
            total += (1.0 / (*rank as f64 + 1.0)) / planned;
            completed += 1;
        }
        if completed > 0 && (completed as f64) < planned {
            total *= planned / completed as f64;
        }
        self.values[action] = total;
        self.completed[action] = completed;
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn completed(&self) -> &[usize] {
        &self.completed
    }

    pub fn get(&self, action: usize) -> Option<f64> {
        self.values.get(action).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Best action; the first one wins exact ties.
    pub fn argmax(&self) -> Option<usize> {
        min_max_idx(&self.values).map(|(_, max)| max)
    }
}

/// Indices of the minimum and maximum, keeping the first index for each
/// extreme.
pub fn min_max_idx(values: &[f64]) -> Option<(usize, usize)> {
    let first = *values.first()?;
    let (mut min_idx, mut max_idx) = (0, 0);
    let (mut min, mut max) = (first, first);
    for (index, &value) in values.iter().enumerate().skip(1) {
        if value > max {
            max = value;
            max_idx = index;
        }
        if value < min {
            min = value;
            min_idx = index;
        }
    }
    Some((min_idx, max_idx))
}
