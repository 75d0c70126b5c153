/// Cyclic seatings: rotation `r` puts agent `(seat + r) % players` in `seat`.
pub struct SeatRotations {
    rotations: Vec<Vec<usize>>,
}

impl SeatRotations {
    pub fn new(players: usize, count: usize) -> Self {
        let rotations = (0..count.min(players))
            .map(|shift| (0..players).map(|seat| (seat + shift) % players).collect())
            .collect();
        Self { rotations }
    }

    pub fn as_slice(&self) -> &[Vec<usize>] {
        &self.rotations
    }

    pub fn len(&self) -> usize {
        self.rotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rotations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_rotation_is_identity() {
        let rotations = SeatRotations::new(3, 1);
        assert_eq!(rotations.as_slice(), &[vec![0, 1, 2]]);
    }

    #[test]
    fn every_agent_visits_every_seat() {
        let rotations = SeatRotations::new(4, 10);
        assert_eq!(rotations.len(), 4);
        for seat in 0..4 {
            let mut occupants: Vec<usize> = rotations.as_slice().iter().map(|r| r[seat]).collect();
            occupants.sort_unstable();
            assert_eq!(occupants, vec![0, 1, 2, 3]);
        }
    }
}
