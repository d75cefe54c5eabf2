/// Ring of per-step batches. A value scheduled with delay `d` comes out of the
/// `d`-th following call to `advance`, counting from zero.
#[derive(Debug)]
pub struct DelayLine<T> {
    slots: Vec<Vec<T>>,
    current_pos: usize,
}

impl<T: Clone> DelayLine<T> {
    pub fn new(horizon: usize) -> DelayLine<T> {
        DelayLine {
            slots: vec![Vec::new(); horizon.max(1)],
            current_pos: 0,
        }
    }

    #[cfg(test)]
    pub fn horizon(&self) -> usize {
        self.slots.len()
    }

    pub fn schedule(&mut self, delay: usize, value: T) {
        debug_assert!(delay < self.slots.len());

        let mut target_pos = self.current_pos + delay;
        if target_pos >= self.slots.len() {
            target_pos -= self.slots.len();
        }

        self.slots[target_pos].push(value);
    }

    pub fn due_count(&self) -> usize {
        self.slots[self.current_pos].len()
    }

    #[cfg(test)]
    pub fn pending_count(&self) -> usize {
        self.slots.iter().map(Vec::len).sum()
    }

    pub fn advance(&mut self) -> impl Iterator<Item = T> + '_ {
        let pos = self.current_pos;
        self.current_pos += 1;
        if self.current_pos == self.slots.len() {
            self.current_pos = 0;
        }
        self.slots[pos].drain(..)
    }
}

#[cfg(test)]
mod tests {

    use super::DelayLine;
    use itertools::assert_equal;
    use rand::{distributions::Uniform, prelude::Distribution, rngs::StdRng, SeedableRng};

    const NOTHING: [usize; 0] = [];

    #[test]
    fn empty_line() {
        let mut sut: DelayLine<usize> = DelayLine::new(4);
        assert_eq!(sut.due_count(), 0);
        assert_equal(sut.advance(), NOTHING);
    }

    #[test]
    fn zero_horizon_is_bumped() {
        let sut: DelayLine<usize> = DelayLine::new(0);
        assert_eq!(sut.horizon(), 1);
    }

    #[test]
    fn arrival_after_delay() {
        let mut sut: DelayLine<usize> = DelayLine::new(20);
        sut.schedule(0, 7);
        sut.schedule(2, 42);
        assert_eq!(sut.pending_count(), 2);

        assert_equal(sut.advance(), [7]);
        assert_equal(sut.advance(), NOTHING);
        assert_eq!(sut.due_count(), 1);
        assert_equal(sut.advance(), [42]);
        assert_eq!(sut.pending_count(), 0);
    }

    #[test]
    fn wraps_around_horizon() {
        let mut sut: DelayLine<usize> = DelayLine::new(3);

        for _ in 0..2 {
            let _ = sut.advance();
        }

        sut.schedule(2, 5);
        assert_equal(sut.advance(), NOTHING);
        assert_equal(sut.advance(), NOTHING);
        assert_equal(sut.advance(), [5]);
    }

    #[test]
    fn matches_flat_schedule() {
        const HORIZON: usize = 8;
        const NUM_STEPS: usize = 200;
        let mut sut: DelayLine<usize> = DelayLine::new(HORIZON);
        let mut expected = vec![Vec::<usize>::new(); NUM_STEPS + HORIZON];
        let mut rng = StdRng::seed_from_u64(0);
        let amount_dist = Uniform::from(0..6);
        let delay_dist = Uniform::from(0..HORIZON);

        for step in 0..NUM_STEPS {
            for _ in 0..amount_dist.sample(&mut rng) {
                let delay = delay_dist.sample(&mut rng);
                let nid = step * 100 + delay;
                sut.schedule(delay, nid);
                expected[step + delay].push(nid);
            }

            assert_eq!(sut.due_count(), expected[step].len());
            assert!(sut.advance().eq(expected[step].drain(..)));
        }
    }
}
