use std::time::Duration;

use crate::rng::SeededRng;

// Total jitter span in seconds, centered on zero.
const JITTER_RANGE: f32 = 0.5;

const MIN_RTO: Duration = Duration::from_millis(50);

/// Retransmission timer for a flight.
///
/// Doubles on every attempt up to `max_rto`, with a ±0.25s jitter.
#[derive(Debug)]
pub struct ExponentialBackoff {
    start_rto: Duration,
    max_rto: Duration,
    retries: usize,
    rto: Duration,
    jitter: f32,
    left: usize,
}

impl ExponentialBackoff {
    pub fn new(
        start_rto: Duration,
        max_rto: Duration,
        retries: usize,
        rng: &mut SeededRng,
    ) -> Self {
        Self {
            start_rto,
            max_rto: max_rto.max(start_rto),
            retries,
            rto: start_rto,
            jitter: jitter(rng),
            left: retries,
        }
    }

    pub fn reset(&mut self, rng: &mut SeededRng) {
        self.rto = self.start_rto;
        self.jitter = jitter(rng);
        self.left = self.retries;
    }

    /// Current timeout including jitter.
    pub fn rto(&self) -> Duration {
        let offset = Duration::from_secs_f32(self.jitter.abs());
        let rto = if self.jitter < 0.0 {
            self.rto.saturating_sub(offset)
        } else {
            self.rto + offset
        };
        rto.max(MIN_RTO)
    }

    pub fn attempt(&mut self, rng: &mut SeededRng) {
        let Some(left) = self.left.checked_sub(1) else {
            return;
        };
        self.left = left;
        self.jitter = jitter(rng);
        self.rto = (self.rto * 2).min(self.max_rto);
    }

    pub fn can_retry(&self) -> bool {
        self.left > 0
    }
}

// A value between -0.25s and 0.25s
fn jitter(rng: &mut SeededRng) -> f32 {
    rng.gen::<f32>() * JITTER_RANGE - (JITTER_RANGE / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_retries_run_out() {
        let mut rng = SeededRng::new(Some(42));
        let mut exp = ExponentialBackoff::new(
            Duration::from_secs(1),
            Duration::from_secs(60),
            3,
            &mut rng,
        );

        let mut last = exp.rto();
        assert!(last >= Duration::from_millis(750) && last <= Duration::from_millis(1250));

        for _ in 0..3 {
            assert!(exp.can_retry());
            exp.attempt(&mut rng);
            let rto = exp.rto();
            assert!(rto > last);
            last = rto;
        }

        assert!(!exp.can_retry());
        exp.attempt(&mut rng);
        assert_eq!(exp.rto(), last);
    }

    #[test]
    fn capped_at_max_rto() {
        let mut rng = SeededRng::new(Some(1));
        let mut exp = ExponentialBackoff::new(
            Duration::from_secs(1),
            Duration::from_secs(3),
            10,
            &mut rng,
        );

        for _ in 0..10 {
            exp.attempt(&mut rng);
        }

        assert!(exp.rto() <= Duration::from_millis(3250));
        assert!(exp.rto() >= Duration::from_millis(2750));
    }

    #[test]
    fn reset_restores_start() {
        let mut rng = SeededRng::new(Some(3));
        let mut exp = ExponentialBackoff::new(
            Duration::from_millis(200),
            Duration::from_secs(60),
            2,
            &mut rng,
        );
        exp.attempt(&mut rng);
        exp.attempt(&mut rng);
        assert!(!exp.can_retry());

        exp.reset(&mut rng);
        assert!(exp.can_retry());
        assert!(exp.rto() <= Duration::from_millis(450));
    }
}
