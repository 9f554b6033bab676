use instant::{Duration, Instant};

/// Frame clock driving the mixer.
///
/// The first call to [`Clock::delta`] starts the clock and returns zero, so
/// the time spent loading the model is not fed into the first animation step.
#[derive(Debug, Default)]
pub struct Clock {
    last: Option<Instant>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delta(&mut self) -> Duration {
        self.delta_at(Instant::now())
    }

    pub(crate) fn delta_at(&mut self, now: Instant) -> Duration {
        let dt = match self.last {
            Some(last) if now > last => now - last,
            _ => Duration::ZERO,
        };
        self.last = Some(now);
        dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_delta_is_zero_then_measures_gaps() {
        let mut clock = Clock::new();
        let start = Instant::now();
        assert_eq!(clock.delta_at(start), Duration::ZERO);
        assert_eq!(
            clock.delta_at(start + Duration::from_millis(16)),
            Duration::from_millis(16)
        );
        assert_eq!(
            clock.delta_at(start + Duration::from_millis(50)),
            Duration::from_millis(34)
        );
    }

    #[test]
    fn time_going_backwards_yields_zero() {
        let mut clock = Clock::new();
        let start = Instant::now() + Duration::from_secs(1);
        clock.delta_at(start);
        assert_eq!(clock.delta_at(start - Duration::from_millis(5)), Duration::ZERO);
    }
}
