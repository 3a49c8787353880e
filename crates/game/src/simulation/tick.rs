use std::time::Duration;

/// Accumulates frame time and releases it in fixed steps.
pub struct FixedTimestep {
    tick_rate: u32,
    dt: f32,
    accumulator: f32,
}

impl FixedTimestep {
    pub fn new(tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            tick_rate,
            dt: 1.0 / tick_rate as f32,
            accumulator: 0.0,
        }
    }

    /// A timestep that fires once per `interval`, e.g. a broadcast period.
    pub fn from_interval(interval: Duration) -> Self {
        let dt = interval.as_secs_f32().max(0.001);
        Self {
            tick_rate: (1.0 / dt).round().max(1.0) as u32,
            dt,
            accumulator: 0.0,
        }
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn accumulate(&mut self, delta: f32) {
        self.accumulator += delta.clamp(0.0, 0.25);
    }

    pub fn should_tick(&self) -> bool {
        self.accumulator >= self.dt
    }

    pub fn consume_tick(&mut self) -> bool {
        if self.accumulator >= self.dt {
            self.accumulator -= self.dt;
            true
        } else {
            false
        }
    }

    /// Consumes every elapsed step, returning how many there were.
    pub fn consume_all(&mut self) -> u32 {
        let mut ticks = 0;
        while self.consume_tick() {
            ticks += 1;
        }
        ticks
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_timestep_accumulation() {
        let mut ts = FixedTimestep::new(60);

        ts.accumulate(1.0 / 30.0);
        assert!(ts.should_tick());
        assert!(ts.consume_tick());
        assert!(ts.consume_tick());
        assert!(!ts.consume_tick());
    }

    #[test]
    fn interval_timestep_fires_per_period() {
        let mut ts = FixedTimestep::from_interval(Duration::from_millis(50));
        assert_eq!(ts.tick_rate(), 20);

        ts.accumulate(0.03);
        assert_eq!(ts.consume_all(), 0);
        ts.accumulate(0.03);
        assert_eq!(ts.consume_all(), 1);
        ts.accumulate(0.11);
        assert_eq!(ts.consume_all(), 2);
    }

    #[test]
    fn large_frames_are_clamped() {
        let mut ts = FixedTimestep::new(10);
        ts.accumulate(5.0);
        assert_eq!(ts.consume_all(), 2);
    }
}
