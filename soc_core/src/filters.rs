//! Discrete filter primitives shared by the monitor and the simulator.
//!
//! Every filter takes the tick's `dt` explicitly and has a `reset` flag that
//! re-seeds its state from the current input, so a cold start never carries
//! a transient from the zero state.

// ── LagExp ───────────────────────────────────────────────────────────────────

/// First-order lag with exact exponential discretization and output clamp.
#[derive(Debug, Clone, PartialEq)]
pub struct LagExp {
    tau: f64,
    min: f64,
    max: f64,
    state: f64,
    rate: f64,
}

impl LagExp {
    pub fn new(tau: f64, min: f64, max: f64) -> Self {
        Self {
            tau,
            min,
            max,
            state: 0.0,
            rate: 0.0,
        }
    }

    /// Lag without an output clamp.
    pub fn unbounded(tau: f64) -> Self {
        Self::new(tau, f64::NEG_INFINITY, f64::INFINITY)
    }

    pub fn set_tau(&mut self, tau: f64) {
        self.tau = tau;
    }

    pub fn calculate(&mut self, input: f64, reset: bool, dt: f64) -> f64 {
        if reset {
            self.state = input.clamp(self.min, self.max);
            self.rate = 0.0;
            return self.state;
        }
        let alpha = if self.tau > 0.0 {
            1.0 - (-dt / self.tau).exp()
        } else {
            1.0
        };
        let prev = self.state;
        self.state = (prev + alpha * (input - prev)).clamp(self.min, self.max);
        self.rate = if dt > 0.0 {
            (self.state - prev) / dt
        } else {
            0.0
        };
        self.state
    }

    #[inline]
    pub fn state(&self) -> f64 {
        self.state
    }

    /// Output slope over the last tick, units/s.
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

// ── RateLimit ────────────────────────────────────────────────────────────────

/// Symmetric slew limiter.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimit {
    rate_max: f64,
    state: f64,
    rate: f64,
}

impl RateLimit {
    pub fn new(rate_max: f64) -> Self {
        Self {
            rate_max: rate_max.abs(),
            state: 0.0,
            rate: 0.0,
        }
    }

    pub fn update(&mut self, input: f64, reset: bool, dt: f64) -> f64 {
        if reset {
            self.state = input;
            self.rate = 0.0;
            return self.state;
        }
        let step = self.rate_max * dt.max(0.0);
        let prev = self.state;
        self.state = prev + (input - prev).clamp(-step, step);
        self.rate = if dt > 0.0 {
            (self.state - prev) / dt
        } else {
            0.0
        };
        self.state
    }

    #[inline]
    pub fn state(&self) -> f64 {
        self.state
    }

    /// Achieved slope over the last tick, units/s.
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

// ── SlidingDeadband ──────────────────────────────────────────────────────────

/// Output follows the input only once it leaves a ±`hdb` window around the
/// last output, then trails it by `hdb`.
#[derive(Debug, Clone, PartialEq)]
pub struct SlidingDeadband {
    hdb: f64,
    z: f64,
}

impl SlidingDeadband {
    pub fn new(hdb: f64) -> Self {
        Self {
            hdb: hdb.abs(),
            z: 0.0,
        }
    }

    pub fn update(&mut self, input: f64, reset: bool) -> f64 {
        if reset {
            self.z = input;
        } else if input > self.z + self.hdb {
            self.z = input - self.hdb;
        } else if input < self.z - self.hdb {
            self.z = input + self.hdb;
        }
        self.z
    }

    #[inline]
    pub fn state(&self) -> f64 {
        self.z
    }
}

// ── General2Pole ─────────────────────────────────────────────────────────────

/// Second-order low-pass, `x'' = wn²(u - x) - 2ζ·wn·x'`, semi-implicit Euler.
#[derive(Debug, Clone, PartialEq)]
pub struct General2Pole {
    wn: f64,
    zeta: f64,
    min: f64,
    max: f64,
    x: f64,
    x_dot: f64,
}

impl General2Pole {
    // largest wn·h taken in one integration step
    const MAX_WN_STEP: f64 = 0.25;

    pub fn new(wn: f64, zeta: f64, min: f64, max: f64) -> Self {
        Self {
            wn,
            zeta,
            min,
            max,
            x: 0.0,
            x_dot: 0.0,
        }
    }

    pub fn calculate(&mut self, input: f64, reset: bool, dt: f64) -> f64 {
        if reset {
            self.x = input.clamp(self.min, self.max);
            self.x_dot = 0.0;
            return self.x;
        }
        if !(dt > 0.0) {
            return self.x;
        }
        let steps = (dt * self.wn / Self::MAX_WN_STEP).ceil().clamp(1.0, 1000.0);
        let h = dt / steps;
        let wn2 = self.wn * self.wn;
        let mut remaining = steps;
        while remaining > 0.0 {
            let x_ddot = wn2 * (input - self.x) - 2.0 * self.zeta * self.wn * self.x_dot;
            self.x_dot += x_ddot * h;
            self.x += self.x_dot * h;
            remaining -= 1.0;
        }
        if self.x > self.max || self.x < self.min {
            self.x = self.x.clamp(self.min, self.max);
            self.x_dot = 0.0;
        }
        self.x
    }

    #[inline]
    pub fn state(&self) -> f64 {
        self.x
    }

    #[inline]
    pub fn state_dot(&self) -> f64 {
        self.x_dot
    }
}

// ── Debounce ─────────────────────────────────────────────────────────────────

/// Boolean latch with separate set and clear persistence times.
///
/// The output only changes once the input has disagreed with it for
/// `t_true` (rising) or `t_false` (falling) seconds without interruption.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Debounce {
    output: bool,
    timer: f64,
}

impl Debounce {
    pub fn new(initial: bool) -> Self {
        Self {
            output: initial,
            timer: 0.0,
        }
    }

    pub fn calculate(
        &mut self,
        input: bool,
        t_true: f64,
        t_false: f64,
        dt: f64,
        reset: bool,
    ) -> bool {
        if reset {
            self.output = input;
            self.timer = 0.0;
            return self.output;
        }
        if input == self.output {
            self.timer = 0.0;
            return self.output;
        }
        self.timer += dt.max(0.0);
        let needed = if input { t_true } else { t_false };
        if self.timer >= needed {
            self.output = input;
            self.timer = 0.0;
        }
        self.output
    }

    #[inline]
    pub fn output(&self) -> bool {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn lag_reaches_63_percent_after_one_tau() {
        let mut f = LagExp::unbounded(10.0);
        f.calculate(0.0, true, 0.1);
        let mut y = 0.0;
        for _ in 0..100 {
            y = f.calculate(1.0, false, 0.1);
        }
        assert!((y - (1.0 - (-1.0f64).exp())).abs() < 1e-9);
    }

    #[test]
    fn lag_clamps_and_reseeds() {
        let mut f = LagExp::new(1.0, -0.5, 0.5);
        assert_eq!(f.calculate(3.0, true, 0.1), 0.5);
        for _ in 0..50 {
            f.calculate(-3.0, false, 0.1);
        }
        assert_eq!(f.state(), -0.5);
        assert_eq!(f.calculate(0.2, true, 0.1), 0.2);
        assert_eq!(f.rate(), 0.0);
    }

    #[rstest]
    #[case(0.1, 0.017)]
    #[case(1.0, 0.017)]
    #[case(5.0, 0.1)]
    fn rate_limit_bounds_each_step(#[case] dt: f64, #[case] rate: f64) {
        let mut r = RateLimit::new(rate);
        r.update(20.0, true, dt);
        let mut prev = r.state();
        for _ in 0..20 {
            let y = r.update(40.0, false, dt);
            assert!((y - prev) <= rate * dt + 1e-12);
            prev = y;
        }
        assert!(prev < 40.0);
    }

    #[test]
    fn rate_limit_passes_small_steps() {
        let mut r = RateLimit::new(1.0);
        r.update(0.0, true, 0.1);
        assert!((r.update(0.05, false, 0.1) - 0.05).abs() < 1e-12);
        assert!((r.rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn deadband_holds_inside_window_and_slides_outside() {
        let mut d = SlidingDeadband::new(0.1);
        assert_eq!(d.update(1.0, true), 1.0);
        assert_eq!(d.update(1.05, false), 1.0);
        assert_eq!(d.update(0.95, false), 1.0);
        assert!((d.update(1.5, false) - 1.4).abs() < 1e-12);
        assert!((d.update(0.0, false) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn two_pole_settles_on_step() {
        let mut f = General2Pole::new(0.1, 0.9, -10.0, 10.0);
        f.calculate(0.0, true, 2.0);
        for _ in 0..200 {
            f.calculate(1.0, false, 2.0);
        }
        assert!((f.state() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn two_pole_respects_clamp() {
        let mut f = General2Pole::new(1.0, 0.2, -0.5, 0.5);
        f.calculate(0.0, true, 0.1);
        for _ in 0..500 {
            let y = f.calculate(5.0, false, 0.1);
            assert!(y <= 0.5);
        }
    }

    #[test]
    fn debounce_uses_asymmetric_times() {
        let mut d = Debounce::new(false);
        // 2 s to set at dt = 0.5 → fourth tick
        for _ in 0..3 {
            assert!(!d.calculate(true, 2.0, 1.0, 0.5, false));
        }
        assert!(d.calculate(true, 2.0, 1.0, 0.5, false));
        // 1 s to clear
        assert!(d.calculate(false, 2.0, 1.0, 0.5, false));
        assert!(!d.calculate(false, 2.0, 1.0, 0.5, false));
    }

    #[test]
    fn debounce_interruption_restarts_timer() {
        let mut d = Debounce::new(false);
        d.calculate(true, 1.0, 1.0, 0.5, false);
        d.calculate(false, 1.0, 1.0, 0.5, false);
        assert!(!d.calculate(true, 1.0, 1.0, 0.5, false));
        assert!(d.calculate(true, 1.0, 1.0, 0.5, false));
    }

    #[test]
    fn debounce_reset_follows_input() {
        let mut d = Debounce::new(false);
        assert!(d.calculate(true, 100.0, 100.0, 0.1, true));
        assert!(!d.calculate(false, 100.0, 100.0, 0.1, true));
    }
}
