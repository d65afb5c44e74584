//! Scalar extended Kalman filter over state of charge.
//!
//! Process model: `x' = Fx·x + Bu·u` with `Fx = 1 - dt/τ_sd` and
//! `Bu = dt/τ_sd · r_sd`. The measurement is the static OCV and the
//! measurement function is the chemistry's OCV table at the clamped state;
//! its slope is the Jacobian.

use soc_traits::Chemistry;

/// Soc step for the finite-difference OCV slope.
pub const DSOC: f64 = 0.01;

/// Table OCV at `soc` and its slope `dV/dsoc`.
///
/// `soc` is clamped to `[0, 1]`. The difference is taken on the interior
/// side so the slope stays one-sided at either edge.
pub fn voc_soc_slope<C: Chemistry + ?Sized>(chem: &C, soc: f64, temp_c: f64) -> (f64, f64) {
    let s = soc.clamp(0.0, 1.0);
    let voc = chem.voc_soc(s, temp_c);
    let slope = if s > 0.5 {
        (voc - chem.voc_soc(s - DSOC, temp_c)) / DSOC
    } else {
        (chem.voc_soc(s + DSOC, temp_c) - voc) / DSOC
    };
    (voc, slope)
}

// ── Noise scheduling ─────────────────────────────────────────────────────────

/// Operating point handed to a [`NoiseSchedule`] once per EKF frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseContext {
    pub ib: f64,
    pub soc: f64,
    pub temp_c: f64,
    pub dt_eframe: f64,
}

/// Supplies the process and measurement variances for the next frame.
pub trait NoiseSchedule: Send {
    /// Returns `(q, r)`.
    fn noise(&self, ctx: &NoiseContext) -> (f64, f64);
}

/// Constant `(q, r)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedNoise {
    pub q: f64,
    pub r: f64,
}

impl NoiseSchedule for FixedNoise {
    fn noise(&self, _ctx: &NoiseContext) -> (f64, f64) {
        (self.q, self.r)
    }
}

// ── EkfCore ──────────────────────────────────────────────────────────────────

/// One-state EKF with every intermediate kept for diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EkfCore {
    x: f64,
    p: f64,
    q: f64,
    r: f64,
    fx: f64,
    bu: f64,
    h: f64,
    s: f64,
    k: f64,
    hx: f64,
    y: f64,
    z: f64,
    u: f64,
    x_prior: f64,
    p_prior: f64,
    x_post: f64,
    p_post: f64,
}

impl EkfCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite state and variance.
    pub fn init(&mut self, x: f64, p: f64) {
        self.x = x;
        self.p = p;
        self.x_post = x;
        self.p_post = p;
    }

    pub fn set_process(&mut self, fx: f64, bu: f64) {
        self.fx = fx;
        self.bu = bu;
    }

    pub fn set_noise(&mut self, q: f64, r: f64) {
        self.q = q;
        self.r = r;
    }

    /// Time update. `u_old` replaces `u` for a warm start.
    pub fn predict(&mut self, u: f64, u_old: Option<f64>) {
        self.u = u_old.unwrap_or(u);
        self.x = self.fx * self.x + self.bu * self.u;
        self.p = self.fx * self.p * self.fx + self.q;
        self.x_prior = self.x;
        self.p_prior = self.p;
    }

    /// Measurement update.
    ///
    /// The state is clamped to `[x_min, x_max]` before `model` is evaluated;
    /// `model` returns the predicted measurement and its Jacobian there.
    pub fn update<F>(&mut self, z: f64, x_min: f64, x_max: f64, model: F)
    where
        F: FnOnce(f64) -> (f64, f64),
    {
        self.z = z;
        self.x = self.x.clamp(x_min, x_max);
        let (hx, h) = model(self.x);
        self.hx = hx;
        self.h = h;
        self.s = self.h * self.p * self.h + self.r;
        self.k = if self.s > 0.0 {
            self.p * self.h / self.s
        } else {
            0.0
        };
        self.y = self.z - self.hx;
        self.x += self.k * self.y;
        self.p *= 1.0 - self.k * self.h;
        self.x_post = self.x;
        self.p_post = self.p;
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.x
    }
    #[inline]
    pub fn p(&self) -> f64 {
        self.p
    }
    #[inline]
    pub fn q(&self) -> f64 {
        self.q
    }
    #[inline]
    pub fn r(&self) -> f64 {
        self.r
    }
    #[inline]
    pub fn fx(&self) -> f64 {
        self.fx
    }
    #[inline]
    pub fn bu(&self) -> f64 {
        self.bu
    }
    #[inline]
    pub fn h(&self) -> f64 {
        self.h
    }
    #[inline]
    pub fn s(&self) -> f64 {
        self.s
    }
    #[inline]
    pub fn k(&self) -> f64 {
        self.k
    }
    #[inline]
    pub fn hx(&self) -> f64 {
        self.hx
    }
    /// Innovation `z - hx` from the last update.
    #[inline]
    pub fn y(&self) -> f64 {
        self.y
    }
    #[inline]
    pub fn z(&self) -> f64 {
        self.z
    }
    #[inline]
    pub fn u(&self) -> f64 {
        self.u
    }
    #[inline]
    pub fn x_prior(&self) -> f64 {
        self.x_prior
    }
    #[inline]
    pub fn p_prior(&self) -> f64 {
        self.p_prior
    }
    #[inline]
    pub fn x_post(&self) -> f64 {
        self.x_post
    }
    #[inline]
    pub fn p_post(&self) -> f64 {
        self.p_post
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soc_config::builtin;
    use soc_traits::ChemistryKind;

    #[test]
    fn linear_measurement_pulls_state_toward_truth() {
        let mut ekf = EkfCore::new();
        ekf.init(0.2, 1.0);
        ekf.set_process(1.0, 0.0);
        ekf.set_noise(1e-6, 0.01);
        for _ in 0..50 {
            ekf.predict(0.0, None);
            ekf.update(0.8, 0.0, 1.0, |x| (x, 1.0));
        }
        assert!((ekf.x() - 0.8).abs() < 1e-3);
        assert!(ekf.p() < 1.0);
        assert!(ekf.y().abs() < 1e-2);
    }

    #[test]
    fn predict_applies_input_and_grows_variance() {
        let mut ekf = EkfCore::new();
        ekf.init(0.5, 0.0);
        ekf.set_process(0.5, 2.0);
        ekf.set_noise(0.1, 1.0);
        ekf.predict(1.0, None);
        assert!((ekf.x_prior() - 2.25).abs() < 1e-12);
        assert!((ekf.p_prior() - 0.1).abs() < 1e-12);
        ekf.predict(1.0, Some(0.0));
        assert!((ekf.x() - 1.125).abs() < 1e-12);
        assert_eq!(ekf.u(), 0.0);
    }

    #[test]
    fn update_clamps_state_before_the_model() {
        let mut ekf = EkfCore::new();
        ekf.init(1.7, 0.0);
        ekf.set_noise(0.0, 1.0);
        let mut seen = f64::NAN;
        ekf.update(0.0, 0.0, 1.0, |x| {
            seen = x;
            (x, 1.0)
        });
        assert_eq!(seen, 1.0);
        // zero variance: gain is zero, state stays at the clamp
        assert_eq!(ekf.k(), 0.0);
        assert_eq!(ekf.x(), 1.0);
    }

    #[test]
    fn slope_is_one_sided_at_edges() {
        let chem = builtin(ChemistryKind::BattleBorn);
        let (v0, s0) = voc_soc_slope(&chem, -0.3, 25.0);
        assert_eq!(v0, chem.voc_soc(0.0, 25.0));
        assert!((s0 - (chem.voc_soc(0.01, 25.0) - v0) / DSOC).abs() < 1e-9);
        let (v1, s1) = voc_soc_slope(&chem, 1.2, 25.0);
        assert_eq!(v1, chem.voc_soc(1.0, 25.0));
        assert!(s1 > 0.0);
    }

    #[test]
    fn fixed_noise_ignores_context() {
        let n = FixedNoise { q: 1e-6, r: 0.25 };
        let ctx = NoiseContext {
            ib: -30.0,
            soc: 0.4,
            temp_c: 5.0,
            dt_eframe: 2.0,
        };
        assert_eq!(n.noise(&ctx), (1e-6, 0.25));
    }
}
