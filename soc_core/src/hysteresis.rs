//! Hysteresis state between the dynamic OCV and the static table OCV.
//!
//! The hysteresis voltage `dv_hys` charges a capacitor through the
//! chemistry's nonlinear resistance surface. `calculate_hys` picks the drive
//! for this tick, `update` integrates it.

use soc_traits::Chemistry;

use crate::config::RetainedCfg;

/// Resistance floor keeping `ioc = dv / res` finite, Ω.
const RES_FLOOR: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct Hysteresis {
    dv_hys: f64,
    dv_dot: f64,
    ioc: f64,
    res: f64,
    cap: f64,
    tau_hys: f64,
    soc: f64,
    disabled: bool,
}

impl Default for Hysteresis {
    fn default() -> Self {
        Self {
            dv_hys: 0.0,
            dv_dot: 0.0,
            ioc: 0.0,
            res: 0.0,
            cap: 0.0,
            tau_hys: 0.0,
            soc: 1.0,
            disabled: false,
        }
    }
}

impl Hysteresis {
    /// Overwrite the stored hysteresis voltage.
    pub fn seed(&mut self, dv_hys: f64) {
        self.dv_hys = dv_hys;
        self.dv_dot = 0.0;
    }

    /// Direction and magnitude of the hysteresis drive for current `ib`.
    ///
    /// Charging (`ib >= 0`) and discharging use separate capacitance and
    /// resistance scalars. Returns `dv_dot`, V/s.
    pub fn calculate_hys<C: Chemistry + ?Sized>(
        &mut self,
        chem: &C,
        ib: f64,
        soc: f64,
        rp: &RetainedCfg,
    ) -> f64 {
        self.soc = soc;
        self.disabled = rp.hys_scale <= 0.0;
        if self.disabled {
            self.res = 0.0;
            self.ioc = ib;
            self.dv_dot = 0.0;
            return 0.0;
        }
        let hp = chem.params().hys;
        let (s_cap, s_res) = if ib >= 0.0 {
            (hp.s_cap_chg * rp.s_cap_chg, hp.s_hys_chg * rp.s_hys_chg)
        } else {
            (hp.s_cap_dis * rp.s_cap_dis, hp.s_hys_dis * rp.s_hys_dis)
        };
        self.res = (chem.hys_resistance(self.dv_hys, soc) * s_res).max(RES_FLOOR);
        self.cap = (hp.cap * s_cap).max(RES_FLOOR);
        self.ioc = self.dv_hys / self.res;
        self.dv_dot = (ib - self.ioc) / self.cap;
        self.dv_dot
    }

    /// Integrate one tick and return `(dv_hys * hys_scale, tau_hys)`.
    ///
    /// `init_high` / `init_low` pin the state at zero; `e_wrap` trims the
    /// drive by `wrap_trim_gain`.
    pub fn update<C: Chemistry + ?Sized>(
        &mut self,
        chem: &C,
        dt: f64,
        init_high: bool,
        init_low: bool,
        e_wrap: f64,
        rp: &RetainedCfg,
    ) -> (f64, f64) {
        if self.disabled {
            self.tau_hys = 0.0;
            return (0.0, 0.0);
        }
        if init_high || init_low {
            self.dv_hys = 0.0;
            self.dv_dot = 0.0;
        } else {
            self.dv_dot -= rp.wrap_trim_gain * e_wrap;
            let (dv_min, dv_max) = chem.hys_bounds(self.soc);
            self.dv_hys = (self.dv_hys + self.dv_dot * dt).clamp(dv_min, dv_max);
        }
        self.tau_hys = self.res * self.cap;
        (self.dv_hys * rp.hys_scale, self.tau_hys)
    }

    #[inline]
    pub fn dv_hys(&self) -> f64 {
        self.dv_hys
    }
    #[inline]
    pub fn dv_dot(&self) -> f64 {
        self.dv_dot
    }
    /// Current through the hysteresis resistance, A.
    #[inline]
    pub fn ioc(&self) -> f64 {
        self.ioc
    }
    #[inline]
    pub fn res(&self) -> f64 {
        self.res
    }
    #[inline]
    pub fn cap(&self) -> f64 {
        self.cap
    }
    #[inline]
    pub fn tau_hys(&self) -> f64 {
        self.tau_hys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soc_config::builtin;
    use soc_traits::ChemistryKind;

    fn run(h: &mut Hysteresis, ib: f64, secs: usize, rp: &RetainedCfg) -> f64 {
        let chem = builtin(ChemistryKind::BattleBorn);
        let mut dv = 0.0;
        for _ in 0..secs {
            h.calculate_hys(&chem, ib, 0.5, rp);
            dv = h.update(&chem, 1.0, false, false, 0.0, rp).0;
        }
        dv
    }

    #[test]
    fn charging_builds_positive_and_discharging_negative() {
        let rp = RetainedCfg::default();
        let mut h = Hysteresis::default();
        assert!(run(&mut h, 20.0, 600, &rp) > 0.0);
        let mut h = Hysteresis::default();
        assert!(run(&mut h, -20.0, 600, &rp) < 0.0);
    }

    #[test]
    fn stays_within_chemistry_bounds() {
        let rp = RetainedCfg::default();
        let chem = builtin(ChemistryKind::BattleBorn);
        let (lo, hi) = chem.hys_bounds(0.5);
        let mut h = Hysteresis::default();
        let dv = run(&mut h, 1000.0, 3600, &rp);
        assert!(dv <= hi + 1e-12);
        let dv = run(&mut h, -1000.0, 3600, &rp);
        assert!(dv >= lo - 1e-12);
    }

    #[test]
    fn disabled_outputs_zero() {
        let rp = RetainedCfg {
            hys_scale: 0.0,
            ..RetainedCfg::default()
        };
        let mut h = Hysteresis::default();
        assert_eq!(run(&mut h, 50.0, 100, &rp), 0.0);
        assert_eq!(h.dv_dot(), 0.0);
    }

    #[test]
    fn init_flags_pin_state_at_zero() {
        let rp = RetainedCfg::default();
        let chem = builtin(ChemistryKind::BattleBorn);
        let mut h = Hysteresis::default();
        run(&mut h, 20.0, 600, &rp);
        h.calculate_hys(&chem, 20.0, 0.5, &rp);
        let (dv, tau) = h.update(&chem, 1.0, true, false, 0.0, &rp);
        assert_eq!(dv, 0.0);
        assert!(tau > 0.0);
    }

    #[test]
    fn time_constant_is_res_times_cap() {
        let rp = RetainedCfg::default();
        let chem = builtin(ChemistryKind::BattleBorn);
        let mut h = Hysteresis::default();
        h.calculate_hys(&chem, 0.0, 0.5, &rp);
        let (_, tau) = h.update(&chem, 0.1, false, false, 0.0, &rp);
        assert!((tau - h.res() * h.cap()).abs() < 1e-9);
        assert!((h.res() - chem.hys_resistance(0.0, 0.5)).abs() < 1e-12);
    }
}
