//! Simulator: the forward battery model that produces terminal voltage from
//! commanded current.
//!
//! The simulator mirrors the monitor's physics in the opposite direction:
//! static OCV plus hysteresis plus the Randles drop gives terminal voltage.
//! It also models charger cutback near full, applying the limited current
//! one tick later.

use soc_traits::{Chemistry, ChemistryKind};
use tracing::{debug, info};

use crate::config::{BatteryConsts, RetainedCfg};
use crate::coulombs::BatteryState;
use crate::dynamics::{ChargeTransfer, dynamic_drop};
use crate::ekf::voc_soc_slope;
use crate::error::BuildError;
use crate::filters::{LagExp, RateLimit};
use crate::hysteresis::Hysteresis;
use crate::model::{BatteryModel, Estimator};

/// Per-tick inputs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimInput {
    pub temp_c: f64,
    /// True state of charge driving the OCV lookup.
    pub soc: f64,
    /// Commanded current, A.
    pub ib_cmd: f64,
    pub dt: f64,
    /// Capacity override for the empty-battery guard, C.
    pub q_capacity: Option<f64>,
    /// Charger presents `vb_dc_dc` while the BMS is off.
    pub dc_dc_on: bool,
    pub reset: bool,
}

/// Values applied only on a `reset` tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimWarmStart {
    pub bms_off: Option<bool>,
    pub ib_fut: Option<f64>,
    pub dv_hys: Option<f64>,
    pub model_saturated: Option<bool>,
}

/// Charger cutback regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutbackState {
    /// Commanded current passes unchanged.
    #[default]
    Free,
    /// Current is limited by the cutback curve.
    Limited,
    /// Limited to below `ib_sat` with OCV above `vsat`.
    Saturated,
}

/// Per-tick diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimDiag {
    pub temp_c: f64,
    pub temp_lim: f64,
    pub vsat: f64,
    pub ib_in: f64,
    /// Plant current this tick (last tick's `ib_fut`), A.
    pub ib: f64,
    /// Current that will be applied next tick, A.
    pub ib_fut: f64,
    pub ib_charge: f64,
    pub ib_lag: f64,
    pub soc_lim: f64,
    pub voc_stat: f64,
    pub dv_dsoc: f64,
    pub voc: f64,
    pub dv_dyn: f64,
    pub dv_hys: f64,
    pub tau_hys: f64,
    pub vb: f64,
    pub bms_off: bool,
    pub bms_charging: bool,
    pub voltage_low: bool,
    pub sat_ib_max: f64,
    pub cutback: CutbackState,
    pub model_saturated: bool,
}

/// Complete observable state, comparable across runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SimSnapshot {
    pub diag: SimDiag,
    pub battery: BatteryState,
    pub hys: Hysteresis,
    pub charge_transfer: f64,
}

#[derive(Debug, Clone)]
pub struct Simulator {
    consts: BatteryConsts,
    battery: BatteryState,
    charge_transfer: ChargeTransfer,
    hys: Hysteresis,
    t_rlim: RateLimit,
    ib_lag: LagExp,
    chem: ChemistryKind,
    diag: SimDiag,
}

impl Simulator {
    pub fn new<C: Chemistry + ?Sized>(chem: &C, consts: BatteryConsts) -> Result<Self, BuildError> {
        consts.validate()?;
        let p = chem.params();
        Ok(Self {
            battery: BatteryState::new(chem, consts.s_cap_sim, consts.t_rlim),
            charge_transfer: ChargeTransfer::new(p.tau_ct),
            hys: Hysteresis::default(),
            t_rlim: RateLimit::new(consts.t_rlim),
            ib_lag: LagExp::unbounded(p.ib_lag_tau),
            chem: chem.kind(),
            diag: SimDiag::default(),
            consts,
        })
    }

    fn select_chemistry<C: Chemistry + ?Sized>(&mut self, chem: &C) {
        let kind = chem.kind();
        if kind != self.chem {
            info!(from = self.chem.name(), to = kind.name(), "simulator chemistry selected");
            self.chem = kind;
            self.ib_lag.set_tau(chem.params().ib_lag_tau);
        }
    }

    /// Set the simulator's Coulomb counter to `soc`.
    pub fn init_soc<C: Chemistry + ?Sized>(&mut self, chem: &C, soc: f64, temp_c: f64) {
        self.battery.apply_soc(chem, soc, temp_c);
    }

    #[inline]
    pub fn diag(&self) -> &SimDiag {
        &self.diag
    }
    #[inline]
    pub fn soc(&self) -> f64 {
        self.battery.soc()
    }
    #[inline]
    pub fn ib_fut(&self) -> f64 {
        self.diag.ib_fut
    }
    #[inline]
    pub fn model_saturated(&self) -> bool {
        self.diag.model_saturated
    }
    #[inline]
    pub fn cutback(&self) -> CutbackState {
        self.diag.cutback
    }

    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            diag: self.diag,
            battery: self.battery.clone(),
            hys: self.hys.clone(),
            charge_transfer: self.charge_transfer.state(),
        }
    }
}

impl BatteryModel for Simulator {
    type Input = SimInput;
    type WarmStart = SimWarmStart;

    /// Returns the simulated terminal voltage, V.
    fn calculate<C: Chemistry + ?Sized>(
        &mut self,
        chem: &C,
        input: &SimInput,
        warm: &SimWarmStart,
        rp: &RetainedCfg,
    ) -> f64 {
        let p = chem.params();
        let reset = input.reset;
        let dt = input.dt;
        self.select_chemistry(chem);

        self.diag.temp_c = input.temp_c;
        self.diag.temp_lim = self.t_rlim.update(input.temp_c, reset, dt);
        self.diag.vsat = p.vsat(input.temp_c);
        let ib_in = input.ib_cmd.clamp(-self.consts.i_max, self.consts.i_max);
        self.diag.ib_in = ib_in;

        if reset {
            self.diag.ib_fut = warm.ib_fut.unwrap_or(ib_in);
            self.diag.bms_off = warm.bms_off.unwrap_or(false);
            self.diag.model_saturated = warm.model_saturated.unwrap_or(false);
            self.diag.cutback = CutbackState::Free;
            self.hys.seed(warm.dv_hys.unwrap_or(0.0));
        }
        let mut ib = self.diag.ib_fut;

        // ── Static OCV, linear below 0 and above 1 ───────────────────────────
        let soc_lim = input.soc.clamp(0.0, 1.0);
        let (voc_tab, dv_dsoc) = voc_soc_slope(chem, soc_lim, input.temp_c);
        self.diag.soc_lim = soc_lim;
        self.diag.dv_dsoc = dv_dsoc;
        self.diag.voc_stat = voc_tab + (input.soc - soc_lim) * dv_dsoc;

        // ── BMS ──────────────────────────────────────────────────────────────
        self.diag.bms_charging = ib_in > self.consts.ib_min_up;
        let threshold = if self.diag.bms_off {
            p.vb_rising_sim
        } else {
            p.vb_down_sim
        };
        self.diag.voltage_low = self.diag.voc_stat < threshold;
        let bms_off = match (reset, warm.bms_off) {
            (true, Some(forced)) => forced,
            _ => input.temp_c <= p.low_t || (self.diag.voltage_low && !rp.tweak_test),
        };
        if bms_off != self.diag.bms_off && !reset {
            debug!(bms_off, voc_stat = self.diag.voc_stat, "simulator BMS transition");
        }
        self.diag.bms_off = bms_off;
        self.diag.ib_charge = if bms_off && !self.diag.bms_charging {
            0.0
        } else {
            ib
        };
        if bms_off && self.diag.voltage_low {
            ib = 0.0;
        }
        self.diag.ib = ib;
        self.diag.ib_lag = self.ib_lag.calculate(ib, reset, dt);

        // ── Hysteresis ───────────────────────────────────────────────────────
        let dv_hys = self.look_hys(chem, dt, reset, rp);
        self.diag.voc = self.diag.voc_stat + dv_hys;

        // ── Randles dynamics ─────────────────────────────────────────────────
        let lagged = self
            .charge_transfer
            .calculate(ib, reset, dt, p.tau_ct * rp.stauct);
        self.diag.dv_dyn = dynamic_drop(lagged, ib, p.r_ct * rp.sresct, p.r0 * rp.sres0);
        self.diag.vb = if bms_off {
            if input.dc_dc_on {
                self.consts.vb_dc_dc
            } else {
                self.diag.voc
            }
        } else {
            self.diag.voc + self.diag.dv_dyn
        };

        // ── Charger cutback ──────────────────────────────────────────────────
        self.diag.sat_ib_max = if rp.tweak_test || !rp.modeling {
            ib_in
        } else {
            let gain = self.consts.sat_cutback_gain * rp.cutback_gain_scalar;
            (self.consts.sat_ib_null + (1.0 - input.soc) * gain).max(self.consts.sat_ib_null)
        };
        let mut ib_fut = ib_in.min(self.diag.sat_ib_max);
        let q_capacity = input.q_capacity.unwrap_or_else(|| self.battery.q_capacity());
        if q_capacity + self.battery.delta_q() <= 0.0 && ib_fut < 0.0 {
            ib_fut = 0.0;
        }
        self.diag.ib_fut = ib_fut;
        let cutback = if self.diag.sat_ib_max >= ib_in {
            CutbackState::Free
        } else if self.diag.voc_stat > self.diag.vsat && ib_fut < self.consts.ib_sat {
            CutbackState::Saturated
        } else {
            CutbackState::Limited
        };
        if cutback != self.diag.cutback && !reset {
            debug!(?cutback, ib_fut, soc = input.soc, "simulator cutback");
        }
        self.diag.cutback = cutback;
        self.diag.model_saturated = cutback == CutbackState::Saturated;

        self.diag.vb
    }

    fn look_hys<C: Chemistry + ?Sized>(
        &mut self,
        chem: &C,
        dt: f64,
        reset: bool,
        rp: &RetainedCfg,
    ) -> f64 {
        let soc = self.battery.soc();
        let thr = self.consts.hys_ib_thr;
        let init_low = self.diag.bms_off
            || (soc < self.battery.soc_min() + self.consts.hys_soc_min_marg
                && self.diag.ib_lag < thr);
        let init_high = self.diag.model_saturated && self.diag.ib_lag > -thr;
        self.hys.calculate_hys(chem, self.diag.ib, soc, rp);
        let dt_hys = if reset { 0.0 } else { dt };
        let (dv_hys, tau_hys) = self.hys.update(chem, dt_hys, init_high, init_low, 0.0, rp);
        self.diag.dv_hys = dv_hys;
        self.diag.tau_hys = tau_hys;
        dv_hys
    }

    fn battery(&self) -> &BatteryState {
        &self.battery
    }

    fn battery_mut(&mut self) -> &mut BatteryState {
        &mut self.battery
    }
}

impl Estimator for Simulator {
    fn soc_estimate(&self) -> f64 {
        self.battery.soc()
    }

    fn voltage_estimate(&self) -> f64 {
        self.diag.vb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soc_config::builtin;

    fn input(soc: f64, ib_cmd: f64, reset: bool) -> SimInput {
        SimInput {
            temp_c: 25.0,
            soc,
            ib_cmd,
            dt: 0.1,
            reset,
            ..SimInput::default()
        }
    }

    #[test]
    fn applies_commanded_current_one_tick_late() {
        let chem = builtin(ChemistryKind::BattleBorn);
        let rp = RetainedCfg::default();
        let mut sim = Simulator::new(&chem, BatteryConsts::default()).unwrap();
        sim.calculate(&chem, &input(0.5, 0.0, true), &SimWarmStart::default(), &rp);
        sim.calculate(&chem, &input(0.5, 20.0, false), &SimWarmStart::default(), &rp);
        assert_eq!(sim.diag().ib, 0.0);
        sim.calculate(&chem, &input(0.5, 20.0, false), &SimWarmStart::default(), &rp);
        assert_eq!(sim.diag().ib, 20.0);
    }

    #[test]
    fn static_ocv_extends_linearly_past_full() {
        let chem = builtin(ChemistryKind::BattleBorn);
        let rp = RetainedCfg {
            hys_scale: 0.0,
            ..RetainedCfg::default()
        };
        let mut sim = Simulator::new(&chem, BatteryConsts::default()).unwrap();
        sim.calculate(&chem, &input(1.02, 0.0, true), &SimWarmStart::default(), &rp);
        let (v1, slope) = voc_soc_slope(&chem, 1.0, 25.0);
        assert!((sim.diag().voc_stat - (v1 + 0.02 * slope)).abs() < 1e-9);
    }

    #[test]
    fn dc_dc_holds_voltage_while_bms_off() {
        let chem = builtin(ChemistryKind::BattleBorn);
        let rp = RetainedCfg::default();
        let mut sim = Simulator::new(&chem, BatteryConsts::default()).unwrap();
        let warm = SimWarmStart {
            bms_off: Some(true),
            ..SimWarmStart::default()
        };
        let mut i = input(0.0, 0.0, true);
        i.dc_dc_on = true;
        let vb = sim.calculate(&chem, &i, &warm, &rp);
        assert!(sim.diag().bms_off);
        assert_eq!(vb, 13.5);
    }

    #[test]
    fn cutback_limits_near_full() {
        let chem = builtin(ChemistryKind::BattleBorn);
        let rp = RetainedCfg::default();
        let mut sim = Simulator::new(&chem, BatteryConsts::default()).unwrap();
        sim.calculate(&chem, &input(0.99, 50.0, true), &SimWarmStart::default(), &rp);
        assert!((sim.ib_fut() - 10.0).abs() < 1e-9);
        assert_eq!(sim.cutback(), CutbackState::Limited);
        sim.calculate(&chem, &input(0.5, 50.0, false), &SimWarmStart::default(), &rp);
        assert_eq!(sim.ib_fut(), 50.0);
        assert_eq!(sim.cutback(), CutbackState::Free);
    }

    #[test]
    fn cutback_disabled_in_tweak_test() {
        let chem = builtin(ChemistryKind::BattleBorn);
        let rp = RetainedCfg {
            tweak_test: true,
            ..RetainedCfg::default()
        };
        let mut sim = Simulator::new(&chem, BatteryConsts::default()).unwrap();
        sim.calculate(&chem, &input(0.999, 50.0, true), &SimWarmStart::default(), &rp);
        assert_eq!(sim.ib_fut(), 50.0);
        assert_eq!(sim.cutback(), CutbackState::Free);
    }

    #[test]
    fn saturated_at_full_with_cut_current() {
        let chem = builtin(ChemistryKind::BattleBorn);
        let rp = RetainedCfg::default();
        let mut sim = Simulator::new(&chem, BatteryConsts::default()).unwrap();
        sim.calculate(&chem, &input(1.0, 20.0, true), &SimWarmStart::default(), &rp);
        assert_eq!(sim.ib_fut(), 0.0);
        assert_eq!(sim.cutback(), CutbackState::Saturated);
        assert!(sim.model_saturated());
    }
}
