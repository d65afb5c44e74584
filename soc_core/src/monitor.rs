//! Monitor: the estimator that runs against measured voltage and current.
//!
//! Each tick backs the Randles drop and hysteresis out of the terminal
//! voltage to recover a static OCV, feeds that to the EKF on every
//! `eframe_mult`-th tick, and tracks saturation, BMS state and EKF
//! convergence. The Coulomb counter is stepped separately through
//! [`BatteryModel::count_coulombs`] once `calculate` has run.

use soc_traits::{Chemistry, ChemistryKind};
use tracing::{debug, info, trace, warn};

use crate::config::{BatteryConsts, RetainedCfg};
use crate::coulombs::BatteryState;
use crate::dynamics::{ChargeTransfer, dynamic_drop};
use crate::ekf::{EkfCore, FixedNoise, NoiseContext, NoiseSchedule, voc_soc_slope};
use crate::error::BuildError;
use crate::filters::{Debounce, General2Pole, LagExp, RateLimit, SlidingDeadband};
use crate::hysteresis::Hysteresis;
use crate::model::{BatteryModel, Estimator};
use crate::util::{self, TCHARGE_LIMIT_HRS, amp_hours};

/// Per-tick measurements.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MonitorInput {
    pub temp_c: f64,
    /// Terminal voltage, V.
    pub vb: f64,
    /// Battery current, positive charging, A.
    pub ib: f64,
    pub dt: f64,
    pub reset: bool,
    /// Refresh the charge-time estimate this tick.
    pub update_time: bool,
}

/// Values applied only on a `reset` tick, typically restored from retained
/// memory across a reboot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MonitorWarmStart {
    pub bms_off: Option<bool>,
    pub x_ekf: Option<f64>,
    pub u_ekf: Option<f64>,
    pub z_ekf: Option<f64>,
    pub dv_hys: Option<f64>,
}

/// Per-tick diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MonitorDiag {
    pub temp_c: f64,
    /// Slew-limited temperature, °C.
    pub temp_lim: f64,
    /// Rate of `temp_lim`, °C/s.
    pub t_rate: f64,
    pub vsat: f64,
    pub vb: f64,
    /// Current as measured, before clamping and BMS forcing.
    pub ib_in: f64,
    pub ib: f64,
    pub ib_charge: f64,
    pub ib_lag: f64,
    pub voc_soc: f64,
    pub dv_dsoc: f64,
    pub voc: f64,
    pub voc_filt: f64,
    pub voc_stat: f64,
    pub dv_dyn: f64,
    pub dv_hys: f64,
    pub tau_hys: f64,
    pub e_wrap: f64,
    pub e_wrap_filt: f64,
    pub vb_model_rev: f64,
    pub soc_ekf: f64,
    pub q_ekf: f64,
    pub y_filt: f64,
    pub y_filt2: f64,
    pub bms_off: bool,
    pub bms_charging: bool,
    pub voltage_low: bool,
    pub sat: bool,
    pub converged: bool,
    /// Hours to full (positive) or to soc_min (negative).
    pub tcharge: f64,
}

/// Complete observable state, comparable across runs.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSnapshot {
    pub diag: MonitorDiag,
    pub battery: BatteryState,
    pub ekf: EkfCore,
    pub hys: Hysteresis,
    pub charge_transfer: f64,
    pub voc_filt: f64,
    pub wrap_filt: f64,
    pub y_filt2_dot: f64,
    pub eframe: u32,
    pub eframe_mult: u32,
}

pub struct Monitor {
    consts: BatteryConsts,
    battery: BatteryState,
    ekf: EkfCore,
    noise: Box<dyn NoiseSchedule>,
    charge_transfer: ChargeTransfer,
    hys: Hysteresis,
    t_rlim: RateLimit,
    ib_lag: LagExp,
    voc_filt: LagExp,
    wrap_filt: LagExp,
    y_filt: LagExp,
    y_filt2: General2Pole,
    ib_db: SlidingDeadband,
    sat_debounce: Debounce,
    conv_latch: Debounce,
    eframe: u32,
    eframe_mult: u32,
    dt_eframe: f64,
    ib_prev: f64,
    chem: ChemistryKind,
    diag: MonitorDiag,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("chem", &self.chem)
            .field("eframe", &self.eframe)
            .field("diag", &self.diag)
            .finish_non_exhaustive()
    }
}

impl Monitor {
    pub fn new<C: Chemistry + ?Sized>(chem: &C, consts: BatteryConsts) -> Result<Self, BuildError> {
        consts.validate()?;
        let p = chem.params();
        let e = &consts.ekf;
        let noise = FixedNoise { q: e.q, r: e.r };
        let battery = BatteryState::new(chem, consts.s_cap_mon, consts.t_rlim);
        let diag = MonitorDiag {
            soc_ekf: battery.soc(),
            ..MonitorDiag::default()
        };
        Ok(Self {
            battery,
            ekf: EkfCore::new(),
            noise: Box::new(noise),
            charge_transfer: ChargeTransfer::new(p.tau_ct),
            hys: Hysteresis::default(),
            t_rlim: RateLimit::new(consts.t_rlim),
            ib_lag: LagExp::unbounded(p.ib_lag_tau),
            voc_filt: LagExp::unbounded(consts.voc_filt_tau),
            wrap_filt: LagExp::new(
                consts.wrap_filt_tau,
                -consts.wrap_filt_max,
                consts.wrap_filt_max,
            ),
            y_filt: LagExp::new(e.tau_y_filt, -e.y_filt_max, e.y_filt_max),
            y_filt2: General2Pole::new(e.wn_y_filt, e.zeta_y_filt, -e.y_filt_max, e.y_filt_max),
            ib_db: SlidingDeadband::new(consts.tcharge_deadband),
            sat_debounce: Debounce::default(),
            conv_latch: Debounce::default(),
            eframe: 0,
            eframe_mult: e.eframe_mult,
            dt_eframe: consts.nom_dt * f64::from(e.eframe_mult),
            ib_prev: 0.0,
            chem: chem.kind(),
            diag,
            consts,
        })
    }

    /// Replace the fixed EKF noise with a scheduled one.
    #[must_use]
    pub fn with_noise_schedule(mut self, noise: Box<dyn NoiseSchedule>) -> Self {
        self.noise = noise;
        self
    }

    fn select_chemistry<C: Chemistry + ?Sized>(&mut self, chem: &C) {
        let kind = chem.kind();
        if kind != self.chem {
            info!(from = self.chem.name(), to = kind.name(), "monitor chemistry selected");
            self.chem = kind;
            self.ib_lag.set_tau(chem.params().ib_lag_tau);
        }
    }

    /// Overwrite both the Coulomb counter and the EKF with `soc`.
    pub fn init_soc_ekf<C: Chemistry + ?Sized>(&mut self, chem: &C, soc: f64, temp_c: f64) {
        self.battery.apply_soc(chem, soc, temp_c);
        self.ekf.init(soc, self.consts.ekf.p_init);
        self.diag.soc_ekf = soc;
        self.diag.q_ekf = soc * self.battery.q_capacity();
    }

    /// Snap the Coulomb counter to the EKF when the EKF is converged and the
    /// two disagree by more than `regauge_threshold`. Returns whether it did.
    pub fn regauge<C: Chemistry + ?Sized>(&mut self, chem: &C, temp_c: f64) -> bool {
        let err = self.diag.soc_ekf - self.battery.soc();
        if !(self.diag.converged && err.abs() > self.consts.regauge_threshold) {
            return false;
        }
        warn!(
            soc = self.battery.soc(),
            soc_ekf = self.diag.soc_ekf,
            "regauge: counter reset to EKF estimate"
        );
        self.battery.apply_soc(chem, self.diag.soc_ekf, temp_c);
        true
    }

    fn ekf_frame<C: Chemistry + ?Sized>(
        &mut self,
        chem: &C,
        input: &MonitorInput,
        warm: &MonitorWarmStart,
        rp: &RetainedCfg,
    ) {
        let p = chem.params();
        let e = &self.consts.ekf;
        let reset = input.reset;
        self.eframe_mult = util::eframe_mult(e.eframe_mult, e.nom_dt, input.dt);
        self.dt_eframe = input.dt * f64::from(self.eframe_mult);

        let mut u = self.diag.ib_charge;
        if u > 0.0 && !rp.tweak_test {
            u *= p.coul_eff;
        }
        u -= p.dqdt * self.battery.q_capacity() * self.diag.t_rate;

        if reset {
            self.ekf
                .init(warm.x_ekf.unwrap_or_else(|| self.battery.soc()), e.p_init);
        }
        let (q, r) = self.noise.noise(&NoiseContext {
            ib: self.diag.ib,
            soc: self.ekf.x(),
            temp_c: input.temp_c,
            dt_eframe: self.dt_eframe,
        });
        self.ekf.set_noise(q, r);
        self.ekf.set_process(
            1.0 - self.dt_eframe / p.tau_sd,
            self.dt_eframe / p.tau_sd * p.r_sd,
        );
        self.ekf.predict(u, if reset { warm.u_ekf } else { None });
        let z = match (reset, warm.z_ekf) {
            (true, Some(z)) => z,
            _ => self.diag.voc_stat,
        };
        let temp_c = input.temp_c;
        self.ekf
            .update(z, 0.0, 1.0, |x| voc_soc_slope(chem, x, temp_c));

        self.diag.soc_ekf = self.ekf.x();
        self.diag.q_ekf = self.diag.soc_ekf * self.battery.q_capacity();
        let dt_filt = self.dt_eframe.min(e.t_reset);
        self.diag.y_filt = self.y_filt.calculate(self.ekf.y(), reset, dt_filt);
        self.diag.y_filt2 = self.y_filt2.calculate(self.ekf.y(), reset, dt_filt);
        trace!(
            soc_ekf = self.diag.soc_ekf,
            y = self.ekf.y(),
            k = self.ekf.k(),
            p = self.ekf.p(),
            "ekf frame"
        );
    }

    #[inline]
    pub fn diag(&self) -> &MonitorDiag {
        &self.diag
    }
    #[inline]
    pub fn ekf(&self) -> &EkfCore {
        &self.ekf
    }
    #[inline]
    pub fn consts(&self) -> &BatteryConsts {
        &self.consts
    }
    #[inline]
    pub fn soc(&self) -> f64 {
        self.battery.soc()
    }
    #[inline]
    pub fn soc_ekf(&self) -> f64 {
        self.diag.soc_ekf
    }
    #[inline]
    pub fn converged(&self) -> bool {
        self.diag.converged
    }
    /// Hours to full (positive) or to soc_min (negative), ±24 h.
    #[inline]
    pub fn tcharge(&self) -> f64 {
        self.diag.tcharge
    }
    #[inline]
    pub fn eframe(&self) -> u32 {
        self.eframe
    }
    #[inline]
    pub fn eframe_mult(&self) -> u32 {
        self.eframe_mult
    }
    #[inline]
    pub fn dt_eframe(&self) -> f64 {
        self.dt_eframe
    }

    /// Usable charge above soc_min by the EKF estimate, Ah.
    pub fn amp_hrs_remaining_ekf(&self) -> f64 {
        amp_hours((self.diag.soc_ekf - self.battery.soc_min()) * self.battery.q_capacity())
    }

    /// Usable charge above soc_min by the Coulomb counter, Ah.
    pub fn amp_hrs_remaining_soc(&self) -> f64 {
        amp_hours((self.battery.soc() - self.battery.soc_min()) * self.battery.q_capacity())
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            diag: self.diag,
            battery: self.battery.clone(),
            ekf: self.ekf.clone(),
            hys: self.hys.clone(),
            charge_transfer: self.charge_transfer.state(),
            voc_filt: self.voc_filt.state(),
            wrap_filt: self.wrap_filt.state(),
            y_filt2_dot: self.y_filt2.state_dot(),
            eframe: self.eframe,
            eframe_mult: self.eframe_mult,
        }
    }
}

/// Hours to full when charging, hours to `soc_min` (negative) when
/// discharging, saturating at one day either way.
pub fn charge_time(ib: f64, deadband: f64, cap_ah: f64, soc: f64, soc_min: f64) -> f64 {
    if ib > deadband {
        (cap_ah / ib * (1.0 - soc).max(0.0)).min(TCHARGE_LIMIT_HRS)
    } else if ib < -deadband {
        (cap_ah / ib * (soc - soc_min).max(0.0)).max(-TCHARGE_LIMIT_HRS)
    } else if ib >= 0.0 {
        TCHARGE_LIMIT_HRS
    } else {
        -TCHARGE_LIMIT_HRS
    }
}

impl BatteryModel for Monitor {
    type Input = MonitorInput;
    type WarmStart = MonitorWarmStart;

    /// Returns `vb_model_rev`, the terminal voltage the model would produce
    /// at the counted soc.
    fn calculate<C: Chemistry + ?Sized>(
        &mut self,
        chem: &C,
        input: &MonitorInput,
        warm: &MonitorWarmStart,
        rp: &RetainedCfg,
    ) -> f64 {
        let p = chem.params();
        let reset = input.reset;
        let dt = input.dt;
        self.select_chemistry(chem);

        self.diag.temp_c = input.temp_c;
        self.diag.temp_lim = self.t_rlim.update(input.temp_c, reset, dt);
        self.diag.t_rate = self.t_rlim.rate();
        self.diag.vsat = p.vsat(input.temp_c);
        self.diag.vb = input.vb;
        self.diag.ib_in = input.ib;
        let mut ib = input.ib.clamp(-self.consts.i_max, self.consts.i_max);

        if reset {
            self.ib_prev = ib;
            self.diag.voc_stat = input.vb;
            self.diag.bms_off = warm.bms_off.unwrap_or(false);
            self.diag.e_wrap = 0.0;
            self.hys.seed(warm.dv_hys.unwrap_or(0.0));
        }

        let (voc_soc, dv_dsoc) = voc_soc_slope(chem, self.battery.soc(), input.temp_c);
        self.diag.voc_soc = voc_soc;
        self.diag.dv_dsoc = dv_dsoc;

        // ── BMS ──────────────────────────────────────────────────────────────
        self.diag.bms_charging = ib > self.consts.ib_min_up;
        let threshold = if self.diag.bms_off {
            p.vb_rising
        } else {
            p.vb_down
        };
        self.diag.voltage_low = self.diag.voc_stat < threshold;
        let bms_off = match (reset, warm.bms_off) {
            (true, Some(forced)) => forced,
            _ => input.temp_c <= p.low_t || (self.diag.voltage_low && !rp.tweak_test),
        };
        if bms_off != self.diag.bms_off && !reset {
            debug!(bms_off, voc_stat = self.diag.voc_stat, "monitor BMS transition");
        }
        self.diag.bms_off = bms_off;
        self.diag.ib_charge = if bms_off && !self.diag.bms_charging {
            0.0
        } else {
            ib
        };
        let bypass = bms_off && self.diag.voltage_low;
        if bypass {
            ib = 0.0;
        }
        self.diag.ib = ib;

        // ── Randles dynamics ─────────────────────────────────────────────────
        let lagged = self
            .charge_transfer
            .calculate(self.ib_prev, reset, dt, p.tau_ct * rp.stauct);
        self.diag.dv_dyn = dynamic_drop(lagged, self.ib_prev, p.r_ct * rp.sresct, p.r0 * rp.sres0);
        self.diag.voc = input.vb - self.diag.dv_dyn;
        if bypass {
            self.diag.voc = input.vb;
            self.diag.dv_dyn = 0.0;
        }
        self.diag.ib_lag = self.ib_lag.calculate(ib, reset, dt);

        // ── Saturation ───────────────────────────────────────────────────────
        self.diag.voc_filt = self.voc_filt.calculate(self.diag.voc, reset, dt);
        let sat = self.sat_debounce.calculate(
            self.diag.voc_filt >= self.diag.vsat,
            self.consts.t_sat,
            self.consts.t_desat,
            dt,
            reset,
        );
        if sat != self.diag.sat && !reset {
            debug!(sat, voc_filt = self.diag.voc_filt, vsat = self.diag.vsat, "monitor saturation");
        }
        self.diag.sat = sat;

        // ── Hysteresis ───────────────────────────────────────────────────────
        let dv_hys = self.look_hys(chem, dt, reset, rp);
        self.diag.voc_stat = if bypass {
            input.vb
        } else {
            self.diag.voc - dv_hys
        };
        self.diag.e_wrap = voc_soc - self.diag.voc_stat;
        self.diag.e_wrap_filt = self.wrap_filt.calculate(self.diag.e_wrap, reset, dt);
        self.diag.vb_model_rev = voc_soc + self.diag.dv_dyn + dv_hys;

        // ── EKF ──────────────────────────────────────────────────────────────
        if reset || self.eframe >= self.eframe_mult {
            self.eframe = 0;
        }
        if self.eframe == 0 {
            self.ekf_frame(chem, input, warm, rp);
        }
        self.eframe = self.eframe.saturating_add(1);

        let e = &self.consts.ekf;
        let conv = self.diag.y_filt.abs() < e.conv && !reset;
        let converged = self
            .conv_latch
            .calculate(conv, e.t_conv, e.t_reset, dt.min(e.t_reset), reset);
        if converged != self.diag.converged && !reset {
            debug!(converged, y_filt = self.diag.y_filt, "ekf convergence");
        }
        self.diag.converged = converged;

        if input.update_time || reset {
            let ib_db = self.ib_db.update(self.diag.ib_charge, reset);
            self.diag.tcharge = charge_time(
                ib_db,
                self.consts.tcharge_deadband,
                amp_hours(self.battery.q_capacity()),
                self.diag.soc_ekf,
                self.battery.soc_min(),
            );
        }

        self.ib_prev = ib;
        self.diag.vb_model_rev
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
        let init_high = self.diag.sat && self.diag.ib_lag > -thr;
        self.hys.calculate_hys(chem, self.diag.ib, soc, rp);
        let dt_hys = if reset { 0.0 } else { dt };
        let (dv_hys, tau_hys) =
            self.hys
                .update(chem, dt_hys, init_high, init_low, self.diag.e_wrap, rp);
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

impl Estimator for Monitor {
    fn soc_estimate(&self) -> f64 {
        self.diag.soc_ekf
    }

    fn voltage_estimate(&self) -> f64 {
        self.diag.vb_model_rev
    }
}
