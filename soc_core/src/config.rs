//! Configuration types for the estimator.
//!
//! These are the runtime configuration structs used by `Monitor` and
//! `Simulator`. They are separate from the TOML-deserialized config in
//! `soc_config`; see `conversions` for the mapping.

use crate::error::BuildError;

/// EKF tuning, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EkfCfg {
    /// Process variance.
    pub q: f64,
    /// Measurement variance.
    pub r: f64,
    /// State variance after `init_soc_ekf` or reset.
    pub p_init: f64,
    /// |y_filt| threshold for convergence, V.
    pub conv: f64,
    /// Time `|y_filt|` must stay below `conv` to declare convergence, s.
    pub t_conv: f64,
    /// Time `|y_filt|` must stay above `conv` to clear convergence, s.
    pub t_reset: f64,
    /// Fast-loop period that `eframe_mult` was tuned for, s.
    pub nom_dt: f64,
    /// Fast ticks per EKF frame at `nom_dt`.
    pub eframe_mult: u32,
    /// Single-pole residual filter time constant, s.
    pub tau_y_filt: f64,
    /// Two-pole residual filter natural frequency, rad/s.
    pub wn_y_filt: f64,
    /// Two-pole residual filter damping ratio.
    pub zeta_y_filt: f64,
    /// Symmetric clamp on both residual filters, V.
    pub y_filt_max: f64,
}

impl Default for EkfCfg {
    fn default() -> Self {
        Self {
            q: 0.0015 * 0.0015,
            r: 0.5 * 0.5,
            p_init: 0.0,
            conv: 1.5e-3,
            t_conv: 30.0,
            t_reset: 15.0,
            nom_dt: 0.1,
            eframe_mult: 20,
            tau_y_filt: 5.0,
            wn_y_filt: 0.1,
            zeta_y_filt: 0.9,
            y_filt_max: 0.5,
        }
    }
}

/// Battery constants shared by monitor and simulator, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryConsts {
    /// Nominal fast-loop period, s.
    pub nom_dt: f64,
    /// Current overflow clamp, A.
    pub i_max: f64,
    /// Monitor capacity scalar on the chemistry's rated capacity.
    pub s_cap_mon: f64,
    /// Simulator capacity scalar on the chemistry's rated capacity.
    pub s_cap_sim: f64,
    /// Temperature slew limit, °C/s.
    pub t_rlim: f64,
    /// BMS charging threshold, A.
    pub ib_min_up: f64,
    /// Soc margin above soc_min where hysteresis is forced to zero.
    pub hys_soc_min_marg: f64,
    /// Lagged current magnitude used for the hysteresis reset decisions, A.
    pub hys_ib_thr: f64,
    /// |soc_ekf - soc| that triggers a regauge.
    pub regauge_threshold: f64,
    /// Saturation set time, s.
    pub t_sat: f64,
    /// Saturation clear time, s.
    pub t_desat: f64,
    /// Lag on voc used for saturation detection, s.
    pub voc_filt_tau: f64,
    /// Lag on the wrap error, s.
    pub wrap_filt_tau: f64,
    /// Clamp on the filtered wrap error, V.
    pub wrap_filt_max: f64,
    /// Cutback gain, A per unit soc below full.
    pub sat_cutback_gain: f64,
    /// Cutback current at soc = 1, A.
    pub sat_ib_null: f64,
    /// Cutback current below which the simulator is saturated, A.
    pub ib_sat: f64,
    /// Charger voltage presented while the simulated BMS is off, V.
    pub vb_dc_dc: f64,
    /// Charge-time current deadband, A.
    pub tcharge_deadband: f64,
    pub ekf: EkfCfg,
}

impl Default for BatteryConsts {
    fn default() -> Self {
        Self {
            nom_dt: 0.1,
            i_max: 10_000.0,
            s_cap_mon: 1.0,
            s_cap_sim: 1.0,
            t_rlim: 0.017,
            ib_min_up: 0.2,
            hys_soc_min_marg: 0.15,
            hys_ib_thr: 1.0,
            regauge_threshold: 0.05,
            t_sat: 3.0,
            t_desat: 6.0,
            voc_filt_tau: 1.0,
            wrap_filt_tau: 20.0,
            wrap_filt_max: 0.5,
            sat_cutback_gain: 1000.0,
            sat_ib_null: 0.0,
            ib_sat: 0.5,
            vb_dc_dc: 13.5,
            tcharge_deadband: 0.1,
            ekf: EkfCfg::default(),
        }
    }
}

impl BatteryConsts {
    /// Reject values that would make the per-tick math ill-defined.
    pub fn validate(&self) -> Result<(), BuildError> {
        if !(self.nom_dt > 0.0) {
            return Err(BuildError::InvalidConfig("nom_dt must be > 0"));
        }
        if !(self.i_max > 0.0) {
            return Err(BuildError::InvalidConfig("i_max must be > 0"));
        }
        if !(self.s_cap_mon > 0.0 && self.s_cap_sim > 0.0) {
            return Err(BuildError::InvalidConfig("capacity scalars must be > 0"));
        }
        if !(self.t_rlim > 0.0) {
            return Err(BuildError::InvalidConfig("t_rlim must be > 0"));
        }
        if !(self.voc_filt_tau > 0.0 && self.wrap_filt_tau > 0.0) {
            return Err(BuildError::InvalidConfig(
                "filter time constants must be > 0",
            ));
        }
        if !(self.wrap_filt_max > 0.0) {
            return Err(BuildError::InvalidConfig("wrap_filt_max must be > 0"));
        }
        if !(self.t_sat >= 0.0 && self.t_desat >= 0.0) {
            return Err(BuildError::InvalidConfig("t_sat and t_desat must be >= 0"));
        }
        let e = &self.ekf;
        if !(e.q > 0.0 && e.r > 0.0) {
            return Err(BuildError::InvalidConfig("ekf q and r must be > 0"));
        }
        if !(e.p_init >= 0.0) {
            return Err(BuildError::InvalidConfig("ekf p_init must be >= 0"));
        }
        if !(e.t_conv > 0.0 && e.t_reset > 0.0) {
            return Err(BuildError::InvalidConfig("ekf t_conv and t_reset must be > 0"));
        }
        if e.eframe_mult == 0 || !(e.nom_dt > 0.0) {
            return Err(BuildError::InvalidConfig(
                "ekf eframe_mult and nom_dt must be > 0",
            ));
        }
        if !(e.tau_y_filt > 0.0 && e.wn_y_filt > 0.0 && e.zeta_y_filt > 0.0) {
            return Err(BuildError::InvalidConfig(
                "ekf residual filter parameters must be > 0",
            ));
        }
        if !(e.y_filt_max > 0.0) {
            return Err(BuildError::InvalidConfig("ekf y_filt_max must be > 0"));
        }
        Ok(())
    }
}

/// Retained run-time knobs, passed by reference into every model step.
#[derive(Debug, Clone, PartialEq)]
pub struct RetainedCfg {
    /// Hardware-only test mode: no BMS voltage cutoff, no charge efficiency,
    /// no simulated cutback.
    pub tweak_test: bool,
    /// Simulator is driving the plant.
    pub modeling: bool,
    /// Overall hysteresis scale; 0 disables hysteresis.
    pub hys_scale: f64,
    pub s_cap_chg: f64,
    pub s_cap_dis: f64,
    pub s_hys_chg: f64,
    pub s_hys_dis: f64,
    pub sres0: f64,
    pub sresct: f64,
    pub stauct: f64,
    pub cutback_gain_scalar: f64,
    /// Hysteresis correction gain on the wrap error.
    pub wrap_trim_gain: f64,
}

impl Default for RetainedCfg {
    fn default() -> Self {
        Self {
            tweak_test: false,
            modeling: true,
            hys_scale: 1.0,
            s_cap_chg: 1.0,
            s_cap_dis: 1.0,
            s_hys_chg: 1.0,
            s_hys_dis: 1.0,
            sres0: 1.0,
            sresct: 1.0,
            stauct: 1.0,
            cutback_gain_scalar: 1.0,
            wrap_trim_gain: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_validate() {
        BatteryConsts::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_eframe_mult() {
        let mut c = BatteryConsts::default();
        c.ekf.eframe_mult = 0;
        assert!(matches!(c.validate(), Err(BuildError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_nan_period() {
        let c = BatteryConsts {
            nom_dt: f64::NAN,
            ..BatteryConsts::default()
        };
        assert!(c.validate().is_err());
    }

    #[rstest]
    #[case::nan_wrap_max(|c: &mut BatteryConsts| c.wrap_filt_max = f64::NAN)]
    #[case::zero_wrap_max(|c: &mut BatteryConsts| c.wrap_filt_max = 0.0)]
    #[case::negative_y_max(|c: &mut BatteryConsts| c.ekf.y_filt_max = -0.5)]
    #[case::nan_y_max(|c: &mut BatteryConsts| c.ekf.y_filt_max = f64::NAN)]
    #[case::nan_t_rlim(|c: &mut BatteryConsts| c.t_rlim = f64::NAN)]
    #[case::nan_voc_tau(|c: &mut BatteryConsts| c.voc_filt_tau = f64::NAN)]
    #[case::nan_t_conv(|c: &mut BatteryConsts| c.ekf.t_conv = f64::NAN)]
    #[case::nan_t_sat(|c: &mut BatteryConsts| c.t_sat = f64::NAN)]
    #[case::nan_p_init(|c: &mut BatteryConsts| c.ekf.p_init = f64::NAN)]
    fn rejects_values_that_break_filter_bounds(#[case] edit: fn(&mut BatteryConsts)) {
        let mut c = BatteryConsts::default();
        edit(&mut c);
        assert!(matches!(c.validate(), Err(BuildError::InvalidConfig(_))));
    }
}
