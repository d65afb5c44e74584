//! `From` implementations bridging `soc_config` types to `soc_core` types.

use crate::config::{BatteryConsts, EkfCfg, RetainedCfg};

// ── EkfCfg ───────────────────────────────────────────────────────────────────

impl From<&soc_config::EkfCfg> for EkfCfg {
    fn from(c: &soc_config::EkfCfg) -> Self {
        Self {
            q: c.q,
            r: c.r,
            p_init: c.p_init,
            conv: c.conv,
            t_conv: c.t_conv,
            t_reset: c.t_reset,
            nom_dt: c.nom_dt,
            eframe_mult: c.eframe_mult,
            tau_y_filt: c.tau_y_filt,
            wn_y_filt: c.wn_y_filt,
            zeta_y_filt: c.zeta_y_filt,
            y_filt_max: c.y_filt_max,
        }
    }
}

// ── BatteryConsts ────────────────────────────────────────────────────────────

impl From<&soc_config::Config> for BatteryConsts {
    fn from(c: &soc_config::Config) -> Self {
        let b = &c.battery;
        Self {
            nom_dt: b.nom_dt,
            i_max: b.i_max,
            s_cap_mon: b.s_cap_mon,
            s_cap_sim: b.s_cap_sim,
            t_rlim: b.t_rlim,
            ib_min_up: b.ib_min_up,
            hys_soc_min_marg: b.hys_soc_min_marg,
            hys_ib_thr: b.hys_ib_thr,
            regauge_threshold: b.regauge_threshold,
            t_sat: b.t_sat,
            t_desat: b.t_desat,
            voc_filt_tau: b.voc_filt_tau,
            wrap_filt_tau: b.wrap_filt_tau,
            wrap_filt_max: b.wrap_filt_max,
            sat_cutback_gain: b.sat_cutback_gain,
            sat_ib_null: b.sat_ib_null,
            ib_sat: b.ib_sat,
            vb_dc_dc: b.vb_dc_dc,
            tcharge_deadband: b.tcharge_deadband,
            ekf: EkfCfg::from(&c.ekf),
        }
    }
}

// ── RetainedCfg ──────────────────────────────────────────────────────────────

impl From<&soc_config::RetainedCfg> for RetainedCfg {
    fn from(c: &soc_config::RetainedCfg) -> Self {
        Self {
            tweak_test: c.tweak_test,
            modeling: c.modeling,
            hys_scale: c.hys_scale,
            s_cap_chg: c.s_cap_chg,
            s_cap_dis: c.s_cap_dis,
            s_hys_chg: c.s_hys_chg,
            s_hys_dis: c.s_hys_dis,
            sres0: c.sres0,
            sresct: c.sresct,
            stauct: c.stauct,
            cutback_gain_scalar: c.cutback_gain_scalar,
            wrap_trim_gain: c.wrap_trim_gain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_file_config_matches_runtime_defaults() {
        let file = soc_config::Config::default();
        assert_eq!(BatteryConsts::from(&file), BatteryConsts::default());
        assert_eq!(RetainedCfg::from(&file.retained), RetainedCfg::default());
    }
}
