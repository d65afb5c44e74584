use rstest::rstest;
use soc_config::load_toml;

#[test]
fn empty_config_uses_defaults_and_validates() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults should pass");
    assert_eq!(cfg.battery.chemistry, "battleborn");
    assert_eq!(cfg.ekf.eframe_mult, 20);
    assert!(cfg.retained.modeling);
}

#[test]
fn rejects_zero_nom_dt() {
    let toml = r#"
[battery]
nom_dt = 0.0
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject nom_dt=0");
    assert!(format!("{err}").contains("battery.nom_dt must be > 0"));
}

#[test]
fn rejects_unknown_chemistry() {
    let toml = r#"
[battery]
chemistry = "nimh"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("unknown chemistry");
    assert!(format!("{err}").contains("unknown chemistry"));
}

#[test]
fn rejects_non_positive_variances() {
    let toml = r#"
[ekf]
q = 0.0
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("q=0");
    assert!(format!("{err}").contains("ekf.q must be > 0"));

    let toml = r#"
[ekf]
eframe_mult = 0
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("eframe_mult=0");
    assert!(format!("{err}").contains("ekf.eframe_mult must be >= 1"));
}

#[test]
fn accepts_partial_sections() {
    let toml = r#"
[battery]
chemistry = "chins"
nom_dt = 0.05

[ekf]
conv = 0.002

[retained]
tweak_test = true
hys_scale = 0.0

[logging]
level = "debug"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert!((cfg.ekf.conv - 0.002).abs() < 1e-12);
    assert!(cfg.retained.tweak_test);
    assert_eq!(cfg.logging.level.as_deref(), Some("debug"));
}

#[test]
fn chemistry_table_is_checked() {
    let toml = r#"
[[chemistry]]
kind = "spare"
q_cap_rated_ah = 50.0
r0 = 0.003
r_ct = 0.0016
tau_ct = 83.0
r_sd = 70.0
tau_sd = 2.5e7
coul_eff = 0.9985
dqdt = 0.01
nom_vsat = 13.85
dvoc_dt = 0.004
rated_temp = 25.0
low_t = 0.0
vb_down = 10.3
vb_rising = 10.05
vb_down_sim = 9.9
vb_rising_sim = 10.2
ib_lag_tau = 60.0

[chemistry.voc_soc]
soc = [0.0, 1.0]
temp_c = [0.0, 40.0]
voc = [[10.0, 13.5], [10.1, 13.6]]

[chemistry.min_soc]
temp_c = [0.0, 40.0]
soc = [0.1, 0.0]

[chemistry.hys]
cap = 3600.0
dv = [-0.2, 0.2]
soc = [0.0, 1.0]
r = [[0.1, 0.1], [0.1, 0.1]]
soc_bounds = [0.0, 1.0]
dv_max = [0.2, 0.2]
dv_min = [-0.2, -0.2]
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("inverted thresholds");
    assert!(format!("{err}").contains("rising BMS threshold"));
}

#[rstest]
#[case("[battery]\nwrap_filt_max = nan\n", "battery.wrap_filt_max must be > 0")]
#[case("[battery]\nt_rlim = nan\n", "battery.t_rlim must be > 0")]
#[case("[battery]\nvoc_filt_tau = nan\n", "battery filter time constants must be > 0")]
#[case("[ekf]\ny_filt_max = nan\n", "ekf.y_filt_max must be > 0")]
#[case("[ekf]\ny_filt_max = -0.5\n", "ekf.y_filt_max must be > 0")]
#[case("[ekf]\nt_conv = nan\n", "ekf.t_conv and ekf.t_reset must be > 0")]
#[case("[ekf]\ntau_y_filt = nan\n", "ekf residual filter parameters must be > 0")]
#[case("[retained]\nwrap_trim_gain = inf\n", "retained.wrap_trim_gain must be finite")]
fn rejects_nan_and_out_of_range_filter_settings(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(format!("{err}").contains(needle), "got: {err}");
}

fn spare_with_hys_bounds(dv_max: &str, dv_min: &str) -> String {
    format!(
        r#"
[[chemistry]]
kind = "spare"
q_cap_rated_ah = 50.0
r0 = 0.003
r_ct = 0.0016
tau_ct = 83.0
r_sd = 70.0
tau_sd = 2.5e7
coul_eff = 0.9985
dqdt = 0.01
nom_vsat = 13.85
dvoc_dt = 0.004
rated_temp = 25.0
low_t = 0.0
vb_down = 10.05
vb_rising = 10.3
vb_down_sim = 9.9
vb_rising_sim = 10.2
ib_lag_tau = 60.0

[chemistry.voc_soc]
soc = [0.0, 1.0]
temp_c = [0.0, 40.0]
voc = [[10.0, 13.5], [10.1, 13.6]]

[chemistry.min_soc]
temp_c = [0.0, 40.0]
soc = [0.1, 0.0]

[chemistry.hys]
cap = 3600.0
dv = [-0.2, 0.2]
soc = [0.0, 1.0]
r = [[0.1, 0.1], [0.1, 0.1]]
soc_bounds = [0.0, 1.0]
dv_max = {dv_max}
dv_min = {dv_min}
"#
    )
}

#[test]
fn hysteresis_bounds_must_be_ordered() {
    let ok = load_toml(&spare_with_hys_bounds("[0.2, 0.2]", "[-0.2, -0.2]")).expect("parse TOML");
    ok.validate().expect("ordered bounds pass");

    let inverted =
        load_toml(&spare_with_hys_bounds("[-0.1, -0.1]", "[0.1, 0.1]")).expect("parse TOML");
    let err = inverted.validate().expect_err("inverted bounds");
    assert!(format!("{err}").contains("hys.dv_min must not exceed hys.dv_max"));

    // crossing at one breakpoint only
    let crossed =
        load_toml(&spare_with_hys_bounds("[0.2, -0.3]", "[-0.2, -0.2]")).expect("parse TOML");
    assert!(crossed.validate().is_err());
}
