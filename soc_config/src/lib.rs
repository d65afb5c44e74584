#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and chemistry tables for the SOC estimator.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - `chemistry` provides the table-backed `soc_traits::Chemistry` provider.
//! - The OCV CSV loader enforces headers and a complete soc × temperature grid.
use serde::Deserialize;

pub mod chemistry;
pub mod table;

pub use chemistry::{ChemistryBank, ChemistryToml, TableChemistry, builtin, parse_kind};
pub use table::{Table1, Table2};

/// Battery-level constants shared by the monitor and the simulator.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BatteryCfg {
    /// Chemistry name or code used by both monitor and simulator.
    pub chemistry: String,
    /// Nominal fast-loop period, s.
    pub nom_dt: f64,
    /// Current overflow clamp, A.
    pub i_max: f64,
    /// Monitor capacity scalar applied to the rated capacity.
    pub s_cap_mon: f64,
    /// Simulator capacity scalar applied to the rated capacity.
    pub s_cap_sim: f64,
    /// Temperature slew limit, °C/s.
    pub t_rlim: f64,
    /// Current above which the BMS treats the battery as charging, A.
    pub ib_min_up: f64,
    /// Soc margin above soc_min where hysteresis is forced to zero.
    pub hys_soc_min_marg: f64,
    /// Current magnitude for hysteresis reset decisions, A.
    pub hys_ib_thr: f64,
    /// |soc_ekf - soc| that triggers a regauge.
    pub regauge_threshold: f64,
    /// Time to declare saturation, s.
    pub t_sat: f64,
    /// Time to clear saturation, s.
    pub t_desat: f64,
    /// Lag on voc for saturation detection, s.
    pub voc_filt_tau: f64,
    /// Lag on the wrap error, s.
    pub wrap_filt_tau: f64,
    /// Anti-windup limit on the filtered wrap error, V.
    pub wrap_filt_max: f64,
    /// Simulator saturation cutback gain, A per unit soc.
    pub sat_cutback_gain: f64,
    /// Simulator cutback current at soc = 1, A.
    pub sat_ib_null: f64,
    /// Cutback current below which the simulator declares saturation, A.
    pub ib_sat: f64,
    /// Charger output voltage while the BMS is off, V.
    pub vb_dc_dc: f64,
    /// Charge-time current deadband, A.
    pub tcharge_deadband: f64,
}

impl Default for BatteryCfg {
    fn default() -> Self {
        Self {
            chemistry: "battleborn".to_string(),
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
        }
    }
}

/// EKF tuning.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EkfCfg {
    /// Process variance.
    pub q: f64,
    /// Measurement variance.
    pub r: f64,
    /// Initial (and reset) state variance.
    pub p_init: f64,
    /// |y_filt| below which the filter is treated as converged, V.
    pub conv: f64,
    /// Time to declare convergence, s.
    pub t_conv: f64,
    /// Time to clear convergence, s.
    pub t_reset: f64,
    /// Nominal fast-loop period the multiplier is tuned for, s.
    pub nom_dt: f64,
    /// EKF frames per nominal fast tick.
    pub eframe_mult: u32,
    pub tau_y_filt: f64,
    pub wn_y_filt: f64,
    pub zeta_y_filt: f64,
    /// Symmetric clamp on the filtered residuals, V.
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

/// Retained run-time knobs passed into every model step.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetainedCfg {
    /// Hardware-only test mode: disables BMS voltage cutoff, efficiency and cutback modeling.
    pub tweak_test: bool,
    /// Simulator drives the plant (false = hardware in the loop).
    pub modeling: bool,
    /// Overall hysteresis scale (0 disables hysteresis).
    pub hys_scale: f64,
    pub s_cap_chg: f64,
    pub s_cap_dis: f64,
    pub s_hys_chg: f64,
    pub s_hys_dis: f64,
    /// Scalar on r0.
    pub sres0: f64,
    /// Scalar on r_ct.
    pub sresct: f64,
    /// Scalar on tau_ct.
    pub stauct: f64,
    pub cutback_gain_scalar: f64,
    /// Hysteresis correction gain on the wrap error, 1/(Ω·F).
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

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub level: Option<String>, // "info","debug"
    /// Emit JSON lines instead of pretty output.
    pub json: bool,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub battery: BatteryCfg,
    #[serde(default)]
    pub ekf: EkfCfg,
    #[serde(default)]
    pub retained: RetainedCfg,
    #[serde(default)]
    pub logging: Logging,
    /// Optional chemistry tables overriding the built-ins.
    #[serde(default)]
    pub chemistry: Vec<ChemistryToml>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// One OCV sample as stored in CSV.
///
/// Expected headers:
/// soc,temp_c,voc
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct VocSocRow {
    pub soc: f64,
    pub temp_c: f64,
    pub voc: f64,
}

/// Build an OCV surface from scattered rows. Every (soc, temp_c) pair of the
/// implied grid must appear exactly once.
pub fn voc_soc_from_rows(rows: &[VocSocRow]) -> eyre::Result<Table2> {
    if rows.is_empty() {
        eyre::bail!("OCV table has no rows");
    }
    let mut socs: Vec<f64> = rows.iter().map(|r| r.soc).collect();
    let mut temps: Vec<f64> = rows.iter().map(|r| r.temp_c).collect();
    socs.sort_by(f64::total_cmp);
    socs.dedup();
    temps.sort_by(f64::total_cmp);
    temps.dedup();
    if socs.len() * temps.len() != rows.len() {
        eyre::bail!(
            "OCV table must be a complete grid: {} soc x {} temp_c breakpoints but {} rows",
            socs.len(),
            temps.len(),
            rows.len()
        );
    }
    let mut grid = vec![vec![f64::NAN; socs.len()]; temps.len()];
    for r in rows {
        // exact matches: breakpoints came from these same rows
        let ix = socs.partition_point(|&s| s < r.soc);
        let iy = temps.partition_point(|&t| t < r.temp_c);
        if !grid[iy][ix].is_nan() {
            eyre::bail!("duplicate OCV row at soc={} temp_c={}", r.soc, r.temp_c);
        }
        grid[iy][ix] = r.voc;
    }
    Table2::new(socs, temps, grid)
}

pub fn load_voc_soc_csv(path: &std::path::Path) -> eyre::Result<Table2> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open OCV CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["soc", "temp_c", "voc"];
    let actual: Vec<String> = headers.iter().map(|s| s.trim().to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "OCV CSV must have headers 'soc,temp_c,voc', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<VocSocRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    voc_soc_from_rows(&rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Battery
        let b = &self.battery;
        parse_kind(&b.chemistry)?;
        if !(b.nom_dt > 0.0) {
            eyre::bail!("battery.nom_dt must be > 0");
        }
        if !(b.i_max > 0.0) {
            eyre::bail!("battery.i_max must be > 0");
        }
        if !(b.s_cap_mon > 0.0) || !(b.s_cap_sim > 0.0) {
            eyre::bail!("battery.s_cap_mon and battery.s_cap_sim must be > 0");
        }
        if !(b.t_rlim > 0.0) {
            eyre::bail!("battery.t_rlim must be > 0");
        }
        if !(b.hys_soc_min_marg >= 0.0) || !(b.hys_ib_thr >= 0.0) {
            eyre::bail!("battery.hys_soc_min_marg and battery.hys_ib_thr must be >= 0");
        }
        if !(b.regauge_threshold > 0.0 && b.regauge_threshold <= 1.0) {
            eyre::bail!("battery.regauge_threshold must be in (0.0, 1.0]");
        }
        if !(b.t_sat >= 0.0) || !(b.t_desat >= 0.0) {
            eyre::bail!("battery.t_sat and battery.t_desat must be >= 0");
        }
        if !(b.voc_filt_tau > 0.0) || !(b.wrap_filt_tau > 0.0) {
            eyre::bail!("battery filter time constants must be > 0");
        }
        if !(b.wrap_filt_max > 0.0) {
            eyre::bail!("battery.wrap_filt_max must be > 0");
        }
        if !(b.sat_cutback_gain >= 0.0) || !(b.ib_sat >= 0.0) {
            eyre::bail!("battery.sat_cutback_gain and battery.ib_sat must be >= 0");
        }
        if !(b.tcharge_deadband >= 0.0) {
            eyre::bail!("battery.tcharge_deadband must be >= 0");
        }

        // EKF
        let e = &self.ekf;
        if !(e.q > 0.0) {
            eyre::bail!("ekf.q must be > 0");
        }
        if !(e.r > 0.0) {
            eyre::bail!("ekf.r must be > 0");
        }
        if !(e.p_init >= 0.0) {
            eyre::bail!("ekf.p_init must be >= 0");
        }
        if !(e.conv > 0.0) {
            eyre::bail!("ekf.conv must be > 0");
        }
        if !(e.t_conv > 0.0) || !(e.t_reset > 0.0) {
            eyre::bail!("ekf.t_conv and ekf.t_reset must be > 0");
        }
        if !(e.nom_dt > 0.0) {
            eyre::bail!("ekf.nom_dt must be > 0");
        }
        if e.eframe_mult == 0 {
            eyre::bail!("ekf.eframe_mult must be >= 1");
        }
        if !(e.tau_y_filt > 0.0) || !(e.wn_y_filt > 0.0) || !(e.zeta_y_filt > 0.0) {
            eyre::bail!("ekf residual filter parameters must be > 0");
        }
        if !(e.y_filt_max > 0.0) {
            eyre::bail!("ekf.y_filt_max must be > 0");
        }

        // Retained
        let r = &self.retained;
        if !(r.hys_scale >= 0.0) {
            eyre::bail!("retained.hys_scale must be >= 0");
        }
        for (name, v) in [
            ("s_cap_chg", r.s_cap_chg),
            ("s_cap_dis", r.s_cap_dis),
            ("s_hys_chg", r.s_hys_chg),
            ("s_hys_dis", r.s_hys_dis),
            ("stauct", r.stauct),
        ] {
            if !(v > 0.0) {
                eyre::bail!("retained.{name} must be > 0");
            }
        }
        if !(r.sres0 >= 0.0) || !(r.sresct >= 0.0) || !(r.cutback_gain_scalar >= 0.0) {
            eyre::bail!("retained resistance and cutback scalars must be >= 0");
        }
        if !r.wrap_trim_gain.is_finite() {
            eyre::bail!("retained.wrap_trim_gain must be finite");
        }

        // Chemistry tables: building them runs their own checks
        for c in &self.chemistry {
            TableChemistry::from_toml(c)?;
        }

        Ok(())
    }
}
