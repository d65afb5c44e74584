//! Table-backed chemistry provider.
//!
//! `TableChemistry` implements `soc_traits::Chemistry` from breakpoint tables,
//! either authored in TOML (`[[chemistry]]`) or taken from the built-in set.
//! Tables are immutable once built; lookups only read.

use serde::Deserialize;
use soc_traits::{Chemistry, ChemistryKind, ChemistryParams, ChemistryProvider, HysteresisParams};

use crate::table::{Table1, Table2};

/// Parse a chemistry name or integer code ("battleborn", "chins", "spare", "0".."2").
pub fn parse_kind(s: &str) -> eyre::Result<ChemistryKind> {
    let lower = s.trim().to_ascii_lowercase();
    for kind in ChemistryKind::ALL {
        if kind.name() == lower {
            return Ok(kind);
        }
    }
    if let Ok(code) = lower.parse::<u8>() {
        return ChemistryKind::try_from(code).map_err(|e| eyre::eyre!("{e}"));
    }
    eyre::bail!("unknown chemistry '{s}'")
}

/// OCV surface as authored in TOML: one row of voltages per temperature.
#[derive(Debug, Deserialize, Clone)]
pub struct VocSocToml {
    pub soc: Vec<f64>,
    pub temp_c: Vec<f64>,
    pub voc: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MinSocToml {
    pub temp_c: Vec<f64>,
    pub soc: Vec<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HysToml {
    pub cap: f64,
    #[serde(default = "one")]
    pub s_cap_chg: f64,
    #[serde(default = "one")]
    pub s_cap_dis: f64,
    #[serde(default = "one")]
    pub s_hys_chg: f64,
    #[serde(default = "one")]
    pub s_hys_dis: f64,
    /// Resistance breakpoints in hysteresis voltage.
    pub dv: Vec<f64>,
    /// Resistance breakpoints in soc; one row of `r` per entry.
    pub soc: Vec<f64>,
    pub r: Vec<Vec<f64>>,
    /// Breakpoints for the dv bounds.
    pub soc_bounds: Vec<f64>,
    pub dv_max: Vec<f64>,
    pub dv_min: Vec<f64>,
}

fn one() -> f64 {
    1.0
}

/// A full chemistry definition as authored in TOML.
#[derive(Debug, Deserialize, Clone)]
pub struct ChemistryToml {
    pub kind: String,
    pub q_cap_rated_ah: f64,
    pub r0: f64,
    pub r_ct: f64,
    pub tau_ct: f64,
    pub r_sd: f64,
    pub tau_sd: f64,
    pub coul_eff: f64,
    pub dqdt: f64,
    pub nom_vsat: f64,
    pub dvoc_dt: f64,
    pub rated_temp: f64,
    pub low_t: f64,
    pub vb_down: f64,
    pub vb_rising: f64,
    pub vb_down_sim: f64,
    pub vb_rising_sim: f64,
    pub ib_lag_tau: f64,
    pub voc_soc: VocSocToml,
    pub min_soc: MinSocToml,
    pub hys: HysToml,
}

/// Chemistry constants plus interpolated lookup surfaces.
#[derive(Debug, Clone)]
pub struct TableChemistry {
    kind: ChemistryKind,
    params: ChemistryParams,
    voc_soc: Table2,
    min_soc: Table1,
    hys_r: Table2,
    hys_dv_max: Table1,
    hys_dv_min: Table1,
}

impl TableChemistry {
    pub fn from_toml(c: &ChemistryToml) -> eyre::Result<Self> {
        let kind = parse_kind(&c.kind)?;
        if !(c.q_cap_rated_ah > 0.0) {
            eyre::bail!("chemistry {}: q_cap_rated_ah must be > 0", c.kind);
        }
        if !(c.tau_ct > 0.0) || !(c.tau_sd > 0.0) || !(c.ib_lag_tau > 0.0) {
            eyre::bail!("chemistry {}: time constants must be > 0", c.kind);
        }
        if !(c.coul_eff > 0.0 && c.coul_eff <= 1.0) {
            eyre::bail!("chemistry {}: coul_eff must be in (0.0, 1.0]", c.kind);
        }
        if c.vb_rising < c.vb_down || c.vb_rising_sim < c.vb_down_sim {
            eyre::bail!(
                "chemistry {}: rising BMS threshold must not be below the falling one",
                c.kind
            );
        }
        if !(c.hys.cap > 0.0) {
            eyre::bail!("chemistry {}: hys.cap must be > 0", c.kind);
        }
        let params = ChemistryParams {
            q_cap_rated_ah: c.q_cap_rated_ah,
            r0: c.r0,
            r_ct: c.r_ct,
            tau_ct: c.tau_ct,
            r_ss: c.r0 + c.r_ct,
            r_sd: c.r_sd,
            tau_sd: c.tau_sd,
            coul_eff: c.coul_eff,
            dqdt: c.dqdt,
            nom_vsat: c.nom_vsat,
            dvoc_dt: c.dvoc_dt,
            rated_temp: c.rated_temp,
            low_t: c.low_t,
            vb_down: c.vb_down,
            vb_rising: c.vb_rising,
            vb_down_sim: c.vb_down_sim,
            vb_rising_sim: c.vb_rising_sim,
            ib_lag_tau: c.ib_lag_tau,
            hys: HysteresisParams {
                cap: c.hys.cap,
                s_cap_chg: c.hys.s_cap_chg,
                s_cap_dis: c.hys.s_cap_dis,
                s_hys_chg: c.hys.s_hys_chg,
                s_hys_dis: c.hys.s_hys_dis,
            },
        };
        let voc_soc = Table2::new(
            c.voc_soc.soc.clone(),
            c.voc_soc.temp_c.clone(),
            c.voc_soc.voc.clone(),
        )
        .map_err(|e| eyre::eyre!("chemistry {}: voc_soc: {e}", c.kind))?;
        let min_soc = Table1::new(c.min_soc.temp_c.clone(), c.min_soc.soc.clone())
            .map_err(|e| eyre::eyre!("chemistry {}: min_soc: {e}", c.kind))?;
        let hys_r = Table2::new(c.hys.dv.clone(), c.hys.soc.clone(), c.hys.r.clone())
            .map_err(|e| eyre::eyre!("chemistry {}: hys.r: {e}", c.kind))?;
        if c.hys.r.iter().flatten().any(|&r| !(r > 0.0)) {
            eyre::bail!("chemistry {}: hys.r values must be > 0", c.kind);
        }
        // Bounds share breakpoints, so ordering at each one holds in between.
        if c.hys.dv_min.iter().zip(&c.hys.dv_max).any(|(lo, hi)| !(lo <= hi)) {
            eyre::bail!("chemistry {}: hys.dv_min must not exceed hys.dv_max", c.kind);
        }
        let hys_dv_max = Table1::new(c.hys.soc_bounds.clone(), c.hys.dv_max.clone())
            .map_err(|e| eyre::eyre!("chemistry {}: hys.dv_max: {e}", c.kind))?;
        let hys_dv_min = Table1::new(c.hys.soc_bounds.clone(), c.hys.dv_min.clone())
            .map_err(|e| eyre::eyre!("chemistry {}: hys.dv_min: {e}", c.kind))?;
        Ok(Self {
            kind,
            params,
            voc_soc,
            min_soc,
            hys_r,
            hys_dv_max,
            hys_dv_min,
        })
    }

    /// Replace the OCV surface, e.g. with one loaded by `load_voc_soc_csv`.
    pub fn with_voc_soc(mut self, table: Table2) -> Self {
        self.voc_soc = table;
        self
    }

    pub fn voc_soc_table(&self) -> &Table2 {
        &self.voc_soc
    }
}

impl Chemistry for TableChemistry {
    fn kind(&self) -> ChemistryKind {
        self.kind
    }

    fn params(&self) -> &ChemistryParams {
        &self.params
    }

    fn voc_soc(&self, soc: f64, temp_c: f64) -> f64 {
        self.voc_soc.interp(soc, temp_c)
    }

    fn min_soc(&self, temp_c: f64) -> f64 {
        self.min_soc.interp(temp_c)
    }

    fn hys_resistance(&self, dv: f64, soc: f64) -> f64 {
        self.hys_r.interp(dv, soc)
    }

    fn hys_bounds(&self, soc: f64) -> (f64, f64) {
        (self.hys_dv_min.interp(soc), self.hys_dv_max.interp(soc))
    }
}

/// One chemistry per kind; missing kinds fall back to the built-in set.
#[derive(Debug, Clone)]
pub struct ChemistryBank {
    entries: Vec<TableChemistry>,
}

impl ChemistryBank {
    /// Built-in chemistries only.
    pub fn builtin() -> Self {
        Self {
            entries: ChemistryKind::ALL.iter().map(|&k| builtin(k)).collect(),
        }
    }

    /// Built-ins overridden by any `[[chemistry]]` tables in the config.
    pub fn from_config(tables: &[ChemistryToml]) -> eyre::Result<Self> {
        let mut bank = Self::builtin();
        for t in tables {
            let chem = TableChemistry::from_toml(t)?;
            bank.insert(chem);
        }
        Ok(bank)
    }

    pub fn insert(&mut self, chem: TableChemistry) {
        if let Some(slot) = self.entries.iter_mut().find(|c| c.kind == chem.kind) {
            *slot = chem;
        } else {
            self.entries.push(chem);
        }
    }

    pub fn get(&self, kind: ChemistryKind) -> Option<&TableChemistry> {
        self.entries.iter().find(|c| c.kind == kind)
    }
}

impl ChemistryProvider for ChemistryBank {
    fn chemistry(&self, kind: ChemistryKind) -> Option<&dyn Chemistry> {
        self.get(kind).map(|c| c as &dyn Chemistry)
    }
}

// ── Built-in tables ──────────────────────────────────────────────────────────

const VOC_SOC_X: [f64; 18] = [
    -0.15, 0.00, 0.05, 0.10, 0.14, 0.17, 0.20, 0.25, 0.30, 0.40, 0.50, 0.60, 0.70, 0.80, 0.90,
    0.99, 0.995, 1.00,
];
const VOC_SOC_T: [f64; 5] = [5.0, 11.1, 20.0, 30.0, 40.0];

// 20 °C rows; other temperatures shift by dvoc_dt.
const BB_VOC_20C: [f64; 18] = [
    4.00, 4.00, 9.00, 11.80, 12.50, 12.70, 12.80, 12.95, 13.00, 13.05, 13.10, 13.15, 13.20,
    13.26, 13.32, 13.45, 13.70, 14.10,
];
const CH_VOC_20C: [f64; 18] = [
    4.00, 4.00, 10.00, 12.20, 12.70, 12.85, 12.95, 13.02, 13.06, 13.10, 13.14, 13.18, 13.22,
    13.27, 13.33, 13.44, 13.65, 14.05,
];

fn shifted_rows(base: &[f64; 18], dvoc_dt: f64) -> Vec<Vec<f64>> {
    VOC_SOC_T
        .iter()
        .map(|t| base.iter().map(|v| v + (t - 20.0) * dvoc_dt).collect())
        .collect()
}

fn builtin_toml(kind: ChemistryKind) -> ChemistryToml {
    let hys = HysToml {
        cap: 3.6e3,
        s_cap_chg: 1.0,
        s_cap_dis: 1.0,
        s_hys_chg: 1.0,
        s_hys_dis: 1.0,
        dv: vec![-0.2, -0.1, 0.0, 0.1, 0.2],
        soc: vec![0.0, 0.5, 1.0],
        r: vec![
            vec![0.60, 0.25, 0.05, 0.25, 0.60],
            vec![0.60, 0.25, 0.05, 0.25, 0.60],
            vec![0.60, 0.25, 0.05, 0.25, 0.60],
        ],
        soc_bounds: vec![0.0, 0.2, 0.9, 1.0],
        dv_max: vec![0.1, 0.2, 0.2, 0.1],
        dv_min: vec![-0.1, -0.2, -0.2, -0.1],
    };
    let min_soc = MinSocToml {
        temp_c: vec![5.0, 11.1, 20.0, 30.0, 40.0],
        soc: vec![0.20, 0.12, 0.0, 0.0, 0.0],
    };
    match kind {
        ChemistryKind::BattleBorn | ChemistryKind::Spare => ChemistryToml {
            kind: kind.name().to_string(),
            q_cap_rated_ah: 100.0,
            r0: 0.003,
            r_ct: 0.0016,
            tau_ct: 83.0,
            r_sd: 70.0,
            tau_sd: 2.5e7,
            coul_eff: 0.9985,
            dqdt: 0.01,
            nom_vsat: 13.85,
            dvoc_dt: 0.004,
            rated_temp: 25.0,
            low_t: 0.0,
            vb_down: 10.05,
            vb_rising: 10.3,
            vb_down_sim: 9.9,
            vb_rising_sim: 10.2,
            ib_lag_tau: 60.0,
            voc_soc: VocSocToml {
                soc: VOC_SOC_X.to_vec(),
                temp_c: VOC_SOC_T.to_vec(),
                voc: shifted_rows(&BB_VOC_20C, 0.004),
            },
            min_soc,
            hys,
        },
        ChemistryKind::Chins => ChemistryToml {
            kind: kind.name().to_string(),
            q_cap_rated_ah: 100.0,
            r0: 0.0046,
            r_ct: 0.0077,
            tau_ct: 24.9,
            r_sd: 70.0,
            tau_sd: 2.5e7,
            coul_eff: 0.9976,
            dqdt: 0.01,
            nom_vsat: 13.80,
            dvoc_dt: 0.004,
            rated_temp: 25.0,
            low_t: 0.0,
            vb_down: 9.8,
            vb_rising: 10.1,
            vb_down_sim: 9.5,
            vb_rising_sim: 9.75,
            ib_lag_tau: 60.0,
            voc_soc: VocSocToml {
                soc: VOC_SOC_X.to_vec(),
                temp_c: VOC_SOC_T.to_vec(),
                voc: shifted_rows(&CH_VOC_20C, 0.004),
            },
            min_soc,
            hys,
        },
    }
}

/// Built-in chemistry for `kind`.
pub fn builtin(kind: ChemistryKind) -> TableChemistry {
    match TableChemistry::from_toml(&builtin_toml(kind)) {
        Ok(c) => c,
        // Built-in tables are static data covered by tests below.
        Err(e) => unreachable!("built-in chemistry {} is invalid: {e}", kind.name()),
    }
}
