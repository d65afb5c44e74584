/// Battery chemistry selector.
///
/// The integer codes match the retained chemistry code carried by the
/// embedded target (0 = Battleborn, 1 = CHINS, 2 = spare slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChemistryKind {
    #[default]
    BattleBorn = 0,
    Chins = 1,
    Spare = 2,
}

impl ChemistryKind {
    pub const ALL: [ChemistryKind; 3] = [Self::BattleBorn, Self::Chins, Self::Spare];

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BattleBorn => "battleborn",
            Self::Chins => "chins",
            Self::Spare => "spare",
        }
    }
}

/// Raised when an integer chemistry code has no matching variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownChemistry(pub u8);

impl std::fmt::Display for UnknownChemistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown chemistry code {}", self.0)
    }
}

impl std::error::Error for UnknownChemistry {}

impl TryFrom<u8> for ChemistryKind {
    type Error = UnknownChemistry;
    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::BattleBorn),
            1 => Ok(Self::Chins),
            2 => Ok(Self::Spare),
            other => Err(UnknownChemistry(other)),
        }
    }
}

/// Hysteresis calibration scalars for one chemistry.
///
/// The resistance surface and the dv bounds come from the chemistry tables
/// (`Chemistry::hys_resistance`, `Chemistry::hys_bounds`); these scalars shape
/// the charge and discharge branches separately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisParams {
    /// Hysteresis capacitance, F.
    pub cap: f64,
    /// Capacitance scalar applied while charging.
    pub s_cap_chg: f64,
    /// Capacitance scalar applied while discharging.
    pub s_cap_dis: f64,
    /// Resistance scalar applied while charging.
    pub s_hys_chg: f64,
    /// Resistance scalar applied while discharging.
    pub s_hys_dis: f64,
}

impl Default for HysteresisParams {
    fn default() -> Self {
        Self {
            cap: 3.6e3,
            s_cap_chg: 1.0,
            s_cap_dis: 1.0,
            s_hys_chg: 1.0,
            s_hys_dis: 1.0,
        }
    }
}

/// Immutable per-chemistry constants.
#[derive(Debug, Clone, PartialEq)]
pub struct ChemistryParams {
    /// Rated capacity at `rated_temp`, Ah.
    pub q_cap_rated_ah: f64,
    /// Ohmic resistance, Ω.
    pub r0: f64,
    /// Charge-transfer resistance, Ω.
    pub r_ct: f64,
    /// Charge-transfer time constant, s.
    pub tau_ct: f64,
    /// Steady-state resistance (r0 + r_ct), Ω.
    pub r_ss: f64,
    /// Self-discharge reference resistance used by the EKF process model.
    pub r_sd: f64,
    /// Self-discharge reference time constant, s.
    pub tau_sd: f64,
    /// Fraction of charging current stored.
    pub coul_eff: f64,
    /// Capacity temperature coefficient, fraction/°C.
    pub dqdt: f64,
    /// Nominal saturation voltage at `rated_temp`, V.
    pub nom_vsat: f64,
    /// OCV temperature coefficient, V/°C.
    pub dvoc_dt: f64,
    /// Temperature at which capacity is rated, °C.
    pub rated_temp: f64,
    /// BMS low-temperature cutoff, °C.
    pub low_t: f64,
    /// Monitor BMS off threshold (falling), V.
    pub vb_down: f64,
    /// Monitor BMS on threshold (rising), V.
    pub vb_rising: f64,
    /// Simulator BMS off threshold (falling), V.
    pub vb_down_sim: f64,
    /// Simulator BMS on threshold (rising), V.
    pub vb_rising_sim: f64,
    /// Current lag time constant, s.
    pub ib_lag_tau: f64,
    pub hys: HysteresisParams,
}

impl ChemistryParams {
    /// Saturation voltage at temperature `temp_c`.
    #[inline]
    pub fn vsat(&self, temp_c: f64) -> f64 {
        self.nom_vsat + (temp_c - self.rated_temp) * self.dvoc_dt
    }

    /// Rated capacity in coulombs.
    #[inline]
    pub fn q_cap_rated(&self) -> f64 {
        self.q_cap_rated_ah * 3600.0
    }
}

/// Read-only chemistry capability consumed by the estimator.
///
/// Every accessor takes `&self`. Implementations must not mutate table storage
/// from these calls; the EKF evaluates `voc_soc` several times per frame to
/// build its Jacobian and relies on repeated lookups returning the same value.
pub trait Chemistry {
    fn kind(&self) -> ChemistryKind;
    fn params(&self) -> &ChemistryParams;

    /// Open-circuit voltage at `soc` and `temp_c`, clamped at the table edges.
    fn voc_soc(&self, soc: f64, temp_c: f64) -> f64;

    /// Minimum usable state of charge at `temp_c`.
    fn min_soc(&self, temp_c: f64) -> f64;

    /// Hysteresis resistance at hysteresis voltage `dv` and `soc`, Ω.
    fn hys_resistance(&self, dv: f64, soc: f64) -> f64;

    /// Hysteresis voltage bounds `(dv_min, dv_max)` at `soc`.
    fn hys_bounds(&self, soc: f64) -> (f64, f64);
}

/// Selects a chemistry by kind.
pub trait ChemistryProvider {
    fn chemistry(&self, kind: ChemistryKind) -> Option<&dyn Chemistry>;
}
