//! Coulomb counter shared by the monitor and the simulator.
//!
//! Charge is tracked as `delta_q`, the deficit from saturation: it is
//! never positive and is clamped at -1.5 × capacity. Temperature enters
//! through a slew-limited copy so a step in the sensor reading does not
//! dump charge in a single tick.

use soc_traits::{Chemistry, ChemistryKind, ChemistryParams};

use crate::filters::RateLimit;

/// Capacities below this are treated as this value, C.
const CAPACITY_FLOOR: f64 = 1.0;

/// Per-tick inputs to [`BatteryState::count_coulombs`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CoulombInput {
    pub dt: f64,
    pub reset: bool,
    pub temp_c: f64,
    /// Current into the battery, A.
    pub charge_curr: f64,
    /// Battery is saturated this tick.
    pub sat: bool,
    /// Initial soc applied on `reset`.
    pub soc_init: Option<f64>,
    /// Externally supplied true soc; overrides integration when present.
    pub soc_in: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatteryState {
    chem: ChemistryKind,
    s_cap: f64,
    q: f64,
    delta_q: f64,
    soc: f64,
    soc_min: f64,
    q_capacity: f64,
    q_min: f64,
    temp_c: f64,
    t_last: f64,
    reset: bool,
    resetting: bool,
    sat: bool,
    t_rlim: RateLimit,
}

impl BatteryState {
    /// Full battery at `rated_temp`, scaled by `s_cap`.
    pub fn new<C: Chemistry + ?Sized>(chem: &C, s_cap: f64, t_rlim: f64) -> Self {
        let p = chem.params();
        let q_capacity = (p.q_cap_rated() * s_cap).max(CAPACITY_FLOOR);
        let mut t_rlim = RateLimit::new(t_rlim);
        t_rlim.update(p.rated_temp, true, 0.0);
        Self {
            chem: chem.kind(),
            s_cap,
            q: q_capacity,
            delta_q: 0.0,
            soc: 1.0,
            soc_min: chem.min_soc(p.rated_temp),
            q_capacity,
            q_min: 0.0,
            temp_c: p.rated_temp,
            t_last: p.rated_temp,
            reset: false,
            resetting: false,
            sat: false,
            t_rlim,
        }
    }

    /// Capacity at `temp_c`, C.
    pub fn capacity(&self, p: &ChemistryParams, temp_c: f64) -> f64 {
        let q_sat = p.q_cap_rated() * self.s_cap;
        (q_sat * (1.0 - p.dqdt * (temp_c - p.rated_temp))).max(CAPACITY_FLOOR)
    }

    /// Set the counter so that `soc` holds at `temp_c`.
    pub fn apply_soc<C: Chemistry + ?Sized>(&mut self, chem: &C, soc: f64, temp_c: f64) {
        self.chem = chem.kind();
        self.q_capacity = self.capacity(chem.params(), temp_c);
        self.set_delta_q((soc - 1.0) * self.q_capacity);
        self.soc_min = chem.min_soc(temp_c);
        self.q_min = self.soc_min * self.q_capacity;
        self.resetting = true;
    }

    /// Integrate one tick of charge and return the new soc.
    pub fn count_coulombs<C: Chemistry + ?Sized>(
        &mut self,
        chem: &C,
        input: &CoulombInput,
        tweak_test: bool,
    ) -> f64 {
        let p = chem.params();
        self.chem = chem.kind();
        self.reset = input.reset;

        let temp_lim = self.t_rlim.update(input.temp_c, input.reset, input.dt);
        if input.reset {
            self.t_last = temp_lim;
        }
        self.q_capacity = self.capacity(p, temp_lim);

        if input.reset {
            if let Some(soc) = input.soc_init {
                self.delta_q = (soc - 1.0) * self.q_capacity;
                self.resetting = true;
            }
            if input.sat {
                self.delta_q = 0.0;
            }
        }

        let mut d_delta_q = input.charge_curr * input.dt;
        if input.charge_curr > 0.0 && !tweak_test {
            d_delta_q *= p.coul_eff;
        }
        d_delta_q -= p.dqdt * self.q_capacity * (temp_lim - self.t_last);

        self.sat = input.sat;
        if self.sat && d_delta_q > 0.0 {
            d_delta_q = 0.0;
            if !self.resetting {
                self.delta_q = 0.0;
            }
        }
        self.resetting = false;

        self.set_delta_q(self.delta_q + d_delta_q);
        self.soc_min = chem.min_soc(temp_lim);
        self.q_min = self.soc_min * self.q_capacity;

        if let Some(truth) = input.soc_in {
            self.set_delta_q((truth - 1.0) * self.q_capacity);
            self.soc = truth;
        }

        self.t_last = temp_lim;
        self.temp_c = temp_lim;
        self.soc
    }

    fn set_delta_q(&mut self, delta_q: f64) {
        self.delta_q = delta_q.clamp(-1.5 * self.q_capacity, 0.0);
        self.q = self.q_capacity + self.delta_q;
        self.soc = self.q / self.q_capacity;
    }

    #[inline]
    pub fn chem(&self) -> ChemistryKind {
        self.chem
    }
    #[inline]
    pub fn q(&self) -> f64 {
        self.q
    }
    #[inline]
    pub fn delta_q(&self) -> f64 {
        self.delta_q
    }
    #[inline]
    pub fn soc(&self) -> f64 {
        self.soc
    }
    #[inline]
    pub fn soc_min(&self) -> f64 {
        self.soc_min
    }
    #[inline]
    pub fn q_capacity(&self) -> f64 {
        self.q_capacity
    }
    #[inline]
    pub fn q_min(&self) -> f64 {
        self.q_min
    }
    /// Slew-limited temperature used for the last count, °C.
    #[inline]
    pub fn temp_c(&self) -> f64 {
        self.temp_c
    }
    #[inline]
    pub fn reset(&self) -> bool {
        self.reset
    }
    #[inline]
    pub fn sat(&self) -> bool {
        self.sat
    }
}
