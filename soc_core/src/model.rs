//! Traits shared by the monitor and the simulator.

use soc_traits::Chemistry;

use crate::config::RetainedCfg;
use crate::coulombs::{BatteryState, CoulombInput};

/// A battery model stepped once per fast tick.
///
/// Both variants own a Coulomb counter and a hysteresis state, and read
/// chemistry through a borrowed [`Chemistry`] on every call so the active
/// chemistry can change between ticks.
pub trait BatteryModel {
    type Input;
    type WarmStart: Default;

    /// Advance one tick and return the model's terminal voltage output, V.
    fn calculate<C: Chemistry + ?Sized>(
        &mut self,
        chem: &C,
        input: &Self::Input,
        warm: &Self::WarmStart,
        rp: &RetainedCfg,
    ) -> f64;

    /// Advance the hysteresis state for this tick and return the scaled
    /// hysteresis voltage, V.
    fn look_hys<C: Chemistry + ?Sized>(
        &mut self,
        chem: &C,
        dt: f64,
        reset: bool,
        rp: &RetainedCfg,
    ) -> f64;

    fn count_coulombs<C: Chemistry + ?Sized>(
        &mut self,
        chem: &C,
        input: &CoulombInput,
        rp: &RetainedCfg,
    ) -> f64 {
        self.battery_mut()
            .count_coulombs(chem, input, rp.tweak_test)
    }

    fn battery(&self) -> &BatteryState;
    fn battery_mut(&mut self) -> &mut BatteryState;
}

/// Read-only view of what a model currently believes.
pub trait Estimator {
    /// Best available state of charge.
    fn soc_estimate(&self) -> f64;
    /// Voltage the model predicts at the terminals, V.
    fn voltage_estimate(&self) -> f64;
}
