//! Randles charge-transfer dynamics.
//!
//! The circuit is an ohmic resistor `r0` in series with a parallel
//! `r_ct`/`c_ct` branch. The branch is realised as a first-order lag on
//! current with time constant `tau_ct`; its voltage is the lagged current
//! times `r_ct`.

use crate::filters::LagExp;

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeTransfer {
    lag: LagExp,
}

impl ChargeTransfer {
    pub fn new(tau_ct: f64) -> Self {
        Self {
            lag: LagExp::unbounded(tau_ct),
        }
    }

    /// Lagged branch current for this tick. `tau_ct` is re-read every call
    /// so a retained scalar takes effect immediately.
    pub fn calculate(&mut self, ib: f64, reset: bool, dt: f64, tau_ct: f64) -> f64 {
        self.lag.set_tau(tau_ct);
        self.lag.calculate(ib, reset, dt)
    }

    #[inline]
    pub fn state(&self) -> f64 {
        self.lag.state()
    }
}

/// Total dynamic drop across the Randles circuit, V.
#[inline]
pub fn dynamic_drop(ib_lagged: f64, ib: f64, r_ct: f64, r0: f64) -> f64 {
    ib_lagged * r_ct + ib * r0
}
