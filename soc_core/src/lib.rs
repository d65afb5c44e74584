#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Dual-model battery state-of-charge engine.
//!
//! This crate holds the per-tick physics. Chemistry data comes in through
//! `soc_traits::Chemistry`; nothing here touches files or hardware.
//!
//! ## Architecture
//!
//! - **Monitor**: back-calculates static OCV from measured voltage and
//!   current and runs a scalar EKF on it (`monitor` module)
//! - **Simulator**: forward model producing terminal voltage from commanded
//!   current, with charger cutback (`simulator` module)
//! - **Coulomb counting**: shared charge integrator (`coulombs` module)
//! - **Randles / hysteresis**: the two dynamic voltage terms (`dynamics`,
//!   `hysteresis` modules)
//! - **Filters**: lag, rate limit, deadband, two-pole, debounce (`filters`)
//!
//! A fast tick calls `calculate` on each model, then `count_coulombs`.

pub mod config;
pub mod conversions;
pub mod coulombs;
pub mod dynamics;
pub mod ekf;
pub mod error;
pub mod filters;
pub mod hysteresis;
pub mod model;
pub mod monitor;
pub mod simulator;
pub mod util;

pub use config::{BatteryConsts, EkfCfg, RetainedCfg};
pub use coulombs::{BatteryState, CoulombInput};
pub use ekf::{EkfCore, FixedNoise, NoiseContext, NoiseSchedule, voc_soc_slope};
pub use error::{BuildError, Report, Result};
pub use model::{BatteryModel, Estimator};
pub use monitor::{Monitor, MonitorDiag, MonitorInput, MonitorSnapshot, MonitorWarmStart};
pub use simulator::{CutbackState, SimDiag, SimInput, SimSnapshot, SimWarmStart, Simulator};
