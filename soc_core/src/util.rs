//! Common time and unit helpers for soc_core.

/// Number of seconds in one hour.
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Charge-time estimates saturate at one day, hours.
pub const TCHARGE_LIMIT_HRS: f64 = 24.0;

/// Convert coulombs to amp-hours.
#[inline]
pub fn amp_hours(coulombs: f64) -> f64 {
    coulombs / SECONDS_PER_HOUR
}

/// Fast ticks per EKF frame for the current loop period `dt`.
///
/// Scales `eframe_mult` so an EKF frame spans the same wall time at any
/// `dt`. Rounds up and never returns less than 1.
#[inline]
pub fn eframe_mult(eframe_mult: u32, nom_dt: f64, dt: f64) -> u32 {
    if !(dt > 0.0) {
        return eframe_mult.max(1);
    }
    let ticks = (f64::from(eframe_mult) * nom_dt / dt + 0.9999).floor();
    if ticks >= f64::from(u32::MAX) {
        u32::MAX
    } else if ticks >= 1.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = ticks as u32;
        n
    } else {
        1
    }
}
